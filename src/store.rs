use std::collections::BTreeSet;

use crate::data::{Contact, NewOrganization, Organization};
use crate::search::{self, SearchIndex, TypeFilter, Visible};

/// In-memory organizations and contacts for the lifetime of the process.
/// The remote API is the system of record; this is only a working copy.
#[derive(Debug, Default)]
pub struct Store {
    organizations: Vec<Organization>,
    index: SearchIndex,
    loaded: bool,
}

impl Store {
    #[cfg(test)]
    pub fn new(organizations: Vec<Organization>) -> Self {
        let mut store = Store::default();
        store.replace_all(organizations);
        store
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    #[cfg(test)]
    pub fn organizations(&self) -> &[Organization] {
        &self.organizations
    }

    pub fn replace_all(&mut self, organizations: Vec<Organization>) {
        self.organizations = organizations;
        self.loaded = true;
        self.reindex();
    }

    pub fn add_organization(&mut self, org: &NewOrganization) {
        self.organizations.push(Organization::new(
            org.organization_name.clone(),
            org.org_number,
            org.org_type.clone(),
        ));
        self.reindex();
    }

    /// Appends to the organization the contact points at. Returns `false`
    /// when no such organization is known.
    pub fn add_contact(&mut self, contact: Contact) -> bool {
        let Some(pos) = self.index.position_of(contact.org_number) else {
            return false;
        };
        let Some(org) = self.organizations.get_mut(pos) else {
            return false;
        };
        org.contacts.push(contact);
        self.reindex();

        true
    }

    /// Replaces the contact with the same id in place, inside whichever
    /// organization holds it.
    pub fn replace_contact(&mut self, contact: Contact) -> bool {
        let Some(slot) = self
            .organizations
            .iter_mut()
            .flat_map(|o| o.contacts.iter_mut())
            .find(|c| c.contact_id == contact.contact_id)
        else {
            return false;
        };
        *slot = contact;
        self.reindex();

        true
    }

    /// Removes the contact with this id. A missing id is a no-op.
    pub fn remove_contact(&mut self, contact_id: &str) -> bool {
        let found = self.organizations.iter().enumerate().find_map(|(i, o)| {
            o.contacts
                .iter()
                .position(|c| c.contact_id == contact_id)
                .map(|pos| (i, pos))
        });
        let Some((org_pos, pos)) = found else {
            return false;
        };
        if let Some(org) = self.organizations.get_mut(org_pos) {
            org.contacts.remove(pos);
        }
        self.reindex();

        true
    }

    pub fn contact(&self, contact_id: &str) -> Option<&Contact> {
        self.organizations
            .iter()
            .flat_map(|o| o.contacts.iter())
            .find(|c| c.contact_id == contact_id)
    }

    pub fn organization(&self, org_number: i64) -> Option<&Organization> {
        self.index
            .position_of(org_number)
            .and_then(|pos| self.organizations.get(pos))
    }

    /// `None` for a dangling reference; views show a placeholder.
    pub fn organization_name(&self, org_number: i64) -> Option<&str> {
        self.organization(org_number).map(|o| o.org_name.as_str())
    }

    /// Types present on loaded organizations, sorted.
    pub fn organization_types(&self) -> BTreeSet<String> {
        self.organizations
            .iter()
            .filter(|o| !o.org_type.is_empty())
            .map(|o| o.org_type.clone())
            .collect()
    }

    pub fn visible(&self, query: &str, types: &TypeFilter) -> Visible<'_> {
        search::visible(&self.organizations, &self.index, query, types)
    }

    pub fn picker(&self, term: &str) -> Vec<&Organization> {
        search::filter_by_name(&self.organizations, term)
    }

    fn reindex(&mut self) {
        self.index = SearchIndex::build(&self.organizations);
    }
}
