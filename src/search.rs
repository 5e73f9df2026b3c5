use std::collections::{BTreeSet, HashMap, HashSet};

use crate::data::{Contact, Organization};

/// Queries shorter than this (after trimming) show everything.
pub const MIN_QUERY_LEN: usize = 2;

/// Trimmed, lower-cased query, or `None` when it is too short to search on.
pub fn normalize(query: &str) -> Option<String> {
    let query = query.trim().to_lowercase();
    if query.chars().count() < MIN_QUERY_LEN {
        None
    } else {
        Some(query)
    }
}

#[derive(Debug, Clone)]
struct IndexedContact {
    contact_id: String,
    haystacks: [String; 4],
}

impl IndexedContact {
    fn new(contact: &Contact) -> Self {
        IndexedContact {
            contact_id: contact.contact_id.clone(),
            haystacks: [
                contact.name.to_lowercase(),
                contact.email.as_deref().unwrap_or_default().to_lowercase(),
                contact.phone.to_string(),
                contact.position_name.to_lowercase(),
            ],
        }
    }

    fn matches(&self, query: &str) -> bool {
        self.haystacks.iter().any(|h| h.contains(query))
    }
}

#[derive(Debug, Clone)]
struct IndexEntry {
    org_number: i64,
    name: String,
    contacts: Vec<IndexedContact>,
    positions: HashMap<String, usize>,
}

/// Lookup structure built once per change of the organization list.
#[derive(Debug, Clone, Default)]
pub struct SearchIndex {
    entries: Vec<IndexEntry>,
    by_number: HashMap<i64, usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactMatch {
    pub org_number: i64,
    pub contact_id: String,
    entry: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Matches {
    pub organizations: HashSet<i64>,
    pub contacts: Vec<ContactMatch>,
}

impl SearchIndex {
    pub fn build(organizations: &[Organization]) -> Self {
        let mut index = SearchIndex::default();
        for org in organizations {
            let contacts: Vec<IndexedContact> =
                org.contacts.iter().map(IndexedContact::new).collect();
            let positions = contacts
                .iter()
                .enumerate()
                .map(|(i, c)| (c.contact_id.clone(), i))
                .collect();
            index
                .by_number
                .entry(org.org_number)
                .or_insert(index.entries.len());
            index.entries.push(IndexEntry {
                org_number: org.org_number,
                name: org.org_name.to_lowercase(),
                contacts,
                positions,
            });
        }

        index
    }

    /// Position of the first organization with this number.
    pub fn position_of(&self, org_number: i64) -> Option<usize> {
        self.by_number.get(&org_number).copied()
    }

    /// Runs a normalized query. Contacts are collected whether or not their
    /// organization matched as well.
    pub fn search(&self, query: &str) -> Matches {
        let mut matches = Matches::default();
        for (pos, entry) in self.entries.iter().enumerate() {
            if entry.name.contains(query) {
                matches.organizations.insert(entry.org_number);
            }
            for contact in &entry.contacts {
                if contact.matches(query) {
                    matches.contacts.push(ContactMatch {
                        org_number: entry.org_number,
                        contact_id: contact.contact_id.clone(),
                        entry: pos,
                    });
                }
            }
        }

        matches
    }

    fn contact_position(&self, found: &ContactMatch) -> Option<(usize, usize)> {
        let contact_pos = *self.entries.get(found.entry)?.positions.get(&found.contact_id)?;

        Some((found.entry, contact_pos))
    }
}

/// Selected organization types. Empty means no filtering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeFilter {
    selected: BTreeSet<String>,
}

impl TypeFilter {
    pub fn new<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TypeFilter {
            selected: types
                .into_iter()
                .map(Into::<String>::into)
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn contains(&self, org_type: &str) -> bool {
        self.selected.contains(org_type)
    }

    pub fn allows(&self, org: &Organization) -> bool {
        self.is_empty() || self.contains(&org.org_type)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Organizations,
    Contacts,
    Empty,
}

/// What the page shows for a query and a type filter.
#[derive(Debug, Clone, Default)]
pub struct Visible<'a> {
    pub organizations: Vec<&'a Organization>,
    pub contacts: Vec<&'a Contact>,
}

impl Visible<'_> {
    /// Organizations take priority over the contact fallback.
    pub fn view(&self) -> View {
        if !self.organizations.is_empty() {
            View::Organizations
        } else if !self.contacts.is_empty() {
            View::Contacts
        } else {
            View::Empty
        }
    }
}

/// Visible subset of `organizations`. The type filter only narrows the
/// organization axis; contact matches are left as they are.
pub fn visible<'a>(
    organizations: &'a [Organization],
    index: &SearchIndex,
    query: &str,
    types: &TypeFilter,
) -> Visible<'a> {
    let Some(query) = normalize(query) else {
        return Visible {
            organizations: organizations.iter().filter(|o| types.allows(o)).collect(),
            contacts: Vec::new(),
        };
    };

    let matches = index.search(&query);
    let shown = organizations
        .iter()
        .filter(|o| matches.organizations.contains(&o.org_number) && types.allows(o))
        .collect();
    let contacts = matches
        .contacts
        .iter()
        .filter_map(|found| {
            let (org_pos, contact_pos) = index.contact_position(found)?;
            organizations.get(org_pos)?.contacts.get(contact_pos)
        })
        .collect();

    Visible {
        organizations: shown,
        contacts,
    }
}

/// Organization picker of the add-contact form: plain substring match on the
/// name, any length.
pub fn filter_by_name<'a>(organizations: &'a [Organization], term: &str) -> Vec<&'a Organization> {
    let term = term.to_lowercase();
    organizations
        .iter()
        .filter(|o| o.org_name.to_lowercase().contains(&term))
        .collect()
}

#[cfg(test)]
mod tests;
