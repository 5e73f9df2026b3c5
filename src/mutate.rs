use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex as SyncMutex, PoisonError};

use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock, RwLockReadGuard};

use crate::api::{ApiError, RelationsApi};
use crate::data::{Contact, ContactField, NewContact, NewOrganization, ValidationError};
use crate::store::Store;

#[derive(Error, Debug)]
pub enum MutationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("no contact with id {0}")]
    NotFound(String),
}

impl MutationError {
    pub fn is_auth(&self) -> bool {
        matches!(self, MutationError::Api(e) if e.is_auth())
    }
}

/// One async mutex per entity key. Operations on the same entity queue up
/// behind each other and finish in the order they were issued.
#[derive(Debug, Default)]
pub struct EntityLocks {
    locks: SyncMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl EntityLocks {
    pub async fn lock(&self, key: String) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(key).or_default().clone()
        };

        lock.lock_owned().await
    }

    pub fn contact(contact_id: &str) -> String {
        format!("contact/{}", contact_id)
    }

    pub fn organization(org_number: i64) -> String {
        format!("organization/{}", org_number)
    }
}

/// Applies changes to the remote backend and, once it confirms them, to the
/// local store.
pub struct Mutator {
    api: Arc<dyn RelationsApi>,
    store: RwLock<Store>,
    org_types: RwLock<Option<Vec<String>>>,
    locks: EntityLocks,
}

impl Mutator {
    pub fn new(api: Arc<dyn RelationsApi>) -> Self {
        Mutator {
            api,
            store: RwLock::new(Store::default()),
            org_types: RwLock::new(None),
            locks: EntityLocks::default(),
        }
    }

    pub async fn store(&self) -> RwLockReadGuard<'_, Store> {
        self.store.read().await
    }

    /// Type catalog from the backend together with any type already in use.
    pub async fn org_types(&self) -> BTreeSet<String> {
        let mut types: BTreeSet<String> = self
            .org_types
            .read()
            .await
            .iter()
            .flatten()
            .filter(|t| !t.trim().is_empty())
            .cloned()
            .collect();
        types.extend(self.store.read().await.organization_types());

        types
    }

    pub async fn reload(&self) -> Result<usize, MutationError> {
        let organizations = self.api.fetch_all().await.inspect_err(|e| {
            tracing::error!(error = %e, "could not load organizations");
        })?;
        let count = organizations.len();
        self.store.write().await.replace_all(organizations);
        tracing::info!(count, "organizations loaded");

        Ok(count)
    }

    pub async fn load_types(&self) -> Result<usize, MutationError> {
        let types = self.api.fetch_org_types().await.inspect_err(|e| {
            tracing::error!(error = %e, "could not load organization types");
        })?;
        let count = types.len();
        *self.org_types.write().await = Some(types);

        Ok(count)
    }

    /// Loads organizations and the type catalog, each unless a previous load
    /// of it succeeded. A failed load is retried on the next call.
    pub async fn ensure_loaded(&self) -> Result<(), MutationError> {
        if !self.store.read().await.is_loaded() {
            self.reload().await?;
        }
        if self.org_types.read().await.is_none() {
            self.load_types().await?;
        }

        Ok(())
    }

    pub async fn add_organization(&self, org: NewOrganization) -> Result<(), MutationError> {
        let org = org.checked().inspect_err(|e| {
            tracing::warn!(error = %e, "organization rejected");
        })?;
        let _guard = self
            .locks
            .lock(EntityLocks::organization(org.org_number))
            .await;

        self.api.create_organization(&org).await?;
        self.store.write().await.add_organization(&org);
        tracing::info!(org_number = org.org_number, "organization added");

        Ok(())
    }

    pub async fn add_contact(&self, contact: NewContact) -> Result<Contact, MutationError> {
        let contact = contact.checked().inspect_err(|e| {
            tracing::warn!(error = %e, "contact rejected");
        })?;
        let _guard = self
            .locks
            .lock(EntityLocks::organization(contact.org_number))
            .await;

        let created = self.api.create_contact(&contact).await?;
        let contact = contact.into_contact(created.contact_id);
        if !self.store.write().await.add_contact(contact.clone()) {
            tracing::warn!(
                org_number = contact.org_number,
                contact_id = %contact.contact_id,
                "contact added to an organization that is not loaded"
            );
        } else {
            tracing::info!(contact_id = %contact.contact_id, "contact added");
        }

        Ok(contact)
    }

    /// Whole-record edit: every given field is applied to the current record
    /// and the result is sent as one update.
    pub async fn edit_contact(
        &self,
        contact_id: &str,
        edits: &[(ContactField, String)],
    ) -> Result<Contact, MutationError> {
        let _guard = self.locks.lock(EntityLocks::contact(contact_id)).await;

        let current = self
            .store
            .read()
            .await
            .contact(contact_id)
            .cloned()
            .ok_or_else(|| MutationError::NotFound(contact_id.to_string()))?;
        let updated = edits
            .iter()
            .try_fold(current, |contact, (field, raw)| contact.with_field(*field, raw))
            .inspect_err(|e| {
                tracing::warn!(contact_id, error = %e, "contact edit rejected");
            })?;

        self.api.edit_contact(&updated).await?;
        self.store.write().await.replace_contact(updated.clone());
        tracing::info!(contact_id, "contact updated");

        Ok(updated)
    }

    pub async fn edit_contact_field(
        &self,
        contact_id: &str,
        field: ContactField,
        raw: &str,
    ) -> Result<Contact, MutationError> {
        self.edit_contact(contact_id, &[(field, raw.to_string())])
            .await
    }

    pub async fn delete_contact(&self, contact_id: &str) -> Result<(), MutationError> {
        let _guard = self.locks.lock(EntityLocks::contact(contact_id)).await;
        if self.store.read().await.contact(contact_id).is_none() {
            return Err(MutationError::NotFound(contact_id.to_string()));
        }

        self.api.delete_contact(contact_id).await?;
        self.store.write().await.remove_contact(contact_id);
        tracing::info!(contact_id, "contact deleted");

        Ok(())
    }
}
