use std::sync::{
    Mutex,
    atomic::{AtomicBool, AtomicU16, AtomicUsize, Ordering},
};

use async_trait::async_trait;

use crate::api::{ApiError, ApiResult, CreatedContact, RelationsApi};
use crate::data::{Contact, NewContact, NewOrganization, Organization};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    FetchAll,
    FetchOrgTypes,
    CreateOrganization(NewOrganization),
    CreateContact(NewContact),
    EditContact(Contact),
    DeleteContact(String),
}

/// In-memory stand-in for the remote backend. Every call is recorded; while
/// a failure status is set every call answers with it.
pub struct TestApi {
    organizations: Vec<Organization>,
    types: Vec<String>,
    calls: Mutex<Vec<Call>>,
    failing: AtomicU16,
    types_failing: AtomicBool,
    organizations_failing: AtomicU16,
    next_id: AtomicUsize,
}

impl TestApi {
    pub fn new(organizations: Vec<Organization>, types: Vec<String>) -> Self {
        TestApi {
            organizations,
            types,
            calls: Mutex::new(Vec::new()),
            failing: AtomicU16::new(0),
            types_failing: AtomicBool::new(false),
            organizations_failing: AtomicU16::new(0),
            next_id: AtomicUsize::new(1),
        }
    }

    pub fn fail(&self, failing: bool) {
        self.fail_with(if failing { 500 } else { 0 });
    }

    pub fn fail_with(&self, status: u16) {
        self.failing.store(status, Ordering::SeqCst);
    }

    /// Fails only the type catalog fetch.
    pub fn fail_types(&self, failing: bool) {
        self.types_failing.store(failing, Ordering::SeqCst);
    }

    /// Answers only organization creation with `status`.
    pub fn fail_organizations_with(&self, status: u16) {
        self.organizations_failing.store(status, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call, action: &'static str) -> ApiResult<()> {
        self.calls.lock().unwrap().push(call);
        let status = self.failing.load(Ordering::SeqCst);
        if status != 0 {
            Err(ApiError::Status {
                action,
                status,
                message: "test backend error".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RelationsApi for TestApi {
    async fn fetch_all(&self) -> ApiResult<Vec<Organization>> {
        self.record(Call::FetchAll, "fetching data")?;
        Ok(self.organizations.clone())
    }

    async fn fetch_org_types(&self) -> ApiResult<Vec<String>> {
        let action = "fetching organization types";
        self.record(Call::FetchOrgTypes, action)?;
        if self.types_failing.load(Ordering::SeqCst) {
            return Err(ApiError::Status {
                action,
                status: 500,
                message: "test backend error".to_string(),
            });
        }
        Ok(self.types.clone())
    }

    async fn create_organization(&self, org: &NewOrganization) -> ApiResult<()> {
        let action = "adding organization";
        self.record(Call::CreateOrganization(org.clone()), action)?;
        match self.organizations_failing.load(Ordering::SeqCst) {
            0 => Ok(()),
            status => Err(ApiError::Status {
                action,
                status,
                message: "test backend error".to_string(),
            }),
        }
    }

    async fn create_contact(&self, contact: &NewContact) -> ApiResult<CreatedContact> {
        self.record(Call::CreateContact(contact.clone()), "adding contact")?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        Ok(CreatedContact {
            contact_id: format!("c{}", id),
        })
    }

    async fn edit_contact(&self, contact: &Contact) -> ApiResult<()> {
        self.record(Call::EditContact(contact.clone()), "editing contact")
    }

    async fn delete_contact(&self, contact_id: &str) -> ApiResult<()> {
        self.record(Call::DeleteContact(contact_id.to_string()), "deleting contact")
    }
}
