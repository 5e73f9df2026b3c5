use async_trait::async_trait;
use serde_derive::Deserialize;
use thiserror::Error;

use crate::auth::AuthError;
use crate::data::{Contact, NewContact, NewOrganization, Organization};

pub mod http;

#[cfg(test)]
pub mod test_api;

pub use http::HttpApi;

/// Failure of a remote call. The client never panics past this type.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),

    #[error("{action} failed with {status}: {message}")]
    Status {
        action: &'static str,
        status: u16,
        message: String,
    },

    #[error("unexpected response to {action}: {message}")]
    Decode {
        action: &'static str,
        message: String,
    },

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl ApiError {
    pub fn is_auth(&self) -> bool {
        match self {
            ApiError::Auth(_) => true,
            ApiError::Status { status, .. } => *status == 401,
            _ => false,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// What the backend hands back for a created contact.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct CreatedContact {
    #[serde(rename = "ContactID", alias = "contactID")]
    pub contact_id: String,
}

#[async_trait]
pub trait RelationsApi: Send + Sync {
    async fn fetch_all(&self) -> ApiResult<Vec<Organization>>;
    async fn fetch_org_types(&self) -> ApiResult<Vec<String>>;
    async fn create_organization(&self, org: &NewOrganization) -> ApiResult<()>;
    async fn create_contact(&self, contact: &NewContact) -> ApiResult<CreatedContact>;
    async fn edit_contact(&self, contact: &Contact) -> ApiResult<()>;
    async fn delete_contact(&self, contact_id: &str) -> ApiResult<()>;
}
