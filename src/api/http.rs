use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_derive::Deserialize;
use url::Url;

use crate::api::{ApiError, ApiResult, CreatedContact, RelationsApi};
use crate::auth::TokenSource;
use crate::data::{Contact, NewContact, NewOrganization, Organization};

#[derive(Deserialize)]
struct AddContactResponse {
    contact: CreatedContact,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// `reqwest` client for the RELATIONSALES backend.
#[derive(Clone)]
pub struct HttpApi {
    base_url: Url,
    http: Client,
    tokens: Option<Arc<dyn TokenSource>>,
}

impl std::fmt::Debug for HttpApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpApi")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.tokens.is_some())
            .finish()
    }
}

impl HttpApi {
    pub fn new(base_url: &Url, tokens: Option<Arc<dyn TokenSource>>) -> ApiResult<Self> {
        let http = Client::builder()
            .user_agent(concat!("relationsales/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(HttpApi {
            base_url: base_url.clone(),
            http,
            tokens,
        })
    }

    /// Base URL extended by `segments`, each percent-encoded as one path
    /// segment.
    fn endpoint(&self, segments: &[&str]) -> ApiResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::Network(format!("{} cannot be a base url", self.base_url)))?
            .pop_if_empty()
            .extend(segments);

        Ok(url)
    }

    async fn request(&self, method: Method, segments: &[&str]) -> ApiResult<RequestBuilder> {
        let builder = self.http.request(method, self.endpoint(segments)?);
        match &self.tokens {
            Some(tokens) => Ok(builder.bearer_auth(tokens.access_token().await?)),
            None => Ok(builder),
        }
    }

    async fn send(&self, builder: RequestBuilder, action: &'static str) -> ApiResult<Response> {
        let response = builder.send().await.map_err(|e| {
            tracing::error!(action, error = %e, "request failed");
            ApiError::Network(e.to_string())
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.error)
            .unwrap_or_else(|_| status.canonical_reason().unwrap_or("unknown").to_string());
        tracing::error!(action, status = status.as_u16(), %message, "request rejected");

        Err(ApiError::Status {
            action,
            status: status.as_u16(),
            message,
        })
    }

    async fn json<T: DeserializeOwned>(response: Response, action: &'static str) -> ApiResult<T> {
        response.json().await.map_err(|e| {
            tracing::error!(action, error = %e, "could not decode response");
            ApiError::Decode {
                action,
                message: e.to_string(),
            }
        })
    }
}

#[async_trait]
impl RelationsApi for HttpApi {
    async fn fetch_all(&self) -> ApiResult<Vec<Organization>> {
        let action = "fetching data";
        let request = self.request(Method::GET, &["all_data"]).await?;
        let response = self.send(request, action).await?;
        let organizations: Option<Vec<Organization>> = Self::json(response, action).await?;

        Ok(organizations.unwrap_or_default())
    }

    async fn fetch_org_types(&self) -> ApiResult<Vec<String>> {
        let action = "fetching organization types";
        let request = self.request(Method::GET, &["org_types"]).await?;
        let response = self.send(request, action).await?;
        let types: Option<Vec<String>> = Self::json(response, action).await?;

        Ok(types.unwrap_or_default())
    }

    async fn create_organization(&self, org: &NewOrganization) -> ApiResult<()> {
        let request = self.request(Method::POST, &["add_organization"]).await?;
        self.send(request.json(org), "adding organization").await?;

        Ok(())
    }

    async fn create_contact(&self, contact: &NewContact) -> ApiResult<CreatedContact> {
        let action = "adding contact";
        let request = self.request(Method::POST, &["add_contact"]).await?;
        let response = self.send(request.json(contact), action).await?;
        let created: AddContactResponse = Self::json(response, action).await?;

        Ok(created.contact)
    }

    async fn edit_contact(&self, contact: &Contact) -> ApiResult<()> {
        let request = self.request(Method::PUT, &["edit_contact"]).await?;
        self.send(request.json(contact), "editing contact").await?;

        Ok(())
    }

    async fn delete_contact(&self, contact_id: &str) -> ApiResult<()> {
        let request = self
            .request(Method::DELETE, &["delete_contact", contact_id])
            .await?;
        self.send(request, "deleting contact").await?;

        Ok(())
    }
}
