use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde_derive::{Deserialize, Serialize};
use url::Url;

use crate::auth::{AuthError, TokenSet};
use crate::settings::AuthSettings;

const DEFAULT_EXPIRES_IN: i64 = 3600;

#[derive(Serialize)]
#[serde(tag = "grant_type", rename_all = "snake_case")]
enum Grant<'a> {
    AuthorizationCode { code: &'a str, redirect_uri: &'a str },
    RefreshToken { refresh_token: &'a str },
    ClientCredentials,
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    #[serde(flatten)]
    grant: Grant<'a>,
    client_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_secret: Option<&'a str>,
    audience: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

#[derive(Deserialize)]
struct ProviderError {
    error: String,
    error_description: Option<String>,
}

/// The external OAuth2 identity provider (Auth0 style endpoints).
#[derive(Debug, Clone)]
pub struct IdentityProvider {
    issuer: Url,
    client_id: String,
    client_secret: Option<String>,
    audience: String,
    scope: String,
    http: Client,
}

impl IdentityProvider {
    pub fn new(settings: &AuthSettings) -> Result<Self, AuthError> {
        let http = Client::builder()
            .build()
            .map_err(|e| AuthError::Network(e.to_string()))?;

        Ok(IdentityProvider {
            issuer: issuer_url(&settings.domain)?,
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            audience: settings.audience.clone(),
            scope: settings.scope.clone(),
            http,
        })
    }

    pub fn has_client_secret(&self) -> bool {
        self.client_secret.is_some()
    }

    pub fn authorize_url(&self, redirect_uri: &str, state: &str) -> Result<Url, AuthError> {
        let mut url = self.endpoint("authorize")?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("audience", &self.audience)
            .append_pair("scope", &self.scope)
            .append_pair("state", state);

        Ok(url)
    }

    pub fn logout_url(&self, return_to: &str) -> Result<Url, AuthError> {
        let mut url = self.endpoint("v2/logout")?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("returnTo", return_to);

        Ok(url)
    }

    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenSet, AuthError> {
        self.token(Grant::AuthorizationCode { code, redirect_uri })
            .await
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, AuthError> {
        self.token(Grant::RefreshToken { refresh_token }).await
    }

    pub async fn client_credentials(&self) -> Result<TokenSet, AuthError> {
        if self.client_secret.is_none() {
            return Err(AuthError::MissingClientSecret);
        }
        self.token(Grant::ClientCredentials).await
    }

    async fn token(&self, grant: Grant<'_>) -> Result<TokenSet, AuthError> {
        let body = TokenRequest {
            grant,
            client_id: &self.client_id,
            client_secret: self.client_secret.as_deref(),
            audience: &self.audience,
        };
        let response = self
            .http
            .post(self.endpoint("oauth/token")?)
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ProviderError>(&text) {
                Ok(ProviderError {
                    error_description: Some(description),
                    ..
                }) => description,
                Ok(ProviderError { error, .. }) => error,
                Err(_) => status.canonical_reason().unwrap_or("unknown").to_string(),
            };
            return Err(AuthError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        Ok(tokens.into_token_set(Utc::now()))
    }

    fn endpoint(&self, path: &str) -> Result<Url, AuthError> {
        self.issuer
            .join(path)
            .map_err(|e| AuthError::InvalidDomain(e.to_string()))
    }
}

impl TokenResponse {
    fn into_token_set(self, now: DateTime<Utc>) -> TokenSet {
        TokenSet {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: now + Duration::seconds(self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN)),
        }
    }
}

/// `tenant.eu.auth0.com` becomes `https://tenant.eu.auth0.com/`. A value with
/// an explicit scheme is used as given.
pub fn issuer_url(domain: &str) -> Result<Url, AuthError> {
    let domain = domain.trim().trim_end_matches('/');
    let raw = if domain.contains("://") {
        format!("{}/", domain)
    } else {
        format!("https://{}/", domain)
    };

    Url::parse(&raw).map_err(|e| AuthError::InvalidDomain(format!("{}: {}", domain, e)))
}
