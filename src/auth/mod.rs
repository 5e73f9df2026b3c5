pub mod provider;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use miette::Diagnostic;
use rand::distr::{Alphanumeric, SampleString};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use url::Url;

pub use provider::IdentityProvider;

/// Tokens older than this margin before expiry are refreshed.
const EXPIRY_MARGIN_SECS: i64 = 30;

#[derive(Error, Debug, Diagnostic)]
pub enum AuthError {
    #[error("login required")]
    #[diagnostic(code(relationsales::auth::login_required))]
    LoginRequired,

    #[error("login state did not match")]
    #[diagnostic(code(relationsales::auth::state))]
    StateMismatch,

    #[error("login was refused: {0}")]
    #[diagnostic(code(relationsales::auth::refused))]
    Refused(String),

    #[error("identity provider rejected the request ({status}): {message}")]
    #[diagnostic(code(relationsales::auth::provider))]
    Provider { status: u16, message: String },

    #[error("identity provider unreachable: {0}")]
    #[diagnostic(code(relationsales::auth::network))]
    Network(String),

    #[error("invalid identity provider domain: {0}")]
    #[diagnostic(code(relationsales::auth::domain))]
    InvalidDomain(String),

    #[error("a client secret is required for command-line access")]
    #[diagnostic(
        code(relationsales::auth::client_secret),
        help("set RELATIONSALES_AUTH_CLIENT_SECRET or auth.client_secret in the config file")
    )]
    MissingClientSecret,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl TokenSet {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - Duration::seconds(EXPIRY_MARGIN_SECS) > now
    }
}

/// Source of bearer tokens for outgoing API calls.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, AuthError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Unauthenticated,
    Authenticating { csrf: String },
    Authenticated(TokenSet),
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Unauthenticated,
    Authenticating,
    Authenticated,
    Error,
}

/// Login session of the person using the front-end.
#[derive(Debug)]
pub struct AuthSession {
    provider: IdentityProvider,
    state: RwLock<SessionState>,
}

impl AuthSession {
    pub fn new(provider: IdentityProvider) -> Self {
        AuthSession {
            provider,
            state: RwLock::new(SessionState::Unauthenticated),
        }
    }

    #[cfg(test)]
    pub fn with_state(provider: IdentityProvider, state: SessionState) -> Self {
        AuthSession {
            provider,
            state: RwLock::new(state),
        }
    }

    pub async fn status(&self) -> SessionStatus {
        match &*self.state.read().await {
            SessionState::Unauthenticated => SessionStatus::Unauthenticated,
            SessionState::Authenticating { .. } => SessionStatus::Authenticating,
            SessionState::Authenticated(_) => SessionStatus::Authenticated,
            SessionState::Error(_) => SessionStatus::Error,
        }
    }

    pub async fn error_message(&self) -> Option<String> {
        match &*self.state.read().await {
            SessionState::Error(message) => Some(message.clone()),
            _ => None,
        }
    }

    /// Starts (or resumes) the interactive flow and returns where to send the
    /// browser. A login already in progress keeps its `state` value.
    pub async fn begin_login(&self, redirect_uri: &str) -> Result<Url, AuthError> {
        let csrf = {
            let mut state = self.state.write().await;
            let csrf = match &*state {
                SessionState::Authenticating { csrf } => csrf.clone(),
                _ => Alphanumeric.sample_string(&mut rand::rng(), 32),
            };
            *state = SessionState::Authenticating { csrf: csrf.clone() };
            csrf
        };
        tracing::info!("redirecting to identity provider");

        self.provider.authorize_url(redirect_uri, &csrf)
    }

    pub async fn complete_login(
        &self,
        code: &str,
        returned_state: &str,
        redirect_uri: &str,
    ) -> Result<(), AuthError> {
        let expected = match &*self.state.read().await {
            SessionState::Authenticating { csrf } => Some(csrf.clone()),
            _ => None,
        };
        if expected.as_deref() != Some(returned_state) {
            tracing::warn!("login callback with unexpected state");
            self.fail(&AuthError::StateMismatch).await;
            return Err(AuthError::StateMismatch);
        }

        match self.provider.exchange_code(code, redirect_uri).await {
            Ok(tokens) => {
                *self.state.write().await = SessionState::Authenticated(tokens);
                tracing::info!("session authenticated");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "code exchange failed");
                self.fail(&e).await;
                Err(e)
            }
        }
    }

    pub async fn fail(&self, error: &AuthError) {
        *self.state.write().await = SessionState::Error(error.to_string());
    }

    pub async fn logout(&self, return_to: &str) -> Result<Url, AuthError> {
        *self.state.write().await = SessionState::Unauthenticated;
        tracing::info!("session ended");

        self.provider.logout_url(return_to)
    }
}

#[async_trait]
impl TokenSource for AuthSession {
    /// Cached token when fresh, else a silent refresh. Without a usable
    /// refresh token the session falls back to the interactive flow.
    async fn access_token(&self) -> Result<String, AuthError> {
        if let SessionState::Authenticated(tokens) = &*self.state.read().await {
            if tokens.is_fresh(Utc::now()) {
                return Ok(tokens.access_token.clone());
            }
        }

        let mut state = self.state.write().await;
        let refresh_token = match &*state {
            SessionState::Authenticated(tokens) if tokens.is_fresh(Utc::now()) => {
                return Ok(tokens.access_token.clone());
            }
            SessionState::Authenticated(tokens) => tokens.refresh_token.clone(),
            _ => return Err(AuthError::LoginRequired),
        };
        let Some(refresh_token) = refresh_token else {
            *state = SessionState::Unauthenticated;
            return Err(AuthError::LoginRequired);
        };

        match self.provider.refresh(&refresh_token).await {
            Ok(mut tokens) => {
                if tokens.refresh_token.is_none() {
                    tokens.refresh_token = Some(refresh_token);
                }
                let access_token = tokens.access_token.clone();
                *state = SessionState::Authenticated(tokens);
                tracing::debug!("access token refreshed");
                Ok(access_token)
            }
            Err(e) => {
                tracing::warn!(error = %e, "token refresh failed");
                *state = SessionState::Unauthenticated;
                Err(e)
            }
        }
    }
}

/// Machine-to-machine tokens for the command line.
#[derive(Debug)]
pub struct ClientCredentials {
    provider: IdentityProvider,
    cached: Mutex<Option<TokenSet>>,
}

impl ClientCredentials {
    pub fn new(provider: IdentityProvider) -> Result<Self, AuthError> {
        if !provider.has_client_secret() {
            return Err(AuthError::MissingClientSecret);
        }

        Ok(ClientCredentials {
            provider,
            cached: Mutex::new(None),
        })
    }
}

#[async_trait]
impl TokenSource for ClientCredentials {
    async fn access_token(&self) -> Result<String, AuthError> {
        let mut cached = self.cached.lock().await;
        if let Some(tokens) = cached.as_ref().filter(|t| t.is_fresh(Utc::now())) {
            return Ok(tokens.access_token.clone());
        }

        let tokens = self.provider.client_credentials().await?;
        let access_token = tokens.access_token.clone();
        *cached = Some(tokens);

        Ok(access_token)
    }
}
