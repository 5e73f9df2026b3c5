use std::{
    fs,
    path::{Path, PathBuf},
};

use garde::Validate;
use miette::Diagnostic;
use serde_derive::Deserialize;
use thiserror::Error;
use url::Url;

use crate::CONFIG;

pub const ENV_AUTH_DOMAIN: &str = "RELATIONSALES_AUTH_DOMAIN";
pub const ENV_AUTH_CLIENT_ID: &str = "RELATIONSALES_AUTH_CLIENT_ID";
pub const ENV_AUTH_CLIENT_SECRET: &str = "RELATIONSALES_AUTH_CLIENT_SECRET";
pub const ENV_API_URL: &str = "RELATIONSALES_API_URL";
pub const ENV_PUBLIC_URL: &str = "RELATIONSALES_PUBLIC_URL";

#[derive(Error, Debug, Diagnostic)]
pub enum SettingsError {
    #[error("missing identity provider setting {0}")]
    #[diagnostic(
        code(relationsales::settings::missing),
        help("export RELATIONSALES_AUTH_DOMAIN and RELATIONSALES_AUTH_CLIENT_ID, or set them under [auth] in the config file")
    )]
    Missing(&'static str),

    #[error("could not read config file {path:?}")]
    #[diagnostic(code(relationsales::settings::io))]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    #[diagnostic(code(relationsales::settings::parse))]
    Parse(#[from] toml::de::Error),

    #[error("invalid settings: {0}")]
    #[diagnostic(code(relationsales::settings::invalid))]
    Invalid(#[from] garde::Report),

    #[error("invalid url {0}")]
    #[diagnostic(code(relationsales::settings::url))]
    Url(#[from] url::ParseError),
}

#[derive(Debug, Clone, Validate)]
pub struct AuthSettings {
    #[garde(length(min = 1))]
    pub domain: String,
    #[garde(length(min = 1))]
    pub client_id: String,
    #[garde(skip)]
    pub client_secret: Option<String>,
    #[garde(length(min = 1))]
    pub audience: String,
    #[garde(length(min = 1))]
    pub scope: String,
}

/// Runtime configuration. Fixed defaults come from `config.toml`; an optional
/// settings file and then the environment override them.
#[derive(Debug, Clone, Validate)]
pub struct Settings {
    #[garde(url)]
    pub api_url: String,
    #[garde(url)]
    pub public_url: String,
    #[garde(dive)]
    pub auth: AuthSettings,
}

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SettingsFile {
    api_url: Option<String>,
    public_url: Option<String>,
    #[serde(default)]
    auth: AuthFile,
}

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct AuthFile {
    domain: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    audience: Option<String>,
    scope: Option<String>,
}

impl Settings {
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let text = match path {
            Some(path) => Some(fs::read_to_string(path).map_err(|source| SettingsError::Read {
                path: path.to_path_buf(),
                source,
            })?),
            None => None,
        };

        Self::from_sources(text.as_deref(), |key| std::env::var(key).ok())
    }

    pub fn from_sources<F>(file: Option<&str>, env: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file: SettingsFile = match file {
            Some(text) => toml::from_str(text)?,
            None => SettingsFile::default(),
        };
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let domain = env(ENV_AUTH_DOMAIN)
            .or(file.auth.domain)
            .ok_or(SettingsError::Missing(ENV_AUTH_DOMAIN))?;
        let client_id = env(ENV_AUTH_CLIENT_ID)
            .or(file.auth.client_id)
            .ok_or(SettingsError::Missing(ENV_AUTH_CLIENT_ID))?;

        let settings = Settings {
            api_url: env(ENV_API_URL)
                .or(file.api_url)
                .unwrap_or_else(|| CONFIG.api.base_url.to_string()),
            public_url: env(ENV_PUBLIC_URL)
                .or(file.public_url)
                .unwrap_or_else(|| CONFIG.serve.public_url.to_string()),
            auth: AuthSettings {
                domain,
                client_id,
                client_secret: env(ENV_AUTH_CLIENT_SECRET).or(file.auth.client_secret),
                audience: file
                    .auth
                    .audience
                    .unwrap_or_else(|| CONFIG.auth.audience.to_string()),
                scope: file
                    .auth
                    .scope
                    .unwrap_or_else(|| CONFIG.auth.scope.to_string()),
            },
        };
        settings.validate()?;

        Ok(settings)
    }

    pub fn api_url(&self) -> Result<Url, SettingsError> {
        Ok(Url::parse(&self.api_url)?)
    }

    /// Where the identity provider sends the browser back to.
    pub fn redirect_uri(&self) -> String {
        format!(
            "{}{}",
            self.public_url.trim_end_matches('/'),
            CONFIG.auth.callback_path
        )
    }
}
