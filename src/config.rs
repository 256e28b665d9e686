//! Client configuration

use crate::credentials::{Credentials, ProjectScope};
use crate::error::{Error, Result};
use crate::protocol::AuthProtocol;
use std::env;
use std::fmt;
use std::time::Duration;
use url::Url;

const DEFAULT_POOL: &str = "api";
const DOMAIN: &str = "selcdn.ru";

/// Client configuration
#[derive(Clone)]
pub struct Config {
    /// User id (`<account>_<user>`) or user name
    pub user: String,
    pub password: String,
    /// Authentication variant
    pub protocol: AuthProtocol,
    /// Storage account; derived from `user` when unset
    pub account_id: Option<String>,
    /// Project scope for Keystone tokens
    pub project: Option<ProjectScope>,
    /// User domain for name-based Keystone v3 login
    pub domain: Option<String>,
    /// Token obtained elsewhere; used until the service rejects it
    pub token: Option<String>,
    /// Regional host label; `api` when unset
    pub pool: Option<String>,
    /// Single base URL for every host (proxy or test server)
    pub endpoint: Option<String>,
    /// Identity host override
    pub auth_url: Option<String>,
    /// Storage account URL override
    pub storage_url: Option<String>,
    /// Summary info host override
    pub info_url: Option<String>,
    /// Transport timeout applied to every request
    pub timeout: Option<Duration>,
    pub user_agent: String,
}

/// Resolved endpoint URLs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub auth_url: String,
    pub storage_url: String,
    pub info_url: String,
}

impl Config {
    /// Create a config for the given user and password
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
            protocol: AuthProtocol::default(),
            account_id: None,
            project: None,
            domain: None,
            token: None,
            pool: None,
            endpoint: None,
            auth_url: None,
            storage_url: None,
            info_url: None,
            timeout: None,
            user_agent: format!("selectel-storage/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Load configuration from `SELECTEL_*` environment variables
    pub fn from_env() -> Result<Self> {
        let user = env::var("SELECTEL_USER").unwrap_or_default();
        let password = env::var("SELECTEL_PASSWORD").unwrap_or_default();
        let mut config = Self::new(user, password);

        if let Ok(proto) = env::var("SELECTEL_PROTOCOL") {
            config.protocol = parse_protocol(&proto)?;
        }
        if let Ok(account_id) = env::var("SELECTEL_ACCOUNT_ID") {
            config.account_id = Some(account_id);
        }
        if let Ok(id) = env::var("SELECTEL_PROJECT_ID") {
            config.project = Some(ProjectScope::Id(id));
        } else if let Ok(name) = env::var("SELECTEL_PROJECT_NAME") {
            config.project = Some(ProjectScope::Name(name));
        }
        if let Ok(pool) = env::var("SELECTEL_POOL") {
            config.pool = Some(pool);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_protocol(mut self, protocol: AuthProtocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn with_account_id(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }

    pub fn with_project_id(mut self, id: impl Into<String>) -> Self {
        self.project = Some(ProjectScope::Id(id.into()));
        self
    }

    pub fn with_project_name(mut self, name: impl Into<String>) -> Self {
        self.project = Some(ProjectScope::Name(name.into()));
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_pool(mut self, pool: impl Into<String>) -> Self {
        self.pool = Some(pool.into());
        self
    }

    /// Send every request to one base URL (a proxy or a test server).
    ///
    /// The storage account then lives at `<base>/v1/SEL_<account>`.
    /// Explicit `auth_url`/`storage_url`/`info_url` overrides still win.
    pub fn with_endpoint(mut self, base: impl Into<String>) -> Self {
        self.endpoint = Some(base.into());
        self
    }

    pub fn with_auth_url(mut self, url: impl Into<String>) -> Self {
        self.auth_url = Some(url.into());
        self
    }

    pub fn with_storage_url(mut self, url: impl Into<String>) -> Self {
        self.storage_url = Some(url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Account id: explicit, or the part of the user id before `_`
    pub fn account_id(&self) -> String {
        match &self.account_id {
            Some(id) => id.clone(),
            None => self
                .user
                .split_once('_')
                .map(|(account, _)| account)
                .unwrap_or(&self.user)
                .to_string(),
        }
    }

    /// Check required fields and endpoint overrides
    pub fn validate(&self) -> Result<()> {
        if self.user.is_empty() {
            return Err(Error::Configuration("User is required".to_string()));
        }
        if self.password.is_empty() {
            return Err(Error::Configuration("Password is required".to_string()));
        }

        for url in [&self.endpoint, &self.auth_url, &self.storage_url, &self.info_url]
            .into_iter()
            .flatten()
        {
            Url::parse(url)?;
        }

        Ok(())
    }

    /// Compute the endpoints this config talks to
    pub fn endpoints(&self) -> Result<Endpoints> {
        let pool = self.pool.as_deref().unwrap_or(DEFAULT_POOL);
        let account = self.account_id();
        let endpoint = self.endpoint.clone().map(trimmed);
        let api_base = endpoint
            .clone()
            .unwrap_or_else(|| format!("https://{}.{}", pool, DOMAIN));
        let info_base = endpoint.unwrap_or_else(|| format!("https://{}.{}", account, DOMAIN));

        let endpoints = Endpoints {
            auth_url: trimmed(self.auth_url.clone().unwrap_or_else(|| api_base.clone())),
            storage_url: trimmed(
                self.storage_url
                    .clone()
                    .unwrap_or_else(|| format!("{}/v1/SEL_{}", api_base, account)),
            ),
            info_url: trimmed(self.info_url.clone().unwrap_or(info_base)),
        };

        for url in [&endpoints.auth_url, &endpoints.storage_url, &endpoints.info_url] {
            Url::parse(url)?;
        }

        Ok(endpoints)
    }

    pub(crate) fn credentials(&self) -> Credentials {
        let mut credentials = Credentials::new(&self.user, &self.password);
        if let Some(domain) = &self.domain {
            credentials = credentials.with_domain(domain);
        }
        if let Some(project) = &self.project {
            credentials = credentials.with_project(project.clone());
        }
        credentials
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("protocol", &self.protocol)
            .field("account_id", &self.account_id)
            .field("project", &self.project)
            .field("domain", &self.domain)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("pool", &self.pool)
            .field("endpoint", &self.endpoint)
            .field("auth_url", &self.auth_url)
            .field("storage_url", &self.storage_url)
            .field("info_url", &self.info_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn parse_protocol(value: &str) -> Result<AuthProtocol> {
    value
        .trim()
        .trim_start_matches(['v', 'V'])
        .parse::<u8>()
        .ok()
        .and_then(AuthProtocol::from_number)
        .ok_or_else(|| Error::Configuration(format!("Unknown auth protocol: {}", value)))
}

fn trimmed(url: String) -> String {
    url.trim_end_matches('/').to_string()
}
