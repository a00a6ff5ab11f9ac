//! Fixture configuration
//!
//! Loaded from TOML, JSON or YAML (by extension) through
//! [`fixture_fs::ConfigStore`], then overridden from the environment so CI
//! can inject secrets without writing them to disk.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use fixture_fs::ConfigStore;
use fixture_git::auth::{self, Authenticator, Credentials, TransportKind};
use fixture_git::Identity;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub const ENV_TRANSPORT: &str = "FIXTURE_GIT_TRANSPORT";
pub const ENV_PAT: &str = "FIXTURE_GIT_PAT";
pub const ENV_PRIVATE_KEY: &str = "FIXTURE_GIT_PRIVATE_KEY";
pub const ENV_KNOWN_HOSTS: &str = "FIXTURE_GIT_KNOWN_HOSTS";
pub const ENV_USERNAME: &str = "FIXTURE_GIT_USERNAME";
pub const ENV_HTTP_URL: &str = "FIXTURE_GIT_HTTP_URL";
pub const ENV_SSH_URL: &str = "FIXTURE_GIT_SSH_URL";

/// Components installed on top of the default set by bootstrap.
pub const DEFAULT_COMPONENTS_EXTRA: [&str; 2] =
    ["image-reflector-controller", "image-automation-controller"];

/// Complete fixture configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixtureConfig {
    pub transport: TransportKind,
    /// Branch fixtures start from
    pub branch: String,
    /// Limit for each clone, fetch or push
    pub timeout_secs: u64,
    pub repository: RepositoryUrls,
    pub credentials: CredentialConfig,
    pub identity: Identity,
    pub readiness: ReadinessConfig,
    pub bootstrap: BootstrapConfig,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::default(),
            branch: "main".to_string(),
            timeout_secs: fixture_git::DEFAULT_TIMEOUT.as_secs(),
            repository: RepositoryUrls::default(),
            credentials: CredentialConfig::default(),
            identity: Identity::default(),
            readiness: ReadinessConfig::default(),
            bootstrap: BootstrapConfig::default(),
        }
    }
}

/// The same repository reached over each transport.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryUrls {
    pub http: Option<String>,
    pub ssh: Option<String>,
}

/// Credential material. Inline values win over files.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialConfig {
    pub username: String,
    /// Personal access token for HTTPS
    pub password: Option<String>,
    pub private_key: Option<String>,
    pub private_key_file: Option<PathBuf>,
    pub passphrase: Option<String>,
    pub known_hosts: Option<String>,
    pub known_hosts_file: Option<PathBuf>,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            username: "git".to_string(),
            password: None,
            private_key: None,
            private_key_file: None,
            passphrase: None,
            known_hosts: None,
            known_hosts_file: None,
        }
    }
}

impl fmt::Debug for CredentialConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |set: bool| if set { "<redacted>" } else { "<unset>" };
        f.debug_struct("CredentialConfig")
            .field("username", &self.username)
            .field("password", &redact(self.password.is_some()))
            .field("private_key", &redact(self.private_key.is_some()))
            .field("private_key_file", &self.private_key_file)
            .field("passphrase", &redact(self.passphrase.is_some()))
            .field("known_hosts", &self.known_hosts.as_ref().map(|_| "<inline>"))
            .field("known_hosts_file", &self.known_hosts_file)
            .finish()
    }
}

/// Polling of reconciled resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessConfig {
    pub interval_secs: u64,
    pub timeout_secs: u64,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            timeout_secs: 120,
        }
    }
}

/// Bootstrap command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    pub program: String,
    /// Repository path the cluster syncs from
    pub path: String,
    pub components_extra: Vec<String>,
    pub kubeconfig: Option<PathBuf>,
    pub timeout_secs: u64,
    /// Replaces the default `kustomization.yaml` seeded before bootstrap
    pub kustomization_yaml: Option<String>,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            program: "flux".to_string(),
            path: "clusters/e2e".to_string(),
            components_extra: DEFAULT_COMPONENTS_EXTRA.iter().map(|c| c.to_string()).collect(),
            kubeconfig: None,
            timeout_secs: 15 * 60,
            kustomization_yaml: None,
        }
    }
}

impl FixtureConfig {
    /// Load from a file and apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let config: Self = ConfigStore::new().load(path)?;
        tracing::debug!(path = %path.display(), "loaded fixture configuration");
        config.with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, which maps variable names to values.
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(raw) = lookup(ENV_TRANSPORT) {
            self.transport = TransportKind::from_str(&raw)
                .map_err(|e| Error::config(format!("{ENV_TRANSPORT}: {e}")))?;
        }
        if let Some(username) = lookup(ENV_USERNAME) {
            self.credentials.username = username;
        }
        if let Some(pat) = lookup(ENV_PAT) {
            self.credentials.password = Some(pat);
        }
        if let Some(key) = lookup(ENV_PRIVATE_KEY) {
            self.credentials.private_key = Some(key);
        }
        if let Some(known_hosts) = lookup(ENV_KNOWN_HOSTS) {
            self.credentials.known_hosts = Some(known_hosts);
        }
        if let Some(url) = lookup(ENV_HTTP_URL) {
            self.repository.http = Some(url);
        }
        if let Some(url) = lookup(ENV_SSH_URL) {
            self.repository.ssh = Some(url);
        }
        Ok(self)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Repository URL for the configured transport.
    pub fn transport_url(&self) -> Result<&str> {
        let url = match self.transport {
            TransportKind::Ssh => self.repository.ssh.as_deref(),
            TransportKind::Https => self.repository.http.as_deref(),
        };
        url.filter(|u| !u.is_empty()).ok_or_else(|| {
            Error::config(format!("no repository URL configured for {} transport", self.transport))
        })
    }

    /// Gather credential material for the configured transport.
    pub fn credentials(&self) -> Result<Credentials> {
        let creds = &self.credentials;
        match self.transport {
            TransportKind::Ssh => Ok(Credentials::Ssh {
                username: creds.username.clone(),
                private_key: inline_or_file(
                    creds.private_key.as_deref(),
                    creds.private_key_file.as_deref(),
                    "private key",
                )?,
                passphrase: creds.passphrase.clone(),
                known_hosts: inline_or_file(
                    creds.known_hosts.as_deref(),
                    creds.known_hosts_file.as_deref(),
                    "known hosts",
                )?,
            }),
            TransportKind::Https => {
                let password = creds
                    .password
                    .clone()
                    .filter(|p| !p.is_empty())
                    .ok_or_else(|| {
                        Error::config(format!("https transport needs a token (set {ENV_PAT})"))
                    })?;
                Ok(Credentials::Token {
                    username: creds.username.clone(),
                    password,
                })
            }
        }
    }

    /// Build the authenticator for the configured transport.
    pub fn resolve_auth(&self) -> Result<Arc<dyn Authenticator>> {
        Ok(auth::resolve(self.transport, self.credentials()?)?)
    }
}

fn inline_or_file(inline: Option<&str>, file: Option<&Path>, what: &str) -> Result<String> {
    if let Some(value) = inline.filter(|v| !v.trim().is_empty()) {
        return Ok(value.to_string());
    }
    if let Some(path) = file {
        return Ok(fixture_fs::io::read_text(path)?);
    }
    Err(Error::config(format!("ssh transport needs {what} material")))
}
