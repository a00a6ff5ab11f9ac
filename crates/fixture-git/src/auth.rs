//! Transport authentication.
//!
//! [`resolve`] is the only place that looks at the transport kind. Every
//! other component holds an [`Authenticator`] and asks it for credentials.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use git2::{CertificateCheckStatus, Cred, CredentialType};
use git2::cert::Cert;
use serde::{Deserialize, Serialize};

use crate::known_hosts::{HostKeyStatus, KnownHosts};
use crate::{Error, Result};

/// Git transport used to reach a fixture remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Ssh,
    #[default]
    #[serde(alias = "http")]
    Https,
}

impl FromStr for TransportKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ssh" => Ok(Self::Ssh),
            "https" | "http" => Ok(Self::Https),
            other => Err(Error::auth_config(format!("unknown transport '{other}'"))),
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ssh => "ssh",
            Self::Https => "https",
        })
    }
}

/// Credential material for one transport.
#[derive(Clone)]
pub enum Credentials {
    Ssh {
        username: String,
        private_key: String,
        passphrase: Option<String>,
        known_hosts: String,
    },
    /// Static username/password, typically a personal access token.
    Token { username: String, password: String },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ssh { username, .. } => f
                .debug_struct("Ssh")
                .field("username", username)
                .finish_non_exhaustive(),
            Self::Token { username, .. } => f
                .debug_struct("Token")
                .field("username", username)
                .finish_non_exhaustive(),
        }
    }
}

/// Arguments a bootstrap CLI needs to reach the same remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapArgs {
    pub args: Vec<String>,
    /// The CLI asks for confirmation before trusting the key
    pub confirm_prompt: bool,
}

/// Something that can authenticate a clone, fetch or push.
pub trait Authenticator: Send + Sync + fmt::Debug {
    /// Produce credentials for a libgit2 credential request.
    fn credentials(
        &self,
        url: &str,
        username_from_url: Option<&str>,
        allowed: CredentialType,
    ) -> std::result::Result<Cred, git2::Error>;

    /// Verify the server's certificate or host key.
    ///
    /// The default defers to libgit2's own TLS validation.
    fn check_host(
        &self,
        _cert: &Cert<'_>,
        _host: &str,
    ) -> std::result::Result<CertificateCheckStatus, git2::Error> {
        Ok(CertificateCheckStatus::CertificatePassthrough)
    }

    /// Transport-specific arguments for a bootstrap CLI. Key material that
    /// must live on disk is written under `key_dir`.
    fn bootstrap_args(&self, key_dir: &Path) -> Result<BootstrapArgs>;
}

/// Build an [`Authenticator`] for `kind` from `credentials`.
pub fn resolve(kind: TransportKind, credentials: Credentials) -> Result<Arc<dyn Authenticator>> {
    match (kind, credentials) {
        (
            TransportKind::Ssh,
            Credentials::Ssh {
                username,
                private_key,
                passphrase,
                known_hosts,
            },
        ) => {
            validate_private_key(&private_key)?;
            let known_hosts = KnownHosts::parse(&known_hosts)?;
            tracing::debug!(
                username = %username,
                hosts = known_hosts.entries().len(),
                "resolved ssh authenticator"
            );
            Ok(Arc::new(SshKeyAuth {
                username,
                private_key,
                passphrase,
                known_hosts,
            }))
        }
        (TransportKind::Https, Credentials::Token { username, password }) => {
            if password.is_empty() {
                return Err(Error::auth_config("token must not be empty"));
            }
            tracing::debug!(username = %username, "resolved token authenticator");
            Ok(Arc::new(TokenAuth { username, password }))
        }
        (kind, credentials) => Err(Error::auth_config(format!(
            "{kind} transport cannot use {credentials:?}"
        ))),
    }
}

/// Check that `key` is a PEM or OpenSSH private key envelope with a
/// base64 body. libssh2 does the real parsing at connect time; this catches
/// truncated or mis-pasted keys before any network traffic.
pub fn validate_private_key(key: &str) -> Result<()> {
    let mut lines = key.lines().map(str::trim).skip_while(|l| l.is_empty());

    let begin = lines
        .next()
        .ok_or_else(|| Error::auth_config("private key is empty"))?;
    let label = begin
        .strip_prefix("-----BEGIN ")
        .and_then(|rest| rest.strip_suffix("-----"))
        .filter(|label| label.ends_with("PRIVATE KEY"))
        .ok_or_else(|| Error::auth_config("private key has no BEGIN PRIVATE KEY line"))?;
    let end = format!("-----END {label}-----");

    let mut body = String::new();
    let mut terminated = false;
    for line in lines {
        if line == end {
            terminated = true;
            break;
        }
        // Legacy PEM headers such as Proc-Type and DEK-Info
        if line.is_empty() || line.contains(':') {
            continue;
        }
        body.push_str(line);
    }

    if !terminated {
        return Err(Error::auth_config(format!("private key is missing `{end}`")));
    }
    match STANDARD.decode(&body) {
        Ok(bytes) if !bytes.is_empty() => Ok(()),
        Ok(_) => Err(Error::auth_config("private key body is empty")),
        Err(e) => Err(Error::auth_config(format!("private key body is not base64: {e}"))),
    }
}

struct SshKeyAuth {
    username: String,
    private_key: String,
    passphrase: Option<String>,
    known_hosts: KnownHosts,
}

impl fmt::Debug for SshKeyAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshKeyAuth")
            .field("username", &self.username)
            .field("known_hosts", &self.known_hosts.entries().len())
            .finish_non_exhaustive()
    }
}

impl Authenticator for SshKeyAuth {
    fn credentials(
        &self,
        _url: &str,
        username_from_url: Option<&str>,
        allowed: CredentialType,
    ) -> std::result::Result<Cred, git2::Error> {
        let username = username_from_url.unwrap_or(&self.username);
        if allowed.contains(CredentialType::USERNAME) {
            return Cred::username(username);
        }
        if allowed.contains(CredentialType::SSH_MEMORY) || allowed.contains(CredentialType::SSH_KEY)
        {
            return Cred::ssh_key_from_memory(
                username,
                None,
                &self.private_key,
                self.passphrase.as_deref(),
            );
        }
        Err(git2::Error::from_str(&format!(
            "ssh key authentication not offered (allowed: {allowed:?})"
        )))
    }

    fn check_host(
        &self,
        cert: &Cert<'_>,
        host: &str,
    ) -> std::result::Result<CertificateCheckStatus, git2::Error> {
        let Some(hostkey) = cert.as_hostkey() else {
            return Err(git2::Error::from_str(
                "ssh transport presented a non-ssh certificate",
            ));
        };

        let status = if let Some(key) = hostkey.hostkey() {
            self.known_hosts.verify(host, key)
        } else if let Some(fingerprint) = hostkey.hash_sha256() {
            self.known_hosts.verify_sha256(host, fingerprint)
        } else {
            return Err(git2::Error::from_str(
                "server host key unavailable for verification",
            ));
        };

        match status {
            HostKeyStatus::Match => {
                tracing::debug!(host = %host, "host key verified");
                Ok(CertificateCheckStatus::CertificateOk)
            }
            HostKeyStatus::Mismatch => {
                tracing::warn!(host = %host, "host key does not match known_hosts");
                Err(git2::Error::from_str(&format!(
                    "host key for {host} does not match known_hosts"
                )))
            }
            HostKeyStatus::Unknown => {
                tracing::warn!(host = %host, "host not present in known_hosts");
                Err(git2::Error::from_str(&format!(
                    "host {host} is not present in known_hosts"
                )))
            }
        }
    }

    fn bootstrap_args(&self, key_dir: &Path) -> Result<BootstrapArgs> {
        let key_path = key_dir.join("identity");
        fixture_fs::io::write_private(&key_path, self.private_key.as_bytes())?;
        Ok(BootstrapArgs {
            args: vec![format!("--private-key-file={}", key_path.display())],
            confirm_prompt: true,
        })
    }
}

struct TokenAuth {
    username: String,
    password: String,
}

impl fmt::Debug for TokenAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenAuth")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl Authenticator for TokenAuth {
    fn credentials(
        &self,
        _url: &str,
        _username_from_url: Option<&str>,
        allowed: CredentialType,
    ) -> std::result::Result<Cred, git2::Error> {
        if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) {
            return Cred::userpass_plaintext(&self.username, &self.password);
        }
        Err(git2::Error::from_str(&format!(
            "token authentication not offered (allowed: {allowed:?})"
        )))
    }

    fn bootstrap_args(&self, _key_dir: &Path) -> Result<BootstrapArgs> {
        Ok(BootstrapArgs {
            args: vec![
                "--token-auth".to_string(),
                format!("--password={}", self.password),
            ],
            confirm_prompt: false,
        })
    }
}
