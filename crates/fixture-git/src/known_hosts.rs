//! OpenSSH `known_hosts` parsing and host key verification.
//!
//! Supports plain and wildcard host patterns, negations, `[host]:port`
//! entries and hashed (`|1|salt|hash`) hostnames. Marker lines
//! (`@cert-authority`, `@revoked`) are rejected rather than ignored so a
//! fixture never silently runs with weaker verification than configured.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::{Error, Result};

type HmacSha1 = Hmac<Sha1>;

/// Result of checking a presented host key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostKeyStatus {
    /// A matching entry holds exactly this key
    Match,
    /// The host is known but with a different key
    Mismatch,
    /// No entry covers the host
    Unknown,
}

#[derive(Debug, Clone)]
enum HostPattern {
    Plain { pattern: String, negated: bool },
    Hashed { salt: Vec<u8>, hash: Vec<u8> },
}

impl HostPattern {
    fn parse(raw: &str, line: usize) -> Result<Self> {
        if let Some(rest) = raw.strip_prefix("|1|") {
            let (salt, hash) = rest.split_once('|').ok_or_else(|| {
                Error::auth_config(format!("known_hosts line {line}: malformed hashed host"))
            })?;
            let decode = |part: &str| {
                STANDARD.decode(part).map_err(|e| {
                    Error::auth_config(format!("known_hosts line {line}: bad hashed host: {e}"))
                })
            };
            return Ok(Self::Hashed {
                salt: decode(salt)?,
                hash: decode(hash)?,
            });
        }

        let (negated, pattern) = match raw.strip_prefix('!') {
            Some(p) => (true, p),
            None => (false, raw),
        };
        if pattern.is_empty() {
            return Err(Error::auth_config(format!(
                "known_hosts line {line}: empty host pattern"
            )));
        }
        Ok(Self::Plain {
            pattern: pattern.to_lowercase(),
            negated,
        })
    }

    fn matches(&self, host: &str) -> bool {
        match self {
            Self::Plain { pattern, .. } => {
                let pattern = strip_port(pattern);
                glob_match(pattern.as_bytes(), host.as_bytes())
            }
            Self::Hashed { salt, hash } => {
                let Ok(mut mac) = HmacSha1::new_from_slice(salt) else {
                    return false;
                };
                mac.update(host.as_bytes());
                mac.verify_slice(hash).is_ok()
            }
        }
    }

    fn is_negated(&self) -> bool {
        matches!(self, Self::Plain { negated: true, .. })
    }
}

/// `[host]:port` patterns match on host; libgit2 reports hosts without port.
fn strip_port(pattern: &str) -> &str {
    pattern
        .strip_prefix('[')
        .and_then(|rest| rest.split_once(']'))
        .map(|(host, _)| host)
        .unwrap_or(pattern)
}

fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    match (pattern.first(), text.first()) {
        (None, None) => true,
        (Some(b'*'), _) => {
            glob_match(&pattern[1..], text) || (!text.is_empty() && glob_match(pattern, &text[1..]))
        }
        (Some(b'?'), Some(_)) => glob_match(&pattern[1..], &text[1..]),
        (Some(p), Some(t)) if p == t => glob_match(&pattern[1..], &text[1..]),
        _ => false,
    }
}

/// One `known_hosts` line.
#[derive(Debug, Clone)]
pub struct KnownHost {
    patterns: Vec<HostPattern>,
    key_type: String,
    key: Vec<u8>,
}

impl KnownHost {
    pub fn key_type(&self) -> &str {
        &self.key_type
    }

    /// Raw public key blob as sent by the server during key exchange.
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    fn covers(&self, host: &str) -> bool {
        let host = host.to_lowercase();
        let mut matched = false;
        for pattern in &self.patterns {
            if pattern.matches(&host) {
                if pattern.is_negated() {
                    return false;
                }
                matched = true;
            }
        }
        matched
    }
}

/// Parsed set of trusted host keys.
#[derive(Debug, Clone)]
pub struct KnownHosts {
    entries: Vec<KnownHost>,
}

impl KnownHosts {
    /// Parse `known_hosts` content. Fails on any malformed line and on
    /// content with no entries at all.
    pub fn parse(content: &str) -> Result<Self> {
        let mut entries = Vec::new();

        for (idx, raw_line) in content.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line.starts_with('@') {
                return Err(Error::auth_config(format!(
                    "known_hosts line {line_no}: markers are not supported"
                )));
            }

            let mut fields = line.split_whitespace();
            let (Some(hosts), Some(key_type), Some(key_b64)) =
                (fields.next(), fields.next(), fields.next())
            else {
                return Err(Error::auth_config(format!(
                    "known_hosts line {line_no}: expected `hosts keytype key`"
                )));
            };

            let patterns = hosts
                .split(',')
                .map(|p| HostPattern::parse(p, line_no))
                .collect::<Result<Vec<_>>>()?;

            let key = STANDARD.decode(key_b64).map_err(|e| {
                Error::auth_config(format!("known_hosts line {line_no}: bad key encoding: {e}"))
            })?;
            match blob_key_type(&key) {
                Some(embedded) if embedded == key_type => {}
                _ => {
                    return Err(Error::auth_config(format!(
                        "known_hosts line {line_no}: key does not match type {key_type}"
                    )));
                }
            }

            entries.push(KnownHost {
                patterns,
                key_type: key_type.to_string(),
                key,
            });
        }

        if entries.is_empty() {
            return Err(Error::auth_config("known_hosts contains no entries"));
        }

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[KnownHost] {
        &self.entries
    }

    /// Check a raw host key blob presented by `host`.
    pub fn verify(&self, host: &str, key: &[u8]) -> HostKeyStatus {
        self.check(host, |entry| entry.key == key)
    }

    /// Check a host key known only by its SHA-256 fingerprint.
    pub fn verify_sha256(&self, host: &str, fingerprint: &[u8]) -> HostKeyStatus {
        self.check(host, |entry| {
            Sha256::digest(&entry.key).as_slice() == fingerprint
        })
    }

    fn check(&self, host: &str, same_key: impl Fn(&KnownHost) -> bool) -> HostKeyStatus {
        let mut known = false;
        for entry in self.entries.iter().filter(|e| e.covers(host)) {
            if same_key(entry) {
                return HostKeyStatus::Match;
            }
            known = true;
        }
        if known {
            HostKeyStatus::Mismatch
        } else {
            HostKeyStatus::Unknown
        }
    }
}

/// Key type name embedded at the start of an SSH public key blob.
fn blob_key_type(blob: &[u8]) -> Option<&str> {
    let len_bytes: [u8; 4] = blob.get(..4)?.try_into().ok()?;
    let len = u32::from_be_bytes(len_bytes) as usize;
    let name = blob.get(4..4 + len)?;
    std::str::from_utf8(name).ok()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Minimal well-formed blob: type name followed by opaque key bytes.
    pub(crate) fn fake_blob(key_type: &str, body: &[u8]) -> Vec<u8> {
        let mut blob = (key_type.len() as u32).to_be_bytes().to_vec();
        blob.extend_from_slice(key_type.as_bytes());
        blob.extend_from_slice(&(body.len() as u32).to_be_bytes());
        blob.extend_from_slice(body);
        blob
    }

    pub(crate) fn line(hosts: &str, key_type: &str, body: &[u8]) -> String {
        format!(
            "{hosts} {key_type} {}",
            STANDARD.encode(fake_blob(key_type, body))
        )
    }

    #[test]
    fn parses_plain_entries_and_skips_comments() {
        let content = format!(
            "# comment\n\n{}\n{}\n",
            line("github.com,140.82.121.4", "ssh-ed25519", b"k1"),
            line("gitlab.com", "ssh-rsa", b"k2"),
        );
        let hosts = KnownHosts::parse(&content).unwrap();
        assert_eq!(hosts.entries().len(), 2);
        assert_eq!(hosts.entries()[0].key_type(), "ssh-ed25519");
    }

    #[test]
    fn verifies_matching_mismatching_and_unknown_hosts() {
        let content = line("github.com", "ssh-ed25519", b"good");
        let hosts = KnownHosts::parse(&content).unwrap();

        let good = fake_blob("ssh-ed25519", b"good");
        let bad = fake_blob("ssh-ed25519", b"evil");
        assert_eq!(hosts.verify("github.com", &good), HostKeyStatus::Match);
        assert_eq!(hosts.verify("GitHub.com", &good), HostKeyStatus::Match);
        assert_eq!(hosts.verify("github.com", &bad), HostKeyStatus::Mismatch);
        assert_eq!(hosts.verify("example.com", &good), HostKeyStatus::Unknown);
    }

    #[test]
    fn verifies_by_sha256_fingerprint() {
        let content = line("github.com", "ssh-ed25519", b"good");
        let hosts = KnownHosts::parse(&content).unwrap();
        let fingerprint = Sha256::digest(fake_blob("ssh-ed25519", b"good"));
        assert_eq!(
            hosts.verify_sha256("github.com", fingerprint.as_slice()),
            HostKeyStatus::Match
        );
    }

    #[test]
    fn supports_wildcards_negation_and_ports() {
        let content = format!(
            "{}\n{}\n",
            line("*.example.com,!bad.example.com", "ssh-rsa", b"wild"),
            line("[git.internal]:2222", "ssh-rsa", b"port"),
        );
        let hosts = KnownHosts::parse(&content).unwrap();
        let wild = fake_blob("ssh-rsa", b"wild");
        assert_eq!(hosts.verify("a.example.com", &wild), HostKeyStatus::Match);
        assert_eq!(hosts.verify("bad.example.com", &wild), HostKeyStatus::Unknown);
        assert_eq!(
            hosts.verify("git.internal", &fake_blob("ssh-rsa", b"port")),
            HostKeyStatus::Match
        );
    }

    #[test]
    fn supports_hashed_hosts() {
        let salt = b"0123456789abcdefghij";
        let mut mac = HmacSha1::new_from_slice(salt).unwrap();
        mac.update(b"github.com");
        let hash = mac.finalize().into_bytes();
        let hashed = format!("|1|{}|{}", STANDARD.encode(salt), STANDARD.encode(hash));

        let hosts = KnownHosts::parse(&line(&hashed, "ssh-ed25519", b"h")).unwrap();
        let blob = fake_blob("ssh-ed25519", b"h");
        assert_eq!(hosts.verify("github.com", &blob), HostKeyStatus::Match);
        assert_eq!(hosts.verify("gitlab.com", &blob), HostKeyStatus::Unknown);
    }

    #[test]
    fn rejects_malformed_content() {
        for content in [
            "",
            "# only comments\n",
            "github.com ssh-ed25519",
            "github.com ssh-ed25519 !!!notbase64!!!",
            "@cert-authority *.example.com ssh-rsa AAAA",
            "|1|broken ssh-rsa AAAA",
        ] {
            let err = KnownHosts::parse(content).unwrap_err();
            assert!(matches!(err, Error::AuthConfig { .. }), "{content:?}: {err:?}");
        }
    }

    #[test]
    fn rejects_key_type_mismatch() {
        let blob = fake_blob("ssh-rsa", b"k");
        let content = format!("github.com ssh-ed25519 {}", STANDARD.encode(blob));
        assert!(KnownHosts::parse(&content).is_err());
    }
}
