// rivet-common/src/credentials.rs
//! Process-wide credential table keyed by (realm, host).
//!
//! Entries are written while configuration loads and only read once
//! resolution starts, so a read-mostly `RwLock` is enough.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::debug;

static GLOBAL_STORE: Lazy<Arc<CredentialStore>> = Lazy::new(|| Arc::new(CredentialStore::new()));

/// A declarative credential entry as it appears in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialEntry {
    #[serde(default)]
    pub realm: Option<String>,
    pub host: String,
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    realm: Option<String>,
    host: String,
    username: String,
    password: Option<String>,
}

impl Credentials {
    pub fn new(
        realm: Option<&str>,
        host: impl Into<String>,
        username: impl Into<String>,
        password: Option<&str>,
    ) -> Self {
        Self {
            realm: realm.map(str::to_string),
            host: host.into(),
            username: username.into(),
            password: password.map(str::to_string),
        }
    }

    /// `realm@host`, or just `host` when the realm is blank. A non-blank
    /// realm goes into the key as given, surrounding spaces included.
    pub fn build_key(realm: Option<&str>, host: &str) -> String {
        match realm {
            Some(r) if !r.trim().is_empty() => format!("{r}@{host}"),
            _ => host.to_string(),
        }
    }

    pub fn key(&self) -> String {
        Self::build_key(self.realm.as_deref(), &self.host)
    }

    pub fn realm(&self) -> Option<&str> {
        self.realm.as_deref()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Password, or an empty string when none was configured.
    pub fn password(&self) -> &str {
        self.password.as_deref().unwrap_or("")
    }
}

// Passwords never reach logs.
impl fmt::Display for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let masked = if self.password.is_some() { "****" } else { "" };
        write!(f, "{} {}/{}", self.key(), self.username, masked)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("realm", &self.realm)
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "****"))
            .finish()
    }
}

#[derive(Debug, Default)]
struct Keyring {
    entries: HashMap<String, Credentials>,
    secured_hosts: HashSet<String>,
}

#[derive(Debug, Default)]
pub struct CredentialStore {
    keyring: RwLock<Keyring>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide store.
    pub fn global() -> Arc<CredentialStore> {
        Arc::clone(&GLOBAL_STORE)
    }

    pub fn add_credentials(
        &self,
        realm: Option<&str>,
        host: &str,
        username: Option<&str>,
        password: Option<&str>,
    ) {
        let Some(username) = username.filter(|u| !u.is_empty()) else {
            debug!(
                "Ignoring credentials for '{}' without a username",
                Credentials::build_key(realm, host)
            );
            return;
        };
        let credentials = Credentials::new(realm, host, username, password);
        debug!("credentials added: {}", credentials);

        let mut keyring = self.keyring.write().unwrap_or_else(PoisonError::into_inner);
        keyring.secured_hosts.insert(host.to_string());
        keyring.entries.insert(credentials.key(), credentials);
    }

    pub fn load_from(&self, entries: &[CredentialEntry]) {
        for entry in entries {
            self.add_credentials(
                entry.realm.as_deref(),
                &entry.host,
                Some(entry.username.as_str()),
                entry.password.as_deref(),
            );
        }
    }

    /// Exact lookup on both realm and host.
    pub fn get_credentials(&self, realm: Option<&str>, host: &str) -> Option<Credentials> {
        let key = Credentials::build_key(realm, host);
        let keyring = self.keyring.read().unwrap_or_else(PoisonError::into_inner);
        keyring.entries.get(&key).cloned()
    }

    /// Whether any entry was registered for `host`, whatever its realm.
    pub fn has_credentials(&self, host: &str) -> bool {
        let keyring = self.keyring.read().unwrap_or_else(PoisonError::into_inner);
        keyring.secured_hosts.contains(host)
    }

    pub fn len(&self) -> usize {
        self.keyring
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
