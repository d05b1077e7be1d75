// rivet-net/src/auth/bridge.rs
//! Authenticator that serves repository credentials to every outbound
//! connection, falling back to whatever authenticator was installed before it.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use rivet_common::config::ProxySettings;
use rivet_common::credentials::{CredentialStore, Credentials};
use tracing::{debug, warn};

use super::challenge::{AuthenticationChallenge, PasswordAuthentication};
use super::classifier::ClassifierChain;
use super::slot::{Authenticator, AuthenticatorSlot};

static SECURITY_WARNING_LOGGED: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed,
    /// A `RivetAuthenticator` was already the active authenticator.
    AlreadyInstalled,
    /// The slot refused the replacement; authentication is disabled.
    Refused,
}

pub struct RivetAuthenticator {
    original: Option<Arc<dyn Authenticator>>,
    store: Arc<CredentialStore>,
    proxy: ProxySettings,
    classifier: ClassifierChain,
    slot: &'static AuthenticatorSlot,
    self_ref: Weak<RivetAuthenticator>,
}

impl RivetAuthenticator {
    /// Installs a bridge into `slot`, wrapping the authenticator found there.
    ///
    /// Call once at startup, before opening connections. Installing over an
    /// existing bridge does nothing.
    pub fn install(
        slot: &'static AuthenticatorSlot,
        store: Arc<CredentialStore>,
        proxy: ProxySettings,
    ) -> InstallOutcome {
        let result = slot.update(|current| {
            if current.is_some_and(|a| a.as_any().is::<RivetAuthenticator>()) {
                return None;
            }
            let original = current.cloned();
            let classifier = ClassifierChain::detect(&proxy);
            let bridge = Arc::new_cyclic(|self_ref: &Weak<RivetAuthenticator>| RivetAuthenticator {
                original,
                store,
                proxy,
                classifier,
                slot,
                self_ref: self_ref.clone(),
            });
            Some(Some(bridge as Arc<dyn Authenticator>))
        });

        match result {
            Ok(true) => {
                debug!("Rivet authenticator installed");
                InstallOutcome::Installed
            }
            Ok(false) => {
                debug!("Rivet authenticator already installed");
                InstallOutcome::AlreadyInstalled
            }
            Err(e) => {
                if !SECURITY_WARNING_LOGGED.swap(true, Ordering::SeqCst) {
                    warn!(
                        "Not enough permissions to set the rivet authenticator ({}). HTTP(S) authentication will be disabled!",
                        e
                    );
                }
                InstallOutcome::Refused
            }
        }
    }

    /// Installs into the process-wide slot with the process-wide store.
    pub fn install_default(proxy: &ProxySettings) -> InstallOutcome {
        Self::install(
            AuthenticatorSlot::global(),
            CredentialStore::global(),
            proxy.clone(),
        )
    }

    pub fn original(&self) -> Option<&Arc<dyn Authenticator>> {
        self.original.as_ref()
    }

    fn proxy_authentication(&self) -> Option<PasswordAuthentication> {
        let user = self.proxy.effective_user()?;
        debug!("authenticating to proxy server with username [{}]", user);
        Some(PasswordAuthentication::new(
            user,
            self.proxy.password.as_deref().unwrap_or(""),
        ))
    }

    fn origin_authentication(
        &self,
        challenge: &AuthenticationChallenge,
    ) -> Option<PasswordAuthentication> {
        let found = self
            .store
            .get_credentials(challenge.prompt.as_deref(), &challenge.host);
        debug!(
            "authentication: k='{}' c='{}'",
            Credentials::build_key(challenge.prompt.as_deref(), &challenge.host),
            found
                .as_ref()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "none".to_string())
        );
        found.as_ref().map(PasswordAuthentication::from)
    }

    /// Makes `original` the active authenticator for one standard request,
    /// then reinstates this bridge whatever happens.
    fn delegate(
        &self,
        original: &Arc<dyn Authenticator>,
        challenge: &AuthenticationChallenge,
    ) -> Option<PasswordAuthentication> {
        let Some(me) = self.self_ref.upgrade() else {
            return original.password_authentication(challenge);
        };
        let _serialized = self.slot.lock_delegation();
        let _restore = RestoreOnDrop {
            slot: self.slot,
            bridge: me,
        };
        self.slot.swap_installed(Some(Arc::clone(original)));
        debug!(
            "No rivet credentials for {}:{}, delegating to the original authenticator",
            challenge.host, challenge.port
        );
        self.slot.request_password_authentication(challenge)
    }
}

// The slot is left out: it prints its current authenticator, which is us.
impl fmt::Debug for RivetAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RivetAuthenticator")
            .field("original", &self.original)
            .field("credentials", &self.store.len())
            .field("proxy", &self.proxy)
            .field("classifier", &self.classifier)
            .finish()
    }
}

impl Authenticator for RivetAuthenticator {
    fn password_authentication(
        &self,
        challenge: &AuthenticationChallenge,
    ) -> Option<PasswordAuthentication> {
        let result = if self.classifier.is_proxy_authentication(challenge) {
            self.proxy_authentication()
        } else {
            self.origin_authentication(challenge)
        };

        match (result, &self.original) {
            (Some(found), _) => Some(found),
            (None, Some(original)) => self.delegate(original, challenge),
            (None, None) => None,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct RestoreOnDrop {
    slot: &'static AuthenticatorSlot,
    bridge: Arc<RivetAuthenticator>,
}

impl Drop for RestoreOnDrop {
    fn drop(&mut self) {
        let bridge: Arc<dyn Authenticator> = self.bridge.clone();
        self.slot.swap_installed(Some(bridge));
    }
}
