// rivet-net/src/auth/slot.rs
//! The single process-wide place an authenticator lives in.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use rivet_common::error::{Result, RivetError};
use tracing::debug;

use super::challenge::{AuthenticationChallenge, PasswordAuthentication};

static GLOBAL_SLOT: AuthenticatorSlot = AuthenticatorSlot::new();

/// Answers authentication challenges raised by the transport.
pub trait Authenticator: Send + Sync + fmt::Debug {
    /// Returns a credential for the challenge, or `None` when this
    /// authenticator has nothing to offer.
    fn password_authentication(
        &self,
        challenge: &AuthenticationChallenge,
    ) -> Option<PasswordAuthentication>;

    fn as_any(&self) -> &dyn Any;
}

pub struct AuthenticatorSlot {
    current: RwLock<Option<Arc<dyn Authenticator>>>,
    sealed: AtomicBool,
    delegation: Mutex<()>,
}

impl AuthenticatorSlot {
    pub const fn new() -> Self {
        Self {
            current: RwLock::new(None),
            sealed: AtomicBool::new(false),
            delegation: Mutex::new(()),
        }
    }

    pub fn global() -> &'static AuthenticatorSlot {
        &GLOBAL_SLOT
    }

    pub fn current(&self) -> Option<Arc<dyn Authenticator>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the installed authenticator.
    ///
    /// Fails with `AuthenticationUnavailable` once the slot has been sealed by
    /// the hosting environment.
    pub fn set_default(&self, authenticator: Option<Arc<dyn Authenticator>>) -> Result<()> {
        self.update(|_| Some(authenticator)).map(|_| ())
    }

    /// Atomically inspects the installed authenticator and optionally replaces it.
    ///
    /// `decide` returns `None` to keep the current one. Returns whether a
    /// replacement happened.
    pub fn update<F>(&self, decide: F) -> Result<bool>
    where
        F: FnOnce(Option<&Arc<dyn Authenticator>>) -> Option<Option<Arc<dyn Authenticator>>>,
    {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let Some(replacement) = decide(current.as_ref()) else {
            return Ok(false);
        };
        if self.is_sealed() {
            return Err(RivetError::AuthenticationUnavailable(
                "the authenticator slot is sealed; replacing the installed authenticator is not permitted"
                    .to_string(),
            ));
        }
        *current = replacement;
        Ok(true)
    }

    /// Forbids further `set_default` / `update` replacements.
    pub fn seal(&self) {
        if !self.sealed.swap(true, Ordering::SeqCst) {
            debug!("Authenticator slot sealed");
        }
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::SeqCst)
    }

    /// Asks the installed authenticator, if any.
    pub fn request_password_authentication(
        &self,
        challenge: &AuthenticationChallenge,
    ) -> Option<PasswordAuthentication> {
        // Clone out of the lock: the authenticator may swap the slot while answering.
        let current = self.current()?;
        current.password_authentication(challenge)
    }

    /// Swap used by an installed authenticator for its temporary delegation;
    /// bypasses the seal.
    pub(crate) fn swap_installed(
        &self,
        authenticator: Option<Arc<dyn Authenticator>>,
    ) -> Option<Arc<dyn Authenticator>> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *current, authenticator)
    }

    /// Serializes delegated challenges: one at a time per slot.
    pub(crate) fn lock_delegation(&self) -> MutexGuard<'_, ()> {
        self.delegation.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for AuthenticatorSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AuthenticatorSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatorSlot")
            .field("current", &self.current())
            .field("sealed", &self.is_sealed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Fixed(&'static str);

    impl Authenticator for Fixed {
        fn password_authentication(
            &self,
            _challenge: &AuthenticationChallenge,
        ) -> Option<PasswordAuthentication> {
            Some(PasswordAuthentication::new(self.0, "pw"))
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn challenge() -> AuthenticationChallenge {
        AuthenticationChallenge::new("repo.example.com", 443, "https")
    }

    #[test]
    fn test_empty_slot_answers_nothing() {
        let slot = AuthenticatorSlot::new();
        assert!(slot.current().is_none());
        assert!(slot.request_password_authentication(&challenge()).is_none());
    }

    #[test]
    fn test_set_and_request() {
        let slot = AuthenticatorSlot::new();
        slot.set_default(Some(Arc::new(Fixed("alice")))).unwrap();
        let auth = slot.request_password_authentication(&challenge()).unwrap();
        assert_eq!(auth.username(), "alice");
    }

    #[test]
    fn test_sealed_slot_refuses_replacement() {
        let slot = AuthenticatorSlot::new();
        slot.set_default(Some(Arc::new(Fixed("alice")))).unwrap();
        slot.seal();
        let err = slot.set_default(Some(Arc::new(Fixed("mallory")))).unwrap_err();
        assert!(matches!(err, RivetError::AuthenticationUnavailable(_)));
        let auth = slot.request_password_authentication(&challenge()).unwrap();
        assert_eq!(auth.username(), "alice");
    }

    #[test]
    fn test_update_can_decline() {
        let slot = AuthenticatorSlot::new();
        slot.seal();
        // declining never trips the seal
        assert!(!slot.update(|_| None).unwrap());
    }
}
