// rivet-net/src/auth/mod.rs
pub mod bridge;
pub mod challenge;
pub mod classifier;
pub mod slot;

pub use bridge::{InstallOutcome, RivetAuthenticator};
pub use challenge::{
    parse_authenticate_header, AuthenticationChallenge, PasswordAuthentication, RequestorType,
};
pub use classifier::{
    ChallengeClassifier, ClassifierChain, ProxyHostClassifier, RequestorTypeClassifier,
};
pub use slot::{Authenticator, AuthenticatorSlot};
