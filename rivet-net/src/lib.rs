// rivet-net/src/lib.rs
//! Network-facing half of rivet: opening descriptor sources, answering
//! authentication challenges, and ingesting XML descriptors.

pub mod auth;
pub mod http;
pub mod validation;
pub mod xml;

pub use auth::{
    AuthenticationChallenge, Authenticator, AuthenticatorSlot, InstallOutcome,
    PasswordAuthentication, RequestorType, RivetAuthenticator,
};
pub use http::{DescriptorSource, UrlHandler};
pub use rivet_common::error::{Result, RivetError};
pub use validation::validate_url;
pub use xml::{
    Attributes, ContentHandler, EngineError, LexicalHandler, ParserEngine, QuickXmlEngine,
    Severity, ValidationCapability, ValidationProblem, XmlIngestor, XmlParser,
};
