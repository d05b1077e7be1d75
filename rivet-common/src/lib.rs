// rivet-common/src/lib.rs
pub mod config;
pub mod credentials;
pub mod error;
pub mod model;

// Re-export key types
pub use config::{Config, ProxySettings};
pub use credentials::{CredentialEntry, CredentialStore, Credentials};
pub use error::{Result, RivetError};
pub use model::{
    Artifact, ArtifactDownloadReport, DependencyDescriptor, DependencyFlags, DownloadOptions,
    DownloadReport, DownloadStatus, ModuleDescriptor, ModuleId, ModuleRevisionId,
};
