// rivet-common/src/model/mod.rs
// Declares the modules within the model directory.

pub mod artifact;
pub mod dependency;
pub mod descriptor;
pub mod download;
pub mod module_id;

// Re-export
pub use artifact::Artifact;
pub use dependency::{DependencyDescriptor, DependencyFlags};
pub use descriptor::ModuleDescriptor;
pub use download::{ArtifactDownloadReport, DownloadOptions, DownloadReport, DownloadStatus};
pub use module_id::{ModuleId, ModuleRevisionId};
