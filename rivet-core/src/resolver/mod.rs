// rivet-core/src/resolver/mod.rs
//! The resolver capability and its composite and leaf implementations.

pub mod chain;
pub mod dual;
pub mod repository;

use std::fmt;
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use rivet_common::error::{Result, RivetError};
use rivet_common::model::{
    Artifact, DependencyDescriptor, DownloadOptions, DownloadReport, ModuleDescriptor,
    ModuleRevisionId,
};

use crate::context::ResolutionContext;

pub use chain::{ChainResolver, ChainResolverBuilder};
pub use dual::{DualResolver, DualResolverBuilder};
pub use repository::{RepositoryResolver, RepositoryResolverBuilder};

/// Anything that can locate module metadata and artifacts.
///
/// Composite resolvers implement the same trait as leaves, so callers never
/// need to know which kind they hold.
pub trait DependencyResolver: Send + Sync + fmt::Debug {
    /// Unique within one settings registry.
    fn name(&self) -> &str;

    /// `Ok(None)` means "not here"; errors are reserved for broken wiring,
    /// malformed descriptors and transport failures.
    fn resolve_dependency(
        &self,
        dependency: &DependencyDescriptor,
        context: &ResolutionContext,
    ) -> Result<Option<ResolvedModuleRevision>>;

    fn download_artifacts(
        &self,
        artifacts: &[Artifact],
        options: &DownloadOptions,
    ) -> Result<DownloadReport>;
}

pub type ResolverRef = Arc<dyn DependencyResolver>;

/// Identity, not equality: true when both are the same resolver instance.
pub fn same_resolver(a: &dyn DependencyResolver, b: &dyn DependencyResolver) -> bool {
    std::ptr::eq(
        a as *const dyn DependencyResolver as *const (),
        b as *const dyn DependencyResolver as *const (),
    )
}

/// Upgrades a resolver's handle on itself. Only fails while it is being dropped.
pub(crate) fn upgrade_self<R>(self_ref: &Weak<R>, name: &str) -> Result<ResolverRef>
where
    R: DependencyResolver + 'static,
{
    self_ref
        .upgrade()
        .map(|me| me as ResolverRef)
        .ok_or_else(|| RivetError::Config(format!("resolver '{name}' is no longer available")))
}

/// Outcome of a successful `resolve_dependency`.
#[derive(Clone)]
pub struct ResolvedModuleRevision {
    id: ModuleRevisionId,
    resolver: ResolverRef,
    artifact_resolver: ResolverRef,
    published: DateTime<Utc>,
    descriptor: Arc<ModuleDescriptor>,
}

impl ResolvedModuleRevision {
    /// `resolver` produced the metadata and, until overridden, also serves
    /// the artifacts.
    pub fn new(
        resolver: ResolverRef,
        descriptor: Arc<ModuleDescriptor>,
        published: DateTime<Utc>,
    ) -> Self {
        Self {
            id: descriptor.id.clone(),
            artifact_resolver: Arc::clone(&resolver),
            resolver,
            published,
            descriptor,
        }
    }

    pub fn with_artifact_resolver(mut self, artifact_resolver: ResolverRef) -> Self {
        self.artifact_resolver = artifact_resolver;
        self
    }

    pub fn id(&self) -> &ModuleRevisionId {
        &self.id
    }

    pub fn resolver(&self) -> &ResolverRef {
        &self.resolver
    }

    pub fn artifact_resolver(&self) -> &ResolverRef {
        &self.artifact_resolver
    }

    pub fn published(&self) -> DateTime<Utc> {
        self.published
    }

    pub fn descriptor(&self) -> &Arc<ModuleDescriptor> {
        &self.descriptor
    }
}

impl fmt::Debug for ResolvedModuleRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedModuleRevision")
            .field("id", &self.id)
            .field("resolver", &self.resolver.name())
            .field("artifact_resolver", &self.artifact_resolver.name())
            .field("published", &self.published)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for ResolvedModuleRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.id, self.resolver.name())
    }
}
