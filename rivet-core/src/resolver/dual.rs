// rivet-core/src/resolver/dual.rs
//! Splits metadata lookup and artifact lookup across two resolvers.

use std::fmt;
use std::sync::{Arc, Weak};

use rivet_common::error::{Result, RivetError};
use rivet_common::model::{Artifact, DependencyDescriptor, DownloadOptions, DownloadReport};
use tracing::{debug, warn};

use super::{upgrade_self, DependencyResolver, ResolvedModuleRevision, ResolverRef};
use crate::context::ResolutionContext;

pub struct DualResolver {
    name: String,
    metadata: Option<ResolverRef>,
    artifact: Option<ResolverRef>,
    self_ref: Weak<DualResolver>,
}

#[derive(Debug)]
pub struct DualResolverBuilder {
    name: String,
    metadata: Option<ResolverRef>,
    artifact: Option<ResolverRef>,
}

impl DualResolverBuilder {
    pub fn metadata_resolver(mut self, resolver: ResolverRef) -> Self {
        self.metadata = Some(resolver);
        self
    }

    pub fn artifact_resolver(mut self, resolver: ResolverRef) -> Self {
        self.artifact = Some(resolver);
        self
    }

    /// Builds without checking the wiring; a missing metadata resolver
    /// surfaces on the first resolve.
    pub fn build(self) -> Arc<DualResolver> {
        Arc::new_cyclic(|self_ref| DualResolver {
            name: self.name,
            metadata: self.metadata,
            artifact: self.artifact,
            self_ref: self_ref.clone(),
        })
    }

    /// Builds, rejecting a resolver without a metadata resolver.
    pub fn try_build(self) -> Result<Arc<DualResolver>> {
        if self.metadata.is_none() {
            return Err(RivetError::Config(format!(
                "dual resolver '{}' needs a metadata resolver",
                self.name
            )));
        }
        Ok(self.build())
    }
}

impl DualResolver {
    pub fn builder(name: impl Into<String>) -> DualResolverBuilder {
        DualResolverBuilder {
            name: name.into(),
            metadata: None,
            artifact: None,
        }
    }

    pub fn metadata_resolver(&self) -> Option<&ResolverRef> {
        self.metadata.as_ref()
    }

    pub fn artifact_resolver(&self) -> Option<&ResolverRef> {
        self.artifact.as_ref()
    }

    fn require_metadata(&self) -> Result<&ResolverRef> {
        self.metadata.as_ref().ok_or_else(|| {
            RivetError::Config(format!(
                "dual resolver '{}' has no metadata resolver set",
                self.name
            ))
        })
    }
}

impl DependencyResolver for DualResolver {
    fn name(&self) -> &str {
        &self.name
    }

    fn resolve_dependency(
        &self,
        dependency: &DependencyDescriptor,
        context: &ResolutionContext,
    ) -> Result<Option<ResolvedModuleRevision>> {
        let metadata = self.require_metadata()?;
        let Some(found) = metadata.resolve_dependency(dependency, context)? else {
            debug!(
                "[{}] metadata resolver '{}' has no {}",
                self.name,
                metadata.name(),
                dependency
            );
            return Ok(None);
        };

        let Some(artifact) = &self.artifact else {
            return Ok(Some(found));
        };
        match artifact.resolve_dependency(dependency, context) {
            Ok(Some(_)) => {
                debug!(
                    "[{}] {} found by '{}' and '{}', artifacts go through the dual resolver",
                    self.name,
                    dependency,
                    metadata.name(),
                    artifact.name()
                );
                let this = upgrade_self(&self.self_ref, &self.name)?;
                Ok(Some(found.with_artifact_resolver(this)))
            }
            Ok(None) => {
                debug!(
                    "[{}] artifact resolver '{}' has no {}, keeping '{}'",
                    self.name,
                    artifact.name(),
                    dependency,
                    found.artifact_resolver().name()
                );
                Ok(Some(found))
            }
            Err(e) => {
                warn!(
                    "[{}] artifact resolver '{}' failed for {}: {}",
                    self.name,
                    artifact.name(),
                    dependency,
                    e
                );
                Ok(Some(found))
            }
        }
    }

    fn download_artifacts(
        &self,
        artifacts: &[Artifact],
        options: &DownloadOptions,
    ) -> Result<DownloadReport> {
        let artifact = self.artifact.as_ref().ok_or_else(|| {
            RivetError::Config(format!(
                "dual resolver '{}' has no artifact resolver set",
                self.name
            ))
        })?;
        artifact.download_artifacts(artifacts, options)
    }
}

impl fmt::Debug for DualResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DualResolver")
            .field("name", &self.name)
            .field("metadata", &self.metadata.as_ref().map(|r| r.name()))
            .field("artifact", &self.artifact.as_ref().map(|r| r.name()))
            .finish()
    }
}
