// rivet-core/src/resolver/chain.rs
//! Ordered list of resolvers; the first one that finds a module wins.

use std::fmt;
use std::sync::{Arc, Weak};

use rivet_common::error::Result;
use rivet_common::model::{
    Artifact, ArtifactDownloadReport, DependencyDescriptor, DownloadOptions, DownloadReport,
};
use tracing::{debug, warn};

use super::{same_resolver, upgrade_self, DependencyResolver, ResolvedModuleRevision, ResolverRef};
use crate::context::ResolutionContext;

pub struct ChainResolver {
    name: String,
    resolvers: Vec<ResolverRef>,
    self_ref: Weak<ChainResolver>,
}

#[derive(Debug)]
pub struct ChainResolverBuilder {
    name: String,
    resolvers: Vec<ResolverRef>,
}

impl ChainResolverBuilder {
    pub fn add(mut self, resolver: ResolverRef) -> Self {
        self.resolvers.push(resolver);
        self
    }

    pub fn build(self) -> Arc<ChainResolver> {
        Arc::new_cyclic(|self_ref| ChainResolver {
            name: self.name,
            resolvers: self.resolvers,
            self_ref: self_ref.clone(),
        })
    }
}

impl ChainResolver {
    pub fn builder(name: impl Into<String>) -> ChainResolverBuilder {
        ChainResolverBuilder {
            name: name.into(),
            resolvers: Vec::new(),
        }
    }

    pub fn resolvers(&self) -> &[ResolverRef] {
        &self.resolvers
    }
}

impl DependencyResolver for ChainResolver {
    fn name(&self) -> &str {
        &self.name
    }

    fn resolve_dependency(
        &self,
        dependency: &DependencyDescriptor,
        context: &ResolutionContext,
    ) -> Result<Option<ResolvedModuleRevision>> {
        let mut failures = 0;
        let mut last_error = None;

        for member in &self.resolvers {
            match member.resolve_dependency(dependency, context) {
                Ok(Some(found)) => {
                    debug!("[{}] {} found by '{}'", self.name, dependency, member.name());
                    // Artifacts the member would serve itself go through the chain.
                    if same_resolver(found.artifact_resolver().as_ref(), member.as_ref()) {
                        let this = upgrade_self(&self.self_ref, &self.name)?;
                        return Ok(Some(found.with_artifact_resolver(this)));
                    }
                    return Ok(Some(found));
                }
                Ok(None) => {
                    debug!("[{}] '{}' has no {}", self.name, member.name(), dependency);
                }
                Err(e) => {
                    warn!(
                        "[{}] '{}' failed for {}: {}",
                        self.name,
                        member.name(),
                        dependency,
                        e
                    );
                    failures += 1;
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if failures == self.resolvers.len() => Err(e),
            _ => Ok(None),
        }
    }

    fn download_artifacts(
        &self,
        artifacts: &[Artifact],
        options: &DownloadOptions,
    ) -> Result<DownloadReport> {
        let mut report = DownloadReport::new();
        for member in &self.resolvers {
            let missing: Vec<Artifact> = report.missing(artifacts).into_iter().cloned().collect();
            if missing.is_empty() {
                break;
            }
            match member.download_artifacts(&missing, options) {
                Ok(partial) => {
                    for artifact_report in partial.reports() {
                        // Keep an earlier failure message unless this one is better.
                        let earlier_failed = report
                            .artifact_report(&artifact_report.artifact)
                            .is_some_and(|r| !r.is_successful());
                        if artifact_report.is_successful() || !earlier_failed {
                            report.add_artifact_report(artifact_report.clone());
                        }
                    }
                }
                Err(e) => warn!(
                    "[{}] '{}' could not download artifacts: {}",
                    self.name,
                    member.name(),
                    e
                ),
            }
        }

        for artifact in artifacts {
            if report.artifact_report(artifact).is_none() {
                report.add_artifact_report(ArtifactDownloadReport::new(artifact.clone()));
            }
        }
        Ok(report)
    }
}

impl fmt::Debug for ChainResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let members: Vec<&str> = self.resolvers.iter().map(|r| r.name()).collect();
        f.debug_struct("ChainResolver")
            .field("name", &self.name)
            .field("resolvers", &members)
            .finish()
    }
}
