// rivet-core/src/resolver/repository.rs
//! Leaf resolver reading descriptors and artifacts from pattern-addressed
//! locations (local directories or HTTP repositories).

use std::fmt;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use rivet_common::error::{Result, RivetError};
use rivet_common::model::{
    Artifact, ArtifactDownloadReport, DependencyDescriptor, DownloadOptions, DownloadReport,
    DownloadStatus, ModuleRevisionId,
};
use rivet_net::validation::validate_url;
use rivet_net::xml::XmlIngestor;
use tracing::{debug, error, warn};
use url::Url;

use super::{upgrade_self, DependencyResolver, ResolvedModuleRevision};
use crate::context::ResolutionContext;
use crate::descriptor::parse_descriptor;

const DESCRIPTOR_ARTIFACT: &str = "ivy";
const DESCRIPTOR_TYPE: &str = "ivy";
const DESCRIPTOR_EXT: &str = "xml";

pub struct RepositoryResolver {
    name: String,
    ingestor: XmlIngestor,
    descriptor_pattern: String,
    artifact_pattern: String,
    schema: Option<Url>,
    self_ref: Weak<RepositoryResolver>,
}

#[derive(Debug)]
pub struct RepositoryResolverBuilder {
    name: String,
    ingestor: XmlIngestor,
    descriptor_pattern: Option<String>,
    artifact_pattern: Option<String>,
    schema: Option<Url>,
}

impl RepositoryResolverBuilder {
    pub fn descriptor_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.descriptor_pattern = Some(pattern.into());
        self
    }

    pub fn artifact_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.artifact_pattern = Some(pattern.into());
        self
    }

    /// Schema descriptors are validated against when the context asks for it.
    pub fn schema(mut self, schema: Url) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn build(self) -> Result<Arc<RepositoryResolver>> {
        let artifact_pattern = self.artifact_pattern.ok_or_else(|| {
            RivetError::Config(format!(
                "repository resolver '{}' needs an artifact pattern",
                self.name
            ))
        })?;
        // Descriptors live next to the artifacts unless told otherwise.
        let descriptor_pattern = self
            .descriptor_pattern
            .unwrap_or_else(|| artifact_pattern.clone());

        Ok(Arc::new_cyclic(|self_ref| RepositoryResolver {
            name: self.name,
            ingestor: self.ingestor,
            descriptor_pattern,
            artifact_pattern,
            schema: self.schema,
            self_ref: self_ref.clone(),
        }))
    }
}

impl RepositoryResolver {
    pub fn builder(name: impl Into<String>, ingestor: XmlIngestor) -> RepositoryResolverBuilder {
        RepositoryResolverBuilder {
            name: name.into(),
            ingestor,
            descriptor_pattern: None,
            artifact_pattern: None,
            schema: None,
        }
    }

    pub fn descriptor_url(&self, module: &ModuleRevisionId) -> Result<Url> {
        let descriptor = Artifact::new(
            module.clone(),
            DESCRIPTOR_ARTIFACT,
            DESCRIPTOR_TYPE,
            DESCRIPTOR_EXT,
        );
        validate_url(&substitute(&self.descriptor_pattern, &descriptor))
    }

    pub fn artifact_url(&self, artifact: &Artifact) -> Result<Url> {
        validate_url(&substitute(&self.artifact_pattern, artifact))
    }

    fn download_one(&self, artifact: &Artifact, destination: &Path) -> ArtifactDownloadReport {
        let mut report = ArtifactDownloadReport::new(artifact.clone());
        let url = match self.artifact_url(artifact) {
            Ok(url) => url,
            Err(e) => {
                report.status = DownloadStatus::Failed;
                report.message = Some(e.to_string());
                return report;
            }
        };
        report.origin = Some(url.to_string());

        let final_path = destination.join(artifact.file_name());
        match self.fetch_to(&url, &final_path) {
            Ok(size) => {
                debug!("[{}] downloaded {} ({} bytes)", self.name, artifact, size);
                report.status = DownloadStatus::Successful;
                report.local_file = Some(final_path);
                report.size = size;
            }
            Err(RivetError::NotFound(_)) => {
                debug!("[{}] no {} at {}", self.name, artifact, url);
                report.message = Some(format!("not found at {url}"));
            }
            Err(e) => {
                error!("[{}] failed to download {}: {}", self.name, artifact, e);
                report.status = DownloadStatus::Failed;
                report.message = Some(e.to_string());
            }
        }
        report
    }

    /// Streams `url` into a hidden temporary file next to `final_path`, then
    /// renames it into place.
    fn fetch_to(&self, url: &Url, final_path: &Path) -> Result<u64> {
        let mut stream = self.ingestor.source().open_stream(url)?;

        let temp_path = temp_path_for(final_path);
        if temp_path.exists() {
            if let Err(e) = fs::remove_file(&temp_path) {
                warn!(
                    "Could not remove existing temporary file {}: {}",
                    temp_path.display(),
                    e
                );
            }
        }

        let written = File::create(&temp_path)
            .and_then(|mut file| io::copy(&mut stream, &mut file))
            .map_err(|e| {
                let _ = fs::remove_file(&temp_path);
                RivetError::IoError(format!(
                    "Failed to write {} to {}: {}",
                    url,
                    temp_path.display(),
                    e
                ))
            })?;

        fs::rename(&temp_path, final_path).map_err(|e| {
            RivetError::IoError(format!(
                "Failed to move temp file {} to {}: {}",
                temp_path.display(),
                final_path.display(),
                e
            ))
        })?;
        Ok(written)
    }
}

impl DependencyResolver for RepositoryResolver {
    fn name(&self) -> &str {
        &self.name
    }

    fn resolve_dependency(
        &self,
        dependency: &DependencyDescriptor,
        context: &ResolutionContext,
    ) -> Result<Option<ResolvedModuleRevision>> {
        let requested = dependency.requested();
        let url = self.descriptor_url(requested)?;
        let schema = self.schema.as_ref().filter(|_| context.is_validate());

        let descriptor = match parse_descriptor(&self.ingestor, &url, schema) {
            Ok(descriptor) => descriptor,
            Err(RivetError::NotFound(_)) => {
                debug!("[{}] no descriptor for {} at {}", self.name, requested, url);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        if &descriptor.id != requested {
            warn!(
                "[{}] descriptor at {} is for {}, not {}; ignoring it",
                self.name, url, descriptor.id, requested
            );
            return Ok(None);
        }

        let published = descriptor.publication.unwrap_or_else(|| context.date());
        let this = upgrade_self(&self.self_ref, &self.name)?;
        debug!("[{}] found {} at {}", self.name, requested, url);
        Ok(Some(ResolvedModuleRevision::new(
            this,
            Arc::new(descriptor),
            published,
        )))
    }

    fn download_artifacts(
        &self,
        artifacts: &[Artifact],
        options: &DownloadOptions,
    ) -> Result<DownloadReport> {
        fs::create_dir_all(&options.destination).map_err(|e| {
            RivetError::IoError(format!(
                "Failed to create {}: {}",
                options.destination.display(),
                e
            ))
        })?;

        let mut report = DownloadReport::new();
        for artifact in artifacts {
            report.add_artifact_report(self.download_one(artifact, &options.destination));
        }
        Ok(report)
    }
}

impl fmt::Debug for RepositoryResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryResolver")
            .field("name", &self.name)
            .field("descriptor_pattern", &self.descriptor_pattern)
            .field("artifact_pattern", &self.artifact_pattern)
            .field("schema", &self.schema.as_ref().map(Url::as_str))
            .finish()
    }
}

/// Replaces the `[token]` placeholders of an Ivy-style pattern.
/// Unknown tokens are left as they are.
pub fn substitute(pattern: &str, artifact: &Artifact) -> String {
    let module = &artifact.module;
    let mut out = String::with_capacity(pattern.len());
    let mut rest = pattern;
    while let Some(open) = rest.find('[') {
        out.push_str(&rest[..open]);
        let Some(close) = rest[open..].find(']') else {
            rest = &rest[open..];
            break;
        };
        let token = &rest[open + 1..open + close];
        let value = match token {
            "organisation" | "organization" => Some(module.organisation.as_str()),
            "module" => Some(module.name.as_str()),
            "revision" => Some(module.revision.as_str()),
            "artifact" => Some(artifact.name.as_str()),
            "type" => Some(artifact.kind.as_str()),
            "ext" => Some(artifact.ext.as_str()),
            _ => None,
        };
        match value {
            Some(value) => out.push_str(value),
            None => out.push_str(&rest[open..=open + close]),
        }
        rest = &rest[open + close + 1..];
    }
    out.push_str(rest);
    out
}

fn temp_path_for(final_path: &Path) -> PathBuf {
    let temp_filename = format!(
        ".{}.download",
        final_path.file_name().unwrap_or_default().to_string_lossy()
    );
    final_path.with_file_name(temp_filename)
}
