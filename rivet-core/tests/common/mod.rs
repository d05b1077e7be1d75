// rivet-core/tests/common/mod.rs

//! Shared doubles and fixtures for the rivet-core integration tests.
#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, Once, Weak};

use chrono::{DateTime, TimeZone, Utc};
use rivet_common::config::Config;
use rivet_common::error::{Result, RivetError};
use rivet_common::model::{
    Artifact, ArtifactDownloadReport, DependencyDescriptor, DownloadOptions, DownloadReport,
    DownloadStatus, ModuleDescriptor, ModuleRevisionId,
};
use rivet_core::context::{ResolutionContext, ResolveListener};
use rivet_core::resolver::{DependencyResolver, ResolvedModuleRevision};
use rivet_core::settings::ResolverSettings;
use rivet_net::http::UrlHandler;
use rivet_net::xml::XmlIngestor;
use tracing_subscriber::EnvFilter;
use url::Url;

static TRACING: Once = Once::new();

/// Routes `tracing` output through the test harness; `RUST_LOG` picks the level.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn publication_date() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2005, 2, 20, 0, 0, 0).unwrap()
}

pub fn dependency(org: &str, name: &str, rev: &str) -> DependencyDescriptor {
    DependencyDescriptor::new(ModuleRevisionId::new(org, name, rev), false)
}

pub fn context() -> ResolutionContext {
    ResolutionContext::new(Arc::new(ResolverSettings::default()))
}

/// Ingestor over the real URL handler, for `file:` fixtures.
pub fn file_ingestor() -> XmlIngestor {
    let config = Config::from_lookup(|_| None).unwrap();
    XmlIngestor::new(Arc::new(UrlHandler::new(&config).unwrap()))
}

pub fn dir_url(dir: &Path) -> String {
    Url::from_directory_path(dir).unwrap().to_string()
}

pub fn write_file(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Resolver double: answers found / not-found / error, records every
/// dependency it is asked for and serves the artifact names it is told to.
#[derive(Debug)]
pub struct MockResolver {
    name: String,
    found: bool,
    failing: bool,
    serves: Vec<String>,
    pub asked: Mutex<Vec<DependencyDescriptor>>,
    pub download_requests: Mutex<Vec<Vec<Artifact>>>,
    self_ref: Weak<MockResolver>,
}

impl MockResolver {
    pub fn new(name: &str, found: bool) -> Arc<Self> {
        Self::build(name, found, false, &[])
    }

    pub fn failing(name: &str) -> Arc<Self> {
        Self::build(name, false, true, &[])
    }

    pub fn serving(name: &str, found: bool, artifacts: &[&str]) -> Arc<Self> {
        Self::build(name, found, false, artifacts)
    }

    fn build(name: &str, found: bool, failing: bool, serves: &[&str]) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            name: name.to_string(),
            found,
            failing,
            serves: serves.iter().map(|s| s.to_string()).collect(),
            asked: Mutex::new(Vec::new()),
            download_requests: Mutex::new(Vec::new()),
            self_ref: self_ref.clone(),
        })
    }

    pub fn asked(&self) -> Vec<DependencyDescriptor> {
        self.asked.lock().unwrap().clone()
    }

    pub fn download_requests(&self) -> Vec<Vec<Artifact>> {
        self.download_requests.lock().unwrap().clone()
    }
}

impl DependencyResolver for MockResolver {
    fn name(&self) -> &str {
        &self.name
    }

    fn resolve_dependency(
        &self,
        dependency: &DependencyDescriptor,
        _context: &ResolutionContext,
    ) -> Result<Option<ResolvedModuleRevision>> {
        self.asked.lock().unwrap().push(dependency.clone());
        if self.failing {
            return Err(RivetError::HttpError(format!("{} is down", self.name)));
        }
        if !self.found {
            return Ok(None);
        }
        let me = self.self_ref.upgrade().unwrap();
        let descriptor = ModuleDescriptor::new(dependency.requested().clone());
        Ok(Some(ResolvedModuleRevision::new(
            me,
            Arc::new(descriptor),
            publication_date(),
        )))
    }

    fn download_artifacts(
        &self,
        artifacts: &[Artifact],
        options: &DownloadOptions,
    ) -> Result<DownloadReport> {
        self.download_requests.lock().unwrap().push(artifacts.to_vec());
        if self.failing {
            return Err(RivetError::HttpError(format!("{} is down", self.name)));
        }
        let mut report = DownloadReport::new();
        for artifact in artifacts {
            let mut entry = ArtifactDownloadReport::new(artifact.clone());
            entry.origin = Some(self.name.clone());
            if self.serves.contains(&artifact.name) {
                entry.status = DownloadStatus::Successful;
                entry.local_file = Some(options.destination.join(artifact.file_name()));
            }
            report.add_artifact_report(entry);
        }
        Ok(report)
    }
}

/// Listener recording what the batch pipeline reports.
#[derive(Debug, Default)]
pub struct RecordingListener {
    pub resolved: Mutex<Vec<String>>,
    pub not_found: Mutex<Vec<String>>,
    pub failed: Mutex<Vec<String>>,
}

impl ResolveListener for RecordingListener {
    fn dependency_resolved(
        &self,
        dependency: &DependencyDescriptor,
        _resolved: &ResolvedModuleRevision,
    ) {
        self.resolved
            .lock()
            .unwrap()
            .push(dependency.requested().to_string());
    }

    fn dependency_not_found(&self, dependency: &DependencyDescriptor) {
        self.not_found
            .lock()
            .unwrap()
            .push(dependency.requested().to_string());
    }

    fn resolve_failed(&self, dependency: &DependencyDescriptor, _error: &RivetError) {
        self.failed
            .lock()
            .unwrap()
            .push(dependency.requested().to_string());
    }
}

pub const DESCRIPTOR_SCHEMA: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="ivy-module">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="info">
          <xs:complexType>
            <xs:attribute name="organisation" use="required"/>
            <xs:attribute name="module" use="required"/>
            <xs:attribute name="revision"/>
            <xs:attribute name="status"/>
            <xs:attribute name="publication"/>
          </xs:complexType>
        </xs:element>
        <xs:element name="publications" minOccurs="0">
          <xs:complexType>
            <xs:sequence>
              <xs:element name="artifact" minOccurs="0" maxOccurs="unbounded">
                <xs:complexType>
                  <xs:attribute name="name"/>
                  <xs:attribute name="type"/>
                  <xs:attribute name="ext"/>
                </xs:complexType>
              </xs:element>
            </xs:sequence>
          </xs:complexType>
        </xs:element>
        <xs:element name="dependencies" minOccurs="0">
          <xs:complexType>
            <xs:sequence>
              <xs:element name="dependency" minOccurs="0" maxOccurs="unbounded">
                <xs:complexType>
                  <xs:attribute name="org"/>
                  <xs:attribute name="name" use="required"/>
                  <xs:attribute name="rev" use="required"/>
                  <xs:attribute name="changing"/>
                </xs:complexType>
              </xs:element>
            </xs:sequence>
          </xs:complexType>
        </xs:element>
      </xs:sequence>
      <xs:attribute name="version"/>
    </xs:complexType>
  </xs:element>
</xs:schema>"#;

pub fn module_descriptor(org: &str, name: &str, rev: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ivy-module version="2.0">
  <info organisation="{org}" module="{name}" revision="{rev}" status="release"
        publication="20050220000000"/>
  <publications>
    <artifact name="{name}" type="jar" ext="jar"/>
  </publications>
  <dependencies>
    <dependency org="other" name="lib" rev="2.1"/>
  </dependencies>
</ivy-module>"#
    )
}
