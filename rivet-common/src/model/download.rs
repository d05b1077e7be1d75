// rivet-common/src/model/download.rs
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::artifact::Artifact;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadOptions {
    /// Directory downloaded artifacts are written into.
    pub destination: PathBuf,
}

impl DownloadOptions {
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    Successful,
    /// No resolver location held the file.
    NoFile,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDownloadReport {
    pub artifact: Artifact,
    pub status: DownloadStatus,
    pub local_file: Option<PathBuf>,
    pub size: u64,
    /// Location the bytes came from, or the last one tried.
    pub origin: Option<String>,
    pub message: Option<String>,
}

impl ArtifactDownloadReport {
    pub fn new(artifact: Artifact) -> Self {
        Self {
            artifact,
            status: DownloadStatus::NoFile,
            local_file: None,
            size: 0,
            origin: None,
            message: None,
        }
    }

    pub fn is_successful(&self) -> bool {
        self.status == DownloadStatus::Successful
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadReport {
    reports: Vec<ArtifactDownloadReport>,
}

impl DownloadReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a report, replacing any earlier one for the same artifact.
    pub fn add_artifact_report(&mut self, report: ArtifactDownloadReport) {
        if let Some(existing) = self
            .reports
            .iter_mut()
            .find(|r| r.artifact == report.artifact)
        {
            *existing = report;
        } else {
            self.reports.push(report);
        }
    }

    pub fn artifact_report(&self, artifact: &Artifact) -> Option<&ArtifactDownloadReport> {
        self.reports.iter().find(|r| &r.artifact == artifact)
    }

    pub fn reports(&self) -> &[ArtifactDownloadReport] {
        &self.reports
    }

    pub fn has_failures(&self) -> bool {
        self.reports.iter().any(|r| !r.is_successful())
    }

    /// Artifacts whose report is missing or not successful.
    pub fn missing<'a>(&self, artifacts: &'a [Artifact]) -> Vec<&'a Artifact> {
        artifacts
            .iter()
            .filter(|a| !self.artifact_report(a).is_some_and(|r| r.is_successful()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModuleRevisionId;

    #[test]
    fn test_report_replacement_and_missing() {
        let mrid = ModuleRevisionId::new("org", "mod", "1.0");
        let jar = Artifact::new(mrid.clone(), "mod", "jar", "jar");
        let src = Artifact::new(mrid, "mod-sources", "source", "jar");

        let mut report = DownloadReport::new();
        report.add_artifact_report(ArtifactDownloadReport::new(jar.clone()));
        assert!(report.has_failures());

        let mut ok = ArtifactDownloadReport::new(jar.clone());
        ok.status = DownloadStatus::Successful;
        report.add_artifact_report(ok);
        assert_eq!(report.reports().len(), 1);
        assert!(!report.has_failures());

        let all = vec![jar, src.clone()];
        assert_eq!(report.missing(&all), vec![&src]);
    }
}
