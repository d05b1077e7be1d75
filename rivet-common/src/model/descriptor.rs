// rivet-common/src/model/descriptor.rs
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::artifact::Artifact;
use super::dependency::DependencyDescriptor;
use super::module_id::ModuleRevisionId;
use crate::error::{Result, RivetError};

/// Publication timestamps are written as `yyyyMMddHHmmss`.
pub const PUBLICATION_DATE_FORMAT: &str = "%Y%m%d%H%M%S";

/// Parsed metadata of one module revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    pub id: ModuleRevisionId,
    pub status: Option<String>,
    pub publication: Option<DateTime<Utc>>,
    pub dependencies: Vec<DependencyDescriptor>,
    pub artifacts: Vec<Artifact>,
}

impl ModuleDescriptor {
    pub fn new(id: ModuleRevisionId) -> Self {
        Self {
            id,
            status: None,
            publication: None,
            dependencies: Vec::new(),
            artifacts: Vec::new(),
        }
    }

    pub fn parse_publication(raw: &str) -> Result<DateTime<Utc>> {
        NaiveDateTime::parse_from_str(raw.trim(), PUBLICATION_DATE_FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(|e| {
                RivetError::ParseError(
                    "publication date".to_string(),
                    format!("'{raw}' does not match {PUBLICATION_DATE_FORMAT}: {e}"),
                )
            })
    }

    /// Artifacts published by this module; an empty publication list means
    /// one jar named after the module.
    pub fn published_artifacts(&self) -> Vec<Artifact> {
        if self.artifacts.is_empty() {
            vec![Artifact::new(self.id.clone(), self.id.name.clone(), "jar", "jar")]
        } else {
            self.artifacts.clone()
        }
    }
}
