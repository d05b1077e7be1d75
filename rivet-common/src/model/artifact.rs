// rivet-common/src/model/artifact.rs
use std::fmt;

use serde::{Deserialize, Serialize};

use super::module_id::ModuleRevisionId;

/// A published file of a module revision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Artifact {
    pub module: ModuleRevisionId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub ext: String,
}

impl Artifact {
    pub fn new(
        module: ModuleRevisionId,
        name: impl Into<String>,
        kind: impl Into<String>,
        ext: impl Into<String>,
    ) -> Self {
        Self {
            module,
            name: name.into(),
            kind: kind.into(),
            ext: ext.into(),
        }
    }

    /// `name-revision.ext`, the file name used for downloads.
    pub fn file_name(&self) -> String {
        if self.ext.is_empty() {
            format!("{}-{}", self.name, self.module.revision)
        } else {
            format!("{}-{}.{}", self.name, self.module.revision, self.ext)
        }
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}.{}({})", self.module, self.name, self.ext, self.kind)
    }
}
