// rivet-common/src/model/module_id.rs
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RivetError;

/// Organisation and module name, without a revision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleId {
    pub organisation: String,
    pub name: String,
}

impl ModuleId {
    pub fn new(organisation: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            organisation: organisation.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.organisation, self.name)
    }
}

/// (organisation, name, revision) coordinate. Equality is by field tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleRevisionId {
    pub organisation: String,
    pub name: String,
    pub revision: String,
}

impl ModuleRevisionId {
    pub fn new(
        organisation: impl Into<String>,
        name: impl Into<String>,
        revision: impl Into<String>,
    ) -> Self {
        Self {
            organisation: organisation.into(),
            name: name.into(),
            revision: revision.into(),
        }
    }

    pub fn module_id(&self) -> ModuleId {
        ModuleId::new(self.organisation.clone(), self.name.clone())
    }
}

impl fmt::Display for ModuleRevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{};{}", self.organisation, self.name, self.revision)
    }
}

/// Parses `org:name:rev`.
impl FromStr for ModuleRevisionId {
    type Err = RivetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').map(str::trim).collect();
        match parts.as_slice() {
            [org, name, rev] if !org.is_empty() && !name.is_empty() && !rev.is_empty() => {
                Ok(Self::new(*org, *name, *rev))
            }
            _ => Err(RivetError::ParseError(
                "module revision id".to_string(),
                format!("expected 'org:name:rev', got '{s}'"),
            )),
        }
    }
}
