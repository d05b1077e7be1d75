// rivet-common/src/model/dependency.rs
use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::module_id::ModuleRevisionId;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct DependencyFlags: u8 {
        /// The requested revision wins over any conflicting one.
        const FORCE      = 0b00000001;
        /// The published content may change without a revision bump.
        const CHANGING   = 0b00000010;
        const TRANSITIVE = 0b00000100;
    }
}

impl Default for DependencyFlags {
    fn default() -> Self {
        Self::TRANSITIVE
    }
}

impl fmt::Display for DependencyFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A requested module revision plus its resolution flags.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyDescriptor {
    requested: ModuleRevisionId,
    #[serde(default)]
    flags: DependencyFlags,
}

impl DependencyDescriptor {
    pub fn new(requested: ModuleRevisionId, changing: bool) -> Self {
        let mut flags = DependencyFlags::default();
        flags.set(DependencyFlags::CHANGING, changing);
        Self { requested, flags }
    }

    pub fn new_with_flags(requested: ModuleRevisionId, flags: DependencyFlags) -> Self {
        Self { requested, flags }
    }

    pub fn requested(&self) -> &ModuleRevisionId {
        &self.requested
    }

    pub fn flags(&self) -> DependencyFlags {
        self.flags
    }

    pub fn is_changing(&self) -> bool {
        self.flags.contains(DependencyFlags::CHANGING)
    }

    pub fn is_forced(&self) -> bool {
        self.flags.contains(DependencyFlags::FORCE)
    }

    pub fn is_transitive(&self) -> bool {
        self.flags.contains(DependencyFlags::TRANSITIVE)
    }
}

impl fmt::Display for DependencyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.requested, self.flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags() {
        let dd = DependencyDescriptor::new(ModuleRevisionId::new("org", "mod", "rev"), true);
        assert!(dd.is_changing());
        assert!(dd.is_transitive());
        assert!(!dd.is_forced());

        let dd = DependencyDescriptor::new(ModuleRevisionId::new("org", "mod", "rev"), false);
        assert!(!dd.is_changing());
    }
}
