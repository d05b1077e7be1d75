// rivet-core/src/context.rs
//! State shared by every resolver call under one top-level resolve.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use rivet_common::error::RivetError;
use rivet_common::model::{DependencyDescriptor, ModuleRevisionId};

use crate::resolver::ResolvedModuleRevision;
use crate::settings::ResolverSettings;

/// Observer notified as dependencies are resolved.
pub trait ResolveListener: Send + Sync + fmt::Debug {
    fn dependency_resolved(
        &self,
        _dependency: &DependencyDescriptor,
        _resolved: &ResolvedModuleRevision,
    ) {
    }

    fn dependency_not_found(&self, _dependency: &DependencyDescriptor) {}

    fn resolve_failed(&self, _dependency: &DependencyDescriptor, _error: &RivetError) {}
}

/// Context passed by reference to every resolver invocation.
///
/// Cloning is cheap and clones share the visited set, so a derived context
/// (another node, another validation mode) still belongs to the same resolve.
#[derive(Debug, Clone)]
pub struct ResolutionContext {
    settings: Arc<ResolverSettings>,
    current_node: Option<ModuleRevisionId>,
    visited: Arc<Mutex<HashSet<ModuleRevisionId>>>,
    listener: Option<Arc<dyn ResolveListener>>,
    validate: bool,
    date: DateTime<Utc>,
}

impl ResolutionContext {
    pub fn new(settings: Arc<ResolverSettings>) -> Self {
        let validate = settings.validate();
        Self {
            settings,
            current_node: None,
            visited: Arc::new(Mutex::new(HashSet::new())),
            listener: None,
            validate,
            date: Utc::now(),
        }
    }

    pub fn with_validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn ResolveListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn with_current_node(mut self, node: ModuleRevisionId) -> Self {
        self.current_node = Some(node);
        self
    }

    /// Timestamp used when a descriptor carries no publication date.
    pub fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.date = date;
        self
    }

    pub fn settings(&self) -> &Arc<ResolverSettings> {
        &self.settings
    }

    pub fn current_node(&self) -> Option<&ModuleRevisionId> {
        self.current_node.as_ref()
    }

    pub fn listener(&self) -> Option<&Arc<dyn ResolveListener>> {
        self.listener.as_ref()
    }

    pub fn is_validate(&self) -> bool {
        self.validate
    }

    pub fn date(&self) -> DateTime<Utc> {
        self.date
    }

    /// Marks `node` visited. Returns false if it already was.
    pub fn visit(&self, node: &ModuleRevisionId) -> bool {
        self.visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(node.clone())
    }

    pub fn is_visited(&self, node: &ModuleRevisionId) -> bool {
        self.visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(node)
    }

    pub(crate) fn notify_resolved(
        &self,
        dependency: &DependencyDescriptor,
        resolved: &ResolvedModuleRevision,
    ) {
        if let Some(listener) = &self.listener {
            listener.dependency_resolved(dependency, resolved);
        }
    }

    pub(crate) fn notify_not_found(&self, dependency: &DependencyDescriptor) {
        if let Some(listener) = &self.listener {
            listener.dependency_not_found(dependency);
        }
    }

    pub(crate) fn notify_failed(&self, dependency: &DependencyDescriptor, error: &RivetError) {
        if let Some(listener) = &self.listener {
            listener.resolve_failed(dependency, error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visited_set_is_shared_by_clones() {
        let context = ResolutionContext::new(Arc::new(ResolverSettings::default()));
        let node = ModuleRevisionId::new("org", "mod", "1.0");
        let derived = context
            .clone()
            .with_validate(false)
            .with_current_node(node.clone());

        assert!(context.visit(&node));
        assert!(!derived.visit(&node));
        assert!(derived.is_visited(&node));
        assert_eq!(derived.current_node(), Some(&node));
        assert!(context.current_node().is_none());
        assert!(context.is_validate());
        assert!(!derived.is_validate());
    }
}
