// rivet-core/src/lib.rs
//! Resolution core: the resolver capability, its dual / chain / repository
//! implementations, the module-descriptor parser, and the settings that
//! wire named resolvers together.

pub mod context;
pub mod descriptor;
pub mod pipeline;
pub mod resolver;
pub mod settings;

pub use context::{ResolutionContext, ResolveListener};
pub use descriptor::{parse_descriptor, ModuleDescriptorParser};
pub use pipeline::{resolve_all, BatchResult, BatchSummary};
pub use resolver::{
    same_resolver, ChainResolver, DependencyResolver, DualResolver, RepositoryResolver,
    ResolvedModuleRevision, ResolverRef,
};
pub use settings::{ResolverDefinition, ResolverSettings, SettingsFile};
