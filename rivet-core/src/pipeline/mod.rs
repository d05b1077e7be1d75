// rivet-core/src/pipeline/mod.rs
pub mod engine;

pub use engine::{default_workers, resolve_all, BatchResult, BatchSummary, ResolveOutcome};
