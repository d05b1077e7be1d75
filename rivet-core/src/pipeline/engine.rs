// rivet-core/src/pipeline/engine.rs
use std::sync::Arc;

use rivet_common::error::{Result, RivetError};
use rivet_common::model::DependencyDescriptor;
use threadpool::ThreadPool;
use tracing::{debug, error, instrument};

use crate::context::ResolutionContext;
use crate::resolver::{ResolvedModuleRevision, ResolverRef};

pub type ResolveOutcome = Result<Option<ResolvedModuleRevision>>;

/// Counts of one batch, by outcome.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub resolved: usize,
    pub not_found: usize,
    pub failed: usize,
}

#[derive(Debug)]
pub struct BatchResult {
    /// One outcome per requested dependency, in request order.
    pub outcomes: Vec<(DependencyDescriptor, ResolveOutcome)>,
    pub summary: BatchSummary,
}

/// Worker count used when the caller does not pick one.
pub fn default_workers() -> usize {
    std::cmp::max(1, num_cpus::get_physical().saturating_sub(1)).min(6)
}

/// Resolves independent dependencies concurrently through `resolver`.
///
/// Every dependency is resolved, even ones already visited in `context`;
/// deduplication is up to the caller.
#[instrument(skip_all, name = "resolve_all", fields(resolver = %resolver.name()))]
pub fn resolve_all(
    resolver: &ResolverRef,
    dependencies: &[DependencyDescriptor],
    context: &ResolutionContext,
    workers: Option<usize>,
) -> BatchResult {
    let num_workers = workers.unwrap_or_else(default_workers).max(1);
    let pool = ThreadPool::new(num_workers);
    debug!(
        "Resolving {} dependencies with {} workers.",
        dependencies.len(),
        num_workers
    );

    let (result_tx, result_rx) = crossbeam_channel::unbounded();

    for (index, dependency) in dependencies.iter().cloned().enumerate() {
        let resolver = Arc::clone(resolver);
        let context = context.clone();
        let result_tx = result_tx.clone();

        pool.execute(move || {
            context.visit(dependency.requested());
            let outcome = resolver.resolve_dependency(&dependency, &context);
            match &outcome {
                Ok(Some(found)) => {
                    debug!("[{}] resolved as {}", dependency, found);
                    context.notify_resolved(&dependency, found);
                }
                Ok(None) => {
                    debug!("[{}] not found", dependency);
                    context.notify_not_found(&dependency);
                }
                Err(e) => {
                    error!("[{}] resolution failed: {}", dependency, e);
                    context.notify_failed(&dependency, e);
                }
            }
            let _ = result_tx.send((index, dependency, outcome));
        });
    }
    drop(result_tx);

    let mut slots: Vec<Option<(DependencyDescriptor, ResolveOutcome)>> =
        std::iter::repeat_with(|| None).take(dependencies.len()).collect();
    for (index, dependency, outcome) in result_rx {
        slots[index] = Some((dependency, outcome));
    }
    pool.join();

    let outcomes: Vec<_> = slots
        .into_iter()
        .zip(dependencies)
        .map(|(slot, dependency)| {
            // A panicking worker never reports back.
            slot.unwrap_or_else(|| {
                (
                    dependency.clone(),
                    Err(RivetError::Generic(format!(
                        "worker resolving {dependency} panicked"
                    ))),
                )
            })
        })
        .collect();

    let mut summary = BatchSummary::default();
    for (_, outcome) in &outcomes {
        match outcome {
            Ok(Some(_)) => summary.resolved += 1,
            Ok(None) => summary.not_found += 1,
            Err(_) => summary.failed += 1,
        }
    }
    debug!(
        "Batch finished: {} resolved, {} not found, {} failed.",
        summary.resolved, summary.not_found, summary.failed
    );
    BatchResult { outcomes, summary }
}
