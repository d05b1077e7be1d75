// rivet-core/tests/pipeline.rs

//! Concurrent batch resolution.

mod common;

use std::sync::Arc;

use common::{context, dependency, init_tracing, MockResolver, RecordingListener};
use rivet_common::model::ModuleRevisionId;
use rivet_core::pipeline::{default_workers, resolve_all, BatchSummary};
use rivet_core::resolver::{ChainResolver, DependencyResolver, ResolverRef};

#[test]
fn results_come_back_in_request_order() {
    init_tracing();
    let resolver: ResolverRef = MockResolver::new("repo", true);
    let deps: Vec<_> = (0..20)
        .map(|i| dependency("org", &format!("mod{i}"), "1.0"))
        .collect();

    let batch = resolve_all(&resolver, &deps, &context(), Some(4));

    assert_eq!(batch.outcomes.len(), deps.len());
    for ((requested, outcome), expected) in batch.outcomes.iter().zip(&deps) {
        assert_eq!(requested, expected);
        let found = outcome.as_ref().unwrap().as_ref().unwrap();
        assert_eq!(found.id(), expected.requested());
    }
    assert_eq!(
        batch.summary,
        BatchSummary {
            resolved: 20,
            not_found: 0,
            failed: 0
        }
    );
}

#[test]
fn listener_and_visited_set_see_every_dependency() {
    let absent = MockResolver::new("absent", false);
    let present = MockResolver::new("present", true);
    let broken = MockResolver::failing("broken");
    let listener = Arc::new(RecordingListener::default());
    let ctx = context().with_listener(listener.clone());

    let chain: ResolverRef = ChainResolver::builder("chain")
        .add(absent.clone() as ResolverRef)
        .add(present as ResolverRef)
        .build();
    let found = dependency("org", "found", "1.0");
    let batch = resolve_all(&chain, std::slice::from_ref(&found), &ctx, None);
    assert_eq!(batch.summary.resolved, 1);

    let missing = dependency("org", "missing", "1.0");
    let broken: ResolverRef = broken;
    let failing = resolve_all(&broken, std::slice::from_ref(&missing), &ctx, Some(1));
    assert_eq!(failing.summary.failed, 1);
    assert!(failing.outcomes[0].1.is_err());

    let absent_ref: ResolverRef = absent;
    let not_found = resolve_all(&absent_ref, std::slice::from_ref(&missing), &ctx, Some(1));
    assert_eq!(not_found.summary.not_found, 1);

    assert_eq!(*listener.resolved.lock().unwrap(), vec!["org#found;1.0"]);
    assert_eq!(*listener.failed.lock().unwrap(), vec!["org#missing;1.0"]);
    assert_eq!(*listener.not_found.lock().unwrap(), vec!["org#missing;1.0"]);
    assert!(ctx.is_visited(&ModuleRevisionId::new("org", "found", "1.0")));
    assert!(ctx.is_visited(&ModuleRevisionId::new("org", "missing", "1.0")));
    assert_eq!(chain.name(), "chain");
}

#[test]
fn empty_batch_is_fine() {
    let resolver: ResolverRef = MockResolver::new("repo", true);
    let batch = resolve_all(&resolver, &[], &context(), None);
    assert!(batch.outcomes.is_empty());
    assert_eq!(batch.summary, BatchSummary::default());
    assert!((1..=6).contains(&default_workers()));
}
