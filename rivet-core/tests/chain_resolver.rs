// rivet-core/tests/chain_resolver.rs

//! First-found-wins chains and artifact fallback across members.

mod common;

use std::sync::Arc;

use common::{context, dependency, init_tracing, MockResolver};
use rivet_common::error::RivetError;
use rivet_common::model::{Artifact, DownloadOptions, DownloadStatus, ModuleRevisionId};
use rivet_core::resolver::{
    same_resolver, ChainResolver, DependencyResolver, DualResolver, ResolverRef,
};

fn chain(members: &[&Arc<MockResolver>]) -> Arc<ChainResolver> {
    members
        .iter()
        .fold(ChainResolver::builder("chain"), |builder, member| {
            builder.add(Arc::clone(*member) as ResolverRef)
        })
        .build()
}

#[test]
fn first_member_that_finds_wins() {
    init_tracing();
    let first = MockResolver::new("first", false);
    let second = MockResolver::new("second", true);
    let third = MockResolver::new("third", true);
    let chain = chain(&[&first, &second, &third]);
    let dd = dependency("org", "mod", "rev");

    let found = chain.resolve_dependency(&dd, &context()).unwrap().unwrap();

    assert!(same_resolver(found.resolver().as_ref(), second.as_ref()));
    assert!(same_resolver(found.artifact_resolver().as_ref(), chain.as_ref()));
    assert_eq!(first.asked(), vec![dd.clone()]);
    assert_eq!(second.asked(), vec![dd]);
    assert!(third.asked().is_empty());
}

#[test]
fn nobody_finds_means_not_found() {
    let a = MockResolver::new("a", false);
    let b = MockResolver::new("b", false);

    let result = chain(&[&a, &b])
        .resolve_dependency(&dependency("org", "mod", "rev"), &context())
        .unwrap();

    assert!(result.is_none());
    assert_eq!(a.asked().len(), 1);
    assert_eq!(b.asked().len(), 1);
}

#[test]
fn empty_chain_finds_nothing() {
    let empty = ChainResolver::builder("empty").build();
    assert!(empty
        .resolve_dependency(&dependency("org", "mod", "rev"), &context())
        .unwrap()
        .is_none());
}

#[test]
fn failing_member_is_skipped() {
    let broken = MockResolver::failing("broken");
    let healthy = MockResolver::new("healthy", true);

    let found = chain(&[&broken, &healthy])
        .resolve_dependency(&dependency("org", "mod", "rev"), &context())
        .unwrap()
        .unwrap();

    assert_eq!(found.resolver().name(), "healthy");
}

#[test]
fn error_is_returned_only_when_every_member_fails() {
    let down = MockResolver::failing("down");
    let absent = MockResolver::new("absent", false);
    let dd = dependency("org", "mod", "rev");

    assert!(chain(&[&down, &absent])
        .resolve_dependency(&dd, &context())
        .unwrap()
        .is_none());

    let also_down = MockResolver::failing("also-down");
    assert!(matches!(
        chain(&[&down, &also_down]).resolve_dependency(&dd, &context()),
        Err(RivetError::HttpError(message)) if message.contains("also-down")
    ));
}

#[test]
fn explicit_artifact_resolver_is_kept() {
    let ivy = MockResolver::new("ivy", true);
    let artifact = MockResolver::new("artifact", true);
    let dual = DualResolver::builder("dual")
        .metadata_resolver(ivy as ResolverRef)
        .artifact_resolver(artifact as ResolverRef)
        .build();
    let chain = ChainResolver::builder("chain")
        .add(dual.clone() as ResolverRef)
        .build();

    let found = chain
        .resolve_dependency(&dependency("org", "mod", "rev"), &context())
        .unwrap()
        .unwrap();

    // The dual resolver picked itself; the chain does not take over.
    assert!(same_resolver(found.artifact_resolver().as_ref(), dual.as_ref()));
}

#[test]
fn downloads_fall_through_members_for_missing_artifacts() {
    let module = ModuleRevisionId::new("org", "mod", "rev");
    let jar = Artifact::new(module.clone(), "mod", "jar", "jar");
    let sources = Artifact::new(module.clone(), "mod-sources", "source", "jar");
    let docs = Artifact::new(module, "mod-javadoc", "javadoc", "jar");
    let first = MockResolver::serving("first", true, &["mod"]);
    let second = MockResolver::serving("second", true, &["mod-sources"]);
    let broken = MockResolver::failing("broken");
    let artifacts = vec![jar.clone(), sources.clone(), docs.clone()];

    let report = chain(&[&first, &broken, &second])
        .download_artifacts(&artifacts, &DownloadOptions::new("/tmp/unused"))
        .unwrap();

    assert_eq!(first.download_requests(), vec![artifacts.clone()]);
    assert_eq!(
        second.download_requests(),
        vec![vec![sources.clone(), docs.clone()]]
    );
    let jar_report = report.artifact_report(&jar).unwrap();
    assert_eq!(jar_report.origin.as_deref(), Some("first"));
    assert!(report.artifact_report(&sources).unwrap().is_successful());
    assert_eq!(
        report.artifact_report(&docs).unwrap().status,
        DownloadStatus::NoFile
    );
    assert!(report.has_failures());
    assert_eq!(report.reports().len(), 3);
}
