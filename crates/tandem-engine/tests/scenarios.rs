//! End-to-end upgrade runs against an in-memory workspace and registry

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tandem_engine::{
    AdvisoryKind, Approval, Classification, EngineOptions, Error, PlanOptions, Report, SelectAll,
    Selection, Selector, Session, UpgradeEngine, UpgradePlan, UpgradeRequest,
};
use tandem_fs::MemoryFileSystem;
use tandem_registry::{MemoryRegistry, RegistryKind, SimulatedFailure};
use tokio_util::sync::CancellationToken;

const ROOT: &str = r#"{
  "name": "root",
  "private": true
}
"#;

const P1: &str = r#"{
  "name": "p1",
  "dependencies": {
    "lodash": "4.17.15"
  }
}
"#;

const P2: &str = r#"{
  "name": "p2",
  "dependencies": {
    "lodash": "^4.17.0",
    "react": "^17.0.2"
  }
}
"#;

fn p1() -> PathBuf {
    PathBuf::from("/w/packages/p1/package.json")
}

fn p2() -> PathBuf {
    PathBuf::from("/w/packages/p2/package.json")
}

fn workspace() -> MemoryFileSystem {
    let fs = MemoryFileSystem::empty("/w").unwrap();
    fs.add_file("package.json", ROOT).unwrap();
    fs.add_file("packages/p1/package.json", P1).unwrap();
    fs.add_file("packages/p2/package.json", P2).unwrap();
    fs
}

fn registry() -> MemoryRegistry {
    MemoryRegistry::new(RegistryKind::Npm)
        .with_package("lodash", ["4.17.0", "4.17.15", "4.17.21"])
        .with_package("react", ["17.0.2", "18.2.0"])
}

fn engine(
    fs: &MemoryFileSystem,
    registry: &MemoryRegistry,
    options: EngineOptions,
) -> UpgradeEngine<MemoryFileSystem> {
    UpgradeEngine::new(Arc::new(fs.clone()), options).with_registry(Arc::new(registry.clone()))
}

async fn plan_for(
    engine: &UpgradeEngine<MemoryFileSystem>,
    names: &[&str],
    options: &PlanOptions,
) -> (Session, UpgradePlan) {
    let cancel = CancellationToken::new();
    let session = engine.open(Path::new("/w")).await.unwrap();
    let candidates = engine
        .prepare_upgrade(&session, &UpgradeRequest::named(names.iter().copied()), &cancel)
        .await
        .unwrap();
    let selection = SelectAll.select(&candidates, &candidates.advisories);
    let plan = engine.plan_upgrade(&session, &candidates, &selection, options);
    (session, plan)
}

#[tokio::test]
async fn test_pinned_declaration_is_skipped_without_override() {
    let fs = workspace();
    let engine = engine(&fs, &registry(), EngineOptions::default());
    let cancel = CancellationToken::new();

    let session = engine.open(Path::new("/w")).await.unwrap();
    assert_eq!(session.workspace().len(), 3);

    let candidates = engine
        .prepare_upgrade(&session, &UpgradeRequest::named(["lodash"]), &cancel)
        .await
        .unwrap();
    let lodash = candidates.get("lodash").unwrap();
    assert_eq!(lodash.analysis.target.to_string(), "4.17.21");
    assert_eq!(lodash.classification(), Classification::DivergentIncompatible);

    let selection = SelectAll.select(&candidates, &candidates.advisories);
    let plan = engine.plan_upgrade(&session, &candidates, &selection, &PlanOptions::default());

    assert_eq!(plan.edits().len(), 1);
    assert_eq!(plan.edits()[0].path, p2());
    assert_eq!(plan.edits()[0].new_range.as_deref(), Some("^4.17.21"));
    assert!(!plan.edits()[0].overrides_pin);

    assert_eq!(plan.skipped().len(), 1);
    assert_eq!(plan.skipped()[0].path, p1());
    assert_eq!(plan.skipped()[0].reason, AdvisoryKind::PinnedVersion);
    assert!(plan
        .advisories()
        .iter()
        .any(|a| a.kind == AdvisoryKind::PinnedVersion && a.path.as_deref() == Some(p1().as_path())));

    engine.apply(&session, &plan, &cancel, false).await.unwrap();
    assert_eq!(fs.contents(p1()).as_deref(), Some(P1));
    assert_eq!(
        fs.contents(p2()).as_deref(),
        Some(P2.replace("\"^4.17.0\"", "\"^4.17.21\"").as_str())
    );
}

#[tokio::test]
async fn test_override_rewrites_pin() {
    let fs = workspace();
    let engine = engine(&fs, &registry(), EngineOptions::default());
    let options = PlanOptions {
        override_pinned: Approval::dependencies(["lodash"]),
        ..PlanOptions::default()
    };

    let (session, plan) = plan_for(&engine, &["lodash"], &options).await;
    let ranges: Vec<_> = plan
        .edits()
        .iter()
        .map(|e| (e.path.clone(), e.new_range.clone().unwrap(), e.overrides_pin))
        .collect();
    assert_eq!(
        ranges,
        vec![
            (p1(), "4.17.21".to_string(), true),
            (p2(), "^4.17.21".to_string(), false),
        ]
    );
    assert!(plan.skipped().is_empty());

    engine
        .apply(&session, &plan, &CancellationToken::new(), false)
        .await
        .unwrap();
    assert!(fs.contents(p1()).unwrap().contains("\"lodash\": \"4.17.21\""));
}

#[tokio::test]
async fn test_configured_pinned_override() {
    let fs = workspace();
    let options = EngineOptions {
        pinned_override: ["lodash".to_string()].into_iter().collect(),
        ..EngineOptions::default()
    };
    let engine = engine(&fs, &registry(), options);

    let (_, plan) = plan_for(&engine, &["lodash"], &PlanOptions::default()).await;
    assert_eq!(plan.edits().len(), 2);
    assert!(plan.verify().is_ok());
}

#[tokio::test]
async fn test_reapplying_yields_no_edits() {
    let fs = workspace();
    let engine = engine(&fs, &registry(), EngineOptions::default());
    let options = PlanOptions {
        override_pinned: Approval::All,
        ..PlanOptions::default()
    };

    let (session, plan) = plan_for(&engine, &["lodash"], &options).await;
    assert_eq!(plan.edits().len(), 2);
    engine
        .apply(&session, &plan, &CancellationToken::new(), false)
        .await
        .unwrap();

    let (session, plan) = plan_for(&engine, &["lodash"], &options).await;
    assert!(plan.is_empty());
    let candidates = engine
        .prepare_upgrade(
            &session,
            &UpgradeRequest::named(["lodash"]),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(
        candidates.get("lodash").unwrap().classification(),
        Classification::Uniform
    );
}

#[tokio::test]
async fn test_lockfile_reminder_and_lockfile_untouched() {
    let fs = workspace();
    let lockfile = "lockfileVersion: '6.0'\n\npackages:\n  /lodash@4.17.15: {}\n";
    fs.add_file("pnpm-lock.yaml", lockfile).unwrap();
    let engine = engine(&fs, &registry(), EngineOptions::default());

    let (session, plan) = plan_for(&engine, &["lodash"], &PlanOptions::default()).await;
    let reminder = plan
        .advisories()
        .iter()
        .find(|a| a.kind == AdvisoryKind::LockfileStaleReminder)
        .unwrap();
    assert_eq!(reminder.path.as_deref(), Some(Path::new("/w/pnpm-lock.yaml")));
    assert!(reminder.message.contains("pnpm install"));

    engine
        .apply(&session, &plan, &CancellationToken::new(), false)
        .await
        .unwrap();
    assert_eq!(fs.contents("/w/pnpm-lock.yaml").as_deref(), Some(lockfile));
}

#[tokio::test]
async fn test_unused_dependency_is_a_no_op() {
    let fs = workspace();
    let registry = registry();
    let engine = engine(&fs, &registry, EngineOptions::default());
    let cancel = CancellationToken::new();

    let session = engine.open(Path::new("/w")).await.unwrap();
    let candidates = engine
        .prepare_upgrade(&session, &UpgradeRequest::named(["left-pad"]), &cancel)
        .await
        .unwrap();
    assert!(candidates.items.is_empty());
    assert!(registry.queried().is_empty());

    let selection = SelectAll.select(&candidates, &candidates.advisories);
    let plan = engine.plan_upgrade(&session, &candidates, &selection, &PlanOptions::default());
    assert!(plan.is_empty());
    assert_eq!(plan.advisories()[0].kind, AdvisoryKind::NoUsagesFound);
    assert!(plan.advisories()[0].message.contains("no usages found"));

    let outcome = engine.apply(&session, &plan, &cancel, false).await.unwrap();
    assert!(outcome.written.is_empty());
}

#[tokio::test]
async fn test_major_bump_needs_approval() {
    let fs = workspace();
    let engine = engine(&fs, &registry(), EngineOptions::default());

    let (_, plan) = plan_for(&engine, &["react"], &PlanOptions::default()).await;
    assert!(plan.is_empty());
    assert_eq!(plan.skipped()[0].reason, AdvisoryKind::MajorVersionBump);
    assert!(plan.advisories()[0].message.contains("highest compatible is 17.0.2"));

    let options = PlanOptions {
        allow_major: Approval::dependencies(["react"]),
        ..PlanOptions::default()
    };
    let (_, plan) = plan_for(&engine, &["react"], &options).await;
    assert_eq!(plan.edits()[0].new_range.as_deref(), Some("^18.2.0"));
}

#[tokio::test]
async fn test_zero_major_minor_bump_needs_approval() {
    let fs = workspace();
    fs.add_file(
        "packages/p3/package.json",
        "{\n  \"name\": \"p3\",\n  \"dependencies\": {\n    \"nanoid\": \"^0.3.0\"\n  }\n}\n",
    )
    .unwrap();
    let registry = registry().with_package("nanoid", ["0.3.0", "0.3.4", "0.4.0"]);
    let engine = engine(&fs, &registry, EngineOptions::default());

    let (_, plan) = plan_for(&engine, &["nanoid"], &PlanOptions::default()).await;
    assert!(plan.is_empty());
    assert_eq!(plan.skipped()[0].reason, AdvisoryKind::MajorVersionBump);
    assert!(plan.advisories()[0].message.contains("highest compatible is 0.3.4"));

    let options = PlanOptions {
        allow_major: Approval::All,
        ..PlanOptions::default()
    };
    let (_, plan) = plan_for(&engine, &["nanoid"], &options).await;
    assert_eq!(plan.edits()[0].new_range.as_deref(), Some("^0.4.0"));
}

#[tokio::test]
async fn test_interactive_confirmation_approves_entry() {
    let fs = workspace();
    let engine = engine(&fs, &registry(), EngineOptions::default());
    let cancel = CancellationToken::new();

    let session = engine.open(Path::new("/w")).await.unwrap();
    let candidates = engine
        .prepare_upgrade(&session, &UpgradeRequest::all(), &cancel)
        .await
        .unwrap();
    let names: Vec<_> = candidates.items.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["lodash", "react"]);

    // confirm only the pinned lodash declaration in p1
    let mut selector = |candidates: &tandem_engine::Candidates, _: &[tandem_engine::Advisory]| {
        let lodash = candidates.get("lodash").unwrap();
        let mut selection = Selection::of(["lodash"]);
        selection.confirmed.insert(tandem_engine::EntryKey::new(
            p1(),
            lodash.analysis.entries[0].entry.field,
            "lodash",
        ));
        selection
    };
    let selection = selector.select(&candidates, &candidates.advisories);
    let plan = engine.plan_upgrade(&session, &candidates, &selection, &PlanOptions::default());

    assert_eq!(plan.edits().len(), 2);
    assert!(plan.edits().iter().all(|e| e.name == "lodash"));
    assert!(plan.edits()[0].overrides_pin);
}

#[tokio::test]
async fn test_registry_failure_is_isolated() {
    let fs = workspace();
    let registry = registry().with_failure("react", SimulatedFailure::Network);
    let engine = engine(&fs, &registry, EngineOptions::default());

    let (_, plan) = plan_for(&engine, &["lodash", "react"], &PlanOptions::default()).await;
    assert_eq!(plan.edits().len(), 1);
    let failure = plan
        .advisories()
        .iter()
        .find(|a| a.kind == AdvisoryKind::RegistryFailure)
        .unwrap();
    assert_eq!(failure.dependency.as_deref(), Some("react"));
}

#[tokio::test]
async fn test_requested_version_becomes_target() {
    let fs = workspace();
    let engine = engine(&fs, &registry(), EngineOptions::default());
    let request = UpgradeRequest {
        targets: vec!["lodash@~4.17.10".parse().unwrap()],
        all: false,
    };
    let cancel = CancellationToken::new();

    let session = engine.open(Path::new("/w")).await.unwrap();
    let candidates = engine
        .prepare_upgrade(&session, &request, &cancel)
        .await
        .unwrap();
    assert_eq!(
        candidates.get("lodash").unwrap().analysis.target.to_string(),
        "4.17.21"
    );

    let request = UpgradeRequest {
        targets: vec!["lodash@^5.0.0".parse().unwrap()],
        all: false,
    };
    let candidates = engine
        .prepare_upgrade(&session, &request, &cancel)
        .await
        .unwrap();
    assert!(candidates.items.is_empty());
    assert!(candidates.advisories[0].message.contains("satisfies ^5.0.0"));
}

#[tokio::test]
async fn test_malformed_manifest_is_reported_and_excluded() {
    let fs = workspace();
    fs.add_file("packages/broken/package.json", "{ \"name\": ")
        .unwrap();
    let engine = engine(&fs, &registry(), EngineOptions::default());

    let (session, plan) = plan_for(&engine, &["lodash"], &PlanOptions::default()).await;
    assert_eq!(session.workspace().len(), 3);
    assert_eq!(session.workspace().warnings().len(), 1);
    assert_eq!(plan.edits().len(), 1);
    assert!(plan
        .advisories()
        .iter()
        .any(|a| a.kind == AdvisoryKind::ManifestParseFailure));
}

#[tokio::test]
async fn test_staging_failure_writes_nothing() {
    let fs = workspace();
    let engine = engine(&fs, &registry(), EngineOptions::default());
    let options = PlanOptions {
        override_pinned: Approval::All,
        ..PlanOptions::default()
    };
    let (session, plan) = plan_for(&engine, &["lodash"], &options).await;

    // p2 changes after the workspace was opened
    let edited = P2.replace("\"react\"", "\"react-dom\"");
    fs.add_file("packages/p2/package.json", edited.clone()).unwrap();

    let result = engine
        .apply(&session, &plan, &CancellationToken::new(), false)
        .await;
    match result {
        Err(Error::Staging { path, reason }) => {
            assert_eq!(path, p2());
            assert!(reason.contains("changed on disk"));
        }
        other => panic!("expected staging failure, got {:?}", other),
    }
    assert_eq!(fs.contents(p1()).as_deref(), Some(P1));
    assert_eq!(fs.contents(p2()), Some(edited));
}

#[tokio::test]
async fn test_partial_apply_reports_both_sides() {
    let fs = workspace();
    fs.fail_writes_to(p2()).unwrap();
    let engine = engine(&fs, &registry(), EngineOptions::default());
    let options = PlanOptions {
        override_pinned: Approval::All,
        ..PlanOptions::default()
    };
    let (session, plan) = plan_for(&engine, &["lodash"], &options).await;

    let result = engine
        .apply(&session, &plan, &CancellationToken::new(), false)
        .await;
    let mut report = Report::from_plan(&session, &plan, false);
    report.record(&result);

    match result {
        Err(Error::PartialApply { succeeded, failed }) => {
            assert_eq!(succeeded, vec![p1()]);
            assert_eq!(failed.len(), 1);
            assert_eq!(failed[0].path, p2());
        }
        other => panic!("expected partial apply, got {:?}", other),
    }
    assert!(fs.contents(p1()).unwrap().contains("4.17.21"));
    assert_eq!(fs.contents(p2()).as_deref(), Some(P2));
    assert!(fs.contents("/w/packages/p2/package.json.tmp").is_none());

    assert_eq!(report.applied.len(), 1);
    assert_eq!(report.failures.len(), 1);
}

#[tokio::test]
async fn test_cancellation_before_apply() {
    let fs = workspace();
    let engine = engine(&fs, &registry(), EngineOptions::default());
    let (session, plan) = plan_for(&engine, &["lodash"], &PlanOptions::default()).await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = engine.apply(&session, &plan, &cancel, false).await;
    assert!(matches!(result, Err(Error::Cancelled)));
    assert_eq!(fs.contents(p2()).as_deref(), Some(P2));

    let result = engine
        .prepare_upgrade(&session, &UpgradeRequest::named(["lodash"]), &cancel)
        .await;
    assert!(matches!(result, Err(Error::Cancelled)));
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let fs = workspace();
    let engine = engine(&fs, &registry(), EngineOptions::default());
    let (session, plan) = plan_for(&engine, &["lodash"], &PlanOptions::default()).await;

    let outcome = engine
        .apply(&session, &plan, &CancellationToken::new(), true)
        .await
        .unwrap();
    assert!(outcome.dry_run);
    assert_eq!(outcome.written, vec![p2()]);
    assert_eq!(fs.contents(p2()).as_deref(), Some(P2));
}

#[tokio::test]
async fn test_missing_root_is_scan_error() {
    let fs = workspace();
    let engine = engine(&fs, &registry(), EngineOptions::default());
    let result = engine.open(Path::new("/w/nowhere")).await;
    assert!(matches!(result, Err(Error::Scan { .. })));
}
