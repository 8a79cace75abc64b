//! `add` and `remove` planning across a workspace

use std::path::Path;
use std::sync::Arc;
use tandem_engine::{
    AddRequest, Advisory, AdvisoryKind, Candidates, DependencyField, EngineOptions, Error,
    PackageSpec, RemoveRequest, SelectAll, Selection, Selector, UpgradeEngine,
};
use tandem_fs::MemoryFileSystem;
use tandem_registry::{MemoryRegistry, RegistryKind};
use tokio_util::sync::CancellationToken;

fn workspace() -> MemoryFileSystem {
    let fs = MemoryFileSystem::empty("/w").unwrap();
    fs.add_file(
        "package.json",
        "{\n  \"name\": \"root\",\n  \"workspaces\": [\"apps/*\"]\n}\n",
    )
    .unwrap();
    fs.add_file(
        "apps/web/package.json",
        "{\n  \"name\": \"@acme/web\",\n  \"dependencies\": {\n    \"lodash\": \"4.17.15\",\n    \"react\": \"^18.2.0\"\n  }\n}\n",
    )
    .unwrap();
    fs.add_file(
        "apps/api/package.json",
        "{\n  \"name\": \"@acme/api\",\n  \"dependencies\": {\n    \"lodash\": \"^4.17.0\",\n    \"react\": \"^18.2.0\"\n  },\n  \"devDependencies\": {\n    \"lodash\": \"^4.17.0\"\n  }\n}\n",
    )
    .unwrap();
    fs
}

fn engine(fs: &MemoryFileSystem, registry: &MemoryRegistry) -> UpgradeEngine<MemoryFileSystem> {
    UpgradeEngine::new(Arc::new(fs.clone()), EngineOptions::default())
        .with_registry(Arc::new(registry.clone()))
}

fn registry() -> MemoryRegistry {
    MemoryRegistry::new(RegistryKind::Npm)
        .with_package("lodash", ["4.17.15", "4.17.21"])
        .with_package("react", ["18.2.0", "18.3.1"])
        .with_package("zod", ["3.22.4", "3.23.8"])
}

/// Picks a fixed range index and records the choices it was offered
struct PickRange {
    pick: Option<usize>,
    offered: Vec<(String, Vec<String>, usize)>,
}

impl Selector for PickRange {
    fn select(&mut self, _candidates: &Candidates, _advisories: &[Advisory]) -> Selection {
        Selection::default()
    }

    fn choose_range(&mut self, name: &str, choices: &[String], default: usize) -> usize {
        self.offered
            .push((name.to_string(), choices.to_vec(), default));
        self.pick.unwrap_or(default)
    }
}

fn add(target: Option<&str>, packages: &[&str], field: DependencyField) -> AddRequest {
    AddRequest {
        target: target.map(str::to_string),
        packages: packages.iter().map(|p| p.parse().unwrap()).collect(),
        field,
    }
}

#[tokio::test]
async fn test_add_offers_existing_ranges() {
    let fs = workspace();
    let engine = engine(&fs, &registry());
    let cancel = CancellationToken::new();
    let session = engine.open(Path::new("/w")).await.unwrap();

    let mut selector = PickRange {
        pick: Some(2),
        offered: Vec::new(),
    };
    let plan = engine
        .plan_add(
            &session,
            &add(None, &["lodash"], DependencyField::Runtime),
            &mut selector,
            &cancel,
        )
        .await
        .unwrap();

    // ^4.17.0 is declared twice, the pin once
    assert_eq!(
        selector.offered,
        vec![(
            "lodash".to_string(),
            vec![
                "^4.17.21".to_string(),
                "^4.17.0".to_string(),
                "4.17.15".to_string()
            ],
            0
        )]
    );
    assert_eq!(plan.edits().len(), 1);
    assert_eq!(plan.edits()[0].path, Path::new("/w/package.json"));
    assert_eq!(plan.edits()[0].new_range.as_deref(), Some("4.17.15"));

    engine.apply(&session, &plan, &cancel, false).await.unwrap();
    let session = engine.open(Path::new("/w")).await.unwrap();
    let root = session
        .workspace()
        .get(session.workspace().root_manifest().unwrap())
        .unwrap();
    assert_eq!(
        root.declaration(DependencyField::Runtime, "lodash")
            .map(|d| d.range.as_str()),
        Some("4.17.15")
    );
}

#[tokio::test]
async fn test_add_aligns_with_uniform_range() {
    let fs = workspace();
    let engine = engine(&fs, &registry());
    let session = engine.open(Path::new("/w")).await.unwrap();

    let plan = engine
        .plan_add(
            &session,
            &add(None, &["react", "zod"], DependencyField::Dev),
            &mut SelectAll,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let added: Vec<_> = plan
        .edits()
        .iter()
        .map(|e| (e.name.as_str(), e.field, e.new_range.as_deref()))
        .collect();
    assert_eq!(
        added,
        vec![
            ("react", DependencyField::Dev, Some("^18.2.0")),
            ("zod", DependencyField::Dev, Some("^3.23.8")),
        ]
    );
}

#[tokio::test]
async fn test_add_to_member_by_name_and_path() {
    let fs = workspace();
    let registry = registry();
    let engine = engine(&fs, &registry);
    let session = engine.open(Path::new("/w")).await.unwrap();
    let cancel = CancellationToken::new();

    let plan = engine
        .plan_add(
            &session,
            &add(Some("@acme/web"), &["zod@^3.22.0", "lodash"], DependencyField::Runtime),
            &mut SelectAll,
            &cancel,
        )
        .await
        .unwrap();
    assert_eq!(plan.edits().len(), 1);
    assert_eq!(plan.edits()[0].name, "zod");
    assert_eq!(plan.edits()[0].path, Path::new("/w/apps/web/package.json"));
    assert_eq!(plan.edits()[0].new_range.as_deref(), Some("^3.22.0"));
    assert!(plan
        .advisories()
        .iter()
        .any(|a| a.kind == AdvisoryKind::AlreadyDeclared));
    assert!(!registry.queried().contains(&"zod".to_string()));

    let plan = engine
        .plan_add(
            &session,
            &add(Some("/w/apps/api/src"), &["zod"], DependencyField::Runtime),
            &mut SelectAll,
            &cancel,
        )
        .await
        .unwrap();
    assert_eq!(plan.edits()[0].path, Path::new("/w/apps/api/package.json"));
}

#[tokio::test]
async fn test_add_rejects_bad_input() {
    let fs = workspace();
    let engine = engine(&fs, &registry());
    let session = engine.open(Path::new("/w")).await.unwrap();
    let cancel = CancellationToken::new();

    let plan = engine
        .plan_add(
            &session,
            &add(None, &["Not A Name", "zod@not-a-range!!"], DependencyField::Runtime),
            &mut SelectAll,
            &cancel,
        )
        .await
        .unwrap();
    assert!(plan.is_empty());
    let kinds: Vec<_> = plan.advisories().iter().map(|a| a.kind).collect();
    assert_eq!(
        kinds,
        vec![AdvisoryKind::RegistryFailure, AdvisoryKind::UnparseableRange]
    );

    let result = engine
        .plan_add(
            &session,
            &add(Some("apps/missing"), &["zod"], DependencyField::Runtime),
            &mut SelectAll,
            &cancel,
        )
        .await;
    assert!(matches!(result, Err(Error::Workspace(_))));

    let result = engine
        .plan_add(
            &session,
            &add(None, &["zod"], DependencyField::Build),
            &mut SelectAll,
            &cancel,
        )
        .await;
    assert!(matches!(result, Err(Error::Plan(_))));
}

#[tokio::test]
async fn test_remove_from_one_manifest() {
    let fs = workspace();
    let engine = engine(&fs, &registry());
    let session = engine.open(Path::new("/w")).await.unwrap();

    let plan = engine
        .plan_remove(
            &session,
            &RemoveRequest {
                target: Some("apps/api".to_string()),
                everywhere: false,
                names: vec!["lodash".to_string()],
            },
        )
        .unwrap();

    let fields: Vec<_> = plan.edits().iter().map(|e| e.field).collect();
    assert_eq!(fields, vec![DependencyField::Runtime, DependencyField::Dev]);

    engine
        .apply(&session, &plan, &CancellationToken::new(), false)
        .await
        .unwrap();
    assert_eq!(
        fs.contents("/w/apps/api/package.json").as_deref(),
        Some("{\n  \"name\": \"@acme/api\",\n  \"dependencies\": {\n    \"react\": \"^18.2.0\"\n  },\n  \"devDependencies\": {}\n}\n")
    );
}

#[tokio::test]
async fn test_remove_everywhere() {
    let fs = workspace();
    let engine = engine(&fs, &registry());
    let session = engine.open(Path::new("/w")).await.unwrap();

    let plan = engine
        .plan_remove(
            &session,
            &RemoveRequest {
                target: None,
                everywhere: true,
                names: vec!["lodash".to_string(), "left-pad".to_string()],
            },
        )
        .unwrap();
    assert_eq!(plan.edits().len(), 3);
    assert_eq!(plan.affected_paths().len(), 2);
    let missing = plan
        .advisories()
        .iter()
        .find(|a| a.kind == AdvisoryKind::NoUsagesFound)
        .unwrap();
    assert_eq!(missing.message, "no usages found for left-pad");

    engine
        .apply(&session, &plan, &CancellationToken::new(), false)
        .await
        .unwrap();
    let session = engine.open(Path::new("/w")).await.unwrap();
    assert!(session.index().entries_for("lodash").is_empty());
    assert_eq!(session.index().entries_for("react").len(), 2);
}

#[tokio::test]
async fn test_remove_everywhere_needs_a_monorepo() {
    let fs = MemoryFileSystem::empty("/solo").unwrap();
    fs.add_file("package.json", r#"{"dependencies":{"lodash":"^4.17.0"}}"#)
        .unwrap();
    let engine = engine(&fs, &registry());
    let session = engine.open(Path::new("/solo")).await.unwrap();

    let result = engine.plan_remove(
        &session,
        &RemoveRequest {
            target: None,
            everywhere: true,
            names: vec!["lodash".to_string()],
        },
    );
    assert!(matches!(result, Err(Error::Workspace(_))));
}

#[test]
fn test_package_spec_for_scoped_names() {
    let spec: PackageSpec = "@acme/ui@workspace:*".parse().unwrap();
    assert_eq!(spec.name, "@acme/ui");
    assert_eq!(spec.range.as_deref(), Some("workspace:*"));
}
