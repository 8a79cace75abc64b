//! # tandem-engine
//!
//! Workspace-aware dependency upgrades for npm and Cargo monorepos.
//!
//! This crate provides functionality to:
//! - Discover every manifest of a workspace (`package.json` or `Cargo.toml`),
//!   honoring ignore patterns and declared workspace members
//! - Index every declaration of every dependency across manifests
//! - Resolve published versions from the npm registry or crates.io
//! - Classify how the declared ranges of one dependency relate to a target
//!   version (uniform, divergent-compatible, divergent-incompatible)
//! - Plan range rewrites, additions and removals, leaving exact pins alone
//!   unless explicitly overridden
//! - Apply a plan all-or-nothing while preserving the formatting of every
//!   untouched region of each manifest
//!
//! Lockfiles are noticed and reported, never read or written.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use tandem_engine::{
//!     EngineOptions, PlanOptions, SelectAll, Selector, UpgradeEngine, UpgradeRequest,
//! };
//! use tandem_fs::NativeFileSystem;
//! use tandem_registry::{http_registry, ClientOptions, RegistryKind};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let fs = Arc::new(NativeFileSystem::new(".")?);
//! let engine = UpgradeEngine::new(fs, EngineOptions::default())
//!     .with_registry(http_registry(RegistryKind::Npm, None, &ClientOptions::default())?);
//!
//! let cancel = CancellationToken::new();
//! let session = engine.open(Path::new(".")).await?;
//! let candidates = engine
//!     .prepare_upgrade(&session, &UpgradeRequest::named(["lodash"]), &cancel)
//!     .await?;
//! let selection = SelectAll.select(&candidates, &candidates.advisories);
//! let plan = engine.plan_upgrade(&session, &candidates, &selection, &PlanOptions::default());
//!
//! for edit in plan.edits() {
//!     println!("{}: {}", edit.path.display(), edit);
//! }
//! engine.apply(&session, &plan, &cancel, false).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod applier;
pub mod conflict;
pub mod engine;
pub mod error;
pub mod index;
pub mod lockfile;
pub mod manifest;
pub mod members;
pub mod plan;
pub mod planner;
pub mod report;
pub mod resolver;
pub mod scanner;
pub mod select;
pub mod types;
pub mod version;
pub mod workspace;

pub use error::{Error, FailedWrite, RegistryError, Result};
pub use types::{DependencyField, DependencySource, Ecosystem, EntryKey, ManifestId};

pub use manifest::{Declaration, FieldDeclarations, Manifest, ManifestStore};
pub use workspace::{ManifestWarning, Workspace};

pub use conflict::{Analysis, Classification, EntryAnalysis, Verdict};
pub use index::{UsageEntry, UsageIndex};
pub use resolver::{Resolution, ResolverOptions, VersionResolver};
pub use scanner::{ScanOptions, ScanOutcome, WorkspaceScanner, DEFAULT_IGNORE_PATTERNS};
pub use version::{ParsedRange, ParsedVersion, RangePrefix, RangeShape, RangeSpec};

pub use plan::{Advisory, AdvisoryKind, Approval, Edit, PlanOptions, SkippedEntry, UpgradePlan};
pub use select::{Candidate, Candidates, SelectAll, Selection, Selector};

pub use applier::{ApplyOutcome, PlanApplier};
pub use lockfile::{LockfileAdvisor, LockfileKind, LockfileRecord, PackageManager};

pub use engine::{
    AddRequest, EngineOptions, PackageSpec, RemoveRequest, Session, UpgradeEngine,
    UpgradeRequest,
};
pub use report::Report;
