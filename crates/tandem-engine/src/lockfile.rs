//! Lockfile Advisor: notices lockfiles, never reads or writes them

use crate::plan::{Advisory, AdvisoryKind};
use crate::{Ecosystem, Result};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use tandem_fs::FileSystem;

/// Known lockfile formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LockfileKind {
    /// `package-lock.json`
    NpmPackageLock,
    /// `npm-shrinkwrap.json`
    NpmShrinkwrap,
    /// `yarn.lock`
    Yarn,
    /// `pnpm-lock.yaml`
    Pnpm,
    /// `bun.lockb`
    BunBinary,
    /// `bun.lock`
    BunText,
    /// `Cargo.lock`
    Cargo,
}

impl LockfileKind {
    /// Every recognized kind
    pub const ALL: [LockfileKind; 7] = [
        LockfileKind::Pnpm,
        LockfileKind::Yarn,
        LockfileKind::BunText,
        LockfileKind::BunBinary,
        LockfileKind::NpmPackageLock,
        LockfileKind::NpmShrinkwrap,
        LockfileKind::Cargo,
    ];

    /// File name of the lockfile
    pub fn file_name(&self) -> &'static str {
        match self {
            LockfileKind::NpmPackageLock => "package-lock.json",
            LockfileKind::NpmShrinkwrap => "npm-shrinkwrap.json",
            LockfileKind::Yarn => "yarn.lock",
            LockfileKind::Pnpm => "pnpm-lock.yaml",
            LockfileKind::BunBinary => "bun.lockb",
            LockfileKind::BunText => "bun.lock",
            LockfileKind::Cargo => "Cargo.lock",
        }
    }

    /// Package manager that writes this lockfile
    pub fn package_manager(&self) -> PackageManager {
        match self {
            LockfileKind::NpmPackageLock | LockfileKind::NpmShrinkwrap => PackageManager::Npm,
            LockfileKind::Yarn => PackageManager::Yarn,
            LockfileKind::Pnpm => PackageManager::Pnpm,
            LockfileKind::BunBinary | LockfileKind::BunText => PackageManager::Bun,
            LockfileKind::Cargo => PackageManager::Cargo,
        }
    }

    /// Kinds relevant to an ecosystem, in detection priority order
    pub fn for_ecosystem(ecosystem: Ecosystem) -> impl Iterator<Item = LockfileKind> {
        Self::ALL.into_iter().filter(move |kind| match ecosystem {
            Ecosystem::JavaScript => *kind != LockfileKind::Cargo,
            Ecosystem::Rust => *kind == LockfileKind::Cargo,
        })
    }
}

/// Tool that installs dependencies and maintains the lockfile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    /// `package-lock.json`
    Npm,
    /// `yarn.lock`
    Yarn,
    /// `pnpm-lock.yaml`
    Pnpm,
    /// `bun.lockb` / `bun.lock`
    Bun,
    /// `Cargo.lock`
    Cargo,
}

impl PackageManager {
    /// Command that refreshes the lockfile after manifest edits
    pub fn install_command(&self) -> &'static str {
        match self {
            PackageManager::Npm => "npm install",
            PackageManager::Yarn => "yarn install",
            PackageManager::Pnpm => "pnpm install",
            PackageManager::Bun => "bun install",
            PackageManager::Cargo => "cargo update --workspace",
        }
    }

    /// Default for an ecosystem when no lockfile says otherwise
    pub fn default_for(ecosystem: Ecosystem) -> Self {
        match ecosystem {
            Ecosystem::JavaScript => PackageManager::Npm,
            Ecosystem::Rust => PackageManager::Cargo,
        }
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PackageManager::Npm => "npm",
            PackageManager::Yarn => "yarn",
            PackageManager::Pnpm => "pnpm",
            PackageManager::Bun => "bun",
            PackageManager::Cargo => "cargo",
        })
    }
}

/// A lockfile found in the workspace
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct LockfileRecord {
    /// Absolute path
    pub path: PathBuf,
    /// Format
    pub kind: LockfileKind,
}

/// Finds lockfiles and turns them into advisories
pub struct LockfileAdvisor;

impl LockfileAdvisor {
    /// Look for lockfiles at `root` and in every directory of `manifest_dirs`.
    ///
    /// Records are sorted by path.
    pub async fn scan<F: FileSystem>(
        fs: &F,
        root: &Path,
        manifest_dirs: impl IntoIterator<Item = &Path>,
        ecosystem: Ecosystem,
    ) -> Result<Vec<LockfileRecord>> {
        let mut dirs: BTreeSet<PathBuf> = BTreeSet::new();
        dirs.insert(root.to_path_buf());
        dirs.extend(manifest_dirs.into_iter().map(Path::to_path_buf));

        let mut records = Vec::new();
        for dir in &dirs {
            for kind in LockfileKind::for_ecosystem(ecosystem) {
                let path = dir.join(kind.file_name());
                if fs.exists(&path).await? {
                    tracing::debug!(path = %path.display(), "found lockfile");
                    records.push(LockfileRecord { path, kind });
                }
            }
        }
        records.sort();
        Ok(records)
    }

    /// Package manager implied by the lockfiles at the root, falling back to
    /// the ecosystem default.
    pub fn package_manager(
        records: &[LockfileRecord],
        root: &Path,
        ecosystem: Ecosystem,
    ) -> PackageManager {
        LockfileKind::for_ecosystem(ecosystem)
            .find(|kind| {
                records
                    .iter()
                    .any(|r| r.kind == *kind && r.path.parent() == Some(root))
            })
            .map(|kind| kind.package_manager())
            .unwrap_or_else(|| PackageManager::default_for(ecosystem))
    }

    /// One stale-lockfile reminder per record
    pub fn advisories(records: &[LockfileRecord], manager: PackageManager) -> Vec<Advisory> {
        records
            .iter()
            .map(|record| {
                // A lockfile of another tool still gets the workspace's command.
                let command = match record.kind.package_manager() {
                    PackageManager::Cargo => PackageManager::Cargo.install_command(),
                    _ => manager.install_command(),
                };
                Advisory::new(
                    AdvisoryKind::LockfileStaleReminder,
                    format!(
                        "{} was not modified and may be out of date; run `{}` to refresh it",
                        record.kind.file_name(),
                        command
                    ),
                )
                .with_path(&record.path)
            })
            .collect()
    }
}
