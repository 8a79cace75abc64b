//! Workspace Scanner: finds the manifests that make up a workspace

use crate::members::MemberPatterns;
use crate::workspace::ManifestWarning;
use crate::{Ecosystem, Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tandem_fs::{DiscoveryOptions, EntryKind, FileSystem, ManifestQuery};

/// Directories never scanned for manifests
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    "**/node_modules/**",
    "**/.git/**",
    "**/target/**",
    "**/dist/**",
    "**/build/**",
    "**/.turbo/**",
    "**/.next/**",
    "**/coverage/**",
];

/// Scanner configuration
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Glob patterns of paths to skip
    pub ignore_patterns: Vec<String>,
    /// Traversal options passed to the filesystem
    pub discovery: DiscoveryOptions,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            ignore_patterns: DEFAULT_IGNORE_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            discovery: DiscoveryOptions::default(),
        }
    }
}

impl ScanOptions {
    /// Add patterns on top of the defaults
    pub fn with_extra_ignores<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for pattern in patterns {
            let pattern = pattern.into();
            if !self.ignore_patterns.contains(&pattern) {
                self.ignore_patterns.push(pattern);
            }
        }
        self
    }
}

/// Result of a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    /// Absolute workspace root
    pub root: PathBuf,
    /// Ecosystem the workspace was scanned for
    pub ecosystem: Ecosystem,
    /// Manifest paths, ordered lexicographically
    pub manifests: Vec<PathBuf>,
    /// Member declarations that could not be read; the scan fell back to
    /// every discovered manifest
    pub warnings: Vec<ManifestWarning>,
}

/// Walks a root directory for manifests
pub struct WorkspaceScanner<F: FileSystem> {
    fs: Arc<F>,
    options: ScanOptions,
}

impl<F: FileSystem> WorkspaceScanner<F> {
    /// Create a scanner over a filesystem
    pub fn new(fs: Arc<F>, options: ScanOptions) -> Self {
        Self { fs, options }
    }

    /// Detect the ecosystem of a root directory: `package.json` wins over
    /// `Cargo.toml`.
    pub async fn detect_ecosystem(&self, root: &Path) -> Result<Option<Ecosystem>> {
        for ecosystem in [Ecosystem::JavaScript, Ecosystem::Rust] {
            if self
                .fs
                .exists(&root.join(ecosystem.manifest_file_name()))
                .await?
            {
                return Ok(Some(ecosystem));
            }
        }
        Ok(None)
    }

    /// Scan `root` for manifests.
    ///
    /// With `ecosystem` unset the ecosystem is detected from the root; a root
    /// with neither manifest is scanned as JavaScript and usually yields an
    /// empty workspace.
    ///
    /// # Errors
    ///
    /// `Error::Scan` if the root does not exist, is not a directory, or
    /// cannot be traversed.
    pub async fn scan(&self, root: &Path, ecosystem: Option<Ecosystem>) -> Result<ScanOutcome> {
        let scan_error = |reason: String| Error::Scan {
            path: root.to_path_buf(),
            reason,
        };

        match self.fs.entry_kind(root).await {
            Ok(EntryKind::Dir) => {}
            Ok(EntryKind::Missing) => {
                return Err(scan_error("directory does not exist".to_string()))
            }
            Ok(_) => return Err(scan_error("not a directory".to_string())),
            Err(e) => return Err(scan_error(e.to_string())),
        }
        let root = self.fs.resolve(root).map_err(|e| scan_error(e.to_string()))?;

        let ecosystem = match ecosystem {
            Some(ecosystem) => ecosystem,
            None => self
                .detect_ecosystem(&root)
                .await?
                .unwrap_or(Ecosystem::JavaScript),
        };

        let query = ManifestQuery::new(
            ecosystem.manifest_file_name(),
            &self.options.ignore_patterns,
            &self.options.discovery,
        );
        let discovered = self
            .fs
            .find_manifests(&root, &query)
            .await
            .map_err(|e| Error::Scan {
                path: root.clone(),
                reason: e.to_string(),
            })?;

        let mut warnings = Vec::new();
        let members = match MemberPatterns::load(self.fs.as_ref(), &root, ecosystem).await {
            Ok(members) => members,
            Err(Error::Parse { path, message }) => {
                tracing::warn!(
                    path = %path.display(),
                    %message,
                    "ignoring workspace member list; every discovered manifest is a member"
                );
                warnings.push(ManifestWarning {
                    path,
                    message: format!("member list ignored: {}", message),
                });
                None
            }
            Err(err) => return Err(err),
        };
        let manifests: Vec<PathBuf> = discovered
            .into_iter()
            .filter(|path| match (&members, path.parent()) {
                (Some(members), Some(dir)) => members.contains(&root, dir),
                _ => true,
            })
            .collect();

        tracing::debug!(
            root = %root.display(),
            %ecosystem,
            manifests = manifests.len(),
            "scanned workspace"
        );

        Ok(ScanOutcome {
            root,
            ecosystem,
            manifests,
            warnings,
        })
    }
}
