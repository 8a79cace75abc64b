//! Workspace: the arena of manifests for one run

use crate::manifest::{Manifest, ManifestStore};
use crate::scanner::ScanOutcome;
use crate::{Ecosystem, Error, ManifestId};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tandem_fs::FileSystem;

/// A manifest that could not be loaded and was left out of the workspace
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestWarning {
    /// Offending manifest
    pub path: PathBuf,
    /// What went wrong
    pub message: String,
}

/// Ordered set of manifests under one root.
///
/// Membership is fixed once built; manifests are addressed by [`ManifestId`]
/// (their position in scan order).
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    ecosystem: Ecosystem,
    manifests: Vec<Manifest>,
    warnings: Vec<ManifestWarning>,
}

impl Workspace {
    /// Build a workspace from already-parsed manifests.
    ///
    /// Manifests are kept in the given order; a second manifest with a path
    /// already present is dropped.
    pub fn new(root: impl Into<PathBuf>, ecosystem: Ecosystem, manifests: Vec<Manifest>) -> Self {
        let mut unique: Vec<Manifest> = Vec::with_capacity(manifests.len());
        for manifest in manifests {
            if unique.iter().all(|m| m.path() != manifest.path()) {
                unique.push(manifest);
            }
        }
        Self {
            root: root.into(),
            ecosystem,
            manifests: unique,
            warnings: Vec::new(),
        }
    }

    /// Load every scanned manifest. Malformed manifests become warnings and
    /// are excluded.
    pub async fn load<F: FileSystem>(
        store: &ManifestStore<F>,
        outcome: &ScanOutcome,
        concurrency: usize,
    ) -> Self {
        let mut manifests = Vec::with_capacity(outcome.manifests.len());
        let mut warnings = outcome.warnings.clone();

        for (path, result) in store.load_all(&outcome.manifests, concurrency).await {
            match result {
                Ok(manifest) => manifests.push(manifest),
                Err(err) => {
                    let message = match err {
                        Error::Parse { message, .. } => message,
                        other => other.to_string(),
                    };
                    tracing::warn!(path = %path.display(), %message, "skipping manifest");
                    warnings.push(ManifestWarning { path, message });
                }
            }
        }

        let mut workspace = Self::new(outcome.root.clone(), outcome.ecosystem, manifests);
        workspace.warnings = warnings;
        workspace
    }

    /// Workspace root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Ecosystem of every manifest in the workspace
    pub fn ecosystem(&self) -> Ecosystem {
        self.ecosystem
    }

    /// Manifests that failed to load
    pub fn warnings(&self) -> &[ManifestWarning] {
        &self.warnings
    }

    /// Number of manifests
    pub fn len(&self) -> usize {
        self.manifests.len()
    }

    /// Whether the workspace has no manifests
    pub fn is_empty(&self) -> bool {
        self.manifests.is_empty()
    }

    /// Manifest by id
    pub fn get(&self, id: ManifestId) -> Option<&Manifest> {
        self.manifests.get(id.0)
    }

    /// Manifests with their ids, in scan order
    pub fn iter(&self) -> impl Iterator<Item = (ManifestId, &Manifest)> {
        self.manifests
            .iter()
            .enumerate()
            .map(|(i, m)| (ManifestId(i), m))
    }

    /// Id of the manifest at `path`
    pub fn find_by_path(&self, path: &Path) -> Option<ManifestId> {
        self.manifests
            .iter()
            .position(|m| m.path() == path)
            .map(ManifestId)
    }

    /// The manifest at the workspace root, if any
    pub fn root_manifest(&self) -> Option<ManifestId> {
        self.find_by_path(&self.root.join(self.ecosystem.manifest_file_name()))
    }

    /// Manifest whose directory is the nearest ancestor of (or equal to) `dir`
    pub fn closest_manifest(&self, dir: &Path) -> Option<ManifestId> {
        self.iter()
            .filter(|(_, m)| dir.starts_with(m.dir()))
            .max_by_key(|(_, m)| m.dir().components().count())
            .map(|(id, _)| id)
    }

    /// Resolve a user-supplied target: a manifest path, a directory holding
    /// one, or a package name. Relative paths are taken from the root.
    pub fn resolve_target(&self, target: &str) -> Option<ManifestId> {
        let candidate = Path::new(target);
        let absolute = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(candidate)
        };
        let absolute = normalize(&absolute);

        self.find_by_path(&absolute)
            .or_else(|| self.find_by_path(&absolute.join(self.ecosystem.manifest_file_name())))
            .or_else(|| {
                self.manifests
                    .iter()
                    .position(|m| m.name() == Some(target))
                    .map(ManifestId)
            })
    }
}

fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::{ScanOptions, WorkspaceScanner};
    use std::sync::Arc;
    use tandem_fs::MemoryFileSystem;

    async fn open(fs: MemoryFileSystem) -> Workspace {
        let fs = Arc::new(fs);
        let outcome = WorkspaceScanner::new(fs.clone(), ScanOptions::default())
            .scan(Path::new("/w"), None)
            .await
            .unwrap();
        let store = ManifestStore::new(fs, outcome.ecosystem);
        Workspace::load(&store, &outcome, 4).await
    }

    #[tokio::test]
    async fn test_malformed_manifest_becomes_warning() {
        let fs = MemoryFileSystem::empty("/w").unwrap();
        fs.add_file("package.json", r#"{"name":"root"}"#).unwrap();
        fs.add_file("a/package.json", r#"{"name":"a"}"#).unwrap();
        fs.add_file("b/package.json", r#"{"name": "b", "#).unwrap();

        let workspace = open(fs).await;
        assert_eq!(workspace.len(), 2);
        assert_eq!(workspace.warnings().len(), 1);
        assert_eq!(workspace.warnings()[0].path, PathBuf::from("/w/b/package.json"));
        assert_eq!(workspace.root_manifest(), Some(ManifestId(0)));
    }

    #[tokio::test]
    async fn test_resolve_target() {
        let fs = MemoryFileSystem::empty("/w").unwrap();
        fs.add_file("package.json", r#"{"name":"root"}"#).unwrap();
        fs.add_file("apps/web/package.json", r#"{"name":"@acme/web"}"#)
            .unwrap();

        let workspace = open(fs).await;
        let web = Some(ManifestId(1));
        assert_eq!(workspace.resolve_target("apps/web"), web);
        assert_eq!(workspace.resolve_target("./apps/web/package.json"), web);
        assert_eq!(workspace.resolve_target("/w/apps/web"), web);
        assert_eq!(workspace.resolve_target("@acme/web"), web);
        assert_eq!(workspace.resolve_target("."), Some(ManifestId(0)));
        assert_eq!(workspace.resolve_target("apps/api"), None);

        assert_eq!(workspace.closest_manifest(Path::new("/w/apps/web/src")), web);
        assert_eq!(
            workspace.closest_manifest(Path::new("/w/apps")),
            Some(ManifestId(0))
        );
        assert_eq!(workspace.closest_manifest(Path::new("/elsewhere")), None);
    }

    #[test]
    fn test_duplicate_paths_are_dropped() {
        let manifest =
            Manifest::parse("/w/package.json", Ecosystem::JavaScript, "{}".to_string()).unwrap();
        let workspace = Workspace::new(
            "/w",
            Ecosystem::JavaScript,
            vec![manifest.clone(), manifest],
        );
        assert_eq!(workspace.len(), 1);
    }
}
