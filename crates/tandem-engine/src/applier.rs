//! Plan Applier: stage every manifest, then write them all

use crate::manifest::{self, FieldEdit, Manifest};
use crate::plan::{Edit, UpgradePlan};
use crate::{Error, FailedWrite, ManifestId, Result, Workspace};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tandem_fs::FileSystem;
use tokio_util::sync::CancellationToken;

/// File updater that performs atomic writes
pub struct FileUpdater {
    dry_run: bool,
}

impl FileUpdater {
    /// Create a new file updater
    ///
    /// # Arguments
    /// * `dry_run` - If true, don't actually write changes
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    /// Atomically replace a file's contents.
    ///
    /// Strategy:
    /// 1. Write to a temporary file next to the target (same filesystem)
    /// 2. Verify the contents read back unchanged
    /// 3. Rename over the target
    ///
    /// The temporary file is removed if any step after its creation fails.
    pub async fn update_file<F: FileSystem>(
        &self,
        fs: &F,
        path: &Path,
        contents: &str,
    ) -> io::Result<()> {
        if self.dry_run {
            return Ok(());
        }

        // original.ext -> original.ext.tmp
        let temp_path = path.with_extension(format!(
            "{}.tmp",
            path.extension().and_then(|ext| ext.to_str()).unwrap_or("")
        ));

        fs.write(&temp_path, contents).await?;

        let result = async {
            let written = fs.read_to_string(&temp_path).await?;
            if written != contents {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "temporary file contents differ from what was written",
                ));
            }
            fs.rename(&temp_path, path).await
        }
        .await;

        if result.is_err() {
            let _ = fs.remove_file(&temp_path).await;
        }
        result
    }
}

/// Manifests written by a successful apply
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    /// Paths written (or that would be written, for a dry run), sorted
    pub written: Vec<PathBuf>,
    /// Nothing was actually written
    pub dry_run: bool,
}

struct Staged {
    path: PathBuf,
    text: String,
}

/// Commits an [`UpgradePlan`] to disk
pub struct PlanApplier<F: FileSystem> {
    fs: Arc<F>,
    updater: FileUpdater,
    dry_run: bool,
}

impl<F: FileSystem> PlanApplier<F> {
    /// Create an applier. With `dry_run` everything is staged and checked
    /// but nothing is written.
    pub fn new(fs: Arc<F>, dry_run: bool) -> Self {
        Self {
            fs,
            updater: FileUpdater::new(dry_run),
            dry_run,
        }
    }

    /// Apply `plan` to the manifests of `workspace`.
    ///
    /// New text for every affected manifest is computed before anything is
    /// written; a staging failure leaves every file untouched. Cancellation is
    /// honored up to the first write, never after.
    ///
    /// # Errors
    ///
    /// - `Error::Plan` if the plan fails the pin guard or names a manifest
    ///   outside the workspace
    /// - `Error::Staging` if a manifest changed on disk or cannot be rewritten
    /// - `Error::Cancelled` if `cancel` fired before writing began
    /// - `Error::PartialApply` listing written and failed manifests
    pub async fn apply(
        &self,
        workspace: &Workspace,
        plan: &UpgradePlan,
        cancel: &CancellationToken,
    ) -> Result<ApplyOutcome> {
        plan.verify()?;

        let mut by_manifest: BTreeMap<ManifestId, Vec<&Edit>> = BTreeMap::new();
        for edit in plan.edits() {
            by_manifest.entry(edit.manifest).or_default().push(edit);
        }

        let mut staged = Vec::with_capacity(by_manifest.len());
        for (id, edits) in &by_manifest {
            let manifest = workspace
                .get(*id)
                .filter(|m| edits.iter().all(|e| e.path == m.path()))
                .ok_or_else(|| {
                    Error::Plan(format!(
                        "edit for {} does not match a workspace manifest",
                        edits[0].path.display()
                    ))
                })?;
            if let Some(stage) = self.stage(manifest, edits).await? {
                staged.push(stage);
            }
        }

        if cancel.is_cancelled() {
            tracing::info!("apply cancelled before writing");
            return Err(Error::Cancelled);
        }

        let writes = staged.iter().map(|stage| async move {
            let result = self
                .updater
                .update_file(self.fs.as_ref(), &stage.path, &stage.text)
                .await;
            (stage.path.clone(), result)
        });

        let mut written = Vec::new();
        let mut failed = Vec::new();
        for (path, result) in join_all(writes).await {
            match result {
                Ok(()) => {
                    tracing::debug!(path = %path.display(), "wrote manifest");
                    written.push(path);
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "manifest write failed");
                    failed.push(FailedWrite {
                        path,
                        message: err.to_string(),
                    });
                }
            }
        }
        written.sort();

        if !failed.is_empty() {
            return Err(Error::PartialApply {
                succeeded: written,
                failed,
            });
        }

        tracing::info!(manifests = written.len(), dry_run = self.dry_run, "applied plan");
        Ok(ApplyOutcome {
            written,
            dry_run: self.dry_run,
        })
    }

    /// Compute the new text of one manifest; `None` if nothing changes.
    async fn stage(&self, manifest: &Manifest, edits: &[&Edit]) -> Result<Option<Staged>> {
        let path = manifest.path();

        let current = self
            .fs
            .read_to_string(path)
            .await
            .map_err(|e| Error::staging(path, e))?;
        if manifest::digest(&current) != manifest.digest() {
            return Err(Error::staging(path, "file changed on disk since it was read"));
        }

        let field_edits: Vec<FieldEdit<'_>> =
            edits.iter().filter_map(|e| e.as_field_edit()).collect();
        let text = manifest
            .serialize(&field_edits)
            .map_err(|e| Error::staging(path, e))?;

        let reparsed = Manifest::parse(path, manifest.ecosystem(), text.clone())
            .map_err(|e| Error::staging(path, e))?;
        for edit in edits {
            let now = reparsed
                .declaration(edit.field, &edit.name)
                .map(|d| d.range.as_str());
            if now != edit.new_range.as_deref() {
                return Err(Error::staging(
                    path,
                    format!("{} [{}] did not take the planned range", edit.name, edit.field),
                ));
            }
        }

        if text == manifest.source() {
            return Ok(None);
        }
        Ok(Some(Staged {
            path: path.to_path_buf(),
            text,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_fs::MemoryFileSystem;

    #[tokio::test]
    async fn test_update_file() {
        let fs = MemoryFileSystem::empty("/w").unwrap();
        fs.add_file("package.json", "old content").unwrap();

        let updater = FileUpdater::new(false);
        updater
            .update_file(&fs, Path::new("/w/package.json"), "new content")
            .await
            .unwrap();

        assert_eq!(fs.contents("/w/package.json").as_deref(), Some("new content"));
        assert!(fs.contents("/w/package.json.tmp").is_none());
    }

    #[tokio::test]
    async fn test_dry_run() {
        let fs = MemoryFileSystem::empty("/w").unwrap();
        fs.add_file("package.json", "old content").unwrap();

        let updater = FileUpdater::new(true);
        updater
            .update_file(&fs, Path::new("/w/package.json"), "new content")
            .await
            .unwrap();

        assert_eq!(fs.contents("/w/package.json").as_deref(), Some("old content"));
    }

    #[tokio::test]
    async fn test_failed_rename_cleans_up() {
        let fs = MemoryFileSystem::empty("/w").unwrap();
        fs.add_file("Cargo.toml", "old").unwrap();
        fs.fail_writes_to("/w/Cargo.toml").unwrap();

        let updater = FileUpdater::new(false);
        assert!(updater
            .update_file(&fs, Path::new("/w/Cargo.toml"), "new")
            .await
            .is_err());
        assert_eq!(fs.contents("/w/Cargo.toml").as_deref(), Some("old"));
        assert!(fs.contents("/w/Cargo.toml.tmp").is_none());
    }
}
