//! The `FileSystem` trait the engine reads and writes manifests through.

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

/// What a path points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Missing,
    File,
    Dir,
    Symlink,
}

/// How directories are walked when looking for manifests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryOptions {
    /// Skip files matched by `.gitignore` and `.git/info/exclude`
    pub respect_gitignore: bool,
    /// Descend into directories whose name starts with `.`
    pub include_hidden: bool,
    pub follow_symlinks: bool,
    /// Depth limit below the walked directory; `None` walks everything
    pub max_depth: Option<usize>,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            respect_gitignore: true,
            include_hidden: false,
            follow_symlinks: false,
            max_depth: None,
        }
    }
}

/// A manifest search: one file name, the globs to skip, and walk options.
///
/// Ignore patterns are matched against paths relative to the walked
/// directory, e.g. `**/node_modules/**`.
#[derive(Debug, Clone, Copy)]
pub struct ManifestQuery<'a> {
    pub file_name: &'a str,
    pub ignore_patterns: &'a [String],
    pub options: &'a DiscoveryOptions,
}

impl<'a> ManifestQuery<'a> {
    pub fn new(file_name: &'a str, ignore_patterns: &'a [String], options: &'a DiscoveryOptions) -> Self {
        Self {
            file_name,
            ignore_patterns,
            options,
        }
    }
}

/// Filesystem scoped to one workspace root.
///
/// Relative paths are taken from the root. Any path that resolves outside
/// it is refused with `io::ErrorKind::PermissionDenied`.
#[async_trait::async_trait]
pub trait FileSystem: Send + Sync {
    /// The root every path is checked against
    fn root(&self) -> &Path;

    /// Absolute form of `path`, refused when it leaves the root
    fn resolve(&self, path: &Path) -> io::Result<PathBuf>;

    async fn entry_kind(&self, path: &Path) -> io::Result<EntryKind>;

    async fn exists(&self, path: &Path) -> io::Result<bool> {
        Ok(self.entry_kind(path).await? != EntryKind::Missing)
    }

    /// Read a UTF-8 file.
    ///
    /// # Errors
    ///
    /// `NotFound` for a missing file, `InvalidData` for invalid UTF-8.
    async fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Replace the contents of a file. Parent directories must exist.
    async fn write(&self, path: &Path, contents: &str) -> io::Result<()>;

    /// Remove a regular file; symlinks are refused
    async fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Move `from` over `to`, replacing it
    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    async fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Every file under `dir` named `query.file_name`, as absolute paths in
    /// lexicographic order.
    async fn find_manifests(
        &self,
        dir: &Path,
        query: &ManifestQuery<'_>,
    ) -> io::Result<BTreeSet<PathBuf>>;
}
