//! In-memory filesystem implementation.

use crate::{EntryKind, FileSystem, ManifestQuery};
use globset::{Glob, GlobSet, GlobSetBuilder};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// In-memory filesystem rooted at a virtual directory.
///
/// Cloning is cheap and clones share storage, so a test can hand one clone to
/// the engine and inspect the other afterwards.
///
/// # Fault injection
///
/// [`MemoryFileSystem::fail_writes_to`] makes every write or rename that
/// targets the given path fail with `io::ErrorKind::Other`. Reads are unaffected.
#[derive(Clone, Debug)]
pub struct MemoryFileSystem {
    root: PathBuf,
    files: Arc<RwLock<BTreeMap<PathBuf, Vec<u8>>>>,
    failing: Arc<RwLock<BTreeSet<PathBuf>>>,
}

impl MemoryFileSystem {
    /// Create a filesystem from pre-loaded files.
    ///
    /// Relative keys are resolved against `root`.
    pub fn new(
        root: impl AsRef<Path>,
        files: impl IntoIterator<Item = (PathBuf, Vec<u8>)>,
    ) -> io::Result<Self> {
        let root = normalize_path_sync(root.as_ref())?;
        let fs = Self {
            root,
            files: Arc::new(RwLock::new(BTreeMap::new())),
            failing: Arc::new(RwLock::new(BTreeSet::new())),
        };

        for (path, contents) in files {
            fs.add_file(path, contents)?;
        }

        Ok(fs)
    }

    /// Create an empty filesystem.
    pub fn empty(root: impl AsRef<Path>) -> io::Result<Self> {
        Self::new(root, std::iter::empty())
    }

    /// Add or replace a file (used during setup; bypasses fault injection).
    pub fn add_file(&self, path: impl AsRef<Path>, contents: impl Into<Vec<u8>>) -> io::Result<()> {
        let normalized = self.validate_path(path.as_ref())?;
        self.files.write().insert(normalized, contents.into());
        Ok(())
    }

    /// Current contents of a file, if present and valid UTF-8.
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<String> {
        let normalized = self.validate_path(path.as_ref()).ok()?;
        let files = self.files.read();
        files
            .get(&normalized)
            .and_then(|bytes| String::from_utf8(bytes.clone()).ok())
    }

    /// All file paths currently stored, in lexicographic order.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.read().keys().cloned().collect()
    }

    /// Make writes and renames targeting `path` fail.
    pub fn fail_writes_to(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let normalized = self.validate_path(path.as_ref())?;
        self.failing.write().insert(normalized);
        Ok(())
    }

    /// Clear all injected failures.
    pub fn clear_failures(&self) {
        self.failing.write().clear();
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Validate path against project root.
    fn validate_path(&self, path: &Path) -> io::Result<PathBuf> {
        let normalized = normalize_path_sync(&self.absolute(path))?;

        if !normalized.starts_with(&self.root) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!(
                    "Path traversal detected: {} is outside {}",
                    normalized.display(),
                    self.root.display()
                ),
            ));
        }

        Ok(normalized)
    }

    fn check_writable(&self, path: &Path) -> io::Result<()> {
        if self.failing.read().contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("injected write failure: {}", path.display()),
            ));
        }
        Ok(())
    }

    fn is_dir(&self, path: &Path) -> bool {
        let files = self.files.read();
        files
            .keys()
            .any(|candidate| candidate != path && candidate.starts_with(path))
    }
}

/// Syntactic normalization; `..` may not climb above the first component.
fn normalize_path_sync(path: &Path) -> io::Result<PathBuf> {
    let mut components = Vec::new();
    let mut is_absolute = false;

    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => {
                is_absolute = true;
                components.clear();
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if components.is_empty() {
                    return Err(io::Error::new(
                        io::ErrorKind::PermissionDenied,
                        "Path attempts to escape project root using ..",
                    ));
                }
                components.pop();
            }
            Component::Normal(name) => components.push(name),
        }
    }

    let mut result = PathBuf::new();
    if is_absolute {
        result.push("/");
    }
    for component in components {
        result.push(component);
    }

    Ok(result)
}

fn build_ignore_set(patterns: &[String]) -> io::Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
}

#[async_trait::async_trait]
impl FileSystem for MemoryFileSystem {
    fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &Path) -> io::Result<PathBuf> {
        self.validate_path(path)
    }

    async fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let normalized = self.validate_path(path)?;
        let bytes = self.files.read().get(&normalized).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("File not found: {}", normalized.display()),
            )
        })?;
        String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    async fn entry_kind(&self, path: &Path) -> io::Result<EntryKind> {
        let normalized = self.validate_path(path)?;
        if self.files.read().contains_key(&normalized) {
            Ok(EntryKind::File)
        } else if normalized == self.root || self.is_dir(&normalized) {
            Ok(EntryKind::Dir)
        } else {
            Ok(EntryKind::Missing)
        }
    }

    async fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        let normalized = self.validate_path(path)?;
        self.check_writable(&normalized)?;
        self.files
            .write()
            .insert(normalized, contents.as_bytes().to_vec());
        Ok(())
    }

    async fn remove_file(&self, path: &Path) -> io::Result<()> {
        let normalized = self.validate_path(path)?;
        self.files.write().remove(&normalized).map(|_| ()).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("File not found: {}", normalized.display()),
            )
        })
    }

    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let from = self.validate_path(from)?;
        let to = self.validate_path(to)?;
        self.check_writable(&to)?;

        let mut files = self.files.write();
        let contents = files.remove(&from).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("File not found: {}", from.display()),
            )
        })?;
        files.insert(to, contents);
        Ok(())
    }

    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        // Directories are implied by the files beneath them.
        self.validate_path(path)?;
        Ok(())
    }

    async fn find_manifests(
        &self,
        dir: &Path,
        query: &ManifestQuery<'_>,
    ) -> io::Result<BTreeSet<PathBuf>> {
        let dir = self.validate_path(dir)?;
        let skip = build_ignore_set(query.ignore_patterns)?;
        let options = query.options;

        let files = self.files.read();
        let found = files
            .keys()
            .filter(|path| {
                let Ok(relative) = path.strip_prefix(&dir) else {
                    return false;
                };
                if path.file_name().and_then(|n| n.to_str()) != Some(query.file_name) {
                    return false;
                }
                // the file itself counts as one level
                if options
                    .max_depth
                    .is_some_and(|depth| relative.components().count() > depth)
                {
                    return false;
                }
                if !options.include_hidden && relative.components().any(is_hidden) {
                    return false;
                }
                !skip.is_match(relative)
            })
            .cloned()
            .collect();

        Ok(found)
    }
}

fn is_hidden(component: Component<'_>) -> bool {
    component
        .as_os_str()
        .to_str()
        .is_some_and(|name| name.starts_with('.'))
}
