//! `FileSystem` over the real disk.

use crate::{EntryKind, FileSystem, ManifestQuery};
use ignore::overrides::{Override, OverrideBuilder};
use ignore::WalkBuilder;
use std::collections::BTreeSet;
use std::io;
use std::path::{Component, Path, PathBuf};
use tokio::task;

/// Disk-backed filesystem confined to a canonicalized root.
///
/// Blocking `std::fs` calls run on tokio's blocking pool.
#[derive(Debug, Clone)]
pub struct NativeFileSystem {
    root: PathBuf,
}

impl NativeFileSystem {
    /// # Errors
    ///
    /// Fails when `root` does not exist or cannot be canonicalized.
    pub fn new(root: impl AsRef<Path>) -> io::Result<Self> {
        let given = root.as_ref();
        let root = given.canonicalize().map_err(|e| {
            io::Error::new(
                e.kind(),
                format!("workspace root {} is not accessible: {}", given.display(), e),
            )
        })?;
        Ok(Self { root })
    }

    /// Resolve through the deepest existing ancestor so that symlinks are
    /// followed for existing parts and files not yet created still resolve.
    fn confine(&self, path: &Path) -> io::Result<PathBuf> {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        let lexical = lexical(&absolute);

        let mut existing = lexical.as_path();
        let mut rest = Vec::new();
        let resolved = loop {
            match existing.canonicalize() {
                Ok(canonical) => break canonical,
                Err(_) => match (existing.parent(), existing.file_name()) {
                    (Some(parent), Some(name)) => {
                        rest.push(name.to_os_string());
                        existing = parent;
                    }
                    _ => break lexical.clone(),
                },
            }
        };
        let resolved = rest.into_iter().rev().fold(resolved, |acc, name| acc.join(name));

        if resolved.starts_with(&self.root) {
            Ok(resolved)
        } else {
            Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!(
                    "{} is outside the workspace root {}",
                    resolved.display(),
                    self.root.display()
                ),
            ))
        }
    }
}

/// Drop `.` and apply `..` without touching the disk
fn lexical(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out = PathBuf::from(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(name) => out.push(name),
        }
    }
    out
}

async fn blocking<T, F>(f: F) -> io::Result<T>
where
    F: FnOnce() -> io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    task::spawn_blocking(f)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
}

fn kind_of(path: &Path) -> io::Result<EntryKind> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_symlink() => Ok(EntryKind::Symlink),
        Ok(meta) if meta.is_dir() => Ok(EntryKind::Dir),
        Ok(_) => Ok(EntryKind::File),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(EntryKind::Missing),
        Err(e) => Err(e),
    }
}

#[async_trait::async_trait]
impl FileSystem for NativeFileSystem {
    fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &Path) -> io::Result<PathBuf> {
        self.confine(path)
    }

    async fn entry_kind(&self, path: &Path) -> io::Result<EntryKind> {
        let path = self.confine(path)?;
        blocking(move || kind_of(&path)).await
    }

    async fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let path = self.confine(path)?;
        blocking(move || std::fs::read_to_string(&path)).await
    }

    async fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        let path = self.confine(path)?;
        let contents = contents.to_owned();
        blocking(move || std::fs::write(&path, contents)).await
    }

    async fn remove_file(&self, path: &Path) -> io::Result<()> {
        let path = self.confine(path)?;
        blocking(move || {
            if kind_of(&path)? == EntryKind::Symlink {
                return Err(io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    format!("refusing to remove symlink {}", path.display()),
                ));
            }
            std::fs::remove_file(&path)
        })
        .await
    }

    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let from = self.confine(from)?;
        let to = self.confine(to)?;
        blocking(move || std::fs::rename(&from, &to)).await
    }

    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let path = self.confine(path)?;
        blocking(move || std::fs::create_dir_all(&path)).await
    }

    async fn find_manifests(
        &self,
        dir: &Path,
        query: &ManifestQuery<'_>,
    ) -> io::Result<BTreeSet<PathBuf>> {
        let dir = self.confine(dir)?;
        let root = self.root.clone();
        let file_name = query.file_name.to_owned();
        let ignores = skip_overrides(&dir, query.ignore_patterns)?;
        let options = query.options.clone();

        blocking(move || {
            let mut walker = WalkBuilder::new(&dir);
            walker
                .hidden(!options.include_hidden)
                .git_ignore(options.respect_gitignore)
                .git_exclude(options.respect_gitignore)
                .git_global(false)
                .require_git(false)
                .follow_links(options.follow_symlinks)
                .max_depth(options.max_depth)
                .overrides(ignores);

            let mut found = BTreeSet::new();
            for entry in walker.build() {
                let entry = entry.map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
                let is_file = entry.file_type().is_some_and(|ft| ft.is_file());
                if !is_file || entry.file_name() != file_name.as_str() {
                    continue;
                }
                // a symlinked manifest may point outside the root
                if let Ok(canonical) = entry.path().canonicalize() {
                    if canonical.starts_with(&root) {
                        found.insert(canonical);
                    }
                }
            }
            Ok(found)
        })
        .await
    }
}

/// Negated overrides, which the walker treats as "skip this"
fn skip_overrides(dir: &Path, patterns: &[String]) -> io::Result<Override> {
    let invalid = |e: ignore::Error| io::Error::new(io::ErrorKind::InvalidInput, e);
    let mut builder = OverrideBuilder::new(dir);
    for pattern in patterns {
        builder.add(&format!("!{pattern}")).map_err(invalid)?;
    }
    builder.build().map_err(invalid)
}
