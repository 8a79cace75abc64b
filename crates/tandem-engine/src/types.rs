//! Core types shared across the engine

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tandem_registry::RegistryKind;

/// Manifest ecosystem. One engine run covers exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    /// JavaScript/TypeScript (npm, pnpm, yarn, bun), `package.json`
    JavaScript,
    /// Rust (Cargo), `Cargo.toml`
    Rust,
}

impl Ecosystem {
    /// Manifest file name for this ecosystem
    pub fn manifest_file_name(&self) -> &'static str {
        match self {
            Ecosystem::JavaScript => "package.json",
            Ecosystem::Rust => "Cargo.toml",
        }
    }

    /// Registry that versions are resolved against
    pub fn registry(&self) -> RegistryKind {
        match self {
            Ecosystem::JavaScript => RegistryKind::Npm,
            Ecosystem::Rust => RegistryKind::CratesIo,
        }
    }

    /// Dependency fields this ecosystem declares, in canonical order
    pub fn fields(&self) -> &'static [DependencyField] {
        match self {
            Ecosystem::JavaScript => &[
                DependencyField::Runtime,
                DependencyField::Dev,
                DependencyField::Peer,
                DependencyField::Optional,
            ],
            Ecosystem::Rust => &[
                DependencyField::Runtime,
                DependencyField::Dev,
                DependencyField::Build,
                DependencyField::Workspace,
            ],
        }
    }
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ecosystem::JavaScript => write!(f, "javascript"),
            Ecosystem::Rust => write!(f, "rust"),
        }
    }
}

/// Dependency field category within a manifest.
///
/// The derived ordering is the canonical field order used when sorting edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DependencyField {
    /// `dependencies`
    Runtime,
    /// `devDependencies` / `dev-dependencies`
    Dev,
    /// `peerDependencies` (npm only)
    Peer,
    /// `optionalDependencies` (npm only)
    Optional,
    /// `build-dependencies` (Cargo only)
    Build,
    /// `[workspace.dependencies]` (Cargo only)
    Workspace,
}

impl DependencyField {
    /// Key of this field in a manifest of the given ecosystem.
    ///
    /// Returns `None` for fields the ecosystem does not have. The Cargo
    /// workspace field is nested: its key is `dependencies` inside `[workspace]`.
    pub fn key(&self, ecosystem: Ecosystem) -> Option<&'static str> {
        match (ecosystem, self) {
            (Ecosystem::JavaScript, DependencyField::Runtime) => Some("dependencies"),
            (Ecosystem::JavaScript, DependencyField::Dev) => Some("devDependencies"),
            (Ecosystem::JavaScript, DependencyField::Peer) => Some("peerDependencies"),
            (Ecosystem::JavaScript, DependencyField::Optional) => Some("optionalDependencies"),
            (Ecosystem::Rust, DependencyField::Runtime) => Some("dependencies"),
            (Ecosystem::Rust, DependencyField::Dev) => Some("dev-dependencies"),
            (Ecosystem::Rust, DependencyField::Build) => Some("build-dependencies"),
            (Ecosystem::Rust, DependencyField::Workspace) => Some("dependencies"),
            _ => None,
        }
    }

    /// Field for a manifest key
    pub fn from_key(ecosystem: Ecosystem, key: &str) -> Option<Self> {
        ecosystem
            .fields()
            .iter()
            .copied()
            .filter(|f| *f != DependencyField::Workspace)
            .find(|f| f.key(ecosystem) == Some(key))
    }

    /// Human-readable label (the JavaScript key, or the Cargo table name)
    pub fn label(&self) -> &'static str {
        match self {
            DependencyField::Runtime => "dependencies",
            DependencyField::Dev => "devDependencies",
            DependencyField::Peer => "peerDependencies",
            DependencyField::Optional => "optionalDependencies",
            DependencyField::Build => "build-dependencies",
            DependencyField::Workspace => "workspace.dependencies",
        }
    }
}

impl fmt::Display for DependencyField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Stable handle to a manifest in a [`crate::Workspace`] arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ManifestId(pub usize);

/// Where a declaration points. Only `Registry` declarations are ever rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DependencySource {
    /// A version range resolved against the registry
    Registry,
    /// npm `workspace:` protocol or Cargo `workspace = true`
    Workspace,
    /// `file:`/`link:` (npm) or `path = …` (Cargo)
    Path,
    /// Git repository
    Git,
    /// Tarball or other URL
    Url,
    /// npm `npm:` alias or Cargo `package = …` rename
    Alias,
    /// npm dist-tag such as `latest` or `next`
    Tag,
    /// Cargo alternate registry (`registry = …`)
    AlternateRegistry,
}

impl DependencySource {
    /// Whether the declaration is a plain registry range
    pub fn is_registry(&self) -> bool {
        matches!(self, DependencySource::Registry)
    }
}

/// Identifies one declaration across runs: manifest path, field and name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntryKey {
    /// Manifest path
    pub path: PathBuf,
    /// Dependency field
    pub field: DependencyField,
    /// Dependency name
    pub name: String,
}

impl EntryKey {
    /// Create a new entry key
    pub fn new(path: impl Into<PathBuf>, field: DependencyField, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            field,
            name: name.into(),
        }
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}", self.path.display(), self.field, self.name)
    }
}
