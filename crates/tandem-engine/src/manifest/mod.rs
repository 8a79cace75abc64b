//! Manifest Store: loading, parsing and minimal-diff serialization of manifests

mod cargo_toml;
mod package_json;

use crate::{DependencyField, DependencySource, Ecosystem, Error, Result};
use futures::stream::{self, StreamExt};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tandem_fs::FileSystem;

/// One dependency declaration inside a field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// Dependency name (the key in the field)
    pub name: String,
    /// Declared range as written (for non-registry declarations, the version if any, else `*`)
    pub range: String,
    /// Where the declaration points
    pub source: DependencySource,
}

/// All declarations of one dependency field, in declaration order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDeclarations {
    /// Which field
    pub field: DependencyField,
    /// Declarations, in the order they appear in the manifest
    pub declarations: Vec<Declaration>,
}

/// A parsed manifest together with the text it was parsed from
#[derive(Debug, Clone)]
pub struct Manifest {
    path: PathBuf,
    ecosystem: Ecosystem,
    name: Option<String>,
    fields: Vec<FieldDeclarations>,
    source: String,
    digest: String,
}

/// A field-level change to a manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldEdit<'a> {
    /// Replace the range of an existing declaration
    Set {
        /// Field holding the declaration
        field: DependencyField,
        /// Dependency name
        name: &'a str,
        /// Range to write
        range: &'a str,
    },
    /// Add a new declaration (creating the field if needed)
    Insert {
        /// Field to add to
        field: DependencyField,
        /// Dependency name
        name: &'a str,
        /// Range to write
        range: &'a str,
    },
    /// Delete a declaration
    Remove {
        /// Field holding the declaration
        field: DependencyField,
        /// Dependency name
        name: &'a str,
    },
}

/// SHA-256 of manifest text, hex encoded
pub fn digest(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

impl Manifest {
    /// Parse manifest text.
    ///
    /// # Errors
    ///
    /// `Error::Parse` naming `path` if the text is malformed or a dependency
    /// field is not a mapping of names to ranges.
    pub fn parse(path: impl Into<PathBuf>, ecosystem: Ecosystem, source: String) -> Result<Self> {
        let path = path.into();
        let parsed = match ecosystem {
            Ecosystem::JavaScript => package_json::parse(&source),
            Ecosystem::Rust => cargo_toml::parse(&source),
        };
        let (name, fields) = parsed.map_err(|message| Error::parse(&path, message))?;

        Ok(Self {
            digest: digest(&source),
            path,
            ecosystem,
            name,
            fields,
            source,
        })
    }

    /// Absolute path of the manifest
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory containing the manifest
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or(&self.path)
    }

    /// Ecosystem of the manifest
    pub fn ecosystem(&self) -> Ecosystem {
        self.ecosystem
    }

    /// Package name, if the manifest declares one
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Dependency fields in declaration order
    pub fn fields(&self) -> &[FieldDeclarations] {
        &self.fields
    }

    /// Text the manifest was parsed from
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Digest of [`Manifest::source`]
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Look up one declaration
    pub fn declaration(&self, field: DependencyField, name: &str) -> Option<&Declaration> {
        self.fields
            .iter()
            .find(|f| f.field == field)
            .and_then(|f| f.declarations.iter().find(|d| d.name == name))
    }

    /// Every field that declares `name`
    pub fn fields_declaring(&self, name: &str) -> Vec<DependencyField> {
        self.fields
            .iter()
            .filter(|f| f.declarations.iter().any(|d| d.name == name))
            .map(|f| f.field)
            .collect()
    }

    /// Produce new text with `edits` applied to [`Manifest::source`].
    ///
    /// Only the bytes belonging to the edited declarations change; with no
    /// edits the source is returned unchanged.
    pub fn serialize(&self, edits: &[FieldEdit<'_>]) -> Result<String> {
        apply_edits(&self.path, self.ecosystem, &self.source, edits)
    }
}

/// Apply field edits to manifest text one after another.
pub(crate) fn apply_edits(
    path: &Path,
    ecosystem: Ecosystem,
    source: &str,
    edits: &[FieldEdit<'_>],
) -> Result<String> {
    if edits.is_empty() {
        return Ok(source.to_string());
    }

    let result = match ecosystem {
        Ecosystem::JavaScript => edits
            .iter()
            .try_fold(source.to_string(), |text, edit| package_json::apply_edit(&text, edit)),
        Ecosystem::Rust => cargo_toml::apply_edits(source, edits),
    };

    result.map_err(|message| Error::parse(path, message))
}

/// Reads and parses manifests through a [`FileSystem`]
pub struct ManifestStore<F: FileSystem> {
    fs: Arc<F>,
    ecosystem: Ecosystem,
}

impl<F: FileSystem> ManifestStore<F> {
    /// Create a store for one ecosystem
    pub fn new(fs: Arc<F>, ecosystem: Ecosystem) -> Self {
        Self { fs, ecosystem }
    }

    /// Load and parse one manifest
    pub async fn load(&self, path: &Path) -> Result<Manifest> {
        let source = self.fs.read_to_string(path).await?;
        tracing::debug!(path = %path.display(), bytes = source.len(), "loaded manifest");
        Manifest::parse(path, self.ecosystem, source)
    }

    /// Load many manifests with bounded concurrency, preserving input order.
    pub async fn load_all(
        &self,
        paths: &[PathBuf],
        concurrency: usize,
    ) -> Vec<(PathBuf, Result<Manifest>)> {
        stream::iter(paths.iter().cloned())
            .map(|path| async move {
                let result = self.load(&path).await;
                (path, result)
            })
            .buffered(concurrency.max(1))
            .collect()
            .await
    }
}
