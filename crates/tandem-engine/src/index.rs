//! Usage Index: every declaration of every dependency across a workspace

use crate::{DependencyField, DependencySource, ManifestId, Workspace};
use std::collections::BTreeMap;

/// One declaration of a dependency inside one manifest field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageEntry {
    /// Declaring manifest
    pub manifest: ManifestId,
    /// Field the declaration lives in
    pub field: DependencyField,
    /// Range as declared
    pub range: String,
    /// Where the declaration points
    pub source: DependencySource,
}

/// Dependency name to usage entries.
///
/// Entries for a name are ordered by manifest (scan order), then by field
/// declaration order within the manifest.
#[derive(Debug, Clone, Default)]
pub struct UsageIndex {
    entries: BTreeMap<String, Vec<UsageEntry>>,
}

impl UsageIndex {
    /// Index every dependency field of every manifest
    pub fn build(workspace: &Workspace) -> Self {
        let mut entries: BTreeMap<String, Vec<UsageEntry>> = BTreeMap::new();

        for (id, manifest) in workspace.iter() {
            for field in manifest.fields() {
                for declaration in &field.declarations {
                    entries
                        .entry(declaration.name.clone())
                        .or_default()
                        .push(UsageEntry {
                            manifest: id,
                            field: field.field,
                            range: declaration.range.clone(),
                            source: declaration.source.clone(),
                        });
                }
            }
        }

        tracing::debug!(dependencies = entries.len(), "built usage index");
        Self { entries }
    }

    /// Entries for `name`; empty if no manifest declares it
    pub fn entries_for(&self, name: &str) -> &[UsageEntry] {
        self.entries.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every indexed dependency name, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Names with at least one registry declaration, sorted
    pub fn registry_names(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|(_, entries)| entries.iter().any(|e| e.source.is_registry()))
            .map(|(name, _)| name.as_str())
    }

    /// Number of distinct dependency names
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is indexed
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
