//! Upgrade plans: edits, advisories and the pin guard

use crate::manifest::FieldEdit;
use crate::version::RangeSpec;
use crate::{DependencyField, Ecosystem, EntryKey, Error, ManifestId, Result};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

/// Which declarations a caller has explicitly approved
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Approval {
    /// Nothing approved
    #[default]
    None,
    /// Everything approved
    All,
    /// Every declaration of these dependencies
    Dependencies(BTreeSet<String>),
    /// These individual declarations
    Entries(BTreeSet<EntryKey>),
}

impl Approval {
    /// Whether the declaration `key` is approved
    pub fn approves(&self, key: &EntryKey) -> bool {
        match self {
            Approval::None => false,
            Approval::All => true,
            Approval::Dependencies(names) => names.contains(&key.name),
            Approval::Entries(keys) => keys.contains(key),
        }
    }

    /// Approve every declaration of the given dependencies
    pub fn dependencies<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Approval::Dependencies(names.into_iter().map(Into::into).collect())
    }
}

/// Overrides for one planning call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanOptions {
    /// Exact pins that may be rewritten
    pub override_pinned: Approval,
    /// Caret/tilde ranges that may leave their caret line (a new major, or a new 0.x minor)
    pub allow_major: Approval,
}

/// A field-level change to one manifest.
///
/// `old_range` is absent for insertions, `new_range` for removals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edit {
    /// Handle into the workspace arena
    #[serde(skip)]
    pub manifest: ManifestId,
    /// Manifest path
    pub path: PathBuf,
    /// Field the declaration lives in
    pub field: DependencyField,
    /// Dependency name
    pub name: String,
    /// Range before the edit
    pub old_range: Option<String>,
    /// Range after the edit
    pub new_range: Option<String>,
    /// The edit rewrites an exact pin under an explicit override
    pub overrides_pin: bool,
}

impl Edit {
    /// Replace an existing range
    pub fn set(
        manifest: ManifestId,
        key: EntryKey,
        old_range: impl Into<String>,
        new_range: impl Into<String>,
    ) -> Self {
        Self {
            manifest,
            path: key.path,
            field: key.field,
            name: key.name,
            old_range: Some(old_range.into()),
            new_range: Some(new_range.into()),
            overrides_pin: false,
        }
    }

    /// Add a new declaration
    pub fn insert(manifest: ManifestId, key: EntryKey, range: impl Into<String>) -> Self {
        Self {
            manifest,
            path: key.path,
            field: key.field,
            name: key.name,
            old_range: None,
            new_range: Some(range.into()),
            overrides_pin: false,
        }
    }

    /// Delete a declaration
    pub fn remove(manifest: ManifestId, key: EntryKey, old_range: impl Into<String>) -> Self {
        Self {
            manifest,
            path: key.path,
            field: key.field,
            name: key.name,
            old_range: Some(old_range.into()),
            new_range: None,
            overrides_pin: false,
        }
    }

    /// Mark the edit as overriding an exact pin
    pub fn overriding_pin(mut self) -> Self {
        self.overrides_pin = true;
        self
    }

    /// Declaration this edit touches
    pub fn key(&self) -> EntryKey {
        EntryKey::new(self.path.clone(), self.field, self.name.clone())
    }

    /// The manifest-level operation
    pub fn as_field_edit(&self) -> Option<FieldEdit<'_>> {
        match (&self.old_range, &self.new_range) {
            (Some(_), Some(range)) => Some(FieldEdit::Set {
                field: self.field,
                name: &self.name,
                range,
            }),
            (None, Some(range)) => Some(FieldEdit::Insert {
                field: self.field,
                name: &self.name,
                range,
            }),
            (Some(_), None) => Some(FieldEdit::Remove {
                field: self.field,
                name: &self.name,
            }),
            (None, None) => None,
        }
    }
}

impl fmt::Display for Edit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.old_range, &self.new_range) {
            (Some(old), Some(new)) => write!(f, "{} {} -> {}", self.name, old, new),
            (None, Some(new)) => write!(f, "+ {} {}", self.name, new),
            (Some(old), None) => write!(f, "- {} {}", self.name, old),
            (None, None) => write!(f, "{}", self.name),
        }
    }
}

/// Advisory category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdvisoryKind {
    /// Exact pin left alone (no override)
    PinnedVersion,
    /// Caret/tilde range left alone because the target is a new major
    MajorVersionBump,
    /// Complex range that does not admit the target
    ManualEditRequired,
    /// Target is below the declared version
    Downgrade,
    /// Workspace, path, git, alias or tag declaration
    NonRegistry,
    /// Declared range does not parse
    UnparseableRange,
    /// Requested dependency is not declared anywhere
    NoUsagesFound,
    /// Registry query failed for a dependency
    RegistryFailure,
    /// Manifest skipped because it does not parse
    ManifestParseFailure,
    /// Dependency to add is already declared in the target manifest
    AlreadyDeclared,
    /// A lockfile will be out of date once manifests change
    LockfileStaleReminder,
}

impl AdvisoryKind {
    /// Stable identifier used in reports
    pub fn as_str(&self) -> &'static str {
        match self {
            AdvisoryKind::PinnedVersion => "pinned-version",
            AdvisoryKind::MajorVersionBump => "major-version-bump",
            AdvisoryKind::ManualEditRequired => "manual-edit-required",
            AdvisoryKind::Downgrade => "downgrade",
            AdvisoryKind::NonRegistry => "non-registry",
            AdvisoryKind::UnparseableRange => "unparseable-range",
            AdvisoryKind::NoUsagesFound => "no-usages-found",
            AdvisoryKind::RegistryFailure => "registry-failure",
            AdvisoryKind::ManifestParseFailure => "manifest-parse-failure",
            AdvisoryKind::AlreadyDeclared => "already-declared",
            AdvisoryKind::LockfileStaleReminder => "lockfile-stale-reminder",
        }
    }
}

impl fmt::Display for AdvisoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-blocking note attached to a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Advisory {
    /// Category
    pub kind: AdvisoryKind,
    /// Human-readable message
    pub message: String,
    /// Affected manifest or lockfile
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Affected dependency
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependency: Option<String>,
}

impl Advisory {
    /// New advisory with no path or dependency
    pub fn new(kind: AdvisoryKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            path: None,
            dependency: None,
        }
    }

    /// Attach the affected path
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Attach the affected dependency
    pub fn with_dependency(mut self, name: impl Into<String>) -> Self {
        self.dependency = Some(name.into());
        self
    }
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

/// A declaration the plan leaves alone
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedEntry {
    /// Manifest path
    pub path: PathBuf,
    /// Field
    pub field: DependencyField,
    /// Dependency name
    pub name: String,
    /// Declared range
    pub range: String,
    /// Why it was skipped
    pub reason: AdvisoryKind,
}

/// Edits and advisories for one invocation.
///
/// Immutable once built; edits are sorted by manifest path, field and name.
#[derive(Debug, Clone, Serialize)]
pub struct UpgradePlan {
    ecosystem: Ecosystem,
    edits: Vec<Edit>,
    advisories: Vec<Advisory>,
    skipped: Vec<SkippedEntry>,
}

impl UpgradePlan {
    /// Build a plan; edits are put in canonical order.
    pub fn new(
        ecosystem: Ecosystem,
        mut edits: Vec<Edit>,
        advisories: Vec<Advisory>,
        skipped: Vec<SkippedEntry>,
    ) -> Self {
        edits.sort_by(|a, b| {
            (&a.path, a.field, &a.name).cmp(&(&b.path, b.field, &b.name))
        });
        Self {
            ecosystem,
            edits,
            advisories,
            skipped,
        }
    }

    /// Ecosystem of the manifests
    pub fn ecosystem(&self) -> Ecosystem {
        self.ecosystem
    }

    /// Edits in canonical order
    pub fn edits(&self) -> &[Edit] {
        &self.edits
    }

    /// Advisories in the order they were raised
    pub fn advisories(&self) -> &[Advisory] {
        &self.advisories
    }

    /// Declarations left alone
    pub fn skipped(&self) -> &[SkippedEntry] {
        &self.skipped
    }

    /// Whether applying would change nothing
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Manifests the plan writes, sorted
    pub fn affected_paths(&self) -> BTreeSet<&PathBuf> {
        self.edits.iter().map(|e| &e.path).collect()
    }

    /// Check the pin guard.
    ///
    /// # Errors
    ///
    /// `Error::Plan` if an edit changes an exact pin without `overrides_pin`.
    pub fn verify(&self) -> Result<()> {
        for edit in &self.edits {
            let (Some(old), Some(new)) = (&edit.old_range, &edit.new_range) else {
                continue;
            };
            if old == new || edit.overrides_pin {
                continue;
            }
            let pinned = RangeSpec::parse(old, self.ecosystem)
                .map(|spec| spec.is_pinned())
                .unwrap_or(false);
            if pinned {
                return Err(Error::Plan(format!(
                    "{} changes pinned {} {} -> {} without an override",
                    edit.path.display(),
                    edit.name,
                    old,
                    new
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(path: &str, name: &str) -> EntryKey {
        EntryKey::new(path, DependencyField::Runtime, name)
    }

    #[test]
    fn test_edits_are_sorted() {
        let plan = UpgradePlan::new(
            Ecosystem::JavaScript,
            vec![
                Edit::set(ManifestId(1), key("/w/b/package.json", "a"), "^1.0.0", "^1.1.0"),
                Edit::set(ManifestId(0), key("/w/a/package.json", "z"), "^1.0.0", "^1.1.0"),
                Edit::set(ManifestId(0), key("/w/a/package.json", "b"), "^1.0.0", "^1.1.0"),
            ],
            Vec::new(),
            Vec::new(),
        );
        let order: Vec<_> = plan
            .edits()
            .iter()
            .map(|e| (e.path.to_str().unwrap(), e.name.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("/w/a/package.json", "b"),
                ("/w/a/package.json", "z"),
                ("/w/b/package.json", "a"),
            ]
        );
    }

    #[test]
    fn test_verify_rejects_unflagged_pin_change() {
        let edit = Edit::set(ManifestId(0), key("/w/package.json", "lodash"), "4.17.15", "4.17.21");
        let plan = UpgradePlan::new(Ecosystem::JavaScript, vec![edit.clone()], vec![], vec![]);
        assert!(matches!(plan.verify(), Err(Error::Plan(_))));

        let plan = UpgradePlan::new(
            Ecosystem::JavaScript,
            vec![edit.overriding_pin()],
            vec![],
            vec![],
        );
        assert!(plan.verify().is_ok());
    }

    #[test]
    fn test_verify_allows_ranges_and_removals() {
        let plan = UpgradePlan::new(
            Ecosystem::Rust,
            vec![
                Edit::set(ManifestId(0), key("/w/Cargo.toml", "serde"), "1.0", "1.0.210"),
                Edit::remove(ManifestId(0), key("/w/Cargo.toml", "log"), "=0.4.20"),
            ],
            vec![],
            vec![],
        );
        assert!(plan.verify().is_ok());
    }

    #[test]
    fn test_approval() {
        let k = key("/w/package.json", "lodash");
        assert!(!Approval::None.approves(&k));
        assert!(Approval::All.approves(&k));
        assert!(Approval::dependencies(["lodash"]).approves(&k));
        assert!(!Approval::dependencies(["react"]).approves(&k));
        assert!(Approval::Entries([k.clone()].into_iter().collect()).approves(&k));
    }

    #[test]
    fn test_advisory_kind_serializes_kebab_case() {
        let json = serde_json::to_string(&AdvisoryKind::LockfileStaleReminder).unwrap();
        assert_eq!(json, "\"lockfile-stale-reminder\"");
        assert_eq!(AdvisoryKind::NoUsagesFound.as_str(), "no-usages-found");
    }

    #[test]
    fn test_field_edit_mapping() {
        let insert = Edit::insert(ManifestId(0), key("/w/package.json", "a"), "^1.0.0");
        assert!(matches!(insert.as_field_edit(), Some(FieldEdit::Insert { .. })));
        let remove = Edit::remove(ManifestId(0), key("/w/package.json", "a"), "^1.0.0");
        assert!(matches!(remove.as_field_edit(), Some(FieldEdit::Remove { .. })));
        assert_eq!(remove.to_string(), "- a ^1.0.0");
    }
}
