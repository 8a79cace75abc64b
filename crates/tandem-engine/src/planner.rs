//! Upgrade Planner: turns analyses and a selection into an [`UpgradePlan`].
//!
//! Planning is pure: it reads the workspace snapshot and never touches storage.

use crate::conflict::{EntryAnalysis, Verdict};
use crate::plan::{Advisory, AdvisoryKind, Edit, PlanOptions, SkippedEntry, UpgradePlan};
use crate::select::{Candidate, Candidates, Selection};
use crate::{DependencyField, EntryKey, ManifestId, Workspace};
use std::path::Path;

/// A dependency to add to one manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Addition {
    /// Dependency name
    pub name: String,
    /// Range to declare
    pub range: String,
}

/// Pure planning functions over a workspace snapshot
pub struct Planner<'a> {
    workspace: &'a Workspace,
}

impl<'a> Planner<'a> {
    /// Plan against `workspace`
    pub fn new(workspace: &'a Workspace) -> Self {
        Self { workspace }
    }

    fn path_of(&self, id: ManifestId) -> &'a Path {
        self.workspace
            .get(id)
            .map(|m| m.path())
            .unwrap_or_else(|| self.workspace.root())
    }

    /// Plan the selected upgrades.
    ///
    /// `extra` advisories (lockfile reminders, load warnings) are appended
    /// after the candidates' and skipped entries' advisories.
    pub fn plan_upgrade(
        &self,
        candidates: &Candidates,
        selection: &Selection,
        options: &PlanOptions,
        extra: &[Advisory],
    ) -> UpgradePlan {
        let mut edits = Vec::new();
        let mut skipped = Vec::new();
        let mut advisories = candidates.advisories.clone();

        for candidate in &candidates.items {
            if !selection.dependencies.contains(&candidate.name) {
                continue;
            }
            for analysis in &candidate.analysis.entries {
                self.plan_entry(
                    candidate,
                    analysis,
                    selection,
                    options,
                    &mut edits,
                    &mut skipped,
                    &mut advisories,
                );
            }
        }

        advisories.extend_from_slice(extra);
        tracing::info!(
            edits = edits.len(),
            skipped = skipped.len(),
            "planned upgrade"
        );
        UpgradePlan::new(self.workspace.ecosystem(), edits, advisories, skipped)
    }

    #[allow(clippy::too_many_arguments)]
    fn plan_entry(
        &self,
        candidate: &Candidate,
        analysis: &EntryAnalysis,
        selection: &Selection,
        options: &PlanOptions,
        edits: &mut Vec<Edit>,
        skipped: &mut Vec<SkippedEntry>,
        advisories: &mut Vec<Advisory>,
    ) {
        let entry = &analysis.entry;
        let path = self.path_of(entry.manifest);
        let key = EntryKey::new(path, entry.field, candidate.name.clone());
        let confirmed = selection.confirmed.contains(&key);
        let target = &candidate.analysis.target;

        let mut skip = |reason: AdvisoryKind, message: String| {
            skipped.push(SkippedEntry {
                path: path.to_path_buf(),
                field: entry.field,
                name: candidate.name.clone(),
                range: entry.range.clone(),
                reason,
            });
            advisories.push(
                Advisory::new(reason, message)
                    .with_path(path)
                    .with_dependency(candidate.name.clone()),
            );
        };

        match &analysis.verdict {
            Verdict::AtTarget | Verdict::SatisfiedComplex => {}
            Verdict::Rewrite {
                new_range,
                major_bump,
            } => {
                if *major_bump && !(confirmed || options.allow_major.approves(&key)) {
                    let compatible = analysis
                        .spec
                        .as_ref()
                        .and_then(|spec| candidate.resolution.highest_satisfying(spec.range()));
                    let hint = match compatible {
                        Some(version) => format!("; highest compatible is {}", version),
                        None => String::new(),
                    };
                    skip(
                        AdvisoryKind::MajorVersionBump,
                        format!(
                            "{} {} would move to a new major ({}); confirm to upgrade{}",
                            candidate.name, entry.range, target, hint
                        ),
                    );
                } else {
                    edits.push(Edit::set(entry.manifest, key, &entry.range, new_range));
                }
            }
            Verdict::PinMismatch { new_range } => {
                if confirmed || options.override_pinned.approves(&key) {
                    edits.push(
                        Edit::set(entry.manifest, key, &entry.range, new_range).overriding_pin(),
                    );
                } else {
                    skip(
                        AdvisoryKind::PinnedVersion,
                        format!(
                            "{} is pinned to {}; override to move it to {}",
                            candidate.name, entry.range, target
                        ),
                    );
                }
            }
            Verdict::ManualEdit => skip(
                AdvisoryKind::ManualEditRequired,
                format!(
                    "{} range {} does not admit {} and cannot be rewritten automatically",
                    candidate.name, entry.range, target
                ),
            ),
            Verdict::Downgrade => skip(
                AdvisoryKind::Downgrade,
                format!(
                    "{} {} is already above {}; not downgrading",
                    candidate.name, entry.range, target
                ),
            ),
            Verdict::NonRegistry(source) => skip(
                AdvisoryKind::NonRegistry,
                format!(
                    "{} is declared as a {:?} dependency and is left alone",
                    candidate.name, source
                ),
            ),
            Verdict::Unparseable(message) => skip(
                AdvisoryKind::UnparseableRange,
                format!("{} range {:?} is invalid: {}", candidate.name, entry.range, message),
            ),
        }
    }

    /// Plan adding dependencies to one manifest.
    ///
    /// A dependency already declared in any field of the target is skipped
    /// with an `already-declared` advisory.
    pub fn plan_add(
        &self,
        target: ManifestId,
        field: DependencyField,
        additions: &[Addition],
        mut advisories: Vec<Advisory>,
        extra: &[Advisory],
    ) -> UpgradePlan {
        let mut edits = Vec::new();
        let path = self.path_of(target);

        if let Some(manifest) = self.workspace.get(target) {
            for addition in additions {
                let declared = manifest.fields_declaring(&addition.name);
                if let Some(existing) = declared.first() {
                    advisories.push(
                        Advisory::new(
                            AdvisoryKind::AlreadyDeclared,
                            format!(
                                "{} is already declared in {} of {}",
                                addition.name,
                                existing,
                                path.display()
                            ),
                        )
                        .with_path(path)
                        .with_dependency(addition.name.clone()),
                    );
                    continue;
                }
                if edits.iter().any(|e: &Edit| e.name == addition.name) {
                    continue;
                }
                edits.push(Edit::insert(
                    target,
                    EntryKey::new(path, field, addition.name.clone()),
                    addition.range.clone(),
                ));
            }
        }

        advisories.extend_from_slice(extra);
        tracing::info!(edits = edits.len(), "planned add");
        UpgradePlan::new(self.workspace.ecosystem(), edits, advisories, Vec::new())
    }

    /// Plan removing dependencies from the given manifests, from every field
    /// that declares them.
    pub fn plan_remove(
        &self,
        targets: &[ManifestId],
        names: &[String],
        extra: &[Advisory],
    ) -> UpgradePlan {
        let mut edits = Vec::new();
        let mut advisories = Vec::new();

        for name in names {
            let mut found = false;
            for &id in targets {
                let Some(manifest) = self.workspace.get(id) else {
                    continue;
                };
                for field in manifest.fields_declaring(name) {
                    if let Some(declaration) = manifest.declaration(field, name) {
                        found = true;
                        edits.push(Edit::remove(
                            id,
                            EntryKey::new(manifest.path(), field, name.clone()),
                            declaration.range.clone(),
                        ));
                    }
                }
            }
            if !found {
                advisories.push(
                    Advisory::new(
                        AdvisoryKind::NoUsagesFound,
                        format!("no usages found for {}", name),
                    )
                    .with_dependency(name.clone()),
                );
            }
        }

        advisories.extend_from_slice(extra);
        tracing::info!(edits = edits.len(), "planned remove");
        UpgradePlan::new(self.workspace.ecosystem(), edits, advisories, Vec::new())
    }
}
