//! Run report: what was applied, skipped and advised

use crate::applier::ApplyOutcome;
use crate::engine::Session;
use crate::plan::{Advisory, Edit, SkippedEntry, UpgradePlan};
use crate::workspace::ManifestWarning;
use crate::{Ecosystem, Error, FailedWrite};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

/// Outcome of one run. Produced even when apply fails part-way.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// When the report was built
    pub generated_at: DateTime<Utc>,
    /// Workspace root
    pub root: PathBuf,
    /// Ecosystem of the run
    pub ecosystem: Ecosystem,
    /// Nothing was written
    pub dry_run: bool,
    /// Edits written to disk (for a dry run, edits that would be)
    pub applied: Vec<Edit>,
    /// Declarations left alone, with reasons
    pub skipped: Vec<SkippedEntry>,
    /// Non-blocking notes
    pub advisories: Vec<Advisory>,
    /// Manifests that could not be loaded
    pub warnings: Vec<ManifestWarning>,
    /// Manifest writes that failed
    pub failures: Vec<FailedWrite>,
    /// Error that stopped the run, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Report {
    /// Report for `plan` before anything is applied; every edit counts as
    /// applied until an outcome says otherwise.
    pub fn from_plan(session: &Session, plan: &UpgradePlan, dry_run: bool) -> Self {
        let workspace = session.workspace();
        Self {
            generated_at: Utc::now(),
            root: workspace.root().to_path_buf(),
            ecosystem: plan.ecosystem(),
            dry_run,
            applied: plan.edits().to_vec(),
            skipped: plan.skipped().to_vec(),
            advisories: plan.advisories().to_vec(),
            warnings: workspace.warnings().to_vec(),
            failures: Vec::new(),
            error: None,
        }
    }

    /// Fold in the result of applying the plan.
    ///
    /// A partial apply keeps only the edits whose manifest was written; any
    /// other error means nothing was written.
    pub fn record(&mut self, outcome: &Result<ApplyOutcome, Error>) {
        let err = match outcome {
            Ok(outcome) => {
                self.dry_run = outcome.dry_run;
                return;
            }
            Err(err) => err,
        };

        self.error = Some(err.to_string());
        match err {
            Error::PartialApply { succeeded, failed } => {
                self.applied.retain(|edit| succeeded.contains(&edit.path));
                self.failures = failed.clone();
            }
            Error::Staging { path, reason } => {
                self.applied.clear();
                self.failures.push(FailedWrite {
                    path: path.clone(),
                    message: reason.clone(),
                });
            }
            _ => self.applied.clear(),
        }
    }

    /// No failures and no error
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.error.is_none()
    }

    /// Manifests touched by the applied edits, sorted
    pub fn written_paths(&self) -> Vec<&PathBuf> {
        let mut paths: Vec<&PathBuf> = self.applied.iter().map(|e| &e.path).collect();
        paths.sort();
        paths.dedup();
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{AdvisoryKind, UpgradePlan};
    use crate::{DependencyField, EntryKey, ManifestId, Manifest, Workspace};

    fn plan() -> UpgradePlan {
        UpgradePlan::new(
            Ecosystem::JavaScript,
            vec![
                Edit::set(
                    ManifestId(0),
                    EntryKey::new("/w/package.json", DependencyField::Runtime, "a"),
                    "^1.0.0",
                    "^1.1.0",
                ),
                Edit::set(
                    ManifestId(1),
                    EntryKey::new("/w/b/package.json", DependencyField::Dev, "a"),
                    "^1.0.0",
                    "^1.1.0",
                ),
            ],
            vec![Advisory::new(AdvisoryKind::NoUsagesFound, "no usages found for z")],
            Vec::new(),
        )
    }

    fn report() -> Report {
        let workspace = Workspace::new(
            "/w",
            Ecosystem::JavaScript,
            vec![Manifest::parse("/w/package.json", Ecosystem::JavaScript, "{}".into()).unwrap()],
        );
        let session = Session::new(workspace, Vec::new());
        Report::from_plan(&session, &plan(), false)
    }

    #[test]
    fn test_partial_apply_keeps_written_edits() {
        let mut report = report();
        report.record(&Err(Error::PartialApply {
            succeeded: vec![PathBuf::from("/w/package.json")],
            failed: vec![FailedWrite {
                path: PathBuf::from("/w/b/package.json"),
                message: "disk full".into(),
            }],
        }));

        assert_eq!(report.applied.len(), 1);
        assert_eq!(report.written_paths(), vec![&PathBuf::from("/w/package.json")]);
        assert_eq!(report.failures.len(), 1);
        assert!(!report.is_success());
    }

    #[test]
    fn test_staging_error_clears_applied() {
        let mut report = report();
        report.record(&Err(Error::Staging {
            path: PathBuf::from("/w/package.json"),
            reason: "file changed on disk since it was read".into(),
        }));
        assert!(report.applied.is_empty());
        assert_eq!(report.failures[0].path, PathBuf::from("/w/package.json"));
    }

    #[test]
    fn test_serializes_to_json() {
        let mut report = report();
        report.record(&Ok(ApplyOutcome {
            written: vec![PathBuf::from("/w/package.json")],
            dry_run: false,
        }));
        assert!(report.is_success());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["ecosystem"], "javascript");
        assert_eq!(json["applied"][0]["new_range"], "^1.1.0");
        assert_eq!(json["advisories"][0]["kind"], "no-usages-found");
        assert!(json.get("error").is_none());
        assert!(json["generated_at"].is_string());
    }
}
