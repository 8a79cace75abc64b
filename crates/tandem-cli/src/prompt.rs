//! Interactive selection with dialoguer prompts.

use dialoguer::theme::ColorfulTheme;
use dialoguer::{MultiSelect, Select};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tandem_engine::{
    Advisory, Candidate, Candidates, EntryKey, ManifestId, Selection, Selector, Session, Verdict,
};

/// Why a prompt produced no answer
#[derive(Debug)]
pub enum PromptFailure {
    /// The user dismissed the prompt
    Dismissed,
    /// The terminal could not be used
    Terminal(dialoguer::Error),
}

/// Selector backed by terminal prompts.
///
/// The `Selector` callbacks cannot fail, so a dismissed or broken prompt is
/// remembered and surfaced through [`TerminalSelector::take_failure`].
pub struct TerminalSelector {
    theme: ColorfulTheme,
    manifests: ManifestPaths,
    failure: Option<PromptFailure>,
}

impl TerminalSelector {
    pub fn new(session: &Session) -> Self {
        Self {
            theme: ColorfulTheme::default(),
            manifests: ManifestPaths::from_session(session),
            failure: None,
        }
    }

    /// The failure of the last prompt, if any
    pub fn take_failure(&mut self) -> Option<PromptFailure> {
        self.failure.take()
    }

    fn record<T>(&mut self, answer: dialoguer::Result<Option<T>>) -> Option<T> {
        match answer {
            Ok(Some(value)) => Some(value),
            Ok(None) => {
                self.failure = Some(PromptFailure::Dismissed);
                None
            }
            Err(err) => {
                self.failure = Some(PromptFailure::Terminal(err));
                None
            }
        }
    }
}

impl Selector for TerminalSelector {
    fn select(&mut self, candidates: &Candidates, advisories: &[Advisory]) -> Selection {
        for advisory in advisories {
            eprintln!("  {}", advisory.message);
        }

        let offered: Vec<&Candidate> = candidates.actionable().collect();
        if offered.is_empty() {
            return Selection::default();
        }

        let labels: Vec<String> = offered.iter().map(|c| candidate_label(c)).collect();
        let defaults: Vec<bool> = offered.iter().map(|c| preselected(c)).collect();
        let answer = MultiSelect::with_theme(&self.theme)
            .with_prompt("Dependencies to upgrade (space to toggle, enter to confirm)")
            .items(&labels)
            .defaults(&defaults)
            .interact_opt();
        let Some(chosen) = self.record(answer) else {
            return Selection::default();
        };

        let chosen: Vec<&Candidate> = chosen.into_iter().map(|i| offered[i]).collect();
        let mut selection = Selection::of(chosen.iter().map(|c| c.name.clone()));

        let gated = gated_entries(&chosen, &self.manifests);
        if !gated.is_empty() {
            let labels: Vec<&str> = gated.iter().map(|(_, label)| label.as_str()).collect();
            let answer = MultiSelect::with_theme(&self.theme)
                .with_prompt("Also rewrite these pinned or major-bump declarations?")
                .items(&labels)
                .interact_opt();
            let Some(confirmed) = self.record(answer) else {
                return Selection::default();
            };
            selection
                .confirmed
                .extend(confirmed.into_iter().map(|i| gated[i].0.clone()));
        }

        selection
    }

    fn choose_range(&mut self, name: &str, choices: &[String], default: usize) -> usize {
        let labels = range_labels(choices);
        let answer = Select::with_theme(&self.theme)
            .with_prompt(format!(
                "{name} is already used with other ranges; which one do you want to add?"
            ))
            .items(&labels)
            .default(default)
            .interact_opt();
        self.record(answer).unwrap_or(default)
    }
}

/// One line per candidate: name, target, classification and how many
/// declarations would move
pub fn candidate_label(candidate: &Candidate) -> String {
    let analysis = &candidate.analysis;
    let moving = analysis
        .entries
        .iter()
        .filter(|e| e.verdict.new_range().is_some())
        .count();
    format!(
        "{} -> {} ({}, {} of {} declarations)",
        candidate.name,
        analysis.target,
        analysis.classification,
        moving,
        analysis.entries.len()
    )
}

/// Candidates that change without any confirmation start checked
fn preselected(candidate: &Candidate) -> bool {
    candidate
        .analysis
        .entries
        .iter()
        .any(|e| matches!(e.verdict, Verdict::Rewrite { major_bump: false, .. }))
}

/// Manifest paths of a session, for turning usage entries into entry keys
pub struct ManifestPaths {
    root: PathBuf,
    paths: BTreeMap<ManifestId, PathBuf>,
}

impl ManifestPaths {
    pub fn from_session(session: &Session) -> Self {
        let workspace = session.workspace();
        Self {
            root: workspace.root().to_path_buf(),
            paths: workspace
                .iter()
                .map(|(id, manifest)| (id, manifest.path().to_path_buf()))
                .collect(),
        }
    }

    fn path(&self, id: ManifestId) -> Option<&Path> {
        self.paths.get(&id).map(PathBuf::as_path)
    }

    fn display(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .display()
            .to_string()
    }
}

/// Pinned and major-bump declarations of the chosen candidates, which need
/// per-entry confirmation
pub fn gated_entries(chosen: &[&Candidate], manifests: &ManifestPaths) -> Vec<(EntryKey, String)> {
    let mut gated = Vec::new();
    for candidate in chosen {
        for entry in &candidate.analysis.entries {
            let (new_range, why) = match &entry.verdict {
                Verdict::PinMismatch { new_range } => (new_range, "pinned"),
                Verdict::Rewrite {
                    new_range,
                    major_bump: true,
                } => (new_range, "major"),
                _ => continue,
            };
            let Some(path) = manifests.path(entry.entry.manifest) else {
                continue;
            };
            let key = EntryKey::new(path, entry.entry.field, candidate.name.clone());
            let label = format!(
                "{} [{}] {} {} -> {} ({})",
                manifests.display(path),
                key.field,
                candidate.name,
                entry.entry.range,
                new_range,
                why
            );
            gated.push((key, label));
        }
    }
    gated
}

/// The first choice is always the fresh range for the latest release
pub fn range_labels(choices: &[String]) -> Vec<String> {
    choices
        .iter()
        .enumerate()
        .map(|(i, range)| {
            if i == 0 {
                format!("{range} (latest version)")
            } else {
                format!("{range} (used in this workspace)")
            }
        })
        .collect()
}
