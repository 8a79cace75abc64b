//! Selection callback between analysis and planning

use crate::conflict::{Analysis, Classification};
use crate::plan::Advisory;
use crate::resolver::Resolution;
use crate::{Ecosystem, EntryKey};
use std::collections::BTreeSet;

/// A dependency the caller may choose to upgrade
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Dependency name
    pub name: String,
    /// Published versions and the resolved latest
    pub resolution: Resolution,
    /// Classification against the target version
    pub analysis: Analysis,
}

impl Candidate {
    /// Dependency name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Workspace-level classification
    pub fn classification(&self) -> Classification {
        self.analysis.classification
    }
}

/// Classified dependencies offered for selection
#[derive(Debug, Clone)]
pub struct Candidates {
    /// Ecosystem of the run
    pub ecosystem: Ecosystem,
    /// One per requested dependency that resolved and has usages, sorted by name
    pub items: Vec<Candidate>,
    /// Requested dependencies that produced no candidate, and why
    pub advisories: Vec<Advisory>,
}

impl Candidates {
    /// Candidate by name
    pub fn get(&self, name: &str) -> Option<&Candidate> {
        self.items.iter().find(|c| c.name == name)
    }

    /// Candidates that would change at least one declaration
    pub fn actionable(&self) -> impl Iterator<Item = &Candidate> {
        self.items.iter().filter(|c| c.analysis.has_changes())
    }
}

/// What the caller chose
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Dependencies to plan
    pub dependencies: BTreeSet<String>,
    /// Individual declarations explicitly confirmed. Confirming a pinned or
    /// major-bump declaration approves rewriting it.
    pub confirmed: BTreeSet<EntryKey>,
}

impl Selection {
    /// Select dependencies by name, confirming nothing
    pub fn of<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            dependencies: names.into_iter().map(Into::into).collect(),
            confirmed: BTreeSet::new(),
        }
    }

    /// Whether nothing was selected
    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }
}

/// Presents classified candidates and returns the chosen subset.
///
/// The engine has no terminal dependency; the CLI implements this with a
/// prompt, tests with closures.
pub trait Selector {
    /// Choose which candidates to plan
    fn select(&mut self, candidates: &Candidates, advisories: &[Advisory]) -> Selection;

    /// Choose a range for a dependency being added. `choices[default]` is
    /// preselected; the returned index must be within `choices`.
    fn choose_range(&mut self, _name: &str, _choices: &[String], default: usize) -> usize {
        default
    }
}

impl<T> Selector for T
where
    T: FnMut(&Candidates, &[Advisory]) -> Selection,
{
    fn select(&mut self, candidates: &Candidates, advisories: &[Advisory]) -> Selection {
        self(candidates, advisories)
    }
}

/// Selects every actionable candidate; used for non-interactive runs
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectAll;

impl Selector for SelectAll {
    fn select(&mut self, candidates: &Candidates, _advisories: &[Advisory]) -> Selection {
        Selection::of(candidates.actionable().map(|c| c.name.clone()))
    }
}
