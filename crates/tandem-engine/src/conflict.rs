//! Conflict Analyzer: how a dependency's declarations relate to a target version

use crate::index::UsageEntry;
use crate::version::{ParsedVersion, RangeShape, RangeSpec};
use crate::{DependencySource, Ecosystem};
use serde::Serialize;
use std::fmt;

/// State of a dependency across the workspace relative to a target version.
/// Exactly one applies to any set of declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Classification {
    /// Every declaration already accepts the target as written
    Uniform,
    /// Declarations differ but all can move to the target without overriding a pin
    DivergentCompatible,
    /// At least one exact pin names a different version
    DivergentIncompatible,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Classification::Uniform => "uniform",
            Classification::DivergentCompatible => "divergent-compatible",
            Classification::DivergentIncompatible => "divergent-incompatible",
        })
    }
}

/// What should happen to one declaration to reach the target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Base version already equals the target
    AtTarget,
    /// Caret/tilde range can be rewritten
    Rewrite {
        /// Range after the rewrite
        new_range: String,
        /// The rewrite leaves the declared caret line (`1.x` to `2`, `0.3` to `0.4`)
        major_bump: bool,
    },
    /// Exact pin on another version; needs an override
    PinMismatch {
        /// Range after the rewrite
        new_range: String,
    },
    /// Complex range that already admits the target
    SatisfiedComplex,
    /// Complex range that does not admit the target
    ManualEdit,
    /// Rewriting would lower the declared version
    Downgrade,
    /// Not a registry range
    NonRegistry(DependencySource),
    /// Declared range could not be parsed
    Unparseable(String),
}

impl Verdict {
    /// Whether this verdict produces an edit when approved
    pub fn new_range(&self) -> Option<&str> {
        match self {
            Verdict::Rewrite { new_range, .. } | Verdict::PinMismatch { new_range } => {
                Some(new_range)
            }
            _ => None,
        }
    }
}

/// One declaration with its verdict
#[derive(Debug, Clone)]
pub struct EntryAnalysis {
    /// The declaration
    pub entry: UsageEntry,
    /// Parsed range, for registry declarations that parse
    pub spec: Option<RangeSpec>,
    /// What to do with it
    pub verdict: Verdict,
}

/// Classification of one dependency for one target
#[derive(Debug, Clone)]
pub struct Analysis {
    /// Dependency name
    pub name: String,
    /// Version the workspace would move to
    pub target: ParsedVersion,
    /// Workspace-level state
    pub classification: Classification,
    /// Per-declaration verdicts, in usage-index order
    pub entries: Vec<EntryAnalysis>,
}

impl Analysis {
    /// Whether any declaration would change if everything were approved
    pub fn has_changes(&self) -> bool {
        self.entries.iter().any(|e| e.verdict.new_range().is_some())
    }

    /// Distinct declared ranges of registry declarations, in first-seen order
    pub fn declared_ranges(&self) -> Vec<&str> {
        let mut ranges: Vec<&str> = Vec::new();
        for analysis in &self.entries {
            if analysis.entry.source.is_registry() && !ranges.contains(&analysis.entry.range.as_str())
            {
                ranges.push(&analysis.entry.range);
            }
        }
        ranges
    }
}

/// Classify the declarations of `name` against `target`.
pub fn classify(
    name: &str,
    entries: &[UsageEntry],
    target: &ParsedVersion,
    ecosystem: Ecosystem,
) -> Analysis {
    let entries: Vec<EntryAnalysis> = entries
        .iter()
        .map(|entry| analyze_entry(entry, target, ecosystem))
        .collect();

    let pin_mismatch = entries.iter().any(|e| {
        e.spec
            .as_ref()
            .is_some_and(|spec| spec.is_pinned() && spec.base() != Some(target))
    });
    let uniform = entries.iter().all(|e| {
        matches!(
            e.verdict,
            Verdict::AtTarget
                | Verdict::SatisfiedComplex
                | Verdict::NonRegistry(_)
                | Verdict::Unparseable(_)
        )
    });

    let classification = if pin_mismatch {
        Classification::DivergentIncompatible
    } else if uniform {
        Classification::Uniform
    } else {
        Classification::DivergentCompatible
    };

    tracing::debug!(name, target = %target, %classification, "classified dependency");

    Analysis {
        name: name.to_string(),
        target: target.clone(),
        classification,
        entries,
    }
}

fn analyze_entry(entry: &UsageEntry, target: &ParsedVersion, ecosystem: Ecosystem) -> EntryAnalysis {
    if !entry.source.is_registry() {
        return EntryAnalysis {
            entry: entry.clone(),
            spec: None,
            verdict: Verdict::NonRegistry(entry.source.clone()),
        };
    }

    let spec = match RangeSpec::parse(&entry.range, ecosystem) {
        Ok(spec) => spec,
        Err(err) => {
            return EntryAnalysis {
                entry: entry.clone(),
                spec: None,
                verdict: Verdict::Unparseable(err.to_string()),
            }
        }
    };

    let verdict = match (spec.shape(), spec.base(), spec.rewrite(target)) {
        (RangeShape::Complex, _, _) | (_, None, _) | (_, _, None) => {
            if spec.satisfies(target) {
                Verdict::SatisfiedComplex
            } else {
                Verdict::ManualEdit
            }
        }
        (_, Some(base), Some(_)) if base == target => Verdict::AtTarget,
        (_, Some(base), Some(_)) if base > target => Verdict::Downgrade,
        (RangeShape::Exact, _, Some(new_range)) => Verdict::PinMismatch { new_range },
        (_, _, Some(new_range)) => Verdict::Rewrite {
            major_bump: spec.is_breaking_bump(target),
            new_range,
        },
    };

    EntryAnalysis {
        entry: entry.clone(),
        spec: Some(spec),
        verdict,
    }
}
