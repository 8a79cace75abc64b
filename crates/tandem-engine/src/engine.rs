//! Engine facade: scan, resolve, plan and apply against one workspace

use crate::applier::{ApplyOutcome, PlanApplier};
use crate::conflict::classify;
use crate::index::UsageIndex;
use crate::lockfile::{LockfileAdvisor, LockfileRecord, PackageManager};
use crate::manifest::ManifestStore;
use crate::plan::{Advisory, AdvisoryKind, Approval, PlanOptions, UpgradePlan};
use crate::planner::{Addition, Planner};
use crate::resolver::{ResolverOptions, VersionResolver};
use crate::scanner::{ScanOptions, WorkspaceScanner};
use crate::select::{Candidate, Candidates, Selection, Selector};
use crate::version::{ParsedRange, RangePrefix};
use crate::{DependencyField, Ecosystem, EntryKey, Error, ManifestId, Result, Workspace};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tandem_fs::FileSystem;
use tandem_registry::{validate_package_name, Registry};
use tokio_util::sync::CancellationToken;

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Manifest discovery
    pub scan: ScanOptions,
    /// Registry queries
    pub resolver: ResolverOptions,
    /// Force an ecosystem instead of detecting it from the root
    pub ecosystem: Option<Ecosystem>,
    /// Operator for newly added dependencies
    pub default_range_prefix: RangePrefix,
    /// Dependencies whose exact pins may always be rewritten
    pub pinned_override: BTreeSet<String>,
    /// Manifests parsed concurrently
    pub load_concurrency: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            scan: ScanOptions::default(),
            resolver: ResolverOptions::default(),
            ecosystem: None,
            default_range_prefix: RangePrefix::Caret,
            pinned_override: BTreeSet::new(),
            load_concurrency: 16,
        }
    }
}

/// A dependency named on the command line, with an optional version or range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    /// Dependency name
    pub name: String,
    /// Requested version or range
    pub range: Option<String>,
}

impl PackageSpec {
    /// Spec with no version
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            range: None,
        }
    }
}

impl FromStr for PackageSpec {
    type Err = Error;

    /// Parses `name` or `name@range`; a leading `@` belongs to an npm scope.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let split = s
            .char_indices()
            .skip(1)
            .find(|(_, c)| *c == '@')
            .map(|(i, _)| i);
        let (name, range) = match split {
            Some(i) => (&s[..i], Some(&s[i + 1..])),
            None => (s, None),
        };
        if name.is_empty() || range.is_some_and(str::is_empty) {
            return Err(Error::InvalidVersion(
                s.to_string(),
                "expected <name> or <name>@<version>".to_string(),
            ));
        }
        Ok(Self {
            name: name.to_string(),
            range: range.map(str::to_string),
        })
    }
}

/// Which dependencies to consider for upgrade
#[derive(Debug, Clone, Default)]
pub struct UpgradeRequest {
    /// Named dependencies; ignored when `all` is set
    pub targets: Vec<PackageSpec>,
    /// Every dependency with a registry declaration
    pub all: bool,
}

impl UpgradeRequest {
    /// Every registry dependency in the workspace
    pub fn all() -> Self {
        Self {
            targets: Vec::new(),
            all: true,
        }
    }

    /// The named dependencies, each to its latest version
    pub fn named<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            targets: names.into_iter().map(PackageSpec::new).collect(),
            all: false,
        }
    }
}

/// Dependencies to add to one manifest
#[derive(Debug, Clone)]
pub struct AddRequest {
    /// Manifest path, directory or package name; the root manifest if unset
    pub target: Option<String>,
    /// Dependencies to add
    pub packages: Vec<PackageSpec>,
    /// Field to add them to
    pub field: DependencyField,
}

/// Dependencies to remove
#[derive(Debug, Clone)]
pub struct RemoveRequest {
    /// Manifest path, directory or package name; the root manifest if unset
    pub target: Option<String>,
    /// Remove from every manifest in the workspace
    pub everywhere: bool,
    /// Dependency names
    pub names: Vec<String>,
}

/// Immutable snapshot of a workspace for one run
#[derive(Debug, Clone)]
pub struct Session {
    workspace: Workspace,
    index: UsageIndex,
    lockfiles: Vec<LockfileRecord>,
    package_manager: PackageManager,
}

impl Session {
    /// Snapshot of `workspace` with the given lockfiles
    pub fn new(workspace: Workspace, lockfiles: Vec<LockfileRecord>) -> Self {
        let index = UsageIndex::build(&workspace);
        let package_manager =
            LockfileAdvisor::package_manager(&lockfiles, workspace.root(), workspace.ecosystem());
        Self {
            workspace,
            index,
            lockfiles,
            package_manager,
        }
    }

    /// Loaded manifests
    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Declarations by dependency name
    pub fn index(&self) -> &UsageIndex {
        &self.index
    }

    /// Lockfiles found at the root and next to manifests
    pub fn lockfiles(&self) -> &[LockfileRecord] {
        &self.lockfiles
    }

    /// Package manager inferred from the root lockfile
    pub fn package_manager(&self) -> PackageManager {
        self.package_manager
    }

    /// Advisories every plan carries: skipped manifests, then lockfile reminders
    pub fn advisories(&self) -> Vec<Advisory> {
        let mut advisories: Vec<Advisory> = self
            .workspace
            .warnings()
            .iter()
            .map(|warning| {
                Advisory::new(
                    AdvisoryKind::ManifestParseFailure,
                    format!("{} was skipped: {}", warning.path.display(), warning.message),
                )
                .with_path(&warning.path)
            })
            .collect();
        advisories.extend(LockfileAdvisor::advisories(
            &self.lockfiles,
            self.package_manager,
        ));
        advisories
    }

    fn target_manifest(&self, target: Option<&str>) -> Result<ManifestId> {
        match target {
            None => self.workspace.root_manifest().ok_or_else(|| {
                Error::Workspace(format!(
                    "no {} at {}",
                    self.workspace.ecosystem().manifest_file_name(),
                    self.workspace.root().display()
                ))
            }),
            Some(target) => self
                .workspace
                .resolve_target(target)
                .or_else(|| {
                    let path = Path::new(target);
                    path.is_absolute()
                        .then(|| self.workspace.closest_manifest(path))
                        .flatten()
                })
                .ok_or_else(|| Error::Workspace(format!("no manifest matches '{}'", target))),
        }
    }
}

/// Wires the scanner, resolver, planner and applier together
pub struct UpgradeEngine<F: FileSystem> {
    fs: Arc<F>,
    registries: Vec<Arc<dyn Registry>>,
    options: EngineOptions,
}

impl<F: FileSystem> UpgradeEngine<F> {
    /// Create an engine over a filesystem
    pub fn new(fs: Arc<F>, options: EngineOptions) -> Self {
        Self {
            fs,
            registries: Vec::new(),
            options,
        }
    }

    /// Register a registry client; it serves the ecosystem matching its kind
    pub fn with_registry(mut self, registry: Arc<dyn Registry>) -> Self {
        self.registries.retain(|r| r.kind() != registry.kind());
        self.registries.push(registry);
        self
    }

    /// Engine options
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    fn resolver(&self, ecosystem: Ecosystem) -> Result<VersionResolver> {
        let registry = self
            .registries
            .iter()
            .find(|r| r.kind() == ecosystem.registry())
            .cloned()
            .ok_or_else(|| {
                Error::Workspace(format!("no {} registry configured", ecosystem.registry()))
            })?;
        Ok(VersionResolver::new(
            registry,
            ecosystem,
            self.options.resolver.clone(),
        ))
    }

    /// Scan and load the workspace at `root`.
    ///
    /// # Errors
    ///
    /// `Error::Scan` for a bad root, `Error::Workspace` for invalid member
    /// patterns. Malformed manifests are not errors; they surface as
    /// warnings on the session.
    pub async fn open(&self, root: &Path) -> Result<Session> {
        let scanner = WorkspaceScanner::new(self.fs.clone(), self.options.scan.clone());
        let outcome = scanner.scan(root, self.options.ecosystem).await?;

        let store = ManifestStore::new(self.fs.clone(), outcome.ecosystem);
        let workspace = Workspace::load(&store, &outcome, self.options.load_concurrency).await;
        let lockfiles = LockfileAdvisor::scan(
            self.fs.as_ref(),
            workspace.root(),
            workspace.iter().map(|(_, m)| m.dir()),
            workspace.ecosystem(),
        )
        .await?;

        let session = Session::new(workspace, lockfiles);
        tracing::info!(
            root = %session.workspace.root().display(),
            ecosystem = %session.workspace.ecosystem(),
            manifests = session.workspace.len(),
            skipped = session.workspace.warnings().len(),
            dependencies = session.index.len(),
            lockfiles = session.lockfiles.len(),
            package_manager = %session.package_manager,
            "opened workspace"
        );
        Ok(session)
    }

    /// Resolve and classify the requested dependencies.
    ///
    /// Names no manifest declares, names declared only through non-registry
    /// sources, and names whose registry query fails become advisories
    /// instead of candidates; the registry is never asked about a name with
    /// no usages.
    ///
    /// # Errors
    ///
    /// `Error::Cancelled` if `cancel` fires during resolution.
    pub async fn prepare_upgrade(
        &self,
        session: &Session,
        request: &UpgradeRequest,
        cancel: &CancellationToken,
    ) -> Result<Candidates> {
        let ecosystem = session.workspace.ecosystem();
        let mut advisories = Vec::new();

        let requested: BTreeMap<String, Option<String>> = if request.all {
            session
                .index
                .registry_names()
                .map(|name| (name.to_string(), None))
                .collect()
        } else {
            request
                .targets
                .iter()
                .map(|t| (t.name.clone(), t.range.clone()))
                .collect()
        };

        let mut to_resolve = Vec::new();
        let mut ranges: BTreeMap<String, ParsedRange> = BTreeMap::new();
        for (name, range) in &requested {
            let entries = session.index.entries_for(name);
            if entries.is_empty() {
                advisories.push(
                    Advisory::new(
                        AdvisoryKind::NoUsagesFound,
                        format!("no usages found for {}", name),
                    )
                    .with_dependency(name.clone()),
                );
                continue;
            }
            if !entries.iter().any(|e| e.source.is_registry()) {
                advisories.push(
                    Advisory::new(
                        AdvisoryKind::NonRegistry,
                        format!("{} is only declared through non-registry sources", name),
                    )
                    .with_dependency(name.clone()),
                );
                continue;
            }
            if let Some(raw) = range {
                match ParsedRange::parse(raw, ecosystem) {
                    Ok(parsed) => {
                        ranges.insert(name.clone(), parsed);
                    }
                    Err(err) => {
                        advisories.push(
                            Advisory::new(
                                AdvisoryKind::UnparseableRange,
                                format!("requested version {} for {} is invalid: {}", raw, name, err),
                            )
                            .with_dependency(name.clone()),
                        );
                        continue;
                    }
                }
            }
            to_resolve.push(name.clone());
        }

        let resolver = self.resolver(ecosystem)?;
        let mut items = Vec::new();
        for (name, result) in resolver.resolve_many(&to_resolve, cancel).await? {
            let resolution = match result {
                Ok(resolution) => resolution,
                Err(err) => {
                    tracing::warn!(%name, error = %err, "registry query failed");
                    advisories.push(
                        Advisory::new(AdvisoryKind::RegistryFailure, format!("{}: {}", name, err))
                            .with_dependency(name.clone()),
                    );
                    continue;
                }
            };

            let target = match ranges.get(&name) {
                Some(range) => match resolution.highest_satisfying(range) {
                    Some(version) => version.clone(),
                    None => {
                        advisories.push(
                            Advisory::new(
                                AdvisoryKind::RegistryFailure,
                                format!(
                                    "no published version of {} satisfies {}",
                                    name,
                                    requested.get(&name).cloned().flatten().unwrap_or_default()
                                ),
                            )
                            .with_dependency(name.clone()),
                        );
                        continue;
                    }
                },
                None => resolution.latest.clone(),
            };

            let analysis = classify(&name, session.index.entries_for(&name), &target, ecosystem);
            tracing::debug!(
                %name,
                %target,
                classification = %analysis.classification,
                "classified dependency"
            );
            items.push(Candidate {
                name,
                resolution,
                analysis,
            });
        }
        items.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(Candidates {
            ecosystem,
            items,
            advisories,
        })
    }

    /// Plan the selected upgrades. Pure; storage is not touched.
    ///
    /// Dependencies configured as `pinned_override` are approved for pin
    /// rewrites on top of `options`.
    pub fn plan_upgrade(
        &self,
        session: &Session,
        candidates: &Candidates,
        selection: &Selection,
        options: &PlanOptions,
    ) -> UpgradePlan {
        let mut options = options.clone();
        options.override_pinned = self.merge_pinned_override(
            session,
            candidates,
            std::mem::take(&mut options.override_pinned),
        );
        Planner::new(&session.workspace).plan_upgrade(
            candidates,
            selection,
            &options,
            &session.advisories(),
        )
    }

    fn merge_pinned_override(
        &self,
        session: &Session,
        candidates: &Candidates,
        approval: Approval,
    ) -> Approval {
        let names = &self.options.pinned_override;
        if names.is_empty() {
            return approval;
        }
        match approval {
            Approval::All => Approval::All,
            Approval::None => Approval::Dependencies(names.clone()),
            Approval::Dependencies(mut approved) => {
                approved.extend(names.iter().cloned());
                Approval::Dependencies(approved)
            }
            Approval::Entries(mut keys) => {
                for candidate in candidates.items.iter().filter(|c| names.contains(&c.name)) {
                    for analysis in &candidate.analysis.entries {
                        if let Some(manifest) = session.workspace.get(analysis.entry.manifest) {
                            keys.insert(EntryKey::new(
                                manifest.path(),
                                analysis.entry.field,
                                candidate.name.clone(),
                            ));
                        }
                    }
                }
                Approval::Entries(keys)
            }
        }
    }

    /// Plan adding dependencies to one manifest.
    ///
    /// Without an explicit range the latest version is offered with the
    /// configured prefix, alongside the ranges already used for the
    /// dependency elsewhere in the workspace (most used first). When the
    /// workspace uses exactly one range, that range is preselected.
    ///
    /// # Errors
    ///
    /// - `Error::Workspace` if the target manifest cannot be found
    /// - `Error::Plan` if the field does not exist in this ecosystem
    /// - `Error::Cancelled` if `cancel` fires during resolution
    pub async fn plan_add(
        &self,
        session: &Session,
        request: &AddRequest,
        selector: &mut dyn Selector,
        cancel: &CancellationToken,
    ) -> Result<UpgradePlan> {
        let ecosystem = session.workspace.ecosystem();
        let target = session.target_manifest(request.target.as_deref())?;
        if request.field.key(ecosystem).is_none() {
            return Err(Error::Plan(format!(
                "{} manifests have no {} field",
                ecosystem,
                request.field.label()
            )));
        }

        let mut advisories = Vec::new();
        let mut additions = Vec::new();
        let mut to_resolve = Vec::new();

        for package in &request.packages {
            if let Err(err) = validate_package_name(ecosystem.registry(), &package.name) {
                advisories.push(
                    Advisory::new(AdvisoryKind::RegistryFailure, err.to_string())
                        .with_dependency(package.name.clone()),
                );
                continue;
            }
            match &package.range {
                Some(range) => match ParsedRange::parse(range, ecosystem) {
                    Ok(_) => additions.push(Addition {
                        name: package.name.clone(),
                        range: range.clone(),
                    }),
                    Err(err) => advisories.push(
                        Advisory::new(
                            AdvisoryKind::UnparseableRange,
                            format!("{}@{} is invalid: {}", package.name, range, err),
                        )
                        .with_dependency(package.name.clone()),
                    ),
                },
                None => to_resolve.push(package.name.clone()),
            }
        }

        if !to_resolve.is_empty() {
            let resolver = self.resolver(ecosystem)?;
            for (name, result) in resolver.resolve_many(&to_resolve, cancel).await? {
                let latest = match result {
                    Ok(resolution) => resolution.latest,
                    Err(err) => {
                        tracing::warn!(%name, error = %err, "registry query failed");
                        advisories.push(
                            Advisory::new(
                                AdvisoryKind::RegistryFailure,
                                format!("{}: {}", name, err),
                            )
                            .with_dependency(name.clone()),
                        );
                        continue;
                    }
                };

                let fresh = self.options.default_range_prefix.format(ecosystem, &latest);
                let (choices, default) = range_choices(session, &name, fresh);
                let chosen = if choices.len() == 1 {
                    0
                } else {
                    selector
                        .choose_range(&name, &choices, default)
                        .min(choices.len() - 1)
                };
                additions.push(Addition {
                    name,
                    range: choices[chosen].clone(),
                });
            }
        }

        Ok(Planner::new(&session.workspace).plan_add(
            target,
            request.field,
            &additions,
            advisories,
            &session.advisories(),
        ))
    }

    /// Plan removing dependencies from one manifest, or from every manifest.
    ///
    /// # Errors
    ///
    /// `Error::Workspace` if the target cannot be found, or if `everywhere`
    /// is requested for a workspace with a single manifest.
    pub fn plan_remove(&self, session: &Session, request: &RemoveRequest) -> Result<UpgradePlan> {
        let targets: Vec<ManifestId> = if request.everywhere {
            if session.workspace.len() <= 1 {
                return Err(Error::Workspace(
                    "not a monorepo; removing everywhere needs more than one manifest".to_string(),
                ));
            }
            session.workspace.iter().map(|(id, _)| id).collect()
        } else {
            vec![session.target_manifest(request.target.as_deref())?]
        };

        Ok(Planner::new(&session.workspace).plan_remove(
            &targets,
            &request.names,
            &session.advisories(),
        ))
    }

    /// Apply a plan built from `session`.
    ///
    /// With `dry_run` every manifest is staged and checked but nothing is
    /// written.
    pub async fn apply(
        &self,
        session: &Session,
        plan: &UpgradePlan,
        cancel: &CancellationToken,
        dry_run: bool,
    ) -> Result<ApplyOutcome> {
        PlanApplier::new(self.fs.clone(), dry_run)
            .apply(&session.workspace, plan, cancel)
            .await
    }
}

/// `fresh` followed by the registry ranges already declared for `name`,
/// most used first, and the index to preselect.
fn range_choices(session: &Session, name: &str, fresh: String) -> (Vec<String>, usize) {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for entry in session
        .index
        .entries_for(name)
        .iter()
        .filter(|e| e.source.is_registry())
    {
        match counts.iter_mut().find(|(range, _)| *range == entry.range) {
            Some((_, count)) => *count += 1,
            None => counts.push((entry.range.clone(), 1)),
        }
    }
    // stable sort keeps first-seen order among equal counts
    counts.sort_by(|a, b| b.1.cmp(&a.1));

    let uniform = (counts.len() == 1).then(|| counts[0].0.clone());
    let mut choices = vec![fresh];
    for (range, _) in counts {
        if !choices.contains(&range) {
            choices.push(range);
        }
    }
    let default = uniform
        .and_then(|range| choices.iter().position(|c| *c == range))
        .unwrap_or(0);
    (choices, default)
}
