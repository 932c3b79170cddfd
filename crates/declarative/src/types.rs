//! Core types for reconciliation and apply

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// What a resource manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Package,
    Dotfile,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Package => f.write_str("packages"),
            Self::Dotfile => f.write_str("dotfiles"),
        }
    }
}

/// Which resource kinds an apply run touches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scope {
    #[default]
    All,
    PackagesOnly,
    DotfilesOnly,
}

impl Scope {
    /// Build from a pair of `--packages` / `--dotfiles` style flags.
    ///
    /// Neither or both flags mean everything.
    pub fn from_flags(packages: bool, dotfiles: bool) -> Self {
        match (packages, dotfiles) {
            (true, false) => Self::PackagesOnly,
            (false, true) => Self::DotfilesOnly,
            _ => Self::All,
        }
    }

    pub fn includes(&self, kind: ResourceKind) -> bool {
        match self {
            Self::All => true,
            Self::PackagesOnly => kind == ResourceKind::Package,
            Self::DotfilesOnly => kind == ResourceKind::Dotfile,
        }
    }
}

/// One element of a resource: a manager-scoped name plus metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    /// Owning manager, or the dotfile root for dotfiles
    pub manager: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Item {
    pub fn new(manager: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            manager: manager.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// `manager:name`
    pub fn key(&self) -> String {
        format!("{}:{}", self.manager, self.name)
    }
}

/// Classification of an item after reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemState {
    /// Desired and present
    Managed,
    /// Desired but absent
    Missing,
    /// Present but not desired
    Untracked,
    /// Managed, but its content differs from the desired content
    Drifted,
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Managed => "managed",
            Self::Missing => "missing",
            Self::Untracked => "untracked",
            Self::Drifted => "drifted",
        };
        f.write_str(s)
    }
}

/// Reconciliation of one resource (one manager, or the dotfile root)
///
/// `managed`, `missing` and `untracked` partition the union of desired and
/// actual names. `drifted` is a subset of `managed`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationResult {
    pub resource: String,
    pub managed: Vec<Item>,
    pub missing: Vec<Item>,
    pub untracked: Vec<Item>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub drifted: Vec<Item>,
}

impl ReconciliationResult {
    pub fn managed_count(&self) -> usize {
        self.managed.len()
    }

    pub fn missing_count(&self) -> usize {
        self.missing.len()
    }

    pub fn untracked_count(&self) -> usize {
        self.untracked.len()
    }

    /// Nothing to apply
    pub fn is_converged(&self) -> bool {
        self.missing.is_empty() && self.drifted.is_empty()
    }

    /// Every item with its classification, managed first.
    ///
    /// Drifted items are reported as [`ItemState::Drifted`] instead of
    /// managed.
    pub fn items(&self) -> impl Iterator<Item = (ItemState, &Item)> {
        let drifted = |item: &Item| self.drifted.iter().any(|d| d.name == item.name);
        self.managed
            .iter()
            .map(move |i| {
                if drifted(i) {
                    (ItemState::Drifted, i)
                } else {
                    (ItemState::Managed, i)
                }
            })
            .chain(self.missing.iter().map(|i| (ItemState::Missing, i)))
            .chain(self.untracked.iter().map(|i| (ItemState::Untracked, i)))
    }
}

/// Totals across many reconciliation results
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub resources: usize,
    pub managed: usize,
    pub missing: usize,
    pub untracked: usize,
    pub drifted: usize,
}

impl Summary {
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a ReconciliationResult>) -> Self {
        let mut summary = Self::default();
        for result in results {
            summary.add(result);
        }
        summary
    }

    pub fn add(&mut self, result: &ReconciliationResult) {
        self.resources += 1;
        self.managed += result.managed.len();
        self.missing += result.missing.len();
        self.untracked += result.untracked.len();
        self.drifted += result.drifted.len();
    }

    pub fn total(&self) -> usize {
        self.managed + self.missing + self.untracked
    }
}

/// Outcome status of one operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationStatus {
    Installed,
    Updated,
    Removed,
    Upgraded,
    Added,
    Skipped,
    Failed,
    WouldInstall,
    WouldUpdate,
    WouldRemove,
    WouldUpgrade,
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Installed => "installed",
            Self::Updated => "updated",
            Self::Removed => "removed",
            Self::Upgraded => "upgraded",
            Self::Added => "added",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
            Self::WouldInstall => "would-install",
            Self::WouldUpdate => "would-update",
            Self::WouldRemove => "would-remove",
            Self::WouldUpgrade => "would-upgrade",
        }
    }

    /// A dry-run classification
    pub fn is_planned(&self) -> bool {
        matches!(
            self,
            Self::WouldInstall | Self::WouldUpdate | Self::WouldRemove | Self::WouldUpgrade
        )
    }

    /// Something on the system changed
    pub fn is_change(&self) -> bool {
        matches!(
            self,
            Self::Installed | Self::Updated | Self::Removed | Self::Upgraded | Self::Added
        )
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one apply attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    pub name: String,
    pub manager: String,
    pub status: OperationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub already_managed: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl OperationResult {
    pub fn new(
        manager: impl Into<String>,
        name: impl Into<String>,
        status: OperationStatus,
    ) -> Self {
        Self {
            name: name.into(),
            manager: manager.into(),
            status,
            error: None,
            already_managed: false,
            metadata: BTreeMap::new(),
        }
    }

    /// Result for an item with its metadata carried over
    pub fn for_item(item: &Item, status: OperationStatus) -> Self {
        Self {
            metadata: item.metadata.clone(),
            ..Self::new(&item.manager, &item.name, status)
        }
    }

    pub fn failed(
        manager: impl Into<String>,
        name: impl Into<String>,
        error: impl fmt::Display,
    ) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(manager, name, OperationStatus::Failed)
        }
    }

    pub fn already_managed(mut self) -> Self {
        self.already_managed = true;
        self
    }

    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn is_failure(&self) -> bool {
        self.status == OperationStatus::Failed
    }

    /// `manager:name`
    pub fn key(&self) -> String {
        format!("{}:{}", self.manager, self.name)
    }
}

/// Counts of operation outcomes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub installed: usize,
    pub updated: usize,
    pub removed: usize,
    pub upgraded: usize,
    pub added: usize,
    pub skipped: usize,
    pub failed: usize,
    pub planned: usize,
}

impl ResultSummary {
    pub fn calculate(results: &[OperationResult]) -> Self {
        let mut summary = Self::default();
        for result in results {
            summary.add_result(result);
        }
        summary
    }

    pub fn add_result(&mut self, result: &OperationResult) {
        match result.status {
            OperationStatus::Installed => self.installed += 1,
            OperationStatus::Updated => self.updated += 1,
            OperationStatus::Removed => self.removed += 1,
            OperationStatus::Upgraded => self.upgraded += 1,
            OperationStatus::Added => self.added += 1,
            OperationStatus::Skipped => self.skipped += 1,
            OperationStatus::Failed => self.failed += 1,
            OperationStatus::WouldInstall
            | OperationStatus::WouldUpdate
            | OperationStatus::WouldRemove
            | OperationStatus::WouldUpgrade => self.planned += 1,
        }
    }

    /// Merge another summary into this one
    pub fn merge(&mut self, other: &Self) {
        self.installed += other.installed;
        self.updated += other.updated;
        self.removed += other.removed;
        self.upgraded += other.upgraded;
        self.added += other.added;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.planned += other.planned;
    }

    /// Total number of actual changes made
    pub fn total_changes(&self) -> usize {
        self.installed + self.updated + self.removed + self.upgraded + self.added
    }

    pub fn total(&self) -> usize {
        self.total_changes() + self.skipped + self.failed + self.planned
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}
