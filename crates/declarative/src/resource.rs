//! Resource trait for declarative state management
//!
//! A Resource is a collection of items with a desired set (from
//! configuration) and an actual set (queried live) that can be converged
//! one item at a time.

use crate::reconcile::reconcile;
use crate::types::{Item, OperationStatus, ReconciliationResult, ResourceKind};
use anyhow::Result;

/// Core trait for declarative resources
///
/// Every resource provides:
/// - Identity (id, kind)
/// - Desired items, supplied by a caller-side loader
/// - Actual items, queried live
/// - Convergence of a single item (apply)
///
/// # Example
///
/// ```ignore
/// use declarative::{Item, OperationStatus, Resource, ResourceKind};
///
/// struct Tools { wanted: Vec<String> }
///
/// impl Resource for Tools {
///     fn id(&self) -> String { "tools".into() }
///     fn kind(&self) -> ResourceKind { ResourceKind::Package }
///
///     fn desired(&self) -> anyhow::Result<Vec<Item>> {
///         Ok(self.wanted.iter().map(|n| Item::new("tools", n)).collect())
///     }
///
///     fn actual(&self) -> anyhow::Result<Vec<Item>> {
///         Ok(Vec::new())
///     }
///
///     fn apply(&self, item: &Item) -> anyhow::Result<OperationStatus> {
///         install(&item.name)?;
///         Ok(OperationStatus::Installed)
///     }
/// }
/// ```
pub trait Resource: Send + Sync {
    /// Stable identifier, e.g. `brew` or `dotfiles`
    fn id(&self) -> String;

    /// Resource kind, used for scope filtering
    fn kind(&self) -> ResourceKind;

    /// Human-readable description
    fn description(&self) -> String {
        format!("{} ({})", self.id(), self.kind())
    }

    /// Items that should exist, in configuration order
    fn desired(&self) -> Result<Vec<Item>>;

    /// Items that exist right now, in query order
    fn actual(&self) -> Result<Vec<Item>>;

    /// Converge one missing or drifted item
    fn apply(&self, item: &Item) -> Result<OperationStatus>;

    /// Whether a managed item must be applied again
    ///
    /// Resources whose items carry content (dotfiles) use this to report
    /// drift.
    fn needs_reapply(&self, _item: &Item) -> Result<bool> {
        Ok(false)
    }

    /// Reconcile desired against actual and collect drift.
    fn reconcile(&self) -> Result<ReconciliationResult> {
        let desired = self.desired()?;
        let actual = self.actual()?;
        let mut result = reconcile(&self.id(), &desired, &actual);
        for item in &result.managed {
            if self.needs_reapply(item)? {
                result.drifted.push(item.clone());
            }
        }
        Ok(result)
    }
}

/// A boxed resource for type-erased storage
pub type BoxedResource = Box<dyn Resource>;
