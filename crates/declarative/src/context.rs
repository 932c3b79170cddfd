//! Provider traits for apply runs
//!
//! These traits let callers observe and steer a run without the crate
//! depending on a UI or on any manager implementation.

use crate::types::{Item, OperationResult, ReconciliationResult};

/// Progress callback for apply runs
///
/// Implement this trait to receive progress updates during a run.
pub trait ProgressCallback {
    /// Called once a resource is reconciled, before its items are applied
    fn on_resource_start(&mut self, resource: &str, pending: usize);

    /// Called when starting to apply a single item
    fn on_item_start(&mut self, resource: &str, item: &Item);

    /// Called when an item completes, successfully or not
    fn on_item_complete(&mut self, resource: &str, result: &OperationResult);

    /// Called when every item of a resource was processed
    fn on_resource_complete(&mut self, resource: &str, reconciliation: &ReconciliationResult);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_resource_start(&mut self, _resource: &str, _pending: usize) {}
    fn on_item_start(&mut self, _resource: &str, _item: &Item) {}
    fn on_item_complete(&mut self, _resource: &str, _result: &OperationResult) {}
    fn on_resource_complete(&mut self, _resource: &str, _reconciliation: &ReconciliationResult) {}
}

/// Decides which failures abort the whole run
///
/// Implement this trait to define your abort policy, typically
/// "cancellation or timeout stops everything".
pub trait FailureClassifier: Send + Sync {
    fn is_fatal(&self, error: &anyhow::Error) -> bool;
}

/// Default classifier: every failure is recorded and the run continues
pub struct NeverFatal;

impl FailureClassifier for NeverFatal {
    fn is_fatal(&self, _error: &anyhow::Error) -> bool {
        false
    }
}
