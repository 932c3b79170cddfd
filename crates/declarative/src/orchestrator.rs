//! Apply engine - reconciles resources and converges their items
//!
//! Items are processed sequentially in resource order, then missing items
//! in desired order, then drifted items. A failing item is recorded and
//! the run continues unless the [`FailureClassifier`] calls it fatal.

use crate::context::{FailureClassifier, NeverFatal, ProgressCallback};
use crate::resource::Resource;
use crate::types::{
    Item, OperationResult, OperationStatus, ReconciliationResult, ResultSummary, Scope,
};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Options for an apply run
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyOptions {
    /// Classify what would change without touching anything
    pub dry_run: bool,
    /// Resource kinds to process; the rest are skipped entirely
    pub scope: Scope,
}

/// One failed item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub name: String,
    pub manager: String,
    pub message: String,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.manager, self.name, self.message)
    }
}

/// Every failure of a run
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} operation(s) failed: {}", .failures.len(), join(.failures))]
pub struct AggregateError {
    pub failures: Vec<Failure>,
}

fn join(failures: &[Failure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Everything a run produced
#[derive(Debug, Clone, Default)]
pub struct ApplyReport {
    pub reconciliations: Vec<ReconciliationResult>,
    pub results: Vec<OperationResult>,
    /// Set when a fatal failure stopped the run early
    pub aborted: Option<String>,
}

impl ApplyReport {
    pub fn summary(&self) -> ResultSummary {
        ResultSummary::calculate(&self.results)
    }

    pub fn is_success(&self) -> bool {
        self.aborted.is_none() && self.results.iter().all(|r| !r.is_failure())
    }

    /// The aggregate of every failed result, if any.
    pub fn error(&self) -> Option<AggregateError> {
        let failures: Vec<Failure> = self
            .results
            .iter()
            .filter(|r| r.is_failure())
            .map(|r| Failure {
                name: r.name.clone(),
                manager: r.manager.clone(),
                message: r.error.clone().unwrap_or_default(),
            })
            .collect();
        (!failures.is_empty()).then_some(AggregateError { failures })
    }
}

fn as_dyn<R: AsRef<dyn Resource>>(resource: &R) -> &dyn Resource {
    resource.as_ref()
}

/// Sequences reconciliation and apply across resources
pub struct Orchestrator {
    options: ApplyOptions,
    classifier: Box<dyn FailureClassifier>,
}

impl Orchestrator {
    pub fn new(options: ApplyOptions) -> Self {
        Self {
            options,
            classifier: Box::new(NeverFatal),
        }
    }

    /// Use `classifier` to decide which failures abort the run.
    pub fn with_classifier(mut self, classifier: impl FailureClassifier + 'static) -> Self {
        self.classifier = Box::new(classifier);
        self
    }

    pub fn options(&self) -> &ApplyOptions {
        &self.options
    }

    /// Reconcile every in-scope resource without applying anything.
    ///
    /// Each entry pairs a resource id with its reconciliation; a resource
    /// that fails does not stop the others.
    pub fn plan<R: AsRef<dyn Resource>>(
        &self,
        resources: &[R],
    ) -> Vec<(String, anyhow::Result<ReconciliationResult>)> {
        resources
            .iter()
            .map(as_dyn)
            .filter(|r| self.options.scope.includes(r.kind()))
            .map(|r| (r.id(), r.reconcile()))
            .collect()
    }

    /// Reconcile and converge every in-scope resource.
    pub fn run<R, P>(&self, resources: &[R], progress: &mut P) -> ApplyReport
    where
        R: AsRef<dyn Resource>,
        P: ProgressCallback + ?Sized,
    {
        let mut report = ApplyReport::default();

        for resource in resources.iter().map(as_dyn) {
            if !self.options.scope.includes(resource.kind()) {
                log::debug!("skipping {} (out of scope)", resource.id());
                continue;
            }
            if !self.run_resource(resource, &mut report, progress) {
                break;
            }
        }

        report
    }

    /// Returns false when the run must stop.
    fn run_resource<P>(
        &self,
        resource: &dyn Resource,
        report: &mut ApplyReport,
        progress: &mut P,
    ) -> bool
    where
        P: ProgressCallback + ?Sized,
    {
        let id = resource.id();
        let reconciliation = match resource.reconcile() {
            Ok(r) => r,
            Err(e) => {
                log::warn!("reconciling {id} failed: {e:#}");
                let message = format!("{e:#}");
                match resource.desired() {
                    // Every desired item stays unconverged
                    Ok(desired) if !desired.is_empty() => {
                        report.results.extend(desired.iter().map(|item| OperationResult {
                            error: Some(message.clone()),
                            ..OperationResult::for_item(item, OperationStatus::Failed)
                        }));
                    }
                    _ => report
                        .results
                        .push(OperationResult::failed(&id, &id, message)),
                }
                if self.classifier.is_fatal(&e) {
                    report.aborted = Some(format!("{e:#}"));
                    return false;
                }
                return true;
            }
        };

        let work: Vec<(&Item, bool)> = reconciliation
            .missing
            .iter()
            .map(|item| (item, false))
            .chain(reconciliation.drifted.iter().map(|item| (item, true)))
            .collect();
        progress.on_resource_start(&id, work.len());

        let mut keep_going = true;
        for (item, drifted) in work {
            progress.on_item_start(&id, item);
            let result = if self.options.dry_run {
                let status = if drifted {
                    OperationStatus::WouldUpdate
                } else {
                    OperationStatus::WouldInstall
                };
                OperationResult::for_item(item, status)
            } else {
                match resource.apply(item) {
                    Ok(status) => OperationResult::for_item(item, status),
                    Err(e) => {
                        log::debug!("apply {} failed: {e:#}", item.key());
                        if self.classifier.is_fatal(&e) {
                            report.aborted = Some(format!("{e:#}"));
                            keep_going = false;
                        }
                        OperationResult {
                            error: Some(format!("{e:#}")),
                            ..OperationResult::for_item(item, OperationStatus::Failed)
                        }
                    }
                }
            };
            progress.on_item_complete(&id, &result);
            report.results.push(result);
            if !keep_going {
                break;
            }
        }

        progress.on_resource_complete(&id, &reconciliation);
        report.reconciliations.push(reconciliation);
        keep_going
    }
}
