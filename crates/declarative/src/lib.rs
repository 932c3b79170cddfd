//! # Declarative
//!
//! Desired-state reconciliation for packages and dotfiles.
//!
//! This crate provides the core abstractions for declaring desired state,
//! querying actual state, classifying the difference, and converging items
//! one at a time.
//!
//! ## Core Concepts
//!
//! - **Resource**: A collection of items with a desired and an actual set
//! - **Reconciliation**: Managed / Missing / Untracked classification of a
//!   resource, plus drifted items needing a re-apply
//! - **Orchestrator**: Applies missing and drifted items sequentially, with
//!   dry-run, scope filtering and partial-failure aggregation
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{ApplyOptions, NoProgress, Orchestrator, Scope};
//!
//! let resources: Vec<Box<dyn declarative::Resource>> = load_resources()?;
//! let opts = ApplyOptions { dry_run: true, scope: Scope::PackagesOnly };
//!
//! let report = Orchestrator::new(opts).run(&resources, &mut NoProgress);
//! for result in &report.results {
//!     println!("{} {} {}", result.manager, result.name, result.status);
//! }
//! if let Some(err) = report.error() {
//!     eprintln!("{err}");
//! }
//! ```
//!
//! ## Provider Traits
//!
//! - [`ProgressCallback`]: Receives progress updates
//! - [`FailureClassifier`]: Decides which failures abort the remaining run
//!
//! The crate never prints and never inspects manager or dotfile internals.

pub mod context;
pub mod orchestrator;
pub mod reconcile;
pub mod resource;
pub mod types;

// Re-export main types at crate root
pub use context::{FailureClassifier, NeverFatal, NoProgress, ProgressCallback};
pub use orchestrator::{AggregateError, ApplyOptions, ApplyReport, Failure, Orchestrator};
pub use reconcile::reconcile;
pub use resource::{BoxedResource, Resource};
pub use types::{
    Item, ItemState, OperationResult, OperationStatus, ReconciliationResult, ResourceKind,
    ResultSummary, Scope, Summary,
};
