//! # pkgkit
//!
//! Drive external package managers from declarative specifications.
//!
//! This crate provides:
//! - A [`Context`]-aware process shim ([`Executor`]) that is the only code
//!   touching process execution
//! - Pure output parsers (`lines`, `json`, `json-map`, `jsonpath`) plus regex
//!   name transforms and metadata extractors
//! - [`ManagerSpec`], the data model for one manager, with built-in
//!   defaults and [`merge_manager_config`] for user overrides
//! - [`PackageManager`] adapters: one generic adapter driven by a spec, and
//!   hand-written ones for Homebrew and npm
//! - A [`Registry`] resolving manager names to adapters
//!
//! ## Example
//!
//! ```no_run
//! use pkgkit::{Context, Registry, SystemExecutor};
//! use std::sync::Arc;
//!
//! let registry = Registry::with_defaults(Arc::new(SystemExecutor)).unwrap();
//! let ctx = Context::background();
//!
//! for name in registry.all_manager_names() {
//!     let manager = registry.get_manager(&name).unwrap();
//!     if manager.is_available(&ctx).unwrap() {
//!         println!("{name}: {:?}", manager.list_installed(&ctx));
//!     }
//! }
//! ```
//!
//! ## Idempotent errors
//!
//! A failing install whose output contains one of the manager spec's
//! `idempotent_errors` phrases ("already installed") is reported as success;
//! the desired end state already holds.

#![warn(clippy::all)]

pub mod backend;
pub mod defaults;
pub mod error;
pub mod exec;
pub mod package;
pub mod parse;
pub mod registry;
pub mod spec;
pub mod types;

pub use backend::PackageManager;
pub use defaults::default_managers;
pub use error::{ContextError, Error, ErrorCategory, Result};
pub use exec::{CommandOutput, Context, Executor, SystemExecutor};
pub use package::PackageSpec;
pub use registry::Registry;
pub use spec::{
    CommandSpec, ListSpec, ManagerSpec, MetadataExtractor, NameTransform, Normalize,
    ParseStrategy, merge_manager_config,
};
pub use types::{HealthCheck, HealthStatus, PackageInfo};
