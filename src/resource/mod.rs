//! Concrete resources for the declarative engine
//!
//! - [`package::PackageResource`]: one per manager with locked packages
//! - [`dotfile::DotfileResource`]: files under `<config>/dotfiles`
//!
//! Both implement [`declarative::Resource`], so status and apply never branch
//! on which kind they are driving.

pub mod dotfile;
pub mod package;

use anyhow::{Result, bail};
use declarative::{BoxedResource, FailureClassifier};
use pkgkit::{Context as ExecContext, Registry};
use std::time::Duration;

use crate::state::Lock;

/// Whether any error in the chain is a cancelled or timed-out [`ExecContext`]
pub fn is_context_error(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<pkgkit::Error>())
        .any(pkgkit::Error::is_context)
}

/// Stops an apply run once the operation deadline passes or it is cancelled
pub struct ContextAbort;

impl FailureClassifier for ContextAbort {
    fn is_fatal(&self, error: &anyhow::Error) -> bool {
        is_context_error(error)
    }
}

/// One package resource per locked manager, in sorted manager order.
///
/// A locked manager the registry doesn't know is a configuration error and
/// fails before any command runs.
pub fn package_resources(
    registry: &Registry,
    lock: &Lock,
    ctx: &ExecContext,
    package_timeout: Duration,
) -> Result<Vec<BoxedResource>> {
    let managers = lock.managers();
    let unknown: Vec<&str> = managers
        .iter()
        .filter(|m| !registry.has_manager(m))
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        bail!(
            "Lock file references unknown manager(s): {} (known: {})",
            unknown.join(", "),
            registry.all_manager_names().join(", ")
        );
    }

    managers
        .iter()
        .map(|name| -> Result<BoxedResource> {
            let resource = package::PackageResource::new(
                registry.get_manager(name)?,
                lock.packages_for_manager(name),
                ctx.clone(),
                package_timeout,
            );
            Ok(Box::new(resource))
        })
        .collect()
}
