//! `[manager:]name` package references.

use crate::error::{Error, Result};
use std::collections::BTreeSet;
use std::fmt;

/// A package reference as typed on the command line.
///
/// Only the first `:` separates the manager, so `npm:@types/node` parses
/// as manager `npm`, name `@types/node`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageSpec {
    pub name: String,
    pub manager: Option<String>,
}

impl PackageSpec {
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidSpec {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let input_trimmed = input.trim();
        if input_trimmed.is_empty() {
            return Err(invalid("package specification cannot be empty"));
        }

        let (manager, name) = match input_trimmed.split_once(':') {
            Some(("", _)) => return Err(invalid("manager prefix cannot be empty")),
            Some((manager, name)) => (Some(manager.to_string()), name),
            None => (None, input_trimmed),
        };
        if name.is_empty() {
            return Err(invalid("package name cannot be empty"));
        }

        Ok(Self {
            name: name.to_string(),
            manager,
        })
    }

    /// The explicit manager, or `default` when none was given.
    pub fn resolve_manager(&self, default: Option<&str>) -> Option<String> {
        self.manager
            .clone()
            .or_else(|| default.filter(|d| !d.is_empty()).map(str::to_string))
    }

    /// Resolve the manager and check it against the legal names.
    pub fn require_manager(
        &self,
        default: Option<&str>,
        valid: &BTreeSet<String>,
    ) -> Result<String> {
        let manager = self.resolve_manager(default).ok_or(Error::NoManager)?;
        if !valid.contains(&manager) {
            return Err(Error::UnknownManager(manager));
        }
        Ok(manager)
    }

    /// Reconciliation key, `manager:name`.
    pub fn key(&self) -> String {
        format!("{}:{}", self.manager.as_deref().unwrap_or_default(), self.name)
    }
}

impl fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.manager {
            Some(manager) => write!(f, "{manager}:{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> BTreeSet<String> {
        ["brew", "npm", "uv"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_forms() {
        let plain = PackageSpec::parse("git").unwrap();
        assert_eq!(plain.name, "git");
        assert!(plain.manager.is_none());

        let prefixed = PackageSpec::parse("brew:wget").unwrap();
        assert_eq!(prefixed.manager.as_deref(), Some("brew"));
        assert_eq!(prefixed.name, "wget");

        let scoped = PackageSpec::parse("npm:@types/node").unwrap();
        assert_eq!(scoped.name, "@types/node");
        assert_eq!(scoped.key(), "npm:@types/node");
    }

    #[test]
    fn test_parse_rejects_empty_parts() {
        for input in ["", "  ", ":git", "brew:"] {
            let err = PackageSpec::parse(input).unwrap_err();
            assert!(matches!(err, Error::InvalidSpec { .. }), "{input:?}");
        }
    }

    #[test]
    fn test_require_manager() {
        let spec = PackageSpec::parse("ruff").unwrap();
        assert!(matches!(
            spec.require_manager(None, &valid()),
            Err(Error::NoManager)
        ));
        assert_eq!(spec.require_manager(Some("uv"), &valid()).unwrap(), "uv");
        assert!(matches!(
            spec.require_manager(Some("apt"), &valid()),
            Err(Error::UnknownManager(_))
        ));

        let explicit = PackageSpec::parse("brew:ruff").unwrap();
        assert_eq!(explicit.require_manager(Some("uv"), &valid()).unwrap(), "brew");
    }

    #[test]
    fn test_display() {
        assert_eq!(PackageSpec::parse("git").unwrap().to_string(), "git");
        assert_eq!(PackageSpec::parse(" uv:ruff ").unwrap().to_string(), "uv:ruff");
    }
}
