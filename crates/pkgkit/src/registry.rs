//! Name → adapter lookup.

use crate::backend::brew::BrewManager;
use crate::backend::generic::GenericManager;
use crate::backend::npm::NpmManager;
use crate::backend::PackageManager;
use crate::defaults::default_managers;
use crate::error::{Error, Result};
use crate::exec::Executor;
use crate::spec::ManagerSpec;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Every known package manager, keyed by name.
///
/// Iteration is always in sorted name order so multi-manager output is
/// stable run to run.
#[derive(Clone, Default)]
pub struct Registry {
    managers: BTreeMap<String, Arc<dyn PackageManager>>,
}

impl Registry {
    /// Build adapters for every spec.
    ///
    /// `brew` and `npm` get hand-written adapters; everything else is
    /// driven by its spec alone. Fails on the first malformed spec.
    pub fn new(specs: &BTreeMap<String, ManagerSpec>, exec: Arc<dyn Executor>) -> Result<Self> {
        let mut managers = BTreeMap::new();
        for (name, spec) in specs {
            let adapter = adapter_for(name, spec.clone(), exec.clone()).map_err(|e| {
                Error::InvalidConfig(format!("manager {name:?}: {e}"))
            })?;
            managers.insert(name.clone(), adapter);
        }
        Ok(Self { managers })
    }

    /// Registry over the built-in defaults only.
    pub fn with_defaults(exec: Arc<dyn Executor>) -> Result<Self> {
        Self::new(&default_managers(), exec)
    }

    pub fn get_manager(&self, name: &str) -> Result<Arc<dyn PackageManager>> {
        self.managers
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownManager(name.to_string()))
    }

    pub fn has_manager(&self, name: &str) -> bool {
        self.managers.contains_key(name)
    }

    /// Sorted manager names.
    pub fn all_manager_names(&self) -> Vec<String> {
        self.managers.keys().cloned().collect()
    }

    /// The set of legal manager names, for configuration validation.
    pub fn valid_names(&self) -> BTreeSet<String> {
        self.managers.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.managers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }
}

fn adapter_for(
    name: &str,
    spec: ManagerSpec,
    exec: Arc<dyn Executor>,
) -> Result<Arc<dyn PackageManager>> {
    let adapter: Arc<dyn PackageManager> = match name {
        "brew" => Arc::new(BrewManager::new(spec, exec)?),
        "npm" => Arc::new(NpmManager::new(spec, exec)?),
        _ => Arc::new(GenericManager::new(name, spec, exec)?),
    };
    Ok(adapter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::testing::ScriptedExecutor;
    use crate::spec::{ListSpec, ParseStrategy};

    fn registry() -> Registry {
        Registry::with_defaults(Arc::new(ScriptedExecutor::new())).unwrap()
    }

    #[test]
    fn test_all_manager_names_sorted() {
        let names = registry().all_manager_names();
        assert_eq!(
            names,
            vec!["brew", "cargo", "conda", "gem", "npm", "pipx", "pnpm", "uv"]
        );
    }

    #[test]
    fn test_unknown_manager() {
        let err = registry().get_manager("apt").err().unwrap();
        assert!(matches!(err, Error::UnknownManager(ref n) if n == "apt"));
    }

    #[test]
    fn test_get_manager_names_match() {
        let reg = registry();
        for name in reg.all_manager_names() {
            assert_eq!(reg.get_manager(&name).unwrap().name(), name);
        }
        assert!(reg.has_manager("uv"));
        assert!(reg.valid_names().contains("pnpm"));
    }

    #[test]
    fn test_custom_manager_is_registered() {
        let mut specs = default_managers();
        specs.insert(
            "mise".to_string(),
            ManagerSpec {
                binary: "mise".into(),
                list: ListSpec {
                    command: vec!["mise".into(), "ls".into(), "--json".into()],
                    parse: Some(ParseStrategy::JsonMap),
                    ..Default::default()
                },
                ..Default::default()
            },
        );
        let reg = Registry::new(&specs, Arc::new(ScriptedExecutor::new())).unwrap();
        assert!(reg.has_manager("mise"));
        assert_eq!(reg.len(), 9);
    }

    #[test]
    fn test_malformed_spec_rejected() {
        let mut specs = BTreeMap::new();
        specs.insert(
            "broken".to_string(),
            ManagerSpec {
                name_transform: Some(crate::spec::NameTransform {
                    kind: "regex".into(),
                    pattern: "([".into(),
                    replacement: String::new(),
                }),
                ..Default::default()
            },
        );
        let err = Registry::new(&specs, Arc::new(ScriptedExecutor::new()))
            .err()
            .unwrap();
        assert!(err.to_string().contains("broken"));
    }
}
