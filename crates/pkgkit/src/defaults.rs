//! Built-in manager specifications.
//!
//! User overrides are merged onto these with
//! [`merge_manager_config`](crate::spec::merge_manager_config).

use crate::spec::{CommandSpec, ListSpec, ManagerSpec, MetadataExtractor, ParseStrategy};
use std::collections::BTreeMap;

const ALREADY_INSTALLED: &[&str] = &["already installed"];
const UP_TO_DATE: &[&str] = &["already up-to-date", "up to date"];

fn list(command: &[&str], parse: ParseStrategy) -> ListSpec {
    ListSpec {
        command: command.iter().map(|s| (*s).to_string()).collect(),
        parse: Some(parse),
        ..Default::default()
    }
}

/// Every built-in manager, keyed by name.
pub fn default_managers() -> BTreeMap<String, ManagerSpec> {
    [
        ("brew", brew()),
        ("cargo", cargo()),
        ("conda", conda()),
        ("gem", gem()),
        ("npm", npm()),
        ("pipx", pipx()),
        ("pnpm", pnpm()),
        ("uv", uv()),
    ]
    .into_iter()
    .map(|(name, spec)| (name.to_string(), spec))
    .collect()
}

fn brew() -> ManagerSpec {
    ManagerSpec {
        binary: "brew".into(),
        description: "Homebrew (macOS/Linux package manager)".into(),
        install_hint: "Visit https://brew.sh for installation instructions".into(),
        help_url: "https://brew.sh".into(),
        list: list(&["brew", "list"], ParseStrategy::Lines),
        install: CommandSpec::new(&["brew", "install", "{{Package}}"]).idempotent(ALREADY_INSTALLED),
        upgrade: CommandSpec::new(&["brew", "upgrade", "{{Package}}"])
            .idempotent(&["already up-to-date"]),
        upgrade_all: CommandSpec::new(&["brew", "upgrade"]).idempotent(&["already up-to-date"]),
        uninstall: CommandSpec::new(&["brew", "uninstall", "{{Package}}"])
            .idempotent(&["no such keg", "not installed"]),
        info: CommandSpec::new(&["brew", "info", "--json=v2", "{{Package}}"]),
        search: CommandSpec::new(&["brew", "search", "{{Package}}"]),
        ..Default::default()
    }
}

fn cargo() -> ManagerSpec {
    ManagerSpec {
        binary: "cargo".into(),
        description: "Cargo (Rust package manager)".into(),
        install_hint: "Install Rust from https://rustup.rs/".into(),
        help_url: "https://www.rust-lang.org/tools/install".into(),
        list: list(&["cargo", "install", "--list"], ParseStrategy::Lines),
        install: CommandSpec::new(&["cargo", "install", "{{Package}}"])
            .idempotent(&["already exists", "already installed"]),
        upgrade: CommandSpec::new(&["cargo", "install", "--force", "{{Package}}"])
            .idempotent(UP_TO_DATE),
        // cargo has no native "upgrade everything"
        upgrade_all: CommandSpec::default(),
        uninstall: CommandSpec::new(&["cargo", "uninstall", "{{Package}}"]),
        search: CommandSpec::new(&["cargo", "search", "{{Package}}"]),
        ..Default::default()
    }
}

fn conda() -> ManagerSpec {
    ManagerSpec {
        binary: "conda".into(),
        description: "conda (Python/conda package manager)".into(),
        install_hint: "Install conda via Anaconda or Miniconda distributions".into(),
        help_url: "https://docs.conda.io/".into(),
        list: ListSpec {
            json_field: "name".into(),
            ..list(&["conda", "list", "--json"], ParseStrategy::Json)
        },
        install: CommandSpec::new(&["conda", "install", "-y", "{{Package}}"])
            .idempotent(ALREADY_INSTALLED),
        upgrade: CommandSpec::new(&["conda", "update", "-y", "{{Package}}"]).idempotent(UP_TO_DATE),
        upgrade_all: CommandSpec::new(&["conda", "update", "-y", "--all"]).idempotent(UP_TO_DATE),
        uninstall: CommandSpec::new(&["conda", "remove", "-y", "{{Package}}"]),
        ..Default::default()
    }
}

fn gem() -> ManagerSpec {
    ManagerSpec {
        binary: "gem".into(),
        description: "gem (Ruby package manager)".into(),
        install_hint: "Install Ruby from https://ruby-lang.org/ or use brew install ruby".into(),
        help_url: "https://ruby-lang.org/".into(),
        list: list(&["gem", "list", "--local", "--no-versions"], ParseStrategy::Lines),
        install: CommandSpec::new(&["gem", "install", "{{Package}}", "--user-install"])
            .idempotent(ALREADY_INSTALLED),
        upgrade: CommandSpec::new(&["gem", "update", "{{Package}}"]).idempotent(UP_TO_DATE),
        upgrade_all: CommandSpec::new(&["gem", "update"]).idempotent(UP_TO_DATE),
        uninstall: CommandSpec::new(&["gem", "uninstall", "{{Package}}", "-x"]),
        search: CommandSpec::new(&["gem", "search", "{{Package}}"]),
        ..Default::default()
    }
}

fn npm() -> ManagerSpec {
    let mut extractors = BTreeMap::new();
    extractors.insert(
        "scope".to_string(),
        MetadataExtractor {
            pattern: "^(@[^/]+)/".into(),
            group: 1,
            source: "name".into(),
        },
    );
    extractors.insert(
        "full_name".to_string(),
        MetadataExtractor {
            source: "name".into(),
            ..Default::default()
        },
    );

    ManagerSpec {
        binary: "npm".into(),
        description: "npm (Node.js package manager)".into(),
        install_hint: "Install Node.js from https://nodejs.org/ or use brew install node".into(),
        help_url: "https://nodejs.org/".into(),
        list: ListSpec {
            json_field: "dependencies".into(),
            ..list(
                &["npm", "list", "-g", "--depth=0", "--json"],
                ParseStrategy::JsonMap,
            )
        },
        install: CommandSpec::new(&["npm", "install", "-g", "{{Package}}"])
            .idempotent(ALREADY_INSTALLED),
        upgrade: CommandSpec::new(&["npm", "update", "-g", "{{Package}}"]).idempotent(UP_TO_DATE),
        upgrade_all: CommandSpec::new(&["npm", "update", "-g"]).idempotent(UP_TO_DATE),
        uninstall: CommandSpec::new(&["npm", "uninstall", "-g", "{{Package}}"]),
        info: CommandSpec::new(&["npm", "view", "{{Package}}", "--json"]),
        search: CommandSpec::new(&["npm", "search", "--parseable", "{{Package}}"]),
        upgrade_target: "full_name".into(),
        metadata_extractors: extractors,
        ..Default::default()
    }
}

fn pipx() -> ManagerSpec {
    ManagerSpec {
        binary: "pipx".into(),
        description: "pipx (isolated Python applications)".into(),
        install_hint: "Install pipx with brew install pipx or python3 -m pip install --user pipx"
            .into(),
        help_url: "https://pipx.pypa.io/".into(),
        list: list(&["pipx", "list", "--short"], ParseStrategy::Lines),
        install: CommandSpec::new(&["pipx", "install", "{{Package}}"]).idempotent(ALREADY_INSTALLED),
        upgrade: CommandSpec::new(&["pipx", "upgrade", "{{Package}}"]).idempotent(UP_TO_DATE),
        upgrade_all: CommandSpec::new(&["pipx", "upgrade-all"]),
        uninstall: CommandSpec::new(&["pipx", "uninstall", "{{Package}}"])
            .idempotent(&["not installed"]),
        ..Default::default()
    }
}

fn pnpm() -> ManagerSpec {
    ManagerSpec {
        binary: "pnpm".into(),
        description: "pnpm (Node.js package manager)".into(),
        install_hint: "Install pnpm from https://pnpm.io/ or use brew install pnpm".into(),
        help_url: "https://pnpm.io/".into(),
        // Global dependencies sit inside a one-element array
        list: ListSpec {
            keys_from: "$[*].dependencies".into(),
            ..list(
                &["pnpm", "list", "-g", "--depth=0", "--json"],
                ParseStrategy::JsonPath,
            )
        },
        install: CommandSpec::new(&["pnpm", "add", "-g", "{{Package}}"]).idempotent(ALREADY_INSTALLED),
        upgrade: CommandSpec::new(&["pnpm", "update", "-g", "{{Package}}"]).idempotent(UP_TO_DATE),
        upgrade_all: CommandSpec::new(&["pnpm", "update", "-g"]).idempotent(UP_TO_DATE),
        uninstall: CommandSpec::new(&["pnpm", "remove", "-g", "{{Package}}"]),
        ..Default::default()
    }
}

fn uv() -> ManagerSpec {
    ManagerSpec {
        binary: "uv".into(),
        description: "uv (Python package manager)".into(),
        install_hint: "Install uv from https://docs.astral.sh/uv/ or use brew install uv".into(),
        help_url: "https://docs.astral.sh/uv/".into(),
        list: list(&["uv", "tool", "list"], ParseStrategy::Lines),
        install: CommandSpec::new(&["uv", "tool", "install", "{{Package}}"])
            .idempotent(ALREADY_INSTALLED),
        upgrade: CommandSpec::new(&["uv", "tool", "upgrade", "{{Package}}"]).idempotent(UP_TO_DATE),
        upgrade_all: CommandSpec::new(&["uv", "tool", "upgrade", "--all"]).idempotent(UP_TO_DATE),
        uninstall: CommandSpec::new(&["uv", "tool", "uninstall", "{{Package}}"]),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_have_required_templates() {
        for (name, spec) in default_managers() {
            assert!(!spec.binary.is_empty(), "{name} has no binary");
            assert!(!spec.list.command.is_empty(), "{name} has no list command");
            assert!(!spec.install.is_empty(), "{name} has no install command");
            assert!(!spec.uninstall.is_empty(), "{name} has no uninstall command");
            assert!(!spec.upgrade.is_empty(), "{name} has no upgrade command");
        }
    }

    #[test]
    fn test_cargo_has_no_upgrade_all() {
        let managers = default_managers();
        assert!(managers["cargo"].upgrade_all.is_empty());
        assert!(!managers["brew"].upgrade_all.is_empty());
    }

    #[test]
    fn test_npm_extractors() {
        let npm = &default_managers()["npm"];
        assert_eq!(npm.metadata_extractors["scope"].group, 1);
        assert!(npm.metadata_extractors["full_name"].pattern.is_empty());
        assert_eq!(npm.list.strategy(), ParseStrategy::JsonMap);
    }

    #[test]
    fn test_default_names_sorted() {
        let names: Vec<String> = default_managers().into_keys().collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert_eq!(names.len(), 8);
    }
}
