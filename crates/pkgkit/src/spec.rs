//! Declarative package manager specifications.
//!
//! A [`ManagerSpec`] describes one external package manager entirely as data:
//! the binary, command templates for every capability, how to parse the list
//! output, which failure phrases mean "already done", and how to derive
//! metadata from package names. Unsupported capabilities are an empty
//! template, never a missing value.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Placeholder substituted with the package name in command templates.
pub const PACKAGE_PLACEHOLDER: &str = "{{Package}}";

/// Older spelling of [`PACKAGE_PLACEHOLDER`], still accepted.
pub const LEGACY_PACKAGE_PLACEHOLDER: &str = "{{.Package}}";

// ============================================================================
// Parse strategy
// ============================================================================

/// How list output is turned into package names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParseStrategy {
    /// First whitespace token of each non-blank line
    #[default]
    #[serde(rename = "lines")]
    Lines,
    /// Array of objects, one field per element
    #[serde(rename = "json")]
    Json,
    /// Key set of the object at a dotted field
    #[serde(rename = "json-map")]
    JsonMap,
    /// Keys and/or string values selected by path expressions
    #[serde(rename = "jsonpath")]
    JsonPath,
}

impl ParseStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lines => "lines",
            Self::Json => "json",
            Self::JsonMap => "json-map",
            Self::JsonPath => "jsonpath",
        }
    }
}

impl fmt::Display for ParseStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name normalization applied after parsing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Normalize {
    #[default]
    None,
    /// Case-fold to lowercase
    Lower,
}

// ============================================================================
// Spec records
// ============================================================================

/// One command template plus the output phrases that turn its failure into
/// success.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandSpec {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub idempotent_errors: Vec<String>,
}

impl CommandSpec {
    pub fn new(command: &[&str]) -> Self {
        Self {
            command: command.iter().map(|s| (*s).to_string()).collect(),
            idempotent_errors: Vec::new(),
        }
    }

    pub fn idempotent(mut self, phrases: &[&str]) -> Self {
        self.idempotent_errors = phrases.iter().map(|s| (*s).to_string()).collect();
        self
    }

    pub fn is_empty(&self) -> bool {
        self.command.is_empty()
    }

    /// Substitute `package` for the placeholder in every argument.
    pub fn render(&self, package: &str) -> Vec<String> {
        self.command
            .iter()
            .map(|part| {
                part.replace(PACKAGE_PLACEHOLDER, package)
                    .replace(LEGACY_PACKAGE_PLACEHOLDER, package)
            })
            .collect()
    }

    /// Case-insensitive substring match of `output` against the
    /// idempotent-error phrases.
    pub fn is_idempotent(&self, output: &str) -> bool {
        if self.idempotent_errors.is_empty() {
            return false;
        }
        let haystack = output.to_lowercase();
        self.idempotent_errors
            .iter()
            .filter(|phrase| !phrase.is_empty())
            .any(|phrase| haystack.contains(&phrase.to_lowercase()))
    }
}

/// How to list installed packages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListSpec {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    #[serde(alias = "parse_strategy", skip_serializing_if = "Option::is_none")]
    pub parse: Option<ParseStrategy>,
    /// Field name for `json`, dotted field for `json-map`
    #[serde(skip_serializing_if = "String::is_empty")]
    pub json_field: String,
    /// Path whose object keys are package names (`jsonpath`)
    #[serde(skip_serializing_if = "String::is_empty")]
    pub keys_from: String,
    /// Path whose string values are package names (`jsonpath`)
    #[serde(skip_serializing_if = "String::is_empty")]
    pub values_from: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalize: Option<Normalize>,
}

impl ListSpec {
    pub fn strategy(&self) -> ParseStrategy {
        self.parse.unwrap_or_default()
    }

    pub fn normalization(&self) -> Normalize {
        self.normalize.unwrap_or_default()
    }
}

/// Regex rewrite applied to every listed name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NameTransform {
    /// Transform kind; only `regex` is supported (empty means `regex`)
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub kind: String,
    pub pattern: String,
    pub replacement: String,
}

/// Derives one metadata field from a package name.
///
/// With no pattern the whole name is stored. With a pattern, `group` selects
/// the capture group; an out-of-range or zero group means the whole match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataExtractor {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub pattern: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub group: usize,
    /// Where to read from; only `name` is supported (empty means `name`)
    #[serde(skip_serializing_if = "String::is_empty")]
    pub source: String,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

/// Full declarative description of one package manager.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerSpec {
    pub binary: String,
    /// Verification probe; defaults to `<binary> --version`
    pub available: CommandSpec,
    pub list: ListSpec,
    pub install: CommandSpec,
    pub upgrade: CommandSpec,
    pub upgrade_all: CommandSpec,
    pub uninstall: CommandSpec,
    pub info: CommandSpec,
    pub search: CommandSpec,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub install_hint: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub help_url: String,
    /// Metadata key whose value is handed to upgrade instead of the name
    #[serde(skip_serializing_if = "String::is_empty")]
    pub upgrade_target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_transform: Option<NameTransform>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata_extractors: BTreeMap<String, MetadataExtractor>,
}

impl ManagerSpec {
    /// The availability probe, falling back to `<binary> --version`.
    pub fn available_command(&self) -> Vec<String> {
        if self.available.is_empty() {
            vec![self.binary.clone(), "--version".to_string()]
        } else {
            self.available.command.clone()
        }
    }

    pub fn supports_search(&self) -> bool {
        !self.search.is_empty()
    }
}

// ============================================================================
// Merging
// ============================================================================

/// Merge a user override onto a base spec.
///
/// Non-empty override fields win; unset fields inherit from `base`. Command
/// specs merge `command` and `idempotent_errors` independently, list specs
/// merge field by field, and metadata extractor maps merge by key with the
/// override winning.
pub fn merge_manager_config(base: &ManagerSpec, over: &ManagerSpec) -> ManagerSpec {
    let mut extractors = base.metadata_extractors.clone();
    extractors.extend(
        over.metadata_extractors
            .iter()
            .map(|(k, v)| (k.clone(), v.clone())),
    );

    ManagerSpec {
        binary: pick(&base.binary, &over.binary),
        available: merge_command(&base.available, &over.available),
        list: merge_list(&base.list, &over.list),
        install: merge_command(&base.install, &over.install),
        upgrade: merge_command(&base.upgrade, &over.upgrade),
        upgrade_all: merge_command(&base.upgrade_all, &over.upgrade_all),
        uninstall: merge_command(&base.uninstall, &over.uninstall),
        info: merge_command(&base.info, &over.info),
        search: merge_command(&base.search, &over.search),
        description: pick(&base.description, &over.description),
        install_hint: pick(&base.install_hint, &over.install_hint),
        help_url: pick(&base.help_url, &over.help_url),
        upgrade_target: pick(&base.upgrade_target, &over.upgrade_target),
        name_transform: over
            .name_transform
            .clone()
            .or_else(|| base.name_transform.clone()),
        metadata_extractors: extractors,
    }
}

fn pick(base: &str, over: &str) -> String {
    let chosen = if over.is_empty() { base } else { over };
    chosen.to_string()
}

fn pick_vec(base: &[String], over: &[String]) -> Vec<String> {
    let chosen = if over.is_empty() { base } else { over };
    chosen.to_vec()
}

fn merge_command(base: &CommandSpec, over: &CommandSpec) -> CommandSpec {
    CommandSpec {
        command: pick_vec(&base.command, &over.command),
        idempotent_errors: pick_vec(&base.idempotent_errors, &over.idempotent_errors),
    }
}

fn merge_list(base: &ListSpec, over: &ListSpec) -> ListSpec {
    ListSpec {
        command: pick_vec(&base.command, &over.command),
        parse: over.parse.or(base.parse),
        json_field: pick(&base.json_field, &over.json_field),
        keys_from: pick(&base.keys_from, &over.keys_from),
        values_from: pick(&base.values_from, &over.values_from),
        normalize: over.normalize.or(base.normalize),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_both_placeholders() {
        let spec = CommandSpec::new(&["npm", "install", "-g", "{{Package}}"]);
        assert_eq!(spec.render("typescript"), vec!["npm", "install", "-g", "typescript"]);

        let legacy = CommandSpec::new(&["pipx", "install", "{{.Package}}"]);
        assert_eq!(legacy.render("ruff"), vec!["pipx", "install", "ruff"]);
    }

    #[test]
    fn test_idempotent_match_is_case_insensitive_substring() {
        let spec = CommandSpec::new(&["brew", "install", "{{Package}}"])
            .idempotent(&["already installed"]);
        assert!(spec.is_idempotent("Warning: git 2.44 is ALREADY INSTALLED and up-to-date"));
        assert!(!spec.is_idempotent("Error: No available formula"));
        assert!(!CommandSpec::default().is_idempotent("already installed"));
    }

    #[test]
    fn test_available_command_defaults_to_version() {
        let spec = ManagerSpec {
            binary: "uv".into(),
            ..Default::default()
        };
        assert_eq!(spec.available_command(), vec!["uv", "--version"]);
    }

    #[test]
    fn test_merge_override_wins_and_inherits() {
        let base = ManagerSpec {
            binary: "npm".into(),
            description: "npm".into(),
            install: CommandSpec::new(&["npm", "install", "-g", "{{Package}}"])
                .idempotent(&["already installed"]),
            list: ListSpec {
                command: vec!["npm".into(), "ls".into()],
                parse: Some(ParseStrategy::JsonMap),
                json_field: "dependencies".into(),
                ..Default::default()
            },
            ..Default::default()
        };
        let over = ManagerSpec {
            install: CommandSpec::new(&["npm", "i", "-g", "{{Package}}"]),
            list: ListSpec {
                normalize: Some(Normalize::Lower),
                ..Default::default()
            },
            ..Default::default()
        };

        let merged = merge_manager_config(&base, &over);
        assert_eq!(merged.binary, "npm");
        assert_eq!(merged.description, "npm");
        assert_eq!(merged.install.command, vec!["npm", "i", "-g", "{{Package}}"]);
        // idempotent phrases merge separately from the command
        assert_eq!(merged.install.idempotent_errors, vec!["already installed"]);
        assert_eq!(merged.list.strategy(), ParseStrategy::JsonMap);
        assert_eq!(merged.list.json_field, "dependencies");
        assert_eq!(merged.list.normalization(), Normalize::Lower);
    }

    #[test]
    fn test_merge_metadata_extractors_by_key() {
        let mut base = ManagerSpec::default();
        base.metadata_extractors.insert(
            "scope".into(),
            MetadataExtractor {
                pattern: "^(@[^/]+)/".into(),
                group: 1,
                source: "name".into(),
            },
        );
        base.metadata_extractors
            .insert("full_name".into(), MetadataExtractor::default());

        let mut over = ManagerSpec::default();
        over.metadata_extractors.insert(
            "scope".into(),
            MetadataExtractor {
                pattern: "^@([^/]+)/".into(),
                group: 1,
                source: "name".into(),
            },
        );

        let merged = merge_manager_config(&base, &over);
        assert_eq!(merged.metadata_extractors.len(), 2);
        assert_eq!(merged.metadata_extractors["scope"].pattern, "^@([^/]+)/");
        assert!(merged.metadata_extractors.contains_key("full_name"));
    }

    #[test]
    fn test_deserialize_parse_strategy_alias() {
        let list: ListSpec =
            serde_json::from_str(r#"{"command":["x"],"parse_strategy":"json-map"}"#).unwrap();
        assert_eq!(list.strategy(), ParseStrategy::JsonMap);

        let bad = serde_json::from_str::<ListSpec>(r#"{"parse":"xml"}"#);
        assert!(bad.is_err());
    }
}
