//! Output parsers.
//!
//! Pure functions turning raw list output into package names. Genuinely empty
//! output is never an error: a manager with nothing installed prints nothing.
//! Malformed JSON always is.

pub mod path;
pub mod transform;

pub use path::JsonPath;
pub use transform::{NameRewriter, extract_metadata};

use crate::error::{Error, Result};
use crate::spec::{ListSpec, NameTransform, Normalize, ParseStrategy};
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};

/// First whitespace-delimited token of every non-blank line.
pub fn parse_lines(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect()
}

/// `field` of every element of a top-level JSON array.
///
/// Elements whose field is missing or not a string are skipped.
pub fn parse_json_array(text: &str, field: &str) -> Result<Vec<String>> {
    let doc: Value = serde_json::from_str(text)?;
    let items = doc.as_array().ok_or_else(|| {
        Error::parse(ParseStrategy::Json.as_str(), "expected a JSON array")
    })?;
    Ok(items
        .iter()
        .filter_map(|item| item.get(field).and_then(Value::as_str))
        .map(str::to_string)
        .collect())
}

/// Key set of the object addressed by a dotted `field` (or of the top-level
/// object when `field` is empty).
///
/// A missing or non-object field yields no names: the nested collection is
/// commonly omitted when nothing is installed.
pub fn parse_json_map(text: &str, field: &str) -> Result<Vec<String>> {
    let doc: Value = serde_json::from_str(text)?;
    if !doc.is_object() {
        return Err(Error::parse(
            ParseStrategy::JsonMap.as_str(),
            "expected a JSON object",
        ));
    }
    let path = JsonPath::from_dotted(field);
    Ok(path
        .select(&doc)
        .into_iter()
        .filter_map(Value::as_object)
        .flat_map(|map| map.keys().cloned())
        .collect())
}

/// Names from path expressions: the keys of every object at `keys_from`
/// plus every string at `values_from`, deduplicated and sorted.
///
/// A path that matches nothing is an error on a non-empty document, since it
/// usually means the path is wrong. On an empty document (`{}`, `[]`,
/// `null`) it means the manager has nothing installed.
pub fn parse_json_path(text: &str, keys_from: &str, values_from: &str) -> Result<Vec<String>> {
    if keys_from.is_empty() && values_from.is_empty() {
        return Err(Error::InvalidConfig(
            "jsonpath strategy needs keys_from or values_from".to_string(),
        ));
    }
    let doc: Value = serde_json::from_str(text)?;
    let mut names = BTreeSet::new();

    if !keys_from.is_empty() {
        for value in select_required(&doc, keys_from)? {
            match value {
                Value::Object(map) => names.extend(map.keys().cloned()),
                Value::Null => {}
                other => {
                    return Err(Error::parse(
                        ParseStrategy::JsonPath.as_str(),
                        format!("keys_from {keys_from:?} expected object(s), got {}", kind(other)),
                    ));
                }
            }
        }
    }

    if !values_from.is_empty() {
        for value in select_required(&doc, values_from)? {
            match value {
                Value::String(s) => {
                    names.insert(s.clone());
                }
                Value::Null => {}
                other => {
                    return Err(Error::parse(
                        ParseStrategy::JsonPath.as_str(),
                        format!(
                            "values_from {values_from:?} expected string(s), got {}",
                            kind(other)
                        ),
                    ));
                }
            }
        }
    }

    names.remove("");
    Ok(names.into_iter().collect())
}

/// Select `expr`, flattening one level of arrays so a path to a list of
/// objects behaves like a wildcard over it.
fn select_required<'a>(doc: &'a Value, expr: &str) -> Result<Vec<&'a Value>> {
    let path = JsonPath::parse(expr)?;
    let matched = path.select(doc);
    if matched.is_empty() {
        if is_empty_document(doc) {
            return Ok(Vec::new());
        }
        return Err(Error::parse(
            ParseStrategy::JsonPath.as_str(),
            format!("path {path} matched nothing"),
        ));
    }
    Ok(matched
        .into_iter()
        .flat_map(|value| match value {
            Value::Array(items) => items.iter().collect::<Vec<_>>(),
            other => vec![other],
        })
        .collect())
}

fn is_empty_document(doc: &Value) -> bool {
    match doc {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Apply a normalization mode to one name.
pub fn normalize(name: String, mode: Normalize) -> String {
    match mode {
        Normalize::None => name,
        Normalize::Lower => name.to_lowercase(),
    }
}

// ============================================================================
// List parser
// ============================================================================

/// A [`ListSpec`] with its regexes compiled, ready to parse list output.
///
/// Pipeline: strategy → name transform → normalization → de-duplication
/// (first occurrence wins, order preserved).
#[derive(Debug, Clone)]
pub struct ListParser {
    spec: ListSpec,
    rewriter: Option<NameRewriter>,
}

impl ListParser {
    pub fn new(spec: &ListSpec, transform: Option<&NameTransform>) -> Result<Self> {
        let rewriter = transform.map(NameRewriter::new).transpose()?;
        if spec.strategy() == ParseStrategy::JsonPath {
            for expr in [&spec.keys_from, &spec.values_from] {
                if !expr.is_empty() {
                    JsonPath::parse(expr)?;
                }
            }
        }
        Ok(Self {
            spec: spec.clone(),
            rewriter,
        })
    }

    pub fn strategy(&self) -> ParseStrategy {
        self.spec.strategy()
    }

    pub fn parse(&self, raw: &[u8]) -> Result<Vec<String>> {
        let text = String::from_utf8_lossy(raw);
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let names = match self.spec.strategy() {
            ParseStrategy::Lines => parse_lines(&text),
            ParseStrategy::Json => parse_json_array(&text, &self.spec.json_field)?,
            ParseStrategy::JsonMap => parse_json_map(&text, &self.spec.json_field)?,
            ParseStrategy::JsonPath => {
                parse_json_path(&text, &self.spec.keys_from, &self.spec.values_from)?
            }
        };

        let mut seen = HashSet::new();
        Ok(names
            .iter()
            .map(|n| self.normalize_name(n))
            .filter(|n| !n.is_empty() && seen.insert(n.clone()))
            .collect())
    }

    /// Rewrite and normalize one name the way listed names are, so names
    /// from elsewhere compare equal to parsed ones.
    pub fn normalize_name(&self, name: &str) -> String {
        let name = match &self.rewriter {
            Some(rewriter) => rewriter.apply(name),
            None => name.to_string(),
        };
        normalize(name, self.spec.normalization())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(mut v: Vec<String>) -> Vec<String> {
        v.sort();
        v
    }

    #[test]
    fn test_lines_skips_blank_lines() {
        assert_eq!(parse_lines("\n\nruff\nblack\n\n"), vec!["ruff", "black"]);
    }

    #[test]
    fn test_lines_takes_first_token() {
        assert_eq!(
            parse_lines("ruff 0.4.1\n  black   24.3.0  \n"),
            vec!["ruff", "black"]
        );
    }

    #[test]
    fn test_lines_blank_input_is_empty() {
        assert!(parse_lines("").is_empty());
        assert!(parse_lines("  \n\t\n ").is_empty());
    }

    #[test]
    fn test_json_array_skips_missing_and_non_string_fields() {
        let text = r#"[{"name":"numpy"},{"version":"1.0"},{"name":42},{"name":"scipy"}]"#;
        assert_eq!(parse_json_array(text, "name").unwrap(), vec!["numpy", "scipy"]);
    }

    #[test]
    fn test_json_array_malformed_is_error() {
        assert!(parse_json_array("[{\"name\":", "name").is_err());
        assert!(parse_json_array(r#"{"name":"x"}"#, "name").is_err());
    }

    #[test]
    fn test_json_map_nested_field() {
        let text = r#"{"dependencies":{"pkg1":{},"pkg2":{}}}"#;
        assert_eq!(
            sorted(parse_json_map(text, "dependencies").unwrap()),
            vec!["pkg1", "pkg2"]
        );
    }

    #[test]
    fn test_json_map_missing_field_is_empty_not_error() {
        let text = r#"{"devDependencies":{"pkg1":{}}}"#;
        assert!(parse_json_map(text, "dependencies").unwrap().is_empty());
    }

    #[test]
    fn test_json_map_top_level_and_deep_fields() {
        assert_eq!(
            sorted(parse_json_map(r#"{"a":1,"b":2}"#, "").unwrap()),
            vec!["a", "b"]
        );
        let deep = r#"{"result":{"installed":{"x":{}}}}"#;
        assert_eq!(parse_json_map(deep, "result.installed").unwrap(), vec!["x"]);
    }

    #[test]
    fn test_json_map_malformed_is_error() {
        assert!(parse_json_map("{not json", "dependencies").is_err());
    }

    #[test]
    fn test_jsonpath_keys() {
        let text = r#"[{"dependencies":{"typescript":{},"eslint":{}}}]"#;
        assert_eq!(
            parse_json_path(text, "$[*].dependencies", "").unwrap(),
            vec!["eslint", "typescript"]
        );
    }

    #[test]
    fn test_jsonpath_unresolved_on_non_empty_doc_is_error() {
        let text = r#"{"devDependencies":{"x":{}}}"#;
        let err = parse_json_path(text, "$.dependencies", "").unwrap_err();
        assert!(err.to_string().contains("matched nothing"));
    }

    #[test]
    fn test_jsonpath_unresolved_on_empty_doc_is_not_error() {
        assert!(parse_json_path("{}", "$.dependencies", "").unwrap().is_empty());
        assert!(parse_json_path("[]", "$[*].dependencies", "").unwrap().is_empty());
    }

    #[test]
    fn test_jsonpath_values_and_keys_are_unioned() {
        let text = r#"{"tools":[{"name":"ruff"},{"name":"black"}],"extra":{"ruff":{},"mypy":{}}}"#;
        assert_eq!(
            parse_json_path(text, "$.extra", "$.tools[*].name").unwrap(),
            vec!["black", "mypy", "ruff"]
        );
    }

    #[test]
    fn test_jsonpath_type_mismatch_is_error() {
        assert!(parse_json_path(r#"{"a":"x"}"#, "$.a", "").is_err());
        assert!(parse_json_path(r#"{"a":{"b":1}}"#, "", "$.a.b").is_err());
    }

    #[test]
    fn test_jsonpath_requires_a_selector() {
        assert!(parse_json_path("{}", "", "").is_err());
    }

    #[test]
    fn test_normalize_lower() {
        assert_eq!(normalize("Django".to_string(), Normalize::Lower), "django");
        assert_eq!(normalize("Django".to_string(), Normalize::None), "Django");
    }

    #[test]
    fn test_list_parser_empty_output_is_never_an_error() {
        for parse in [
            ParseStrategy::Lines,
            ParseStrategy::Json,
            ParseStrategy::JsonMap,
            ParseStrategy::JsonPath,
        ] {
            let spec = ListSpec {
                parse: Some(parse),
                json_field: "name".into(),
                keys_from: "$.dependencies".into(),
                ..Default::default()
            };
            let parser = ListParser::new(&spec, None).unwrap();
            assert!(parser.parse(b"  \n").unwrap().is_empty(), "{parse}");
        }
    }

    #[test]
    fn test_list_parser_applies_transform_then_normalize_then_dedupes() {
        let spec = ListSpec {
            parse: Some(ParseStrategy::Lines),
            normalize: Some(Normalize::Lower),
            ..Default::default()
        };
        let transform = NameTransform {
            kind: "regex".into(),
            pattern: "@[0-9.]+$".into(),
            replacement: String::new(),
        };
        let parser = ListParser::new(&spec, Some(&transform)).unwrap();
        assert_eq!(
            parser.parse(b"Python@3.12\npython@3.11\nGit\n").unwrap(),
            vec!["python", "git"]
        );
        assert_eq!(parser.normalize_name("Python@3.12"), "python");
        assert_eq!(parser.normalize_name("ruff"), "ruff");
    }

    #[test]
    fn test_list_parser_rejects_bad_path_up_front() {
        let spec = ListSpec {
            parse: Some(ParseStrategy::JsonPath),
            keys_from: "$..deps".into(),
            ..Default::default()
        };
        assert!(ListParser::new(&spec, None).is_err());
    }
}
