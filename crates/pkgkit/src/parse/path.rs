//! Minimal JSON path addressing shared by the `json-map` and `jsonpath`
//! strategies.
//!
//! Supported syntax: `$`, `.field`, `['field']`, `["field"]`, `[n]`, `[*]`
//! and `.*`. A path without a leading `$` is read as a dotted field name, so
//! `dependencies` and `$.dependencies` address the same value.

use crate::error::{Error, Result};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
    Wildcard,
}

/// A parsed path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    segments: Vec<Segment>,
    source: String,
}

impl JsonPath {
    /// Parse a path expression.
    pub fn parse(expr: &str) -> Result<Self> {
        let expr = expr.trim();
        if expr.is_empty() {
            return Err(invalid(expr, "empty path"));
        }

        let mut segments = Vec::new();
        let mut rest = match expr.strip_prefix('$') {
            Some(tail) => tail,
            None => {
                let (name, tail) = take_name(expr);
                if name.is_empty() {
                    return Err(invalid(expr, "expected a field name or '$'"));
                }
                segments.push(Segment::Key(name.to_string()));
                tail
            }
        };

        while !rest.is_empty() {
            if let Some(tail) = rest.strip_prefix('.') {
                if tail.starts_with('.') {
                    return Err(invalid(expr, "recursive descent is not supported"));
                }
                if let Some(after) = tail.strip_prefix('*') {
                    segments.push(Segment::Wildcard);
                    rest = after;
                    continue;
                }
                let (name, after) = take_name(tail);
                if name.is_empty() {
                    return Err(invalid(expr, "empty field name"));
                }
                segments.push(Segment::Key(name.to_string()));
                rest = after;
            } else if let Some(tail) = rest.strip_prefix('[') {
                let end = tail
                    .find(']')
                    .ok_or_else(|| invalid(expr, "unclosed '['"))?;
                segments.push(parse_bracket(expr, tail[..end].trim())?);
                rest = &tail[end + 1..];
            } else {
                return Err(invalid(expr, "expected '.' or '['"));
            }
        }

        Ok(Self {
            segments,
            source: expr.to_string(),
        })
    }

    /// Build a path from a dotted field name (`a.b.c`).
    pub fn from_dotted(field: &str) -> Self {
        let segments = field
            .split('.')
            .filter(|part| !part.is_empty())
            .map(|part| Segment::Key(part.to_string()))
            .collect();
        Self {
            segments,
            source: field.to_string(),
        }
    }

    /// Whether the path addresses the document root.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Every value the path resolves to, in document order.
    pub fn select<'a>(&self, root: &'a Value) -> Vec<&'a Value> {
        let mut current = vec![root];
        for segment in &self.segments {
            let mut next = Vec::new();
            for value in current {
                match segment {
                    Segment::Key(key) => next.extend(value.get(key.as_str())),
                    Segment::Index(index) => next.extend(value.get(*index)),
                    Segment::Wildcard => match value {
                        Value::Object(map) => next.extend(map.values()),
                        Value::Array(items) => next.extend(items.iter()),
                        _ => {}
                    },
                }
            }
            if next.is_empty() {
                return next;
            }
            current = next;
        }
        current
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn take_name(s: &str) -> (&str, &str) {
    let end = s.find(['.', '[']).unwrap_or(s.len());
    (&s[..end], &s[end..])
}

fn parse_bracket(expr: &str, inner: &str) -> Result<Segment> {
    if inner == "*" {
        return Ok(Segment::Wildcard);
    }
    for quote in ['\'', '"'] {
        if let Some(key) = inner
            .strip_prefix(quote)
            .and_then(|s| s.strip_suffix(quote))
        {
            return Ok(Segment::Key(key.to_string()));
        }
    }
    inner
        .parse::<usize>()
        .map(Segment::Index)
        .map_err(|_| invalid(expr, &format!("unsupported selector [{inner}]")))
}

fn invalid(expr: &str, reason: &str) -> Error {
    Error::InvalidConfig(format!("json path {expr:?}: {reason}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn keys(values: &[&Value]) -> Vec<String> {
        values
            .iter()
            .map(|v| v.as_str().unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn test_dotted_and_dollar_forms_agree() {
        let doc = json!({"a": {"b": "x"}});
        let dotted = JsonPath::parse("a.b").unwrap();
        let rooted = JsonPath::parse("$.a.b").unwrap();
        assert_eq!(keys(&dotted.select(&doc)), vec!["x"]);
        assert_eq!(keys(&rooted.select(&doc)), vec!["x"]);
        assert_eq!(JsonPath::from_dotted("a.b").select(&doc), dotted.select(&doc));
    }

    #[test]
    fn test_root_selects_document() {
        let doc = json!({"a": 1});
        let path = JsonPath::parse("$").unwrap();
        assert!(path.is_root());
        assert_eq!(path.select(&doc), vec![&doc]);
    }

    #[test]
    fn test_wildcards_and_indexes() {
        let doc = json!([
            {"dependencies": {"typescript": {}}},
            {"dependencies": {"eslint": {}}}
        ]);
        let all = JsonPath::parse("$[*].dependencies").unwrap();
        assert_eq!(all.select(&doc).len(), 2);

        let first = JsonPath::parse("$[0].dependencies").unwrap();
        assert_eq!(first.select(&doc), vec![&doc[0]["dependencies"]]);

        let names = JsonPath::parse("$.*").unwrap();
        assert_eq!(names.select(&json!({"a": "1", "b": "2"})).len(), 2);
    }

    #[test]
    fn test_quoted_keys() {
        let doc = json!({"@scope/pkg": {"version": "1.0.0"}});
        let path = JsonPath::parse("$['@scope/pkg'].version").unwrap();
        assert_eq!(keys(&path.select(&doc)), vec!["1.0.0"]);
        let double = JsonPath::parse(r#"$["@scope/pkg"]"#).unwrap();
        assert_eq!(double.select(&doc).len(), 1);
    }

    #[test]
    fn test_missing_path_selects_nothing() {
        let doc = json!({"devDependencies": {"x": {}}});
        assert!(JsonPath::parse("$.dependencies").unwrap().select(&doc).is_empty());
        assert!(JsonPath::parse("$.a.b.c").unwrap().select(&doc).is_empty());
    }

    #[test]
    fn test_invalid_expressions() {
        assert!(JsonPath::parse("").is_err());
        assert!(JsonPath::parse("$..name").is_err());
        assert!(JsonPath::parse("$[").is_err());
        assert!(JsonPath::parse("$[?(@.x)]").is_err());
        assert!(JsonPath::parse("$a").is_err());
    }
}
