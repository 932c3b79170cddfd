//! Regex name rewrites and metadata extraction.

use crate::error::{Error, Result};
use crate::spec::{MetadataExtractor, NameTransform};
use regex::Regex;
use std::collections::BTreeMap;

/// Compiled [`NameTransform`].
#[derive(Debug, Clone)]
pub struct NameRewriter {
    pattern: Regex,
    replacement: String,
}

impl NameRewriter {
    pub fn new(transform: &NameTransform) -> Result<Self> {
        if !transform.kind.is_empty() && transform.kind != "regex" {
            return Err(Error::InvalidConfig(format!(
                "unsupported name_transform type {:?} (expected \"regex\")",
                transform.kind
            )));
        }
        Ok(Self {
            pattern: Regex::new(&transform.pattern)?,
            replacement: transform.replacement.clone(),
        })
    }

    pub fn apply(&self, name: &str) -> String {
        self.pattern
            .replace_all(name, self.replacement.as_str())
            .into_owned()
    }
}

/// Check that an extractor can be evaluated.
pub fn validate_extractor(key: &str, extractor: &MetadataExtractor) -> Result<()> {
    if !extractor.source.is_empty() && extractor.source != "name" {
        return Err(Error::InvalidConfig(format!(
            "metadata extractor {key:?}: unsupported source {:?} (expected \"name\")",
            extractor.source
        )));
    }
    if !extractor.pattern.is_empty() {
        Regex::new(&extractor.pattern)?;
    }
    Ok(())
}

/// Run every extractor against a package name.
///
/// Extractors that do not match contribute nothing. Invalid patterns are
/// skipped here; configuration validation reports them.
pub fn extract_metadata(
    name: &str,
    extractors: &BTreeMap<String, MetadataExtractor>,
) -> BTreeMap<String, String> {
    extractors
        .iter()
        .filter_map(|(key, extractor)| {
            extract_one(name, extractor).map(|value| (key.clone(), value))
        })
        .collect()
}

fn extract_one(name: &str, extractor: &MetadataExtractor) -> Option<String> {
    if !extractor.source.is_empty() && extractor.source != "name" {
        return None;
    }
    if extractor.pattern.is_empty() {
        return Some(name.to_string());
    }
    let re = match Regex::new(&extractor.pattern) {
        Ok(re) => re,
        Err(e) => {
            log::debug!("skipping extractor {:?}: {e}", extractor.pattern);
            return None;
        }
    };
    let caps = re.captures(name)?;
    let whole = caps.get(0)?;
    let chosen = match extractor.group {
        0 => whole,
        n => caps.get(n).unwrap_or(whole),
    };
    Some(chosen.as_str().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn npm_extractors() -> BTreeMap<String, MetadataExtractor> {
        let mut map = BTreeMap::new();
        map.insert(
            "scope".to_string(),
            MetadataExtractor {
                pattern: "^(@[^/]+)/".into(),
                group: 1,
                source: "name".into(),
            },
        );
        map.insert(
            "full_name".to_string(),
            MetadataExtractor {
                source: "name".into(),
                ..Default::default()
            },
        );
        map
    }

    #[test]
    fn test_scoped_name_extracts_scope_and_full_name() {
        let meta = extract_metadata("@angular/cli", &npm_extractors());
        assert_eq!(meta["scope"], "@angular");
        assert_eq!(meta["full_name"], "@angular/cli");
    }

    #[test]
    fn test_unscoped_name_has_no_scope() {
        let meta = extract_metadata("typescript", &npm_extractors());
        assert!(!meta.contains_key("scope"));
        assert_eq!(meta["full_name"], "typescript");
    }

    #[test]
    fn test_out_of_range_group_falls_back_to_whole_match() {
        let mut map = BTreeMap::new();
        map.insert(
            "prefix".to_string(),
            MetadataExtractor {
                pattern: "^[a-z]+".into(),
                group: 3,
                source: String::new(),
            },
        );
        assert_eq!(extract_metadata("ripgrep-14", &map)["prefix"], "ripgrep");
    }

    #[test]
    fn test_rewriter() {
        let rewriter = NameRewriter::new(&NameTransform {
            kind: String::new(),
            pattern: "^(.+)@.*$".into(),
            replacement: "$1".into(),
        })
        .unwrap();
        assert_eq!(rewriter.apply("node@20"), "node");
        assert_eq!(rewriter.apply("git"), "git");
    }

    #[test]
    fn test_rewriter_rejects_unknown_kind_and_bad_regex() {
        let unknown = NameTransform {
            kind: "glob".into(),
            pattern: "*".into(),
            replacement: String::new(),
        };
        assert!(NameRewriter::new(&unknown).is_err());

        let bad = NameTransform {
            kind: "regex".into(),
            pattern: "(".into(),
            replacement: String::new(),
        };
        assert!(NameRewriter::new(&bad).is_err());
    }

    #[test]
    fn test_validate_extractor() {
        assert!(validate_extractor("scope", &npm_extractors()["scope"]).is_ok());
        let json_source = MetadataExtractor {
            source: "json_field".into(),
            ..Default::default()
        };
        assert!(validate_extractor("version", &json_source).is_err());
    }
}
