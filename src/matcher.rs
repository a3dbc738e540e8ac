//! # File Name Matching Module
//!
//! Decides whether a file name satisfies an include/exclude specification.
//!
//! ## Specification variants:
//! - Exact string: name must equal the spec
//! - Set of strings: name must be contained in the set
//! - Pattern: name must match a regular expression
//!
//! An absent spec (`Option::None` at the call sites) matches nothing;
//! callers special-case "no exclude configured" as always-false and
//! "no include configured" as fall-through to the default test+exclude
//! policy.
//!
//! `MatchSpec` is the serde-facing form found in config files. It is
//! compiled once into a `Matcher` when the selector is built, so a
//! malformed pattern fails at configuration time rather than per file.

use crate::error::OptimizeError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Matcher specification as it appears in configuration.
///
/// Deserializes from a bare string (exact match), an array of strings
/// (set match) or `{ "pattern": "..." }` (regex match).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MatchSpec {
    Exact(String),
    Set(Vec<String>),
    Pattern { pattern: String },
}

impl MatchSpec {
    /// Compile the specification into a reusable matcher.
    pub fn compile(&self) -> Result<Matcher, OptimizeError> {
        match self {
            MatchSpec::Exact(name) => Ok(Matcher::Exact(name.clone())),
            MatchSpec::Set(names) => Ok(Matcher::Set(names.iter().cloned().collect())),
            MatchSpec::Pattern { pattern } => Ok(Matcher::Pattern(regex::Regex::new(pattern)?)),
        }
    }
}

/// Compiled matcher ready for per-file checks
#[derive(Debug, Clone)]
pub enum Matcher {
    Exact(String),
    Set(HashSet<String>),
    Pattern(regex::Regex),
}

impl Matcher {
    /// Check whether a file name satisfies this matcher
    pub fn matches(&self, name: &str) -> bool {
        match self {
            Matcher::Exact(expected) => name == expected,
            Matcher::Set(names) => names.contains(name),
            Matcher::Pattern(re) => re.is_match(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        let matcher = MatchSpec::Exact("logo.png".to_string()).compile().unwrap();
        assert!(matcher.matches("logo.png"));
        assert!(!matcher.matches("logo.svg"));
        assert!(!matcher.matches("other-logo.png"));
    }

    #[test]
    fn test_set_match() {
        let spec = MatchSpec::Set(vec!["a.png".to_string(), "b.jpg".to_string()]);
        let matcher = spec.compile().unwrap();
        assert!(matcher.matches("a.png"));
        assert!(matcher.matches("b.jpg"));
        assert!(!matcher.matches("c.gif"));
    }

    #[test]
    fn test_pattern_match() {
        let spec = MatchSpec::Pattern {
            pattern: r"^hero-.*\.png$".to_string(),
        };
        let matcher = spec.compile().unwrap();
        assert!(matcher.matches("hero-banner.png"));
        assert!(!matcher.matches("hero-banner.jpg"));
        assert!(!matcher.matches("banner.png"));
    }

    #[test]
    fn test_invalid_pattern_fails_at_compile_time() {
        let spec = MatchSpec::Pattern {
            pattern: "([unclosed".to_string(),
        };
        assert!(spec.compile().is_err());
    }

    #[test]
    fn test_spec_deserialization_variants() {
        let exact: MatchSpec = serde_json::from_str(r#""a.png""#).unwrap();
        assert_eq!(exact, MatchSpec::Exact("a.png".to_string()));

        let set: MatchSpec = serde_json::from_str(r#"["a.png", "b.png"]"#).unwrap();
        assert_eq!(
            set,
            MatchSpec::Set(vec!["a.png".to_string(), "b.png".to_string()])
        );

        let pattern: MatchSpec = serde_json::from_str(r#"{"pattern": "\\.png$"}"#).unwrap();
        assert_eq!(
            pattern,
            MatchSpec::Pattern {
                pattern: r"\.png$".to_string()
            }
        );
    }
}
