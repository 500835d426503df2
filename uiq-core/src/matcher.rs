//! Text matching: literals, regex patterns and node predicates.
//!
//! Literal and pattern matchers compare against a *normalized* candidate
//! (default: trim, then collapse whitespace runs to one space).  Predicate
//! matchers receive the raw node and raw candidate and bypass normalization.

use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::tree::UiNode;

/// Predicate matcher: `(node, candidate) -> bool`.
pub type MatchFn = Arc<dyn Fn(&UiNode, Option<&str>) -> bool + Send + Sync>;

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

/// String transform applied to both sides of a literal/pattern comparison.
#[derive(Clone)]
pub struct Normalizer(Arc<dyn Fn(&str) -> String + Send + Sync>);

impl Normalizer {
    /// Default normalizer with individually switchable steps.
    pub fn with_options(trim: bool, collapse_whitespace: bool) -> Self {
        Normalizer(Arc::new(move |text: &str| {
            let text = if trim { text.trim() } else { text };
            if collapse_whitespace {
                collapse_whitespace_runs(text)
            } else {
                text.to_owned()
            }
        }))
    }

    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        Normalizer(Arc::new(f))
    }

    pub fn apply(&self, text: &str) -> String {
        (self.0)(text)
    }
}

fn collapse_whitespace_runs(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_run = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !in_run {
                out.push(' ');
            }
            in_run = true;
        } else {
            out.push(ch);
            in_run = false;
        }
    }
    out
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::with_options(true, true)
    }
}

impl fmt::Debug for Normalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Normalizer")
    }
}

// ---------------------------------------------------------------------------
// TextMatch
// ---------------------------------------------------------------------------

/// What a candidate string is compared against.
#[derive(Clone)]
pub enum TextMatch {
    Literal(String),
    Pattern(Regex),
    Predicate(MatchFn),
}

impl TextMatch {
    pub fn literal(text: impl Into<String>) -> Self {
        TextMatch::Literal(text.into())
    }

    /// Compile `pattern` into a pattern matcher.
    pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(TextMatch::Pattern)
    }

    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&UiNode, Option<&str>) -> bool + Send + Sync + 'static,
    {
        TextMatch::Predicate(Arc::new(f))
    }

    /// Match `candidate` (read from `node`) under `options`.
    ///
    /// An absent candidate never matches a literal or pattern.
    pub fn matches(&self, node: &UiNode, candidate: Option<&str>, options: &TextMatchOptions) -> bool {
        match self {
            TextMatch::Predicate(f) => f(node, candidate),
            TextMatch::Literal(expected) => {
                let Some(candidate) = candidate else {
                    return false;
                };
                let normalizer = options.normalizer.clone().unwrap_or_default();
                let candidate = normalizer.apply(candidate);
                let expected = normalizer.apply(expected);
                if options.exact.unwrap_or(true) {
                    candidate == expected
                } else {
                    candidate.to_lowercase().contains(&expected.to_lowercase())
                }
            }
            TextMatch::Pattern(regex) => {
                let Some(candidate) = candidate else {
                    return false;
                };
                let normalizer = options.normalizer.clone().unwrap_or_default();
                regex.is_match(&normalizer.apply(candidate))
            }
        }
    }
}

impl From<&str> for TextMatch {
    fn from(text: &str) -> Self {
        TextMatch::Literal(text.to_owned())
    }
}

impl From<String> for TextMatch {
    fn from(text: String) -> Self {
        TextMatch::Literal(text)
    }
}

impl From<Regex> for TextMatch {
    fn from(regex: Regex) -> Self {
        TextMatch::Pattern(regex)
    }
}

/// Human-readable rendering used in error messages: `"Save"`, `/foo/i`,
/// `[predicate]`.
impl fmt::Display for TextMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextMatch::Literal(text) => write!(f, "{text:?}"),
            TextMatch::Pattern(regex) => {
                let source = regex.as_str();
                match source.strip_prefix("(?i)") {
                    Some(rest) => write!(f, "/{rest}/i"),
                    None => write!(f, "/{source}/"),
                }
            }
            TextMatch::Predicate(_) => f.write_str("[predicate]"),
        }
    }
}

impl fmt::Debug for TextMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TextMatch({self})")
    }
}

/// Options for literal/pattern comparison.
#[derive(Debug, Clone, Default)]
pub struct TextMatchOptions {
    /// Exact equality (default) vs. case-insensitive substring.
    pub exact: Option<bool>,
    pub normalizer: Option<Normalizer>,
}

impl TextMatchOptions {
    pub fn substring() -> Self {
        TextMatchOptions {
            exact: Some(false),
            normalizer: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn node() -> Arc<UiNode> {
        UiNode::host("Text").build()
    }

    #[test]
    fn test_default_normalizer_trims_and_collapses() {
        let n = Normalizer::default();
        assert_eq!(n.apply("  Hello \n\t  World  "), "Hello World");
        let keep = Normalizer::with_options(false, true);
        assert_eq!(keep.apply("  a  b "), " a b ");
    }

    #[test]
    fn test_literal_exact_uses_normalized_equality() {
        let m = TextMatch::literal("Hello World");
        let opts = TextMatchOptions::default();
        assert!(m.matches(&node(), Some("  Hello   World "), &opts));
        assert!(!m.matches(&node(), Some("hello world"), &opts));
        assert!(!m.matches(&node(), Some("Hello World!"), &opts));
    }

    #[test]
    fn test_literal_substring_is_case_insensitive() {
        let m = TextMatch::literal("world");
        assert!(m.matches(&node(), Some("Hello World"), &TextMatchOptions::substring()));
    }

    #[test]
    fn test_absent_candidate_never_matches_literal_or_pattern() {
        let opts = TextMatchOptions::default();
        assert!(!TextMatch::literal("").matches(&node(), None, &opts));
        assert!(!TextMatch::pattern(".*").unwrap().matches(&node(), None, &opts));
    }

    #[test]
    fn test_pattern_tests_normalized_candidate() {
        let m = TextMatch::pattern("^a b$").unwrap();
        assert!(m.matches(&node(), Some("  a    b "), &TextMatchOptions::default()));
    }

    #[test]
    fn test_predicate_receives_raw_candidate_and_none() {
        let m = TextMatch::predicate(|_, candidate| candidate == Some("  raw ") || candidate.is_none());
        let opts = TextMatchOptions::default();
        assert!(m.matches(&node(), Some("  raw "), &opts));
        assert!(m.matches(&node(), None, &opts));
        assert!(!m.matches(&node(), Some("raw"), &opts));
    }

    #[test]
    fn test_custom_normalizer() {
        let opts = TextMatchOptions {
            exact: None,
            normalizer: Some(Normalizer::custom(|s| s.to_uppercase())),
        };
        assert!(TextMatch::literal("abc").matches(&node(), Some("ABC"), &opts));
    }

    #[test]
    fn test_display_rendering() {
        assert_eq!(TextMatch::literal("Save").to_string(), "\"Save\"");
        assert_eq!(TextMatch::pattern("(?i)foo").unwrap().to_string(), "/foo/i");
        assert_eq!(TextMatch::pattern("bar").unwrap().to_string(), "/bar/");
    }
}
