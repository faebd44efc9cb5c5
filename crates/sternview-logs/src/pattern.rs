use regex::{Regex, RegexBuilder};

/// A user-supplied pattern, compiled once.
///
/// Valid regular expressions are matched case-insensitively. Anything that
/// fails to compile is kept as a literal and matched as a case-insensitive
/// substring, so plain names never error and never silently fail.
#[derive(Clone, Debug)]
pub enum Pattern {
    Regex(Regex),
    /// Lowercased literal
    Literal(String),
}

impl Pattern {
    pub fn new(pattern: &str) -> Self {
        match RegexBuilder::new(pattern).case_insensitive(true).build() {
            Ok(re) => Self::Regex(re),
            Err(_) => Self::Literal(pattern.to_lowercase()),
        }
    }

    pub fn is_match(&self, text: &str) -> bool {
        match self {
            Self::Regex(re) => re.is_match(text),
            Self::Literal(lit) => text.to_lowercase().contains(lit.as_str()),
        }
    }

    /// Byte ranges of every match in `text` (for highlighting)
    pub fn find_matches(&self, text: &str) -> Vec<(usize, usize)> {
        match self {
            Self::Regex(re) => re.find_iter(text).map(|m| (m.start(), m.end())).collect(),
            Self::Literal(lit) if !lit.is_empty() => {
                let lower = text.to_lowercase();
                // Lowercasing can change byte lengths outside ASCII
                if lower.len() != text.len() {
                    return Vec::new();
                }
                lower
                    .match_indices(lit.as_str())
                    .map(|(start, m)| (start, start + m.len()))
                    .collect()
            }
            Self::Literal(_) => Vec::new(),
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_))
    }
}

/// Test `text` against `pattern`, compiling it on the spot.
///
/// Prefer [`Pattern::new`] when the same pattern is applied to many entries.
pub fn matches(text: &str, pattern: &str) -> bool {
    Pattern::new(pattern).is_match(text)
}

/// Split a comma-separated list, trimming whitespace and dropping empty tokens
pub fn split_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|s| !s.is_empty())
}

/// Compile a comma-separated pattern list
pub fn compile_list(list: &str) -> Vec<Pattern> {
    split_list(list).map(Pattern::new).collect()
}

/// Reduce a resource reference such as `deployment/api` to its last segment
pub fn last_segment(value: &str) -> &str {
    let value = value.trim();
    value.rsplit('/').next().unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_regex_is_case_insensitive() {
        assert!(matches("API-server-7f9", "^api-.*"));
        assert!(!matches("web-1", "^api"));
    }

    #[test]
    fn test_invalid_regex_falls_back_to_literal() {
        let pattern = Pattern::new("a(");
        assert!(pattern.is_literal());
        assert!(pattern.is_match("xxA(yy"));
        assert!(!pattern.is_match("abc"));
        assert!(matches("call FOO[bar", "foo["));
    }

    #[test]
    fn test_split_list() {
        let parts: Vec<_> = split_list(" a, ,b ,,c ").collect();
        assert_eq!(parts, vec!["a", "b", "c"]);
        assert_eq!(split_list("").count(), 0);
        assert_eq!(compile_list(",,").len(), 0);
    }

    #[test]
    fn test_last_segment() {
        assert_eq!(last_segment("deployment/api"), "api");
        assert_eq!(last_segment("api"), "api");
        assert_eq!(last_segment(" ns/deploy/sidecar "), "sidecar");
    }

    #[test]
    fn test_find_matches() {
        let pattern = Pattern::new("error");
        assert_eq!(pattern.find_matches("an Error, another error").len(), 2);

        let literal = Pattern::new("x(");
        assert_eq!(literal.find_matches("aX(b x("), vec![(1, 3), (5, 7)]);
    }

    proptest! {
        #[test]
        fn matcher_never_panics(text in ".{0,40}", pattern in ".{0,20}") {
            let _ = matches(&text, &pattern);
        }

        #[test]
        fn invalid_pattern_is_substring_search(prefix in "[a-z]{0,8}", suffix in "[a-z]{0,8}") {
            let text = format!("{prefix}A({suffix}");
            prop_assert!(matches(&text, "a("));
            prop_assert!(!matches(&prefix, "a("));
        }
    }
}
