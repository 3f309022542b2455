//! Username suspicion scoring.

use serde::{Deserialize, Serialize};

/// A weighted pattern consulted when scoring a submitted username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuspiciousPattern {
    /// Pattern text.
    pub pattern: String,
    /// Score added when the pattern applies.
    pub weight: u32,
}

impl SuspiciousPattern {
    /// Create a new pattern.
    #[must_use]
    pub fn new(pattern: impl Into<String>, weight: u32) -> Self {
        Self {
            pattern: pattern.into(),
            weight,
        }
    }
}

/// The default pattern table: `admin:2, password:2, 123456:3, qwerty:3`.
#[must_use]
pub fn default_patterns() -> Vec<SuspiciousPattern> {
    vec![
        SuspiciousPattern::new("admin", 2),
        SuspiciousPattern::new("password", 2),
        SuspiciousPattern::new("123456", 3),
        SuspiciousPattern::new("qwerty", 3),
    ]
}

/// Scores usernames against a fixed pattern table.
///
/// A pattern applies when the username is at least as long as the pattern
/// text; the username content is not inspected. Scores are therefore a
/// function of length alone, and longer usernames collect more weight.
#[derive(Debug, Clone)]
pub struct SuspicionScorer {
    patterns: Vec<SuspiciousPattern>,
}

impl SuspicionScorer {
    /// Create a scorer over the given table.
    #[must_use]
    pub fn new(patterns: Vec<SuspiciousPattern>) -> Self {
        Self { patterns }
    }

    /// Score a username. Zero means nothing applied.
    #[must_use]
    pub fn score(&self, username: &str) -> u32 {
        self.patterns
            .iter()
            .filter(|p| username.len() >= p.pattern.len())
            .fold(0u32, |acc, p| acc.saturating_add(p.weight))
    }

    /// The configured table.
    #[must_use]
    pub fn patterns(&self) -> &[SuspiciousPattern] {
        &self.patterns
    }
}

impl Default for SuspicionScorer {
    fn default() -> Self {
        Self::new(default_patterns())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test_case("" , 0 ; "empty")]
    #[test_case("ab", 0 ; "shorter than every pattern")]
    #[test_case("admin", 2 ; "five bytes matches admin only")]
    #[test_case("bob@x", 2 ; "content is irrelevant")]
    #[test_case("abcdef", 8 ; "six bytes adds 123456 and qwerty")]
    #[test_case("alice@example.com", 10 ; "long address hits every pattern")]
    fn test_default_scores(username: &str, expected: u32) {
        let scorer = SuspicionScorer::default();
        assert_eq!(scorer.score(username), expected);
    }

    #[test]
    fn test_empty_table_scores_zero() {
        let scorer = SuspicionScorer::new(Vec::new());
        assert_eq!(scorer.score("administrator"), 0);
    }

    #[test]
    fn test_custom_table() {
        let scorer = SuspicionScorer::new(vec![
            SuspiciousPattern::new("root", 5),
            SuspiciousPattern::new("toor", 1),
        ]);
        assert_eq!(scorer.score("abc"), 0);
        assert_eq!(scorer.score("root"), 6);
    }

    #[test]
    fn test_saturates_instead_of_overflowing() {
        let scorer = SuspicionScorer::new(vec![
            SuspiciousPattern::new("a", u32::MAX),
            SuspiciousPattern::new("b", u32::MAX),
        ]);
        assert_eq!(scorer.score("x"), u32::MAX);
    }

    #[test]
    fn test_length_counts_bytes() {
        // "ädmin" is 6 bytes in UTF-8.
        let scorer = SuspicionScorer::default();
        assert_eq!(scorer.score("ädmin"), 8);
    }

    proptest! {
        #[test]
        fn prop_score_is_monotone_in_length(name in "[a-z]{0,20}", extra in "[a-z]{1,5}") {
            let scorer = SuspicionScorer::default();
            let longer = format!("{name}{extra}");
            prop_assert!(scorer.score(&longer) >= scorer.score(&name));
        }

        #[test]
        fn prop_score_bounded_by_total_weight(name in ".{0,64}") {
            let scorer = SuspicionScorer::default();
            prop_assert!(scorer.score(&name) <= 10);
        }
    }
}
