//! Test inclusion/exclusion (`spec.md` §6's `--include`/`--exclude` flags):
//! a sequence of regex patterns, each tagged include or exclude, applied in
//! declaration order. If the first pattern to appear is an `--include`, the
//! default flips to "disabled" — a test is only enabled by a later matching
//! `--include` — otherwise the default stays "enabled" and `--exclude`
//! patterns only ever remove tests from that default.
//!
//! A pattern matches a test name either outright or at any of its
//! slash-segment boundaries, so `-i foo` also enables `foo/bar` — `spec.md`
//! §3's hierarchical test names are meant to be filterable by prefix.

use regex::Regex;

use crate::bus::{Interest, Listener, TestFilterDecision};
use crate::registry::Test;

/// Compiles `pattern` as a *whole-string* match: the raw pattern is wrapped
/// in `^(?:...)$ `so e.g. `-i foo` doesn't also match `food`.
pub fn compile_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{pattern})$"))
}

/// Whether `re` matches `name` as a whole, or matches any of its
/// slash-segment prefixes (with or without the trailing slash).
pub fn pattern_matches(re: &Regex, name: &str) -> bool {
    if re.is_match(name) {
        return true;
    }
    for (i, ch) in name.char_indices() {
        if ch == '/' {
            if re.is_match(&name[..i]) || re.is_match(&name[..=i]) {
                return true;
            }
        }
    }
    false
}

struct Clause {
    include: bool,
    pattern: Regex,
}

pub struct IncludeExcludeListener {
    clauses: Vec<Clause>,
    default_enabled: bool,
}

impl IncludeExcludeListener {
    /// `flags` is the `--include`/`--exclude` list in the order given on the
    /// command line, `true` meaning `--include`.
    pub fn new(flags: Vec<(bool, Regex)>) -> Self {
        let first_include = flags.iter().position(|(include, _)| *include);
        let first_exclude = flags.iter().position(|(include, _)| !*include);
        // False exactly when the first `--include` precedes the first
        // `--exclude` (or there is no `--exclude` at all) — "first
        // --include before any --exclude defaults all tests to disabled".
        let include_comes_first = match (first_include, first_exclude) {
            (Some(i), Some(e)) => i < e,
            (Some(_), None) => true,
            _ => false,
        };
        let default_enabled = !include_comes_first;
        IncludeExcludeListener {
            clauses: flags
                .into_iter()
                .map(|(include, pattern)| Clause { include, pattern })
                .collect(),
            default_enabled,
        }
    }
}

impl Listener for IncludeExcludeListener {
    fn interest(&self) -> Interest {
        Interest::FILTER_TEST
    }

    fn on_filter_test(&self, test: &Test, _decision: TestFilterDecision) -> TestFilterDecision {
        let mut enabled = self.default_enabled;
        for clause in &self.clauses {
            if pattern_matches(&clause.pattern, test.name) {
                enabled = clause.include;
            }
        }
        if enabled {
            TestFilterDecision::Enabled
        } else {
            TestFilterDecision::Disabled
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_named(name: &'static str) -> Test {
        Test::standalone(name, "f", 0, || {})
    }

    #[test]
    fn include_only_enables_matching_tests_and_disables_the_rest() {
        let listener = IncludeExcludeListener::new(vec![(true, compile_pattern("a/.*").unwrap())]);
        assert_eq!(
            listener.on_filter_test(&test_named("a/x"), TestFilterDecision::Enabled),
            TestFilterDecision::Enabled
        );
        assert_eq!(
            listener.on_filter_test(&test_named("b/x"), TestFilterDecision::Enabled),
            TestFilterDecision::Disabled
        );
    }

    #[test]
    fn exclude_only_disables_matching_tests_leaving_rest_enabled() {
        let listener = IncludeExcludeListener::new(vec![(false, compile_pattern("b/.*").unwrap())]);
        assert_eq!(
            listener.on_filter_test(&test_named("a/x"), TestFilterDecision::Enabled),
            TestFilterDecision::Enabled
        );
        assert_eq!(
            listener.on_filter_test(&test_named("b/x"), TestFilterDecision::Enabled),
            TestFilterDecision::Disabled
        );
    }

    #[test]
    fn later_clause_wins_over_earlier_overlapping_one() {
        let listener = IncludeExcludeListener::new(vec![
            (true, compile_pattern("a/.*").unwrap()),
            (false, compile_pattern("a/skip").unwrap()),
        ]);
        assert_eq!(
            listener.on_filter_test(&test_named("a/skip"), TestFilterDecision::Enabled),
            TestFilterDecision::Disabled
        );
        assert_eq!(
            listener.on_filter_test(&test_named("a/run"), TestFilterDecision::Enabled),
            TestFilterDecision::Enabled
        );
    }

    #[test]
    fn pattern_matches_at_slash_boundary() {
        let re = compile_pattern("a").unwrap();
        assert!(pattern_matches(&re, "a"));
        assert!(pattern_matches(&re, "a/b"));
        assert!(!pattern_matches(&re, "ab"));
    }
}
