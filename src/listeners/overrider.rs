//! The generator overrider (`spec.md` §4.6, §6's `--generate PAT//PROG`):
//! claims a `generate!` site whose enclosing test name matches `PAT` and
//! whose name has an entry in the parsed override `Program`, then builds
//! its replacement value sequence via [`crate::generator::apply_override_entry`].
//!
//! Scopes (`spec.md`'s "this rule only applies once an enclosing value has
//! been selected") aren't modelled as an activation window here — each
//! `--generate` flag's program is flattened once at construction
//! (`Program::flatten`), so a scoped rule is simply folded into whichever
//! entry shares its name, in flag order. Later `-g` flags win over earlier
//! ones for the same entry name (`spec.md`'s reverse-consumption Open
//! Question, resolved by `Program::merge_cli_flags`'s upsert order — see
//! `DESIGN.md`).

use std::collections::VecDeque;

use regex::Regex;

use crate::bus::{Interest, Listener};
use crate::dsl::Program;
use crate::generator::{apply_override_entry, GeneratorSite};

use super::filter::pattern_matches;

struct Rule {
    test_pattern: Regex,
    program: Program,
}

pub struct GeneratorOverrideListener {
    rules: Vec<Rule>,
}

impl GeneratorOverrideListener {
    /// `flags` is the `(test-name-pattern, parsed-and-flattened program)`
    /// list in `--generate` flag order.
    pub fn new(flags: Vec<(Regex, Program)>) -> Self {
        GeneratorOverrideListener {
            rules: flags
                .into_iter()
                .map(|(test_pattern, program)| Rule { test_pattern, program })
                .collect(),
        }
    }

    /// The last flag whose test pattern matches the current test and whose
    /// program has an entry for `site.name` — later flags win, matching
    /// `Program::merge_cli_flags`'s upsert semantics applied across whole
    /// flags rather than within one.
    fn matching_entry(&self, site: &GeneratorSite) -> Option<&crate::dsl::Entry> {
        let test_name = crate::runner::current_test_name()?;
        self.rules
            .iter()
            .rev()
            .find(|rule| pattern_matches(&rule.test_pattern, test_name) && rule.program.entry_for(site.name).is_some())
            .and_then(|rule| rule.program.entry_for(site.name))
    }
}

impl Listener for GeneratorOverrideListener {
    fn interest(&self) -> Interest {
        Interest::REGISTER_GENERATOR_OVERRIDE
    }

    fn on_register_generator_override(&self, site: &GeneratorSite) -> bool {
        self.matching_entry(site).is_some()
    }

    fn on_build_override_queue(&self, site: &GeneratorSite, natural: &[String]) -> Option<VecDeque<String>> {
        let entry = self.matching_entry(site)?;
        Some(apply_override_entry(entry, natural))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::parse_program;

    fn site(name: &'static str) -> GeneratorSite {
        GeneratorSite { name, file: "f.rs", line: 1 }
    }

    #[test]
    fn claims_only_entries_present_in_its_program() {
        let program = parse_program("x=7", 0).unwrap();
        let listener = GeneratorOverrideListener::new(vec![(Regex::new("^(?:.*)$").unwrap(), program)]);
        // With no test currently running, `current_test_name` is `None` and
        // nothing can be claimed — this listener only ever claims sites
        // while a `Runner::run` is driving the thread.
        assert!(!listener.on_register_generator_override(&site("x")));
    }

    #[test]
    fn later_flag_wins_when_both_match_same_entry() {
        let first = parse_program("x=1", 0).unwrap();
        let second = parse_program("x=2", 0).unwrap();
        let re = Regex::new("^(?:.*)$").unwrap();
        let listener = GeneratorOverrideListener::new(vec![(re.clone(), first), (re, second)]);
        // `matching_entry` walks in reverse, so the second flag's entry
        // would be picked first if a test were running; this only checks
        // construction doesn't panic and the rule list preserves order.
        assert_eq!(listener.rules.len(), 2);
    }
}
