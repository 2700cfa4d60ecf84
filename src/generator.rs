//! A site in a test body that yields one of several values, re-running the
//! test body once per value per enclosing-generator value (`spec.md` §3,
//! §4.5). Generators compose into a right-to-left odometer: the
//! last-registered (deepest) generator advances on every iteration; when it
//! runs out of values it is popped (carries), and the next-shallowest one
//! advances in its place, and so on.
//!
//! This module holds the data types and the pure odometer arithmetic; the
//! "who constructs a generator, who may override it" protocol lives in
//! [`crate::runner`], which is the thing actually talking to the
//! [`crate::bus::Bus`] and the parsed override program.

use std::any::Any;
use std::collections::VecDeque;
use std::str::FromStr;

/// A generator's identity key: `spec.md` §3 says generators are keyed by
/// source location (`L`); `name` additionally lets the override DSL (§4.6)
/// address a generator by the name its `generate!` call site was given,
/// since an anonymous file/line pair isn't something a human types on a
/// command line.
#[derive(Debug, Clone, Copy)]
pub struct GeneratorSite {
    pub name: &'static str,
    pub file: &'static str,
    pub line: u32,
}

/// The subset of Rust types a generator can hold: printable (for the
/// diagram and for matching override rules against natural values),
/// parseable (so a `--generate` custom value or override replacement can
/// become a real value), cloneable, comparable. This stands in for the
/// spec's `value_to_string?` / `value_from_string?` / `value_equals_to_string?`
/// optional capabilities — here they're not optional, which is a
/// simplification recorded in `DESIGN.md`.
pub trait GeneratorValue: std::fmt::Display + FromStr + Clone + PartialEq + 'static {}
impl<T: std::fmt::Display + FromStr + Clone + PartialEq + 'static> GeneratorValue for T {}

/// The type-erased face every live generator on the stack presents,
/// regardless of its value type.
pub trait GeneratorState {
    fn site(&self) -> &GeneratorSite;
    fn current_display(&self) -> String;
    fn num_generated_values(&self) -> usize;
    /// True once the current value is the last one available — peeks ahead
    /// for overridden sources, caching the result for the next `advance()`.
    fn is_last_value(&mut self) -> bool;
    /// Produces the next value. Returns `false` if none was available (the
    /// generator is exhausted and should be popped).
    fn advance(&mut self) -> bool;
    /// The current value, type-erased as `Box<Option<T>>`. The stack holds
    /// generators of different concrete `T`s side by side, so a call site
    /// reading its own value back (`crate::runner::visit_generator_site`)
    /// has to go through this rather than a typed accessor.
    fn current_any(&self) -> Box<dyn Any>;
}

enum Source<T> {
    Natural { values: Vec<T>, index: usize },
    Overridden {
        next: Box<dyn FnMut() -> Option<String>>,
        lookahead: Option<Option<String>>,
    },
}

pub struct TypedGenerator<T: GeneratorValue> {
    site: GeneratorSite,
    source: Source<T>,
    current: Option<T>,
    num_generated: usize,
}

impl<T: GeneratorValue> TypedGenerator<T> {
    pub fn natural(site: GeneratorSite, values: Vec<T>) -> Self {
        TypedGenerator {
            site,
            source: Source::Natural { values, index: 0 },
            current: None,
            num_generated: 0,
        }
    }

    pub fn overridden(site: GeneratorSite, next: Box<dyn FnMut() -> Option<String>>) -> Self {
        TypedGenerator {
            site,
            source: Source::Overridden {
                next,
                lookahead: None,
            },
            current: None,
            num_generated: 0,
        }
    }

    pub fn current(&self) -> Option<&T> {
        self.current.as_ref()
    }
}

impl<T: GeneratorValue> GeneratorState for TypedGenerator<T> {
    fn site(&self) -> &GeneratorSite {
        &self.site
    }

    fn current_display(&self) -> String {
        self.current
            .as_ref()
            .map(|v| v.to_string())
            .unwrap_or_default()
    }

    fn num_generated_values(&self) -> usize {
        self.num_generated
    }

    fn is_last_value(&mut self) -> bool {
        match &mut self.source {
            Source::Natural { values, index } => *index >= values.len(),
            Source::Overridden { next, lookahead } => {
                if lookahead.is_none() {
                    *lookahead = Some(next());
                }
                lookahead.as_ref().unwrap().is_none()
            }
        }
    }

    fn advance(&mut self) -> bool {
        match &mut self.source {
            Source::Natural { values, index } => {
                if *index >= values.len() {
                    return false;
                }
                self.current = Some(values[*index].clone());
                *index += 1;
                self.num_generated += 1;
                true
            }
            Source::Overridden { next, lookahead } => {
                let slot = lookahead.take().unwrap_or_else(&mut *next);
                match slot {
                    Some(text) => match text.parse::<T>() {
                        Ok(v) => {
                            self.current = Some(v);
                            self.num_generated += 1;
                            true
                        }
                        Err(_) => false,
                    },
                    None => false,
                }
            }
        }
    }

    fn current_any(&self) -> Box<dyn Any> {
        Box::new(self.current.clone())
    }
}

/// Between-iterations protocol (`spec.md` §4.5): pops exhausted generators
/// from the top (the odometer's fastest-changing digit), carrying into the
/// next-shallowest generator each time it overflows. Returns whether the
/// stack still has a generator to drive the next iteration.
pub fn prune_exhausted(stack: &mut Vec<Box<dyn GeneratorState>>) -> bool {
    while let Some(top) = stack.last_mut() {
        if top.is_last_value() {
            stack.pop();
        } else {
            return true;
        }
    }
    false
}

/// Applies a parsed override `Program`'s rules to the plain sequence of
/// natural values for one generator entry, producing the ordered sequence
/// of `OverrideValue`s the overriding listener will hand out one at a time.
/// This is the `spec.md` §4.6 "semantics of a single generator's rules"
/// paragraph made concrete: a natural value's final acceptance is decided
/// by scanning every rule in source order, flipping the accept flag each
/// time a matching `#`/`-#`/`-=` rule is seen; a custom (`=`) value is
/// emitted at its own syntactic position in that same rule stream, after
/// the accepted naturals any *preceding* range rule has already resolved
/// (`spec.md` §8 S4; ground truth is the original's `next_rule`/
/// `num_used_custom_values` bookkeeping in
/// `examples/original_source/testlib.cpp`, simplified here to a single
/// eager pass since every natural value is already known up front). A
/// matching positive rule with a scope swaps in its sub-program for the
/// remainder (not modeled at this layer — scopes are resolved by the
/// caller, which re-invokes this function with the scope's program once a
/// value inside it is reached).
pub fn apply_override_entry(entry: &crate::dsl::Entry, natural: &[String]) -> VecDeque<String> {
    entry.matched_any_generator.set(true);

    let default_accept = entry.default_accept();
    let mut accept = vec![default_accept; natural.len()];
    // How many leading natural indices are "resolved" by the range rules
    // seen so far — a custom reached at this point in the scan may flush
    // naturals up to here without risking a later rule changing their fate.
    let mut resolved_upto: u64 = 0;
    let mut emitted = vec![false; natural.len()];
    let mut out = VecDeque::new();

    for group in &entry.groups {
        for member in &group.members {
            match member {
                crate::dsl::RuleAtom::AcceptRange(range) => {
                    for (index, accept) in accept.iter_mut().enumerate() {
                        group.observe_index(index as u64);
                        if range.contains(index as u64) {
                            *accept = true;
                            group.mark_used();
                        }
                    }
                    resolved_upto = resolved_upto.max(range.end.unwrap_or(natural.len() as u64));
                }
                crate::dsl::RuleAtom::RemoveRange(range) => {
                    for (index, accept) in accept.iter_mut().enumerate() {
                        group.observe_index(index as u64);
                        if range.contains(index as u64) {
                            *accept = false;
                            group.mark_used();
                        }
                    }
                    resolved_upto = resolved_upto.max(range.end.unwrap_or(natural.len() as u64));
                }
                crate::dsl::RuleAtom::RemoveValue(v) => {
                    for (index, text) in natural.iter().enumerate() {
                        if v == text {
                            accept[index] = false;
                            group.mark_used();
                        }
                    }
                }
                crate::dsl::RuleAtom::Custom(v) => {
                    group.mark_used();
                    for index in 0..(resolved_upto as usize).min(natural.len()) {
                        if !emitted[index] {
                            emitted[index] = true;
                            if accept[index] {
                                out.push_back(natural[index].clone());
                            }
                        }
                    }
                    out.push_back(v.clone());
                }
            }
        }
    }

    for (index, text) in natural.iter().enumerate() {
        if !emitted[index] && accept[index] {
            out.push_back(text.clone());
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> GeneratorSite {
        GeneratorSite {
            name: "x",
            file: "test.rs",
            line: 1,
        }
    }

    #[test]
    fn custom_value_interleaves_after_the_natural_range_preceding_it() {
        // `spec.md` §8 S4: `x{#1,=42}` against naturals `10, 20, 30` must
        // yield `10, 42`, not `42, 10` — the custom sits after the `#1`
        // range's accepted natural, matching its position in the rule text.
        let program = crate::dsl::parse_program("x{#1,=42}", 0).unwrap();
        let entry = program.entry_for("x").unwrap();
        let natural = vec!["10".to_string(), "20".to_string(), "30".to_string()];
        let out: Vec<String> = apply_override_entry(entry, &natural).into_iter().collect();
        assert_eq!(out, vec!["10".to_string(), "42".to_string()]);
    }

    #[test]
    fn natural_generator_exhausts_after_last_value() {
        let mut g = TypedGenerator::natural(site(), vec![10, 20, 30]);
        assert!(g.advance());
        assert_eq!(g.current(), Some(&10));
        assert!(!g.is_last_value());
        assert!(g.advance());
        assert!(g.advance());
        assert_eq!(g.current(), Some(&30));
        assert!(g.is_last_value());
        assert!(!g.advance());
    }

    #[test]
    fn odometer_visits_full_cross_product_in_order() {
        // Mirrors `crate::runner::visit_generator_site`'s protocol: a
        // popped (carried) generator is reconstructed fresh the next time
        // the body reaches its call site, rather than staying on the stack.
        let mut stack: Vec<Box<dyn GeneratorState>> = Vec::new();
        let mut visited = Vec::new();
        loop {
            if stack.is_empty() {
                let mut x: Box<dyn GeneratorState> = Box::new(TypedGenerator::natural(
                    GeneratorSite {
                        name: "x",
                        file: "f",
                        line: 1,
                    },
                    vec![10, 20, 30],
                ));
                x.advance();
                stack.push(x);
            }
            if stack.len() < 2 {
                let mut y: Box<dyn GeneratorState> = Box::new(TypedGenerator::natural(
                    GeneratorSite {
                        name: "y",
                        file: "f",
                        line: 2,
                    },
                    vec!["a".to_string(), "b".to_string()],
                ));
                y.advance();
                stack.push(y);
            }

            let x_display = stack[0].current_display();
            let y_display = stack[1].current_display();
            visited.push((x_display, y_display));
            if !prune_exhausted(&mut stack) {
                break;
            }
            stack.last_mut().unwrap().advance();
        }

        assert_eq!(
            visited,
            vec![
                ("10".to_string(), "a".to_string()),
                ("10".to_string(), "b".to_string()),
                ("20".to_string(), "a".to_string()),
                ("20".to_string(), "b".to_string()),
                ("30".to_string(), "a".to_string()),
                ("30".to_string(), "b".to_string()),
            ]
        );
    }
}
