//! The collection of all known tests (`spec.md` §3, §8 property 5:
//! deterministic ordering for a fixed registration order).
//!
//! Rust has no static-initialization-order guarantee equivalent to the C++
//! translation-unit model the spec assumes, so registration uses the
//! `inventory` crate's link-time distributed-slice collection instead of an
//! init-on-first-use singleton populated by constructors one module at a
//! time. `#[taut::test]` expands to an `inventory::submit!` of a
//! [`TestDecl`]; `inventory::collect!` gathers every one across every
//! downstream crate that links against `taut`.

use crate::error::{raise_hard_error, HardError};

/// What `#[taut::test]` submits. `body` is a plain `fn()` — the macro only
/// ever attaches this to free functions, so no closure captures to worry
/// about.
pub struct TestDecl {
    pub name: &'static str,
    pub file: &'static str,
    pub line: u32,
    pub body: fn(),
}

inventory::collect!(TestDecl);

/// One registered test with its canonical name split into slash-separated
/// segments for ordering and filtering.
#[derive(Clone)]
pub struct Test {
    pub name: &'static str,
    pub file: &'static str,
    pub line: u32,
    pub body: fn(),
    segments: Vec<&'static str>,
    registration_order: usize,
}

impl Test {
    pub fn segments(&self) -> &[&'static str] {
        &self.segments
    }

    /// Builds a standalone `Test`, registration order `0`. Used where a
    /// `Test` is needed without going through `inventory` collection — the
    /// runner's own unit tests, and any harness that wants to run a
    /// synthetic test outside the normal `#[taut::test]` flow.
    pub fn standalone(name: &'static str, file: &'static str, line: u32, body: fn()) -> Self {
        Test {
            name,
            file,
            line,
            body,
            segments: name.split('/').collect(),
            registration_order: 0,
        }
    }
}

/// Collects every submitted [`TestDecl`], checks the "no test name is a
/// strict slash-boundary prefix of another" invariant, and returns them
/// sorted canonically: by the lexical order of each slash-separated segment,
/// with ties among sibling segments broken by first-registration order
/// (stable, because `inventory`'s iteration order matches link order which
/// is reproducible within one build).
pub fn all_tests() -> Vec<Test> {
    let mut seen_names: std::collections::HashMap<&'static str, (&'static str, u32)> =
        std::collections::HashMap::new();
    let mut tests: Vec<Test> = Vec::new();

    for (order, decl) in inventory::iter::<TestDecl>().enumerate() {
        if let Some(&(first_file, first_line)) = seen_names.get(decl.name) {
            if (first_file, first_line) != (decl.file, decl.line) {
                raise_hard_error(HardError::DuplicateTestLocation {
                    name: decl.name.to_string(),
                    first_file,
                    first_line,
                    second_file: decl.file,
                    second_line: decl.line,
                });
            }
        } else {
            seen_names.insert(decl.name, (decl.file, decl.line));
        }
        tests.push(Test {
            name: decl.name,
            file: decl.file,
            line: decl.line,
            body: decl.body,
            segments: decl.name.split('/').collect(),
            registration_order: order,
        });
    }

    check_no_prefix_collisions(&tests);

    tests.sort_by(|a, b| {
        for (sa, sb) in a.segments.iter().zip(b.segments.iter()) {
            match sa.cmp(sb) {
                std::cmp::Ordering::Equal => continue,
                other => return other,
            }
        }
        a.segments
            .len()
            .cmp(&b.segments.len())
            .then(a.registration_order.cmp(&b.registration_order))
    });

    tests
}

fn check_no_prefix_collisions(tests: &[Test]) {
    for a in tests {
        for b in tests {
            if std::ptr::eq(a, b) {
                continue;
            }
            if b.segments.len() > a.segments.len() && b.segments[..a.segments.len()] == a.segments[..] {
                raise_hard_error(HardError::TestNameIsPrefixOfAnother {
                    prefix: a.name.to_string(),
                    other: b.name.to_string(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorts_segments_lexically_with_registration_order_tiebreak() {
        let mut v = vec![
            Test {
                name: "b/x",
                file: "f",
                line: 1,
                body: || {},
                segments: vec!["b", "x"],
                registration_order: 2,
            },
            Test {
                name: "a/z",
                file: "f",
                line: 2,
                body: || {},
                segments: vec!["a", "z"],
                registration_order: 0,
            },
            Test {
                name: "a/y",
                file: "f",
                line: 3,
                body: || {},
                segments: vec!["a", "y"],
                registration_order: 1,
            },
        ];
        v.sort_by(|a, b| {
            for (sa, sb) in a.segments.iter().zip(b.segments.iter()) {
                match sa.cmp(sb) {
                    std::cmp::Ordering::Equal => continue,
                    other => return other,
                }
            }
            a.segments
                .len()
                .cmp(&b.segments.len())
                .then(a.registration_order.cmp(&b.registration_order))
        });
        let names: Vec<_> = v.iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["a/y", "a/z", "b/x"]);
    }
}
