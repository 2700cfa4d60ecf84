//! Error kinds for the three failure categories the framework distinguishes
//! (`spec.md` §7): hard errors (contract violations), user errors (bad
//! input at a framework boundary), and test failures (recoverable, modeled
//! as events rather than `Result`s — see [`crate::bus`]).

use std::ops::Range;
use std::sync::Once;

use thiserror::Error;

/// A framework contract was violated. Hard errors are not recoverable: the
/// process terminates after reporting one, exactly once.
#[derive(Debug, Error)]
pub enum HardError {
    /// A `$[...]` marker was evaluated with no enclosing assertion on the
    /// current thread's assertion stack.
    #[error(
        "$[...] evaluated with no enclosing assertion (counter {counter}); \
         only the test's main thread may create assertions"
    )]
    NoEnclosingAssertion { counter: u32 },

    /// Two tests registered the same hierarchical name from different
    /// source locations.
    #[error(
        "duplicate test name '{name}': registered at {first_file}:{first_line} \
         and again at {second_file}:{second_line}"
    )]
    DuplicateTestLocation {
        name: String,
        first_file: &'static str,
        first_line: u32,
        second_file: &'static str,
        second_line: u32,
    },

    /// A test name is also a strict slash-boundary prefix of another test's
    /// name, which would make ordering and filtering ambiguous.
    #[error("test name '{prefix}' is a slash-boundary prefix of '{other}'")]
    TestNameIsPrefixOfAnother { prefix: String, other: String },

    /// An overridden generator produced no values at all.
    #[error("generator at {file}:{line} was overridden to produce no values")]
    EmptyOverriddenGenerator { file: &'static str, line: u32 },

    /// A generator site was visited in a different order than a previous
    /// iteration of the same test, and the run otherwise passed (on a
    /// failing run this becomes a [`crate::bus::Event::NonDeterminismWarning`]
    /// instead).
    #[error(
        "non-deterministic generator use: expected next site {expected_file}:{expected_line}, \
         got {actual_file}:{actual_line}"
    )]
    NonDeterministicGenerator {
        expected_file: &'static str,
        expected_line: u32,
        actual_file: &'static str,
        actual_line: u32,
    },

    /// A scoped frame guard was dropped out of order with respect to the
    /// context stack (stack-discipline violation — see `spec.md` §5).
    #[error("context frame dropped out of stack order")]
    StackDisciplineViolation,

    /// An assertion or `generate!` call happened on a thread other than the
    /// one the runner is currently driving a test on (`spec.md` §5: "only
    /// the main test thread may create assertions").
    #[error("assertion or generator created on a thread other than the one running the test")]
    AssertionOnWrongThread,

    /// A `generate!` call site was reached with no run in progress on this
    /// thread at all (not even on the wrong one) — calling framework API
    /// outside of `Runner::run`.
    #[error("generator at {file}:{line} used outside of a test run")]
    GeneratorUsedOutsideRun { file: &'static str, line: u32 },

    /// A `generate!` call site produced a different value type than the
    /// same site produced on an earlier iteration.
    #[error("generator at {file}:{line} changed value type between iterations")]
    GeneratorTypeMismatch { file: &'static str, line: u32 },
}

/// Invalid input at a framework boundary: a malformed CLI flag, an
/// unparseable `--generate` program, or an override rule that went unused.
/// User errors are reported with a caret pointing into the offending
/// argument string when a span is available.
#[derive(Debug, Error)]
pub enum UserError {
    #[error("invalid flag: {0}")]
    BadFlag(String),

    #[error("could not parse --generate program: {message}")]
    DslParse { message: String, span: Range<usize> },

    #[error("override rule for '{entry}' was never used")]
    UnusedOverrideRule { entry: String },

    #[error("override entry '{entry}' matched no generator")]
    UnmatchedOverrideEntry { entry: String },

    #[error("index range upper bound exceeds the maximum index observed for '{entry}'")]
    IndexRangeExceeded { entry: String },
}

impl UserError {
    /// Renders a two-line caret diagram pointing at `self`'s span within
    /// `source`, when one is available.
    pub fn caret_diagram(&self, source: &str) -> Option<String> {
        let span = match self {
            UserError::DslParse { span, .. } => span.clone(),
            _ => return None,
        };
        let start = span.start.min(source.len());
        let end = span.end.min(source.len());
        let mut caret_line = String::new();
        for _ in 0..start {
            caret_line.push(' ');
        }
        for _ in start..end.max(start + 1) {
            caret_line.push('^');
        }
        Some(format!("{source}\n{caret_line}"))
    }
}

static HARD_ERROR_ONCE: Once = Once::new();

/// Reports `err` through the best available channel and terminates the
/// process. Idempotent: only the first call in a process actually prints
/// and exits, guarding against re-entrant hard errors raised while already
/// unwinding from one.
pub fn raise_hard_error(err: HardError) -> ! {
    HARD_ERROR_ONCE.call_once(|| {
        eprintln!("taut: hard error: {err}");
        if crate::exception::is_debugger_attached() {
            crate::exception::breakpoint();
        }
    });
    std::process::exit(crate::runner::EXIT_HARD_ERROR);
}
