//! Assertion expression decomposition (`spec.md` §4.4): the engine
//! `check!`/`require!` expand into. Three responsibilities split across
//! compile time and runtime:
//!
//! - **Preparation** (compile time, in `taut-macros`): parse the condition's
//!   token tree once, enumerating every `$[...]` marker in source order as
//!   an [`ArgInfo`], and rewrite each marker into a [`capture`] call tagged
//!   with a per-assertion-local counter.
//! - **Runtime capture**: `Assertion::begin` allocates one [`StoredArg`]
//!   slot per marker and publishes itself on this thread's assertion stack;
//!   each `capture` call resolves its slot by looking at the top of that
//!   stack — Rust's synchronous, left-to-right evaluation order means the
//!   assertion currently being evaluated is always exactly the top entry,
//!   so there is no need for the counter-owner search the spec's host
//!   language needed to re-derive at a suspension point.
//! - **Failure diagnosis**: on a false result, reports through
//!   [`crate::runner`] and the bus, then — for a hard assertion — unwinds
//!   the test body via the `InterruptTest` sentinel panic.

use std::cell::RefCell;
use std::rc::Rc;

use crate::context::{Frame, FrameGuard};

bitflags::bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct Flags: u32 {
        const SOFT = 1 << 0;
        const HARD = 1 << 1;
        /// Reserved for a future `check_no_count!`-style entry point;
        /// `spec.md` §4.4 names it but neither `check!` nor `require!` sets it.
        const NO_INCREMENT_CHECK_COUNTERS = 1 << 2;
    }
}

/// One `$[...]` marker, as located by the macro at compile time. Field
/// names and types are part of the macro/runtime contract — `taut-macros`
/// constructs these literally.
#[derive(Debug, Clone, Copy)]
pub struct ArgInfo {
    pub ident_offset: u32,
    pub ident_len: u32,
    pub expr_offset: u32,
    pub expr_len: u32,
    pub need_bracket: bool,
    pub counter: u32,
}

/// Immutable, shared between every runtime instance of one `check!`/
/// `require!` call site.
pub struct AssertionMeta {
    pub text: &'static str,
    pub args: &'static [ArgInfo],
    pub file: &'static str,
    pub line: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArgState {
    #[default]
    NotStarted,
    InProgress,
    Done,
}

/// Per-marker capture slot. `spec.md` §3 describes `value` as a string that
/// is empty until `state == Done`; here that invariant is strengthened to
/// `Option<String>` (`None` until done) rather than relying on emptiness as
/// a sentinel — recorded in `DESIGN.md`.
#[derive(Debug, Clone, Default)]
pub struct StoredArg {
    pub state: ArgState,
    pub value: Option<String>,
}

/// A read-only snapshot handed to listeners on failure: `meta`'s static
/// data zipped with the captured slot values, plus the user message
/// (evaluated at most once, on demand, by [`Assertion::finish`]).
#[derive(Clone)]
pub struct AssertionView {
    pub text: &'static str,
    pub file: &'static str,
    pub line: u32,
    pub hard: bool,
    pub args: Vec<(ArgInfo, StoredArg)>,
    pub message: Option<String>,
}

impl AssertionView {
    /// The order values should be drawn in: innermost marker first, ties
    /// broken by source position. The macro assigns counters depth-first —
    /// an inner `$[...]` always finishes walking (and so claims its
    /// counter) before the marker enclosing it — so ascending counter order
    /// already is this order; no separate permutation step is needed.
    pub fn draw_order(&self) -> impl Iterator<Item = &(ArgInfo, StoredArg)> {
        self.args.iter()
    }
}

type SlotStack = Rc<RefCell<Vec<StoredArg>>>;

thread_local! {
    static ASSERT_STACK: RefCell<Vec<SlotStack>> = const { RefCell::new(Vec::new()) };
}

/// A single evaluation of a `check!`/`require!` call. `begin` publishes it;
/// `finish` reports its outcome. Evaluating the condition can itself invoke
/// nested assertions (a helper function the condition calls); each one
/// pushes and fully pops before control returns here, preserving the
/// top-of-stack invariant `capture` relies on.
pub struct Assertion {
    meta: &'static AssertionMeta,
    flags: Flags,
    slots: SlotStack,
    frame_guard: Option<FrameGuard>,
    finished: bool,
}

impl Assertion {
    pub fn begin(meta: &'static AssertionMeta, flags: Flags) -> Self {
        let slots = Rc::new(RefCell::new(vec![StoredArg::default(); meta.args.len()]));
        ASSERT_STACK.with(|s| s.borrow_mut().push(slots.clone()));
        let frame_guard = FrameGuard::push(Frame::BasicAssertionInfo {
            text: meta.text,
            file: meta.file,
            line: meta.line,
        });
        Assertion {
            meta,
            flags,
            slots,
            frame_guard: Some(frame_guard),
            finished: false,
        }
    }

    fn pop_from_stack(&self) {
        ASSERT_STACK.with(|s| {
            let mut stack = s.borrow_mut();
            match stack.last() {
                Some(top) if Rc::ptr_eq(top, &self.slots) => {
                    stack.pop();
                }
                _ => crate::error::raise_hard_error(crate::error::HardError::StackDisciplineViolation),
            }
        });
    }

    fn view(&self, message: Option<String>) -> AssertionView {
        let slots = self.slots.borrow();
        AssertionView {
            text: self.meta.text,
            file: self.meta.file,
            line: self.meta.line,
            hard: self.flags.contains(Flags::HARD),
            args: self
                .meta
                .args
                .iter()
                .copied()
                .zip(slots.iter().cloned())
                .collect(),
            message,
        }
    }

    /// Reports the outcome of evaluating the condition and returns it
    /// unchanged, so `check!`/`require!` can be used as a boolean
    /// expression. For a hard assertion that failed, this does not return:
    /// it unwinds via the `InterruptTest` sentinel, caught by the runner at
    /// the top of the test body.
    pub fn finish<F: FnOnce() -> String>(mut self, result: bool, message: Option<F>) -> bool {
        self.pop_from_stack();
        self.finished = true;

        crate::runner::report_check(!self.flags.contains(Flags::NO_INCREMENT_CHECK_COUNTERS));

        if !result {
            let view = self.view(message.map(|f| f()));
            let should_break = crate::runner::report_assertion_failure(&view);
            if should_break {
                crate::exception::breakpoint();
            }
            if self.flags.contains(Flags::HARD) {
                std::panic::panic_any(crate::runner::InterruptTest);
            }
        }

        result
    }
}

impl Drop for Assertion {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        // The condition panicked before reaching `finish` — report it as an
        // uncaught exception raised while this assertion was in flight, then
        // let the unwind already in progress continue past us.
        self.pop_from_stack();
        let view = self.view(None);
        crate::runner::report_uncaught_exception_in_assertion(&view);
    }
}

/// Resolves a `$[...]` marker's slot by `counter`, evaluates `f`, stores its
/// `Debug` representation, and returns the value unchanged so it composes
/// transparently inside the surrounding expression.
pub fn capture<T: std::fmt::Debug>(counter: u32, f: impl FnOnce() -> T) -> T {
    let slots = ASSERT_STACK.with(|s| s.borrow().last().cloned());
    let Some(slots) = slots else {
        crate::error::raise_hard_error(crate::error::HardError::NoEnclosingAssertion { counter });
    };

    {
        let mut slots = slots.borrow_mut();
        slots[counter as usize].state = ArgState::InProgress;
    }
    let value = f();
    {
        let mut slots = slots.borrow_mut();
        slots[counter as usize] = StoredArg {
            state: ArgState::Done,
            value: Some(format!("{value:?}")),
        };
    }
    value
}

/// The `require_throws!`/`check_throws!` macros' runtime half: pushes a
/// `MustThrowInfo` frame, runs `body`, and reports failure the same way a
/// failed boolean assertion would if it returns without panicking. A panic
/// is analysed into its exception chain, each link pinned on the context
/// stack as a `CaughtExceptionElem` frame for the duration its neighbours
/// are pushed (`spec.md` §3's "caught-exception element" — here each frame
/// is transient rather than held open for a caller-supplied inspection
/// callback, a simplification recorded in `DESIGN.md`).
pub fn must_throw(
    description: &'static str,
    file: &'static str,
    line: u32,
    hard: bool,
    body: impl FnOnce(),
) -> bool {
    let frame = FrameGuard::push(Frame::MustThrowInfo { file, line });
    let result = std::panic::catch_unwind(std::panic::AssertionUnwindSafe(body));
    crate::runner::report_check(true);

    match result {
        Ok(()) => {
            let should_break = crate::runner::report_must_throw_failure(description, file, line, hard);
            drop(frame);
            if should_break {
                crate::exception::breakpoint();
            }
            if hard {
                std::panic::panic_any(crate::runner::InterruptTest);
            }
            false
        }
        Err(payload) => {
            if payload.downcast_ref::<crate::runner::InterruptTest>().is_some() {
                drop(frame);
                std::panic::resume_unwind(payload);
            }
            let links = crate::exception::StdExceptionAnalyser.analyse(payload.as_ref());
            for link in &links {
                let _elem = FrameGuard::push(Frame::CaughtExceptionElem {
                    type_name: link.type_name.to_string(),
                    message: link.message.clone(),
                });
            }
            drop(frame);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static META_NO_ARGS: AssertionMeta = AssertionMeta {
        text: "true",
        args: &[],
        file: "assertion.rs",
        line: 0,
    };

    static META_ONE_ARG: AssertionMeta = AssertionMeta {
        text: "$[x] > 0",
        args: &[ArgInfo {
            ident_offset: 0,
            ident_len: 1,
            expr_offset: 0,
            expr_len: 1,
            need_bracket: false,
            counter: 0,
        }],
        file: "assertion.rs",
        line: 0,
    };

    #[test]
    fn passing_assertion_reports_no_failure() {
        let a = Assertion::begin(&META_NO_ARGS, Flags::SOFT);
        let ok = a.finish::<fn() -> String>(true, None);
        assert!(ok);
    }

    #[test]
    fn capture_stores_debug_value_and_forwards_it() {
        let a = Assertion::begin(&META_ONE_ARG, Flags::SOFT);
        let x = capture(0, || 5);
        assert_eq!(x, 5);
        let view_slot = ASSERT_STACK.with(|s| s.borrow().last().unwrap().borrow()[0].clone());
        assert_eq!(view_slot.state, ArgState::Done);
        assert_eq!(view_slot.value.as_deref(), Some("5"));
        a.finish::<fn() -> String>(x > 0, None);
    }

    #[test]
    fn nested_assertion_pops_before_outer_resumes() {
        let outer = Assertion::begin(&META_ONE_ARG, Flags::SOFT);
        let value = capture(0, || {
            let inner = Assertion::begin(&META_NO_ARGS, Flags::SOFT);
            inner.finish::<fn() -> String>(true, None);
            3
        });
        assert_eq!(value, 3);
        outer.finish::<fn() -> String>(true, None);
    }

    #[test]
    fn must_throw_succeeds_when_body_panics() {
        let threw = must_throw("panics()", "assertion.rs", 0, false, || {
            panic!("boom");
        });
        assert!(threw);
        assert_eq!(crate::context::depth(), 0);
    }

    #[test]
    fn must_throw_fails_when_body_returns_normally() {
        let threw = must_throw("doesnt_panic()", "assertion.rs", 0, false, || {});
        assert!(!threw);
        assert_eq!(crate::context::depth(), 0);
    }
}
