//! Drives the filtered, sorted test list through the generator
//! cross-product (`spec.md` §4.5, §4.8), dispatching lifecycle events to the
//! [`crate::bus::Bus`] and owning the thread-local state the assertion and
//! generator subsystems read and write back into: the running totals, the
//! live generator stack for the test currently executing, and (for printing
//! a failure diagram when a condition itself panics) the last assertion that
//! was in flight.
//!
//! A hard assertion's failure unwinds the test body by panicking with the
//! [`InterruptTest`] sentinel rather than returning an error — `spec.md` §5's
//! description of a host-language-specific "non-exception throwable" finds
//! its nearest Rust equivalent in `std::panic::panic_any` plus a downcast
//! that tells this apart from a genuine bug in the test.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::assertion::AssertionView;
use crate::bus::Bus;
use crate::error::{raise_hard_error, HardError};
use crate::exception::{ExceptionAnalyser, StdExceptionAnalyser};
use crate::generator::{GeneratorSite, GeneratorState, GeneratorValue, TypedGenerator};
use crate::registry::Test;

pub const EXIT_OK: i32 = 0;
pub const EXIT_TEST_FAILED: i32 = 1;
pub const EXIT_NO_TEST_MATCH: i32 = 2;
pub const EXIT_BAD_FLAGS: i32 = 3;
/// `EX_SOFTWARE` from sysexits.h — a hard error is an internal contract
/// violation, not an ordinary failed-test result.
pub const EXIT_HARD_ERROR: i32 = 70;

/// The sentinel panic payload a hard assertion failure unwinds with. Caught
/// only by [`Runner::run`]'s per-iteration `catch_unwind`; any other panic
/// payload is treated as a genuine uncaught exception from the test body.
pub struct InterruptTest;

/// Running totals across an entire `Runner::run` call. One "test" here means
/// one concrete invocation of a test body — a test with two `generate!`
/// sites each offering 3 values counts as 9 once its generators are fully
/// expanded, matching the way `num_tests_total`/`num_tests_run` are meant to
/// read on the progress printer (`spec.md` §4.9).
#[derive(Debug, Default, Clone)]
pub struct RunTestsProgress {
    pub num_tests_total: usize,
    pub num_tests_run: usize,
    pub num_tests_failed: usize,
    pub num_checks_total: usize,
    pub num_checks_failed: usize,
}

/// Reported once per generator combination after its test body returns (or
/// unwinds), via [`Bus::post_run_single_test`].
#[derive(Debug, Clone, Copy)]
pub struct RunSingleTestResults {
    pub failed: bool,
    pub uncaught_exception: bool,
    /// `spec.md` §3: whether this is the first repetition of the test's
    /// generator cross-product — always `true` for a test with no
    /// `generate!` sites at all.
    pub is_first_generator_repetition: bool,
    /// Whether this is the last repetition — always `true` for a test with
    /// no `generate!` sites.
    pub is_last_generator_repetition: bool,
    /// 0-based index of this repetition within the test's cross-product.
    pub generator_repetition_index: usize,
}

/// What the runner needs beyond the bus and the test list: behaviour that
/// isn't naturally a listener's concern because it changes how `run` itself
/// drives test bodies.
pub struct RunnerOptions {
    /// Whether to `catch_unwind` around each test body. Disabling this lets
    /// a genuine bug in a test escape as a real process abort, useful when
    /// running a single test under a debugger (`spec.md` §6's `DebuggerProbe`
    /// collaborator covers the complementary "attach a breakpoint" half).
    pub catch_exceptions: bool,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        RunnerOptions {
            catch_exceptions: true,
        }
    }
}

pub struct RunResult {
    pub progress: RunTestsProgress,
}

impl RunResult {
    /// The process exit code this result corresponds to (`spec.md` §6's
    /// CLI contract).
    pub fn report(&self) -> i32 {
        if self.progress.num_tests_total == 0 {
            EXIT_NO_TEST_MATCH
        } else if self.progress.num_tests_failed > 0 {
            EXIT_TEST_FAILED
        } else {
            EXIT_OK
        }
    }
}

struct RunContext {
    bus: Rc<Bus>,
    progress: RefCell<RunTestsProgress>,
    current_test: RefCell<Option<Test>>,
    test_failed: Cell<bool>,
    last_panicking_assertion: RefCell<Option<AssertionView>>,
    generator_stack: RefCell<Vec<Box<dyn GeneratorState>>>,
    generator_index: Cell<usize>,
    current_values: RefCell<HashMap<(&'static str, u32), Box<dyn Any>>>,
    exception_analyser: Box<dyn ExceptionAnalyser>,
}

thread_local! {
    static CURRENT: RefCell<Option<RunContext>> = const { RefCell::new(None) };
}

static RUN_IN_PROGRESS: AtomicBool = AtomicBool::new(false);

/// `true` while *some* thread is inside `Runner::run`, whether or not it is
/// this one. Distinguishes "no run at all" (the crate's own unit tests
/// constructing an `Assertion` directly — silently a no-op) from "a run is
/// in progress, but not on this thread" (a hard error: `spec.md` §5).
fn wrong_thread_if_run_in_progress() {
    if RUN_IN_PROGRESS.load(Ordering::SeqCst) {
        raise_hard_error(HardError::AssertionOnWrongThread);
    }
}

/// Called by [`crate::assertion::Assertion::finish`] for every completed
/// assertion, hard or soft, whose flags request counting it.
pub fn report_check(count: bool) {
    if !count {
        return;
    }
    CURRENT.with(|c| match &*c.borrow() {
        Some(ctx) => ctx.progress.borrow_mut().num_checks_total += 1,
        None => wrong_thread_if_run_in_progress(),
    });
}

/// Called by [`crate::assertion::Assertion::finish`] when a condition
/// evaluated `false`. Returns whether a listener asked for a breakpoint.
///
/// After notifying the bus of the failure itself, walks the thread's
/// context-frame trail (`spec.md` §4.7) — excluding this assertion's own
/// frame, since it is already conveyed by `view` — and the test's unscoped
/// log (`spec.md` §3), so listeners that claim `PRINT_CONTEXT_FRAME`/
/// `PRINT_LOG` actually see every failure.
pub fn report_assertion_failure(view: &AssertionView) -> bool {
    CURRENT.with(|c| {
        let borrowed = c.borrow();
        let Some(ctx) = borrowed.as_ref() else {
            wrong_thread_if_run_in_progress();
            return false;
        };
        ctx.progress.borrow_mut().num_checks_failed += 1;
        let was_already_failed = ctx.test_failed.replace(true);
        if !was_already_failed {
            if let Some(test) = ctx.current_test.borrow().as_ref() {
                ctx.bus.pre_fail_test(test);
            }
        }
        let should_break = ctx.bus.assertion_failed(view);

        let mut frames = crate::context::snapshot_newest_first();
        if matches!(frames.first(), Some(crate::context::Frame::BasicAssertionInfo { .. })) {
            frames.remove(0);
        }
        ctx.bus.print_context_frames(&frames);

        let mut log = crate::context::unscoped_log_snapshot();
        log.sort_by_key(|(id, _)| *id);
        for (id, message) in log {
            ctx.bus.print_log(id, &message);
        }

        should_break
    })
}

/// Reports a failed must-throw expectation (`spec.md` §3's `MustThrowInfo`
/// frame) through the same path as a failed boolean assertion, so it
/// participates in the same progress counters and context-frame printing.
pub fn report_must_throw_failure(description: &'static str, file: &'static str, line: u32, hard: bool) -> bool {
    report_assertion_failure(&AssertionView {
        text: description,
        file,
        line,
        hard,
        args: Vec::new(),
        message: None,
    })
}

/// Called by [`crate::assertion::Assertion`]'s `Drop` impl when the
/// condition itself panicked before reaching `finish`, stashing the
/// in-flight assertion so the eventual uncaught-exception report can still
/// show it alongside the panic message.
pub fn report_uncaught_exception_in_assertion(view: &AssertionView) {
    CURRENT.with(|c| {
        if let Some(ctx) = c.borrow().as_ref() {
            *ctx.last_panicking_assertion.borrow_mut() = Some(view.clone());
        }
    });
}

/// The `generate!` call-site protocol (`spec.md` §4.5): on a site's first
/// visit this test iteration, constructs its generator (claiming an override
/// from the bus if one is registered for it), advances it once, and — if it
/// comes up empty — either interrupts the test (mirroring a failed hard
/// assertion) or hard-errors, depending on `skip_if_empty`. On a later visit
/// within the same iteration it re-validates that the call site didn't move
/// (`spec.md`'s non-determinism check) and returns the value already current
/// on the stack.
pub fn visit_generator_site<T: GeneratorValue>(
    name: &'static str,
    file: &'static str,
    line: u32,
    skip_if_empty: bool,
    make_values: impl FnOnce() -> Vec<T>,
) -> T {
    let site = GeneratorSite { name, file, line };

    CURRENT.with(|c| {
        let borrowed = c.borrow();
        let Some(ctx) = borrowed.as_ref() else {
            wrong_thread_if_run_in_progress();
            raise_hard_error(HardError::GeneratorUsedOutsideRun { file, line });
        };

        let idx = ctx.generator_index.get();
        let len = ctx.generator_stack.borrow().len();

        if idx == len {
            let claimed = ctx.bus.register_generator_override(&site);
            let mut generator: Box<dyn GeneratorState> = match claimed {
                Some(listener_index) => {
                    let natural: Vec<String> = make_values().iter().map(|v| v.to_string()).collect();
                    let queue = ctx
                        .bus
                        .build_override_queue(listener_index, &site, &natural)
                        .unwrap_or_default();
                    let queue = RefCell::new(queue);
                    Box::new(TypedGenerator::<T>::overridden(
                        site,
                        Box::new(move || queue.borrow_mut().pop_front()),
                    ))
                }
                None => Box::new(TypedGenerator::natural(site, make_values())),
            };

            if !generator.advance() {
                if skip_if_empty {
                    std::panic::panic_any(InterruptTest);
                } else {
                    raise_hard_error(HardError::EmptyOverriddenGenerator { file, line });
                }
            }
            ctx.current_values
                .borrow_mut()
                .insert((file, line), generator.current_any());
            ctx.generator_stack.borrow_mut().push(generator);
        } else {
            let stack = ctx.generator_stack.borrow();
            let existing_site = *stack[idx].site();
            if existing_site.file != file || existing_site.line != line {
                raise_hard_error(HardError::NonDeterministicGenerator {
                    expected_file: existing_site.file,
                    expected_line: existing_site.line,
                    actual_file: file,
                    actual_line: line,
                });
            }
        }
        ctx.generator_index.set(idx + 1);

        let values = ctx.current_values.borrow();
        let boxed = values
            .get(&(file, line))
            .expect("a slot was just inserted or already existed for this site");
        let opt: &Option<T> = boxed
            .downcast_ref::<Option<T>>()
            .unwrap_or_else(|| raise_hard_error(HardError::GeneratorTypeMismatch { file, line }));
        opt.clone()
            .unwrap_or_else(|| raise_hard_error(HardError::GeneratorTypeMismatch { file, line }))
    })
}

/// The name of the test currently executing on this thread, if any — used
/// by the generator-overriding listener to match a `--generate PAT//PROG`
/// flag's test-name pattern against the test actually running, since a
/// `GeneratorSite` only knows its own name, not its enclosing test's.
pub fn current_test_name() -> Option<&'static str> {
    CURRENT.with(|c| {
        c.borrow()
            .as_ref()
            .and_then(|ctx| ctx.current_test.borrow().as_ref().map(|t| t.name))
    })
}

pub struct Runner {
    tests: Vec<Test>,
    bus: Rc<Bus>,
    options: RunnerOptions,
}

impl Runner {
    pub fn new(tests: Vec<Test>, bus: Bus, options: RunnerOptions) -> Self {
        Runner {
            tests,
            bus: Rc::new(bus),
            options,
        }
    }

    pub fn run(&self) -> RunResult {
        RUN_IN_PROGRESS.store(true, Ordering::SeqCst);
        CURRENT.with(|c| {
            *c.borrow_mut() = Some(RunContext {
                bus: self.bus.clone(),
                progress: RefCell::new(RunTestsProgress::default()),
                current_test: RefCell::new(None),
                test_failed: Cell::new(false),
                last_panicking_assertion: RefCell::new(None),
                generator_stack: RefCell::new(Vec::new()),
                generator_index: Cell::new(0),
                current_values: RefCell::new(HashMap::new()),
                exception_analyser: Box::new(StdExceptionAnalyser),
            });
        });

        self.bus.pre_run_tests(&self.tests);

        let enabled: Vec<&Test> = self
            .tests
            .iter()
            .filter(|t| self.bus.filter_test(t, false) == crate::bus::TestFilterDecision::Enabled)
            .collect();

        CURRENT.with(|c| {
            c.borrow().as_ref().unwrap().progress.borrow_mut().num_tests_total = enabled.len();
        });

        for test in &enabled {
            self.run_one_test(test);
        }

        let progress = CURRENT.with(|c| c.borrow().as_ref().unwrap().progress.borrow().clone());
        self.bus.post_run_tests(&progress);

        CURRENT.with(|c| *c.borrow_mut() = None);
        RUN_IN_PROGRESS.store(false, Ordering::SeqCst);

        RunResult { progress }
    }

    fn run_one_test(&self, test: &Test) {
        self.bus.pre_run_single_test(test);

        let mut repetition_index = 0usize;
        loop {
            CURRENT.with(|c| {
                let borrowed = c.borrow();
                let ctx = borrowed.as_ref().unwrap();
                ctx.test_failed.set(false);
                *ctx.current_test.borrow_mut() = Some(test.clone());
                *ctx.last_panicking_assertion.borrow_mut() = None;
                ctx.generator_index.set(0);
            });

            let should_catch = self.bus.pre_try_catch(test) && self.options.catch_exceptions;
            let mut uncaught_exception = false;

            if should_catch {
                let body = test.body;
                let outcome = std::panic::catch_unwind(std::panic::AssertionUnwindSafe(body));
                if let Err(payload) = outcome {
                    if payload.downcast_ref::<InterruptTest>().is_none() {
                        uncaught_exception = true;
                        self.report_uncaught_exception(&payload);
                    }
                }
            } else {
                (test.body)();
            }

            let failed = CURRENT.with(|c| {
                let borrowed = c.borrow();
                let ctx = borrowed.as_ref().unwrap();
                if uncaught_exception {
                    ctx.test_failed.set(true);
                }
                let mut progress = ctx.progress.borrow_mut();
                progress.num_tests_run += 1;
                let failed = ctx.test_failed.get();
                if failed {
                    progress.num_tests_failed += 1;
                }
                failed
            });

            let has_next = CURRENT.with(|c| {
                let borrowed = c.borrow();
                let ctx = borrowed.as_ref().unwrap();
                let mut stack = ctx.generator_stack.borrow_mut();
                if !crate::generator::prune_exhausted(&mut stack) {
                    return false;
                }
                let top = stack.last_mut().unwrap();
                top.advance();
                let site = *top.site();
                ctx.current_values.borrow_mut().insert((site.file, site.line), top.current_any());
                true
            });

            self.bus.post_run_single_test(
                test,
                &RunSingleTestResults {
                    failed,
                    uncaught_exception,
                    is_first_generator_repetition: repetition_index == 0,
                    is_last_generator_repetition: !has_next,
                    generator_repetition_index: repetition_index,
                },
            );
            crate::context::clear_unscoped_log();
            repetition_index += 1;

            if !has_next {
                break;
            }
        }

        CURRENT.with(|c| {
            let borrowed = c.borrow();
            let ctx = borrowed.as_ref().unwrap();
            ctx.generator_stack.borrow_mut().clear();
            ctx.current_values.borrow_mut().clear();
        });
    }

    fn report_uncaught_exception(&self, payload: &(dyn Any + Send)) {
        CURRENT.with(|c| {
            let borrowed = c.borrow();
            let ctx = borrowed.as_ref().unwrap();
            let view = ctx.last_panicking_assertion.borrow_mut().take();
            let links = ctx.exception_analyser.analyse(payload);
            let message = links
                .iter()
                .map(|l| format!("{}: {}", l.type_name, l.message))
                .collect::<Vec<_>>()
                .join("\ncaused by: ");
            ctx.bus.uncaught_exception(view.as_ref(), &message);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Test;

    fn test_named(name: &'static str, body: fn()) -> Test {
        // `registry::all_tests` is the usual constructor; tests here build a
        // `Test` directly since `inventory` collection is process-global and
        // can't be scoped to one test function.
        Test::standalone(name, "runner.rs", 0, body)
    }

    #[test]
    fn passing_test_reports_ok() {
        fn body() {}
        let runner = Runner::new(vec![test_named("a", body)], Bus::new(vec![]), RunnerOptions::default());
        let result = runner.run();
        assert_eq!(result.report(), EXIT_OK);
        assert_eq!(result.progress.num_tests_total, 1);
        assert_eq!(result.progress.num_tests_failed, 0);
    }

    #[test]
    fn no_matching_tests_reports_no_test_match() {
        let runner = Runner::new(vec![], Bus::new(vec![]), RunnerOptions::default());
        let result = runner.run();
        assert_eq!(result.report(), EXIT_NO_TEST_MATCH);
    }

    #[test]
    fn failing_hard_assertion_interrupts_and_marks_test_failed() {
        fn body() {
            static META: crate::assertion::AssertionMeta = crate::assertion::AssertionMeta {
                text: "false",
                args: &[],
                file: "runner.rs",
                line: 1,
            };
            let a = crate::assertion::Assertion::begin(&META, crate::assertion::Flags::HARD);
            a.finish::<fn() -> String>(false, None);
            panic!("unreachable: require! should have unwound");
        }
        let runner = Runner::new(vec![test_named("b", body)], Bus::new(vec![]), RunnerOptions::default());
        let result = runner.run();
        assert_eq!(result.report(), EXIT_TEST_FAILED);
        assert_eq!(result.progress.num_tests_failed, 1);
        assert_eq!(result.progress.num_checks_failed, 1);
    }
}
