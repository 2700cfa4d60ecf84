//! Fan-out of lifecycle/failure events to listeners that opted in
//! (`spec.md` §4.9). Rather than a wide vtable every listener pays for on
//! every event, each listener declares at construction which events it
//! consumes; the bus precomputes, per event kind, the ordered list of
//! listeners that actually override it, grounded on `spec.md` §9's
//! "CRTP-ish overridden-function bitmask" design note, expressed here as a
//! Rust capability bitflag rather than a C++ mixin trick.
//!
//! For events where a listener can "claim" the event (context-frame
//! printing, log printing), the first listener in that event's list whose
//! callback returns `true` stops the fan-out. Every other event reaches
//! every interested listener unconditionally.

use std::collections::VecDeque;

use crate::assertion::AssertionView;
use crate::context::Frame;
use crate::generator::GeneratorSite;
use crate::registry::Test;

bitflags::bitflags! {
    /// Which [`Listener`] methods a given listener actually overrides. The
    /// bus only ever calls into a listener for events whose bit is set here.
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct Interest: u32 {
        const FILTER_TEST             = 1 << 0;
        const PRE_RUN_TESTS           = 1 << 1;
        const POST_RUN_TESTS          = 1 << 2;
        const PRE_RUN_SINGLE_TEST     = 1 << 3;
        const POST_RUN_SINGLE_TEST    = 1 << 4;
        const PRE_TRY_CATCH           = 1 << 5;
        const PRE_FAIL_TEST           = 1 << 6;
        const ASSERTION_FAILED        = 1 << 7;
        const UNCAUGHT_EXCEPTION      = 1 << 8;
        const REGISTER_GENERATOR_OVERRIDE = 1 << 9;
        const OVERRIDE_GENERATOR      = 1 << 10;
        const PRINT_CONTEXT_FRAME     = 1 << 11;
        const PRINT_LOG               = 1 << 12;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestFilterDecision {
    Enabled,
    Disabled,
}

pub trait Listener {
    fn interest(&self) -> Interest;

    fn on_filter_test(&self, _test: &Test, decision: TestFilterDecision) -> TestFilterDecision {
        decision
    }
    fn on_pre_run_tests(&self, _tests: &[Test]) {}
    fn on_post_run_tests(&self, _progress: &crate::runner::RunTestsProgress) {}
    fn on_pre_run_single_test(&self, _test: &Test) {}
    fn on_post_run_single_test(&self, _test: &Test, _results: &crate::runner::RunSingleTestResults) {}
    fn on_pre_try_catch(&self, _test: &Test) -> bool {
        true
    }
    fn on_pre_fail_test(&self, _test: &Test) {}
    fn on_assertion_failed(&self, _assertion: &AssertionView) -> bool {
        false
    }
    fn on_uncaught_exception(&self, _assertion: Option<&AssertionView>, _message: &str) {}
    fn on_register_generator_override(&self, _site: &GeneratorSite) -> bool {
        false
    }
    /// Computes the full override sequence for `site` up front, given the
    /// values the natural generator would have produced. `taut`'s natural
    /// generators are always an eagerly materialised `Vec`, so — unlike
    /// `spec.md` §4.6's one-value-at-a-time protocol — there is no lazily
    /// produced value an override would need to intercept mid-stream; the
    /// whole replacement sequence can be computed in one call (`DESIGN.md`).
    fn on_build_override_queue(&self, _site: &GeneratorSite, _natural: &[String]) -> Option<VecDeque<String>> {
        None
    }
    fn on_print_context_frame(&self, _frame: &Frame) -> bool {
        false
    }
    fn on_print_log(&self, _incremental_id: u64, _message: &str) -> bool {
        false
    }
}

/// Holds the frozen listener list and, per event kind, the precomputed
/// subset (in registration order) that actually listens for it.
pub struct Bus {
    listeners: Vec<Box<dyn Listener>>,
    dispatch: std::collections::HashMap<Interest, Vec<usize>>,
}

impl Bus {
    pub fn new(listeners: Vec<Box<dyn Listener>>) -> Self {
        let mut dispatch: std::collections::HashMap<Interest, Vec<usize>> =
            std::collections::HashMap::new();
        let all = [
            Interest::FILTER_TEST,
            Interest::PRE_RUN_TESTS,
            Interest::POST_RUN_TESTS,
            Interest::PRE_RUN_SINGLE_TEST,
            Interest::POST_RUN_SINGLE_TEST,
            Interest::PRE_TRY_CATCH,
            Interest::PRE_FAIL_TEST,
            Interest::ASSERTION_FAILED,
            Interest::UNCAUGHT_EXCEPTION,
            Interest::REGISTER_GENERATOR_OVERRIDE,
            Interest::OVERRIDE_GENERATOR,
            Interest::PRINT_CONTEXT_FRAME,
            Interest::PRINT_LOG,
        ];
        for bit in all {
            let indices: Vec<usize> = listeners
                .iter()
                .enumerate()
                .filter(|(_, l)| l.interest().contains(bit))
                .map(|(i, _)| i)
                .collect();
            dispatch.insert(bit, indices);
        }
        Bus { listeners, dispatch }
    }

    fn for_event(&self, bit: Interest) -> impl Iterator<Item = &dyn Listener> {
        self.dispatch
            .get(&bit)
            .into_iter()
            .flatten()
            .map(move |&i| self.listeners[i].as_ref())
    }

    pub fn filter_test(&self, test: &Test, source_disabled: bool) -> TestFilterDecision {
        let mut decision = if source_disabled {
            TestFilterDecision::Disabled
        } else {
            TestFilterDecision::Enabled
        };
        for l in self.for_event(Interest::FILTER_TEST) {
            decision = l.on_filter_test(test, decision);
        }
        decision
    }

    pub fn pre_run_tests(&self, tests: &[Test]) {
        for l in self.for_event(Interest::PRE_RUN_TESTS) {
            l.on_pre_run_tests(tests);
        }
    }

    pub fn post_run_tests(&self, progress: &crate::runner::RunTestsProgress) {
        for l in self.for_event(Interest::POST_RUN_TESTS) {
            l.on_post_run_tests(progress);
        }
    }

    pub fn pre_run_single_test(&self, test: &Test) {
        for l in self.for_event(Interest::PRE_RUN_SINGLE_TEST) {
            l.on_pre_run_single_test(test);
        }
    }

    pub fn post_run_single_test(&self, test: &Test, results: &crate::runner::RunSingleTestResults) {
        for l in self.for_event(Interest::POST_RUN_SINGLE_TEST) {
            l.on_post_run_single_test(test, results);
        }
    }

    pub fn pre_try_catch(&self, test: &Test) -> bool {
        let mut catch = true;
        for l in self.for_event(Interest::PRE_TRY_CATCH) {
            catch = l.on_pre_try_catch(test);
        }
        catch
    }

    pub fn pre_fail_test(&self, test: &Test) {
        for l in self.for_event(Interest::PRE_FAIL_TEST) {
            l.on_pre_fail_test(test);
        }
    }

    /// Returns whether any listener requested a breakpoint (`should_break`).
    pub fn assertion_failed(&self, assertion: &AssertionView) -> bool {
        let mut should_break = false;
        for l in self.for_event(Interest::ASSERTION_FAILED) {
            if l.on_assertion_failed(assertion) {
                should_break = true;
            }
        }
        should_break
    }

    pub fn uncaught_exception(&self, assertion: Option<&AssertionView>, message: &str) {
        for l in self.for_event(Interest::UNCAUGHT_EXCEPTION) {
            l.on_uncaught_exception(assertion, message);
        }
    }

    /// First listener to claim the site (return `true`) becomes its
    /// overrider; later listeners are not asked.
    pub fn register_generator_override(&self, site: &GeneratorSite) -> Option<usize> {
        for idx in self.dispatch.get(&Interest::REGISTER_GENERATOR_OVERRIDE).into_iter().flatten() {
            if self.listeners[*idx].on_register_generator_override(site) {
                return Some(*idx);
            }
        }
        None
    }

    pub fn build_override_queue(
        &self,
        listener_index: usize,
        site: &GeneratorSite,
        natural: &[String],
    ) -> Option<VecDeque<String>> {
        self.listeners[listener_index].on_build_override_queue(site, natural)
    }

    /// Walks newest-to-oldest; the first listener to claim a frame consumes
    /// it (`spec.md` §4.7).
    pub fn print_context_frames(&self, frames: &[Frame]) {
        for frame in frames {
            for l in self.for_event(Interest::PRINT_CONTEXT_FRAME) {
                if l.on_print_context_frame(frame) {
                    break;
                }
            }
        }
    }

    pub fn print_log(&self, incremental_id: u64, message: &str) {
        for l in self.for_event(Interest::PRINT_LOG) {
            if l.on_print_log(incremental_id, message) {
                break;
            }
        }
    }
}
