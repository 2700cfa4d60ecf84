//! The per-thread trail of "in-flight" frames printed on failure
//! (`spec.md` §3, §4.7): the assertion currently being evaluated, a
//! must-throw site, a pinned element of a caught exception, a user trace
//! breadcrumb, or a log entry.
//!
//! Frames are owned by their declaring scope; the stack holds only
//! non-owning identity. [`FrameGuard`] pushes on construction and pops on
//! drop, and checks the stack-discipline invariant of `spec.md` §5: a guard
//! may only be dropped while it is the top of the stack, which also catches
//! the "resuming a suspended assertion" violation the spec calls out.

use std::cell::RefCell;

/// A unique, cheaply comparable identity for one pushed frame. Assigned by
/// [`ContextStack::next_id`], monotonic per thread.
pub type FrameId = u64;

#[derive(Debug, Clone)]
pub enum Frame {
    BasicAssertionInfo { text: &'static str, file: &'static str, line: u32 },
    MustThrowInfo { file: &'static str, line: u32 },
    CaughtExceptionElem { type_name: String, message: String },
    BasicTrace { description: String, file: &'static str, line: u32 },
    LogEntry { incremental_id: u64, message: String },
}

struct Entry {
    id: FrameId,
    frame: Frame,
}

#[derive(Default)]
struct ContextStack {
    sequence: Vec<Entry>,
    ids: std::collections::HashSet<FrameId>,
    next_id: FrameId,
    next_log_id: u64,
}

impl ContextStack {
    fn push(&mut self, frame: Frame) -> FrameId {
        let id = self.next_id;
        self.next_id += 1;
        let inserted = self.ids.insert(id);
        debug_assert!(inserted, "frame ids are assigned monotonically, never reused");
        self.sequence.push(Entry { id, frame });
        debug_assert_eq!(self.ids.len(), self.sequence.len());
        id
    }

    fn pop(&mut self, id: FrameId) {
        match self.sequence.last() {
            Some(top) if top.id == id => {
                self.sequence.pop();
                self.ids.remove(&id);
            }
            _ => crate::error::raise_hard_error(crate::error::HardError::StackDisciplineViolation),
        }
        debug_assert_eq!(self.ids.len(), self.sequence.len());
    }

    fn next_log_id(&mut self) -> u64 {
        let id = self.next_log_id;
        self.next_log_id += 1;
        id
    }
}

thread_local! {
    static STACK: RefCell<ContextStack> = RefCell::new(ContextStack::default());
    static UNSCOPED_LOG: RefCell<Vec<(u64, String)>> = const { RefCell::new(Vec::new()) };
}

/// Pushes `frame` on construction, pops it on drop. Not `Clone`, not `Copy`:
/// moving it would desynchronize push/pop order, so it is only ever held by
/// value in the scope that created it.
#[must_use = "a FrameGuard does nothing if immediately dropped; bind it to a scoped local"]
pub struct FrameGuard {
    id: FrameId,
}

impl FrameGuard {
    pub fn push(frame: Frame) -> Self {
        let id = STACK.with(|s| s.borrow_mut().push(frame));
        FrameGuard { id }
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        STACK.with(|s| s.borrow_mut().pop(self.id));
    }
}

/// Returns a snapshot of the current thread's frames, newest first — the
/// order the failure printer walks them in.
pub fn snapshot_newest_first() -> Vec<Frame> {
    STACK.with(|s| {
        s.borrow()
            .sequence
            .iter()
            .rev()
            .map(|e| e.frame.clone())
            .collect()
    })
}

pub fn depth() -> usize {
    STACK.with(|s| s.borrow().sequence.len())
}

/// The next strictly-increasing log id for the current thread
/// (`spec.md` §3, §8 property 3).
pub fn next_log_id() -> u64 {
    STACK.with(|s| s.borrow_mut().next_log_id())
}

/// Records a `log!` call that is not scoped to any frame guard — it stays
/// attached to the current test repetition (not to any particular
/// assertion) and is merged with scoped `LogEntry` frames in chronological
/// order by `incremental_id` when a failure is printed. Returns the id the
/// entry was assigned.
pub fn log_unscoped(message: String) -> u64 {
    let id = next_log_id();
    UNSCOPED_LOG.with(|l| l.borrow_mut().push((id, message)));
    id
}

/// Pushes a `LogEntry` frame that lives only for the returned guard's
/// scope — the `scoped_log!` counterpart to [`log_unscoped`].
pub fn push_scoped_log(message: String) -> FrameGuard {
    let id = next_log_id();
    FrameGuard::push(Frame::LogEntry {
        incremental_id: id,
        message,
    })
}

/// A snapshot of every unscoped log entry recorded so far this repetition,
/// in the order they were recorded.
pub fn unscoped_log_snapshot() -> Vec<(u64, String)> {
    UNSCOPED_LOG.with(|l| l.borrow().clone())
}

/// Clears the unscoped log. Called by the runner between repetitions of a
/// test (`spec.md` §3's `RunSingleTestResults.unscoped_log` is per
/// repetition, not per whole test).
pub fn clear_unscoped_log() {
    UNSCOPED_LOG.with(|l| l.borrow_mut().clear());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(file: &'static str, line: u32) -> Frame {
        Frame::MustThrowInfo { file, line }
    }

    #[test]
    fn balanced_push_pop_leaves_stack_empty() {
        {
            let _a = FrameGuard::push(frame("a.rs", 1));
            let _b = FrameGuard::push(frame("b.rs", 2));
            assert_eq!(depth(), 2);
        }
        assert_eq!(depth(), 0);
    }

    #[test]
    fn nested_guards_pop_in_reverse_order() {
        let outer = FrameGuard::push(frame("a.rs", 1));
        {
            let _inner = FrameGuard::push(frame("b.rs", 2));
            assert_eq!(depth(), 2);
        }
        assert_eq!(depth(), 1);
        drop(outer);
        assert_eq!(depth(), 0);
    }

    #[test]
    fn unscoped_log_accumulates_and_clears() {
        log_unscoped("first".to_string());
        log_unscoped("second".to_string());
        let snapshot = unscoped_log_snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].1, "first");
        assert_eq!(snapshot[1].1, "second");
        assert!(snapshot[0].0 < snapshot[1].0);
        clear_unscoped_log();
        assert!(unscoped_log_snapshot().is_empty());
    }

    #[test]
    fn log_ids_are_strictly_increasing() {
        let a = next_log_id();
        let b = next_log_id();
        let c = next_log_id();
        assert!(a < b && b < c);
    }
}
