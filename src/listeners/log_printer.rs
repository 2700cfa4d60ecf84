//! The log printer (`spec.md` §3, §4.9): prints every `LogEntry` — whether
//! scoped (reached as a `PRINT_CONTEXT_FRAME` frame) or unscoped (reached as
//! a standalone `PRINT_LOG` event) — in the chronological order the runner
//! already merged them into before dispatch (`crate::runner::report_assertion_failure`).

use std::rc::Rc;

use crate::bus::{Interest, Listener};
use crate::context::Frame;
use crate::terminal::Terminal;

pub struct LogPrinterListener {
    terminal: Rc<dyn Terminal>,
}

impl LogPrinterListener {
    pub fn new(terminal: Rc<dyn Terminal>) -> Self {
        LogPrinterListener { terminal }
    }
}

impl Listener for LogPrinterListener {
    fn interest(&self) -> Interest {
        Interest::PRINT_LOG | Interest::PRINT_CONTEXT_FRAME
    }

    fn on_print_log(&self, _incremental_id: u64, message: &str) -> bool {
        self.terminal.print(&format!("  log: {message}\n"));
        true
    }

    fn on_print_context_frame(&self, frame: &Frame) -> bool {
        if let Frame::LogEntry { message, .. } = frame {
            self.terminal.print(&format!("  log: {message}\n"));
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct Capture(RefCell<String>);
    impl Terminal for Capture {
        fn print(&self, text: &str) {
            self.0.borrow_mut().push_str(text);
        }
        fn ansi_delta(&self, _current: crate::canvas::Style, _next: crate::canvas::Style) -> String {
            String::new()
        }
        fn reset_string(&self) -> String {
            String::new()
        }
        fn is_tty(&self) -> bool {
            false
        }
    }

    #[test]
    fn prints_unscoped_log_and_claims_it() {
        let cap = Rc::new(Capture(RefCell::new(String::new())));
        let listener = LogPrinterListener::new(cap.clone());
        assert!(listener.on_print_log(0, "hello"));
        assert!(cap.0.borrow().contains("hello"));
    }

    #[test]
    fn claims_log_entry_frames_but_not_others() {
        let cap = Rc::new(Capture(RefCell::new(String::new())));
        let listener = LogPrinterListener::new(cap);
        assert!(listener.on_print_context_frame(&Frame::LogEntry { incremental_id: 0, message: "x".to_string() }));
        assert!(!listener.on_print_context_frame(&Frame::MustThrowInfo { file: "f", line: 1 }));
    }
}
