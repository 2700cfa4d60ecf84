//! The exception printer (`spec.md` §6's exception-analyser collaborator,
//! `spec.md` §4.9): prints the chain an uncaught panic was analysed into,
//! plus — when one was in flight — the assertion being evaluated when the
//! panic unwound through it (`crate::assertion::Assertion`'s `Drop` impl
//! stashes that view via `crate::runner::report_uncaught_exception_in_assertion`).

use std::rc::Rc;

use crate::assertion::AssertionView;
use crate::bus::{Interest, Listener};
use crate::canvas::{Color, Style};
use crate::terminal::{colorize, Terminal};

pub struct ExceptionPrinterListener {
    terminal: Rc<dyn Terminal>,
}

impl ExceptionPrinterListener {
    pub fn new(terminal: Rc<dyn Terminal>) -> Self {
        ExceptionPrinterListener { terminal }
    }
}

impl Listener for ExceptionPrinterListener {
    fn interest(&self) -> Interest {
        Interest::UNCAUGHT_EXCEPTION
    }

    fn on_uncaught_exception(&self, assertion: Option<&AssertionView>, message: &str) {
        if let Some(view) = assertion {
            self.terminal.print(&format!(
                "uncaught exception while evaluating `{}` at {}:{}\n",
                view.text, view.file, view.line
            ));
        }
        let styled = colorize(self.terminal.as_ref(), message, Style::fg(Color::Red).bold());
        self.terminal.print(&format!("{styled}\n"));
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
    fn prints_message_and_assertion_location_when_present() {
        let cap = Rc::new(Capture(RefCell::new(String::new())));
        let listener = ExceptionPrinterListener::new(cap.clone());
        let view = AssertionView {
            text: "$[x] > 0",
            file: "t.rs",
            line: 5,
            hard: true,
            args: Vec::new(),
            message: None,
        };
        listener.on_uncaught_exception(Some(&view), "boom");
        let out = cap.0.borrow();
        assert!(out.contains("t.rs:5"));
        assert!(out.contains("boom"));
    }

    #[test]
    fn prints_only_message_when_no_assertion_in_flight() {
        let cap = Rc::new(Capture(RefCell::new(String::new())));
        let listener = ExceptionPrinterListener::new(cap.clone());
        listener.on_uncaught_exception(None, "boom");
        assert!(cap.0.borrow().contains("boom"));
    }
}
