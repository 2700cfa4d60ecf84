//! The failed-assertion diagrammer (`spec.md` §2, §4.2, §8 scenario S1):
//! composes a [`Canvas`] from a failing assertion's source text and every
//! captured sub-expression value, each connected to its token's column by a
//! vertical line or — for a marker spanning more than one token — a
//! horizontal bracket. Also prints the context-frame trail (`MustThrowInfo`,
//! `BasicTrace`, `CaughtExceptionElem`) a failure carries, leaving
//! `LogEntry` frames to [`super::log_printer`].

use std::rc::Rc;

use crate::assertion::{ArgInfo, AssertionView, StoredArg};
use crate::bus::{Interest, Listener};
use crate::canvas::{Canvas, Color, DrawInfo, Style};
use crate::context::Frame;
use crate::pretty::{self, KeywordTable};
use crate::terminal::Terminal;

pub struct DiagramListener {
    terminal: Rc<dyn Terminal>,
    unicode: bool,
}

impl DiagramListener {
    pub fn new(terminal: Rc<dyn Terminal>, unicode: bool) -> Self {
        DiagramListener { terminal, unicode }
    }

    /// The row connectors start at (directly below the expression's own
    /// row) is fixed at 2; a value is placed at the shallowest row `R >= 3`
    /// such that every row from 2 up to `R` is entirely free in its column
    /// span — so its connector never crosses another marker's value text.
    fn place(canvas: &Canvas, col: usize, width: usize) -> usize {
        let mut height = 2usize;
        loop {
            let top = canvas.find_free_space(2, col, height, width, 1, 1);
            if top == 2 {
                return 2 + height - 1;
            }
            height += 1;
        }
    }

    fn draw_value(&self, canvas: &mut Canvas, info: &ArgInfo, stored: &StoredArg) {
        let col = info.expr_offset as usize;
        let width = (info.expr_len as usize).max(1);
        let value = stored.value.clone().unwrap_or_else(|| "<unevaluated>".to_string());
        let value_len = value.chars().count().max(1);
        let search_width = width.max(value_len);

        let value_row = Self::place(canvas, col, search_width);
        let connector_height = value_row - 2;
        let pipe_col = col + width.saturating_sub(1) / 2;
        let value_col = pipe_col.saturating_sub(value_len / 2);
        let value_style = DrawInfo::styled(Style::fg(Color::Cyan)).important();

        if info.need_bracket {
            canvas.draw_horizontal_bracket(2, col, connector_height, width, DrawInfo::plain().important(), self.unicode, true);
        } else {
            let ch = if self.unicode { '\u{2502}' } else { '|' };
            canvas.draw_column(2, pipe_col, connector_height, ch, DrawInfo::plain().important(), true);
        }
        canvas.draw_string(value_row, value_col, &value, value_style);
    }

    fn render_assertion(&self, view: &AssertionView) -> Canvas {
        let mut canvas = Canvas::new();
        let kind = if view.hard { "REQUIRE" } else { "CHECK" };
        let header = format!("{}:{}: {kind} failed", view.file, view.line);
        canvas.draw_string(0, 0, &header, DrawInfo::styled(Style::fg(Color::Red).bold()).important());
        pretty::paint(&mut canvas, 1, 0, view.text, &KeywordTable::rust_default());
        for (info, stored) in view.draw_order() {
            self.draw_value(&mut canvas, info, stored);
        }
        if let Some(message) = &view.message {
            let line = canvas.height() + 1;
            canvas.draw_string(line, 0, message, DrawInfo::plain());
        }
        canvas
    }
}

impl Listener for DiagramListener {
    fn interest(&self) -> Interest {
        Interest::ASSERTION_FAILED | Interest::PRINT_CONTEXT_FRAME
    }

    fn on_assertion_failed(&self, assertion: &AssertionView) -> bool {
        let canvas = self.render_assertion(assertion);
        self.terminal.print(&canvas.render(self.terminal.as_ref(), self.unicode));
        self.terminal.print("\n");
        false
    }

    fn on_print_context_frame(&self, frame: &Frame) -> bool {
        match frame {
            Frame::MustThrowInfo { file, line } => {
                self.terminal.print(&format!("  while expecting a throw at {file}:{line}\n"));
                true
            }
            Frame::BasicTrace { description, file, line } => {
                self.terminal.print(&format!("  trace: {description} ({file}:{line})\n"));
                true
            }
            Frame::CaughtExceptionElem { type_name, message } => {
                self.terminal.print(&format!("  caused by {type_name}: {message}\n"));
                true
            }
            Frame::BasicAssertionInfo { .. } | Frame::LogEntry { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertion::ArgState;
    use crate::terminal::PlainTerminal;

    fn view() -> AssertionView {
        AssertionView {
            text: "$[a] == $[b]",
            file: "t.rs",
            line: 10,
            hard: true,
            args: vec![
                (
                    ArgInfo { ident_offset: 2, ident_len: 1, expr_offset: 2, expr_len: 1, need_bracket: false, counter: 0 },
                    StoredArg { state: ArgState::Done, value: Some("2".to_string()) },
                ),
                (
                    ArgInfo { ident_offset: 10, ident_len: 1, expr_offset: 10, expr_len: 1, need_bracket: false, counter: 1 },
                    StoredArg { state: ArgState::Done, value: Some("3".to_string()) },
                ),
            ],
            message: None,
        }
    }

    #[test]
    fn diagram_contains_header_expression_and_both_values() {
        let listener = DiagramListener::new(Rc::new(PlainTerminal), true);
        let canvas = listener.render_assertion(&view());
        let rendered = canvas.render(&PlainTerminal, true);
        assert!(rendered.contains("REQUIRE failed"));
        assert!(rendered.contains("$[a] == $[b]"));
        assert!(rendered.contains('2'));
        assert!(rendered.contains('3'));
    }

    #[test]
    fn distinct_markers_get_distinct_value_rows_when_they_would_collide() {
        // Two markers at the same column would otherwise place their values
        // on top of each other; `place` must push the second one down.
        let mut canvas = Canvas::new();
        let listener = DiagramListener::new(Rc::new(PlainTerminal), true);
        let info = ArgInfo { ident_offset: 0, ident_len: 1, expr_offset: 0, expr_len: 1, need_bracket: false, counter: 0 };
        let a = StoredArg { state: ArgState::Done, value: Some("11111".to_string()) };
        let b = StoredArg { state: ArgState::Done, value: Some("22222".to_string()) };
        listener.draw_value(&mut canvas, &info, &a);
        listener.draw_value(&mut canvas, &info, &b);
        let rendered = canvas.render(&PlainTerminal, true);
        assert!(rendered.contains("11111"));
        assert!(rendered.contains("22222"));
        assert_ne!(
            rendered.lines().position(|l| l.contains("11111")),
            rendered.lines().position(|l| l.contains("22222"))
        );
    }
}
