//! The one external collaborator `spec.md` §6 describes but does not ship:
//! something that turns a [`crate::canvas::Canvas`] and a line of text into
//! actual bytes on a stream. Grounded on the teacher's use of the `console`
//! crate for exactly this ANSI/TTY plumbing (`report/mod.rs`'s
//! `ConsoleReporter`, which reaches for `console::style(..).green()` rather
//! than hand-rolling escape codes).

use console::{Style as ConsoleStyle, Term};

use crate::canvas::{Color, Style};

/// A `print(fmt, args)` sink, an `ansi_delta` producer, a `reset_string`
/// producer, and an `is_tty` probe — the four primitives `spec.md` §6
/// requires of the terminal collaborator. The core never touches the byte
/// stream directly.
pub trait Terminal {
    fn print(&self, text: &str);
    fn ansi_delta(&self, current: Style, next: Style) -> String;
    fn reset_string(&self) -> String;
    fn is_tty(&self) -> bool;
}

fn to_console_style(style: Style) -> ConsoleStyle {
    let mut s = ConsoleStyle::new();
    if let Some(color) = style.color {
        s = match color {
            Color::Red => s.red(),
            Color::Green => s.green(),
            Color::Yellow => s.yellow(),
            Color::Blue => s.blue(),
            Color::Magenta => s.magenta(),
            Color::Cyan => s.cyan(),
            Color::White => s.white(),
        };
    }
    if style.bold {
        s = s.bold();
    }
    if style.dim {
        s = s.dim();
    }
    s
}

/// Extracts just the opening escape sequence `console::Style` would wrap a
/// string in, by rendering a one-character probe and cutting it off before
/// the probe character. `console::Style` doesn't expose its prefix/suffix
/// publicly, so this is the least-worst way to reuse its colour table
/// instead of duplicating SGR codes by hand.
fn style_prefix(style: Style) -> String {
    let rendered = to_console_style(style)
        .force_styling(true)
        .apply_to('\u{1}')
        .to_string();
    match rendered.find('\u{1}') {
        Some(idx) => rendered[..idx].to_string(),
        None => String::new(),
    }
}

/// The default terminal: full colour via `console`, TTY-probed by
/// `console::Term::stdout().is_term()`.
pub struct AnsiTerminal;

impl Terminal for AnsiTerminal {
    fn print(&self, text: &str) {
        print!("{text}");
    }

    fn ansi_delta(&self, _current: Style, next: Style) -> String {
        style_prefix(next)
    }

    fn reset_string(&self) -> String {
        "\x1b[0m".to_string()
    }

    fn is_tty(&self) -> bool {
        Term::stdout().is_term()
    }
}

/// Renders a single styled run of text without going through the full
/// `Canvas` machinery — for simple one-line output (progress lines, the
/// uncaught-exception banner) that has no diagram geometry to lay out.
pub fn colorize(terminal: &dyn Terminal, text: &str, style: Style) -> String {
    if style == Style::default() {
        return text.to_string();
    }
    format!(
        "{}{}{}",
        terminal.ansi_delta(Style::default(), style),
        text,
        terminal.reset_string()
    )
}

/// Used under `--no-color`: strips all styling, grounded the same way the
/// teacher's `ConsoleReporter` gates styling on its `verbose`/`outcome`
/// fields rather than emitting escape codes unconditionally.
pub struct PlainTerminal;

impl Terminal for PlainTerminal {
    fn print(&self, text: &str) {
        print!("{text}");
    }

    fn ansi_delta(&self, _current: Style, _next: Style) -> String {
        String::new()
    }

    fn reset_string(&self) -> String {
        String::new()
    }

    fn is_tty(&self) -> bool {
        Term::stdout().is_term()
    }
}
