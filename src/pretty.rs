//! Colours an expression onto a [`crate::canvas::Canvas`], driving
//! [`crate::lexer`] to classify bytes (`spec.md` §4.3). Strings, characters
//! and raw strings get one colour for their delimiters and (for raw
//! strings, per `spec.md` §8 scenario S6) a *different* colour for their
//! body; runs of normal bytes are re-tokenised into identifiers, numeric
//! literals and punctuation so that keywords — classified into
//! {generic, value, op} by a caller-supplied [`KeywordTable`] — and numeric
//! suffixes get their own colours.
//!
//! This module has no notion of "is this valid Rust" beyond the generic
//! lexical rules [`crate::lexer`] already encodes; the keyword table is
//! supplied by the caller so the same machinery could colour a snippet in
//! any C-family language, matching the spec's description of the
//! pretty-printer as lexer-driven rather than grammar-driven.

use crate::canvas::{Canvas, Color, DrawInfo, Style};
use crate::lexer::{scan, ByteClass};

/// Keywords bucketed the way `spec.md` §4.3 describes: "generic" control-flow
/// keywords, "value" keywords that denote a constant, and "op" keywords that
/// behave like an operator syntactically.
pub struct KeywordTable {
    pub generic: &'static [&'static str],
    pub value: &'static [&'static str],
    pub op: &'static [&'static str],
}

impl KeywordTable {
    /// A reasonable default for the Rust expressions `check!`/`require!`
    /// actually capture. Buckets are a judgment call (Rust has no formal
    /// generic/value/op keyword taxonomy); `as` reads like a binary operator
    /// so it lands in `op`, constant-valued keywords land in `value`,
    /// everything else lands in `generic`.
    pub fn rust_default() -> Self {
        KeywordTable {
            generic: &[
                "fn", "let", "mut", "if", "else", "match", "for", "while", "loop", "return",
                "struct", "enum", "impl", "pub", "use", "mod", "const", "static", "unsafe",
                "async", "await", "move", "ref", "dyn", "where", "trait", "type", "crate",
                "super", "self", "Self", "in", "break", "continue",
            ],
            value: &["true", "false", "None", "Some", "Ok", "Err"],
            op: &["as"],
        }
    }
}

/// Known Rust numeric-literal type suffixes. A suffix outside this set that
/// starts with `_` is treated as `spec.md` §4.3's "suffix starting with `_`"
/// case and coloured distinctly from a recognised integer/float suffix.
const NUMERIC_SUFFIXES: &[&str] = &[
    "i8", "i16", "i32", "i64", "i128", "isize", "u8", "u16", "u32", "u64", "u128", "usize", "f32",
    "f64",
];

#[derive(Clone, Copy, PartialEq, Eq)]
enum LiteralKind {
    Str,
    Char,
    Raw,
}

fn color_for_literal(kind: LiteralKind) -> Style {
    match kind {
        LiteralKind::Str | LiteralKind::Char => Style::fg(Color::Green),
        LiteralKind::Raw => Style::fg(Color::Green).dim(),
    }
}

fn delim_color_for_literal(kind: LiteralKind) -> Style {
    match kind {
        LiteralKind::Str | LiteralKind::Char => Style::fg(Color::Green).bold(),
        // Raw-string delimiters get a colour distinct from the body
        // (`spec.md` §8 S6: "colour the raw string's delimiters distinctly
        // from its body").
        LiteralKind::Raw => Style::fg(Color::Magenta).bold(),
    }
}

fn keyword_style(word: &str, keywords: &KeywordTable) -> Option<Style> {
    if keywords.generic.contains(&word) {
        Some(Style::fg(Color::Magenta).bold())
    } else if keywords.value.contains(&word) {
        Some(Style::fg(Color::Blue).bold())
    } else if keywords.op.contains(&word) {
        Some(Style::fg(Color::Cyan))
    } else {
        None
    }
}

struct Span {
    start: usize,
    end: usize,
    style: Style,
}

/// Splits one contiguous run of [`ByteClass::Normal`] bytes (`text[start..end]`)
/// into identifier/number/punctuation spans and assigns each a colour.
fn paint_normal_run(text: &str, start: usize, end: usize, keywords: &KeywordTable, out: &mut Vec<Span>) {
    let bytes = text.as_bytes();
    let mut i = start;
    while i < end {
        let b = bytes[i];
        if b.is_ascii_digit() {
            let num_start = i;
            while i < end && (bytes[i].is_ascii_digit() || bytes[i] == b'\'' || bytes[i] == b'.' || bytes[i] == b'_') {
                i += 1;
            }
            let num_end = i;
            out.push(Span {
                start: num_start,
                end: num_end,
                style: Style::fg(Color::Blue),
            });
            // A suffix directly follows when more identifier-shaped bytes
            // come next with no separating punctuation.
            let suffix_start = i;
            while i < end && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            if i > suffix_start {
                let suffix = &text[suffix_start..i];
                let style = if suffix.starts_with('_') && !NUMERIC_SUFFIXES.contains(&suffix) {
                    Style::fg(Color::Yellow)
                } else {
                    Style::fg(Color::Blue)
                };
                out.push(Span {
                    start: suffix_start,
                    end: i,
                    style,
                });
            }
            continue;
        }
        if b.is_ascii_alphabetic() || b == b'_' {
            let ident_start = i;
            while i < end && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            let word = &text[ident_start..i];
            if let Some(style) = keyword_style(word, keywords) {
                out.push(Span {
                    start: ident_start,
                    end: i,
                    style,
                });
            }
            // Plain identifiers keep the default style (no span pushed).
            continue;
        }
        // Punctuation: default style, skip without pushing a span.
        i += 1;
    }
}

/// Paints `text` onto `canvas` starting at `(line, col)`, using byte offset
/// as column offset — a simplification that assumes the expression text is
/// ASCII, which holds for every Rust expression `check!`/`require!` renders
/// (see `DESIGN.md`).
pub fn paint(canvas: &mut Canvas, line: usize, col: usize, text: &str, keywords: &KeywordTable) {
    let mut spans: Vec<Span> = Vec::new();
    let mut last_literal = LiteralKind::Str;
    let mut run_start: Option<usize> = None;

    scan(
        text,
        |i, class| match class {
            ByteClass::Normal => {
                if run_start.is_none() {
                    run_start = Some(i);
                }
            }
            ByteClass::StringDelim => {
                flush_normal_run(text, &mut run_start, i, keywords, &mut spans);
                last_literal = LiteralKind::Str;
                spans.push(Span { start: i, end: i + 1, style: delim_color_for_literal(LiteralKind::Str) });
            }
            ByteClass::StringBody | ByteClass::Escape if last_literal == LiteralKind::Char => {
                flush_normal_run(text, &mut run_start, i, keywords, &mut spans);
                spans.push(Span { start: i, end: i + 1, style: color_for_literal(LiteralKind::Char) });
            }
            ByteClass::StringBody | ByteClass::Escape => {
                flush_normal_run(text, &mut run_start, i, keywords, &mut spans);
                spans.push(Span { start: i, end: i + 1, style: color_for_literal(LiteralKind::Str) });
            }
            ByteClass::CharDelim => {
                flush_normal_run(text, &mut run_start, i, keywords, &mut spans);
                last_literal = LiteralKind::Char;
                spans.push(Span { start: i, end: i + 1, style: delim_color_for_literal(LiteralKind::Char) });
            }
            ByteClass::CharBody => {
                flush_normal_run(text, &mut run_start, i, keywords, &mut spans);
                spans.push(Span { start: i, end: i + 1, style: color_for_literal(LiteralKind::Char) });
            }
            ByteClass::RawStringDelim => {
                flush_normal_run(text, &mut run_start, i, keywords, &mut spans);
                last_literal = LiteralKind::Raw;
                spans.push(Span { start: i, end: i + 1, style: delim_color_for_literal(LiteralKind::Raw) });
            }
            ByteClass::RawStringBody => {
                flush_normal_run(text, &mut run_start, i, keywords, &mut spans);
                spans.push(Span { start: i, end: i + 1, style: color_for_literal(LiteralKind::Raw) });
            }
        },
        |_| {},
    );
    flush_normal_run(text, &mut run_start, text.len(), keywords, &mut spans);

    spans.sort_by_key(|s| s.start);
    merge_and_draw(canvas, line, col, text, &spans);
}

fn flush_normal_run(
    text: &str,
    run_start: &mut Option<usize>,
    end: usize,
    keywords: &KeywordTable,
    out: &mut Vec<Span>,
) {
    if let Some(start) = run_start.take() {
        if end > start {
            paint_normal_run(text, start, end, keywords, out);
        }
    }
}

/// Draws `text` plainly, then overlays each coloured span, merging adjacent
/// spans of the same style into one `draw_string` call.
fn merge_and_draw(canvas: &mut Canvas, line: usize, col: usize, text: &str, spans: &[Span]) {
    canvas.draw_string(line, col, text, DrawInfo::plain());
    let mut i = 0;
    while i < spans.len() {
        let style = spans[i].style;
        let run_start = spans[i].start;
        let mut run_end = spans[i].end;
        let mut j = i + 1;
        while j < spans.len() && spans[j].start == run_end && spans[j].style == style {
            run_end = spans[j].end;
            j += 1;
        }
        canvas.draw_string(line, col + run_start, &text[run_start..run_end], DrawInfo::styled(style));
        i = j;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::PlainTerminal;

    #[test]
    fn plain_identifiers_render_unstyled_but_intact() {
        let mut c = Canvas::new();
        paint(&mut c, 0, 0, "sum(a, b) == 7", &KeywordTable::rust_default());
        let out = c.render(&PlainTerminal, true);
        assert_eq!(out.lines().next().unwrap(), "sum(a, b) == 7");
    }

    #[test]
    fn raw_string_body_and_delimiters_differ() {
        let mut c = Canvas::new();
        let text = r#"R"xy(1'000'000)xy" + 1'234"#;
        paint(&mut c, 0, 0, text, &KeywordTable::rust_default());
        let out = c.render(&PlainTerminal, true);
        assert_eq!(out.lines().next().unwrap(), text);
    }

    #[test]
    fn numeric_suffix_starting_with_underscore_is_flagged_distinctly() {
        // Exercised through the public API by checking it doesn't panic and
        // preserves the literal text; colour distinction is asserted at the
        // `paint_normal_run` unit level below.
        let mut c = Canvas::new();
        paint(&mut c, 0, 0, "1_000_custom", &KeywordTable::rust_default());
        let out = c.render(&PlainTerminal, true);
        assert_eq!(out.lines().next().unwrap(), "1_000_custom");
    }

    #[test]
    fn custom_suffix_gets_a_different_style_than_known_type_suffix() {
        let mut spans = Vec::new();
        paint_normal_run("1_234i32", 0, 8, &KeywordTable::rust_default(), &mut spans);
        let suffix_style = spans.iter().find(|s| s.start == 5).unwrap().style;
        assert_eq!(suffix_style, Style::fg(Color::Blue));

        let mut spans2 = Vec::new();
        paint_normal_run("1_234_widget", 0, 12, &KeywordTable::rust_default(), &mut spans2);
        let suffix_style2 = spans2.iter().find(|s| s.start == 5).unwrap().style;
        assert_eq!(suffix_style2, Style::fg(Color::Yellow));
    }

    #[test]
    fn keyword_buckets_are_distinguished() {
        let kw = KeywordTable::rust_default();
        assert_eq!(keyword_style("if", &kw), Some(Style::fg(Color::Magenta).bold()));
        assert_eq!(keyword_style("true", &kw), Some(Style::fg(Color::Blue).bold()));
        assert_eq!(keyword_style("as", &kw), Some(Style::fg(Color::Cyan)));
        assert_eq!(keyword_style("sum", &kw), None);
    }
}
