//! A single-pass state machine over the bytes of an expression snippet,
//! classifying every byte and reporting balanced bracket regions with their
//! preceding identifier (`spec.md` §4.1).
//!
//! This has nothing to do with parsing *Rust* syntax specifically — it is a
//! generic "don't get confused by strings/chars/raw strings while looking
//! for brackets" scanner, used by [`crate::pretty`] to colour an expression
//! and by [`crate::dsl`] to find unprotected separators.

/// How a single byte was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteClass {
    Normal,
    StringDelim,
    StringBody,
    CharDelim,
    CharBody,
    Escape,
    RawStringDelim,
    RawStringBody,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Normal,
    StringLit,
    CharLit,
    StringEscape,
    CharEscape,
    RawStringInitialSep,
    RawString,
}

/// A matched pair of brackets, reported once on close.
#[derive(Debug, Clone, Copy)]
pub struct BracketSpan {
    /// Byte offset of the opening bracket.
    pub open: usize,
    /// Byte offset just past the closing bracket.
    pub close_end: usize,
    /// Nesting depth, 0 for top-level brackets.
    pub depth: u32,
    /// Byte range of the identifier immediately preceding the opening
    /// bracket, if any (see module docs for how it survives whitespace and
    /// same-depth nested closing brackets).
    pub preceding_identifier: Option<(usize, usize)>,
}

struct BracketFrame {
    open: usize,
    depth: u32,
    saved_preceding_identifier: Option<(usize, usize)>,
    /// Set to `None` the moment content other than a single identifier is
    /// seen inside this group.
    sole_identifier: Option<(usize, usize)>,
    any_content_seen: bool,
}

/// Scans `source`, invoking `on_byte` for every byte and `on_bracket` once
/// per matched bracket pair, in the order the closing bracket is seen.
pub fn scan(
    source: &str,
    mut on_byte: impl FnMut(usize, ByteClass),
    mut on_bracket: impl FnMut(BracketSpan),
) {
    let bytes = source.as_bytes();
    let mut state = State::Normal;
    let mut raw_sep_start = 0usize;
    let mut raw_terminator: Vec<u8> = Vec::new();
    // Indices tentatively matching `raw_terminator` so far — not yet
    // classified, since a partial match that later fails turns out to have
    // been ordinary body text after all.
    let mut raw_pending: Vec<usize> = Vec::new();
    let mut raw_match_pos = 0usize;

    let mut ident_start: Option<usize> = None;
    let mut last_identifier: Option<(usize, usize)> = None;
    let mut bracket_stack: Vec<BracketFrame> = Vec::new();

    let mut i = 0usize;
    while i < bytes.len() {
        let b = bytes[i];
        match state {
            State::Normal => {
                // Identifier run tracking (digit separator detection lives here too).
                let is_ident_continue = b.is_ascii_alphanumeric() || b == b'_';
                if is_ident_continue {
                    if ident_start.is_none() {
                        ident_start = Some(i);
                    }
                    on_byte(i, ByteClass::Normal);
                    i += 1;
                    continue;
                }
                if let Some(start) = ident_start.take() {
                    last_identifier = Some((start, i));
                    mark_content(&mut bracket_stack, Some((start, i)));
                }

                if b == b'\'' {
                    let prev_is_digit = i > 0 && bytes[i - 1].is_ascii_digit();
                    if prev_is_digit {
                        // Digit separator, e.g. 1'000'000 — stays Normal.
                        on_byte(i, ByteClass::Normal);
                        mark_content(&mut bracket_stack, None);
                        i += 1;
                        continue;
                    }
                    on_byte(i, ByteClass::CharDelim);
                    mark_content(&mut bracket_stack, None);
                    state = State::CharLit;
                    i += 1;
                    continue;
                }

                if b == b'"' {
                    // R" in Normal state (not mid-identifier) starts a raw string.
                    if i > 0 && bytes[i - 1] == b'R' && !is_ident_continue_before_r(bytes, i) {
                        on_byte(i - 1, ByteClass::RawStringDelim);
                        on_byte(i, ByteClass::RawStringDelim);
                        mark_content(&mut bracket_stack, None);
                        state = State::RawStringInitialSep;
                        raw_sep_start = i + 1;
                        i += 1;
                        continue;
                    }
                    on_byte(i, ByteClass::StringDelim);
                    mark_content(&mut bracket_stack, None);
                    state = State::StringLit;
                    i += 1;
                    continue;
                }

                match b {
                    b'(' | b'[' | b'{' => {
                        let depth = bracket_stack.len() as u32;
                        bracket_stack.push(BracketFrame {
                            open: i,
                            depth,
                            saved_preceding_identifier: last_identifier,
                            sole_identifier: None,
                            any_content_seen: false,
                        });
                        last_identifier = None;
                        on_byte(i, ByteClass::Normal);
                    }
                    b')' | b']' | b'}' => {
                        if let Some(frame) = bracket_stack.pop() {
                            on_bracket(BracketSpan {
                                open: frame.open,
                                close_end: i + 1,
                                depth: frame.depth,
                                preceding_identifier: frame.saved_preceding_identifier,
                            });
                            last_identifier = frame.sole_identifier;
                            mark_content(&mut bracket_stack, frame.sole_identifier);
                        } else {
                            last_identifier = None;
                        }
                        on_byte(i, ByteClass::Normal);
                    }
                    _ => {
                        if !b.is_ascii_whitespace() {
                            mark_content(&mut bracket_stack, None);
                        }
                        on_byte(i, ByteClass::Normal);
                    }
                }
                i += 1;
            }
            State::StringLit => {
                if b == b'\\' {
                    on_byte(i, ByteClass::Escape);
                    state = State::StringEscape;
                } else if b == b'"' {
                    on_byte(i, ByteClass::StringDelim);
                    state = State::Normal;
                } else {
                    on_byte(i, ByteClass::StringBody);
                }
                i += 1;
            }
            State::StringEscape => {
                on_byte(i, ByteClass::Escape);
                state = State::StringLit;
                i += 1;
            }
            State::CharLit => {
                if b == b'\\' {
                    on_byte(i, ByteClass::Escape);
                    state = State::CharEscape;
                } else if b == b'\'' {
                    on_byte(i, ByteClass::CharDelim);
                    state = State::Normal;
                } else {
                    on_byte(i, ByteClass::CharBody);
                }
                i += 1;
            }
            State::CharEscape => {
                on_byte(i, ByteClass::Escape);
                state = State::CharLit;
                i += 1;
            }
            State::RawStringInitialSep => {
                if b == b'(' {
                    raw_terminator = Vec::with_capacity(bytes.len() - raw_sep_start + 2);
                    raw_terminator.push(b')');
                    raw_terminator.extend_from_slice(&bytes[raw_sep_start..i]);
                    raw_terminator.push(b'"');
                    raw_match_pos = 0;
                    on_byte(i, ByteClass::RawStringDelim);
                    state = State::RawString;
                } else {
                    on_byte(i, ByteClass::RawStringDelim);
                }
                i += 1;
            }
            State::RawString => {
                // Bytes tentatively matching the terminator are buffered,
                // not classified yet — a partial match that later fails
                // turns out to have been body text, not a delimiter.
                if b == raw_terminator[raw_match_pos] {
                    raw_pending.push(i);
                    raw_match_pos += 1;
                    if raw_match_pos == raw_terminator.len() {
                        for idx in raw_pending.drain(..) {
                            on_byte(idx, ByteClass::RawStringDelim);
                        }
                        state = State::Normal;
                        raw_match_pos = 0;
                        raw_terminator.clear();
                    }
                } else {
                    for idx in raw_pending.drain(..) {
                        on_byte(idx, ByteClass::RawStringBody);
                    }
                    if b == raw_terminator[0] {
                        raw_pending.push(i);
                        raw_match_pos = 1;
                    } else {
                        on_byte(i, ByteClass::RawStringBody);
                        raw_match_pos = 0;
                    }
                }
                i += 1;
            }
        }
    }

    // An unterminated raw string: whatever was still tentatively matching
    // the terminator never completed, so it was body text all along.
    for idx in raw_pending.drain(..) {
        on_byte(idx, ByteClass::RawStringBody);
    }
}

fn is_ident_continue_before_r(bytes: &[u8], r_at_minus_quote: usize) -> bool {
    // `r_at_minus_quote` points at the `"`; the `R` is the byte before it.
    // `R"` only opens a raw string when `R` is not itself the tail of a
    // longer identifier (e.g. `FOOR"x"` should not trigger).
    let r_pos = r_at_minus_quote - 1;
    r_pos > 0 && (bytes[r_pos - 1].is_ascii_alphanumeric() || bytes[r_pos - 1] == b'_')
}

fn mark_content(stack: &mut [BracketFrame], ident: Option<(usize, usize)>) {
    if let Some(frame) = stack.last_mut() {
        if !frame.any_content_seen {
            frame.any_content_seen = true;
            frame.sole_identifier = ident;
        } else {
            frame.sole_identifier = None;
        }
    }
}

/// Scans forward from the start of `text`, honouring strings/chars/raw
/// strings and balanced `()`, `[]`, `{}` (treated interchangeably), and
/// returns the byte offset of the first unbalanced closing bracket or the
/// first character in `sep_chars` found at depth 0 — whichever comes first.
/// Never stops at a bracket that is the first non-whitespace character.
/// Trailing whitespace before the separator is trimmed from the returned
/// offset's effective end (callers slice `[..offset]` and trim separately).
pub fn find_unprotected_separator(text: &str, sep_chars: &[char]) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth: i32 = 0;
    let mut seen_non_whitespace = false;
    let mut found: Option<usize> = None;

    scan(
        text,
        |i, class| {
            if found.is_some() {
                return;
            }
            if class != ByteClass::Normal {
                seen_non_whitespace = true;
                return;
            }
            let b = bytes[i];
            match b {
                b'(' | b'[' | b'{' => {
                    depth += 1;
                    seen_non_whitespace = true;
                }
                b')' | b']' | b'}' => {
                    if depth == 0 {
                        if seen_non_whitespace {
                            found = Some(i);
                        }
                    } else {
                        depth -= 1;
                    }
                    seen_non_whitespace = true;
                }
                _ => {
                    if depth == 0 && sep_chars.contains(&(b as char)) {
                        if seen_non_whitespace {
                            found = Some(i);
                        }
                    } else if !b.is_ascii_whitespace() {
                        seen_non_whitespace = true;
                    }
                }
            }
        },
        |_| {},
    );

    found
}

/// Trims trailing ASCII whitespace from `text[..end]`, returning the new end
/// offset.
pub fn trim_trailing_whitespace(text: &str, end: usize) -> usize {
    let bytes = text.as_bytes();
    let mut e = end;
    while e > 0 && bytes[e - 1].is_ascii_whitespace() {
        e -= 1;
    }
    e
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classes(source: &str) -> Vec<ByteClass> {
        let mut out = vec![ByteClass::Normal; source.len()];
        scan(
            source,
            |i, c| out[i] = c,
            |_| {},
        );
        out
    }

    #[test]
    fn digit_separator_is_not_a_char_literal() {
        let src = "1'234";
        let c = classes(src);
        assert_eq!(c, vec![ByteClass::Normal; 5]);
    }

    #[test]
    fn plain_char_literal_is_recognised() {
        let src = "'x'";
        let c = classes(src);
        assert_eq!(c[0], ByteClass::CharDelim);
        assert_eq!(c[1], ByteClass::CharBody);
        assert_eq!(c[2], ByteClass::CharDelim);
    }

    #[test]
    fn raw_string_with_digit_separator_body() {
        let src = r#"R"xy(1'000'000)xy""#;
        let c = classes(src);
        // `R"`, the `xy` separator, and the opening `(` are all delimiters.
        assert_eq!(c[0], ByteClass::RawStringDelim);
        assert_eq!(c[1], ByteClass::RawStringDelim);
        assert_eq!(c[2], ByteClass::RawStringDelim);
        assert_eq!(c[3], ByteClass::RawStringDelim);
        assert_eq!(c[4], ByteClass::RawStringDelim);
        // body bytes, including the apostrophes, are RawStringBody not CharDelim
        let body_start = 5; // after R"xy(
        let body_end = 14; // the closing `)` of `)xy"`
        assert!(c[body_start..body_end]
            .iter()
            .all(|x| *x == ByteClass::RawStringBody));
        // the closing `)xy"` terminator is coloured as a delimiter too.
        assert_eq!(c[body_end], ByteClass::RawStringDelim);
        assert!(c[body_end..src.len()]
            .iter()
            .all(|x| *x == ByteClass::RawStringDelim));
    }

    #[test]
    fn brackets_inside_strings_are_not_counted() {
        let mut opens = Vec::new();
        scan(
            r#"f("(") + g()"#,
            |_, _| {},
            |span| opens.push(span.open),
        );
        // Only f(...) and g() should be reported, not the parens in the string.
        assert_eq!(opens.len(), 2);
    }

    #[test]
    fn preceding_identifier_is_reported() {
        let mut found = None;
        scan(
            "foo(bar)",
            |_, _| {},
            |span| {
                if span.open == 3 {
                    found = span.preceding_identifier;
                }
            },
        );
        let (s, e) = found.expect("bracket span");
        assert_eq!(&"foo(bar)"[s..e], "foo");
    }

    #[test]
    fn preceding_identifier_survives_nested_paren_wrapped_identifier() {
        // (foo)(bar): the call-paren after `(foo)` should still see `foo`.
        let mut found = None;
        scan(
            "(foo)(bar)",
            |_, _| {},
            |span| {
                if span.open == 5 {
                    found = span.preceding_identifier;
                }
            },
        );
        let (s, e) = found.expect("bracket span for second call");
        assert_eq!(&"(foo)(bar)"[s..e], "foo");
    }

    #[test]
    fn unprotected_separator_skips_bracketed_commas() {
        let text = "f(a, b), rest";
        let idx = find_unprotected_separator(text, &[',']).unwrap();
        assert_eq!(&text[..idx], "f(a, b)");
    }

    #[test]
    fn unprotected_separator_ignores_leading_bracket() {
        // A bracket that is the first non-whitespace char never stops the scan.
        let text = "(a, b)";
        let idx = find_unprotected_separator(text, &[',']);
        assert_eq!(idx, None);
    }
}
