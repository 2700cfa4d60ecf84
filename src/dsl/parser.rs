//! A small recursive-descent parser over the grammar documented in
//! `super`'s module doc. Reuses [`crate::lexer::find_unprotected_separator`]
//! for `Value`'s "up to the next unprotected separator" rule and for
//! splitting `Program`/`Scope` lists at top-level commas, so parenthesised
//! sub-programs inside a `Scope` never get mistaken for entry separators.

use std::cell::Cell;
use std::ops::Range;

use crate::error::UserError;
use crate::lexer::{scan, trim_trailing_whitespace, ByteClass};

use super::{Entry, IndexRange, Program, RuleAtom, RuleGroup};

struct Cursor<'a> {
    text: &'a str,
    pos: usize,
    base: usize,
}

impl<'a> Cursor<'a> {
    fn remaining(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn starts_with(&self, s: &str) -> bool {
        self.remaining().starts_with(s)
    }

    fn advance(&mut self, n: usize) {
        self.pos += n;
    }

    fn skip_ws(&mut self) {
        let skip = self
            .remaining()
            .bytes()
            .take_while(|b| b.is_ascii_whitespace())
            .count();
        self.advance(skip);
    }

    fn err(&self, message: impl Into<String>, span: Range<usize>) -> UserError {
        UserError::DslParse {
            message: message.into(),
            span,
        }
    }

    fn eof(&self) -> bool {
        self.pos >= self.text.len()
    }
}

/// Parses one `--generate PROG` payload (the text after `//`). `base` is
/// the byte offset of `text`'s first character within the full `-g`
/// argument string, so spans in the returned tree point into the original
/// argument for caret diagnostics.
pub fn parse_program(text: &str, base: usize) -> Result<Program, UserError> {
    let mut cur = Cursor { text, pos: 0, base };
    let program = parse_program_inner(&mut cur)?;
    cur.skip_ws();
    if !cur.eof() {
        let span = (cur.base + cur.pos)..(cur.base + cur.text.len());
        return Err(cur.err(
            format!("unexpected trailing text '{}'", cur.remaining()),
            span,
        ));
    }
    Ok(program)
}

fn parse_program_inner(cur: &mut Cursor) -> Result<Program, UserError> {
    let mut entries = Vec::new();
    cur.skip_ws();
    if cur.eof() || cur.peek() == Some(')') {
        return Ok(Program { entries });
    }
    loop {
        entries.push(parse_entry(cur)?);
        cur.skip_ws();
        if cur.peek() == Some(',') {
            cur.advance(1);
            cur.skip_ws();
            continue;
        }
        break;
    }
    Ok(Program { entries })
}

fn parse_entry(cur: &mut Cursor) -> Result<Entry, UserError> {
    let start = cur.pos;
    let name = parse_name(cur)?;
    let groups = if cur.peek() == Some('{') {
        cur.advance(1);
        let mut groups = Vec::new();
        cur.skip_ws();
        if cur.peek() != Some('}') {
            loop {
                groups.push(parse_rule_group(cur)?);
                cur.skip_ws();
                if cur.peek() == Some(',') {
                    cur.advance(1);
                    cur.skip_ws();
                    continue;
                }
                break;
            }
        }
        if cur.peek() != Some('}') {
            let span = (cur.base + start)..(cur.base + cur.pos);
            return Err(cur.err("expected '}' to close override entry", span));
        }
        cur.advance(1);
        groups
    } else {
        vec![parse_rule_group(cur)?]
    };
    Ok(Entry {
        name,
        groups,
        span: (cur.base + start)..(cur.base + cur.pos),
        matched_any_generator: Cell::new(false),
    })
}

fn parse_name(cur: &mut Cursor) -> Result<String, UserError> {
    let start = cur.pos;
    let len = cur
        .remaining()
        .bytes()
        .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
        .count();
    if len == 0 {
        let span = (cur.base + cur.pos)..(cur.base + cur.pos + 1);
        return Err(cur.err("expected a generator name", span));
    }
    cur.advance(len);
    Ok(cur.text[start..cur.pos].to_string())
}

fn parse_rule_group(cur: &mut Cursor) -> Result<RuleGroup, UserError> {
    let start = cur.pos;
    let mut members = vec![parse_rule_atom(cur)?];
    while cur.peek() == Some('&') {
        cur.advance(1);
        members.push(parse_rule_atom(cur)?);
    }
    let any_positive = members.iter().any(RuleAtom::is_positive);
    let scope = if any_positive && cur.peek() == Some('(') {
        cur.advance(1);
        let inner = parse_program_inner(cur)?;
        cur.skip_ws();
        if cur.peek() != Some(')') {
            let span = (cur.base + start)..(cur.base + cur.pos);
            return Err(cur.err("expected ')' to close scope", span));
        }
        cur.advance(1);
        Some(inner)
    } else {
        None
    };
    Ok(RuleGroup {
        members,
        scope,
        span: (cur.base + start)..(cur.base + cur.pos),
        was_used: Cell::new(false),
        max_index_seen: Cell::new(None),
    })
}

fn parse_rule_atom(cur: &mut Cursor) -> Result<RuleAtom, UserError> {
    if cur.starts_with("-=") {
        cur.advance(2);
        return Ok(RuleAtom::RemoveValue(parse_value(cur)));
    }
    if cur.starts_with("-#") {
        cur.advance(2);
        return Ok(RuleAtom::RemoveRange(parse_range(cur)?));
    }
    if cur.peek() == Some('=') {
        cur.advance(1);
        return Ok(RuleAtom::Custom(parse_value(cur)));
    }
    if cur.peek() == Some('#') {
        cur.advance(1);
        return Ok(RuleAtom::AcceptRange(parse_range(cur)?));
    }
    let span = (cur.base + cur.pos)..(cur.base + cur.pos + 1);
    Err(cur.err("expected a rule ('=', '-=', '#', or '-#')", span))
}

/// A `Value` terminates at the first *unquoted* `,`, `&`, or `(` — unlike
/// [`find_unprotected_separator`], `(` is itself a stop character here
/// (it opens the following `Scope`), not a bracket to skip over, so this
/// scans directly rather than delegating to that helper.
fn parse_value(cur: &mut Cursor) -> String {
    let rem = cur.remaining();
    let mut end = rem.len();
    scan(
        rem,
        |i, class| {
            if end != rem.len() || class != ByteClass::Normal {
                return;
            }
            if matches!(rem.as_bytes()[i], b',' | b'&' | b'(') {
                end = i;
            }
        },
        |_| {},
    );
    let trimmed_end = trim_trailing_whitespace(rem, end);
    let value = rem[..trimmed_end].trim_start().to_string();
    cur.advance(end);
    value
}

fn parse_opt_num(cur: &mut Cursor) -> Option<u64> {
    let rem = cur.remaining();
    let len = rem.bytes().take_while(|b| b.is_ascii_digit()).count();
    if len == 0 {
        return None;
    }
    let n: u64 = rem[..len].parse().ok()?;
    cur.advance(len);
    Some(n)
}

fn parse_range(cur: &mut Cursor) -> Result<IndexRange, UserError> {
    cur.skip_ws();
    let start_num = parse_opt_num(cur);
    let has_dots = cur.starts_with("..");
    if has_dots {
        cur.advance(2);
    }
    let end_num = if has_dots { parse_opt_num(cur) } else { None };

    if !has_dots {
        let span = (cur.base + cur.pos)..(cur.base + cur.pos + 1);
        let n = start_num.ok_or_else(|| cur.err("expected an index", span.clone()))?;
        if n == 0 {
            return Err(cur.err("indices are 1-based; 0 is not valid", span));
        }
        return Ok(IndexRange { start: n - 1, end: Some(n) });
    }

    let span = (cur.base + cur.pos)..(cur.base + cur.pos + 1);
    let start = match start_num {
        Some(0) => return Err(cur.err("indices are 1-based; 0 is not valid", span)),
        Some(n) => n - 1,
        None => 0,
    };
    Ok(IndexRange {
        start,
        end: end_num,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_custom_value_and_index_filter() {
        let program = parse_program("x{#1,=42},y-=a", 0).unwrap();
        assert_eq!(program.entries.len(), 2);
        assert_eq!(program.entries[0].name, "x");
        assert_eq!(program.entries[0].groups.len(), 2);
        assert_eq!(program.entries[1].name, "y");
        match &program.entries[1].groups[0].members[0] {
            RuleAtom::RemoveValue(v) => assert_eq!(v, "a"),
            other => panic!("unexpected rule: {other:?}"),
        }
    }

    #[test]
    fn parses_nested_scope() {
        let program = parse_program("x=1(y#2..5)", 0).unwrap();
        let group = &program.entries[0].groups[0];
        let scope = group.scope.as_ref().expect("scope");
        assert_eq!(scope.entries[0].name, "y");
        match &scope.entries[0].groups[0].members[0] {
            RuleAtom::AcceptRange(r) => assert_eq!(*r, IndexRange { start: 1, end: Some(5) }),
            other => panic!("unexpected rule: {other:?}"),
        }
    }

    #[test]
    fn rejects_scope_on_negative_only_group() {
        let err = parse_program("x-=1(y=2)", 0).unwrap_err();
        assert!(matches!(err, UserError::DslParse { .. }));
    }
}
