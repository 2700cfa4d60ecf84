//! Walks the token stream of an assertion condition, reconstructing a
//! canonical source string and rewriting every `$[expr]` marker into a
//! runtime capture call.
//!
//! This is the "procedural macro that walks the expression AST at compile
//! time" strategy called out as preferred in the framework's design notes:
//! markers are found directly in the token tree (a bare `$` immediately
//! followed by a bracketed group), so there is no separate preprocessor pass
//! and no `__COUNTER__` round-trip through expanded source text.

use proc_macro2::{Delimiter, Spacing, TokenStream, TokenTree};
use quote::quote;

pub struct ArgSpec {
    pub ident_offset: u32,
    pub ident_len: u32,
    pub expr_offset: u32,
    pub expr_len: u32,
    pub need_bracket: bool,
    pub counter: u32,
}

pub struct Rendered {
    pub text: String,
    pub args: Vec<ArgSpec>,
    pub rewritten: TokenStream,
}

pub fn render_assertion(input: TokenStream) -> Rendered {
    let mut text = String::new();
    let mut args = Vec::new();
    let mut counter: u32 = 0;
    let mut spacing = Spacer::default();
    let rewritten = walk(input, &mut text, &mut args, &mut counter, &mut spacing);
    Rendered {
        text,
        args,
        rewritten,
    }
}

/// Tracks just enough state to decide whether the next rendered token needs
/// a leading space. Not a general-purpose pretty-printer: good enough for a
/// stable, readable diagram label, not for re-parseable output.
#[derive(Default)]
struct Spacer {
    last_joint: bool,
    prev_is_open_or_empty: bool,
    prev_is_ident_or_close: bool,
}

impl Spacer {
    fn push(&mut self, text: &mut String, s: &str) {
        let no_space = text.is_empty()
            || self.last_joint
            || self.prev_is_open_or_empty
            || matches!(s, ")" | "]" | "}" | "," | ";" | ".");
        if !no_space {
            text.push(' ');
        }
        text.push_str(s);
        self.last_joint = false;
        self.prev_is_open_or_empty = false;
    }

    fn push_open(&mut self, text: &mut String, s: &str) {
        let no_space = text.is_empty() || self.last_joint || self.prev_is_ident_or_close;
        if !no_space {
            text.push(' ');
        }
        text.push_str(s);
        self.last_joint = false;
        self.prev_is_open_or_empty = true;
        self.prev_is_ident_or_close = false;
    }
}

fn is_multi_token(inner: &TokenStream) -> bool {
    let mut iter = inner.clone().into_iter();
    match (iter.next(), iter.next()) {
        (Some(TokenTree::Ident(_)), None) => false,
        (Some(TokenTree::Literal(_)), None) => false,
        (Some(_), None) => true,
        _ => true,
    }
}

fn walk(
    tokens: TokenStream,
    text: &mut String,
    args: &mut Vec<ArgSpec>,
    counter: &mut u32,
    sp: &mut Spacer,
) -> TokenStream {
    let mut out = Vec::new();
    let mut iter = tokens.into_iter().peekable();

    while let Some(tt) = iter.next() {
        match tt {
            TokenTree::Punct(ref p) if p.as_char() == '$' => {
                let is_marker = matches!(
                    iter.peek(),
                    Some(TokenTree::Group(g)) if g.delimiter() == Delimiter::Bracket
                );
                if is_marker {
                    let group = match iter.next() {
                        Some(TokenTree::Group(g)) => g,
                        _ => unreachable!(),
                    };
                    let inner_tokens = group.stream();
                    let need_bracket = is_multi_token(&inner_tokens);

                    sp.prev_is_open_or_empty = !text.is_empty() && sp.last_joint;
                    let expr_offset = text.len() as u32;
                    let inner_rewritten = walk(inner_tokens, text, args, counter, sp);
                    let expr_len = text.len() as u32 - expr_offset;

                    let my_counter = *counter;
                    *counter += 1;
                    args.push(ArgSpec {
                        ident_offset: expr_offset,
                        ident_len: expr_len,
                        expr_offset,
                        expr_len,
                        need_bracket,
                        counter: my_counter,
                    });

                    let capture = quote! {
                        ::taut::assertion::capture(#my_counter, || { #inner_rewritten })
                    };
                    out.push(TokenTree::Group(proc_macro2::Group::new(
                        Delimiter::None,
                        capture,
                    )));
                    sp.last_joint = false;
                    sp.prev_is_ident_or_close = true;
                    continue;
                }
                sp.push(text, "$");
                out.push(tt);
            }
            TokenTree::Group(g) => {
                let (open, close) = match g.delimiter() {
                    Delimiter::Parenthesis => ("(", ")"),
                    Delimiter::Bracket => ("[", "]"),
                    Delimiter::Brace => ("{", "}"),
                    Delimiter::None => ("", ""),
                };
                if !open.is_empty() {
                    sp.push_open(text, open);
                }
                let inner = walk(g.stream(), text, args, counter, sp);
                if !close.is_empty() {
                    sp.push(text, close);
                }
                sp.prev_is_ident_or_close = !close.is_empty() || matches!(g.delimiter(), Delimiter::None);
                let mut new_group = proc_macro2::Group::new(g.delimiter(), inner);
                new_group.set_span(g.span());
                out.push(TokenTree::Group(new_group));
            }
            TokenTree::Ident(ref id) => {
                let s = id.to_string();
                sp.push(text, &s);
                sp.prev_is_ident_or_close = true;
                out.push(tt.clone());
            }
            TokenTree::Literal(ref l) => {
                let s = l.to_string();
                sp.push(text, &s);
                sp.prev_is_ident_or_close = true;
                out.push(tt.clone());
            }
            TokenTree::Punct(ref p) => {
                let s = p.as_char().to_string();
                sp.push(text, &s);
                sp.last_joint = p.spacing() == Spacing::Joint;
                sp.prev_is_ident_or_close = false;
                out.push(tt.clone());
            }
        }
    }

    out.into_iter().collect()
}

/// Splits the macro's input at the first top-level comma (not inside any
/// group), separating the boolean condition from an optional trailing
/// message expression.
pub fn split_condition_and_message(input: TokenStream) -> (TokenStream, Option<TokenStream>) {
    let tokens: Vec<TokenTree> = input.into_iter().collect();
    for (i, tt) in tokens.iter().enumerate() {
        if let TokenTree::Punct(p) = tt
            && p.as_char() == ','
        {
            let cond: TokenStream = tokens[..i].iter().cloned().collect();
            let msg: TokenStream = tokens[i + 1..].iter().cloned().collect();
            return (cond, Some(msg));
        }
    }
    (tokens.into_iter().collect(), None)
}
