//! Procedural macros backing `taut`'s assertion expression decomposition.
//!
//! Two things need compile-time help that the runtime crate cannot provide
//! on its own:
//!
//! - `check!`/`require!` need the raw source text of their condition and the
//!   byte span of every `$[expr]` marker within it, so the failure
//!   diagrammer can draw values under the right tokens.
//! - `#[taut::test]` needs to register the annotated function with the
//!   global test registry without relying on any particular static
//!   initialization order.

mod render;
mod test_attr;

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;

use render::{render_assertion, split_condition_and_message};

#[proc_macro]
pub fn check(input: TokenStream) -> TokenStream {
    expand_assertion(input.into(), false).into()
}

#[proc_macro]
pub fn require(input: TokenStream) -> TokenStream {
    expand_assertion(input.into(), true).into()
}

fn expand_assertion(input: TokenStream2, hard: bool) -> TokenStream2 {
    let (cond, message) = split_condition_and_message(input);
    let rendered = render_assertion(cond);

    let text = &rendered.text;
    let arg_entries: Vec<TokenStream2> = rendered
        .args
        .iter()
        .map(|a| {
            let ident_offset = a.ident_offset;
            let ident_len = a.ident_len;
            let expr_offset = a.expr_offset;
            let expr_len = a.expr_len;
            let need_bracket = a.need_bracket;
            let counter = a.counter;
            quote! {
                ::taut::assertion::ArgInfo {
                    ident_offset: #ident_offset,
                    ident_len: #ident_len,
                    expr_offset: #expr_offset,
                    expr_len: #expr_len,
                    need_bracket: #need_bracket,
                    counter: #counter,
                }
            }
        })
        .collect();

    let rewritten = rendered.rewritten;
    let flags = if hard {
        quote! { ::taut::assertion::Flags::HARD }
    } else {
        quote! { ::taut::assertion::Flags::SOFT }
    };

    let message_expr = match message {
        Some(tokens) => quote! { ::std::option::Option::Some(move || ::std::string::ToString::to_string(&{ #tokens })) },
        None => quote! { ::std::option::Option::None::<fn() -> ::std::string::String> },
    };

    quote! {
        {
            static __TAUT_META: ::taut::assertion::AssertionMeta = ::taut::assertion::AssertionMeta {
                text: #text,
                args: &[ #(#arg_entries),* ],
                file: ::std::file!(),
                line: ::std::line!(),
            };
            let __taut_assertion = ::taut::assertion::Assertion::begin(&__TAUT_META, #flags);
            let __taut_result = { #rewritten };
            __taut_assertion.finish(__taut_result, #message_expr)
        }
    }
}

#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
    test_attr::expand(attr.into(), item.into()).into()
}
