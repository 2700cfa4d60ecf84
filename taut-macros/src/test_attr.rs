//! Expansion of `#[taut::test]`.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{ItemFn, LitStr};

pub fn expand(attr: TokenStream, item: TokenStream) -> TokenStream {
    let input_fn: ItemFn = match syn::parse2(item) {
        Ok(f) => f,
        Err(e) => return e.to_compile_error(),
    };

    let fn_ident = &input_fn.sig.ident;
    let fn_name_str = fn_ident.to_string();

    let name_expr: TokenStream = if attr.is_empty() {
        quote! { #fn_name_str }
    } else {
        match syn::parse2::<LitStr>(attr) {
            Ok(lit) => quote! { #lit },
            Err(e) => return e.to_compile_error(),
        }
    };

    quote! {
        #input_fn

        ::taut::inventory::submit! {
            ::taut::registry::TestDecl {
                name: #name_expr,
                file: ::std::file!(),
                line: ::std::line!(),
                body: #fn_ident,
            }
        }
    }
}
