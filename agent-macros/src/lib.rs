use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, DeriveInput, Expr, Lit, LitStr, Meta};

/// Derives `EventKind` for an event payload struct, reading the event's wire
/// type name from `#[event_type = "..."]` and emitting `EVENT_TYPE` plus an
/// `EventKind::event_type()` impl. Saves every variant from repeating the
/// same `const EVENT_TYPE: &str` boilerplate the event registry relies on.
#[proc_macro_derive(EventKind, attributes(event_type))]
pub fn derive_event_kind(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = input.ident;

    let mut event_type: Option<LitStr> = None;
    for attr in &input.attrs {
        if !attr.path().is_ident("event_type") {
            continue;
        }
        // Usage is the name-value form `#[event_type = "chat"]`, not the
        // list form `#[event_type("chat")]`.
        if let Meta::NameValue(nv) = &attr.meta {
            if let Expr::Lit(expr_lit) = &nv.value {
                if let Lit::Str(lit) = &expr_lit.lit {
                    event_type = Some(lit.clone());
                }
            }
        }
    }

    let event_type = match event_type {
        Some(lit) => lit,
        None => {
            return syn::Error::new_spanned(
                name,
                "EventKind requires #[event_type = \"...\"]",
            )
            .to_compile_error()
            .into()
        }
    };

    let expanded = quote! {
        impl #name {
            pub const EVENT_TYPE: &'static str = #event_type;
        }

        impl crate::events::EventKind for #name {
            fn event_type(&self) -> &'static str {
                #event_type
            }
        }
    };

    expanded.into()
}
