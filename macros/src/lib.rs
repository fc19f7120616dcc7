//! Derive macros for Effect Chain
//!
//! This crate provides procedural macros to reduce boilerplate when defining
//! actions.
//!
//! # Available Macros
//!
//! - `#[derive(Action)]` - Implements `effect_chain_core::Action`
//!
//! # Example
//!
//! ```ignore
//! use effect_chain_macros::Action;
//!
//! #[derive(Action, Debug)]
//! struct AddTodo {
//!     name: String,
//! }
//!
//! assert_eq!(AddTodo::tag(), "AddTodo");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use proc_macro::TokenStream;
use quote::quote;
use syn::{Attribute, DeriveInput, LitStr, parse_macro_input};

/// Derive macro for actions
///
/// Implements `effect_chain_core::Action` for a struct or enum. The tag is
/// the type's name; every value of the type shares it, so an enum gets a
/// single chain for all of its variants.
///
/// Generic parameters are not part of the tag. `Wrapped<u8>` and
/// `Wrapped<String>` route to the same chain, and a handler registered for
/// one fails with a type mismatch on the other. Give each instantiation its
/// own wrapper type if both need handlers.
///
/// # Attributes
///
/// - `#[action(name = "...")]` - Use a different tag
/// - `#[action(tag = "...")]` - Alias for `name`
///
/// # Panics
///
/// This macro will produce a compile error (not a runtime panic) if:
/// - Applied to a union
/// - The `action` attribute is malformed
///
/// # Example
///
/// ```ignore
/// #[derive(Action, Debug)]
/// #[action(name = "todo/add")]
/// struct AddTodo {
///     name: String,
/// }
///
/// #[derive(Action, Debug)]
/// enum Timer {
///     Start,
///     Stop { at: u64 },
/// }
///
/// assert_eq!(AddTodo::tag(), "todo/add");
/// assert_eq!(Timer::Start.type_name(), "Timer");
/// ```
#[proc_macro_derive(Action, attributes(action))]
pub fn derive_action(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    if let syn::Data::Union(_) = &input.data {
        return syn::Error::new_spanned(&input, "#[derive(Action)] cannot be used on unions")
            .to_compile_error()
            .into();
    }

    let tag = match tag_override(&input.attrs) {
        Ok(Some(tag)) => tag.value(),
        Ok(None) => name.to_string(),
        Err(error) => return error.to_compile_error().into(),
    };

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let expanded = quote! {
        impl #impl_generics ::effect_chain_core::Action for #name #ty_generics #where_clause {
            fn tag() -> &'static str {
                #tag
            }

            fn type_name(&self) -> &'static str {
                #tag
            }

            fn as_any(&self) -> &dyn ::core::any::Any {
                self
            }
        }
    };

    TokenStream::from(expanded)
}

/// The tag from `#[action(name = "...")]` (or its `tag` alias), if present
fn tag_override(attrs: &[Attribute]) -> syn::Result<Option<LitStr>> {
    let mut tag = None;
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("action")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") || meta.path.is_ident("tag") {
                let value: LitStr = meta.value()?.parse()?;
                if value.value().is_empty() {
                    return Err(meta.error("action tag cannot be empty"));
                }
                tag = Some(value);
                Ok(())
            } else {
                Err(meta.error("unsupported action attribute, expected `name = \"...\"`"))
            }
        })?;
    }
    Ok(tag)
}

#[cfg(test)]
mod tests {
    // Macro tests live in tests/ directory
}
