//! This crate defines two derive macros for types that live on
//! persistent memory:
//! - `PmSafe`, which marks a `repr(C)` struct without padding as safe to
//!   copy to and from PM as raw bytes.
//! - `ListNode`, which makes a struct linkable into a persistent
//!   singly-linked list by naming the field that holds its next offset.
//! The macros themselves are documented in pmsafe_macros.rs.

extern crate proc_macro;
use proc_macro::TokenStream;

use crate::pmsafe_macros::*;

mod pmsafe_macros;

#[proc_macro_derive(PmSafe)]
pub fn derive_pmsafe(input: TokenStream) -> TokenStream {
    let ast: syn::DeriveInput = match syn::parse(input) {
        Ok(ast) => ast,
        Err(e) => return e.to_compile_error().into(),
    };
    generate_pmsafe(&ast).into()
}

#[proc_macro_derive(ListNode, attributes(list_next))]
pub fn derive_list_node(input: TokenStream) -> TokenStream {
    let ast: syn::DeriveInput = match syn::parse(input) {
        Ok(ast) => ast,
        Err(e) => return e.to_compile_error().into(),
    };
    generate_list_node(&ast).into()
}
