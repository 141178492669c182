//! This file contains the implementation of the derive macros for
//! PmSafe and ListNode. The PmSafe implementation is TRUSTED: the
//! generated `unsafe impl` is only sound because of the checks performed
//! here, so it must be manually audited.

use proc_macro2::{TokenStream, TokenTree};
use quote::{quote, quote_spanned};
use syn::{self, spanned::Spanned};

// The PmSafe derive macro checks that the deriving type is repr(C), that
// every field is itself PmSafe, and that the struct has no padding. The
// field requirement is expressed as trivial trait bounds on the generated
// unsafe impl. For example, for the following type:
// ```
// #[repr(C)]
// struct Foo {
//      val1: u64,
//      val2: Offset,
// }
// ```
// the generated code looks like:
// ```
// unsafe impl PmSafe for Foo
//      where u64: PmSafe, Offset: PmSafe {}
// const PADDING_CHECK_FOO: usize = (size_of::<Foo>() == 0 + size_of::<u64>() + size_of::<Offset>()) as usize - 1;
// ```
// Compilation fails if any field type is not PmSafe (e.g. `*const u8`), and
// the padding check underflows at compile time if the compiler inserted
// padding bytes, which would otherwise be uninitialized when the struct is
// viewed as a byte slice.
pub fn generate_pmsafe(ast: &syn::DeriveInput) -> TokenStream {
    let name = &ast.ident;

    if let Err(e) = check_repr_c(name, &ast.attrs) {
        return e;
    }
    if let Err(e) = check_no_generics(name, &ast.generics, "PmSafe") {
        return e;
    }

    let fields = match get_named_fields(name, &ast.data, "PmSafe") {
        Ok(fields) => fields,
        Err(e) => return e,
    };
    let types: Vec<&syn::Type> = fields.iter().map(|f| &f.ty).collect();

    // The constant must be a standalone item rather than an associated
    // constant, otherwise the compiler never evaluates it.
    let padding_check = syn::Ident::new(
        &format!("PADDING_CHECK_{}", name.to_string().to_uppercase()),
        name.span(),
    );

    quote! {
        unsafe impl PmSafe for #name
            where
            #( #types: PmSafe, )*
        {}

        #[allow(dead_code)]
        const #padding_check: usize = (::core::mem::size_of::<#name>()
            == 0 #( + ::core::mem::size_of::<#types>() )*) as usize - 1;
    }
}

// The ListNode derive macro requires exactly one field annotated with
// `#[list_next]`. It generates the byte position of that field (so the
// list can overwrite just the link on PM) and accessors for it.
// The annotated field must have type `Offset`; a field of any other
// type fails to compile in the generated accessors.
pub fn generate_list_node(ast: &syn::DeriveInput) -> TokenStream {
    let name = &ast.ident;

    if let Err(e) = check_repr_c(name, &ast.attrs) {
        return e;
    }
    if let Err(e) = check_no_generics(name, &ast.generics, "ListNode") {
        return e;
    }

    let fields = match get_named_fields(name, &ast.data, "ListNode") {
        Ok(fields) => fields,
        Err(e) => return e,
    };

    let mut next_fields = fields
        .iter()
        .filter(|f| f.attrs.iter().any(|a| a.path().is_ident("list_next")));
    let next_field = match (next_fields.next(), next_fields.next()) {
        (Some(field), None) => field,
        (None, _) => {
            return quote_spanned! {
                name.span() =>
                compile_error!("ListNode requires one field marked #[list_next]");
            }
        }
        (Some(_), Some(extra)) => {
            return quote_spanned! {
                extra.span() =>
                compile_error!("ListNode allows only one field marked #[list_next]");
            }
        }
    };
    // Named fields always carry an ident.
    let next_ident = match &next_field.ident {
        Some(ident) => ident,
        None => return quote! {},
    };

    quote! {
        impl ListNode for #name {
            const NEXT_FIELD_OFFSET: u64 = ::core::mem::offset_of!(#name, #next_ident) as u64;

            fn next(&self) -> Offset {
                self.#next_ident
            }

            fn set_next(&mut self, next: Offset) {
                self.#next_ident = next;
            }
        }
    }
}

// This function checks whether the struct has the repr(C) attribute so that we can
// trigger a compiler error if it doesn't. The repr(C) attribute ensures that the
// structure has a consistent layout in memory, which is necessary for a value
// written by one process to be read back by another.
fn check_repr_c(name: &syn::Ident, attrs: &[syn::Attribute]) -> Result<(), TokenStream> {
    for attr in attrs {
        if let syn::Meta::List(list) = &attr.meta {
            if list.path.is_ident("repr") {
                for token in list.tokens.clone() {
                    if let TokenTree::Ident(ident) = token {
                        if ident == "C" {
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
    Err(quote_spanned! {
        name.span() =>
        compile_error!("this derive can only be used on types with repr(C)");
    })
}

fn check_no_generics(
    name: &syn::Ident,
    generics: &syn::Generics,
    derive: &str,
) -> Result<(), TokenStream> {
    if generics.params.is_empty() {
        Ok(())
    } else {
        let msg = format!("{} cannot be derived for generic types", derive);
        Err(quote_spanned! {
            name.span() =>
            compile_error!(#msg);
        })
    }
}

fn get_named_fields<'a>(
    name: &'a syn::Ident,
    data: &'a syn::Data,
    derive: &str,
) -> Result<Vec<&'a syn::Field>, TokenStream> {
    match data {
        syn::Data::Struct(data) => match &data.fields {
            syn::Fields::Named(fields) => Ok(fields.named.iter().collect()),
            _ => {
                let msg = format!("{} can only be derived for structs with named fields", derive);
                Err(quote_spanned! {
                    name.span() =>
                    compile_error!(#msg);
                })
            }
        },
        _ => {
            let msg = format!("{} can only be derived for structs", derive);
            Err(quote_spanned! {
                name.span() =>
                compile_error!(#msg);
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn repr_c_is_required() {
        let plain: syn::DeriveInput = parse_quote! {
            struct Plain { next: Offset }
        };
        let out = generate_pmsafe(&plain).to_string();
        assert!(out.contains("compile_error"));
        assert!(!out.contains("unsafe impl"));

        let packed: syn::DeriveInput = parse_quote! {
            #[repr(C, align(8))]
            struct Packed { next: Offset }
        };
        assert!(check_repr_c(&packed.ident, &packed.attrs).is_ok());
    }

    #[test]
    fn pmsafe_bounds_every_field() {
        let node: syn::DeriveInput = parse_quote! {
            #[repr(C)]
            struct Node { value: u64, next: Offset }
        };
        let out = generate_pmsafe(&node).to_string();
        assert!(out.contains("PADDING_CHECK_NODE"));
        assert!(out.contains("u64 : PmSafe"));
        assert!(out.contains("Offset : PmSafe"));
    }

    #[test]
    fn list_node_needs_exactly_one_link() {
        let none: syn::DeriveInput = parse_quote! {
            #[repr(C)]
            struct NoLink { next: Offset }
        };
        assert!(generate_list_node(&none).to_string().contains("requires one field"));

        let two: syn::DeriveInput = parse_quote! {
            #[repr(C)]
            struct TwoLinks {
                #[list_next]
                a: Offset,
                #[list_next]
                b: Offset,
            }
        };
        assert!(generate_list_node(&two).to_string().contains("only one field"));
    }

    #[test]
    fn generic_structs_are_rejected() {
        let generic: syn::DeriveInput = parse_quote! {
            #[repr(C)]
            struct Wrapper<T> { inner: T }
        };
        assert!(generate_pmsafe(&generic)
            .to_string()
            .contains("cannot be derived for generic types"));
    }
}
