extern crate proc_macro;

use proc_macro::TokenStream;
use quote::quote;
use syn::*;

/// Implements `lazymod::IntoLoader` for a resolver type.
///
/// The module key is taken from `#[module_key("...")]` if present, and from the
/// type name otherwise.
#[proc_macro_derive(IntoLoader, attributes(module_key))]
pub fn derive_into_loader(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand_into_loader(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand_into_loader(input: &DeriveInput) -> Result<proc_macro2::TokenStream> {
    let name_ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let key = match module_key_attr(&input.attrs)? {
        Some(lit) => {
            if lit.value().is_empty() {
                return Err(Error::new(lit.span(), "module key must not be empty"));
            }
            lit.value()
        }
        None => name_ident.to_string(),
    };

    Ok(quote! {
        impl #impl_generics ::lazymod::IntoLoader for #name_ident #ty_generics #where_clause {
            fn module_key(&self) -> ::lazymod::ModuleKey {
                ::lazymod::ModuleKey::from_static(#key)
            }
        }
    })
}

fn module_key_attr(attrs: &[Attribute]) -> Result<Option<LitStr>> {
    let mut found = None;

    for attr in attrs.iter().filter(|attr| attr.path.is_ident("module_key")) {
        if found.is_some() {
            return Err(Error::new_spanned(attr, "duplicate `module_key` attribute"));
        }
        found = Some(attr.parse_args::<LitStr>()?);
    }

    Ok(found)
}
