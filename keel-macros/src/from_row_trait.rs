use crate::decode_column::FieldMetadata;
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::ItemStruct;

/// `FromRow` matching result labels to column names case-insensitively.
///
/// Every mapped column must be present exactly once and no other label is
/// accepted. Skipped fields take their `Default`.
pub(crate) fn from_row_trait(item: &ItemStruct, fields: &[FieldMetadata]) -> TokenStream {
    let name = &item.ident;
    let (impl_generics, ty_generics, where_clause) = item.generics.split_for_impl();
    let mapped: Vec<_> = fields.iter().filter(|f| !f.is_skipped()).collect();
    let holders = mapped.iter().map(|f| format_ident!("__{}", f.ident)).collect::<Vec<_>>();
    let declarations = mapped.iter().zip(&holders).map(|(f, holder)| {
        let ty = &f.ty;
        quote!(let mut #holder: ::std::option::Option<#ty> = None;)
    });
    let assignments = mapped.iter().zip(&holders).map(|(f, holder)| {
        let ty = &f.ty;
        let column = f.name();
        quote! {
            if __label__.eq_ignore_ascii_case(#column) {
                if #holder.is_some() {
                    return Err(::keel::Error::decode::<Self>(::std::format!(
                        "column `{}` appears more than once in the row",
                        #column
                    )));
                }
                #holder = Some(
                    <#ty as ::keel::AsValue>::try_from_value(__value__).map_err(|e| {
                        ::keel::Error::decode::<Self>(::std::format!("column `{}`: {}", #column, e))
                    })?,
                );
            } else
        }
    });
    let initializers = fields.iter().map(|f| {
        let ident = &f.ident;
        if f.is_skipped() {
            return quote!(#ident: ::std::default::Default::default());
        }
        let holder = format_ident!("__{}", ident);
        let column = f.name();
        quote! {
            #ident: #holder.ok_or_else(|| ::keel::Error::decode::<Self>(::std::format!(
                "column `{}` is missing from the row",
                #column
            )))?
        }
    });
    quote! {
        impl #impl_generics ::keel::FromRow for #name #ty_generics #where_clause {
            fn from_row(row: ::keel::RowLabeled) -> ::keel::Result<Self> {
                #(#declarations)*
                for (__label__, __value__) in ::std::iter::zip(row.labels.iter(), row.values.into_vec()) {
                    #(#assignments)* {
                        return Err(::keel::Error::decode::<Self>(::std::format!(
                            "unexpected column `{}` in the row",
                            __label__
                        )));
                    }
                }
                Ok(Self {
                    #(#initializers,)*
                })
            }
        }
    }
}
