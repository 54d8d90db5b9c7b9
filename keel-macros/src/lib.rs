mod decode_column;
mod decode_table;
mod from_row_trait;

use decode_column::decode_column;
use decode_table::decode_table;
use from_row_trait::from_row_trait;
use proc_macro::TokenStream;
use quote::quote;
use syn::{Fields, ItemStruct, parse_macro_input};

fn some_str(value: &Option<String>) -> proc_macro2::TokenStream {
    match value {
        Some(v) => quote!(::std::option::Option::Some(#v)),
        None => quote!(::std::option::Option::None),
    }
}

/// Maps a struct with named fields to a table.
///
/// ```ignore
/// #[derive(Entity)]
/// #[keel(table = "books b")]
/// struct Book {
///     #[keel(primary)]
///     id: Uuid,
///     title: String,
///     #[keel(column = "author_name")]
///     author: String,
///     #[keel(query = "(SELECT count(*) FROM reviews r WHERE r.book_id = b.id)")]
///     reviews: i64,
///     #[keel(ignore)]
///     cached: Option<String>,
/// }
/// ```
///
/// The annotations are only captured here, they are validated the first time
/// the mapping is used (or by `keel::register`).
#[proc_macro_derive(Entity, attributes(keel))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let item: ItemStruct = parse_macro_input!(input as ItemStruct);
    let Fields::Named(..) = item.fields else {
        panic!("Entity can only be derived for structs with named fields");
    };
    let name = &item.ident;
    let (impl_generics, ty_generics, where_clause) = item.generics.split_for_impl();
    let entity = name.to_string();
    let table = some_str(&decode_table(&item));
    let fields: Vec<_> = item.fields.iter().map(decode_column).collect();
    let field_tags = fields.iter().map(|f| {
        let field = f.ident.to_string();
        let table = some_str(&f.table);
        let column = some_str(&f.column);
        let query = some_str(&f.query);
        let primary = some_str(&f.primary);
        quote! {
            ::keel::FieldTags {
                field: #field,
                table: #table,
                column: #column,
                query: #query,
                primary: #primary,
            }
        }
    });
    let values = fields.iter().filter(|f| !f.is_skipped()).map(|f| {
        let ident = &f.ident;
        quote!(::keel::AsValue::as_value(::std::clone::Clone::clone(&self.#ident)))
    });
    let from_row = from_row_trait(&item, &fields);
    quote! {
        #from_row
        impl #impl_generics ::keel::Entity for #name #ty_generics #where_clause {
            fn tags() -> &'static ::keel::EntityTags {
                static TAGS: ::keel::EntityTags = ::keel::EntityTags {
                    entity: #entity,
                    table: #table,
                    fields: &[#(#field_tags),*],
                };
                &TAGS
            }

            fn row(&self) -> ::std::vec::Vec<::keel::Value> {
                ::std::vec![#(#values),*]
            }
        }
    }
    .into()
}
