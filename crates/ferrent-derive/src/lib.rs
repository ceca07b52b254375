//! Derive macros for ferrent entities and schemas.
//!
//! - `#[derive(Entity)]` emits the static shape of a record type, a
//!   `{Struct}Columns` struct of typed column tokens and the field access
//!   used by statement builders.
//! - `#[derive(Schema)]` wires a database root (or a schema group) made of
//!   `Table<E>` fields and nested schema groups.

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

mod entity;
mod schema;

/// Derives `ferrent_core::Entity`.
///
/// # Attributes
///
/// - `#[orm(table = "name")]` on the struct overrides the table name
///   (defaults to the pluralized snake case of the struct name).
/// - `#[orm("pk;not_incr;default:0")]` on a field carries directives.
///
/// # Field kinds
///
/// - primitives and `String`: columns that may be foreign keys,
/// - `Option<T>`: nullable columns,
/// - `Vec<u8>`: a blob column,
/// - `Vec<E>`: the many side of a relation, no column,
/// - any other type: a single column (must implement `FieldValue`).
///
/// # Generated items
///
/// For `Animal`, an `AnimalColumns` struct with one `Col<T>` per column
/// field, reachable through `Table<Animal>`.
#[proc_macro_derive(Entity, attributes(orm))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    entity::derive_entity_impl(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Derives `ferrent_core::Schema` for a database root or schema group.
///
/// Every field is either a `Table<E>` or a nested group. A nested group is
/// marked with `#[orm("schema")]` or has a type name ending in `Schema`;
/// its tables live in the namespace named after the snake-cased type name.
#[proc_macro_derive(Schema, attributes(orm))]
pub fn derive_schema(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    schema::derive_schema_impl(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

pub(crate) fn to_snake_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::new();
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            if i > 0
                && (chars[i - 1].is_lowercase() || chars.get(i + 1).is_some_and(|n| n.is_lowercase()))
            {
                result.push('_');
            }
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}

pub(crate) fn to_pascal_case(s: &str) -> String {
    let mut result = String::new();
    let mut capitalize_next = true;
    for c in s.chars() {
        if c == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            result.push(c.to_ascii_uppercase());
            capitalize_next = false;
        } else {
            result.push(c);
        }
    }
    result
}

/// Collects the directive strings of `#[orm("...")]` attributes, joined
/// with `;`.
pub(crate) fn directive_string(attrs: &[syn::Attribute]) -> syn::Result<String> {
    let mut parts = Vec::new();
    for attr in attrs {
        if attr.path().is_ident("orm") {
            let lit: syn::LitStr = attr.parse_args()?;
            parts.push(lit.value());
        }
    }
    Ok(parts.join(";"))
}
