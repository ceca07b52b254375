use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    Attribute, Data, DeriveInput, Expr, Fields, GenericArgument, Ident, Lit, PathArguments, Type,
};

use crate::{directive_string, to_pascal_case};

const SCALARS: &[&str] = &[
    "bool", "char", "i8", "i16", "i32", "i64", "i128", "isize", "u8", "u16", "u32", "u64", "u128",
    "usize", "f32", "f64", "String",
];

enum Kind {
    Scalar,
    Bytes,
    Optional,
    Record,
    Collection(String),
}

struct FieldInfo {
    index: usize,
    name: Ident,
    ty: Type,
    ident: String,
    rust_type: String,
    value_type: String,
    kind: Kind,
    directives: String,
}

impl FieldInfo {
    const fn is_column(&self) -> bool {
        !matches!(self.kind, Kind::Collection(_))
    }
}

pub fn derive_entity_impl(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Entity derive does not support generic structs",
        ));
    }
    let table_name = get_table_name(&input.attrs)?;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Entity derive only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Entity derive only supports structs",
            ));
        }
    };

    let mut infos = Vec::new();
    for (index, field) in fields.iter().enumerate() {
        let Some(name) = field.ident.clone() else {
            return Err(syn::Error::new_spanned(field, "unnamed field"));
        };
        let (kind, value_type) = classify(&field.ty)?;
        let plain = name.to_string().trim_start_matches("r#").to_string();
        let ty = &field.ty;
        infos.push(FieldInfo {
            index,
            ident: to_pascal_case(&plain),
            rust_type: quote!(#ty).to_string().replace(' ', ""),
            value_type,
            kind,
            directives: directive_string(&field.attrs)?,
            ty: field.ty.clone(),
            name,
        });
    }

    let vis = &input.vis;
    let columns_name = format_ident!("{}Columns", struct_name);
    let type_name = struct_name.to_string();
    let table_name_tokens = match &table_name {
        Some(name) => quote! { ::core::option::Option::Some(#name) },
        None => quote! { ::core::option::Option::None },
    };

    let shape_entries = infos.iter().map(|info| {
        let ident = &info.ident;
        let rust_type = &info.rust_type;
        let value_type = &info.value_type;
        let directives = &info.directives;
        let kind = match &info.kind {
            Kind::Scalar => quote! { ::ferrent_core::FieldKind::Scalar },
            Kind::Bytes => quote! { ::ferrent_core::FieldKind::Bytes },
            Kind::Optional => quote! { ::ferrent_core::FieldKind::Optional },
            Kind::Record => quote! { ::ferrent_core::FieldKind::Record },
            Kind::Collection(of) => quote! { ::ferrent_core::FieldKind::Collection { of: #of } },
        };
        quote! {
            ::ferrent_core::FieldShape {
                ident: #ident,
                rust_type: #rust_type,
                value_type: #value_type,
                kind: #kind,
                directives: #directives,
            }
        }
    });

    let columns: Vec<&FieldInfo> = infos.iter().filter(|i| i.is_column()).collect();

    let column_fields = columns.iter().map(|info| {
        let name = &info.name;
        let ty = &info.ty;
        quote! {
            pub #name: ::ferrent_core::Col<#ty>
        }
    });

    let column_inits = columns.iter().map(|info| {
        let name = &info.name;
        let index = u32::try_from(info.index).unwrap_or(u32::MAX);
        quote! {
            #name: ::ferrent_core::Col::new(table.field(#index))
        }
    });

    let value_arms = columns.iter().map(|info| {
        let name = &info.name;
        let index = info.index;
        quote! {
            #index => ::core::option::Option::Some(::ferrent_core::FieldValue::to_value(&self.#name))
        }
    });

    let zero_arms = infos.iter().map(|info| {
        let name = &info.name;
        let index = info.index;
        if info.is_column() {
            quote! { #index => ::ferrent_core::FieldValue::is_zero(&self.#name) }
        } else {
            quote! { #index => self.#name.is_empty() }
        }
    });

    let set_arms = columns.iter().map(|info| {
        let name = &info.name;
        let index = info.index;
        quote! {
            #index => {
                self.#name = ::ferrent_core::FieldValue::from_value(value)?;
                ::core::result::Result::Ok(())
            }
        }
    });

    let row_inits = infos.iter().map(|info| {
        let name = &info.name;
        let index = info.index;
        if info.is_column() {
            quote! { #name: row.take(#index)? }
        } else {
            quote! { #name: ::core::default::Default::default() }
        }
    });

    let columns_doc = format!("Typed column tokens of [`{struct_name}`].");

    let expanded = quote! {
        #[doc = #columns_doc]
        #[derive(Debug, Clone, Copy)]
        #vis struct #columns_name {
            #(#column_fields,)*
        }

        impl ::ferrent_core::Entity for #struct_name {
            type Columns = #columns_name;

            fn shape() -> &'static ::ferrent_core::EntityShape {
                static SHAPE: ::ferrent_core::EntityShape = ::ferrent_core::EntityShape {
                    type_name: #type_name,
                    table_name: #table_name_tokens,
                    fields: &[#(#shape_entries),*],
                };
                &SHAPE
            }

            fn columns(table: ::ferrent_core::TableToken) -> Self::Columns {
                #columns_name {
                    #(#column_inits,)*
                }
            }

            fn field_value(&self, index: usize) -> ::core::option::Option<::ferrent_core::SqlValue> {
                match index {
                    #(#value_arms,)*
                    _ => ::core::option::Option::None,
                }
            }

            fn field_is_zero(&self, index: usize) -> bool {
                match index {
                    #(#zero_arms,)*
                    _ => true,
                }
            }

            fn set_field_value(
                &mut self,
                index: usize,
                value: ::ferrent_core::SqlValue,
            ) -> ::core::result::Result<(), ::ferrent_core::ValueError> {
                match index {
                    #(#set_arms)*
                    _ => ::core::result::Result::Err(::ferrent_core::ValueError::UnknownField {
                        entity: #type_name,
                        index,
                    }),
                }
            }

            fn from_row(
                row: &mut ::ferrent_core::RowValues,
            ) -> ::core::result::Result<Self, ::ferrent_core::ValueError> {
                ::core::result::Result::Ok(Self {
                    #(#row_inits,)*
                })
            }
        }
    };

    Ok(expanded)
}

fn get_table_name(attrs: &[Attribute]) -> syn::Result<Option<String>> {
    let mut table_name = None;
    for attr in attrs {
        if attr.path().is_ident("orm") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("table") {
                    let value: Expr = meta.value()?.parse()?;
                    if let Expr::Lit(lit) = value {
                        if let Lit::Str(s) = lit.lit {
                            table_name = Some(s.value());
                            return Ok(());
                        }
                    }
                    return Err(meta.error("expected a string literal"));
                }
                Err(meta.error("unsupported orm attribute"))
            })?;
        }
    }
    Ok(table_name)
}

fn last_segment(ty: &Type) -> Option<&syn::PathSegment> {
    match ty {
        Type::Path(path) if path.qself.is_none() => path.path.segments.last(),
        _ => None,
    }
}

fn single_type_argument(segment: &syn::PathSegment) -> Option<&Type> {
    match &segment.arguments {
        PathArguments::AngleBracketed(args) if args.args.len() == 1 => match args.args.first() {
            Some(GenericArgument::Type(ty)) => Some(ty),
            _ => None,
        },
        _ => None,
    }
}

fn type_text(ty: &Type) -> String {
    quote!(#ty).to_string().replace(' ', "")
}

/// Maps a field type to its kind and its value type text.
fn classify(ty: &Type) -> syn::Result<(Kind, String)> {
    let Some(segment) = last_segment(ty) else {
        return Err(syn::Error::new_spanned(
            ty,
            "Entity fields must be named types (primitives, String, Option<T>, Vec<T> or a value type)",
        ));
    };
    let name = segment.ident.to_string();
    match name.as_str() {
        "Option" => {
            let inner = single_type_argument(segment)
                .ok_or_else(|| syn::Error::new_spanned(ty, "Option needs one type argument"))?;
            Ok((Kind::Optional, type_text(inner)))
        }
        "Vec" => {
            let inner = single_type_argument(segment)
                .ok_or_else(|| syn::Error::new_spanned(ty, "Vec needs one type argument"))?;
            let inner_name = last_segment(inner)
                .map(|s| s.ident.to_string())
                .ok_or_else(|| syn::Error::new_spanned(inner, "unsupported collection element"))?;
            if inner_name == "u8" {
                Ok((Kind::Bytes, type_text(ty)))
            } else {
                Ok((Kind::Collection(inner_name), type_text(ty)))
            }
        }
        _ if SCALARS.contains(&name.as_str()) => Ok((Kind::Scalar, type_text(ty))),
        _ => Ok((Kind::Record, type_text(ty))),
    }
}
