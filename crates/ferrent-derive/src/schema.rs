use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Type};

use crate::{directive_string, to_snake_case};

struct Member {
    name: syn::Ident,
    ty: Type,
    namespace: Option<String>,
}

fn type_name(ty: &Type) -> Option<String> {
    match ty {
        Type::Path(path) => path.path.segments.last().map(|s| s.ident.to_string()),
        _ => None,
    }
}

pub fn derive_schema_impl(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Schema derive only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Schema derive only supports structs",
            ));
        }
    };

    let mut members = Vec::new();
    for field in fields {
        let Some(name) = field.ident.clone() else {
            return Err(syn::Error::new_spanned(field, "unnamed field"));
        };
        let directives = directive_string(&field.attrs)?;
        let ty_name = type_name(&field.ty)
            .ok_or_else(|| syn::Error::new_spanned(&field.ty, "expected Table<E> or a schema group"))?;
        let nested = directives.split(';').any(|d| d.trim() == "schema") || ty_name.ends_with("Schema");
        members.push(Member {
            name,
            ty: field.ty.clone(),
            namespace: nested.then(|| to_snake_case(&ty_name)),
        });
    }

    let declares = members.iter().map(|member| {
        let ty = &member.ty;
        match &member.namespace {
            Some(namespace) => quote! {
                decl.push_namespace(#namespace);
                <#ty as ::ferrent_core::Schema>::declare(decl, ::core::option::Option::Some(#namespace));
            },
            None => quote! {
                <#ty as ::ferrent_core::SchemaMember>::declare(decl, namespace);
            },
        }
    });

    let binds = members.iter().map(|member| {
        let name = &member.name;
        let ty = &member.ty;
        if member.namespace.is_some() {
            quote! { #name: <#ty as ::ferrent_core::Schema>::bind(binder) }
        } else {
            quote! { #name: <#ty as ::ferrent_core::SchemaMember>::bind(binder) }
        }
    });

    let uses_namespace = members.iter().any(|m| m.namespace.is_none());
    let namespace_param = if uses_namespace {
        quote! { namespace }
    } else {
        quote! { _namespace }
    };

    Ok(quote! {
        impl ::ferrent_core::Schema for #struct_name {
            fn declare(
                decl: &mut ::ferrent_core::SchemaDecl,
                #namespace_param: ::core::option::Option<&'static str>,
            ) {
                #(#declares)*
            }

            fn bind(binder: &mut ::ferrent_core::TableBinder) -> Self {
                Self {
                    #(#binds,)*
                }
            }
        }
    })
}
