extern crate proc_macro;

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::ext::IdentExt;
use syn::{parse_macro_input, Data, DeriveInput, Expr, Fields, Lit, LitStr, Meta, Visibility};

/// Derives `tabler::Record` for a struct with named fields.
///
/// Field attributes:
/// - `#[db(name = "x")]` / `#[db(skip)]` / `#[db = "x"]`: explicit column
///   name, `"-"` skips the field.
/// - `#[sql(skip, override, primary, auto, name = "x", raw = "...")]`, or the
///   textual form `#[sql("auto,DEFAULT 0")]`.
/// - `#[embed]`: the field is a record whose columns are flattened in.
///
/// Only `pub` fields become columns. Fields that are not columns are filled
/// with `Default::default()` when a row is read.
#[proc_macro_derive(Record, attributes(db, sql, embed))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(output) => output.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

#[derive(Default)]
struct FieldAttrs {
    db: Option<LitStr>,
    db_skip: bool,
    sql_text: Vec<LitStr>,
    directives: Vec<TokenStream2>,
    skip: bool,
    embed: bool,
}

fn lit_str(expr: &Expr) -> syn::Result<LitStr> {
    match expr {
        Expr::Lit(expr_lit) => match &expr_lit.lit {
            Lit::Str(litstr) => Ok(litstr.clone()),
            other => Err(syn::Error::new_spanned(other, "expected a string literal")),
        },
        other => Err(syn::Error::new_spanned(other, "expected a string literal")),
    }
}

fn parse_field_attrs(field: &syn::Field) -> syn::Result<FieldAttrs> {
    let mut attrs = FieldAttrs::default();

    for attr in &field.attrs {
        if attr.path().is_ident("embed") {
            attr.meta.require_path_only()?;
            attrs.embed = true;
        } else if attr.path().is_ident("db") {
            if let Meta::NameValue(nv) = &attr.meta {
                let name = lit_str(&nv.value)?;
                if name.value() == "-" {
                    attrs.db_skip = true;
                }
                attrs.db = Some(name);
                continue;
            }
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("skip") {
                    attrs.db_skip = true;
                    Ok(())
                } else if meta.path.is_ident("name") {
                    attrs.db = Some(meta.value()?.parse()?);
                    Ok(())
                } else {
                    Err(meta.error("expected `name = \"...\"` or `skip`"))
                }
            })?;
        } else if attr.path().is_ident("sql") {
            if let Ok(text) = attr.parse_args::<LitStr>() {
                if text.value().split(',').any(|c| c == "-" || c == "skip") {
                    attrs.skip = true;
                }
                attrs.sql_text.push(text);
                continue;
            }
            // Nested meta paths accept keywords, so `override` needs no raw prefix.
            attr.parse_nested_meta(|meta| {
                let directive = if meta.path.is_ident("skip") {
                    attrs.skip = true;
                    quote!(::tabler::Directive::Skip)
                } else if meta.path.is_ident("override") {
                    quote!(::tabler::Directive::Override)
                } else if meta.path.is_ident("primary") {
                    quote!(::tabler::Directive::Primary)
                } else if meta.path.is_ident("auto") {
                    quote!(::tabler::Directive::Auto)
                } else if meta.path.is_ident("name") {
                    let name: LitStr = meta.value()?.parse()?;
                    quote!(::tabler::Directive::Name(::std::string::String::from(#name)))
                } else if meta.path.is_ident("raw") {
                    let raw: LitStr = meta.value()?.parse()?;
                    quote!(::tabler::Directive::Raw(::std::string::String::from(#raw)))
                } else {
                    return Err(meta.error(
                        "unknown sql directive, expected `skip`, `override`, `primary`, `auto`, `name = \"...\"` or `raw = \"...\"`",
                    ));
                };
                attrs.directives.push(directive);
                Ok(())
            })?;
        }
    }

    if attrs.embed && (attrs.db.is_some() || !attrs.directives.is_empty() || !attrs.sql_text.is_empty()) {
        return Err(syn::Error::new_spanned(
            field,
            "#[embed] fields cannot carry #[db] or #[sql] attributes",
        ));
    }

    Ok(attrs)
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let name_str = struct_name.to_string();

    let fields = match &input.data {
        Data::Struct(s) => match &s.fields {
            Fields::Named(named) => named.named.iter().collect::<Vec<_>>(),
            _ => {
                return Err(syn::Error::new_spanned(
                    struct_name,
                    "Record can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                struct_name,
                "Record can only be derived for structs",
            ));
        }
    };

    let mut descriptors = Vec::new();
    let mut value_arms = Vec::new();
    let mut embedded_lookups = Vec::new();
    let mut inits = Vec::new();

    for field in fields {
        let ident = field.ident.as_ref().expect("named field");
        let logical = ident.unraw().to_string();
        let ty = &field.ty;
        let exported = matches!(field.vis, Visibility::Public(_));
        let attrs = parse_field_attrs(field)?;

        if attrs.embed {
            descriptors.push(quote! {
                ::tabler::FieldDescriptor::new(
                    #logical,
                    ::tabler::FieldKind::Record(<#ty as ::tabler::Record>::describe),
                )
                .embedded(true)
                .exported(#exported)
            });
            if exported {
                embedded_lookups.push(quote! {
                    if let ::std::option::Option::Some(value) = ::tabler::Record::field_value(&self.#ident, field) {
                        return ::std::option::Option::Some(value);
                    }
                });
                inits.push(quote!(#ident: <#ty as ::tabler::Record>::from_row(row)?));
            } else {
                inits.push(quote!(#ident: ::std::default::Default::default()));
            }
            continue;
        }

        let is_column = exported && !attrs.skip && !attrs.db_skip;

        let kind = if is_column {
            quote!(::tabler::FieldKind::Value(<#ty as ::tabler::FieldValue>::COLUMN_TYPE))
        } else {
            quote!(::tabler::FieldKind::Value(::std::option::Option::None))
        };
        let db = match &attrs.db {
            _ if attrs.db_skip => quote!(.db("-")),
            Some(name) => quote!(.db(#name)),
            None => quote!(),
        };
        let sql_text = attrs.sql_text.iter().map(|text| quote!(.sql(#text)));
        let directives = attrs.directives.iter().map(|d| quote!(.directive(#d)));

        descriptors.push(quote! {
            ::tabler::FieldDescriptor::new(#logical, #kind)
                .exported(#exported)
                #db
                #(#sql_text)*
                #(#directives)*
        });

        if is_column {
            value_arms.push(quote! {
                #logical => return ::std::option::Option::Some(::tabler::FieldValue::to_value(&self.#ident)),
            });
            inits.push(quote!(#ident: row.get::<#ty>(#logical)?));
        } else {
            inits.push(quote!(#ident: ::std::default::Default::default()));
        }
    }

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::tabler::Record for #struct_name #ty_generics #where_clause {
            fn describe() -> ::tabler::StructDescriptor {
                ::tabler::StructDescriptor::new(#name_str, ::std::vec![#(#descriptors),*])
            }

            fn field_value(&self, field: &str) -> ::std::option::Option<::tabler::Value> {
                match field {
                    #(#value_arms)*
                    _ => {}
                }
                #(#embedded_lookups)*
                ::std::option::Option::None
            }

            fn from_row(row: &::tabler::RowReader<'_>) -> ::tabler::Result<Self> {
                ::std::result::Result::Ok(Self {
                    #(#inits),*
                })
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    fn first_field(input: DeriveInput) -> syn::Field {
        match input.data {
            Data::Struct(s) => s.fields.into_iter().next().unwrap(),
            _ => unreachable!(),
        }
    }

    fn directives(attrs: &FieldAttrs) -> Vec<String> {
        attrs.directives.iter().map(|d| d.to_string()).collect()
    }

    #[test]
    fn keyword_directives_parse() {
        let field = first_field(parse_quote! {
            struct Info {
                #[sql(override, raw = "VARCHAR(64)", primary)]
                pub version: String,
            }
        });
        let attrs = parse_field_attrs(&field).unwrap();

        let directives = directives(&attrs);
        assert_eq!(directives.len(), 3);
        assert!(directives[0].ends_with("Directive :: Override"));
        assert!(directives[1].contains("Directive :: Raw"));
        assert!(directives[1].contains("\"VARCHAR(64)\""));
        assert!(directives[2].ends_with("Directive :: Primary"));
        assert!(!attrs.skip);
    }

    #[test]
    fn db_forms() {
        let named = first_field(parse_quote! {
            struct A { #[db(name = "birth")] pub birthday: String }
        });
        assert_eq!(parse_field_attrs(&named).unwrap().db.unwrap().value(), "birth");

        let skipped = first_field(parse_quote! {
            struct A { #[db(skip)] pub cache: String }
        });
        assert!(parse_field_attrs(&skipped).unwrap().db_skip);

        let dash = first_field(parse_quote! {
            struct A { #[db = "-"] pub cache: String }
        });
        assert!(parse_field_attrs(&dash).unwrap().db_skip);
    }

    #[test]
    fn unknown_directive_is_an_error() {
        let field = first_field(parse_quote! {
            struct A { #[sql(unique)] pub email: String }
        });
        let err = parse_field_attrs(&field).err().unwrap();
        assert!(err.to_string().starts_with("unknown sql directive"));
    }

    #[test]
    fn expansion_carries_override() {
        let input: DeriveInput = parse_quote! {
            pub struct Session {
                #[sql(override, raw = "CHAR(36)")]
                pub token: Uuid,
            }
        };
        let code = expand(&input).unwrap().to_string();
        assert!(code.contains("impl :: tabler :: Record for Session"));
        assert!(code.contains(":: tabler :: Directive :: Override"));
    }

    #[test]
    fn tuple_structs_are_rejected() {
        let input: DeriveInput = parse_quote! {
            pub struct Pair(pub u32, pub u32);
        };
        assert!(expand(&input).is_err());
    }
}
