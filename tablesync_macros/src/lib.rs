//! Procedural macros for tablesync
//!
//! `#[derive(TableModel)]` turns a struct with named fields into a
//! `TableDescriptor`: one field entry per struct field in declaration order,
//! `Option<T>` fields marked nullable, plus the constraints declared through
//! `#[table(...)]` and `#[column(...)]`.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::ext::IdentExt;
use syn::meta::ParseNestedMeta;
use syn::{
    parse_macro_input, Attribute, Data, DeriveInput, Expr, ExprLit, ExprUnary, Fields,
    GenericArgument, Lit, LitBool, LitInt, LitStr, PathArguments, Token, Type, UnOp,
};

/// Derives `tablesync::TableModel`.
///
/// # Struct attributes
///
/// - `#[table(name = "users")]` - explicit table name
/// - `#[table(unique = "first_name, last_name")]` - composite unique index
/// - `#[table(index = "created_at, status")]` - composite plain index
///
/// # Field attributes
///
/// - `#[column(name = "email_address")]` - explicit column name
/// - `#[column(primary_key)]`, `#[column(primary_key = false)]`
/// - `#[column(auto_increment)]`, `#[column(auto_increment = false)]`
/// - `#[column(size = 100)]`, `#[column(precision = 10, scale = 2)]`
/// - `#[column(db_type = "TEXT")]` - column type used verbatim
/// - `#[column(default = 0)]` - literal default (integer, float, string, bool)
/// - `#[column(default_expr = "CURRENT_TIMESTAMP")]` - raw SQL default
/// - `#[column(unique)]`, `#[column(index)]`
/// - `#[column(references = "teams.id", on_delete = "cascade")]`
/// - `#[column(skip)]` - not a column
#[proc_macro_derive(TableModel, attributes(table, column))]
pub fn derive_table_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    derive_table_model_impl(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

fn derive_table_model_impl(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let struct_name_str = struct_name.unraw().to_string();
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "TableModel derive only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "TableModel derive only supports structs",
            ));
        }
    };

    let table_attrs = parse_table_attrs(&input.attrs)?;

    let mut field_entries = Vec::new();
    let mut constraint_entries: Vec<TokenStream2> = table_attrs
        .unique
        .iter()
        .map(|columns| quote! { ::tablesync::models::ConstraintDecl::unique(&[#(#columns),*]) })
        .chain(
            table_attrs
                .index
                .iter()
                .map(|columns| quote! { ::tablesync::models::ConstraintDecl::index(&[#(#columns),*]) }),
        )
        .collect();

    for field in fields {
        let Some(ident) = field.ident.as_ref() else {
            return Err(syn::Error::new_spanned(field, "expected a named field"));
        };
        let attrs = parse_column_attrs(&field.attrs)?;
        if attrs.skip {
            continue;
        }

        let field_name = ident.unraw().to_string();
        let (inner_type, nullable) = match option_inner(&field.ty) {
            Some(inner) => (inner, true),
            None => (&field.ty, false),
        };
        let rust_type = quote!(#inner_type).to_string().replace(' ', "");

        let mut entry = quote! {
            ::tablesync::models::FieldDescriptor::new(#field_name, #rust_type).nullable(#nullable)
        };
        if let Some(name) = &attrs.name {
            entry.extend(quote! { .column(#name) });
        }
        if let Some(db_type) = &attrs.db_type {
            entry.extend(quote! { .db_type(#db_type) });
        }
        if let Some(size) = attrs.size {
            entry.extend(quote! { .size(#size) });
        }
        if let Some(precision) = attrs.precision {
            let scale = attrs.scale.unwrap_or(0);
            entry.extend(quote! { .precision(#precision, #scale) });
        } else if attrs.scale.is_some() {
            return Err(syn::Error::new_spanned(
                ident,
                "`scale` requires `precision` on the same field",
            ));
        }
        if let Some(primary_key) = attrs.primary_key {
            entry.extend(quote! { .primary_key(#primary_key) });
        }
        if let Some(auto_increment) = attrs.auto_increment {
            entry.extend(quote! { .auto_increment(#auto_increment) });
        }
        if let Some(default) = &attrs.default {
            entry.extend(quote! { .default_value(#default) });
        }
        field_entries.push(entry);

        if attrs.unique {
            constraint_entries
                .push(quote! { ::tablesync::models::ConstraintDecl::unique(&[#field_name]) });
        }
        if attrs.index {
            constraint_entries
                .push(quote! { ::tablesync::models::ConstraintDecl::index(&[#field_name]) });
        }
        if let Some((ref_table, ref_column)) = &attrs.references {
            let on_delete = &attrs.on_delete;
            let on_update = &attrs.on_update;
            constraint_entries.push(quote! {
                ::tablesync::models::ConstraintDecl::foreign_key(#field_name, #ref_table, #ref_column)
                    .on_actions(#on_delete, #on_update)
            });
        } else if attrs.has_actions {
            return Err(syn::Error::new_spanned(
                ident,
                "`on_delete`/`on_update` require `references`",
            ));
        }
    }

    if field_entries.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "TableModel needs at least one column",
        ));
    }

    let table_name_call = table_attrs
        .name
        .as_ref()
        .map(|name| quote! { .table_name(#name) });

    Ok(quote! {
        #[automatically_derived]
        impl #impl_generics ::tablesync::models::TableModel for #struct_name #ty_generics #where_clause {
            fn descriptor() -> ::tablesync::models::TableDescriptor {
                ::tablesync::models::TableDescriptor::new(#struct_name_str)
                    #table_name_call
                    #(.field(#field_entries))*
                    #(.constraint(#constraint_entries))*
            }
        }
    })
}

#[derive(Default)]
struct TableAttrs {
    name: Option<String>,
    unique: Vec<Vec<String>>,
    index: Vec<Vec<String>>,
}

struct ColumnAttrs {
    name: Option<String>,
    db_type: Option<String>,
    size: Option<u32>,
    precision: Option<u32>,
    scale: Option<u32>,
    primary_key: Option<bool>,
    auto_increment: Option<bool>,
    default: Option<TokenStream2>,
    unique: bool,
    index: bool,
    references: Option<(String, String)>,
    on_delete: TokenStream2,
    on_update: TokenStream2,
    has_actions: bool,
    skip: bool,
}

impl Default for ColumnAttrs {
    fn default() -> Self {
        Self {
            name: None,
            db_type: None,
            size: None,
            precision: None,
            scale: None,
            primary_key: None,
            auto_increment: None,
            default: None,
            unique: false,
            index: false,
            references: None,
            on_delete: referential_action("restrict"),
            on_update: referential_action("restrict"),
            has_actions: false,
            skip: false,
        }
    }
}

fn parse_table_attrs(attrs: &[Attribute]) -> syn::Result<TableAttrs> {
    let mut result = TableAttrs::default();

    for attr in attrs.iter().filter(|a| a.path().is_ident("table")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                result.name = Some(string_value(&meta)?.value());
            } else if meta.path.is_ident("unique") {
                result.unique.push(column_list(&string_value(&meta)?)?);
            } else if meta.path.is_ident("index") {
                result.index.push(column_list(&string_value(&meta)?)?);
            } else {
                return Err(meta.error("unsupported table attribute"));
            }
            Ok(())
        })?;
    }

    Ok(result)
}

fn parse_column_attrs(attrs: &[Attribute]) -> syn::Result<ColumnAttrs> {
    let mut result = ColumnAttrs::default();

    for attr in attrs.iter().filter(|a| a.path().is_ident("column")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                result.name = Some(string_value(&meta)?.value());
            } else if meta.path.is_ident("primary_key") {
                result.primary_key = Some(flag(&meta)?);
            } else if meta.path.is_ident("auto_increment") {
                result.auto_increment = Some(flag(&meta)?);
            } else if meta.path.is_ident("size") {
                result.size = Some(int_value(&meta)?);
            } else if meta.path.is_ident("precision") {
                result.precision = Some(int_value(&meta)?);
            } else if meta.path.is_ident("scale") {
                result.scale = Some(int_value(&meta)?);
            } else if meta.path.is_ident("db_type") {
                result.db_type = Some(string_value(&meta)?.value());
            } else if meta.path.is_ident("default") {
                let value: Expr = meta.value()?.parse()?;
                result.default = Some(literal_default(&value)?);
            } else if meta.path.is_ident("default_expr") {
                let expr = string_value(&meta)?.value();
                result.default = Some(quote! {
                    ::tablesync::query::value::DefaultValue::Expression(#expr.to_string())
                });
            } else if meta.path.is_ident("unique") {
                result.unique = flag(&meta)?;
            } else if meta.path.is_ident("index") {
                result.index = flag(&meta)?;
            } else if meta.path.is_ident("references") {
                let target = string_value(&meta)?;
                let value = target.value();
                match value.split_once('.') {
                    Some((table, column)) if !table.is_empty() && !column.is_empty() => {
                        result.references = Some((table.to_string(), column.to_string()));
                    }
                    _ => {
                        return Err(syn::Error::new_spanned(
                            target,
                            "expected `references = \"table.column\"`",
                        ))
                    }
                }
            } else if meta.path.is_ident("on_delete") {
                result.on_delete = action_value(&meta)?;
                result.has_actions = true;
            } else if meta.path.is_ident("on_update") {
                result.on_update = action_value(&meta)?;
                result.has_actions = true;
            } else if meta.path.is_ident("skip") {
                result.skip = flag(&meta)?;
            } else {
                return Err(meta.error("unsupported column attribute"));
            }
            Ok(())
        })?;
    }

    Ok(result)
}

/// `Some(T)` when the type is `Option<T>`
fn option_inner(ty: &Type) -> Option<&Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    if type_path.qself.is_some() {
        return None;
    }
    let segment = type_path.path.segments.last()?;
    if segment.ident != "Option" {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}

fn string_value(meta: &ParseNestedMeta) -> syn::Result<LitStr> {
    meta.value()?.parse()
}

fn int_value(meta: &ParseNestedMeta) -> syn::Result<u32> {
    let lit: LitInt = meta.value()?.parse()?;
    lit.base10_parse()
}

/// A bare `flag` means true; `flag = false` is accepted too
fn flag(meta: &ParseNestedMeta) -> syn::Result<bool> {
    if meta.input.peek(Token![=]) {
        let lit: LitBool = meta.value()?.parse()?;
        Ok(lit.value)
    } else {
        Ok(true)
    }
}

fn column_list(lit: &LitStr) -> syn::Result<Vec<String>> {
    let columns: Vec<String> = lit
        .value()
        .split(',')
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    if columns.is_empty() {
        return Err(syn::Error::new_spanned(lit, "expected a comma-separated column list"));
    }
    Ok(columns)
}

fn action_value(meta: &ParseNestedMeta) -> syn::Result<TokenStream2> {
    let lit = string_value(meta)?;
    let action = referential_action(&lit.value());
    if action.is_empty() {
        return Err(syn::Error::new_spanned(
            lit,
            "expected one of restrict, cascade, set null, no action, set default",
        ));
    }
    Ok(action)
}

/// Path to the matching `ReferentialAction` variant, empty when unknown
fn referential_action(action: &str) -> TokenStream2 {
    let normalized = action.trim().to_lowercase().replace('_', " ");
    let variant = match normalized.as_str() {
        "restrict" => quote!(Restrict),
        "cascade" => quote!(Cascade),
        "set null" => quote!(SetNull),
        "no action" => quote!(NoAction),
        "set default" => quote!(SetDefault),
        _ => return TokenStream2::new(),
    };
    quote! { ::tablesync::schema::types::ReferentialAction::#variant }
}

fn literal_default(value: &Expr) -> syn::Result<TokenStream2> {
    let sql_value = match value {
        Expr::Lit(ExprLit { lit, .. }) => match lit {
            Lit::Int(n) => {
                let n: i64 = n.base10_parse()?;
                quote! { ::tablesync::query::value::SqlValue::Int(#n) }
            }
            Lit::Float(f) => {
                let f: f64 = f.base10_parse()?;
                quote! { ::tablesync::query::value::SqlValue::Float(#f) }
            }
            Lit::Str(s) => {
                let s = s.value();
                quote! { ::tablesync::query::value::SqlValue::Text(#s.to_string()) }
            }
            Lit::Bool(b) => {
                let b = b.value;
                quote! { ::tablesync::query::value::SqlValue::Bool(#b) }
            }
            other => return Err(syn::Error::new_spanned(other, "unsupported default literal")),
        },
        Expr::Unary(ExprUnary {
            op: UnOp::Neg(_),
            expr,
            ..
        }) => match expr.as_ref() {
            Expr::Lit(ExprLit { lit: Lit::Int(n), .. }) => {
                let n: i64 = n.base10_parse()?;
                let n = -n;
                quote! { ::tablesync::query::value::SqlValue::Int(#n) }
            }
            Expr::Lit(ExprLit {
                lit: Lit::Float(f), ..
            }) => {
                let f: f64 = f.base10_parse()?;
                let f = -f;
                quote! { ::tablesync::query::value::SqlValue::Float(#f) }
            }
            other => return Err(syn::Error::new_spanned(other, "unsupported default literal")),
        },
        other => {
            return Err(syn::Error::new_spanned(
                other,
                "expected a literal default; use `default_expr` for SQL expressions",
            ))
        }
    };

    Ok(quote! { ::tablesync::query::value::DefaultValue::Literal(#sql_value) })
}
