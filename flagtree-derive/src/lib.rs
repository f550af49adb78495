//! Derives `flagtree::spec::Params` for a parameter record.
//!
//! This replaces the origin implementation's reflective struct walk (read a
//! tag string off each field at registration time) with a walk over `syn`'s
//! parsed AST at compile time. The generated `build_spec` body is the
//! monomorphized analogue of that walk: one `add_flag`/`add_arg`/`add_inline`
//! call per tagged field, in declaration order, exactly mirroring the order
//! the origin implementation's reflective loop would have visited them in.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{quote, ToTokens};
use syn::{parse_macro_input, Data, DeriveInput, Fields, LitStr, Type};

enum FieldTag {
    None,
    Flag(String),
    Arg(String),
    Inline(String),
}

/// Tier 1/2 elision override carried alongside a `flag` tag. Only meaningful
/// on a `FieldTag::Flag`; takes precedence over the structural bool-type
/// check (tier 3) in `expand`.
enum ElideOverride {
    None,
    Bare,
    WithFn(syn::Path),
}

fn field_tag(attrs: &[syn::Attribute]) -> Result<(FieldTag, ElideOverride), syn::Error> {
    let mut tag = FieldTag::None;
    let mut elide = ElideOverride::None;
    for attr in attrs {
        if !attr.path().is_ident("flagtree") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("flag") {
                // A bare `flag` (no `= "..."`) derives its name from the
                // field identifier at expansion time; the empty sentinel is
                // filled in by the caller once the field name is in scope.
                tag = match meta.value() {
                    Ok(value) => FieldTag::Flag(value.parse::<LitStr>()?.value()),
                    Err(_) => FieldTag::Flag(String::new()),
                };
            } else if meta.path.is_ident("arg") {
                let value = meta.value()?;
                let s: LitStr = value.parse()?;
                tag = FieldTag::Arg(s.value());
            } else if meta.path.is_ident("inline") {
                let value = meta.value()?;
                let s: LitStr = value.parse()?;
                tag = FieldTag::Inline(s.value());
            } else if meta.path.is_ident("elide_with") {
                let value = meta.value()?;
                let s: LitStr = value.parse()?;
                elide = ElideOverride::WithFn(s.parse::<syn::Path>()?);
            } else if meta.path.is_ident("elide") {
                if meta.value().is_ok() {
                    return Err(meta.error(
                        "`elide` takes no value; use `elide_with = \"path::to::fn\"` for a \
                         custom consumable predicate",
                    ));
                }
                elide = ElideOverride::Bare;
            } else {
                return Err(meta.error("unrecognized flagtree field attribute"));
            }
            Ok(())
        })?;
    }
    Ok((tag, elide))
}

fn struct_init_fn(attrs: &[syn::Attribute]) -> Result<Option<syn::Path>, syn::Error> {
    let mut found = None;
    for attr in attrs {
        if !attr.path().is_ident("flagtree") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("init") {
                let value = meta.value()?;
                let s: LitStr = value.parse()?;
                found = Some(s.parse::<syn::Path>()?);
            } else {
                return Err(meta.error("unrecognized flagtree struct attribute"));
            }
            Ok(())
        })?;
    }
    Ok(found)
}

/// Renders a type into the readable, stable-enough-for-diagnostics string
/// stashed in `FlagSpec::field_type`/`ArgSlot`'s analogue.
fn type_name(ty: &Type) -> String {
    ty.to_token_stream().to_string()
}

/// Structural eligibility for default elision: a field typed `bool` or
/// `Option<bool>` is a syntactic candidate. There is no ambient capability
/// probe in this port (see crate-level design notes) — this check is purely
/// about the field's declared type. Whether an eligible field actually elides
/// is a runtime decision gated by `SpecConfig::allow_bool_type`, consulted in
/// the generated `build_spec` body, not baked in here at expansion time.
fn is_bool_like(ty: &Type) -> bool {
    let rendered = type_name(ty);
    rendered == "bool" || rendered.replace(' ', "") == "Option<bool>"
}

/// Recognizes the single-segment generic shapes `Option<Box<X>>`, returning
/// `X`. Used only to find the one indirection `#[flagtree(inline = "...")]`
/// supports; anything else (including plain `Box<X>` or `Option<X>` without
/// the box) is treated as a direct inline of its own literal type.
fn unwrap_option_box(ty: &Type) -> Option<&Type> {
    let inner_of = |ty: &Type, wrapper: &str| -> Option<&Type> {
        let Type::Path(p) = ty else { return None };
        let seg = p.path.segments.last()?;
        if seg.ident != wrapper {
            return None;
        }
        let syn::PathArguments::AngleBracketed(args) = &seg.arguments else {
            return None;
        };
        if args.args.len() != 1 {
            return None;
        }
        match args.args.first()? {
            syn::GenericArgument::Type(t) => Some(t),
            _ => None,
        }
    };
    let boxed = inner_of(ty, "Option")?;
    inner_of(boxed, "Box")
}

pub(crate) fn expand(input: DeriveInput) -> Result<TokenStream2, syn::Error> {
    let ident = &input.ident;
    let type_name_str = ident.to_string();

    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            &input,
            "#[derive(Params)] only supports structs with named fields (a parameter record \
             must be a record type; this is checked at compile time rather than, as in the \
             origin implementation, by a runtime `InvalidParameters` error)",
        ));
    };
    let Fields::Named(fields) = &data.fields else {
        return Err(syn::Error::new_spanned(
            &input,
            "#[derive(Params)] requires named fields",
        ));
    };

    let init_path = struct_init_fn(&input.attrs)?;

    let mut builder_stmts: Vec<TokenStream2> = Vec::new();

    for field in &fields.named {
        let field_ident = field.ident.as_ref().expect("Fields::Named guarantees an ident");
        let field_name_str = field_ident.to_string();
        let ty = &field.ty;
        let ty_name_str = type_name(ty);

        let (field_tag_value, elide_override) = field_tag(&field.attrs)?;
        if !matches!(field_tag_value, FieldTag::Flag(_)) && !matches!(elide_override, ElideOverride::None) {
            return Err(syn::Error::new_spanned(
                field,
                "`elide`/`elide_with` only apply to `flag` fields",
            ));
        }

        match field_tag_value {
            FieldTag::None => continue,
            FieldTag::Flag(names_raw) => {
                let names: Vec<&str> = if names_raw.trim().is_empty() {
                    vec![field_name_str.as_str()]
                } else {
                    names_raw.split_whitespace().collect()
                };
                if names.is_empty() {
                    return Err(syn::Error::new_spanned(
                        field,
                        "`flag` tag must name at least one flag",
                    ));
                }
                for name in &names {
                    if name.is_empty() || name.starts_with('-') {
                        return Err(syn::Error::new_spanned(
                            field,
                            format!("flag name `{name}` must be non-empty and not start with `-`"),
                        ));
                    }
                }
                // Precedence order: `elide_with` (tier 1), bare `elide` (tier
                // 2), the structural bool-type check (tier 3), else none.
                let elide_expr = match &elide_override {
                    ElideOverride::WithFn(path) => quote! {
                        ::flagtree::spec::Elide::allow_with(::std::sync::Arc::new(#path))
                    },
                    ElideOverride::Bare => quote! {
                        ::flagtree::spec::Elide::allow(config)
                    },
                    ElideOverride::None if is_bool_like(ty) => quote! {
                        if config.allow_bool_type {
                            ::flagtree::spec::Elide::allow(config)
                        } else {
                            ::flagtree::spec::Elide::none(config)
                        }
                    },
                    ElideOverride::None => quote! { ::flagtree::spec::Elide::none(config) },
                };
                builder_stmts.push(quote! {
                    __builder.add_flag(::flagtree::spec::FlagSpec {
                        field_name: #field_name_str,
                        field_type: #ty_name_str,
                        names: vec![#(#names.to_string()),*],
                        elide: #elide_expr,
                        set: ::std::boxed::Box::new(|__v: &mut #ident, __src: &str| {
                            use ::flagtree::ParamValue;
                            __v.#field_ident.decode_value(__src)
                        }),
                    })?;
                });
            }
            FieldTag::Arg(range_raw) => {
                builder_stmts.push(quote! {
                    __builder.add_arg(::flagtree::spec::ArgSlot {
                        field_name: #field_name_str,
                        range: ::flagtree::spec::PositionRange::parse(#range_raw)
                            .map_err(|reason| ::flagtree::SpecError::InvalidField {
                                field: #field_name_str,
                                reason,
                            })?,
                        set: ::std::boxed::Box::new(|__v: &mut #ident, __src: &str| {
                            use ::flagtree::ParamValue;
                            __v.#field_ident.decode_value(__src)
                        }),
                    })?;
                });
            }
            FieldTag::Inline(prefix) => {
                if prefix.starts_with('-') || prefix.contains(char::is_whitespace) {
                    return Err(syn::Error::new_spanned(
                        field,
                        "`inline` prefix must not start with `-` or contain whitespace",
                    ));
                }
                // Direct embedding inlines the record by value. A field typed
                // `Option<Box<Inner>>` is the one indirection this port
                // supports for inlines (the only shape in which Rust lets an
                // inline field's type equal an ancestor's own type, since a
                // direct self-inline-by-value is an infinite-size struct and
                // never compiles in the first place): the access closure
                // lazily allocates a default `Inner` the first time it's
                // reached, mirroring Rules' "allocate a fresh instance" step
                // for a null indirection.
                match unwrap_option_box(ty) {
                    Some(inner) => {
                        builder_stmts.push(quote! {
                            __builder.add_inline::<#inner>(
                                #field_name_str,
                                #prefix,
                                |__v: &mut #ident| {
                                    if __v.#field_ident.is_none() {
                                        __v.#field_ident = ::std::option::Option::Some(
                                            ::std::boxed::Box::new(<#inner as ::std::default::Default>::default()),
                                        );
                                    }
                                    __v.#field_ident.as_mut().expect("just materialized above").as_mut()
                                },
                                __trail,
                                config,
                            )?;
                        });
                    }
                    None => {
                        builder_stmts.push(quote! {
                            __builder.add_inline::<#ty>(
                                #field_name_str,
                                #prefix,
                                |__v: &mut #ident| &mut __v.#field_ident,
                                __trail,
                                config,
                            )?;
                        });
                    }
                }
            }
        }
    }

    let run_init_impl = match init_path {
        Some(path) => quote! {
            fn run_init(&mut self) {
                #path(self);
            }
        },
        None => quote! {},
    };

    let expanded = quote! {
        #[automatically_derived]
        impl ::flagtree::Params for #ident {
            fn type_name() -> &'static str {
                #type_name_str
            }

            fn build_spec(
                __trail: &mut ::std::vec::Vec<(::std::any::TypeId, &'static str)>,
                config: &::flagtree::SpecConfig,
            ) -> ::std::result::Result<::flagtree::ParamSpec<Self>, ::flagtree::SpecError> {
                let mut __builder = ::flagtree::spec::SpecBuilder::new(#type_name_str);
                #(#builder_stmts)*
                ::std::result::Result::Ok(__builder.build())
            }

            #run_init_impl

            #[doc(hidden)]
            fn __spec_cell() -> &'static ::std::sync::OnceLock<::flagtree::ParamSpec<Self>> {
                static CELL: ::std::sync::OnceLock<::flagtree::ParamSpec<#ident>> =
                    ::std::sync::OnceLock::new();
                &CELL
            }
        }
    };
    Ok(expanded)
}

/// Derives [`flagtree::spec::Params`](../flagtree/spec/trait.Params.html) for
/// a parameter record. See the crate-level docs on `flagtree` for the
/// `#[flagtree(...)]` tag vocabulary.
#[proc_macro_derive(Params, attributes(flagtree))]
pub fn derive_params(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
