//! Macro `#[define_record]` for defining relocatable records.
//!
//! See [`relrec` crate](https://docs.rs/relrec).

use convert_case::{Case, Casing};
use proc_macro2::TokenStream;
use quote::{format_ident, quote, quote_spanned};
use syn::spanned::Spanned;
use syn::{parse_quote, Attribute, Data, DeriveInput, Fields, GenericParam, Generics, Ident, Type, Visibility, WherePredicate};

/// Macro for defining relocatable records.
///
/// # Examples
///
/// ```
/// use relrec::prelude::*;
///
/// #[define_record]
/// pub struct Person {
///     pub age: u32,
///     pub name: Str,
///     pub emails: List<Str>,
/// }
/// # fn main() {
/// let mut p = RecordBox::<Person>::new(256).unwrap();
/// let (arena, mut fields) = p.as_mut().split();
/// let mut arena = arena.unwrap();
/// fields.age.set(16);
/// fields.name.assign(arena.create_string("Harry Potter").unwrap());
/// let mut emails = arena.create_list::<Str>(2).unwrap();
/// for (i, email) in ["harry@example.com", "hp@example.com"].into_iter().enumerate() {
///     let s = arena.create_string(email).unwrap();
///     emails.get_mut(i).unwrap().assign(s);
/// }
/// fields.emails.assign(emails);
///
/// assert_eq!(p.age, 16);
/// assert_eq!(p.name, "Harry Potter");
/// assert_eq!(p.emails[1], "hp@example.com");
/// # }
/// ```
///
/// Generic records require their parameters to be `Plain`:
///
/// ```
/// use relrec::prelude::*;
///
/// #[define_record]
/// pub struct Column<T> {
///     pub cells: Vector<T>,
/// }
/// # fn main() {
/// let mut c = RecordBox::<Column<f64>>::new(64).unwrap();
/// let (arena, fields) = c.as_mut().split();
/// fields.cells.assign(arena.unwrap().create_vector(3).unwrap());
/// assert_eq!(c.cells.as_slice(), &[0.0; 3]);
/// # }
/// ```
///
/// # Generated API
///
/// For a struct `MyRecord`, the following is generated:
///
/// * The struct itself, `#[repr(C)]`, with a hidden leading field of type
///   `relrec::RecordHeader`.
/// * A module `my_record` (the snake-case version of the struct name),
///   containing a type `Muts<'a>` with one `Pin<&'a mut _>` per field.
/// * Member functions `muts()`, for mutable access to all fields at once,
///   and `split()`, which also returns the record's arena.
/// * Trait implementations `relrec::Plain` and `relrec::Record`, bounded on
///   every field type being `Plain`.
/// * An empty `Drop` implementation. Record blocks are released without
///   running destructors, so a user-defined `Drop` is rejected as a
///   conflicting implementation.
///
/// # Restrictions
///
/// Every field must be `Plain`:
///
/// ```compile_fail,E0277
/// use relrec::prelude::*;
///
/// #[define_record]
/// pub struct Bad {
///     pub size: usize,
/// }
/// # fn main() {}
/// ```
///
/// Records cannot have a `Drop` implementation:
///
/// ```compile_fail,E0119
/// use relrec::prelude::*;
///
/// #[define_record]
/// pub struct Bad {
///     pub value: u32,
/// }
///
/// impl Drop for Bad {
///     fn drop(&mut self) {}
/// }
/// # fn main() {}
/// ```
///
/// The macro itself rejects, with an error pointing at the offending token:
///
/// * arguments, as in `#[define_record(packed)]`;
/// * a `#[repr]` attribute, since the layout is always `#[repr(C)]`;
/// * enums, unions and tuple structs;
/// * lifetime parameters, since records cannot borrow;
/// * a field named `__record_header`;
/// * `pub(in path)` visibilities.
///
/// The exact diagnostics are checked by the `shouldfail/` cases of
/// `relrec_example`.
#[proc_macro_attribute]
pub fn define_record(
    attrs: proc_macro::TokenStream,
    item: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    let attrs: proc_macro2::TokenStream = attrs.into();
    let item: proc_macro2::TokenStream = item.into();
    match define_record_impl(attrs, item.clone()) {
        Ok(x) => x,
        Err(Error(msg, span)) => {
            let error = quote_spanned!(span =>
                ::core::compile_error!(#msg);
            );
            quote!(
                #item
                #error
            )
        }
    }
    .into()
}

struct Error(&'static str, proc_macro2::Span);

const HEADER_FIELD: &str = "__record_header";

fn define_record_impl(macro_args: TokenStream, d: TokenStream) -> Result<TokenStream, Error> {
    if let Some(arg) = macro_args.into_iter().next() {
        return Err(Error("define_record takes no arguments", arg.span()));
    }
    let d: DeriveInput = match syn::parse2(d) {
        Ok(d) => d,
        Err(e) => {
            return Err(Error(
                "define_record could not parse this as a struct",
                e.span(),
            ))
        }
    };
    for attr in &d.attrs {
        if attr.path.is_ident("repr") {
            return Err(Error(
                "define_record sets the layout to #[repr(C)]; remove this #[repr]",
                attr.path.span(),
            ));
        }
    }
    let fields = if let Data::Struct(s) = d.data {
        if let Fields::Named(n) = s.fields {
            n.named
        } else {
            return Err(Error("define_record requires named fields", d.ident.span()));
        }
    } else {
        return Err(Error("define_record requires a struct", d.ident.span()));
    };

    let (tyvis, tyvis_inner) = SimpleVisibility::try_parse(&d.vis)?;
    let tyname = d.ident;
    let d_attrs = d.attrs;

    let mut mod_name = format_ident!("{}", tyname.to_string().to_case(Case::Snake));
    mod_name.set_span(proc_macro2::Span::call_site());

    let mut all = AllFields::new();
    for f in fields {
        all.push(f)?;
    }
    let AllFields {
        attrs: all_attr,
        doc_attrs: all_doc_attr,
        vis: all_vis,
        vis_inner: all_vis_inner,
        ident: all_ident,
        ty: all_ty,
    } = all;

    let RecordGenerics {
        structdef: generics_structdef,
        impl_params: generics_impl,
        apply: generics_apply,
        where_clause: generics_where,
        plain_where,
    } = RecordGenerics::parse(&d.generics, &all_ty)?;

    let header_ident = format_ident!("{}", HEADER_FIELD);

    Ok(quote! {
        #tyvis mod #mod_name {
            use super::*;

            /// Mutable access to every field at once.
            #[allow(dead_code)]
            #tyvis_inner struct Muts<'a #(, #generics_structdef)*> #generics_where {
                #(
                    #all_doc_attr
                    #all_vis_inner #all_ident: ::core::pin::Pin<&'a mut #all_ty>,
                )*
            }
        }

        #(#d_attrs)*
        #[repr(C)]
        #tyvis struct #tyname<#(#generics_structdef),*> #generics_where {
            #[doc(hidden)]
            #header_ident: ::relrec::RecordHeader,
            #(
                #all_attr
                #all_vis #all_ident: #all_ty,
            )*
        }

        impl<#(#generics_impl),*> ::core::ops::Drop for #tyname<#(#generics_apply),*> #generics_where {
            fn drop(&mut self) {}
        }

        unsafe impl<#(#generics_impl),*> ::relrec::Plain for #tyname<#(#generics_apply),*> #plain_where {
            fn init_zeroed(self: ::core::pin::Pin<&mut Self>) {
                unsafe {
                    let this = self.get_unchecked_mut();
                    ::relrec::macro_support::init_header::<Self>(
                        ::core::pin::Pin::new_unchecked(&mut this.#header_ident),
                    );
                    #(
                        ::relrec::Plain::init_zeroed(::core::pin::Pin::new_unchecked(&mut this.#all_ident));
                    )*
                }
            }
        }

        unsafe impl<#(#generics_impl),*> ::relrec::Record for #tyname<#(#generics_apply),*> #plain_where {}

        impl<#(#generics_impl),*> #tyname<#(#generics_apply),*> #plain_where {
            #[inline]
            #[allow(dead_code)]
            unsafe fn __record_muts<'a>(base: *mut Self) -> #mod_name::Muts<'a #(, #generics_apply)*> {
                #mod_name::Muts {
                    #(
                        #all_ident: ::core::pin::Pin::new_unchecked(&mut (*base).#all_ident),
                    )*
                }
            }

            /// Mutable access to all fields simultaneously, except the header.
            #[allow(dead_code)]
            #tyvis fn muts(self: ::core::pin::Pin<&mut Self>) -> #mod_name::Muts<'_ #(, #generics_apply)*> {
                unsafe { Self::__record_muts(self.get_unchecked_mut()) }
            }

            /// The record's arena (if it has free space), together with
            /// mutable access to all fields.
            #[allow(dead_code)]
            #tyvis fn split(
                self: ::core::pin::Pin<&mut Self>,
            ) -> (
                ::core::option::Option<::relrec::Arena<'_>>,
                #mod_name::Muts<'_ #(, #generics_apply)*>,
            ) {
                unsafe {
                    let base: *mut Self = self.get_unchecked_mut();
                    (
                        ::relrec::macro_support::arena_of::<Self>(base),
                        Self::__record_muts(base),
                    )
                }
            }
        }
    })
}

#[derive(Clone, Copy, PartialOrd, Ord, PartialEq, Eq)]
enum SimpleVisibility {
    Private = 0,
    Super = 1,
    SuperSuper = 2,
    Crate = 3,
    Public = 4,
}

impl quote::ToTokens for SimpleVisibility {
    fn to_tokens(&self, tokens: &mut TokenStream) {
        match self {
            SimpleVisibility::Private => {}
            SimpleVisibility::Super => tokens.extend(quote!(pub(super))),
            SimpleVisibility::SuperSuper => tokens.extend(quote!(pub(in super::super))),
            SimpleVisibility::Crate => tokens.extend(quote!(pub(crate))),
            SimpleVisibility::Public => tokens.extend(quote!(pub)),
        }
    }
}

impl SimpleVisibility {
    fn bad_visibility(span: proc_macro2::Span) -> Error {
        Error(
            "Visibility must be one of: (none), pub, pub(crate), pub(self), pub(super)",
            span,
        )
    }

    /// The visibility itself, and the same visibility as seen from one
    /// module deeper.
    fn try_parse(v: &Visibility) -> Result<(SimpleVisibility, SimpleVisibility), Error> {
        Ok(match v {
            Visibility::Public(_) => (SimpleVisibility::Public, SimpleVisibility::Public),
            Visibility::Crate(_) => (SimpleVisibility::Crate, SimpleVisibility::Crate),
            Visibility::Restricted(r) => {
                if r.path.is_ident("crate") {
                    (SimpleVisibility::Crate, SimpleVisibility::Crate)
                } else if r.path.is_ident("super") {
                    (SimpleVisibility::Super, SimpleVisibility::SuperSuper)
                } else if r.path.is_ident("self") {
                    (SimpleVisibility::Private, SimpleVisibility::Super)
                } else {
                    return Err(Self::bad_visibility(r.pub_token.span));
                }
            }
            Visibility::Inherited => (SimpleVisibility::Private, SimpleVisibility::Super),
        })
    }
}

/// Per-field pieces of the generated code, in declaration order.
struct AllFields {
    /// Attributes on the field declaration.
    attrs: Vec<TokenStream>,
    /// The `doc` and `cfg` attributes, copied onto `Muts`.
    doc_attrs: Vec<TokenStream>,
    /// Visibility of the field declaration.
    vis: Vec<SimpleVisibility>,
    /// Visibility of the field declaration, for one module deeper.
    vis_inner: Vec<SimpleVisibility>,
    /// Name of the field.
    ident: Vec<Ident>,
    /// Type of the field.
    ty: Vec<Type>,
}

impl AllFields {
    fn new() -> Self {
        AllFields {
            attrs: Vec::new(),
            doc_attrs: Vec::new(),
            vis: Vec::new(),
            vis_inner: Vec::new(),
            ident: Vec::new(),
            ty: Vec::new(),
        }
    }

    fn push(&mut self, f: syn::Field) -> Result<(), Error> {
        let ident = match f.ident {
            Some(ident) => ident,
            None => return Err(Error("define_record requires named fields", f.ty.span())),
        };
        if ident == HEADER_FIELD {
            return Err(Error("this field name is reserved by define_record", ident.span()));
        }
        let (vis, vis_inner) = SimpleVisibility::try_parse(&f.vis)?;
        let attrs = &f.attrs;
        let doc_attrs: Vec<&Attribute> = f
            .attrs
            .iter()
            .filter(|a| a.path.is_ident("doc") || a.path.is_ident("cfg"))
            .collect();
        self.attrs.push(quote!(#( #attrs )*));
        self.doc_attrs.push(quote!(#( #doc_attrs )*));
        self.vis.push(vis);
        self.vis_inner.push(vis_inner);
        self.ident.push(ident);
        self.ty.push(f.ty);
        Ok(())
    }
}

struct RecordGenerics {
    /// Parameters as written on the struct definition.
    structdef: Vec<GenericParam>,
    /// Parameters for `impl<...>`, without defaults.
    impl_params: Vec<GenericParam>,
    /// Parameters applied to the type, `MyRecord<T, N>`.
    apply: Vec<TokenStream>,
    /// The struct's own where clause.
    where_clause: TokenStream,
    /// The struct's where clause, plus `FieldType: Plain` for every field.
    plain_where: TokenStream,
}

impl RecordGenerics {
    fn parse(generics: &Generics, field_tys: &[Type]) -> Result<Self, Error> {
        let mut structdef = Vec::new();
        let mut impl_params = Vec::new();
        let mut apply = Vec::new();
        for param in &generics.params {
            match param {
                GenericParam::Const(c) => {
                    let ident = &c.ident;
                    let mut impl_param = c.clone();
                    impl_param.default = None;
                    impl_param.eq_token = None;
                    structdef.push(param.clone());
                    impl_params.push(GenericParam::Const(impl_param));
                    apply.push(quote!( #ident ));
                }
                GenericParam::Type(t) => {
                    let ident = &t.ident;
                    let mut impl_param = t.clone();
                    impl_param.default = None;
                    impl_param.eq_token = None;
                    structdef.push(param.clone());
                    impl_params.push(GenericParam::Type(impl_param));
                    apply.push(quote!( #ident ));
                }
                GenericParam::Lifetime(l) => {
                    return Err(Error(
                        "records live in relocatable blocks and cannot have lifetime parameters",
                        l.lifetime.ident.span(),
                    ))
                }
            }
        }
        let where_clause = &generics.where_clause;
        let mut plain = generics.clone();
        let plain_clause = plain.make_where_clause();
        for ty in field_tys {
            let pred: WherePredicate = parse_quote!(#ty: ::relrec::Plain);
            plain_clause.predicates.push(pred);
        }
        Ok(RecordGenerics {
            structdef,
            impl_params,
            apply,
            where_clause: quote!( #where_clause ),
            plain_where: quote!( #plain_clause ),
        })
    }
}
