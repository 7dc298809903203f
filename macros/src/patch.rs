use darling::{ast, FromDeriveInput, FromField};
use quote::{format_ident, quote};

#[derive(Debug, FromDeriveInput)]
#[darling(supports(struct_named))]
struct PatchInputReceiver {
	ident: syn::Ident,

	data: ast::Data<(), PatchFieldReceiver>,
}

#[derive(Debug, FromField)]
#[darling(forward_attrs(doc, validate, schemars))]
struct PatchFieldReceiver {
	ident: Option<syn::Ident>,

	ty: syn::Type,
	vis: syn::Visibility,

	attrs: Vec<syn::Attribute>,
}

/// Returns `T` if the type is written as `Option<T>`.
fn option_inner(ty: &syn::Type) -> Option<&syn::Type> {
	let syn::Type::Path(path) = ty else {
		return None;
	};

	let segment = path.path.segments.last()?;

	if segment.ident != "Option" {
		return None;
	}

	let syn::PathArguments::AngleBracketed(ref args) = segment.arguments else {
		return None;
	};

	match args.args.first()? {
		syn::GenericArgument::Type(inner) => Some(inner),
		_ => None,
	}
}

pub fn from_input(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
	let input = syn::parse_macro_input!(input as syn::DeriveInput);
	let receiver = match PatchInputReceiver::from_derive_input(&input) {
		Ok(x) => x,
		Err(e) => return e.write_errors().into(),
	};

	let name = receiver.ident.to_string();
	let update_ident = format_ident!(
		"Update{}",
		name.strip_prefix("Create").unwrap_or(&name)
	);
	let vis = &input.vis;

	let Some(fields) = receiver.data.take_struct() else {
		return syn::Error::new_spanned(&input.ident, "expected a struct with named fields")
			.into_compile_error()
			.into();
	};

	let fields = fields.iter().filter_map(|field| {
		let ident = field.ident.as_ref()?;
		let vis = &field.vis;
		let ty = &field.ty;
		let attrs = &field.attrs;

		Some(if let Some(inner) = option_inner(ty) {
			quote! {
				#(#attrs)*
				#[serde(default, deserialize_with = "crate::route::model::nullable")]
				#vis #ident: Option<Option<#inner>>,
			}
		} else {
			quote! {
				#(#attrs)*
				#vis #ident: Option<#ty>,
			}
		})
	});

	let doc = format!("A partial update for [`{name}`]. Absent fields are left untouched.");

	quote! {
		#input

		#[doc = #doc]
		#[derive(Debug, Default, serde::Deserialize, validator::Validate, schemars::JsonSchema)]
		#[serde(default)]
		#vis struct #update_ident {
			#(
				#fields
			)*
		}
	}
	.into()
}
