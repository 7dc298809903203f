mod patch;
mod route;

use proc_macro::TokenStream;

/// Creates a new documentation function for the route, named after the original function with the suffix `_docs`.
///
/// The first paragraph of the doc comment becomes the summary, the rest becomes the description.
#[proc_macro_attribute]
pub fn route(args: TokenStream, input: TokenStream) -> TokenStream {
	route::from_input(args, input)
}

/// Creates an `UpdateX` struct next to a `CreateX` input, for partial updates.
///
/// Every field becomes optional. Fields that are already `Option<T>` become
/// `Option<Option<T>>`, so an explicit `null` clears the value while an
/// absent field leaves it untouched. Doc comments are kept, `validate`
/// attributes are kept on fields that were not optional.
#[proc_macro_attribute]
pub fn patch(_args: TokenStream, input: TokenStream) -> TokenStream {
	patch::from_input(input)
}
