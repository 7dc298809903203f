use std::{future::Future, sync::LazyLock};

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// A slug as accepted from clients: word characters joined by single
/// dashes. The empty string also matches, as inputs use it to ask for a
/// fresh slug.
pub static SLUG: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^(?:[a-z0-9_]+(?:-[a-z0-9_]+)*)?$").unwrap());

static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s-]").unwrap());
static SEPARATORS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[-\s]+").unwrap());

/// Turns a title or name into a URL-safe slug.
///
/// Accented letters are decomposed to their ASCII base and anything else
/// outside ASCII is dropped. Punctuation is removed, while runs of
/// whitespace and dashes become a single `-`. Returns an empty string if
/// nothing survives.
pub fn slugify(input: &str) -> String {
	let ascii = input
		.nfkd()
		.filter(char::is_ascii)
		.collect::<String>()
		.to_lowercase();

	let words = NON_WORD.replace_all(&ascii, "");

	SEPARATORS
		.replace_all(&words, "-")
		.trim_matches(|c| c == '-' || c == '_')
		.to_string()
}

/// Slugifies `input`, falling back to `fallback` for inputs like `"!!!"`.
pub fn slugify_or(input: &str, fallback: &str) -> String {
	let slug = slugify(input);

	if slug.is_empty() {
		fallback.to_string()
	} else {
		slug
	}
}

/// Finds the first free slug among `base`, `base-1`, `base-2`, ...
///
/// `taken` reports whether a candidate is used by some *other* row, so
/// re-saving an entity never collides with itself.
pub async fn unique<F, Fut, E>(base: &str, mut taken: F) -> Result<String, E>
where
	F: FnMut(String) -> Fut,
	Fut: Future<Output = Result<bool, E>>,
{
	let mut candidate = base.to_string();
	let mut counter = 1u32;

	while taken(candidate.clone()).await? {
		candidate = format!("{base}-{counter}");
		counter += 1;
	}

	Ok(candidate)
}
