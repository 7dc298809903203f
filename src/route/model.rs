use schemars::JsonSchema;
use serde::{Deserialize, Deserializer};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// These can be removed when [`serde`] supports
/// literal defaults: <https://github.com/serde-rs/serde/issues/368>
#[inline]
pub(crate) fn one() -> i64 {
	1
}

#[inline]
pub(crate) fn nine() -> i64 {
	9
}

/// Rejects text that is empty once surrounding whitespace is trimmed.
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
	if value.trim().is_empty() {
		return Err(ValidationError::new("must not be blank"));
	}

	Ok(())
}

/// Deserializes a field that distinguishes "absent" (`None`, through
/// `#[serde(default)]`) from an explicit `null` (`Some(None)`).
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
	D: Deserializer<'de>,
	T: Deserialize<'de>,
{
	Option::<T>::deserialize(deserializer).map(Some)
}

/// Addresses a post, category or tag by its slug.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SlugPath {
	pub slug: String,
}

/// Addresses a comment by its id.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct IdPath {
	pub id: Uuid,
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct Paginate {
	/// The page number to return (1-indexed).
	#[validate(range(min = 1, max = 100))]
	#[serde(default = "one")]
	pub page: i64,
	/// The number of items to return per page.
	#[validate(range(min = 1, max = 100))]
	#[serde(default = "nine")]
	pub size: i64,
}

impl Paginate {
	pub fn offset(&self) -> i64 {
		(self.page - 1) * self.size
	}

	pub fn limit(&self) -> i64 {
		self.size
	}
}

impl Default for Paginate {
	fn default() -> Self {
		Self {
			page: one(),
			size: nine(),
		}
	}
}
