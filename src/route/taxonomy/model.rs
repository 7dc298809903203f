use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A category groups posts. A post has at most one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema, sqlx::FromRow)]
pub struct Category {
	pub id: Uuid,
	pub name: String,
	pub slug: String,
	pub created_at: DateTime<Utc>,
}

/// A tag labels posts. A post has any number of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema, sqlx::FromRow)]
pub struct Tag {
	pub id: Uuid,
	pub name: String,
	pub slug: String,
	pub created_at: DateTime<Utc>,
}

/// Categories and tags share one shape on the way in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTerm {
	pub name: String,
	pub slug: String,
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct CreateCategoryInput {
	#[validate(
		length(min = 1, max = 100),
		custom(function = "crate::route::model::not_blank")
	)]
	pub name: String,
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct CreateTagInput {
	#[validate(
		length(min = 1, max = 50),
		custom(function = "crate::route::model::not_blank")
	)]
	pub name: String,
}

/// The result of a get-or-create.
#[derive(Debug, Serialize, JsonSchema)]
pub struct Created<T> {
	#[serde(flatten)]
	pub item: T,
	/// Whether the item was created by this request.
	pub created: bool,
}
