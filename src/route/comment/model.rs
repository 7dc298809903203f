use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A comment left by a user on a post.
#[derive(Debug, Clone, Serialize, JsonSchema, sqlx::FromRow)]
pub struct Comment {
	pub id: Uuid,
	pub post_id: Uuid,
	/// The user that wrote the comment.
	pub user_id: Uuid,
	pub content: String,
	/// Unapproved comments are only shown to the post's author and admins.
	pub is_approved: bool,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl Comment {
	/// Comments are approved on creation, whoever writes them.
	pub fn new(post_id: Uuid, user_id: Uuid, content: String, now: DateTime<Utc>) -> Self {
		Self {
			id: Uuid::new_v4(),
			post_id,
			user_id,
			content,
			is_approved: true,
			created_at: now,
			updated_at: now,
		}
	}
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct CreateCommentInput {
	/// The text of the comment.
	#[validate(
		length(min = 1, max = 5000),
		custom(function = "crate::route::model::not_blank")
	)]
	pub content: String,
}

/// Narrows a comment listing. Absent fields do not filter.
#[derive(Debug, Clone, Default)]
pub struct CommentQuery {
	pub post_id: Option<Uuid>,
	/// Only comments on posts written by this user.
	pub post_author_id: Option<Uuid>,
	pub approved_only: bool,
	pub limit: i64,
	pub offset: i64,
}

impl CommentQuery {
	pub fn for_post(post_id: Uuid, approved_only: bool) -> Self {
		Self {
			post_id: Some(post_id),
			approved_only,
			limit: i64::MAX,
			..Self::default()
		}
	}
}

/// The answer to a comment action, with a message for the user and the
/// post they should be taken back to.
#[derive(Debug, Serialize, JsonSchema)]
pub struct CommentOutcome {
	pub comment: Option<Comment>,
	pub post_slug: String,
	pub message: String,
}

#[derive(Deserialize, Validate, JsonSchema)]
pub struct ModerationInput {
	/// The page number to return (1-indexed).
	#[validate(range(min = 1, max = 100))]
	#[serde(default = "crate::route::model::one")]
	pub page: i64,
	/// The number of comments to return per page.
	#[validate(range(min = 1, max = 100))]
	#[serde(default = "twenty")]
	pub size: i64,
}

#[inline]
fn twenty() -> i64 {
	20
}

impl ModerationInput {
	pub fn offset(&self) -> i64 {
		(self.page - 1) * self.size
	}
}
