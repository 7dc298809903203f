//! The persistence boundary.
//!
//! Handlers talk to a [`Store`] rather than to a connection pool, so the
//! same lifecycle code runs against Postgres in production and against the
//! in-memory store in tests and local runs without a database.

mod memory;
mod postgres;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::{
	role::{Permission, Role},
	route::{
		auth::model::{NewUser, Session, UpdateProfileInput, User},
		comment::model::{Comment, CommentQuery},
		post::model::{Post, PostCounts, PostQuery},
		taxonomy::model::{Category, NewTerm, Tag},
	},
};

pub type DynStore = Arc<dyn Store>;

/// A uniqueness rule enforced by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unique {
	UserEmail,
	UserUsername,
	PostSlug,
	CategoryName,
	CategorySlug,
	TagName,
	TagSlug,
}

impl Unique {
	/// Maps a Postgres constraint name (see `migrations/`) to its rule.
	pub fn from_constraint(name: &str) -> Option<Self> {
		Some(match name {
			"user_email_key" => Self::UserEmail,
			"user_username_key" => Self::UserUsername,
			"post_slug_key" => Self::PostSlug,
			"category_name_key" => Self::CategoryName,
			"category_slug_key" => Self::CategorySlug,
			"tag_name_key" => Self::TagName,
			"tag_slug_key" => Self::TagSlug,
			_ => return None,
		})
	}
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
	#[error("unique constraint violated: {0:?}")]
	Conflict(Unique),
	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),
	#[error("migration error: {0}")]
	Migrate(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
	/// Turns unique violations reported by Postgres into [`StoreError::Conflict`].
	pub fn from_sqlx(error: sqlx::Error) -> Self {
		if let sqlx::Error::Database(ref database) = error {
			if let Some(unique) = database.constraint().and_then(Unique::from_constraint) {
				return Self::Conflict(unique);
			}
		}

		Self::Database(error)
	}
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

#[axum::async_trait]
pub trait Store: Send + Sync + 'static {
	/// Persists a new account without a session.
	async fn insert_user(&self, user: NewUser) -> Result<User>;
	/// Persists a new account, its first session and, if that role has been
	/// seeded, its role, all in one write. The returned user only lists the
	/// role when it was attached.
	async fn register_user(&self, user: NewUser, role: Role) -> Result<(User, Session)>;
	async fn user_by_id(&self, id: Uuid) -> Result<Option<User>>;
	async fn user_by_email(&self, email: &str) -> Result<Option<User>>;
	async fn update_user(&self, id: Uuid, input: UpdateProfileInput) -> Result<User>;
	/// Deletes the user along with their sessions, posts and comments.
	async fn delete_user(&self, id: Uuid) -> Result<bool>;
	/// The addresses of every superuser and member of the Admin role.
	async fn admin_emails(&self) -> Result<Vec<String>>;

	/// Creates the role with its permissions unless it exists already.
	/// Returns whether it was created.
	async fn ensure_role(&self, role: Role, permissions: &[Permission]) -> Result<bool>;
	async fn seeded_roles(&self) -> Result<Vec<Role>>;
	/// Adds the role to the user. Returns `false` without changing anything
	/// when the role has not been seeded.
	async fn assign_role(&self, user_id: Uuid, role: Role) -> Result<bool>;

	async fn create_session(&self, user_id: Uuid) -> Result<Session>;
	async fn delete_session(&self, id: Uuid) -> Result<bool>;
	async fn user_by_session(&self, session_id: Uuid) -> Result<Option<User>>;
	/// When the session last commented on the post.
	async fn last_comment_at(&self, session_id: Uuid, post_id: Uuid) -> Result<Option<DateTime<Utc>>>;

	async fn categories(&self) -> Result<Vec<Category>>;
	async fn category_by_id(&self, id: Uuid) -> Result<Option<Category>>;
	async fn category_by_slug(&self, slug: &str) -> Result<Option<Category>>;
	async fn category_slug_taken(&self, slug: &str) -> Result<bool>;
	/// Returns the category with this name, creating it if needed, and
	/// whether it was created.
	async fn get_or_create_category(&self, term: NewTerm) -> Result<(Category, bool)>;
	/// Deletes the category. Its posts stay, without a category.
	async fn delete_category(&self, id: Uuid) -> Result<bool>;

	async fn tags(&self) -> Result<Vec<Tag>>;
	async fn tags_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Tag>>;
	async fn tag_by_slug(&self, slug: &str) -> Result<Option<Tag>>;
	async fn tag_slug_taken(&self, slug: &str) -> Result<bool>;
	async fn get_or_create_tag(&self, term: NewTerm) -> Result<(Tag, bool)>;

	/// Whether a post other than `exclude` uses the slug.
	async fn post_slug_taken(&self, slug: &str, exclude: Option<Uuid>) -> Result<bool>;
	async fn insert_post(&self, post: &Post) -> Result<Post>;
	async fn update_post(&self, post: &Post) -> Result<Post>;
	async fn delete_post(&self, id: Uuid) -> Result<bool>;
	async fn post_by_id(&self, id: Uuid) -> Result<Option<Post>>;
	async fn post_by_slug(&self, slug: &str) -> Result<Option<Post>>;
	/// Posts matching the query, newest first.
	async fn posts(&self, query: &PostQuery) -> Result<Vec<Post>>;
	async fn post_counts(&self, author_id: Option<Uuid>) -> Result<PostCounts>;

	/// Persists a comment. Given a session, the comment's creation time is
	/// recorded as that session's latest comment on the post in the same write.
	async fn insert_comment(&self, comment: &Comment, session_id: Option<Uuid>) -> Result<Comment>;
	async fn comment_by_id(&self, id: Uuid) -> Result<Option<Comment>>;
	async fn approve_comment(&self, id: Uuid) -> Result<Option<Comment>>;
	async fn delete_comment(&self, id: Uuid) -> Result<bool>;
	/// Comments matching the query, newest first.
	async fn comments(&self, query: &CommentQuery) -> Result<Vec<Comment>>;
	async fn approved_comment_count(&self, post_id: Uuid) -> Result<i64>;
}
