use chrono::{DateTime, Utc};
use macros::patch;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub use crate::route::model::Paginate;
use crate::route::{
	comment::model::Comment,
	taxonomy::model::{Category, Tag},
};

#[derive(
	Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema, sqlx::Type,
)]
#[sqlx(type_name = "post_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
	#[default]
	Draft,
	Published,
}

/// A single post, written by an author.
#[derive(Debug, Clone, Serialize, JsonSchema, sqlx::FromRow)]
pub struct Post {
	/// The unique identifier of the post.
	pub id: Uuid,
	/// The unique, URL-safe name of the post.
	pub slug: String,
	pub title: String,
	/// The rich-text content of the post.
	pub content: String,
	/// A reference to the cover image, if any.
	pub image: Option<String>,
	/// The user that wrote the post. Never changes after creation.
	pub author_id: Uuid,
	pub category_id: Option<Uuid>,
	#[sqlx(skip)]
	pub tag_ids: Vec<Uuid>,
	pub status: PostStatus,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
	/// When the post was last published. Cleared whenever it is a draft.
	pub published_at: Option<DateTime<Utc>>,
}

impl Post {
	/// Builds an unsaved post. The slug is left empty unless one was given,
	/// so that it can be assigned against the store before persisting.
	pub fn new(author_id: Uuid, input: CreatePostInput, now: DateTime<Utc>) -> Self {
		let mut post = Self {
			id: Uuid::new_v4(),
			slug: input.slug.unwrap_or_default(),
			title: input.title,
			content: input.content,
			image: input.image,
			author_id,
			category_id: input.category_id,
			tag_ids: input.tag_ids,
			status: input.status,
			created_at: now,
			updated_at: now,
			published_at: None,
		};

		post.tag_ids.sort_unstable();
		post.tag_ids.dedup();
		post.sync_published_at(now);
		post
	}

	pub fn is_published(&self) -> bool {
		self.status == PostStatus::Published
	}

	/// Keeps `published_at` consistent with the status: set to `now` when
	/// a post becomes published, cleared when it is a draft.
	pub fn sync_published_at(&mut self, now: DateTime<Utc>) {
		match self.status {
			PostStatus::Published if self.published_at.is_none() => self.published_at = Some(now),
			PostStatus::Published => {}
			PostStatus::Draft => self.published_at = None,
		}
	}

	/// Applies a partial update. Title changes never touch the slug; an
	/// explicitly cleared slug is left empty so it gets regenerated.
	pub fn apply(&mut self, input: UpdatePostInput, now: DateTime<Utc>) {
		if let Some(title) = input.title {
			self.title = title;
		}

		if let Some(slug) = input.slug {
			self.slug = slug.unwrap_or_default();
		}

		if let Some(content) = input.content {
			self.content = content;
		}

		if let Some(image) = input.image {
			self.image = image;
		}

		if let Some(category_id) = input.category_id {
			self.category_id = category_id;
		}

		if let Some(mut tag_ids) = input.tag_ids {
			tag_ids.sort_unstable();
			tag_ids.dedup();
			self.tag_ids = tag_ids;
		}

		if let Some(status) = input.status {
			self.status = status;
		}

		self.updated_at = now;
		self.sync_published_at(now);
	}
}

/// The input for a new post. Omitted optional fields stay empty.
#[patch]
#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct CreatePostInput {
	/// The title of the post.
	#[validate(length(min = 1, max = 200))]
	pub title: String,
	/// An explicit slug. Derived from the title when omitted or empty.
	#[schemars(regex(path = "crate::slug::SLUG"))]
	#[validate(
		length(max = 200),
		regex(
			path = *crate::slug::SLUG,
			message = "slug may only contain lowercase letters, digits, underscores and single dashes"
		)
	)]
	pub slug: Option<String>,
	/// The rich-text content of the post.
	#[validate(length(min = 1))]
	pub content: String,
	/// A reference to the cover image.
	#[validate(length(max = 500))]
	pub image: Option<String>,
	pub category_id: Option<Uuid>,
	#[serde(default)]
	pub tag_ids: Vec<Uuid>,
	#[serde(default)]
	pub status: PostStatus,
}

/// Narrows a post listing. Absent fields do not filter.
#[derive(Debug, Clone, Default)]
pub struct PostQuery {
	pub status: Option<PostStatus>,
	pub author_id: Option<Uuid>,
	pub category_id: Option<Uuid>,
	pub tag_id: Option<Uuid>,
	/// Case-insensitive containment search over title and content.
	pub search: Option<String>,
	pub exclude: Option<Uuid>,
	pub limit: i64,
	pub offset: i64,
}

impl PostQuery {
	/// Published posts only, newest first.
	pub fn published(limit: i64, offset: i64) -> Self {
		Self {
			status: Some(PostStatus::Published),
			limit,
			offset,
			..Self::default()
		}
	}

	pub fn page(paginate: &Paginate) -> Self {
		Self::published(paginate.limit(), paginate.offset())
	}

	/// Whether the post passes every filter except pagination.
	pub fn matches(&self, post: &Post) -> bool {
		self.status.map_or(true, |status| post.status == status)
			&& self.author_id.map_or(true, |id| post.author_id == id)
			&& self
				.category_id
				.map_or(true, |id| post.category_id == Some(id))
			&& self.tag_id.map_or(true, |id| post.tag_ids.contains(&id))
			&& self.exclude.map_or(true, |id| post.id != id)
			&& self.search.as_deref().map_or(true, |needle| {
				let needle = needle.to_lowercase();

				post.title.to_lowercase().contains(&needle)
					|| post.content.to_lowercase().contains(&needle)
			})
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, JsonSchema)]
pub struct PostCounts {
	pub total: i64,
	pub published: i64,
	pub drafts: i64,
}

#[derive(Deserialize, Validate, JsonSchema)]
pub struct SearchInput {
	/// Only return posts whose title or content contains this text.
	#[validate(length(max = 200))]
	pub q: Option<String>,
	/// The page number to return (1-indexed).
	#[validate(range(min = 1, max = 100))]
	#[serde(default = "crate::route::model::one")]
	pub page: i64,
	/// The number of items to return per page.
	#[validate(range(min = 1, max = 100))]
	#[serde(default = "crate::route::model::nine")]
	pub size: i64,
}

impl SearchInput {
	pub fn query(&self) -> PostQuery {
		let paginate = Paginate {
			page: self.page,
			size: self.size,
		};

		PostQuery {
			search: self
				.q
				.as_deref()
				.map(str::trim)
				.filter(|q| !q.is_empty())
				.map(String::from),
			..PostQuery::page(&paginate)
		}
	}
}

/// A post together with everything shown on its page.
#[derive(Debug, Serialize, JsonSchema)]
pub struct PostDetail {
	pub post: Post,
	pub category: Option<Category>,
	pub tags: Vec<Tag>,
	/// The comments the viewer may see, newest first.
	pub comments: Vec<Comment>,
	/// The number of approved comments.
	pub comment_count: i64,
	/// Up to three other published posts, from the same category if set.
	pub related_posts: Vec<Post>,
}

#[derive(Deserialize, Validate, JsonSchema)]
pub struct DashboardInput {
	/// The page number to return (1-indexed).
	#[validate(range(min = 1, max = 100))]
	#[serde(default = "crate::route::model::one")]
	pub page: i64,
	/// The number of posts to return per page.
	#[validate(range(min = 1, max = 100))]
	#[serde(default = "ten")]
	pub size: i64,
}

#[inline]
fn ten() -> i64 {
	10
}

impl DashboardInput {
	pub fn offset(&self) -> i64 {
		(self.page - 1) * self.size
	}
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct Dashboard {
	pub posts: Vec<Post>,
	pub counts: PostCounts,
}

#[cfg(test)]
mod test {
	use chrono::Duration;

	use super::*;

	fn input(status: PostStatus) -> CreatePostInput {
		CreatePostInput {
			title: "Hello".into(),
			slug: None,
			content: "World".into(),
			image: None,
			category_id: None,
			tag_ids: Vec::new(),
			status,
		}
	}

	#[test]
	fn test_new_published_post_gets_published_at() {
		let now = Utc::now();
		let post = Post::new(Uuid::new_v4(), input(PostStatus::Published), now);

		assert_eq!(post.published_at, Some(now));
		assert!(post.slug.is_empty());
	}

	#[test]
	fn test_draft_never_has_published_at() {
		let now = Utc::now();
		let post = Post::new(Uuid::new_v4(), input(PostStatus::Draft), now);

		assert_eq!(post.published_at, None);
	}

	#[test]
	fn test_republishing_recomputes_published_at() {
		let first = Utc::now();
		let mut post = Post::new(Uuid::new_v4(), input(PostStatus::Published), first);

		let later = first + Duration::minutes(5);
		post.apply(
			UpdatePostInput {
				status: Some(PostStatus::Published),
				..UpdatePostInput::default()
			},
			later,
		);
		assert_eq!(post.published_at, Some(first));

		post.apply(
			UpdatePostInput {
				status: Some(PostStatus::Draft),
				..UpdatePostInput::default()
			},
			later,
		);
		assert_eq!(post.published_at, None);

		let latest = later + Duration::minutes(5);
		post.apply(
			UpdatePostInput {
				status: Some(PostStatus::Published),
				..UpdatePostInput::default()
			},
			latest,
		);
		assert_eq!(post.published_at, Some(latest));
		assert_eq!(post.updated_at, latest);
	}

	#[test]
	fn test_title_change_keeps_slug() {
		let now = Utc::now();
		let mut post = Post::new(Uuid::new_v4(), input(PostStatus::Draft), now);
		post.slug = "hello".into();

		post.apply(
			UpdatePostInput {
				title: Some("Goodbye".into()),
				..UpdatePostInput::default()
			},
			now,
		);
		assert_eq!(post.slug, "hello");

		post.apply(
			UpdatePostInput {
				slug: Some(None),
				..UpdatePostInput::default()
			},
			now,
		);
		assert!(post.slug.is_empty());
	}

	#[test]
	fn test_update_can_clear_category() {
		let now = Utc::now();
		let category = Uuid::new_v4();
		let mut post = Post::new(
			Uuid::new_v4(),
			CreatePostInput {
				category_id: Some(category),
				..input(PostStatus::Draft)
			},
			now,
		);

		post.apply(UpdatePostInput::default(), now);
		assert_eq!(post.category_id, Some(category));

		post.apply(
			UpdatePostInput {
				category_id: Some(None),
				..UpdatePostInput::default()
			},
			now,
		);
		assert_eq!(post.category_id, None);
	}

	#[test]
	fn test_update_input_distinguishes_null_from_missing() {
		let input: UpdatePostInput = serde_json::from_str(r#"{ "category_id": null }"#).unwrap();
		assert_eq!(input.category_id, Some(None));

		let input: UpdatePostInput = serde_json::from_str(r#"{ "title": "x" }"#).unwrap();
		assert_eq!(input.category_id, None);
		assert_eq!(input.title.as_deref(), Some("x"));
	}

	#[test]
	fn test_query_matches_search_case_insensitively() {
		let now = Utc::now();
		let post = Post::new(Uuid::new_v4(), input(PostStatus::Published), now);

		let query = PostQuery {
			search: Some("WORLD".into()),
			..PostQuery::published(10, 0)
		};
		assert!(query.matches(&post));

		let query = PostQuery {
			search: Some("missing".into()),
			..PostQuery::published(10, 0)
		};
		assert!(!query.matches(&post));
	}
}
