use aide::axum::IntoApiResponse;
use axum::{extract::State, http::StatusCode};
use chrono::Utc;
use macros::route;
use uuid::Uuid;

use crate::{
	extract::{Json, Path, Query, Session, Viewer},
	mail::{self, MailError},
	openapi::tag,
	policy,
	route::{comment::model::CommentQuery, model::SlugPath},
	slug,
	store::{DynStore, StoreError, Unique},
	AppState,
};

use super::{model, Error, RouteError, RESERVED_SLUGS};

/// The number of related posts shown under a post.
const RELATED_POSTS: i64 = 3;

#[derive(Debug, thiserror::Error)]
enum NotifyError {
	#[error("author {0} no longer exists")]
	MissingAuthor(Uuid),
	#[error(transparent)]
	Store(#[from] StoreError),
	#[error(transparent)]
	Mail(#[from] MailError),
}

/// Emails every admin about a published post.
async fn send_publish_notice(state: &AppState, post: &model::Post) -> Result<(), NotifyError> {
	let recipients = state.store.admin_emails().await?;

	if recipients.is_empty() {
		tracing::debug!(post = %post.id, "no admins to notify");
		return Ok(());
	}

	let author = state
		.store
		.user_by_id(post.author_id)
		.await?
		.ok_or(NotifyError::MissingAuthor(post.author_id))?;

	let category = match post.category_id {
		Some(id) => state.store.category_by_id(id).await?,
		None => None,
	};

	let message = mail::publish_notice(&state.config, post, &author, category.as_ref(), recipients);
	state.mailer.send(message).await?;

	Ok(())
}

/// Runs after a post is saved. A failed notification never fails the save.
async fn notify_published(state: &AppState, post: &model::Post) {
	if !post.is_published() || !state.config.notify_on_publish {
		return;
	}

	match send_publish_notice(state, post).await {
		Ok(()) => tracing::info!(post = %post.id, "sent publish notification"),
		Err(error) => tracing::error!(post = %post.id, %error, "failed to send publish notification"),
	}
}

/// Whether `candidate` is used by a post other than `exclude`, or reserved.
async fn slug_taken(
	store: &DynStore,
	candidate: String,
	exclude: Option<Uuid>,
) -> Result<bool, StoreError> {
	if RESERVED_SLUGS.contains(&candidate.as_str()) {
		return Ok(true);
	}

	store.post_slug_taken(&candidate, exclude).await
}

/// Assigns a slug to a post that has none, or checks an explicit one.
async fn assign_slug(store: &DynStore, post: &mut model::Post) -> Result<(), RouteError> {
	if post.slug.is_empty() {
		let id = post.id;
		let base = slug::slugify_or(&post.title, "post");

		post.slug = slug::unique(&base, |candidate| slug_taken(store, candidate, Some(id))).await?;

		return Ok(());
	}

	if slug_taken(store, post.slug.clone(), Some(post.id)).await? {
		return Err(Error::SlugTaken(post.slug.clone()).into());
	}

	Ok(())
}

/// Makes sure the category and tags a post points to exist.
async fn check_terms(store: &DynStore, post: &model::Post) -> Result<(), RouteError> {
	if let Some(id) = post.category_id {
		if store.category_by_id(id).await?.is_none() {
			return Err(Error::UnknownCategoryId(id).into());
		}
	}

	if !post.tag_ids.is_empty() {
		let found = store.tags_by_ids(&post.tag_ids).await?;
		let missing = post
			.tag_ids
			.iter()
			.filter(|id| !found.iter().any(|tag| tag.id == **id))
			.copied()
			.collect::<Vec<_>>();

		if !missing.is_empty() {
			return Err(Error::UnknownTagIds(missing).into());
		}
	}

	Ok(())
}

fn slug_conflict(error: StoreError, slug: &str) -> RouteError {
	match error {
		StoreError::Conflict(Unique::PostSlug) => Error::SlugTaken(slug.to_string()).into(),
		error => error.into(),
	}
}

/// Loads a post the viewer is allowed to see. Hidden posts are reported
/// exactly like missing ones.
async fn visible_post(
	state: &AppState,
	viewer: &Viewer,
	slug: String,
) -> Result<model::Post, RouteError> {
	match state.store.post_by_slug(&slug).await? {
		Some(post) if policy::can_view_post(&state.roles, viewer.user(), &post) => Ok(post),
		_ => Err(Error::UnknownPost(slug).into()),
	}
}

/// List posts
/// Returns published posts, newest first, optionally filtered by a search
/// over their title and content.
#[route(tag = tag::POST)]
pub async fn get_posts(
	State(store): State<DynStore>,
	Query(search): Query<model::SearchInput>,
) -> Result<Json<Vec<model::Post>>, RouteError> {
	Ok(Json(store.posts(&search.query()).await?))
}

/// List posts in category
/// Returns published posts in the given category, newest first.
#[route(tag = tag::POST)]
pub async fn get_category_posts(
	State(store): State<DynStore>,
	Path(SlugPath { slug }): Path<SlugPath>,
	Query(paginate): Query<model::Paginate>,
) -> Result<Json<Vec<model::Post>>, RouteError> {
	let Some(category) = store.category_by_slug(&slug).await? else {
		return Err(Error::UnknownCategory(slug).into());
	};

	let query = model::PostQuery {
		category_id: Some(category.id),
		..model::PostQuery::page(&paginate)
	};

	Ok(Json(store.posts(&query).await?))
}

/// List posts with tag
/// Returns published posts carrying the given tag, newest first.
#[route(tag = tag::POST)]
pub async fn get_tag_posts(
	State(store): State<DynStore>,
	Path(SlugPath { slug }): Path<SlugPath>,
	Query(paginate): Query<model::Paginate>,
) -> Result<Json<Vec<model::Post>>, RouteError> {
	let Some(tag) = store.tag_by_slug(&slug).await? else {
		return Err(Error::UnknownTag(slug).into());
	};

	let query = model::PostQuery {
		tag_id: Some(tag.id),
		..model::PostQuery::page(&paginate)
	};

	Ok(Json(store.posts(&query).await?))
}

/// Get post
/// Returns a post with its category, tags, visible comments and related posts.
///
/// Drafts are only visible to their author and admins. The author and
/// admins also see unapproved comments.
#[route(tag = tag::POST)]
pub async fn get_post(
	State(state): State<AppState>,
	viewer: Viewer,
	Path(SlugPath { slug }): Path<SlugPath>,
) -> Result<Json<model::PostDetail>, RouteError> {
	let post = visible_post(&state, &viewer, slug).await?;
	let sees_everything = policy::sees_everything(&state.roles, viewer.user(), &post);

	let category = match post.category_id {
		Some(id) => state.store.category_by_id(id).await?,
		None => None,
	};
	let tags = state.store.tags_by_ids(&post.tag_ids).await?;
	let comments = state
		.store
		.comments(&CommentQuery::for_post(post.id, !sees_everything))
		.await?;
	let comment_count = state.store.approved_comment_count(post.id).await?;

	let related_posts = state
		.store
		.posts(&model::PostQuery {
			category_id: post.category_id,
			exclude: Some(post.id),
			..model::PostQuery::published(RELATED_POSTS, 0)
		})
		.await?;

	Ok(Json(model::PostDetail {
		post,
		category,
		tags,
		comments,
		comment_count,
		related_posts,
	}))
}

/// Get dashboard
/// Returns the posts the user manages, with counts by status.
///
/// Admins see every post, authors only their own.
#[route(tag = tag::POST)]
pub async fn get_dashboard(
	State(state): State<AppState>,
	session: Session,
	Query(input): Query<model::DashboardInput>,
) -> Result<Json<model::Dashboard>, RouteError> {
	policy::require_author_or_admin(&state.roles, Some(&session.user))?;

	let author_id = (!state.roles.is_admin(&session.user)).then_some(session.user.id);

	let posts = state
		.store
		.posts(&model::PostQuery {
			author_id,
			limit: input.size,
			offset: input.offset(),
			..model::PostQuery::default()
		})
		.await?;
	let counts = state.store.post_counts(author_id).await?;

	Ok(Json(model::Dashboard { posts, counts }))
}

/// Create post
/// Creates a post written by the authenticated user.
///
/// The slug is derived from the title when none is given. Publishing
/// notifies the administrators by email.
#[route(tag = tag::POST)]
pub async fn create_post(
	State(state): State<AppState>,
	session: Session,
	Json(input): Json<model::CreatePostInput>,
) -> Result<Json<model::Post>, RouteError> {
	policy::require_author_or_admin(&state.roles, Some(&session.user))?;

	let mut post = model::Post::new(session.user.id, input, Utc::now());

	check_terms(&state.store, &post).await?;
	assign_slug(&state.store, &mut post).await?;

	let post = state
		.store
		.insert_post(&post)
		.await
		.map_err(|error| slug_conflict(error, &post.slug))?;

	tracing::info!(post = %post.id, slug = %post.slug, "created post");

	notify_published(&state, &post).await;

	Ok(Json(post))
}

/// Update post
/// Updates a post. Only its author and admins may do so.
///
/// Changing the title keeps the slug; sending an empty slug derives a new
/// one from the current title.
#[route(tag = tag::POST)]
pub async fn update_post(
	State(state): State<AppState>,
	session: Session,
	Path(SlugPath { slug }): Path<SlugPath>,
	Json(input): Json<model::UpdatePostInput>,
) -> Result<Json<model::Post>, RouteError> {
	let Some(mut post) = state.store.post_by_slug(&slug).await? else {
		return Err(Error::UnknownPost(slug).into());
	};

	policy::require_post_owner_or_admin(&state.roles, Some(&session.user), &post)?;

	post.apply(input, Utc::now());

	check_terms(&state.store, &post).await?;
	assign_slug(&state.store, &mut post).await?;

	let post = state
		.store
		.update_post(&post)
		.await
		.map_err(|error| slug_conflict(error, &post.slug))?;

	tracing::info!(post = %post.id, slug = %post.slug, "updated post");

	notify_published(&state, &post).await;

	Ok(Json(post))
}

/// Delete post
/// Deletes a post and its comments. Only its author and admins may do so.
#[route(tag = tag::POST, response(status = 204, description = "Deleted successfully."))]
pub async fn delete_post(
	State(state): State<AppState>,
	session: Session,
	Path(SlugPath { slug }): Path<SlugPath>,
) -> Result<impl IntoApiResponse, RouteError> {
	let Some(post) = state.store.post_by_slug(&slug).await? else {
		return Err(Error::UnknownPost(slug).into());
	};

	policy::require_post_owner_or_admin(&state.roles, Some(&session.user), &post)?;

	state.store.delete_post(post.id).await?;

	tracing::info!(post = %post.id, "deleted post");

	Ok(StatusCode::NO_CONTENT)
}
