use axum::extract::State;
use chrono::Utc;
use macros::route;

use crate::{
	extract::{Json, Path, Query, Session},
	openapi::tag,
	policy::{self, PermissionDenied},
	route::{
		model::{IdPath, SlugPath},
		post::model::Post,
	},
	AppState,
};

use super::{model, Error, RouteError};

/// Loads a comment together with the post it belongs to.
async fn comment_with_post(
	state: &AppState,
	id: uuid::Uuid,
) -> Result<(model::Comment, Post), RouteError> {
	let comment = state
		.store
		.comment_by_id(id)
		.await?
		.ok_or(Error::UnknownComment(id))?;

	// A comment never outlives its post, so a miss here is a race with a delete.
	let post = state
		.store
		.post_by_id(comment.post_id)
		.await?
		.ok_or(Error::UnknownComment(id))?;

	Ok((comment, post))
}

/// Post comment
/// Adds a comment to a post as the authenticated user.
///
/// A session may comment on the same post at most once every 30 seconds
/// (configurable). Comments are approved right away.
#[route(tag = tag::COMMENT)]
pub async fn create_comment(
	State(state): State<AppState>,
	session: Session,
	Path(SlugPath { slug }): Path<SlugPath>,
	Json(input): Json<model::CreateCommentInput>,
) -> Result<Json<model::CommentOutcome>, RouteError> {
	let post = match state.store.post_by_slug(&slug).await? {
		Some(post) if policy::can_view_post(&state.roles, Some(&session.user), &post) => post,
		_ => return Err(Error::UnknownPost(slug).into()),
	};

	let now = Utc::now();
	let last = state.store.last_comment_at(session.id, post.id).await?;

	if let Err(throttled) = state.config.comment_throttle.check(last, now) {
		tracing::debug!(post = %post.id, user = %session.user.id, "comment throttled");

		return Err(Error::Throttled {
			slug: post.slug,
			throttled,
		}
		.into());
	}

	let comment = state
		.store
		.insert_comment(
			&model::Comment::new(post.id, session.user.id, input.content, now),
			Some(session.id),
		)
		.await?;

	tracing::info!(comment = %comment.id, post = %post.id, "posted comment");

	Ok(Json(model::CommentOutcome {
		comment: Some(comment),
		post_slug: post.slug,
		message: "Your comment has been posted!".into(),
	}))
}

/// Approve comment
/// Marks a comment as approved. Only the post's author and admins may do so.
#[route(tag = tag::COMMENT)]
pub async fn approve_comment(
	State(state): State<AppState>,
	session: Session,
	Path(IdPath { id }): Path<IdPath>,
) -> Result<Json<model::CommentOutcome>, RouteError> {
	let (_, post) = comment_with_post(&state, id).await?;

	if !policy::can_moderate_comment(&state.roles, Some(&session.user), &post) {
		return Err(
			PermissionDenied::new("You do not have permission to moderate comments.")
				.redirect(post.slug)
				.into(),
		);
	}

	let comment = state
		.store
		.approve_comment(id)
		.await?
		.ok_or(Error::UnknownComment(id))?;

	tracing::info!(comment = %id, user = %session.user.id, "approved comment");

	Ok(Json(model::CommentOutcome {
		comment: Some(comment),
		post_slug: post.slug,
		message: "Comment approved successfully!".into(),
	}))
}

/// Delete comment
/// Deletes a comment. Its writer, the post's author and admins may do so.
#[route(tag = tag::COMMENT)]
pub async fn delete_comment(
	State(state): State<AppState>,
	session: Session,
	Path(IdPath { id }): Path<IdPath>,
) -> Result<Json<model::CommentOutcome>, RouteError> {
	let (comment, post) = comment_with_post(&state, id).await?;

	if !policy::can_delete_comment(&state.roles, Some(&session.user), &comment, &post) {
		return Err(
			PermissionDenied::new("You do not have permission to delete this comment.")
				.redirect(post.slug)
				.into(),
		);
	}

	if !state.store.delete_comment(id).await? {
		return Err(Error::UnknownComment(id).into());
	}

	tracing::info!(comment = %id, user = %session.user.id, "deleted comment");

	Ok(Json(model::CommentOutcome {
		comment: None,
		post_slug: post.slug,
		message: "Comment deleted successfully!".into(),
	}))
}

/// Get moderation queue
/// Returns the comments the user may moderate, newest first.
///
/// Admins see every comment, authors the comments on their own posts.
#[route(tag = tag::COMMENT)]
pub async fn get_moderation(
	State(state): State<AppState>,
	session: Session,
	Query(input): Query<model::ModerationInput>,
) -> Result<Json<Vec<model::Comment>>, RouteError> {
	if !policy::can_access_moderation(&state.roles, Some(&session.user)) {
		return Err(PermissionDenied::new("You do not have permission to access this page.").into());
	}

	let post_author_id = (!state.roles.is_admin(&session.user)).then_some(session.user.id);

	let comments = state
		.store
		.comments(&model::CommentQuery {
			post_author_id,
			limit: input.size,
			offset: input.offset(),
			..model::CommentQuery::default()
		})
		.await?;

	Ok(Json(comments))
}
