use aide::axum::{
	routing::{delete_with, get_with, post_with},
	ApiRouter,
};
use axum::http::StatusCode;
use uuid::Uuid;

use crate::{error, throttle::Throttled, AppState};

pub mod model;
pub mod route;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("unknown comment {0}")]
	UnknownComment(Uuid),
	#[error("unknown post {0}")]
	UnknownPost(String),
	#[error("Please wait a moment before posting another comment.")]
	Throttled { slug: String, throttled: Throttled },
}

pub type RouteError = error::RouteError<Error>;

/// Routes under `/comments`. Posting a comment lives on the post routes.
pub fn routes() -> ApiRouter<AppState> {
	use route::*;

	ApiRouter::new()
		.api_route("/moderation", get_with(get_moderation, get_moderation_docs))
		.api_route("/:id", delete_with(delete_comment, delete_comment_docs))
		.api_route("/:id/approve", post_with(approve_comment, approve_comment_docs))
}

impl error::ErrorShape for Error {
	fn status(&self) -> StatusCode {
		match self {
			Self::UnknownComment(..) | Self::UnknownPost(..) => StatusCode::NOT_FOUND,
			Self::Throttled { .. } => StatusCode::TOO_MANY_REQUESTS,
		}
	}

	fn errors(&self) -> Vec<error::Message<'_>> {
		match self {
			Self::UnknownComment(id) => error::Message::new("unknown_comment")
				.detail("id", id)
				.into_vec(),
			Self::UnknownPost(slug) => error::Message::new("unknown_post")
				.detail("slug", slug)
				.into_vec(),
			Self::Throttled { slug, throttled } => error::Message::new(self.to_string())
				.field("content")
				.detail("redirect", slug)
				.detail("retry_after", throttled.retry_after.num_seconds().max(1))
				.into_vec(),
		}
	}
}
