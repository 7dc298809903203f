use std::borrow::Cow;

use aide::OperationOutput;
use axum::{
	body::Body,
	extract::rejection,
	http::{header, HeaderValue, Response, StatusCode},
	response::IntoResponse,
	Json,
};
use schemars::JsonSchema;
use serde::Serialize;
use tower_governor::GovernorError;

use crate::{policy::PermissionDenied, store::StoreError};

pub type Map = serde_json::Map<String, serde_json::Value>;

/// A single error message sent to the client.
#[derive(Debug, Serialize, JsonSchema)]
pub struct Message<'a> {
	/// A machine-readable code, or a sentence for the user.
	pub content: Cow<'a, str>,
	/// The input field the message is about, if any.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub field: Option<Cow<'a, str>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<Cow<'a, Map>>,
}

impl<'a> Message<'a> {
	pub fn new(content: impl Into<Cow<'a, str>>) -> Self {
		Self {
			content: content.into(),
			field: None,
			details: None,
		}
	}

	pub fn field(mut self, field: impl Into<Cow<'a, str>>) -> Self {
		self.field = Some(field.into());
		self
	}

	pub fn detail(mut self, key: &str, value: impl Serialize) -> Self {
		let value = serde_json::to_value(value).unwrap_or_default();

		self.details
			.get_or_insert_with(|| Cow::Owned(Map::new()))
			.to_mut()
			.insert(key.into(), value);
		self
	}

	pub fn into_vec(self) -> Vec<Self> {
		vec![self]
	}
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ErrorResponse<'a> {
	pub success: bool,
	pub errors: Vec<Message<'a>>,
}

impl<'a> ErrorResponse<'a> {
	pub fn new(errors: Vec<Message<'a>>) -> Self {
		Self {
			success: false,
			errors,
		}
	}
}

/// The status code and messages a route-specific error is presented with.
///
/// Messages are presented to the client, so they should not contain
/// sensitive information.
pub trait ErrorShape {
	fn status(&self) -> StatusCode;
	fn errors(&self) -> Vec<Message<'_>>;
}

/// Errors that any route can produce.
///
/// The Display trait is not sent to the client, so it can show
/// sensitive information.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
	#[error("validation error: {0}")]
	Validation(#[from] validator::ValidationErrors),
	#[error("json error: {0}")]
	Json(#[from] rejection::JsonRejection),
	#[error("query error: {0}")]
	Query(#[from] rejection::QueryRejection),
	#[error("path error: {0}")]
	Path(#[from] rejection::PathRejection),
	#[error("forbidden: {0}")]
	Forbidden(#[from] PermissionDenied),
	#[error("rate limited: {0}")]
	RateLimited(#[from] GovernorError),
	#[error("store error: {0}")]
	Store(#[from] StoreError),
}

fn respond(status: StatusCode, errors: Vec<Message<'_>>) -> Response<Body> {
	(status, Json(ErrorResponse::new(errors))).into_response()
}

impl IntoResponse for AppError {
	fn into_response(self) -> Response<Body> {
		match self {
			Self::Validation(errors) => {
				let messages = errors
					.field_errors()
					.into_iter()
					.flat_map(|(field, errors)| {
						errors.iter().map(move |error| {
							let mut message = Message::new(
								error
									.message
									.clone()
									.unwrap_or_else(|| error.code.clone()),
							)
							.field(field.clone());

							for (key, value) in &error.params {
								if key != "value" {
									message = message.detail(key, value);
								}
							}

							message
						})
					})
					.collect();

				respond(StatusCode::BAD_REQUEST, messages)
			}
			Self::Json(rejection) => respond(
				rejection.status(),
				Message::new(rejection.body_text()).into_vec(),
			),
			Self::Query(rejection) => respond(
				rejection.status(),
				Message::new(rejection.body_text()).into_vec(),
			),
			Self::Path(rejection) => respond(
				rejection.status(),
				Message::new(rejection.body_text()).into_vec(),
			),
			Self::Forbidden(denied) => {
				let mut message = Message::new(denied.message);

				if let Some(slug) = denied.redirect {
					message = message.detail("redirect", slug);
				}

				respond(StatusCode::FORBIDDEN, message.into_vec())
			}
			Self::RateLimited(GovernorError::TooManyRequests { wait_time, headers }) => {
				let mut response = respond(
					StatusCode::TOO_MANY_REQUESTS,
					Message::new("too_many_requests")
						.detail("wait_time", wait_time)
						.into_vec(),
				);

				if let Some(headers) = headers {
					response.headers_mut().extend(headers);
				}

				response
					.headers_mut()
					.insert(header::RETRY_AFTER, HeaderValue::from(wait_time));

				response
			}
			Self::RateLimited(GovernorError::Other { code, msg, headers }) => {
				let mut response = respond(
					code,
					Message::new(msg.unwrap_or_else(|| "rate_limit_error".into())).into_vec(),
				);

				if let Some(headers) = headers {
					response.headers_mut().extend(headers);
				}

				response
			}
			Self::RateLimited(GovernorError::UnableToExtractKey) => {
				tracing::error!("unable to extract rate limiting key");
				respond(StatusCode::INTERNAL_SERVER_ERROR, Vec::new())
			}
			Self::Store(StoreError::Conflict(unique)) => respond(
				StatusCode::CONFLICT,
				Message::new("conflict")
					.detail("constraint", format!("{unique:?}"))
					.into_vec(),
			),
			Self::Store(error) => {
				tracing::error!(%error, "store error");
				respond(StatusCode::INTERNAL_SERVER_ERROR, Vec::new())
			}
		}
	}
}

impl OperationOutput for AppError {
	type Inner = Self;
}

/// The error returned by handlers: either a shared [`AppError`] or one
/// specific to the route's module.
#[derive(Debug)]
pub enum RouteError<T> {
	App(AppError),
	Route(T),
}

impl<T: ErrorShape> From<T> for RouteError<T> {
	fn from(error: T) -> Self {
		Self::Route(error)
	}
}

impl<T> From<AppError> for RouteError<T> {
	fn from(error: AppError) -> Self {
		Self::App(error)
	}
}

impl<T> From<StoreError> for RouteError<T> {
	fn from(error: StoreError) -> Self {
		Self::App(error.into())
	}
}

impl<T> From<PermissionDenied> for RouteError<T> {
	fn from(error: PermissionDenied) -> Self {
		Self::App(error.into())
	}
}

impl<T: ErrorShape> IntoResponse for RouteError<T> {
	fn into_response(self) -> Response<Body> {
		match self {
			Self::App(error) => error.into_response(),
			Self::Route(error) => respond(error.status(), error.errors()),
		}
	}
}

impl<T> OperationOutput for RouteError<T> {
	type Inner = Self;
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_message_details() {
		let message = Message::new("unknown_post")
			.field("slug")
			.detail("slug", "hello");

		let value = serde_json::to_value(&message).unwrap();

		assert_eq!(value["content"], "unknown_post");
		assert_eq!(value["field"], "slug");
		assert_eq!(value["details"]["slug"], "hello");
	}

	#[test]
	fn test_forbidden_is_403() {
		let response =
			AppError::from(PermissionDenied::new("nope").redirect("post")).into_response();

		assert_eq!(response.status(), StatusCode::FORBIDDEN);
	}

	#[test]
	fn test_conflict_is_409() {
		let response =
			AppError::from(StoreError::Conflict(crate::store::Unique::PostSlug)).into_response();

		assert_eq!(response.status(), StatusCode::CONFLICT);
	}
}
