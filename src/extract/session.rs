use std::sync::Arc;

use aide::OperationInput;
use axum::{
	extract::{FromRef, FromRequestParts, Request, State},
	http::{header, request, HeaderMap},
	middleware::Next,
	response::Response,
};
use uuid::Uuid;

use crate::{
	error::RouteError,
	openapi::SECURITY_SCHEME_SESSION,
	role::{Role, RoleRegistry},
	route::auth,
	session,
	store::DynStore,
	AppState,
};

/// Extracts the session and related user from the request.
///
/// If it does not exist, a [`auth::Error::NoSessionCookie`] is returned.
/// If the session is invalid, a [`auth::Error::InvalidSessionCookie`] is returned.
///
/// A user without any role (and not a superuser) is given the Reader role
/// on the way through, so accounts created before the roles were seeded
/// heal themselves on their next request. [`resolve_session`] does this for
/// every request, and leaves the session behind for this extractor.
///
/// ```rust
/// async fn route(session: Session) {
///   println!("{:?}", session.user);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Session {
	pub id: Uuid,
	pub user: auth::model::User,
}

impl Session {
	/// Looks up the session named by the request's cookie, healing the
	/// user's roles if needed.
	async fn resolve(
		headers: &HeaderMap,
		store: &DynStore,
		roles: &RoleRegistry,
	) -> Result<Self, RouteError<auth::Error>> {
		let cookies = headers
			.get_all(header::COOKIE)
			.into_iter()
			.filter_map(|value| value.to_str().ok());

		let session_id = session::find_session_id(cookies)
			.ok_or(auth::Error::NoSessionCookie)?
			.map_err(|_| auth::Error::InvalidSessionCookie)?;

		let user = store
			.user_by_session(session_id)
			.await?
			.ok_or(auth::Error::InvalidSessionCookie)?;

		let mut session = Session {
			id: session_id,
			user,
		};

		session.heal_roles(store, roles).await;

		Ok(session)
	}

	/// Assigns Reader to a user that holds no role at all.
	async fn heal_roles(&mut self, store: &DynStore, roles: &RoleRegistry) {
		if self.user.is_superuser || !self.user.roles.is_empty() || !roles.defines(Role::Reader) {
			return;
		}

		match store.assign_role(self.user.id, Role::Reader).await {
			Ok(true) => {
				tracing::info!(user = %self.user.id, "assigned default reader role");
				self.user.roles.push(Role::Reader);
			}
			Ok(false) => {
				tracing::warn!(user = %self.user.id, "reader role is not seeded yet");
			}
			Err(error) => {
				tracing::error!(user = %self.user.id, %error, "failed to assign default role");
			}
		}
	}
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Session
where
	DynStore: FromRef<S>,
	Arc<RoleRegistry>: FromRef<S>,
	S: Sync + Send,
{
	type Rejection = RouteError<auth::Error>;

	/// Extracts the session from the request using a session cookie.
	async fn from_request_parts(
		parts: &mut request::Parts,
		state: &S,
	) -> Result<Self, Self::Rejection> {
		if let Some(session) = parts.extensions.get::<Session>() {
			return Ok(session.clone());
		}

		Session::resolve(
			&parts.headers,
			&DynStore::from_ref(state),
			&Arc::<RoleRegistry>::from_ref(state),
		)
		.await
	}
}

/// Resolves the session of every request before it is routed, so that the
/// default role is attached even on routes that never look at the session.
///
/// Anonymous requests pass through untouched. A store failure is logged and
/// the request continues, and the extractor will try again if the route
/// needs the session.
pub async fn resolve_session(
	State(state): State<AppState>,
	mut request: Request,
	next: Next,
) -> Response {
	match Session::resolve(request.headers(), &state.store, &state.roles).await {
		Ok(session) => {
			request.extensions_mut().insert(session);
		}
		Err(RouteError::Route(auth::Error::NoSessionCookie | auth::Error::InvalidSessionCookie)) => {}
		Err(error) => {
			tracing::error!(?error, "failed to resolve session");
		}
	}

	next.run(request).await
}

impl OperationInput for Session {
	/// Operation input for the session extractor.
	///
	/// This adds a session cookie requirement to the `OpenAPI` operation.
	fn operation_input(_ctx: &mut aide::gen::GenContext, operation: &mut aide::openapi::Operation) {
		operation.security.push(
			[(SECURITY_SCHEME_SESSION.to_string(), Vec::new())]
				.into_iter()
				.collect(),
		);
	}
}

/// The session, if the request carries a valid one.
///
/// Anonymous requests (no cookie, or a cookie for a session that no longer
/// exists) extract as `Viewer(None)` instead of being rejected.
#[derive(Debug)]
pub struct Viewer(pub Option<Session>);

impl Viewer {
	pub fn user(&self) -> Option<&auth::model::User> {
		self.0.as_ref().map(|session| &session.user)
	}
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Viewer
where
	DynStore: FromRef<S>,
	Arc<RoleRegistry>: FromRef<S>,
	S: Sync + Send,
{
	type Rejection = RouteError<auth::Error>;

	async fn from_request_parts(
		parts: &mut request::Parts,
		state: &S,
	) -> Result<Self, Self::Rejection> {
		match Session::from_request_parts(parts, state).await {
			Ok(session) => Ok(Self(Some(session))),
			Err(RouteError::Route(
				auth::Error::NoSessionCookie | auth::Error::InvalidSessionCookie,
			)) => Ok(Self(None)),
			Err(error) => Err(error),
		}
	}
}

impl OperationInput for Viewer {
	fn operation_input(ctx: &mut aide::gen::GenContext, operation: &mut aide::openapi::Operation) {
		Session::operation_input(ctx, operation);

		// An empty requirement marks the cookie as optional.
		operation.security.push(Default::default());
	}
}
