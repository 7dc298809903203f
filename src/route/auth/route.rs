use aide::axum::IntoApiResponse;
use axum::{
	extract::State,
	http::{header, StatusCode},
	response::IntoResponse,
};
use macros::route;
use uuid::Uuid;

use crate::{
	extract::{Json, Session},
	openapi::tag,
	role::Role,
	session,
	store::{StoreError, Unique},
	AppState,
};

use super::{hash_password, model, Error, RouteError};

/// Maps the uniqueness rules on accounts to their route errors.
fn account_conflict(error: StoreError) -> RouteError {
	match error {
		StoreError::Conflict(Unique::UserEmail) => Error::EmailTaken.into(),
		StoreError::Conflict(Unique::UserUsername) => Error::UsernameTaken.into(),
		error => error.into(),
	}
}

fn welcome(username: &str, role: Role) -> String {
	match role {
		Role::Author => format!(
			"Welcome, {username}! Your Author account has been created. You can now create and manage posts."
		),
		_ => format!(
			"Welcome, {username}! Your account has been created. You can view posts and comment."
		),
	}
}

/// Log in
/// Logs in to an account by email, returning an associated session cookie.
#[route(tag = tag::AUTH, response(status = 200, description = "Logged in successfully.", shape = "Json<model::Session>"))]
pub async fn login(
	State(state): State<AppState>,
	Json(auth): Json<model::LoginInput>,
) -> Result<impl IntoApiResponse, RouteError> {
	let Some(user) = state.store.user_by_email(&auth.email).await? else {
		return Err(Error::InvalidEmailOrPassword.into());
	};

	let hashed = hash_password(&state.hasher, &auth.password, &user.id).map_err(Error::Argon)?;

	if user.password != hashed {
		return Err(Error::InvalidEmailOrPassword.into());
	}

	let session = state.store.create_session(user.id).await?;
	let cookie = session::create_cookie(session.id);

	tracing::info!(user = %user.id, "logged in");

	Ok(([(header::SET_COOKIE, cookie.to_string())], Json(session)))
}

/// Log out
/// Logs out of the authenticated account and clears the session cookie.
#[route(tag = tag::AUTH, response(status = 204, description = "Logged out successfully."))]
pub async fn logout(
	State(state): State<AppState>,
	session: Session,
) -> Result<impl IntoApiResponse, RouteError> {
	state.store.delete_session(session.id).await?;

	Ok((
		[(header::SET_COOKIE, session::clear_cookie().to_string())],
		StatusCode::NO_CONTENT,
	)
		.into_response())
}

/// Register account
/// Registers a new Author or Reader account and logs it in.
///
/// If the roles have not been seeded yet, the account is still created and
/// a warning is returned instead of a role.
#[route(tag = tag::AUTH, response(status = 200, description = "Registered successfully.", shape = "Json<model::Registration>"))]
pub async fn register(
	State(state): State<AppState>,
	Json(input): Json<model::RegisterInput>,
) -> Result<impl IntoApiResponse, RouteError> {
	if state.store.user_by_email(&input.email).await?.is_some() {
		return Err(Error::EmailTaken.into());
	}

	let user_id = Uuid::new_v4();
	let hashed = hash_password(&state.hasher, &input.password, &user_id).map_err(Error::Argon)?;

	let requested = Role::from(input.role);
	let (user, session) = state
		.store
		.register_user(
			model::NewUser {
				id: user_id,
				email: input.email,
				username: input.username,
				password: hashed.to_vec(),
				first_name: input.first_name,
				last_name: input.last_name,
				is_superuser: false,
			},
			requested,
		)
		.await
		.map_err(account_conflict)?;

	let assigned = user.roles.contains(&requested);

	let registration = if assigned {
		tracing::info!(user = %user.id, role = %requested, "registered");

		model::Registration {
			message: welcome(&user.username, requested),
			session,
			user,
			role: Some(requested),
			warning: None,
		}
	} else {
		tracing::warn!(user = %user.id, role = %requested, "registered without a role");

		model::Registration {
			message: welcome(&user.username, Role::Reader),
			session,
			user,
			role: None,
			warning: Some(
				"Account created, but role assignment failed. Please contact an administrator."
					.into(),
			),
		}
	};

	let cookie = session::create_cookie(registration.session.id);

	Ok(([(header::SET_COOKIE, cookie.to_string())], Json(registration)))
}

/// Get user
/// Returns the authenticated user with their roles and permissions.
#[route(tag = tag::AUTH)]
pub async fn get_me(State(state): State<AppState>, session: Session) -> Json<model::Profile> {
	Json(model::Profile::new(session.user, &state.roles))
}

/// Update user
/// Updates the authenticated user's email and name.
#[route(tag = tag::AUTH)]
pub async fn update_me(
	State(state): State<AppState>,
	session: Session,
	Json(input): Json<model::UpdateProfileInput>,
) -> Result<Json<model::Profile>, RouteError> {
	let mut user = state
		.store
		.update_user(session.user.id, input)
		.await
		.map_err(account_conflict)?;

	// The extractor may have just healed the roles.
	user.roles = session.user.roles;

	Ok(Json(model::Profile::new(user, &state.roles)))
}

/// Delete user
/// Deletes the authenticated user along with their posts, comments and sessions. This action is irreversible.
#[route(tag = tag::AUTH, response(status = 204, description = "Deleted successfully."))]
pub async fn delete_me(
	State(state): State<AppState>,
	session: Session,
) -> Result<impl IntoApiResponse, RouteError> {
	state.store.delete_user(session.user.id).await?;

	tracing::info!(user = %session.user.id, "deleted account");

	Ok((
		[(header::SET_COOKIE, session::clear_cookie().to_string())],
		StatusCode::NO_CONTENT,
	))
}
