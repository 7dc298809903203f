use std::{collections::BTreeSet, sync::LazyLock};

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::role::{Permission, Role, RoleRegistry};

static USERNAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").unwrap());

/// A single user.
#[derive(Debug, Clone, Serialize, JsonSchema, sqlx::FromRow)]
pub struct User {
	/// The unique identifier of the user.
	pub id: Uuid,
	/// The user's email address, used for logging in and notifications.
	#[serde(skip_serializing)]
	pub email: String,
	/// The hashed password.
	#[serde(skip)]
	pub password: Vec<u8>,
	/// The username that is displayed to the public.
	pub username: String,
	pub first_name: Option<String>,
	pub last_name: Option<String>,
	/// Superusers hold every permission, with or without a role.
	pub is_superuser: bool,
	/// The creation time of the user.
	pub created_at: chrono::DateTime<chrono::Utc>,
	/// The roles assigned to the user.
	#[sqlx(skip)]
	pub roles: Vec<Role>,
}

impl User {
	pub fn full_name(&self) -> Option<String> {
		let name = [self.first_name.as_deref(), self.last_name.as_deref()]
			.into_iter()
			.flatten()
			.filter(|part| !part.is_empty())
			.collect::<Vec<_>>()
			.join(" ");

		(!name.is_empty()).then_some(name)
	}
}

/// The fields needed to persist a new account.
#[derive(Debug, Clone)]
pub struct NewUser {
	pub id: Uuid,
	pub email: String,
	pub username: String,
	pub password: Vec<u8>,
	pub first_name: Option<String>,
	pub last_name: Option<String>,
	pub is_superuser: bool,
}

#[derive(Debug, Clone, Serialize, JsonSchema, sqlx::FromRow)]
pub struct Session {
	/// The session id.
	#[serde(rename = "session_id")]
	pub id: Uuid,
	/// The user that owns the session.
	#[serde(skip)]
	pub user_id: Uuid,
	/// The creation time of the session.
	pub created_at: chrono::DateTime<chrono::Utc>,
}

/// The authenticated user's own view of their account.
#[derive(Debug, Serialize, JsonSchema)]
pub struct Profile {
	#[serde(flatten)]
	pub user: User,
	pub email: String,
	pub full_name: Option<String>,
	pub is_admin: bool,
	/// Every permission granted through the user's roles.
	pub permissions: BTreeSet<Permission>,
}

impl Profile {
	pub fn new(user: User, roles: &RoleRegistry) -> Self {
		Self {
			email: user.email.clone(),
			full_name: user.full_name(),
			is_admin: roles.is_admin(&user),
			permissions: roles.effective_permissions(&user),
			user,
		}
	}
}

#[derive(Deserialize, Validate, JsonSchema)]
pub struct LoginInput {
	#[validate(email)]
	pub email: String,
	#[validate(length(min = 8, max = 128))]
	pub password: String,
}

/// The roles a visitor may pick for themselves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationRole {
	Author,
	#[default]
	Reader,
}

impl From<RegistrationRole> for Role {
	fn from(role: RegistrationRole) -> Self {
		match role {
			RegistrationRole::Author => Role::Author,
			RegistrationRole::Reader => Role::Reader,
		}
	}
}

#[derive(Deserialize, Validate, JsonSchema)]
pub struct RegisterInput {
	#[validate(email)]
	pub email: String,
	#[validate(length(min = 8, max = 128))]
	pub password: String,
	/// Must repeat `password` exactly.
	#[validate(must_match(other = "password"))]
	pub password_confirmation: String,
	/// The username that is displayed to the public.
	#[schemars(regex(path = "USERNAME"))]
	#[validate(
		length(min = 3, max = 32),
		regex(path = *USERNAME, message = "username must be alphanumeric")
	)]
	pub username: String,
	#[validate(length(max = 30))]
	pub first_name: Option<String>,
	#[validate(length(max = 30))]
	pub last_name: Option<String>,
	/// Readers view posts and comment, Authors also write posts.
	#[serde(default)]
	pub role: RegistrationRole,
}

/// A partial update of the authenticated user's account. Absent fields are
/// left untouched, and `null` clears a name.
#[derive(Debug, Default, Deserialize, Validate, JsonSchema)]
#[serde(default)]
pub struct UpdateProfileInput {
	#[validate(email)]
	pub email: Option<String>,
	#[validate(length(max = 30))]
	#[serde(deserialize_with = "crate::route::model::nullable")]
	pub first_name: Option<Option<String>>,
	#[validate(length(max = 30))]
	#[serde(deserialize_with = "crate::route::model::nullable")]
	pub last_name: Option<Option<String>>,
}

/// The result of a successful registration.
#[derive(Serialize, JsonSchema)]
pub struct Registration {
	#[serde(flatten)]
	pub session: Session,
	pub user: User,
	/// The role actually attached, absent if roles are not seeded yet.
	pub role: Option<Role>,
	pub message: String,
	pub warning: Option<String>,
}
