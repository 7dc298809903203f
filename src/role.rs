use std::{
	collections::{BTreeMap, BTreeSet},
	fmt,
	str::FromStr,
};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::route::auth::model::User;

/// A named capability group held by a user.
#[derive(
	Debug,
	Clone,
	Copy,
	PartialEq,
	Eq,
	Hash,
	PartialOrd,
	Ord,
	Serialize,
	Deserialize,
	JsonSchema,
	sqlx::Type,
)]
#[sqlx(type_name = "role_name", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
	Admin,
	Author,
	Reader,
}

impl Role {
	pub const ALL: [Role; 3] = [Role::Admin, Role::Author, Role::Reader];

	pub fn name(self) -> &'static str {
		match self {
			Self::Admin => "Admin",
			Self::Author => "Author",
			Self::Reader => "Reader",
		}
	}
}

impl fmt::Display for Role {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

#[derive(Debug, thiserror::Error)]
#[error("unknown role {0:?}, expected admin, author or reader")]
pub struct UnknownRole(String);

impl FromStr for Role {
	type Err = UnknownRole;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::ALL
			.into_iter()
			.find(|role| role.name().eq_ignore_ascii_case(s))
			.ok_or_else(|| UnknownRole(s.to_string()))
	}
}

/// A single capability that a role can grant.
#[derive(
	Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
	AddPost,
	ChangePost,
	DeletePost,
	ViewPost,
	AddComment,
	ChangeComment,
	DeleteComment,
	ViewComment,
	ManageTaxonomy,
	ManageUsers,
}

impl Permission {
	pub const ALL: [Permission; 10] = [
		Permission::AddPost,
		Permission::ChangePost,
		Permission::DeletePost,
		Permission::ViewPost,
		Permission::AddComment,
		Permission::ChangeComment,
		Permission::DeleteComment,
		Permission::ViewComment,
		Permission::ManageTaxonomy,
		Permission::ManageUsers,
	];

	/// The stable name stored alongside a seeded role.
	pub fn codename(self) -> &'static str {
		match self {
			Self::AddPost => "add_post",
			Self::ChangePost => "change_post",
			Self::DeletePost => "delete_post",
			Self::ViewPost => "view_post",
			Self::AddComment => "add_comment",
			Self::ChangeComment => "change_comment",
			Self::DeleteComment => "delete_comment",
			Self::ViewComment => "view_comment",
			Self::ManageTaxonomy => "manage_taxonomy",
			Self::ManageUsers => "manage_users",
		}
	}
}

/// The table of roles and the permissions each of them grants.
///
/// It is built once when the process starts and handed to every
/// authorization check explicitly, through the application state.
/// A role that the registry does not define is never satisfied, so
/// a partially configured registry degrades to "deny" instead of failing.
#[derive(Debug, Clone, Default)]
pub struct RoleRegistry {
	grants: BTreeMap<Role, BTreeSet<Permission>>,
}

impl RoleRegistry {
	/// The registry used by the application: Admin gets everything, Authors
	/// manage posts and comments, Readers view posts and comment.
	pub fn standard() -> Self {
		use Permission::*;

		Self::default()
			.with_role(Role::Admin, Permission::ALL)
			.with_role(
				Role::Author,
				[
					AddPost,
					ChangePost,
					DeletePost,
					ViewPost,
					AddComment,
					ChangeComment,
					DeleteComment,
					ViewComment,
				],
			)
			.with_role(Role::Reader, [ViewPost, AddComment])
	}

	pub fn with_role(mut self, role: Role, permissions: impl IntoIterator<Item = Permission>) -> Self {
		self.grants
			.entry(role)
			.or_default()
			.extend(permissions);
		self
	}

	pub fn defines(&self, role: Role) -> bool {
		self.grants.contains_key(&role)
	}

	pub fn permissions(&self, role: Role) -> impl Iterator<Item = Permission> + '_ {
		self.grants.get(&role).into_iter().flatten().copied()
	}

	pub fn roles(&self) -> impl Iterator<Item = Role> + '_ {
		self.grants.keys().copied()
	}

	pub fn has_role(&self, user: &User, role: Role) -> bool {
		self.defines(role) && user.roles.contains(&role)
	}

	/// Superusers are administrators whether or not they hold the role.
	pub fn is_admin(&self, user: &User) -> bool {
		user.is_superuser || self.has_role(user, Role::Admin)
	}

	pub fn is_author(&self, user: &User) -> bool {
		self.has_role(user, Role::Author)
	}

	pub fn is_reader(&self, user: &User) -> bool {
		self.has_role(user, Role::Reader)
	}

	/// Every permission the user holds through their roles.
	pub fn effective_permissions(&self, user: &User) -> BTreeSet<Permission> {
		if user.is_superuser {
			return Permission::ALL.into_iter().collect();
		}

		user.roles
			.iter()
			.flat_map(|role| self.permissions(*role))
			.collect()
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::test::user_with;

	#[test]
	fn test_standard_registry_defines_every_role() {
		let registry = RoleRegistry::standard();

		for role in Role::ALL {
			assert!(registry.defines(role));
		}

		assert_eq!(registry.permissions(Role::Admin).count(), Permission::ALL.len());
		assert!(registry
			.permissions(Role::Reader)
			.eq([Permission::ViewPost, Permission::AddComment]));
	}

	#[test]
	fn test_superuser_is_admin_without_role() {
		let registry = RoleRegistry::standard();
		let mut user = user_with(&[]);

		assert!(!registry.is_admin(&user));

		user.is_superuser = true;

		assert!(registry.is_admin(&user));
		assert!(!registry.is_author(&user));
		assert_eq!(
			registry.effective_permissions(&user).len(),
			Permission::ALL.len()
		);
	}

	#[test]
	fn test_undefined_role_is_never_held() {
		let registry = RoleRegistry::default().with_role(Role::Reader, [Permission::ViewPost]);
		let user = user_with(&[Role::Author, Role::Reader]);

		assert!(!registry.is_author(&user));
		assert!(registry.is_reader(&user));
		assert!(registry
			.effective_permissions(&user)
			.contains(&Permission::ViewPost));
	}

	#[test]
	fn test_role_from_str() {
		assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
		assert_eq!("Author".parse::<Role>().unwrap(), Role::Author);
		assert!("editor".parse::<Role>().is_err());
	}
}
