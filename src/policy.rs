//! Authorization and visibility decisions.
//!
//! Every function here is pure: it looks at the role registry, the viewer
//! (`None` when the request is anonymous) and the entity in question, and
//! answers without touching the store. Anonymous viewers are denied every
//! mutation.

use crate::{
	role::RoleRegistry,
	route::{auth::model::User, comment::model::Comment, post::model::Post},
};

/// Raised when the viewer may not perform an operation.
///
/// `redirect` names the post slug a client should return to, for call sites
/// that answer with a message instead of a bare rejection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct PermissionDenied {
	pub message: &'static str,
	pub redirect: Option<String>,
}

impl PermissionDenied {
	pub fn new(message: &'static str) -> Self {
		Self {
			message,
			redirect: None,
		}
	}

	pub fn redirect(mut self, slug: impl Into<String>) -> Self {
		self.redirect = Some(slug.into());
		self
	}
}

fn is_admin(roles: &RoleRegistry, viewer: Option<&User>) -> bool {
	viewer.is_some_and(|user| roles.is_admin(user))
}

fn is_author(roles: &RoleRegistry, viewer: Option<&User>) -> bool {
	viewer.is_some_and(|user| roles.is_author(user))
}

fn is_same_user(viewer: Option<&User>, id: uuid::Uuid) -> bool {
	viewer.is_some_and(|user| user.id == id)
}

pub fn can_create_post(roles: &RoleRegistry, viewer: Option<&User>) -> bool {
	is_admin(roles, viewer) || is_author(roles, viewer)
}

pub fn can_edit_post(roles: &RoleRegistry, viewer: Option<&User>, post: &Post) -> bool {
	is_admin(roles, viewer) || (is_author(roles, viewer) && is_same_user(viewer, post.author_id))
}

pub fn can_delete_post(roles: &RoleRegistry, viewer: Option<&User>, post: &Post) -> bool {
	can_edit_post(roles, viewer, post)
}

pub fn can_moderate_comment(roles: &RoleRegistry, viewer: Option<&User>, post: &Post) -> bool {
	is_admin(roles, viewer) || (is_author(roles, viewer) && is_same_user(viewer, post.author_id))
}

/// The comment's own creator may always delete it, whatever their role.
pub fn can_delete_comment(
	roles: &RoleRegistry,
	viewer: Option<&User>,
	comment: &Comment,
	post: &Post,
) -> bool {
	can_moderate_comment(roles, viewer, post) || is_same_user(viewer, comment.user_id)
}

/// Whether the viewer may open the moderation queue at all.
pub fn can_access_moderation(roles: &RoleRegistry, viewer: Option<&User>) -> bool {
	is_admin(roles, viewer) || is_author(roles, viewer)
}

pub fn can_manage_taxonomy(roles: &RoleRegistry, viewer: Option<&User>) -> bool {
	is_admin(roles, viewer)
}

/// Whether the viewer sees the post whatever its status, along with every
/// comment on it (approved or pending).
pub fn sees_everything(roles: &RoleRegistry, viewer: Option<&User>, post: &Post) -> bool {
	is_admin(roles, viewer) || is_same_user(viewer, post.author_id)
}

pub fn can_view_post(roles: &RoleRegistry, viewer: Option<&User>, post: &Post) -> bool {
	post.is_published() || sees_everything(roles, viewer, post)
}

pub fn can_view_comment(
	roles: &RoleRegistry,
	viewer: Option<&User>,
	comment: &Comment,
	post: &Post,
) -> bool {
	can_view_post(roles, viewer, post)
		&& (comment.is_approved || sees_everything(roles, viewer, post))
}

pub fn require_author_or_admin(
	roles: &RoleRegistry,
	viewer: Option<&User>,
) -> Result<(), PermissionDenied> {
	if can_create_post(roles, viewer) {
		Ok(())
	} else {
		Err(PermissionDenied::new(
			"You don't have permission to perform this action.",
		))
	}
}

pub fn require_post_owner_or_admin(
	roles: &RoleRegistry,
	viewer: Option<&User>,
	post: &Post,
) -> Result<(), PermissionDenied> {
	if can_edit_post(roles, viewer, post) {
		Ok(())
	} else {
		Err(PermissionDenied::new(
			"You don't have permission to edit this post.",
		))
	}
}

pub fn require_admin(roles: &RoleRegistry, viewer: Option<&User>) -> Result<(), PermissionDenied> {
	if can_manage_taxonomy(roles, viewer) {
		Ok(())
	} else {
		Err(PermissionDenied::new(
			"You don't have permission to perform this action.",
		))
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::{
		role::{Permission, Role},
		route::post::model::PostStatus,
		test::{comment_on, post_by, user_with},
	};

	#[test]
	fn test_anonymous_is_denied_everything() {
		let roles = RoleRegistry::standard();
		let author = user_with(&[Role::Author]);
		let post = post_by(&author, PostStatus::Published);
		let comment = comment_on(&post, &author, true);

		assert!(!can_create_post(&roles, None));
		assert!(!can_edit_post(&roles, None, &post));
		assert!(!can_delete_post(&roles, None, &post));
		assert!(!can_moderate_comment(&roles, None, &post));
		assert!(!can_delete_comment(&roles, None, &comment, &post));
		assert!(!can_access_moderation(&roles, None));
	}

	#[test]
	fn test_authors_only_manage_their_own_posts() {
		let roles = RoleRegistry::standard();
		let author = user_with(&[Role::Author]);
		let other = user_with(&[Role::Author]);
		let post = post_by(&author, PostStatus::Draft);

		assert!(can_create_post(&roles, Some(&author)));
		assert!(can_edit_post(&roles, Some(&author), &post));
		assert!(can_delete_post(&roles, Some(&author), &post));
		assert!(!can_edit_post(&roles, Some(&other), &post));
		assert!(!can_delete_post(&roles, Some(&other), &post));
		assert!(require_post_owner_or_admin(&roles, Some(&other), &post).is_err());
	}

	#[test]
	fn test_reader_who_wrote_the_post_cannot_edit_it() {
		let roles = RoleRegistry::standard();
		let reader = user_with(&[Role::Reader]);
		let post = post_by(&reader, PostStatus::Published);

		assert!(!can_create_post(&roles, Some(&reader)));
		assert!(!can_edit_post(&roles, Some(&reader), &post));
		assert!(!can_moderate_comment(&roles, Some(&reader), &post));
		assert!(sees_everything(&roles, Some(&reader), &post));
	}

	#[test]
	fn test_admins_and_superusers_can_do_anything() {
		let roles = RoleRegistry::standard();
		let author = user_with(&[Role::Author]);
		let admin = user_with(&[Role::Admin]);
		let mut superuser = user_with(&[]);
		superuser.is_superuser = true;

		let post = post_by(&author, PostStatus::Draft);
		let comment = comment_on(&post, &author, false);

		for viewer in [&admin, &superuser] {
			assert!(can_create_post(&roles, Some(viewer)));
			assert!(can_edit_post(&roles, Some(viewer), &post));
			assert!(can_moderate_comment(&roles, Some(viewer), &post));
			assert!(can_delete_comment(&roles, Some(viewer), &comment, &post));
			assert!(can_view_post(&roles, Some(viewer), &post));
			assert!(can_manage_taxonomy(&roles, Some(viewer)));
		}
	}

	#[test]
	fn test_commenter_can_delete_own_comment() {
		let roles = RoleRegistry::standard();
		let author = user_with(&[Role::Author]);
		let reader = user_with(&[Role::Reader]);
		let stranger = user_with(&[Role::Reader]);
		let post = post_by(&author, PostStatus::Published);
		let comment = comment_on(&post, &reader, true);

		assert!(can_delete_comment(&roles, Some(&reader), &comment, &post));
		assert!(can_delete_comment(&roles, Some(&author), &comment, &post));
		assert!(!can_delete_comment(&roles, Some(&stranger), &comment, &post));
		assert!(!can_moderate_comment(&roles, Some(&reader), &post));
	}

	#[test]
	fn test_author_of_someone_elses_post_cannot_moderate() {
		let roles = RoleRegistry::standard();
		let author = user_with(&[Role::Author]);
		let other = user_with(&[Role::Author]);
		let post = post_by(&author, PostStatus::Published);

		assert!(!can_moderate_comment(&roles, Some(&other), &post));
		assert!(can_access_moderation(&roles, Some(&other)));
	}

	#[test]
	fn test_drafts_are_hidden_from_everyone_but_owner_and_admin() {
		let roles = RoleRegistry::standard();
		let author = user_with(&[Role::Author]);
		let reader = user_with(&[Role::Reader]);
		let admin = user_with(&[Role::Admin]);
		let draft = post_by(&author, PostStatus::Draft);
		let pending = comment_on(&draft, &reader, false);

		assert!(!can_view_post(&roles, None, &draft));
		assert!(!can_view_post(&roles, Some(&reader), &draft));
		assert!(can_view_post(&roles, Some(&author), &draft));
		assert!(can_view_post(&roles, Some(&admin), &draft));
		assert!(!can_view_comment(&roles, Some(&reader), &pending, &draft));
		assert!(can_view_comment(&roles, Some(&author), &pending, &draft));
	}

	#[test]
	fn test_pending_comments_hidden_from_public() {
		let roles = RoleRegistry::standard();
		let author = user_with(&[Role::Author]);
		let post = post_by(&author, PostStatus::Published);
		let approved = comment_on(&post, &author, true);
		let pending = comment_on(&post, &author, false);

		assert!(can_view_comment(&roles, None, &approved, &post));
		assert!(!can_view_comment(&roles, None, &pending, &post));
	}

	#[test]
	fn test_policy_follows_the_registry() {
		let roles = RoleRegistry::default().with_role(Role::Reader, [Permission::ViewPost]);
		let author = user_with(&[Role::Author]);

		assert!(!can_create_post(&roles, Some(&author)));
		assert!(require_author_or_admin(&roles, Some(&author)).is_err());
	}
}
