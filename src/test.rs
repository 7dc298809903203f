//! Fixtures shared by the unit and HTTP tests.

use std::sync::Arc;

use argon2::Argon2;
use axum_test::TestServer;
use chrono::Utc;
use uuid::Uuid;

pub use axum::http::{header, HeaderValue, StatusCode};
pub use serde_json::{json, Value};

use crate::{
	config::Config,
	mail::test::RecordingMailer,
	role::{Role, RoleRegistry},
	route::{
		auth::model::{NewUser, User},
		comment::model::Comment,
		post::model::{CreatePostInput, Post, PostStatus},
	},
	setup,
	store::{MemoryStore, Store},
	State,
};

/// A user that is not persisted anywhere.
pub fn user_with(roles: &[Role]) -> User {
	User {
		id: Uuid::new_v4(),
		email: "user@example.com".into(),
		password: Vec::new(),
		username: "user".into(),
		first_name: None,
		last_name: None,
		is_superuser: false,
		created_at: Utc::now(),
		roles: roles.to_vec(),
	}
}

/// An account with an unusable password, named after `username`.
pub fn new_user(username: &str) -> NewUser {
	NewUser {
		id: Uuid::new_v4(),
		email: format!("{username}@example.com"),
		username: username.into(),
		password: Vec::new(),
		first_name: None,
		last_name: None,
		is_superuser: false,
	}
}

pub fn post_by(author: &User, status: PostStatus) -> Post {
	let mut post = Post::new(
		author.id,
		CreatePostInput {
			title: "A post".into(),
			slug: None,
			content: "Some content".into(),
			image: None,
			category_id: None,
			tag_ids: Vec::new(),
			status,
		},
		Utc::now(),
	);

	post.slug = post.id.simple().to_string();
	post
}

pub fn comment_on(post: &Post, user: &User, approved: bool) -> Comment {
	let mut comment = Comment::new(post.id, user.id, "A comment".into(), Utc::now());
	comment.is_approved = approved;
	comment
}

pub struct TestApp {
	pub server: TestServer,
	pub state: State,
	pub mailer: Arc<RecordingMailer>,
}

async fn build(seed_roles: bool) -> TestApp {
	let store = MemoryStore::new();
	let roles = RoleRegistry::standard();

	if seed_roles {
		setup::setup_groups(&store, &roles).await.unwrap();
	}

	let mailer = Arc::new(RecordingMailer::default());
	let state = State {
		store: Arc::new(store),
		hasher: Argon2::default(),
		roles: Arc::new(roles),
		mailer: mailer.clone(),
		config: Arc::new(Config::default()),
	};

	let server = TestServer::new(crate::app(state.clone(), None)).unwrap();

	TestApp {
		server,
		state,
		mailer,
	}
}

/// An application on an empty in-memory store with the roles seeded.
pub async fn app() -> TestApp {
	build(true).await
}

/// An application whose roles have not been seeded yet.
pub async fn app_without_roles() -> TestApp {
	build(false).await
}

/// Creates `username` with the given roles directly in the store and
/// returns a session id for it.
pub async fn session_for(app: &TestApp, username: &str, roles: &[Role]) -> String {
	let store = &app.state.store;
	let user = store.insert_user(new_user(username)).await.unwrap();

	for role in roles {
		assert!(store.assign_role(user.id, *role).await.unwrap());
	}

	store.create_session(user.id).await.unwrap().id.to_string()
}

/// Like [`session_for`], for a superuser without any role.
pub async fn superuser_session(app: &TestApp, username: &str) -> String {
	let store = &app.state.store;
	let user = store
		.insert_user(NewUser {
			is_superuser: true,
			..new_user(username)
		})
		.await
		.unwrap();

	store.create_session(user.id).await.unwrap().id.to_string()
}

/// An author named `username` with a session, and a published post of theirs.
pub async fn published_post(app: &TestApp, username: &str) -> (String, Post) {
	let session = session_for(app, username, &[Role::Author]).await;
	let author = app
		.state
		.store
		.user_by_email(&format!("{username}@example.com"))
		.await
		.unwrap()
		.unwrap();

	let post = app
		.state
		.store
		.insert_post(&post_by(&author, PostStatus::Published))
		.await
		.unwrap();

	(session, post)
}

pub fn cookie(session: &str) -> HeaderValue {
	HeaderValue::from_str(&format!("session={session}")).unwrap()
}
