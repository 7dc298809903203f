use aide::axum::{
	routing::{get_with, post_with},
	ApiRouter,
};
use axum::http::StatusCode;
use uuid::Uuid;

use crate::{error, AppState};

pub mod model;
pub mod route;

/// Path segments routed before `/:slug`, which a post can never take.
pub const RESERVED_SLUGS: &[&str] = &["dashboard", "category", "tag"];

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("unknown post {0}")]
	UnknownPost(String),
	#[error("unknown category {0}")]
	UnknownCategory(String),
	#[error("unknown category id {0}")]
	UnknownCategoryId(Uuid),
	#[error("unknown tag {0}")]
	UnknownTag(String),
	#[error("unknown tag ids {0:?}")]
	UnknownTagIds(Vec<Uuid>),
	#[error("slug {0} is already taken")]
	SlugTaken(String),
}

pub type RouteError = error::RouteError<Error>;

pub fn routes() -> ApiRouter<AppState> {
	use route::*;

	ApiRouter::new()
		.api_route(
			"/",
			get_with(get_posts, get_posts_docs).post_with(create_post, create_post_docs),
		)
		.api_route("/dashboard", get_with(get_dashboard, get_dashboard_docs))
		.api_route(
			"/category/:slug",
			get_with(get_category_posts, get_category_posts_docs),
		)
		.api_route("/tag/:slug", get_with(get_tag_posts, get_tag_posts_docs))
		.api_route(
			"/:slug",
			get_with(get_post, get_post_docs)
				.put_with(update_post, update_post_docs)
				.delete_with(delete_post, delete_post_docs),
		)
		.api_route(
			"/:slug/comments",
			post_with(
				crate::route::comment::route::create_comment,
				crate::route::comment::route::create_comment_docs,
			),
		)
}

impl error::ErrorShape for Error {
	fn status(&self) -> StatusCode {
		match self {
			Self::UnknownPost(..) | Self::UnknownCategory(..) | Self::UnknownTag(..) => {
				StatusCode::NOT_FOUND
			}
			Self::UnknownCategoryId(..) | Self::UnknownTagIds(..) => {
				StatusCode::BAD_REQUEST
			}
			Self::SlugTaken(..) => StatusCode::CONFLICT,
		}
	}

	fn errors(&self) -> Vec<error::Message<'_>> {
		match self {
			Self::UnknownPost(slug) => error::Message::new("unknown_post")
				.detail("slug", slug)
				.into_vec(),
			Self::UnknownCategory(slug) => error::Message::new("unknown_category")
				.detail("slug", slug)
				.into_vec(),
			Self::UnknownCategoryId(id) => error::Message::new("unknown_category")
				.field("category_id")
				.detail("id", id)
				.into_vec(),
			Self::UnknownTag(slug) => error::Message::new("unknown_tag")
				.detail("slug", slug)
				.into_vec(),
			Self::UnknownTagIds(ids) => error::Message::new("unknown_tag")
				.field("tag_ids")
				.detail("ids", ids)
				.into_vec(),
			Self::SlugTaken(slug) => error::Message::new("slug_taken")
				.field("slug")
				.detail("slug", slug)
				.into_vec(),
		}
	}
}

#[cfg(test)]
mod test {
	use crate::{role::Role, test::*};

	async fn create(app: &TestApp, session: &str, body: Value) -> axum_test::TestResponse {
		app.server
			.post("/posts")
			.add_header(header::COOKIE, cookie(session))
			.json(&body)
			.await
	}

	#[tokio::test]
	async fn test_author_creates_and_reads_post() {
		let app = app().await;
		let author = session_for(&app, "author", &[Role::Author]).await;

		let response = create(
			&app,
			&author,
			json!({ "title": "Hello, World!", "content": "First post", "status": "published" }),
		)
		.await;

		assert_eq!(response.status_code(), StatusCode::OK);

		let post = response.json::<Value>();
		assert_eq!(post["slug"], "hello-world");
		assert!(post["published_at"].is_string());

		let response = app.server.get("/posts/hello-world").await;
		assert_eq!(response.status_code(), StatusCode::OK);

		let detail = response.json::<Value>();
		assert_eq!(detail["post"]["title"], "Hello, World!");
		assert_eq!(detail["comment_count"], 0);
		assert_eq!(detail["comments"], json!([]));
	}

	#[tokio::test]
	async fn test_slug_collisions_get_suffixes() {
		let app = app().await;
		let author = session_for(&app, "author", &[Role::Author]).await;

		for expected in ["same", "same-1", "same-2"] {
			let response = create(&app, &author, json!({ "title": "Same", "content": "x" })).await;

			assert_eq!(response.status_code(), StatusCode::OK);
			assert_eq!(response.json::<Value>()["slug"], expected);
		}

		let response = create(
			&app,
			&author,
			json!({ "title": "Other", "slug": "same", "content": "x" }),
		)
		.await;
		assert_eq!(response.status_code(), StatusCode::CONFLICT);
	}

	#[tokio::test]
	async fn test_reserved_slugs_are_skipped() {
		let app = app().await;
		let author = session_for(&app, "author", &[Role::Author]).await;

		let response = create(&app, &author, json!({ "title": "Dashboard", "content": "x" })).await;
		assert_eq!(response.json::<Value>()["slug"], "dashboard-1");
	}

	#[tokio::test]
	async fn test_reader_cannot_create() {
		let app = app().await;
		let reader = session_for(&app, "reader", &[Role::Reader]).await;

		let response = create(&app, &reader, json!({ "title": "Nope", "content": "x" })).await;
		assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

		let response = app.server.post("/posts").json(&json!({ "title": "Nope", "content": "x" })).await;
		assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
	}

	#[tokio::test]
	async fn test_drafts_are_hidden_from_others() {
		let app = app().await;
		let author = session_for(&app, "author", &[Role::Author]).await;
		let reader = session_for(&app, "reader", &[Role::Reader]).await;
		let admin = session_for(&app, "admin", &[Role::Admin]).await;

		create(&app, &author, json!({ "title": "Secret", "content": "x" })).await;

		let response = app.server.get("/posts/secret").await;
		assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

		let response = app
			.server
			.get("/posts/secret")
			.add_header(header::COOKIE, cookie(&reader))
			.await;
		assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

		for session in [&author, &admin] {
			let response = app
				.server
				.get("/posts/secret")
				.add_header(header::COOKIE, cookie(session))
				.await;
			assert_eq!(response.status_code(), StatusCode::OK);
		}

		let response = app
			.server
			.get("/posts")
			.add_header(header::COOKIE, cookie(&author))
			.await;
		assert_eq!(response.json::<Value>(), json!([]));
	}

	#[tokio::test]
	async fn test_only_owner_or_admin_edits() {
		let app = app().await;
		let author = session_for(&app, "author", &[Role::Author]).await;
		let other = session_for(&app, "other", &[Role::Author]).await;
		let admin = session_for(&app, "admin", &[Role::Admin]).await;

		create(&app, &author, json!({ "title": "Mine", "content": "x" })).await;

		let response = app
			.server
			.put("/posts/mine")
			.add_header(header::COOKIE, cookie(&other))
			.json(&json!({ "title": "Stolen" }))
			.await;
		assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

		let response = app
			.server
			.delete("/posts/mine")
			.add_header(header::COOKIE, cookie(&other))
			.await;
		assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

		let post = app.state.store.post_by_slug("mine").await.unwrap().unwrap();
		assert_eq!(post.title, "Mine");

		let response = app
			.server
			.put("/posts/mine")
			.add_header(header::COOKIE, cookie(&admin))
			.json(&json!({ "title": "Edited" }))
			.await;
		assert_eq!(response.status_code(), StatusCode::OK);

		let body = response.json::<Value>();
		assert_eq!(body["title"], "Edited");
		assert_eq!(body["slug"], "mine");

		let response = app
			.server
			.delete("/posts/mine")
			.add_header(header::COOKIE, cookie(&author))
			.await;
		assert_eq!(response.status_code(), StatusCode::NO_CONTENT);

		assert!(app.state.store.post_by_slug("mine").await.unwrap().is_none());
	}

	#[tokio::test]
	async fn test_clearing_slug_regenerates_it() {
		let app = app().await;
		let author = session_for(&app, "author", &[Role::Author]).await;

		create(&app, &author, json!({ "title": "First", "content": "x" })).await;

		let response = app
			.server
			.put("/posts/first")
			.add_header(header::COOKIE, cookie(&author))
			.json(&json!({ "title": "Second", "slug": "" }))
			.await;
		assert_eq!(response.json::<Value>()["slug"], "second");

		let response = app
			.server
			.put("/posts/second")
			.add_header(header::COOKIE, cookie(&author))
			.json(&json!({ "slug": "Not A Slug" }))
			.await;
		assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
		assert_eq!(response.json::<Value>()["errors"][0]["field"], "slug");
	}

	#[tokio::test]
	async fn test_update_is_validated_like_create() {
		let app = app().await;
		let author = session_for(&app, "author", &[Role::Author]).await;

		create(
			&app,
			&author,
			json!({ "title": "Pictured", "content": "x", "image": "cover.png" }),
		)
		.await;

		let response = app
			.server
			.put("/posts/pictured")
			.add_header(header::COOKIE, cookie(&author))
			.json(&json!({ "image": "x".repeat(501) }))
			.await;
		assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
		assert_eq!(response.json::<Value>()["errors"][0]["field"], "image");

		let response = app
			.server
			.put("/posts/pictured")
			.add_header(header::COOKIE, cookie(&author))
			.json(&json!({ "image": null }))
			.await;
		assert_eq!(response.status_code(), StatusCode::OK);

		let post = app.state.store.post_by_slug("pictured").await.unwrap().unwrap();
		assert_eq!(post.image, None);
	}

	#[tokio::test]
	async fn test_publishing_notifies_admins() {
		let app = app().await;
		let author = session_for(&app, "author", &[Role::Author]).await;
		session_for(&app, "admin", &[Role::Admin]).await;

		create(&app, &author, json!({ "title": "Draft", "content": "x" })).await;
		assert!(app.mailer.sent().is_empty());

		app.server
			.put("/posts/draft")
			.add_header(header::COOKIE, cookie(&author))
			.json(&json!({ "status": "published" }))
			.await;

		let sent = app.mailer.sent();
		assert_eq!(sent.len(), 1);
		assert_eq!(sent[0].subject, "New Post Published: Draft");
		assert_eq!(sent[0].to, vec!["admin@example.com".to_string()]);
		assert!(sent[0].body.contains("http://localhost:3000/posts/draft"));
	}

	#[tokio::test]
	async fn test_publishing_without_admins_still_saves() {
		let app = app().await;
		let author = session_for(&app, "author", &[Role::Author]).await;

		let response = create(
			&app,
			&author,
			json!({ "title": "Lonely", "content": "x", "status": "published" }),
		)
		.await;

		assert_eq!(response.status_code(), StatusCode::OK);
		assert!(app.mailer.sent().is_empty());
	}

	#[tokio::test]
	async fn test_feeds_and_search() {
		let app = app().await;
		let author = session_for(&app, "author", &[Role::Author]).await;
		let admin = session_for(&app, "admin", &[Role::Admin]).await;

		let category = app
			.server
			.post("/categories")
			.add_header(header::COOKIE, cookie(&admin))
			.json(&json!({ "name": "Web Development" }))
			.await
			.json::<Value>();
		let tag = app
			.server
			.post("/tags")
			.add_header(header::COOKIE, cookie(&admin))
			.json(&json!({ "name": "Rust" }))
			.await
			.json::<Value>();

		create(
			&app,
			&author,
			json!({
				"title": "Axum in practice",
				"content": "Routing and extractors",
				"status": "published",
				"category_id": category["id"],
				"tag_ids": [tag["id"]],
			}),
		)
		.await;
		create(
			&app,
			&author,
			json!({ "title": "Gardening", "content": "Tomatoes", "status": "published" }),
		)
		.await;

		let response = app.server.get("/posts?q=EXTRACTORS").await;
		let posts = response.json::<Value>();
		assert_eq!(posts.as_array().unwrap().len(), 1);
		assert_eq!(posts[0]["slug"], "axum-in-practice");

		let response = app.server.get("/posts/category/web-development").await;
		assert_eq!(response.json::<Value>().as_array().unwrap().len(), 1);

		let response = app.server.get("/posts/tag/rust").await;
		assert_eq!(response.json::<Value>()[0]["slug"], "axum-in-practice");

		let response = app.server.get("/posts/category/missing").await;
		assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

		let response = app.server.get("/posts/tag/missing").await;
		assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

		let detail = app.server.get("/posts/axum-in-practice").await.json::<Value>();
		assert_eq!(detail["category"]["name"], "Web Development");
		assert_eq!(detail["tags"][0]["slug"], "rust");
		assert_eq!(detail["related_posts"], json!([]));

		let detail = app.server.get("/posts/gardening").await.json::<Value>();
		assert_eq!(detail["related_posts"][0]["slug"], "axum-in-practice");
	}

	#[tokio::test]
	async fn test_unknown_category_is_rejected() {
		let app = app().await;
		let author = session_for(&app, "author", &[Role::Author]).await;

		let response = create(
			&app,
			&author,
			json!({ "title": "x", "content": "x", "category_id": uuid::Uuid::new_v4() }),
		)
		.await;

		assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
	}

	#[tokio::test]
	async fn test_dashboard() {
		let app = app().await;
		let author = session_for(&app, "author", &[Role::Author]).await;
		let other = session_for(&app, "other", &[Role::Author]).await;
		let admin = session_for(&app, "admin", &[Role::Admin]).await;
		let reader = session_for(&app, "reader", &[Role::Reader]).await;

		create(&app, &author, json!({ "title": "a", "content": "x", "status": "published" })).await;
		create(&app, &author, json!({ "title": "b", "content": "x" })).await;
		create(&app, &other, json!({ "title": "c", "content": "x" })).await;

		let dashboard = app
			.server
			.get("/posts/dashboard")
			.add_header(header::COOKIE, cookie(&author))
			.await
			.json::<Value>();
		assert_eq!(dashboard["counts"], json!({ "total": 2, "published": 1, "drafts": 1 }));
		assert_eq!(dashboard["posts"].as_array().unwrap().len(), 2);

		let dashboard = app
			.server
			.get("/posts/dashboard")
			.add_header(header::COOKIE, cookie(&admin))
			.await
			.json::<Value>();
		assert_eq!(dashboard["counts"]["total"], 3);

		let response = app
			.server
			.get("/posts/dashboard")
			.add_header(header::COOKIE, cookie(&reader))
			.await;
		assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
	}

	#[tokio::test]
	async fn test_dashboard_pages_by_ten() {
		let app = app().await;
		let author = session_for(&app, "author", &[Role::Author]).await;

		for i in 0..11 {
			create(&app, &author, json!({ "title": format!("Post {i}"), "content": "x" })).await;
		}

		let dashboard = app
			.server
			.get("/posts/dashboard")
			.add_header(header::COOKIE, cookie(&author))
			.await
			.json::<Value>();
		assert_eq!(dashboard["posts"].as_array().unwrap().len(), 10);
		assert_eq!(dashboard["counts"]["total"], 11);

		let dashboard = app
			.server
			.get("/posts/dashboard?page=2")
			.add_header(header::COOKIE, cookie(&author))
			.await
			.json::<Value>();
		assert_eq!(dashboard["posts"].as_array().unwrap().len(), 1);
	}
}
