use aide::axum::{
	routing::{delete_with, get_with},
	ApiRouter,
};
use axum::http::StatusCode;

use crate::{
	error, slug,
	store::{Result, Store},
	AppState,
};

pub mod model;
pub mod route;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("unknown category {0}")]
	UnknownCategory(String),
}

pub type RouteError = error::RouteError<Error>;

pub fn routes() -> ApiRouter<AppState> {
	use route::*;

	ApiRouter::new()
		.api_route(
			"/categories",
			get_with(get_categories, get_categories_docs)
				.post_with(create_category, create_category_docs),
		)
		.api_route(
			"/categories/:slug",
			delete_with(delete_category, delete_category_docs),
		)
		.api_route(
			"/tags",
			get_with(get_tags, get_tags_docs).post_with(create_tag, create_tag_docs),
		)
}

/// Finds the category with this name, or creates it with a fresh slug.
pub async fn get_or_create_category(
	store: &dyn Store,
	name: &str,
) -> Result<(model::Category, bool)> {
	let name = name.trim();
	let base = slug::slugify_or(name, "category");
	let slug = slug::unique(&base, |candidate| async move {
		store.category_slug_taken(&candidate).await
	})
	.await?;

	store
		.get_or_create_category(model::NewTerm {
			name: name.to_string(),
			slug,
		})
		.await
}

/// Finds the tag with this name, or creates it with a fresh slug.
pub async fn get_or_create_tag(store: &dyn Store, name: &str) -> Result<(model::Tag, bool)> {
	let name = name.trim();
	let base = slug::slugify_or(name, "tag");
	let slug = slug::unique(&base, |candidate| async move {
		store.tag_slug_taken(&candidate).await
	})
	.await?;

	store
		.get_or_create_tag(model::NewTerm {
			name: name.to_string(),
			slug,
		})
		.await
}

impl error::ErrorShape for Error {
	fn status(&self) -> StatusCode {
		match self {
			Self::UnknownCategory(..) => StatusCode::NOT_FOUND,
		}
	}

	fn errors(&self) -> Vec<error::Message<'_>> {
		match self {
			Self::UnknownCategory(slug) => error::Message::new("unknown_category")
				.detail("slug", slug)
				.into_vec(),
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::{role::Role, store::MemoryStore, test::*};

	#[tokio::test]
	async fn test_get_or_create_is_idempotent() {
		let store = MemoryStore::default();

		let (first, created) = get_or_create_category(&store, "Web Development").await.unwrap();
		assert!(created);
		assert_eq!(first.slug, "web-development");

		let (second, created) = get_or_create_category(&store, "Web Development").await.unwrap();
		assert!(!created);
		assert_eq!(first.id, second.id);

		let (tag, _) = get_or_create_tag(&store, "C++").await.unwrap();
		assert_eq!(tag.slug, "c");

		let (tag, created) = get_or_create_tag(&store, "C").await.unwrap();
		assert!(created);
		assert_eq!(tag.slug, "c-1");

		let (tag, _) = get_or_create_tag(&store, "!!!").await.unwrap();
		assert_eq!(tag.slug, "tag");
	}

	#[tokio::test]
	async fn test_only_admins_manage_taxonomy() {
		let app = app().await;
		let author = session_for(&app, "author", &[Role::Author]).await;
		let admin = session_for(&app, "admin", &[Role::Admin]).await;

		let response = app
			.server
			.post("/categories")
			.add_header(header::COOKIE, cookie(&author))
			.json(&json!({ "name": "Science" }))
			.await;
		assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

		let response = app
			.server
			.post("/categories")
			.add_header(header::COOKIE, cookie(&admin))
			.json(&json!({ "name": "Science" }))
			.await;
		assert_eq!(response.status_code(), StatusCode::OK);

		let body = response.json::<Value>();
		assert_eq!(body["slug"], "science");
		assert_eq!(body["created"], true);

		let response = app
			.server
			.post("/categories")
			.add_header(header::COOKIE, cookie(&admin))
			.json(&json!({ "name": "Science" }))
			.await;
		assert_eq!(response.json::<Value>()["created"], false);

		let response = app
			.server
			.delete("/categories/science")
			.add_header(header::COOKIE, cookie(&author))
			.await;
		assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
	}

	#[tokio::test]
	async fn test_blank_names_are_rejected() {
		let app = app().await;
		let admin = session_for(&app, "admin", &[Role::Admin]).await;

		for path in ["/categories", "/tags"] {
			let response = app
				.server
				.post(path)
				.add_header(header::COOKIE, cookie(&admin))
				.json(&json!({ "name": "   " }))
				.await;
			assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
			assert_eq!(response.json::<Value>()["errors"][0]["field"], "name");
		}

		assert!(app.state.store.categories().await.unwrap().is_empty());
		assert!(app.state.store.tags().await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_lists_are_alphabetical() {
		let app = app().await;

		for name in ["Travel", "Art", "Music"] {
			get_or_create_category(app.state.store.as_ref(), name)
				.await
				.unwrap();
		}

		for name in ["rust", "go", "python"] {
			get_or_create_tag(app.state.store.as_ref(), name).await.unwrap();
		}

		let categories = app.server.get("/categories").await.json::<Value>();
		let names = categories
			.as_array()
			.unwrap()
			.iter()
			.map(|category| category["name"].as_str().unwrap())
			.collect::<Vec<_>>();
		assert_eq!(names, ["Art", "Music", "Travel"]);

		let tags = app.server.get("/tags").await.json::<Value>();
		assert_eq!(tags[0]["name"], "go");
	}

	#[tokio::test]
	async fn test_deleting_category_keeps_posts() {
		let app = app().await;
		let author = session_for(&app, "author", &[Role::Author]).await;
		let admin = session_for(&app, "admin", &[Role::Admin]).await;

		let (category, _) = get_or_create_category(app.state.store.as_ref(), "Science")
			.await
			.unwrap();

		let response = app
			.server
			.post("/posts")
			.add_header(header::COOKIE, cookie(&author))
			.json(&json!({
				"title": "Atoms",
				"content": "Small",
				"status": "published",
				"category_id": category.id,
			}))
			.await;
		assert_eq!(response.status_code(), StatusCode::OK);

		let response = app
			.server
			.delete("/categories/science")
			.add_header(header::COOKIE, cookie(&admin))
			.await;
		assert_eq!(response.status_code(), StatusCode::NO_CONTENT);

		let post = app.state.store.post_by_slug("atoms").await.unwrap().unwrap();
		assert_eq!(post.category_id, None);

		let response = app
			.server
			.delete("/categories/science")
			.add_header(header::COOKIE, cookie(&admin))
			.await;
		assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
	}
}
