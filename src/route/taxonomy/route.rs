use aide::axum::IntoApiResponse;
use axum::{extract::State, http::StatusCode};
use macros::route;

use crate::{
	extract::{Json, Path, Session},
	openapi::tag,
	policy,
	route::model::SlugPath,
	store::DynStore,
	AppState,
};

use super::{model, Error, RouteError};

/// List categories
/// Returns every category in alphabetical order.
#[route(tag = tag::TAXONOMY)]
pub async fn get_categories(
	State(store): State<DynStore>,
) -> Result<Json<Vec<model::Category>>, RouteError> {
	Ok(Json(store.categories().await?))
}

/// Create category
/// Returns the category with the given name, creating it first if needed.
/// Only admins may do so.
#[route(tag = tag::TAXONOMY)]
pub async fn create_category(
	State(state): State<AppState>,
	session: Session,
	Json(input): Json<model::CreateCategoryInput>,
) -> Result<Json<model::Created<model::Category>>, RouteError> {
	policy::require_admin(&state.roles, Some(&session.user))?;

	let (item, created) = super::get_or_create_category(state.store.as_ref(), &input.name).await?;

	if created {
		tracing::info!(category = %item.id, slug = %item.slug, "created category");
	}

	Ok(Json(model::Created { item, created }))
}

/// Delete category
/// Deletes a category. Its posts are kept without a category. Only admins may do so.
#[route(tag = tag::TAXONOMY, response(status = 204, description = "Deleted successfully."))]
pub async fn delete_category(
	State(state): State<AppState>,
	session: Session,
	Path(SlugPath { slug }): Path<SlugPath>,
) -> Result<impl IntoApiResponse, RouteError> {
	policy::require_admin(&state.roles, Some(&session.user))?;

	let Some(category) = state.store.category_by_slug(&slug).await? else {
		return Err(Error::UnknownCategory(slug).into());
	};

	state.store.delete_category(category.id).await?;

	tracing::info!(category = %category.id, "deleted category");

	Ok(StatusCode::NO_CONTENT)
}

/// List tags
/// Returns every tag in alphabetical order.
#[route(tag = tag::TAXONOMY)]
pub async fn get_tags(State(store): State<DynStore>) -> Result<Json<Vec<model::Tag>>, RouteError> {
	Ok(Json(store.tags().await?))
}

/// Create tag
/// Returns the tag with the given name, creating it first if needed.
/// Only admins may do so.
#[route(tag = tag::TAXONOMY)]
pub async fn create_tag(
	State(state): State<AppState>,
	session: Session,
	Json(input): Json<model::CreateTagInput>,
) -> Result<Json<model::Created<model::Tag>>, RouteError> {
	policy::require_admin(&state.roles, Some(&session.user))?;

	let (item, created) = super::get_or_create_tag(state.store.as_ref(), &input.name).await?;

	if created {
		tracing::info!(tag = %item.id, slug = %item.slug, "created tag");
	}

	Ok(Json(model::Created { item, created }))
}
