use aide::{
	openapi::{ApiKeyLocation, SecurityScheme, Tag},
	transform::TransformOpenApi,
};

use crate::{error, extract::Json, session};

pub const SECURITY_SCHEME_SESSION: &str = "Session";

pub mod tag {
	pub const AUTH: &str = "Auth";
	pub const POST: &str = "Post";
	pub const COMMENT: &str = "Comment";
	pub const TAXONOMY: &str = "Taxonomy";
}

pub fn docs(api: TransformOpenApi) -> TransformOpenApi {
	api.title("Inkwell")
		.summary("A role-based blog platform")
		.description(include_str!("../README.md"))
		.tag(Tag {
			name: tag::AUTH.into(),
			description: Some("Registration, sessions and the user's own account".into()),
			..Default::default()
		})
		.tag(Tag {
			name: tag::POST.into(),
			description: Some("Post feeds, details and authoring".into()),
			..Default::default()
		})
		.tag(Tag {
			name: tag::COMMENT.into(),
			description: Some("Commenting and moderation".into()),
			..Default::default()
		})
		.tag(Tag {
			name: tag::TAXONOMY.into(),
			description: Some("Categories and tags".into()),
			..Default::default()
		})
		.security_scheme(
			SECURITY_SCHEME_SESSION,
			SecurityScheme::ApiKey {
				location: ApiKeyLocation::Cookie,
				name: session::COOKIE_NAME.into(),
				description: Some("A user session cookie".into()),
				extensions: Default::default(),
			},
		)
		.default_response_with::<Json<error::ErrorResponse>, _>(|res| {
			res.example(error::ErrorResponse::new(
				error::Message::new("error message")
					.field("optional field")
					.detail("key", "value")
					.into_vec(),
			))
		})
}
