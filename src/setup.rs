//! One-off commands that prepare a deployment. Every command can be run
//! again without changing anything that already exists.

use argon2::Argon2;
use uuid::Uuid;

use crate::{
	role::{Permission, Role, RoleRegistry},
	route::{
		auth::{self, model::NewUser},
		taxonomy,
	},
	store::{Store, StoreError},
};

pub const DEFAULT_CATEGORIES: &[&str] = &[
	"Technology",
	"Programming",
	"Web Development",
	"Mobile Development",
	"Data Science",
	"Artificial Intelligence",
	"Machine Learning",
	"Design",
	"UI/UX",
	"Business",
	"Marketing",
	"Finance",
	"Health & Fitness",
	"Lifestyle",
	"Travel",
	"Food & Cooking",
	"Education",
	"Science",
	"History",
	"Entertainment",
	"Sports",
	"Music",
	"Photography",
	"Art & Culture",
	"News",
	"Opinion",
	"Tutorials",
	"Reviews",
	"Tips & Tricks",
	"Personal Development",
];

pub const DEFAULT_TAGS: &[&str] = &[
	"Python",
	"Django",
	"JavaScript",
	"React",
	"Vue.js",
	"Node.js",
	"HTML",
	"CSS",
	"Bootstrap",
	"Tailwind CSS",
	"TypeScript",
	"Angular",
	"Flutter",
	"Swift",
	"Kotlin",
	"Java",
	"C++",
	"C#",
	"PHP",
	"Ruby",
	"Go",
	"Rust",
	"SQL",
	"MongoDB",
	"PostgreSQL",
	"MySQL",
	"Redis",
	"Docker",
	"Kubernetes",
	"AWS",
	"Azure",
	"Git",
	"GitHub",
	"CI/CD",
	"API",
	"REST",
	"GraphQL",
	"Microservices",
	"DevOps",
	"Agile",
	"Scrum",
	"Startup",
	"Entrepreneurship",
	"Productivity",
	"Remote Work",
	"Career",
	"Freelancing",
	"Tutorial",
	"Beginner",
	"Advanced",
	"Best Practices",
	"Code Review",
	"Testing",
	"Security",
	"Performance",
	"Optimization",
	"Frontend",
	"Backend",
	"Full Stack",
	"Mobile",
	"Web",
	"Desktop",
	"Cloud",
	"Serverless",
	"Blockchain",
	"Cryptocurrency",
	"NFT",
	"Web3",
	"Metaverse",
	"VR",
	"AR",
	"IoT",
	"Automation",
	"Open Source",
	"Community",
	"Learning",
	"Resources",
	"Tools",
	"Frameworks",
	"Libraries",
	"Tips",
	"Tricks",
	"Hacks",
	"News",
	"Updates",
	"Trends",
	"Future",
	"Innovation",
];

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
	#[error(transparent)]
	Store(#[from] StoreError),
	#[error("password hashing failed: {0}")]
	Hash(#[from] argon2::Error),
	#[error("no user with email {0}")]
	UnknownUser(String),
	#[error("role {0} has not been set up, run setup-groups first")]
	RoleNotSeeded(Role),
}

/// Creates every role the registry defines, with its permissions.
/// Returns each role and whether it was created by this call.
pub async fn setup_groups(
	store: &dyn Store,
	registry: &RoleRegistry,
) -> Result<Vec<(Role, bool)>, SetupError> {
	let mut results = Vec::new();

	for role in registry.roles() {
		let permissions = registry.permissions(role).collect::<Vec<Permission>>();
		let created = store.ensure_role(role, &permissions).await?;

		if created {
			tracing::info!(%role, permissions = permissions.len(), "created role");
		} else {
			tracing::info!(%role, "role already exists");
		}

		results.push((role, created));
	}

	Ok(results)
}

/// The number of categories and tags created by [`populate_taxonomy`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Populated {
	pub categories: usize,
	pub tags: usize,
}

/// Creates the default categories and tags that do not exist yet.
pub async fn populate_taxonomy(store: &dyn Store) -> Result<Populated, SetupError> {
	let mut populated = Populated::default();

	for name in DEFAULT_CATEGORIES {
		let (category, created) = taxonomy::get_or_create_category(store, name).await?;

		if created {
			populated.categories += 1;
			tracing::info!(name, slug = %category.slug, "created category");
		}
	}

	for name in DEFAULT_TAGS {
		let (tag, created) = taxonomy::get_or_create_tag(store, name).await?;

		if created {
			populated.tags += 1;
			tracing::info!(name, slug = %tag.slug, "created tag");
		}
	}

	tracing::info!(
		categories = populated.categories,
		tags = populated.tags,
		"populated taxonomy"
	);

	Ok(populated)
}

/// Creates a superuser, unless an account with this email already exists.
/// Returns whether an account was created.
pub async fn create_superuser(
	store: &dyn Store,
	hasher: &Argon2<'_>,
	username: &str,
	email: &str,
	password: &str,
) -> Result<bool, SetupError> {
	if store.user_by_email(email).await?.is_some() {
		tracing::info!(email, "user already exists");
		return Ok(false);
	}

	let id = Uuid::new_v4();
	let password = auth::hash_password(hasher, password, &id)?;

	let user = store
		.insert_user(NewUser {
			id,
			email: email.to_string(),
			username: username.to_string(),
			password: password.to_vec(),
			first_name: None,
			last_name: None,
			is_superuser: true,
		})
		.await?;

	tracing::info!(user = %user.id, "created superuser");

	Ok(true)
}

/// Adds a role to an existing account.
pub async fn grant_role(store: &dyn Store, email: &str, role: Role) -> Result<(), SetupError> {
	let user = store
		.user_by_email(email)
		.await?
		.ok_or_else(|| SetupError::UnknownUser(email.to_string()))?;

	if user.roles.contains(&role) {
		tracing::info!(user = %user.id, %role, "role already granted");
		return Ok(());
	}

	if !store.assign_role(user.id, role).await? {
		return Err(SetupError::RoleNotSeeded(role));
	}

	tracing::info!(user = %user.id, %role, "granted role");

	Ok(())
}
