#![warn(clippy::pedantic)]

mod config;
mod error;
mod extract;
mod mail;
mod openapi;
mod policy;
mod ratelimit;
mod role;
mod route;
mod session;
mod setup;
mod slug;
mod store;
mod throttle;
mod trace;

#[cfg(test)]
mod test;

use std::{net::SocketAddr, process::ExitCode, sync::Arc};

use aide::{axum::ApiRouter, openapi::OpenApi};
use argon2::Argon2;
use axum::{Extension, Router};
use clap::Parser;
use tower_governor::GovernorLayer;
use tower_http::{
	compression::CompressionLayer,
	request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
	trace::TraceLayer,
};

use crate::{
	config::{Config, ConfigError},
	mail::{LogMailer, Mailer},
	ratelimit::Limits,
	role::{Role, RoleRegistry},
	setup::SetupError,
	store::{DynStore, MemoryStore, PgStore, StoreError},
};

pub type AppState = State;

/// The shared application state.
///
/// This contains every shared dependency that handlers need to access.
/// Each field can be extracted on its own through [`axum::extract::State`].
#[derive(Clone, axum::extract::FromRef)]
pub struct State {
	pub store: DynStore,
	pub hasher: Argon2<'static>,
	pub roles: Arc<RoleRegistry>,
	pub mailer: Arc<dyn Mailer>,
	pub config: Arc<Config>,
}

/// Builds the application router, with its documentation and middleware.
///
/// Rate limits need the peer address, so they are only applied when
/// serving over a real listener.
pub fn app(state: State, limits: Option<&Limits>) -> Router {
	aide::gen::on_error(|error| tracing::warn!(%error, "failed to document route"));
	aide::gen::extract_schemas(true);

	let mut api = OpenApi::default();
	let mut auth = route::auth::routes();

	if let Some(limits) = limits {
		auth = auth.layer(GovernorLayer {
			config: limits.secure.clone(),
		});
	}

	let mut router = ApiRouter::new()
		.nest("/auth", auth)
		.nest("/posts", route::post::routes())
		.nest("/comments", route::comment::routes())
		.merge(route::taxonomy::routes())
		.nest_api_service("/docs", route::docs::routes())
		.finish_api_with(&mut api, openapi::docs)
		.layer(Extension(Arc::new(api)))
		.layer(axum::middleware::from_fn_with_state(
			state.clone(),
			extract::resolve_session,
		))
		.with_state(state);

	if let Some(limits) = limits {
		router = router.layer(GovernorLayer {
			config: limits.default.clone(),
		});
	}

	router
		.layer(PropagateRequestIdLayer::x_request_id())
		.layer(TraceLayer::new_for_http())
		.layer(CompressionLayer::new())
		.layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

#[derive(Debug, thiserror::Error)]
enum Error {
	#[error("configuration error: {0}")]
	Config(#[from] ConfigError),
	#[error("store error: {0}")]
	Store(#[from] StoreError),
	#[error("setup error: {0}")]
	Setup(#[from] SetupError),
	#[error("io error: {0}")]
	Io(#[from] std::io::Error),
	#[error("invalid rate limit configuration")]
	RateLimit,
}

/// A role-based blog platform.
#[derive(Debug, clap::Parser)]
#[command(name = "inkwell", version, about)]
struct Cli {
	/// What to do, `serve` when omitted.
	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Debug, clap::Subcommand)]
enum Command {
	/// Serve the HTTP API.
	Serve,
	/// Create the admin, author and reader roles with their permissions.
	SetupGroups,
	/// Create the default categories and tags.
	PopulateTaxonomy,
	/// Create a superuser account.
	CreateSuperuser {
		username: String,
		email: String,
		password: String,
	},
	/// Attach a role to an existing user.
	GrantRole {
		email: String,
		/// One of admin, author or reader.
		role: Role,
	},
}

/// Connects to Postgres when configured, and falls back to memory otherwise.
async fn open_store(config: &Config, roles: &RoleRegistry) -> Result<DynStore, Error> {
	if let Some(url) = &config.database_url {
		let store = PgStore::connect(url).await?;
		store.migrate().await?;

		tracing::info!("connected to database");

		return Ok(Arc::new(store));
	}

	tracing::warn!("DATABASE_URL is not set, data is kept in memory and lost on exit");

	let store = MemoryStore::new();
	setup::setup_groups(&store, roles).await?;

	Ok(Arc::new(store))
}

async fn serve(state: State) -> Result<(), Error> {
	let limits = Limits::new(state.config.rate_limit).ok_or(Error::RateLimit)?;
	ratelimit::cleanup_old_limits(&[&limits.default, &limits.secure]);

	let listener =
		tokio::net::TcpListener::bind((state.config.host.as_str(), state.config.port)).await?;
	let app = app(state, Some(&limits));

	tracing::info!("listening on {}", listener.local_addr()?);

	axum::serve(
		listener,
		app.into_make_service_with_connect_info::<SocketAddr>(),
	)
	.await?;

	Ok(())
}

async fn run(command: Command) -> Result<(), Error> {
	let config = Config::from_env()?;
	let roles = RoleRegistry::standard();
	let store = open_store(&config, &roles).await?;
	let hasher = Argon2::default();

	match command {
		Command::Serve => {
			serve(State {
				store,
				hasher,
				roles: Arc::new(roles),
				mailer: Arc::new(LogMailer),
				config: Arc::new(config),
			})
			.await
		}
		Command::SetupGroups => {
			setup::setup_groups(store.as_ref(), &roles).await?;
			Ok(())
		}
		Command::PopulateTaxonomy => {
			setup::populate_taxonomy(store.as_ref()).await?;
			Ok(())
		}
		Command::CreateSuperuser {
			username,
			email,
			password,
		} => {
			setup::create_superuser(store.as_ref(), &hasher, &username, &email, &password).await?;
			Ok(())
		}
		Command::GrantRole { email, role } => {
			setup::grant_role(store.as_ref(), &email, role).await?;
			Ok(())
		}
	}
}

#[tokio::main]
async fn main() -> ExitCode {
	let cli = Cli::parse();

	dotenvy::dotenv().ok();

	let _guard = trace::init_tracing_subscriber();

	match run(cli.command.unwrap_or(Command::Serve)).await {
		Ok(()) => ExitCode::SUCCESS,
		Err(error) => {
			tracing::error!(%error, "exiting");
			ExitCode::FAILURE
		}
	}
}
