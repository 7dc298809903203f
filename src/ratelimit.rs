use std::{sync::Arc, time::Duration};

use axum::{
	body::Body,
	response::{IntoResponse, Response},
};
use governor::{
	clock::QuantaInstant,
	middleware::{RateLimitingMiddleware, StateInformationMiddleware},
};
use tower_governor::{
	governor::{GovernorConfig, GovernorConfigBuilder},
	key_extractor::{KeyExtractor, PeerIpKeyExtractor},
	GovernorError,
};

use crate::{config::RateLimit, error::AppError};

pub type Limiter = Arc<GovernorConfig<PeerIpKeyExtractor, StateInformationMiddleware>>;

/// The rate limits applied when serving: one for the whole API and a
/// stricter one for the authentication routes.
#[derive(Clone)]
pub struct Limits {
	pub default: Limiter,
	pub secure: Limiter,
}

impl Limits {
	pub fn new(config: RateLimit) -> Option<Self> {
		Some(Self {
			default: default(config)?,
			secure: secure()?,
		})
	}
}

/// Per-address limit for the whole API. Zero values are raised to one.
pub fn default(config: RateLimit) -> Option<Limiter> {
	let mut builder = GovernorConfigBuilder::default();

	builder
		.per_second(config.per_second.max(1))
		.burst_size(config.burst.max(1));

	builder
		.use_headers()
		.error_handler(error_handler)
		.finish()
		.map(Arc::new)
}

/// Per-address limit for logging in and registering.
pub fn secure() -> Option<Limiter> {
	let mut builder = GovernorConfigBuilder::default();
	builder.per_second(1).burst_size(5);

	builder
		.use_headers()
		.error_handler(error_handler)
		.finish()
		.map(Arc::new)
}

fn error_handler(error: GovernorError) -> Response<Body> {
	AppError::from(error).into_response()
}

/// Periodically drops the state of addresses that have not been seen lately.
pub fn cleanup_old_limits<T, M>(configs: &[&Arc<GovernorConfig<T, M>>])
where
	T: KeyExtractor,
	<T as KeyExtractor>::Key: Send + Sync + 'static,
	M: RateLimitingMiddleware<QuantaInstant> + Send + Sync + 'static,
{
	let limiters = configs
		.iter()
		.map(|config| config.limiter().clone())
		.collect::<Vec<_>>();
	let interval = Duration::from_secs(60);

	std::thread::spawn(move || loop {
		std::thread::sleep(interval);

		for limiter in &limiters {
			tracing::debug!("rate limiting storage size: {}", limiter.len());

			limiter.retain_recent();
		}
	});
}
