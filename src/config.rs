use std::{fmt::Display, str::FromStr};

use crate::throttle::Throttle;

#[derive(Debug, thiserror::Error)]
#[error("invalid value {value:?} for {key}: {reason}")]
pub struct ConfigError {
	key: &'static str,
	value: String,
	reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
	/// How often, in seconds, a request is replenished for an address.
	pub per_second: u64,
	pub burst: u32,
}

/// Runtime settings, read from the environment (and a `.env` file, if any).
#[derive(Debug, Clone)]
pub struct Config {
	/// Without one, everything is kept in memory and lost on exit.
	pub database_url: Option<String>,
	pub host: String,
	pub port: u16,
	/// The public base URL, used to build links in notification emails.
	pub site_url: String,
	/// The sender of notification emails.
	pub from_email: String,
	/// Whether admins are emailed when a post is published.
	pub notify_on_publish: bool,
	pub comment_throttle: Throttle,
	pub rate_limit: RateLimit,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			database_url: None,
			host: "127.0.0.1".into(),
			port: 3000,
			site_url: "http://localhost:3000".into(),
			from_email: "noreply@example.com".into(),
			notify_on_publish: true,
			comment_throttle: Throttle::default(),
			rate_limit: RateLimit {
				per_second: 2,
				burst: 50,
			},
		}
	}
}

fn parse<T>(key: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
	T: FromStr,
	T::Err: Display,
{
	let Some(value) = value else {
		return Ok(default);
	};

	value.trim().parse().map_err(|e: T::Err| ConfigError {
		key,
		reason: e.to_string(),
		value,
	})
}

fn parse_bool(key: &'static str, value: Option<String>, default: bool) -> Result<bool, ConfigError> {
	let Some(value) = value else {
		return Ok(default);
	};

	match value.trim().to_ascii_lowercase().as_str() {
		"1" | "true" | "yes" | "on" => Ok(true),
		"0" | "false" | "no" | "off" => Ok(false),
		_ => Err(ConfigError {
			key,
			value,
			reason: "expected a boolean".into(),
		}),
	}
}

impl Config {
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Builds the configuration from any key-value source. Empty values
	/// count as unset.
	pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
		let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
		let default = Self::default();

		let throttle_secs = parse(
			"COMMENT_THROTTLE_SECONDS",
			get("COMMENT_THROTTLE_SECONDS"),
			Throttle::DEFAULT_COMMENT_WINDOW_SECS,
		)?;

		Ok(Self {
			database_url: get("DATABASE_URL"),
			host: get("HOST").unwrap_or(default.host),
			port: parse("PORT", get("PORT"), default.port)?,
			site_url: get("SITE_URL")
				.map(|url| url.trim_end_matches('/').to_string())
				.unwrap_or(default.site_url),
			from_email: get("DEFAULT_FROM_EMAIL").unwrap_or(default.from_email),
			notify_on_publish: parse_bool(
				"NOTIFY_ON_PUBLISH",
				get("NOTIFY_ON_PUBLISH"),
				default.notify_on_publish,
			)?,
			comment_throttle: Throttle::from_secs(throttle_secs),
			rate_limit: RateLimit {
				per_second: parse(
					"RATE_LIMIT_PER_SECOND",
					get("RATE_LIMIT_PER_SECOND"),
					default.rate_limit.per_second,
				)?,
				burst: parse(
					"RATE_LIMIT_BURST",
					get("RATE_LIMIT_BURST"),
					default.rate_limit.burst,
				)?,
			},
		})
	}
}
