use chrono::{DateTime, Duration, Utc};

/// Rejects a repeated action made within `window` of the previous one.
///
/// The caller keeps the timestamp of the last successful action (per
/// session and post for comments) and records a new one only once the
/// action has actually gone through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Throttle {
	window: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("please wait {} seconds before trying again", .retry_after.num_seconds().max(1))]
pub struct Throttled {
	pub retry_after: Duration,
}

impl Throttle {
	pub const DEFAULT_COMMENT_WINDOW_SECS: u32 = 30;

	pub fn new(window: Duration) -> Self {
		Self { window }
	}

	pub fn from_secs(secs: u32) -> Self {
		Self::new(Duration::seconds(i64::from(secs)))
	}

	pub fn window(&self) -> Duration {
		self.window
	}

	pub fn check(&self, last: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Result<(), Throttled> {
		let Some(last) = last else {
			return Ok(());
		};

		let elapsed = now - last;

		if elapsed < self.window {
			return Err(Throttled {
				retry_after: self.window - elapsed,
			});
		}

		Ok(())
	}
}

impl Default for Throttle {
	fn default() -> Self {
		Self::from_secs(Self::DEFAULT_COMMENT_WINDOW_SECS)
	}
}
