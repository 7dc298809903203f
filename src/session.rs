use cookie::{Cookie, SameSite};
use uuid::Uuid;

pub const COOKIE_NAME: &str = "session";

/// Creates a session cookie with no expiry
pub fn create_cookie(session_id: Uuid) -> Cookie<'static> {
	Cookie::build((COOKIE_NAME, session_id.to_string()))
		.secure(!cfg!(debug_assertions))
		.http_only(true)
		.same_site(SameSite::Lax)
		.path("/")
		.into()
}

/// Creates an empty session cookie used to invalidate a previous one
pub fn clear_cookie() -> Cookie<'static> {
	Cookie::build(COOKIE_NAME)
		.http_only(true)
		.path("/")
		.max_age(cookie::time::Duration::ZERO)
		.into()
}

/// Finds the session id among the `Cookie` headers of a request.
///
/// Returns `None` when there is no session cookie and `Some(Err(..))`
/// when there is one that does not hold a session id.
pub fn find_session_id<'a>(
	headers: impl IntoIterator<Item = &'a str>,
) -> Option<Result<Uuid, uuid::Error>> {
	headers
		.into_iter()
		.flat_map(Cookie::split_parse)
		.filter_map(Result::ok)
		.find(|cookie| cookie.name() == COOKIE_NAME)
		.map(|cookie| Uuid::parse_str(cookie.value()))
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_find_session_id() {
		let id = Uuid::new_v4();
		let header = format!("theme=dark; {COOKIE_NAME}={id}");

		assert_eq!(
			find_session_id([header.as_str()]).and_then(Result::ok),
			Some(id)
		);
		assert!(find_session_id(["theme=dark"]).is_none());
		assert!(matches!(
			find_session_id([format!("{COOKIE_NAME}=nope").as_str()]),
			Some(Err(_))
		));
	}

	#[test]
	fn test_clear_cookie_expires_immediately() {
		let cookie = clear_cookie();

		assert_eq!(cookie.name(), COOKIE_NAME);
		assert_eq!(cookie.max_age(), Some(cookie::time::Duration::ZERO));
	}
}
