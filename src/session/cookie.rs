use crate::session::authority::SessionToken;
use axum::http::header::{COOKIE, InvalidHeaderValue};
use axum::http::{HeaderMap, HeaderValue};
use std::time::Duration;

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "beta_session";

/// Attributes of the session cookie.
#[derive(Debug, Clone, Copy)]
pub struct CookiePolicy {
    /// Must equal the token lifetime so the browser drops the cookie when the
    /// token stops validating.
    pub max_age: Duration,
    /// Adds `Secure` and uses `SameSite=Strict`. When off (plain-http local
    /// development) the cookie is sent with `SameSite=Lax` and no `Secure`.
    pub secure: bool,
}

impl CookiePolicy {
    /// Build the `Set-Cookie` value for a freshly issued token.
    pub fn session_cookie(&self, token: &SessionToken) -> Result<HeaderValue, InvalidHeaderValue> {
        let max_age = self.max_age.as_secs();
        let mut cookie = format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; Max-Age={max_age}");

        let expires = i64::try_from(max_age)
            .ok()
            .and_then(chrono::TimeDelta::try_seconds)
            .and_then(|delta| chrono::Utc::now().checked_add_signed(delta));
        if let Some(expires) = expires {
            cookie.push_str(&format!(
                "; Expires={}",
                expires.format("%a, %d %b %Y %H:%M:%S GMT")
            ));
        }
        if self.secure {
            cookie.push_str("; Secure; SameSite=Strict");
        } else {
            cookie.push_str("; SameSite=Lax");
        }

        HeaderValue::from_str(&cookie)
    }
}

/// Find a cookie by name across all `Cookie` headers of a request.
///
/// Pairs are split on `;`, and each pair on its first `=`. When a name repeats,
/// the last pair wins. Values are returned as-is; the session token never
/// needs decoding.
pub fn extract_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .filter(|(key, _)| *key == name)
        .last()
        .map(|(_, value)| value)
}

/// Session token string from the request cookies, if any.
pub fn session_from_headers(headers: &HeaderMap) -> Option<&str> {
    extract_cookie(headers, SESSION_COOKIE).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::TokenAuthority;

    fn headers(cookies: &[&str]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for cookie in cookies {
            headers.append(COOKIE, HeaderValue::from_str(cookie).unwrap());
        }
        headers
    }

    #[test]
    fn test_extract_cookie() {
        let headers = headers(&["theme=dark; beta_session=123.abc; other=x=y"]);

        assert_eq!(extract_cookie(&headers, "beta_session"), Some("123.abc"));
        assert_eq!(extract_cookie(&headers, "theme"), Some("dark"));
        // Only the first '=' separates key and value.
        assert_eq!(extract_cookie(&headers, "other"), Some("x=y"));
        assert_eq!(extract_cookie(&headers, "missing"), None);
    }

    #[test]
    fn test_extract_cookie_across_multiple_headers() {
        let headers = headers(&["a=1", "beta_session=42.ff"]);
        assert_eq!(session_from_headers(&headers), Some("42.ff"));
    }

    #[test]
    fn test_repeated_cookie_last_wins() {
        let same_header = headers(&["beta_session=1.a; theme=dark; beta_session=2.b"]);
        assert_eq!(session_from_headers(&same_header), Some("2.b"));

        let split_headers = headers(&["beta_session=1.a", "beta_session=2.b"]);
        assert_eq!(session_from_headers(&split_headers), Some("2.b"));
    }

    #[test]
    fn test_extract_cookie_does_not_match_prefix() {
        let headers = headers(&["beta_session_old=1.2; xbeta_session=3.4"]);
        assert_eq!(session_from_headers(&headers), None);
    }

    #[test]
    fn test_empty_session_cookie_is_absent() {
        assert_eq!(session_from_headers(&headers(&["beta_session="])), None);
        assert_eq!(session_from_headers(&HeaderMap::new()), None);
    }

    #[test]
    fn test_secure_session_cookie_attributes() {
        let authority = TokenAuthority::new("pw", Duration::from_secs(604800)).unwrap();
        let token = authority.issue();
        let policy = CookiePolicy {
            max_age: authority.lifetime(),
            secure: true,
        };

        let cookie = policy.session_cookie(&token).unwrap();
        let cookie = cookie.to_str().unwrap();

        assert!(cookie.starts_with(&format!("beta_session={token};")));
        assert!(cookie.contains("; Path=/"));
        assert!(cookie.contains("; HttpOnly"));
        assert!(cookie.contains("; Secure"));
        assert!(cookie.contains("; SameSite=Strict"));
        assert!(cookie.contains("; Max-Age=604800"));
        assert!(cookie.contains("; Expires="));
        assert!(cookie.contains(" GMT"));
    }

    #[test]
    fn test_insecure_session_cookie_attributes() {
        let authority = TokenAuthority::new("pw", Duration::from_secs(60)).unwrap();
        let policy = CookiePolicy {
            max_age: authority.lifetime(),
            secure: false,
        };

        let cookie = policy.session_cookie(&authority.issue()).unwrap();
        let cookie = cookie.to_str().unwrap();

        assert!(!cookie.contains("Secure"));
        assert!(cookie.contains("; SameSite=Lax"));
        assert!(cookie.contains("; Max-Age=60"));
    }
}
