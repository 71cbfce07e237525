pub mod authority;
pub mod cookie;
pub mod error;
pub mod middleware;

// Re-export public types and functions
pub use authority::{DEFAULT_SESSION_LIFETIME, SessionToken, TokenAuthority};
pub use cookie::{CookiePolicy, SESSION_COOKIE, session_from_headers};
pub use error::TokenError;
pub use middleware::session_auth_middleware;
