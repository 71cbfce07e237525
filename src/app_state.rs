use crate::config::Config;
use crate::session::{CookiePolicy, TokenAuthority};
use crate::storage::StorageClient;
use anyhow::anyhow;
use constant_time_eq::constant_time_eq;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Shared, immutable per-process state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub authority: Arc<TokenAuthority>,
    pub storage: Option<Arc<StorageClient>>,
    pub cookie_policy: CookiePolicy,
    password: Arc<str>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("authority", &self.authority)
            .field("storage", &self.storage)
            .field("cookie_policy", &self.cookie_policy)
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let password = config
            .password
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| anyhow!("Beta password is not configured"))?;

        let authority = TokenAuthority::new(password, config.session_lifetime())?;
        let cookie_policy = CookiePolicy {
            max_age: authority.lifetime(),
            secure: !config.insecure_cookies,
        };
        if config.insecure_cookies {
            warn!("Session cookies are issued without the Secure attribute");
        }

        let storage = match config.to_storage_config() {
            Some(storage_config) => Some(Arc::new(StorageClient::new(storage_config)?)),
            None => {
                warn!("Storage URL or service key missing, download links are unavailable");
                None
            }
        };

        info!(
            session_lifetime_secs = config.session_lifetime_secs,
            link_expiry_secs = config.link_expiry_secs,
            storage = storage.is_some(),
            "App state ready"
        );

        Ok(Self {
            authority: Arc::new(authority),
            storage,
            cookie_policy,
            password: Arc::from(password),
        })
    }

    /// Constant-time comparison against the configured shared password.
    pub fn password_matches(&self, candidate: &str) -> bool {
        constant_time_eq(self.password.as_bytes(), candidate.as_bytes())
    }
}
