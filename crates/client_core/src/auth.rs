//! Access token source used by the API clients.
//!
//! Token acquisition and refresh are handled by an external OAuth library; the
//! in-memory authenticator here only holds a configured token and lets the
//! shell simulate expiry.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use shared::error::{ApiError, ErrorCode};
use tracing::info;

#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn access_token(&self) -> Option<String>;
    fn is_logged_in(&self) -> bool;
    async fn login(&self) -> Result<(), ApiError>;
    async fn logout(&self) -> Result<(), ApiError>;
    /// Makes the current token unusable so the next API call is rejected.
    fn expire_access_token(&self);
}

pub struct InMemoryAuthenticator {
    configured_token: Option<String>,
    current_token: Mutex<Option<String>>,
}

impl InMemoryAuthenticator {
    /// Starts logged in when a token is configured.
    pub fn new(configured_token: Option<String>) -> Self {
        Self {
            current_token: Mutex::new(configured_token.clone()),
            configured_token,
        }
    }

    fn current(&self) -> MutexGuard<'_, Option<String>> {
        self.current_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Authenticator for InMemoryAuthenticator {
    async fn access_token(&self) -> Option<String> {
        self.current().clone()
    }

    fn is_logged_in(&self) -> bool {
        self.current().is_some()
    }

    async fn login(&self) -> Result<(), ApiError> {
        let Some(token) = self.configured_token.clone() else {
            return Err(ApiError::new(
                ErrorCode::LoginCancelled,
                "no credentials are configured for sign-in",
            ));
        };
        *self.current() = Some(token);
        info!("signed in");
        Ok(())
    }

    async fn logout(&self) -> Result<(), ApiError> {
        self.current().take();
        info!("signed out");
        Ok(())
    }

    fn expire_access_token(&self) {
        let mut current = self.current();
        if let Some(token) = current.as_mut() {
            token.insert_str(0, "expired-");
            info!("access token expired on request");
        }
    }
}
