//! Shared event password gate.

use crate::session::SessionCache;
use keepsake_core::{AppError, Config, Credentials};
use subtle::ConstantTimeEq;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    #[error("Incorrect Password. Please try again.")]
    IncorrectPassword,

    #[error("EVENT_PASSWORD is not configured")]
    NotConfigured,
}

impl From<GateError> for AppError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::IncorrectPassword => AppError::Validation(err.to_string()),
            GateError::NotConfigured => AppError::Configuration(err.to_string()),
        }
    }
}

#[derive(Clone)]
pub struct EventGate {
    secret: String,
}

impl std::fmt::Debug for EventGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventGate").finish_non_exhaustive()
    }
}

impl EventGate {
    pub fn new(secret: impl Into<String>) -> Result<Self, GateError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(GateError::NotConfigured);
        }
        Ok(Self { secret })
    }

    pub fn from_config(config: &Config) -> Result<Self, GateError> {
        Self::new(config.event_password.clone().unwrap_or_default())
    }

    /// Constant-time comparison against the event password.
    pub fn verify(&self, password: &str) -> Result<(), GateError> {
        if password.as_bytes().ct_eq(self.secret.as_bytes()).into() {
            Ok(())
        } else {
            Err(GateError::IncorrectPassword)
        }
    }

    /// Verify and remember the login. The name is not required.
    pub fn login(
        &self,
        cache: &SessionCache,
        name: &str,
        password: &str,
        ttl_hours: i64,
    ) -> Result<Credentials, GateError> {
        self.verify(password)?;
        cache.save(name, password, ttl_hours);
        tracing::info!(has_name = !name.trim().is_empty(), "Guest logged in");
        Ok(Credentials {
            name: name.trim().to_string(),
            secret: password.to_string(),
        })
    }

    /// Cached credentials that still match the event password. A stale
    /// secret clears the cache.
    pub fn resume(&self, cache: &SessionCache) -> Option<Credentials> {
        let credentials = cache.load()?;
        match self.verify(&credentials.secret) {
            Ok(()) => Some(credentials),
            Err(_) => {
                tracing::info!("Cached session no longer matches the event password");
                cache.clear();
                None
            }
        }
    }
}
