use super::obfuscate::{Fingerprint, ObfuscationKey};
use super::store::{FileSessionStore, SessionError, SessionStore};
use keepsake_core::{Config, Credentials, SessionRecord};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

pub const SESSION_SLOT: &str = "keepsake_session";
pub const EXPIRES_SLOT: &str = "keepsake_session_expires";

const MILLIS_PER_HOUR: i64 = 60 * 60 * 1000;

pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

#[derive(Serialize, Deserialize)]
struct SessionBlob {
    name: String,
    secret: String,
    timestamp: i64,
}

/// Remembers the last successful login.
///
/// No operation here fails the caller: without a store every call is a
/// no-op, and unreadable state is cleared and reported as "no session".
#[derive(Clone)]
pub struct SessionCache {
    store: Option<Arc<dyn SessionStore>>,
    key: ObfuscationKey,
    clock: Arc<dyn Clock>,
}

impl SessionCache {
    pub fn new(store: Option<Arc<dyn SessionStore>>, fingerprint: &Fingerprint) -> Self {
        Self {
            store,
            key: fingerprint.derive_key(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// File-backed cache at `path`, keyed to this machine.
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        let store = FileSessionStore::new(path);
        Self::new(Some(Arc::new(store)), &Fingerprint::current())
    }

    pub fn from_config(config: &Config) -> Self {
        Self::at_path(config.session_path.clone())
    }

    pub fn is_persistent(&self) -> bool {
        self.store.is_some()
    }

    fn write_slots(
        store: &dyn SessionStore,
        encoded: &str,
        expires_at: &str,
    ) -> Result<(), SessionError> {
        store.set(SESSION_SLOT, encoded)?;
        store.set(EXPIRES_SLOT, expires_at)
    }

    /// Persist `name` (trimmed) and `secret` for `ttl_hours`.
    pub fn save(&self, name: &str, secret: &str, ttl_hours: i64) {
        let Some(store) = self.store.as_deref() else {
            tracing::debug!("No session store available, session persistence disabled");
            return;
        };

        let now = self.clock.now_millis();
        let blob = SessionBlob {
            name: name.trim().to_string(),
            secret: secret.to_string(),
            timestamp: now,
        };
        let json = match serde_json::to_string(&blob) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize session");
                return;
            }
        };
        let encoded = self.key.encode(&json);
        let expires_at = now.saturating_add(ttl_hours.saturating_mul(MILLIS_PER_HOUR));
        let expires_at = expires_at.to_string();

        if let Err(e) = Self::write_slots(store, &encoded, &expires_at) {
            tracing::warn!(error = %e, "Failed to save session, clearing and retrying");
            let _ = store.remove(SESSION_SLOT);
            let _ = store.remove(EXPIRES_SLOT);
            if let Err(e) = Self::write_slots(store, &encoded, &expires_at) {
                tracing::error!(error = %e, "Failed to save session after retry");
            }
        }
    }

    fn read_record(&self, store: &dyn SessionStore) -> Result<Option<SessionRecord>, SessionError> {
        let encoded = store.get(SESSION_SLOT)?;
        let expires = store.get(EXPIRES_SLOT)?;
        let (Some(encoded), Some(expires)) = (encoded, expires) else {
            return Ok(None);
        };

        let expires_at_millis: i64 = expires
            .trim()
            .parse()
            .map_err(|_| SessionError::Decode(format!("invalid expiry: {}", expires)))?;

        let json = self.key.decode(&encoded)?;
        let blob: SessionBlob =
            serde_json::from_str(&json).map_err(|e| SessionError::Decode(e.to_string()))?;

        Ok(Some(SessionRecord {
            name: blob.name,
            secret: blob.secret,
            saved_at_millis: blob.timestamp,
            expires_at_millis,
        }))
    }

    /// The cached credentials, if present and unexpired.
    pub fn load(&self) -> Option<Credentials> {
        let store = self.store.as_deref()?;

        match self.read_record(store) {
            Ok(Some(record)) if !record.is_expired(self.clock.now_millis()) => {
                Some(record.credentials())
            }
            Ok(Some(_)) => {
                tracing::debug!("Session expired");
                self.clear();
                None
            }
            Ok(None) => {
                // Drop a lone slot left behind by an interrupted save.
                self.clear();
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable session");
                self.clear();
                None
            }
        }
    }

    pub fn clear(&self) {
        let Some(store) = self.store.as_deref() else {
            return;
        };
        for slot in [SESSION_SLOT, EXPIRES_SLOT] {
            if let Err(e) = store.remove(slot) {
                tracing::warn!(slot, error = %e, "Failed to clear session slot");
            }
        }
    }
}
