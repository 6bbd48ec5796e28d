//! Local session cache.
//!
//! The last successful login is persisted as two string slots, an obfuscated
//! blob and its absolute expiry. The obfuscation only deters casual
//! inspection of the stored event password.

pub mod cache;
pub mod obfuscate;
pub mod store;

pub use cache::{Clock, SessionCache, SystemClock, EXPIRES_SLOT, SESSION_SLOT};
pub use obfuscate::{Fingerprint, ObfuscationKey};
pub use store::{FileSessionStore, MemorySessionStore, SessionError, SessionStore};
