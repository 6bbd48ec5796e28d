//! Reversible XOR obfuscation keyed by a device fingerprint.
//!
//! Not encryption: anyone with the fingerprint inputs can recover the blob.

use super::store::SessionError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha256};

const KEY_SALT: &str = "keepsake_session_v1";

/// Deterministic inputs for the obfuscation key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub agent: String,
    pub host: String,
}

impl Fingerprint {
    pub fn new(agent: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            host: host.into(),
        }
    }

    /// Fingerprint of this client build on this machine.
    pub fn current() -> Self {
        let agent = format!(
            "keepsake/{} ({}; {})",
            env!("CARGO_PKG_VERSION"),
            std::env::consts::OS,
            std::env::consts::ARCH
        );
        let host = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| "localhost".to_string());
        Self { agent, host }
    }

    pub fn derive_key(&self) -> ObfuscationKey {
        let digest = Sha256::digest(format!("{}_{}_{}", self.agent, self.host, KEY_SALT).as_bytes());
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest);
        ObfuscationKey(key)
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct ObfuscationKey([u8; 32]);

impl std::fmt::Debug for ObfuscationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ObfuscationKey(<redacted>)")
    }
}

impl ObfuscationKey {
    fn apply(&self, data: &[u8]) -> Vec<u8> {
        data.iter()
            .zip(self.0.iter().cycle())
            .map(|(byte, key)| byte ^ key)
            .collect()
    }

    /// XOR then base64.
    pub fn encode(&self, plain: &str) -> String {
        STANDARD.encode(self.apply(plain.as_bytes()))
    }

    pub fn decode(&self, encoded: &str) -> Result<String, SessionError> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| SessionError::Decode(format!("invalid base64: {}", e)))?;
        String::from_utf8(self.apply(&bytes))
            .map_err(|_| SessionError::Decode("decoded blob is not UTF-8".to_string()))
    }
}
