//! Signing authority: exclusive owner of one symmetric key.

use ring::hmac;
use ring::rand::{SecureRandom, SystemRandom};
use std::fmt;

use super::types::AuthError;

/// Length of the symmetric key in bytes.
pub const KEY_LEN: usize = 32;

const ALG_NAME: &str = "HS256";

/// Holder of an HMAC-SHA256 signing key and its algorithm identifier.
///
/// The key is generated once from the system CSPRNG and is immutable for the
/// lifetime of the authority. No code outside this type ever reads the key
/// bytes; consumers only get fresh hash contexts.
pub struct Authority {
    key: hmac::Key,
}

impl Authority {
    /// Generates a fresh 32-byte key. Entropy failure is surfaced to the
    /// caller as `KeyGeneration` and is fatal there, never retried here.
    pub fn new() -> Result<Self, AuthError> {
        let rng = SystemRandom::new();
        let mut secret = [0u8; KEY_LEN];
        rng.fill(&mut secret).map_err(|_| AuthError::KeyGeneration)?;
        Ok(Authority {
            key: hmac::Key::new(hmac::HMAC_SHA256, &secret),
        })
    }

    /// Fixed algorithm name carried in token headers.
    pub fn alg(&self) -> &'static str {
        ALG_NAME
    }

    /// Returns a fresh keyed-hash context. HMAC state is not safe to share
    /// across concurrent writers, so every sign/verify gets its own.
    pub fn hasher(&self) -> hmac::Context {
        hmac::Context::with_key(&self.key)
    }
}

impl fmt::Debug for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Key bytes stay out of logs.
        f.debug_struct("Authority").field("alg", &ALG_NAME).finish()
    }
}
