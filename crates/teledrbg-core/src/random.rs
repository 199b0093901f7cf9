//! Secure random boundary.
//!
//! Nonces and the collector's random component come from here, never from
//! telemetry, so they stay independent of anything an observer of the
//! machine's counters could learn.

use std::sync::Arc;

use crate::error::Result;

/// Width of every nonce drawn from the secure random source, in bytes.
pub const NONCE_LEN: usize = 32;

/// A cryptographically secure byte source. Failure is fatal to the caller.
pub trait SecureRandom: Send + Sync {
    /// Fill `buf` entirely with random bytes.
    fn fill(&self, buf: &mut [u8]) -> Result<()>;

    /// Draw a fixed-width nonce.
    fn nonce(&self) -> Result<[u8; NONCE_LEN]> {
        let mut out = [0u8; NONCE_LEN];
        self.fill(&mut out)?;
        Ok(out)
    }
}

/// OS CSPRNG via the `getrandom` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl SecureRandom for OsRandom {
    fn fill(&self, buf: &mut [u8]) -> Result<()> {
        getrandom::fill(buf)?;
        Ok(())
    }
}

impl<T: SecureRandom + ?Sized> SecureRandom for &T {
    fn fill(&self, buf: &mut [u8]) -> Result<()> {
        (**self).fill(buf)
    }
}

impl<T: SecureRandom + ?Sized> SecureRandom for Arc<T> {
    fn fill(&self, buf: &mut [u8]) -> Result<()> {
        (**self).fill(buf)
    }
}

/// Lowercase hex encoding.
pub(crate) fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
