//! Entropy Collector: one telemetry snapshot in, one hex digest out.
//!
//! The snapshot gets a `random_component` field from the secure random
//! source, is serialized as key-sorted compact JSON, and is run through
//! [`DIGEST_PASSES`] chained SHA-512 passes. Every call samples afresh;
//! digests are never cached.

use std::fmt;
use std::sync::Arc;

use sha2::{Digest, Sha512};

use crate::error::Result;
use crate::random::{SecureRandom, to_hex};
use crate::telemetry::{TelemetrySnapshot, TelemetrySource};

/// Number of chained SHA-512 passes over the serialized snapshot.
pub const DIGEST_PASSES: usize = 3;

/// Snapshot field holding the collector's own random bytes.
pub const RANDOM_COMPONENT_KEY: &str = "random_component";

/// Lowercase hex SHA-512 digest of one telemetry snapshot.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct EntropyDigest(String);

impl EntropyDigest {
    /// Hex length of every digest.
    pub const HEX_LEN: usize = 128;

    /// Wrap an already-computed hex digest.
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for EntropyDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for EntropyDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head: String = self.0.chars().take(16).collect();
        write!(f, "EntropyDigest({head}…)")
    }
}

/// Capability handed to the generator: produce a fresh digest on demand.
pub trait EntropyCollector: Send + Sync {
    fn collect(&self) -> Result<EntropyDigest>;
}

impl<T: EntropyCollector + ?Sized> EntropyCollector for &T {
    fn collect(&self) -> Result<EntropyDigest> {
        (**self).collect()
    }
}

impl<T: EntropyCollector + ?Sized> EntropyCollector for Arc<T> {
    fn collect(&self) -> Result<EntropyDigest> {
        (**self).collect()
    }
}

/// Collector over a [`TelemetrySource`] plus a [`SecureRandom`] component.
pub struct TelemetryCollector<T, R> {
    telemetry: T,
    random: R,
}

impl<T: TelemetrySource, R: SecureRandom> TelemetryCollector<T, R> {
    pub fn new(telemetry: T, random: R) -> Self {
        Self { telemetry, random }
    }

    /// The snapshot exactly as it will be serialized and hashed.
    pub fn snapshot(&self) -> Result<TelemetrySnapshot> {
        let mut snap = self.telemetry.sample()?;
        let noise = self.random.nonce()?;
        snap.set(RANDOM_COMPONENT_KEY, to_hex(&noise));
        Ok(snap)
    }
}

impl<T: TelemetrySource, R: SecureRandom> EntropyCollector for TelemetryCollector<T, R> {
    fn collect(&self) -> Result<EntropyDigest> {
        let serialized = self.snapshot()?.to_canonical_json()?;
        Ok(digest_serialized(&serialized))
    }
}

/// Chained SHA-512: hash the input, then re-hash the hex of each result.
pub fn digest_serialized(serialized: &str) -> EntropyDigest {
    let mut hex = to_hex(&Sha512::digest(serialized.as_bytes()));
    for _ in 1..DIGEST_PASSES {
        hex = to_hex(&Sha512::digest(hex.as_bytes()));
    }
    EntropyDigest(hex)
}
