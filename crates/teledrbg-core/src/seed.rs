//! Seed Assembler: `digest ‖ hex(nonce) ‖ tag`.
//!
//! The personalization tag is a non-secret domain-separation label. It is
//! folded into every seed verbatim and adds no secrecy.

use std::fmt;

use crate::collector::EntropyDigest;
use crate::error::Result;
use crate::random::{SecureRandom, to_hex};

/// Per-round seed material. Consumed by exactly one generator round.
#[derive(Clone, PartialEq, Eq)]
pub struct SeedString(String);

impl SeedString {
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for SeedString {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Debug for SeedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SeedString({} bytes)", self.0.len())
    }
}

pub struct SeedAssembler<R> {
    random: R,
    personalization: Option<String>,
}

impl<R: SecureRandom> SeedAssembler<R> {
    pub fn new(random: R, personalization: Option<String>) -> Self {
        Self {
            random,
            personalization,
        }
    }

    pub fn personalization(&self) -> Option<&str> {
        self.personalization.as_deref()
    }

    /// Draw a fresh nonce and concatenate it after `digest`.
    pub fn assemble(&self, digest: &EntropyDigest) -> Result<SeedString> {
        let nonce = self.random.nonce()?;
        let tag = self.personalization.as_deref().unwrap_or("");
        let mut seed = String::with_capacity(digest.as_str().len() + nonce.len() * 2 + tag.len());
        seed.push_str(digest.as_str());
        seed.push_str(&to_hex(&nonce));
        seed.push_str(tag);
        Ok(SeedString(seed))
    }
}
