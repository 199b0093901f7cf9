//! Generator Core: an HMAC-SHA-256 state machine that reseeds every round.
//!
//! One round with seed `S`, reseed counter `c` and a fresh digest `E`:
//!
//! ```text
//! K     = HMAC(K, V ‖ 0x00 ‖ S)
//! V     = HMAC(K, V)
//! w     = HMAC(K, V ‖ 0x02 ‖ E)
//! V     = HMAC(K, V ‖ w)
//! V     = HMAC(K, V ‖ 0x03 ‖ be64(c))
//! block = HMAC(K, V);  V = block
//! ```
//!
//! A lineage starts from `K = 0x00…`, `V = 0x01…`, `c = 1`. If more rounds
//! remain, the next seed is assembled from another fresh digest.
//! Entropy is folded in only through hash composition.

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::collector::EntropyCollector;
use crate::error::Result;
use crate::random::SecureRandom;
use crate::seed::{SeedAssembler, SeedString};

type HmacSha256 = Hmac<Sha256>;

/// Width of the key, the chaining value and each output block.
pub const BLOCK_LEN: usize = 32;

pub type Block = [u8; BLOCK_LEN];

const INITIAL_KEY: Block = [0x00; BLOCK_LEN];
const INITIAL_VALUE: Block = [0x01; BLOCK_LEN];

const DOMAIN_UPDATE: u8 = 0x00;
const DOMAIN_ENTROPY: u8 = 0x02;
const DOMAIN_COUNTER: u8 = 0x03;

/// Lineage state. `Done` is absorbing.
pub enum GeneratorState {
    Running {
        key: Block,
        value: Block,
        seed: SeedString,
        rounds_remaining: usize,
        reseed_counter: u64,
    },
    /// `output` is the last round's block, or `None` if no round ever ran.
    Done { output: Option<Block> },
}

impl fmt::Debug for GeneratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running {
                rounds_remaining,
                reseed_counter,
                ..
            } => f
                .debug_struct("Running")
                .field("rounds_remaining", rounds_remaining)
                .field("reseed_counter", reseed_counter)
                .finish_non_exhaustive(),
            Self::Done { output } => f
                .debug_struct("Done")
                .field("has_output", &output.is_some())
                .finish(),
        }
    }
}

/// One lineage of the generator.
#[derive(Debug)]
pub struct Generator {
    state: GeneratorState,
}

impl Generator {
    /// Fresh lineage that will run `rounds` rounds starting from `seed`.
    pub fn new(seed: SeedString, rounds: usize) -> Self {
        let state = if rounds == 0 {
            GeneratorState::Done { output: None }
        } else {
            GeneratorState::Running {
                key: INITIAL_KEY,
                value: INITIAL_VALUE,
                seed,
                rounds_remaining: rounds,
                reseed_counter: 1,
            }
        };
        Self { state }
    }

    pub fn state(&self) -> &GeneratorState {
        &self.state
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state, GeneratorState::Done { .. })
    }

    pub fn rounds_remaining(&self) -> usize {
        match &self.state {
            GeneratorState::Running {
                rounds_remaining, ..
            } => *rounds_remaining,
            GeneratorState::Done { .. } => 0,
        }
    }

    /// Counter for the next round; `None` once done.
    pub fn reseed_counter(&self) -> Option<u64> {
        match &self.state {
            GeneratorState::Running { reseed_counter, .. } => Some(*reseed_counter),
            GeneratorState::Done { .. } => None,
        }
    }

    /// Final block once done.
    pub fn output(&self) -> Option<Block> {
        match &self.state {
            GeneratorState::Done { output } => *output,
            GeneratorState::Running { .. } => None,
        }
    }

    /// Run one round and return its block. A no-op returning `None` once done.
    ///
    /// On error the state is left exactly as it was before the call.
    pub fn step<C, R>(&mut self, collector: &C, assembler: &SeedAssembler<R>) -> Result<Option<Block>>
    where
        C: EntropyCollector + ?Sized,
        R: SecureRandom,
    {
        let GeneratorState::Running {
            key,
            value,
            seed,
            rounds_remaining,
            reseed_counter,
        } = &mut self.state
        else {
            return Ok(None);
        };

        let counter = (*reseed_counter).max(1);

        let k = hmac(key.as_slice(), &[value.as_slice(), &[DOMAIN_UPDATE], seed.as_bytes()]);
        let mut v = hmac(&k, &[value.as_slice()]);

        let fresh = collector.collect()?;
        let w = hmac(&k, &[v.as_slice(), &[DOMAIN_ENTROPY], fresh.as_bytes()]);
        v = hmac(&k, &[v.as_slice(), w.as_slice()]);

        v = hmac(&k, &[v.as_slice(), &[DOMAIN_COUNTER], &counter.to_be_bytes()]);
        let block = hmac(&k, &[v.as_slice()]);

        if *rounds_remaining == 1 {
            log::trace!("final round (counter {counter})");
            self.state = GeneratorState::Done {
                output: Some(block),
            };
            return Ok(Some(block));
        }

        let next_seed = assembler.assemble(&collector.collect()?)?;
        *key = k;
        *value = block;
        *seed = next_seed;
        *rounds_remaining -= 1;
        *reseed_counter = counter + 1;
        Ok(Some(block))
    }

    /// Step until done and return the final block.
    pub fn run<C, R>(mut self, collector: &C, assembler: &SeedAssembler<R>) -> Result<Option<Block>>
    where
        C: EntropyCollector + ?Sized,
        R: SecureRandom,
    {
        while !self.is_done() {
            self.step(collector, assembler)?;
        }
        Ok(self.output())
    }
}

fn hmac(key: &[u8], parts: &[&[u8]]) -> Block {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key size");
    for part in parts {
        mac.update(part);
    }
    mac.finalize().into_bytes().into()
}
