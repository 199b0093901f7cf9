//! # teledrbg-core
//!
//! **Random records seeded from what your machine is doing right now.**
//!
//! `teledrbg-core` fingerprints live system telemetry (CPU, memory, disk,
//! network, process table) into a digest, pairs it with an OS nonce, and
//! feeds the result into an HMAC-SHA-256 generator that reseeds on every
//! round. Many independent lineages run in parallel and each one finalizes
//! into a single 32-byte record appended to a flat output file.
//!
//! ## Quick Start
//!
//! ```no_run
//! use teledrbg_core::{OsRandom, Pipeline, SeedAssembler, SystemTelemetry, TelemetryCollector};
//!
//! let collector = TelemetryCollector::new(SystemTelemetry::default(), OsRandom);
//! let assembler = SeedAssembler::new(OsRandom, None);
//! let pipeline = Pipeline::new(collector, assembler);
//!
//! let mut out = Vec::new();
//! let report = pipeline.run(4, 10, &mut out).unwrap();
//! assert_eq!(out.len(), 4 * teledrbg_core::RECORD_LEN);
//! println!("{} records", report.records_written);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Telemetry → Collector (digest) → Seed Assembler (‖ nonce ‖ tag)
//!           → Generator (K, V rounds, reseed each round) → SHA-256 → Record
//! ```
//!
//! Every capability boundary is a trait: [`TelemetrySource`] for counters,
//! [`SecureRandom`] for nonces and [`EntropyCollector`] for digests, so
//! tests and alternate collection strategies plug in without touching the
//! generator.

pub mod collector;
pub mod config;
pub mod error;
pub mod generator;
pub mod pipeline;
pub mod quality;
pub mod random;
pub mod seed;
pub mod sink;
pub mod telemetry;

pub use collector::{DIGEST_PASSES, EntropyCollector, EntropyDigest, TelemetryCollector};
pub use config::{RunConfig, TelemetryConfig};
pub use error::{Error, Result};
pub use generator::{BLOCK_LEN, Block, Generator, GeneratorState};
pub use pipeline::{Pipeline, PipelineReport, finalize};
pub use quality::{QualityReport, quick_min_entropy, quick_quality, quick_shannon};
pub use random::{NONCE_LEN, OsRandom, SecureRandom};
pub use seed::{SeedAssembler, SeedString};
pub use sink::{RECORD_LEN, Record, open_output, read_records};
pub use telemetry::{
    BoundedTelemetry, METRIC_KEYS, Sample, SystemTelemetry, TelemetrySnapshot, TelemetrySource,
};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
