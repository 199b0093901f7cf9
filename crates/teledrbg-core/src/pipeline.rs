//! Output Pipeline: many independent lineages, one writer.
//!
//! Architecture:
//! 1. A fixed set of scoped worker threads pull lineage indices from a
//!    shared counter
//! 2. Each worker owns its lineage's generator state outright
//! 3. Finalized records go over a bounded channel to the calling thread
//! 4. Only the calling thread touches the sink, one `write_all` per record
//! 5. The first failure stops new lineages from starting; `run` still joins
//!    every worker before returning

use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use sha2::{Digest, Sha256};

use crate::collector::EntropyCollector;
use crate::error::{Error, Result};
use crate::generator::{Block, Generator};
use crate::random::SecureRandom;
use crate::seed::SeedAssembler;
use crate::sink::{RECORD_LEN, Record};

/// One SHA-256 pass that separates the generator's chaining value from the
/// published record.
pub fn finalize(block: &Block) -> Record {
    Sha256::digest(block).into()
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub lineages: usize,
    pub rounds_per_lineage: usize,
    pub records_written: usize,
    pub bytes_written: usize,
    pub workers: usize,
    pub elapsed: Duration,
}

pub struct Pipeline<C, R> {
    collector: C,
    assembler: SeedAssembler<R>,
    workers: usize,
}

impl<C: EntropyCollector, R: SecureRandom> Pipeline<C, R> {
    /// Pipeline using one worker per available CPU.
    pub fn new(collector: C, assembler: SeedAssembler<R>) -> Self {
        let workers = std::thread::available_parallelism()
            .map(std::num::NonZero::get)
            .unwrap_or(1);
        Self {
            collector,
            assembler,
            workers,
        }
    }

    /// Override the worker count. `1` runs lineages strictly in order.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn collector(&self) -> &C {
        &self.collector
    }

    pub fn assembler(&self) -> &SeedAssembler<R> {
        &self.assembler
    }

    /// Drive one lineage to its finalized record. `None` when `rounds == 0`.
    pub fn run_lineage(&self, index: usize, rounds: usize) -> Result<Option<Record>> {
        if rounds == 0 {
            return Ok(None);
        }
        let seed = self.assembler.assemble(&self.collector.collect()?)?;
        let block = Generator::new(seed, rounds).run(&self.collector, &self.assembler)?;
        debug!("lineage {index}: {rounds} rounds complete");
        Ok(block.as_ref().map(finalize))
    }

    /// Run `lineage_count` lineages of `rounds` rounds each and append one
    /// record per lineage to `sink`.
    ///
    /// Records land in completion order. On error, every record written
    /// before the failure is whole and stays in the sink.
    pub fn run<W: Write + ?Sized>(
        &self,
        lineage_count: usize,
        rounds: usize,
        sink: &mut W,
    ) -> Result<PipelineReport> {
        let started = Instant::now();
        let workers = self.workers.min(lineage_count).max(1);
        info!("starting {lineage_count} lineages x {rounds} rounds on {workers} workers");

        let next = AtomicUsize::new(1);
        let abort = AtomicBool::new(false);
        let mut written = 0usize;
        let mut failure: Option<Error> = None;

        std::thread::scope(|s| {
            let (tx, rx) = mpsc::sync_channel::<(usize, Result<Option<Record>>)>(workers * 2);
            for _ in 0..workers {
                let tx = tx.clone();
                let next = &next;
                let abort = &abort;
                s.spawn(move || {
                    while !abort.load(Ordering::Acquire) {
                        let index = next.fetch_add(1, Ordering::Relaxed);
                        if index > lineage_count {
                            break;
                        }
                        let result = self.run_lineage(index, rounds);
                        if tx.send((index, result)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(tx);

            for (index, result) in rx {
                let err = match result {
                    Ok(Some(record)) => match sink.write_all(&record) {
                        Ok(()) => {
                            written += 1;
                            continue;
                        }
                        Err(e) => Error::Sink(e),
                    },
                    Ok(None) => continue,
                    Err(e) => Error::Lineage {
                        index,
                        source: Box::new(e),
                    },
                };
                warn!("aborting run: {err}");
                abort.store(true, Ordering::Release);
                failure = Some(err);
                break;
            }
        });

        if let Some(err) = failure {
            return Err(err);
        }
        sink.flush()?;

        let report = PipelineReport {
            lineages: lineage_count,
            rounds_per_lineage: rounds,
            records_written: written,
            bytes_written: written * RECORD_LEN,
            workers,
            elapsed: started.elapsed(),
        };
        info!(
            "wrote {} records ({} bytes) in {:.2?}",
            report.records_written, report.bytes_written, report.elapsed
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;
    use crate::collector::EntropyDigest;

    struct Scripted;

    impl EntropyCollector for Scripted {
        fn collect(&self) -> Result<EntropyDigest> {
            Ok(EntropyDigest::from_hex("c0ffee"))
        }
    }

    /// Fails every call after the first `ok` calls.
    struct Flaky {
        ok: usize,
        calls: AtomicUsize,
    }

    impl EntropyCollector for Flaky {
        fn collect(&self) -> Result<EntropyDigest> {
            if self.calls.fetch_add(1, Ordering::SeqCst) >= self.ok {
                return Err(Error::TelemetryUnavailable("unplugged".to_string()));
            }
            Ok(EntropyDigest::from_hex("c0ffee"))
        }
    }

    struct Zero;

    impl SecureRandom for Zero {
        fn fill(&self, buf: &mut [u8]) -> Result<()> {
            buf.fill(0);
            Ok(())
        }
    }

    /// Accepts `capacity` records, then reports a full disk.
    struct FullDisk {
        data: Vec<u8>,
        capacity: usize,
    }

    impl Write for FullDisk {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.data.len() + buf.len() > self.capacity * RECORD_LEN {
                return Err(io::Error::other("no space left on device"));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn pipeline() -> Pipeline<Scripted, Zero> {
        Pipeline::new(Scripted, SeedAssembler::new(Zero, None))
    }

    #[test]
    fn writes_one_record_per_lineage() {
        let mut out = Vec::new();
        let report = pipeline().with_workers(4).run(9, 3, &mut out).unwrap();
        assert_eq!(report.records_written, 9);
        assert_eq!(out.len(), 9 * RECORD_LEN);
    }

    #[test]
    fn zero_rounds_writes_nothing() {
        let mut out = Vec::new();
        let report = pipeline().run(5, 0, &mut out).unwrap();
        assert_eq!(report.records_written, 0);
        assert!(out.is_empty());
    }

    #[test]
    fn zero_lineages_writes_nothing() {
        let mut out = Vec::new();
        let report = pipeline().run(0, 10, &mut out).unwrap();
        assert_eq!(report.records_written, 0);
        assert!(out.is_empty());
    }

    #[test]
    fn record_is_hash_of_final_block() {
        let p = pipeline();
        let seed = p
            .assembler()
            .assemble(&EntropyDigest::from_hex("c0ffee"))
            .unwrap();
        let block = Generator::new(seed, 2)
            .run(p.collector(), p.assembler())
            .unwrap()
            .unwrap();
        let record = p.run_lineage(1, 2).unwrap().unwrap();
        assert_eq!(record, finalize(&block));
        assert_ne!(record, block);
    }

    #[test]
    fn lineage_failure_aborts_the_run() {
        let p = Pipeline::new(
            Flaky {
                ok: 4,
                calls: AtomicUsize::new(0),
            },
            SeedAssembler::new(Zero, None),
        )
        .with_workers(1);
        let mut out = Vec::new();
        let err = p.run(10, 1, &mut out).unwrap_err();
        assert!(matches!(err, Error::Lineage { .. }));
        // Two lineages of one round fit in four collections.
        assert_eq!(out.len(), 2 * RECORD_LEN);
    }

    #[test]
    fn sink_failure_keeps_whole_records() {
        let mut sink = FullDisk {
            data: Vec::new(),
            capacity: 3,
        };
        let err = pipeline().with_workers(2).run(8, 1, &mut sink).unwrap_err();
        assert!(matches!(err, Error::Sink(_)));
        assert_eq!(sink.data.len(), 3 * RECORD_LEN);
    }
}
