//! Output file format: a flat concatenation of fixed-width records.
//!
//! No header, no separators. Record boundaries are implied by
//! [`RECORD_LEN`], so a file whose length is not a multiple of it is torn.

use std::fs::{File, OpenOptions};
use std::path::Path;

use crate::error::{Error, Result};
use crate::generator::BLOCK_LEN;

/// Width of one output record in bytes.
pub const RECORD_LEN: usize = BLOCK_LEN;

pub type Record = [u8; RECORD_LEN];

/// Open `path` for appending, creating it if needed.
pub fn open_output(path: impl AsRef<Path>) -> Result<File> {
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

/// Read a record file back, rejecting torn files.
pub fn read_records(path: impl AsRef<Path>) -> Result<Vec<Record>> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    if data.len() % RECORD_LEN != 0 {
        return Err(Error::Config(format!(
            "{} is {} bytes, not a whole number of {RECORD_LEN}-byte records",
            path.display(),
            data.len()
        )));
    }
    Ok(data
        .chunks_exact(RECORD_LEN)
        .map(|chunk| {
            let mut record = [0u8; RECORD_LEN];
            record.copy_from_slice(chunk);
            record
        })
        .collect())
}
