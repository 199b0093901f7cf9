use teledrbg_core::{RECORD_LEN, quick_quality, read_records};

pub fn run(path: &str) -> teledrbg_core::Result<()> {
    let records = read_records(path)?;
    let bytes: Vec<u8> = records.iter().flatten().copied().collect();

    println!("{path}: {} records x {RECORD_LEN} bytes", records.len());

    let mut sorted = records.clone();
    sorted.sort_unstable();
    sorted.dedup();
    let duplicates = records.len() - sorted.len();
    if duplicates > 0 {
        println!("  WARNING: {duplicates} duplicate records");
    }

    println!("{}", quick_quality(&bytes));
    Ok(())
}
