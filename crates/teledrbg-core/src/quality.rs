//! Quick statistical checks on generated output.
//!
//! These are smoke tests for a finished record file, not a randomness
//! certification: a broken pipeline (constant records, torn writes, a
//! collapsed mixing step) shows up immediately as low entropy or high
//! compressibility.

use std::fmt;
use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;

/// Shannon entropy in bits/byte.
pub fn quick_shannon(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let counts = byte_counts(data);
    let n = data.len() as f64;
    let mut h = 0.0;
    for &c in &counts {
        if c > 0 {
            let p = c as f64 / n;
            h -= p * p.log2();
        }
    }
    h
}

/// Most-common-value min-entropy in bits/byte.
pub fn quick_min_entropy(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let max = byte_counts(data).into_iter().max().unwrap_or(0);
    let p_max = max as f64 / data.len() as f64;
    -p_max.log2()
}

fn byte_counts(data: &[u8]) -> [u64; 256] {
    let mut counts = [0u64; 256];
    for &b in data {
        counts[b as usize] += 1;
    }
    counts
}

fn compression_ratio(data: &[u8]) -> f64 {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    if encoder.write_all(data).is_err() {
        return 0.0;
    }
    match encoder.finish() {
        Ok(compressed) => compressed.len() as f64 / data.len() as f64,
        Err(_) => 0.0,
    }
}

#[derive(Debug, Clone)]
pub struct QualityReport {
    pub samples: usize,
    pub unique_values: usize,
    pub shannon_entropy: f64,
    pub min_entropy: f64,
    pub compression_ratio: f64,
    pub quality_score: f64,
    pub grade: char,
}

/// Score `data` on a 0-100 scale and grade it A-F.
pub fn quick_quality(data: &[u8]) -> QualityReport {
    if data.len() < 16 {
        return QualityReport {
            samples: data.len(),
            unique_values: 0,
            shannon_entropy: 0.0,
            min_entropy: 0.0,
            compression_ratio: 0.0,
            quality_score: 0.0,
            grade: 'F',
        };
    }

    let shannon = quick_shannon(data);
    let comp_ratio = compression_ratio(data);
    let unique = byte_counts(data).iter().filter(|&&c| c > 0).count();

    let eff = shannon / 8.0;
    let score =
        eff * 60.0 + comp_ratio.min(1.0) * 20.0 + (unique as f64 / 256.0).min(1.0) * 20.0;
    let grade = if score >= 80.0 {
        'A'
    } else if score >= 60.0 {
        'B'
    } else if score >= 40.0 {
        'C'
    } else if score >= 20.0 {
        'D'
    } else {
        'F'
    };

    QualityReport {
        samples: data.len(),
        unique_values: unique,
        shannon_entropy: shannon,
        min_entropy: quick_min_entropy(data),
        compression_ratio: comp_ratio,
        quality_score: score,
        grade,
    }
}

impl fmt::Display for QualityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  Samples:       {}", self.samples)?;
        writeln!(f, "  Unique bytes:  {}/256", self.unique_values)?;
        writeln!(f, "  Shannon H:     {:.4} bits/byte", self.shannon_entropy)?;
        writeln!(f, "  Min-entropy:   {:.4} bits/byte", self.min_entropy)?;
        writeln!(f, "  Compression:   {:.4}", self.compression_ratio)?;
        write!(f, "  Score:         {:.1} (grade {})", self.quality_score, self.grade)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_data_grades_poorly() {
        let report = quick_quality(&[7u8; 4096]);
        assert_eq!(report.unique_values, 1);
        assert_eq!(report.shannon_entropy, 0.0);
        assert_eq!(report.min_entropy, 0.0);
        assert!(report.grade == 'D' || report.grade == 'F');
    }

    #[test]
    fn uniform_counts_have_full_entropy() {
        let data: Vec<u8> = (0..=255u8).cycle().take(256 * 16).collect();
        assert!((quick_shannon(&data) - 8.0).abs() < 1e-9);
        assert!((quick_min_entropy(&data) - 8.0).abs() < 1e-9);
    }

    #[test]
    fn os_random_grades_a() {
        let mut data = vec![0u8; 8192];
        getrandom::fill(&mut data).unwrap();
        assert_eq!(quick_quality(&data).grade, 'A');
    }

    #[test]
    fn short_input_is_ungraded() {
        assert_eq!(quick_quality(&[1, 2, 3]).grade, 'F');
        assert_eq!(quick_shannon(&[]), 0.0);
    }
}
