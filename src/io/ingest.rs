//! Text ingest.
//!
//! Turns a small line-oriented text file into an ordered list of samples:
//!
//! ```text
//! # mixing_time(ms)  I12/I11  [I12/I11_err]
//! 2     0.0747429207  0.0070743411
//! 5,    0.1784938993, 0.0078213540
//! ```
//!
//! Rules:
//! - `#` starts a comment (whole line or trailing); blank lines are skipped
//! - fields are separated by tabs, commas or runs of spaces
//! - each data line has 2 or 3 finite numbers
//! - any malformed line aborts with its 1-based line number
//!
//! No fitting logic here; weighting consistency is checked by the fitter.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::domain::Sample;
use crate::error::FitError;

/// Summary stats about the samples read.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetStats {
    pub n_samples: usize,
    pub n_with_error: usize,
    pub t_min: f64,
    pub t_max: f64,
    pub ratio_min: f64,
    pub ratio_max: f64,
}

/// Ingest output: samples in file order plus stats.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub source: PathBuf,
    pub samples: Vec<Sample>,
    pub stats: DatasetStats,
    pub lines_read: usize,
}

/// Read samples from a file.
///
/// Fails with `InputParse` (line 0) when the file cannot be opened or read, and
/// with `InsufficientData` when it holds no data lines at all.
pub fn load_samples(path: &Path) -> Result<IngestedData, FitError> {
    let file = File::open(path).map_err(|e| FitError::InputParse {
        line: 0,
        message: format!("Failed to open '{}': {e}", path.display()),
    })?;

    let (samples, lines_read) = read_samples(BufReader::new(file))?;
    let stats = compute_stats(&samples).ok_or(FitError::InsufficientData {
        found: 0,
        required: crate::fit::N_PARAMS,
    })?;

    tracing::info!(
        path = %path.display(),
        samples = stats.n_samples,
        with_error = stats.n_with_error,
        "loaded samples"
    );

    Ok(IngestedData {
        source: path.to_path_buf(),
        samples,
        stats,
        lines_read,
    })
}

/// Parse samples from any buffered reader.
pub fn parse_samples<R: BufRead>(reader: R) -> Result<Vec<Sample>, FitError> {
    read_samples(reader).map(|(samples, _)| samples)
}

fn read_samples<R: BufRead>(reader: R) -> Result<(Vec<Sample>, usize), FitError> {
    let mut samples = Vec::new();
    let mut lines_read = 0usize;

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        lines_read += 1;
        let line = line.map_err(|e| FitError::InputParse {
            line: line_no,
            message: format!("read error: {e}"),
        })?;

        // Some editors prefix UTF-8 files with a BOM.
        let line = if line_no == 1 {
            line.trim_start_matches('\u{feff}')
        } else {
            line.as_str()
        };

        if let Some(sample) = parse_line(line, line_no)? {
            samples.push(sample);
        }
    }

    Ok((samples, lines_read))
}

fn parse_line(line: &str, line_no: usize) -> Result<Option<Sample>, FitError> {
    let content = match line.find('#') {
        Some(pos) => &line[..pos],
        None => line,
    };
    let fields: Vec<&str> = content
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .collect();

    if fields.is_empty() {
        return Ok(None);
    }
    if !(2..=3).contains(&fields.len()) {
        return Err(FitError::InputParse {
            line: line_no,
            message: format!(
                "expected 2 or 3 fields (mixing_time ratio [error]), found {}",
                fields.len()
            ),
        });
    }

    let mixing_time = parse_field(fields[0], "mixing_time", line_no)?;
    let ratio = parse_field(fields[1], "ratio", line_no)?;
    let ratio_error = fields
        .get(2)
        .map(|s| parse_field(s, "ratio_error", line_no))
        .transpose()?;

    Ok(Some(Sample::new(mixing_time, ratio, ratio_error)))
}

fn parse_field(s: &str, name: &str, line_no: usize) -> Result<f64, FitError> {
    let v = s.parse::<f64>().map_err(|_| FitError::InputParse {
        line: line_no,
        message: format!("invalid number '{s}' for `{name}`"),
    })?;
    if !v.is_finite() {
        return Err(FitError::InputParse {
            line: line_no,
            message: format!("non-finite value '{s}' for `{name}`"),
        });
    }
    Ok(v)
}

/// Compute stats over the samples; `None` when there are none.
pub fn compute_stats(samples: &[Sample]) -> Option<DatasetStats> {
    if samples.is_empty() {
        return None;
    }
    let mut stats = DatasetStats {
        n_samples: samples.len(),
        n_with_error: 0,
        t_min: f64::INFINITY,
        t_max: f64::NEG_INFINITY,
        ratio_min: f64::INFINITY,
        ratio_max: f64::NEG_INFINITY,
    };
    for s in samples {
        stats.t_min = stats.t_min.min(s.mixing_time);
        stats.t_max = stats.t_max.max(s.mixing_time);
        stats.ratio_min = stats.ratio_min.min(s.ratio);
        stats.ratio_max = stats.ratio_max.max(s.ratio);
        if s.ratio_error.is_some() {
            stats.n_with_error += 1;
        }
    }
    Some(stats)
}
