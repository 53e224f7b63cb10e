//! Error types.
//!
//! Two layers:
//! - [`FitError`]: the domain taxonomy raised by ingest and fitting.
//! - [`AppError`]: what the binary reports (message + process exit code).
//!
//! Every `FitError` converts into an `AppError`, so the pipeline can use `?`
//! across both layers.

use thiserror::Error;

/// Exit code for malformed input (parse errors, invalid values, style/CLI problems).
pub const EXIT_INPUT: u8 = 2;
/// Exit code when there are not enough samples to fit.
pub const EXIT_NO_DATA: u8 = 3;
/// Exit code when the fit itself fails.
pub const EXIT_FIT: u8 = 4;
/// Exit code for output failures (rendering, export).
pub const EXIT_OUTPUT: u8 = 5;

/// Errors raised while reading samples or fitting the exchange model.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    /// Malformed or unreadable input. `line` is 1-based; `0` means the file
    /// itself could not be read.
    #[error("{}", describe_parse(.line, .message))]
    InputParse { line: usize, message: String },

    #[error("insufficient data: {found} sample(s), at least {required} required")]
    InsufficientData { found: usize, required: usize },

    #[error(
        "inconsistent weighting: {missing} of {total} samples have no ratio error \
         (provide errors for every sample or none, or use `--weighting uniform`)"
    )]
    InconsistentWeighting { missing: usize, total: usize },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The solver failed; carries the last parameters it reached.
    #[error("fit did not converge: {reason} (last k_12={k_12:.6e}, k_21={k_21:.6e})")]
    FitConvergence { k_12: f64, k_21: f64, reason: String },
}

impl FitError {
    pub fn exit_code(&self) -> u8 {
        match self {
            FitError::InputParse { .. }
            | FitError::InconsistentWeighting { .. }
            | FitError::InvalidInput(_) => EXIT_INPUT,
            FitError::InsufficientData { .. } => EXIT_NO_DATA,
            FitError::FitConvergence { .. } => EXIT_FIT,
        }
    }
}

fn describe_parse(line: &usize, message: &str) -> String {
    if *line == 0 {
        format!("input error: {message}")
    } else {
        format!("input error on line {line}: {message}")
    }
}

/// Error surfaced by the binary: a message plus the process exit code.
#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<FitError> for AppError {
    fn from(err: FitError) -> Self {
        Self::new(err.exit_code(), err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "error: {}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
