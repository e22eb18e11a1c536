//! Error module for the spike readout library.
use std::error::Error;
use std::fmt;

/// Error types for the library.
#[derive(Debug, PartialEq)]
pub enum ReadoutError {
    /// Error for an input file kind the loader does not recognize.
    UnsupportedFormat(String),
    /// Error for a table with too few rows/columns, ragged rows or decreasing time.
    InvalidShape(String),
    /// Error for a target encoding attempted on a signal with zero dynamic range.
    DegenerateRange { min: f64, max: f64 },
    /// Error for an unrecognized encoding/reconstruction mode.
    UnsupportedMode(String),
    /// Error for malformed rows in an input file.
    Parse(String),
    /// Error for invalid parameters, e.g., a zero window width.
    InvalidParameter(String),
    /// Error for I/O operations.
    IOError(String),
}

impl fmt::Display for ReadoutError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ReadoutError::UnsupportedFormat(e) => write!(f, "Unsupported format: {}", e),
            ReadoutError::InvalidShape(e) => write!(f, "Invalid shape: {}", e),
            ReadoutError::DegenerateRange { min, max } => write!(
                f,
                "Degenerate signal range: [{}, {}] has zero width",
                min, max
            ),
            ReadoutError::UnsupportedMode(e) => write!(f, "Unsupported mode: {}", e),
            ReadoutError::Parse(e) => write!(f, "Parse error: {}", e),
            ReadoutError::InvalidParameter(e) => write!(f, "Invalid parameters: {}", e),
            ReadoutError::IOError(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl Error for ReadoutError {}
