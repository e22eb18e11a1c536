//! Configuration of the dataset, the readout and its training.
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::ReadoutError;
use crate::target::Encoding;

/// Default width (in samples) of the spike rate smoothing window.
pub const WINDOW_WIDTH: usize = 10;
/// Default width (in samples) of the correlation window.
pub const CORRELATION_WINDOW: usize = 100;

/// Window widths used to build a spike dataset.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub window_width: usize,
    pub correlation_window: usize,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        DatasetConfig {
            window_width: WINDOW_WIDTH,
            correlation_window: CORRELATION_WINDOW,
        }
    }
}

/// Readout architecture and initialization.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadoutConfig {
    /// The number of output units.
    pub output_size: usize,
    pub learning_rate: f64,
    /// The leading fraction of the recording used for training, the rest is used for testing.
    pub train_fraction: f64,
    pub encoding: Encoding,
    /// Apply the sigmoid on the affine output, during training, testing and prediction.
    pub use_activation: bool,
    /// Encode the test targets with the range of the training signal instead of their own.
    pub shared_range: bool,
    /// Standard deviation of the normal distribution the initial parameters are drawn from.
    pub init_std: f64,
    /// Seed of the parameter initialization, drawn from entropy if missing.
    pub seed: Option<u64>,
}

impl Default for ReadoutConfig {
    fn default() -> Self {
        ReadoutConfig {
            output_size: 32,
            learning_rate: 0.01,
            train_fraction: 0.8,
            encoding: Encoding::Categorical,
            use_activation: true,
            shared_range: false,
            init_std: 1.0,
            seed: None,
        }
    }
}

/// Mini-batch schedule.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub batch_size: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            epochs: 1000,
            batch_size: 100,
        }
    }
}

/// The full configuration of a decoding run.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub dataset: DatasetConfig,
    pub readout: ReadoutConfig,
    pub training: TrainingConfig,
}

impl Config {
    /// Load a configuration from a JSON file. Missing fields take their default value.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ReadoutError> {
        let file = File::open(path).map_err(|e| ReadoutError::IOError(e.to_string()))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).map_err(|e| ReadoutError::IOError(e.to_string()))
    }
}
