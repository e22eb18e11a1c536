//! Linear readout decoding the input signal from the spike trains.
//!
//! The readout is a single layer of output units, optionally followed by a sigmoid, and trained by
//! mini-batch gradient descent on the leading (training) part of a [`SpikeDataset`]. The rest of
//! the recording is kept for testing and reconstruction.
//!
//! # Examples
//!
//! ```rust
//! use spike_readout::config::ReadoutConfig;
//! use spike_readout::dataset::SpikeDataset;
//! use spike_readout::readout::ReadoutClassifier;
//! use spike_readout::table::Table;
//!
//! let rows = (0..200)
//!     .map(|t| {
//!         let x = (t as f64 * 0.1).sin();
//!         vec![t as f64, x, (x > 0.0) as u8 as f64, (x <= 0.0) as u8 as f64]
//!     })
//!     .collect();
//! let dataset = SpikeDataset::build(&Table::new(rows).unwrap(), 10, 20).unwrap();
//!
//! let config = ReadoutConfig { output_size: 4, seed: Some(42), ..Default::default() };
//! let mut readout = ReadoutClassifier::build(&dataset, config).unwrap();
//! readout.train(10, 20).unwrap();
//!
//! assert_eq!(readout.error_history().len(), 10);
//! let (mse, _correlation) = readout.test();
//! assert!(mse.is_finite());
//! ```
use derivative::Derivative;
use nalgebra::{DMatrix, DVector};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::config::{ReadoutConfig, TrainingConfig};
use crate::dataset::SpikeDataset;
use crate::error::ReadoutError;
use crate::target::{generate_target, generate_target_in_range, Encoding, TargetRange};
use crate::utils::{argmax, pearson, sigmoid};

/// The number of epochs between two training progress logs.
pub const LOG_INTERVAL: usize = 100;

/// A rule computing the parameter updates of the readout from a batch.
/// The readout adds `learning_rate` times the returned increments to its weights and bias.
pub trait LearningRule: Send + Sync {
    /// Returns the weight (N×output_size) and bias (output_size) increments.
    ///
    /// # Parameters
    /// - `batch`: the batch inputs (rows×N).
    /// - `error`: the batch target minus the batch output (rows×output_size).
    /// - `output`: the batch output (rows×output_size).
    /// - `batch_size`: the nominal batch size, the last batch of an epoch may have less rows.
    fn increments(
        &self,
        batch: &DMatrix<f64>,
        error: &DMatrix<f64>,
        output: &DMatrix<f64>,
        batch_size: usize,
    ) -> (DMatrix<f64>, DVector<f64>);
}

/// Delta rule through the sigmoid derivative `y(1-y)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SigmoidDelta;

impl LearningRule for SigmoidDelta {
    fn increments(
        &self,
        batch: &DMatrix<f64>,
        error: &DMatrix<f64>,
        output: &DMatrix<f64>,
        batch_size: usize,
    ) -> (DMatrix<f64>, DVector<f64>) {
        let delta = error.zip_map(output, |e, y| e * y * (1.0 - y));
        delta_increments(batch, &delta, batch_size)
    }
}

/// Least mean squares rule, for a readout without activation.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeastMeanSquares;

impl LearningRule for LeastMeanSquares {
    fn increments(
        &self,
        batch: &DMatrix<f64>,
        error: &DMatrix<f64>,
        _output: &DMatrix<f64>,
        batch_size: usize,
    ) -> (DMatrix<f64>, DVector<f64>) {
        delta_increments(batch, error, batch_size)
    }
}

// The weight increment is normalized by the nominal batch size, the bias one by the actual number of rows.
fn delta_increments(
    batch: &DMatrix<f64>,
    delta: &DMatrix<f64>,
    batch_size: usize,
) -> (DMatrix<f64>, DVector<f64>) {
    let dw = batch.transpose() * delta / batch_size as f64;
    let db = DVector::from_iterator(delta.ncols(), delta.column_iter().map(|c| c.mean()));
    (dw, db)
}

/// The signal reconstructed by the readout on the test part of the recording, with the matching
/// reference.
#[derive(Debug, PartialEq, Clone)]
pub struct Prediction {
    pub prediction: DVector<f64>,
    pub target: DVector<f64>,
}

/// The trainable state of a readout, as saved to disk.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ReadoutParameters {
    pub weights: DMatrix<f64>,
    pub bias: DVector<f64>,
    pub error_history: Vec<f64>,
    pub config: ReadoutConfig,
}

impl ReadoutParameters {
    /// Save the parameters to a file.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), ReadoutError> {
        let file = File::create(path).map_err(|e| ReadoutError::IOError(e.to_string()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)
            .map_err(|e| ReadoutError::IOError(e.to_string()))?;
        writer.flush().map_err(|e| ReadoutError::IOError(e.to_string()))
    }

    /// Load parameters from a file.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ReadoutError> {
        let file = File::open(path).map_err(|e| ReadoutError::IOError(e.to_string()))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).map_err(|e| ReadoutError::IOError(e.to_string()))
    }
}

/// A single-layer readout trained on a spike dataset.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct ReadoutClassifier<'a> {
    #[derivative(Debug = "ignore")]
    dataset: &'a SpikeDataset,
    config: ReadoutConfig,
    /// The number of leading steps used for training.
    num_train: usize,
    target_train: DMatrix<f64>,
    target_test: DMatrix<f64>,
    weights: DMatrix<f64>,
    bias: DVector<f64>,
    /// The RMSE of every epoch trained so far.
    error_history: Vec<f64>,
    #[derivative(Debug = "ignore")]
    rule: Box<dyn LearningRule>,
}

impl<'a> ReadoutClassifier<'a> {
    /// Create a readout for the dataset, with randomly initialized parameters.
    /// The recording is split (without shuffling) into a leading training part and a test part.
    /// Returns an error for an invalid configuration or if a target cannot be encoded.
    pub fn build(dataset: &'a SpikeDataset, config: ReadoutConfig) -> Result<Self, ReadoutError> {
        if !(config.train_fraction > 0.0 && config.train_fraction < 1.0) {
            return Err(ReadoutError::InvalidParameter(format!(
                "The train fraction must be in (0, 1), got {}",
                config.train_fraction
            )));
        }
        if !config.learning_rate.is_finite() {
            return Err(ReadoutError::InvalidParameter(
                "The learning rate must be finite".to_string(),
            ));
        }

        let num_steps = dataset.num_steps();
        let num_train = (config.train_fraction * num_steps as f64).floor() as usize;
        if num_train == 0 || num_train >= num_steps {
            return Err(ReadoutError::InvalidParameter(format!(
                "Splitting {} steps at {} leaves an empty partition",
                num_steps, num_train
            )));
        }

        let signal = dataset.input_signal().as_slice();
        let (signal_train, signal_test) = signal.split_at(num_train);
        let (target_train, target_test) = match config.shared_range {
            true => {
                let range = TargetRange::of(signal_train)?;
                (
                    generate_target_in_range(signal_train, range, config.output_size, config.encoding)?,
                    generate_target_in_range(signal_test, range, config.output_size, config.encoding)?,
                )
            }
            false => (
                generate_target(signal_train, config.output_size, config.encoding)?,
                generate_target(signal_test, config.output_size, config.encoding)?,
            ),
        };

        let normal = Normal::new(0.0, config.init_std).map_err(|e| {
            ReadoutError::InvalidParameter(format!("Invalid initialization distribution: {}", e))
        })?;
        let mut rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let weights = DMatrix::from_fn(dataset.num_channels(), config.output_size, |_, _| {
            normal.sample(&mut rng)
        });
        let bias = DVector::from_fn(config.output_size, |_, _| normal.sample(&mut rng));

        // The sigmoid derivative only makes sense with the activation
        let rule: Box<dyn LearningRule> = match config.use_activation {
            true => Box::new(SigmoidDelta),
            false => Box::new(LeastMeanSquares),
        };

        log::debug!(
            "Readout built: {} inputs, {} outputs, {} training and {} test steps",
            dataset.num_channels(),
            config.output_size,
            num_train,
            num_steps - num_train
        );

        Ok(ReadoutClassifier {
            dataset,
            config,
            num_train,
            target_train,
            target_test,
            weights,
            bias,
            error_history: vec![],
            rule,
        })
    }

    /// Replace the learning rule used by the following training epochs.
    pub fn with_rule(mut self, rule: Box<dyn LearningRule>) -> Self {
        self.rule = rule;
        self
    }

    /// Replace the weights, bias and error history by saved ones, e.g., to resume training.
    /// Returns an error if the shapes do not fit the readout.
    pub fn set_parameters(&mut self, parameters: ReadoutParameters) -> Result<(), ReadoutError> {
        if parameters.weights.shape() != self.weights.shape()
            || parameters.bias.len() != self.bias.len()
        {
            return Err(ReadoutError::InvalidShape(format!(
                "expected {:?} weights and {} biases, got {:?} and {}",
                self.weights.shape(),
                self.bias.len(),
                parameters.weights.shape(),
                parameters.bias.len()
            )));
        }
        self.weights = parameters.weights;
        self.bias = parameters.bias;
        self.error_history = parameters.error_history;
        Ok(())
    }

    /// Returns a copy of the trainable state.
    pub fn parameters(&self) -> ReadoutParameters {
        ReadoutParameters {
            weights: self.weights.clone(),
            bias: self.bias.clone(),
            error_history: self.error_history.clone(),
            config: self.config.clone(),
        }
    }

    /// Returns the readout output for the given inputs; the sigmoid is applied iff the readout uses
    /// an activation.
    pub fn forward(&self, data: &DMatrix<f64>) -> DMatrix<f64> {
        let z = data * &self.weights;
        DMatrix::from_fn(z.nrows(), z.ncols(), |i, j| {
            let value = z[(i, j)] + self.bias[j];
            match self.config.use_activation {
                true => sigmoid(value),
                false => value,
            }
        })
    }

    /// Train the readout for the given number of epochs, over contiguous batches of the training
    /// data. Training starts from the current parameters, so that repeated calls continue it.
    /// Returns the updated weights and bias.
    pub fn train(
        &mut self,
        epochs: usize,
        batch_size: usize,
    ) -> Result<(&DMatrix<f64>, &DVector<f64>), ReadoutError> {
        if batch_size == 0 {
            return Err(ReadoutError::InvalidParameter(
                "The batch size must be positive".to_string(),
            ));
        }

        let dataset = self.dataset;
        let train_data = dataset.spike_times().rows(0, self.num_train);
        let num_batches = self.num_train.div_ceil(batch_size);
        let learning_rate = self.config.learning_rate;

        for _ in 0..epochs {
            let mut epoch_error = 0.0;
            for start in (0..self.num_train).step_by(batch_size) {
                let len = batch_size.min(self.num_train - start);
                let batch = train_data.rows(start, len).clone_owned();
                let output = self.forward(&batch);
                let error = self.target_train.rows(start, len).clone_owned() - &output;

                let (dw, db) = self.rule.increments(&batch, &error, &output, batch_size);
                self.weights += dw * learning_rate;
                self.bias += db * learning_rate;

                epoch_error += error.map(|e| e * e).mean();
            }

            let rmse = (epoch_error / num_batches as f64).sqrt();
            let epoch = self.error_history.len();
            self.error_history.push(rmse);

            if rmse.is_nan() {
                log::warn!("Epoch {}: RMSE is undefined", epoch);
            } else if epoch % LOG_INTERVAL == 0 {
                log::info!("Epoch {}: RMSE = {}", epoch, rmse);
            } else {
                log::trace!("Epoch {}: RMSE = {}", epoch, rmse);
            }
        }

        Ok((&self.weights, &self.bias))
    }

    /// Evaluate the readout on the test data.
    /// Returns the mean squared error and the correlation between the test targets and the
    /// readout output.
    pub fn test(&self) -> (f64, f64) {
        let output = self.forward(&self.test_data());
        let mse = (&self.target_test - &output).map(|e| e * e).mean();
        let correlation = pearson(self.target_test.as_slice(), output.as_slice());
        (mse, correlation)
    }

    /// Reconstruct the input signal on the test part of the recording.
    pub fn predict(&self) -> Prediction {
        let net_out = self.forward(&self.test_data());
        let signal_test = &self.dataset.input_signal().as_slice()[self.num_train..];
        let (min, max) = signal_test
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), &s| {
                (min.min(s), max.max(s))
            });
        let signal_range = max - min;

        if self.config.output_size == 1 {
            return Prediction {
                prediction: net_out.column(0).clone_owned() * signal_range,
                target: self.target_test.column(0).clone_owned() * signal_range,
            };
        }

        let top = (self.config.output_size - 1) as f64;
        match self.config.encoding {
            Encoding::Categorical => {
                let decode = |matrix: &DMatrix<f64>| {
                    DVector::from_iterator(
                        matrix.nrows(),
                        matrix.row_iter().map(|row| match argmax(row.iter().copied()) {
                            Some(level) => signal_range * level as f64 / top,
                            // Every output is NaN
                            None => f64::NAN,
                        }),
                    )
                };
                Prediction {
                    prediction: decode(&net_out),
                    target: decode(&self.target_test),
                }
            }
            Encoding::Thermometer => Prediction {
                prediction: DVector::from_iterator(
                    net_out.nrows(),
                    net_out.row_iter().map(|row| signal_range * row.sum() / top),
                ),
                target: DVector::from_iterator(
                    self.target_test.nrows(),
                    self.target_test.row_iter().map(|row| row.sum()),
                ),
            },
        }
    }

    fn test_data(&self) -> DMatrix<f64> {
        let spike_times = self.dataset.spike_times();
        spike_times
            .rows(self.num_train, spike_times.nrows() - self.num_train)
            .clone_owned()
    }

    /// Returns true once the readout has been trained for at least one epoch.
    pub fn is_trained(&self) -> bool {
        !self.error_history.is_empty()
    }

    pub fn config(&self) -> &ReadoutConfig {
        &self.config
    }

    pub fn weights(&self) -> &DMatrix<f64> {
        &self.weights
    }

    pub fn bias(&self) -> &DVector<f64> {
        &self.bias
    }

    pub fn error_history(&self) -> &[f64] {
        &self.error_history
    }

    pub fn target_train(&self) -> &DMatrix<f64> {
        &self.target_train
    }

    pub fn target_test(&self) -> &DMatrix<f64> {
        &self.target_test
    }

    /// Returns the number of training steps.
    pub fn num_train(&self) -> usize {
        self.num_train
    }

    /// Returns the number of test steps.
    pub fn num_test(&self) -> usize {
        self.dataset.num_steps() - self.num_train
    }

    /// Save the trainable state to a file.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), ReadoutError> {
        self.parameters().save_to(path)
    }
}

/// The outcome of training one readout configuration.
#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct SweepResult {
    pub config: ReadoutConfig,
    /// The RMSE of the last training epoch.
    pub train_rmse: f64,
    pub test_mse: f64,
    pub test_correlation: f64,
}

/// Train one readout per configuration on the same dataset, in parallel.
/// The results are returned in the order of the configurations.
pub fn sweep(
    dataset: &SpikeDataset,
    configs: &[ReadoutConfig],
    training: &TrainingConfig,
) -> Vec<Result<SweepResult, ReadoutError>> {
    configs
        .par_iter()
        .map(|config| -> Result<SweepResult, ReadoutError> {
            let mut readout = ReadoutClassifier::build(dataset, config.clone())?;
            readout.train(training.epochs, training.batch_size)?;
            let (test_mse, test_correlation) = readout.test();
            log::info!(
                "Learning rate {}, {} outputs: test MSE = {}, test correlation = {}",
                config.learning_rate,
                config.output_size,
                test_mse,
                test_correlation
            );
            Ok(SweepResult {
                config: config.clone(),
                train_rmse: readout.error_history().last().copied().unwrap_or(f64::NAN),
                test_mse,
                test_correlation,
            })
        })
        .collect()
}
