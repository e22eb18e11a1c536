//! Spike dataset derived from a recorded table.
//!
//! The dataset splits a [`Table`] into its time base, input signal and spike channels, and derives
//! smoothed spike rates, the population vector and the windowed pairwise correlation across
//! channels.
//!
//! # Examples
//!
//! ```rust
//! use spike_readout::dataset::SpikeDataset;
//! use spike_readout::table::Table;
//!
//! let rows = (0..20)
//!     .map(|t| vec![t as f64, (t as f64).sin(), (t % 2) as f64, ((t + 1) % 2) as f64])
//!     .collect();
//! let table = Table::new(rows).unwrap();
//! let dataset = SpikeDataset::build(&table, 4, 10).unwrap();
//!
//! assert_eq!(dataset.num_steps(), 20);
//! assert_eq!(dataset.num_channels(), 2);
//! assert!(dataset.correlation()[0].is_nan());
//! ```
use itertools::Itertools;
use nalgebra::{DMatrix, DVector};

use crate::config::DatasetConfig;
use crate::error::ReadoutError;
use crate::table::Table;
use crate::utils::{mean, nan_mean, pearson, same_moving_average, variance};

/// The number of leading columns (time and input signal) preceding the spike channels.
pub const NUM_LEADING_COLUMNS: usize = 2;

/// Time-aligned spike statistics of a recording.
#[derive(Debug, PartialEq, Clone)]
pub struct SpikeDataset {
    time: DVector<f64>,
    input_signal: DVector<f64>,
    /// Channel activity per time step (T×N).
    spike_times: DMatrix<f64>,
    /// Centered moving average of the channel activity (T×N).
    spike_rates: DMatrix<f64>,
    /// Mean activity and mean rate across channels (T×2).
    population_vector: DMatrix<f64>,
    /// Windowed mean pairwise correlation, NaN near the borders.
    correlation: DVector<f64>,
    window_width: usize,
    correlation_window: usize,
}

impl SpikeDataset {
    /// Create a dataset from a table with the given smoothing and correlation window widths.
    /// Returns an error if the table has less than 3 columns or less rows than the window width.
    pub fn build(
        table: &Table,
        window_width: usize,
        correlation_window: usize,
    ) -> Result<Self, ReadoutError> {
        if window_width == 0 {
            return Err(ReadoutError::InvalidParameter(
                "The window width must be positive".to_string(),
            ));
        }
        if table.num_columns() <= NUM_LEADING_COLUMNS {
            return Err(ReadoutError::InvalidShape(format!(
                "expected at least {} columns, got {}",
                NUM_LEADING_COLUMNS + 1,
                table.num_columns()
            )));
        }
        if table.num_rows() == 0 || table.num_rows() < window_width {
            return Err(ReadoutError::InvalidShape(format!(
                "expected at least {} rows, got {}",
                window_width.max(1),
                table.num_rows()
            )));
        }

        let num_steps = table.num_rows();
        let num_channels = table.num_columns() - NUM_LEADING_COLUMNS;
        let rows = table.rows();

        let time = DVector::from_iterator(num_steps, rows.iter().map(|row| row[0]));
        let input_signal = DVector::from_iterator(num_steps, rows.iter().map(|row| row[1]));
        let spike_times = DMatrix::from_fn(num_steps, num_channels, |t, c| {
            rows[t][NUM_LEADING_COLUMNS + c]
        });

        let spike_rates = smooth_channels(&spike_times, window_width);
        let population_vector = population_vector(&spike_times, &spike_rates);
        let correlation = windowed_correlation(&spike_times, correlation_window);

        log::debug!(
            "Spike dataset built: {} steps, {} channels, window width {}, correlation window {}",
            num_steps,
            num_channels,
            window_width,
            correlation_window
        );

        Ok(SpikeDataset {
            time,
            input_signal,
            spike_times,
            spike_rates,
            population_vector,
            correlation,
            window_width,
            correlation_window,
        })
    }

    /// Create a dataset from a table with the window widths of the configuration.
    pub fn from_config(table: &Table, config: &DatasetConfig) -> Result<Self, ReadoutError> {
        Self::build(table, config.window_width, config.correlation_window)
    }

    /// Recompute the spike rates (and the rate column of the population vector) from the spike
    /// times with the dataset window width.
    pub fn compute_spike_rates(&mut self) {
        self.spike_rates = smooth_channels(&self.spike_times, self.window_width);
        self.population_vector = population_vector(&self.spike_times, &self.spike_rates);
    }

    /// Returns the number of time steps.
    pub fn num_steps(&self) -> usize {
        self.spike_times.nrows()
    }

    /// Returns the number of spike channels.
    pub fn num_channels(&self) -> usize {
        self.spike_times.ncols()
    }

    pub fn window_width(&self) -> usize {
        self.window_width
    }

    pub fn correlation_window(&self) -> usize {
        self.correlation_window
    }

    pub fn time(&self) -> &DVector<f64> {
        &self.time
    }

    pub fn input_signal(&self) -> &DVector<f64> {
        &self.input_signal
    }

    pub fn spike_times(&self) -> &DMatrix<f64> {
        &self.spike_times
    }

    pub fn spike_rates(&self) -> &DMatrix<f64> {
        &self.spike_rates
    }

    pub fn population_vector(&self) -> &DMatrix<f64> {
        &self.population_vector
    }

    /// Returns the per-step variance across channels, as `[activity, rate]` columns.
    pub fn population_variance(&self) -> DMatrix<f64> {
        let activity = row_variances(&self.spike_times);
        let rates = row_variances(&self.spike_rates);
        DMatrix::from_fn(self.num_steps(), 2, |t, c| match c {
            0 => activity[t],
            _ => rates[t],
        })
    }

    pub fn correlation(&self) -> &DVector<f64> {
        &self.correlation
    }
}

/// Smooth every channel with a centered moving average.
fn smooth_channels(spike_times: &DMatrix<f64>, window_width: usize) -> DMatrix<f64> {
    let mut spike_rates = DMatrix::zeros(spike_times.nrows(), spike_times.ncols());
    for (c, column) in spike_times.column_iter().enumerate() {
        let values: Vec<f64> = column.iter().copied().collect();
        spike_rates.set_column(
            c,
            &DVector::from_vec(same_moving_average(&values, window_width)),
        );
    }
    spike_rates
}

fn row_means(matrix: &DMatrix<f64>) -> Vec<f64> {
    matrix
        .row_iter()
        .map(|row| mean(&row.iter().copied().collect::<Vec<f64>>()))
        .collect()
}

fn row_variances(matrix: &DMatrix<f64>) -> Vec<f64> {
    matrix
        .row_iter()
        .map(|row| variance(&row.iter().copied().collect::<Vec<f64>>()))
        .collect()
}

fn population_vector(spike_times: &DMatrix<f64>, spike_rates: &DMatrix<f64>) -> DMatrix<f64> {
    let activity = row_means(spike_times);
    let rates = row_means(spike_rates);
    DMatrix::from_fn(spike_times.nrows(), 2, |t, c| match c {
        0 => activity[t],
        _ => rates[t],
    })
}

/// Returns the mean pairwise Pearson correlation across channels over a sliding window.
/// Entries closer than half a window to either border are NaN.
fn windowed_correlation(spike_times: &DMatrix<f64>, window: usize) -> DVector<f64> {
    let (num_steps, num_channels) = spike_times.shape();
    let half = window / 2;
    let mut correlation = DVector::from_element(num_steps, f64::NAN);

    if window == 0 || num_steps < window {
        return correlation;
    }

    for t in half..num_steps - half {
        let start = t - half;
        if start + window > num_steps {
            break;
        }
        let columns: Vec<Vec<f64>> = (0..num_channels)
            .map(|c| {
                spike_times
                    .view((start, c), (window, 1))
                    .iter()
                    .copied()
                    .collect()
            })
            .collect();

        correlation[t] = nan_mean(
            (0..num_channels)
                .tuple_combinations()
                .map(|(i, j)| pearson(&columns[i], &columns[j])),
        );
    }

    correlation
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn alternating_table(num_steps: usize, num_channels: usize) -> Table {
        let rows = (0..num_steps)
            .map(|t| {
                let mut row = vec![t as f64, (t as f64 * 0.05).sin()];
                row.extend((0..num_channels).map(|c| ((t + c) % 2) as f64));
                row
            })
            .collect();
        Table::new(rows).unwrap()
    }

    #[test]
    fn test_build_invalid_shape() {
        let table = Table::new(vec![vec![0.0, 1.0]; 20]).unwrap();
        assert!(matches!(
            SpikeDataset::build(&table, 10, 100),
            Err(ReadoutError::InvalidShape(_))
        ));

        let table = alternating_table(5, 2);
        assert!(matches!(
            SpikeDataset::build(&table, 10, 100),
            Err(ReadoutError::InvalidShape(_))
        ));

        let table = Table::new(vec![]).unwrap();
        assert!(matches!(
            SpikeDataset::build(&table, 1, 100),
            Err(ReadoutError::InvalidShape(_))
        ));

        let table = alternating_table(20, 2);
        assert!(matches!(
            SpikeDataset::build(&table, 0, 100),
            Err(ReadoutError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_columns() {
        let table = alternating_table(30, 3);
        let dataset = SpikeDataset::build(&table, 10, 10).unwrap();
        assert_eq!(dataset.num_steps(), 30);
        assert_eq!(dataset.num_channels(), 3);
        assert_eq!(dataset.time()[7], 7.0);
        assert_eq!(dataset.input_signal()[7], (7.0_f64 * 0.05).sin());
        assert_eq!(dataset.spike_times()[(7, 0)], 1.0);
        assert_eq!(dataset.spike_times()[(7, 1)], 0.0);
    }

    #[test]
    fn test_spike_rates() {
        let table = alternating_table(100, 4);
        let dataset = SpikeDataset::build(&table, 10, 20).unwrap();
        let rates = dataset.spike_rates();

        assert_eq!(rates.shape(), dataset.spike_times().shape());
        assert!(rates.iter().all(|&rate| (0.0..=1.0).contains(&rate)));
        // Away from the borders, an alternating train has rate 1/2
        assert_relative_eq!(rates[(50, 0)], 0.5);
        // At the left border, the zero padding biases the rate towards zero
        assert!(rates[(0, 0)] < 0.5);
    }

    #[test]
    fn test_population_vector_is_row_mean() {
        let table = alternating_table(60, 3);
        let dataset = SpikeDataset::build(&table, 10, 20).unwrap();
        let population = dataset.population_vector();
        assert_eq!(population.shape(), (60, 2));

        for t in 0..60 {
            let activity: Vec<f64> = dataset.spike_times().row(t).iter().copied().collect();
            let rates: Vec<f64> = dataset.spike_rates().row(t).iter().copied().collect();
            assert_eq!(population[(t, 0)], mean(&activity));
            assert_eq!(population[(t, 1)], mean(&rates));
        }
    }

    #[test]
    fn test_population_variance() {
        let table = alternating_table(60, 4);
        let dataset = SpikeDataset::build(&table, 10, 20).unwrap();
        let variance = dataset.population_variance();
        assert_eq!(variance.shape(), (60, 2));

        // Half of the channels fire at every step
        for t in 0..60 {
            assert_relative_eq!(variance[(t, 0)], 0.25);
            let rates: Vec<f64> = dataset.spike_rates().row(t).iter().copied().collect();
            assert_relative_eq!(variance[(t, 1)], crate::utils::variance(&rates));
        }
    }

    #[test]
    fn test_correlation_borders() {
        let table = alternating_table(100, 4);
        let dataset = SpikeDataset::build(&table, 10, 20).unwrap();
        let correlation = dataset.correlation();

        assert_eq!(correlation.len(), 100);
        for t in 0..100 {
            if t < 10 || t >= 90 {
                assert!(correlation[t].is_nan(), "t = {}", t);
            } else {
                assert!(!correlation[t].is_nan(), "t = {}", t);
            }
        }
        // Channels 0 and 2 are in phase, 0 and 1 in opposition: pairs (0,1), (0,2), (0,3),
        // (1,2), (1,3), (2,3) have correlations -1, 1, -1, -1, 1, -1
        assert_relative_eq!(correlation[50], -1.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_correlation_zero_variance() {
        // A silent channel yields undefined pairs that are skipped by the mean
        let rows = (0..40)
            .map(|t| vec![t as f64, 0.0, (t % 2) as f64, (t % 2) as f64, 0.0])
            .collect();
        let dataset = SpikeDataset::build(&Table::new(rows).unwrap(), 4, 10).unwrap();
        assert_relative_eq!(dataset.correlation()[20], 1.0, epsilon = 1e-12);

        // Only silent channels: every pair is undefined
        let rows = (0..40).map(|t| vec![t as f64, 0.0, 0.0, 0.0]).collect();
        let dataset = SpikeDataset::build(&Table::new(rows).unwrap(), 4, 10).unwrap();
        assert!(dataset.correlation().iter().all(|c| c.is_nan()));
    }

    #[test]
    fn test_correlation_single_channel() {
        let table = alternating_table(40, 1);
        let dataset = SpikeDataset::build(&table, 4, 10).unwrap();
        assert!(dataset.correlation().iter().all(|c| c.is_nan()));
    }

    #[test]
    fn test_correlation_window_longer_than_recording() {
        let table = alternating_table(40, 2);
        let dataset = SpikeDataset::build(&table, 4, 100).unwrap();
        assert!(dataset.correlation().iter().all(|c| c.is_nan()));
    }

    #[test]
    fn test_build_is_idempotent() {
        let table = alternating_table(200, 4);
        let first = SpikeDataset::build(&table, 10, 50).unwrap();
        let second = SpikeDataset::build(&table, 10, 50).unwrap();
        assert_eq!(first.spike_rates(), second.spike_rates());
        assert_eq!(first.population_vector(), second.population_vector());
        assert!(first
            .correlation()
            .iter()
            .zip(second.correlation().iter())
            .all(|(a, b)| a == b || (a.is_nan() && b.is_nan())));
    }

    #[test]
    fn test_compute_spike_rates() {
        let table = alternating_table(50, 2);
        let mut dataset = SpikeDataset::build(&table, 10, 10).unwrap();
        let rates = dataset.spike_rates().clone();
        dataset.compute_spike_rates();
        assert_eq!(dataset.spike_rates(), &rates);
    }

    #[test]
    fn test_from_config() {
        let table = alternating_table(50, 2);
        let config = DatasetConfig {
            window_width: 5,
            correlation_window: 20,
        };
        let dataset = SpikeDataset::from_config(&table, &config).unwrap();
        assert_eq!(dataset.window_width(), 5);
        assert_eq!(dataset.correlation_window(), 20);
    }
}
