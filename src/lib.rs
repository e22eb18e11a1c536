//! This crate provides tools for analyzing simulated spiking-neuron recordings and decoding their
//! input signal with a linear readout.
//!
//! # Loading Recordings
//!
//! A recording is a headerless table with columns `[time, input_signal, channel_0, ...]`.
//!
//! ```rust
//! use spike_readout::table::CsvLoader;
//!
//! let data = "0.0, 0.1, 1, 0\n1.0, 0.2, 0, 1\n2.0, 0.3, 1, 1\n";
//! let table = CsvLoader::default().read(data.as_bytes()).unwrap();
//!
//! assert_eq!(table.num_rows(), 3);
//! assert_eq!(table.num_columns(), 4);
//! ```
//!
//! # Spike Statistics
//!
//! ```rust
//! use spike_readout::dataset::SpikeDataset;
//! use spike_readout::table::Table;
//!
//! let rows = (0..100)
//!     .map(|t| vec![t as f64, (t as f64 * 0.1).sin(), (t % 2) as f64, (t % 3 == 0) as u8 as f64])
//!     .collect();
//! let dataset = SpikeDataset::build(&Table::new(rows).unwrap(), 10, 20).unwrap();
//!
//! // Smoothed rates have the same shape as the spike trains
//! assert_eq!(dataset.spike_rates().shape(), (100, 2));
//! // The population vector holds the mean activity and the mean rate
//! assert_eq!(dataset.population_vector().shape(), (100, 2));
//! ```
//!
//! # Decoding
//!
//! ```rust
//! use spike_readout::config::ReadoutConfig;
//! use spike_readout::dataset::SpikeDataset;
//! use spike_readout::readout::ReadoutClassifier;
//! use spike_readout::table::Table;
//! use spike_readout::target::Encoding;
//!
//! let rows = (0..500)
//!     .map(|t| {
//!         let x = (t as f64 * 0.05).sin();
//!         vec![t as f64, x, (x > 0.5) as u8 as f64, (x > 0.0) as u8 as f64, (x < -0.5) as u8 as f64]
//!     })
//!     .collect();
//! let dataset = SpikeDataset::build(&Table::new(rows).unwrap(), 10, 50).unwrap();
//!
//! let config = ReadoutConfig {
//!     output_size: 8,
//!     encoding: Encoding::Thermometer,
//!     seed: Some(42),
//!     ..Default::default()
//! };
//! let mut readout = ReadoutClassifier::build(&dataset, config).unwrap();
//! readout.train(50, 50).unwrap();
//!
//! let prediction = readout.predict();
//! assert_eq!(prediction.prediction.len(), readout.num_test());
//! ```

pub mod config;
pub mod dataset;
pub mod error;
pub mod readout;
pub mod table;
pub mod target;
pub mod utils;
