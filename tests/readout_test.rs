use approx::assert_relative_eq;
use std::io::Write;

use spike_readout::config::{Config, ReadoutConfig};
use spike_readout::dataset::SpikeDataset;
use spike_readout::error::ReadoutError;
use spike_readout::readout::{ReadoutClassifier, ReadoutParameters};
use spike_readout::table::{CsvLoader, Table, TableLoader};
use spike_readout::target::Encoding;

const SEED: u64 = 42;

/// 1000 steps of a sine input with 4 channels of alternating spikes.
fn alternating_table() -> Table {
    let rows = (0..1000)
        .map(|t| {
            let mut row = vec![t as f64, 3.0 * (t as f64 * 0.02).sin()];
            row.extend((0..4).map(|c| ((t + c) % 2) as f64));
            row
        })
        .collect();
    Table::new(rows).unwrap()
}

#[test]
fn test_alternating_spikes_end_to_end() {
    let table = alternating_table();
    let dataset = SpikeDataset::build(&table, 10, 100).unwrap();
    assert!(dataset
        .spike_rates()
        .iter()
        .all(|&rate| (0.0..=1.0).contains(&rate)));

    let config = ReadoutConfig {
        output_size: 8,
        encoding: Encoding::Categorical,
        seed: Some(SEED),
        ..Default::default()
    };
    let mut readout = ReadoutClassifier::build(&dataset, config).unwrap();
    readout.train(50, 50).unwrap();

    let history = readout.error_history();
    assert_eq!(history.len(), 50);
    assert!(history.iter().all(|e| !e.is_nan()));

    let (mse, _) = readout.test();
    assert!(mse.is_finite());
    assert_eq!(readout.predict().prediction.len(), 200);
}

#[test]
fn test_csv_to_saved_readout() {
    let dir = tempfile::tempdir().unwrap();
    let data_path = dir.path().join("output_waveforms_sine.csv");
    let mut file = std::fs::File::create(&data_path).unwrap();
    for row in alternating_table().rows() {
        let line = row.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",");
        writeln!(file, "{}", line).unwrap();
    }
    drop(file);

    let table = CsvLoader::default().load(&data_path).unwrap();
    assert_eq!(table, alternating_table());

    let config: Config = serde_json::from_str(
        r#"{"readout": {"output_size": 1, "learning_rate": 0.5, "seed": 42}, "training": {"epochs": 20, "batch_size": 100}}"#,
    )
    .unwrap();
    let dataset = SpikeDataset::from_config(&table, &config.dataset).unwrap();
    let mut readout = ReadoutClassifier::build(&dataset, config.readout.clone()).unwrap();
    readout
        .train(config.training.epochs, config.training.batch_size)
        .unwrap();

    let params_path = dir.path().join("readout.json");
    readout.save_to(&params_path).unwrap();
    let parameters = ReadoutParameters::load_from(&params_path).unwrap();
    assert_eq!(parameters.error_history.len(), 20);
    assert_relative_eq!(parameters.bias[0], readout.bias()[0], epsilon = 1e-12);
}

#[test]
fn test_unsupported_files() {
    let loader = CsvLoader::default();
    assert!(matches!(
        loader.load(std::path::Path::new("sim_res/output_waveforms.vcd")),
        Err(ReadoutError::UnsupportedFormat(_))
    ));
    assert!(matches!(
        loader.load(std::path::Path::new("sim_res/output_waveforms.dat")),
        Err(ReadoutError::UnsupportedFormat(_))
    ));
    assert!(matches!(
        loader.load(std::path::Path::new("missing/output_waveforms.csv")),
        Err(ReadoutError::IOError(_))
    ));
}

#[test]
fn test_warm_start_matches_single_run() {
    let table = alternating_table();
    let dataset = SpikeDataset::build(&table, 10, 100).unwrap();
    let config = ReadoutConfig {
        output_size: 4,
        encoding: Encoding::Thermometer,
        seed: Some(SEED),
        ..Default::default()
    };

    let mut once = ReadoutClassifier::build(&dataset, config.clone()).unwrap();
    once.train(10, 64).unwrap();

    let mut twice = ReadoutClassifier::build(&dataset, config).unwrap();
    twice.train(4, 64).unwrap();
    twice.train(6, 64).unwrap();

    assert_eq!(once.error_history(), twice.error_history());
    assert_eq!(once.weights(), twice.weights());
}
