use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;

use spike_readout::config::{ReadoutConfig, TrainingConfig};
use spike_readout::dataset::SpikeDataset;
use spike_readout::error::ReadoutError;
use spike_readout::readout::{sweep, ReadoutClassifier};
use spike_readout::table::Table;
use spike_readout::target::Encoding;

const NUM_STEPS: usize = 1000;
const NUM_CHANNELS: usize = 4;

/// A sine input encoded by channels firing above increasing levels.
fn synthetic_table() -> Result<Table, ReadoutError> {
    let rows = (0..NUM_STEPS)
        .map(|t| {
            let x = 2.0 * (t as f64 * 2.0 * std::f64::consts::PI / 200.0).sin();
            let mut row = vec![t as f64, x];
            row.extend((0..NUM_CHANNELS).map(|c| {
                let level = -1.5 + c as f64;
                ((x > level) && (t + c) % 2 == 0) as u8 as f64
            }));
            row
        })
        .collect();
    Table::new(rows)
}

fn main() -> Result<(), ReadoutError> {
    let console = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{l} - {m}\n")))
        .build();
    let config = Config::builder()
        .appender(Appender::builder().build("console", Box::new(console)))
        .build(Root::builder().appender("console").build(LevelFilter::Info))
        .map_err(|e| ReadoutError::IOError(e.to_string()))?;
    log4rs::init_config(config).map_err(|e| ReadoutError::IOError(e.to_string()))?;

    let table = synthetic_table()?;
    let dataset = SpikeDataset::build(&table, 10, 100)?;
    let defined = dataset.correlation().iter().filter(|c| !c.is_nan()).count();
    log::info!(
        "Spike dataset: {} steps, {} channels, {} defined correlation values",
        dataset.num_steps(),
        dataset.num_channels(),
        defined
    );

    for encoding in [Encoding::Categorical, Encoding::Thermometer] {
        let config = ReadoutConfig {
            output_size: 8,
            encoding,
            seed: Some(42),
            ..Default::default()
        };
        let mut readout = ReadoutClassifier::build(&dataset, config)?;
        readout.train(50, 50)?;
        let (mse, correlation) = readout.test();
        log::info!(
            "{:?}: final RMSE {:.4}, test MSE {:.4}, test correlation {:.3}",
            encoding,
            readout.error_history().last().copied().unwrap_or(f64::NAN),
            mse,
            correlation
        );
    }

    let configs: Vec<ReadoutConfig> = [0.01, 0.05, 0.1, 0.5]
        .into_iter()
        .map(|learning_rate| ReadoutConfig {
            output_size: 8,
            learning_rate,
            seed: Some(42),
            ..Default::default()
        })
        .collect();
    let training = TrainingConfig {
        epochs: 50,
        batch_size: 50,
    };
    for result in sweep(&dataset, &configs, &training) {
        let result = result?;
        log::info!(
            "Learning rate {}: final RMSE {:.4}",
            result.config.learning_rate,
            result.train_rmse
        );
    }

    Ok(())
}
