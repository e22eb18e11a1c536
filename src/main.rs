use clap::Parser;
use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config as LogConfig, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::PathBuf;

use spike_readout::config::Config;
use spike_readout::dataset::SpikeDataset;
use spike_readout::error::ReadoutError;
use spike_readout::readout::ReadoutClassifier;
use spike_readout::table::{CsvLoader, TableLoader};
use spike_readout::target::Encoding;

#[derive(Parser, Debug)]
struct Args {
    /// The recording to decode (headerless CSV: time, input signal, spike channels)
    data: PathBuf,
    /// A JSON configuration file, missing fields take their default value
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// The number of output units
    #[arg(long)]
    output_size: Option<usize>,
    /// The learning rate
    #[arg(long)]
    learning_rate: Option<f64>,
    /// The target encoding, must be one of: categorical, thermometer (or full)
    #[arg(long)]
    encoding: Option<String>,
    /// The number of training epochs
    #[arg(long)]
    epochs: Option<usize>,
    /// The batch size
    #[arg(long)]
    batch_size: Option<usize>,
    /// The seed used for the readout initialization
    #[arg(long)]
    seed: Option<u64>,
    /// Where to save the trained parameters (JSON)
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// An optional log file, in addition to the console
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn init_logging(log_file: Option<&PathBuf>) -> Result<(), ReadoutError> {
    let console = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{l} - {m}\n")))
        .build();
    let mut builder =
        LogConfig::builder().appender(Appender::builder().build("console", Box::new(console)));
    let mut root = Root::builder().appender("console");

    if let Some(path) = log_file {
        let logfile = FileAppender::builder()
            .encoder(Box::new(PatternEncoder::new("{d} {l} - {m}\n")))
            .build(path)
            .map_err(|e| ReadoutError::IOError(e.to_string()))?;
        builder = builder.appender(Appender::builder().build("logfile", Box::new(logfile)));
        root = root.appender("logfile");
    }

    let config = builder
        .build(root.build(LevelFilter::Info))
        .map_err(|e| ReadoutError::IOError(e.to_string()))?;
    log4rs::init_config(config).map_err(|e| ReadoutError::IOError(e.to_string()))?;
    Ok(())
}

fn main() -> Result<(), ReadoutError> {
    let args = Args::parse();
    init_logging(args.log_file.as_ref())?;

    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::default(),
    };
    if let Some(output_size) = args.output_size {
        config.readout.output_size = output_size;
    }
    if let Some(learning_rate) = args.learning_rate {
        config.readout.learning_rate = learning_rate;
    }
    if let Some(encoding) = &args.encoding {
        config.readout.encoding = Encoding::from_str(encoding)?;
    }
    if let Some(seed) = args.seed {
        config.readout.seed = Some(seed);
    }
    if let Some(epochs) = args.epochs {
        config.training.epochs = epochs;
    }
    if let Some(batch_size) = args.batch_size {
        config.training.batch_size = batch_size;
    }
    log::info!("{:?}", config);

    let table = CsvLoader::default().load(&args.data)?;
    let dataset = SpikeDataset::from_config(&table, &config.dataset)?;
    log::info!(
        "Spike dataset: done! {} steps and {} channels",
        dataset.num_steps(),
        dataset.num_channels()
    );
    let population = dataset.population_vector();
    let variance = dataset.population_variance();
    log::info!(
        "Spike times: mean {:.4} and variance {:.4} across channels (averaged over time)",
        population.column(0).mean(),
        variance.column(0).mean()
    );
    log::info!(
        "Spike rates: mean {:.4} and variance {:.4} across channels (averaged over time)",
        population.column(1).mean(),
        variance.column(1).mean()
    );

    let mut readout = ReadoutClassifier::build(&dataset, config.readout.clone())?;
    readout.train(config.training.epochs, config.training.batch_size)?;
    log::info!(
        "Readout training: done! Final RMSE is {:.6}",
        readout.error_history().last().copied().unwrap_or(f64::NAN)
    );

    let (mse, correlation) = readout.test();
    log::info!(
        "Readout testing: done! MSE is {:.6} and correlation is {:.3}",
        mse,
        correlation
    );

    let prediction = readout.predict();
    let reconstruction_error = prediction
        .prediction
        .iter()
        .zip(prediction.target.iter())
        .map(|(p, t)| (p - t).powi(2))
        .sum::<f64>()
        / prediction.prediction.len() as f64;
    log::info!(
        "Reconstruction: done! Mean squared deviation from the target is {:.6}",
        reconstruction_error
    );

    if let Some(path) = &args.output {
        readout.save_to(path)?;
        log::info!("Readout saving: done! Saved to {}", path.display());
    }

    Ok(())
}
