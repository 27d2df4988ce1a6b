//! Manufacturing line simulation application.
#![warn(
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_import_braces,
    unused_qualifications
)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::default_trait_access)]

use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use eyre::WrapErr;
use indicatif::{ProgressBar, ProgressStyle};

use linesim::{as_hours, write_history, Config, Factory, FactoryReport, Period};

/// Runs the manufacturing line simulation and prints a JSON report.
#[derive(Parser)]
#[clap(version, author)]
struct Opt {
    /// Path to a YAML file with the factory configuration.
    /// The reference factory is used if missing.
    #[clap(long)]
    config: Option<PathBuf>,

    /// Random seed; overrides the one in the config.
    #[clap(long)]
    seed: Option<u64>,

    /// Simulated duration, e.g., `365days` or `2weeks`; overrides the one in the config.
    #[clap(long)]
    duration: Option<humantime::Duration>,

    /// Time period covered by the report.
    #[clap(long, default_value = "all")]
    period: Period,

    /// Write the report to this file instead of the stdout.
    #[clap(long)]
    report_output: Option<PathBuf>,

    /// Write the status history of all stations to this CSV file.
    #[clap(long)]
    history_output: Option<PathBuf>,

    /// Verbosity.
    #[clap(short, long, parse(from_occurrences))]
    verbose: i32,

    /// Store the logs this file.
    #[clap(long)]
    log_output: Option<PathBuf>,

    /// Do not log to the stderr.
    #[clap(long)]
    no_stderr: bool,
}

impl Opt {
    /// Loads the config file, if any, and applies the overrides passed in the command line.
    fn factory_config(&self) -> eyre::Result<Config> {
        let mut config = match &self.config {
            Some(path) => {
                let file = File::open(path).wrap_err_with(|| {
                    format!("unable to open config file: {}", path.display())
                })?;
                Config::from_yaml(file).wrap_err("unable to load config")?
            }
            None => Config::default(),
        };
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(duration) = &self.duration {
            let duration: Duration = **duration;
            config.duration_days = as_hours(duration) / 24.0;
        }
        Ok(config)
    }
}

/// Runs the factory until `limit`, reporting the progress in hours.
fn run_with_progress(factory: &mut Factory, limit: Duration) -> Duration {
    let pb = ProgressBar::new(limit.as_secs() / 3600)
        .with_style(ProgressStyle::default_bar().template("{msg} {wide_bar} {percent}%"));
    while factory.peek_time().map_or(false, |time| time < limit) {
        factory.step();
        let hours = factory.time().as_secs() / 3600;
        if pb.position() < hours {
            pb.set_position(hours);
            pb.set_message(&format!(
                "[{time}h] [S={started}] [C={completed}] [P={produced}] [F={faulty}]",
                time = hours,
                started = factory.items_started(),
                completed = factory.items_completed(),
                produced = factory.total_produced(),
                faulty = factory.faulty_products(),
            ));
        }
    }
    pb.finish();
    factory.run_until(limit)
}

/// Log levels of the line and of the kernel for the given number of `-v` flags.
///
/// `-v` shows run milestones, `-vv` adds station transitions and items, and `-vvv` adds every
/// kernel event.
fn log_levels(verbose: i32) -> (log::LevelFilter, log::LevelFilter) {
    use log::LevelFilter;
    match verbose {
        v if v >= 3 => (LevelFilter::Trace, LevelFilter::Trace),
        2 => (LevelFilter::Debug, LevelFilter::Warn),
        1 => (LevelFilter::Info, LevelFilter::Warn),
        _ => (LevelFilter::Warn, LevelFilter::Warn),
    }
}

/// Routes the `log` records of the line and of the kernel to the stderr and the log file.
fn set_up_logger(opt: &Opt) -> Result<(), fern::InitError> {
    let (line_level, kernel_level) = log_levels(opt.verbose);
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{:<5} {}: {}",
                record.level(),
                record.target(),
                message
            ))
        })
        .level(line_level)
        .level_for("simkern", kernel_level);
    if let Some(path) = &opt.log_output {
        dispatch = dispatch.chain(File::create(path)?);
    }
    if !opt.no_stderr {
        dispatch = dispatch.chain(io::stderr());
    }
    dispatch.apply()?;
    Ok(())
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let opt = Opt::parse();
    set_up_logger(&opt)?;
    let config = opt.factory_config()?;
    let mut factory = Factory::new(config).wrap_err("invalid factory config")?;
    let duration = factory.config().duration();
    run_with_progress(&mut factory, duration);
    let report = FactoryReport::new(&factory, opt.period);
    if let Some(path) = &opt.report_output {
        let file = File::create(path)
            .wrap_err_with(|| format!("unable to create report file: {}", path.display()))?;
        serde_json::to_writer_pretty(io::BufWriter::new(file), &report)
            .wrap_err("unable to write report")?;
    } else {
        serde_json::to_writer_pretty(io::stdout(), &report).wrap_err("unable to write report")?;
        println!();
    }
    if let Some(path) = &opt.history_output {
        let file = File::create(path)
            .wrap_err_with(|| format!("unable to create history file: {}", path.display()))?;
        write_history(&factory, io::BufWriter::new(file)).wrap_err("unable to write history")?;
    }
    Ok(())
}
