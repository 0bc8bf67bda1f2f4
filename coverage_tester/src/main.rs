use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use env_logger::Env;
use plant_coverage::parallel_pipeline::DEFAULT_RESULTS_DIR;
use plant_coverage::timeline::{process_datasets, write_timeline};
use plant_coverage::{AbortHandle, BatchOptions, CoverageConfig, ParallelPipeline};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(author, version, about = "Plant coverage from quadrat photographs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Measure a single JPG or every JPG of a directory.
    Process {
        /// JPG file or directory of JPGs.
        #[arg(short, long)]
        source: PathBuf,

        /// Where annotated images and `_results.json` are written.
        #[arg(short, long, default_value = DEFAULT_RESULTS_DIR)]
        dest: PathBuf,

        /// Process at most this many images.
        #[arg(short, long)]
        limit: Option<usize>,

        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Measure every dated dataset folder and build the timeline.
    Dataset {
        dataset_root: PathBuf,
        results_root: PathBuf,

        /// Dataset folder relative to the dataset root; repeatable. Dated
        /// folders are discovered when omitted.
        #[arg(long = "dir")]
        dirs: Vec<PathBuf>,

        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Rebuild `timeline.json` from existing results.
    Timeline { results_root: PathBuf },
}

#[derive(Args, Debug)]
struct EngineArgs {
    /// JSON file overriding the default thresholds.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Use the 4000x3000 profile instead of 640x480.
    #[arg(long)]
    full_resolution: bool,

    /// Worker count; defaults to the number of CPUs.
    #[arg(long)]
    workers: Option<usize>,

    #[arg(long, default_value_t = 90, value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,
}

impl EngineArgs {
    fn load_config(&self) -> Result<CoverageConfig> {
        let config = match &self.config {
            Some(path) => CoverageConfig::from_json_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None if self.full_resolution => CoverageConfig::full_resolution(),
            None => CoverageConfig::default(),
        };
        config.validate().context("invalid configuration")?;
        Ok(config)
    }

    fn batch_options(&self, dest_dir: PathBuf, limit: Option<usize>) -> BatchOptions {
        let defaults = BatchOptions::default();
        BatchOptions {
            dest_dir,
            limit,
            workers: self.workers.unwrap_or(defaults.workers),
            jpeg_quality: self.jpeg_quality,
        }
    }
}

/// Raises `abort` on Ctrl-C so batches finish their images in progress and
/// still write their results.
fn abort_on_ctrl_c(abort: AbortHandle) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, finishing images in progress");
            abort.abort();
        }
    });
}

async fn process(source: &Path, options: BatchOptions, config: CoverageConfig) -> Result<()> {
    let pipeline = ParallelPipeline::new(config, options)
        .context("starting the batch pipeline")?;
    abort_on_ctrl_c(pipeline.abort_handle());

    let report = pipeline
        .run_source(source)
        .await
        .with_context(|| format!("processing {}", source.display()))?;

    if let Some(report) = report {
        match &report.stats {
            Some(stats) => log::info!(
                "{} images, average coverage {:.2}% (std dev {:.2})",
                stats.count,
                stats.average,
                stats.std_dev
            ),
            None => log::warn!("No image could be measured"),
        }
    }
    pipeline.shutdown().await;
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Process {
            source,
            dest,
            limit,
            engine,
        } => {
            let config = engine.load_config()?;
            process(&source, engine.batch_options(dest, limit), config).await
        }
        Command::Dataset {
            dataset_root,
            results_root,
            dirs,
            engine,
        } => {
            let config = engine.load_config()?;
            let options = engine.batch_options(results_root.clone(), None);
            let datasets = (!dirs.is_empty()).then_some(dirs);
            let abort = AbortHandle::new();
            abort_on_ctrl_c(abort.clone());
            let points = process_datasets(
                &dataset_root,
                &results_root,
                datasets,
                &config,
                &options,
                &abort,
            )
            .await
            .with_context(|| format!("processing datasets in {}", dataset_root.display()))?;
            log::info!("{} datasets on the timeline", points.len());
            Ok(())
        }
        Command::Timeline { results_root } => {
            write_timeline(&results_root)
                .with_context(|| format!("reading results in {}", results_root.display()))?;
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    if let Err(error) = run(cli).await {
        log::error!("{:#}", error);
        std::process::exit(1);
    }
}
