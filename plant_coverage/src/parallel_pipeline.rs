// THEORY:
// Images are independent, so a batch is embarrassingly parallel. A dispatcher
// task hands images round-robin to a fixed set of workers; each worker runs the
// CPU-bound pipeline on tokio's blocking pool, writes that image's annotated
// JPEG to its own file, and replies through a oneshot channel. The only shared
// output, the aggregate report, is assembled by the caller once every reply is
// in, in input order.
//
// A failed image never stops the batch: it becomes a failure record and the
// workers move on. Aborting stops workers from picking up further images;
// images already being processed finish, and the ones never started are
// reported as skipped.

use crate::config::CoverageConfig;
use crate::core_modules::utils::image_helper::{DEFAULT_JPEG_QUALITY, list_jpegs, save_jpeg};
use crate::error::{CoverageError, Result};
use crate::pipeline::{CoverageResult, ImageSource, process_image};
use crate::report::{BatchReport, FailureRecord, ImageRecord, RESULTS_FILE_NAME};
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use image::RgbImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};

pub const DEFAULT_RESULTS_DIR: &str = "coverage-results";

/// Settings of a batch run.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Where annotated images and the aggregate report are written.
    pub dest_dir: PathBuf,
    /// Process at most this many images.
    pub limit: Option<usize>,
    pub workers: usize,
    pub jpeg_quality: u8,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            dest_dir: PathBuf::from(DEFAULT_RESULTS_DIR),
            limit: None,
            workers: num_cpus::get(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

type TaskOutcome = std::result::Result<ImageRecord, FailureRecord>;

pub struct ImageTask {
    pub source: PathBuf,
    pub result_sender: oneshot::Sender<TaskOutcome>,
}

/// Stops running batches from starting further images. Clones share one
/// flag, so a single handle can cover several batches in a row.
#[derive(Clone)]
pub struct AbortHandle {
    abort_tx: Arc<watch::Sender<bool>>,
}

impl AbortHandle {
    pub fn new() -> Self {
        let (abort_tx, _) = watch::channel(false);
        Self {
            abort_tx: Arc::new(abort_tx),
        }
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.abort_tx.subscribe()
    }

    pub fn abort(&self) {
        self.abort_tx.send_replace(true);
    }

    pub fn is_aborted(&self) -> bool {
        *self.abort_tx.borrow()
    }
}

impl Default for AbortHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps a panicked blocking task to an error.
fn crashed(join_error: tokio::task::JoinError) -> CoverageError {
    CoverageError::Internal(format!("worker crashed: {}", join_error))
}

pub struct WorkerPool {
    task_sender: mpsc::UnboundedSender<ImageTask>,
    workers: Vec<tokio::task::JoinHandle<()>>,
    abort: AbortHandle,
}

impl WorkerPool {
    /// Spawns the dispatcher and `worker_count` workers. Must be called from
    /// within a tokio runtime.
    pub fn new(
        config: Arc<CoverageConfig>,
        dest_dir: PathBuf,
        jpeg_quality: u8,
        worker_count: usize,
        abort: AbortHandle,
    ) -> Self {
        let worker_count = worker_count.max(1);
        let (task_sender, mut task_receiver) = mpsc::unbounded_channel::<ImageTask>();
        let abort_rx = abort.subscribe();
        let dest_dir = Arc::new(dest_dir);

        let (worker_senders, worker_receivers): (Vec<_>, Vec<_>) = (0..worker_count)
            .map(|_| mpsc::unbounded_channel::<ImageTask>())
            .unzip();

        // Dispatcher
        tokio::spawn(async move {
            let mut worker_idx = 0;
            while let Some(task) = task_receiver.recv().await {
                let _ = worker_senders[worker_idx].send(task);
                worker_idx = (worker_idx + 1) % worker_count;
            }
        });

        let mut workers = Vec::with_capacity(worker_count);
        for mut worker_receiver in worker_receivers {
            let worker_config = Arc::clone(&config);
            let worker_dest = Arc::clone(&dest_dir);
            let worker_abort = abort_rx.clone();

            let worker = tokio::spawn(async move {
                while let Some(task) = worker_receiver.recv().await {
                    if *worker_abort.borrow() {
                        // Dropping the sender marks the image as skipped.
                        continue;
                    }
                    let outcome = Self::process_task_worker(
                        task.source,
                        Arc::clone(&worker_config),
                        Arc::clone(&worker_dest),
                        jpeg_quality,
                    )
                    .await;
                    let _ = task.result_sender.send(outcome);
                }
            });
            workers.push(worker);
        }

        Self {
            task_sender,
            workers,
            abort,
        }
    }

    async fn process_task_worker(
        source: PathBuf,
        config: Arc<CoverageConfig>,
        dest_dir: Arc<PathBuf>,
        jpeg_quality: u8,
    ) -> TaskOutcome {
        let image_filename = file_name_of(&source);
        let blocking_name = image_filename.clone();
        let joined = tokio::task::spawn_blocking(move || {
            measure_and_save(&source, blocking_name, &config, &dest_dir, jpeg_quality)
        })
        .await;

        match joined {
            Ok(Ok(record)) => Ok(record),
            Ok(Err(error)) => {
                log::warn!("{} failed ({}): {}", image_filename, error.kind(), error);
                Err(FailureRecord::new(image_filename, &error))
            }
            Err(join_error) => {
                let error = crashed(join_error);
                log::error!("{}: {}", image_filename, error);
                Err(FailureRecord::new(image_filename, &error))
            }
        }
    }

    /// Queues one image; the receiver resolves to an error if the image was
    /// skipped because of an abort.
    pub fn submit(&self, source: PathBuf) -> oneshot::Receiver<TaskOutcome> {
        let (result_sender, result_receiver) = oneshot::channel();
        let task = ImageTask {
            source,
            result_sender,
        };
        // A closed channel drops the task, which reads as skipped.
        let _ = self.task_sender.send(task);
        result_receiver
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Stops accepting work and waits for the workers to drain their queues.
    pub async fn shutdown(self) {
        drop(self.task_sender);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn measure_and_save(
    source: &Path,
    image_filename: String,
    config: &CoverageConfig,
    dest_dir: &Path,
    jpeg_quality: u8,
) -> Result<ImageRecord> {
    let result = process_image(ImageSource::File(source.to_path_buf()), config)?;
    save_jpeg(
        &dest_dir.join(&image_filename),
        &result.annotated_image,
        jpeg_quality,
    )?;
    Ok(ImageRecord {
        image_filename,
        coverage: result.percentage,
    })
}

/// Batch driver: runs the coverage pipeline over many images concurrently.
pub struct ParallelPipeline {
    config: Arc<CoverageConfig>,
    options: BatchOptions,
    worker_pool: WorkerPool,
}

impl ParallelPipeline {
    /// Validates the configuration, creates the destination directory and
    /// starts the worker pool.
    pub fn new(config: CoverageConfig, options: BatchOptions) -> Result<Self> {
        Self::with_abort(config, options, AbortHandle::new())
    }

    /// Like `new`, but the batch obeys an abort flag shared with the caller.
    pub fn with_abort(
        config: CoverageConfig,
        options: BatchOptions,
        abort: AbortHandle,
    ) -> Result<Self> {
        config.validate()?;
        std::fs::create_dir_all(&options.dest_dir)
            .map_err(|e| CoverageError::io(&options.dest_dir, e))?;

        let config = Arc::new(config);
        let worker_pool = WorkerPool::new(
            Arc::clone(&config),
            options.dest_dir.clone(),
            options.jpeg_quality,
            options.workers,
            abort,
        );
        Ok(Self {
            config,
            options,
            worker_pool,
        })
    }

    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.worker_pool.abort_handle()
    }

    /// Processes every listed image and aggregates the outcomes in input order.
    pub async fn run(&self, sources: Vec<PathBuf>) -> BatchReport {
        let total = sources.len();
        let names: Vec<String> = sources.iter().map(|path| file_name_of(path)).collect();

        let mut pending: FuturesUnordered<_> = sources
            .into_iter()
            .enumerate()
            .map(|(index, source)| {
                let receiver = self.worker_pool.submit(source);
                async move { (index, receiver.await) }
            })
            .collect();

        let mut outcomes: Vec<Option<TaskOutcome>> = (0..total).map(|_| None).collect();
        let mut done = 0;
        while let Some((index, outcome)) = pending.next().await {
            done += 1;
            log::info!("Progress: {}/{}", done, total);
            outcomes[index] = outcome.ok();
        }

        let mut processed = Vec::new();
        let mut failures = Vec::new();
        let mut skipped = Vec::new();
        for (name, outcome) in names.into_iter().zip(outcomes) {
            match outcome {
                Some(Ok(record)) => processed.push(record),
                Some(Err(failure)) => failures.push(failure),
                None => skipped.push(name),
            }
        }
        if !failures.is_empty() {
            log::warn!("{} of {} images failed", failures.len(), total);
        }
        if !skipped.is_empty() {
            log::warn!("{} images skipped after abort", skipped.len());
        }

        BatchReport::new(processed, failures, skipped)
    }

    /// Processes a single JPEG or a directory of JPEGs and writes the
    /// aggregate report. Returns `None` when there was nothing to process.
    pub async fn run_source(&self, source: &Path) -> Result<Option<BatchReport>> {
        let mut sources = list_jpegs(source)?;
        if let Some(limit) = self.options.limit {
            sources.truncate(limit);
        }
        if sources.is_empty() {
            log::info!("No JPG images were found or limit is 0. Nothing to do.");
            return Ok(None);
        }

        log::info!(
            "Processing {} images from {} with {} workers",
            sources.len(),
            source.display(),
            self.options.workers.max(1)
        );
        let report = self.run(sources).await;
        let results_path = self.options.dest_dir.join(RESULTS_FILE_NAME);
        report.write_json(&results_path)?;
        log::info!("Done! - Results created in {}", self.options.dest_dir.display());
        Ok(Some(report))
    }

    /// Runs the pipeline on an in-memory frame, e.g. one handed over by a
    /// camera capture loop, without blocking the async runtime.
    pub async fn process_buffer(&self, frame: RgbImage) -> Result<CoverageResult> {
        let config = Arc::clone(&self.config);
        tokio::task::spawn_blocking(move || process_image(ImageSource::Buffer(frame), &config))
            .await
            .map_err(crashed)?
    }

    pub async fn shutdown(self) {
        self.worker_pool.shutdown().await;
    }
}
