// THEORY:
// This file is the main entry point for the `plant_coverage` library crate.
// It defines the public API exposed to external consumers (the
// `coverage_tester` CLI, or a camera capture loop that hands over frames).
//
// The primary goal is to export `CoveragePipeline` and `process_image` for
// single images, `ParallelPipeline` for batches, and the timeline reporter for
// dated datasets, together with their data structures (`CoverageConfig`,
// `CoverageResult`, `BatchReport`, ...). The individual image stages live in
// `core_modules` and are public for callers that want to run them one by one.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod parallel_pipeline;
pub mod pipeline;
pub mod report;
pub mod timeline;

pub use config::CoverageConfig;
pub use error::{CoverageError, Result};
pub use parallel_pipeline::{AbortHandle, BatchOptions, ParallelPipeline};
pub use pipeline::{CoveragePipeline, CoverageResult, ImageSource, process_image};
pub use report::{BatchReport, CoverageStats, FailureRecord, ImageRecord};
pub use timeline::TimelinePoint;
