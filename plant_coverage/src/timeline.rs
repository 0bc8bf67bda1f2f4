// THEORY:
// Field campaigns photograph the same plot on several dates, one folder per
// visit, named with a `yymmdd` prefix (`240508_DW_62`). The dataset driver runs
// the batch pipeline over each folder into a mirrored results tree; the
// timeline then walks that tree, reads every `_results.json` and turns the
// aggregate statistics into a date-ordered series. That series is the data a
// "coverage over time" chart is drawn from; drawing it is left to the consumer.

use crate::config::CoverageConfig;
use crate::error::{CoverageError, Result};
use crate::parallel_pipeline::{AbortHandle, BatchOptions, ParallelPipeline};
use crate::report::{BatchReport, RESULTS_FILE_NAME};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const TIMELINE_FILE_NAME: &str = "timeline.json";

/// Dataset folders are searched this many levels below the root.
const MAX_DISCOVERY_DEPTH: usize = 2;
const DATE_PREFIX_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelinePoint {
    /// Dataset folder relative to the results root.
    pub dataset: String,
    pub date: NaiveDate,
    /// Axis label, e.g. `24-May-08`.
    pub label: String,
    pub count: usize,
    pub average: f64,
    pub std_dev: f64,
}

/// Parses the `yymmdd` prefix of a dataset folder name.
pub fn parse_dataset_date(name: &str) -> Option<NaiveDate> {
    let prefix = name.get(..DATE_PREFIX_LEN)?;
    if !prefix.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(prefix, "%y%m%d").ok()
}

pub fn date_label(date: NaiveDate) -> String {
    date.format("%y-%B-%d").to_string()
}

fn dir_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|name| name.to_str())
}

/// Dated folders under `root`, as paths relative to it, sorted. A dated
/// folder is not searched further.
pub fn discover_datasets(root: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![(PathBuf::new(), 1)];

    while let Some((relative, depth)) = pending.pop() {
        let absolute = root.join(&relative);
        let entries = std::fs::read_dir(&absolute).map_err(|e| CoverageError::io(&absolute, e))?;
        for entry in entries.filter_map(|entry| entry.ok()) {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let Some(name) = dir_name(&path) else {
                continue;
            };
            let child = relative.join(name);
            if parse_dataset_date(name).is_some() {
                found.push(child);
            } else if depth < MAX_DISCOVERY_DEPTH {
                pending.push((child, depth + 1));
            }
        }
    }

    found.sort();
    Ok(found)
}

fn timeline_point(results_root: &Path, dataset: &Path) -> Option<TimelinePoint> {
    let name = dataset.to_string_lossy().replace('\\', "/");
    let Some(date) = dir_name(dataset).and_then(parse_dataset_date) else {
        log::warn!("Skipping {}: no yymmdd date prefix", name);
        return None;
    };

    let results_path = results_root.join(dataset).join(RESULTS_FILE_NAME);
    if !results_path.is_file() {
        log::warn!("Skipping {}: no {}", name, RESULTS_FILE_NAME);
        return None;
    }
    let report = match BatchReport::read_json(&results_path) {
        Ok(report) => report,
        Err(error) => {
            log::warn!("Skipping {}: {}", name, error);
            return None;
        }
    };
    let Some(stats) = report.stats else {
        log::warn!("Skipping {}: no image was measured", name);
        return None;
    };

    Some(TimelinePoint {
        dataset: name,
        date,
        label: date_label(date),
        count: stats.count,
        average: stats.average,
        std_dev: stats.std_dev,
    })
}

/// Reads the aggregate of every dataset under `results_root`, ordered by date.
pub fn collect_timeline(results_root: &Path) -> Result<Vec<TimelinePoint>> {
    let mut points: Vec<TimelinePoint> = discover_datasets(results_root)?
        .iter()
        .filter_map(|dataset| timeline_point(results_root, dataset))
        .collect();
    points.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.dataset.cmp(&b.dataset)));
    Ok(points)
}

/// Writes `timeline.json` into `results_root`. Nothing is written when no
/// dataset has statistics.
pub fn write_timeline(results_root: &Path) -> Result<Vec<TimelinePoint>> {
    let points = collect_timeline(results_root)?;
    if points.is_empty() {
        log::info!("No data was found to generate stats");
        return Ok(points);
    }

    let path = results_root.join(TIMELINE_FILE_NAME);
    let json = serde_json::to_string_pretty(&points)?;
    std::fs::write(&path, json).map_err(|e| CoverageError::io(&path, e))?;
    log::info!("Timeline with {} points created at {}", points.len(), path.display());
    Ok(points)
}

async fn process_dataset(
    source_dir: &Path,
    dest_dir: PathBuf,
    config: &CoverageConfig,
    options: &BatchOptions,
    abort: &AbortHandle,
) -> Result<()> {
    let batch_options = BatchOptions {
        dest_dir,
        ..options.clone()
    };
    let pipeline = ParallelPipeline::with_abort(config.clone(), batch_options, abort.clone())?;
    let outcome = pipeline.run_source(source_dir).await;
    pipeline.shutdown().await;
    outcome.map(|_| ())
}

/// Batch-processes each dataset folder into the mirrored folder under
/// `results_root`, then writes the timeline. `datasets` defaults to the dated
/// folders discovered under `dataset_root`.
///
/// A dataset that cannot be processed is logged and skipped. Once `abort`
/// fires no further dataset is started; the one in progress still writes its
/// results for the images it finished.
pub async fn process_datasets(
    dataset_root: &Path,
    results_root: &Path,
    datasets: Option<Vec<PathBuf>>,
    config: &CoverageConfig,
    options: &BatchOptions,
    abort: &AbortHandle,
) -> Result<Vec<TimelinePoint>> {
    config.validate()?;
    let datasets = match datasets {
        Some(datasets) => datasets,
        None => discover_datasets(dataset_root)?,
    };

    for dataset in datasets {
        if abort.is_aborted() {
            log::warn!("Aborted, {} not started", dataset.display());
            continue;
        }
        let source_dir = dataset_root.join(&dataset);
        if !source_dir.is_dir() {
            log::warn!("Source path '{}' is not a directory", source_dir.display());
            continue;
        }

        log::info!("Processing dataset in {}", source_dir.display());
        let dest_dir = results_root.join(&dataset);
        if let Err(error) = process_dataset(&source_dir, dest_dir, config, options, abort).await {
            log::warn!("Skipping dataset {}: {}", dataset.display(), error);
        }
    }

    write_timeline(results_root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ImageRecord;
    use image::{Rgb, RgbImage};

    fn write_results(root: &Path, dataset: &str, coverages: &[f64]) {
        let dir = root.join(dataset);
        std::fs::create_dir_all(&dir).unwrap();
        let records = coverages
            .iter()
            .enumerate()
            .map(|(index, coverage)| ImageRecord {
                image_filename: format!("{index}.jpg"),
                coverage: *coverage,
            })
            .collect();
        BatchReport::new(records, Vec::new(), Vec::new())
            .write_json(&dir.join(RESULTS_FILE_NAME))
            .unwrap();
    }

    #[test]
    fn folder_prefix_becomes_date_and_label() {
        let date = parse_dataset_date("240508_DW_62").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 5, 8).unwrap());
        assert_eq!(date_label(date), "24-May-08");
        assert_eq!(date.to_string(), "2024-05-08");
    }

    #[test]
    fn undated_folders_have_no_date() {
        assert!(parse_dataset_date("coverage").is_none());
        assert!(parse_dataset_date("2405").is_none());
        assert!(parse_dataset_date("241340_DW").is_none());
        assert!(parse_dataset_date("+24050_DW").is_none());
    }

    #[test]
    fn discovery_looks_two_levels_deep() {
        let root = tempfile::tempdir().unwrap();
        for dir in [
            "coverage/240508_DW_62",
            "coverage/240514_DW_63",
            "biodiversity/240814_DW_F1_42",
            "240601_top",
            "a/b/240701_too_deep",
            "misc",
        ] {
            std::fs::create_dir_all(root.path().join(dir)).unwrap();
        }

        let found = discover_datasets(root.path()).unwrap();

        assert_eq!(
            found,
            vec![
                PathBuf::from("240601_top"),
                PathBuf::from("biodiversity/240814_DW_F1_42"),
                PathBuf::from("coverage/240508_DW_62"),
                PathBuf::from("coverage/240514_DW_63"),
            ]
        );
    }

    #[test]
    fn timeline_is_ordered_by_date() {
        let root = tempfile::tempdir().unwrap();
        write_results(root.path(), "coverage/240521_DW_84", &[50.0]);
        write_results(root.path(), "coverage/240508_DW_62", &[10.0, 30.0]);

        let points = collect_timeline(root.path()).unwrap();

        assert_eq!(points.len(), 2);
        assert_eq!(points[0].dataset, "coverage/240508_DW_62");
        assert_eq!(points[0].label, "24-May-08");
        assert_eq!(points[0].count, 2);
        assert_eq!(points[0].average, 20.0);
        assert_eq!(points[0].std_dev, 10.0);
        assert_eq!(points[1].label, "24-May-21");
    }

    #[test]
    fn datasets_without_statistics_are_skipped() {
        let root = tempfile::tempdir().unwrap();
        write_results(root.path(), "coverage/240508_DW_62", &[12.0]);
        write_results(root.path(), "coverage/240514_DW_63", &[]);
        std::fs::create_dir_all(root.path().join("coverage/240521_DW_84")).unwrap();

        let points = write_timeline(root.path()).unwrap();

        assert_eq!(points.len(), 1);
        let json = std::fs::read_to_string(root.path().join(TIMELINE_FILE_NAME)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["date"], "2024-05-08");
        assert_eq!(value[0]["average"], 12.0);
    }

    #[test]
    fn empty_results_tree_writes_nothing() {
        let root = tempfile::tempdir().unwrap();
        assert!(write_timeline(root.path()).unwrap().is_empty());
        assert!(!root.path().join(TIMELINE_FILE_NAME).exists());
    }

    fn quadrat_photo(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let photo = RgbImage::from_fn(640, 480, |x, y| {
            let in_outer = (40..=599).contains(&x) && (40..=439).contains(&y);
            let in_inner = (60..=579).contains(&x) && (60..=419).contains(&y);
            if in_inner {
                Rgb([30, 150, 40])
            } else if in_outer {
                Rgb([220, 222, 225])
            } else {
                Rgb([60, 60, 60])
            }
        });
        photo.save(path).unwrap();
    }

    fn single_worker() -> BatchOptions {
        BatchOptions {
            workers: 1,
            ..BatchOptions::default()
        }
    }

    #[tokio::test]
    async fn datasets_are_mirrored_into_the_results_tree() {
        let dataset_root = tempfile::tempdir().unwrap();
        let results_root = tempfile::tempdir().unwrap();
        quadrat_photo(&dataset_root.path().join("coverage/240508_DW_62/plot.jpg"));

        let points = process_datasets(
            dataset_root.path(),
            results_root.path(),
            None,
            &CoverageConfig::default(),
            &single_worker(),
            &AbortHandle::new(),
        )
        .await
        .unwrap();

        let mirrored = results_root.path().join("coverage/240508_DW_62");
        assert!(mirrored.join("plot.jpg").is_file());
        assert!(mirrored.join(RESULTS_FILE_NAME).is_file());
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].count, 1);
        assert!(results_root.path().join(TIMELINE_FILE_NAME).is_file());
    }

    #[tokio::test]
    async fn no_dataset_starts_after_abort() {
        let dataset_root = tempfile::tempdir().unwrap();
        let results_root = tempfile::tempdir().unwrap();
        quadrat_photo(&dataset_root.path().join("240508_DW_62/plot.jpg"));
        quadrat_photo(&dataset_root.path().join("240514_DW_63/plot.jpg"));
        let abort = AbortHandle::new();

        process_datasets(
            dataset_root.path(),
            results_root.path(),
            Some(vec![PathBuf::from("240508_DW_62")]),
            &CoverageConfig::default(),
            &single_worker(),
            &abort,
        )
        .await
        .unwrap();
        abort.abort();
        let points = process_datasets(
            dataset_root.path(),
            results_root.path(),
            None,
            &CoverageConfig::default(),
            &single_worker(),
            &abort,
        )
        .await
        .unwrap();

        assert_eq!(points.len(), 1);
        assert_eq!(points[0].dataset, "240508_DW_62");
        assert!(!results_root.path().join("240514_DW_63").exists());
    }

    #[tokio::test]
    async fn unwritable_dataset_does_not_stop_the_others() {
        let dataset_root = tempfile::tempdir().unwrap();
        let results_root = tempfile::tempdir().unwrap();
        quadrat_photo(&dataset_root.path().join("240501_DW_61/plot.jpg"));
        quadrat_photo(&dataset_root.path().join("240508_DW_62/plot.jpg"));
        // A plain file where the mirrored folder should go.
        std::fs::write(results_root.path().join("240501_DW_61"), b"x").unwrap();

        let points = process_datasets(
            dataset_root.path(),
            results_root.path(),
            None,
            &CoverageConfig::default(),
            &single_worker(),
            &AbortHandle::new(),
        )
        .await
        .unwrap();

        assert_eq!(points.len(), 1);
        assert_eq!(points[0].dataset, "240508_DW_62");
    }
}
