// THEORY:
// A batch produces one record per successfully processed image and one failure
// record per image that could not be measured. Statistics are computed over the
// successes only; the failures are listed beside them so a reader can see how
// much of the batch the numbers actually represent.

use crate::error::{CoverageError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File name of the aggregate written next to the annotated images.
pub const RESULTS_FILE_NAME: &str = "_results.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub image_filename: String,
    pub coverage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub image_filename: String,
    pub kind: String,
    pub message: String,
}

impl FailureRecord {
    pub fn new(image_filename: impl Into<String>, error: &CoverageError) -> Self {
        Self {
            image_filename: image_filename.into(),
            kind: error.kind().to_string(),
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageStats {
    pub count: usize,
    pub average: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    pub max: f64,
    pub min: f64,
}

impl CoverageStats {
    /// `None` when there is nothing to summarize.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let count = values.len();
        let average = values.iter().sum::<f64>() / count as f64;
        let variance = values
            .iter()
            .map(|value| (value - average).powi(2))
            .sum::<f64>()
            / count as f64;

        Some(Self {
            count,
            average,
            std_dev: variance.sqrt(),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
        })
    }
}

/// Aggregate of one batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub stats: Option<CoverageStats>,
    pub processed_images: Vec<ImageRecord>,
    pub failure_count: usize,
    #[serde(default)]
    pub failures: Vec<FailureRecord>,
    /// Images never scheduled because the batch was aborted.
    #[serde(default)]
    pub skipped_images: Vec<String>,
}

impl BatchReport {
    pub fn new(
        processed_images: Vec<ImageRecord>,
        failures: Vec<FailureRecord>,
        skipped_images: Vec<String>,
    ) -> Self {
        let coverages: Vec<f64> = processed_images.iter().map(|r| r.coverage).collect();
        Self {
            stats: CoverageStats::from_values(&coverages),
            processed_images,
            failure_count: failures.len(),
            failures,
            skipped_images,
        }
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| CoverageError::io(path, e))
    }

    pub fn read_json(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| CoverageError::io(path, e))?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, coverage: f64) -> ImageRecord {
        ImageRecord {
            image_filename: name.to_string(),
            coverage,
        }
    }

    #[test]
    fn stats_use_population_deviation() {
        let stats = CoverageStats::from_values(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_eq!(stats.count, 8);
        assert!((stats.average - 5.0).abs() < 1e-12);
        assert!((stats.std_dev - 2.0).abs() < 1e-12);
        assert_eq!(stats.max, 9.0);
        assert_eq!(stats.min, 2.0);
    }

    #[test]
    fn no_values_means_no_stats() {
        assert!(CoverageStats::from_values(&[]).is_none());
    }

    #[test]
    fn failures_are_counted_but_not_averaged() {
        let report = BatchReport::new(
            vec![record("a.jpg", 10.0), record("b.jpg", 30.0)],
            vec![FailureRecord::new("c.jpg", &CoverageError::DegenerateFrame)],
            Vec::new(),
        );
        let stats = report.stats.as_ref().unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.average, 20.0);
        assert_eq!(report.failure_count, 1);
        assert_eq!(report.failures[0].kind, "degenerate_frame");
    }

    #[test]
    fn json_layout_keeps_the_published_keys() {
        let report = BatchReport::new(vec![record("a.jpg", 12.5)], Vec::new(), Vec::new());
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["stats"]["count"], 1);
        assert_eq!(value["stats"]["std_dev"], 0.0);
        assert_eq!(value["processed_images"][0]["image_filename"], "a.jpg");
        assert_eq!(value["processed_images"][0]["coverage"], 12.5);
        assert_eq!(value["failure_count"], 0);
    }

    #[test]
    fn written_report_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(RESULTS_FILE_NAME);
        let report = BatchReport::new(
            vec![record("a.jpg", 40.0)],
            vec![FailureRecord::new("b.jpg", &CoverageError::DegenerateArea)],
            vec!["c.jpg".to_string()],
        );

        report.write_json(&path).unwrap();

        assert_eq!(BatchReport::read_json(&path).unwrap(), report);
    }
}
