//! Accumulates per-test results into a run summary with running statistics.

use chrono::{DateTime, Utc};
use hdrhistogram::Histogram;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::catalog::Category;

/// Highest latency the histogram tracks precisely: one hour, in microseconds
const HISTOGRAM_MAX_US: u64 = 3_600_000_000;

/// Outcome class of a single test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TestStatus {
    Success,
    Timeout,
    Error,
}

impl std::fmt::Display for TestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TestStatus::Success => "Success",
            TestStatus::Timeout => "Timeout",
            TestStatus::Error => "Error",
        };
        f.pad(label)
    }
}

/// Result of one executed test case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub test_id: u32,
    pub category: Category,
    pub name: String,
    pub status: TestStatus,
    pub latency_seconds: f64,
    pub response_excerpt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Letter grade derived from mean latency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    S,
    A,
    B,
    C,
}

impl Grade {
    /// `< 5s` S, `< 10s` A, `< 18s` B, anything slower C
    pub fn from_mean_latency(seconds: f64) -> Self {
        if seconds < 5.0 {
            Grade::S
        } else if seconds < 10.0 {
            Grade::A
        } else if seconds < 18.0 {
            Grade::B
        } else {
            Grade::C
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Grade::S => "S",
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
        };
        f.pad(label)
    }
}

/// Distribution of successful latencies, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub min_seconds: f64,
    pub max_seconds: f64,
    pub p50_seconds: f64,
    pub p95_seconds: f64,
}

/// Immutable snapshot of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub endpoint_url: String,
    pub model: String,
    /// Size of the catalog the run was driven from
    pub total_tests: usize,
    pub results: Vec<TestResult>,
    pub success_count: usize,
    pub failure_count: usize,
    /// Mean over `Success` results only; `None` when nothing succeeded
    pub mean_latency_seconds: Option<f64>,
    pub latency_stats: Option<LatencyStats>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub cancelled: bool,
}

impl RunSummary {
    pub fn completed(&self) -> usize {
        self.results.len()
    }

    pub fn grade(&self) -> Option<Grade> {
        self.mean_latency_seconds.map(Grade::from_mean_latency)
    }

    pub fn is_finalized(&self) -> bool {
        self.finished_at.is_some()
    }

    pub fn duration_seconds(&self) -> Option<f64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds() as f64 / 1000.0)
    }
}

/// Append-only accumulator for one run
pub struct ResultAggregator {
    summary: RunSummary,
    mean: f64,
    min: f64,
    max: f64,
    /// Built on the first success; stays `None` if the bounds are ever rejected
    histogram: Option<Histogram<u64>>,
}

impl ResultAggregator {
    pub fn new(run_id: Uuid, endpoint_url: &str, model: &str, total_tests: usize) -> Self {
        Self {
            summary: RunSummary {
                run_id,
                endpoint_url: endpoint_url.to_string(),
                model: model.to_string(),
                total_tests,
                results: Vec::with_capacity(total_tests),
                success_count: 0,
                failure_count: 0,
                mean_latency_seconds: None,
                latency_stats: None,
                started_at: Utc::now(),
                finished_at: None,
                cancelled: false,
            },
            mean: 0.0,
            min: f64::INFINITY,
            max: 0.0,
            histogram: None,
        }
    }

    fn histogram(&mut self) -> Option<&mut Histogram<u64>> {
        if self.histogram.is_none() {
            match Histogram::new_with_bounds(1, HISTOGRAM_MAX_US, 3) {
                Ok(histogram) => self.histogram = Some(histogram),
                Err(e) => tracing::warn!(
                    error = %e,
                    "Latency histogram unavailable, percentiles fall back to the mean"
                ),
            }
        }
        self.histogram.as_mut()
    }

    /// Append a result and update the running statistics.
    pub fn record(&mut self, result: TestResult) {
        if result.status == TestStatus::Success {
            self.summary.success_count += 1;

            let n = self.summary.success_count as f64;
            let latency = result.latency_seconds;
            self.mean += (latency - self.mean) / n;
            self.min = self.min.min(latency);
            self.max = self.max.max(latency);

            let latency_us = (latency * 1_000_000.0).round() as u64;
            let mean = self.mean;
            let (p50_seconds, p95_seconds) = match self.histogram() {
                Some(histogram) => {
                    histogram.saturating_record(latency_us.max(1));
                    (
                        histogram.value_at_quantile(0.50) as f64 / 1_000_000.0,
                        histogram.value_at_quantile(0.95) as f64 / 1_000_000.0,
                    )
                }
                None => (mean, mean),
            };

            self.summary.mean_latency_seconds = Some(self.mean);
            self.summary.latency_stats = Some(LatencyStats {
                min_seconds: self.min,
                max_seconds: self.max,
                p50_seconds,
                p95_seconds,
            });
        } else {
            self.summary.failure_count += 1;
        }

        self.summary.results.push(result);
    }

    /// Copy of the current state; later `record` calls do not affect it.
    pub fn summary(&self) -> RunSummary {
        self.summary.clone()
    }

    /// Stamp the end of the run and return the final summary.
    pub fn finalize(mut self, cancelled: bool) -> RunSummary {
        self.summary.finished_at = Some(Utc::now());
        self.summary.cancelled = cancelled;
        self.summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn result(id: u32, status: TestStatus, latency: f64) -> TestResult {
        TestResult {
            test_id: id,
            category: Category::Math,
            name: format!("Test {}", id),
            status,
            latency_seconds: latency,
            response_excerpt: String::new(),
            error_message: None,
        }
    }

    fn aggregator() -> ResultAggregator {
        ResultAggregator::new(Uuid::new_v4(), "http://localhost/v1", "m", 43)
    }

    #[test]
    fn test_counts_and_mean_over_successes_only() {
        let mut agg = aggregator();
        agg.record(result(1, TestStatus::Success, 1.0));
        agg.record(result(2, TestStatus::Error, 0.01));
        agg.record(result(3, TestStatus::Success, 3.0));
        agg.record(result(4, TestStatus::Timeout, 45.0));

        let summary = agg.summary();
        assert_eq!(summary.results.len(), 4);
        assert_eq!(summary.success_count, 2);
        assert_eq!(summary.failure_count, 2);
        assert!((summary.mean_latency_seconds.unwrap() - 2.0).abs() < 1e-9);

        let stats = summary.latency_stats.unwrap();
        assert_eq!(stats.min_seconds, 1.0);
        assert_eq!(stats.max_seconds, 3.0);
    }

    #[test]
    fn test_mean_undefined_without_successes() {
        let mut agg = aggregator();
        agg.record(result(1, TestStatus::Error, 0.2));
        agg.record(result(2, TestStatus::Timeout, 45.0));

        let summary = agg.summary();
        assert_eq!(summary.success_count, 0);
        assert_eq!(summary.failure_count, 2);
        assert!(summary.mean_latency_seconds.is_none());
        assert!(summary.latency_stats.is_none());
        assert!(summary.grade().is_none());
    }

    #[test]
    fn test_summary_is_a_snapshot() {
        let mut agg = aggregator();
        agg.record(result(1, TestStatus::Success, 1.0));
        let before = agg.summary();

        agg.record(result(2, TestStatus::Success, 2.0));
        assert_eq!(before.results.len(), 1);
        assert_eq!(agg.summary().results.len(), 2);
    }

    #[test]
    fn test_finalize_stamps_end_and_flag() {
        let mut agg = aggregator();
        agg.record(result(1, TestStatus::Success, 1.0));
        assert!(!agg.summary().is_finalized());

        let summary = agg.finalize(true);
        assert!(summary.is_finalized());
        assert!(summary.cancelled);
        assert!(summary.finished_at.unwrap() >= summary.started_at);
        assert!(summary.duration_seconds().unwrap() >= 0.0);
    }

    #[test]
    fn test_percentiles_are_close() {
        let mut agg = aggregator();
        for i in 1..=20 {
            agg.record(result(i, TestStatus::Success, i as f64 * 0.1));
        }
        let stats = agg.summary().latency_stats.unwrap();
        assert!((stats.p50_seconds - 1.0).abs() < 0.01);
        assert!((stats.p95_seconds - 1.9).abs() < 0.01);
    }

    #[test]
    fn test_histogram_built_on_first_success() {
        let mut agg = aggregator();
        assert!(agg.histogram.is_none());

        agg.record(result(1, TestStatus::Timeout, 45.0));
        assert!(agg.histogram.is_none());
        assert!(agg.summary().latency_stats.is_none());

        agg.record(result(2, TestStatus::Success, 0.25));
        assert!(agg.histogram.is_some());
        let stats = agg.summary().latency_stats.unwrap();
        assert!((stats.p50_seconds - 0.25).abs() < 0.001);
        assert!((stats.p95_seconds - 0.25).abs() < 0.001);
    }

    #[test]
    fn test_grade_thresholds() {
        assert_eq!(Grade::from_mean_latency(0.5), Grade::S);
        assert_eq!(Grade::from_mean_latency(4.99), Grade::S);
        assert_eq!(Grade::from_mean_latency(5.0), Grade::A);
        assert_eq!(Grade::from_mean_latency(9.99), Grade::A);
        assert_eq!(Grade::from_mean_latency(10.0), Grade::B);
        assert_eq!(Grade::from_mean_latency(18.0), Grade::C);
    }

    proptest! {
        #[test]
        fn prop_running_mean_matches_arithmetic_mean(
            samples in prop::collection::vec((any::<bool>(), 0.001f64..120.0), 1..43)
        ) {
            let mut agg = aggregator();
            for (i, (ok, latency)) in samples.iter().enumerate() {
                let status = if *ok { TestStatus::Success } else { TestStatus::Error };
                agg.record(result(i as u32 + 1, status, *latency));
            }

            let summary = agg.summary();
            let successes: Vec<f64> = samples.iter().filter(|(ok, _)| *ok).map(|(_, l)| *l).collect();

            prop_assert_eq!(summary.results.len(), summary.success_count + summary.failure_count);
            prop_assert_eq!(summary.success_count, successes.len());
            match summary.mean_latency_seconds {
                Some(mean) => {
                    let expected = successes.iter().sum::<f64>() / successes.len() as f64;
                    prop_assert!((mean - expected).abs() < 1e-6);
                }
                None => prop_assert!(successes.is_empty()),
            }
        }
    }
}
