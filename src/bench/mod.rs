//! Benchmark engine for chat-completion endpoints.
//!
//! This module provides:
//! - The embedded, validated test catalog
//! - A sequential, cancellable runner with a typed progress-event stream
//! - Result aggregation into immutable run summaries
//! - Reference data loading, leaderboard ranking and scorecard rendering
//! - A mock chat-completion server for demos and tests

pub mod aggregator;
pub mod catalog;
pub mod config;
pub mod events;
pub mod leaderboard;
pub mod mock_server;
pub mod reference;
pub mod runner;
pub mod scorecard;

pub use aggregator::{Grade, LatencyStats, ResultAggregator, RunSummary, TestResult, TestStatus};
pub use catalog::{Catalog, Category, TestCase};
pub use config::{MockServerConfig, RunConfig};
pub use events::{CancelToken, ProgressEvent};
pub use leaderboard::LeaderboardRow;
pub use mock_server::MockChatServer;
pub use reference::{ReferenceEntry, ReferenceRegistry};
pub use runner::{BenchmarkRunner, RunHandle, RunState};
