//! Static reference latencies used as comparison baselines.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name searched for when no explicit reference path is configured
pub const REFERENCE_FILE_NAME: &str = "benchmarks.json";

/// A named, community-sourced average latency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    pub name: String,
    pub avg_seconds: f64,
}

/// Loose shape used while reading, so one bad entry does not sink the file
#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    avg_seconds: Option<f64>,
}

/// Read-only list of reference entries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceRegistry {
    entries: Vec<ReferenceEntry>,
}

impl ReferenceRegistry {
    pub fn new(entries: Vec<ReferenceEntry>) -> Self {
        Self { entries }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Load from a file. Absence or corruption yields an empty registry.
    pub fn load(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Reference file unavailable, leaderboard will have no reference rows"
                );
                return Self::empty();
            }
        };

        let registry = Self::parse(&raw);
        tracing::info!(
            path = %path.display(),
            entries = registry.len(),
            "Loaded reference benchmarks"
        );
        registry
    }

    /// Load from the first existing candidate, or an empty registry if none exists.
    pub fn load_first(candidates: &[PathBuf]) -> Self {
        match candidates.iter().find(|p| p.is_file()) {
            Some(path) => Self::load(path),
            None => {
                tracing::warn!(
                    searched = ?candidates,
                    "No reference file found, leaderboard will have no reference rows"
                );
                Self::empty()
            }
        }
    }

    /// Parse a JSON array of `{name, avg_seconds}`. Invalid entries are skipped.
    pub fn parse(raw: &str) -> Self {
        let raw_entries: Vec<RawEntry> = match serde_json::from_str(raw) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(error = %e, "Reference data is malformed, ignoring it");
                return Self::empty();
            }
        };

        let entries = raw_entries
            .into_iter()
            .enumerate()
            .filter_map(|(index, entry)| match (entry.name, entry.avg_seconds) {
                (Some(name), Some(avg)) if !name.trim().is_empty() && avg.is_finite() && avg > 0.0 => {
                    Some(ReferenceEntry {
                        name,
                        avg_seconds: avg,
                    })
                }
                _ => {
                    tracing::warn!(index, "Skipping invalid reference entry");
                    None
                }
            })
            .collect();

        Self { entries }
    }

    pub fn entries(&self) -> &[ReferenceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Expand tilde (~) in file paths to user's home directory
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Places searched for the reference file, most specific first.
///
/// An explicit path is the only candidate when given.
pub fn candidate_paths(explicit: Option<&str>) -> Vec<PathBuf> {
    if let Some(path) = explicit {
        return vec![expand_tilde(path)];
    }

    let mut candidates = vec![PathBuf::from(REFERENCE_FILE_NAME)];
    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        candidates.push(dir.join(REFERENCE_FILE_NAME));
    }
    if let Some(config_dir) = dirs::config_dir() {
        candidates.push(config_dir.join("moth-bench").join(REFERENCE_FILE_NAME));
    }
    candidates
}
