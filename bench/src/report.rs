//! Reading interaction logs and writing score files

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;
use shared_types::InteractionLog;

use crate::scorer::{EpisodeScores, ScoreWarning};

/// File name of the score file written next to an interaction log
pub const SCORES_FILE_NAME: &str = "scores.json";

/// On-disk layout of a score file
#[derive(Debug, Serialize)]
pub struct ScoreReport<'a> {
    pub episode: BTreeMap<&'static str, Option<f64>>,
    pub turns: Vec<BTreeMap<&'static str, f64>>,
    pub warnings: &'a [ScoreWarning],
}

impl<'a> From<&'a EpisodeScores> for ScoreReport<'a> {
    fn from(scores: &'a EpisodeScores) -> Self {
        Self {
            episode: scores.metrics(),
            turns: scores.turns.iter().map(|turn| turn.metrics()).collect(),
            warnings: &scores.warnings,
        }
    }
}

pub fn load_interaction_log(path: &Path) -> anyhow::Result<InteractionLog> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read interaction log {}", path.display()))?;
    let log = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse interaction log {}", path.display()))?;
    Ok(log)
}

pub fn write_interaction_log(path: &Path, log: &InteractionLog) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(log)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write interaction log {}", path.display()))
}

pub fn write_scores(path: &Path, scores: &EpisodeScores) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&ScoreReport::from(scores))?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write scores {}", path.display()))?;
    tracing::debug!(path = %path.display(), "Wrote scores");
    Ok(())
}

/// `scores.json` in the directory holding the interaction log.
pub fn scores_path_for(log_path: &Path) -> PathBuf {
    log_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(SCORES_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scores_path_sits_next_to_log() {
        assert_eq!(
            scores_path_for(Path::new("runs/episode_1/interactions.json")),
            PathBuf::from("runs/episode_1/scores.json")
        );
    }

    #[test]
    fn test_load_missing_file_names_path() {
        let err = load_interaction_log(Path::new("/nonexistent/interactions.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/interactions.json"));
    }
}
