use std::path::PathBuf;

use adventure_bench::report::{load_interaction_log, scores_path_for, write_scores};
use adventure_bench::scorer::compute_scores;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::env::var("ADVENTURE_LOG_FORMAT").is_ok_and(|format| format == "json") {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let paths: Vec<PathBuf> = std::env::args().skip(1).map(PathBuf::from).collect();
    if paths.is_empty() {
        anyhow::bail!("usage: adventure-bench <interactions.json>...");
    }

    let mut failed = 0usize;
    for path in &paths {
        let log = match load_interaction_log(path) {
            Ok(log) => log,
            Err(e) => {
                tracing::error!(error = %format!("{e:#}"), "Skipping interaction log");
                failed += 1;
                continue;
            }
        };

        match compute_scores(&log) {
            Ok(scores) => {
                let out = scores_path_for(path);
                write_scores(&out, &scores)?;
                tracing::info!(
                    episode_id = %log.episode_id,
                    outcome = ?scores.outcome,
                    main_score = ?scores.main_score,
                    path = %out.display(),
                    "Scored episode"
                );
            }
            Err(e) => {
                tracing::error!(
                    episode_id = %log.episode_id,
                    path = %path.display(),
                    error = %e,
                    "Failed to score episode"
                );
                failed += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} interaction logs could not be scored", paths.len());
    }
    Ok(())
}
