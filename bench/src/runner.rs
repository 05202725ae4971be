//! Episode runner
//!
//! Plays independent episodes concurrently, bounded by
//! `max_concurrent_episodes`, and scores each finished log. Every episode
//! owns its game master, interpreter and conversation; nothing is shared
//! between tasks except the interpreter factory.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use shared_types::{EpisodeOutcome, GameInstance, InteractionLog};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::adventure::AdventureGame;
use crate::config::BenchConfig;
use crate::harness::{GameError, GameMaster};
use crate::interpreter::InterpreterFactory;
use crate::player::Player;
use crate::scorer::{compute_scores, EpisodeScores, ScoreError};

/// One instance to be played by one player
#[derive(Debug, Clone)]
pub struct EpisodeJob {
    pub instance: GameInstance,
    pub player: Player,
}

#[derive(Debug, Clone)]
pub struct EpisodeReport {
    pub episode_id: String,
    pub game_id: Option<u64>,
    pub model: String,
    pub outcome: EpisodeOutcome,
    pub log: InteractionLog,
    pub scores: Result<EpisodeScores, ScoreError>,
}

/// Play and score a single episode.
pub async fn run_episode(
    job: EpisodeJob,
    factory: &dyn InterpreterFactory,
    config: &BenchConfig,
) -> Result<EpisodeReport, GameError> {
    let EpisodeJob { instance, player } = job;
    let model = player.model_name().to_string();

    let game_master = GameMaster::<AdventureGame>::setup(&instance, player, factory, config)?;
    let record = game_master.run_episode().await?;

    let scores = compute_scores(&record.log);
    if let Err(e) = &scores {
        warn!(episode_id = %record.episode_id, error = %e, "Episode could not be scored");
    }

    Ok(EpisodeReport {
        episode_id: record.episode_id,
        game_id: instance.game_id,
        model,
        outcome: record.outcome,
        log: record.log,
        scores,
    })
}

/// Play all jobs, returning one result per job in submission order.
pub async fn run_episodes(
    jobs: Vec<EpisodeJob>,
    factory: Arc<dyn InterpreterFactory>,
    config: BenchConfig,
) -> Vec<Result<EpisodeReport, GameError>> {
    let config = Arc::new(config);
    let semaphore = Arc::new(Semaphore::new(config.max_concurrent_episodes));
    let mut join_set = JoinSet::new();
    let mut results: Vec<Option<Result<EpisodeReport, GameError>>> =
        (0..jobs.len()).map(|_| None).collect();

    info!(
        episodes = jobs.len(),
        max_concurrent = config.max_concurrent_episodes,
        "Running episodes"
    );

    for (index, job) in jobs.into_iter().enumerate() {
        let permit = match semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                results[index] = Some(Err(GameError::Task(e.to_string())));
                continue;
            }
        };
        let factory = factory.clone();
        let config = config.clone();

        join_set.spawn(async move {
            let _permit = permit;
            let played = AssertUnwindSafe(run_episode(job, factory.as_ref(), &config))
                .catch_unwind()
                .await;
            let result = played.unwrap_or_else(|panic| {
                let message = panic_message(panic.as_ref());
                error!(index, error = %message, "Episode task panicked");
                Err(GameError::Task(message))
            });
            (index, result)
        });
    }

    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((index, result)) => results[index] = Some(result),
            Err(e) => error!(error = %e, "Episode task failed"),
        }
    }

    results
        .into_iter()
        .map(|slot| {
            slot.unwrap_or_else(|| Err(GameError::Task("episode task did not report".to_string())))
        })
        .collect()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("episode panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("episode panicked: {message}")
    } else {
        "episode panicked".to_string()
    }
}
