//! Episode scorer
//!
//! Pure reduction of a finished [`InteractionLog`] into per-turn and
//! per-episode metrics. The scorer never trusts a single flag for the
//! episode outcome: it re-derives it from the terminal events in the log.
//!
//! Metrics that only make sense for successfully finished episodes
//! (`turns_over_par`, `turn_ratio`, `main_score`) are `None` otherwise and
//! serialize as `null`.

pub mod metrics;

use std::collections::BTreeMap;

use serde::Serialize;
use shared_types::{
    ActionFailure, AdventureInfo, EpisodeOutcome, FailPhase, FailType, FormatViolation,
    GameEvent, GameResult, InteractionLog,
};
use strum::IntoEnumIterator;
use tracing::warn;

use metrics::*;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ScoreError {
    #[error("interaction log has no turns")]
    NoRequests,
    #[error("interaction log has no adventure_info event")]
    MissingEpisodeInfo,
    #[error("interaction log has no game_result event")]
    MissingGameResult,
    #[error("episode info declares zero goals")]
    ZeroGoalCount,
    #[error("max_turns ({max_turns}) leaves no turn range above optimal_turns ({optimal_turns})")]
    TurnRangeEmpty { max_turns: u32, optimal_turns: u32 },
    #[error("interaction log does not record how the episode ended")]
    UndeterminedOutcome,
}

/// Data-consistency problems that do not prevent scoring
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScoreWarning {
    /// Achieved goal count shrank during a turn
    GoalRegression { turn_index: usize, delta: i64 },
    /// `game_result` disagrees with the outcome derived from terminal events
    OutcomeMismatch {
        derived: EpisodeOutcome,
        reported_finished: bool,
    },
    /// More than one interpreter failure reported for a single command
    MultipleFailures { turn_index: usize, count: u32 },
    /// Interpreter events in or after the turn that aborted the episode
    PlayAfterViolation { turn_index: usize },
}

// ============================================================================
// Turn Scores
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnScores {
    pub turn_index: usize,
    /// Always 1: players are never re-prompted
    pub request_count: u32,
    pub parsed_request_count: u32,
    pub violated_request_count: u32,
    /// One-hot over format violation kinds
    pub format_violations: BTreeMap<FormatViolation, u32>,
    /// One-hot over interpreter phases
    pub phase_fails: BTreeMap<FailPhase, u32>,
    /// One-hot over interpreter failure types
    pub type_fails: BTreeMap<FailType, u32>,
    /// Change in achieved goal count; 0 for turns without world interaction
    pub goal_score: i64,
}

impl TurnScores {
    fn new(turn_index: usize) -> Self {
        Self {
            turn_index,
            request_count: 1,
            parsed_request_count: 1,
            violated_request_count: 0,
            format_violations: FormatViolation::iter().map(|v| (v, 0)).collect(),
            phase_fails: FailPhase::iter().map(|p| (p, 0)).collect(),
            type_fails: FailType::iter().map(|t| (t, 0)).collect(),
            goal_score: 0,
        }
    }

    fn mark_violation(&mut self, violation: FormatViolation) {
        self.parsed_request_count = 0;
        self.violated_request_count = 1;
        self.format_violations.insert(violation, 1);
    }

    fn mark_failure(&mut self, failure: &ActionFailure) {
        self.phase_fails.insert(failure.phase, 1);
        self.type_fails.insert(failure.fail_type, 1);
    }

    pub fn metrics(&self) -> BTreeMap<&'static str, f64> {
        let mut row = BTreeMap::new();
        row.insert(METRIC_REQUEST_COUNT, f64::from(self.request_count));
        row.insert(METRIC_REQUEST_COUNT_PARSED, f64::from(self.parsed_request_count));
        row.insert(
            METRIC_REQUEST_COUNT_VIOLATED,
            f64::from(self.violated_request_count),
        );
        for (violation, flag) in &self.format_violations {
            row.insert(violation.as_str(), f64::from(*flag));
        }
        for (phase, flag) in &self.phase_fails {
            row.insert(fail_phase_metric(*phase), f64::from(*flag));
        }
        for (fail_type, flag) in &self.type_fails {
            row.insert(fail_type.as_str(), f64::from(*flag));
        }
        row.insert(METRIC_GOAL_SCORE, self.goal_score as f64);
        row
    }
}

// ============================================================================
// Episode Scores
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodeScores {
    pub outcome: EpisodeOutcome,
    pub turns: Vec<TurnScores>,
    pub request_count: u32,
    pub parsed_request_count: u32,
    pub violated_request_count: u32,
    /// parsed / total requests
    pub request_success: f64,
    pub format_violations: BTreeMap<FormatViolation, u32>,
    pub phase_fails: BTreeMap<FailPhase, u32>,
    pub type_fails: BTreeMap<FailType, u32>,
    pub turn_limit_loss: u32,
    pub turns_over_par: Option<i64>,
    pub turn_ratio: Option<f64>,
    pub achieved_goal_ratio: f64,
    /// Final achieved goals per turn played
    pub goal_rating: f64,
    /// achieved_goal_ratio * turn_ratio
    pub main_score: Option<f64>,
    pub aborted: u32,
    pub success: u32,
    pub lose: u32,
    pub warnings: Vec<ScoreWarning>,
}

impl EpisodeScores {
    /// Flat metric map; not-applicable metrics map to `None`.
    pub fn metrics(&self) -> BTreeMap<&'static str, Option<f64>> {
        let mut scores = BTreeMap::new();
        scores.insert(METRIC_REQUEST_COUNT, Some(f64::from(self.request_count)));
        scores.insert(
            METRIC_REQUEST_COUNT_PARSED,
            Some(f64::from(self.parsed_request_count)),
        );
        scores.insert(
            METRIC_REQUEST_COUNT_VIOLATED,
            Some(f64::from(self.violated_request_count)),
        );
        scores.insert(METRIC_REQUEST_SUCCESS, Some(self.request_success));
        for (violation, count) in &self.format_violations {
            scores.insert(violation.as_str(), Some(f64::from(*count)));
        }
        for (phase, count) in &self.phase_fails {
            scores.insert(fail_phase_metric(*phase), Some(f64::from(*count)));
        }
        for (fail_type, count) in &self.type_fails {
            scores.insert(fail_type.as_str(), Some(f64::from(*count)));
        }
        scores.insert(METRIC_TURN_LIMIT_LOSS, Some(f64::from(self.turn_limit_loss)));
        scores.insert(
            METRIC_TURNS_OVER_PAR,
            self.turns_over_par.map(|over| over as f64),
        );
        scores.insert(METRIC_TURN_RATIO, self.turn_ratio);
        scores.insert(METRIC_ACHIEVED_GOAL_RATIO, Some(self.achieved_goal_ratio));
        scores.insert(METRIC_GOAL_RATING, Some(self.goal_rating));
        scores.insert(BENCH_SCORE, self.main_score);
        scores.insert(METRIC_ABORTED, Some(f64::from(self.aborted)));
        scores.insert(METRIC_SUCCESS, Some(f64::from(self.success)));
        scores.insert(METRIC_LOSE, Some(f64::from(self.lose)));
        scores
    }
}

// ============================================================================
// Scoring
// ============================================================================

/// Score a finished interaction log.
pub fn compute_scores(log: &InteractionLog) -> Result<EpisodeScores, ScoreError> {
    if log.turns.is_empty() {
        return Err(ScoreError::NoRequests);
    }

    let mut info: Option<AdventureInfo> = None;
    let mut game_result: Option<&GameResult> = None;
    let mut first_violation: Option<FormatViolation> = None;
    let mut finished_event = false;
    let mut turn_limit_event = false;
    let mut warnings = Vec::new();
    let mut turns = Vec::with_capacity(log.turns.len());

    for turn in &log.turns {
        let mut row = TurnScores::new(turn.turn_index);
        let aborted_before = first_violation.is_some();
        let mut violated_here = false;
        let mut failures = 0u32;
        let mut interactions = 0u32;
        for event in &turn.events {
            match &event.action {
                GameEvent::AdventureInfo(adventure_info) => info = Some(*adventure_info),
                GameEvent::InvalidFormat(violation) => {
                    row.mark_violation(*violation);
                    violated_here = true;
                    if first_violation.is_none() {
                        first_violation = Some(*violation);
                    }
                }
                GameEvent::ActionFail(failure) => {
                    row.mark_failure(failure);
                    failures += 1;
                    interactions += 1;
                }
                GameEvent::GoalStatus(status) => {
                    interactions += 1;
                    row.goal_score += status.turn_goal_score;
                    if status.turn_goal_score < 0 {
                        warn!(
                            turn = turn.turn_index,
                            delta = status.turn_goal_score,
                            "Goal regression in interaction log"
                        );
                        warnings.push(ScoreWarning::GoalRegression {
                            turn_index: turn.turn_index,
                            delta: status.turn_goal_score,
                        });
                    }
                }
                GameEvent::AdventureFinished(_) => finished_event = true,
                GameEvent::TurnLimitReached(_) => turn_limit_event = true,
                GameEvent::GameResult(result) => game_result = Some(result),
                GameEvent::SendMessage(_)
                | GameEvent::GetMessage(_)
                | GameEvent::Parse(_)
                | GameEvent::Plan(_) => {}
            }
        }

        if failures > 1 {
            warn!(turn = turn.turn_index, failures, "Several failures for one command");
            warnings.push(ScoreWarning::MultipleFailures {
                turn_index: turn.turn_index,
                count: failures,
            });
        }
        // an aborting turn has no interpreter step and nothing follows it
        if aborted_before || (violated_here && interactions > 0) {
            warn!(turn = turn.turn_index, "Play recorded after a format violation");
            warnings.push(ScoreWarning::PlayAfterViolation {
                turn_index: turn.turn_index,
            });
        }
        turns.push(row);
    }

    let info = info.ok_or(ScoreError::MissingEpisodeInfo)?;
    let game_result = game_result.ok_or(ScoreError::MissingGameResult)?;
    if info.goal_count == 0 {
        return Err(ScoreError::ZeroGoalCount);
    }

    let outcome = if let Some(violation) = first_violation {
        EpisodeOutcome::Aborted(violation)
    } else if finished_event {
        EpisodeOutcome::Finished
    } else if turn_limit_event {
        EpisodeOutcome::TurnLimitReached
    } else {
        return Err(ScoreError::UndeterminedOutcome);
    };
    if outcome.is_success() != game_result.game_successfully_finished {
        warn!(
            derived = ?outcome,
            reported_finished = game_result.game_successfully_finished,
            "Game result disagrees with terminal events"
        );
        warnings.push(ScoreWarning::OutcomeMismatch {
            derived: outcome,
            reported_finished: game_result.game_successfully_finished,
        });
    }
    let finished = outcome.is_success();

    let request_count: u32 = turns.iter().map(|t| t.request_count).sum();
    let parsed_request_count: u32 = turns.iter().map(|t| t.parsed_request_count).sum();
    let violated_request_count: u32 = turns.iter().map(|t| t.violated_request_count).sum();
    let request_success = f64::from(parsed_request_count) / f64::from(request_count);

    let format_violations = sum_columns(turns.iter().map(|t| &t.format_violations));
    let phase_fails = sum_columns(turns.iter().map(|t| &t.phase_fails));
    let type_fails = sum_columns(turns.iter().map(|t| &t.type_fails));

    let turn_count = turns.len() as i64;
    let final_goal_count = game_result.goal_states_achieved.len();

    let (turns_over_par, turn_ratio) = if finished {
        let turns_over_par = turn_count - i64::from(info.optimal_turns);
        let turn_range = i64::from(info.max_turns) - i64::from(info.optimal_turns);
        if turn_range <= 0 {
            return Err(ScoreError::TurnRangeEmpty {
                max_turns: info.max_turns,
                optimal_turns: info.optimal_turns,
            });
        }
        let turn_ratio = 1.0 - turns_over_par as f64 / turn_range as f64;
        (Some(turns_over_par), Some(turn_ratio))
    } else {
        (None, None)
    };

    let achieved_goal_ratio = final_goal_count as f64 / info.goal_count as f64;
    let goal_rating = final_goal_count as f64 / turn_count as f64;
    let main_score = turn_ratio.map(|ratio| achieved_goal_ratio * ratio);

    Ok(EpisodeScores {
        outcome,
        request_count,
        parsed_request_count,
        violated_request_count,
        request_success,
        format_violations,
        phase_fails,
        type_fails,
        turn_limit_loss: u32::from(outcome == EpisodeOutcome::TurnLimitReached),
        turns_over_par,
        turn_ratio,
        achieved_goal_ratio,
        goal_rating,
        main_score,
        aborted: u32::from(first_violation.is_some()),
        success: u32::from(finished),
        lose: u32::from(!finished),
        warnings,
        turns,
    })
}

fn sum_columns<'a, K>(rows: impl Iterator<Item = &'a BTreeMap<K, u32>>) -> BTreeMap<K, u32>
where
    K: Ord + Copy + 'a,
{
    let mut totals = BTreeMap::new();
    for row in rows {
        for (key, value) in row {
            *totals.entry(*key).or_insert(0) += value;
        }
    }
    totals
}

// ============================================================================
// Tests
// ============================================================================
