//! Metric names used in score reports

use shared_types::FailPhase;

pub const METRIC_REQUEST_COUNT: &str = "request_count";
pub const METRIC_REQUEST_COUNT_PARSED: &str = "request_count_parsed";
pub const METRIC_REQUEST_COUNT_VIOLATED: &str = "request_count_violated";
pub const METRIC_REQUEST_SUCCESS: &str = "request_success";

pub const METRIC_ABORTED: &str = "aborted";
pub const METRIC_SUCCESS: &str = "success";
pub const METRIC_LOSE: &str = "lose";

/// Headline score used for leaderboards
pub const BENCH_SCORE: &str = "main_score";

pub const METRIC_GOAL_SCORE: &str = "goal_score";
pub const METRIC_TURN_LIMIT_LOSS: &str = "turn_limit_loss";
pub const METRIC_TURNS_OVER_PAR: &str = "turns_over_par";
pub const METRIC_TURN_RATIO: &str = "turn_ratio";
pub const METRIC_ACHIEVED_GOAL_RATIO: &str = "achieved_goal_ratio";
pub const METRIC_GOAL_RATING: &str = "goal_rating";

/// Column name for failures in the given interpreter phase.
pub fn fail_phase_metric(phase: FailPhase) -> &'static str {
    match phase {
        FailPhase::Parsing => "action_parsing_fail",
        FailPhase::Resolution => "action_resolution_fail",
    }
}
