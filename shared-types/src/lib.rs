//! Shared types for the adventure benchmark
//!
//! These types are used by both:
//! - the game master, which appends typed events while an episode is played
//! - the scorer, which reads a finished interaction log after play
//!
//! Serializable with serde so interaction logs can be persisted and re-scored.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoStaticStr};

/// Set of opaque goal-state identifiers.
pub type GoalState = BTreeSet<String>;

/// Descriptor used for the game master in interaction logs.
pub const GM_DESCRIPTOR: &str = "GM";

// ============================================================================
// Episode Configuration
// ============================================================================

/// Interaction mode of an adventure episode
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GameVariant {
    /// Player answers with a single command
    #[default]
    Basic,
    /// Player answers with a command followed by a plan section
    Plan,
}

/// Raw game instance as stored in instance files.
///
/// Every field is optional so that a missing key surfaces as a
/// [`ConfigError`] from [`EpisodeConfig::try_from`] instead of a parse error.
/// Keys the game master does not know about are kept in `world` for the
/// world interpreter.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GameInstance {
    pub game_id: Option<u64>,
    pub variant: Option<GameVariant>,
    pub prompt: Option<String>,
    pub goal_state: Option<Vec<String>>,
    pub max_turns: Option<u32>,
    pub optimal_turns: Option<u32>,
    #[serde(flatten)]
    pub world: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required instance field: {0}")]
    MissingField(&'static str),
    #[error("goal state must name at least one goal")]
    EmptyGoalState,
    #[error("turn budget must be at least one turn")]
    ZeroTurnBudget,
    #[error("max_turns ({max_turns}) must exceed optimal_turns ({optimal_turns})")]
    TurnRangeEmpty { max_turns: u32, optimal_turns: u32 },
}

/// Immutable, validated configuration of one episode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeConfig {
    pub game_id: Option<u64>,
    pub variant: GameVariant,
    pub prompt: String,
    pub goal_state: GoalState,
    pub max_turns: u32,
    pub optimal_turns: u32,
}

impl EpisodeConfig {
    pub fn goal_count(&self) -> usize {
        self.goal_state.len()
    }

    /// Metadata snapshot the scorer needs to interpret the log.
    pub fn info(&self) -> AdventureInfo {
        AdventureInfo {
            variant: self.variant,
            max_turns: self.max_turns,
            optimal_turns: self.optimal_turns,
            goal_count: self.goal_count(),
        }
    }
}

impl TryFrom<&GameInstance> for EpisodeConfig {
    type Error = ConfigError;

    fn try_from(instance: &GameInstance) -> Result<Self, Self::Error> {
        let variant = instance
            .variant
            .ok_or(ConfigError::MissingField("variant"))?;
        let prompt = instance
            .prompt
            .clone()
            .ok_or(ConfigError::MissingField("prompt"))?;
        let goal_state: GoalState = instance
            .goal_state
            .as_ref()
            .ok_or(ConfigError::MissingField("goal_state"))?
            .iter()
            .cloned()
            .collect();
        let max_turns = instance
            .max_turns
            .ok_or(ConfigError::MissingField("max_turns"))?;
        let optimal_turns = instance
            .optimal_turns
            .ok_or(ConfigError::MissingField("optimal_turns"))?;

        if goal_state.is_empty() {
            return Err(ConfigError::EmptyGoalState);
        }
        if max_turns == 0 {
            return Err(ConfigError::ZeroTurnBudget);
        }
        if max_turns <= optimal_turns {
            return Err(ConfigError::TurnRangeEmpty {
                max_turns,
                optimal_turns,
            });
        }

        Ok(Self {
            game_id: instance.game_id,
            variant,
            prompt,
            goal_state,
            max_turns,
            optimal_turns,
        })
    }
}

// ============================================================================
// Failure Taxonomy
// ============================================================================

/// Structural non-compliance of a raw player response
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FormatViolation {
    /// Response does not start with the command tag
    CommandTagMissing,
    /// Plan variant response lacks the plan section
    NextActionsMissing,
}

impl FormatViolation {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// Interpreter phase in which a command failed
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailPhase {
    Parsing,
    Resolution,
}

impl FailPhase {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// Semantic kind of an interpreter failure
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailType {
    /// Command grammar rejected the input outright
    #[serde(alias = "lark_exception")]
    ParserException,
    UndefinedActionVerb,
    UndefinedAction,
    UndefinedReprStr,
    UndefinedType,
    NotRoomType,
    NoExitTo,
    MultipleExitsTo,
    EntityNotAccessible,
    MultipleEntityAmbiguity,
    PreStateMismatch,
}

impl FailType {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// Failure reported by the world interpreter for a single command
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionFailure {
    pub phase: FailPhase,
    pub fail_type: FailType,
}

// ============================================================================
// Event Payloads
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdventureInfo {
    pub variant: GameVariant,
    pub max_turns: u32,
    pub optimal_turns: u32,
    pub goal_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GoalStatus {
    pub goal_states_achieved: Vec<String>,
    /// Change in achieved goal count this turn; negative only for inconsistent
    /// interpreter reports.
    pub turn_goal_score: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameResult {
    pub goal_states_achieved: Vec<String>,
    pub game_successfully_finished: bool,
}

/// Terminal state of an episode
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeOutcome {
    /// All required goals achieved
    Finished,
    /// First malformed response ended the episode
    Aborted(FormatViolation),
    /// Turn budget used up before the goals were achieved
    TurnLimitReached,
}

impl EpisodeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Finished)
    }
}

// ============================================================================
// Interaction Log
// ============================================================================

/// Event types
pub const EVENT_ADVENTURE_INFO: &str = "adventure_info";
pub const EVENT_SEND_MESSAGE: &str = "send_message";
pub const EVENT_GET_MESSAGE: &str = "get_message";
pub const EVENT_PARSE: &str = "parse";
pub const EVENT_PLAN: &str = "plan";
pub const EVENT_INVALID_FORMAT: &str = "invalid_format";
pub const EVENT_ACTION_FAIL: &str = "action_fail";
pub const EVENT_GOAL_STATUS: &str = "goal_status";
pub const EVENT_ADVENTURE_FINISHED: &str = "adventure_finished";
pub const EVENT_TURN_LIMIT_REACHED: &str = "turn_limit_reached";
pub const EVENT_GAME_RESULT: &str = "game_result";

/// Typed event, serialized as `{"type": ..., "content": ...}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, IntoStaticStr)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GameEvent {
    AdventureInfo(AdventureInfo),
    /// Message sent to a player
    SendMessage(String),
    /// Raw player response
    GetMessage(String),
    /// Player response after the parse hook
    Parse(String),
    /// Plan section extracted from a plan variant response
    Plan(String),
    InvalidFormat(FormatViolation),
    ActionFail(ActionFailure),
    GoalStatus(GoalStatus),
    AdventureFinished(Vec<String>),
    TurnLimitReached(u32),
    GameResult(GameResult),
}

impl GameEvent {
    /// The `type` tag this event serializes with.
    pub fn kind(&self) -> &'static str {
        self.into()
    }
}

/// Single log entry - who sent what to whom, and when
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogEvent {
    pub from: String,
    pub to: String,
    pub timestamp: DateTime<Utc>,
    pub action: GameEvent,
}

impl LogEvent {
    pub fn new(from: impl Into<String>, to: impl Into<String>, action: GameEvent) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            timestamp: Utc::now(),
            action,
        }
    }
}

/// Events of one turn, in emission order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TurnRecord {
    pub turn_index: usize,
    pub events: Vec<LogEvent>,
}

/// Append-only, turn-indexed record of an episode
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InteractionLog {
    pub episode_id: String,
    /// Participant descriptor -> model or game name
    pub players: BTreeMap<String, String>,
    pub turns: Vec<TurnRecord>,
}

impl InteractionLog {
    pub fn new(episode_id: impl Into<String>) -> Self {
        Self {
            episode_id: episode_id.into(),
            players: BTreeMap::new(),
            turns: Vec::new(),
        }
    }

    /// Open the next turn and return its index.
    pub fn begin_turn(&mut self) -> usize {
        let turn_index = self.turns.len();
        self.turns.push(TurnRecord {
            turn_index,
            events: Vec::new(),
        });
        turn_index
    }

    pub fn current_turn_index(&self) -> Option<usize> {
        self.turns.last().map(|turn| turn.turn_index)
    }

    /// Append to the open turn, opening the first one if needed.
    pub fn record(&mut self, event: LogEvent) {
        if self.turns.is_empty() {
            self.begin_turn();
        }
        if let Some(turn) = self.turns.last_mut() {
            turn.events.push(event);
        }
    }

    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }

    /// All events with the index of the turn they belong to.
    pub fn events(&self) -> impl Iterator<Item = (usize, &LogEvent)> {
        self.turns
            .iter()
            .flat_map(|turn| turn.events.iter().map(move |event| (turn.turn_index, event)))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    fn instance() -> GameInstance {
        GameInstance {
            game_id: Some(3),
            variant: Some(GameVariant::Basic),
            prompt: Some("You are in a house.\n".to_string()),
            goal_state: Some(vec!["on(book1,table1)".to_string()]),
            max_turns: Some(10),
            optimal_turns: Some(4),
            world: serde_json::Map::new(),
        }
    }

    #[test]
    fn test_episode_config_from_instance() {
        let config = EpisodeConfig::try_from(&instance()).unwrap();
        assert_eq!(config.goal_count(), 1);
        assert_eq!(config.info().max_turns, 10);
        assert_eq!(config.info().optimal_turns, 4);
    }

    #[test]
    fn test_episode_config_missing_field() {
        let mut raw = instance();
        raw.goal_state = None;
        assert_eq!(
            EpisodeConfig::try_from(&raw),
            Err(ConfigError::MissingField("goal_state"))
        );

        let mut raw = instance();
        raw.variant = None;
        assert_eq!(
            EpisodeConfig::try_from(&raw),
            Err(ConfigError::MissingField("variant"))
        );
    }

    #[test]
    fn test_episode_config_rejects_empty_turn_range() {
        let mut raw = instance();
        raw.optimal_turns = Some(10);
        assert_eq!(
            EpisodeConfig::try_from(&raw),
            Err(ConfigError::TurnRangeEmpty {
                max_turns: 10,
                optimal_turns: 10
            })
        );
    }

    #[test]
    fn test_game_instance_keeps_world_data() {
        let raw: GameInstance = serde_json::from_value(serde_json::json!({
            "game_id": 0,
            "variant": "plan",
            "prompt": "Go.",
            "goal_state": ["in(apple1,kitchen1)"],
            "max_turns": 12,
            "optimal_turns": 5,
            "initial_state": ["at(kitchen1)"]
        }))
        .unwrap();
        assert_eq!(raw.variant, Some(GameVariant::Plan));
        assert!(raw.world.contains_key("initial_state"));
    }

    #[test]
    fn test_event_serialization_shape() {
        let event = GameEvent::ActionFail(ActionFailure {
            phase: FailPhase::Resolution,
            fail_type: FailType::EntityNotAccessible,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "action_fail");
        assert_eq!(json["content"]["phase"], "resolution");
        assert_eq!(json["content"]["fail_type"], "entity_not_accessible");
    }

    #[test]
    fn test_event_kind_matches_serde_tag() {
        let info = AdventureInfo {
            variant: GameVariant::Plan,
            max_turns: 10,
            optimal_turns: 4,
            goal_count: 2,
        };
        let cases = vec![
            (GameEvent::AdventureInfo(info), EVENT_ADVENTURE_INFO),
            (GameEvent::SendMessage("hi".to_string()), EVENT_SEND_MESSAGE),
            (GameEvent::GetMessage("> look".to_string()), EVENT_GET_MESSAGE),
            (GameEvent::Parse("> look".to_string()), EVENT_PARSE),
            (GameEvent::Plan(" go north".to_string()), EVENT_PLAN),
            (
                GameEvent::InvalidFormat(FormatViolation::CommandTagMissing),
                EVENT_INVALID_FORMAT,
            ),
            (
                GameEvent::ActionFail(ActionFailure {
                    phase: FailPhase::Parsing,
                    fail_type: FailType::UndefinedActionVerb,
                }),
                EVENT_ACTION_FAIL,
            ),
            (
                GameEvent::GoalStatus(GoalStatus {
                    goal_states_achieved: vec![],
                    turn_goal_score: 0,
                }),
                EVENT_GOAL_STATUS,
            ),
            (GameEvent::AdventureFinished(vec![]), EVENT_ADVENTURE_FINISHED),
            (GameEvent::TurnLimitReached(10), EVENT_TURN_LIMIT_REACHED),
            (
                GameEvent::GameResult(GameResult {
                    goal_states_achieved: vec![],
                    game_successfully_finished: false,
                }),
                EVENT_GAME_RESULT,
            ),
        ];
        for (event, expected) in cases {
            assert_eq!(event.kind(), expected);
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["type"], expected);
        }
    }

    #[test]
    fn test_fail_type_accepts_legacy_parser_name() {
        let fail: ActionFailure = serde_json::from_str(
            r#"{"phase": "parsing", "fail_type": "lark_exception"}"#,
        )
        .unwrap();
        assert_eq!(fail.fail_type, FailType::ParserException);
    }

    #[test]
    fn test_taxonomy_names_match_serde() {
        for fail_type in FailType::iter() {
            let json = serde_json::to_value(fail_type).unwrap();
            assert_eq!(json, fail_type.as_str());
        }
        assert_eq!(FailType::iter().count(), 11);
        assert_eq!(FailPhase::iter().count(), 2);
    }

    #[test]
    fn test_interaction_log_turns() {
        let mut log = InteractionLog::new("ep_1");
        log.record(LogEvent::new(
            GM_DESCRIPTOR,
            GM_DESCRIPTOR,
            GameEvent::TurnLimitReached(3),
        ));
        assert_eq!(log.current_turn_index(), Some(0));
        assert_eq!(log.begin_turn(), 1);
        log.record(LogEvent::new(
            GM_DESCRIPTOR,
            "Player 1",
            GameEvent::SendMessage("hi".to_string()),
        ));
        let indices: Vec<usize> = log.events().map(|(idx, _)| idx).collect();
        assert_eq!(indices, vec![0, 1]);

        let json = serde_json::to_string(&log).unwrap();
        let back: InteractionLog = serde_json::from_str(&json).unwrap();
        assert_eq!(back, log);
    }
}
