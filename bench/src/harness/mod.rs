//! Dialogue Game Harness - fixed turn driver for single-player text games
//!
//! This module provides the episode loop shared by game variants:
//! - Opening context composed by the game before the first prompt
//! - Blocking prompt/response exchange with one model-backed player
//! - Per-turn validation, parse and post-turn hooks
//! - Typed events appended to an [`InteractionLog`]
//!
//! ## Architecture
//!
//! SETUP -> BEFORE_GAME -> TURN_LOOP -> AFTER_GAME
//!
//! where every TURN_LOOP iteration is
//! PROMPT -> VALIDATE -> PARSE -> AFTER_TURN -> (continue or stop)
//!
//! ## Usage
//!
//! Implement [`GamePort`] for the game, then drive it with
//! [`GameMaster::run_episode`].
//!
//! ```rust,ignore
//! let game_master = GameMaster::new(my_game, player, HarnessConfig::default());
//! let record = game_master.run_episode().await?;
//! ```

use shared_types::{
    ConfigError, EpisodeOutcome, GameEvent, InteractionLog, LogEvent, GM_DESCRIPTOR,
};
use tracing::{debug, info};

use crate::interpreter::InterpreterError;
use crate::player::{BackendError, Conversation, GenerationSettings, Player};

// ============================================================================
// Core Types
// ============================================================================

/// Configuration for the game harness
#[derive(Debug, Clone, PartialEq)]
pub struct HarnessConfig {
    /// Sampling parameters for every player request
    pub generation: GenerationSettings,
    /// Whether prompts and raw responses are written to the log
    pub log_transcript: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            generation: GenerationSettings::default(),
            log_transcript: true,
        }
    }
}

/// Continuation decision evaluated at every turn boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Continue,
    Stop(EpisodeOutcome),
}

impl Progress {
    pub fn is_continue(&self) -> bool {
        matches!(self, Self::Continue)
    }
}

/// Error types for the harness
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Interpreter error: {0}")]
    Interpreter(#[from] InterpreterError),
    #[error(
        "Context window exceeded on turn {turn_index}: {tokens_used} tokens used, {tokens_left} left of {context_size}"
    )]
    ContextExceeded {
        turn_index: usize,
        tokens_used: u64,
        tokens_left: i64,
        context_size: u64,
    },
    #[error("Player {player} failed on turn {turn_index}: {message}")]
    Player {
        player: String,
        turn_index: usize,
        message: String,
    },
    #[error("Episode task failed: {0}")]
    Task(String),
}

impl GameError {
    fn from_backend(error: BackendError, player: &str, turn_index: usize) -> Self {
        match error {
            BackendError::ContextExceeded {
                tokens_used,
                tokens_left,
                context_size,
            } => GameError::ContextExceeded {
                turn_index,
                tokens_used,
                tokens_left,
                context_size,
            },
            BackendError::Generation(message) => GameError::Player {
                player: player.to_string(),
                turn_index,
                message,
            },
        }
    }
}

/// Finished episode: the log, how it ended, and the game state at the end
#[derive(Debug)]
pub struct EpisodeRecord<P> {
    pub episode_id: String,
    pub outcome: EpisodeOutcome,
    pub log: InteractionLog,
    pub game: P,
}

// ============================================================================
// TurnContext
// ============================================================================

/// View of the open turn handed to game hooks
pub struct TurnContext<'a> {
    pub turn_index: usize,
    player: &'a str,
    log: &'a mut InteractionLog,
    conversation: &'a mut Conversation,
    log_transcript: bool,
}

impl<'a> TurnContext<'a> {
    fn new(
        player: &'a str,
        log: &'a mut InteractionLog,
        conversation: &'a mut Conversation,
        log_transcript: bool,
    ) -> Self {
        let turn_index = log.current_turn_index().unwrap_or_default();
        Self {
            turn_index,
            player,
            log,
            conversation,
            log_transcript,
        }
    }

    pub fn player(&self) -> &str {
        self.player
    }

    /// Record an event addressed from the game master to itself.
    pub fn log_event(&mut self, event: GameEvent) {
        self.log
            .record(LogEvent::new(GM_DESCRIPTOR, GM_DESCRIPTOR, event));
    }

    /// Queue a message for the player's next prompt.
    pub fn add_user_message(&mut self, text: impl Into<String>) {
        let text = text.into();
        if self.log_transcript {
            self.log.record(LogEvent::new(
                GM_DESCRIPTOR,
                self.player,
                GameEvent::SendMessage(text.clone()),
            ));
        }
        self.conversation.push_user(text);
    }

    fn push_player_message(&mut self, text: String) {
        self.conversation.push_assistant(text);
    }

    /// Player message of the open turn, after the parse hook.
    pub fn last_player_response(&self) -> Option<&str> {
        self.conversation.last_assistant()
    }
}

// ============================================================================
// GamePort Trait
// ============================================================================

/// Trait for adapting the harness to a specific game
///
/// The game provides one method per hook while the harness owns the loop
/// control flow, the player conversation and the interaction log.
pub trait GamePort: Send {
    /// Name recorded for the game master in the log
    fn game_name(&self) -> &str;

    /// Called once when the game master is created
    fn on_setup(&mut self, _ctx: &mut TurnContext<'_>) {}

    /// Compose the opening context for the player
    fn on_before_game(&mut self, ctx: &mut TurnContext<'_>);

    /// Check a raw response against the game's response grammar
    ///
    /// Returning false does not re-prompt; the game records the violation and
    /// stops at the next continuation check.
    fn validate_response(&mut self, response: &str) -> bool;

    /// Optionally rewrite a valid response
    ///
    /// Returns the (possibly modified) text and whether to log a parse event.
    /// The returned text replaces the raw response in the player history.
    fn on_parse_response(&mut self, _ctx: &mut TurnContext<'_>, response: &str) -> (String, bool) {
        (response.to_string(), true)
    }

    /// Continuation predicate evaluated at every turn boundary
    fn check_progress(&self) -> Progress;

    /// Called after the player responded and the response was processed
    fn on_after_turn(&mut self, ctx: &mut TurnContext<'_>);

    /// Called once with the outcome that ended the turn loop
    fn on_game_stop(&mut self, _ctx: &mut TurnContext<'_>, _outcome: &EpisodeOutcome) {}

    /// Called after the turn loop ended
    fn on_after_game(&mut self, ctx: &mut TurnContext<'_>);
}

// ============================================================================
// GameMaster
// ============================================================================

/// The fixed turn driver
///
/// Generic over [`GamePort`] so the loop is written once and every game
/// supplies only its hooks.
pub struct GameMaster<P: GamePort> {
    game: P,
    player: Player,
    config: HarnessConfig,
    episode_id: String,
    log: InteractionLog,
    conversation: Conversation,
}

impl<P: GamePort> GameMaster<P> {
    /// Register the player, open turn 0 and run the game's setup hook
    pub fn new(game: P, player: Player, config: HarnessConfig) -> Self {
        let episode_id = ulid::Ulid::new().to_string();
        let mut log = InteractionLog::new(episode_id.clone());
        log.players
            .insert(GM_DESCRIPTOR.to_string(), game.game_name().to_string());
        log.players
            .insert(player.descriptor().to_string(), player.model_name().to_string());
        log.begin_turn();

        let mut game_master = Self {
            game,
            player,
            config,
            episode_id,
            log,
            conversation: Conversation::new(),
        };
        let mut ctx = TurnContext::new(
            game_master.player.descriptor(),
            &mut game_master.log,
            &mut game_master.conversation,
            game_master.config.log_transcript,
        );
        game_master.game.on_setup(&mut ctx);
        game_master
    }

    pub fn episode_id(&self) -> &str {
        &self.episode_id
    }

    pub fn game(&self) -> &P {
        &self.game
    }

    pub fn log(&self) -> &InteractionLog {
        &self.log
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Play the episode to completion
    ///
    /// Turns are strictly sequential: each player request is awaited in full
    /// before the game hooks run. A context-window overflow or a backend
    /// failure ends the episode with an error.
    pub async fn run_episode(mut self) -> Result<EpisodeRecord<P>, GameError> {
        info!(
            episode_id = %self.episode_id,
            game = %self.game.game_name(),
            player = %self.player.descriptor(),
            model = %self.player.model_name(),
            "Starting episode"
        );

        {
            let mut ctx = TurnContext::new(
                self.player.descriptor(),
                &mut self.log,
                &mut self.conversation,
                self.config.log_transcript,
            );
            self.game.on_before_game(&mut ctx);
        }

        let outcome = loop {
            let turn_index = self.log.current_turn_index().unwrap_or_default();

            let response = self
                .player
                .respond(&self.conversation, &self.config.generation)
                .await
                .map_err(|e| GameError::from_backend(e, self.player.descriptor(), turn_index))?;
            debug!(turn = turn_index, response = %response, "Player responded");

            if self.config.log_transcript {
                self.log.record(LogEvent::new(
                    self.player.descriptor(),
                    GM_DESCRIPTOR,
                    GameEvent::GetMessage(response.clone()),
                ));
            }

            let mut ctx = TurnContext::new(
                self.player.descriptor(),
                &mut self.log,
                &mut self.conversation,
                self.config.log_transcript,
            );

            // the history keeps the parsed text for valid responses, the raw text otherwise
            if self.game.validate_response(&response) {
                let (parsed, should_log) = self.game.on_parse_response(&mut ctx, &response);
                if should_log {
                    ctx.log_event(GameEvent::Parse(parsed.clone()));
                }
                ctx.push_player_message(parsed);
            } else {
                ctx.push_player_message(response);
            }

            self.game.on_after_turn(&mut ctx);

            match self.game.check_progress() {
                Progress::Continue => {
                    self.log.begin_turn();
                }
                Progress::Stop(outcome) => {
                    self.game.on_game_stop(&mut ctx, &outcome);
                    break outcome;
                }
            }
        };

        {
            let mut ctx = TurnContext::new(
                self.player.descriptor(),
                &mut self.log,
                &mut self.conversation,
                self.config.log_transcript,
            );
            self.game.on_after_game(&mut ctx);
        }

        info!(
            episode_id = %self.episode_id,
            turns = self.log.turn_count(),
            outcome = ?outcome,
            "Episode completed"
        );

        Ok(EpisodeRecord {
            episode_id: self.episode_id,
            outcome,
            log: self.log,
            game: self.game,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
