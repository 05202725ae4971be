//! Adventure game - goal-driven text adventure played through the harness
//!
//! The player answers every prompt with a command line starting with the
//! command tag (plus a plan section in the plan variant). Valid commands are
//! forwarded to the world interpreter, whose report replaces the achieved
//! goal state. The episode stops on the first malformed response, when every
//! required goal is achieved, or when the turn budget is used up.

pub mod variant;

use shared_types::{
    EpisodeConfig, EpisodeOutcome, FormatViolation, GameEvent, GameInstance, GameResult,
    GoalState, GoalStatus,
};
use tracing::{debug, info, warn};

use crate::config::BenchConfig;
use crate::harness::{GameError, GameMaster, GamePort, Progress, TurnContext};
use crate::interpreter::{InterpreterFactory, WorldInterpreter};
use crate::player::Player;

pub use variant::{PlanHistory, ResponseGrammar, Variant};

pub const GAME_NAME: &str = "adventuregame";

pub type AdventureGameMaster = GameMaster<AdventureGame>;

/// Game state of one adventure episode
pub struct AdventureGame {
    config: EpisodeConfig,
    interpreter: Box<dyn WorldInterpreter>,
    variant: Variant,
    grammar: ResponseGrammar,
    goals_achieved: GoalState,
    turns_played: u32,
    invalid_format: Option<FormatViolation>,
}

impl AdventureGame {
    pub fn new(
        config: EpisodeConfig,
        interpreter: Box<dyn WorldInterpreter>,
        grammar: ResponseGrammar,
    ) -> Self {
        let variant = Variant::for_kind(config.variant);
        Self {
            config,
            interpreter,
            variant,
            grammar,
            goals_achieved: GoalState::new(),
            turns_played: 0,
            invalid_format: None,
        }
    }

    pub fn config(&self) -> &EpisodeConfig {
        &self.config
    }

    pub fn goals_achieved(&self) -> &GoalState {
        &self.goals_achieved
    }

    /// Turns in which a command reached the interpreter
    pub fn turns_played(&self) -> u32 {
        self.turns_played
    }

    /// First format violation, if the episode was aborted
    pub fn invalid_format(&self) -> Option<FormatViolation> {
        self.invalid_format
    }

    pub fn is_finished(&self) -> bool {
        self.goals_achieved == self.config.goal_state
    }

    pub fn plan_history(&self) -> Option<&PlanHistory> {
        self.variant.plan_history()
    }

    pub fn should_continue(&self) -> bool {
        self.check_progress().is_continue()
    }

    fn goal_list(&self) -> Vec<String> {
        self.goals_achieved.iter().cloned().collect()
    }
}

impl GamePort for AdventureGame {
    fn game_name(&self) -> &str {
        GAME_NAME
    }

    fn on_setup(&mut self, ctx: &mut TurnContext<'_>) {
        ctx.log_event(GameEvent::AdventureInfo(self.config.info()));
    }

    fn on_before_game(&mut self, ctx: &mut TurnContext<'_>) {
        let opening = format!(
            "{}{}",
            self.config.prompt,
            self.interpreter.initial_description()
        );
        ctx.add_user_message(opening);
    }

    fn validate_response(&mut self, response: &str) -> bool {
        match self.variant.check_format(response, &self.grammar) {
            Ok(()) => true,
            Err(violation) => {
                // first violation wins; nothing is played after it
                if self.invalid_format.is_none() {
                    info!(violation = %violation.as_str(), "Invalid response format");
                    self.invalid_format = Some(violation);
                }
                false
            }
        }
    }

    fn on_parse_response(&mut self, ctx: &mut TurnContext<'_>, response: &str) -> (String, bool) {
        if let Some(plan) = self.variant.on_parse(response, &self.grammar) {
            ctx.log_event(GameEvent::Plan(plan));
        }
        (response.to_string(), true)
    }

    fn check_progress(&self) -> Progress {
        if let Some(violation) = self.invalid_format {
            return Progress::Stop(EpisodeOutcome::Aborted(violation));
        }
        if self.is_finished() {
            return Progress::Stop(EpisodeOutcome::Finished);
        }
        if self.turns_played >= self.config.max_turns {
            return Progress::Stop(EpisodeOutcome::TurnLimitReached);
        }
        Progress::Continue
    }

    fn on_after_turn(&mut self, ctx: &mut TurnContext<'_>) {
        // a turn that already ended the episode does not touch the world
        if !self.should_continue() {
            return;
        }

        let Some(command) = ctx
            .last_player_response()
            .map(|response| self.grammar.extract_command(response))
        else {
            warn!(turn = ctx.turn_index, "No player response to forward");
            return;
        };

        let prior_goal_count = self.goals_achieved.len() as i64;
        let outcome = self.interpreter.process_action(&command);
        debug!(
            turn = ctx.turn_index,
            command = %command,
            failed = outcome.failure.is_some(),
            "Processed player command"
        );

        if let Some(failure) = outcome.failure {
            debug!(
                turn = ctx.turn_index,
                phase = %failure.phase.as_str(),
                fail_type = %failure.fail_type.as_str(),
                "Action failed"
            );
            ctx.log_event(GameEvent::ActionFail(failure));
        }

        self.goals_achieved = outcome.goals_achieved;
        let turn_goal_score = self.goals_achieved.len() as i64 - prior_goal_count;
        if turn_goal_score < 0 {
            warn!(
                turn = ctx.turn_index,
                delta = turn_goal_score,
                "Achieved goal count decreased"
            );
        }

        ctx.log_event(GameEvent::GoalStatus(GoalStatus {
            goal_states_achieved: self.goal_list(),
            turn_goal_score,
        }));
        ctx.add_user_message(outcome.narrative);
        self.turns_played += 1;
    }

    fn on_game_stop(&mut self, ctx: &mut TurnContext<'_>, outcome: &EpisodeOutcome) {
        let event = match outcome {
            EpisodeOutcome::Aborted(violation) => GameEvent::InvalidFormat(*violation),
            EpisodeOutcome::Finished => GameEvent::AdventureFinished(self.goal_list()),
            EpisodeOutcome::TurnLimitReached => GameEvent::TurnLimitReached(self.config.max_turns),
        };
        ctx.log_event(event);
    }

    fn on_after_game(&mut self, ctx: &mut TurnContext<'_>) {
        ctx.log_event(GameEvent::GameResult(GameResult {
            goal_states_achieved: self.goal_list(),
            game_successfully_finished: self.is_finished(),
        }));
    }
}

impl GameMaster<AdventureGame> {
    /// Bind an instance, build its world and register the player
    ///
    /// Fails before any play if a required instance field is missing or the
    /// world cannot be built.
    pub fn setup(
        instance: &GameInstance,
        player: Player,
        factory: &dyn InterpreterFactory,
        config: &BenchConfig,
    ) -> Result<Self, GameError> {
        let episode_config = EpisodeConfig::try_from(instance)?;
        let interpreter = factory.create(instance)?;
        let game = AdventureGame::new(episode_config, interpreter, config.grammar.clone());
        Ok(GameMaster::new(game, player, config.harness.clone()))
    }
}
