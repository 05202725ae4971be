//! World interpreter port
//!
//! The text-adventure world simulation lives outside this crate. The game
//! master only needs the initial scene and the result of processing one
//! command; one interpreter instance is built per episode.

use shared_types::{ActionFailure, GameInstance, GoalState};

/// Result of processing one player command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    /// Authoritative set of goals achieved after this command
    pub goals_achieved: GoalState,
    /// Room or event description returned to the player
    pub narrative: String,
    pub failure: Option<ActionFailure>,
}

pub trait WorldInterpreter: Send {
    /// Full description of the starting room
    fn initial_description(&self) -> String;

    fn process_action(&mut self, command: &str) -> ActionOutcome;
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum InterpreterError {
    #[error("failed to build world for instance {game_id:?}: {reason}")]
    Construction {
        game_id: Option<u64>,
        reason: String,
    },
}

/// Builds a fresh interpreter for each episode
pub trait InterpreterFactory: Send + Sync {
    fn create(&self, instance: &GameInstance) -> Result<Box<dyn WorldInterpreter>, InterpreterError>;
}

impl<F> InterpreterFactory for F
where
    F: Fn(&GameInstance) -> Result<Box<dyn WorldInterpreter>, InterpreterError> + Send + Sync,
{
    fn create(&self, instance: &GameInstance) -> Result<Box<dyn WorldInterpreter>, InterpreterError> {
        self(instance)
    }
}
