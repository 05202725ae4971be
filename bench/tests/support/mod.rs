//! Scripted players and worlds shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use adventure_bench::interpreter::{
    ActionOutcome, InterpreterError, InterpreterFactory, WorldInterpreter,
};
use adventure_bench::player::{
    check_context_limit, BackendError, GenerationSettings, Message, ModelBackend, Player,
};
use async_trait::async_trait;
use shared_types::{
    ActionFailure, FailPhase, FailType, GameInstance, GameVariant, GoalState,
};

// ─── Players ────────────────────────────────────────────────────────────────

/// Backend replaying canned responses and recording every prompt it saw
pub struct ScriptedBackend {
    responses: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedBackend {
    pub fn new(responses: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.iter().map(|r| r.to_string()).collect()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompt(&self, call: usize) -> Vec<Message> {
        self.prompts.lock().unwrap()[call].clone()
    }
}

#[async_trait]
impl ModelBackend for ScriptedBackend {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        messages: &[Message],
        _settings: &GenerationSettings,
    ) -> Result<String, BackendError> {
        self.prompts.lock().unwrap().push(messages.to_vec());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| BackendError::Generation("script exhausted".to_string()))
    }
}

/// Backend with a tiny context window; counts one token per word
pub struct ContextOverflowBackend {
    pub context_size: u64,
}

#[async_trait]
impl ModelBackend for ContextOverflowBackend {
    fn model_name(&self) -> &str {
        "tiny-context"
    }

    async fn generate(
        &self,
        messages: &[Message],
        settings: &GenerationSettings,
    ) -> Result<String, BackendError> {
        let prompt_tokens: usize = messages
            .iter()
            .map(|m| m.content.split_whitespace().count())
            .sum();
        check_context_limit(
            prompt_tokens as u64,
            u64::from(settings.max_new_tokens),
            self.context_size,
        )?;
        Ok("> look".to_string())
    }
}

pub fn player(backend: Arc<dyn ModelBackend>) -> Player {
    Player::new("Player 1", backend)
}

// ─── World ──────────────────────────────────────────────────────────────────

/// Effect of one known command
#[derive(Debug, Clone, Default)]
pub struct WorldRule {
    pub narrative: String,
    pub adds: Vec<String>,
    pub removes: Vec<String>,
    pub failure: Option<ActionFailure>,
}

impl WorldRule {
    pub fn says(narrative: &str) -> Self {
        Self {
            narrative: narrative.to_string(),
            ..Default::default()
        }
    }

    pub fn adds(mut self, goal: &str) -> Self {
        self.adds.push(goal.to_string());
        self
    }

    pub fn removes(mut self, goal: &str) -> Self {
        self.removes.push(goal.to_string());
        self
    }

    pub fn fails(mut self, phase: FailPhase, fail_type: FailType) -> Self {
        self.failure = Some(ActionFailure { phase, fail_type });
        self
    }
}

pub const UNKNOWN_COMMAND: &str = "I don't know what you mean.";

/// Lookup-table world: known commands apply their rule, anything else is an
/// undefined verb.
pub struct ScriptedWorld {
    description: String,
    goals: GoalState,
    rules: HashMap<String, WorldRule>,
}

impl WorldInterpreter for ScriptedWorld {
    fn initial_description(&self) -> String {
        self.description.clone()
    }

    fn process_action(&mut self, command: &str) -> ActionOutcome {
        if let Some(reason) = command.strip_prefix("crash ") {
            panic!("world crashed: {reason}");
        }
        let Some(rule) = self.rules.get(command) else {
            return ActionOutcome {
                goals_achieved: self.goals.clone(),
                narrative: UNKNOWN_COMMAND.to_string(),
                failure: Some(ActionFailure {
                    phase: FailPhase::Parsing,
                    fail_type: FailType::UndefinedActionVerb,
                }),
            };
        };
        for goal in &rule.adds {
            self.goals.insert(goal.clone());
        }
        for goal in &rule.removes {
            self.goals.remove(goal);
        }
        ActionOutcome {
            goals_achieved: self.goals.clone(),
            narrative: rule.narrative.clone(),
            failure: rule.failure,
        }
    }
}

pub const INITIAL_DESCRIPTION: &str = "You are in a kitchen. There is an apple here.";

pub fn world(rules: &[(&str, WorldRule)]) -> Arc<dyn InterpreterFactory> {
    let rules: HashMap<String, WorldRule> = rules
        .iter()
        .map(|(command, rule)| (command.to_string(), rule.clone()))
        .collect();
    Arc::new(
        move |instance: &GameInstance| -> Result<Box<dyn WorldInterpreter>, InterpreterError> {
            if instance.world.contains_key("broken") {
                return Err(InterpreterError::Construction {
                    game_id: instance.game_id,
                    reason: "unknown room type".to_string(),
                });
            }
            Ok(Box::new(ScriptedWorld {
                description: INITIAL_DESCRIPTION.to_string(),
                goals: GoalState::new(),
                rules: rules.clone(),
            }))
        },
    )
}

/// Kitchen world: taking then eating the apple achieves both goals.
pub fn kitchen() -> Arc<dyn InterpreterFactory> {
    world(&[
        ("look", WorldRule::says(INITIAL_DESCRIPTION)),
        ("wait", WorldRule::says("Time passes.")),
        ("take apple", WorldRule::says("You take the apple.").adds("holding(apple)")),
        ("drop apple", WorldRule::says("You drop the apple.").removes("holding(apple)")),
        ("eat apple", WorldRule::says("You eat the apple.").adds("eaten(apple)")),
    ])
}

// ─── Instances ──────────────────────────────────────────────────────────────

pub const PROMPT: &str = "Reach the goals. Reply with > and a command.\n\n";

pub fn instance(
    game_id: u64,
    variant: GameVariant,
    goals: &[&str],
    max_turns: u32,
    optimal_turns: u32,
) -> GameInstance {
    GameInstance {
        game_id: Some(game_id),
        variant: Some(variant),
        prompt: Some(PROMPT.to_string()),
        goal_state: Some(goals.iter().map(|g| g.to_string()).collect()),
        max_turns: Some(max_turns),
        optimal_turns: Some(optimal_turns),
        world: serde_json::Map::new(),
    }
}

pub fn apple_instance(game_id: u64) -> GameInstance {
    instance(
        game_id,
        GameVariant::Basic,
        &["holding(apple)", "eaten(apple)"],
        10,
        2,
    )
}
