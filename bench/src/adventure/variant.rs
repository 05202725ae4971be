//! Response grammar and per-variant hooks

use shared_types::{FormatViolation, GameVariant};

pub const DEFAULT_COMMAND_TAG: &str = ">";
pub const DEFAULT_PLAN_TAG: &str = "\nNext actions:";

/// Markers a player response must contain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseGrammar {
    /// Prefix every response starts with; the command is the rest of its first line
    pub command_tag: String,
    /// Marker introducing the plan section in the plan variant
    pub plan_tag: String,
}

impl Default for ResponseGrammar {
    fn default() -> Self {
        Self {
            command_tag: DEFAULT_COMMAND_TAG.to_string(),
            plan_tag: DEFAULT_PLAN_TAG.to_string(),
        }
    }
}

impl ResponseGrammar {
    /// Command text of a response: first line after the command tag, trimmed.
    pub fn extract_command(&self, response: &str) -> String {
        let body = response
            .strip_prefix(self.command_tag.as_str())
            .unwrap_or(response);
        body.split('\n').next().unwrap_or_default().trim().to_string()
    }

    /// Text following the first plan tag, up to the next one.
    pub fn extract_plan<'r>(&self, response: &'r str) -> Option<&'r str> {
        response.split(self.plan_tag.as_str()).nth(1)
    }
}

/// Plans extracted from plan-variant responses, oldest first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanHistory {
    plans: Vec<String>,
}

impl PlanHistory {
    pub fn push(&mut self, plan: impl Into<String>) {
        self.plans.push(plan.into());
    }

    pub fn plans(&self) -> &[String] {
        &self.plans
    }

    pub fn latest(&self) -> Option<&str> {
        self.plans.last().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}

/// Game variant selected at construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Variant {
    Basic,
    Plan(PlanHistory),
}

impl Variant {
    pub fn for_kind(kind: GameVariant) -> Self {
        match kind {
            GameVariant::Basic => Self::Basic,
            GameVariant::Plan => Self::Plan(PlanHistory::default()),
        }
    }

    pub fn kind(&self) -> GameVariant {
        match self {
            Self::Basic => GameVariant::Basic,
            Self::Plan(_) => GameVariant::Plan,
        }
    }

    /// First grammar rule the response breaks, if any.
    pub fn check_format(
        &self,
        response: &str,
        grammar: &ResponseGrammar,
    ) -> Result<(), FormatViolation> {
        if !response.starts_with(grammar.command_tag.as_str()) {
            return Err(FormatViolation::CommandTagMissing);
        }
        if let Self::Plan(_) = self {
            if !response.contains(grammar.plan_tag.as_str()) {
                return Err(FormatViolation::NextActionsMissing);
            }
        }
        Ok(())
    }

    /// Parse hook. Records the plan in the plan variant and returns it.
    pub fn on_parse(&mut self, response: &str, grammar: &ResponseGrammar) -> Option<String> {
        match self {
            Self::Basic => None,
            Self::Plan(history) => {
                let plan = grammar.extract_plan(response)?.to_string();
                history.push(plan.clone());
                Some(plan)
            }
        }
    }

    pub fn plan_history(&self) -> Option<&PlanHistory> {
        match self {
            Self::Basic => None,
            Self::Plan(history) => Some(history),
        }
    }
}
