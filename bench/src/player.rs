//! Player proxy and the model backend port
//!
//! A `Player` is one model-backed participant. It holds no game state: the
//! conversation it answers to is owned by the game master and passed in on
//! every request. Backends implement [`ModelBackend`]; loading, tokenization
//! and prompt templating stay behind that trait.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// Role-tagged chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered message history of one player
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(Message::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(Message::assistant(content));
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Most recent player response, if any.
    pub fn last_assistant(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|message| message.role == Role::Assistant)
            .map(|message| message.content.as_str())
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Sampling parameters passed with every generation request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationSettings {
    pub max_new_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_new_tokens: 300,
            temperature: 0.0,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum BackendError {
    #[error(
        "context window exceeded: {tokens_used} tokens used, {tokens_left} left of {context_size}"
    )]
    ContextExceeded {
        tokens_used: u64,
        tokens_left: i64,
        context_size: u64,
    },
    #[error("generation failed: {0}")]
    Generation(String),
}

/// Check that a prompt plus the generation budget fits the context window.
///
/// Backends that count tokens call this before generating.
pub fn check_context_limit(
    prompt_tokens: u64,
    max_new_tokens: u64,
    context_size: u64,
) -> Result<(), BackendError> {
    let tokens_used = prompt_tokens.saturating_add(max_new_tokens);
    let tokens_left = i64::try_from(context_size)
        .unwrap_or(i64::MAX)
        .saturating_sub(i64::try_from(tokens_used).unwrap_or(i64::MAX));
    if tokens_used <= context_size {
        Ok(())
    } else {
        Err(BackendError::ContextExceeded {
            tokens_used,
            tokens_left,
            context_size,
        })
    }
}

/// Text generation capability of a language model
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Name recorded in interaction logs
    fn model_name(&self) -> &str;

    /// Return one continuation of the conversation. The call completes with
    /// the full response; there is no streaming.
    async fn generate(
        &self,
        messages: &[Message],
        settings: &GenerationSettings,
    ) -> Result<String, BackendError>;
}

/// Model-backed participant addressed by its descriptor
#[derive(Clone)]
pub struct Player {
    descriptor: String,
    backend: Arc<dyn ModelBackend>,
}

impl Player {
    pub fn new(descriptor: impl Into<String>, backend: Arc<dyn ModelBackend>) -> Self {
        Self {
            descriptor: descriptor.into(),
            backend,
        }
    }

    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    pub fn model_name(&self) -> &str {
        self.backend.model_name()
    }

    pub async fn respond(
        &self,
        conversation: &Conversation,
        settings: &GenerationSettings,
    ) -> Result<String, BackendError> {
        debug!(
            player = %self.descriptor,
            model = %self.model_name(),
            messages = conversation.len(),
            "Requesting player response"
        );
        self.backend
            .generate(conversation.messages(), settings)
            .await
    }
}

impl fmt::Debug for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Player")
            .field("descriptor", &self.descriptor)
            .field("model", &self.model_name())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
