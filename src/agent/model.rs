//! The narrow interface the controller uses to reach a chat model.

use crate::error::ModelError;
use crate::models::{ConversationTurn, ToolInvocation, ToolSpec};

/// Everything the model sees on one invocation.
#[derive(Debug, Clone, Copy)]
pub struct ModelRequest<'a> {
    pub system_directive: &'a str,
    pub tools: &'a [ToolSpec],
    pub history: &'a [ConversationTurn],
}

/// What the model answered: free text, tool invocations, or both.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelReply {
    pub text: String,
    pub invocations: Vec<ToolInvocation>,
}

impl ModelReply {
    #[cfg(test)]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            invocations: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn invocations(invocations: Vec<ToolInvocation>) -> Self {
        Self {
            text: String::new(),
            invocations,
        }
    }

    /// A reply without invocations ends the tool loop.
    pub fn is_final(&self) -> bool {
        self.invocations.is_empty()
    }
}

/// A chat-completion endpoint with function calling.
#[allow(async_fn_in_trait)]
pub trait ChatModel {
    async fn complete(&self, request: ModelRequest<'_>) -> Result<ModelReply, ModelError>;
}
