//! Ollama chat client with tool calling.
//!
//! Translates the conversation history into `/api/chat` messages and the
//! reply back into text and tool invocations.

use super::model::{ChatModel, ModelReply, ModelRequest};
use crate::config::Config;
use crate::error::ModelError;
use crate::models::{ConversationTurn, Role, ToolInvocation, ToolSpec, TurnContent};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

/// Message in the Ollama chat history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallMessage>>,
    /// Set on `tool` messages: which function produced the content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl ChatMessage {
    fn text(role: impl ToString, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
            tool_calls: None,
            tool_name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallMessage {
    pub function: ToolCallFunction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallFunction {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// Tool definition for Ollama's tool-calling API.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: &'static str,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

impl From<&ToolSpec> for ToolDefinition {
    fn from(spec: &ToolSpec) -> Self {
        Self {
            tool_type: "function",
            function: FunctionDefinition {
                name: spec.name,
                description: spec.description,
                parameters: spec.parameters_schema(),
            },
        }
    }
}

/// Ollama chat API request.
#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolDefinition>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Ollama chat API response.
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallMessage>>,
}

impl From<ResponseMessage> for ModelReply {
    fn from(message: ResponseMessage) -> Self {
        let invocations = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolInvocation::new(call.function.name, call.function.arguments))
            .collect();

        ModelReply {
            text: message.content,
            invocations,
        }
    }
}

/// Expand the stored history into wire messages.
///
/// A tool exchange becomes one assistant message carrying every
/// invocation, followed by one `tool` message per result in the same
/// order, so each tool message directly follows its invocation.
pub fn build_messages(system_directive: &str, history: &[ConversationTurn]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(ChatMessage::text("system", system_directive));

    for turn in history {
        match &turn.content {
            TurnContent::Text(text) => messages.push(ChatMessage::text(turn.role, text.as_str())),
            TurnContent::ToolExchange { text, results } => {
                messages.push(ChatMessage {
                    role: Role::Assistant.to_string(),
                    content: text.clone(),
                    tool_calls: Some(
                        results
                            .iter()
                            .map(|r| ToolCallMessage {
                                function: ToolCallFunction {
                                    name: r.invocation.name.clone(),
                                    arguments: r.invocation.arguments.clone(),
                                },
                            })
                            .collect(),
                    ),
                    tool_name: None,
                });

                for result in results {
                    messages.push(ChatMessage {
                        role: Role::Tool.to_string(),
                        content: result.outcome.render(),
                        tool_calls: None,
                        tool_name: Some(result.invocation.name.clone()),
                    });
                }
            }
        }
    }

    messages
}

/// Client for an Ollama (or Ollama-compatible) chat endpoint.
pub struct OllamaClient {
    http_client: reqwest::Client,
    base_url: String,
    model_name: String,
    temperature: f32,
    timeout_seconds: u64,
    api_key: Option<String>,
}

impl OllamaClient {
    /// Create a client from the startup configuration.
    pub fn new(config: &Config) -> Result<Self, ModelError> {
        let model = &config.model;
        info!(
            "Initializing model client for {} at {}",
            model.name, model.ollama_url
        );

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(model.timeout_seconds))
            .build()
            .map_err(|e| ModelError::Connection(format!("{} ({})", model.ollama_url, e)))?;

        Ok(Self {
            http_client,
            base_url: model.ollama_url.trim_end_matches('/').to_string(),
            model_name: model.name.clone(),
            temperature: model.temperature,
            timeout_seconds: model.timeout_seconds,
            api_key: config.secrets.model_api_key.clone(),
        })
    }
}

impl ChatModel for OllamaClient {
    async fn complete(&self, request: ModelRequest<'_>) -> Result<ModelReply, ModelError> {
        let url = format!("{}/api/chat", self.base_url);

        let body = OllamaChatRequest {
            model: self.model_name.clone(),
            messages: build_messages(request.system_directive, request.history),
            tools: request.tools.iter().map(ToolDefinition::from).collect(),
            stream: false,
            options: OllamaOptions {
                temperature: self.temperature,
            },
        };

        debug!("Sending chat request with {} messages", body.messages.len());

        let mut http_request = self.http_client.post(&url).json(&body);
        if let Some(ref key) = self.api_key {
            http_request = http_request.bearer_auth(key);
        }

        let response = http_request.send().await.map_err(|e| {
            if e.is_timeout() {
                ModelError::Timeout(self.timeout_seconds)
            } else if e.is_connect() {
                ModelError::Connection(self.base_url.clone())
            } else {
                ModelError::Connection(format!("{} ({})", self.base_url, e))
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let chat_response: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

        Ok(chat_response.message.into())
    }
}
