//! Data models for the repository assistant.
//!
//! This module contains the conversation types shared by the controller
//! and the model client, and the repository payloads returned by the
//! access layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

/// Author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    /// Only appears on the wire, see [`TurnContent::ToolExchange`].
    Tool,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// Semantic type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Integer,
    Boolean,
}

impl ParameterType {
    /// JSON schema name of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterType::String => "string",
            ParameterType::Integer => "integer",
            ParameterType::Boolean => "boolean",
        }
    }

    /// Whether a JSON value is acceptable for this type.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ParameterType::String => value.is_string(),
            ParameterType::Integer => value.is_i64() || value.is_u64(),
            ParameterType::Boolean => value.is_boolean(),
        }
    }
}

/// One declared parameter of a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterSpec {
    pub name: &'static str,
    pub kind: ParameterType,
    pub required: bool,
    pub description: &'static str,
}

/// A callable tool as advertised to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    /// Ordered parameter list.
    pub parameters: Vec<ParameterSpec>,
}

impl ToolSpec {
    /// Look up a declared parameter by name.
    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// JSON schema object describing the parameters.
    pub fn parameters_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.parameters {
            properties.insert(
                param.name.to_string(),
                json!({
                    "type": param.kind.as_str(),
                    "description": param.description,
                }),
            );
        }

        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name)
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub name: String,
    /// Argument bindings as emitted; validated before execution.
    pub arguments: Value,
}

impl ToolInvocation {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// Outcome of executing one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolOutcome {
    Success(Value),
    Failure(String),
}

impl ToolOutcome {
    #[cfg(test)]
    pub fn is_success(&self) -> bool {
        matches!(self, ToolOutcome::Success(_))
    }

    /// Text sent back to the model. Strings go out raw, not JSON-quoted.
    pub fn render(&self) -> String {
        match self {
            ToolOutcome::Success(Value::String(text)) => text.clone(),
            ToolOutcome::Success(value) => value.to_string(),
            ToolOutcome::Failure(description) => format!("Error: {}", description),
        }
    }
}

/// An invocation together with the outcome that answers it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub invocation: ToolInvocation,
    pub outcome: ToolOutcome,
}

/// Content of a conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnContent {
    Text(String),
    /// Invocations from one model response, each already answered.
    ///
    /// Stored as a single assistant turn; expanded into an assistant
    /// message plus one `tool` message per result when sent to the model.
    ToolExchange {
        text: String,
        results: Vec<ToolResult>,
    },
}

/// One entry of the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: TurnContent,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, TurnContent::Text(text.into()))
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, TurnContent::Text(text.into()))
    }

    pub fn tool_exchange(text: impl Into<String>, results: Vec<ToolResult>) -> Self {
        Self::new(
            Role::Assistant,
            TurnContent::ToolExchange {
                text: text.into(),
                results,
            },
        )
    }

    fn new(role: Role, content: TurnContent) -> Self {
        Self {
            role,
            content,
            timestamp: Utc::now(),
        }
    }

    /// Plain text of the turn, if it is a text turn.
    #[cfg(test)]
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            TurnContent::Text(text) => Some(text),
            TurnContent::ToolExchange { .. } => None,
        }
    }
}

/// Owner of a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryOwner {
    pub login: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

/// License summary attached to repository metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryLicense {
    #[serde(default)]
    pub spdx_id: Option<String>,
    pub name: String,
}

/// Canonical repository metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryMetadata {
    pub name: String,
    pub full_name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub owner: RepositoryOwner,
    pub html_url: String,
    pub default_branch: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub forks_count: u64,
    #[serde(default)]
    pub open_issues_count: u64,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub license: Option<RepositoryLicense>,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub fork: bool,
    #[serde(default)]
    pub homepage: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pushed_at: Option<DateTime<Utc>>,
}

/// Kind of an entry in a directory listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentKind {
    #[serde(rename = "file")]
    File,
    #[serde(rename = "dir")]
    Directory,
    #[serde(rename = "symlink")]
    Symlink,
    #[serde(rename = "submodule")]
    Submodule,
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentKind::File => write!(f, "file"),
            ContentKind::Directory => write!(f, "directory"),
            ContentKind::Symlink => write!(f, "symlink"),
            ContentKind::Submodule => write!(f, "submodule"),
        }
    }
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: ContentKind,
    #[serde(default)]
    pub size: u64,
    /// Raw content reference; absent for directories and submodules.
    #[serde(default)]
    pub download_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> ToolSpec {
        ToolSpec {
            name: "list_contents",
            description: "List a directory",
            parameters: vec![
                ParameterSpec {
                    name: "owner",
                    kind: ParameterType::String,
                    required: true,
                    description: "Owner",
                },
                ParameterSpec {
                    name: "path",
                    kind: ParameterType::String,
                    required: false,
                    description: "Path",
                },
            ],
        }
    }

    #[test]
    fn test_parameters_schema() {
        let schema = spec().parameters_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["owner"]["type"], "string");
        assert_eq!(schema["required"], json!(["owner"]));
    }

    #[test]
    fn test_parameter_type_accepts() {
        assert!(ParameterType::String.accepts(&json!("main")));
        assert!(!ParameterType::String.accepts(&json!(3)));
        assert!(ParameterType::Integer.accepts(&json!(3)));
        assert!(!ParameterType::Integer.accepts(&json!(3.5)));
        assert!(ParameterType::Boolean.accepts(&json!(true)));
    }

    #[test]
    fn test_outcome_render() {
        assert_eq!(
            ToolOutcome::Success(json!("fn main() {}")).render(),
            "fn main() {}"
        );
        assert_eq!(
            ToolOutcome::Success(json!({"a": 1})).render(),
            r#"{"a":1}"#
        );
        assert_eq!(
            ToolOutcome::Failure("Not found: x".to_string()).render(),
            "Error: Not found: x"
        );
    }

    #[test]
    fn test_content_entry_kinds() {
        let entries: Vec<ContentEntry> = serde_json::from_value(json!([
            {"name": "src", "path": "src", "type": "dir", "download_url": null},
            {"name": "README.md", "path": "README.md", "type": "file", "size": 12,
             "download_url": "https://raw.example/README.md"}
        ]))
        .unwrap();

        assert_eq!(entries[0].kind, ContentKind::Directory);
        assert_eq!(entries[0].download_url, None);
        assert_eq!(entries[1].kind, ContentKind::File);
        assert_eq!(entries[1].size, 12);
        assert_eq!(entries[0].kind.to_string(), "directory");
    }

    #[test]
    fn test_repository_metadata_minimal() {
        let meta: RepositoryMetadata = serde_json::from_value(json!({
            "name": "widget",
            "full_name": "acme/widget",
            "description": "A widget toolkit",
            "owner": {"login": "acme"},
            "html_url": "https://github.com/acme/widget",
            "default_branch": "trunk",
            "pushed_at": "2024-05-01T10:00:00Z"
        }))
        .unwrap();

        assert_eq!(meta.default_branch, "trunk");
        assert_eq!(meta.description.as_deref(), Some("A widget toolkit"));
        assert!(meta.topics.is_empty());
        assert!(meta.pushed_at.is_some());
    }

    #[test]
    fn test_exchange_turn_is_assistant() {
        let turn = ConversationTurn::tool_exchange("", vec![]);
        assert_eq!(turn.role, Role::Assistant);
        assert!(turn.text().is_none());
        assert_eq!(ConversationTurn::user("hi").text(), Some("hi"));
    }
}
