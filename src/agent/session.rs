//! Tool-calling session controller.
//!
//! A [`Session`] owns the conversation; the [`Controller`] drives it. Each
//! query loops between the model and the tools until the model answers
//! without requesting any tool:
//!
//! ```text
//! Idle -> AwaitingModel -> ExecutingTools -> AwaitingModel -> ... -> Idle
//! ```

use super::model::{ChatModel, ModelRequest};
use super::tools::{ResolvedCall, ToolRegistry};
use crate::config::ModelConfig;
use crate::error::{SessionError, ToolError};
use crate::github::RepositoryAccess;
use crate::models::{ConversationTurn, ToolOutcome, ToolResult, ToolSpec};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where a session is in the query loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the next user query.
    Idle,
    /// A request to the model is in flight.
    AwaitingModel,
    /// Running the invocations from the last model reply.
    ExecutingTools,
}

/// One conversation. History is append-only and only the controller writes it.
#[derive(Debug)]
pub struct Session {
    system_directive: String,
    tools: Arc<[ToolSpec]>,
    history: Vec<ConversationTurn>,
    state: SessionState,
}

impl Session {
    pub fn history(&self) -> &[ConversationTurn] {
        &self.history
    }

    fn enter(&mut self, next: SessionState) {
        debug!("Session {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

#[cfg(test)]
impl Session {
    pub(crate) fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn system_directive(&self) -> &str {
        &self.system_directive
    }

    pub(crate) fn tools(&self) -> &[ToolSpec] {
        &self.tools
    }
}

/// Drives sessions against a chat model and a repository backend.
pub struct Controller<M, R> {
    model: M,
    access: R,
    registry: ToolRegistry<R>,
    max_tool_rounds: usize,
}

impl<M: ChatModel, R: RepositoryAccess> Controller<M, R> {
    /// Controller with the three repository tools registered.
    pub fn new(model: M, access: R, config: &ModelConfig) -> Self {
        Self::with_registry(model, access, ToolRegistry::repository_tools(), config)
    }
}

impl<M: ChatModel, R> Controller<M, R> {
    pub fn with_registry(
        model: M,
        access: R,
        registry: ToolRegistry<R>,
        config: &ModelConfig,
    ) -> Self {
        Self {
            model,
            access,
            registry,
            max_tool_rounds: config.max_tool_rounds.max(1),
        }
    }

    /// Start an empty session bound to this controller's tools. No I/O.
    pub fn create_session(&self, system_directive: impl Into<String>) -> Session {
        Session {
            system_directive: system_directive.into(),
            tools: self.registry.specs(),
            history: Vec::new(),
            state: SessionState::Idle,
        }
    }

    /// Answer one user query, running whatever tools the model asks for.
    ///
    /// Tool failures are fed back to the model and never surface here.
    /// Unknown tools, malformed arguments, model failures and the round
    /// limit end the query with an error; the history stays consistent
    /// and the session can take the next query.
    pub async fn submit_query(
        &self,
        session: &mut Session,
        query: &str,
    ) -> Result<String, SessionError> {
        session.history.push(ConversationTurn::user(query));
        let result = self.run_tool_loop(session).await;
        session.enter(SessionState::Idle);

        if let Err(ref e) = result {
            warn!("Query failed: {}", e);
        }
        result
    }

    async fn run_tool_loop(&self, session: &mut Session) -> Result<String, SessionError> {
        let mut rounds = 0;

        loop {
            session.enter(SessionState::AwaitingModel);
            debug!(
                "Invoking model with {} turns (round {})",
                session.history.len(),
                rounds + 1
            );

            let reply = self
                .model
                .complete(ModelRequest {
                    system_directive: &session.system_directive,
                    tools: &session.tools,
                    history: &session.history,
                })
                .await?;

            if reply.is_final() {
                session.history.push(ConversationTurn::assistant(reply.text.as_str()));
                return Ok(reply.text);
            }

            rounds += 1;
            if rounds > self.max_tool_rounds {
                return Err(SessionError::RoundLimitExceeded(self.max_tool_rounds));
            }

            session.enter(SessionState::ExecutingTools);

            // Resolve the whole batch first so a bad invocation runs nothing.
            let calls = reply
                .invocations
                .iter()
                .map(|invocation| self.registry.resolve(invocation))
                .collect::<Result<Vec<_>, _>>()?;

            let mut results = Vec::with_capacity(calls.len());
            for call in calls {
                results.push(self.execute(call).await?);
            }

            session
                .history
                .push(ConversationTurn::tool_exchange(reply.text, results));
        }
    }

    async fn execute(&self, call: ResolvedCall<R>) -> Result<ToolResult, SessionError> {
        let executed = call.execute(&self.access).await;
        let outcome = match executed {
            Ok(payload) => {
                info!("Tool {} executed", call.invocation.name);
                ToolOutcome::Success(payload)
            }
            Err(ToolError::Arguments(reason)) => {
                return Err(SessionError::MalformedInvocation {
                    tool: call.invocation.name,
                    reason,
                });
            }
            Err(e) => {
                warn!("Tool {} failed: {}", call.invocation.name, e);
                ToolOutcome::Failure(e.to_string())
            }
        };

        Ok(ToolResult {
            invocation: call.invocation,
            outcome,
        })
    }
}

#[cfg(test)]
impl<M, R> Controller<M, R> {
    pub(crate) fn model(&self) -> &M {
        &self.model
    }
}

/// Base instructions for the assistant.
const SYSTEM_DIRECTIVE: &str = r#"You are a helpful AI assistant that helps developers understand the contents of a GitHub repository.

## Available Tools

- `get_repository_info(owner, repo)` - Repository metadata (description, default branch, language, ...)
- `list_contents(owner, repo, path, branch)` - Files and directories at a path
- `read_file(download_url)` - Text of a file, using the download_url from list_contents

## How to Work

1. Work out which repository the user means (owner and name).
2. Use the tools to fetch what you need; explore directories step by step.
3. If a tool returns an error, adjust the arguments or try another tool.
4. Answer only what is asked, precisely and in detail.

Do not format the answer as Markdown or code. When explaining code, reference the file it comes from.
"#;

/// System directive, optionally focused on one repository.
pub fn system_directive(focus: Option<(&str, &str)>) -> String {
    match focus {
        Some((owner, repo)) => format!(
            "{}\nThe user is asking about the repository {}/{} (owner: {}, repo: {}).\n",
            SYSTEM_DIRECTIVE, owner, repo, owner, repo
        ),
        None => SYSTEM_DIRECTIVE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::model::ModelReply;
    use crate::agent::testing::{
        call, file_entry, widget_metadata, RecordingAccess, ScriptedModel,
    };
    use crate::error::ModelError;
    use crate::models::{Role, TurnContent};
    use serde_json::json;

    fn controller(
        replies: Vec<ModelReply>,
        access: RecordingAccess,
    ) -> Controller<ScriptedModel, RecordingAccess> {
        Controller::new(
            ScriptedModel::replying(replies),
            access,
            &ModelConfig::default(),
        )
    }

    fn exchange_results(turn: &ConversationTurn) -> &[ToolResult] {
        match &turn.content {
            TurnContent::ToolExchange { results, .. } => results,
            TurnContent::Text(_) => panic!("expected a tool exchange, got {:?}", turn),
        }
    }

    #[test]
    fn test_create_session() {
        let controller = controller(vec![], RecordingAccess::new());
        let session = controller.create_session("directive");

        assert!(session.history().is_empty());
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.system_directive(), "directive");
        assert_eq!(session.tools().len(), 3);
        assert!(controller.model.requests().is_empty());
    }

    #[tokio::test]
    async fn test_what_does_this_repo_do() {
        let controller = controller(
            vec![
                ModelReply::invocations(vec![call(
                    "get_repository_info",
                    json!({"owner": "acme", "repo": "widget"}),
                )]),
                ModelReply::text("This repository, widget, is a widget toolkit."),
            ],
            RecordingAccess::new().with_repository(widget_metadata()),
        );
        let mut session = controller.create_session(system_directive(None));

        let answer = controller
            .submit_query(&mut session, "What does this repo do?")
            .await
            .unwrap();

        assert_eq!(answer, "This repository, widget, is a widget toolkit.");
        assert_eq!(session.state(), SessionState::Idle);

        let history = session.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[0].text(), Some("What does this repo do?"));
        assert_eq!(history[1].role, Role::Assistant);
        let results = exchange_results(&history[1]);
        assert_eq!(results.len(), 1);
        match &results[0].outcome {
            ToolOutcome::Success(payload) => {
                assert_eq!(payload["description"], "A widget toolkit")
            }
            other => panic!("expected success, got {:?}", other),
        }
        assert_eq!(history[2].text(), Some(answer.as_str()));

        assert_eq!(
            controller.access.calls(),
            vec!["get_repository_info acme/widget"]
        );

        let requests = controller.model.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].system_directive, session.system_directive());
        assert_eq!(requests[0].history.len(), 1);
        assert_eq!(requests[1].history.len(), 2);
        assert_eq!(
            requests[0].tool_names,
            vec!["get_repository_info", "list_contents", "read_file"]
        );
    }

    #[tokio::test]
    async fn test_tool_failure_is_fed_back_and_session_survives() {
        let controller = controller(
            vec![
                ModelReply::invocations(vec![call(
                    "list_contents",
                    json!({"owner": "acme", "repo": "widget", "path": "nope"}),
                )]),
                ModelReply::text("There is no nope directory."),
                ModelReply::text("Sure."),
            ],
            RecordingAccess::new(),
        );
        let mut session = controller.create_session("d");

        let answer = controller
            .submit_query(&mut session, "What is in nope/?")
            .await
            .unwrap();
        assert_eq!(answer, "There is no nope directory.");

        let results = exchange_results(&session.history()[1]);
        match &results[0].outcome {
            ToolOutcome::Failure(description) => assert!(description.contains("Not found")),
            other => panic!("expected failure, got {:?}", other),
        }

        let second = controller.submit_query(&mut session, "Thanks").await.unwrap();
        assert_eq!(second, "Sure.");
        assert_eq!(session.history().len(), 5);
    }

    #[tokio::test]
    async fn test_unknown_tool_runs_nothing() {
        let controller = controller(
            vec![
                ModelReply::invocations(vec![
                    call("get_repository_info", json!({"owner": "acme", "repo": "widget"})),
                    call("delete_repository", json!({"owner": "acme"})),
                ]),
                ModelReply::text("Hello again."),
            ],
            RecordingAccess::new().with_repository(widget_metadata()),
        );
        let mut session = controller.create_session("d");

        let err = controller
            .submit_query(&mut session, "Delete it")
            .await
            .unwrap_err();

        assert!(matches!(err, SessionError::UnknownTool(ref name) if name == "delete_repository"));
        assert!(controller.access.calls().is_empty());
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.state(), SessionState::Idle);

        let answer = controller.submit_query(&mut session, "Hi").await.unwrap();
        assert_eq!(answer, "Hello again.");
    }

    #[tokio::test]
    async fn test_malformed_invocation_is_fatal() {
        let controller = controller(
            vec![ModelReply::invocations(vec![call(
                "get_repository_info",
                json!({"owner": "acme"}),
            )])],
            RecordingAccess::new(),
        );
        let mut session = controller.create_session("d");

        let err = controller
            .submit_query(&mut session, "Info?")
            .await
            .unwrap_err();

        match err {
            SessionError::MalformedInvocation { tool, reason } => {
                assert_eq!(tool, "get_repository_info");
                assert!(reason.contains("`repo`"));
            }
            other => panic!("expected MalformedInvocation, got {:?}", other),
        }
        assert!(controller.access.calls().is_empty());
        assert_eq!(controller.model.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_invocations_run_in_emitted_order() {
        let script = || {
            vec![
                ModelReply::invocations(vec![call(
                    "list_contents",
                    json!({"owner": "acme", "repo": "widget", "path": "src"}),
                )]),
                ModelReply::invocations(vec![
                    call("read_file", json!({"download_url": "https://raw/src/main.rs"})),
                    call("read_file", json!({"download_url": "https://raw/src/lib.rs"})),
                    call(
                        "get_repository_info",
                        json!(r#"{"owner": "acme", "repo": "widget"}"#),
                    ),
                ]),
                ModelReply::text("main.rs calls into lib.rs."),
            ]
        };
        let access = || {
            RecordingAccess::new()
                .with_repository(widget_metadata())
                .with_directory("src", vec![file_entry("src/main.rs"), file_entry("src/lib.rs")])
                .with_file("https://raw/src/main.rs", "fn main() { widget::run() }")
                .with_file("https://raw/src/lib.rs", "pub fn run() {}")
        };

        let mut traces = Vec::new();
        for _ in 0..2 {
            let controller = controller(script(), access());
            let mut session = controller.create_session("d");
            controller
                .submit_query(&mut session, "How does main work?")
                .await
                .unwrap();
            traces.push(controller.access.calls());
        }

        assert_eq!(
            traces[0],
            vec![
                "list_contents acme/widget:src @default",
                "read_file https://raw/src/main.rs",
                "read_file https://raw/src/lib.rs",
                "get_repository_info acme/widget",
            ]
        );
        assert_eq!(traces[0], traces[1]);
    }

    #[tokio::test]
    async fn test_model_only_sees_answered_invocations() {
        let controller = controller(
            vec![
                ModelReply::invocations(vec![call(
                    "list_contents",
                    json!({"owner": "acme", "repo": "widget", "path": "src"}),
                )]),
                ModelReply::invocations(vec![
                    call("read_file", json!({"download_url": "https://raw/src/main.rs"})),
                    call("read_file", json!({"download_url": "https://raw/missing.rs"})),
                ]),
                ModelReply::text("Done."),
            ],
            RecordingAccess::new()
                .with_directory("src", vec![file_entry("src/main.rs")])
                .with_file("https://raw/src/main.rs", "fn main() {}"),
        );
        let mut session = controller.create_session("d");
        controller.submit_query(&mut session, "Read src").await.unwrap();

        for request in controller.model.requests() {
            let last = request.history.last().unwrap();
            match &last.content {
                TurnContent::Text(_) => assert_eq!(last.role, Role::User),
                TurnContent::ToolExchange { results, .. } => assert!(!results.is_empty()),
            }
        }

        let results = exchange_results(&session.history()[2]);
        assert_eq!(results.len(), 2);
        assert!(results[0].outcome.is_success());
        assert!(!results[1].outcome.is_success());
    }

    #[tokio::test]
    async fn test_encoded_arguments_are_replayed_as_objects() {
        let controller = controller(
            vec![
                ModelReply::invocations(vec![call(
                    "get_repository_info",
                    json!(r#"{"owner": "acme", "repo": "widget"}"#),
                )]),
                ModelReply::text("A widget toolkit."),
            ],
            RecordingAccess::new().with_repository(widget_metadata()),
        );
        let mut session = controller.create_session("d");
        controller.submit_query(&mut session, "What is it?").await.unwrap();

        let messages = crate::agent::ollama::build_messages("d", session.history());
        let wire = serde_json::to_value(&messages[2]).unwrap();
        assert_eq!(wire["role"], "assistant");
        assert_eq!(
            wire["tool_calls"][0]["function"]["arguments"],
            json!({"owner": "acme", "repo": "widget"})
        );
    }

    #[tokio::test]
    async fn test_model_failure_keeps_history_valid() {
        let controller = Controller::new(
            ScriptedModel::new(vec![
                Err(ModelError::Connection("http://localhost:11434".to_string())),
                Ok(ModelReply::text("Back online.")),
            ]),
            RecordingAccess::new(),
            &ModelConfig::default(),
        );
        let mut session = controller.create_session("d");

        let err = controller
            .submit_query(&mut session, "Hello?")
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Model(ModelError::Connection(_))));
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.history().len(), 1);

        let answer = controller.submit_query(&mut session, "Hello?").await.unwrap();
        assert_eq!(answer, "Back online.");
    }

    #[tokio::test]
    async fn test_round_limit() {
        let mut config = ModelConfig::default();
        config.max_tool_rounds = 2;
        let looping = || {
            ModelReply::invocations(vec![call(
                "get_repository_info",
                json!({"owner": "acme", "repo": "widget"}),
            )])
        };

        let controller = Controller::new(
            ScriptedModel::replying(vec![looping(), looping(), looping()]),
            RecordingAccess::new().with_repository(widget_metadata()),
            &config,
        );
        let mut session = controller.create_session("d");

        let err = controller
            .submit_query(&mut session, "Loop")
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::RoundLimitExceeded(2)));
        assert_eq!(controller.access.calls().len(), 2);
        assert_eq!(session.history().len(), 3);
    }

    #[test]
    fn test_system_directive_focus() {
        let plain = system_directive(None);
        assert!(plain.contains("list_contents"));
        assert!(!plain.contains("GITBAE"));

        let focused = system_directive(Some(("acme", "widget")));
        assert!(focused.starts_with(&plain));
        assert!(focused.contains("acme/widget"));
    }
}
