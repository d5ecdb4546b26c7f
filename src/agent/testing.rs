//! Test doubles for the controller: a scripted model and a recording
//! repository backend.

use super::model::{ChatModel, ModelReply, ModelRequest};
use crate::error::{AccessError, ModelError};
use crate::github::RepositoryAccess;
use crate::models::{
    ContentEntry, ContentKind, ConversationTurn, RepositoryMetadata, RepositoryOwner,
    ToolInvocation,
};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

/// What the scripted model was shown on one call.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub system_directive: String,
    pub tool_names: Vec<String>,
    pub history: Vec<ConversationTurn>,
}

/// Replays a fixed sequence of replies and records every request.
#[derive(Default)]
pub struct ScriptedModel {
    replies: RefCell<VecDeque<Result<ModelReply, ModelError>>>,
    requests: RefCell<Vec<SeenRequest>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Result<ModelReply, ModelError>>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn replying(replies: Vec<ModelReply>) -> Self {
        Self::new(replies.into_iter().map(Ok).collect())
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.requests.borrow().clone()
    }
}

impl ChatModel for ScriptedModel {
    async fn complete(&self, request: ModelRequest<'_>) -> Result<ModelReply, ModelError> {
        self.requests.borrow_mut().push(SeenRequest {
            system_directive: request.system_directive.to_string(),
            tool_names: request.tools.iter().map(|t| t.name.to_string()).collect(),
            history: request.history.to_vec(),
        });

        self.replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| panic!("model invoked more often than scripted"))
    }
}

/// In-memory repository that logs every call in order.
#[derive(Default)]
pub struct RecordingAccess {
    repositories: HashMap<String, RepositoryMetadata>,
    directories: HashMap<String, Vec<ContentEntry>>,
    files: HashMap<String, String>,
    calls: RefCell<Vec<String>>,
}

impl RecordingAccess {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repository(mut self, metadata: RepositoryMetadata) -> Self {
        self.repositories.insert(metadata.full_name.clone(), metadata);
        self
    }

    pub fn with_directory(mut self, path: &str, entries: Vec<ContentEntry>) -> Self {
        self.directories.insert(path.to_string(), entries);
        self
    }

    pub fn with_file(mut self, url: &str, text: &str) -> Self {
        self.files.insert(url.to_string(), text.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl RepositoryAccess for RecordingAccess {
    async fn get_repository_info(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<RepositoryMetadata, AccessError> {
        let full_name = format!("{}/{}", owner, repo);
        self.calls
            .borrow_mut()
            .push(format!("get_repository_info {}", full_name));
        self.repositories
            .get(&full_name)
            .cloned()
            .ok_or(AccessError::NotFound(full_name))
    }

    async fn list_contents(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        branch: Option<&str>,
    ) -> Result<Vec<ContentEntry>, AccessError> {
        self.calls.borrow_mut().push(format!(
            "list_contents {}/{}:{} @{}",
            owner,
            repo,
            path,
            branch.unwrap_or("default")
        ));
        self.directories
            .get(path)
            .cloned()
            .ok_or_else(|| AccessError::NotFound(format!("{}/{}:{}", owner, repo, path)))
    }

    async fn read_file(&self, download_url: &str) -> Result<String, AccessError> {
        self.calls
            .borrow_mut()
            .push(format!("read_file {}", download_url));
        self.files
            .get(download_url)
            .cloned()
            .ok_or_else(|| AccessError::NotFound(download_url.to_string()))
    }
}

pub fn widget_metadata() -> RepositoryMetadata {
    RepositoryMetadata {
        name: "widget".to_string(),
        full_name: "acme/widget".to_string(),
        description: Some("A widget toolkit".to_string()),
        owner: RepositoryOwner {
            login: "acme".to_string(),
            kind: None,
        },
        html_url: "https://github.com/acme/widget".to_string(),
        default_branch: "main".to_string(),
        language: Some("Rust".to_string()),
        stargazers_count: 0,
        forks_count: 0,
        open_issues_count: 0,
        topics: Vec::new(),
        license: None,
        private: false,
        archived: false,
        fork: false,
        homepage: None,
        created_at: None,
        updated_at: None,
        pushed_at: None,
    }
}

pub fn file_entry(path: &str) -> ContentEntry {
    ContentEntry {
        name: path.rsplit('/').next().unwrap_or(path).to_string(),
        path: path.to_string(),
        kind: ContentKind::File,
        size: 0,
        download_url: Some(format!("https://raw/{}", path)),
    }
}

pub fn call(name: &str, arguments: Value) -> ToolInvocation {
    ToolInvocation::new(name, arguments)
}
