//! Tool registry for the repository assistant.
//!
//! This module declares the three retrieval tools the model may call,
//! validates invocation arguments against their schemas, and dispatches
//! validated calls to a [`RepositoryAccess`] implementation.

use crate::error::{SessionError, ToolError};
use crate::github::RepositoryAccess;
use crate::models::{ParameterSpec, ParameterType, ToolInvocation, ToolSpec};
use futures::future::LocalBoxFuture;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Validated argument bindings.
pub type Arguments = Map<String, Value>;

/// Future returned by a tool handler.
pub type ToolFuture<'a> = LocalBoxFuture<'a, Result<Value, ToolError>>;

/// Handler bound to a tool name. Receives arguments that already passed
/// schema validation.
pub type ToolHandler<R> = for<'a> fn(&'a R, &'a Arguments) -> ToolFuture<'a>;

/// Fixed mapping from tool name to (spec, handler).
pub struct ToolRegistry<R> {
    specs: Arc<[ToolSpec]>,
    handlers: HashMap<&'static str, ToolHandler<R>>,
}

/// An invocation that resolved to a registered tool and passed validation.
pub struct ResolvedCall<R> {
    pub invocation: ToolInvocation,
    arguments: Arguments,
    handler: ToolHandler<R>,
}

impl<R> ResolvedCall<R> {
    /// Run the handler against the access layer.
    pub async fn execute(&self, access: &R) -> Result<Value, ToolError> {
        (self.handler)(access, &self.arguments).await
    }
}

impl<R: RepositoryAccess> ToolRegistry<R> {
    /// The three repository tools.
    pub fn repository_tools() -> Self {
        Self::new(vec![
            (get_repository_info_spec(), get_repository_info::<R> as ToolHandler<R>),
            (list_contents_spec(), list_contents::<R> as ToolHandler<R>),
            (read_file_spec(), read_file::<R> as ToolHandler<R>),
        ])
    }
}

impl<R> ToolRegistry<R> {
    /// Build a registry. Later duplicates of a name are ignored.
    pub fn new(tools: Vec<(ToolSpec, ToolHandler<R>)>) -> Self {
        let mut specs = Vec::with_capacity(tools.len());
        let mut handlers = HashMap::with_capacity(tools.len());

        for (spec, handler) in tools {
            if handlers.contains_key(spec.name) {
                warn!("Ignoring duplicate tool registration: {}", spec.name);
                continue;
            }
            handlers.insert(spec.name, handler);
            specs.push(spec);
        }

        Self {
            specs: specs.into(),
            handlers,
        }
    }

    /// Shared handle to the tool specs, in registration order.
    pub fn specs(&self) -> Arc<[ToolSpec]> {
        Arc::clone(&self.specs)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Resolve an invocation to its handler and validate its arguments.
    pub fn resolve(&self, invocation: &ToolInvocation) -> Result<ResolvedCall<R>, SessionError> {
        let (spec, handler) = self
            .specs
            .iter()
            .find(|s| s.name == invocation.name)
            .and_then(|s| self.handlers.get(s.name).map(|h| (s, *h)))
            .ok_or_else(|| SessionError::UnknownTool(invocation.name.clone()))?;

        let arguments = validate_arguments(spec, &invocation.arguments).map_err(|reason| {
            SessionError::MalformedInvocation {
                tool: invocation.name.clone(),
                reason,
            }
        })?;

        debug!("Resolved {} with {:?}", spec.name, arguments);

        // History keeps the decoded object, which is what gets replayed.
        Ok(ResolvedCall {
            invocation: ToolInvocation::new(spec.name, Value::Object(arguments.clone())),
            arguments,
            handler,
        })
    }
}

/// Check arguments strictly against a tool's schema.
///
/// Accepts an object, a JSON string holding an object, or `null` for
/// "no arguments". Unknown keys, missing required keys, and type
/// mismatches are rejected. Optional keys bound to `null` are dropped.
pub fn validate_arguments(spec: &ToolSpec, raw: &Value) -> Result<Arguments, String> {
    let object = match raw {
        Value::Object(map) => map.clone(),
        Value::Null => Map::new(),
        Value::String(encoded) => match serde_json::from_str::<Value>(encoded) {
            Ok(Value::Object(map)) => map,
            _ => return Err("arguments must be a JSON object".to_string()),
        },
        _ => return Err("arguments must be a JSON object".to_string()),
    };

    let mut validated = Map::new();
    for (key, value) in object {
        let param = spec
            .parameter(&key)
            .ok_or_else(|| format!("unexpected argument `{}`", key))?;

        if value.is_null() {
            if param.required {
                return Err(format!("required argument `{}` is null", key));
            }
            continue;
        }

        if !param.kind.accepts(&value) {
            return Err(format!(
                "argument `{}` must be a {}, got {}",
                key,
                param.kind.as_str(),
                value
            ));
        }

        validated.insert(key, value);
    }

    if let Some(missing) = spec
        .parameters
        .iter()
        .find(|p| p.required && !validated.contains_key(p.name))
    {
        return Err(format!("missing required argument `{}`", missing.name));
    }

    Ok(validated)
}

fn required_str<'a>(args: &'a Arguments, name: &str) -> Result<&'a str, ToolError> {
    optional_str(args, name)
        .ok_or_else(|| ToolError::Arguments(format!("missing string argument `{}`", name)))
}

fn optional_str<'a>(args: &'a Arguments, name: &str) -> Option<&'a str> {
    args.get(name).and_then(Value::as_str)
}

fn get_repository_info<'a, R: RepositoryAccess>(access: &'a R, args: &'a Arguments) -> ToolFuture<'a> {
    Box::pin(async move {
        let owner = required_str(args, "owner")?;
        let repo = required_str(args, "repo")?;
        let metadata = access.get_repository_info(owner, repo).await?;
        Ok(serde_json::to_value(metadata)?)
    })
}

fn list_contents<'a, R: RepositoryAccess>(access: &'a R, args: &'a Arguments) -> ToolFuture<'a> {
    Box::pin(async move {
        let owner = required_str(args, "owner")?;
        let repo = required_str(args, "repo")?;
        let path = optional_str(args, "path").unwrap_or("");
        let branch = optional_str(args, "branch").filter(|b| !b.is_empty());
        let entries = access.list_contents(owner, repo, path, branch).await?;
        Ok(serde_json::to_value(entries)?)
    })
}

fn read_file<'a, R: RepositoryAccess>(access: &'a R, args: &'a Arguments) -> ToolFuture<'a> {
    Box::pin(async move {
        let url = required_str(args, "download_url")?;
        let text = access.read_file(url).await?;
        Ok(Value::String(text))
    })
}

fn owner_param() -> ParameterSpec {
    ParameterSpec {
        name: "owner",
        kind: ParameterType::String,
        required: true,
        description: "The username or organization name that owns the repository.",
    }
}

fn repo_param() -> ParameterSpec {
    ParameterSpec {
        name: "repo",
        kind: ParameterType::String,
        required: true,
        description: "The name of the repository.",
    }
}

fn get_repository_info_spec() -> ToolSpec {
    ToolSpec {
        name: "get_repository_info",
        description: "Retrieve information about a GitHub repository: name, description, \
                      owner, URL, default branch, language, stars, topics and license.",
        parameters: vec![owner_param(), repo_param()],
    }
}

fn list_contents_spec() -> ToolSpec {
    ToolSpec {
        name: "list_contents",
        description: "List the files and directories at a path in a GitHub repository. \
                      Each entry has name, path, type (file or dir) and download_url. \
                      Listing a file path returns that single file.",
        parameters: vec![
            owner_param(),
            repo_param(),
            ParameterSpec {
                name: "path",
                kind: ParameterType::String,
                required: false,
                description: "Path inside the repository. Omit or use \"\" for the root.",
            },
            ParameterSpec {
                name: "branch",
                kind: ParameterType::String,
                required: false,
                description: "Branch, tag or commit. Omit to use the repository's default branch.",
            },
        ],
    }
}

fn read_file_spec() -> ToolSpec {
    ToolSpec {
        name: "read_file",
        description: "Read the text content of a file, given the download_url from a \
                      list_contents entry.",
        parameters: vec![ParameterSpec {
            name: "download_url",
            kind: ParameterType::String,
            required: true,
            description: "The download_url of the file to read.",
        }],
    }
}
