//! Tool-calling assistant.
//!
//! The controller in [`session`] loops between a [`model::ChatModel`] and the
//! repository tools in [`tools`] until the model produces an answer.

pub mod model;
pub mod ollama;
pub mod session;
pub mod tools;

#[cfg(test)]
pub(crate) mod testing;

pub use model::ChatModel;
pub use ollama::OllamaClient;
pub use session::{system_directive, Controller, Session};
