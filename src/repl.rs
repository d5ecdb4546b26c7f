//! Interactive read-line-and-print loop.

use crate::agent::{ChatModel, Controller, Session};
use crate::github::RepositoryAccess;
use crate::models::{ConversationTurn, TurnContent};
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{BufRead, Write};
use std::time::Duration;
use tracing::debug;

/// Printed before every answer.
pub const ANSWER_MARKER: &str = "GITBAE: ";

/// Typing this ends the loop without calling the model.
pub const EXIT_COMMAND: &str = "exit";

const PROMPT: &str = "USER: ";

/// Presentation switches for [`run`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplOptions {
    /// Show a spinner while a query is in flight.
    pub spinner: bool,
    /// Dump the history once the loop ends.
    pub show_history: bool,
}

pub fn format_answer(answer: &str) -> String {
    format!("{}{}", ANSWER_MARKER, answer)
}

/// Read queries from `input` until `exit` or end of input, printing each
/// answer to `output`. A failed query prints an error and the loop goes on.
pub async fn run<M, R, I, O>(
    controller: &Controller<M, R>,
    session: &mut Session,
    mut input: I,
    output: &mut O,
    options: ReplOptions,
) -> Result<()>
where
    M: ChatModel,
    R: RepositoryAccess,
    I: BufRead,
    O: Write,
{
    let mut line = String::new();

    loop {
        write!(output, "{}", PROMPT)?;
        output.flush()?;

        line.clear();
        let read = input
            .read_line(&mut line)
            .context("Failed to read from input")?;
        if read == 0 {
            writeln!(output)?;
            break;
        }

        let query = line.trim();
        if query == EXIT_COMMAND {
            break;
        }
        if query.is_empty() {
            continue;
        }

        let spinner = options.spinner.then(thinking_spinner);
        let result = controller.submit_query(session, query).await;
        if let Some(spinner) = spinner {
            spinner.finish_and_clear();
        }

        match result {
            Ok(answer) => writeln!(output, "{}\n", format_answer(&answer))?,
            Err(e) => writeln!(output, "Error: {}\n", e)?,
        }
    }

    debug!("Leaving loop after {} turns", session.history().len());

    if options.show_history {
        print_history(session.history(), output)?;
    }
    Ok(())
}

/// Print every turn as `role -> content`, separated by a rule.
pub fn print_history<O: Write>(history: &[ConversationTurn], output: &mut O) -> Result<()> {
    let rule = "-".repeat(80);
    for turn in history {
        writeln!(output, "{}", rule)?;
        let content = match &turn.content {
            TurnContent::Text(text) => text.clone(),
            exchange => serde_json::to_string(exchange)
                .context("Failed to encode history entry")?,
        };
        writeln!(output, "{} -> {}", turn.role, content)?;
    }
    writeln!(output, "{}", rule)?;
    Ok(())
}

fn thinking_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("Thinking...");
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}
