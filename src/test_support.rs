use std::collections::VecDeque;
use std::time::Duration;

use crate::error::AiError;
use crate::services::ai::{Completer, Sleeper};
use crate::services::prompts::INPUT_MARKER;
use crate::services::reconcile::parse_items;

/// Replays a fixed list of results and records every prompt it saw.
pub struct ScriptedCompleter {
    script: VecDeque<Result<String, AiError>>,
    pub prompts: Vec<String>,
}

impl ScriptedCompleter {
    pub fn new(script: Vec<Result<String, AiError>>) -> Self {
        Self {
            script: script.into(),
            prompts: Vec::new(),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.len()
    }
}

impl Completer for ScriptedCompleter {
    fn complete(&mut self, prompt: &str) -> Result<String, AiError> {
        self.prompts.push(prompt.to_string());
        self.script
            .pop_front()
            .unwrap_or_else(|| Err(AiError::Transport("script exhausted".into())))
    }
}

/// Answers every numbered-list prompt with `N. [vi] <item>` lines.
///
/// Prompts listed in `fail_containing` get a transport error instead.
#[derive(Default)]
pub struct EchoCompleter {
    pub fail_containing: Vec<String>,
    pub prompts: Vec<String>,
}

impl Completer for EchoCompleter {
    fn complete(&mut self, prompt: &str) -> Result<String, AiError> {
        self.prompts.push(prompt.to_string());

        let input = prompt
            .rsplit_once(INPUT_MARKER)
            .map(|(_, tail)| tail)
            .unwrap_or(prompt);

        if self.fail_containing.iter().any(|f| input.contains(f.as_str())) {
            return Err(AiError::Transport("unreachable".into()));
        }

        let items = parse_items(input);
        if !input.trim_start().starts_with("1.") {
            return Ok(format!("[vi] {}", input.trim()));
        }

        Ok(items
            .iter()
            .enumerate()
            .map(|(i, item)| format!("{}. [vi] {}", i + 1, item))
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

#[derive(Default)]
pub struct RecordingSleeper {
    pub sleeps: Vec<Duration>,
}

impl Sleeper for RecordingSleeper {
    fn sleep(&mut self, duration: Duration) {
        self.sleeps.push(duration);
    }
}
