//! Deterministic oracle double for unit tests
//!
//! Responses are keyed by a substring of the rendered command line. Each key
//! holds a queue; the last queued response is sticky so a listing can be
//! scripted as "first tick, second tick, every tick after".

#![allow(clippy::unwrap_used)] // Test helper can use unwrap

use super::{display_command, CommandOracle, CommandOutput, OracleError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

type Scripted = Result<CommandOutput, String>;

#[derive(Default)]
pub(crate) struct ScriptedOracle {
    rules: Mutex<Vec<(String, VecDeque<Scripted>)>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedOracle {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response for commands containing `pattern`
    pub(crate) fn on(self, pattern: &str, stdout: &str) -> Self {
        self.push(pattern, Ok(CommandOutput::ok(stdout)))
    }

    /// Queue a full output (any exit code) for commands containing `pattern`
    pub(crate) fn on_output(self, pattern: &str, output: CommandOutput) -> Self {
        self.push(pattern, Ok(output))
    }

    /// Queue an oracle failure for commands containing `pattern`
    pub(crate) fn on_error(self, pattern: &str, message: &str) -> Self {
        self.push(pattern, Err(message.to_string()))
    }

    fn push(self, pattern: &str, response: Scripted) -> Self {
        {
            let mut rules = self.rules.lock().unwrap();
            match rules.iter_mut().find(|(p, _)| p == pattern) {
                Some((_, queue)) => queue.push_back(response),
                None => rules.push((pattern.to_string(), VecDeque::from([response]))),
            }
        }
        self
    }

    /// Every command line run so far, in order
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn count_calls(&self, pattern: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.contains(pattern))
            .count()
    }
}

#[async_trait]
impl CommandOracle for ScriptedOracle {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, OracleError> {
        let command = display_command(program, args);
        self.calls.lock().unwrap().push(command.clone());

        let mut rules = self.rules.lock().unwrap();
        let Some((_, queue)) = rules.iter_mut().find(|(p, _)| command.contains(p.as_str()))
        else {
            return Ok(CommandOutput::ok(""));
        };

        let response = if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().unwrap()
        };

        response.map_err(OracleError::Unavailable)
    }
}
