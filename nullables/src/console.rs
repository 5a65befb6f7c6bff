//! Nullable console — records reward commands instead of running them.

use std::sync::Mutex;

use voteparty_types::{CommandExecutor, DispatchError};

/// A command executor that records every command it is asked to run.
///
/// Commands containing any configured failure pattern are rejected (and
/// still recorded as attempted).
#[derive(Default)]
pub struct NullCommandExecutor {
    attempted: Mutex<Vec<String>>,
    fail_patterns: Mutex<Vec<String>>,
}

impl NullCommandExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every command containing `pattern` fail.
    pub fn fail_when_contains(&self, pattern: impl Into<String>) {
        self.fail_patterns.lock().unwrap().push(pattern.into());
    }

    /// All commands attempted, in order, including failed ones.
    pub fn attempted(&self) -> Vec<String> {
        self.attempted.lock().unwrap().clone()
    }

    /// Commands that succeeded, in order.
    pub fn executed(&self) -> Vec<String> {
        let patterns = self.fail_patterns.lock().unwrap();
        self.attempted
            .lock()
            .unwrap()
            .iter()
            .filter(|c| !patterns.iter().any(|p| c.contains(p.as_str())))
            .cloned()
            .collect()
    }

    /// How many attempted commands equal `command` exactly.
    pub fn count_of(&self, command: &str) -> usize {
        self.attempted
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == command)
            .count()
    }
}

impl CommandExecutor for NullCommandExecutor {
    fn execute(&self, command: &str) -> Result<(), DispatchError> {
        self.attempted.lock().unwrap().push(command.to_string());
        let patterns = self.fail_patterns.lock().unwrap();
        if let Some(pattern) = patterns.iter().find(|p| command.contains(p.as_str())) {
            return Err(DispatchError::Command {
                command: command.to_string(),
                reason: format!("rejected by pattern '{pattern}'"),
            });
        }
        Ok(())
    }
}
