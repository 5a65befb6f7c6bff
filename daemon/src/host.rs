//! Host-side collaborators for running the tally outside a game server.

use std::collections::HashSet;
use std::process::Command;
use std::sync::{PoisonError, RwLock};

use voteparty_types::{Audience, CommandExecutor, DispatchError};

/// Runs reward commands. By default each command is printed to stdout;
/// with `shell` set it is executed through `sh -c`.
pub struct ConsoleExecutor {
    shell: bool,
}

impl ConsoleExecutor {
    pub fn new(shell: bool) -> Self {
        Self { shell }
    }
}

impl CommandExecutor for ConsoleExecutor {
    fn execute(&self, command: &str) -> Result<(), DispatchError> {
        if !self.shell {
            println!("> {command}");
            return Ok(());
        }

        let failed = |reason: String| DispatchError::Command {
            command: command.to_string(),
            reason,
        };
        let status = Command::new("sh")
            .arg("-c")
            .arg(command)
            .status()
            .map_err(|e| failed(e.to_string()))?;
        if status.success() {
            Ok(())
        } else {
            Err(failed(format!("exited with {status}")))
        }
    }
}

/// A fixed list of online recipients given on the command line.
/// Messages are written to stdout.
pub struct StaticAudience {
    online: RwLock<Vec<String>>,
}

impl StaticAudience {
    pub fn new(online: Vec<String>) -> Self {
        let mut seen = HashSet::new();
        let online = online
            .into_iter()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty() && seen.insert(r.clone()))
            .collect();
        Self {
            online: RwLock::new(online),
        }
    }
}

impl Audience for StaticAudience {
    fn online_recipients(&self) -> Vec<String> {
        self.online
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn is_online(&self, recipient: &str) -> bool {
        self.online
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|r| r == recipient)
    }

    fn send_message(&self, recipient: &str, message: &str) -> Result<(), DispatchError> {
        println!("[to {recipient}] {message}");
        Ok(())
    }

    fn broadcast(&self, message: &str) -> Result<(), DispatchError> {
        println!("[broadcast] {message}");
        Ok(())
    }
}
