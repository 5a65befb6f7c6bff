//! Nullable audience — a controllable set of connected recipients.

use std::collections::HashSet;
use std::sync::Mutex;

use voteparty_types::{Audience, DispatchError};

/// An in-memory set of online recipients that records delivered messages.
#[derive(Default)]
pub struct NullAudience {
    online: Mutex<Vec<String>>,
    unreachable: Mutex<HashSet<String>>,
    messages: Mutex<Vec<(String, String)>>,
    broadcasts: Mutex<Vec<String>>,
}

impl NullAudience {
    pub fn new() -> Self {
        Self::default()
    }

    /// An audience with `recipients` online, in that order.
    pub fn with_online<I, S>(recipients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let audience = Self::new();
        for r in recipients {
            audience.join(r);
        }
        audience
    }

    pub fn join(&self, recipient: impl Into<String>) {
        let recipient = recipient.into();
        let mut online = self.online.lock().unwrap();
        if !online.contains(&recipient) {
            online.push(recipient);
        }
    }

    pub fn leave(&self, recipient: &str) {
        self.online.lock().unwrap().retain(|r| r != recipient);
    }

    /// Make message delivery to `recipient` fail while they stay online.
    pub fn make_unreachable(&self, recipient: impl Into<String>) {
        self.unreachable.lock().unwrap().insert(recipient.into());
    }

    /// Successfully delivered `(recipient, message)` pairs, in order.
    pub fn messages(&self) -> Vec<(String, String)> {
        self.messages.lock().unwrap().clone()
    }

    pub fn messages_to(&self, recipient: &str) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(r, _)| r == recipient)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn broadcasts(&self) -> Vec<String> {
        self.broadcasts.lock().unwrap().clone()
    }
}

impl Audience for NullAudience {
    fn online_recipients(&self) -> Vec<String> {
        self.online.lock().unwrap().clone()
    }

    fn is_online(&self, recipient: &str) -> bool {
        self.online.lock().unwrap().iter().any(|r| r == recipient)
    }

    fn send_message(&self, recipient: &str, message: &str) -> Result<(), DispatchError> {
        if self.unreachable.lock().unwrap().contains(recipient) {
            return Err(DispatchError::Delivery {
                recipient: recipient.to_string(),
                reason: "connection reset".to_string(),
            });
        }
        self.messages
            .lock()
            .unwrap()
            .push((recipient.to_string(), message.to_string()));
        Ok(())
    }

    fn broadcast(&self, message: &str) -> Result<(), DispatchError> {
        self.broadcasts.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_leave_and_deliver() {
        let audience = NullAudience::with_online(["alice", "bob"]);
        audience.join("alice");
        assert_eq!(audience.online_recipients(), vec!["alice", "bob"]);
        audience.leave("alice");
        assert!(!audience.is_online("alice"));

        audience.make_unreachable("bob");
        assert!(audience.send_message("bob", "hi").is_err());
        assert!(audience.messages().is_empty());
    }
}
