//! Reward rules and vote party distribution modes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Placeholder substituted with the recipient identifier in reward commands.
pub const PLAYER_PLACEHOLDER: &str = "%player%";

/// A single reward command template, e.g. `give %player% diamond 1`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RewardRule {
    pub command_template: String,
}

impl RewardRule {
    pub fn new(command_template: impl Into<String>) -> Self {
        Self {
            command_template: command_template.into(),
        }
    }

    /// The command with `%player%` bound to `recipient`.
    pub fn render_for(&self, recipient: &str) -> String {
        self.command_template.replace(PLAYER_PLACEHOLDER, recipient)
    }

    /// The command as configured, with no recipient substitution.
    pub fn render_unbound(&self) -> &str {
        &self.command_template
    }
}

impl From<&str> for RewardRule {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Ordered reward rules. Order is execution order.
pub type RewardSet = Vec<RewardRule>;

/// Who receives vote party rewards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DistributionMode {
    /// Every connected recipient gets the full reward set bound to themselves.
    Individual,
    /// The reward set runs once for the whole server.
    ServerWide,
}

impl DistributionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistributionMode::Individual => "individual",
            DistributionMode::ServerWide => "server-wide",
        }
    }
}

impl fmt::Display for DistributionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unknown distribution mode '{0}'")]
pub struct UnknownDistributionMode(pub String);

impl FromStr for DistributionMode {
    type Err = UnknownDistributionMode;

    /// Case-insensitive, surrounding whitespace ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "individual" => Ok(DistributionMode::Individual),
            "server-wide" => Ok(DistributionMode::ServerWide),
            _ => Err(UnknownDistributionMode(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_substitutes_every_placeholder() {
        let rule = RewardRule::new("give %player% diamond; say thanks %player%");
        assert_eq!(
            rule.render_for("alice"),
            "give alice diamond; say thanks alice"
        );
    }

    #[test]
    fn render_unbound_keeps_template() {
        let rule = RewardRule::new("broadcast %player%");
        assert_eq!(rule.render_unbound(), "broadcast %player%");
    }

    #[test]
    fn parse_modes() {
        assert_eq!("individual".parse(), Ok(DistributionMode::Individual));
        assert_eq!(" Server-Wide ".parse(), Ok(DistributionMode::ServerWide));
        assert!("everyone".parse::<DistributionMode>().is_err());
    }
}
