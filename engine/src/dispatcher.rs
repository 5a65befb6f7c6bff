//! Reward dispatch for single votes and vote parties.
//!
//! Every action (one command, one message delivery) runs in isolation: its
//! error or panic is logged and counted, and the remaining actions proceed.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use voteparty_types::{Audience, CommandExecutor, DispatchError, DistributionMode, RewardRule};

use crate::stats::TallyStats;

/// What a dispatch call actually did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Recipients visited (individual mode) or reached by broadcast.
    pub recipients: usize,
    pub commands_executed: usize,
    pub failures: usize,
}

impl DispatchReport {
    fn absorb(&mut self, other: DispatchReport) {
        self.commands_executed += other.commands_executed;
        self.failures += other.failures;
    }
}

/// Run one collaborator action, turning a panic into an error.
fn guarded<F>(action: F, on_panic: impl FnOnce() -> DispatchError) -> Result<(), DispatchError>
where
    F: FnOnce() -> Result<(), DispatchError>,
{
    panic::catch_unwind(AssertUnwindSafe(action)).unwrap_or_else(|_| Err(on_panic()))
}

pub struct RewardDispatcher {
    console: Arc<dyn CommandExecutor>,
    audience: Arc<dyn Audience>,
    stats: Arc<TallyStats>,
}

impl RewardDispatcher {
    pub fn new(
        console: Arc<dyn CommandExecutor>,
        audience: Arc<dyn Audience>,
        stats: Arc<TallyStats>,
    ) -> Self {
        Self {
            console,
            audience,
            stats,
        }
    }

    fn execute(&self, command: &str) -> Result<(), DispatchError> {
        let console = &self.console;
        let result = guarded(
            || console.execute(command),
            || DispatchError::Command {
                command: command.to_string(),
                reason: "executor panicked".to_string(),
            },
        );
        if let Err(e) = &result {
            tracing::error!(command, error = %e, "reward command failed");
            self.stats.add_dispatch_failures(1);
        }
        result
    }

    fn deliver(&self, recipient: &str, message: &str) -> Result<(), DispatchError> {
        let audience = &self.audience;
        let result = guarded(
            || audience.send_message(recipient, message),
            || DispatchError::Delivery {
                recipient: recipient.to_string(),
                reason: "audience panicked".to_string(),
            },
        );
        if let Err(e) = &result {
            tracing::error!(recipient, error = %e, "message delivery failed");
            self.stats.add_dispatch_failures(1);
        }
        result
    }

    /// Run every rule with `%player%` bound to `subject_id`, in order.
    pub fn execute_rewards(&self, subject_id: &str, rewards: &[RewardRule]) -> DispatchReport {
        let mut report = DispatchReport::default();
        for rule in rewards {
            match self.execute(&rule.render_for(subject_id)) {
                Ok(()) => report.commands_executed += 1,
                Err(_) => report.failures += 1,
            }
        }
        report
    }

    /// Best-effort acknowledgement to a voter. Returns whether it was delivered.
    ///
    /// A blank message or an offline voter is a silent no-op.
    pub fn acknowledge_vote(&self, subject_id: &str, message: &str) -> bool {
        if message.trim().is_empty() {
            return false;
        }
        if !self.audience.is_online(subject_id) {
            tracing::debug!(subject = subject_id, "voter not online, skipping acknowledgement");
            return false;
        }
        self.deliver(subject_id, message).is_ok()
    }

    /// Distribute vote party rewards according to `mode`.
    ///
    /// An unrecognised mode is logged and nothing is dispatched.
    pub fn trigger_vote_party(
        &self,
        mode: &str,
        rewards: &[RewardRule],
        broadcast_message: &str,
        recipient_message: &str,
    ) -> DispatchReport {
        if rewards.is_empty() {
            tracing::warn!("vote party triggered but no rewards are configured");
        }

        match mode.parse::<DistributionMode>() {
            Ok(DistributionMode::Individual) => {
                self.distribute_individual(rewards, recipient_message)
            }
            Ok(DistributionMode::ServerWide) => {
                self.distribute_server_wide(rewards, broadcast_message)
            }
            Err(e) => {
                tracing::warn!(error = %e, "skipping vote party rewards");
                DispatchReport::default()
            }
        }
    }

    /// Every online recipient gets `message` and the full reward set bound
    /// to themselves. Nobody online means nothing happens.
    pub fn distribute_individual(&self, rewards: &[RewardRule], message: &str) -> DispatchReport {
        let recipients = self.audience.online_recipients();
        let mut report = DispatchReport::default();

        if recipients.is_empty() {
            tracing::warn!("vote party triggered but no recipients are online");
            return report;
        }

        let send_message = !message.trim().is_empty();
        for recipient in &recipients {
            if send_message && self.deliver(recipient, message).is_err() {
                report.failures += 1;
            }
            report.absorb(self.execute_rewards(recipient, rewards));
            report.recipients += 1;
        }

        tracing::info!(
            recipients = report.recipients,
            failures = report.failures,
            "vote party rewards distributed"
        );
        report
    }

    /// Broadcast `message` once, then run each rule once, unbound.
    /// Runs even when nobody is online.
    pub fn distribute_server_wide(&self, rewards: &[RewardRule], message: &str) -> DispatchReport {
        let mut report = DispatchReport {
            recipients: self.audience.online_recipients().len(),
            ..DispatchReport::default()
        };

        if !message.trim().is_empty() {
            let audience = &self.audience;
            let sent = guarded(
                || audience.broadcast(message),
                || DispatchError::Delivery {
                    recipient: "*".to_string(),
                    reason: "audience panicked".to_string(),
                },
            );
            if let Err(e) = sent {
                tracing::error!(error = %e, "vote party broadcast failed");
                self.stats.add_dispatch_failures(1);
                report.failures += 1;
            }
        }

        for rule in rewards {
            match self.execute(rule.render_unbound()) {
                Ok(()) => report.commands_executed += 1,
                Err(_) => report.failures += 1,
            }
        }

        tracing::info!(
            commands = report.commands_executed,
            failures = report.failures,
            "server-wide vote party triggered"
        );
        report
    }
}
