// Vehicle commands: written by the overlay on demand, polled by the controller

use tracing::{debug, info, warn};

use super::clock::Clock;
use super::error::Result;
use super::mailbox::Mailbox;
use crate::messages::{Action, CommandRecord, VehicleCommand};

/// Writes the single pending command. A newer command replaces an older
/// one whether or not the controller has picked it up yet.
pub struct CommandWriter<M, C> {
    mailbox: M,
    clock: C,
    last_timestamp: f64,
}

impl<M: Mailbox, C: Clock> CommandWriter<M, C> {
    pub fn new(mailbox: M, clock: C) -> Self {
        Self {
            mailbox,
            clock,
            last_timestamp: 0.0,
        }
    }

    /// Timestamp for the next command: the clock, but never behind or equal
    /// to the previous one
    fn next_timestamp(&mut self) -> f64 {
        let ts = (self.clock.now_millis() as f64).max(self.last_timestamp + 1.0);
        self.last_timestamp = ts;
        ts
    }

    pub async fn send(&mut self, action: Action, magnitude: Option<f64>) -> Result<VehicleCommand> {
        let cmd = VehicleCommand {
            action,
            magnitude,
            timestamp: self.next_timestamp(),
        };
        let json = serde_json::to_vec(&cmd)?;
        self.mailbox.write(&json).await?;
        debug!("Sent command: {:?}", &cmd);
        Ok(cmd)
    }
}

/// Polls for commands and hands each new one out exactly once
pub struct CommandReader<M> {
    mailbox: M,
    last_applied: Option<f64>,
}

impl<M: Mailbox> CommandReader<M> {
    pub fn new(mailbox: M) -> Self {
        Self {
            mailbox,
            last_applied: None,
        }
    }

    /// Start from a known last-applied timestamp
    pub fn with_last_applied(mailbox: M, timestamp: f64) -> Self {
        Self {
            mailbox,
            last_applied: Some(timestamp),
        }
    }

    pub fn last_applied(&self) -> Option<f64> {
        self.last_applied
    }

    /// Mark whatever command is already waiting as applied, without applying
    /// it. Used at startup so a leftover command does not move the vehicle.
    pub async fn prime(&mut self) {
        match self.fetch().await {
            Ok(Some(record)) => {
                info!(
                    "Ignoring leftover command '{}' (timestamp {})",
                    record.action, record.timestamp
                );
                self.last_applied = Some(record.timestamp);
            }
            Ok(None) => {}
            Err(e) => debug!("Nothing to prime from {}: {}", self.mailbox.describe(), e),
        }
    }

    /// Run one poll cycle. Returns the command to apply, if a new valid one
    /// arrived; unreadable or stale records yield `None`.
    pub async fn poll(&mut self) -> Option<VehicleCommand> {
        let record = match self.fetch().await {
            Ok(Some(record)) => record,
            Ok(None) => return None,
            Err(e) => {
                debug!("Command read failed, retrying next cycle: {}", e);
                return None;
            }
        };

        if self.last_applied.is_some_and(|last| record.timestamp <= last) {
            return None;
        }
        // Seen from here on, valid or not, so a bad record is reported once
        self.last_applied = Some(record.timestamp);

        match VehicleCommand::try_from(record) {
            Ok(cmd) => {
                info!("Received command: {:?}", &cmd);
                Some(cmd)
            }
            Err(e) => {
                warn!("Ignoring command: {}", e);
                None
            }
        }
    }

    async fn fetch(&self) -> Result<Option<CommandRecord>> {
        match self.mailbox.read().await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}
