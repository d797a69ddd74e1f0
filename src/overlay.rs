// Control-surface side of the exchange: shows status, sends commands

use std::fmt;

use clap::ValueEnum;
use tracing::{debug, info, warn};

use crate::autopilot::Autopilot;
use crate::exchange::{Clock, CommandWriter, LinkState, Mailbox, Result, StatusReader};
use crate::intent::interpret;
use crate::messages::{Action, VehicleCommand, VehicleStatus};
use crate::navigation::{PathPlanner, Point};

/// Who decided on a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CommandSource {
    Manual,
    Voice,
    Ai,
}

impl fmt::Display for CommandSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CommandSource::Manual => "manual",
            CommandSource::Voice => "voice",
            CommandSource::Ai => "ai",
        })
    }
}

pub struct Overlay<M, C> {
    status: StatusReader<M>,
    commands: CommandWriter<M, C>,
}

impl<M: Mailbox, C: Clock> Overlay<M, C> {
    pub fn new(status: StatusReader<M>, commands: CommandWriter<M, C>) -> Self {
        Self { status, commands }
    }

    /// Poll the status record once
    pub async fn refresh(&mut self) -> LinkState {
        self.status.poll().await
    }

    pub fn status(&self) -> &VehicleStatus {
        self.status.displayed()
    }

    pub fn link(&self) -> LinkState {
        self.status.link()
    }

    pub fn is_connected(&self) -> bool {
        self.status.is_connected()
    }

    /// Replace the pending command
    pub async fn send(
        &mut self,
        action: Action,
        magnitude: Option<f64>,
        source: CommandSource,
    ) -> Result<VehicleCommand> {
        let cmd = self.commands.send(action, magnitude).await?;
        info!("[{}] {} (magnitude {:.2})", source, cmd.action, cmd.magnitude());
        Ok(cmd)
    }

    /// Interpret a phrase and send the resulting command, if any
    pub async fn say(&mut self, text: &str, source: CommandSource) -> Result<Option<VehicleCommand>> {
        match interpret(text) {
            Some(i) => self.send(i.action, i.magnitude, source).await.map(Some),
            None => {
                warn!("[{}] No action recognized in {:?}", source, text);
                Ok(None)
            }
        }
    }

    /// Plan a route from the last reported position
    pub fn plan_route(&self, planner: &PathPlanner, goal: Point) -> Option<Autopilot> {
        let from = self.status().position;
        info!(
            "Planning route ({:.1}, {:.1}) -> ({:.1}, {:.1})",
            from.0, from.1, goal.0, goal.1
        );
        Autopilot::plan(planner, from, goal)
    }

    /// Run one autopilot step against the latest status. Sends a command
    /// only when the autopilot changes its mind; does nothing while the
    /// vehicle is not reporting.
    pub async fn follow(&mut self, pilot: &mut Autopilot) -> Result<Option<VehicleCommand>> {
        if !self.is_connected() {
            debug!("Autopilot waiting for vehicle status");
            return Ok(None);
        }
        let Some(maneuver) = pilot.decide(self.status()) else {
            return Ok(None);
        };
        let sent = self
            .send(maneuver.action, Some(maneuver.magnitude), CommandSource::Ai)
            .await;
        if sent.is_err() {
            pilot.resend();
        }
        sent.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{CommandReader, ManualClock, MemoryMailbox, StatusWriter};
    use crate::messages::{Gear, Kinematics};

    fn overlay() -> (Overlay<MemoryMailbox, ManualClock>, MemoryMailbox, MemoryMailbox) {
        let status = MemoryMailbox::new();
        let commands = MemoryMailbox::new();
        let overlay = Overlay::new(
            StatusReader::new(status.clone()),
            CommandWriter::new(commands.clone(), ManualClock::starting_at(1)),
        );
        (overlay, status, commands)
    }

    #[tokio::test]
    async fn test_say_reaches_controller_side() {
        let (mut overlay, _status, commands) = overlay();
        let mut reader = CommandReader::new(commands);

        let sent = overlay
            .say("turn left slowly", CommandSource::Voice)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sent.action, Action::TurnLeft);

        let received = reader.poll().await.unwrap();
        assert_eq!(received, sent);
    }

    #[tokio::test]
    async fn test_unrecognized_phrase_sends_nothing() {
        let (mut overlay, _status, commands) = overlay();
        assert!(overlay.say("sing a song", CommandSource::Ai).await.unwrap().is_none());
        assert!(commands.read().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_refresh_shows_status() {
        let (mut overlay, status, _commands) = overlay();
        assert!(!overlay.is_connected());

        let mut writer = StatusWriter::new(status);
        writer
            .publish(
                Some(Kinematics {
                    position: (4.0, 5.0),
                    speed_kmh: 20.0,
                    heading_deg: 90.0,
                }),
                Gear::Drive,
            )
            .await
            .unwrap();

        assert_eq!(overlay.refresh().await, LinkState::Connected);
        assert!(overlay.is_connected());
        assert_eq!(overlay.status().speed, 20.0);
    }

    #[tokio::test]
    async fn test_follow_waits_for_status() {
        let (mut overlay, _status, commands) = overlay();
        let mut pilot = Autopilot::new(vec![(10.0, 0.0)]);
        overlay.refresh().await;
        assert!(overlay.follow(&mut pilot).await.unwrap().is_none());
        assert!(commands.read().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_follow_sends_on_change_only() {
        let (mut overlay, status, commands) = overlay();
        let mut writer = StatusWriter::new(status);
        let mut reader = CommandReader::new(commands);
        let mut pilot = Autopilot::new(vec![(10.0, 0.0)]);

        writer
            .publish(Some(Kinematics::default()), Gear::Park)
            .await
            .unwrap();
        overlay.refresh().await;

        let sent = overlay.follow(&mut pilot).await.unwrap().unwrap();
        assert_eq!(sent.action, Action::Forward);
        assert_eq!(reader.poll().await.unwrap(), sent);

        assert!(overlay.follow(&mut pilot).await.unwrap().is_none());
        assert!(reader.poll().await.is_none());
    }
}
