// Simulator-side control loop
// Each cycle: pick up a new command, drive the actuators, step the vehicle,
// publish status. Nothing in the loop is fatal; errors are logged and the
// next cycle retries.

use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};
use zenoh::Session;

use crate::config::{ExchangeArgs, KEY_COMMAND, KEY_STATUS, Transport};
use crate::exchange::{CommandReader, FileMailbox, Mailbox, StatusWriter, ZenohMailbox};
use crate::messages::{Action, VehicleCommand};
use crate::vehicle::{DriveState, KinematicVehicle, Vehicle};

pub struct Controller<M, V> {
    commands: CommandReader<M>,
    status: StatusWriter<M>,
    drive: DriveState,
    vehicle: V,
}

impl<M: Mailbox, V: Vehicle> Controller<M, V> {
    pub fn new(command_mailbox: M, status_mailbox: M, vehicle: V) -> Self {
        Self::from_parts(
            CommandReader::new(command_mailbox),
            StatusWriter::new(status_mailbox),
            vehicle,
        )
    }

    pub fn from_parts(commands: CommandReader<M>, status: StatusWriter<M>, vehicle: V) -> Self {
        Self {
            commands,
            status,
            drive: DriveState::new(),
            vehicle,
        }
    }

    pub fn drive(&self) -> &DriveState {
        &self.drive
    }

    pub fn vehicle(&self) -> &V {
        &self.vehicle
    }

    pub fn vehicle_mut(&mut self) -> &mut V {
        &mut self.vehicle
    }

    pub fn last_applied(&self) -> Option<f64> {
        self.commands.last_applied()
    }

    /// Treat a command already waiting at startup as handled
    pub async fn ignore_pending(&mut self) {
        self.commands.prime().await;
    }

    /// Map a command onto the actuators
    fn on_command(&mut self, cmd: &VehicleCommand) {
        let signals = self.drive.command(cmd.action, cmd.magnitude());
        debug!(
            "Wheel signals: left={:.2}, right={:.2} rad/s, gear={:?}",
            signals.left,
            signals.right,
            self.drive.gear()
        );
        if let Err(e) = self.vehicle.apply(signals) {
            warn!("Failed to apply {}: {}", cmd.action, e);
        }
    }

    /// Zero the wheel setpoints, e.g. on shutdown
    pub fn stop(&mut self) {
        let signals = self.drive.command(Action::Stop, 0.0);
        if let Err(e) = self.vehicle.apply(signals) {
            warn!("Failed to stop vehicle: {}", e);
        }
    }

    /// One control cycle of length `dt`
    pub async fn tick(&mut self, dt: Duration) {
        // 1. New command, if any (stale ones are filtered by the reader)
        if let Some(cmd) = self.commands.poll().await {
            self.on_command(&cmd);
        }

        // 2. Advance the vehicle
        self.vehicle.step(dt);

        // 3. Publish status, even when sensors are down
        let reading = self.vehicle.read();
        if let Err(e) = self.status.publish(reading, self.drive.gear()).await {
            warn!("Failed to write status, retrying next cycle: {}", e);
        }
    }
}

/// Drive `controller` at a fixed period until ctrl-c
pub async fn run_loop<M: Mailbox, V: Vehicle>(controller: &mut Controller<M, V>, period: Duration) {
    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = tick.tick() => controller.tick(period).await,
            _ = &mut shutdown => {
                info!("Shutting down controller");
                break;
            }
        }
    }

    // Leave the vehicle stopped when the loop goes away
    controller.stop();
}

async fn run_with<M: Mailbox>(command: M, status: M, period: Duration) {
    info!(
        "Controller started: {}ms period, commands from {}, status to {}",
        period.as_millis(),
        command.describe(),
        status.describe()
    );

    let mut controller = Controller::new(command, status, KinematicVehicle::new());
    controller.ignore_pending().await;
    run_loop(&mut controller, period).await;
}

pub async fn run(args: &ExchangeArgs) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let period = args.poll_interval();

    match args.transport {
        Transport::File => {
            let command = FileMailbox::new(args.command_path());
            let status = FileMailbox::new(args.status_path());
            run_with(command, status, period).await;
        }
        Transport::Zenoh => {
            info!("Opening Zenoh session...");
            let session: Session = zenoh::open(zenoh::Config::default()).await?;
            let command = ZenohMailbox::declare(&session, KEY_COMMAND).await?;
            let status = ZenohMailbox::declare(&session, KEY_STATUS).await?;
            run_with(command, status, period).await;
        }
    }
    Ok(())
}
