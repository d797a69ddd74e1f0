// Poll cadence, thresholds, shared record locations, drive constants
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, ValueEnum};

// Poll loop period on both sides of the exchange
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

// Consecutive status read failures before the link is flagged as lost
pub const FAILURE_THRESHOLD: u32 = 5;

// Intensity used when a command carries no magnitude
pub const DEFAULT_MAGNITUDE: f64 = 1.0;

// Shared record locations (file transport)
pub const EXCHANGE_DIR: &str = "commands";
pub const COMMAND_FILE: &str = "current_command.json";
pub const STATUS_FILE: &str = "vehicle_status.json";

// Zenoh keys (zenoh transport)
pub const KEY_COMMAND: &str = "drivelink/command";
pub const KEY_STATUS: &str = "drivelink/status";

// Drive mapping
pub const FORWARD_SPEED_KMH: f64 = 20.0;
pub const BACKWARD_SPEED_KMH: f64 = 10.0;
pub const MAX_SPEED_KMH: f64 = 72.0;
pub const TURN_ANGLE_DEG: f64 = 20.0;
pub const MAX_STEERING_DEG: f64 = 30.0;
pub const STEERING_GAIN: f64 = 0.5;

// Vehicle geometry
pub const WHEEL_RADIUS: f64 = 0.4; // meters
pub const TRACK_WIDTH: f64 = 1.6; // meters between left and right wheels
pub const MAX_WHEEL_ACCEL: f64 = 5.0; // rad/s^2, ~2 m/s^2 at the rim

// Route planning
pub const DEFAULT_GRID_SIZE: f64 = 2.0; // meters per cell
pub const SEARCH_MARGIN_CELLS: i64 = 25; // search bound around start and goal
pub const SMOOTHING_ITERATIONS: usize = 3;

// Waypoint following
pub const ARRIVAL_RADIUS: f64 = 3.0; // meters
pub const HEADING_TOLERANCE_DEG: f64 = 15.0;
pub const STOPPED_KMH: f64 = 0.5;
pub const CRUISE_MAGNITUDE: f64 = 0.5;
pub const PIVOT_MAGNITUDE: f64 = 1.5;

/// Which medium carries the two shared records
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Transport {
    /// JSON files in a shared directory
    File,
    /// Zenoh key-value channel
    Zenoh,
}

/// Exchange settings shared by the controller and the overlay
#[derive(Debug, Clone, Args)]
pub struct ExchangeArgs {
    /// Medium carrying the command and status records
    #[arg(long, value_enum, default_value_t = Transport::File, env = "DRIVELINK_TRANSPORT")]
    pub transport: Transport,

    /// Directory holding the shared JSON records (file transport)
    #[arg(long, default_value = EXCHANGE_DIR, env = "DRIVELINK_DIR")]
    pub dir: PathBuf,

    /// Poll period in milliseconds
    #[arg(long, default_value_t = POLL_INTERVAL.as_millis() as u64, env = "DRIVELINK_POLL_MS")]
    pub poll_ms: u64,

    /// Consecutive failed status reads before the link is reported lost
    #[arg(long, default_value_t = FAILURE_THRESHOLD, env = "DRIVELINK_FAILURE_THRESHOLD")]
    pub failure_threshold: u32,
}

impl ExchangeArgs {
    pub fn poll_interval(&self) -> Duration {
        // A zero period would make tokio's interval panic
        Duration::from_millis(self.poll_ms.max(1))
    }

    pub fn command_path(&self) -> PathBuf {
        self.dir.join(COMMAND_FILE)
    }

    pub fn status_path(&self) -> PathBuf {
        self.dir.join(STATUS_FILE)
    }
}

impl Default for ExchangeArgs {
    fn default() -> Self {
        Self {
            transport: Transport::File,
            dir: PathBuf::from(EXCHANGE_DIR),
            poll_ms: POLL_INTERVAL.as_millis() as u64,
            failure_threshold: FAILURE_THRESHOLD,
        }
    }
}
