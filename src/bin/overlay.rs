// Control surface: watch status, send phrases, drive from the keyboard, or
// let the autopilot drive to a point
// Teleop keys: W/S forward/backward, A/D turn, Space stop, R/F intensity, Q quit
use std::io::Write;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use tokio::time::interval;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use drivelink::config::{DEFAULT_GRID_SIZE, ExchangeArgs, KEY_COMMAND, KEY_STATUS, Transport};
use drivelink::exchange::{
    CommandWriter, FileMailbox, LinkState, Mailbox, StatusReader, SystemClock, ZenohMailbox,
};
use drivelink::intent::destination;
use drivelink::messages::{Action, VehicleStatus};
use drivelink::navigation::{PathPlanner, Point};
use drivelink::overlay::{CommandSource, Overlay};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const MAGNITUDES: [f64; 3] = [0.5, 1.0, 1.5];

#[derive(Parser)]
#[command(name = "drivelink-overlay", version)]
struct Cli {
    #[command(flatten)]
    exchange: ExchangeArgs,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Print vehicle status whenever it changes
    Watch,
    /// Send one command phrase, e.g. "turn left" or "forward 0.5"
    Send {
        #[arg(required = true)]
        text: Vec<String>,
        /// Origin recorded in the log
        #[arg(long, value_enum, default_value_t = CommandSource::Manual)]
        source: CommandSource,
    },
    /// Keyboard driving
    Teleop,
    /// Plan a route to (X, Y) in meters and drive it
    #[command(allow_negative_numbers = true)]
    Goto {
        x: f64,
        y: f64,
        /// Blocked position "X,Y"; repeat for more
        #[arg(long = "obstacle", value_parser = parse_point)]
        obstacles: Vec<Point>,
        /// Planning cell size in meters
        #[arg(long, default_value_t = DEFAULT_GRID_SIZE)]
        grid: f64,
    },
}

fn parse_point(s: &str) -> Result<Point, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got {:?}", s))?;
    let coord = |v: &str| {
        v.trim()
            .parse::<f64>()
            .map_err(|e| format!("bad coordinate {:?}: {}", v, e))
    };
    Ok((coord(x)?, coord(y)?))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(LevelFilter::INFO.into()))
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Overlay error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), BoxError> {
    let args = &cli.exchange;
    match args.transport {
        Transport::File => {
            let status = FileMailbox::new(args.status_path());
            let commands = FileMailbox::new(args.command_path());
            dispatch(args, status, commands, cli.mode).await
        }
        Transport::Zenoh => {
            info!("Opening Zenoh session...");
            let session = zenoh::open(zenoh::Config::default()).await?;
            let status = ZenohMailbox::declare(&session, KEY_STATUS).await?;
            let commands = ZenohMailbox::declare(&session, KEY_COMMAND).await?;
            dispatch(args, status, commands, cli.mode).await
        }
    }
}

async fn dispatch<M: Mailbox>(
    args: &ExchangeArgs,
    status: M,
    commands: M,
    mode: Mode,
) -> Result<(), BoxError> {
    let period = args.poll_interval();
    let mut overlay = Overlay::new(
        StatusReader::with_settings(status, args.failure_threshold, period),
        CommandWriter::new(commands, SystemClock),
    );

    match mode {
        Mode::Watch => watch(&mut overlay, period).await,
        Mode::Send { text, source } => {
            let phrase = text.join(" ");
            if let Some(goal) = destination(&phrase) {
                info!("[{}] Destination ({:.1}, {:.1})", source, goal.0, goal.1);
                return goto(&mut overlay, &PathPlanner::default(), goal, period).await;
            }
            match overlay.say(&phrase, source).await? {
                Some(_) => Ok(()),
                None => Err(format!("no driving action in {:?}", phrase).into()),
            }
        }
        Mode::Teleop => {
            info!("Controls: W/S=forward/backward, A/D=turn, Space=stop, R/F=intensity, Q=quit");
            enable_raw_mode()?;
            let result = teleop(&mut overlay, period).await;
            disable_raw_mode()?;
            result
        }
        Mode::Goto {
            x,
            y,
            obstacles,
            grid,
        } => {
            let mut planner = PathPlanner::new(grid);
            planner.add_obstacles(obstacles);
            goto(&mut overlay, &planner, (x, y), period).await
        }
    }
}

async fn goto<M: Mailbox>(
    overlay: &mut Overlay<M, SystemClock>,
    planner: &PathPlanner,
    goal: Point,
    period: Duration,
) -> Result<(), BoxError> {
    let mut tick = interval(period);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    // Start from a live position
    loop {
        tokio::select! {
            _ = tick.tick() => {
                overlay.refresh().await;
                if overlay.is_connected() {
                    break;
                }
            }
            _ = &mut shutdown => return Ok(()),
        }
    }

    let mut pilot = overlay
        .plan_route(planner, goal)
        .ok_or_else(|| format!("no route to ({:.1}, {:.1})", goal.0, goal.1))?;

    loop {
        tokio::select! {
            _ = tick.tick() => {
                overlay.refresh().await;
                match overlay.follow(&mut pilot).await {
                    Ok(Some(cmd)) if pilot.is_finished() && cmd.action == Action::Stop => {
                        info!("Arrived: {}", overlay.status());
                        return Ok(());
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Failed to send command, retrying: {}", e),
                }
            }
            _ = &mut shutdown => {
                overlay.send(Action::Stop, None, CommandSource::Ai).await?;
                return Ok(());
            }
        }
    }
}

async fn watch<M: Mailbox>(
    overlay: &mut Overlay<M, SystemClock>,
    period: Duration,
) -> Result<(), BoxError> {
    let mut tick = interval(period);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut shown: Option<(LinkState, VehicleStatus)> = None;
    loop {
        tokio::select! {
            _ = tick.tick() => {
                let link = overlay.refresh().await;
                let current = (link, overlay.status().clone());
                let unchanged = shown
                    .as_ref()
                    .is_some_and(|(l, s)| *l == link && s.same_state(&current.1));
                if !unchanged {
                    match link {
                        LinkState::Connected => info!("{}", current.1),
                        LinkState::Disconnected => warn!("Connection lost"),
                    }
                    shown = Some(current);
                }
            }
            _ = &mut shutdown => return Ok(()),
        }
    }
}

async fn teleop<M: Mailbox>(
    overlay: &mut Overlay<M, SystemClock>,
    period: Duration,
) -> Result<(), BoxError> {
    let mut magnitude_idx: usize = 1;
    let mut last_refresh: Option<Instant> = None;

    loop {
        // Poll for key with 20ms timeout
        if event::poll(Duration::from_millis(20))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                if kind == KeyEventKind::Press {
                    let magnitude = Some(MAGNITUDES[magnitude_idx]);
                    let action = match code {
                        KeyCode::Char('w') => Some(Action::Forward),
                        KeyCode::Char('s') => Some(Action::Backward),
                        KeyCode::Char('a') => Some(Action::TurnLeft),
                        KeyCode::Char('d') => Some(Action::TurnRight),
                        KeyCode::Char(' ') => Some(Action::Stop),

                        // Intensity
                        KeyCode::Char('r') => {
                            magnitude_idx = (magnitude_idx + 1).min(MAGNITUDES.len() - 1);
                            None
                        }
                        KeyCode::Char('f') => {
                            magnitude_idx = magnitude_idx.saturating_sub(1);
                            None
                        }

                        KeyCode::Char('q') | KeyCode::Esc => break,
                        _ => None,
                    };

                    if let Some(action) = action {
                        if let Err(e) = overlay.send(action, magnitude, CommandSource::Manual).await {
                            warn!("Failed to send command, press again: {}", e);
                        }
                    }
                }
            }
        }

        if last_refresh.is_none_or(|t| t.elapsed() >= period) {
            last_refresh = Some(Instant::now());
            overlay.refresh().await;
            let line = if overlay.link() == LinkState::Connected {
                overlay.status().to_string()
            } else {
                "connection lost".to_string()
            };
            print!("\r{} | intensity {:.1}    ", line, MAGNITUDES[magnitude_idx]);
            std::io::stdout().flush()?;
        }
    }

    println!("\r");
    Ok(())
}
