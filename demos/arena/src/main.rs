//! Arena
//!
//! A terminal client for the drift netcode engine.
//! - Calibrates its clock against an in-process server running 7 s ahead
//! - Arrow keys steer the local circle, drawn with zero input delay
//! - Server-driven bots are drawn 200 ms in the past, interpolated
//! - Space stops, Esc or q quits
//!
//! Environment:
//! - `DRIFT_CONFIG`: optional RON `NetcodeConfig`
//! - `DRIFT_LOG`: log file (default `drift-arena.log`), filtered by `RUST_LOG`
//! - `DRIFT_LOSS`: simulated packet loss probability (default 0)

mod connection;
mod server;
mod terminal;

use crossterm::{
    cursor::{Hide, Show},
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use drift_core::{Direction, DriftRng, SystemClock, Vector2};
use drift_netcode::{
    decode, default_local_body, send_message, FrameReport, NetcodeConfig, ServerMessage, Session,
};
use server::LinkConditions;
use std::error::Error;
use std::fs::File;
use std::io::stdout;
use std::sync::Mutex;
use std::time::Duration;
use terminal::{TerminalSurface, FIELD_HEIGHT, FIELD_WIDTH};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const FRAME_INTERVAL_MS: u64 = 16;

type AppResult<T> = Result<T, Box<dyn Error>>;

fn main() -> AppResult<()> {
    init_logging()?;
    let config = load_config()?;
    let link = LinkConditions {
        loss: std::env::var("DRIFT_LOSS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.0),
        ..LinkConditions::default()
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    // Initialize terminal
    enable_raw_mode()?;
    let mut out = stdout();
    execute!(out, EnterAlternateScreen, Hide)?;

    let result = runtime.block_on(run(config, link));

    // Restore terminal
    execute!(out, Show, LeaveAlternateScreen)?;
    disable_raw_mode()?;

    if let Err(e) = &result {
        eprintln!("arena: {e}");
    }
    result
}

fn init_logging() -> AppResult<()> {
    let path = std::env::var("DRIFT_LOG").unwrap_or_else(|_| "drift-arena.log".to_string());
    let file = File::create(path)?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("drift=info,arena=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn load_config() -> AppResult<NetcodeConfig> {
    match std::env::var("DRIFT_CONFIG") {
        Ok(path) => {
            info!(%path, "loading config");
            Ok(NetcodeConfig::load(path)?)
        }
        Err(_) => Ok(NetcodeConfig::default()),
    }
}

async fn run(config: NetcodeConfig, link: LinkConditions) -> AppResult<()> {
    let mut rng = DriftRng::from_entropy();
    let (mut connection, server_end) = connection::pair();
    let server = tokio::spawn(server::run(link, rng.next_u64(), server_end));

    let center = Vector2::new(FIELD_WIDTH, FIELD_HEIGHT) / 2.0;
    let body = default_local_body("local", center, &mut rng);
    let broadcast_every = Duration::from_secs_f64(config.broadcast_interval_ms / 1000.0);
    let mut session = Session::new(config, SystemClock, body)?;
    let mut surface = TerminalSurface::new()?;

    for ping in session.begin_calibration() {
        send_message(&mut connection, &ping)?;
    }

    let mut frames = interval(Duration::from_millis(FRAME_INTERVAL_MS));
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut broadcast = interval(broadcast_every);
    broadcast.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            inbound = connection.next_message() => {
                let Some(bytes) = inbound else {
                    warn!("server went away");
                    break;
                };
                // deliver on arrival so ping replies are stamped promptly
                match decode::<ServerMessage>(&bytes) {
                    Ok(message) => {
                        session.deliver(message);
                    }
                    Err(e) => warn!(error = %e, "undecodable server message"),
                }
            }
            _ = frames.tick() => {
                if !handle_input(&mut session, &mut surface)? {
                    break;
                }
                if session.is_synchronized() {
                    let report = session.tick(&mut surface)?;
                    surface.present(&status_line(&session, &report))?;
                } else {
                    session.check_calibration_deadline()?;
                    let (received, expected) = session.calibration_progress();
                    surface.show_message(&format!(
                        "Calibrating clock... {received}/{expected} pings"
                    ))?;
                }
            }
            _ = broadcast.tick(), if session.is_synchronized() => {
                send_message(&mut connection, &session.local_update()?)?;
            }
        }
    }

    session.shutdown(&mut connection)?;
    server.await?;
    Ok(())
}

/// Drain pending terminal events; `false` means quit
fn handle_input(session: &mut Session<SystemClock>, surface: &mut TerminalSurface) -> AppResult<bool> {
    while event::poll(Duration::ZERO)? {
        match event::read()? {
            Event::Key(key) => {
                if !handle_key(session, key) {
                    return Ok(false);
                }
            }
            Event::Resize(cols, rows) => surface.resize(cols, rows),
            _ => {}
        }
    }
    Ok(true)
}

fn handle_key(session: &mut Session<SystemClock>, key: KeyEvent) -> bool {
    let direction = match key.code {
        KeyCode::Up => Some(Direction::Up),
        KeyCode::Down => Some(Direction::Down),
        KeyCode::Left => Some(Direction::Left),
        KeyCode::Right => Some(Direction::Right),
        _ => None,
    };

    match (key.code, key.kind) {
        (KeyCode::Esc | KeyCode::Char('q'), KeyEventKind::Press) => return false,
        (KeyCode::Char('c'), KeyEventKind::Press) if key.modifiers.contains(KeyModifiers::CONTROL) => {
            return false
        }
        (KeyCode::Char(' '), KeyEventKind::Press) => {
            for direction in Direction::ALL {
                session.set_intent(direction, false);
            }
        }
        _ => {}
    }

    if let Some(direction) = direction {
        match key.kind {
            KeyEventKind::Press | KeyEventKind::Repeat => {
                // most terminals never report releases, so a press turns
                // the opposite direction off
                session.set_intent(opposite(direction), false);
                session.set_intent(direction, true);
            }
            KeyEventKind::Release => session.set_intent(direction, false),
        }
    }
    true
}

fn opposite(direction: Direction) -> Direction {
    match direction {
        Direction::Up => Direction::Down,
        Direction::Down => Direction::Up,
        Direction::Left => Direction::Right,
        Direction::Right => Direction::Left,
    }
}

fn status_line(session: &Session<SystemClock>, report: &FrameReport) -> String {
    let (offset, latency) = session
        .estimate()
        .map(|e| (e.offset_millis, e.average_latency_millis))
        .unwrap_or_default();
    let position = session.local().position();
    format!(
        " offset {offset:+.1} ms | rtt {latency:.1} ms | frame {:.1} ms | peers {} | you ({:.0}, {:.0}) | arrows move, space stops, q quits",
        report.elapsed_millis, report.drawn_remotes, position.x, position.y,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opposite_is_an_involution() {
        for direction in Direction::ALL {
            assert_eq!(opposite(opposite(direction)), direction);
            assert_ne!(opposite(direction), direction);
        }
    }
}
