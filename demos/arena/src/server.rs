//! A stand-in authoritative server
//!
//! Runs `SERVER_SKEW_MS` ahead of the local clock, answers pings after a
//! jittery delay, and broadcasts two scripted bots every 100 ms. The second
//! bot leaves after `BOT_LIFETIME_MS`.

use crate::connection::ServerEnd;
use drift_core::{Color, DriftRng, EntitySnapshot, Millis, SystemClock, Vector2, WallClock};
use drift_netcode::{decode, encode, BulkState, ClientMessage, PingReply, ServerMessage};
use std::f64::consts::TAU;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{interval, sleep};
use tracing::{debug, info, warn};

/// How far the server clock runs ahead of this machine's
pub const SERVER_SKEW_MS: Millis = 7_342.0;

/// When the pacing bot disconnects, measured from server start
pub const BOT_LIFETIME_MS: Millis = 20_000.0;

/// Network conditions of the simulated link
#[derive(Debug, Clone, Copy)]
pub struct LinkConditions {
    /// Mean one-way delay
    pub one_way_ms: Millis,
    /// Extra uniform delay on top of the mean
    pub jitter_ms: Millis,
    /// Probability that a message is dropped
    pub loss: f64,
}

impl Default for LinkConditions {
    fn default() -> Self {
        Self {
            one_way_ms: 40.0,
            jitter_ms: 30.0,
            loss: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ServerClock;

impl WallClock for ServerClock {
    fn now_millis(&self) -> Millis {
        SystemClock.now_millis() + SERVER_SKEW_MS
    }
}

#[derive(Debug, Clone, Copy)]
enum Path {
    /// Circles `center` at `radius`, one lap per `period`
    Orbit {
        center: Vector2,
        radius: f64,
        period: Millis,
    },
    /// Sweeps between `from` and `to` and back, once per `period`
    Patrol {
        from: Vector2,
        to: Vector2,
        period: Millis,
    },
}

impl Path {
    fn position(&self, t: Millis) -> Vector2 {
        match *self {
            Path::Orbit {
                center,
                radius,
                period,
            } => {
                let angle = TAU * (t % period) / period;
                center + Vector2::new(angle.cos(), angle.sin()) * radius
            }
            Path::Patrol { from, to, period } => {
                let phase = (t % period) / period;
                let w = if phase < 0.5 { phase * 2.0 } else { 2.0 - phase * 2.0 };
                from + (to - from) * w
            }
        }
    }
}

struct Bot {
    body: EntitySnapshot,
    path: Path,
}

impl Bot {
    fn sample(&self, t: Millis) -> EntitySnapshot {
        let position = self.path.position(t);
        let ahead = self.path.position(t + 1.0);
        EntitySnapshot {
            position,
            velocity: ahead - position,
            timestamp: t,
            ..self.body.clone()
        }
    }
}

fn bots(rng: &mut DriftRng) -> Vec<Bot> {
    vec![
        Bot {
            body: EntitySnapshot::new("orbiter", Vector2::ZERO, 0.0)
                .with_radius(24.0)
                .with_color(Color::random(rng)),
            path: Path::Orbit {
                center: Vector2::new(400.0, 300.0),
                radius: 180.0,
                period: 6_000.0,
            },
        },
        Bot {
            body: EntitySnapshot::new("patroller", Vector2::ZERO, 0.0)
                .with_radius(16.0)
                .with_color(Color::random(rng)),
            path: Path::Patrol {
                from: Vector2::new(80.0, 80.0),
                to: Vector2::new(720.0, 520.0),
                period: 8_000.0,
            },
        },
    ]
}

fn delay(rng: &mut DriftRng, link: &LinkConditions) -> Duration {
    let ms = link.one_way_ms + rng.range_f64(0.0, link.jitter_ms);
    Duration::from_secs_f64(ms / 1000.0)
}

/// Deliver `message` after `after`, unless the link drops it
fn send_later(
    outbound: &UnboundedSender<Vec<u8>>,
    message: ServerMessage,
    after: Duration,
) {
    let bytes = match encode(&message) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "failed to encode server message");
            return;
        }
    };
    let outbound = outbound.clone();
    tokio::spawn(async move {
        sleep(after).await;
        let _ = outbound.send(bytes);
    });
}

/// Serve one client until it disconnects
pub async fn run(link: LinkConditions, seed: u64, mut end: ServerEnd) {
    let clock = ServerClock;
    let mut rng = DriftRng::new(seed);
    let mut bots = bots(&mut rng);
    let started = clock.now_millis();
    let mut last_broadcast = started;

    let mut broadcast = interval(Duration::from_millis(100));
    info!(skew_ms = SERVER_SKEW_MS, "simulated server started");

    loop {
        tokio::select! {
            message = end.inbound.recv() => {
                let Some(bytes) = message else {
                    break;
                };
                match decode::<ClientMessage>(&bytes) {
                    Ok(ClientMessage::Ping(request)) => {
                        if rng.chance(link.loss) {
                            continue;
                        }
                        let inbound_leg = delay(&mut rng, &link);
                        let outbound_leg = delay(&mut rng, &link);
                        let outbound = end.outbound.clone();
                        tokio::spawn(async move {
                            sleep(inbound_leg).await;
                            let reply = PingReply::answer(request, clock.now_millis());
                            send_later(&outbound, ServerMessage::Pong(reply), outbound_leg);
                        });
                    }
                    Ok(ClientMessage::LocalUpdate(update)) => {
                        debug!(
                            x = update.position.x,
                            y = update.position.y,
                            timestamp = update.timestamp,
                            "local update"
                        );
                    }
                    Err(e) => warn!(error = %e, "undecodable client message"),
                }
            }
            _ = broadcast.tick() => {
                let now = clock.now_millis();

                if bots.len() > 1 && now - started > BOT_LIFETIME_MS {
                    let gone = bots.remove(1);
                    info!(peer = %gone.body.id, "bot left");
                    let after = delay(&mut rng, &link);
                    send_later(&end.outbound, ServerMessage::RemovePeer(gone.body.id), after);
                }

                // two samples per bot per message
                let mid = (last_broadcast + now) / 2.0;
                last_broadcast = now;
                let state: BulkState = bots
                    .iter()
                    .map(|bot| (bot.body.id.clone(), vec![bot.sample(mid), bot.sample(now)]))
                    .collect();

                if !rng.chance(link.loss) {
                    let after = delay(&mut rng, &link);
                    send_later(&end.outbound, ServerMessage::BulkState(state), after);
                }
            }
        }
    }

    info!("simulated server stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orbit_stays_on_circle() {
        let path = Path::Orbit {
            center: Vector2::new(10.0, 10.0),
            radius: 5.0,
            period: 1_000.0,
        };
        for t in [0.0, 125.0, 640.0, 99_999.0] {
            let d = path.position(t).distance(Vector2::new(10.0, 10.0));
            assert!((d - 5.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_patrol_turns_around() {
        let path = Path::Patrol {
            from: Vector2::new(0.0, 0.0),
            to: Vector2::new(100.0, 0.0),
            period: 1_000.0,
        };
        assert_eq!(path.position(0.0), Vector2::new(0.0, 0.0));
        assert_eq!(path.position(250.0), Vector2::new(50.0, 0.0));
        assert_eq!(path.position(500.0), Vector2::new(100.0, 0.0));
        assert_eq!(path.position(750.0), Vector2::new(50.0, 0.0));
    }
}
