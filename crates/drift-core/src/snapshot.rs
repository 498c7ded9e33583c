//! Entity snapshots
//!
//! `EntitySnapshot` is both the live description of a moving body and the
//! payload exchanged with peers: a full, timestamped sample of its state.

use crate::{DriftRng, Error, Millis, PeerId, Result, Vector2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Display color in HSL space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    /// Hue in degrees, `[0, 360)`
    pub hue: f32,
    /// Saturation in percent, `[0, 100]`
    pub saturation: f32,
    /// Lightness in percent, `[0, 100]`
    pub lightness: f32,
}

impl Color {
    /// Create a color, rejecting out-of-range components
    pub fn hsl(hue: f32, saturation: f32, lightness: f32) -> Result<Self> {
        if !hue.is_finite() || !(0.0..360.0).contains(&hue) {
            return Err(Error::InvalidColor(format!("hue {} outside [0, 360)", hue)));
        }
        for (name, value) in [("saturation", saturation), ("lightness", lightness)] {
            if !value.is_finite() || !(0.0..=100.0).contains(&value) {
                return Err(Error::InvalidColor(format!(
                    "{} {} outside [0, 100]",
                    name, value
                )));
            }
        }
        Ok(Self {
            hue,
            saturation,
            lightness,
        })
    }

    /// A random hue at 50% saturation and 50% lightness
    pub fn random(rng: &mut DriftRng) -> Self {
        Self {
            hue: (rng.range_f64(0.0, 360.0) as f32) % 360.0,
            saturation: 50.0,
            lightness: 50.0,
        }
    }

    /// Convert to 8-bit RGB
    pub fn to_rgb(&self) -> (u8, u8, u8) {
        let s = self.saturation / 100.0;
        let l = self.lightness / 100.0;
        let chroma = (1.0 - (2.0 * l - 1.0).abs()) * s;
        let h = self.hue / 60.0;
        let x = chroma * (1.0 - (h % 2.0 - 1.0).abs());
        let (r, g, b) = match h as u32 {
            0 => (chroma, x, 0.0),
            1 => (x, chroma, 0.0),
            2 => (0.0, chroma, x),
            3 => (0.0, x, chroma),
            4 => (x, 0.0, chroma),
            _ => (chroma, 0.0, x),
        };
        let m = l - chroma / 2.0;
        let to_byte = |c: f32| ((c + m) * 255.0).round().clamp(0.0, 255.0) as u8;
        (to_byte(r), to_byte(g), to_byte(b))
    }
}

impl Default for Color {
    fn default() -> Self {
        Self {
            hue: 0.0,
            saturation: 50.0,
            lightness: 50.0,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hsl({}, {}%, {}%)",
            self.hue, self.saturation, self.lightness
        )
    }
}

/// One of the four movement intents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            "left" => Ok(Direction::Left),
            "right" => Ok(Direction::Right),
            _ => Err(Error::UnknownDirection(s.to_string())),
        }
    }
}

/// Which directions the controlling player is currently holding
///
/// All four may be active at once; opposing pairs are not resolved here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MovementIntents {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl MovementIntents {
    /// Set or clear a single intent
    pub fn set(&mut self, direction: Direction, active: bool) {
        match direction {
            Direction::Up => self.up = active,
            Direction::Down => self.down = active,
            Direction::Left => self.left = active,
            Direction::Right => self.right = active,
        }
    }

    /// Check a single intent
    pub fn is_active(&self, direction: Direction) -> bool {
        match direction {
            Direction::Up => self.up,
            Direction::Down => self.down,
            Direction::Left => self.left,
            Direction::Right => self.right,
        }
    }

    /// True if any intent is held
    pub fn any(&self) -> bool {
        self.up || self.down || self.left || self.right
    }

    /// Release everything
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// A timestamped sample of an entity's full state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    /// Owning peer
    pub id: PeerId,
    /// Centre position in pixels
    pub position: Vector2,
    /// Per-axis speed in pixels per millisecond
    pub velocity: Vector2,
    /// Circle radius in pixels
    pub radius: f64,
    /// Display color
    pub color: Color,
    /// Intents held when the sample was taken
    pub intents: MovementIntents,
    /// Server-clock time of the sample
    pub timestamp: Millis,
}

impl EntitySnapshot {
    /// Create a snapshot at rest with no intents held
    pub fn new(id: impl Into<PeerId>, position: Vector2, timestamp: Millis) -> Self {
        Self {
            id: id.into(),
            position,
            velocity: Vector2::ZERO,
            radius: 0.0,
            color: Color::default(),
            intents: MovementIntents::default(),
            timestamp,
        }
    }

    /// Set the velocity
    pub fn with_velocity(mut self, velocity: Vector2) -> Self {
        self.velocity = velocity;
        self
    }

    /// Set the radius
    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = radius;
        self
    }

    /// Set the color
    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_validation() {
        assert!(Color::hsl(120.0, 50.0, 50.0).is_ok());
        assert!(Color::hsl(360.0, 50.0, 50.0).is_err());
        assert!(Color::hsl(10.0, 101.0, 50.0).is_err());
        assert!(Color::hsl(f32::NAN, 50.0, 50.0).is_err());
    }

    #[test]
    fn test_color_to_rgb() {
        let red = Color::hsl(0.0, 100.0, 50.0).unwrap();
        assert_eq!(red.to_rgb(), (255, 0, 0));

        let green = Color::hsl(120.0, 100.0, 50.0).unwrap();
        assert_eq!(green.to_rgb(), (0, 255, 0));

        let grey = Color::hsl(200.0, 0.0, 50.0).unwrap();
        assert_eq!(grey.to_rgb(), (128, 128, 128));
    }

    #[test]
    fn test_random_color() {
        let mut rng = DriftRng::new(9);
        let color = Color::random(&mut rng);
        assert!((0.0..360.0).contains(&color.hue));
        assert_eq!(color.saturation, 50.0);
        assert_eq!(color.lightness, 50.0);
        assert_eq!(format!("{}", Color::default()), "hsl(0, 50%, 50%)");
    }

    #[test]
    fn test_direction_parse() {
        assert_eq!("Up".parse::<Direction>().unwrap(), Direction::Up);
        assert_eq!("right".parse::<Direction>().unwrap(), Direction::Right);
        assert_eq!(
            "north".parse::<Direction>(),
            Err(Error::UnknownDirection("north".to_string()))
        );
    }

    #[test]
    fn test_intents() {
        let mut intents = MovementIntents::default();
        assert!(!intents.any());

        intents.set(Direction::Up, true);
        intents.set(Direction::Left, true);
        assert!(intents.is_active(Direction::Up));
        assert!(intents.is_active(Direction::Left));
        assert!(!intents.is_active(Direction::Down));

        intents.set(Direction::Up, false);
        assert!(!intents.up);
        intents.clear();
        assert!(!intents.any());
    }

    #[test]
    fn test_snapshot_ron() {
        let snapshot = EntitySnapshot::new("p1", Vector2::new(1.0, 2.0), 500.0)
            .with_velocity(Vector2::new(0.2, 0.2))
            .with_radius(20.0);

        let text = ron::to_string(&snapshot).unwrap();
        let back: EntitySnapshot = ron::from_str(&text).unwrap();
        assert_eq!(back, snapshot);
    }
}
