//! Drawing seam
//!
//! The engine draws through this trait and nothing else. Implement it for a
//! canvas, a terminal, a GPU batch, or a recorder in tests.

use drift_core::{Color, Vector2};

/// A 2D target the session renders onto once per frame
pub trait Surface {
    /// Error type for this surface
    type Error: std::error::Error + Send + Sync + 'static;

    /// Wipe the previous frame
    fn clear_background(&mut self) -> Result<(), Self::Error>;

    /// Fill a circle centred on `position`
    fn draw_circle(&mut self, position: Vector2, radius: f64, color: &Color)
        -> Result<(), Self::Error>;
}

/// A surface that remembers what was drawn in the last frame
///
/// Useful for tests and headless runs.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    /// Circles drawn since the last clear
    pub circles: Vec<DrawnCircle>,
    /// Number of clears seen
    pub frames: usize,
}

/// One recorded `draw_circle` call
#[derive(Debug, Clone, PartialEq)]
pub struct DrawnCircle {
    pub position: Vector2,
    pub radius: f64,
    pub color: Color,
}

impl Surface for RecordingSurface {
    type Error = std::convert::Infallible;

    fn clear_background(&mut self) -> Result<(), Self::Error> {
        self.circles.clear();
        self.frames += 1;
        Ok(())
    }

    fn draw_circle(
        &mut self,
        position: Vector2,
        radius: f64,
        color: &Color,
    ) -> Result<(), Self::Error> {
        self.circles.push(DrawnCircle {
            position,
            radius,
            color: *color,
        });
        Ok(())
    }
}
