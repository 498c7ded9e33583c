//! Crossterm rendering of the playing field
//!
//! The field is a fixed 800x600 world scaled onto whatever the terminal
//! offers, minus one row for the status line.

use crossterm::{
    cursor::MoveTo,
    queue,
    style::{self, Print, ResetColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};
use drift_core::{Color, Vector2};
use drift_netcode::Surface;
use std::io::{self, Stdout, Write};

pub const FIELD_WIDTH: f64 = 800.0;
pub const FIELD_HEIGHT: f64 = 600.0;

const BLOCK: char = '█';

/// A [`Surface`] that paints circles as coloured terminal cells
pub struct TerminalSurface {
    out: Stdout,
    cols: u16,
    rows: u16,
}

impl TerminalSurface {
    pub fn new() -> io::Result<Self> {
        let (cols, rows) = terminal::size()?;
        Ok(Self {
            out: io::stdout(),
            cols,
            rows: rows.saturating_sub(1),
        })
    }

    /// Track a terminal resize
    pub fn resize(&mut self, cols: u16, rows: u16) {
        self.cols = cols;
        self.rows = rows.saturating_sub(1);
    }

    /// World position to fractional cell coordinates
    fn to_cells(&self, position: Vector2) -> (f64, f64) {
        (
            position.x / FIELD_WIDTH * f64::from(self.cols),
            position.y / FIELD_HEIGHT * f64::from(self.rows),
        )
    }

    /// Write the status line and flush the frame
    pub fn present(&mut self, status: &str) -> io::Result<()> {
        let width = usize::from(self.cols);
        let line: String = status.chars().take(width).collect();
        queue!(
            self.out,
            ResetColor,
            MoveTo(0, self.rows),
            Clear(ClearType::CurrentLine),
            Print(line)
        )?;
        self.out.flush()
    }

    /// Replace the whole screen with a centred message
    pub fn show_message(&mut self, message: &str) -> io::Result<()> {
        let col = (usize::from(self.cols).saturating_sub(message.len()) / 2) as u16;
        queue!(
            self.out,
            ResetColor,
            Clear(ClearType::All),
            MoveTo(col, self.rows / 2),
            Print(message)
        )?;
        self.out.flush()
    }
}

impl Surface for TerminalSurface {
    type Error = io::Error;

    fn clear_background(&mut self) -> io::Result<()> {
        queue!(self.out, ResetColor, Clear(ClearType::All))
    }

    fn draw_circle(&mut self, position: Vector2, radius: f64, color: &Color) -> io::Result<()> {
        let (cx, cy) = self.to_cells(position);
        let rx = radius / FIELD_WIDTH * f64::from(self.cols);
        let ry = radius / FIELD_HEIGHT * f64::from(self.rows);
        if !(cx.is_finite() && cy.is_finite()) || rx <= 0.0 || ry <= 0.0 {
            return Ok(());
        }

        let (r, g, b) = color.to_rgb();
        queue!(self.out, SetForegroundColor(style::Color::Rgb { r, g, b }))?;

        let top = (cy - ry).floor().max(0.0) as i64;
        let bottom = (cy + ry).ceil().min(f64::from(self.rows) - 1.0) as i64;
        let left = (cx - rx).floor().max(0.0) as i64;
        let right = (cx + rx).ceil().min(f64::from(self.cols) - 1.0) as i64;

        let mut painted = false;
        for row in top..=bottom {
            for col in left..=right {
                // sample the cell centre
                let dx = (col as f64 + 0.5 - cx) / rx;
                let dy = (row as f64 + 0.5 - cy) / ry;
                if dx * dx + dy * dy <= 1.0 {
                    queue!(self.out, MoveTo(col as u16, row as u16), Print(BLOCK))?;
                    painted = true;
                }
            }
        }

        // keep tiny circles visible
        if !painted && (0.0..f64::from(self.cols)).contains(&cx) && (0.0..f64::from(self.rows)).contains(&cy) {
            queue!(self.out, MoveTo(cx as u16, cy as u16), Print(BLOCK))?;
        }
        Ok(())
    }
}
