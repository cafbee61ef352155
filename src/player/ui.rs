//! Terminal user interface for waveform playback.
//!
//! Composites the renderer's two pixel layers into braille cells (2x4 dots
//! per terminal cell), draws a transport footer, and translates key presses
//! into player commands.

use anyhow::anyhow;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    prelude::*,
    widgets::Paragraph,
};
use std::io::{stdout, Stdout};
use std::time::Duration;

use super::render::surface::PixelLayer;
use super::render::RenderSurface;

const FOOTER_HEIGHT: u16 = 1;

/// Horizontal pixels per terminal cell.
const CELL_PX_X: u32 = 2;
/// Vertical pixels per terminal cell.
const CELL_PX_Y: u32 = 4;

/// Braille dot bit per (row, column) inside one cell.
const DOT_BITS: [[u16; 2]; 4] = [
    [0x01, 0x08],
    [0x02, 0x10],
    [0x04, 0x20],
    [0x40, 0x80],
];

const WAVEFORM_COLOR: Color = Color::Rgb(206, 224, 220);
const PLAYHEAD_COLOR: Color = Color::Rgb(255, 196, 0);
const BACKGROUND: Color = Color::Rgb(0, 0, 0);

/// User input command during playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerCommand {
    /// Keep running (no key or an ignored key)
    Continue,
    /// Toggle playback (Space key)
    PlayPause,
    /// Exit the player (Escape, 'q', or Ctrl+C)
    Quit,
}

/// Transport facts shown in the footer.
#[derive(Debug, Clone, Copy)]
pub struct TransportInfo {
    pub playing: bool,
    pub position: f64,
    pub duration: f64,
}

/// Terminal UI for the waveform player.
pub struct PlayerTui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl PlayerTui {
    /// Creates the TUI and enters alternate screen mode.
    ///
    /// # Errors
    /// - If raw mode cannot be enabled
    /// - If the alternate screen cannot be entered
    pub fn new() -> anyhow::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = stdout();
        execute!(stdout, crossterm::terminal::EnterAlternateScreen)?;

        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(PlayerTui { terminal })
    }

    /// Render surface size, in pixels, that fills the current terminal
    /// above the footer.
    ///
    /// # Errors
    /// - If the terminal size cannot be queried
    pub fn pixel_size(&self) -> anyhow::Result<(u32, u32)> {
        let size = self.terminal.size()?;
        let content_rows = size.height.saturating_sub(FOOTER_HEIGHT);
        Ok((
            size.width as u32 * CELL_PX_X,
            content_rows as u32 * CELL_PX_Y,
        ))
    }

    /// Draws one frame: the composited layers plus the transport footer.
    ///
    /// # Errors
    /// - If terminal rendering fails
    pub fn draw(&mut self, surface: &RenderSurface, transport: TransportInfo) -> anyhow::Result<()> {
        self.terminal.draw(|frame| {
            let area = frame.area();

            let content_area = Rect {
                x: area.x,
                y: area.y,
                width: area.width,
                height: area.height.saturating_sub(FOOTER_HEIGHT),
            };

            let lines = composite_lines(surface, content_area);
            let canvas = Paragraph::new(Text::from(lines))
                .style(Style::default().bg(BACKGROUND));
            frame.render_widget(canvas, content_area);

            let footer_area = Rect {
                x: area.x,
                y: area.y + area.height.saturating_sub(FOOTER_HEIGHT),
                width: area.width,
                height: FOOTER_HEIGHT.min(area.height),
            };

            let indicator = if transport.playing {
                Span::styled("▶ ", Style::default().fg(Color::Green))
            } else {
                Span::styled("⏸ ", Style::default().fg(Color::Yellow))
            };

            let time_span = Span::raw(format!(
                "{} / {}",
                format_time(transport.position),
                format_time(transport.duration)
            ));

            let help_span = Span::styled(
                "  space play/pause · q quit",
                Style::default().fg(Color::DarkGray),
            );

            let footer = Paragraph::new(Line::from(vec![indicator, time_span, help_span]))
                .style(Style::default().fg(WAVEFORM_COLOR).bg(BACKGROUND));
            frame.render_widget(footer, footer_area);
        })?;

        Ok(())
    }

    /// Processes user input, waiting up to `timeout` for a key event.
    ///
    /// # Errors
    /// - If event polling fails
    pub fn handle_input(&mut self, timeout: Duration) -> anyhow::Result<PlayerCommand> {
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                return Ok(match key.code {
                    KeyCode::Char(' ') => {
                        tracing::debug!("Space pressed: toggling playback");
                        PlayerCommand::PlayPause
                    }
                    KeyCode::Char('q') | KeyCode::Esc => {
                        tracing::debug!("Escape or 'q' pressed: quitting player");
                        PlayerCommand::Quit
                    }
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        tracing::debug!("Ctrl+C pressed: quitting player");
                        PlayerCommand::Quit
                    }
                    _ => PlayerCommand::Continue,
                });
            }
        }
        Ok(PlayerCommand::Continue)
    }

    /// Cleans up terminal state and exits alternate screen mode.
    ///
    /// # Errors
    /// - If terminal mode cannot be disabled
    pub fn cleanup(&mut self) -> anyhow::Result<()> {
        disable_raw_mode()?;
        execute!(
            self.terminal.backend_mut(),
            crossterm::terminal::LeaveAlternateScreen
        )?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

/// Builds one styled line per terminal row by sampling both layers.
///
/// The playhead layer wins the cell color wherever it has any dot set, so
/// the marker stays visible on top of the waveform.
fn composite_lines(surface: &RenderSurface, area: Rect) -> Vec<Line<'static>> {
    let mut lines = Vec::with_capacity(area.height as usize);
    for cell_y in 0..area.height {
        let mut spans = Vec::with_capacity(area.width as usize);
        for cell_x in 0..area.width {
            let wave_bits = cell_bits(&surface.waveform, cell_x, cell_y);
            let playhead_bits = cell_bits(&surface.playhead, cell_x, cell_y);
            let glyph = braille(wave_bits | playhead_bits);
            let color = if playhead_bits != 0 {
                PLAYHEAD_COLOR
            } else {
                WAVEFORM_COLOR
            };
            spans.push(Span::styled(
                glyph.to_string(),
                Style::default().fg(color).bg(BACKGROUND),
            ));
        }
        lines.push(Line::from(spans));
    }
    lines
}

/// Gathers the 2x4 pixel block of one cell into braille dot bits.
fn cell_bits(layer: &PixelLayer, cell_x: u16, cell_y: u16) -> u16 {
    let mut bits = 0;
    for (row, row_bits) in DOT_BITS.iter().enumerate() {
        for (col, bit) in row_bits.iter().enumerate() {
            let px = cell_x as u32 * CELL_PX_X + col as u32;
            let py = cell_y as u32 * CELL_PX_Y + row as u32;
            if layer.get(px, py) {
                bits |= bit;
            }
        }
    }
    bits
}

fn braille(bits: u16) -> char {
    char::from_u32(0x2800 + bits as u32).unwrap_or('\u{2800}')
}

/// Formats seconds as m:ss.
fn format_time(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

/// Shows a fatal player error on the error screen, cleaning up the TUI
/// first so the message is readable.
pub fn show_fatal_error(tui: &mut PlayerTui, message: &str) -> anyhow::Result<()> {
    tui.cleanup().ok();
    let mut error_screen = crate::ui::ErrorScreen::new()?;
    error_screen.show_error(message)?;
    error_screen.cleanup().map_err(|e| anyhow!("{e}"))
}
