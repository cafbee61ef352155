//! Waveform rendering and playhead overlay.
//!
//! `WaveformRenderer` paints the static image (grid plus min/max envelope)
//! into the waveform layer and keeps the playhead layer in sync with the
//! playback controller it owns. The envelope can be painted incrementally:
//! each column is an independent deferred task the host drains between
//! event-loop turns, so long buffers never stall input handling.

use std::collections::VecDeque;

use anyhow::Result;

use super::envelope;
use super::surface::RenderSurface;
use crate::player::buffer::SampleBuffer;
use crate::player::controller::{PlaybackController, PlayheadUpdate};

/// Grid geometry. Both values are visual tuning knobs surfaced in the
/// config file; the defaults match the classic layout.
#[derive(Debug, Clone, Copy)]
pub struct GridOptions {
    /// Number of evenly spaced vertical divisions across the full width.
    pub vertical_divisions: u16,
    /// Pixel spacing between horizontal gridlines, measured from the
    /// zero-amplitude line outward.
    pub horizontal_spacing: u16,
}

impl Default for GridOptions {
    fn default() -> Self {
        Self {
            vertical_divisions: 10,
            horizontal_spacing: 16,
        }
    }
}

/// Renderer construction options.
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub width: u32,
    pub height: u32,
    /// Paint envelope columns as deferred tasks instead of inline. An
    /// explicit `false` is honored.
    pub render_async: bool,
    pub grid: GridOptions,
}

/// One deferred column paint. Carries explicit value captures only; a task
/// scheduled before a resize is recognized as stale by its generation and
/// discarded unpainted.
#[derive(Debug, Clone, Copy)]
struct ColumnTask {
    x: u32,
    generation: u64,
}

/// Paints the waveform image and the playhead overlay for one buffer,
/// using the owned [`PlaybackController`] as its progress source.
pub struct WaveformRenderer {
    surface: RenderSurface,
    buffer: SampleBuffer,
    controller: PlaybackController,
    render_async: bool,
    grid: GridOptions,
    pending: VecDeque<ColumnTask>,
    generation: u64,
}

impl WaveformRenderer {
    pub fn new(
        options: RenderOptions,
        buffer: SampleBuffer,
        controller: PlaybackController,
    ) -> Self {
        Self {
            surface: RenderSurface::new(options.width, options.height),
            buffer,
            controller,
            render_async: options.render_async,
            grid: options.grid,
            pending: VecDeque::new(),
            generation: 0,
        }
    }

    /// Full repaint: grid, envelope, playhead.
    ///
    /// In asynchronous mode the envelope columns are queued rather than
    /// painted; drain them with [`pump`](Self::pump). Columns may complete
    /// in any order across turns — each one strokes only its own
    /// x-coordinate, so the finished image is order-independent.
    pub fn render(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.paint_grid();

        let width = self.surface.width();
        let spp = envelope::samples_per_pixel(self.buffer.len(), width);
        if spp >= 1.0 {
            if self.render_async {
                for x in 0..width {
                    self.pending.push_back(ColumnTask {
                        x,
                        generation: self.generation,
                    });
                }
            } else if let Some(columns) = envelope::compute(self.buffer.samples(), width) {
                for (x, column) in columns.into_iter().enumerate() {
                    self.stroke_column(x as u32, column);
                }
            }
        } else {
            // Buffer too short to resolve one sample per pixel; the grid
            // alone is the image.
            tracing::debug!(
                "Skipping waveform paint: {} samples across {} columns",
                self.buffer.len(),
                width
            );
        }

        self.render_playhead(self.controller.progress());
    }

    /// Processes up to `budget` deferred column tasks.
    ///
    /// Stale tasks from before the latest render are discarded without
    /// painting and do not count against the budget. Returns the number of
    /// columns actually painted.
    pub fn pump(&mut self, budget: usize) -> usize {
        let mut painted = 0;
        while painted < budget {
            let Some(task) = self.pending.pop_front() else {
                break;
            };
            if task.generation != self.generation {
                continue;
            }
            self.paint_column(task.x);
            painted += 1;
        }
        painted
    }

    /// Number of deferred column tasks still queued (stale ones included).
    pub fn pending_columns(&self) -> usize {
        self.pending.len()
    }

    /// Clears the playhead layer and strokes the marker line at
    /// `progress` of the surface width.
    pub fn render_playhead(&mut self, progress: f64) {
        let width = self.surface.width();
        let height = self.surface.height();
        self.surface.playhead.clear();
        if width == 0 || height == 0 {
            return;
        }
        let x = ((progress.clamp(0.0, 1.0) * width as f64) as u32).min(width - 1);
        self.surface.playhead.vline(x as i32, 0, height as i32 - 1);
    }

    /// Drives the controller's tick timer; on a due tick repaints only the
    /// playhead layer and returns the update. The waveform layer is never
    /// touched from here.
    ///
    /// # Errors
    /// - If the controller fails to re-arm at completion
    pub fn poll(&mut self) -> Result<Option<PlayheadUpdate>> {
        let update = self.controller.poll()?;
        if let Some(update) = update {
            self.render_playhead(update.progress);
        }
        Ok(update)
    }

    /// Toggles playback. The sole transport control exposed to the host.
    ///
    /// # Errors
    /// - If starting or re-arming the playback handle fails
    pub fn play_pause(&mut self) -> Result<()> {
        self.controller.play_pause()
    }

    /// Rebuilds the surface at a new size and repaints.
    ///
    /// Column tasks queued for the old size become stale and are discarded
    /// by [`pump`](Self::pump) via the generation bump in `render`.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == self.surface.width() && height == self.surface.height() {
            return;
        }
        tracing::debug!(
            "Render surface resized to {}x{} px",
            width,
            height
        );
        self.surface = RenderSurface::new(width, height);
        self.render();
    }

    pub fn surface(&self) -> &RenderSurface {
        &self.surface
    }

    pub fn controller(&self) -> &PlaybackController {
        &self.controller
    }

    /// Clears the waveform layer and paints the static grid: the
    /// zero-amplitude reference line, vertical divisions, and horizontal
    /// gridlines spreading from the center.
    fn paint_grid(&mut self) {
        let width = self.surface.width();
        let height = self.surface.height();
        let layer = &mut self.surface.waveform;
        layer.clear();
        if width == 0 || height == 0 {
            return;
        }

        let right = width as i32 - 1;
        let bottom = height as i32 - 1;
        let mid = height as i32 / 2;

        // Zero-amplitude reference line
        layer.hline(mid, 0, right);

        let divisions = self.grid.vertical_divisions as u32;
        if divisions > 0 {
            for i in 0..=divisions {
                let x = (i * width / divisions).min(width - 1) as i32;
                layer.vline(x, 0, bottom);
            }
        }

        let spacing = self.grid.horizontal_spacing as i32;
        if spacing > 0 {
            let mut offset = spacing;
            while offset <= mid {
                layer.hline(mid - offset, 0, right);
                layer.hline(mid + offset, 0, right);
                offset += spacing;
            }
        }
    }

    /// Recomputes and paints one envelope column. Used by deferred tasks,
    /// which carry only their x-coordinate and derive everything else from
    /// the immutable buffer.
    fn paint_column(&mut self, x: u32) {
        let width = self.surface.width();
        if x >= width {
            return;
        }

        let spp = envelope::samples_per_pixel(self.buffer.len(), width);
        if spp < 1.0 {
            return;
        }
        let column = envelope::column(self.buffer.samples(), x, width, spp);
        self.stroke_column(x, column);
    }

    /// Strokes one column: two segments from the zero line out to the
    /// column's max and min amplitudes.
    ///
    /// Self-contained: it clears nothing and writes only its own
    /// x-coordinate, which is what makes out-of-order completion safe.
    fn stroke_column(&mut self, x: u32, column: envelope::EnvelopeColumn) {
        let height = self.surface.height();
        if height == 0 {
            return;
        }

        let mid = height as f64 / 2.0;
        let y_zero = mid as i32;
        let y_max = (mid - column.max as f64 * mid) as i32;
        let y_min = (mid - column.min as f64 * mid) as i32;

        let layer = &mut self.surface.waveform;
        layer.vline(x as i32, y_zero, y_max);
        layer.vline(x as i32, y_zero, y_min);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::clock::test_support::ManualClock;
    use crate::player::controller::TICK_PERIOD_SECS;
    use crate::player::sink::test_support::FakeSink;
    use std::cell::Cell;
    use std::rc::Rc;

    fn options(width: u32, height: u32, render_async: bool) -> RenderOptions {
        RenderOptions {
            width,
            height,
            render_async,
            grid: GridOptions::default(),
        }
    }

    fn renderer(
        samples: Vec<f32>,
        opts: RenderOptions,
    ) -> (WaveformRenderer, Rc<Cell<f64>>) {
        let buffer = SampleBuffer::new(samples, 1000);
        let (sink, _log) = FakeSink::new();
        let (clock, time) = ManualClock::new();
        let controller = PlaybackController::new(
            buffer.clone(),
            Box::new(sink),
            Box::new(clock),
            Box::new(|_| {}),
        )
        .expect("arm initial handle");
        (WaveformRenderer::new(opts, buffer, controller), time)
    }

    fn test_signal(len: usize) -> Vec<f32> {
        (0..len).map(|n| (n as f32 * 0.11).sin() * 0.9).collect()
    }

    #[test]
    fn async_and_sync_painting_produce_identical_pixels() {
        let samples = test_signal(4000);
        let (mut sync_renderer, _) = renderer(samples.clone(), options(96, 32, false));
        let (mut async_renderer, _) = renderer(samples, options(96, 32, true));

        sync_renderer.render();
        async_renderer.render();
        assert_eq!(async_renderer.pending_columns(), 96);

        // Drain in uneven batches to exercise multi-turn completion
        while async_renderer.pending_columns() > 0 {
            async_renderer.pump(7);
        }

        assert_eq!(
            sync_renderer.surface().waveform,
            async_renderer.surface().waveform
        );
    }

    #[test]
    fn short_buffer_paints_grid_only() {
        let (mut with_samples, _) = renderer(vec![0.9; 10], options(64, 16, false));
        let (mut without_samples, _) = renderer(Vec::new(), options(64, 16, false));

        with_samples.render();
        without_samples.render();

        // Too few samples per pixel: the waveform layer is just the grid
        assert_eq!(
            with_samples.surface().waveform,
            without_samples.surface().waveform
        );
        assert_eq!(with_samples.pending_columns(), 0);
    }

    #[test]
    fn zero_width_surface_renders_nothing_without_panicking() {
        let (mut r, _) = renderer(test_signal(1000), options(0, 16, true));
        r.render();
        assert_eq!(r.pending_columns(), 0);
        assert_eq!(r.surface().waveform.lit(), 0);

        let (mut flat, _) = renderer(test_signal(1000), options(64, 0, false));
        flat.render();
        assert_eq!(flat.surface().waveform.lit(), 0);
    }

    #[test]
    fn stale_columns_are_discarded_after_resize() {
        let samples = test_signal(4000);
        let (mut r, _) = renderer(samples.clone(), options(96, 32, true));

        r.render();
        r.pump(20); // partially painted at the old size
        r.resize(48, 16);

        // Old-generation tasks must not paint into the new surface
        while r.pending_columns() > 0 {
            r.pump(11);
        }

        let (mut expected, _) = renderer(samples, options(48, 16, false));
        expected.render();
        assert_eq!(r.surface().waveform, expected.surface().waveform);
    }

    #[test]
    fn tick_repaints_playhead_without_touching_the_waveform() {
        let (mut r, time) = renderer(test_signal(4000), options(80, 24, false));
        r.render();
        let waveform_before = r.surface().waveform.clone();

        r.play_pause().unwrap();
        time.set(1.0); // a quarter into the 4s buffer
        let update = r.poll().unwrap().expect("tick due");
        assert!((update.progress - 0.25).abs() < 0.05);

        assert_eq!(r.surface().waveform, waveform_before);
        let expected_x = (update.progress * 80.0) as u32;
        assert!(r.surface().playhead.get(expected_x, 0));
        assert!(r.surface().playhead.get(expected_x, 23));
    }

    #[test]
    fn playhead_layer_holds_a_single_line_per_tick() {
        let (mut r, time) = renderer(test_signal(4000), options(80, 24, false));
        r.render();
        r.play_pause().unwrap();

        time.set(1.0);
        r.poll().unwrap().expect("first tick");
        time.set(2.0);
        let update = r.poll().unwrap().expect("second tick");

        // Exactly one column lit: the previous line was cleared
        assert_eq!(r.surface().playhead.lit(), 24);
        let x = (update.progress * 80.0) as u32;
        assert!(r.surface().playhead.get(x, 12));
    }

    #[test]
    fn completion_parks_the_playhead_at_the_right_edge() {
        let (mut r, time) = renderer(test_signal(4000), options(80, 24, false));
        r.render();
        r.play_pause().unwrap();

        let mut last = None;
        while time.get() < 4.2 {
            time.set(time.get() + TICK_PERIOD_SECS);
            if let Some(update) = r.poll().unwrap() {
                last = Some(update);
            }
        }

        let last = last.expect("ticks fired");
        assert_eq!(last.progress, 1.0);
        assert!(r.surface().playhead.get(79, 0));
        assert!(!r.controller().is_playing());
    }
}
