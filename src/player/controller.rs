//! Playback lifecycle and playhead tracking.
//!
//! The controller owns one single-use playback handle bound to a fixed
//! sample buffer and derives the playhead from the clock on a fixed 50ms
//! tick. The audio backend is never asked for its position; elapsed time
//! against `last_start_time` is the single source of truth, which is what
//! makes the stop/re-arm cycle of the single-use handle invisible to
//! callers.

use anyhow::Result;

use super::buffer::SampleBuffer;
use super::clock::Clock;
use super::sink::{HandleState, OutputSink, SourceHandle};

/// Fixed period of the playhead tick, in seconds.
pub const TICK_PERIOD_SECS: f64 = 0.05;

/// Transport state of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
}

/// Snapshot handed to the progress callback on every tick and at completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayheadUpdate {
    /// Seconds elapsed into the buffer.
    pub position: f64,
    /// `position / duration`, clamped to [0.0, 1.0].
    pub progress: f64,
}

/// Caller-supplied progress hook. Invoked synchronously on every tick; must
/// not block.
pub type ProgressCallback = Box<dyn FnMut(PlayheadUpdate)>;

/// Drives play/pause/reset for one buffer and reports progress.
///
/// All transport operations are total over the {Idle, Playing} state
/// machine: calling `play` while playing or `pause` while idle is a no-op.
pub struct PlaybackController {
    buffer: SampleBuffer,
    sink: Box<dyn OutputSink>,
    clock: Box<dyn Clock>,
    handle: Box<dyn SourceHandle>,
    state: PlaybackState,
    /// Clock timestamp marking when the current play segment began,
    /// shifted back by the resume offset.
    last_start_time: f64,
    playhead_position: f64,
    next_tick_at: f64,
    on_progress: ProgressCallback,
}

impl PlaybackController {
    /// Builds a controller and arms the first playback handle.
    ///
    /// # Errors
    /// - If the sink cannot arm a handle for the buffer
    pub fn new(
        buffer: SampleBuffer,
        mut sink: Box<dyn OutputSink>,
        clock: Box<dyn Clock>,
        on_progress: ProgressCallback,
    ) -> Result<Self> {
        let handle = sink.arm(&buffer)?;
        Ok(Self {
            buffer,
            sink,
            clock,
            handle,
            state: PlaybackState::Idle,
            last_start_time: 0.0,
            playhead_position: 0.0,
            next_tick_at: 0.0,
            on_progress,
        })
    }

    /// Starts playback from the current playhead offset.
    ///
    /// No-op while already playing.
    ///
    /// # Errors
    /// - If the armed handle fails to start
    pub fn play(&mut self) -> Result<()> {
        if self.state == PlaybackState::Playing {
            return Ok(());
        }

        // Every stop re-arms, so the handle is armed here; recover if the
        // invariant was ever broken rather than starting a spent handle
        if self.handle.state() != HandleState::Armed {
            self.prepare_to_play()?;
        }

        let now = self.clock.now();
        // Shifting the segment origin back by the paused offset makes a
        // resume continue seamlessly from where pause left off.
        self.last_start_time = now - self.playhead_position;
        self.handle.start(self.playhead_position)?;
        self.next_tick_at = now + TICK_PERIOD_SECS;
        self.state = PlaybackState::Playing;
        tracing::debug!("Playback started at {:.3}s", self.playhead_position);
        Ok(())
    }

    /// Stops playback, retaining the playhead offset, and re-arms a fresh
    /// handle so the next `play` can start immediately.
    ///
    /// No-op while idle.
    ///
    /// # Errors
    /// - If a replacement handle cannot be armed
    pub fn pause(&mut self) -> Result<()> {
        if self.state == PlaybackState::Idle {
            return Ok(());
        }

        let elapsed = self.clock.now() - self.last_start_time;
        self.playhead_position = elapsed.clamp(0.0, self.buffer.duration());
        tracing::debug!("Playback paused at {:.3}s", self.playhead_position);
        self.stop_and_rearm()
    }

    /// Toggles between playing and paused. The sole host-facing transport
    /// control.
    ///
    /// # Errors
    /// - If starting the handle or arming a replacement fails
    pub fn play_pause(&mut self) -> Result<()> {
        match self.state {
            PlaybackState::Idle => self.play(),
            PlaybackState::Playing => self.pause(),
        }
    }

    /// Fires the fixed-period playhead tick when due.
    ///
    /// Intended to be called on every turn of the host event loop. Returns
    /// the update produced by the tick, after the progress callback has run,
    /// so the caller can repaint. Returns `None` while idle or between
    /// ticks.
    ///
    /// # Errors
    /// - If completion handling cannot arm a replacement handle
    pub fn poll(&mut self) -> Result<Option<PlayheadUpdate>> {
        if self.state == PlaybackState::Idle {
            return Ok(None);
        }

        let now = self.clock.now();
        if now < self.next_tick_at {
            return Ok(None);
        }

        // Fixed-period cadence: advance the deadline by whole periods so a
        // late poll does not shift the schedule. Missed periods fold into
        // one tick.
        while self.next_tick_at <= now {
            self.next_tick_at += TICK_PERIOD_SECS;
        }

        self.update_playhead().map(Some)
    }

    /// Recomputes the playhead from the clock and reports it.
    ///
    /// At completion: clamps to the end, emits the final update exactly
    /// once, resets the playhead to zero, and stops/re-arms so the next
    /// `play` replays from the start.
    fn update_playhead(&mut self) -> Result<PlayheadUpdate> {
        let duration = self.buffer.duration();
        let position = self.clock.now() - self.last_start_time;
        let progress = if duration > 0.0 {
            position / duration
        } else {
            1.0
        };

        if progress >= 1.0 {
            let update = PlayheadUpdate {
                position: duration,
                progress: 1.0,
            };
            (self.on_progress)(update);
            self.playhead_position = 0.0;
            tracing::debug!("Playback completed after {:.3}s", duration);
            self.stop_and_rearm()?;
            return Ok(update);
        }

        self.playhead_position = position;
        let update = PlayheadUpdate { position, progress };
        (self.on_progress)(update);
        Ok(update)
    }

    /// Arms a fresh handle, replacing the owned one.
    ///
    /// The backend cannot restart a stopped source, so a spent handle is
    /// always replaced rather than reused. The first handle is armed at
    /// construction.
    fn prepare_to_play(&mut self) -> Result<()> {
        self.handle = self.sink.arm(&self.buffer)?;
        Ok(())
    }

    /// Spends the current handle and immediately re-arms its replacement.
    fn stop_and_rearm(&mut self) -> Result<()> {
        self.handle.stop();
        self.state = PlaybackState::Idle;
        self.prepare_to_play()
    }

    /// Whether the controller is currently playing.
    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    /// Current playhead offset in seconds.
    ///
    /// While playing this is live against the clock; while idle it is the
    /// retained pause offset.
    pub fn position(&self) -> f64 {
        match self.state {
            PlaybackState::Playing => (self.clock.now() - self.last_start_time)
                .clamp(0.0, self.buffer.duration()),
            PlaybackState::Idle => self.playhead_position,
        }
    }

    /// Current progress fraction in [0.0, 1.0].
    pub fn progress(&self) -> f64 {
        let duration = self.buffer.duration();
        if duration <= 0.0 {
            return 0.0;
        }
        (self.position() / duration).clamp(0.0, 1.0)
    }

    /// Total buffer duration in seconds.
    pub fn duration(&self) -> f64 {
        self.buffer.duration()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::clock::test_support::ManualClock;
    use crate::player::sink::test_support::{FakeSink, SinkEvent, SinkLog};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    type Updates = Rc<RefCell<Vec<PlayheadUpdate>>>;
    type LogHandle = Rc<RefCell<SinkLog>>;

    /// Controller over a 4.0s buffer with a manual clock and recording sink.
    fn controller() -> (PlaybackController, Rc<Cell<f64>>, LogHandle, Updates) {
        let buffer = SampleBuffer::new(vec![0.0; 4000], 1000);
        let (sink, log) = FakeSink::new();
        let (clock, time) = ManualClock::new();
        let updates: Updates = Rc::new(RefCell::new(Vec::new()));
        let sink_updates = updates.clone();
        let controller = PlaybackController::new(
            buffer,
            Box::new(sink),
            Box::new(clock),
            Box::new(move |u| sink_updates.borrow_mut().push(u)),
        )
        .expect("arm initial handle");
        (controller, time, log, updates)
    }

    /// Advances the clock in tick-sized steps, polling after each step.
    fn run_until(
        controller: &mut PlaybackController,
        time: &Rc<Cell<f64>>,
        deadline: f64,
    ) {
        while time.get() < deadline {
            time.set(time.get() + TICK_PERIOD_SECS);
            controller.poll().expect("poll");
        }
    }

    #[test]
    fn construction_arms_one_handle() {
        let (_controller, _time, log, _updates) = controller();
        assert_eq!(log.borrow().armed, 1);
        assert!(log.borrow().events.is_empty());
    }

    #[test]
    fn play_is_idempotent() {
        let (mut controller, _time, log, _updates) = controller();
        controller.play().unwrap();
        controller.play().unwrap();
        assert!(controller.is_playing());
        assert_eq!(log.borrow().start_offsets(), vec![0.0]);
    }

    #[test]
    fn pause_while_idle_is_a_noop() {
        let (mut controller, _time, log, _updates) = controller();
        controller.pause().unwrap();
        assert!(!controller.is_playing());
        // No stop event and no re-arm beyond the initial one
        assert!(log.borrow().events.is_empty());
        assert_eq!(log.borrow().armed, 1);
    }

    #[test]
    fn pause_retains_position_and_rearms() {
        let (mut controller, time, log, _updates) = controller();
        controller.play().unwrap();
        time.set(1.5);
        controller.pause().unwrap();

        assert!(!controller.is_playing());
        assert!((controller.position() - 1.5).abs() < 1e-9);
        assert_eq!(log.borrow().armed, 2);
        assert_eq!(
            log.borrow().events.last().copied(),
            Some(SinkEvent::Stopped)
        );

        // Second pause changes nothing
        controller.pause().unwrap();
        assert_eq!(log.borrow().armed, 2);
    }

    #[test]
    fn resume_continues_from_paused_offset() {
        let (mut controller, time, log, _updates) = controller();
        controller.play().unwrap();
        time.set(1.5);
        controller.pause().unwrap();

        // Idle time must not advance the playhead
        time.set(20.0);
        assert!((controller.position() - 1.5).abs() < 1e-9);

        controller.play().unwrap();
        assert_eq!(log.borrow().start_offsets(), vec![0.0, 1.5]);

        time.set(20.5);
        let update = controller.poll().unwrap().expect("tick due");
        assert!((update.position - 2.0).abs() < TICK_PERIOD_SECS + 1e-9);
    }

    #[test]
    fn progress_is_monotone_and_bounded_while_playing() {
        let (mut controller, time, _log, updates) = controller();
        controller.play().unwrap();
        run_until(&mut controller, &time, 3.9);

        let seen = updates.borrow();
        assert!(!seen.is_empty());
        let mut previous = 0.0;
        for update in seen.iter() {
            assert!(update.progress >= previous);
            assert!((0.0..=1.0).contains(&update.progress));
            previous = update.progress;
        }
    }

    #[test]
    fn ticks_fire_on_the_fixed_period() {
        let (mut controller, time, _log, updates) = controller();
        controller.play().unwrap();
        // Poll at twice the tick rate for one second; only due ticks fire
        while time.get() < 1.0 {
            time.set(time.get() + TICK_PERIOD_SECS / 2.0);
            controller.poll().unwrap();
        }
        let count = updates.borrow().len();
        assert!((19..=21).contains(&count), "expected ~20 ticks, got {count}");
    }

    #[test]
    fn halfway_progress_matches_elapsed_time() {
        let (mut controller, time, _log, updates) = controller();
        controller.play().unwrap();
        run_until(&mut controller, &time, 2.0);

        let last = *updates.borrow().last().expect("updates seen");
        assert!((last.progress - 0.5).abs() < 0.05);
    }

    #[test]
    fn completion_reports_once_then_resets() {
        let (mut controller, time, log, updates) = controller();
        controller.play().unwrap();
        run_until(&mut controller, &time, 4.3);

        let seen = updates.borrow();
        let finals: Vec<_> = seen.iter().filter(|u| u.progress >= 1.0).collect();
        assert_eq!(finals.len(), 1, "completion must be reported exactly once");
        assert!((finals[0].position - 4.0).abs() < 1e-9);
        assert_eq!(finals[0].progress, 1.0);
        drop(seen);

        assert!(!controller.is_playing());
        assert_eq!(controller.position(), 0.0);
        // Initial arm, plus the re-arm after natural completion
        assert_eq!(log.borrow().armed, 2);

        // Idle controller stays quiet
        let before = updates.borrow().len();
        time.set(10.0);
        assert!(controller.poll().unwrap().is_none());
        assert_eq!(updates.borrow().len(), before);
    }

    #[test]
    fn replay_after_completion_starts_from_zero() {
        let (mut controller, time, log, _updates) = controller();
        controller.play().unwrap();
        run_until(&mut controller, &time, 4.3);

        controller.play().unwrap();
        assert_eq!(log.borrow().start_offsets(), vec![0.0, 0.0]);
        assert!(controller.is_playing());
    }

    #[test]
    fn zero_duration_buffer_completes_on_first_tick() {
        let buffer = SampleBuffer::new(Vec::new(), 44100);
        let (sink, log) = FakeSink::new();
        let (clock, time) = ManualClock::new();
        let mut controller = PlaybackController::new(
            buffer,
            Box::new(sink),
            Box::new(clock),
            Box::new(|_| {}),
        )
        .unwrap();

        controller.play().unwrap();
        time.set(TICK_PERIOD_SECS);
        let update = controller.poll().unwrap().expect("tick due");
        assert_eq!(update.progress, 1.0);
        assert!(!controller.is_playing());
        assert_eq!(log.borrow().armed, 2);
    }
}
