//! Audio playback feature for wavedeck.
//!
//! Provides the decoded-buffer model, the clock-driven playback controller
//! with its single-use cpal handles, the waveform renderer, and the
//! terminal player UI.

pub mod buffer;
pub mod clock;
pub mod controller;
pub mod render;
pub mod sink;
pub mod ui;

pub use buffer::SampleBuffer;
pub use clock::MonotonicClock;
pub use controller::{PlaybackController, PlayheadUpdate};
pub use render::{GridOptions, RenderOptions, WaveformRenderer};
pub use sink::CpalSink;
pub use ui::{PlayerCommand, PlayerTui};
