//! Waveform image construction.
//!
//! `surface` holds the two-layer pixel raster, `envelope` the min/max
//! downsampling math, and `waveform` the renderer that ties them to the
//! playback controller.

pub mod envelope;
pub mod surface;
pub mod waveform;

pub use surface::RenderSurface;
pub use waveform::{GridOptions, RenderOptions, WaveformRenderer};
