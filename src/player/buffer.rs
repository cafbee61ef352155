//! Decoded audio sample storage.
//!
//! A `SampleBuffer` holds one channel of decoded PCM as normalized f32
//! amplitudes together with the sample rate, from which the total duration
//! is derived. Buffers are created once by the decoder and shared read-only
//! between the playback controller and the waveform renderer.

use std::sync::Arc;

/// Immutable mono amplitude data for one audio file.
///
/// Amplitude values are nominally in [-1.0, 1.0]. The buffer is cheap to
/// clone; the sample data itself is shared behind an `Arc`.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    samples: Arc<[f32]>,
    sample_rate: u32,
}

impl SampleBuffer {
    /// Wraps decoded samples at the given sample rate.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
        }
    }

    /// The amplitude values of the rendered channel.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Number of samples in the buffer.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the buffer holds no samples at all.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Total duration in seconds (0.0 for an empty or rate-less buffer).
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}
