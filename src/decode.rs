//! WAV decoding into a playable sample buffer.
//!
//! wavedeck renders and plays one channel; interleaved files are reduced to
//! channel 0 at decode time. Integer formats are normalized to f32 in
//! [-1.0, 1.0].

use anyhow::{anyhow, Context, Result};
use std::path::Path;

use crate::player::SampleBuffer;

/// Decodes a WAV file into a mono `SampleBuffer`.
///
/// # Errors
/// - If the file cannot be opened or is not a valid WAV
/// - If a sample fails to decode partway through the file
pub fn load_wav(path: &Path) -> Result<SampleBuffer> {
    let reader = hound::WavReader::open(path)
        .with_context(|| format!("Failed to open WAV file: {}", path.display()))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let samples = match spec.sample_format {
        hound::SampleFormat::Float => channel_zero(
            reader.into_samples::<f32>(),
            channels,
            |value| value,
        )?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            channel_zero(reader.into_samples::<i32>(), channels, move |value| {
                value as f32 / scale
            })?
        }
    };

    let buffer = SampleBuffer::new(samples, spec.sample_rate);
    if buffer.is_empty() {
        tracing::warn!("{} decoded to zero samples", path.display());
    }
    tracing::info!(
        "Decoded {}: {:.2}s, {} samples at {}Hz ({} channel(s) in file)",
        path.display(),
        buffer.duration(),
        buffer.len(),
        buffer.sample_rate(),
        channels
    );

    Ok(buffer)
}

/// Collects channel 0 of an interleaved sample stream, converting each
/// value with `convert`.
fn channel_zero<S, F>(
    samples: impl Iterator<Item = hound::Result<S>>,
    channels: usize,
    convert: F,
) -> Result<Vec<f32>>
where
    F: Fn(S) -> f32,
{
    let mut out = Vec::new();
    for (index, sample) in samples.enumerate() {
        let value = sample.map_err(|e| anyhow!("Failed to decode sample {index}: {e}"))?;
        if index % channels == 0 {
            out.push(convert(value));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_wav_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("wavedeck_test_{}_{}.wav", std::process::id(), name))
    }

    fn write_stereo_i16(path: &Path, frames: &[(i16, i16)], sample_rate: u32) {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).expect("create test wav");
        for &(left, right) in frames {
            writer.write_sample(left).expect("write sample");
            writer.write_sample(right).expect("write sample");
        }
        writer.finalize().expect("finalize test wav");
    }

    #[test]
    fn decodes_channel_zero_of_stereo_int_wav() {
        let path = temp_wav_path("stereo");
        let frames: Vec<(i16, i16)> = (0..1000)
            .map(|n| (if n % 2 == 0 { i16::MAX } else { i16::MIN }, 0))
            .collect();
        write_stereo_i16(&path, &frames, 2000);

        let buffer = load_wav(&path).expect("decode");
        std::fs::remove_file(&path).ok();

        assert_eq!(buffer.len(), 1000);
        assert_eq!(buffer.sample_rate(), 2000);
        assert!((buffer.duration() - 0.5).abs() < 1e-9);
        // Channel 0 alternates near full scale; channel 1 was silent
        assert!((buffer.samples()[0] - 1.0).abs() < 1e-3);
        assert!((buffer.samples()[1] + 1.0).abs() < 1e-3);
    }

    #[test]
    fn decodes_float_wav_unchanged() {
        let path = temp_wav_path("float");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(&path, spec).expect("create test wav");
        for n in 0..100 {
            writer
                .write_sample((n as f32 / 100.0) - 0.5)
                .expect("write sample");
        }
        writer.finalize().expect("finalize test wav");

        let buffer = load_wav(&path).expect("decode");
        std::fs::remove_file(&path).ok();

        assert_eq!(buffer.len(), 100);
        assert!((buffer.samples()[0] + 0.5).abs() < 1e-6);
        assert!((buffer.samples()[99] - 0.49).abs() < 1e-6);
    }

    #[test]
    fn missing_file_reports_the_path() {
        let error = load_wav(Path::new("/nonexistent/missing.wav")).unwrap_err();
        assert!(error.to_string().contains("missing.wav"));
    }
}
