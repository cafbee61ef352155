//! Per-column min/max downsampling of the sample data.
//!
//! One column summarizes `samples_per_pixel` consecutive samples by their
//! extreme amplitudes. Min/max is used rather than RMS so short transient
//! peaks stay visible in the rendered image.

/// Extreme amplitudes over one pixel column's slice of the buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvelopeColumn {
    pub max: f32,
    pub min: f32,
}

/// Ratio of buffer length to surface width.
///
/// Below 1.0 the buffer is too short to resolve at per-pixel granularity
/// and no envelope is drawn.
pub fn samples_per_pixel(sample_count: usize, width: u32) -> f64 {
    if width == 0 {
        return 0.0;
    }
    sample_count as f64 / width as f64
}

/// Computes the full envelope, one column per pixel of `width`.
///
/// Returns `None` when there is less than one sample per pixel to scan
/// (short buffer, empty input, or zero width).
pub fn compute(samples: &[f32], width: u32) -> Option<Vec<EnvelopeColumn>> {
    let spp = samples_per_pixel(samples.len(), width);
    if spp < 1.0 {
        return None;
    }
    Some((0..width).map(|x| column(samples, x, width, spp)).collect())
}

/// Scans one column's sample range `[start, end)` for its extremes.
///
/// `start` is the floored proportional offset of the column; the end bound
/// is floored as well and clamped to the buffer so the final column never
/// reads past the end.
pub(crate) fn column(samples: &[f32], x: u32, width: u32, spp: f64) -> EnvelopeColumn {
    let start = ((x as f64 / width as f64) * samples.len() as f64).floor() as usize;
    let end = ((start as f64 + spp).floor() as usize).min(samples.len());

    let mut max = f32::MIN;
    let mut min = f32::MAX;
    for &value in &samples[start.min(samples.len())..end] {
        max = max.max(value);
        min = min.min(value);
    }
    if min > max {
        // Empty scan range; treat as silence
        return EnvelopeColumn { max: 0.0, min: 0.0 };
    }
    EnvelopeColumn { max, min }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produces_one_column_per_pixel_with_ordered_extremes() {
        let samples: Vec<f32> = (0..4096)
            .map(|n| (n as f32 * 0.37).sin() * 0.8)
            .collect();
        let envelope = compute(&samples, 512).expect("dense enough");

        assert_eq!(envelope.len(), 512);
        for column in &envelope {
            assert!(column.min <= column.max);
        }
    }

    #[test]
    fn short_buffer_yields_no_envelope() {
        let samples = vec![0.5f32; 10];
        assert!(compute(&samples, 64).is_none());
    }

    #[test]
    fn empty_buffer_and_zero_width_are_skipped() {
        assert!(compute(&[], 100).is_none());
        assert!(compute(&[0.1, 0.2, 0.3], 0).is_none());
        assert_eq!(samples_per_pixel(0, 100), 0.0);
        assert_eq!(samples_per_pixel(100, 0), 0.0);
    }

    #[test]
    fn two_samples_per_pixel_scans_exactly_two_samples() {
        // 1600 samples over 800 columns: column x must cover samples
        // 2x and 2x+1 and nothing else.
        let samples: Vec<f32> = (0..1600).map(|n| n as f32).collect();
        let envelope = compute(&samples, 800).expect("dense enough");

        assert_eq!(envelope.len(), 800);
        for (x, column) in envelope.iter().enumerate() {
            assert_eq!(column.min, (2 * x) as f32);
            assert_eq!(column.max, (2 * x + 1) as f32);
        }
    }

    #[test]
    fn final_column_is_clamped_to_the_buffer_end() {
        // Non-integral samples-per-pixel pushes the last scan range past
        // the buffer unless it is clamped.
        let samples: Vec<f32> = (0..1601).map(|n| n as f32 / 1601.0).collect();
        let envelope = compute(&samples, 800).expect("dense enough");

        assert_eq!(envelope.len(), 800);
        let last = envelope.last().unwrap();
        assert!(last.max <= 1.0);
        assert!(last.min <= last.max);
    }

    #[test]
    fn columns_preserve_transient_peaks() {
        // A single spike inside an otherwise quiet column must survive
        // downsampling.
        let mut samples = vec![0.0f32; 1024];
        samples[517] = 0.9;
        samples[519] = -0.7;
        let envelope = compute(&samples, 256).expect("dense enough");

        let spike = envelope[517 / 4];
        assert_eq!(spike.max, 0.9);
        let trough = envelope[519 / 4];
        assert_eq!(trough.min, -0.7);
    }
}
