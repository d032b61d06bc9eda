//! WSOLA time-stretching
//!
//! Changes duration without changing pitch. Hann-windowed frames are taken
//! from the input at `rate` times the output hop, each shifted within a small
//! tolerance to best match the natural continuation of the previous frame,
//! and overlap-added.

/// Frame length in seconds
const FRAME_SECS: f32 = 0.04;

/// Time-stretch by `rate` (> 1 shortens)
///
/// Output length is `round(len / rate)`.
pub fn time_stretch(samples: &[f32], rate: f32, sample_rate: u32) -> Vec<f32> {
    let out_len = (samples.len() as f64 / rate as f64).round() as usize;
    if samples.is_empty() || out_len == 0 {
        return vec![0.0; out_len];
    }

    let frame = ((sample_rate as f32 * FRAME_SECS) as usize).max(64) & !1;
    let hop_out = frame / 2;
    let tolerance = hop_out / 4;
    let overlap = hop_out / 2;
    let window = hann(frame);

    let mut output = vec![0.0f32; out_len + frame];
    let mut norm = vec![0.0f32; out_len + frame];
    let mut prev_pos: isize = 0;

    let mut k = 0usize;
    while k * hop_out < out_len {
        let out_pos = k * hop_out;
        let nominal = (out_pos as f64 * rate as f64).round() as isize;

        let pos = if k == 0 {
            0
        } else {
            let target = prev_pos + hop_out as isize;
            best_offset(samples, nominal, target, tolerance as isize, overlap)
        };

        for (i, w) in window.iter().enumerate() {
            output[out_pos + i] += w * sample_at(samples, pos + i as isize);
            norm[out_pos + i] += w;
        }
        prev_pos = pos;
        k += 1;
    }

    output.truncate(out_len);
    for (s, n) in output.iter_mut().zip(norm.iter()) {
        if *n > 1e-6 {
            *s /= n;
        }
    }
    output
}

/// Candidate start near `nominal` whose head best matches the input at `target`
fn best_offset(
    samples: &[f32],
    nominal: isize,
    target: isize,
    tolerance: isize,
    overlap: usize,
) -> isize {
    let mut best = nominal;
    let mut best_score = f32::NEG_INFINITY;
    for delta in -tolerance..=tolerance {
        let candidate = nominal + delta;
        let score: f32 = (0..overlap as isize)
            .map(|i| sample_at(samples, candidate + i) * sample_at(samples, target + i))
            .sum();
        if score > best_score {
            best_score = score;
            best = candidate;
        }
    }
    best
}

fn sample_at(samples: &[f32], index: isize) -> f32 {
    if index < 0 {
        return 0.0;
    }
    samples.get(index as usize).copied().unwrap_or(0.0)
}

fn hann(len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| {
            let x = std::f32::consts::PI * 2.0 * i as f32 / len as f32;
            0.5 - 0.5 * x.cos()
        })
        .collect()
}
