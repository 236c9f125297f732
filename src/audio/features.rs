//! Frame-level signal features shared by the heuristic analyzers.
//!
//! Framing follows the common "centered" convention: frame `i` is centered on sample
//! `i * hop`, samples outside the signal count as zeros, and a signal of `n` samples
//! yields `1 + n / hop` frames.

/// Default analysis frame length in samples (128ms at 16kHz)
pub const FRAME_LENGTH: usize = 2048;
/// Default hop between frames in samples (32ms at 16kHz)
pub const HOP_LENGTH: usize = 512;

/// Number of centered frames for a signal of `len` samples.
pub fn frame_count(len: usize, hop: usize) -> usize {
    if len == 0 || hop == 0 {
        0
    } else {
        1 + len / hop
    }
}

/// Sample range `[start, end)` covered by centered frame `index`, clipped to the signal.
fn frame_bounds(index: usize, len: usize, frame_length: usize, hop: usize) -> (usize, usize) {
    let center = index * hop;
    let start = center.saturating_sub(frame_length / 2);
    let end = (center + frame_length / 2).min(len);
    (start.min(end), end)
}

/// Root-mean-square energy per centered frame.
pub fn frame_rms(samples: &[f32], frame_length: usize, hop: usize) -> Vec<f32> {
    let frames = frame_count(samples.len(), hop);
    (0..frames)
        .map(|i| {
            let (start, end) = frame_bounds(i, samples.len(), frame_length, hop);
            let energy: f64 = samples[start..end]
                .iter()
                .map(|&s| (s as f64) * (s as f64))
                .sum();
            (energy / frame_length as f64).sqrt() as f32
        })
        .collect()
}

/// Trim leading and trailing frames quieter than `top_db` below the loudest frame.
///
/// Returns `None` when the signal has no energy at all.
pub fn trim_silence(samples: &[f32], top_db: f32, frame_length: usize, hop: usize) -> Option<&[f32]> {
    let rms = frame_rms(samples, frame_length, hop);
    let peak = rms.iter().cloned().fold(0.0f32, f32::max);
    if peak <= 0.0 {
        return None;
    }

    let floor = peak * 10f32.powf(-top_db / 20.0);
    let first = rms.iter().position(|&v| v > floor)?;
    let last = rms.iter().rposition(|&v| v > floor)?;

    let start = (first * hop).min(samples.len());
    let end = ((last + 1) * hop).min(samples.len());
    if start >= end {
        return None;
    }

    Some(&samples[start..end])
}

/// Fraction of sign changes per centered frame.
pub fn zero_crossing_rate(samples: &[f32], frame_length: usize, hop: usize) -> Vec<f32> {
    let frames = frame_count(samples.len(), hop);
    (0..frames)
        .map(|i| {
            let (start, end) = frame_bounds(i, samples.len(), frame_length, hop);
            let crossings = samples[start..end]
                .windows(2)
                .filter(|pair| (pair[0] >= 0.0) != (pair[1] >= 0.0))
                .count();
            crossings as f32 / frame_length as f32
        })
        .collect()
}

/// YIN fundamental-frequency estimate for a single frame.
///
/// Searches lags corresponding to `[fmin, fmax]` and returns the first dip of the
/// cumulative-mean-normalized difference below `threshold`, or `None` if the frame
/// is aperiodic in that range.
pub fn yin_pitch(frame: &[f32], sample_rate: u32, fmin: f32, fmax: f32, threshold: f32) -> Option<f32> {
    if fmin <= 0.0 || fmax <= fmin {
        return None;
    }

    let tau_min = ((sample_rate as f32 / fmax).floor() as usize).max(2);
    let tau_max = (sample_rate as f32 / fmin).ceil() as usize;
    if frame.len() <= tau_max + 1 {
        return None;
    }
    let window = frame.len() - tau_max;

    // Difference function d(tau)
    let mut diff = vec![0.0f64; tau_max + 1];
    for (tau, slot) in diff.iter_mut().enumerate().skip(1) {
        *slot = (0..window)
            .map(|j| {
                let delta = frame[j] as f64 - frame[j + tau] as f64;
                delta * delta
            })
            .sum();
    }

    // Cumulative mean normalized difference d'(tau)
    let mut cmnd = vec![1.0f64; tau_max + 1];
    let mut running = 0.0f64;
    for tau in 1..=tau_max {
        running += diff[tau];
        cmnd[tau] = if running > 0.0 {
            diff[tau] * tau as f64 / running
        } else {
            1.0
        };
    }

    let mut tau = tau_min;
    while tau <= tau_max {
        if cmnd[tau] < threshold as f64 {
            while tau + 1 <= tau_max && cmnd[tau + 1] < cmnd[tau] {
                tau += 1;
            }
            return Some(sample_rate as f32 / refine_lag(&cmnd, tau) as f32);
        }
        tau += 1;
    }

    None
}

/// Parabolic interpolation around a lag minimum.
fn refine_lag(cmnd: &[f64], tau: usize) -> f64 {
    if tau == 0 || tau + 1 >= cmnd.len() {
        return tau as f64;
    }
    let (a, b, c) = (cmnd[tau - 1], cmnd[tau], cmnd[tau + 1]);
    let denom = a - 2.0 * b + c;
    if denom.abs() < f64::EPSILON {
        tau as f64
    } else {
        tau as f64 + 0.5 * (a - c) / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, amplitude: f32, samples: usize) -> Vec<f32> {
        (0..samples)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / 16000.0).sin() * amplitude)
            .collect()
    }

    #[test]
    fn test_frame_count() {
        assert_eq!(frame_count(0, 512), 0);
        assert_eq!(frame_count(511, 512), 1);
        assert_eq!(frame_count(16000, 512), 32);
    }

    #[test]
    fn test_rms_of_constant_signal() {
        let rms = frame_rms(&vec![0.5; 16000], FRAME_LENGTH, HOP_LENGTH);
        assert_eq!(rms.len(), 32);
        // Interior frames see a full window of 0.5
        assert!((rms[10] - 0.5).abs() < 1e-6);
        // First frame is half padding
        assert!(rms[0] < rms[10]);
    }

    #[test]
    fn test_trim_removes_silent_edges() {
        let mut signal = vec![0.0; 16000];
        signal.extend(sine(220.0, 0.5, 16000));
        signal.extend(vec![0.0; 16000]);

        let trimmed = trim_silence(&signal, 30.0, FRAME_LENGTH, HOP_LENGTH).unwrap();
        let secs = trimmed.len() as f32 / 16000.0;
        assert!(secs > 1.0 && secs < 1.2, "trimmed to {}s", secs);
    }

    #[test]
    fn test_trim_of_silence_is_none() {
        assert!(trim_silence(&vec![0.0; 8000], 30.0, FRAME_LENGTH, HOP_LENGTH).is_none());
    }

    #[test]
    fn test_zcr_low_for_tone() {
        let zcr = zero_crossing_rate(&sine(200.0, 0.5, 16000), FRAME_LENGTH, HOP_LENGTH);
        let mean = zcr.iter().sum::<f32>() / zcr.len() as f32;
        // 200Hz → 400 crossings per 16000 samples
        assert!(mean < 0.05, "mean zcr {}", mean);
    }

    #[test]
    fn test_yin_finds_tone() {
        let frame = sine(200.0, 0.5, 1024);
        let f0 = yin_pitch(&frame, 16000, 80.0, 400.0, 0.15).unwrap();
        assert!((f0 - 200.0).abs() < 5.0, "estimated {}Hz", f0);
    }

    #[test]
    fn test_yin_rejects_silence() {
        assert!(yin_pitch(&[0.0; 1024], 16000, 80.0, 400.0, 0.15).is_none());
    }

    #[test]
    fn test_yin_rejects_short_frame() {
        assert!(yin_pitch(&[0.1; 100], 16000, 80.0, 400.0, 0.15).is_none());
    }
}
