//! Voicing/noise discrimination.
//!
//! Guards the exercises against children blowing or hissing into the microphone:
//! real attempts carry pitch in the 80–400Hz speech range, while breath noise has
//! little periodicity and a high zero-crossing rate.

use serde::Serialize;

use super::HeuristicAnalyzer;
use crate::audio::features::{frame_rms, yin_pitch, zero_crossing_rate, FRAME_LENGTH, HOP_LENGTH};
use crate::audio::AudioClip;
use crate::error::ExtractionError;

#[derive(Debug, Clone)]
pub struct VoicingConfig {
    pub fmin: f32,                  // Lowest pitch considered speech: 80Hz
    pub fmax: f32,                  // Highest pitch considered speech: 400Hz
    pub yin_threshold: f32,         // CMND dip that marks a frame as periodic
    pub energy_floor: f32,          // Frames quieter than this are never voiced
    pub pitch_frame_length: usize,  // 1024 samples, enough for two 80Hz periods
    pub pitch_hop_length: usize,
    pub zcr_frame_length: usize,
    pub zcr_hop_length: usize,
    pub min_voiced_ratio: f32,      // pitched_ratio needed for voiced_detected: 0.15
    pub noise_ratio_factor: f32,    // Noise needs pitched_ratio < 0.15 * 0.67
    pub noise_zcr: f32,             // ...and mean ZCR above 0.2
    pub min_clip_sec: f64,          // Shorter clips are always noise: 0.3s
}

impl Default for VoicingConfig {
    fn default() -> Self {
        Self {
            fmin: 80.0,
            fmax: 400.0,
            yin_threshold: 0.15,
            energy_floor: 0.01,
            pitch_frame_length: 1024,
            pitch_hop_length: 512,
            zcr_frame_length: FRAME_LENGTH,
            zcr_hop_length: HOP_LENGTH,
            min_voiced_ratio: 0.15,
            noise_ratio_factor: 0.67,
            noise_zcr: 0.2,
            min_clip_sec: 0.3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct VoicingResult {
    /// Voiced frames / total frames
    pub pitched_ratio: f32,
    pub voiced_detected: bool,
    pub noise_suspected: bool,
    pub zcr_mean: f32,
}

#[derive(Debug, Clone, Default)]
pub struct VoicingAnalyzer {
    config: VoicingConfig,
}

impl VoicingAnalyzer {
    pub fn new(config: VoicingConfig) -> Self {
        Self { config }
    }

    /// Apply the voiced/noise decision rules to measured features.
    pub fn classify(&self, pitched_ratio: f32, zcr_mean: f32) -> VoicingResult {
        let voiced_detected = pitched_ratio >= self.config.min_voiced_ratio;
        let noise_suspected = pitched_ratio
            < self.config.min_voiced_ratio * self.config.noise_ratio_factor
            && zcr_mean > self.config.noise_zcr;

        VoicingResult {
            pitched_ratio,
            voiced_detected,
            noise_suspected,
            zcr_mean,
        }
    }

    fn pitched_ratio(&self, clip: &AudioClip) -> f32 {
        let samples = clip.samples();
        let frame_len = self.config.pitch_frame_length;
        let hop = self.config.pitch_hop_length.max(1);
        if samples.len() < frame_len {
            return 0.0;
        }

        let energies = frame_rms(samples, frame_len, hop);
        let mut total = 0usize;
        let mut voiced = 0usize;
        for (i, start) in (0..=samples.len() - frame_len).step_by(hop).enumerate() {
            total += 1;
            // Centered RMS at the frame midpoint approximates the frame energy
            let energy = energies.get(i + frame_len / (2 * hop)).copied().unwrap_or(0.0);
            if energy < self.config.energy_floor {
                continue;
            }
            let frame = &samples[start..start + frame_len];
            if yin_pitch(
                frame,
                clip.sample_rate(),
                self.config.fmin,
                self.config.fmax,
                self.config.yin_threshold,
            )
            .is_some()
            {
                voiced += 1;
            }
        }

        if total == 0 {
            0.0
        } else {
            voiced as f32 / total as f32
        }
    }
}

impl HeuristicAnalyzer for VoicingAnalyzer {
    type Output = VoicingResult;

    fn name(&self) -> &'static str {
        "voicing"
    }

    fn analyze(&self, clip: &AudioClip) -> Result<VoicingResult, ExtractionError> {
        if clip.is_empty() {
            return Err(ExtractionError::EmptySignal);
        }

        let zcr = zero_crossing_rate(
            clip.samples(),
            self.config.zcr_frame_length,
            self.config.zcr_hop_length,
        );
        let zcr_mean = if zcr.is_empty() {
            0.0
        } else {
            zcr.iter().sum::<f32>() / zcr.len() as f32
        };

        if clip.duration_secs() < self.config.min_clip_sec {
            return Ok(VoicingResult {
                pitched_ratio: 0.0,
                voiced_detected: false,
                noise_suspected: true,
                zcr_mean,
            });
        }

        Ok(self.classify(self.pitched_ratio(clip), zcr_mean))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn tone(freq: f32, seconds: f64) -> AudioClip {
        let n = (seconds * 16000.0) as usize;
        AudioClip::new(
            (0..n)
                .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / 16000.0).sin() * 0.5)
                .collect(),
        )
    }

    fn white_noise(seconds: f64) -> AudioClip {
        let mut rng = StdRng::seed_from_u64(7);
        let n = (seconds * 16000.0) as usize;
        AudioClip::new((0..n).map(|_| rng.gen_range(-0.5f32..0.5)).collect())
    }

    #[test]
    fn test_decision_rules() {
        let analyzer = VoicingAnalyzer::default();

        let voiced = analyzer.classify(0.4, 0.05);
        assert!(voiced.voiced_detected);
        assert!(!voiced.noise_suspected);

        let hiss = analyzer.classify(0.05, 0.45);
        assert!(!hiss.voiced_detected);
        assert!(hiss.noise_suspected);

        // Low pitch evidence alone is not enough to call it noise
        let quiet = analyzer.classify(0.05, 0.1);
        assert!(!quiet.voiced_detected);
        assert!(!quiet.noise_suspected);

        // Between 0.15 * 0.67 and 0.15: neither voiced nor noise
        let ambiguous = analyzer.classify(0.12, 0.45);
        assert!(!ambiguous.voiced_detected);
        assert!(!ambiguous.noise_suspected);
    }

    #[test]
    fn test_hummed_tone_is_voiced() {
        let result = VoicingAnalyzer::default().analyze(&tone(200.0, 1.0)).unwrap();
        assert!(result.voiced_detected, "{:?}", result);
        assert!(!result.noise_suspected);
        assert!(result.pitched_ratio > 0.8);
    }

    #[test]
    fn test_blowing_noise_is_flagged() {
        let result = VoicingAnalyzer::default().analyze(&white_noise(1.0)).unwrap();
        assert!(!result.voiced_detected, "{:?}", result);
        assert!(result.noise_suspected);
        assert!(result.zcr_mean > 0.2);
    }

    #[test]
    fn test_short_clip_is_noise() {
        let result = VoicingAnalyzer::default().analyze(&tone(200.0, 0.2)).unwrap();
        assert_eq!(result.pitched_ratio, 0.0);
        assert!(!result.voiced_detected);
        assert!(result.noise_suspected);
    }

    #[test]
    fn test_silence_is_neither_voiced_nor_noise() {
        let result = VoicingAnalyzer::default()
            .analyze(&AudioClip::new(vec![0.0; 16000]))
            .unwrap();
        assert_eq!(result, VoicingResult::default());
    }
}
