//! Breath/onset validator for the Balloon exercise.
//!
//! A "breath" is a silent stretch followed by the start of voicing. The scan walks
//! the frame RMS once and stops at the first silence of at least `min_silence_sec`
//! that is immediately followed by a non-silent frame; that frame's RMS is reported
//! as the onset amplitude. A qualifying silence that runs to the end of the clip
//! (breath taken, nothing said after it) still counts as a weaker positive with an
//! onset amplitude of zero.

use serde::Serialize;

use super::HeuristicAnalyzer;
use crate::audio::features::{frame_rms, FRAME_LENGTH, HOP_LENGTH};
use crate::audio::AudioClip;
use crate::error::ExtractionError;

#[derive(Debug, Clone)]
pub struct BreathConfig {
    pub silence_threshold: f32, // Frames below this RMS are silent: 0.01
    pub min_silence_sec: f64,   // Shortest silence that counts as a breath: 0.3s
    pub frame_length: usize,
    pub hop_length: usize,
}

impl Default for BreathConfig {
    fn default() -> Self {
        Self {
            silence_threshold: 0.01,
            min_silence_sec: 0.3,
            frame_length: FRAME_LENGTH,
            hop_length: HOP_LENGTH,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct BreathResult {
    pub breath_detected: bool,
    /// RMS of the first frame after the breath (0.0 if none)
    pub amplitude_onset: f32,
}

#[derive(Debug, Clone, Default)]
pub struct BreathAnalyzer {
    config: BreathConfig,
}

impl BreathAnalyzer {
    pub fn new(config: BreathConfig) -> Self {
        Self { config }
    }

    /// Scan a frame-RMS sequence for the first qualifying silence → onset transition.
    pub fn scan(&self, rms: &[f32], frame_duration: f64) -> BreathResult {
        let mut silent_frames = 0usize;

        for &value in rms {
            if value < self.config.silence_threshold {
                silent_frames += 1;
                continue;
            }

            if silent_frames > 0 {
                let silence_sec = silent_frames as f64 * frame_duration;
                if silence_sec >= self.config.min_silence_sec {
                    return BreathResult {
                        breath_detected: true,
                        amplitude_onset: value,
                    };
                }
                silent_frames = 0;
            }
        }

        // No onset followed a long enough silence; a trailing one still counts.
        let trailing_sec = silent_frames as f64 * frame_duration;
        BreathResult {
            breath_detected: trailing_sec >= self.config.min_silence_sec,
            amplitude_onset: 0.0,
        }
    }
}

impl HeuristicAnalyzer for BreathAnalyzer {
    type Output = BreathResult;

    fn name(&self) -> &'static str {
        "breath"
    }

    fn analyze(&self, clip: &AudioClip) -> Result<BreathResult, ExtractionError> {
        let rms = frame_rms(clip.samples(), self.config.frame_length, self.config.hop_length);
        if rms.is_empty() {
            return Err(ExtractionError::EmptySignal);
        }
        if rms.iter().all(|&v| v < self.config.silence_threshold) {
            return Err(ExtractionError::NoEnergy);
        }

        let frame_duration = clip.duration_secs() / rms.len() as f64;
        Ok(self.scan(&rms, frame_duration))
    }
}
