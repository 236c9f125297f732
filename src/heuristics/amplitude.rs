//! Sustained-amplitude validator for the Snake exercise.

use serde::Serialize;

use super::{frames_to_secs, longest_run, HeuristicAnalyzer};
use crate::audio::features::{frame_rms, trim_silence, FRAME_LENGTH, HOP_LENGTH};
use crate::audio::AudioClip;
use crate::error::ExtractionError;

#[derive(Debug, Clone)]
pub struct SustainConfig {
    pub amplitude_floor: f32,  // RMS a frame must exceed to count as sound: 0.02
    pub min_duration_sec: f64, // Longest run needed for a sustained sound: 1.5s
    pub trim_db: f32,          // Edge trim: 30dB below peak
    pub frame_length: usize,
    pub hop_length: usize,
}

impl Default for SustainConfig {
    fn default() -> Self {
        Self {
            amplitude_floor: 0.02,
            min_duration_sec: 1.5,
            trim_db: 30.0,
            frame_length: FRAME_LENGTH,
            hop_length: HOP_LENGTH,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SustainResult {
    /// Longest uninterrupted sound, in seconds
    pub duration_sec: f64,
    pub sustained: bool,
}

impl SustainResult {
    pub fn from_duration(duration_sec: f64, min_duration_sec: f64) -> Self {
        Self {
            duration_sec,
            sustained: duration_sec >= min_duration_sec,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SustainedAmplitudeAnalyzer {
    config: SustainConfig,
}

impl SustainedAmplitudeAnalyzer {
    pub fn new(config: SustainConfig) -> Self {
        Self { config }
    }
}

impl HeuristicAnalyzer for SustainedAmplitudeAnalyzer {
    type Output = SustainResult;

    fn name(&self) -> &'static str {
        "sustained-amplitude"
    }

    fn analyze(&self, clip: &AudioClip) -> Result<SustainResult, ExtractionError> {
        if clip.is_empty() {
            return Err(ExtractionError::EmptySignal);
        }

        let trimmed = trim_silence(
            clip.samples(),
            self.config.trim_db,
            self.config.frame_length,
            self.config.hop_length,
        )
        .ok_or(ExtractionError::NoEnergy)?;

        let rms = frame_rms(trimmed, self.config.frame_length, self.config.hop_length);
        let run = longest_run(rms.iter().map(|&v| v > self.config.amplitude_floor));
        let trimmed_secs = trimmed.len() as f64 / clip.sample_rate() as f64;
        let duration_sec = frames_to_secs(run, rms.len(), trimmed_secs);

        Ok(SustainResult::from_duration(
            duration_sec,
            self.config.min_duration_sec,
        ))
    }
}
