//! Deterministic signal heuristics used as game rules and noise guards.
//!
//! Each analyzer is stateless and returns `Result<_, ExtractionError>`. The pipeline
//! never sees those errors: [`HeuristicAnalyzer::analyze_or_default`] collapses any
//! failure to the analyzer's documented negative default.

pub mod amplitude;
pub mod breath;
pub mod voicing;

pub use amplitude::{SustainConfig, SustainResult, SustainedAmplitudeAnalyzer};
pub use breath::{BreathAnalyzer, BreathConfig, BreathResult};
pub use voicing::{VoicingAnalyzer, VoicingConfig, VoicingResult};

use crate::audio::AudioClip;
use crate::error::ExtractionError;

/// Unified analyzer interface for the heuristic validators
pub trait HeuristicAnalyzer: Send + Sync {
    /// Shape of the result; `Default` is the fail-open value.
    type Output: Default + std::fmt::Debug;

    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn analyze(&self, clip: &AudioClip) -> Result<Self::Output, ExtractionError>;

    /// Run the analyzer, substituting the negative default on any extraction error.
    fn analyze_or_default(&self, clip: &AudioClip) -> Self::Output {
        match self.analyze(clip) {
            Ok(result) => {
                log::debug!("{} heuristic: {:?}", self.name(), result);
                result
            }
            Err(e) => {
                log::warn!("{} heuristic failed ({}), using default", self.name(), e);
                Self::Output::default()
            }
        }
    }
}

/// Length of the longest run of `true` values.
pub fn longest_run<I: IntoIterator<Item = bool>>(flags: I) -> usize {
    let mut current = 0;
    let mut longest = 0;
    for flag in flags {
        if flag {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

/// Convert a frame count to seconds given the clip duration spread over `total_frames`.
pub fn frames_to_secs(frames: usize, total_frames: usize, duration_secs: f64) -> f64 {
    if total_frames == 0 {
        return 0.0;
    }
    frames as f64 * duration_secs / total_frames as f64
}
