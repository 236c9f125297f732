//! Practice exercises and the verdicts they produce.
//!
//! Each exercise pairs a *game rule* (did the child do the exercise: speak slowly,
//! hold the sound, breathe first) with a *clinical rule* (was the attempt free of the
//! disfluency the exercise targets). A hit needs both.

pub mod decision;
pub mod feedback;

pub use decision::{
    is_voiced_phoneme, resolve_phoneme_match, words_per_minute, DecisionConfig,
    ExerciseDecisionEngine,
};
pub use feedback::select_feedback;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::transcript::PhonemeMatch;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ExerciseKind {
    /// Slow, smooth speech
    Turtle,
    /// One long, smooth sound
    Snake,
    /// Breath first, then an easy onset
    Balloon,
    /// A single word said once
    OneTap,
}

impl ExerciseKind {
    /// Whether the verdict needs words from the transcriber.
    pub fn needs_transcript(self) -> bool {
        matches!(self, ExerciseKind::Turtle | ExerciseKind::Snake)
    }

    /// Log prefix, e.g. `[SNAKE]`.
    pub fn tag(self) -> String {
        format!("[{}]", self.as_ref().to_uppercase())
    }
}

/// Pass/fail decision before feedback is attached.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Judgement {
    pub game_pass: bool,
    pub clinical_pass: bool,
    pub is_hit: bool,
    pub confidence: f32,
}

impl Judgement {
    pub fn new(game_pass: bool, clinical_pass: bool, confidence: f32) -> Self {
        Self {
            game_pass,
            clinical_pass,
            is_hit: game_pass && clinical_pass,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExerciseVerdict {
    pub game_pass: bool,
    pub clinical_pass: bool,
    pub is_hit: bool,
    pub confidence: f32,
    pub feedback: String,
}

impl ExerciseVerdict {
    pub fn from_judgement(judgement: Judgement, feedback: impl Into<String>) -> Self {
        Self {
            game_pass: judgement.game_pass,
            clinical_pass: judgement.clinical_pass,
            is_hit: judgement.is_hit,
            confidence: judgement.confidence,
            feedback: feedback.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurtleDetails {
    pub wpm: f64,
    pub stutter_detected: bool,
    pub block_detected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnakeDetails {
    /// Longest sustained run, rounded to 2 decimals
    pub duration_sec: f64,
    pub amplitude_sustained: bool,
    pub repetition_detected: bool,
    pub voiced_detected: bool,
    pub noise_suspected: bool,
    pub phoneme_match: PhonemeMatch,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalloonDetails {
    pub breath_detected: bool,
    /// Rounded to 3 decimals
    pub amplitude_onset: f32,
    pub hard_attack_detected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OneTapDetails {
    pub stutter_detected: bool,
    pub repetition_detected: bool,
    pub repetition_prob: f32,
}

/// Exercise-specific evidence, flattened into the response body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ExerciseDetails {
    Turtle(TurtleDetails),
    Snake(SnakeDetails),
    Balloon(BalloonDetails),
    OneTap(OneTapDetails),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExerciseReport {
    pub exercise: ExerciseKind,
    #[serde(flatten)]
    pub details: ExerciseDetails,
    #[serde(flatten)]
    pub verdict: ExerciseVerdict,
    pub hotspot_time: Option<f64>,
}

/// Round to a fixed number of decimals for presentation.
pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
