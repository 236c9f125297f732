//! Two-stage classifier cascade.
//!
//! ```text
//! waveform → model input (peak-normalized, padded) → Embedding
//!          → Gatekeeper: gate_score > threshold ?
//!               no  → Fluent (specialist never runs)
//!               yes → Specialist: [Fluent, Block, Prolongation, Repetition]
//!                     → resolve_stutter_type (Fluent excluded, low confidence → Block)
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::audio::AudioNormalizer;
use crate::models::{Embedding, ModelSet, SPECIALIST_CLASSES};

/// Specialist output classes, in model output order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
)]
pub enum StutterType {
    #[default]
    Fluent,
    Block,
    Prolongation,
    Repetition,
}

impl StutterType {
    pub const ALL: [StutterType; SPECIALIST_CLASSES] = [
        StutterType::Fluent,
        StutterType::Block,
        StutterType::Prolongation,
        StutterType::Repetition,
    ];

    /// Position in the specialist's output vector.
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Result of one pass through the cascade.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    /// Gatekeeper probability, clamped to [0, 1]
    pub gate_score: f32,
    pub is_stutter: bool,
    pub stutter_type: StutterType,
    /// Probability of the chosen type (0 when the specialist did not run)
    pub type_confidence: f32,
    /// Raw specialist output, present only when the specialist ran and succeeded
    #[serde(skip)]
    pub probabilities: Option<[f32; SPECIALIST_CLASSES]>,
}

impl ClassificationResult {
    /// Neutral "nothing detected" result, used when classification is impossible.
    pub fn neutral() -> Self {
        Self {
            gate_score: 0.0,
            is_stutter: false,
            stutter_type: StutterType::Fluent,
            type_confidence: 0.0,
            probabilities: None,
        }
    }

    /// Specialist probability for one class (0 if the specialist did not run).
    pub fn probability_of(&self, stutter_type: StutterType) -> f32 {
        self.probabilities
            .map(|p| p[stutter_type.index()])
            .filter(|p| p.is_finite())
            .unwrap_or(0.0)
    }
}

impl Default for ClassificationResult {
    fn default() -> Self {
        Self::neutral()
    }
}

#[derive(Debug, Clone)]
pub struct CascadeConfig {
    pub binary_threshold: f32,    // Gate fires strictly above this: 0.60
    pub min_type_confidence: f32, // Weaker specialist winners fall back to Block: 0.45
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            binary_threshold: 0.60,
            min_type_confidence: 0.45,
        }
    }
}

/// Pick the stutter type from specialist probabilities.
///
/// Fluent never wins. The highest non-Fluent class is returned with its probability,
/// unless that probability is below `min_confidence`, in which case the answer is
/// Block (a mis-typed event is still an event). Earlier classes win ties and
/// non-finite values are ignored.
pub fn resolve_stutter_type(
    probabilities: &[f32; SPECIALIST_CLASSES],
    min_confidence: f32,
) -> (StutterType, f32) {
    let mut best: Option<(StutterType, f32)> = None;
    for stutter_type in StutterType::ALL.into_iter().skip(1) {
        let p = probabilities[stutter_type.index()];
        if !p.is_finite() {
            continue;
        }
        match best {
            Some((_, top)) if p <= top => {}
            _ => best = Some((stutter_type, p)),
        }
    }

    match best {
        Some((stutter_type, p)) if p >= min_confidence => (stutter_type, p),
        Some((_, p)) => (StutterType::Block, p),
        None => (StutterType::Block, 0.0),
    }
}

fn sanitize_score(score: f32) -> f32 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

/// Gatekeeper → specialist cascade over a shared model set.
pub struct ClassifierCascade {
    models: Arc<ModelSet>,
    normalizer: AudioNormalizer,
    config: CascadeConfig,
}

impl ClassifierCascade {
    pub fn new(models: Arc<ModelSet>, normalizer: AudioNormalizer, config: CascadeConfig) -> Self {
        Self {
            models,
            normalizer,
            config,
        }
    }

    pub fn config(&self) -> &CascadeConfig {
        &self.config
    }

    /// Classify raw 16kHz samples. Never fails: model errors give a neutral result.
    pub fn classify(&self, samples: &[f32]) -> ClassificationResult {
        let input = self.normalizer.model_input(samples);
        match self.models.embedder.embed(&input) {
            Ok(embedding) => self.classify_embedding(&embedding),
            Err(e) => {
                log::warn!("Embedding extraction failed: {}", e);
                ClassificationResult::neutral()
            }
        }
    }

    /// Run both stages on an embedding. Deterministic for a given embedding.
    pub fn classify_embedding(&self, embedding: &Embedding) -> ClassificationResult {
        let gate_score = match self.models.gatekeeper.score(embedding) {
            Ok(score) => sanitize_score(score),
            Err(e) => {
                log::warn!("Gatekeeper failed: {}", e);
                return ClassificationResult::neutral();
            }
        };

        let is_stutter = gate_score > self.config.binary_threshold;
        if !is_stutter {
            log::debug!("Gatekeeper score {:.4} -> fluent", gate_score);
            return ClassificationResult {
                gate_score,
                ..ClassificationResult::neutral()
            };
        }

        let probabilities = match self.models.specialist.probabilities(embedding) {
            Ok(p) => Some(p),
            Err(e) => {
                log::warn!("Specialist failed after gate fired: {}", e);
                None
            }
        };

        let (stutter_type, type_confidence) = resolve_stutter_type(
            &probabilities.unwrap_or([0.0; SPECIALIST_CLASSES]),
            self.config.min_type_confidence,
        );
        log::debug!(
            "Gatekeeper score {:.4} -> stutter, specialist type {} ({:.2})",
            gate_score,
            stutter_type,
            type_confidence
        );

        ClassificationResult {
            gate_score,
            is_stutter,
            stutter_type,
            type_confidence,
            probabilities,
        }
    }
}
