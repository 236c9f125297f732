//! Verdict policies for the four exercises.
//!
//! Every judge is a pure function of its evidence: the cascade classification, the
//! heuristic relevant to the exercise and (Turtle, Snake) the transcript. Feedback is
//! attached later by the pipeline.

use super::{
    round_to, BalloonDetails, Judgement, OneTapDetails, SnakeDetails, TurtleDetails,
};
use crate::detection::{ClassificationResult, StutterType};
use crate::heuristics::{BreathResult, SustainResult, VoicingResult};
use crate::transcript::{target_symbol, PhonemeMatch, Transcript, TranscriptWord};

/// Simplified symbols for sounds that carry voice (vowels, nasals, liquids, voiced
/// fricatives). `th` is left out because it stands for both TH and DH.
const VOICED_PHONEMES: &[&str] = &[
    "a", "u", "aw", "ow", "i", "e", "er", "ee", "o", "oy", "oo", "m", "n", "ng", "l", "r", "v",
    "z", "zh", "j",
];

#[derive(Debug, Clone)]
pub struct DecisionConfig {
    pub max_wpm: f64,                     // Turtle pace must stay strictly under: 120
    pub hard_attack_gate: f32,            // Any non-fluent type above this gate is a hard attack: 0.9
    pub snake_game_weight: f32,           // 0.4
    pub snake_clinical_weight: f32,       // 0.3
    pub snake_confirmed_weight: f32,      // 0.2
    pub snake_indeterminate_weight: f32,  // 0.15
    pub snake_voiced_weight: f32,         // 0.1
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            max_wpm: 120.0,
            hard_attack_gate: 0.9,
            snake_game_weight: 0.4,
            snake_clinical_weight: 0.3,
            snake_confirmed_weight: 0.2,
            snake_indeterminate_weight: 0.15,
            snake_voiced_weight: 0.1,
        }
    }
}

/// Speaking rate over the span from the first word's start to the last word's end.
///
/// Zero with fewer than two words or a non-positive span.
pub fn words_per_minute(words: &[TranscriptWord]) -> f64 {
    let (Some(first), Some(last)) = (words.first(), words.last()) else {
        return 0.0;
    };
    if words.len() < 2 {
        return 0.0;
    }

    let span = last.end_time - first.start_time;
    if span <= 0.0 || !span.is_finite() {
        return 0.0;
    }

    words.len() as f64 * 60.0 / span
}

/// Whether a (simplified or ARPAbet) phoneme is voiced.
pub fn is_voiced_phoneme(phoneme: &str) -> bool {
    target_symbol(phoneme).is_some_and(|simple| VOICED_PHONEMES.contains(&simple.as_str()))
}

/// Apply the anti-noise override to a raw phoneme match.
///
/// An indeterminate match on a voiced target becomes a mismatch when nothing suggests
/// the child spoke at all: no voicing, no cascade trigger and no transcribed words.
/// Confirmed and mismatch results are never changed.
pub fn resolve_phoneme_match(
    raw: PhonemeMatch,
    target: Option<&str>,
    voicing: &VoicingResult,
    classification: &ClassificationResult,
    transcript: &Transcript,
) -> PhonemeMatch {
    if raw != PhonemeMatch::Indeterminate {
        return raw;
    }
    let Some(target) = target.filter(|t| !t.trim().is_empty()) else {
        return raw;
    };
    if !is_voiced_phoneme(target) {
        return raw;
    }

    let speech_evidence =
        voicing.voiced_detected || classification.is_stutter || transcript.has_words();
    if speech_evidence {
        raw
    } else {
        log::debug!(
            "No speech evidence for voiced target '{}', treating as mismatch",
            target
        );
        PhonemeMatch::Mismatch
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExerciseDecisionEngine {
    config: DecisionConfig,
}

impl ExerciseDecisionEngine {
    pub fn new(config: DecisionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DecisionConfig {
        &self.config
    }

    /// Turtle: slow speech (0 < wpm < 120) without blocks.
    pub fn judge_turtle(
        &self,
        classification: &ClassificationResult,
        transcript: &Transcript,
    ) -> (Judgement, TurtleDetails) {
        let wpm = words_per_minute(&transcript.words);
        let game_pass = wpm > 0.0 && wpm < self.config.max_wpm;
        let block_detected = classification.stutter_type == StutterType::Block;

        (
            Judgement::new(game_pass, !block_detected, classification.gate_score),
            TurtleDetails {
                wpm,
                stutter_detected: classification.is_stutter,
                block_detected,
            },
        )
    }

    /// Snake: a sustained sound without repetitions.
    pub fn judge_snake(
        &self,
        classification: &ClassificationResult,
        sustain: &SustainResult,
        voicing: &VoicingResult,
        phoneme_match: PhonemeMatch,
    ) -> (Judgement, SnakeDetails) {
        let game_pass = sustain.sustained;
        let repetition_detected = classification.stutter_type == StutterType::Repetition;
        let clinical_pass = !repetition_detected;

        let cfg = &self.config;
        let match_weight = match phoneme_match {
            PhonemeMatch::Confirmed => cfg.snake_confirmed_weight,
            PhonemeMatch::Indeterminate => cfg.snake_indeterminate_weight,
            PhonemeMatch::Mismatch => 0.0,
        };
        let confidence = cfg.snake_game_weight * game_pass as u8 as f32
            + cfg.snake_clinical_weight * clinical_pass as u8 as f32
            + match_weight
            + cfg.snake_voiced_weight * voicing.voiced_detected as u8 as f32;

        (
            Judgement::new(game_pass, clinical_pass, confidence),
            SnakeDetails {
                duration_sec: round_to(sustain.duration_sec, 2),
                amplitude_sustained: sustain.sustained,
                repetition_detected,
                voiced_detected: voicing.voiced_detected,
                noise_suspected: voicing.noise_suspected,
                phoneme_match,
            },
        )
    }

    /// Balloon: a breath before speaking and no hard attack.
    pub fn judge_balloon(
        &self,
        classification: &ClassificationResult,
        breath: &BreathResult,
    ) -> (Judgement, BalloonDetails) {
        let stutter_type = classification.stutter_type;
        let hard_attack_detected = stutter_type == StutterType::Block
            || (classification.gate_score > self.config.hard_attack_gate
                && stutter_type != StutterType::Fluent);

        (
            Judgement::new(
                breath.breath_detected,
                !hard_attack_detected,
                classification.gate_score,
            ),
            BalloonDetails {
                breath_detected: breath.breath_detected,
                amplitude_onset: round_to(breath.amplitude_onset as f64, 3) as f32,
                hard_attack_detected,
            },
        )
    }

    /// One-tap: no game rule, the word just has to be fluent.
    pub fn judge_onetap(&self, classification: &ClassificationResult) -> (Judgement, OneTapDetails) {
        (
            Judgement::new(true, !classification.is_stutter, classification.gate_score),
            OneTapDetails {
                stutter_detected: classification.is_stutter,
                repetition_detected: classification.stutter_type == StutterType::Repetition,
                repetition_prob: classification.probability_of(StutterType::Repetition),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classified(gate_score: f32, stutter_type: StutterType) -> ClassificationResult {
        ClassificationResult {
            gate_score,
            is_stutter: stutter_type != StutterType::Fluent,
            stutter_type,
            type_confidence: 0.7,
            probabilities: None,
        }
    }

    fn words(spans: &[(f64, f64)]) -> Vec<TranscriptWord> {
        spans
            .iter()
            .enumerate()
            .map(|(i, &(s, e))| TranscriptWord::new(format!("w{}", i), s, e, 0.9))
            .collect()
    }

    fn voiced(voiced_detected: bool) -> VoicingResult {
        VoicingResult {
            voiced_detected,
            ..VoicingResult::default()
        }
    }

    #[test]
    fn test_wpm() {
        assert_eq!(words_per_minute(&words(&[(0.0, 0.5), (0.5, 1.0), (1.0, 2.5)])), 72.0);
        assert_eq!(words_per_minute(&words(&[(0.0, 0.5)])), 0.0);
        assert_eq!(words_per_minute(&[]), 0.0);
        assert_eq!(words_per_minute(&words(&[(1.0, 1.0), (1.0, 1.0)])), 0.0);
    }

    #[test]
    fn test_turtle_slow_fluent_speech_is_hit() {
        let transcript = Transcript::from_words(words(&[(0.0, 0.5), (0.5, 1.0), (1.0, 2.5)]));
        let (judgement, details) = ExerciseDecisionEngine::default()
            .judge_turtle(&classified(0.2, StutterType::Fluent), &transcript);

        assert_eq!(details.wpm, 72.0);
        assert!(judgement.game_pass);
        assert!(judgement.clinical_pass);
        assert!(judgement.is_hit);
        assert_eq!(judgement.confidence, 0.2);
    }

    #[test]
    fn test_turtle_fast_or_blocked_is_miss() {
        let engine = ExerciseDecisionEngine::default();
        // 4 words in 1s = 240 wpm
        let fast = Transcript::from_words(words(&[(0.0, 0.2), (0.2, 0.5), (0.5, 0.7), (0.7, 1.0)]));
        let (judgement, _) = engine.judge_turtle(&classified(0.1, StutterType::Fluent), &fast);
        assert!(!judgement.game_pass);

        let slow = Transcript::from_words(words(&[(0.0, 1.0), (1.5, 3.0)]));
        let (judgement, details) = engine.judge_turtle(&classified(0.8, StutterType::Block), &slow);
        assert!(judgement.game_pass);
        assert!(!judgement.clinical_pass);
        assert!(details.block_detected);

        // Silence: no words, no pace
        let (judgement, _) =
            engine.judge_turtle(&classified(0.0, StutterType::Fluent), &Transcript::empty());
        assert!(!judgement.game_pass);
    }

    #[test]
    fn test_snake_confidence_weights() {
        let engine = ExerciseDecisionEngine::default();
        let sustained = SustainResult::from_duration(1.6, 1.5);

        let (judgement, details) = engine.judge_snake(
            &classified(0.1, StutterType::Fluent),
            &sustained,
            &voiced(true),
            PhonemeMatch::Confirmed,
        );
        assert!(judgement.is_hit);
        assert!((judgement.confidence - 1.0).abs() < 1e-6);
        assert_eq!(details.duration_sec, 1.6);

        let (judgement, _) = engine.judge_snake(
            &classified(0.1, StutterType::Fluent),
            &sustained,
            &voiced(false),
            PhonemeMatch::Indeterminate,
        );
        assert!((judgement.confidence - 0.85).abs() < 1e-6);

        let (judgement, details) = engine.judge_snake(
            &classified(0.9, StutterType::Repetition),
            &SustainResult::from_duration(1.234, 1.5),
            &voiced(false),
            PhonemeMatch::Mismatch,
        );
        assert!(!judgement.game_pass);
        assert!(!judgement.clinical_pass);
        assert!(details.repetition_detected);
        assert_eq!(judgement.confidence, 0.0);
        assert_eq!(details.duration_sec, 1.23);
    }

    #[test]
    fn test_snake_prolongation_is_not_a_clinical_failure() {
        let (judgement, _) = ExerciseDecisionEngine::default().judge_snake(
            &classified(0.9, StutterType::Prolongation),
            &SustainResult::from_duration(2.0, 1.5),
            &voiced(true),
            PhonemeMatch::Indeterminate,
        );
        assert!(judgement.clinical_pass);
        assert!(judgement.is_hit);
    }

    #[test]
    fn test_anti_noise_override() {
        let fluent = classified(0.1, StutterType::Fluent);
        let nothing = Transcript::empty();

        // Voiced target, no evidence of speech → mismatch
        assert_eq!(
            resolve_phoneme_match(PhonemeMatch::Indeterminate, Some("z"), &voiced(false), &fluent, &nothing),
            PhonemeMatch::Mismatch
        );
        // Unvoiced target is left alone
        assert_eq!(
            resolve_phoneme_match(PhonemeMatch::Indeterminate, Some("s"), &voiced(false), &fluent, &nothing),
            PhonemeMatch::Indeterminate
        );
        // Any speech evidence keeps it indeterminate
        assert_eq!(
            resolve_phoneme_match(PhonemeMatch::Indeterminate, Some("m"), &voiced(true), &fluent, &nothing),
            PhonemeMatch::Indeterminate
        );
        assert_eq!(
            resolve_phoneme_match(
                PhonemeMatch::Indeterminate,
                Some("m"),
                &voiced(false),
                &classified(0.9, StutterType::Block),
                &nothing
            ),
            PhonemeMatch::Indeterminate
        );
        // Confirmed is never overridden
        assert_eq!(
            resolve_phoneme_match(PhonemeMatch::Confirmed, Some("z"), &voiced(false), &fluent, &nothing),
            PhonemeMatch::Confirmed
        );
        // No target, nothing to override
        assert_eq!(
            resolve_phoneme_match(PhonemeMatch::Indeterminate, None, &voiced(false), &fluent, &nothing),
            PhonemeMatch::Indeterminate
        );
    }

    #[test]
    fn test_voiced_set() {
        assert!(is_voiced_phoneme("z"));
        assert!(is_voiced_phoneme("M"));
        assert!(is_voiced_phoneme("ee"));
        assert!(!is_voiced_phoneme("s"));
        assert!(!is_voiced_phoneme("sh"));
        assert!(!is_voiced_phoneme("th"));
        // Child symbols that are also ARPAbet codes keep their child meaning
        assert!(is_voiced_phoneme("aw"));
        assert!(is_voiced_phoneme("ow"));
        assert!(is_voiced_phoneme("AO"));
        assert!(!is_voiced_phoneme(""));
    }

    #[test]
    fn test_balloon_hard_attack() {
        let engine = ExerciseDecisionEngine::default();
        let breath = BreathResult {
            breath_detected: true,
            amplitude_onset: 0.04567,
        };

        let (judgement, details) = engine.judge_balloon(&classified(0.3, StutterType::Fluent), &breath);
        assert!(judgement.is_hit);
        assert_eq!(details.amplitude_onset, 0.046);

        let (judgement, _) = engine.judge_balloon(&classified(0.7, StutterType::Block), &breath);
        assert!(!judgement.clinical_pass);

        let (judgement, _) = engine.judge_balloon(&classified(0.95, StutterType::Repetition), &breath);
        assert!(!judgement.clinical_pass);

        let (judgement, _) = engine.judge_balloon(&classified(0.85, StutterType::Repetition), &breath);
        assert!(judgement.clinical_pass);

        let (judgement, _) =
            engine.judge_balloon(&classified(0.3, StutterType::Fluent), &BreathResult::default());
        assert!(!judgement.game_pass);
        assert!(!judgement.is_hit);
    }

    #[test]
    fn test_onetap_is_purely_clinical() {
        let engine = ExerciseDecisionEngine::default();

        let (judgement, details) = engine.judge_onetap(&classified(0.2, StutterType::Fluent));
        assert!(judgement.is_hit);
        assert_eq!(details.repetition_prob, 0.0);

        let mut prolonged = classified(0.8, StutterType::Prolongation);
        prolonged.probabilities = Some([0.0, 0.1, 0.6, 0.3]);
        let (judgement, details) = engine.judge_onetap(&prolonged);
        assert!(!judgement.is_hit);
        assert!(!details.repetition_detected);
        assert_eq!(details.repetition_prob, 0.3);
    }
}
