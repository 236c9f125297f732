//! Culprit-word selection and phoneme attribution.
//!
//! The classifier says *whether* and *when* something went wrong; the transcript says
//! *what* was being said. The aligner joins the two: it picks the word most likely to
//! hold the event and reduces it to one child-friendly phoneme symbol.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::Serialize;
use strum::{AsRefStr, Display};

use super::g2p::GraphemeToPhoneme;
use super::{Transcript, TranscriptWord};

/// ARPAbet → simplified symbol shown to children.
const PHONEME_MAP: &[(&str, &str)] = &[
    ("AA", "a"),
    ("AE", "a"),
    ("AH", "u"),
    ("AO", "aw"),
    ("AW", "ow"),
    ("AY", "i"),
    ("B", "b"),
    ("CH", "ch"),
    ("D", "d"),
    ("DH", "th"),
    ("EH", "e"),
    ("ER", "er"),
    ("EY", "a"),
    ("F", "f"),
    ("G", "g"),
    ("HH", "h"),
    ("IH", "i"),
    ("IY", "ee"),
    ("JH", "j"),
    ("K", "k"),
    ("L", "l"),
    ("M", "m"),
    ("N", "n"),
    ("NG", "ng"),
    ("OW", "o"),
    ("OY", "oy"),
    ("P", "p"),
    ("R", "r"),
    ("S", "s"),
    ("SH", "sh"),
    ("T", "t"),
    ("TH", "th"),
    ("UH", "u"),
    ("UW", "oo"),
    ("V", "v"),
    ("W", "w"),
    ("Y", "y"),
    ("Z", "z"),
    ("ZH", "zh"),
];

static PHONEME_TABLE: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| PHONEME_MAP.iter().copied().collect());

/// Strip stress digits and map through the table; unknown codes are lowercased.
pub fn simplify_phoneme(code: &str) -> String {
    let bare: String = code.chars().filter(|c| !c.is_ascii_digit()).collect();
    match PHONEME_TABLE.get(bare.as_str()) {
        Some(simple) => simple.to_string(),
        None => bare.to_lowercase(),
    }
}

/// Normalise a user-supplied target sound to a simplified symbol.
///
/// Several child symbols are also ARPAbet codes (`aw`, `ow`), so case decides: a
/// target written with lowercase letters that already is a simplified symbol is kept,
/// anything else goes through [`simplify_phoneme`]. Blank targets give `None`.
pub fn target_symbol(target: &str) -> Option<String> {
    let target = target.trim();
    if target.is_empty() {
        return None;
    }

    let lower = target.to_lowercase();
    let has_lowercase = target.chars().any(|c| c.is_ascii_lowercase());
    if has_lowercase && PHONEME_MAP.iter().any(|(_, simple)| *simple == lower) {
        return Some(lower);
    }

    Some(simplify_phoneme(&target.to_uppercase()))
}

fn is_boundary_token(token: &str) -> bool {
    let token = token.trim();
    token.is_empty() || token == "'"
}

#[derive(Debug, Clone)]
pub struct AlignerConfig {
    /// Legacy mode: the weakest word is the culprit only below this confidence
    pub culprit_confidence: f32,
    /// Conflict when the culprit word is heard this clearly...
    pub conflict_word_confidence: f32,
    /// ...while the gatekeeper stays below this
    pub conflict_gate_score: f32,
}

impl Default for AlignerConfig {
    fn default() -> Self {
        Self {
            culprit_confidence: 0.85,
            conflict_word_confidence: 0.95,
            conflict_gate_score: 0.8,
        }
    }
}

/// Pick the word most likely to contain the event.
///
/// With a hotspot: the word whose start is closest to it. Without: the least
/// confident word if it is below `culprit_confidence`, otherwise the first word.
/// Earlier words win ties.
pub fn select_culprit(
    words: &[TranscriptWord],
    hotspot: Option<f64>,
    culprit_confidence: f32,
) -> Option<&TranscriptWord> {
    match hotspot {
        Some(t) => words
            .iter()
            .min_by(|a, b| (a.start_time - t).abs().total_cmp(&(b.start_time - t).abs())),
        None => {
            let weakest = words
                .iter()
                .min_by(|a, b| a.confidence.total_cmp(&b.confidence))?;
            if weakest.confidence < culprit_confidence {
                Some(weakest)
            } else {
                words.first()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Attribution {
    pub culprit_word: Option<String>,
    pub phoneme: Option<String>,
    /// Transcript is confident where the classifier was not; informational only
    pub evidence_conflict: bool,
}

/// Outcome of checking a transcript for the exercise's target sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PhonemeMatch {
    Confirmed,
    Indeterminate,
    Mismatch,
}

pub struct TranscriptAligner {
    g2p: Arc<dyn GraphemeToPhoneme>,
    config: AlignerConfig,
}

impl TranscriptAligner {
    pub fn new(g2p: Arc<dyn GraphemeToPhoneme>, config: AlignerConfig) -> Self {
        Self { g2p, config }
    }

    /// First sounding phoneme of a word, simplified.
    pub fn first_phoneme(&self, word: &str) -> Option<String> {
        self.g2p
            .phonemes(word)
            .iter()
            .find(|token| !is_boundary_token(token))
            .map(|token| simplify_phoneme(token.trim()))
    }

    /// Every simplified phoneme of a word, in order.
    fn simplified_phonemes(&self, word: &str) -> Vec<String> {
        self.g2p
            .phonemes(word)
            .iter()
            .filter(|token| !is_boundary_token(token))
            .map(|token| simplify_phoneme(token.trim()))
            .collect()
    }

    pub fn attribute(
        &self,
        transcript: &Transcript,
        hotspot: Option<f64>,
        gate_score: f32,
    ) -> Attribution {
        let Some(culprit) =
            select_culprit(&transcript.words, hotspot, self.config.culprit_confidence)
        else {
            return Attribution::default();
        };

        let evidence_conflict = culprit.confidence > self.config.conflict_word_confidence
            && gate_score < self.config.conflict_gate_score;
        if evidence_conflict {
            log::info!(
                "⚖️ Evidence conflict: STT heard '{}' clearly ({:.2}) but gate score is {:.2}",
                culprit.text,
                culprit.confidence,
                gate_score
            );
        }

        Attribution {
            culprit_word: Some(culprit.text.clone()),
            phoneme: self.first_phoneme(&culprit.text),
            evidence_conflict,
        }
    }

    /// Check whether any transcribed word contains the target sound.
    pub fn phoneme_match(&self, transcript: &Transcript, target: Option<&str>) -> PhonemeMatch {
        let Some(target) = target.and_then(target_symbol) else {
            return PhonemeMatch::Indeterminate;
        };

        if !transcript.has_words() {
            return PhonemeMatch::Indeterminate;
        }

        let heard = transcript
            .words
            .iter()
            .any(|w| self.simplified_phonemes(&w.text).contains(&target));

        if heard {
            PhonemeMatch::Confirmed
        } else {
            PhonemeMatch::Mismatch
        }
    }
}
