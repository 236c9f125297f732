//! Speech-to-text and phoneme attribution.

pub mod aligner;
pub mod g2p;
pub mod google;

pub use aligner::{
    select_culprit, simplify_phoneme, target_symbol, AlignerConfig, Attribution, PhonemeMatch,
    TranscriptAligner,
};
pub use g2p::{CmuDictionary, GraphemeToPhoneme};
pub use google::{GoogleSpeechClient, GoogleSpeechConfig};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TranscriptionError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("Response parsing error: {0}")]
    ParseError(String),
    #[error("Audio format error: {0}")]
    AudioFormat(String),
}

/// One recognized word with timing (seconds from clip start).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptWord {
    pub text: String,
    pub start_time: f64,
    pub end_time: f64,
    /// Recognizer confidence in [0, 1]
    pub confidence: f32,
}

impl TranscriptWord {
    pub fn new(text: impl Into<String>, start_time: f64, end_time: f64, confidence: f32) -> Self {
        Self {
            text: text.into(),
            start_time,
            end_time,
            confidence,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Transcript {
    pub text: String,
    /// Ordered by start time
    pub words: Vec<TranscriptWord>,
}

impl Transcript {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_words(words: Vec<TranscriptWord>) -> Self {
        let text = words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        Self { text, words }
    }

    pub fn has_words(&self) -> bool {
        !self.words.is_empty()
    }
}

/// Audio → transcript capability.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe 16-bit little-endian mono PCM.
    async fn try_transcribe(
        &self,
        pcm16: &[u8],
        sample_rate: u32,
    ) -> Result<Transcript, TranscriptionError>;

    /// Like [`Transcriber::try_transcribe`] but never fails: errors give an empty transcript.
    async fn transcribe(&self, pcm16: &[u8], sample_rate: u32) -> Transcript {
        match self.try_transcribe(pcm16, sample_rate).await {
            Ok(transcript) => transcript,
            Err(e) => {
                log::warn!("STT failed, continuing without transcript: {}", e);
                Transcript::empty()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Broken;

    #[async_trait]
    impl Transcriber for Broken {
        async fn try_transcribe(
            &self,
            _pcm16: &[u8],
            _sample_rate: u32,
        ) -> Result<Transcript, TranscriptionError> {
            Err(TranscriptionError::ApiError {
                status: 503,
                message: "unavailable".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_failed_transcription_is_empty() {
        let transcript = Broken.transcribe(&[0u8; 64], 16000).await;
        assert_eq!(transcript, Transcript::empty());
        assert!(!transcript.has_words());
    }

    #[test]
    fn test_from_words_joins_text() {
        let transcript = Transcript::from_words(vec![
            TranscriptWord::new("slow", 0.0, 0.4, 0.9),
            TranscriptWord::new("turtle", 0.5, 1.0, 0.8),
        ]);
        assert_eq!(transcript.text, "slow turtle");
        assert!(transcript.has_words());
    }
}
