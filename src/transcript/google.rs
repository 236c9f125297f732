//! Google Cloud Speech-to-Text over the v1 REST API.
//!
//! Synchronous `speech:recognize` with word time offsets and per-word confidence
//! enabled. Audio is sent inline as base64 LINEAR16.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretBox};
use serde::{Deserialize, Serialize};

use super::{Transcriber, Transcript, TranscriptWord, TranscriptionError};

#[derive(Debug, Clone)]
pub struct GoogleSpeechConfig {
    pub base_url: String,
    pub language_code: String,
}

impl Default for GoogleSpeechConfig {
    fn default() -> Self {
        Self {
            base_url: "https://speech.googleapis.com/v1".to_string(),
            language_code: "en-US".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecognitionConfig<'a> {
    encoding: &'static str,
    sample_rate_hertz: u32,
    language_code: &'a str,
    enable_word_time_offsets: bool,
    enable_word_confidence: bool,
}

#[derive(Debug, Serialize)]
struct RecognitionAudio {
    content: String,
}

#[derive(Debug, Serialize)]
struct RecognizeRequest<'a> {
    config: RecognitionConfig<'a>,
    audio: RecognitionAudio,
}

#[derive(Debug, Deserialize, Default)]
struct RecognizeResponse {
    #[serde(default)]
    results: Vec<RecognitionResult>,
}

#[derive(Debug, Deserialize)]
struct RecognitionResult {
    #[serde(default)]
    alternatives: Vec<Alternative>,
}

#[derive(Debug, Deserialize)]
struct Alternative {
    #[serde(default)]
    transcript: String,
    #[serde(default)]
    words: Vec<WordInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WordInfo {
    word: String,
    #[serde(default)]
    start_time: Option<String>,
    #[serde(default)]
    end_time: Option<String>,
    #[serde(default)]
    confidence: Option<f32>,
}

/// Parse a protobuf JSON duration such as `"1.500s"`.
fn parse_duration(value: &str) -> Result<f64, TranscriptionError> {
    value
        .trim()
        .strip_suffix('s')
        .and_then(|secs| secs.parse::<f64>().ok())
        .ok_or_else(|| TranscriptionError::ParseError(format!("Invalid duration: {:?}", value)))
}

fn optional_duration(value: Option<&str>) -> Result<f64, TranscriptionError> {
    value.map(parse_duration).unwrap_or(Ok(0.0))
}

/// Flatten the top alternative of every result into one transcript.
fn into_transcript(response: RecognizeResponse) -> Result<Transcript, TranscriptionError> {
    let mut text_parts = Vec::new();
    let mut words = Vec::new();

    for result in response.results {
        let Some(best) = result.alternatives.into_iter().next() else {
            continue;
        };
        let part = best.transcript.trim();
        if !part.is_empty() {
            text_parts.push(part.to_string());
        }
        for info in best.words {
            words.push(TranscriptWord {
                text: info.word,
                start_time: optional_duration(info.start_time.as_deref())?,
                end_time: optional_duration(info.end_time.as_deref())?,
                confidence: info.confidence.unwrap_or(0.0).clamp(0.0, 1.0),
            });
        }
    }

    Ok(Transcript {
        text: text_parts.join(" "),
        words,
    })
}

pub struct GoogleSpeechClient {
    client: Client,
    api_key: SecretBox<String>,
    config: GoogleSpeechConfig,
}

impl GoogleSpeechClient {
    pub fn new(api_key: &str) -> Self {
        Self::with_config(api_key, GoogleSpeechConfig::default())
    }

    pub fn with_config(api_key: &str, config: GoogleSpeechConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: SecretBox::new(Box::new(api_key.to_string())),
            config,
        }
    }
}

#[async_trait]
impl Transcriber for GoogleSpeechClient {
    async fn try_transcribe(
        &self,
        pcm16: &[u8],
        sample_rate: u32,
    ) -> Result<Transcript, TranscriptionError> {
        if pcm16.is_empty() {
            return Ok(Transcript::empty());
        }
        if pcm16.len() % 2 != 0 {
            return Err(TranscriptionError::AudioFormat(format!(
                "PCM16 payload has odd length {}",
                pcm16.len()
            )));
        }

        let request = RecognizeRequest {
            config: RecognitionConfig {
                encoding: "LINEAR16",
                sample_rate_hertz: sample_rate,
                language_code: &self.config.language_code,
                enable_word_time_offsets: true,
                enable_word_confidence: true,
            },
            audio: RecognitionAudio {
                content: BASE64.encode(pcm16),
            },
        };

        let url = format!("{}/speech:recognize", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.expose_secret().as_str())])
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TranscriptionError::ApiError {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let body: RecognizeResponse = response
            .json()
            .await
            .map_err(|e| TranscriptionError::ParseError(e.to_string()))?;
        let transcript = into_transcript(body)?;

        log::debug!(
            "STT: {:?} ({} words)",
            transcript.text,
            transcript.words.len()
        );
        Ok(transcript)
    }
}
