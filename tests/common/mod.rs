//! Mock capabilities shared by the integration tests.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use fluency_coach::config::AnalysisConfig;
use fluency_coach::models::{
    Embedding, EmbeddingExtractor, Gatekeeper, ModelService, ModelSet, Specialist,
    SPECIALIST_CLASSES,
};
use fluency_coach::pipeline::AnalysisPipeline;
use fluency_coach::transcript::{
    CmuDictionary, Transcriber, Transcript, TranscriptWord, TranscriptionError,
};
use fluency_coach::{CoachError, Result};

pub const SAMPLE_RATE: u32 = 16000;

pub const DICTIONARY: &str = "THE  DH AH0
SUN  S AH1 N
IS  IH1 Z
SLOW  S L OW1
TURTLE  T ER1 T AH0 L
ZOO  Z UW1
SAW  S AO1
";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn tone(seconds: f64) -> Vec<f32> {
    let n = (seconds * SAMPLE_RATE as f64).round() as usize;
    (0..n)
        .map(|i| (2.0 * std::f32::consts::PI * 180.0 * i as f32 / SAMPLE_RATE as f32).sin() * 0.5)
        .collect()
}

pub fn silence(seconds: f64) -> Vec<f32> {
    vec![0.0; (seconds * SAMPLE_RATE as f64).round() as usize]
}

pub fn wav_bytes(samples: &[f32]) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for &s in samples {
            writer
                .write_sample((s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                .unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

pub fn word(text: &str, start: f64, end: f64, confidence: f32) -> TranscriptWord {
    TranscriptWord::new(text, start, end, confidence)
}

/// Call counters for every mocked capability.
#[derive(Clone, Default)]
pub struct Counters {
    pub embeds: Arc<AtomicUsize>,
    pub gates: Arc<AtomicUsize>,
    pub specialists: Arc<AtomicUsize>,
    pub transcriptions: Arc<AtomicUsize>,
}

impl Counters {
    pub fn embeds(&self) -> usize {
        self.embeds.load(Ordering::SeqCst)
    }
    pub fn gates(&self) -> usize {
        self.gates.load(Ordering::SeqCst)
    }
    pub fn specialists(&self) -> usize {
        self.specialists.load(Ordering::SeqCst)
    }
    pub fn transcriptions(&self) -> usize {
        self.transcriptions.load(Ordering::SeqCst)
    }
}

/// Embeds a window as `[peak, length]` of the model input.
pub struct CountingEmbedder {
    calls: Arc<AtomicUsize>,
}

impl EmbeddingExtractor for CountingEmbedder {
    fn embed(&self, waveform: &[f32]) -> Result<Embedding> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let peak = waveform.iter().fold(0.0f32, |acc, &s| acc.max(s.abs()));
        Ok(Embedding::new(vec![peak, waveform.len() as f32]))
    }
}

/// Constant score for any signal, a low score for silence.
pub struct ScriptedGatekeeper {
    score: f32,
    calls: Arc<AtomicUsize>,
}

impl Gatekeeper for ScriptedGatekeeper {
    fn score(&self, embedding: &Embedding) -> Result<f32> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if embedding.as_slice()[0] == 0.0 {
            Ok(0.05)
        } else {
            Ok(self.score)
        }
    }
}

pub struct ScriptedSpecialist {
    probabilities: [f32; SPECIALIST_CLASSES],
    calls: Arc<AtomicUsize>,
}

impl Specialist for ScriptedSpecialist {
    fn probabilities(&self, _embedding: &Embedding) -> Result<[f32; SPECIALIST_CLASSES]> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.probabilities)
    }
}

pub struct ScriptedTranscriber {
    transcript: Transcript,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn try_transcribe(
        &self,
        pcm16: &[u8],
        sample_rate: u32,
    ) -> std::result::Result<Transcript, TranscriptionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(sample_rate, SAMPLE_RATE);
        assert_eq!(pcm16.len() % 2, 0);
        Ok(self.transcript.clone())
    }
}

pub struct Scenario {
    pub gate: f32,
    pub probabilities: [f32; SPECIALIST_CLASSES],
    pub words: Vec<TranscriptWord>,
    pub models_fail: bool,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            gate: 0.1,
            probabilities: [0.7, 0.1, 0.1, 0.1],
            words: Vec::new(),
            models_fail: false,
        }
    }
}

impl Scenario {
    pub fn build(self) -> (AnalysisPipeline, Counters) {
        let counters = Counters::default();

        let models = if self.models_fail {
            ModelService::new(|| Err(CoachError::ModelLoadError("no model files".to_string())))
        } else {
            ModelService::preloaded(ModelSet::new(
                CountingEmbedder {
                    calls: counters.embeds.clone(),
                },
                ScriptedGatekeeper {
                    score: self.gate,
                    calls: counters.gates.clone(),
                },
                ScriptedSpecialist {
                    probabilities: self.probabilities,
                    calls: counters.specialists.clone(),
                },
            ))
        };

        let transcriber = Arc::new(ScriptedTranscriber {
            transcript: Transcript::from_words(self.words),
            calls: counters.transcriptions.clone(),
        });

        let pipeline = AnalysisPipeline::new(
            Arc::new(models),
            transcriber,
            Arc::new(CmuDictionary::parse(DICTIONARY)),
            AnalysisConfig::default(),
        );

        (pipeline, counters)
    }
}
