//! # Analysis Pipeline
//!
//! One invocation per uploaded recording:
//!
//! ```text
//!               ┌─ blocking worker ─────────────────────────────────┐
//! AudioClip ──► │ WindowScanner ─► ClassifierCascade (gate → type)  │ ─┐
//!     │         │ heuristics for the exercise (sustain/breath/voice) │  │
//!     │         └───────────────────────────────────────────────────┘  ├─► decision ─► feedback
//!     └─ PCM16 ─► Transcriber (async, concurrent) ─────────────────────┘
//! ```
//!
//! ## Failure model
//!
//! Nothing in here returns an error. A recording that cannot be decoded, models
//! that fail to load, an STT outage or a heuristic that cannot extract its feature
//! all degrade to neutral values (gate score 0, Fluent, negative heuristic defaults,
//! empty transcript) and the request still gets a verdict.
//!
//! ## Concurrency
//!
//! Classification and heuristics are CPU-bound and run on `spawn_blocking` while the
//! transcriber request is in flight. Models come from the shared [`ModelService`],
//! which loads them once on first use.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::audio::{AudioClip, AudioNormalizer};
use crate::config::AnalysisConfig;
use crate::detection::{
    ClassificationResult, ClassifierCascade, ScanResult, StutterType, WindowScanner,
};
use crate::exercise::{
    resolve_phoneme_match, select_feedback, ExerciseDecisionEngine, ExerciseDetails,
    ExerciseKind, ExerciseReport, ExerciseVerdict, Judgement,
};
use crate::heuristics::{
    BreathAnalyzer, BreathResult, HeuristicAnalyzer, SustainResult, SustainedAmplitudeAnalyzer,
    VoicingAnalyzer, VoicingResult,
};
use crate::models::ModelService;
use crate::transcript::{GraphemeToPhoneme, Transcriber, Transcript, TranscriptAligner};

/// Response of the generic (non-exercise) analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StutterReport {
    pub is_stutter: bool,
    pub stutter_score: f32,
    #[serde(rename = "type")]
    pub stutter_type: StutterType,
    pub type_confidence: f32,
    pub transcript: String,
    /// Only reported when the gatekeeper fired
    pub problem_phoneme: Option<String>,
    pub hotspot_time: Option<f64>,
    pub evidence_conflict: bool,
}

#[derive(Debug, Clone, Copy)]
enum AnalysisKind {
    Exercise(ExerciseKind),
    Generic,
}

impl AnalysisKind {
    fn needs_transcript(self) -> bool {
        match self {
            AnalysisKind::Exercise(kind) => kind.needs_transcript(),
            AnalysisKind::Generic => true,
        }
    }
}

/// Everything computed on the blocking worker.
#[derive(Debug, Clone, Default)]
struct AcousticEvidence {
    scan: Option<ScanResult>,
    sustain: SustainResult,
    breath: BreathResult,
    voicing: VoicingResult,
}

impl AcousticEvidence {
    fn classification(&self) -> ClassificationResult {
        self.scan
            .as_ref()
            .map(|s| s.classification.clone())
            .unwrap_or_default()
    }

    /// `None` when no scan ran, which puts the aligner in legacy mode.
    fn hotspot(&self) -> Option<f64> {
        self.scan.as_ref().map(|s| s.hotspot_time)
    }
}

fn acoustic_block(
    models: &ModelService,
    config: &AnalysisConfig,
    clip: &AudioClip,
    analysis: AnalysisKind,
) -> AcousticEvidence {
    let scan = match models.get() {
        Ok(set) => {
            let cascade = ClassifierCascade::new(
                set,
                AudioNormalizer::new(config.normalizer.clone()),
                config.cascade.clone(),
            );
            Some(WindowScanner::new(config.scan.clone()).scan(clip, &cascade))
        }
        Err(e) => {
            log::warn!("Models unavailable, classification skipped: {}", e);
            None
        }
    };

    let mut evidence = AcousticEvidence {
        scan,
        ..AcousticEvidence::default()
    };

    match analysis {
        AnalysisKind::Exercise(ExerciseKind::Snake) => {
            evidence.sustain =
                SustainedAmplitudeAnalyzer::new(config.sustain.clone()).analyze_or_default(clip);
            evidence.voicing = VoicingAnalyzer::new(config.voicing.clone()).analyze_or_default(clip);
        }
        AnalysisKind::Exercise(ExerciseKind::Balloon) => {
            evidence.breath = BreathAnalyzer::new(config.breath.clone()).analyze_or_default(clip);
        }
        _ => {}
    }

    evidence
}

fn pick_feedback(kind: ExerciseKind, is_hit: bool) -> &'static str {
    let mut rng = rand::thread_rng();
    select_feedback(kind, is_hit, &mut rng)
}

pub struct AnalysisPipeline {
    models: Arc<ModelService>,
    transcriber: Arc<dyn Transcriber>,
    aligner: TranscriptAligner,
    normalizer: AudioNormalizer,
    decisions: ExerciseDecisionEngine,
    config: Arc<AnalysisConfig>,
}

impl AnalysisPipeline {
    pub fn new(
        models: Arc<ModelService>,
        transcriber: Arc<dyn Transcriber>,
        g2p: Arc<dyn GraphemeToPhoneme>,
        config: AnalysisConfig,
    ) -> Self {
        Self {
            models,
            transcriber,
            aligner: TranscriptAligner::new(g2p, config.aligner.clone()),
            normalizer: AudioNormalizer::new(config.normalizer.clone()),
            decisions: ExerciseDecisionEngine::new(config.decision.clone()),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn models(&self) -> &ModelService {
        &self.models
    }

    /// Decode a recording on a blocking worker. `None` means no usable signal.
    pub async fn load_clip(&self, path: PathBuf) -> Option<AudioClip> {
        let normalizer = self.normalizer.clone();
        match tokio::task::spawn_blocking(move || normalizer.load(&path)).await {
            Ok(clip) => clip,
            Err(e) => {
                log::error!("Decode task failed: {}", e);
                None
            }
        }
    }

    /// Run classification/heuristics and transcription concurrently.
    async fn gather(
        &self,
        clip: Option<AudioClip>,
        analysis: AnalysisKind,
    ) -> (AcousticEvidence, Transcript) {
        let Some(clip) = clip else {
            log::warn!("No signal, returning neutral analysis");
            return (AcousticEvidence::default(), Transcript::empty());
        };

        let models = self.models.clone();
        let config = self.config.clone();
        let worker_clip = clip.clone();
        let acoustic = tokio::task::spawn_blocking(move || {
            acoustic_block(&models, &config, &worker_clip, analysis)
        });

        let transcription = async {
            if analysis.needs_transcript() {
                let pcm = clip.to_pcm16_le();
                self.transcriber.transcribe(&pcm, clip.sample_rate()).await
            } else {
                Transcript::empty()
            }
        };

        let (acoustic, transcript) = tokio::join!(acoustic, transcription);
        let acoustic = acoustic.unwrap_or_else(|e| {
            log::error!("Acoustic analysis task failed: {}", e);
            AcousticEvidence::default()
        });

        (acoustic, transcript)
    }

    /// Judge one exercise attempt.
    ///
    /// `target_phoneme` is the sound a Snake attempt should stretch (simplified or
    /// ARPAbet); other exercises ignore it.
    pub async fn analyze_exercise(
        &self,
        kind: ExerciseKind,
        clip: Option<AudioClip>,
        target_phoneme: Option<&str>,
    ) -> ExerciseReport {
        let (evidence, transcript) = self.gather(clip, AnalysisKind::Exercise(kind)).await;
        let classification = evidence.classification();

        let (judgement, details): (Judgement, ExerciseDetails) = match kind {
            ExerciseKind::Turtle => {
                let (j, d) = self.decisions.judge_turtle(&classification, &transcript);
                log::info!(
                    "{} wpm={:.1}, block={}, hit={}",
                    kind.tag(),
                    d.wpm,
                    d.block_detected,
                    j.is_hit
                );
                (j, ExerciseDetails::Turtle(d))
            }
            ExerciseKind::Snake => {
                let raw = self.aligner.phoneme_match(&transcript, target_phoneme);
                let phoneme_match = resolve_phoneme_match(
                    raw,
                    target_phoneme,
                    &evidence.voicing,
                    &classification,
                    &transcript,
                );
                let (j, d) = self.decisions.judge_snake(
                    &classification,
                    &evidence.sustain,
                    &evidence.voicing,
                    phoneme_match,
                );
                log::info!(
                    "{} duration={}s, repetition={}, voiced={}, match={}, hit={}",
                    kind.tag(),
                    d.duration_sec,
                    d.repetition_detected,
                    d.voiced_detected,
                    d.phoneme_match,
                    j.is_hit
                );
                (j, ExerciseDetails::Snake(d))
            }
            ExerciseKind::Balloon => {
                let (j, d) = self.decisions.judge_balloon(&classification, &evidence.breath);
                log::info!(
                    "{} breath={}, hard_attack={}, hit={}",
                    kind.tag(),
                    d.breath_detected,
                    d.hard_attack_detected,
                    j.is_hit
                );
                (j, ExerciseDetails::Balloon(d))
            }
            ExerciseKind::OneTap => {
                let (j, d) = self.decisions.judge_onetap(&classification);
                log::info!(
                    "{} stutter={}, repetition={}, hit={}",
                    kind.tag(),
                    d.stutter_detected,
                    d.repetition_detected,
                    j.is_hit
                );
                (j, ExerciseDetails::OneTap(d))
            }
        };

        ExerciseReport {
            exercise: kind,
            details,
            verdict: ExerciseVerdict::from_judgement(judgement, pick_feedback(kind, judgement.is_hit)),
            hotspot_time: evidence.hotspot(),
        }
    }

    /// Classify a recording and attribute a problem phoneme.
    pub async fn analyze_generic(&self, clip: Option<AudioClip>) -> StutterReport {
        let (evidence, transcript) = self.gather(clip, AnalysisKind::Generic).await;
        let classification = evidence.classification();
        let hotspot_time = evidence.hotspot();

        let attribution =
            self.aligner
                .attribute(&transcript, hotspot_time, classification.gate_score);

        log::info!(
            "[ANALYZE] score={:.4}, type={}, culprit={:?}, phoneme={:?}",
            classification.gate_score,
            classification.stutter_type,
            attribution.culprit_word,
            attribution.phoneme
        );

        StutterReport {
            is_stutter: classification.is_stutter,
            stutter_score: classification.gate_score,
            stutter_type: classification.stutter_type,
            type_confidence: classification.type_confidence,
            transcript: transcript.text,
            problem_phoneme: attribution.phoneme.filter(|_| classification.is_stutter),
            hotspot_time,
            evidence_conflict: attribution.evidence_conflict,
        }
    }

    pub async fn analyze_exercise_file(
        &self,
        kind: ExerciseKind,
        path: PathBuf,
        target_phoneme: Option<&str>,
    ) -> ExerciseReport {
        let clip = self.load_clip(path).await;
        self.analyze_exercise(kind, clip, target_phoneme).await
    }

    pub async fn analyze_generic_file(&self, path: PathBuf) -> StutterReport {
        let clip = self.load_clip(path).await;
        self.analyze_generic(clip).await
    }
}
