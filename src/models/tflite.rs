//! TensorFlow Lite backends for the embedding extractor and the two classifier heads.
//!
//! The embedder is an audio-event network that accepts a variable-length 16kHz
//! waveform and emits one 1024-wide embedding per ~0.48s patch on output 1. Patches
//! are mean-pooled into a single clip embedding. The gatekeeper and specialist are
//! small dense heads over that pooled vector.

use std::path::Path;
use std::sync::Mutex;

use tflitec::interpreter::{Interpreter, Options};
use tflitec::model::Model;
use tflitec::tensor::Shape;

use super::{Embedding, EmbeddingExtractor, Gatekeeper, ModelSet, Specialist, SPECIALIST_CLASSES};
use crate::config::ModelPaths;
use crate::error::{CoachError, Result};

/// Output index carrying per-patch embeddings.
const EMBEDDING_OUTPUT: usize = 1;

fn read_model(path: &Path, label: &str) -> Result<Model> {
    log::info!("Loading {} model from: {}", label, path.display());

    let path_str = path.to_str().ok_or_else(|| {
        CoachError::ModelLoadError(format!("{} model path is not valid UTF-8", label))
    })?;

    Model::new(path_str).map_err(|e| {
        CoachError::ModelLoadError(format!("Failed to load {} model: {}", label, e))
    })
}

fn open_interpreter(model: &'static Model, label: &str) -> Result<Interpreter<'static>> {
    let mut options = Options::default();
    options.thread_count = 1;

    Interpreter::new(model, Some(options)).map_err(|e| {
        CoachError::ModelLoadError(format!("Failed to create {} interpreter: {}", label, e))
    })
}

/// The three parsed model files, not yet bound to interpreters.
///
/// Interpreters borrow their model for their whole life, so models are leaked, but
/// only once every file has parsed. A failed load leaves nothing behind for the
/// retry on the next request.
pub struct ModelFiles {
    embedding: Model,
    gatekeeper: Model,
    specialist: Model,
}

impl ModelFiles {
    pub fn read(paths: &ModelPaths) -> Result<Self> {
        Ok(Self {
            embedding: read_model(&paths.embedding, "embedding")?,
            gatekeeper: read_model(&paths.gatekeeper, "gatekeeper")?,
            specialist: read_model(&paths.specialist, "specialist")?,
        })
    }

    pub fn into_model_set(self) -> Result<ModelSet> {
        let embedding: &'static Model = Box::leak(Box::new(self.embedding));
        let gatekeeper: &'static Model = Box::leak(Box::new(self.gatekeeper));
        let specialist: &'static Model = Box::leak(Box::new(self.specialist));

        Ok(ModelSet::new(
            TfliteEmbedder::from_model(embedding)?,
            TfliteGatekeeper::from_model(gatekeeper)?,
            TfliteSpecialist::from_model(specialist)?,
        ))
    }
}

pub struct TfliteEmbedder {
    interpreter: Mutex<Interpreter<'static>>,
}

impl TfliteEmbedder {
    pub fn from_model(model: &'static Model) -> Result<Self> {
        let interpreter = open_interpreter(model, "embedding")?;
        Ok(Self {
            interpreter: Mutex::new(interpreter),
        })
    }
}

impl EmbeddingExtractor for TfliteEmbedder {
    fn embed(&self, waveform: &[f32]) -> Result<Embedding> {
        if waveform.is_empty() {
            return Err(CoachError::InvalidInput("Empty waveform".to_string()));
        }

        let interpreter = self.interpreter.lock().map_err(|e| {
            CoachError::ProcessingError(format!("Failed to lock interpreter: {}", e))
        })?;

        // Waveform length varies per window, so the input is resized on every call
        interpreter
            .resize_input(0, Shape::new(vec![waveform.len()]))
            .map_err(|e| CoachError::TfLite(format!("Failed to resize embedding input: {}", e)))?;
        interpreter
            .allocate_tensors()
            .map_err(|e| CoachError::TfLite(format!("Failed to allocate embedding tensors: {}", e)))?;

        interpreter
            .copy(waveform, 0)
            .map_err(|e| CoachError::TfLite(format!("Failed to set embedding input: {}", e)))?;
        interpreter
            .invoke()
            .map_err(|e| CoachError::TfLite(format!("Failed to run embedding inference: {}", e)))?;

        let output = interpreter
            .output(EMBEDDING_OUTPUT)
            .map_err(|e| CoachError::TfLite(format!("Failed to read embedding output: {}", e)))?;
        let dims = output.shape().dimensions().clone();
        let width = dims.last().copied().unwrap_or(0);

        log::debug!(
            "Embedding output shape {:?} for {} samples",
            dims,
            waveform.len()
        );

        Embedding::mean_pool(output.data::<f32>(), width)
    }
}

/// Dense classifier head over a pooled embedding.
struct DenseHead {
    interpreter: Mutex<Interpreter<'static>>,
    input_size: usize,
    label: &'static str,
}

impl DenseHead {
    fn new(model: &'static Model, label: &'static str) -> Result<Self> {
        let interpreter = open_interpreter(model, label)?;
        interpreter.allocate_tensors().map_err(|e| {
            CoachError::ModelLoadError(format!("Failed to allocate {} tensors: {}", label, e))
        })?;

        let input = interpreter.input(0).map_err(|e| {
            CoachError::ModelLoadError(format!("Failed to get {} input tensor: {}", label, e))
        })?;
        let input_size = input.shape().dimensions().iter().product::<usize>();
        log::info!(
            "{} model input shape: {:?} (size: {})",
            label,
            input.shape().dimensions(),
            input_size
        );

        Ok(Self {
            interpreter: Mutex::new(interpreter),
            input_size,
            label,
        })
    }

    fn run(&self, embedding: &Embedding) -> Result<Vec<f32>> {
        if embedding.len() != self.input_size {
            return Err(CoachError::InvalidInput(format!(
                "Expected {} embedding values for {} model, got {}",
                self.input_size,
                self.label,
                embedding.len()
            )));
        }

        let interpreter = self.interpreter.lock().map_err(|e| {
            CoachError::ProcessingError(format!("Failed to lock interpreter: {}", e))
        })?;

        interpreter.copy(embedding.as_slice(), 0).map_err(|e| {
            CoachError::TfLite(format!("Failed to set {} input: {}", self.label, e))
        })?;
        interpreter.invoke().map_err(|e| {
            CoachError::TfLite(format!("Failed to run {} inference: {}", self.label, e))
        })?;

        let output = interpreter.output(0).map_err(|e| {
            CoachError::TfLite(format!("Failed to read {} output: {}", self.label, e))
        })?;
        Ok(output.data::<f32>().to_vec())
    }
}

pub struct TfliteGatekeeper {
    head: DenseHead,
}

impl TfliteGatekeeper {
    pub fn from_model(model: &'static Model) -> Result<Self> {
        Ok(Self {
            head: DenseHead::new(model, "gatekeeper")?,
        })
    }
}

impl Gatekeeper for TfliteGatekeeper {
    fn score(&self, embedding: &Embedding) -> Result<f32> {
        let output = self.head.run(embedding)?;
        output
            .first()
            .copied()
            .ok_or_else(|| CoachError::Model("Gatekeeper produced no output".to_string()))
    }
}

pub struct TfliteSpecialist {
    head: DenseHead,
}

impl TfliteSpecialist {
    pub fn from_model(model: &'static Model) -> Result<Self> {
        Ok(Self {
            head: DenseHead::new(model, "specialist")?,
        })
    }
}

impl Specialist for TfliteSpecialist {
    fn probabilities(&self, embedding: &Embedding) -> Result<[f32; SPECIALIST_CLASSES]> {
        let output = self.head.run(embedding)?;
        if output.len() < SPECIALIST_CLASSES {
            return Err(CoachError::Model(format!(
                "Specialist produced {} values, expected {}",
                output.len(),
                SPECIALIST_CLASSES
            )));
        }

        let mut probs = [0.0f32; SPECIALIST_CLASSES];
        probs.copy_from_slice(&output[..SPECIALIST_CLASSES]);
        Ok(probs)
    }
}

/// Build all three TFLite models from the configured paths.
pub fn load_tflite_models(paths: &ModelPaths) -> Result<ModelSet> {
    ModelFiles::read(paths)?.into_model_set()
}
