//! Model capabilities and their shared, lazily built owner.
//!
//! The cascade only ever sees three narrow traits: a waveform goes in through an
//! [`EmbeddingExtractor`], and the resulting [`Embedding`] is scored by a
//! [`Gatekeeper`] and (when the gate fires) a [`Specialist`]. Concrete backends live
//! behind the `tflite` feature; tests plug in closures and mocks.

#[cfg(feature = "tflite")]
pub mod tflite;

#[cfg(feature = "tflite")]
pub use tflite::{load_tflite_models, ModelFiles, TfliteEmbedder, TfliteGatekeeper, TfliteSpecialist};

use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::error::{CoachError, Result};

/// Number of classes the specialist scores: Fluent, Block, Prolongation, Repetition.
pub const SPECIALIST_CLASSES: usize = 4;

/// Fixed-size clip embedding, opaque outside the cascade.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Average equally sized frame vectors into one embedding.
    pub fn mean_pool(frames: &[f32], width: usize) -> Result<Self> {
        if width == 0 || frames.is_empty() || frames.len() % width != 0 {
            return Err(CoachError::InvalidInput(format!(
                "Cannot pool {} values into frames of width {}",
                frames.len(),
                width
            )));
        }

        let count = frames.len() / width;
        let mut pooled = vec![0.0f32; width];
        for frame in frames.chunks_exact(width) {
            for (acc, &v) in pooled.iter_mut().zip(frame) {
                *acc += v;
            }
        }
        for v in pooled.iter_mut() {
            *v /= count as f32;
        }

        Ok(Self(pooled))
    }
}

/// Normalized waveform → embedding.
pub trait EmbeddingExtractor: Send + Sync {
    fn embed(&self, waveform: &[f32]) -> Result<Embedding>;
}

/// Embedding → probability that the clip is disfluent.
pub trait Gatekeeper: Send + Sync {
    fn score(&self, embedding: &Embedding) -> Result<f32>;
}

/// Embedding → probabilities over [Fluent, Block, Prolongation, Repetition].
pub trait Specialist: Send + Sync {
    fn probabilities(&self, embedding: &Embedding) -> Result<[f32; SPECIALIST_CLASSES]>;
}

impl<F> EmbeddingExtractor for F
where
    F: Fn(&[f32]) -> Result<Embedding> + Send + Sync,
{
    fn embed(&self, waveform: &[f32]) -> Result<Embedding> {
        self(waveform)
    }
}

impl<F> Gatekeeper for F
where
    F: Fn(&Embedding) -> Result<f32> + Send + Sync,
{
    fn score(&self, embedding: &Embedding) -> Result<f32> {
        self(embedding)
    }
}

impl<F> Specialist for F
where
    F: Fn(&Embedding) -> Result<[f32; SPECIALIST_CLASSES]> + Send + Sync,
{
    fn probabilities(&self, embedding: &Embedding) -> Result<[f32; SPECIALIST_CLASSES]> {
        self(embedding)
    }
}

/// The three models the cascade needs, loaded together.
pub struct ModelSet {
    pub embedder: Box<dyn EmbeddingExtractor>,
    pub gatekeeper: Box<dyn Gatekeeper>,
    pub specialist: Box<dyn Specialist>,
}

impl ModelSet {
    pub fn new(
        embedder: impl EmbeddingExtractor + 'static,
        gatekeeper: impl Gatekeeper + 'static,
        specialist: impl Specialist + 'static,
    ) -> Self {
        Self {
            embedder: Box::new(embedder),
            gatekeeper: Box::new(gatekeeper),
            specialist: Box::new(specialist),
        }
    }
}

type ModelLoader = Box<dyn Fn() -> Result<ModelSet> + Send + Sync>;

/// Owner of the process-wide model set.
///
/// Models are built on first use. Concurrent first requests block on the same
/// initialization instead of loading twice; a failed load leaves the cell empty so
/// the next request tries again.
pub struct ModelService {
    models: OnceCell<Arc<ModelSet>>,
    loader: ModelLoader,
}

impl ModelService {
    pub fn new<F>(loader: F) -> Self
    where
        F: Fn() -> Result<ModelSet> + Send + Sync + 'static,
    {
        Self {
            models: OnceCell::new(),
            loader: Box::new(loader),
        }
    }

    /// Service whose models are already built.
    pub fn preloaded(models: ModelSet) -> Self {
        let cell = OnceCell::new();
        let _ = cell.set(Arc::new(models));
        Self {
            models: cell,
            loader: Box::new(|| {
                Err(CoachError::ModelLoadError(
                    "preloaded model service has no loader".to_string(),
                ))
            }),
        }
    }

    /// Get the models, building them on first call. Blocks while another thread loads.
    pub fn get(&self) -> Result<Arc<ModelSet>> {
        self.models
            .get_or_try_init(|| {
                log::info!("🧠 Loading models...");
                let set = (self.loader)()?;
                log::info!("✅ Models loaded");
                Ok(Arc::new(set))
            })
            .cloned()
    }

    pub fn is_loaded(&self) -> bool {
        self.models.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn constant_set(gate: f32) -> ModelSet {
        ModelSet::new(
            |_: &[f32]| -> Result<Embedding> { Ok(Embedding::new(vec![0.0; 8])) },
            move |_: &Embedding| -> Result<f32> { Ok(gate) },
            |_: &Embedding| -> Result<[f32; SPECIALIST_CLASSES]> { Ok([0.1, 0.2, 0.3, 0.4]) },
        )
    }

    #[test]
    fn test_mean_pool() {
        let pooled = Embedding::mean_pool(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 3).unwrap();
        assert_eq!(pooled.as_slice(), &[2.5, 3.5, 4.5]);
    }

    #[test]
    fn test_mean_pool_rejects_ragged_input() {
        assert!(Embedding::mean_pool(&[1.0, 2.0, 3.0], 2).is_err());
        assert!(Embedding::mean_pool(&[], 2).is_err());
        assert!(Embedding::mean_pool(&[1.0], 0).is_err());
    }

    #[test]
    fn test_lazy_load_happens_once() {
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = loads.clone();
        let service = ModelService::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(constant_set(0.3))
        });

        assert!(!service.is_loaded());
        service.get().unwrap();
        service.get().unwrap();
        assert!(service.is_loaded());
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_first_use_is_single_flight() {
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = loads.clone();
        let service = Arc::new(ModelService::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            thread::sleep(std::time::Duration::from_millis(50));
            Ok(constant_set(0.3))
        }));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = service.clone();
                thread::spawn(move || service.get().is_ok())
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_load_is_not_cached() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let service = ModelService::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(CoachError::ModelLoadError("missing file".to_string()))
        });

        assert!(service.get().is_err());
        assert!(service.get().is_err());
        assert!(!service.is_loaded());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_preloaded_service() {
        let service = ModelService::preloaded(constant_set(0.9));
        assert!(service.is_loaded());

        let models = service.get().unwrap();
        let embedding = models.embedder.embed(&[0.0; 16]).unwrap();
        assert_eq!(models.gatekeeper.score(&embedding).unwrap(), 0.9);
    }
}
