pub mod features;
pub mod normalizer;

pub use normalizer::{AudioNormalizer, NormalizerConfig};

use std::sync::Arc;

/// Sample rate every downstream component expects.
pub const SAMPLE_RATE: u32 = 16000;

// Re-export common audio types
pub type AudioSample = f32;
pub type AudioBuffer = Vec<AudioSample>;

/// A decoded, mono, 16kHz recording.
///
/// The sample buffer is shared, so cloning a clip (e.g. to hand it to a blocking
/// worker) does not copy audio.
#[derive(Debug, Clone)]
pub struct AudioClip {
    samples: Arc<[AudioSample]>,
    sample_rate: u32,
}

impl AudioClip {
    /// Wrap samples that are already mono at [`SAMPLE_RATE`].
    pub fn new(samples: AudioBuffer) -> Self {
        Self {
            samples: samples.into(),
            sample_rate: SAMPLE_RATE,
        }
    }

    pub fn samples(&self) -> &[AudioSample] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Convert to PCM 16-bit little-endian, the format the transcriber expects.
    pub fn to_pcm16_le(&self) -> Vec<u8> {
        let mut pcm_data = Vec::with_capacity(self.samples.len() * 2);

        for &sample in self.samples.iter() {
            let sample_i16 = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            pcm_data.extend_from_slice(&sample_i16.to_le_bytes());
        }

        pcm_data
    }
}
