//! Audio normalization
//!
//! Turns an uploaded recording into the two shapes the rest of the pipeline needs:
//!
//! - an [`AudioClip`]: mono, 16kHz, original amplitude (the heuristic analyzers use
//!   absolute amplitude floors, so the level must be preserved)
//! - a model input buffer: the same samples peak-normalized and zero-padded to the
//!   minimum length the embedding extractor accepts
//!
//! Decoding handles WAV only. Anything hound cannot read is reported as
//! "no signal" by [`AudioNormalizer::load`], never as a request failure.

use std::io::Cursor;
use std::path::Path;

use dasp_sample::Sample;
use rubato::{FastFixedIn, PolynomialDegree, Resampler};

use super::{AudioBuffer, AudioClip, SAMPLE_RATE};
use crate::error::ExtractionError;

/// Configuration for audio normalization
#[derive(Debug, Clone)]
pub struct NormalizerConfig {
    /// Output sample rate (16000 Hz, required by all models)
    pub target_rate: u32,
    /// Shortest buffer the embedding extractor accepts: 0.975s at 16kHz
    pub min_model_samples: usize,
    /// Peak level the model input is scaled to
    pub target_peak: f32,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            target_rate: SAMPLE_RATE,
            min_model_samples: 15600,
            target_peak: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AudioNormalizer {
    config: NormalizerConfig,
}

impl AudioNormalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Load a recording from disk, returning `None` when no usable signal could be
    /// decoded. Callers treat `None` as "no classification possible".
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Option<AudioClip> {
        let path = path.as_ref();
        match self.decode_file(path) {
            Ok(clip) => Some(clip),
            Err(e) => {
                log::warn!("No signal from {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn decode_file<P: AsRef<Path>>(&self, path: P) -> Result<AudioClip, ExtractionError> {
        let reader = hound::WavReader::open(path)?;
        self.decode_reader(reader)
    }

    pub fn decode_bytes(&self, bytes: &[u8]) -> Result<AudioClip, ExtractionError> {
        let reader = hound::WavReader::new(Cursor::new(bytes))?;
        self.decode_reader(reader)
    }

    fn decode_reader<R: std::io::Read>(
        &self,
        mut reader: hound::WavReader<R>,
    ) -> Result<AudioClip, ExtractionError> {
        let spec = reader.spec();
        log::debug!("Decoding WAV: {:?}", spec);

        let interleaved: AudioBuffer = match (spec.sample_format, spec.bits_per_sample) {
            (hound::SampleFormat::Float, _) => reader
                .samples::<f32>()
                .collect::<std::result::Result<Vec<_>, _>>()?,
            (hound::SampleFormat::Int, 16) => reader
                .samples::<i16>()
                .map(|s| s.map(|sample| sample.to_sample::<f32>()))
                .collect::<std::result::Result<Vec<_>, _>>()?,
            (hound::SampleFormat::Int, bits) => {
                let scale = (1i64 << (bits.saturating_sub(1))) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|sample| sample as f32 / scale))
                    .collect::<std::result::Result<Vec<_>, _>>()?
            }
        };

        self.from_interleaved(&interleaved, spec.sample_rate, spec.channels)
    }

    /// Down-mix and resample raw interleaved samples into a clip.
    pub fn from_interleaved(
        &self,
        interleaved: &[f32],
        sample_rate: u32,
        channels: u16,
    ) -> Result<AudioClip, ExtractionError> {
        if channels == 0 || sample_rate == 0 {
            return Err(ExtractionError::Decode(format!(
                "Invalid stream layout: {} channels at {}Hz",
                channels, sample_rate
            )));
        }
        if let Some(idx) = interleaved.iter().position(|s| !s.is_finite()) {
            return Err(ExtractionError::NonFinite(idx));
        }

        let mono = downmix(interleaved, channels as usize);
        if mono.is_empty() {
            return Err(ExtractionError::EmptySignal);
        }

        let samples = if sample_rate == self.config.target_rate {
            mono
        } else {
            resample(&mono, sample_rate, self.config.target_rate)?
        };

        Ok(AudioClip::new(samples))
    }

    /// Prepare samples for the embedding extractor: peak-normalize, then zero-pad to
    /// the minimum model length. Silent input stays silent and is padded, not rejected.
    pub fn model_input(&self, samples: &[f32]) -> AudioBuffer {
        let peak = samples.iter().fold(0.0f32, |acc, &s| acc.max(s.abs()));

        let mut output: AudioBuffer = if peak > f32::EPSILON {
            let gain = self.config.target_peak / peak;
            samples.iter().map(|&s| s * gain).collect()
        } else {
            samples.to_vec()
        };

        if output.len() < self.config.min_model_samples {
            output.resize(self.config.min_model_samples, 0.0);
        }

        output
    }
}

/// Average interleaved channels into a single mono channel.
fn downmix(interleaved: &[f32], channels: usize) -> AudioBuffer {
    if channels == 1 {
        return interleaved.to_vec();
    }

    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

fn resample(mono: &[f32], input_rate: u32, output_rate: u32) -> Result<AudioBuffer, ExtractionError> {
    log::debug!(
        "Resampling {} samples from {}Hz to {}Hz",
        mono.len(),
        input_rate,
        output_rate
    );

    let mut resampler = FastFixedIn::<f32>::new(
        output_rate as f64 / input_rate as f64,
        1.0,
        PolynomialDegree::Septic,
        mono.len(),
        1,
    )
    .map_err(|e| ExtractionError::Resample(format!("Failed to create resampler: {}", e)))?;

    let mut output = resampler
        .process(&[mono], None)
        .map_err(|e| ExtractionError::Resample(e.to_string()))?;

    output
        .pop()
        .ok_or_else(|| ExtractionError::Resample("Resampler produced no channels".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(samples: &[i16], sample_rate: u32, channels: u16) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for &s in samples {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_config_defaults() {
        let config = NormalizerConfig::default();
        assert_eq!(config.target_rate, 16000);
        assert_eq!(config.min_model_samples, 15600);
        assert_eq!(config.target_peak, 1.0);
    }

    #[test]
    fn test_decode_mono_16k() {
        let normalizer = AudioNormalizer::default();
        let bytes = wav_bytes(&[0, 16384, -16384, 0], 16000, 1);

        let clip = normalizer.decode_bytes(&bytes).unwrap();
        assert_eq!(clip.len(), 4);
        assert!((clip.samples()[1] - 0.5).abs() < 1e-3);
        assert!((clip.samples()[2] + 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_decode_stereo_is_downmixed() {
        let normalizer = AudioNormalizer::default();
        // L = 0.5, R = 0.0 for every frame
        let frames: Vec<i16> = (0..8).flat_map(|_| [16384i16, 0i16]).collect();
        let bytes = wav_bytes(&frames, 16000, 2);

        let clip = normalizer.decode_bytes(&bytes).unwrap();
        assert_eq!(clip.len(), 8);
        assert!(clip.samples().iter().all(|&s| (s - 0.25).abs() < 1e-3));
    }

    #[test]
    fn test_resample_48k_to_16k() {
        let normalizer = AudioNormalizer::default();
        let input: Vec<f32> = (0..48000)
            .map(|i| (2.0 * std::f32::consts::PI * 220.0 * i as f32 / 48000.0).sin() * 0.5)
            .collect();

        let clip = normalizer.from_interleaved(&input, 48000, 1).unwrap();
        let expected = 16000i64;
        assert!(
            (clip.len() as i64 - expected).abs() < 200,
            "expected ~{} samples, got {}",
            expected,
            clip.len()
        );
    }

    #[test]
    fn test_garbage_bytes_are_no_signal() {
        let normalizer = AudioNormalizer::default();
        assert!(normalizer.decode_bytes(b"definitely not a wav file").is_err());
    }

    #[test]
    fn test_missing_file_is_no_signal() {
        let normalizer = AudioNormalizer::default();
        assert!(normalizer.load("does/not/exist.wav").is_none());
    }

    #[test]
    fn test_non_finite_samples_rejected() {
        let normalizer = AudioNormalizer::default();
        let result = normalizer.from_interleaved(&[0.0, f32::NAN], 16000, 1);
        assert_eq!(result.unwrap_err(), ExtractionError::NonFinite(1));
    }

    #[test]
    fn test_model_input_normalizes_and_pads() {
        let normalizer = AudioNormalizer::default();
        let input = vec![0.1, -0.25, 0.05];

        let output = normalizer.model_input(&input);
        assert_eq!(output.len(), 15600);
        assert!((output[1] + 1.0).abs() < 1e-6, "peak scaled to 1.0");
        assert!((output[0] - 0.4).abs() < 1e-6);
        assert!(output[3..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_model_input_silence_is_padded_not_scaled() {
        let normalizer = AudioNormalizer::default();
        let output = normalizer.model_input(&[0.0; 100]);
        assert_eq!(output.len(), 15600);
        assert!(output.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_model_input_keeps_long_buffers() {
        let normalizer = AudioNormalizer::default();
        let output = normalizer.model_input(&vec![0.5; 48000]);
        assert_eq!(output.len(), 48000);
    }
}
