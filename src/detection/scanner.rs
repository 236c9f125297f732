//! Sliding-window hotspot scan.
//!
//! Long recordings dilute a short stutter event, so clips of at least one window are
//! cut into overlapping windows and each window is classified on its own. The window
//! with the highest gate score stands for the whole clip and its centre becomes the
//! hotspot used for culprit-word attribution.
//!
//! ```text
//! |----3.0s----|
//!     |----3.0s----|
//!         |----3.0s----|        step 0.5s, tail shorter than a window is skipped
//! ```

use serde::Serialize;

use super::cascade::{ClassificationResult, ClassifierCascade};
use crate::audio::AudioClip;

/// Anything that can classify a run of 16kHz samples.
pub trait WindowClassifier {
    fn classify(&self, samples: &[f32]) -> ClassificationResult;
}

impl WindowClassifier for ClassifierCascade {
    fn classify(&self, samples: &[f32]) -> ClassificationResult {
        ClassifierCascade::classify(self, samples)
    }
}

impl<F> WindowClassifier for F
where
    F: Fn(&[f32]) -> ClassificationResult,
{
    fn classify(&self, samples: &[f32]) -> ClassificationResult {
        self(samples)
    }
}

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub window_sec: f64, // 3.0s
    pub step_sec: f64,   // 0.5s
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            window_sec: 3.0,
            step_sec: 0.5,
        }
    }
}

/// Time range of one classified window, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Window {
    pub start_time: f64,
    pub end_time: f64,
}

impl Window {
    pub fn center(&self) -> f64 {
        (self.start_time + self.end_time) / 2.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanResult {
    /// Classification of the winning window (or the whole clip)
    pub classification: ClassificationResult,
    pub hotspot_time: f64,
    pub window: Window,
    pub windows_scanned: usize,
}

#[derive(Debug, Clone, Default)]
pub struct WindowScanner {
    config: ScanConfig,
}

impl WindowScanner {
    pub fn new(config: ScanConfig) -> Self {
        Self { config }
    }

    fn window_len(&self, sample_rate: u32) -> usize {
        ((self.config.window_sec * sample_rate as f64).round() as usize).max(1)
    }

    fn step_len(&self, sample_rate: u32) -> usize {
        ((self.config.step_sec * sample_rate as f64).round() as usize).max(1)
    }

    /// Number of classifier calls a clip of `len` samples needs.
    pub fn window_count(&self, len: usize, sample_rate: u32) -> usize {
        let window = self.window_len(sample_rate);
        if len < window {
            1
        } else {
            (len - window) / self.step_len(sample_rate) + 1
        }
    }

    pub fn scan<C: WindowClassifier + ?Sized>(&self, clip: &AudioClip, classifier: &C) -> ScanResult {
        let samples = clip.samples();
        let rate = clip.sample_rate();
        let window_len = self.window_len(rate);

        if samples.len() < window_len {
            let whole = Window {
                start_time: 0.0,
                end_time: clip.duration_secs(),
            };
            return ScanResult {
                classification: classifier.classify(samples),
                hotspot_time: whole.center(),
                window: whole,
                windows_scanned: 1,
            };
        }

        let step = self.step_len(rate);
        let count = self.window_count(samples.len(), rate);
        let mut best: Option<(usize, ClassificationResult)> = None;

        for i in 0..count {
            let start = i * step;
            let result = classifier.classify(&samples[start..start + window_len]);
            match &best {
                // Strictly greater: the earliest window wins ties
                Some((_, top)) if result.gate_score <= top.gate_score => {}
                _ => best = Some((start, result)),
            }
        }

        let (start, classification) = best.unwrap_or((0, ClassificationResult::neutral()));
        let start_time = start as f64 / rate as f64;
        let window = Window {
            start_time,
            end_time: start_time + window_len as f64 / rate as f64,
        };

        log::debug!(
            "Scanned {} windows, best gate {:.4} at {:.2}s",
            count,
            classification.gate_score,
            start_time
        );

        ScanResult {
            classification,
            hotspot_time: start_time + self.config.window_sec / 2.0,
            window,
            windows_scanned: count,
        }
    }
}
