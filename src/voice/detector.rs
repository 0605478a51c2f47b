//! Voice activity detection
//!
//! Amplitude-based end-of-speech detection for one capture attempt. Capture
//! ends when RMS energy stays below the threshold for a continuous trailing
//! window, or unconditionally once the hard ceiling elapses; both paths
//! converge on the engine's single stop routine.

use crate::config::VoiceConfig;
use crate::voice::SAMPLE_RATE;

/// Verdict after feeding a frame of samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureVerdict {
    /// Keep capturing
    Continue,
    /// Trailing silence window elapsed (natural end of speech)
    SilenceElapsed,
    /// Hard capture ceiling reached regardless of energy
    CeilingReached,
}

/// Accumulates capture samples and watches for sustained silence
pub struct ActivityDetector {
    rms_threshold: f32,
    silence_limit: usize,
    ceiling: usize,
    buffered: Vec<f32>,
    silence_run: usize,
}

impl ActivityDetector {
    /// Create a detector from voice configuration
    #[must_use]
    pub fn new(config: &VoiceConfig) -> Self {
        Self {
            rms_threshold: config.rms_threshold,
            silence_limit: ms_to_samples(config.silence_window_ms),
            ceiling: ms_to_samples(config.max_capture_ms),
            buffered: Vec::new(),
            silence_run: 0,
        }
    }

    /// Feed a frame of captured samples
    pub fn feed(&mut self, samples: &[f32]) -> CaptureVerdict {
        if samples.is_empty() {
            return CaptureVerdict::Continue;
        }

        let energy = rms_energy(samples);
        self.buffered.extend_from_slice(samples);

        if energy < self.rms_threshold {
            self.silence_run += samples.len();
        } else {
            self.silence_run = 0;
        }

        tracing::trace!(
            buffered = self.buffered.len(),
            silence = self.silence_run,
            energy,
            "activity frame"
        );

        if self.buffered.len() >= self.ceiling {
            tracing::debug!(samples = self.buffered.len(), "capture ceiling reached");
            return CaptureVerdict::CeilingReached;
        }

        if self.silence_run >= self.silence_limit {
            tracing::debug!(samples = self.buffered.len(), "trailing silence elapsed");
            return CaptureVerdict::SilenceElapsed;
        }

        CaptureVerdict::Continue
    }

    /// Take the accumulated samples, leaving the detector empty
    ///
    /// A second call returns nothing, so the payload is never emitted twice.
    pub fn take_samples(&mut self) -> Vec<f32> {
        self.silence_run = 0;
        std::mem::take(&mut self.buffered)
    }

    /// Reset to a fresh capture attempt
    pub fn reset(&mut self) {
        self.buffered.clear();
        self.silence_run = 0;
    }

    /// Samples accumulated so far
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.buffered.len()
    }
}

/// Convert a duration in milliseconds to a sample count at the capture rate
#[allow(clippy::cast_possible_truncation)]
const fn ms_to_samples(ms: u64) -> usize {
    (ms * SAMPLE_RATE as u64 / 1000) as usize
}

/// Calculate RMS energy of audio samples
#[allow(clippy::cast_precision_loss)]
fn rms_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> VoiceConfig {
        VoiceConfig::default()
    }

    /// 100ms of audio at the capture rate
    fn frame(value: f32) -> Vec<f32> {
        vec![value; SAMPLE_RATE as usize / 10]
    }

    #[test]
    fn energy_calculation() {
        let silence = vec![0.0f32; 100];
        assert!(rms_energy(&silence) < 0.001);

        let loud = vec![0.5f32; 100];
        assert!(rms_energy(&loud) > 0.4);
    }

    #[test]
    fn sustained_silence_stops_capture() {
        let mut detector = ActivityDetector::new(&test_config());

        // 2,100ms of continuous sub-threshold energy
        let mut verdict = CaptureVerdict::Continue;
        for _ in 0..21 {
            verdict = detector.feed(&frame(0.0));
            if verdict != CaptureVerdict::Continue {
                break;
            }
        }
        assert_eq!(verdict, CaptureVerdict::SilenceElapsed);
    }

    #[test]
    fn speech_resets_silence_window() {
        let mut detector = ActivityDetector::new(&test_config());

        for _ in 0..19 {
            assert_eq!(detector.feed(&frame(0.0)), CaptureVerdict::Continue);
        }
        // Loud frame resets the trailing window
        assert_eq!(detector.feed(&frame(0.5)), CaptureVerdict::Continue);
        assert_eq!(detector.feed(&frame(0.0)), CaptureVerdict::Continue);
    }

    #[test]
    fn hard_ceiling_stops_noisy_capture() {
        let mut detector = ActivityDetector::new(&test_config());

        // Continuous speech never trips the silence window; the ceiling
        // fires at 10,000ms regardless
        let mut verdict = CaptureVerdict::Continue;
        for _ in 0..101 {
            verdict = detector.feed(&frame(0.5));
            if verdict != CaptureVerdict::Continue {
                break;
            }
        }
        assert_eq!(verdict, CaptureVerdict::CeilingReached);
    }

    #[test]
    fn take_samples_never_emits_twice() {
        let mut detector = ActivityDetector::new(&test_config());
        detector.feed(&frame(0.5));

        let first = detector.take_samples();
        assert!(!first.is_empty());
        assert!(detector.take_samples().is_empty());
    }
}
