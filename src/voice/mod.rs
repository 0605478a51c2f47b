//! Voice capture, activity detection, and playback

mod capture;
mod detector;
mod playback;

pub use capture::{AudioCapture, AudioEncoding, AudioPayload, SAMPLE_RATE, samples_to_wav};
pub use detector::{ActivityDetector, CaptureVerdict};
pub use playback::AudioPlayback;
