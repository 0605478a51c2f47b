//! Configuration management for the patter engine

pub mod file;

use std::path::PathBuf;

use crate::{Error, Result};

/// Engine configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to data directory (session store, cache)
    pub data_dir: PathBuf,

    /// Storefront base URL the engine is attached to
    pub storefront_url: String,

    /// Conversational backend configuration
    pub backend: BackendConfig,

    /// Voice capture configuration
    pub voice: VoiceConfig,

    /// Recommendation-fallback heuristic configuration
    pub heuristics: HeuristicsConfig,

    /// Callback scheduling service URL (optional)
    pub scheduler_url: Option<String>,
}

/// Conversational backend configuration
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL for the transcription/chat/synthesis API
    pub base_url: String,

    /// Optional bearer token
    pub api_key: Option<String>,

    /// Delay before the single retry of a transient failure
    pub retry_delay_ms: u64,

    /// Character ceiling applied to synthesis input
    pub speech_max_chars: usize,

    /// Synthesis language when no script dominates
    pub default_language: String,
}

/// Voice capture configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// RMS energy floor below which a frame counts as silence
    pub rms_threshold: f32,

    /// Trailing silence that ends capture
    pub silence_window_ms: u64,

    /// Hard capture ceiling regardless of energy
    pub max_capture_ms: u64,

    /// Payloads smaller than this are discarded as no-speech
    pub min_payload_bytes: usize,

    /// Delay before automatically resuming listening
    pub relisten_delay_ms: u64,
}

/// Recommendation-fallback heuristic thresholds
///
/// The heuristic is approximate; every signal is tunable rather than
/// hard-coded.
#[derive(Debug, Clone)]
pub struct HeuristicsConfig {
    /// Price-like mentions needed to trigger the fallback
    pub min_price_mentions: usize,

    /// Repeated capitalized multi-word phrases needed to trigger
    pub min_repeated_phrases: usize,

    /// Domain keyword hits needed to trigger
    pub min_keyword_hits: usize,

    /// Domain keywords counted toward the keyword signal
    pub keywords: Vec<String>,

    /// Word cap on the synthesized search query
    pub max_query_words: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8787".to_string(),
            api_key: None,
            retry_delay_ms: 750,
            speech_max_chars: 2000,
            default_language: "en".to_string(),
        }
    }
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            rms_threshold: 0.015,
            silence_window_ms: 2_000,
            max_capture_ms: 10_000,
            min_payload_bytes: 2_048,
            relisten_delay_ms: 1_200,
        }
    }
}

impl Default for HeuristicsConfig {
    fn default() -> Self {
        Self {
            min_price_mentions: 2,
            min_repeated_phrases: 2,
            min_keyword_hits: 4,
            keywords: [
                "price", "buy", "available", "stock", "color", "size", "cart", "order", "deal",
                "offer", "product", "collection",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
            max_query_words: 4,
        }
    }
}

impl Config {
    /// Load configuration: defaults overlaid with the TOML config file
    ///
    /// # Errors
    ///
    /// Returns error if no data directory can be determined
    pub fn load() -> Result<Self> {
        let overlay = file::load_config_file();
        Self::from_overlay(overlay)
    }

    /// Build a configuration from a file overlay
    ///
    /// # Errors
    ///
    /// Returns error if no data directory can be determined
    pub fn from_overlay(overlay: file::PatterConfigFile) -> Result<Self> {
        let data_dir = overlay
            .data_dir
            .map(PathBuf::from)
            .or_else(default_data_dir)
            .ok_or_else(|| Error::Config("no data directory available".to_string()))?;

        let mut backend = BackendConfig::default();
        if let Some(url) = overlay.backend.url {
            backend.base_url = url;
        }
        backend.api_key = overlay.backend.api_key;
        if let Some(ms) = overlay.backend.retry_delay_ms {
            backend.retry_delay_ms = ms;
        }
        if let Some(max) = overlay.backend.speech_max_chars {
            backend.speech_max_chars = max;
        }
        if let Some(lang) = overlay.backend.default_language {
            backend.default_language = lang;
        }

        let mut voice = VoiceConfig::default();
        if let Some(t) = overlay.voice.rms_threshold {
            voice.rms_threshold = t;
        }
        if let Some(ms) = overlay.voice.silence_window_ms {
            voice.silence_window_ms = ms;
        }
        if let Some(ms) = overlay.voice.max_capture_ms {
            voice.max_capture_ms = ms;
        }
        if let Some(bytes) = overlay.voice.min_payload_bytes {
            voice.min_payload_bytes = bytes;
        }
        if let Some(ms) = overlay.voice.relisten_delay_ms {
            voice.relisten_delay_ms = ms;
        }

        let mut heuristics = HeuristicsConfig::default();
        if let Some(n) = overlay.heuristics.min_price_mentions {
            heuristics.min_price_mentions = n;
        }
        if let Some(n) = overlay.heuristics.min_repeated_phrases {
            heuristics.min_repeated_phrases = n;
        }
        if let Some(n) = overlay.heuristics.min_keyword_hits {
            heuristics.min_keyword_hits = n;
        }
        if let Some(words) = overlay.heuristics.keywords {
            heuristics.keywords = words;
        }
        if let Some(n) = overlay.heuristics.max_query_words {
            heuristics.max_query_words = n;
        }

        Ok(Self {
            data_dir,
            storefront_url: overlay
                .storefront
                .unwrap_or_else(|| "http://127.0.0.1:9292".to_string()),
            backend,
            voice,
            heuristics,
            scheduler_url: overlay.scheduler_url,
        })
    }
}

/// Default data directory: `~/.local/share/patter` (platform equivalent)
fn default_data_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("shop", "patter", "patter")
        .map(|dirs| dirs.data_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let voice = VoiceConfig::default();
        assert_eq!(voice.silence_window_ms, 2_000);
        assert_eq!(voice.max_capture_ms, 10_000);
        assert!(voice.min_payload_bytes > 0);
    }

    #[test]
    fn overlay_overrides_defaults() {
        let overlay = file::PatterConfigFile {
            data_dir: Some("/tmp/patter-test".to_string()),
            storefront: Some("https://shop.example".to_string()),
            backend: file::BackendFileConfig {
                url: Some("https://api.example".to_string()),
                ..Default::default()
            },
            voice: file::VoiceFileConfig {
                silence_window_ms: Some(1_500),
                ..Default::default()
            },
            ..Default::default()
        };

        let config = Config::from_overlay(overlay).unwrap();
        assert_eq!(config.storefront_url, "https://shop.example");
        assert_eq!(config.backend.base_url, "https://api.example");
        assert_eq!(config.voice.silence_window_ms, 1_500);
        // Untouched fields keep defaults
        assert_eq!(config.voice.max_capture_ms, 10_000);
    }
}
