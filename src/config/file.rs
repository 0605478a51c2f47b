//! TOML configuration file loading
//!
//! Supports `~/.config/patter/config.toml` as a persistent config source.
//! All fields are optional — the file is a partial overlay on top of defaults.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct PatterConfigFile {
    /// Data directory override
    #[serde(default)]
    pub data_dir: Option<String>,

    /// Storefront base URL
    #[serde(default)]
    pub storefront: Option<String>,

    /// Callback scheduling service URL
    #[serde(default)]
    pub scheduler_url: Option<String>,

    /// Conversational backend configuration
    #[serde(default)]
    pub backend: BackendFileConfig,

    /// Voice capture configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Recommendation-fallback heuristic thresholds
    #[serde(default)]
    pub heuristics: HeuristicsFileConfig,
}

/// Backend-related configuration
#[derive(Debug, Default, Deserialize)]
pub struct BackendFileConfig {
    /// Base URL for transcription/chat/synthesis
    pub url: Option<String>,

    /// Bearer token
    pub api_key: Option<String>,

    /// Single-retry delay in milliseconds
    pub retry_delay_ms: Option<u64>,

    /// Synthesis input character ceiling
    pub speech_max_chars: Option<usize>,

    /// Default synthesis language code
    pub default_language: Option<String>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// RMS silence threshold
    pub rms_threshold: Option<f32>,

    /// Trailing silence window (ms)
    pub silence_window_ms: Option<u64>,

    /// Hard capture ceiling (ms)
    pub max_capture_ms: Option<u64>,

    /// Minimum payload size treated as speech
    pub min_payload_bytes: Option<usize>,

    /// Auto-relisten delay (ms)
    pub relisten_delay_ms: Option<u64>,
}

/// Heuristic thresholds
#[derive(Debug, Default, Deserialize)]
pub struct HeuristicsFileConfig {
    pub min_price_mentions: Option<usize>,
    pub min_repeated_phrases: Option<usize>,
    pub min_keyword_hits: Option<usize>,
    pub keywords: Option<Vec<String>>,
    pub max_query_words: Option<usize>,
}

/// Load the TOML config file from the standard path
///
/// Returns `PatterConfigFile::default()` if the file doesn't exist or can't
/// be parsed.
#[must_use]
pub fn load_config_file() -> PatterConfigFile {
    let Some(path) = config_file_path() else {
        return PatterConfigFile::default();
    };

    if !path.exists() {
        return PatterConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                PatterConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            PatterConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/patter/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("patter").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_parses() {
        let content = r#"
storefront = "https://shop.example"

[voice]
silence_window_ms = 1800

[heuristics]
min_price_mentions = 3
"#;
        let parsed: PatterConfigFile = toml::from_str(content).unwrap();
        assert_eq!(parsed.storefront.as_deref(), Some("https://shop.example"));
        assert_eq!(parsed.voice.silence_window_ms, Some(1_800));
        assert_eq!(parsed.heuristics.min_price_mentions, Some(3));
        assert!(parsed.backend.url.is_none());
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let parsed: PatterConfigFile = toml::from_str("").unwrap();
        assert!(parsed.storefront.is_none());
        assert!(parsed.voice.rms_threshold.is_none());
    }
}
