//! Speech synthesis call

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use crate::config::BackendConfig;
use crate::{Error, Result};

/// Share of a distinguishing script above which its language is selected
const SCRIPT_SHARE_THRESHOLD: f32 = 0.3;

#[derive(Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    language: &'a str,
}

#[derive(Deserialize)]
struct SpeechResponse {
    audio: String,
    #[serde(default = "default_format")]
    format: String,
}

fn default_format() -> String {
    "mp3".to_string()
}

/// Synthesized reply audio
#[derive(Debug, Clone)]
pub struct SpokenAudio {
    pub data: Vec<u8>,
    /// Container format tag ("mp3", "wav")
    pub format: String,
}

/// Synthesizes speech from reply text
pub struct SpeechClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    max_chars: usize,
    default_language: String,
}

impl SpeechClient {
    /// Create a new speech client
    #[must_use]
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            max_chars: config.speech_max_chars,
            default_language: config.default_language.clone(),
        }
    }

    /// Synthesize reply text to audio
    ///
    /// Input is truncated to the configured character ceiling; the target
    /// language is chosen by script density.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the audio cannot be decoded
    pub async fn synthesize(&self, text: &str) -> Result<SpokenAudio> {
        let text = truncate_chars(text, self.max_chars);
        let language = pick_language(text, &self.default_language);

        tracing::debug!(chars = text.chars().count(), language, "starting synthesis");

        let url = format!("{}/speech", self.base_url);
        let body = SpeechRequest { text, language };

        let mut req = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {key}"));
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("synthesis error {status}: {text}")));
        }

        let result: SpeechResponse = response.json().await?;
        let data = BASE64
            .decode(result.audio.as_bytes())
            .map_err(|e| Error::Tts(format!("invalid audio payload: {e}")))?;

        Ok(SpokenAudio {
            data,
            format: result.format,
        })
    }
}

/// Truncate to at most `max` characters on a char boundary
fn truncate_chars(text: &str, max: usize) -> &str {
    text.char_indices()
        .nth(max)
        .map_or(text, |(idx, _)| &text[..idx])
}

/// Select a synthesis language by script density
///
/// A language with a distinguishing Unicode range is selected once its
/// character share crosses the threshold; otherwise the default applies.
#[allow(clippy::cast_precision_loss)]
fn pick_language<'a>(text: &str, default: &'a str) -> &'a str {
    let letters: Vec<char> = text.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.is_empty() {
        return default;
    }

    let devanagari = letters
        .iter()
        .filter(|c| ('\u{0900}'..='\u{097F}').contains(*c))
        .count();

    if devanagari as f32 / letters.len() as f32 > SCRIPT_SHARE_THRESHOLD {
        return "hi";
    }

    default
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 3), "hel");
        // Multi-byte characters never split
        assert_eq!(truncate_chars("नमस्ते", 3), "नमस");
    }

    #[test]
    fn devanagari_share_selects_hindi() {
        assert_eq!(pick_language("यह रहा आपका कार्ट", "en"), "hi");
    }

    #[test]
    fn latin_text_keeps_default() {
        assert_eq!(pick_language("Here is your cart", "en"), "en");
    }

    #[test]
    fn sparse_devanagari_keeps_default() {
        assert_eq!(
            pick_language("The word नमस्ते means hello in many Indian languages today", "en"),
            "en"
        );
    }

    #[test]
    fn empty_text_keeps_default() {
        assert_eq!(pick_language("12345 --- !!", "en"), "en");
    }
}
