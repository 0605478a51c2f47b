//! Speech-to-text transcription call

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use crate::config::BackendConfig;
use crate::voice::AudioPayload;
use crate::{Error, Result};

#[derive(Serialize)]
struct TranscribeRequest<'a> {
    audio: String,
    mime: &'a str,
}

/// Response from the transcription service
#[derive(Deserialize)]
struct TranscribeResponse {
    #[serde(default)]
    transcript: Option<String>,
    #[serde(default)]
    language_code: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// A successful transcription
#[derive(Debug, Clone)]
pub struct Transcript {
    pub text: String,
    pub language_code: Option<String>,
}

/// Transcribes captured speech to text
pub struct Transcriber {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl Transcriber {
    /// Create a new transcriber
    #[must_use]
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        }
    }

    /// Transcribe an audio payload
    ///
    /// The only success condition is an error-free response with a non-empty
    /// trimmed transcript.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or no usable transcript came back
    pub async fn transcribe(&self, payload: &AudioPayload) -> Result<Transcript> {
        tracing::debug!(
            audio_bytes = payload.len(),
            mime = payload.encoding.mime_category(),
            "starting transcription"
        );

        let url = format!("{}/transcribe", self.base_url);
        let body = TranscribeRequest {
            audio: BASE64.encode(&payload.data),
            mime: payload.encoding.mime_category(),
        };

        let mut req = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {key}"));
        }

        let response = req.send().await.map_err(|e| {
            tracing::error!(error = %e, "transcription request failed");
            e
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %text, "transcription API error");
            return Err(Error::Stt(format!("transcription error {status}: {text}")));
        }

        let result: TranscribeResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse transcription response");
            e
        })?;

        if let Some(error) = result.error {
            return Err(Error::Stt(error));
        }

        let text = result.transcript.unwrap_or_default().trim().to_string();
        if text.is_empty() {
            return Err(Error::Stt("empty transcript".to_string()));
        }

        tracing::info!(transcript = %text, "transcription complete");
        Ok(Transcript {
            text,
            language_code: result.language_code,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_with_error_field_parses() {
        let raw = r#"{"error":"audio unreadable"}"#;
        let parsed: TranscribeResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.error.as_deref(), Some("audio unreadable"));
        assert!(parsed.transcript.is_none());
    }

    #[test]
    fn response_with_transcript_parses() {
        let raw = r#"{"transcript":"show me sneakers","language_code":"en"}"#;
        let parsed: TranscribeResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.transcript.as_deref(), Some("show me sneakers"));
        assert_eq!(parsed.language_code.as_deref(), Some("en"));
    }
}
