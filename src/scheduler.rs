//! Callback scheduling integration
//!
//! Client for the callback-scheduling collaborator. Scheduling a call is
//! fire-and-forget: success or failure is surfaced transiently and never
//! blocks the conversation. The spoken time string is passed through
//! verbatim; timezone interpretation belongs to the collaborator.

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Request to schedule a callback
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackRequest {
    /// Phone number to call
    pub phone: String,
    /// Requested time, as spoken
    pub time: String,
    /// Optional context note
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Client for the callback-scheduling service
#[derive(Debug, Clone)]
pub struct CallbackScheduler {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl CallbackScheduler {
    /// Create a new scheduler client
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key,
        }
    }

    /// Schedule a callback
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the service rejects it
    pub async fn schedule(&self, request: &CallbackRequest) -> Result<()> {
        let url = format!("{}/callbacks", self.base_url);

        let mut req = self.client.post(&url).json(request);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {key}"));
        }

        let response = req.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Host(format!(
                "scheduler error: {status} - {body}"
            )));
        }

        tracing::info!(phone = %request.phone, time = %request.time, "callback scheduled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serialization_skips_empty_note() {
        let request = CallbackRequest {
            phone: "+15550100".to_string(),
            time: "tomorrow 4pm".to_string(),
            note: None,
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("+15550100"));
        assert!(json.contains("tomorrow 4pm"));
        assert!(!json.contains("note"));
    }

    #[test]
    fn request_round_trips() {
        let json = r#"{"phone":"+15550100","time":"monday 10am","note":"sizing question"}"#;
        let request: CallbackRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.phone, "+15550100");
        assert_eq!(request.note.as_deref(), Some("sizing question"));
    }
}
