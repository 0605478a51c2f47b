//! Conversational backend call with streaming reply
//!
//! The backend is stateless per request: every turn carries the full message
//! history, the session id, and the conversation correlation token. The
//! reply arrives as an SSE stream of `OpenAI`-style delta chunks terminated
//! by a `[DONE]` sentinel.

use std::collections::VecDeque;
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::backend::sse::SseLineFeed;
use crate::config::BackendConfig;
use crate::host::PageContext;
use crate::session::Message;
use crate::{Error, Result};

/// Stream termination sentinel
const DONE_SENTINEL: &str = "[DONE]";

/// Response header that may carry a freshly assigned conversation id
pub const CONVERSATION_ID_HEADER: &str = "x-conversation-id";

/// One conversational turn request
#[derive(Debug)]
pub struct ChatTurn<'a> {
    /// Full turn history, oldest first
    pub messages: &'a [Message],
    /// Browsing session id
    pub session_id: &'a str,
    /// Correlation token, if one has been assigned
    pub conversation_id: Option<&'a str>,
    /// Where the shopper currently is
    pub page: PageContext,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    messages: Vec<WireMessage<'a>>,
    session_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    conversation_id: Option<&'a str>,
    page: &'a PageContext,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// One `OpenAI`-style streamed delta chunk
#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Deserialize, Default)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

impl ChatChunk {
    fn content(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.delta.content)
            .filter(|s| !s.is_empty())
    }
}

/// Client for the conversational backend
pub struct ChatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    retry_delay: Duration,
}

impl ChatClient {
    /// Create a new chat client
    #[must_use]
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }

    /// Issue the conversational call under the single-retry policy
    ///
    /// Transient failures (5xx, network) are retried exactly once after a
    /// fixed delay; a second failure is terminal for the turn. Rate limits
    /// and other 4xx responses are never retried.
    ///
    /// # Errors
    ///
    /// Returns the classified failure when both attempts fail
    pub async fn request(&self, turn: &ChatTurn<'_>) -> Result<ChatStream> {
        retry_once(self.retry_delay, || self.attempt(turn)).await
    }

    async fn attempt(&self, turn: &ChatTurn<'_>) -> Result<ChatStream> {
        let url = format!("{}/chat", self.base_url);
        let body = ChatRequest {
            messages: turn
                .messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            session_id: turn.session_id,
            conversation_id: turn.conversation_id,
            page: &turn.page,
        };

        let mut req = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {key}"));
        }

        tracing::debug!(messages = turn.messages.len(), "starting conversational call");

        let response = req
            .send()
            .await
            .map_err(|e| Error::Transient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %text, "conversational call failed");
            return Err(classify_status(status, &text));
        }

        let conversation_id = response
            .headers()
            .get(CONVERSATION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string);

        Ok(ChatStream {
            stream: response.bytes_stream().boxed(),
            conversation_id,
            feed: SseLineFeed::new(),
            assembler: DeltaAssembler::default(),
            fragments: VecDeque::new(),
            done: false,
        })
    }
}

/// Run an attempt with the single-retry policy for transient failures
pub(crate) async fn retry_once<T, F, Fut>(retry_delay: Duration, mut attempt: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match attempt().await {
        Ok(value) => Ok(value),
        Err(e) if e.is_transient() => {
            tracing::warn!(error = %e, "transient failure, retrying once");
            tokio::time::sleep(retry_delay).await;
            attempt().await.map_err(|retry_err| match retry_err {
                Error::Transient(msg) => Error::Terminal(msg),
                other => other,
            })
        }
        Err(e) => Err(e),
    }
}

/// Map a non-2xx response onto the retry taxonomy
fn classify_status(status: StatusCode, body: &str) -> Error {
    if status == StatusCode::TOO_MANY_REQUESTS {
        let message = if body.trim().is_empty() {
            "The assistant is handling too many requests right now.".to_string()
        } else {
            body.trim().to_string()
        };
        return Error::RateLimited(message);
    }

    if status.is_server_error() {
        return Error::Transient(format!("{status}: {body}"));
    }

    Error::Terminal(format!("{status}: {body}"))
}

/// An in-flight streaming reply
pub struct ChatStream {
    stream: BoxStream<'static, reqwest::Result<Bytes>>,
    /// Conversation id from the response header, if the backend assigned one
    pub conversation_id: Option<String>,
    feed: SseLineFeed,
    assembler: DeltaAssembler,
    fragments: VecDeque<String>,
    done: bool,
}

impl ChatStream {
    /// Next decoded reply fragment; `None` once the stream ends
    ///
    /// The stream ends on the `[DONE]` sentinel or when the connection
    /// closes, whichever comes first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transient`] if the connection drops mid-stream
    pub async fn next_fragment(&mut self) -> Result<Option<String>> {
        loop {
            if let Some(fragment) = self.fragments.pop_front() {
                return Ok(Some(fragment));
            }
            if self.done {
                return Ok(None);
            }

            match self.stream.next().await {
                Some(Ok(chunk)) => {
                    for payload in self.feed.push(&chunk) {
                        if self.done {
                            break;
                        }
                        self.ingest(&payload);
                    }
                }
                None => {
                    // Connection end finalizes the reply
                    self.done = true;
                    if let Some(payload) = self.feed.flush() {
                        self.ingest(&payload);
                    }
                }
                Some(Err(e)) => return Err(Error::Transient(e.to_string())),
            }
        }
    }

    fn ingest(&mut self, payload: &str) {
        if payload.trim() == DONE_SENTINEL {
            self.done = true;
            return;
        }
        if let Some(content) = self.assembler.accept(payload) {
            self.fragments.push_back(content);
        }
    }
}

/// Reassembles delta payloads that arrive split across network frames
///
/// A payload that fails to parse as JSON is re-buffered and joined with the
/// next payload rather than discarded: the transport may flush a frame in
/// the middle of a JSON object, so a parse failure is recoverable.
#[derive(Debug, Default)]
struct DeltaAssembler {
    pending: String,
}

impl DeltaAssembler {
    fn accept(&mut self, payload: &str) -> Option<String> {
        self.pending.push_str(payload);
        match serde_json::from_str::<ChatChunk>(&self.pending) {
            Ok(chunk) => {
                self.pending.clear();
                chunk.content()
            }
            Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembler_decodes_complete_chunk() {
        let mut assembler = DeltaAssembler::default();
        let content = assembler.accept(r#"{"choices":[{"delta":{"content":"Hi"}}]}"#);
        assert_eq!(content.as_deref(), Some("Hi"));
    }

    #[test]
    fn assembler_rebuffers_split_json() {
        let mut assembler = DeltaAssembler::default();
        assert!(assembler.accept(r#"{"choices":[{"delta"#).is_none());
        let content = assembler.accept(r#"":{"content":" there"}}]}"#);
        assert_eq!(content.as_deref(), Some(" there"));
        // Buffer is clean again afterwards
        let next = assembler.accept(r#"{"choices":[{"delta":{"content":"!"}}]}"#);
        assert_eq!(next.as_deref(), Some("!"));
    }

    #[test]
    fn assembler_skips_empty_deltas() {
        let mut assembler = DeltaAssembler::default();
        assert!(assembler.accept(r#"{"choices":[{"delta":{}}]}"#).is_none());
    }

    #[test]
    fn server_errors_are_transient() {
        let err = classify_status(StatusCode::SERVICE_UNAVAILABLE, "overloaded");
        assert!(err.is_transient());
    }

    #[test]
    fn rate_limit_is_surfaced_verbatim() {
        let err = classify_status(StatusCode::TOO_MANY_REQUESTS, "slow down please");
        match err {
            Error::RateLimited(msg) => assert_eq!(msg, "slow down please"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn client_errors_are_terminal() {
        let err = classify_status(StatusCode::NOT_FOUND, "nope");
        assert!(matches!(err, Error::Terminal(_)));
    }

    #[tokio::test]
    async fn retry_once_recovers_from_single_transient_failure() {
        let mut attempts = 0;
        let result = retry_once(Duration::ZERO, || {
            attempts += 1;
            let attempt = attempts;
            async move {
                if attempt == 1 {
                    Err(Error::Transient("503".to_string()))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(attempts, 2);
    }

    #[tokio::test]
    async fn retry_once_gives_up_after_second_failure() {
        let mut attempts = 0;
        let result: Result<()> = retry_once(Duration::ZERO, || {
            attempts += 1;
            async { Err(Error::Transient("503".to_string())) }
        })
        .await;

        assert!(matches!(result, Err(Error::Terminal(_))));
        assert_eq!(attempts, 2);
    }

    #[tokio::test]
    async fn retry_once_skips_terminal_failures() {
        let mut attempts = 0;
        let result: Result<()> = retry_once(Duration::ZERO, || {
            attempts += 1;
            async { Err(Error::Terminal("400".to_string())) }
        })
        .await;

        assert!(matches!(result, Err(Error::Terminal(_))));
        assert_eq!(attempts, 1);
    }
}
