//! Turn lifecycle
//!
//! One turn: append the user message, stream the reply while dispatching
//! embedded commands, speak the result, then either execute the deferred
//! navigation or schedule the return to listening.

use crate::backend::ChatTurn;
use crate::commands::NavigationTarget;
use crate::engine::{TurnPhase, VoiceEngine};
use crate::host::{PageContext, PageKind};
use crate::reply::ReplyParser;
use crate::session::MessageRole;
use crate::voice::AudioPlayback;
use crate::{Error, Result};

/// One-time greeting turn for a blank session
const WELCOME_NUDGE: &str = "A shopper just opened the voice assistant on the storefront. \
     Greet them in one short sentence and ask what they're looking for.";

impl VoiceEngine {
    /// Run one conversational turn from user text
    ///
    /// The user message is appended (and flushed) before the backend call is
    /// issued; commands are dispatched only after `Processing` is entered.
    /// Every failure resolves to a short status and an automatic return to a
    /// listening-ready `Idle`; a turn can never wedge the engine.
    pub(crate) async fn run_turn(&mut self, user_text: String) {
        if self.closed {
            return;
        }

        self.set_phase(TurnPhase::Processing, "thinking");
        self.session.push_user(user_text);
        self.flush_session();

        match self.stream_reply().await {
            Ok(speakable) => {
                if speakable.trim().is_empty() {
                    tracing::debug!("reply produced no speakable text");
                } else {
                    self.session.push_assistant(speakable.clone());
                    self.flush_session();
                    self.set_phase(TurnPhase::Speaking, "speaking");
                    self.speak(&speakable).await;
                }
            }
            Err(Error::RateLimited(message)) => {
                tracing::warn!(message = %message, "backend rate limited");
                self.set_phase(TurnPhase::Speaking, "rate limited");
                self.speak(&message).await;
            }
            Err(e) => {
                tracing::error!(error = %e, "turn failed");
                self.set_phase(TurnPhase::Speaking, "something went wrong");
                self.speak("Sorry, something went wrong. Let's try that again.")
                    .await;
            }
        }
        self.after_reply().await;
    }

    /// Stream the reply, dispatching command blocks as they close
    ///
    /// Returns the finalized speakable text with block markers stripped.
    async fn stream_reply(&mut self) -> Result<String> {
        let page = self.host.page().await;
        let mut stream = self
            .chat
            .request(&ChatTurn {
                messages: &self.session.turn_history,
                session_id: &self.session.session_id,
                conversation_id: self.session.conversation_id.as_deref(),
                page,
            })
            .await?;

        if let Some(id) = stream.conversation_id.take() {
            if self.session.assign_conversation_id(&id) {
                self.flush_session();
            }
        }

        let mut parser = ReplyParser::new();
        while let Some(fragment) = stream.next_fragment().await? {
            for block in parser.push_fragment(&fragment) {
                if !self.closed {
                    self.dispatcher.dispatch(&block).await;
                }
            }
        }
        for block in parser.finalize() {
            if !self.closed {
                self.dispatcher.dispatch(&block).await;
            }
        }

        let speakable = parser.speakable_text();
        self.apply_recommendation_fallback(&speakable);

        // The correlation token outlives the first completed turn either way
        if self.session.conversation_id.is_none() {
            let id = uuid::Uuid::new_v4().to_string();
            if self.session.assign_conversation_id(&id) {
                self.flush_session();
            }
        }

        Ok(speakable)
    }

    /// Synthesize a search navigation when the model narrated products
    /// without emitting a structured block
    fn apply_recommendation_fallback(&mut self, speakable: &str) {
        if self.dispatcher.pending_navigation().is_some() {
            return;
        }
        if !self.heuristic.looks_like_recommendation(speakable) {
            return;
        }
        let Some(utterance) = self.last_user_query() else {
            return;
        };

        let query = self.heuristic.search_query_from(&utterance);
        if query.is_empty() {
            return;
        }

        tracing::info!(query = %query, "synthesizing search from recommendation prose");
        self.dispatcher
            .set_pending(NavigationTarget::Search { query });
    }

    /// Speak reply text; every failure is absorbed as a skipped playback
    async fn speak(&mut self, text: &str) {
        if self.closed {
            return;
        }

        match self.speech.synthesize(text).await {
            Ok(audio) if !audio.data.is_empty() => {
                if self.playback.is_none() {
                    match AudioPlayback::new() {
                        Ok(playback) => self.playback = Some(playback),
                        Err(e) => {
                            tracing::warn!(error = %e, "no playback device, skipping speech");
                            return;
                        }
                    }
                }
                if let Some(playback) = self.playback.as_mut() {
                    if let Err(e) = playback.play_encoded(&audio.data, &audio.format).await {
                        tracing::warn!(error = %e, "playback failed");
                    }
                }
            }
            Ok(_) => tracing::debug!("synthesis returned no audio, skipping playback"),
            Err(e) => tracing::warn!(error = %e, "synthesis failed"),
        }
    }

    /// Finish the turn: execute the deferred navigation, or return to
    /// listening after a short delay
    ///
    /// The pending navigation takes priority over relistening. Session state
    /// is flushed synchronously before the navigation runs.
    pub(crate) async fn after_reply(&mut self) {
        if self.closed {
            return;
        }

        if let Some(target) = self.dispatcher.take_pending() {
            if target == NavigationTarget::Checkout {
                self.session.checkout_intent = true;
            }
            self.flush_session();
            self.set_phase(TurnPhase::Idle, "navigating");

            if let Err(e) = self.dispatcher.navigate(&target).await {
                tracing::error!(error = %e, "navigation failed");
                self.schedule_relisten();
            } else {
                self.resume_pending = true;
            }
            return;
        }

        self.set_phase(TurnPhase::Idle, "ready");
        self.schedule_relisten();
    }

    /// Apply page-context-aware logic after a load or navigation
    ///
    /// Consumes the checkout-intent flag, then either sends a page nudge
    /// (existing history on a notable page), a one-time welcome turn (no
    /// history), or quietly resumes listening.
    pub(crate) async fn resume(&mut self) {
        if self.closed || !self.session.is_open {
            return;
        }

        if self.session.checkout_intent {
            self.session.checkout_intent = false;
            self.flush_session();
            if self.host.click_checkout().await.is_available() {
                tracing::info!("auto-triggered native checkout");
            } else {
                tracing::debug!("native checkout control unavailable on this page");
            }
        }

        let page = self.host.page().await;

        if self.session.has_history() {
            if page.kind.is_notable() {
                if let Some(nudge) = nudge_for(&page) {
                    tracing::debug!(kind = ?page.kind, "sending page nudge turn");
                    return self.run_turn(nudge).await;
                }
            }
            self.schedule_relisten();
            return;
        }

        if !self.session.welcome_sent {
            self.session.welcome_sent = true;
            self.flush_session();
            return self.run_turn(WELCOME_NUDGE.to_string()).await;
        }

        self.schedule_relisten();
    }

    /// Most recent user utterance, the seed for fallback search queries
    fn last_user_query(&self) -> Option<String> {
        self.session
            .turn_history
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.content.clone())
    }
}

/// System-authored nudge appropriate to a page type
fn nudge_for(page: &PageContext) -> Option<String> {
    match page.kind {
        PageKind::Product => {
            let subject = page
                .handle
                .as_deref()
                .map_or_else(|| "this product".to_string(), |h| format!("\"{h}\""));
            Some(format!(
                "The shopper just landed on the product page for {subject}. \
                 Briefly offer help with this product."
            ))
        }
        PageKind::Cart => Some(
            "The shopper is now viewing their cart. Briefly offer to help them \
             check out or keep shopping."
                .to_string(),
        ),
        PageKind::Checkout => Some(
            "The shopper has reached checkout. Briefly reassure them and offer \
             help completing the order."
                .to_string(),
        ),
        PageKind::Landing | PageKind::Collection | PageKind::Search => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nudges_exist_for_notable_pages() {
        let product = PageContext {
            kind: PageKind::Product,
            handle: Some("blue-runner".to_string()),
            url: None,
        };
        let nudge = nudge_for(&product).unwrap();
        assert!(nudge.contains("blue-runner"));

        assert!(nudge_for(&PageContext {
            kind: PageKind::Cart,
            handle: None,
            url: None
        })
        .is_some());

        assert!(nudge_for(&PageContext::default()).is_none());
    }
}
