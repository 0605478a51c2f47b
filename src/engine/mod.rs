//! The voice engine
//!
//! One engine instance owns the turn state machine, the session, the audio
//! capture lifecycle, and the backend clients. All engine logic runs on a
//! single thread of control; the voice loop is driven by a tick cadence and
//! suspends only at I/O boundaries.

mod state;
mod turn;

use std::sync::Arc;
use std::time::{Duration, Instant};

pub use state::{TurnPhase, TurnState};

use crate::backend::{ChatClient, SpeechClient, Transcriber};
use crate::commands::fallback::RecommendationHeuristic;
use crate::commands::{Dispatcher, NavigationTarget};
use crate::config::Config;
use crate::host::HostPlatform;
use crate::scheduler::CallbackScheduler;
use crate::session::{Session, SessionStore};
use crate::voice::{ActivityDetector, AudioCapture, AudioPayload, CaptureVerdict};
use crate::{Error, Result};

/// Voice loop tick cadence
const TICK_INTERVAL_MS: u64 = 50;

/// One capture attempt: the live stream plus its activity detector
struct CaptureRig {
    capture: AudioCapture,
    detector: ActivityDetector,
}

/// The voice shopping engine
///
/// Construct with [`VoiceEngine::new`], open the surface, then either drive
/// it with [`VoiceEngine::run`] or feed it turns directly. Closing the
/// engine releases every resource and discards the current turn.
pub struct VoiceEngine {
    config: Config,
    host: Arc<dyn HostPlatform>,
    transcriber: Transcriber,
    chat: ChatClient,
    speech: SpeechClient,
    store: SessionStore,
    session: Session,
    state: TurnState,
    dispatcher: Dispatcher,
    heuristic: RecommendationHeuristic,
    capture: Option<CaptureRig>,
    playback: Option<crate::voice::AudioPlayback>,
    relisten_at: Option<Instant>,
    resume_pending: bool,
    closed: bool,
}

impl VoiceEngine {
    /// Create an engine bound to a host surface
    ///
    /// Restores any session persisted by a previous page; the surface stays
    /// closed until [`VoiceEngine::open`] is called.
    #[must_use]
    pub fn new(config: Config, host: Arc<dyn HostPlatform>) -> Self {
        let store = SessionStore::new(&config.data_dir);
        let session = store.load().unwrap_or_default();

        let scheduler = config
            .scheduler_url
            .as_ref()
            .map(|url| CallbackScheduler::new(url.clone(), config.backend.api_key.clone()));

        Self {
            transcriber: Transcriber::new(&config.backend),
            chat: ChatClient::new(&config.backend),
            speech: SpeechClient::new(&config.backend),
            dispatcher: Dispatcher::new(Arc::clone(&host), scheduler),
            heuristic: RecommendationHeuristic::new(config.heuristics.clone()),
            store,
            session,
            host,
            state: TurnState::default(),
            capture: None,
            playback: None,
            relisten_at: None,
            resume_pending: false,
            closed: true,
            config,
        }
    }

    /// Current turn state
    #[must_use]
    pub const fn state(&self) -> &TurnState {
        &self.state
    }

    /// Current session
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// The deferred navigation for the current turn, if any
    #[must_use]
    pub const fn pending_navigation(&self) -> Option<&NavigationTarget> {
        self.dispatcher.pending_navigation()
    }

    /// Open the conversation surface
    pub fn open(&mut self) {
        self.closed = false;
        if !self.session.is_open {
            self.session.is_open = true;
            self.flush_session();
        }
    }

    /// Close the engine, cancelling the current turn
    ///
    /// Stops any active capture and releases the microphone, halts in-flight
    /// playback, discards any pending navigation, and resets to `Idle`. A
    /// turn started after reopening observes none of the cancelled state.
    pub fn close(&mut self) {
        self.closed = true;
        self.teardown_capture();
        if let Some(playback) = &self.playback {
            playback.halt();
        }
        self.dispatcher.clear_pending();
        self.relisten_at = None;
        self.resume_pending = false;
        self.state.transition(TurnPhase::Idle, "closed");
        self.session.is_open = false;
        self.flush_session();
    }

    /// Close the surface and destroy the persisted session
    pub fn end_session(&mut self) {
        self.close();
        if let Err(e) = self.store.clear() {
            tracing::warn!(error = %e, "failed to clear session record");
        }
        self.session = Session::new();
    }

    /// Start a capture attempt
    ///
    /// A no-op unless the surface is open and the engine is idle. A denied
    /// or missing microphone is surfaced as a non-fatal status change back
    /// to `Idle`.
    ///
    /// # Errors
    ///
    /// Returns error only on unexpected audio failures
    pub async fn start_listening(&mut self) -> Result<()> {
        if self.closed || !self.session.is_open {
            tracing::debug!("listen request ignored: surface closed");
            return Ok(());
        }
        if !self.state.is_idle() {
            tracing::debug!(phase = %self.state.phase(), "listen request ignored: not idle");
            return Ok(());
        }

        match self.acquire_capture() {
            Ok(rig) => {
                self.capture = Some(rig);
                self.set_phase(TurnPhase::Listening, "listening");
                Ok(())
            }
            Err(Error::PermissionDenied(msg)) => {
                tracing::warn!(reason = %msg, "microphone unavailable");
                self.set_phase(TurnPhase::Idle, "microphone unavailable");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Drive one step of the voice loop
    ///
    /// # Errors
    ///
    /// Returns error if a turn fails in a way the engine cannot absorb
    pub async fn tick(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        if self.resume_pending {
            self.resume_pending = false;
            self.resume().await;
            return Ok(());
        }

        match self.state.phase() {
            TurnPhase::Idle => {
                if self.relisten_due() {
                    self.relisten_at = None;
                    self.start_listening().await?;
                }
            }
            TurnPhase::Listening => self.poll_capture().await?,
            TurnPhase::Processing | TurnPhase::Speaking => {}
        }
        Ok(())
    }

    /// Run the engine until interrupted
    ///
    /// The voice loop stays on the calling thread; cpal streams aren't
    /// `Send`.
    ///
    /// # Errors
    ///
    /// Returns error if startup fails
    #[allow(clippy::future_not_send)]
    pub async fn run(mut self) -> Result<()> {
        self.open();
        self.resume().await;

        if self.state.is_idle() && self.relisten_at.is_none() {
            self.start_listening().await?;
        }

        loop {
            tokio::select! {
                signal = tokio::signal::ctrl_c() => {
                    if signal.is_ok() {
                        tracing::info!("shutdown requested");
                    }
                    break;
                }
                () = tokio::time::sleep(Duration::from_millis(TICK_INTERVAL_MS)) => {
                    if let Err(e) = self.tick().await {
                        tracing::error!(error = %e, "voice loop error");
                        self.set_phase(TurnPhase::Idle, "something went wrong");
                        self.schedule_relisten();
                    }
                }
            }
        }

        self.close();
        tracing::info!("engine stopped");
        Ok(())
    }

    /// Send one text turn, bypassing capture and transcription
    ///
    /// # Errors
    ///
    /// Returns error if the surface is closed or the turn fails terminally
    pub async fn send_text(&mut self, text: &str) -> Result<()> {
        if self.closed || !self.session.is_open {
            return Err(Error::Session("surface is closed".to_string()));
        }
        self.run_turn(text.to_string()).await;
        Ok(())
    }

    /// Poll the active capture and feed the activity detector
    async fn poll_capture(&mut self) -> Result<()> {
        let Some(rig) = self.capture.as_mut() else {
            return Ok(());
        };
        let samples = rig.capture.take_buffer();
        let verdict = rig.detector.feed(&samples);

        match verdict {
            CaptureVerdict::Continue => Ok(()),
            CaptureVerdict::SilenceElapsed | CaptureVerdict::CeilingReached => {
                self.finish_capture().await
            }
        }
    }

    /// Convergence point for every capture stop path
    ///
    /// Idempotent: a second call finds no rig and does nothing, so the
    /// payload is never emitted twice.
    pub(crate) async fn finish_capture(&mut self) -> Result<()> {
        let Some(mut rig) = self.capture.take() else {
            return Ok(());
        };
        rig.capture.stop();
        let samples = rig.detector.take_samples();
        drop(rig);

        let payload = AudioPayload::from_samples(&samples)?;
        self.accept_payload(payload).await;
        Ok(())
    }

    /// Hand a finished payload to transcription, or discard it as no-speech
    pub(crate) async fn accept_payload(&mut self, payload: AudioPayload) {
        if payload.len() < self.config.voice.min_payload_bytes {
            tracing::debug!(
                bytes = payload.len(),
                floor = self.config.voice.min_payload_bytes,
                "discarding undersized capture as no-speech"
            );
            self.set_phase(TurnPhase::Idle, "no speech");
            self.schedule_relisten();
            return;
        }

        self.set_phase(TurnPhase::Processing, "transcribing");
        match self.transcriber.transcribe(&payload).await {
            Ok(transcript) => self.run_turn(transcript.text).await,
            Err(e) => {
                tracing::warn!(error = %e, "transcription failed");
                self.set_phase(TurnPhase::Idle, "didn't catch that");
                self.schedule_relisten();
            }
        }
    }

    /// Transition phases, invalidating resources owned by the exited phase
    pub(crate) fn set_phase(&mut self, to: TurnPhase, status: &str) {
        let from = self.state.transition(to, status);
        if from == TurnPhase::Listening && to != TurnPhase::Listening {
            self.teardown_capture();
        }
        if to != TurnPhase::Idle {
            self.relisten_at = None;
        }
    }

    /// Release the microphone and drop the capture rig; idempotent
    fn teardown_capture(&mut self) {
        if let Some(mut rig) = self.capture.take() {
            rig.capture.stop();
            rig.detector.reset();
            tracing::debug!("capture released");
        }
    }

    /// Schedule the automatic return to listening
    pub(crate) fn schedule_relisten(&mut self) {
        self.relisten_at =
            Some(Instant::now() + Duration::from_millis(self.config.voice.relisten_delay_ms));
    }

    fn relisten_due(&self) -> bool {
        self.relisten_at.is_some_and(|at| Instant::now() >= at)
    }

    pub(crate) fn flush_session(&mut self) {
        if let Err(e) = self.store.flush(&self.session) {
            tracing::warn!(error = %e, "session flush failed");
        }
    }

    fn acquire_capture(&self) -> Result<CaptureRig> {
        let mut capture = AudioCapture::new()?;
        capture.start()?;
        Ok(CaptureRig {
            capture,
            detector: ActivityDetector::new(&self.config.voice),
        })
    }
}
