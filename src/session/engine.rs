//! The session state machine: single authority for conversational state.
//!
//! The engine is a single-consumer event loop. Speech events, timer
//! firings, classifier completions and quick commands all arrive as
//! [`EngineEvent`]s on one mpsc channel and are processed one at a time, so
//! the `Session` has exactly one writer. Collaborators (speech synthesis,
//! capture control, cart, navigation, order submission) are reached only
//! through the effects produced by [`dispatch`].
//!
//! Two invalidation mechanisms follow the cancel-by-generation rule:
//! - every timer kind carries a generation counter; cancelling bumps the
//!   generation so a stale callback is a no-op, and
//! - an engine epoch counter guards classifier completions and delayed
//!   capture re-opens, so a late-arriving result cannot mutate the session
//!   that replaced the one it was computed for.

use crate::cart::{Cart, CartLine};
use crate::config::KioskConfig;
use crate::menu::Menu;
use crate::nlu::NluResult;
use crate::nlu::gateway::NluGateway;
use crate::nlu::prompt::TimeContext;
use crate::session::dispatch::{Effect, dispatch};
use crate::session::{Session, SessionState};
use crate::speech::{Navigator, SpeechEvent, SpeechInput, SpeechOutput};
use crate::submit::{OrderSubmitter, OrderTicket};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Engine event channel capacity.
const ENGINE_CHANNEL_SIZE: usize = 64;
/// Runtime event fan-out capacity.
const RUNTIME_CHANNEL_SIZE: usize = 32;

const GREETING: &str = "어서오세요. 주문을 도와드릴게요. 말씀해 주세요.";
const FAREWELL: &str = "이용해 주셔서 감사합니다. 안녕히 가세요.";
const COMPLETION_ACK: &str = "주문이 완료되었습니다. 이용해 주셔서 감사합니다.";
const LISTENING_TIMEOUT_NOTICE: &str = "오랫동안 음성 입력이 없어 인식을 종료합니다.";
const CAPTURE_ERROR_NOTICE: &str = "음성 인식 중 오류가 발생했습니다.";
const SUBMIT_FAILURE_NOTICE: &str = "주문 접수에 실패했습니다. 잠시 후 다시 시도해 주세요.";
const EMPTY_CART_NOTICE: &str = "장바구니가 비어 있습니다. 먼저 메뉴를 주문해 주세요.";

/// The three timer kinds owned by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Session-level inactivity timer; expiry ends the session.
    Activity,
    /// Per-capture silence timer; expiry stops capture.
    Silence,
    /// Per-capture ceiling; expiry force-stops capture with a notice.
    MaxListening,
}

#[derive(Debug, Default)]
struct TimerGenerations {
    activity: u64,
    silence: u64,
    max_listening: u64,
}

impl TimerGenerations {
    fn get(&self, kind: TimerKind) -> u64 {
        match kind {
            TimerKind::Activity => self.activity,
            TimerKind::Silence => self.silence,
            TimerKind::MaxListening => self.max_listening,
        }
    }

    fn bump(&mut self, kind: TimerKind) -> u64 {
        let slot = match kind {
            TimerKind::Activity => &mut self.activity,
            TimerKind::Silence => &mut self.silence,
            TimerKind::MaxListening => &mut self.max_listening,
        };
        *slot += 1;
        *slot
    }
}

/// An event delivered to the engine loop.
///
/// Adapters (and test harnesses) construct these; the engine is the sole
/// consumer.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// Inbound speech adapter event.
    Speech(SpeechEvent),
    /// UI shortcut text injected as if recognized by speech.
    QuickCommand(String),
    /// A classifier run finished.
    NluCompleted {
        epoch: u64,
        utterance: String,
        result: NluResult,
    },
    /// A timer fired; stale generations are ignored.
    TimerFired { kind: TimerKind, generation: u64 },
    /// Delayed capture re-open after a clarify action.
    ReopenCapture { epoch: u64 },
    /// Display TTL for the last recognized utterance elapsed.
    ClearRecognizedText { epoch: u64 },
    /// Stop the engine loop.
    Shutdown,
}

/// Observable engine output for UI shells; mirrors session changes without
/// exposing the session itself.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    SessionStarted { session_id: Uuid },
    SessionEnded,
    StateChanged(SessionState),
    AssistantReply { text: String },
    CartUpdated { lines: usize, total: u32 },
    OrderSubmitted { order_number: String },
}

/// Cloneable sender half for feeding the engine.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineEvent>,
}

impl EngineHandle {
    /// Deliver a speech adapter event.
    ///
    /// # Errors
    ///
    /// Returns a channel error if the engine has shut down.
    pub async fn speech_event(&self, event: SpeechEvent) -> crate::error::Result<()> {
        self.inject(EngineEvent::Speech(event)).await
    }

    /// Inject text as if recognized by speech (UI shortcut buttons).
    ///
    /// # Errors
    ///
    /// Returns a channel error if the engine has shut down.
    pub async fn quick_command(&self, text: impl Into<String>) -> crate::error::Result<()> {
        self.inject(EngineEvent::QuickCommand(text.into())).await
    }

    /// Stop the engine loop.
    ///
    /// # Errors
    ///
    /// Returns a channel error if the engine has already shut down.
    pub async fn shutdown(&self) -> crate::error::Result<()> {
        self.inject(EngineEvent::Shutdown).await
    }

    /// Deliver a raw engine event. Adapters and test harnesses only.
    ///
    /// # Errors
    ///
    /// Returns a channel error if the engine has shut down.
    pub async fn inject(&self, event: EngineEvent) -> crate::error::Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|e| crate::error::KioskError::Channel(e.to_string()))
    }
}

/// Collaborator surfaces the engine drives.
pub struct EngineDeps {
    pub speech_out: Arc<dyn SpeechOutput>,
    pub speech_in: Arc<dyn SpeechInput>,
    pub navigator: Arc<dyn Navigator>,
    pub submitter: Arc<dyn OrderSubmitter>,
    pub cart: Box<dyn Cart>,
}

/// The voice ordering session engine.
pub struct SessionEngine {
    config: KioskConfig,
    menu: Arc<Menu>,
    gateway: NluGateway,
    deps: EngineDeps,
    session: Session,
    /// Restored when dispatch leaves the transient Processing state alone.
    resume_state: SessionState,
    /// In-flight guard: utterances arriving while true are dropped.
    processing: bool,
    /// Bumped on session end; invalidates late classifier completions.
    epoch: u64,
    timers: TimerGenerations,
    tx: mpsc::Sender<EngineEvent>,
    rx: mpsc::Receiver<EngineEvent>,
    events: broadcast::Sender<RuntimeEvent>,
}

impl SessionEngine {
    /// Build an engine and its feeding handle.
    pub fn new(
        config: KioskConfig,
        menu: Arc<Menu>,
        gateway: NluGateway,
        deps: EngineDeps,
    ) -> (Self, EngineHandle) {
        let (tx, rx) = mpsc::channel(ENGINE_CHANNEL_SIZE);
        let (events, _) = broadcast::channel(RUNTIME_CHANNEL_SIZE);
        let max_pairs = config.session.max_history_pairs;
        let engine = Self {
            config,
            menu,
            gateway,
            deps,
            session: Session::new(max_pairs),
            resume_state: SessionState::Idle,
            processing: false,
            epoch: 0,
            timers: TimerGenerations::default(),
            tx: tx.clone(),
            rx,
            events,
        };
        (engine, EngineHandle { tx })
    }

    /// Subscribe to observable runtime events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<RuntimeEvent> {
        self.events.subscribe()
    }

    /// Run the event loop until shutdown, returning the engine for
    /// inspection.
    pub async fn run(mut self) -> Self {
        loop {
            let Some(event) = self.rx.recv().await else {
                break;
            };
            if !self.handle_event(event).await {
                break;
            }
        }
        self
    }

    // ── Read-only views (UI shells and tests) ───────────────────────────

    pub fn session_state(&self) -> SessionState {
        self.session.state
    }

    pub fn history_len(&self) -> usize {
        self.session.history().len()
    }

    pub fn pending_len(&self) -> usize {
        self.session.pending_len()
    }

    pub fn cart_lines(&self) -> Vec<CartLine> {
        self.deps.cart.items()
    }

    pub fn cart_total(&self) -> u32 {
        self.deps.cart.total()
    }

    pub fn last_recognized_text(&self) -> Option<&str> {
        self.session.last_recognized_text.as_deref()
    }

    // ── Event handling ──────────────────────────────────────────────────

    async fn handle_event(&mut self, event: EngineEvent) -> bool {
        match event {
            EngineEvent::Speech(SpeechEvent::CaptureStarted) => self.on_capture_started(),
            EngineEvent::Speech(SpeechEvent::CaptureEnded) => self.on_capture_ended(),
            EngineEvent::Speech(SpeechEvent::PartialResult(text)) => self.on_partial(text),
            EngineEvent::Speech(SpeechEvent::Result(text)) => self.on_recognized(text),
            EngineEvent::Speech(SpeechEvent::Error(code)) => self.on_capture_error(&code),
            EngineEvent::QuickCommand(text) => {
                // Quick commands pre-empt any live capture.
                self.deps.speech_in.stop_capture();
                self.cancel_capture_timers();
                self.on_recognized(text);
            }
            EngineEvent::NluCompleted {
                epoch,
                utterance,
                result,
            } => self.on_nlu_completed(epoch, utterance, result).await,
            EngineEvent::TimerFired { kind, generation } => self.on_timer(kind, generation),
            EngineEvent::ReopenCapture { epoch } => {
                if epoch == self.epoch && self.session.is_active() {
                    self.deps.speech_in.start_capture();
                }
            }
            EngineEvent::ClearRecognizedText { epoch } => {
                if epoch == self.epoch {
                    self.session.last_recognized_text = None;
                }
            }
            EngineEvent::Shutdown => {
                self.cancel_all_timers();
                self.epoch += 1;
                return false;
            }
        }
        true
    }

    fn on_capture_started(&mut self) {
        self.start_session();
        self.arm_timer(TimerKind::MaxListening);
    }

    fn on_capture_ended(&mut self) {
        self.cancel_capture_timers();
    }

    fn on_partial(&mut self, text: String) {
        self.session.last_recognized_text = Some(text);
        // Capture auto-stops after a stretch with no further partials.
        self.arm_timer(TimerKind::Silence);
    }

    fn on_capture_error(&mut self, code: &str) {
        warn!(code, "speech capture error");
        self.cancel_capture_timers();
        self.speak(CAPTURE_ERROR_NOTICE);
    }

    /// Shared path for recognized speech and quick commands.
    fn on_recognized(&mut self, text: String) {
        if text.trim().is_empty() {
            return;
        }
        if self.processing {
            info!(dropped = text.as_str(), "utterance dropped: classification in flight");
            return;
        }

        self.start_session();
        self.session.last_recognized_text = Some(text.clone());

        let snapshot = self.session.snapshot(
            self.deps.cart.items().into_iter().map(|line| line.item).collect(),
            self.deps.cart.total(),
        );
        let history = self.session.history().to_vec();

        self.resume_state = self.session.state;
        if self.session.state == SessionState::Listening {
            self.session.state = SessionState::Processing;
        }
        self.processing = true;

        let gateway = self.gateway.clone();
        let tx = self.tx.clone();
        let epoch = self.epoch;
        tokio::spawn(async move {
            let result = gateway.classify(&text, &history, &snapshot).await;
            let _ = tx
                .send(EngineEvent::NluCompleted {
                    epoch,
                    utterance: text,
                    result,
                })
                .await;
        });
    }

    async fn on_nlu_completed(&mut self, epoch: u64, utterance: String, result: NluResult) {
        if epoch != self.epoch {
            info!("stale classifier result discarded");
            return;
        }
        self.processing = false;

        self.session.push_turn_pair(&utterance, &result.response);
        self.speak(&result.response);
        let _ = self.events.send(RuntimeEvent::AssistantReply {
            text: result.response.clone(),
        });

        let effects = dispatch(&mut self.session, &result, &self.menu, &TimeContext::now());
        self.execute_effects(effects).await;

        if self.session.state == SessionState::Processing {
            self.session.state = self.resume_state;
        }
        let _ = self.events.send(RuntimeEvent::StateChanged(self.session.state));

        // The consumed utterance stays visible for the display TTL.
        if self.session.is_active() {
            let tx = self.tx.clone();
            let epoch = self.epoch;
            let ttl = Duration::from_secs(self.config.session.recognized_text_ttl_secs);
            tokio::spawn(async move {
                tokio::time::sleep(ttl).await;
                let _ = tx.send(EngineEvent::ClearRecognizedText { epoch }).await;
            });
        }
    }

    async fn execute_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Speak(text) => self.speak(&text),
                Effect::AddToCart { item, unit_price } => {
                    debug!(name = item.name.as_str(), quantity = item.quantity, "adding to cart");
                    self.deps.cart.add_item(item, unit_price);
                    self.emit_cart_updated();
                }
                Effect::RemoveLastCartLine => {
                    if self.deps.cart.remove_last().is_some() {
                        self.emit_cart_updated();
                    }
                }
                Effect::ClearCart => {
                    self.deps.cart.clear();
                    self.emit_cart_updated();
                }
                Effect::Navigate { screen, params } => self.deps.navigator.go_to(&screen, params),
                Effect::SubmitOrder => self.submit_order().await,
                Effect::ReopenCapture => {
                    let tx = self.tx.clone();
                    let epoch = self.epoch;
                    let delay =
                        Duration::from_millis(self.config.session.clarify_reopen_delay_ms);
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        let _ = tx.send(EngineEvent::ReopenCapture { epoch }).await;
                    });
                }
            }
        }
    }

    async fn submit_order(&mut self) {
        let items = self.deps.cart.items();
        if items.is_empty() {
            self.speak(EMPTY_CART_NOTICE);
            return;
        }

        let ticket = OrderTicket {
            session_id: self.session.id,
            total_price: self.deps.cart.total(),
            items,
        };

        match self.deps.submitter.submit(&ticket).await {
            Ok(receipt) => {
                info!(order_number = receipt.order_number.as_str(), "order finalized");
                self.speak(&format!(
                    "주문이 접수되었습니다. 주문번호는 {}번입니다.",
                    receipt.order_number
                ));
                let _ = self.events.send(RuntimeEvent::OrderSubmitted {
                    order_number: receipt.order_number.clone(),
                });
                self.end_session();
                self.deps.cart.clear();
                self.emit_cart_updated();
                self.deps.navigator.go_to(
                    "OrderComplete",
                    Some(serde_json::json!({ "orderNumber": receipt.order_number })),
                );
            }
            Err(e) => {
                // The session stays alive so a retry remains possible.
                warn!(error = %e, "order submission failed");
                self.speak(SUBMIT_FAILURE_NOTICE);
            }
        }
    }

    // ── Session lifecycle ───────────────────────────────────────────────

    /// Start a session, or refresh the activity deadline of an active one.
    /// The greeting is only spoken on a fresh start.
    fn start_session(&mut self) {
        if !self.session.is_active() {
            self.session.state = SessionState::Listening;
            info!(session_id = %self.session.id, "session started");
            self.speak(GREETING);
            let _ = self.events.send(RuntimeEvent::SessionStarted {
                session_id: self.session.id,
            });
        }
        self.arm_timer(TimerKind::Activity);
    }

    /// End the session. Safe to call twice: a second call on an idle
    /// session does nothing.
    fn end_session(&mut self) {
        if !self.session.is_active() {
            return;
        }
        self.cancel_all_timers();
        self.epoch += 1;
        self.processing = false;

        if self.deps.cart.is_empty() {
            self.speak(FAREWELL);
        } else {
            self.speak(COMPLETION_ACK);
        }

        info!(session_id = %self.session.id, "session ended");
        self.session.reset();
        let _ = self.events.send(RuntimeEvent::SessionEnded);
    }

    // ── Timers ──────────────────────────────────────────────────────────

    fn timer_duration(&self, kind: TimerKind) -> Duration {
        match kind {
            TimerKind::Activity => Duration::from_secs(self.config.session.activity_timeout_secs),
            TimerKind::Silence => Duration::from_millis(self.config.session.silence_timeout_ms),
            TimerKind::MaxListening => {
                Duration::from_secs(self.config.session.max_listening_secs)
            }
        }
    }

    /// Arm (or re-arm) a timer. The generation bump invalidates any timer
    /// of the same kind that is still sleeping.
    fn arm_timer(&mut self, kind: TimerKind) {
        let generation = self.timers.bump(kind);
        let duration = self.timer_duration(kind);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let _ = tx.send(EngineEvent::TimerFired { kind, generation }).await;
        });
    }

    fn cancel_timer(&mut self, kind: TimerKind) {
        self.timers.bump(kind);
    }

    fn cancel_capture_timers(&mut self) {
        self.cancel_timer(TimerKind::Silence);
        self.cancel_timer(TimerKind::MaxListening);
    }

    fn cancel_all_timers(&mut self) {
        self.cancel_timer(TimerKind::Activity);
        self.cancel_capture_timers();
    }

    fn on_timer(&mut self, kind: TimerKind, generation: u64) {
        if generation != self.timers.get(kind) {
            debug!(?kind, "stale timer ignored");
            return;
        }
        match kind {
            TimerKind::Activity => {
                info!("activity deadline elapsed, ending session");
                self.end_session();
            }
            TimerKind::Silence => {
                debug!("silence window elapsed, stopping capture");
                self.deps.speech_in.stop_capture();
            }
            TimerKind::MaxListening => {
                info!("max listening window elapsed, force-stopping capture");
                self.deps.speech_in.stop_capture();
                self.speak(LISTENING_TIMEOUT_NOTICE);
            }
        }
    }

    // ── Helpers ─────────────────────────────────────────────────────────

    fn speak(&self, text: &str) {
        debug!(text, "speaking");
        self.deps.speech_out.speak(text);
    }

    fn emit_cart_updated(&self) {
        let _ = self.events.send(RuntimeEvent::CartUpdated {
            lines: self.deps.cart.items().len(),
            total: self.deps.cart.total(),
        });
    }
}
