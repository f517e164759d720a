//! End-to-end session scenarios against the engine event loop.
//!
//! The classifier, speech devices, navigator and order backend are all
//! scripted stubs; tokio's paused clock drives the timers deterministically.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use kiosk_voice::nlu::gateway::{ClassifierFailure, RemoteClassifier};
use kiosk_voice::session::engine::{EngineEvent, TimerKind};
use kiosk_voice::submit::{OrderReceipt, OrderSubmitter, OrderTicket};
use kiosk_voice::{
    EngineDeps, EngineHandle, KioskConfig, MemoryCart, Menu, Navigator, NluGateway, SessionEngine,
    SessionState, SpeechEvent, SpeechInput, SpeechOutput,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Records everything the engine does to its collaborators.
#[derive(Default)]
struct Recorder {
    spoken: Mutex<Vec<String>>,
    screens: Mutex<Vec<String>>,
    capture_starts: AtomicUsize,
    capture_stops: AtomicUsize,
}

impl Recorder {
    fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    fn spoken_count(&self, needle: &str) -> usize {
        self.spoken().iter().filter(|s| s.contains(needle)).count()
    }

    fn screens(&self) -> Vec<String> {
        self.screens.lock().unwrap().clone()
    }
}

impl SpeechOutput for Recorder {
    fn speak(&self, text: &str) {
        self.spoken.lock().unwrap().push(text.to_owned());
    }
}

impl SpeechInput for Recorder {
    fn start_capture(&self) {
        self.capture_starts.fetch_add(1, Ordering::SeqCst);
    }
    fn stop_capture(&self) {
        self.capture_stops.fetch_add(1, Ordering::SeqCst);
    }
}

impl Navigator for Recorder {
    fn go_to(&self, screen: &str, _params: Option<serde_json::Value>) {
        self.screens.lock().unwrap().push(screen.to_owned());
    }
}

/// Returns scripted replies in order; exhaustion surfaces as a transport
/// failure so a test with too few replies fails loudly via the fallback.
struct ScriptedClassifier {
    replies: Mutex<VecDeque<String>>,
    delay: Duration,
}

impl ScriptedClassifier {
    fn new(replies: Vec<&str>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(str::to_owned).collect()),
            delay: Duration::ZERO,
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl RemoteClassifier for ScriptedClassifier {
    async fn generate(&self, _prompt: &str) -> Result<String, ClassifierFailure> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ClassifierFailure::Transport("script exhausted".into()))
    }
}

struct StubSubmitter {
    succeed: bool,
    calls: AtomicUsize,
}

#[async_trait]
impl OrderSubmitter for StubSubmitter {
    async fn submit(&self, _ticket: &OrderTicket) -> kiosk_voice::Result<OrderReceipt> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.succeed {
            Ok(OrderReceipt {
                order_number: "42".to_owned(),
            })
        } else {
            Err(kiosk_voice::KioskError::OrderSubmission("backend down".into()))
        }
    }
}

struct Harness {
    handle: EngineHandle,
    recorder: Arc<Recorder>,
    submitter: Arc<StubSubmitter>,
    engine: JoinHandle<SessionEngine>,
}

impl Harness {
    fn start(classifier: ScriptedClassifier, submit_succeeds: bool) -> Self {
        let menu = Arc::new(Menu::standard());
        let gateway = NluGateway::new(Arc::new(classifier), Arc::clone(&menu));
        let recorder = Arc::new(Recorder::default());
        let submitter = Arc::new(StubSubmitter {
            succeed: submit_succeeds,
            calls: AtomicUsize::new(0),
        });
        let deps = EngineDeps {
            speech_out: recorder.clone(),
            speech_in: recorder.clone(),
            navigator: recorder.clone(),
            submitter: submitter.clone(),
            cart: Box::new(MemoryCart::new()),
        };
        let (engine, handle) = SessionEngine::new(KioskConfig::default(), menu, gateway, deps);
        let engine = tokio::spawn(engine.run());
        Self {
            handle,
            recorder,
            submitter,
            engine,
        }
    }

    async fn utter(&self, text: &str) {
        self.handle
            .speech_event(SpeechEvent::Result(text.to_owned()))
            .await
            .unwrap();
        // Let the classification round-trip settle.
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    async fn finish(self) -> (SessionEngine, Arc<Recorder>, Arc<StubSubmitter>) {
        self.handle.shutdown().await.unwrap();
        let engine = self.engine.await.unwrap();
        (engine, self.recorder, self.submitter)
    }
}

fn order_reply(names_quantities: &[(&str, u32)], auto_confirm: bool) -> String {
    let items: Vec<String> = names_quantities
        .iter()
        .map(|(name, quantity)| format!(r#"{{"name": "{name}", "quantity": {quantity}}}"#))
        .collect();
    format!(
        r#"{{"action": "order", "autoConfirm": {auto_confirm}, "items": [{}], "response": "담았습니다."}}"#,
        items.join(", ")
    )
}

#[tokio::test(start_paused = true)]
async fn auto_confirm_order_then_complete_submits_and_ends_session() {
    let classifier = ScriptedClassifier::new(vec![
        &order_reply(&[("아메리카노", 2)], true),
        r#"{"action": "complete", "response": "주문을 완료합니다."}"#,
    ]);
    let harness = Harness::start(classifier, true);

    harness.utter("아이스 아메리카노 두 잔 주세요").await;
    harness.utter("결제할게요").await;

    let (engine, recorder, submitter) = harness.finish().await;
    assert_eq!(submitter.calls.load(Ordering::SeqCst), 1);
    assert_eq!(engine.session_state(), SessionState::Idle);
    assert!(engine.cart_lines().is_empty());
    assert_eq!(recorder.spoken_count("주문번호는 42번입니다"), 1);
    // Session end with a filled cart speaks the completion acknowledgment.
    assert_eq!(recorder.spoken_count("주문이 완료되었습니다"), 1);
    assert_eq!(recorder.screens(), vec!["OrderComplete".to_owned()]);
}

#[tokio::test(start_paused = true)]
async fn multi_item_order_walks_the_pending_queue_in_order() {
    let classifier = ScriptedClassifier::new(vec![
        &order_reply(&[("카페라떼", 1), ("아메리카노", 1), ("치즈케이크", 1)], false),
        r#"{"action": "confirm", "response": "네."}"#,
        r#"{"action": "confirm", "response": "네."}"#,
    ]);
    let harness = Harness::start(classifier, true);

    harness.utter("라떼랑 아메리카노랑 치즈케이크 주세요").await;
    harness.utter("네").await;
    harness.utter("네").await;

    let (engine, recorder, _) = harness.finish().await;
    let lines = engine.cart_lines();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0].item.name, "카페라떼");
    assert_eq!(lines[1].item.name, "아메리카노");
    assert_eq!(lines[2].item.name, "치즈케이크");
    assert_eq!(engine.pending_len(), 0);
    // 4500 + 4000 + 6000
    assert_eq!(engine.cart_total(), 14_500);
    // Queue drained: the session settles into continuous ordering.
    assert_eq!(engine.session_state(), SessionState::Continuous);
    assert_eq!(recorder.spoken_count("다음 주문은"), 2);
}

#[tokio::test(start_paused = true)]
async fn first_utterance_greets_exactly_once() {
    let classifier = ScriptedClassifier::new(vec![
        &order_reply(&[("아메리카노", 1)], true),
        &order_reply(&[("카페라떼", 1)], true),
    ]);
    let harness = Harness::start(classifier, true);

    harness.utter("아메리카노 주세요").await;
    harness.utter("라떼도 주세요").await;

    let (_, recorder, _) = harness.finish().await;
    assert_eq!(recorder.spoken_count("어서오세요"), 1);
}

#[tokio::test(start_paused = true)]
async fn history_is_bounded_to_five_pairs() {
    let replies: Vec<String> = (0..7)
        .map(|_| r#"{"action": "clarify", "response": "다시 말씀해 주세요."}"#.to_owned())
        .collect();
    let classifier = ScriptedClassifier::new(replies.iter().map(String::as_str).collect());
    let harness = Harness::start(classifier, true);

    for i in 0..7 {
        harness.utter(&format!("웅얼웅얼 {i}")).await;
    }

    let (engine, _, _) = harness.finish().await;
    assert_eq!(engine.history_len(), 10);
}

#[tokio::test(start_paused = true)]
async fn utterance_during_classification_is_dropped() {
    let classifier = ScriptedClassifier::new(vec![&order_reply(&[("아메리카노", 1)], true)])
        .with_delay(Duration::from_secs(3));
    let harness = Harness::start(classifier, true);

    harness
        .handle
        .speech_event(SpeechEvent::Result("아메리카노 주세요".to_owned()))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    // Still in flight for another ~3s; this one must be dropped, not queued.
    harness
        .handle
        .speech_event(SpeechEvent::Result("아니 카페라떼요".to_owned()))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(4)).await;

    let (engine, recorder, _) = harness.finish().await;
    let lines = engine.cart_lines();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].item.name, "아메리카노");
    assert_eq!(recorder.spoken_count("담았습니다"), 1);
    // Only the first utterance made it into history.
    assert_eq!(engine.history_len(), 2);
}

#[tokio::test(start_paused = true)]
async fn activity_timeout_with_empty_cart_speaks_farewell() {
    let classifier = ScriptedClassifier::new(vec![
        r#"{"action": "clarify", "response": "다시 말씀해 주세요."}"#,
    ]);
    let harness = Harness::start(classifier, true);

    harness.utter("음...").await;
    tokio::time::sleep(Duration::from_secs(50)).await;

    let (engine, recorder, _) = harness.finish().await;
    assert_eq!(engine.session_state(), SessionState::Idle);
    assert_eq!(recorder.spoken_count("안녕히 가세요"), 1);
    assert_eq!(recorder.spoken_count("주문이 완료되었습니다"), 0);
}

#[tokio::test(start_paused = true)]
async fn activity_timeout_with_filled_cart_speaks_completion_ack() {
    let classifier =
        ScriptedClassifier::new(vec![&order_reply(&[("밀크티", 1)], true)]);
    let harness = Harness::start(classifier, true);

    harness.utter("밀크티 하나요").await;
    tokio::time::sleep(Duration::from_secs(50)).await;

    let (engine, recorder, _) = harness.finish().await;
    assert_eq!(engine.session_state(), SessionState::Idle);
    assert_eq!(recorder.spoken_count("주문이 완료되었습니다"), 1);
    assert_eq!(recorder.spoken_count("안녕히 가세요"), 0);
}

#[tokio::test(start_paused = true)]
async fn each_utterance_pushes_the_activity_deadline_back() {
    let replies: Vec<String> = (0..2)
        .map(|_| r#"{"action": "clarify", "response": "네?"}"#.to_owned())
        .collect();
    let classifier = ScriptedClassifier::new(replies.iter().map(String::as_str).collect());
    let harness = Harness::start(classifier, true);

    harness.utter("저기요").await;
    tokio::time::sleep(Duration::from_secs(30)).await;
    // 30s in: a new utterance must re-arm the 45s window.
    harness.utter("여보세요").await;
    tokio::time::sleep(Duration::from_secs(30)).await;

    let (engine, _, _) = harness.finish().await;
    // 60s after start but only 30s after the last utterance.
    assert_ne!(engine.session_state(), SessionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn failed_submission_keeps_the_session_alive() {
    let classifier = ScriptedClassifier::new(vec![
        &order_reply(&[("아메리카노", 1)], true),
        r#"{"action": "complete", "response": "결제를 진행합니다."}"#,
    ]);
    let harness = Harness::start(classifier, false);

    harness.utter("아메리카노 주세요").await;
    harness.utter("결제요").await;

    let (engine, recorder, submitter) = harness.finish().await;
    assert_eq!(submitter.calls.load(Ordering::SeqCst), 1);
    assert_eq!(recorder.spoken_count("다시 시도해 주세요"), 1);
    // Cart and session both survive for a retry.
    assert_ne!(engine.session_state(), SessionState::Idle);
    assert_eq!(engine.cart_lines().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn complete_with_empty_cart_does_not_submit() {
    let classifier = ScriptedClassifier::new(vec![
        r#"{"action": "complete", "response": "결제를 진행합니다."}"#,
    ]);
    let harness = Harness::start(classifier, true);

    harness.utter("결제할게요").await;

    let (_, recorder, submitter) = harness.finish().await;
    assert_eq!(submitter.calls.load(Ordering::SeqCst), 0);
    assert_eq!(recorder.spoken_count("장바구니가 비어 있습니다"), 1);
}

#[tokio::test(start_paused = true)]
async fn stale_classifier_result_after_session_end_is_ignored() {
    let classifier = ScriptedClassifier::new(vec![]);
    let harness = Harness::start(classifier, true);

    // Open and time out a session so the epoch advances past zero.
    harness
        .handle
        .speech_event(SpeechEvent::CaptureStarted)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(50)).await;

    // A classifier completion computed for the dead session arrives late.
    harness
        .handle
        .inject(EngineEvent::NluCompleted {
            epoch: 0,
            utterance: "아메리카노 주세요".to_owned(),
            result: kiosk_voice::NluResult::minimal(
                kiosk_voice::nlu::Action::Order,
                "담았습니다.",
            ),
        })
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;

    let (engine, recorder, _) = harness.finish().await;
    assert_eq!(engine.session_state(), SessionState::Idle);
    assert_eq!(engine.history_len(), 0);
    assert_eq!(recorder.spoken_count("담았습니다"), 0);
}

#[tokio::test(start_paused = true)]
async fn rearmed_silence_timer_invalidates_the_earlier_one() {
    let classifier = ScriptedClassifier::new(vec![]);
    let harness = Harness::start(classifier, true);

    harness
        .handle
        .speech_event(SpeechEvent::CaptureStarted)
        .await
        .unwrap();
    harness
        .handle
        .speech_event(SpeechEvent::PartialResult("아메".to_owned()))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    // Re-arm at t=1s; the t=2s deadline of the first timer is now stale.
    harness
        .handle
        .speech_event(SpeechEvent::PartialResult("아메리카노".to_owned()))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(1_500)).await;

    // t=2.5s: first deadline passed without stopping capture.
    assert_eq!(harness.recorder.capture_stops.load(Ordering::SeqCst), 0);

    tokio::time::sleep(Duration::from_secs(1)).await;
    // t=3.5s: the re-armed timer has fired.
    assert_eq!(harness.recorder.capture_stops.load(Ordering::SeqCst), 1);

    harness.finish().await;
}

#[tokio::test(start_paused = true)]
async fn stale_timer_fire_is_a_no_op() {
    let classifier = ScriptedClassifier::new(vec![]);
    let harness = Harness::start(classifier, true);

    harness
        .handle
        .speech_event(SpeechEvent::CaptureStarted)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;

    // Generation 0 predates the arm; it must be ignored.
    harness
        .handle
        .inject(EngineEvent::TimerFired {
            kind: TimerKind::Activity,
            generation: 0,
        })
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;

    let (engine, _, _) = harness.finish().await;
    assert_ne!(engine.session_state(), SessionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn max_listening_ceiling_force_stops_capture() {
    let classifier = ScriptedClassifier::new(vec![]);
    let harness = Harness::start(classifier, true);

    harness
        .handle
        .speech_event(SpeechEvent::CaptureStarted)
        .await
        .unwrap();
    // Keep partials flowing so the silence timer never wins.
    for _ in 0..8 {
        harness
            .handle
            .speech_event(SpeechEvent::PartialResult("아메리카노".to_owned()))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(1_500)).await;
    }

    let (_, recorder, _) = harness.finish().await;
    assert!(recorder.capture_stops.load(Ordering::SeqCst) >= 1);
    assert_eq!(recorder.spoken_count("오랫동안 음성 입력이 없어"), 1);
}

#[tokio::test(start_paused = true)]
async fn quick_command_pre_empts_live_capture() {
    let classifier = ScriptedClassifier::new(vec![
        r#"{"action": "complete", "response": "결제를 진행합니다."}"#,
    ]);
    let harness = Harness::start(classifier, true);

    harness
        .handle
        .speech_event(SpeechEvent::CaptureStarted)
        .await
        .unwrap();
    harness.handle.quick_command("결제하기").await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;

    let (_, recorder, _) = harness.finish().await;
    assert_eq!(recorder.capture_stops.load(Ordering::SeqCst), 1);
    assert_eq!(recorder.spoken_count("장바구니가 비어 있습니다"), 1);
}

#[tokio::test(start_paused = true)]
async fn unknown_menu_item_apologizes_and_leaves_cart_alone() {
    let classifier =
        ScriptedClassifier::new(vec![&order_reply(&[("딸기스무디", 1)], true)]);
    let harness = Harness::start(classifier, true);

    harness.utter("딸기스무디 주세요").await;

    let (engine, recorder, _) = harness.finish().await;
    assert!(engine.cart_lines().is_empty());
    assert_eq!(recorder.spoken_count("찾을 수 없습니다"), 1);
}
