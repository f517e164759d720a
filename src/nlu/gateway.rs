//! Gateway to the remote intent classifier.
//!
//! Formats a prompt from the utterance, bounded history and session context,
//! calls the remote classifier with a fixed timeout, and normalizes whatever
//! comes back. Every failure is absorbed here and converted into a
//! well-formed, speakable [`NluResult`] via the keyword fallback; the
//! gateway never fails past its own boundary.

use crate::config::ClassifierConfig;
use crate::error::{KioskError, Result};
use crate::intent::{QuickIntent, detect_intent};
use crate::menu::Menu;
use crate::nlu::prompt::{TimeContext, build_prompt};
use crate::nlu::{Action, CancelTarget, NluResult, extract_json, normalize};
use crate::session::{ContextSnapshot, SessionState, Turn};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Failure classes surfaced by a remote classifier attempt.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClassifierFailure {
    #[error("request timed out")]
    Timeout,
    #[error("rate limited")]
    RateLimited,
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("transport error: {0}")]
    Transport(String),
}

/// Remote text-in/text-out classifier backend.
#[async_trait]
pub trait RemoteClassifier: Send + Sync {
    /// Send the prompt and return the model's raw text reply.
    async fn generate(&self, prompt: &str) -> std::result::Result<String, ClassifierFailure>;
}

/// HTTP classifier speaking the generateContent JSON shape.
pub struct HttpClassifier {
    client: reqwest::Client,
    url: String,
    temperature: f32,
    max_output_tokens: u32,
}

impl HttpClassifier {
    /// Build a classifier client from config, resolving the API key.
    ///
    /// # Errors
    ///
    /// Returns a config error if the key cannot be resolved or the HTTP
    /// client cannot be constructed.
    pub fn new(config: &ClassifierConfig) -> Result<Self> {
        let key = config.api_key.resolve()?.unwrap_or_default();
        let base = config.api_url.trim_end_matches('/');
        let mut url = format!("{base}/{}:generateContent", config.api_model);
        if !key.is_empty() {
            url.push_str(&format!("?key={key}"));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| KioskError::Config(format!("classifier client: {e}")))?;

        Ok(Self {
            client,
            url,
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        })
    }
}

#[async_trait]
impl RemoteClassifier for HttpClassifier {
    async fn generate(&self, prompt: &str) -> std::result::Result<String, ClassifierFailure> {
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": self.temperature,
                "topK": 40,
                "topP": 0.95,
                "maxOutputTokens": self.max_output_tokens,
            },
        });

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClassifierFailure::Timeout
                } else {
                    ClassifierFailure::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ClassifierFailure::RateLimited);
        }
        if !status.is_success() {
            return Err(ClassifierFailure::Transport(format!(
                "classifier returned {status}"
            )));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ClassifierFailure::Malformed(e.to_string()))?;

        value["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| {
                ClassifierFailure::Malformed("missing candidates[0].content.parts[0].text".into())
            })
    }
}

/// The NLU gateway. Cheap to clone via inner `Arc`s.
#[derive(Clone)]
pub struct NluGateway {
    remote: Arc<dyn RemoteClassifier>,
    menu: Arc<Menu>,
}

impl NluGateway {
    pub fn new(remote: Arc<dyn RemoteClassifier>, menu: Arc<Menu>) -> Self {
        Self { remote, menu }
    }

    /// Classify one utterance. Infallible by contract: failures fall back to
    /// the keyword classifier's minimal results.
    pub async fn classify(
        &self,
        utterance: &str,
        history: &[Turn],
        snapshot: &ContextSnapshot,
    ) -> NluResult {
        self.classify_at(utterance, history, snapshot, &TimeContext::now())
            .await
    }

    /// Same as [`classify`](Self::classify) with a pinned moment in time.
    pub async fn classify_at(
        &self,
        utterance: &str,
        history: &[Turn],
        snapshot: &ContextSnapshot,
        time: &TimeContext,
    ) -> NluResult {
        let quick_intent = detect_intent(utterance);
        let prompt = build_prompt(&self.menu, time, snapshot, history, utterance, quick_intent);

        info!(
            utterance,
            quick_intent = quick_intent.map(|i| i.to_string()),
            state = ?snapshot.session_state,
            pending = snapshot.pending_summaries.len(),
            "classifying utterance"
        );

        let mut result = match self.remote.generate(&prompt).await {
            Ok(reply) => match extract_json(&reply) {
                Some(value) => normalize(&value, time.season()),
                None => {
                    warn!("no JSON payload in classifier reply");
                    fallback_result(quick_intent)
                }
            },
            Err(failure) => {
                warn!(%failure, "classifier call failed, using keyword fallback");
                fallback_result(quick_intent)
            }
        };

        // Continuous mode always fast-paths repeat orders.
        if snapshot.session_state == SessionState::Continuous && result.action == Action::Order {
            result.auto_confirm = true;
        }

        result
    }
}

/// Minimal well-formed result for a detected quick intent, or a clarify
/// request when nothing was detected.
fn fallback_result(quick_intent: Option<QuickIntent>) -> NluResult {
    match quick_intent {
        Some(QuickIntent::Confirm) => NluResult::minimal(Action::Confirm, "네, 확인했습니다."),
        Some(QuickIntent::Cancel) => {
            let mut result = NluResult::minimal(Action::Cancel, "취소하겠습니다.");
            result.target = Some(CancelTarget::Last);
            result
        }
        Some(QuickIntent::Complete) => {
            NluResult::minimal(Action::Complete, "주문을 완료하겠습니다.")
        }
        Some(QuickIntent::Modify) => NluResult::minimal(Action::Modify, "변경을 도와드리겠습니다."),
        Some(QuickIntent::Recommend) => {
            NluResult::minimal(Action::Recommend, "추천 메뉴를 안내해 드릴게요.")
        }
        Some(QuickIntent::Navigate) => NluResult::minimal(Action::Navigate, "화면을 이동합니다."),
        Some(QuickIntent::More) | None => {
            NluResult::minimal(Action::Clarify, "다시 한번 말씀해 주세요.")
        }
    }
}
