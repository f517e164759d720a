//! Normalized NLU result schema.
//!
//! The sole contract between the NLU gateway and the session state machine.
//! Whatever the remote classifier returns is treated as untyped data and
//! coerced field by field into [`NluResult`] with deterministic defaults;
//! the state machine never sees a malformed result.

pub mod gateway;
pub mod prompt;

use crate::menu::{Size, Temperature};
use crate::nlu::prompt::Season;
use serde::{Deserialize, Serialize};

/// Coarse action decided by the classifier for one utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Order,
    Confirm,
    Cancel,
    Modify,
    Complete,
    Navigate,
    Recommend,
    Clarify,
    Error,
}

/// Scope of a `cancel` action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CancelTarget {
    /// Remove the most recently added cart line.
    Last,
    /// Clear the entire cart.
    All,
}

/// A parsed order item. Produced by the gateway, handed to the cart;
/// never persisted by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub name: String,
    pub quantity: u32,
    pub size: Size,
    pub temperature: Temperature,
    pub options: Vec<String>,
    /// Unit price in won as claimed by the classifier; the dispatcher
    /// re-prices against the menu before the item reaches the cart.
    pub price: u32,
}

impl OrderItem {
    /// Human-readable one-line summary, used for pending-order prompts.
    pub fn summary(&self) -> String {
        let temp = match self.temperature {
            Temperature::Hot => "따뜻한",
            Temperature::Iced => "아이스",
        };
        let size = match self.size {
            Size::Small => " 스몰",
            Size::Medium => "",
            Size::Large => " 라지",
        };
        format!("{temp}{size} {} {}잔", self.name, self.quantity)
    }
}

/// Normalized classification result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NluResult {
    pub success: bool,
    pub action: Action,
    pub items: Vec<OrderItem>,
    pub total_price: u32,
    /// Spoken reply for the user.
    pub response: String,
    /// When true, an `order` commits without per-item confirmation.
    pub auto_confirm: bool,
    pub target: Option<CancelTarget>,
    pub screen: Option<String>,
    pub suggestions: Vec<String>,
}

impl NluResult {
    /// Minimal well-formed result carrying only an action and a spoken reply.
    pub fn minimal(action: Action, response: impl Into<String>) -> Self {
        Self {
            success: !matches!(action, Action::Clarify | Action::Error),
            action,
            items: Vec::new(),
            total_price: 0,
            response: response.into(),
            auto_confirm: false,
            target: None,
            screen: None,
            suggestions: Vec::new(),
        }
    }
}

/// Extract a JSON object from a free-form model reply.
///
/// Tolerates ```json fences, bare fences, and surrounding prose; falls back
/// to the outermost brace pair.
pub fn extract_json(text: &str) -> Option<serde_json::Value> {
    let candidate = fenced_block(text, "```json")
        .or_else(|| fenced_block(text, "```"))
        .or_else(|| outer_braces(text))?;
    serde_json::from_str(candidate.trim()).ok()
}

fn fenced_block<'a>(text: &'a str, fence: &str) -> Option<&'a str> {
    let start = text.find(fence)? + fence.len();
    let rest = &text[start..];
    let end = rest.find("```")?;
    Some(&rest[..end])
}

fn outer_braces(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Coerce untyped classifier output into a well-formed [`NluResult`].
///
/// Missing fields get deterministic defaults; the seasonal default
/// temperature is iced in summer and hot otherwise. A missing `action`
/// defaults to `order`; an unrecognised one becomes `clarify`.
pub fn normalize(value: &serde_json::Value, season: Season) -> NluResult {
    let action = match value.get("action") {
        None | Some(serde_json::Value::Null) => Action::Order,
        Some(v) => serde_json::from_value(v.clone()).unwrap_or(Action::Clarify),
    };

    let default_temp = if season == Season::Summer {
        Temperature::Iced
    } else {
        Temperature::Hot
    };

    let items = value
        .get("items")
        .and_then(serde_json::Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| normalize_item(item, default_temp))
                .collect()
        })
        .unwrap_or_default();

    NluResult {
        success: value.get("success").and_then(serde_json::Value::as_bool) != Some(false),
        action,
        items,
        total_price: coerce_u32(value.get("totalPrice")).unwrap_or(0),
        response: value
            .get("response")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("처리했습니다.")
            .to_owned(),
        auto_confirm: value.get("autoConfirm").and_then(serde_json::Value::as_bool)
            == Some(true),
        target: value
            .get("target")
            .and_then(|v| serde_json::from_value(v.clone()).ok()),
        screen: value
            .get("screen")
            .and_then(serde_json::Value::as_str)
            .map(str::to_owned),
        suggestions: value
            .get("suggestions")
            .and_then(serde_json::Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(|v| v.as_str().map(str::to_owned))
                    .collect()
            })
            .unwrap_or_default(),
    }
}

/// Quantities beyond this are classifier hallucinations, not orders.
const MAX_ITEM_QUANTITY: u32 = 99;

fn normalize_item(value: &serde_json::Value, default_temp: Temperature) -> OrderItem {
    OrderItem {
        name: value
            .get("name")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_owned(),
        quantity: coerce_u32(value.get("quantity"))
            .filter(|q| *q >= 1)
            .unwrap_or(1)
            .min(MAX_ITEM_QUANTITY),
        size: value
            .get("size")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default(),
        temperature: value
            .get("temperature")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or(default_temp),
        options: value
            .get("options")
            .and_then(serde_json::Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(|v| v.as_str().map(str::to_owned))
                    .collect()
            })
            .unwrap_or_default(),
        price: coerce_u32(value.get("price")).unwrap_or(0),
    }
}

/// Accept numbers that arrive as JSON numbers or numeric strings.
fn coerce_u32(value: Option<&serde_json::Value>) -> Option<u32> {
    match value? {
        serde_json::Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
