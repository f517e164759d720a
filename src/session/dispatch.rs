//! Pure dispatch of normalized NLU results onto the session.
//!
//! `dispatch` mutates only the [`Session`] and returns the side effects for
//! the engine shell to execute (speech, cart mutation, navigation, order
//! submission). Nothing here performs I/O, which keeps the whole action
//! table unit-testable without mocks.

use crate::menu::Menu;
use crate::nlu::{Action, CancelTarget, NluResult, OrderItem};
use crate::nlu::prompt::TimeContext;
use crate::recommend::{recommendations, spoken_summary};
use crate::session::{PendingOrder, Session, SessionState};

/// A side-effect command produced by dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Speak the text (in addition to the already-spoken result response).
    Speak(String),
    /// Add a menu-validated item to the cart at the given unit price.
    AddToCart { item: OrderItem, unit_price: u32 },
    /// Remove the most recently added cart line.
    RemoveLastCartLine,
    /// Clear the entire cart.
    ClearCart,
    /// Direct the UI to a named screen.
    Navigate {
        screen: String,
        params: Option<serde_json::Value>,
    },
    /// Finalize: submit the cart to the order backend.
    SubmitOrder,
    /// Re-open capture after the configured clarify delay.
    ReopenCapture,
}

fn announce(pending: &PendingOrder) -> Effect {
    Effect::Speak(format!("다음 주문은 {} 맞으세요?", pending.summary))
}

fn not_found(name: &str) -> Effect {
    Effect::Speak(format!("{name}을(를) 찾을 수 없습니다."))
}

/// Price an item against the menu, producing the cart effect, or a spoken
/// apology when the item does not exist. The cart is left untouched on a
/// miss.
fn add_validated(menu: &Menu, item: &OrderItem) -> Effect {
    match menu.find(&item.name) {
        Some(entry) => Effect::AddToCart {
            unit_price: menu.unit_price(entry, item.size, &item.options),
            item: item.clone(),
        },
        None => not_found(&item.name),
    }
}

/// Apply one normalized result to the session, returning the effects to run.
///
/// The result's `response` has already been spoken by the caller; effects
/// only add supplementary speech (pending announcements, apologies).
pub fn dispatch(
    session: &mut Session,
    result: &NluResult,
    menu: &Menu,
    time: &TimeContext,
) -> Vec<Effect> {
    let mut effects = Vec::new();

    match result.action {
        Action::Order => {
            let mut items = result.items.iter();
            match items.next() {
                None => effects.push(Effect::Speak("주문할 메뉴를 찾을 수 없습니다.".to_owned())),
                Some(first) => {
                    effects.push(add_validated(menu, first));
                    for rest in items {
                        session.enqueue_pending(rest.clone());
                    }
                    if result.auto_confirm {
                        session.state = SessionState::Continuous;
                    } else {
                        session.state = SessionState::WaitingConfirm;
                        if let Some(next) = session.peek_pending() {
                            effects.push(announce(next));
                        }
                    }
                }
            }
        }

        Action::Confirm => match session.pop_pending() {
            Some(pending) => {
                effects.push(add_validated(menu, &pending.item));
                session.state = if session.pending_len() > 0 {
                    SessionState::WaitingConfirm
                } else {
                    SessionState::Continuous
                };
                if let Some(next) = session.peek_pending() {
                    effects.push(announce(next));
                }
            }
            // Empty queue: treat as a no-op acknowledgment.
            None => session.state = SessionState::Continuous,
        },

        Action::Cancel => match result.target.unwrap_or(CancelTarget::Last) {
            CancelTarget::Last => effects.push(Effect::RemoveLastCartLine),
            CancelTarget::All => effects.push(Effect::ClearCart),
        },

        // Cart edits go through cancel + a fresh order; the spoken response
        // carries the guidance.
        Action::Modify => {}

        Action::Complete => effects.push(Effect::SubmitOrder),

        Action::Navigate => {
            if let Some(screen) = &result.screen {
                if screen == "Cart" {
                    session.state = SessionState::ReviewingOrder;
                }
                effects.push(Effect::Navigate {
                    screen: screen.clone(),
                    params: None,
                });
            }
        }

        Action::Recommend => {
            let recs = recommendations(time);
            effects.push(Effect::Speak(spoken_summary(&recs)));
            effects.push(Effect::Navigate {
                screen: "Recommendations".to_owned(),
                params: serde_json::to_value(&recs).ok().map(|recs| {
                    serde_json::json!({ "recommendations": recs })
                }),
            });
        }

        Action::Clarify => effects.push(Effect::ReopenCapture),

        // The spoken response already communicates the failure.
        Action::Error => {}
    }

    // The pending queue is never silently abandoned: whatever the action
    // did, a non-empty queue ends up announced and waiting for confirmation.
    if session.pending_len() > 0 && session.state != SessionState::WaitingConfirm {
        session.state = SessionState::WaitingConfirm;
        if let Some(next) = session.peek_pending() {
            effects.push(announce(next));
        }
    }

    effects
}
