//! Session data model: one continuous voice-ordering interaction.
//!
//! The session is owned exclusively by the engine; no other component reads
//! or writes its fields directly. Everything observable outside goes through
//! snapshots.

pub mod dispatch;
pub mod engine;

use crate::nlu::OrderItem;
use std::collections::VecDeque;
use uuid::Uuid;

/// Conversational state of a session.
///
/// `Idle` is both the initial and the (re-enterable) terminal state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Idle,
    /// Capture is open, nothing else in flight.
    Listening,
    /// An utterance is being classified.
    Processing,
    /// Orders commit without per-item confirmation.
    Continuous,
    /// A pending order awaits an explicit yes/no.
    WaitingConfirm,
    /// The user is looking at the cart screen.
    ReviewingOrder,
}

/// Speaker of one conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// One conversation history entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// A parsed-but-unconfirmed order item waiting in the FIFO queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOrder {
    pub item: OrderItem,
    /// Human-readable description spoken when the item is announced.
    pub summary: String,
}

impl PendingOrder {
    pub fn new(item: OrderItem) -> Self {
        let summary = item.summary();
        Self { item, summary }
    }
}

/// Read-only context handed to the NLU gateway with each utterance.
#[derive(Debug, Clone, Default)]
pub struct ContextSnapshot {
    pub session_state: SessionState,
    /// Current cart lines (item view only).
    pub cart_items: Vec<OrderItem>,
    /// Cart total in won.
    pub cart_total: u32,
    /// Summaries of queued pending orders, front first.
    pub pending_summaries: Vec<String>,
}

/// One active kiosk interaction.
#[derive(Debug)]
pub struct Session {
    pub id: Uuid,
    pub state: SessionState,
    history: Vec<Turn>,
    pending_orders: VecDeque<PendingOrder>,
    /// Most recent transcribed utterance; cleared after being consumed or
    /// after the display TTL.
    pub last_recognized_text: Option<String>,
    max_history_pairs: usize,
}

impl Session {
    pub fn new(max_history_pairs: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Idle,
            history: Vec::new(),
            pending_orders: VecDeque::new(),
            last_recognized_text: None,
            max_history_pairs,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state != SessionState::Idle
    }

    /// Append one user/assistant pair, dropping the oldest pair when the
    /// bound is exceeded. Pairs are appended atomically so partial pairs are
    /// never observable.
    pub fn push_turn_pair(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        self.history.push(Turn::user(user));
        self.history.push(Turn::assistant(assistant));
        while self.history.len() > self.max_history_pairs * 2 {
            self.history.drain(..2);
        }
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    pub fn enqueue_pending(&mut self, item: OrderItem) {
        self.pending_orders.push_back(PendingOrder::new(item));
    }

    /// Drain strictly from the front.
    pub fn pop_pending(&mut self) -> Option<PendingOrder> {
        self.pending_orders.pop_front()
    }

    pub fn peek_pending(&self) -> Option<&PendingOrder> {
        self.pending_orders.front()
    }

    pub fn pending_len(&self) -> usize {
        self.pending_orders.len()
    }

    pub fn pending_summaries(&self) -> Vec<String> {
        self.pending_orders
            .iter()
            .map(|p| p.summary.clone())
            .collect()
    }

    /// Reset to Idle: history and queue cleared, new id for the next visit.
    pub fn reset(&mut self) {
        self.id = Uuid::new_v4();
        self.state = SessionState::Idle;
        self.history.clear();
        self.pending_orders.clear();
        self.last_recognized_text = None;
    }

    /// Context snapshot for the gateway.
    pub fn snapshot(&self, cart_items: Vec<OrderItem>, cart_total: u32) -> ContextSnapshot {
        ContextSnapshot {
            session_state: self.state,
            cart_items,
            cart_total,
            pending_summaries: self.pending_summaries(),
        }
    }
}
