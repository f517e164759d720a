//! Order submission contract and the HTTP backend client.
//!
//! Invoked only on the `complete` action. A failed submission is spoken to
//! the user and the session stays alive so a retry remains possible.

use crate::cart::CartLine;
use crate::config::OrderBackendConfig;
use crate::error::{KioskError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// Snapshot of a cart handed to the backend.
#[derive(Debug, Clone, Serialize)]
pub struct OrderTicket {
    pub session_id: Uuid,
    pub items: Vec<CartLine>,
    pub total_price: u32,
}

/// Backend acknowledgment of a submitted order.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderReceipt {
    pub order_number: String,
}

/// Order submission collaborator.
#[async_trait]
pub trait OrderSubmitter: Send + Sync {
    /// Submit the ticket, returning the assigned order number.
    ///
    /// # Errors
    ///
    /// Returns [`KioskError::OrderSubmission`] or [`KioskError::Transport`]
    /// when the backend refuses or cannot be reached.
    async fn submit(&self, ticket: &OrderTicket) -> Result<OrderReceipt>;
}

/// REST backend client: `POST {base}/orders`.
pub struct HttpOrderSubmitter {
    client: reqwest::Client,
    base_url: String,
}

impl HttpOrderSubmitter {
    /// Build a client from config.
    ///
    /// # Errors
    ///
    /// Returns a config error if the HTTP client cannot be constructed.
    pub fn new(config: &OrderBackendConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| KioskError::Config(format!("order client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct OrderResponseBody {
    data: OrderReceiptBody,
}

#[derive(Debug, Deserialize)]
struct OrderReceiptBody {
    #[serde(rename = "orderNumber")]
    order_number: String,
}

#[async_trait]
impl OrderSubmitter for HttpOrderSubmitter {
    async fn submit(&self, ticket: &OrderTicket) -> Result<OrderReceipt> {
        let url = format!("{}/orders", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(ticket)
            .send()
            .await
            .map_err(|e| KioskError::Transport(format!("order submit: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(KioskError::OrderSubmission(format!(
                "backend returned {status}"
            )));
        }

        let body: OrderResponseBody = response
            .json()
            .await
            .map_err(|e| KioskError::OrderSubmission(format!("invalid receipt: {e}")))?;

        info!(order_number = body.data.order_number.as_str(), "order submitted");
        Ok(OrderReceipt {
            order_number: body.data.order_number,
        })
    }
}
