//! Ticket polling.
//!
//! Long-running backend work answers with a ticket id; [`poll`] queries its
//! status at a fixed interval until it completes, fails, or the attempt budget
//! (and optional wall-clock deadline) runs out.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio::time::Instant;

use crate::error::{ApiError, GENERIC_FAILURE, PollError};

/// Handle to queued backend work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollTicket {
    #[serde(rename = "ticket_id", alias = "ticketId")]
    pub ticket_id: String,
}

impl PollTicket {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            ticket_id: id.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketState {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TicketState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TicketState::Completed | TicketState::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketStatus {
    pub status: TicketState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[async_trait]
pub trait TicketSource: Send + Sync {
    async fn ticket_status(&self, ticket_id: &str) -> Result<TicketStatus, ApiError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    pub max_attempts: u32,
    pub delay: Duration,
    pub deadline: Option<Duration>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            max_attempts: 60,
            delay: Duration::from_secs(1),
            deadline: None,
        }
    }
}

/// Progress of one poll, reported to observers.
#[derive(Debug, Clone, PartialEq)]
pub enum PollState {
    Pending { attempt: u32 },
    Completed,
    Failed(String),
    TimedOut,
}

/// Wait for `ticket` to finish and return its result.
pub async fn poll<S: TicketSource + ?Sized>(
    source: &S,
    ticket: &PollTicket,
    options: PollOptions,
) -> Result<JsonValue, PollError> {
    poll_with_progress(source, ticket, options, |_| {}).await
}

/// Like [`poll`], reporting each state transition to `on_state`.
pub async fn poll_with_progress<S: TicketSource + ?Sized>(
    source: &S,
    ticket: &PollTicket,
    options: PollOptions,
    mut on_state: impl FnMut(&PollState) + Send,
) -> Result<JsonValue, PollError> {
    let started = Instant::now();
    let id = ticket.ticket_id.as_str();
    tracing::debug!(
        "polling ticket {} (max_attempts={}, delay={:?}, deadline={:?})",
        id,
        options.max_attempts,
        options.delay,
        options.deadline
    );
    let mut attempts = 0;
    while attempts < options.max_attempts {
        tokio::time::sleep(options.delay).await;
        if let Some(deadline) = options.deadline
            && started.elapsed() >= deadline
        {
            break;
        }
        attempts += 1;
        let status = match source.ticket_status(id).await {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("ticket {} status query failed: {}", id, e);
                return Err(PollError::Transport(e));
            }
        };
        match status.status {
            TicketState::Completed => {
                tracing::info!("ticket {} completed after {} attempt(s)", id, attempts);
                on_state(&PollState::Completed);
                return Ok(status.result.unwrap_or(JsonValue::Null));
            }
            TicketState::Failed => {
                let message = status
                    .error
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| GENERIC_FAILURE.to_string());
                tracing::warn!("ticket {} failed: {}", id, message);
                on_state(&PollState::Failed(message.clone()));
                return Err(PollError::Failed(message));
            }
            TicketState::Pending | TicketState::Processing => {
                tracing::trace!("ticket {} still {:?} (attempt {})", id, status.status, attempts);
                on_state(&PollState::Pending { attempt: attempts });
            }
        }
    }
    tracing::warn!("ticket {} timed out after {} attempt(s)", id, attempts);
    on_state(&PollState::TimedOut);
    Err(PollError::TimedOut {
        ticket_id: id.to_string(),
        attempts,
    })
}
