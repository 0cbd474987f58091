//! Append-only conversation log.
//!
//! [`MessageSink`] is the only write path the runner uses.  [`MessageLog`]
//! is the in-memory implementation: an order-preserving vector plus a
//! broadcast channel so a host can render messages as they arrive.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, broadcast};
use tracing::debug;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Who a message is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    System,
    Assistant,
    User,
}

/// A single conversation message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier (UUID v7).
    pub id: Uuid,
    pub text: String,
    pub sender: Sender,
    /// Display tag of the agent that produced an assistant message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn new(sender: Sender, text: impl Into<String>, agent: Option<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            text: text.into(),
            sender,
            agent,
            timestamp: Utc::now(),
        }
    }

    /// A message from the simulated backend.
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Sender::System, text, None)
    }

    /// An assistant message tagged with the producing agent.
    pub fn assistant(text: impl Into<String>, agent: impl Into<String>) -> Self {
        Self::new(Sender::Assistant, text, Some(agent.into()))
    }

    /// A message typed by the user.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Sender::User, text, None)
    }
}

// ---------------------------------------------------------------------------
// MessageSink
// ---------------------------------------------------------------------------

/// Append-only, order-preserving destination for conversation messages.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Append `message` after every previously appended message.
    async fn append_message(&self, message: Message) -> StoreResult<()>;
}

// ---------------------------------------------------------------------------
// MessageLog
// ---------------------------------------------------------------------------

/// In-memory [`MessageSink`].
///
/// Cheaply cloneable; clones share the same log.
#[derive(Clone)]
pub struct MessageLog {
    inner: Arc<LogInner>,
}

struct LogInner {
    messages: RwLock<Vec<Message>>,
    updates: broadcast::Sender<Message>,
    /// Appends beyond this many messages are rejected.
    capacity: AtomicUsize,
    closed: AtomicBool,
}

impl MessageLog {
    /// Create an empty log.
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(LogInner {
                messages: RwLock::new(Vec::new()),
                updates,
                capacity: AtomicUsize::new(usize::MAX),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Reject every append once the log holds `count` messages.
    ///
    /// Used to exercise append-failure handling.
    pub fn fail_after(&self, count: usize) {
        self.inner.capacity.store(count, Ordering::Release);
    }

    /// Stop accepting appends.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
    }

    /// Receive every message appended from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.inner.updates.subscribe()
    }

    /// Copy of all messages in append order.
    pub async fn snapshot(&self) -> Vec<Message> {
        self.inner.messages.read().await.clone()
    }

    /// Message texts in append order.
    pub async fn texts(&self) -> Vec<String> {
        self.inner
            .messages
            .read()
            .await
            .iter()
            .map(|m| m.text.clone())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.messages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.messages.read().await.is_empty()
    }
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageSink for MessageLog {
    async fn append_message(&self, message: Message) -> StoreResult<()> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }

        let mut messages = self.inner.messages.write().await;
        if messages.len() >= self.inner.capacity.load(Ordering::Acquire) {
            return Err(StoreError::AppendRejected {
                reason: format!("log is limited to {} messages", messages.len()),
            });
        }

        debug!(message_id = %message.id, sender = ?message.sender, "message appended");
        // No subscribers is fine; the log itself is the source of truth.
        let _ = self.inner.updates.send(message.clone());
        messages.push(message);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
