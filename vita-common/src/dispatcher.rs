//! Consumer-side dispatch of inbound envelopes
//!
//! Routes each received envelope to the handler registered for its event
//! name. Acknowledgement is manual: ack only after the handler returns
//! without error, nack (park, no requeue) on handler failure or a malformed
//! body. Unknown event names are acked — they are contract drift, not
//! transient failures, and requeueing them would loop forever.
//!
//! No per-message retry or backoff lives here; redelivery comes from the
//! channel's lease expiry, and anything beyond that is the publisher's
//! concern.

use crate::channel::{ChannelDirection, LeasedMessage, MessageChannel};
use crate::envelope::EventEnvelope;
use crate::error::Result;
use crate::events::{ActivityBus, AgentActivity};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Handler for one event name
///
/// Delivery is at-least-once: implementations MUST be idempotent, keyed by
/// [`EventEnvelope::dedup_key`] (upsert, not blind insert).
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Apply the envelope's effect
    ///
    /// # Errors
    /// An error parks the message as dead (no requeue) and is logged with
    /// the full envelope for manual inspection.
    async fn handle(&self, envelope: &EventEnvelope) -> Result<()>;
}

/// Outcome of dispatching one message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Handler succeeded; message acked
    Handled,
    /// No handler registered for the event name; message acked
    UnknownAcked,
    /// Malformed body or handler failure; message parked
    Rejected,
}

/// Routes inbound envelopes to registered handlers
pub struct ConsumerDispatcher {
    direction: ChannelDirection,
    handlers: HashMap<String, Arc<dyn EventHandler>>,
    lease: Duration,
    poll_interval: Duration,
    reconnect_backoff: Duration,
    activity: Option<ActivityBus>,
}

impl ConsumerDispatcher {
    /// Create a dispatcher consuming the given direction
    pub fn new(direction: ChannelDirection) -> Self {
        Self {
            direction,
            handlers: HashMap::new(),
            lease: Duration::from_secs(30),
            poll_interval: Duration::from_millis(500),
            reconnect_backoff: Duration::from_secs(5),
            activity: None,
        }
    }

    /// Register the handler for an event name (last registration wins)
    pub fn register(&mut self, event_name: impl Into<String>, handler: Arc<dyn EventHandler>) {
        let event_name = event_name.into();
        debug!(event = %event_name, queue = self.direction.queue_name(), "Handler registered");
        self.handlers.insert(event_name, handler);
    }

    /// Emit receive/reject activities to this bus
    pub fn with_activity_bus(mut self, bus: ActivityBus) -> Self {
        self.activity = Some(bus);
        self
    }

    /// Override the per-message lease duration
    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    /// Override the idle poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Consume the queue until the process exits
    ///
    /// Blocks the calling task. An unreachable store is logged and retried
    /// on a fixed backoff; messages published while the store was down are
    /// delivered once it recovers.
    pub async fn run(&self, channel: MessageChannel) {
        info!(
            queue = self.direction.queue_name(),
            handlers = self.handlers.len(),
            "Consumer dispatcher started"
        );

        loop {
            match channel.lease_next(self.direction, self.lease).await {
                Ok(Some(msg)) => {
                    self.dispatch_one(&channel, msg).await;
                }
                Ok(None) => {
                    tokio::time::sleep(self.poll_interval).await;
                }
                Err(e) => {
                    warn!(
                        queue = self.direction.queue_name(),
                        error = %e,
                        "Message store unreachable, backing off"
                    );
                    tokio::time::sleep(self.reconnect_backoff).await;
                }
            }
        }
    }

    /// Dispatch every ready message, returning when the queue is empty
    pub async fn drain(&self, channel: &MessageChannel) -> Result<usize> {
        let mut processed = 0;
        while let Some(msg) = channel.lease_next(self.direction, self.lease).await? {
            self.dispatch_one(channel, msg).await;
            processed += 1;
        }
        Ok(processed)
    }

    /// Parse, route, and settle one leased message
    async fn dispatch_one(&self, channel: &MessageChannel, msg: LeasedMessage) -> DispatchOutcome {
        let envelope: EventEnvelope = match serde_json::from_str(&msg.body) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(
                    id = msg.id,
                    queue = self.direction.queue_name(),
                    error = %e,
                    "Malformed envelope, parking message"
                );
                self.emit_rejected(None, format!("malformed envelope: {e}"));
                self.settle_nack(channel, msg.id).await;
                return DispatchOutcome::Rejected;
            }
        };

        let Some(handler) = self.handlers.get(&envelope.event_name) else {
            warn!(
                event = %envelope.event_name,
                user_id = %envelope.user_id,
                "No handler registered, acking unknown event"
            );
            self.settle_ack(channel, msg.id).await;
            return DispatchOutcome::UnknownAcked;
        };

        match handler.handle(&envelope).await {
            Ok(()) => {
                debug!(
                    event = %envelope.event_name,
                    user_id = %envelope.user_id,
                    attempts = msg.attempts,
                    "Envelope handled"
                );
                self.settle_ack(channel, msg.id).await;
                if let Some(bus) = &self.activity {
                    bus.emit_lossy(AgentActivity::EnvelopeReceived {
                        event_name: envelope.event_name.clone(),
                        user_id: envelope.user_id.clone(),
                        queue: self.direction.queue_name().to_string(),
                        timestamp: chrono::Utc::now(),
                    });
                }
                DispatchOutcome::Handled
            }
            Err(e) => {
                // Full envelope logged for manual inspection of parked messages
                error!(
                    event = %envelope.event_name,
                    user_id = %envelope.user_id,
                    error = %e,
                    envelope = %msg.body,
                    "Handler failed, parking message"
                );
                self.emit_rejected(Some(envelope.event_name.clone()), e.to_string());
                self.settle_nack(channel, msg.id).await;
                DispatchOutcome::Rejected
            }
        }
    }

    async fn settle_ack(&self, channel: &MessageChannel, id: i64) {
        if let Err(e) = channel.ack(id).await {
            warn!(id, error = %e, "Ack failed; message will be redelivered");
        }
    }

    async fn settle_nack(&self, channel: &MessageChannel, id: i64) {
        if let Err(e) = channel.nack(id).await {
            warn!(id, error = %e, "Nack failed; message will be redelivered");
        }
    }

    fn emit_rejected(&self, event_name: Option<String>, error: String) {
        if let Some(bus) = &self.activity {
            bus.emit_lossy(AgentActivity::EnvelopeRejected {
                event_name,
                error,
                timestamp: chrono::Utc::now(),
            });
        }
    }
}
