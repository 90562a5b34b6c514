//! In-process activity bus
//!
//! Local observability events for one agent: envelope publishes, receipts,
//! rejections, and completed analyses. Streamed to connected UIs over SSE.
//! Distinct from the cross-agent message channel: activities never leave the
//! process and are lossy by design.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Agent activity, serializable for SSE transmission
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AgentActivity {
    /// Envelope durably published to the outbound queue
    EnvelopePublished {
        /// Event name from the agent vocabulary
        event_name: String,
        /// User the event concerns
        user_id: String,
        /// Outbound queue name
        queue: String,
        /// When the publish completed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Publish failed; agent continues in degraded mode
    PublishFailed {
        /// Event name that failed to publish
        event_name: String,
        /// User the event concerns
        user_id: String,
        /// When the failure occurred
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Inbound envelope handled and acknowledged
    EnvelopeReceived {
        /// Event name of the handled envelope
        event_name: String,
        /// User the event concerns
        user_id: String,
        /// Queue the envelope arrived on
        queue: String,
        /// When handling completed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Inbound envelope rejected (handler failure or malformed body)
    EnvelopeRejected {
        /// Event name if it could be parsed
        event_name: Option<String>,
        /// Rejection reason
        error: String,
        /// When the rejection occurred
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A meal analysis finished (diet agent)
    AnalysisCompleted {
        /// Analysis request id
        analysis_id: Uuid,
        /// User the analysis belongs to
        user_id: String,
        /// Number of resolved food items
        item_count: usize,
        /// Total calories across resolved items
        total_calories: f64,
        /// When the analysis completed
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl AgentActivity {
    /// Get activity type as string for SSE event naming
    pub fn activity_type(&self) -> &'static str {
        match self {
            AgentActivity::EnvelopePublished { .. } => "EnvelopePublished",
            AgentActivity::PublishFailed { .. } => "PublishFailed",
            AgentActivity::EnvelopeReceived { .. } => "EnvelopeReceived",
            AgentActivity::EnvelopeRejected { .. } => "EnvelopeRejected",
            AgentActivity::AnalysisCompleted { .. } => "AnalysisCompleted",
        }
    }
}

/// Activity distribution bus for one agent process
///
/// Uses tokio::broadcast internally: non-blocking emit, multiple concurrent
/// subscribers, automatic cleanup when subscribers drop, lag detection for
/// slow subscribers.
#[derive(Clone)]
pub struct ActivityBus {
    tx: broadcast::Sender<AgentActivity>,
    capacity: usize,
}

impl ActivityBus {
    /// Create a new bus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future activities
    ///
    /// Activities emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<AgentActivity> {
        self.tx.subscribe()
    }

    /// Emit an activity, ignoring whether anyone is listening
    ///
    /// Activities are observability data; a process with no SSE clients
    /// simply drops them.
    pub fn emit_lossy(&self, activity: AgentActivity) {
        let _ = self.tx.send(activity);
    }

    /// Current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bus_new() {
        let bus = ActivityBus::new(100);
        assert_eq!(bus.capacity(), 100);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_emit_and_receive() {
        let bus = ActivityBus::new(10);
        let mut rx = bus.subscribe();

        bus.emit_lossy(AgentActivity::EnvelopePublished {
            event_name: "meal_logged".to_string(),
            user_id: "user-1".to_string(),
            queue: "diet_to_fitness".to_string(),
            timestamp: chrono::Utc::now(),
        });

        let received = rx.try_recv().expect("should receive activity");
        assert_eq!(received.activity_type(), "EnvelopePublished");
    }

    #[test]
    fn test_multiple_subscribers_receive_same_activity() {
        let bus = ActivityBus::new(10);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.emit_lossy(AgentActivity::PublishFailed {
            event_name: "bmi_calculated".to_string(),
            user_id: "user-2".to_string(),
            timestamp: chrono::Utc::now(),
        });

        assert_eq!(rx1.try_recv().unwrap().activity_type(), "PublishFailed");
        assert_eq!(rx2.try_recv().unwrap().activity_type(), "PublishFailed");
    }

    #[test]
    fn test_emit_lossy_without_subscribers_does_not_panic() {
        let bus = ActivityBus::new(2);
        for _ in 0..10 {
            bus.emit_lossy(AgentActivity::EnvelopeRejected {
                event_name: None,
                error: "malformed body".to_string(),
                timestamp: chrono::Utc::now(),
            });
        }
        assert_eq!(bus.capacity(), 2);
    }

    #[test]
    fn test_activity_serializes_with_type_tag() {
        let activity = AgentActivity::AnalysisCompleted {
            analysis_id: Uuid::new_v4(),
            user_id: "user-3".to_string(),
            item_count: 2,
            total_calories: 540.0,
            timestamp: chrono::Utc::now(),
        };
        let json = serde_json::to_string(&activity).unwrap();
        assert!(json.contains("\"type\":\"AnalysisCompleted\""));
        assert!(json.contains("\"item_count\":2"));
    }
}
