//! Durable message channel between the diet and fitness agents
//!
//! One named queue per direction (`diet_to_fitness`, `fitness_to_diet`),
//! each with a fixed routing key. Messages are rows in a shared SQLite
//! store, so published envelopes survive process and store restarts.
//!
//! # Delivery guarantees
//! At-least-once, not exactly-once. A message is leased to a consumer and
//! deleted only on explicit ack; a lease that expires (consumer crash)
//! returns the message to `ready` and it is delivered again. Negative ack
//! parks a message as `dead` without requeue, so a poison message cannot
//! loop. Handlers registered on this channel MUST be idempotent.
//!
//! # Degraded mode
//! An unreachable store never crashes the owning agent: `publish` returns
//! `false` (logged) and the agent continues without cross-agent
//! notification. The channel retries the store on later calls, so a
//! recovered store heals publishing without a restart.

use crate::envelope::EventEnvelope;
use crate::error::{Error, Result};
use crate::events::AgentSource;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Queue direction between the two agents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelDirection {
    /// Diet agent publishes, fitness agent consumes
    DietToFitness,
    /// Fitness agent publishes, diet agent consumes
    FitnessToDiet,
}

impl ChannelDirection {
    /// Durable queue name for this direction
    pub fn queue_name(&self) -> &'static str {
        match self {
            ChannelDirection::DietToFitness => "diet_to_fitness",
            ChannelDirection::FitnessToDiet => "fitness_to_diet",
        }
    }

    /// Fixed routing key for this direction
    pub fn routing_key(&self) -> &'static str {
        match self {
            ChannelDirection::DietToFitness => "diet.events",
            ChannelDirection::FitnessToDiet => "fitness.events",
        }
    }

    /// Agent that publishes into this direction
    pub fn publisher(&self) -> AgentSource {
        match self {
            ChannelDirection::DietToFitness => AgentSource::DietAgent,
            ChannelDirection::FitnessToDiet => AgentSource::FitnessAgent,
        }
    }

    /// Outbound direction for a publishing agent
    pub fn for_publisher(source: AgentSource) -> Self {
        match source {
            AgentSource::DietAgent => ChannelDirection::DietToFitness,
            AgentSource::FitnessAgent => ChannelDirection::FitnessToDiet,
        }
    }

    /// Inbound direction for a consuming agent
    pub fn inbound_for(consumer: AgentSource) -> Self {
        match consumer {
            AgentSource::DietAgent => ChannelDirection::FitnessToDiet,
            AgentSource::FitnessAgent => ChannelDirection::DietToFitness,
        }
    }
}

impl std::fmt::Display for ChannelDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.queue_name())
    }
}

/// A message leased to a consumer, pending ack or nack
#[derive(Debug, Clone)]
pub struct LeasedMessage {
    /// Row id; FIFO order within a queue follows this id
    pub id: i64,
    /// Serialized envelope body (JSON)
    pub body: String,
    /// Delivery attempts including this one
    pub attempts: i64,
}

/// Durable publish/consume channel over the shared SQLite store
///
/// Cheap to clone; clones share one lazily-(re)opened pool.
#[derive(Clone)]
pub struct MessageChannel {
    store_path: PathBuf,
    pool: Arc<RwLock<Option<SqlitePool>>>,
}

impl MessageChannel {
    /// Connect to the message store at `path`
    ///
    /// Never fails: if the store is unreachable the channel starts degraded
    /// (publishes return `false`) and retries the store on later calls.
    pub async fn connect(path: impl AsRef<Path>) -> Self {
        let store_path = path.as_ref().to_path_buf();
        let pool = match open_store(&store_path).await {
            Ok(pool) => {
                info!(store = %store_path.display(), "Message channel connected");
                Some(pool)
            }
            Err(e) => {
                warn!(
                    store = %store_path.display(),
                    error = %e,
                    "Message store unreachable, channel starting degraded"
                );
                None
            }
        };
        Self {
            store_path,
            pool: Arc::new(RwLock::new(pool)),
        }
    }

    /// Whether the channel currently holds a live store connection
    pub async fn is_connected(&self) -> bool {
        self.pool.read().await.is_some()
    }

    /// Get the live pool, attempting one reconnect if degraded
    async fn acquire(&self) -> Option<SqlitePool> {
        if let Some(pool) = self.pool.read().await.as_ref() {
            return Some(pool.clone());
        }
        // Degraded: retry the store once per call
        let mut guard = self.pool.write().await;
        if let Some(pool) = guard.as_ref() {
            return Some(pool.clone());
        }
        match open_store(&self.store_path).await {
            Ok(pool) => {
                info!(store = %self.store_path.display(), "Message store recovered");
                *guard = Some(pool.clone());
                Some(pool)
            }
            Err(e) => {
                debug!(error = %e, "Message store still unreachable");
                None
            }
        }
    }

    /// Durably publish an envelope to its outbound queue
    ///
    /// The direction is derived from `envelope.source`. Returns `true` on
    /// durable write, `false` on any failure — never errors. A `false`
    /// return means the owning agent proceeds without cross-agent
    /// notification.
    pub async fn publish(&self, envelope: &EventEnvelope) -> bool {
        let direction = ChannelDirection::for_publisher(envelope.source);
        let body = match serde_json::to_string(envelope) {
            Ok(body) => body,
            Err(e) => {
                warn!(event = %envelope.event_name, error = %e, "Envelope serialization failed");
                return false;
            }
        };

        let Some(pool) = self.acquire().await else {
            warn!(
                event = %envelope.event_name,
                queue = direction.queue_name(),
                "Publish skipped, message store unavailable"
            );
            return false;
        };

        let result = sqlx::query(
            "INSERT INTO channel_messages (queue, routing_key, body, state, published_at) \
             VALUES (?, ?, ?, 'ready', ?)",
        )
        .bind(direction.queue_name())
        .bind(direction.routing_key())
        .bind(&body)
        .bind(envelope.timestamp.to_rfc3339())
        .execute(&pool)
        .await;

        match result {
            Ok(_) => {
                debug!(
                    event = %envelope.event_name,
                    user_id = %envelope.user_id,
                    queue = direction.queue_name(),
                    routing_key = direction.routing_key(),
                    "Envelope published"
                );
                true
            }
            Err(e) => {
                warn!(
                    event = %envelope.event_name,
                    queue = direction.queue_name(),
                    error = %e,
                    "Publish failed"
                );
                false
            }
        }
    }

    /// Lease the oldest ready message on a queue
    ///
    /// Returns expired leases to `ready` first (the at-least-once redelivery
    /// path), then leases the lowest-id ready row for `lease`.
    ///
    /// # Errors
    /// `Error::Channel` when the store is unreachable; the caller backs off
    /// and retries.
    pub async fn lease_next(
        &self,
        direction: ChannelDirection,
        lease: Duration,
    ) -> Result<Option<LeasedMessage>> {
        let pool = self
            .acquire()
            .await
            .ok_or_else(|| Error::Channel("message store unavailable".to_string()))?;

        let now = chrono::Utc::now().timestamp();
        let cutoff = now - lease.as_secs() as i64;

        let requeued = sqlx::query(
            "UPDATE channel_messages SET state = 'ready', leased_at = NULL \
             WHERE queue = ? AND state = 'leased' AND leased_at <= ?",
        )
        .bind(direction.queue_name())
        .bind(cutoff)
        .execute(&pool)
        .await?;
        if requeued.rows_affected() > 0 {
            debug!(
                queue = direction.queue_name(),
                count = requeued.rows_affected(),
                "Returned expired leases to ready (redelivery)"
            );
        }

        let row = sqlx::query_as::<_, (i64, String, i64)>(
            "SELECT id, body, attempts FROM channel_messages \
             WHERE queue = ? AND state = 'ready' ORDER BY id LIMIT 1",
        )
        .bind(direction.queue_name())
        .fetch_optional(&pool)
        .await?;

        let Some((id, body, attempts)) = row else {
            return Ok(None);
        };

        let leased = sqlx::query(
            "UPDATE channel_messages SET state = 'leased', leased_at = ?, attempts = attempts + 1 \
             WHERE id = ? AND state = 'ready'",
        )
        .bind(now)
        .bind(id)
        .execute(&pool)
        .await?;
        if leased.rows_affected() != 1 {
            // Raced by another consumer on the same queue
            return Ok(None);
        }

        Ok(Some(LeasedMessage {
            id,
            body,
            attempts: attempts + 1,
        }))
    }

    /// Acknowledge a leased message (handler succeeded); deletes the row
    pub async fn ack(&self, id: i64) -> Result<()> {
        let pool = self
            .acquire()
            .await
            .ok_or_else(|| Error::Channel("message store unavailable".to_string()))?;
        sqlx::query("DELETE FROM channel_messages WHERE id = ?")
            .bind(id)
            .execute(&pool)
            .await?;
        Ok(())
    }

    /// Negatively acknowledge a leased message; parks it as `dead`
    ///
    /// Dead messages are never redelivered. They stay in the store for
    /// manual inspection.
    pub async fn nack(&self, id: i64) -> Result<()> {
        let pool = self
            .acquire()
            .await
            .ok_or_else(|| Error::Channel("message store unavailable".to_string()))?;
        sqlx::query("UPDATE channel_messages SET state = 'dead' WHERE id = ?")
            .bind(id)
            .execute(&pool)
            .await?;
        Ok(())
    }

    /// Number of ready messages on a queue
    pub async fn pending_count(&self, direction: ChannelDirection) -> Result<i64> {
        self.count_state(direction, "ready").await
    }

    /// Number of dead (parked) messages on a queue
    pub async fn dead_count(&self, direction: ChannelDirection) -> Result<i64> {
        self.count_state(direction, "dead").await
    }

    async fn count_state(&self, direction: ChannelDirection, state: &str) -> Result<i64> {
        let pool = self
            .acquire()
            .await
            .ok_or_else(|| Error::Channel("message store unavailable".to_string()))?;
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM channel_messages WHERE queue = ? AND state = ?",
        )
        .bind(direction.queue_name())
        .bind(state)
        .fetch_one(&pool)
        .await?;
        Ok(count)
    }
}

/// Open the store and initialize the channel schema
async fn open_store(path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite://{}?mode=rwc", path.display());
    debug!("Connecting to message store: {}", db_url);
    let pool = SqlitePool::connect(&db_url).await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS channel_messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            queue TEXT NOT NULL,
            routing_key TEXT NOT NULL,
            body TEXT NOT NULL,
            state TEXT NOT NULL DEFAULT 'ready',
            attempts INTEGER NOT NULL DEFAULT 0,
            published_at TEXT NOT NULL,
            leased_at INTEGER
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_channel_queue_state \
         ON channel_messages (queue, state, id)",
    )
    .execute(&pool)
    .await?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{DietSummary, EnvelopeBuilder, SummaryCard};

    fn diet_envelope(user: &str) -> EventEnvelope {
        EnvelopeBuilder::new(AgentSource::DietAgent)
            .build(
                "meal_logged",
                user,
                SummaryCard::Diet(DietSummary {
                    calories: 420.0,
                    ..Default::default()
                }),
            )
            .unwrap()
    }

    async fn temp_channel() -> (tempfile::TempDir, MessageChannel) {
        let dir = tempfile::tempdir().unwrap();
        let channel = MessageChannel::connect(dir.path().join("channel.db")).await;
        assert!(channel.is_connected().await);
        (dir, channel)
    }

    #[test]
    fn test_direction_wiring() {
        assert_eq!(
            ChannelDirection::for_publisher(AgentSource::DietAgent),
            ChannelDirection::DietToFitness
        );
        assert_eq!(
            ChannelDirection::inbound_for(AgentSource::DietAgent),
            ChannelDirection::FitnessToDiet
        );
        assert_eq!(ChannelDirection::DietToFitness.queue_name(), "diet_to_fitness");
        assert_eq!(ChannelDirection::DietToFitness.routing_key(), "diet.events");
        assert_eq!(
            ChannelDirection::FitnessToDiet.publisher(),
            AgentSource::FitnessAgent
        );
    }

    #[tokio::test]
    async fn test_publish_and_lease_fifo() {
        let (_dir, channel) = temp_channel().await;

        assert!(channel.publish(&diet_envelope("user-a")).await);
        assert!(channel.publish(&diet_envelope("user-b")).await);
        assert_eq!(
            channel.pending_count(ChannelDirection::DietToFitness).await.unwrap(),
            2
        );

        let lease = Duration::from_secs(30);
        let first = channel
            .lease_next(ChannelDirection::DietToFitness, lease)
            .await
            .unwrap()
            .expect("first message");
        let envelope: EventEnvelope = serde_json::from_str(&first.body).unwrap();
        assert_eq!(envelope.user_id, "user-a", "FIFO by publish order");
        channel.ack(first.id).await.unwrap();

        let second = channel
            .lease_next(ChannelDirection::DietToFitness, lease)
            .await
            .unwrap()
            .expect("second message");
        let envelope: EventEnvelope = serde_json::from_str(&second.body).unwrap();
        assert_eq!(envelope.user_id, "user-b");
        channel.ack(second.id).await.unwrap();

        assert_eq!(
            channel.pending_count(ChannelDirection::DietToFitness).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_nack_parks_without_requeue() {
        let (_dir, channel) = temp_channel().await;
        channel.publish(&diet_envelope("user-a")).await;

        let lease = Duration::from_secs(30);
        let msg = channel
            .lease_next(ChannelDirection::DietToFitness, lease)
            .await
            .unwrap()
            .unwrap();
        channel.nack(msg.id).await.unwrap();

        assert!(channel
            .lease_next(ChannelDirection::DietToFitness, lease)
            .await
            .unwrap()
            .is_none());
        assert_eq!(
            channel.dead_count(ChannelDirection::DietToFitness).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_expired_lease_is_redelivered() {
        let (_dir, channel) = temp_channel().await;
        channel.publish(&diet_envelope("user-a")).await;

        // Zero-length lease expires immediately
        let msg = channel
            .lease_next(ChannelDirection::DietToFitness, Duration::from_secs(0))
            .await
            .unwrap()
            .expect("first delivery");

        // Consumer "crashed": no ack. Next lease call requeues and redelivers.
        let redelivered = channel
            .lease_next(ChannelDirection::DietToFitness, Duration::from_secs(0))
            .await
            .unwrap()
            .expect("redelivery after lease expiry");
        assert_eq!(redelivered.id, msg.id);
        assert_eq!(redelivered.attempts, 2);
    }

    #[tokio::test]
    async fn test_queues_are_independent() {
        let (_dir, channel) = temp_channel().await;
        channel.publish(&diet_envelope("user-a")).await;

        // Nothing on the opposite direction
        assert!(channel
            .lease_next(ChannelDirection::FitnessToDiet, Duration::from_secs(30))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_degraded_publish_returns_false() {
        // Parent path is a file, so the store can never be created
        let file = tempfile::NamedTempFile::new().unwrap();
        let bad_path = file.path().join("channel.db");
        let channel = MessageChannel::connect(bad_path).await;

        assert!(!channel.is_connected().await);
        assert!(!channel.publish(&diet_envelope("user-a")).await);
        assert!(channel
            .lease_next(ChannelDirection::DietToFitness, Duration::from_secs(1))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_messages_survive_reconnect() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("channel.db");

        {
            let channel = MessageChannel::connect(&path).await;
            assert!(channel.publish(&diet_envelope("user-a")).await);
        }

        // New channel over the same store: the message is still there
        let channel = MessageChannel::connect(&path).await;
        let msg = channel
            .lease_next(ChannelDirection::DietToFitness, Duration::from_secs(30))
            .await
            .unwrap()
            .expect("message survived restart");
        let envelope: EventEnvelope = serde_json::from_str(&msg.body).unwrap();
        assert_eq!(envelope.user_id, "user-a");
    }
}
