//! MetricsStore - Session Metrics (Ring Buffer)
//!
//! ## Responsibilities
//!
//! - Accept session summary records from clients
//! - Provide per-session queries for the web API
//!
//! This is the write-and-query interface the core needs from a metrics sink;
//! storage is an in-memory capacity-bounded buffer, not a database.

use std::collections::VecDeque;
use tokio::sync::RwLock;

use crate::models::SessionMetrics;

struct MetricsRingBuffer {
    records: VecDeque<SessionMetrics>,
    capacity: usize,
}

impl MetricsRingBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, record: SessionMetrics) {
        if self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    fn for_session(&self, session_id: &str, count: usize) -> Vec<SessionMetrics> {
        self.records
            .iter()
            .rev()
            .filter(|r| r.session_id == session_id)
            .take(count)
            .cloned()
            .collect()
    }
}

/// MetricsStore instance
pub struct MetricsStore {
    buffer: RwLock<MetricsRingBuffer>,
}

impl MetricsStore {
    /// Create new MetricsStore
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: RwLock::new(MetricsRingBuffer::new(capacity)),
        }
    }

    /// Record a session summary, returning the stored record
    pub async fn record(&self, record: SessionMetrics) -> SessionMetrics {
        let mut buffer = self.buffer.write().await;
        buffer.push(record.clone());
        tracing::debug!(session_id = %record.session_id, "Session metrics recorded");
        record
    }

    /// Latest records for a session, newest first
    pub async fn for_session(&self, session_id: &str, count: usize) -> Vec<SessionMetrics> {
        let buffer = self.buffer.read().await;
        buffer.for_session(session_id, count)
    }

    /// Total stored records
    pub async fn count(&self) -> usize {
        let buffer = self.buffer.read().await;
        buffer.records.len()
    }
}

impl Default for MetricsStore {
    fn default() -> Self {
        Self::new(1000)
    }
}
