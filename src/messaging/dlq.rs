use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use tokio::sync::Mutex;

// ============================================================================
// Dead Letter Queue
// ============================================================================
//
// Holds stream messages the consumer had to skip, so they can be inspected
// or replayed by hand. Bounded: once full, the oldest entry is evicted.
//
// ============================================================================

#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub payload: Vec<u8>,
    pub reason: &'static str,
    pub error_message: String,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct DlqStats {
    pub retained: usize,
    pub total_received: u64,
    pub evicted: u64,
}

pub struct DeadLetterQueue {
    capacity: usize,
    inner: Mutex<DlqInner>,
}

#[derive(Default)]
struct DlqInner {
    letters: VecDeque<DeadLetter>,
    total_received: u64,
    evicted: u64,
}

impl DeadLetterQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(DlqInner::default()),
        }
    }

    pub async fn push(&self, letter: DeadLetter) {
        let mut inner = self.inner.lock().await;

        tracing::warn!(
            reason = letter.reason,
            error = %letter.error_message,
            payload_bytes = letter.payload.len(),
            "Adding message to dead letter queue"
        );

        if inner.letters.len() >= self.capacity {
            inner.letters.pop_front();
            inner.evicted += 1;
        }
        inner.letters.push_back(letter);
        inner.total_received += 1;
    }

    /// Most recent letters first, at most `limit`.
    pub async fn recent(&self, limit: usize) -> Vec<DeadLetter> {
        let inner = self.inner.lock().await;
        inner.letters.iter().rev().take(limit).cloned().collect()
    }

    pub async fn stats(&self) -> DlqStats {
        let inner = self.inner.lock().await;
        DlqStats {
            retained: inner.letters.len(),
            total_received: inner.total_received,
            evicted: inner.evicted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn letter(byte: u8) -> DeadLetter {
        DeadLetter {
            payload: vec![byte],
            reason: "malformed",
            error_message: "bad".to_string(),
            received_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_evicts_oldest_when_full() {
        let dlq = DeadLetterQueue::new(2);
        for byte in 1..=3 {
            dlq.push(letter(byte)).await;
        }

        let recent = dlq.recent(10).await;
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].payload, vec![3]);
        assert_eq!(recent[1].payload, vec![2]);

        let stats = dlq.stats().await;
        assert_eq!(stats.retained, 2);
        assert_eq!(stats.total_received, 3);
        assert_eq!(stats.evicted, 1);
    }
}
