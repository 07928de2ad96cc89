//! Owned table of cancellable escalation timers
//!
//! Each timer is a sleeping task that reports its id on a channel when it
//! elapses. The table is the source of truth: an id that is no longer in the
//! table is stale and must be ignored by the receiver.

use crate::escalation::types::{AttemptId, SessionId};
use crate::risk::RiskTier;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::Instant;

pub type TimerId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum TimerKind {
    Countdown,
    StepUp { tier: RiskTier },
    Retry { attempt_id: AttemptId },
    /// Releases the next queued dispatch
    Stagger,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerStats {
    pub scheduled: u64,
    pub fired: u64,
    pub cancelled: u64,
}

/// Snapshot view of one pending timer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingTimer {
    pub id: TimerId,
    pub session_id: SessionId,
    pub kind: TimerKind,
    pub remaining_ms: u64,
}

#[derive(Debug)]
struct TimerEntry {
    session_id: SessionId,
    kind: TimerKind,
    deadline: Instant,
    handle: AbortHandle,
}

#[derive(Debug)]
pub struct TimerTable {
    next_id: TimerId,
    entries: HashMap<TimerId, TimerEntry>,
    fired_tx: mpsc::UnboundedSender<TimerId>,
    stats: TimerStats,
}

impl TimerTable {
    /// Create a table reporting elapsed timers on `fired_tx`
    pub fn new(fired_tx: mpsc::UnboundedSender<TimerId>) -> Self {
        Self {
            next_id: 1,
            entries: HashMap::new(),
            fired_tx,
            stats: TimerStats::default(),
        }
    }

    pub fn schedule(&mut self, session_id: SessionId, kind: TimerKind, delay: Duration) -> TimerId {
        let id = self.next_id;
        self.next_id += 1;

        let tx = self.fired_tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(id);
        });

        self.entries.insert(
            id,
            TimerEntry {
                session_id,
                kind,
                deadline: Instant::now() + delay,
                handle: task.abort_handle(),
            },
        );
        self.stats.scheduled += 1;
        id
    }

    /// Claim an elapsed timer; `None` when it was cancelled meanwhile
    pub fn take_fired(&mut self, id: TimerId) -> Option<(SessionId, TimerKind)> {
        let entry = self.entries.remove(&id)?;
        self.stats.fired += 1;
        Some((entry.session_id, entry.kind))
    }

    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.entries.remove(&id) {
            Some(entry) => {
                entry.handle.abort();
                self.stats.cancelled += 1;
                true
            }
            None => false,
        }
    }

    /// Cancel every timer of a session matching `predicate`
    pub fn cancel_where<F>(&mut self, session_id: SessionId, predicate: F) -> usize
    where
        F: Fn(&TimerKind) -> bool,
    {
        let ids: Vec<TimerId> = self
            .entries
            .iter()
            .filter(|(_, e)| e.session_id == session_id && predicate(&e.kind))
            .map(|(id, _)| *id)
            .collect();

        ids.into_iter().filter(|id| self.cancel(*id)).count()
    }

    pub fn cancel_session(&mut self, session_id: SessionId) -> usize {
        self.cancel_where(session_id, |_| true)
    }

    pub fn has_pending(&self, session_id: SessionId, kind: &TimerKind) -> bool {
        self.entries
            .values()
            .any(|e| e.session_id == session_id && &e.kind == kind)
    }

    pub fn pending_count(&self) -> usize {
        self.entries.len()
    }

    pub fn pending(&self) -> Vec<PendingTimer> {
        let now = Instant::now();
        let mut timers: Vec<PendingTimer> = self
            .entries
            .iter()
            .map(|(id, e)| PendingTimer {
                id: *id,
                session_id: e.session_id,
                kind: e.kind.clone(),
                remaining_ms: e.deadline.saturating_duration_since(now).as_millis() as u64,
            })
            .collect();
        timers.sort_by_key(|t| t.id);
        timers
    }

    pub fn stats(&self) -> TimerStats {
        self.stats
    }
}

impl Drop for TimerTable {
    fn drop(&mut self) {
        for entry in self.entries.values() {
            entry.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_after_delay() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut table = TimerTable::new(tx);

        let id = table.schedule(1, TimerKind::Countdown, Duration::from_secs(10));
        assert_eq!(table.pending_count(), 1);

        let start = Instant::now();
        let fired = rx.recv().await.unwrap();
        assert_eq!(fired, id);
        assert_eq!(start.elapsed(), Duration::from_secs(10));

        assert_eq!(table.take_fired(fired), Some((1, TimerKind::Countdown)));
        assert_eq!(table.stats().fired, 1);
        assert_eq!(table.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timer_is_counted_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut table = TimerTable::new(tx);

        let id = table.schedule(1, TimerKind::Retry { attempt_id: 3 }, Duration::from_secs(30));
        assert!(table.cancel(id));
        assert!(!table.cancel(id));
        assert_eq!(table.stats().cancelled, 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(table.take_fired(id), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_session_only_touches_that_session() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut table = TimerTable::new(tx);

        table.schedule(1, TimerKind::Countdown, Duration::from_secs(10));
        table.schedule(1, TimerKind::StepUp { tier: RiskTier::High }, Duration::from_secs(60));
        table.schedule(2, TimerKind::Stagger, Duration::from_secs(2));

        assert_eq!(table.cancel_session(1), 2);
        assert_eq!(table.pending_count(), 1);
        assert!(table.has_pending(2, &TimerKind::Stagger));
        assert_eq!(table.stats(), TimerStats { scheduled: 3, fired: 0, cancelled: 2 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_reports_remaining_time() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut table = TimerTable::new(tx);
        table.schedule(7, TimerKind::Countdown, Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(4)).await;
        let pending = table.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].remaining_ms, 6_000);
    }
}
