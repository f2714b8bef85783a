//! Progress reporting
//!
//! The downloader itself keeps no shared counters. It emits one
//! [`SegmentEvent`] per state change over a channel, and observers such as
//! [`ProgressTally`] fold those events on their own task.

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Lifecycle notification for one segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentEvent {
    Started { index: usize, start: u64, end: u64 },
    Completed { index: usize, bytes: u64 },
    Failed { index: usize, error: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub started: usize,
    pub completed: usize,
    pub failed: usize,
    pub bytes: u64,
}

/// Observer that counts segment events and logs each one
#[derive(Debug, Default)]
pub struct ProgressTally {
    snapshot: ProgressSnapshot,
}

impl ProgressTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, event: &SegmentEvent) {
        match event {
            SegmentEvent::Started { index, start, end } => {
                self.snapshot.started += 1;
                debug!(index, start, end, "Segment started");
            }
            SegmentEvent::Completed { index, bytes } => {
                self.snapshot.completed += 1;
                self.snapshot.bytes += bytes;
                info!(
                    index,
                    bytes,
                    completed = self.snapshot.completed,
                    "Segment completed"
                );
            }
            SegmentEvent::Failed { index, error } => {
                self.snapshot.failed += 1;
                warn!(index, error = %error, "Segment failed");
            }
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.snapshot.clone()
    }

    /// Drain `events` on a background task until every sender is dropped
    pub fn spawn(mut events: UnboundedReceiver<SegmentEvent>) -> JoinHandle<ProgressSnapshot> {
        tokio::spawn(async move {
            let mut tally = ProgressTally::new();
            while let Some(event) = events.recv().await {
                tally.record(&event);
            }
            tally.snapshot()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_record_counts_events() {
        let mut tally = ProgressTally::new();
        tally.record(&SegmentEvent::Started {
            index: 0,
            start: 0,
            end: 9,
        });
        tally.record(&SegmentEvent::Started {
            index: 1,
            start: 10,
            end: 19,
        });
        tally.record(&SegmentEvent::Completed {
            index: 0,
            bytes: 10,
        });
        tally.record(&SegmentEvent::Failed {
            index: 1,
            error: "HTTP 500".to_string(),
        });

        assert_eq!(
            tally.snapshot(),
            ProgressSnapshot {
                started: 2,
                completed: 1,
                failed: 1,
                bytes: 10,
            }
        );
    }

    #[tokio::test]
    async fn test_spawned_tally_finishes_when_senders_drop() {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = ProgressTally::spawn(rx);

        tx.send(SegmentEvent::Completed { index: 0, bytes: 5 }).unwrap();
        tx.send(SegmentEvent::Completed { index: 1, bytes: 7 }).unwrap();
        drop(tx);

        let snapshot = handle.await.unwrap();
        assert_eq!(snapshot.completed, 2);
        assert_eq!(snapshot.bytes, 12);
    }
}
