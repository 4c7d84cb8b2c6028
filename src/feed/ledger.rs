//! Cross-cycle status memory for events.
//!
//! Upstreams occasionally report a finished game as in progress again (cache
//! flaps, replayed scoreboards). The ledger remembers the furthest status
//! observed per event id and clamps every later observation to it.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use crate::feed::models::{EventStatus, NormalizedEvent};

/// Entries untouched for this long are forgotten.
const RETENTION_HOURS: i64 = 48;

#[derive(Debug, Clone)]
struct Seen {
    status: EventStatus,
    home_score: u32,
    away_score: u32,
    last_seen: DateTime<Utc>,
}

#[derive(Clone, Default)]
pub struct StatusLedger {
    inner: Arc<Mutex<HashMap<String, Seen>>>,
}

impl StatusLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clamp each event's status so it never moves backward across cycles.
    /// A regressed observation keeps the scores recorded with the furthest status.
    pub async fn apply(&self, events: Vec<NormalizedEvent>, now: DateTime<Utc>) -> Vec<NormalizedEvent> {
        let mut seen = self.inner.lock().await;

        let cutoff = now - Duration::hours(RETENTION_HOURS);
        seen.retain(|_, entry| entry.last_seen >= cutoff);

        events
            .into_iter()
            .map(|mut event| {
                if event.placeholder {
                    return event;
                }

                match seen.get_mut(&event.id) {
                    Some(prev) if event.status < prev.status => {
                        debug!(
                            event_id = %event.id,
                            observed = %event.status,
                            kept = %prev.status,
                            "Status regression clamped"
                        );
                        event.status = prev.status;
                        event.home_score = prev.home_score;
                        event.away_score = prev.away_score;
                        prev.last_seen = now;
                    }
                    Some(prev) => {
                        prev.status = event.status;
                        prev.home_score = event.home_score;
                        prev.away_score = event.away_score;
                        prev.last_seen = now;
                    }
                    None => {
                        seen.insert(
                            event.id.clone(),
                            Seen {
                                status: event.status,
                                home_score: event.home_score,
                                away_score: event.away_score,
                                last_seen: now,
                            },
                        );
                    }
                }
                event
            })
            .collect()
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}
