pub mod machine;
pub mod models;
pub mod service;

use async_trait::async_trait;

use crate::feed::models::NormalizedEvent;

pub use service::{PollService, ResolutionSummary};

/// What one resolution cycle saw of the live scoreboards.
#[derive(Debug, Clone, Default)]
pub struct FeedSnapshot {
    /// Recent and upcoming real events; never placeholders.
    pub events: Vec<NormalizedEvent>,
    /// Name of the stage that served `events`.
    pub stage: String,
    /// True only when `events` came from a live upstream fetch this cycle.
    pub from_primary: bool,
    /// Leagues whose scoreboard was partly or wholly unreachable.
    pub failed_leagues: Vec<String>,
}

impl FeedSnapshot {
    /// A complete, freshly fetched view.
    pub fn primary(stage: &str, events: Vec<NormalizedEvent>) -> Self {
        Self {
            events,
            stage: stage.to_string(),
            from_primary: true,
            failed_leagues: Vec::new(),
        }
    }

    /// Whether a game of `league` missing from `events` really is gone,
    /// rather than hidden by an upstream failure.
    pub fn covers(&self, league: &str) -> bool {
        self.from_primary && !self.failed_leagues.iter().any(|l| l.eq_ignore_ascii_case(league))
    }
}

/// Live event stream the poll core reads each cycle.
#[async_trait]
pub trait EventFeed: Send + Sync {
    async fn current_events(&self) -> FeedSnapshot;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_covers_requires_primary_and_healthy_league() {
        let fresh = FeedSnapshot::primary("espn_scoreboard", Vec::new());
        assert!(fresh.covers("NBA"));

        let partial = FeedSnapshot {
            failed_leagues: vec!["NBA".to_string()],
            ..fresh.clone()
        };
        assert!(!partial.covers("nba"));
        assert!(partial.covers("NFL"));

        let cached = FeedSnapshot {
            stage: "last_good_scoreboard".to_string(),
            from_primary: false,
            ..fresh
        };
        assert!(!cached.covers("NFL"));
    }
}
