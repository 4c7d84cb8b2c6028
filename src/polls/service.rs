//! Poll lifecycle orchestration: creation, predictions, resolution sweeps.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::config::PollsConfig;
use crate::db::Storage;
use crate::error::PredictionError;
use crate::feed::models::{EventStatus, NormalizedEvent};
use crate::polls::machine::{plan_transition, Transition};
use crate::polls::models::{CloseReason, GamePoll, GamePrediction, NewPoll, PollClosure, Side};
use crate::polls::{EventFeed, FeedSnapshot};

/// Counters from one resolution sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionSummary {
    pub checked: usize,
    pub progressed: usize,
    pub resolved: usize,
    pub ties: usize,
    pub expired: usize,
    /// Close attempts that found the poll already closed.
    pub already_closed: usize,
    /// Overdue unmatched polls kept open because their league was not fully visible.
    pub expiry_deferred: usize,
    pub points_awarded: i64,
}

pub struct PollService {
    store: Arc<dyn Storage>,
    feed: Arc<dyn EventFeed>,
    config: PollsConfig,
}

impl PollService {
    pub fn new(store: Arc<dyn Storage>, feed: Arc<dyn EventFeed>, config: PollsConfig) -> Self {
        Self { store, feed, config }
    }

    /// One poll per current upcoming/live game, reusing existing polls.
    pub async fn create_or_get_daily_polls(&self) -> Result<Vec<GamePoll>> {
        let snapshot = self.feed.current_events().await;
        self.polls_for_events(&snapshot.events, Utc::now()).await
    }

    #[instrument(skip(self, events), fields(events = events.len()))]
    pub async fn polls_for_events(&self, events: &[NormalizedEvent], now: DateTime<Utc>) -> Result<Vec<GamePoll>> {
        let mut polls = Vec::new();
        let mut created = 0;

        let candidates = events
            .iter()
            .filter(|e| !e.placeholder && e.status != EventStatus::Final)
            .take(self.config.max_polls_per_cycle);

        for event in candidates {
            if polls.iter().any(|p: &GamePoll| p.game_id == event.id) {
                continue;
            }

            if let Some(poll) = self.store.find_poll_by_game_id(&event.id).await? {
                polls.push(poll);
                continue;
            }

            if let Some(poll) = self
                .store
                .find_active_poll_by_teams(&event.home_team, &event.away_team, &event.sport)
                .await?
            {
                warn!(
                    poll_id = poll.id,
                    poll_game_id = %poll.game_id,
                    event_id = %event.id,
                    "Poll matched by team names, not game id"
                );
                polls.push(poll);
                continue;
            }

            let (poll, inserted) = self.store.insert_poll(&self.new_poll(event, now)).await?;
            if inserted {
                created += 1;
                debug!(poll_id = poll.id, game_id = %poll.game_id, "Poll created");
            }
            polls.push(poll);
        }

        info!(polls = polls.len(), created, "Daily polls ready");
        Ok(polls)
    }

    fn new_poll(&self, event: &NormalizedEvent, now: DateTime<Utc>) -> NewPoll {
        let expires_at = match event.start_time {
            Some(start) => start + Duration::hours(self.config.grace_hours),
            None => now + Duration::hours(self.config.unknown_start_window_hours),
        };

        let started = event.status != EventStatus::Upcoming;
        NewPoll {
            game_id: event.id.clone(),
            home_team: event.home_team.clone(),
            away_team: event.away_team.clone(),
            sport: event.sport.clone(),
            league: event.league.clone(),
            game_date: event.start_time,
            status: event.status,
            home_score: started.then_some(event.home_score),
            away_score: started.then_some(event.away_score),
            expires_at,
        }
    }

    /// Record a user's pick. At most one per (user, poll); never overwritten.
    #[instrument(skip(self))]
    pub async fn submit_prediction(
        &self,
        user_id: i64,
        poll_id: i64,
        side: Side,
    ) -> Result<GamePrediction, PredictionError> {
        let poll = self
            .store
            .get_poll(poll_id)
            .await?
            .ok_or(PredictionError::PollNotFound(poll_id))?;

        if !poll.is_active || poll.status == EventStatus::Final {
            return Err(PredictionError::PollClosed(poll_id));
        }

        if self.store.get_user(user_id).await?.is_none() {
            return Err(PredictionError::UserNotFound(user_id));
        }

        let prediction = self
            .store
            .insert_prediction(user_id, poll_id, side)
            .await?
            .ok_or(PredictionError::DuplicatePrediction { user_id, poll_id })?;

        info!(prediction_id = prediction.id, user_id, poll_id, side = %side, "Prediction recorded");
        Ok(prediction)
    }

    /// Idempotent settlement sweep over every active poll.
    pub async fn resolve_pending_polls(&self) -> Result<ResolutionSummary> {
        let snapshot = self.feed.current_events().await;
        self.resolve_with(&snapshot, Utc::now()).await
    }

    #[instrument(
        skip(self, snapshot),
        fields(events = snapshot.events.len(), stage = %snapshot.stage)
    )]
    pub async fn resolve_with(&self, snapshot: &FeedSnapshot, now: DateTime<Utc>) -> Result<ResolutionSummary> {
        let mut summary = ResolutionSummary::default();

        for poll in self.store.list_active_polls().await? {
            summary.checked += 1;
            let event = match_event(&poll, &snapshot.events);

            match plan_transition(&poll, event, now) {
                Transition::Unchanged => {}
                // Absent because the upstream failed, not because the game is gone.
                Transition::Expire if !snapshot.covers(&poll.league) => {
                    summary.expiry_deferred += 1;
                    debug!(
                        poll_id = poll.id,
                        league = %poll.league,
                        stage = %snapshot.stage,
                        "Expiry deferred, scoreboard not fully visible"
                    );
                }
                Transition::Progress {
                    status,
                    home_score,
                    away_score,
                } => {
                    self.store
                        .update_poll_progress(poll.id, status, home_score, away_score)
                        .await?;
                    summary.progressed += 1;
                }
                Transition::Resolve {
                    winner,
                    home_score,
                    away_score,
                } => {
                    let closure = PollClosure {
                        reason: CloseReason::Final,
                        status: EventStatus::Final,
                        home_score: Some(home_score),
                        away_score: Some(away_score),
                        winner,
                        reward_points: self.config.reward_points,
                    };
                    match self.store.close_poll(poll.id, &closure).await? {
                        Some(settlement) => {
                            summary.resolved += 1;
                            summary.points_awarded += settlement.points_awarded;
                            if winner.is_none() {
                                summary.ties += 1;
                            }
                            info!(
                                poll_id = poll.id,
                                winner = winner.map(|w| w.as_str()).unwrap_or("tie"),
                                home_score,
                                away_score,
                                correct = settlement.correct,
                                incorrect = settlement.incorrect,
                                "Poll settled"
                            );
                        }
                        None => {
                            summary.already_closed += 1;
                            debug!(poll_id = poll.id, "Poll already settled by another sweep");
                        }
                    }
                }
                Transition::Expire => {
                    let closure = PollClosure {
                        reason: CloseReason::Expired,
                        status: poll.status,
                        home_score: poll.home_score,
                        away_score: poll.away_score,
                        winner: None,
                        reward_points: 0,
                    };
                    match self.store.close_poll(poll.id, &closure).await? {
                        Some(_) => {
                            summary.expired += 1;
                            warn!(
                                poll_id = poll.id,
                                game_id = %poll.game_id,
                                expires_at = %poll.expires_at,
                                "Poll expired without a final result"
                            );
                        }
                        None => summary.already_closed += 1,
                    }
                }
            }
        }

        info!(
            checked = summary.checked,
            progressed = summary.progressed,
            resolved = summary.resolved,
            expired = summary.expired,
            expiry_deferred = summary.expiry_deferred,
            points_awarded = summary.points_awarded,
            "Resolution sweep complete"
        );
        Ok(summary)
    }

    /// Active polls for games scheduled on the current UTC day.
    pub async fn todays_polls(&self) -> Result<Vec<GamePoll>> {
        let today = Utc::now().date_naive();
        Ok(self
            .store
            .list_active_polls()
            .await?
            .into_iter()
            .filter(|p| p.game_date.unwrap_or(p.created_at).date_naive() == today)
            .collect())
    }

    pub async fn user_predictions(&self, user_id: i64) -> Result<Vec<GamePrediction>> {
        self.store.predictions_for_user(user_id).await
    }
}

/// Game id first; team names + sport only as a logged fallback.
fn match_event<'a>(poll: &GamePoll, events: &'a [NormalizedEvent]) -> Option<&'a NormalizedEvent> {
    if let Some(event) = events.iter().find(|e| !e.placeholder && e.id == poll.game_id) {
        return Some(event);
    }

    let by_name = events.iter().find(|e| {
        !e.placeholder
            && e.home_team.eq_ignore_ascii_case(&poll.home_team)
            && e.away_team.eq_ignore_ascii_case(&poll.away_team)
            && e.sport.eq_ignore_ascii_case(&poll.sport)
    });
    if let Some(event) = by_name {
        warn!(
            poll_id = poll.id,
            poll_game_id = %poll.game_id,
            event_id = %event.id,
            "Event matched to poll by team names"
        );
    }
    by_name
}
