//! Per-poll lifecycle: upcoming -> live -> final, or expiry.
//!
//! Pure decisions only. `PollService` applies them through storage, where
//! the `is_active` guard makes closing exactly-once.

use chrono::{DateTime, Utc};

use crate::feed::models::{EventStatus, NormalizedEvent};
use crate::polls::models::{GamePoll, Side};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Unchanged,
    /// Mirror newer status/scores onto the poll.
    Progress {
        status: EventStatus,
        home_score: u32,
        away_score: u32,
    },
    /// Close on a final score. `winner` is `None` for a tie.
    Resolve {
        winner: Option<Side>,
        home_score: u32,
        away_score: u32,
    },
    /// Close unresolved: unmatched and past `expires_at`.
    Expire,
}

/// Strictly greater score wins; equal scores have no winner.
pub fn decide_winner(home_score: u32, away_score: u32) -> Option<Side> {
    match home_score.cmp(&away_score) {
        std::cmp::Ordering::Greater => Some(Side::Home),
        std::cmp::Ordering::Less => Some(Side::Away),
        std::cmp::Ordering::Equal => None,
    }
}

/// Decide what this cycle does to `poll`, given its matched event (if any).
pub fn plan_transition(poll: &GamePoll, event: Option<&NormalizedEvent>, now: DateTime<Utc>) -> Transition {
    if !poll.is_active {
        return Transition::Unchanged;
    }

    let Some(event) = event else {
        return if now >= poll.expires_at {
            Transition::Expire
        } else {
            Transition::Unchanged
        };
    };

    // A regressed observation carries nothing newer than what the poll has.
    if event.status < poll.status {
        return Transition::Unchanged;
    }

    if event.status == EventStatus::Final {
        return Transition::Resolve {
            winner: decide_winner(event.home_score, event.away_score),
            home_score: event.home_score,
            away_score: event.away_score,
        };
    }

    let changed = event.status != poll.status
        || poll.home_score != Some(event.home_score)
        || poll.away_score != Some(event.away_score);

    if changed {
        Transition::Progress {
            status: event.status,
            home_score: event.home_score,
            away_score: event.away_score,
        }
    } else {
        Transition::Unchanged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn poll(status: EventStatus) -> GamePoll {
        let now = Utc::now();
        GamePoll {
            id: 1,
            game_id: "401".to_string(),
            home_team: "Lakers".to_string(),
            away_team: "Celtics".to_string(),
            sport: "Basketball".to_string(),
            league: "NBA".to_string(),
            game_date: Some(now),
            status,
            home_score: None,
            away_score: None,
            winner: None,
            is_active: true,
            close_reason: None,
            created_at: now,
            expires_at: now + Duration::hours(3),
        }
    }

    fn event(status: EventStatus, home: u32, away: u32) -> NormalizedEvent {
        let mut e = NormalizedEvent::unavailable();
        e.id = "401".to_string();
        e.home_team = "Lakers".to_string();
        e.away_team = "Celtics".to_string();
        e.status = status;
        e.home_score = home;
        e.away_score = away;
        e.placeholder = false;
        e
    }

    #[test]
    fn test_decide_winner() {
        assert_eq!(decide_winner(112, 108), Some(Side::Home));
        assert_eq!(decide_winner(99, 101), Some(Side::Away));
        assert_eq!(decide_winner(100, 100), None);
    }

    #[test]
    fn test_final_resolves() {
        let p = poll(EventStatus::Live);
        let t = plan_transition(&p, Some(&event(EventStatus::Final, 112, 108)), Utc::now());
        assert_eq!(
            t,
            Transition::Resolve {
                winner: Some(Side::Home),
                home_score: 112,
                away_score: 108
            }
        );
    }

    #[test]
    fn test_tie_resolves_without_winner() {
        let p = poll(EventStatus::Live);
        let t = plan_transition(&p, Some(&event(EventStatus::Final, 100, 100)), Utc::now());
        assert!(matches!(t, Transition::Resolve { winner: None, .. }));
    }

    #[test]
    fn test_live_progress_then_unchanged() {
        let mut p = poll(EventStatus::Upcoming);
        let e = event(EventStatus::Live, 10, 7);
        assert!(matches!(plan_transition(&p, Some(&e), Utc::now()), Transition::Progress { .. }));

        p.status = EventStatus::Live;
        p.home_score = Some(10);
        p.away_score = Some(7);
        assert_eq!(plan_transition(&p, Some(&e), Utc::now()), Transition::Unchanged);
    }

    #[test]
    fn test_regression_ignored() {
        let mut p = poll(EventStatus::Live);
        p.home_score = Some(50);
        p.away_score = Some(40);
        let t = plan_transition(&p, Some(&event(EventStatus::Upcoming, 0, 0)), Utc::now());
        assert_eq!(t, Transition::Unchanged);
    }

    #[test]
    fn test_expiry_only_when_unmatched() {
        let p = poll(EventStatus::Upcoming);
        let later = p.expires_at + Duration::minutes(1);

        assert_eq!(plan_transition(&p, None, later), Transition::Expire);
        assert_eq!(plan_transition(&p, None, Utc::now()), Transition::Unchanged);
        assert!(matches!(
            plan_transition(&p, Some(&event(EventStatus::Live, 1, 0)), later),
            Transition::Progress { .. }
        ));
    }

    #[test]
    fn test_inactive_poll_is_terminal() {
        let mut p = poll(EventStatus::Final);
        p.is_active = false;
        let t = plan_transition(&p, Some(&event(EventStatus::Final, 112, 108)), Utc::now());
        assert_eq!(t, Transition::Unchanged);
        assert_eq!(plan_transition(&p, None, p.expires_at + Duration::days(1)), Transition::Unchanged);
    }
}
