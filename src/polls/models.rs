use std::fmt;
use std::str::FromStr;

use anyhow::bail;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::feed::models::EventStatus;

/// Which competitor a prediction or result refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Home,
    Away,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::Away => "away",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "home" => Ok(Self::Home),
            "away" => Ok(Self::Away),
            other => bail!("Unknown side: {other}"),
        }
    }
}

/// Why a poll stopped accepting predictions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloseReason {
    /// The game finished; settled unless tied.
    Final,
    /// The game vanished from the feed past its expiry; never settled.
    Expired,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Final => "final",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CloseReason {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "final" => Ok(Self::Final),
            "expired" => Ok(Self::Expired),
            other => bail!("Unknown close reason: {other}"),
        }
    }
}

/// One real-world game tracked for predictions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GamePoll {
    pub id: i64,
    /// Upstream event id, the join key back into the live feed.
    pub game_id: String,
    pub home_team: String,
    pub away_team: String,
    pub sport: String,
    pub league: String,
    pub game_date: Option<DateTime<Utc>>,
    pub status: EventStatus,
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
    /// Set only when the poll closed on a decisive final score.
    pub winner: Option<Side>,
    pub is_active: bool,
    pub close_reason: Option<CloseReason>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Fields needed to open a poll; the store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPoll {
    pub game_id: String,
    pub home_team: String,
    pub away_team: String,
    pub sport: String,
    pub league: String,
    pub game_date: Option<DateTime<Utc>>,
    pub status: EventStatus,
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GamePrediction {
    pub id: i64,
    pub user_id: i64,
    pub game_poll_id: i64,
    pub predicted_winner: Side,
    /// `None` until the poll settles; stays `None` for ties and expiry.
    pub is_correct: Option<bool>,
    pub points_earned: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: i64,
    pub external_id: String,
    pub username: String,
    pub favorite_teams: Vec<String>,
    pub favorite_players: Vec<String>,
    pub points: i64,
}

#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub external_id: String,
    pub username: String,
    pub favorite_teams: Vec<String>,
    pub favorite_players: Vec<String>,
}

/// Terminal write applied to a poll in one transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct PollClosure {
    pub reason: CloseReason,
    pub status: EventStatus,
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
    pub winner: Option<Side>,
    pub reward_points: i64,
}

/// What one successful close did. Returned at most once per poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settlement {
    pub poll_id: i64,
    pub winner: Option<Side>,
    pub correct: u64,
    pub incorrect: u64,
    pub points_awarded: i64,
}
