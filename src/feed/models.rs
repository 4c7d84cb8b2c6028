use std::fmt;
use std::str::FromStr;

use anyhow::bail;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a real-world game. Ordered: a game only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Upcoming,
    Live,
    Final,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upcoming => "upcoming",
            Self::Live => "live",
            Self::Final => "final",
        }
    }

    /// Display priority for ranking: live first, then upcoming, then final.
    pub fn priority(&self) -> u8 {
        match self {
            Self::Live => 0,
            Self::Upcoming => 1,
            Self::Final => 2,
        }
    }

    /// The later of two observations. Never regresses final -> live -> upcoming.
    pub fn advance(self, observed: EventStatus) -> EventStatus {
        self.max(observed)
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upcoming" => Ok(Self::Upcoming),
            "live" => Ok(Self::Live),
            "final" => Ok(Self::Final),
            other => bail!("Unknown event status: {other}"),
        }
    }
}

/// One game from any scores provider, in our shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    /// Upstream event id; also the stable join key for polls.
    pub id: String,
    pub source: String,
    pub home_team: String,
    pub away_team: String,
    pub home_score: u32,
    pub away_score: u32,
    pub status: EventStatus,
    /// Period/clock descriptor, e.g. "Q3 5:12" or "Final/OT".
    pub clock: Option<String>,
    pub sport: String,
    pub league: String,
    pub start_time: Option<DateTime<Utc>>,
    pub venue: Option<String>,
    /// True for the "temporarily unavailable" record the fallback chain emits.
    #[serde(default)]
    pub placeholder: bool,
}

impl NormalizedEvent {
    /// Terminal fallback record: renderable, never matched to a poll.
    pub fn unavailable() -> Self {
        Self {
            id: "scores-unavailable".to_string(),
            source: "System Notice".to_string(),
            home_team: "Live scores".to_string(),
            away_team: "temporarily unavailable".to_string(),
            home_score: 0,
            away_score: 0,
            status: EventStatus::Upcoming,
            clock: Some("Scores will refresh automatically".to_string()),
            sport: "Sports".to_string(),
            league: "ALL".to_string(),
            start_time: None,
            venue: None,
            placeholder: true,
        }
    }

    pub fn involves_team(&self, team: &str) -> bool {
        let needle = team.trim().to_lowercase();
        if needle.is_empty() {
            return false;
        }
        self.home_team.to_lowercase().contains(&needle)
            || self.away_team.to_lowercase().contains(&needle)
    }
}

/// One news story from any news provider, in our shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedArticle {
    pub title: String,
    pub content: String,
    pub summary: String,
    pub category: String,
    /// Never empty: falls back to a category placeholder image.
    pub image_url: String,
    pub tags: Vec<String>,
    pub published_at: DateTime<Utc>,
    pub source: String,
    pub url: String,
    #[serde(default)]
    pub placeholder: bool,
}

impl NormalizedArticle {
    pub fn unavailable(image_url: String) -> Self {
        Self {
            title: "ESPN Sports News Temporarily Unavailable".to_string(),
            content: "We're currently unable to fetch the latest sports news. This could be \
                      due to network connectivity issues or upstream maintenance. Please try \
                      again in a few minutes for the latest NBA, NFL, MLB, college, NHL and \
                      golf coverage."
                .to_string(),
            summary: "Sports news temporarily unavailable due to technical issues.".to_string(),
            category: "System".to_string(),
            image_url,
            tags: vec![
                "System".to_string(),
                "Notice".to_string(),
                "Technical".to_string(),
            ],
            published_at: Utc::now(),
            source: "System Notice".to_string(),
            url: String::new(),
            placeholder: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub name: String,
    pub league: String,
    pub city: Option<String>,
    pub conference: Option<String>,
    pub abbreviation: Option<String>,
    pub logo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    pub team: String,
    pub position: String,
    pub league: String,
    pub jersey: Option<String>,
}
