//! Live scores source.
//!
//! Fetches scoreboards from ESPN's public site API for each requested
//! sport endpoint and date, and normalizes them into `NormalizedEvent`s.

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::data::classify::{self, SportEndpoint, StatusSignals};
use crate::data::{fan_out, DataSource, UpstreamClient};
use crate::error::UpstreamError;
use crate::feed::models::{EventStatus, NormalizedEvent};

/// Which scoreboards to pull: every endpoint crossed with every date.
#[derive(Debug, Clone)]
pub struct ScoresQuery {
    pub endpoints: Vec<SportEndpoint>,
    pub dates: Vec<NaiveDate>,
}

impl ScoresQuery {
    /// Today's and tomorrow's games (UTC) for the given endpoints.
    pub fn upcoming_window(endpoints: Vec<SportEndpoint>, now: DateTime<Utc>) -> Self {
        let today = now.date_naive();
        Self {
            endpoints,
            dates: vec![today, today + Duration::days(1)],
        }
    }

    /// Yesterday through tomorrow, so late games that finished after
    /// midnight UTC are still seen when polls resolve.
    pub fn resolution_window(endpoints: Vec<SportEndpoint>, now: DateTime<Utc>) -> Self {
        let today = now.date_naive();
        Self {
            endpoints,
            dates: vec![today - Duration::days(1), today, today + Duration::days(1)],
        }
    }
}

pub struct EspnScoresSource {
    client: UpstreamClient,
    base_url: String,
}

impl EspnScoresSource {
    pub fn new(client: UpstreamClient, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn fetch_scoreboard(
        &self,
        endpoint: SportEndpoint,
        date: NaiveDate,
    ) -> Result<Vec<NormalizedEvent>, UpstreamError> {
        let url = format!("{}/{}/scoreboard", self.base_url, endpoint.path());
        let query = [("dates", date.format("%Y%m%d").to_string())];

        let scoreboard: EspnScoreboard = self.client.get_json(&url, &query).await?;

        let events: Vec<NormalizedEvent> = scoreboard
            .events
            .iter()
            .filter_map(|event| normalize_event(event, &endpoint))
            .collect();

        debug!(
            league = endpoint.display_league,
            date = %date,
            upstream = scoreboard.events.len(),
            normalized = events.len(),
            "Scoreboard parsed"
        );

        Ok(events)
    }
}

/// One scoreboard request: a league on a date.
#[derive(Debug, Clone, Copy)]
pub struct ScoreboardCall {
    pub endpoint: SportEndpoint,
    pub date: NaiveDate,
}

impl fmt::Display for ScoreboardCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.endpoint.path(), self.date.format("%Y%m%d"))
    }
}

/// Events from one scoreboard sweep plus the leagues it could not fully see.
#[derive(Debug, Clone, Default)]
pub struct ScoreboardReport {
    pub events: Vec<NormalizedEvent>,
    /// Display leagues (e.g. "NBA") with at least one failed call.
    pub failed_leagues: Vec<String>,
}

impl EspnScoresSource {
    /// Fetch every (league, date) scoreboard. `Err` only when all of them failed.
    pub async fn fetch_report(&self, query: &ScoresQuery) -> Result<ScoreboardReport> {
        let calls: Vec<_> = query
            .endpoints
            .iter()
            .flat_map(|endpoint| {
                query.dates.iter().map(move |date| {
                    let call = ScoreboardCall {
                        endpoint: *endpoint,
                        date: *date,
                    };
                    (call, self.fetch_scoreboard(call.endpoint, call.date))
                })
            })
            .collect();

        let result = fan_out(self.name(), calls).await;

        let mut failed_leagues: Vec<String> = Vec::new();
        for call in &result.failed {
            let league = call.endpoint.display_league;
            if !failed_leagues.iter().any(|l| l == league) {
                failed_leagues.push(league.to_string());
            }
        }

        info!(
            source = self.name(),
            events = result.records.len(),
            succeeded = result.succeeded,
            failed = result.failed.len(),
            failed_leagues = ?failed_leagues,
            "Scoreboards fetched"
        );

        Ok(ScoreboardReport {
            events: result.into_records(self.name())?,
            failed_leagues,
        })
    }
}

#[async_trait]
impl DataSource for EspnScoresSource {
    type Query = ScoresQuery;
    type Record = NormalizedEvent;

    async fn fetch(&self, query: &ScoresQuery) -> Result<Vec<NormalizedEvent>> {
        Ok(self.fetch_report(query).await?.events)
    }

    fn name(&self) -> &str {
        "espn_scoreboard"
    }
}

/// Map one upstream event into our shape. `None` when either team is missing.
fn normalize_event(event: &EspnEvent, endpoint: &SportEndpoint) -> Option<NormalizedEvent> {
    let competition = event.competitions.first()?;

    let home = competition.side("home")?;
    let away = competition.side("away")?;
    let home_team = home.team_name()?;
    let away_team = away.team_name()?;

    let status = competition.status.as_ref().or(event.status.as_ref());
    let status_type = status.and_then(|s| s.kind.as_ref());

    let signals = StatusSignals {
        name: status_type.and_then(|t| t.name.as_deref()),
        description: status_type.and_then(|t| t.description.as_deref()),
        state: status_type.and_then(|t| t.state.as_deref()),
        completed: status_type.and_then(|t| t.completed),
    };
    let classified = classify::classify_status(&signals);

    let id = event
        .id
        .as_ref()
        .and_then(value_to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    Some(NormalizedEvent {
        id,
        source: "ESPN".to_string(),
        home_team,
        away_team,
        home_score: home.score.as_ref().map(parse_score).unwrap_or(0),
        away_score: away.score.as_ref().map(parse_score).unwrap_or(0),
        status: classified,
        clock: status.and_then(|s| clock_descriptor(s, classified)),
        sport: classify::sport_display_name(endpoint.family).to_string(),
        league: endpoint.display_league.to_string(),
        start_time: event.date.as_deref().and_then(parse_espn_date),
        venue: competition
            .venue
            .as_ref()
            .and_then(|v| v.full_name.clone())
            .filter(|v| !v.trim().is_empty()),
        placeholder: false,
    })
}

fn clock_descriptor(status: &EspnStatus, classified: EventStatus) -> Option<String> {
    if let Some(detail) = status
        .kind
        .as_ref()
        .and_then(|t| t.short_detail.clone())
        .filter(|d| !d.trim().is_empty())
    {
        return Some(detail);
    }

    match (classified, status.period) {
        (EventStatus::Live, Some(period)) => {
            let clock = status.display_clock.as_deref().unwrap_or("");
            Some(format!("Q{period} {clock}").trim_end().to_string())
        }
        _ => None,
    }
}

/// ESPN sends scores as strings ("112") on scoreboards and numbers elsewhere.
fn parse_score(value: &Value) -> u32 {
    match value {
        Value::Number(n) => n.as_u64().map(|n| n.min(u32::MAX as u64) as u32).unwrap_or(0),
        Value::String(s) => s.trim().parse::<u32>().unwrap_or(0),
        _ => 0,
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// ESPN dates omit seconds ("2024-01-15T00:30Z"); accept both forms.
pub(crate) fn parse_espn_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%MZ")
        .ok()
        .map(|naive| naive.and_utc())
}

// --- ESPN API Response Types ---

#[derive(Debug, Deserialize)]
struct EspnScoreboard {
    #[serde(default)]
    events: Vec<EspnEvent>,
}

#[derive(Debug, Deserialize)]
struct EspnEvent {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    competitions: Vec<EspnCompetition>,
    #[serde(default)]
    status: Option<EspnStatus>,
}

#[derive(Debug, Deserialize)]
struct EspnCompetition {
    #[serde(default)]
    competitors: Vec<EspnCompetitor>,
    #[serde(default)]
    status: Option<EspnStatus>,
    #[serde(default)]
    venue: Option<EspnVenue>,
}

impl EspnCompetition {
    fn side(&self, home_away: &str) -> Option<&EspnCompetitor> {
        self.competitors
            .iter()
            .find(|c| c.home_away.as_deref() == Some(home_away))
    }
}

#[derive(Debug, Deserialize)]
struct EspnCompetitor {
    #[serde(rename = "homeAway", default)]
    home_away: Option<String>,
    #[serde(default)]
    team: Option<EspnTeam>,
    #[serde(default)]
    score: Option<Value>,
}

impl EspnCompetitor {
    fn team_name(&self) -> Option<String> {
        let team = self.team.as_ref()?;
        team.display_name
            .as_deref()
            .or(team.name.as_deref())
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EspnTeam {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EspnStatus {
    #[serde(default)]
    display_clock: Option<String>,
    #[serde(default)]
    period: Option<u32>,
    #[serde(rename = "type", default)]
    kind: Option<EspnStatusType>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EspnStatusType {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    completed: Option<bool>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    short_detail: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EspnVenue {
    #[serde(default)]
    full_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nba() -> SportEndpoint {
        classify::resolve_sport("nba")[0]
    }

    fn parse(json: &str) -> Vec<NormalizedEvent> {
        let board: EspnScoreboard = serde_json::from_str(json).unwrap();
        board
            .events
            .iter()
            .filter_map(|e| normalize_event(e, &nba()))
            .collect()
    }

    const LIVE_GAME: &str = r#"{
        "events": [{
            "id": "401585601",
            "date": "2024-01-15T00:30Z",
            "competitions": [{
                "competitors": [
                    {"homeAway": "home", "score": "88", "team": {"displayName": "Los Angeles Lakers"}},
                    {"homeAway": "away", "score": "91", "team": {"displayName": "Boston Celtics"}}
                ],
                "status": {
                    "displayClock": "5:12",
                    "period": 3,
                    "type": {"name": "STATUS_IN_PROGRESS", "state": "in", "completed": false}
                },
                "venue": {"fullName": "Crypto.com Arena"}
            }]
        }]
    }"#;

    #[test]
    fn test_normalize_live_game() {
        let events = parse(LIVE_GAME);
        assert_eq!(events.len(), 1);
        let e = &events[0];
        assert_eq!(e.id, "401585601");
        assert_eq!(e.home_team, "Los Angeles Lakers");
        assert_eq!(e.away_team, "Boston Celtics");
        assert_eq!(e.home_score, 88);
        assert_eq!(e.away_score, 91);
        assert_eq!(e.status, EventStatus::Live);
        assert_eq!(e.clock.as_deref(), Some("Q3 5:12"));
        assert_eq!(e.sport, "Basketball");
        assert_eq!(e.league, "NBA");
        assert_eq!(e.venue.as_deref(), Some("Crypto.com Arena"));
        assert!(e.start_time.is_some());
        assert!(!e.placeholder);
    }

    #[test]
    fn test_normalize_final_with_numeric_fields() {
        let json = r#"{"events": [{
            "id": 77,
            "competitions": [{
                "competitors": [
                    {"homeAway": "away", "score": 108, "team": {"name": "Celtics"}},
                    {"homeAway": "home", "score": 112, "team": {"name": "Lakers"}}
                ],
                "status": {"type": {"name": "STATUS_FINAL", "completed": true, "shortDetail": "Final"}}
            }]
        }]}"#;
        let events = parse(json);
        assert_eq!(events[0].id, "77");
        assert_eq!(events[0].home_team, "Lakers");
        assert_eq!(events[0].home_score, 112);
        assert_eq!(events[0].away_score, 108);
        assert_eq!(events[0].status, EventStatus::Final);
        assert_eq!(events[0].clock.as_deref(), Some("Final"));
    }

    #[test]
    fn test_postponed_game_stays_upcoming() {
        let json = r#"{"events": [{
            "id": "401",
            "competitions": [{
                "competitors": [
                    {"homeAway": "home", "score": "0", "team": {"displayName": "Lakers"}},
                    {"homeAway": "away", "score": "0", "team": {"displayName": "Celtics"}}
                ],
                "status": {"type": {
                    "name": "STATUS_POSTPONED", "state": "post", "completed": false,
                    "description": "Postponed", "shortDetail": "Postponed"
                }}
            }]
        }]}"#;
        let events = parse(json);
        assert_eq!(events[0].status, EventStatus::Upcoming);
        assert_eq!(events[0].clock.as_deref(), Some("Postponed"));
    }

    #[test]
    fn test_scoreboard_call_label() {
        let call = ScoreboardCall {
            endpoint: nba(),
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        };
        assert_eq!(call.to_string(), "basketball/nba@20240115");
    }

    #[test]
    fn test_skips_events_missing_a_team() {
        let json = r#"{"events": [
            {"id": "1", "competitions": [{"competitors": [
                {"homeAway": "home", "team": {"displayName": "Lakers"}}
            ]}]},
            {"id": "2", "competitions": [{"competitors": [
                {"homeAway": "home", "team": {"displayName": "  "}},
                {"homeAway": "away", "team": {"displayName": "Celtics"}}
            ]}]},
            {"id": "3", "competitions": []}
        ]}"#;
        assert!(parse(json).is_empty());
    }

    #[test]
    fn test_missing_id_and_scores_are_filled() {
        let json = r#"{"events": [{"competitions": [{"competitors": [
            {"homeAway": "home", "team": {"displayName": "Lakers"}, "score": "-4"},
            {"homeAway": "away", "team": {"displayName": "Celtics"}}
        ]}]}]}"#;
        let events = parse(json);
        assert!(!events[0].id.is_empty());
        assert_eq!(events[0].home_score, 0);
        assert_eq!(events[0].away_score, 0);
        assert_eq!(events[0].status, EventStatus::Upcoming);
    }

    #[test]
    fn test_empty_scoreboard() {
        assert!(parse("{}").is_empty());
    }

    #[test]
    fn test_parse_espn_date_forms() {
        assert!(parse_espn_date("2024-01-15T00:30Z").is_some());
        assert!(parse_espn_date("2024-01-15T00:30:00Z").is_some());
        assert!(parse_espn_date("tomorrow").is_none());
    }

    #[test]
    fn test_upcoming_window_dates() {
        let now = DateTime::parse_from_rfc3339("2024-03-31T23:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let query = ScoresQuery::upcoming_window(vec![nba()], now);
        let dates: Vec<String> = query
            .dates
            .iter()
            .map(|d| d.format("%Y%m%d").to_string())
            .collect();
        assert_eq!(dates, vec!["20240331", "20240401"]);
    }
}
