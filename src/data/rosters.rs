//! Teams and players directory from ESPN's `/teams` and roster endpoints.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use crate::data::classify::SportEndpoint;
use crate::data::{fan_out, DataSource, UpstreamClient};
use crate::error::UpstreamError;
use crate::feed::models::{Player, Team};

const TEAMS_LIMIT: u32 = 50;
const PLAYERS_PER_TEAM: usize = 3;

/// Rosters worth pulling per league; a full league sweep is too many calls.
const FEATURED_ROSTERS: &[(&str, &[&str])] = &[
    ("nba", &["lakers", "warriors", "celtics", "bulls"]),
    ("nfl", &["cowboys", "patriots", "packers", "chiefs"]),
    ("mlb", &["yankees", "dodgers", "red-sox", "giants"]),
];

#[derive(Debug, Clone, Default)]
pub struct DirectoryQuery {
    pub endpoints: Vec<SportEndpoint>,
}

pub struct EspnTeamsSource {
    client: UpstreamClient,
    base_url: String,
}

impl EspnTeamsSource {
    pub fn new(client: UpstreamClient, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn fetch_league(&self, endpoint: SportEndpoint) -> Result<Vec<Team>, UpstreamError> {
        let url = format!("{}/{}/teams", self.base_url, endpoint.path());
        let response: EspnTeamsResponse = self
            .client
            .get_json(&url, &[("limit", TEAMS_LIMIT.to_string())])
            .await?;

        Ok(response
            .sports
            .into_iter()
            .flat_map(|s| s.leagues)
            .flat_map(|l| l.teams)
            .filter_map(|entry| entry.into_team(endpoint.display_league))
            .collect())
    }
}

#[async_trait]
impl DataSource for EspnTeamsSource {
    type Query = DirectoryQuery;
    type Record = Team;

    async fn fetch(&self, query: &DirectoryQuery) -> Result<Vec<Team>> {
        let calls: Vec<_> = query
            .endpoints
            .iter()
            .filter(|e| e.family != "golf")
            .map(|e| (e.path(), self.fetch_league(*e)))
            .collect();

        let result = fan_out(self.name(), calls).await;
        info!(source = self.name(), teams = result.records.len(), "Teams fetched");
        result.into_records(self.name())
    }

    fn name(&self) -> &str {
        "espn_teams"
    }
}

pub struct EspnRosterSource {
    client: UpstreamClient,
    base_url: String,
}

impl EspnRosterSource {
    pub fn new(client: UpstreamClient, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn fetch_roster(
        &self,
        endpoint: SportEndpoint,
        slug: &'static str,
    ) -> Result<Vec<Player>, UpstreamError> {
        let url = format!("{}/{}/teams/{slug}/roster", self.base_url, endpoint.path());
        let roster: EspnRoster = self.client.get_json(&url, &[]).await?;

        let team = roster
            .team
            .and_then(|t| t.display_name)
            .unwrap_or_else(|| slug.to_string());

        Ok(roster
            .athletes
            .into_iter()
            .flat_map(RosterEntry::into_athletes)
            .filter_map(|a| a.into_player(&team, endpoint.display_league))
            .take(PLAYERS_PER_TEAM)
            .collect())
    }
}

#[async_trait]
impl DataSource for EspnRosterSource {
    type Query = DirectoryQuery;
    type Record = Player;

    async fn fetch(&self, query: &DirectoryQuery) -> Result<Vec<Player>> {
        let mut calls = Vec::new();
        for endpoint in &query.endpoints {
            let Some((_, slugs)) = FEATURED_ROSTERS.iter().find(|(code, _)| *code == endpoint.code) else {
                continue;
            };
            for slug in slugs.iter().copied() {
                calls.push((
                    format!("{}/{slug}", endpoint.code),
                    self.fetch_roster(*endpoint, slug),
                ));
            }
        }

        let result = fan_out(self.name(), calls).await;

        let mut players = result.records;
        if query.endpoints.iter().any(|e| e.family == "golf") {
            players.extend(golf_players());
        }

        info!(source = self.name(), players = players.len(), "Rosters fetched");
        Ok(players)
    }

    fn name(&self) -> &str {
        "espn_rosters"
    }
}

/// Golf has no team rosters upstream; tour players are listed directly.
pub fn golf_players() -> Vec<Player> {
    [
        ("Tiger Woods", "PGA Tour", "PGA"),
        ("Rory McIlroy", "PGA Tour", "PGA"),
        ("Scottie Scheffler", "PGA Tour", "PGA"),
        ("Viktor Hovland", "PGA Tour", "PGA"),
        ("Jon Rahm", "LIV Golf", "LIV"),
        ("Brooks Koepka", "LIV Golf", "LIV"),
        ("Dustin Johnson", "LIV Golf", "LIV"),
        ("Phil Mickelson", "LIV Golf", "LIV"),
    ]
    .into_iter()
    .map(|(name, team, league)| player(name, team, "Golfer", league))
    .collect()
}

/// Static directory used when every teams call fails.
pub fn fallback_teams() -> Vec<Team> {
    [
        ("Lakers", "NBA", "Los Angeles", "Western"),
        ("Warriors", "NBA", "Golden State", "Western"),
        ("Celtics", "NBA", "Boston", "Eastern"),
        ("Cowboys", "NFL", "Dallas", "NFC"),
        ("Patriots", "NFL", "New England", "AFC"),
        ("Chiefs", "NFL", "Kansas City", "AFC"),
        ("Yankees", "MLB", "New York", "AL"),
        ("Dodgers", "MLB", "Los Angeles", "NL"),
        ("Red Sox", "MLB", "Boston", "AL"),
        ("Duke Blue Devils", "NCAAM", "Durham", "ACC"),
        ("Kentucky Wildcats", "NCAAM", "Lexington", "SEC"),
        ("Alabama Crimson Tide", "CFB", "Tuscaloosa", "SEC"),
        ("Georgia Bulldogs", "CFB", "Athens", "SEC"),
    ]
    .into_iter()
    .map(|(name, league, city, conference)| Team {
        name: name.to_string(),
        league: league.to_string(),
        city: Some(city.to_string()),
        conference: Some(conference.to_string()),
        abbreviation: None,
        logo: None,
    })
    .collect()
}

/// Static directory used when every roster call fails.
pub fn fallback_players() -> Vec<Player> {
    [
        ("LeBron James", "Lakers", "SF", "NBA"),
        ("Stephen Curry", "Warriors", "PG", "NBA"),
        ("Patrick Mahomes", "Chiefs", "QB", "NFL"),
        ("Josh Allen", "Bills", "QB", "NFL"),
        ("Aaron Judge", "Yankees", "OF", "MLB"),
        ("Mookie Betts", "Dodgers", "OF", "MLB"),
        ("Tiger Woods", "PGA Tour", "Golfer", "PGA"),
        ("Jon Rahm", "LIV Golf", "Golfer", "LIV"),
    ]
    .into_iter()
    .map(|(name, team, position, league)| player(name, team, position, league))
    .collect()
}

fn player(name: &str, team: &str, position: &str, league: &str) -> Player {
    Player {
        name: name.to_string(),
        team: team.to_string(),
        position: position.to_string(),
        league: league.to_string(),
        jersey: None,
    }
}

// --- ESPN teams/roster response types ---

#[derive(Debug, Deserialize)]
struct EspnTeamsResponse {
    #[serde(default)]
    sports: Vec<EspnSport>,
}

#[derive(Debug, Deserialize)]
struct EspnSport {
    #[serde(default)]
    leagues: Vec<EspnLeague>,
}

#[derive(Debug, Deserialize)]
struct EspnLeague {
    #[serde(default)]
    teams: Vec<EspnTeamEntry>,
}

#[derive(Debug, Deserialize)]
struct EspnTeamEntry {
    team: EspnTeamDetail,
    #[serde(default)]
    group: Option<EspnNamed>,
}

impl EspnTeamEntry {
    fn into_team(self, league: &str) -> Option<Team> {
        let name = self
            .team
            .display_name
            .or(self.team.name)
            .filter(|n| !n.trim().is_empty())?;

        Some(Team {
            name,
            league: league.to_string(),
            city: self.team.location,
            conference: self.group.and_then(|g| g.name),
            abbreviation: self.team.abbreviation,
            logo: self.team.logos.into_iter().find_map(|l| l.href),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EspnTeamDetail {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    abbreviation: Option<String>,
    #[serde(default)]
    logos: Vec<EspnLogo>,
}

#[derive(Debug, Deserialize)]
struct EspnLogo {
    #[serde(default)]
    href: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EspnNamed {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EspnRoster {
    #[serde(default)]
    team: Option<EspnNamed>,
    #[serde(default)]
    athletes: Vec<RosterEntry>,
}

/// NBA rosters are flat; NFL/MLB rosters are grouped by unit.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RosterEntry {
    Group { items: Vec<EspnAthlete> },
    Athlete(EspnAthlete),
}

impl RosterEntry {
    fn into_athletes(self) -> Vec<EspnAthlete> {
        match self {
            Self::Group { items } => items,
            Self::Athlete(athlete) => vec![athlete],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EspnAthlete {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    position: Option<EspnPosition>,
    #[serde(default)]
    jersey: Option<String>,
}

impl EspnAthlete {
    fn into_player(self, team: &str, league: &str) -> Option<Player> {
        let name = self
            .display_name
            .or(self.full_name)
            .filter(|n| !n.trim().is_empty())?;

        Some(Player {
            name,
            team: team.to_string(),
            position: self
                .position
                .and_then(|p| p.abbreviation.or(p.name))
                .unwrap_or_else(|| "Unknown".to_string()),
            league: league.to_string(),
            jersey: self.jersey,
        })
    }
}

#[derive(Debug, Deserialize)]
struct EspnPosition {
    #[serde(default)]
    abbreviation: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_teams_response() {
        let json = r#"{"sports": [{"leagues": [{"teams": [
            {"team": {"displayName": "Boston Celtics", "location": "Boston",
                      "abbreviation": "BOS", "logos": [{"href": "https://logo/bos.png"}]}},
            {"team": {"name": "Lakers"}, "group": {"name": "Western"}},
            {"team": {}}
        ]}]}]}"#;
        let response: EspnTeamsResponse = serde_json::from_str(json).unwrap();
        let teams: Vec<Team> = response
            .sports
            .into_iter()
            .flat_map(|s| s.leagues)
            .flat_map(|l| l.teams)
            .filter_map(|t| t.into_team("NBA"))
            .collect();

        assert_eq!(teams.len(), 2);
        assert_eq!(teams[0].abbreviation.as_deref(), Some("BOS"));
        assert_eq!(teams[0].logo.as_deref(), Some("https://logo/bos.png"));
        assert_eq!(teams[1].conference.as_deref(), Some("Western"));
    }

    #[test]
    fn test_parse_flat_and_grouped_rosters() {
        let flat = r#"{"team": {"displayName": "Los Angeles Lakers"}, "athletes": [
            {"displayName": "LeBron James", "position": {"abbreviation": "SF"}, "jersey": "23"},
            {"displayName": "Anthony Davis", "position": {"abbreviation": "PF"}}
        ]}"#;
        let roster: EspnRoster = serde_json::from_str(flat).unwrap();
        let athletes: Vec<EspnAthlete> = roster.athletes.into_iter().flat_map(RosterEntry::into_athletes).collect();
        assert_eq!(athletes.len(), 2);
        let lebron = athletes.into_iter().next().and_then(|a| a.into_player("Lakers", "NBA")).unwrap();
        assert_eq!(lebron.position, "SF");
        assert_eq!(lebron.jersey.as_deref(), Some("23"));

        let grouped = r#"{"athletes": [
            {"position": "offense", "items": [{"fullName": "Patrick Mahomes", "position": {"name": "Quarterback"}}]},
            {"position": "defense", "items": [{"displayName": "Chris Jones"}]}
        ]}"#;
        let roster: EspnRoster = serde_json::from_str(grouped).unwrap();
        let players: Vec<Player> = roster
            .athletes
            .into_iter()
            .flat_map(RosterEntry::into_athletes)
            .filter_map(|a| a.into_player("Chiefs", "NFL"))
            .collect();
        assert_eq!(players.len(), 2);
        assert_eq!(players[0].position, "Quarterback");
        assert_eq!(players[1].position, "Unknown");
    }

    #[test]
    fn test_static_directories_are_populated() {
        assert!(fallback_teams().iter().any(|t| t.league == "CFB"));
        assert!(fallback_players().iter().any(|p| p.league == "LIV"));
        assert!(golf_players().iter().all(|p| p.position == "Golfer"));
    }
}
