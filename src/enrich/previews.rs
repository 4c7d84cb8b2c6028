//! Game previews: a predicted winner and a short analysis per matchup.
//!
//! Model output is only trusted for games we actually sent; anything naming
//! an unknown matchup or winner is dropped. Without a usable model answer
//! the previews are built from the scoreboard alone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::enrich::json::extract_json;
use crate::feed::models::{EventStatus, NormalizedEvent};

pub const MAX_PREVIEW_GAMES: usize = 4;

const MIN_CONFIDENCE: u8 = 50;
const MAX_CONFIDENCE: u8 = 95;
const HOME_EDGE_CONFIDENCE: u8 = 70;
const TIED_CONFIDENCE: u8 = 60;

const BASIC_TEMPLATES: &[&str] = &[
    "Based on recent performance trends, {home} has a slight advantage playing at home against {away}.",
    "{away} comes into this matchup with momentum, but {home}'s home advantage could be decisive.",
    "This {sport} game features two competitive teams, with {home} favored at home.",
    "{home} has been strong at home this season, giving them an edge over the visiting {away}.",
    "Both teams are well-matched, but {home}'s recent form suggests a slight advantage.",
    "{away} has shown good road performance, but {home}'s home record makes them the favorite.",
    "The statistical edge goes to {home} in this {sport} matchup, though {away} could provide an upset.",
];

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GamePreview {
    pub id: String,
    pub title: String,
    pub prediction: String,
    /// Percent, clamped to a plausible band.
    pub confidence: u8,
    pub sport: String,
    /// Away team first, as in "Away vs Home".
    pub teams: Vec<String>,
    pub predicted_winner: String,
    pub updated_at: DateTime<Utc>,
    /// Model name, "scoreboard" for rule-based previews, "static" for the fixed set.
    pub source: String,
}

/// Upcoming games when there are any, otherwise live ones; at most four.
pub fn preview_candidates(events: &[NormalizedEvent]) -> Vec<NormalizedEvent> {
    let pick = |status: EventStatus| -> Vec<NormalizedEvent> {
        events
            .iter()
            .filter(|e| !e.placeholder && e.status == status)
            .take(MAX_PREVIEW_GAMES)
            .cloned()
            .collect()
    };

    let upcoming = pick(EventStatus::Upcoming);
    if upcoming.is_empty() {
        pick(EventStatus::Live)
    } else {
        upcoming
    }
}

pub fn build_preview_prompt(games: &[NormalizedEvent]) -> String {
    let list = games
        .iter()
        .map(|g| format!("{} vs {} ({} - {})", g.away_team, g.home_team, g.league, g.status.as_str()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Analyze these real sports games and predict each one:\n\
         \n\
         {list}\n\
         \n\
         For each game consider team strengths, key matchups and home advantage,\n\
         then name a winner with a confidence between 65 and 85.\n\
         Use the team names exactly as written above.\n\
         \n\
         Reply with only this JSON object:\n\
         {{\"predictions\": [{{\"title\": \"Away vs Home\", \"prediction\": \"60-80 words of analysis\", \
         \"confidence\": 75, \"teams\": [\"Away\", \"Home\"], \"predictedWinner\": \"Home\"}}]}}"
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelPreview {
    #[serde(default)]
    prediction: String,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    teams: Vec<String>,
    #[serde(default)]
    predicted_winner: String,
}

/// Previews from model text. Accepts a bare array, `{"predictions": [...]}`,
/// or a single object. Each entry must name one of `games` and one of its teams.
pub fn parse_previews(
    text: &str,
    games: &[NormalizedEvent],
    provider: &str,
    now: DateTime<Utc>,
) -> Result<Vec<GamePreview>, String> {
    let value = extract_json(text).ok_or_else(|| "no JSON in response".to_string())?;
    let entries = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("predictions") {
            Some(Value::Array(items)) => items,
            Some(_) => return Err("predictions is not an array".to_string()),
            None => vec![Value::Object(map)],
        },
        _ => return Err("unexpected JSON shape".to_string()),
    };

    let mut previews: Vec<GamePreview> = Vec::new();
    for entry in entries {
        let Ok(model) = serde_json::from_value::<ModelPreview>(entry) else {
            continue;
        };
        let Some(game) = match_game(&model, games) else {
            continue;
        };
        if previews.iter().any(|p| p.id == game.id) || model.prediction.trim().is_empty() {
            continue;
        }
        let Some(winner) = [&game.home_team, &game.away_team]
            .into_iter()
            .find(|t| t.eq_ignore_ascii_case(model.predicted_winner.trim()))
        else {
            continue;
        };

        previews.push(GamePreview {
            id: game.id.clone(),
            title: matchup_title(game),
            prediction: model.prediction.trim().to_string(),
            confidence: clamp_confidence(model.confidence.unwrap_or(f64::from(HOME_EDGE_CONFIDENCE))),
            sport: game.league.clone(),
            teams: vec![game.away_team.clone(), game.home_team.clone()],
            predicted_winner: winner.clone(),
            updated_at: now,
            source: provider.to_string(),
        });
    }

    if previews.is_empty() {
        return Err("no preview matched a requested game".to_string());
    }
    Ok(previews)
}

/// A model entry belongs to the game whose two teams it lists, or failing
/// that, the game its winner plays in.
fn match_game<'a>(model: &ModelPreview, games: &'a [NormalizedEvent]) -> Option<&'a NormalizedEvent> {
    let named = |game: &NormalizedEvent, name: &str| {
        game.home_team.eq_ignore_ascii_case(name.trim()) || game.away_team.eq_ignore_ascii_case(name.trim())
    };

    games
        .iter()
        .find(|g| model.teams.len() == 2 && model.teams.iter().all(|t| named(g, t)))
        .or_else(|| games.iter().find(|g| named(g, &model.predicted_winner)))
}

fn clamp_confidence(raw: f64) -> u8 {
    if !raw.is_finite() {
        return HOME_EDGE_CONFIDENCE;
    }
    raw.round().clamp(f64::from(MIN_CONFIDENCE), f64::from(MAX_CONFIDENCE)) as u8
}

fn matchup_title(game: &NormalizedEvent) -> String {
    format!("{} vs {}", game.away_team, game.home_team)
}

/// Rule-based previews: a live leader is favored by its margin, otherwise
/// the home side gets the edge.
pub fn basic_previews(games: &[NormalizedEvent], now: DateTime<Utc>) -> Vec<GamePreview> {
    games
        .iter()
        .take(MAX_PREVIEW_GAMES)
        .enumerate()
        .map(|(index, game)| {
            let (winner, confidence, prediction) = basic_call(game, index);
            GamePreview {
                id: game.id.clone(),
                title: matchup_title(game),
                prediction,
                confidence,
                sport: game.league.clone(),
                teams: vec![game.away_team.clone(), game.home_team.clone()],
                predicted_winner: winner.to_string(),
                updated_at: now,
                source: "scoreboard".to_string(),
            }
        })
        .collect()
}

fn basic_call(game: &NormalizedEvent, index: usize) -> (&str, u8, String) {
    let margin = game.home_score.abs_diff(game.away_score);

    if game.status == EventStatus::Live && margin > 0 {
        let (leader, trailer) = if game.home_score > game.away_score {
            (&game.home_team, &game.away_team)
        } else {
            (&game.away_team, &game.home_team)
        };
        let clock = game.clock.as_deref().unwrap_or("in progress");
        let confidence = clamp_confidence(f64::from(HOME_EDGE_CONFIDENCE) + f64::from(margin.min(15)));
        let prediction = format!(
            "{leader} lead {trailer} {}-{} ({clock}) and are favored to hold on.",
            game.home_score.max(game.away_score),
            game.home_score.min(game.away_score),
        );
        return (leader.as_str(), confidence, prediction);
    }

    let confidence = if game.status == EventStatus::Live {
        TIED_CONFIDENCE
    } else {
        HOME_EDGE_CONFIDENCE
    };
    let prediction = BASIC_TEMPLATES[index % BASIC_TEMPLATES.len()]
        .replace("{home}", &game.home_team)
        .replace("{away}", &game.away_team)
        .replace("{sport}", &game.league);
    (game.home_team.as_str(), confidence, prediction)
}

/// Fixed previews for when there is no game to preview at all.
pub fn fallback_previews(now: DateTime<Utc>) -> Vec<GamePreview> {
    let fixed = [
        (
            "Lakers",
            "Celtics",
            "NBA",
            72,
            "The Lakers' home court and recent form make them slight favorites against the visiting Celtics.",
        ),
        (
            "Chiefs",
            "Bills",
            "NFL",
            68,
            "Both teams have excellent quarterbacks, but playoff experience and home field give the Chiefs an edge.",
        ),
        (
            "Yankees",
            "Red Sox",
            "MLB",
            75,
            "A strong bullpen should help the Yankees secure a win in this division rivalry.",
        ),
    ];

    fixed
        .into_iter()
        .enumerate()
        .map(|(index, (favorite, other, sport, confidence, prediction))| GamePreview {
            id: format!("static-{}", index + 1),
            title: format!("{favorite} vs {other}"),
            prediction: prediction.to_string(),
            confidence,
            sport: sport.to_string(),
            teams: vec![favorite.to_string(), other.to_string()],
            predicted_winner: favorite.to_string(),
            updated_at: now,
            source: "static".to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(id: &str, status: EventStatus, home: (&str, u32), away: (&str, u32)) -> NormalizedEvent {
        let mut e = NormalizedEvent::unavailable();
        e.id = id.to_string();
        e.source = "ESPN".to_string();
        e.home_team = home.0.to_string();
        e.home_score = home.1;
        e.away_team = away.0.to_string();
        e.away_score = away.1;
        e.status = status;
        e.clock = Some("Q3 5:12".to_string());
        e.sport = "Basketball".to_string();
        e.league = "NBA".to_string();
        e.placeholder = false;
        e
    }

    fn slate() -> Vec<NormalizedEvent> {
        vec![
            game("1", EventStatus::Upcoming, ("Los Angeles Lakers", 0), ("Boston Celtics", 0)),
            game("2", EventStatus::Upcoming, ("Miami Heat", 0), ("New York Knicks", 0)),
        ]
    }

    #[test]
    fn test_candidates_prefer_upcoming() {
        let mut events = slate();
        events.push(game("3", EventStatus::Live, ("Denver Nuggets", 50), ("Utah Jazz", 40)));
        let picked = preview_candidates(&events);
        assert_eq!(picked.iter().map(|g| g.id.as_str()).collect::<Vec<_>>(), vec!["1", "2"]);

        let live_only = preview_candidates(&events[2..]);
        assert_eq!(live_only.len(), 1);
        assert_eq!(live_only[0].id, "3");

        assert!(preview_candidates(&[NormalizedEvent::unavailable()]).is_empty());
    }

    #[test]
    fn test_candidates_capped() {
        let events: Vec<NormalizedEvent> = (0..7)
            .map(|i| game(&i.to_string(), EventStatus::Upcoming, ("A", 0), ("B", 0)))
            .collect();
        assert_eq!(preview_candidates(&events).len(), MAX_PREVIEW_GAMES);
    }

    #[test]
    fn test_parse_wrapped_predictions() {
        let text = r#"```json
{"predictions": [
  {"title": "x", "prediction": "Boston's defense travels.", "confidence": 91.6,
   "teams": ["Boston Celtics", "Los Angeles Lakers"], "predictedWinner": "boston celtics"},
  {"title": "y", "prediction": "Unknown game.", "confidence": 70,
   "teams": ["Sacramento Kings", "Phoenix Suns"], "predictedWinner": "Phoenix Suns"}
]}
```"#;
        let previews = parse_previews(text, &slate(), "gemini", Utc::now()).unwrap();
        assert_eq!(previews.len(), 1);
        assert_eq!(previews[0].id, "1");
        assert_eq!(previews[0].title, "Boston Celtics vs Los Angeles Lakers");
        assert_eq!(previews[0].predicted_winner, "Boston Celtics");
        assert_eq!(previews[0].confidence, 92);
        assert_eq!(previews[0].source, "gemini");
    }

    #[test]
    fn test_parse_bare_array_and_single_object() {
        let array = r#"[{"prediction": "Heat at home.", "confidence": 30, "predictedWinner": "Miami Heat"}]"#;
        let previews = parse_previews(array, &slate(), "openai", Utc::now()).unwrap();
        assert_eq!(previews[0].id, "2");
        assert_eq!(previews[0].confidence, MIN_CONFIDENCE);

        let single = r#"{"prediction": "Lakers roll.", "predictedWinner": "Los Angeles Lakers"}"#;
        let previews = parse_previews(single, &slate(), "openai", Utc::now()).unwrap();
        assert_eq!(previews[0].id, "1");
        assert_eq!(previews[0].confidence, HOME_EDGE_CONFIDENCE);
    }

    #[test]
    fn test_parse_rejects_unmatched_winner() {
        let text = r#"[{"prediction": "Nobody.", "teams": ["Miami Heat", "New York Knicks"], "predictedWinner": "Orlando Magic"}]"#;
        assert!(parse_previews(text, &slate(), "gemini", Utc::now()).is_err());
        assert!(parse_previews("no idea", &slate(), "gemini", Utc::now()).is_err());
    }

    #[test]
    fn test_basic_previews_favor_home_or_leader() {
        let games = vec![
            game("1", EventStatus::Upcoming, ("Los Angeles Lakers", 0), ("Boston Celtics", 0)),
            game("2", EventStatus::Live, ("Miami Heat", 80), ("New York Knicks", 98)),
            game("3", EventStatus::Live, ("Denver Nuggets", 50), ("Utah Jazz", 50)),
        ];
        let previews = basic_previews(&games, Utc::now());

        assert_eq!(previews[0].predicted_winner, "Los Angeles Lakers");
        assert_eq!(previews[0].confidence, HOME_EDGE_CONFIDENCE);
        assert_eq!(previews[0].teams, vec!["Boston Celtics", "Los Angeles Lakers"]);

        assert_eq!(previews[1].predicted_winner, "New York Knicks");
        assert_eq!(previews[1].confidence, 85);
        assert!(previews[1].prediction.contains("98-80"));

        assert_eq!(previews[2].predicted_winner, "Denver Nuggets");
        assert_eq!(previews[2].confidence, TIED_CONFIDENCE);

        // Same input, same output.
        let again = basic_previews(&games, previews[0].updated_at);
        assert_eq!(again, previews);
    }

    #[test]
    fn test_fallback_previews() {
        let previews = fallback_previews(Utc::now());
        assert_eq!(previews.len(), 3);
        assert!(previews.iter().all(|p| p.teams.contains(&p.predicted_winner)));
        assert_eq!(previews[0].title, "Lakers vs Celtics");
    }
}
