//! Data-driven classification tables.
//!
//! Upstream vocabularies are inconsistent across sports and providers, so
//! every heuristic here is a lookup table rather than a chain of conditionals.
//! New spellings are added to a table without touching control flow.

use crate::feed::models::EventStatus;

/// One upstream scoreboard/news/teams endpoint family for a sport code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SportEndpoint {
    pub code: &'static str,
    /// ESPN sport family path segment, e.g. "basketball".
    pub family: &'static str,
    /// ESPN league path segment, e.g. "mens-college-basketball".
    pub league: &'static str,
    /// League tag shown to users, e.g. "NCAAM".
    pub display_league: &'static str,
}

impl SportEndpoint {
    pub fn path(&self) -> String {
        format!("{}/{}", self.family, self.league)
    }
}

pub const SPORT_ENDPOINTS: &[SportEndpoint] = &[
    SportEndpoint { code: "nfl", family: "football", league: "nfl", display_league: "NFL" },
    SportEndpoint { code: "nba", family: "basketball", league: "nba", display_league: "NBA" },
    SportEndpoint { code: "mlb", family: "baseball", league: "mlb", display_league: "MLB" },
    SportEndpoint { code: "nhl", family: "hockey", league: "nhl", display_league: "NHL" },
    SportEndpoint { code: "ncaam", family: "basketball", league: "mens-college-basketball", display_league: "NCAAM" },
    SportEndpoint { code: "cfb", family: "football", league: "college-football", display_league: "CFB" },
    SportEndpoint { code: "wnba", family: "basketball", league: "wnba", display_league: "WNBA" },
    SportEndpoint { code: "mls", family: "soccer", league: "usa.1", display_league: "MLS" },
    SportEndpoint { code: "pga", family: "golf", league: "pga", display_league: "PGA" },
];

/// Resolve a short sport code into the upstream endpoints needed to query it.
///
/// Exact code match first; unknown codes fall back to substring matching
/// against family and league tokens ("basketball" -> nba, ncaam, wnba).
pub fn resolve_sport(code: &str) -> Vec<SportEndpoint> {
    let code = code.trim().to_lowercase();
    if code.is_empty() {
        return Vec::new();
    }

    if let Some(exact) = SPORT_ENDPOINTS.iter().find(|e| e.code == code) {
        return vec![*exact];
    }

    SPORT_ENDPOINTS
        .iter()
        .filter(|e| {
            e.family.contains(&code)
                || e.league.contains(&code)
                || code.contains(e.league)
                || e.display_league.to_lowercase() == code
        })
        .copied()
        .collect()
}

/// Resolve a list of sport codes, dropping duplicates, preserving order.
pub fn resolve_sports(codes: &[String]) -> Vec<SportEndpoint> {
    let mut endpoints: Vec<SportEndpoint> = Vec::new();
    for code in codes {
        for endpoint in resolve_sport(code) {
            if !endpoints.contains(&endpoint) {
                endpoints.push(endpoint);
            }
        }
    }
    endpoints
}

/// Display name for an ESPN sport family.
pub fn sport_display_name(family: &str) -> &'static str {
    match family.to_lowercase().as_str() {
        "football" => "Football",
        "basketball" => "Basketball",
        "baseball" => "Baseball",
        "hockey" => "Hockey",
        "soccer" => "Soccer",
        "golf" => "Golf",
        _ => "Sports",
    }
}

// --- Status classification ---

/// Games that stopped or never started. ESPN reports these with a "post"
/// state, but no result exists, so they stay upcoming until they resume
/// or their poll expires. Checked before every other rule.
const STATUS_INTERRUPTED_TOKENS: &[&str] = &[
    "postponed",
    "canceled",
    "cancelled",
    "suspended",
    "delayed",
    "forfeit",
];

/// Prioritized status rules. First rule whose token appears in any status
/// text wins; order matters (live before final before upcoming).
const STATUS_TEXT_RULES: &[(EventStatus, &[&str])] = &[
    (
        EventStatus::Live,
        &[
            "status_in_progress",
            "status_halftime",
            "status_end_period",
            "status_first_half",
            "status_second_half",
            "status_overtime",
            "in progress",
            "in_progress",
            "halftime",
            "end of",
        ],
    ),
    (
        EventStatus::Final,
        &[
            "status_final",
            "status_full_time",
            "status_final_pen",
            "status_final_aet",
            "final",
            "full time",
            "completed",
        ],
    ),
];

/// State flag rules (ESPN `status.type.state`). "post" is deliberately
/// absent: it also covers interrupted games, so final needs final text or
/// the completed flag.
const STATUS_STATE_RULES: &[(&str, EventStatus)] = &[("in", EventStatus::Live)];

/// Upstream status signals for one event. Any field may be missing.
#[derive(Debug, Default, Clone)]
pub struct StatusSignals<'a> {
    pub name: Option<&'a str>,
    pub description: Option<&'a str>,
    pub state: Option<&'a str>,
    pub completed: Option<bool>,
}

/// Map upstream status vocabulary to {live, upcoming, final}.
///
/// Postponed/canceled/suspended text -> upcoming; explicit in-progress
/// text or an "in" state -> live; explicit final text or the completed
/// flag -> final; otherwise upcoming.
pub fn classify_status(signals: &StatusSignals<'_>) -> EventStatus {
    let texts: Vec<String> = [signals.name, signals.description]
        .into_iter()
        .flatten()
        .map(|t| t.to_lowercase())
        .collect();

    if texts.iter().any(|t| contains_any(t, STATUS_INTERRUPTED_TOKENS)) {
        return EventStatus::Upcoming;
    }

    let state = signals.state.map(|s| s.to_lowercase());

    for (status, tokens) in STATUS_TEXT_RULES {
        let text_hit = texts.iter().any(|t| contains_any(t, tokens));
        let state_hit = STATUS_STATE_RULES
            .iter()
            .any(|(flag, s)| s == status && state.as_deref() == Some(*flag));
        let completed_hit = *status == EventStatus::Final && signals.completed == Some(true);

        if text_hit || state_hit || completed_hit {
            return *status;
        }
    }

    EventStatus::Upcoming
}

// --- News category classification ---

pub const DEFAULT_CATEGORY: &str = "Sports";

/// Category keyword table. First matching category wins, so the more
/// specific buckets come before the generic ones ("college football" must
/// not land in Soccer via "football").
const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "College Sports",
        &["college", "ncaa", "march madness", "final four", "ncb", "ncf"],
    ),
    (
        "NBA",
        &[
            "nba", "basketball", "lakers", "warriors", "celtics", "nets", "knicks", "bulls",
            "heat", "spurs", "lebron", "curry", "durant",
        ],
    ),
    (
        "NFL",
        &[
            "nfl", "american football", "super bowl", "quarterback", "touchdown", "patriots",
            "cowboys", "jets", "chiefs", "packers", "steelers", "mahomes", "brady",
        ],
    ),
    (
        "MLB",
        &[
            "mlb", "baseball", "yankees", "dodgers", "red sox", "astros", "mets",
            "world series", "pitcher", "home run",
        ],
    ),
    (
        "Hockey",
        &[
            "nhl", "hockey", "bruins", "maple leafs", "penguins", "blackhawks", "stanley cup",
            "ovechkin",
        ],
    ),
    (
        "Tennis",
        &[
            "tennis", "wimbledon", "us open", "french open", "australian open", "djokovic",
            "federer", "nadal", "serena",
        ],
    ),
    (
        "Golf",
        &["golf", "pga", "masters", "tiger woods", "rory mcilroy", "liv"],
    ),
    ("Olympics", &["olympics", "olympic", "gold medal", "paralympics"]),
    (
        "Soccer",
        &[
            "soccer", "football", "messi", "ronaldo", "premier league", "champions league",
            "fifa", "mls", "manchester", "liverpool", "barcelona", "real madrid",
        ],
    ),
];

/// Infer a news category from free text. Falls back to "Sports".
pub fn categorize(text: &str) -> &'static str {
    let t = text.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, keywords)| contains_any(&t, keywords))
        .map(|(category, _)| *category)
        .unwrap_or(DEFAULT_CATEGORY)
}

const SPORTS_CONTENT_KEYWORDS: &[&str] = &[
    "nba", "nfl", "mlb", "nhl", "mls", "basketball", "football", "baseball", "hockey",
    "soccer", "tennis", "golf", "olympics", "playoff", "championship", "game", "match",
    "season", "draft", "trade", "injury", "coach", "player", "team", "score", "win", "loss",
    "victory", "defeat", "sports", "athletic", "league", "tournament", "stadium", "field",
    "court", "arena",
];

/// Whether free text reads like sports coverage at all.
pub fn is_sports_content(text: &str) -> bool {
    contains_any(&text.to_lowercase(), SPORTS_CONTENT_KEYWORDS)
}

// --- Sport filters for news ---

/// URL/title/category patterns per navigation sport code.
const SPORT_URL_PATTERNS: &[(&str, &[&str])] = &[
    ("nba", &["nba", "basketball"]),
    ("nfl", &["nfl", "football"]),
    ("mlb", &["mlb", "baseball"]),
    ("nhl", &["nhl", "hockey"]),
    ("ncaam", &["mens-college-basketball", "college-basketball", "ncb"]),
    ("cfb", &["college-football", "cfb"]),
    ("wnba", &["wnba", "womens-basketball"]),
    ("pga", &["golf", "pga"]),
    ("liv", &["golf", "liv"]),
];

/// Relevance keywords per sport, matched against title and summary.
const SPORT_RELEVANCE_TERMS: &[(&str, &[&str])] = &[
    ("nba", &["nba", "basketball", "lebron", "curry", "lakers", "warriors", "celtics", "knicks", "nets", "heat"]),
    ("nfl", &["nfl", "football", "quarterback", "touchdown", "super bowl", "patriots", "cowboys", "packers", "chiefs"]),
    ("mlb", &["mlb", "baseball", "world series", "yankees", "dodgers", "red sox", "giants", "astros"]),
    ("ncaam", &["college basketball", "ncaa basketball", "march madness", "duke", "unc", "kentucky", "gonzaga"]),
    ("cfb", &["college football", "ncaa football", "college football playoff", "alabama", "georgia", "ohio state", "clemson"]),
    ("pga", &["golf", "pga", "masters", "tiger woods", "pga tour", "rory mcilroy"]),
    ("nhl", &["nhl", "hockey", "stanley cup", "rangers", "bruins", "penguins", "blackhawks"]),
    ("tennis", &["tennis", "wimbledon", "djokovic", "federer"]),
    ("soccer", &["soccer", "mls", "usmnt", "world cup", "fifa", "premier league"]),
];

/// Whether an article (by url, title, category, summary) belongs to a sport code.
pub fn matches_sport(sport: &str, url: &str, title: &str, category: &str, summary: &str) -> bool {
    let sport = sport.trim().to_lowercase();
    let url = url.to_lowercase();
    let title = title.to_lowercase();
    let category = category.to_lowercase();

    let patterns: Vec<&str> = lookup(SPORT_URL_PATTERNS, &sport)
        .map(|p| p.to_vec())
        .unwrap_or_else(|| vec![sport.as_str()]);

    let pattern_hit = patterns.iter().any(|p| {
        url.contains(&format!("/{p}/")) || title.contains(p) || category.contains(p)
    });
    if pattern_hit {
        return true;
    }

    let text = format!("{title} {}", summary.to_lowercase());
    lookup(SPORT_RELEVANCE_TERMS, &sport)
        .map(|terms| contains_any(&text, terms))
        .unwrap_or(false)
}

// --- Tags ---

/// (tag, trigger words). Tag order is output order.
const TAG_RULES: &[(&str, &[&str])] = &[
    ("Trade", &["trade", "traded"]),
    ("Draft", &["draft", "drafted"]),
    ("Injury", &["injury", "injured"]),
    ("Playoffs", &["playoff", "postseason"]),
    ("Championship", &["championship", "title"]),
    ("Award", &["mvp", "award"]),
    ("Contract", &["contract", "signing"]),
    ("Coaching", &["coach", "coaching"]),
    ("Record", &["record", "milestone"]),
    ("Breaking", &["breaking"]),
    ("Analysis", &["analysis", "report"]),
    ("Super Bowl", &["super bowl"]),
    ("World Series", &["world series"]),
    ("March Madness", &["march madness", "final four"]),
    ("Major", &["masters", "major championship"]),
    ("Stanley Cup", &["stanley cup"]),
    ("Olympics", &["olympics"]),
];

pub const MAX_TAGS: usize = 4;

/// Derive up to four tags from free text.
pub fn extract_tags(text: &str) -> Vec<String> {
    let t = text.to_lowercase();
    TAG_RULES
        .iter()
        .filter(|(_, triggers)| contains_any(&t, triggers))
        .map(|(tag, _)| tag.to_string())
        .take(MAX_TAGS)
        .collect()
}

// --- Placeholder images ---

const DEFAULT_IMAGE: &str =
    "https://images.unsplash.com/photo-1461896836934-ffe607ba8211?w=800&h=400&fit=crop";

/// Category/league -> stock image. Keys are lowercase.
const PLACEHOLDER_IMAGES: &[(&str, &str)] = &[
    ("nba", "https://images.unsplash.com/photo-1546519638-68e109498ffc?w=800&h=400&fit=crop"),
    ("basketball", "https://images.unsplash.com/photo-1546519638-68e109498ffc?w=800&h=400&fit=crop"),
    ("nfl", "https://images.unsplash.com/photo-1567593810070-7a3d471af022?w=800&h=400&fit=crop"),
    ("football", "https://images.unsplash.com/photo-1567593810070-7a3d471af022?w=800&h=400&fit=crop"),
    ("mlb", "https://images.unsplash.com/photo-1566577739112-5180d4bf9390?w=800&h=400&fit=crop"),
    ("wnba", "https://images.unsplash.com/photo-1594623930572-300a3011d9ae?w=800&h=400&fit=crop"),
    ("college sports", "https://images.unsplash.com/photo-1577223625816-7546f13df25d?w=800&h=400&fit=crop"),
    ("college-football", "https://images.unsplash.com/photo-1577223625816-7546f13df25d?w=800&h=400&fit=crop"),
    ("mens-college-basketball", "https://images.unsplash.com/photo-1571019613454-1cb2f99b2d8b?w=800&h=400&fit=crop"),
    ("hockey", "https://images.unsplash.com/photo-1515703407324-5f753afd8be8?w=800&h=400&fit=crop"),
    ("nhl", "https://images.unsplash.com/photo-1515703407324-5f753afd8be8?w=800&h=400&fit=crop"),
    ("golf", "https://images.unsplash.com/photo-1535131749006-b7f58c99034b?w=800&h=400&fit=crop"),
    ("tennis", "https://images.unsplash.com/photo-1542144582-1ba00456b5e3?w=800&h=400&fit=crop"),
    ("soccer", "https://images.unsplash.com/photo-1431324155629-1a6deb1dec8d?w=800&h=400&fit=crop"),
    ("mls", "https://images.unsplash.com/photo-1431324155629-1a6deb1dec8d?w=800&h=400&fit=crop"),
    ("mma", "https://images.unsplash.com/photo-1549719386-74dfcbf7dbed?w=800&h=400&fit=crop"),
    ("olympics", "https://images.unsplash.com/photo-1461896836934-ffe607ba8211?w=800&h=400&fit=crop"),
];

/// Deterministic stock image for a category. Never empty.
pub fn placeholder_image(category: &str) -> String {
    let key = category.trim().to_lowercase();
    lookup(PLACEHOLDER_IMAGES, &key)
        .unwrap_or(DEFAULT_IMAGE)
        .to_string()
}

/// Check if text contains any of the given keywords.
fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| text.contains(kw))
}

fn lookup<T: Copy>(table: &[(&str, T)], key: &str) -> Option<T> {
    table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_exact_sport_code() {
        let endpoints = resolve_sport("ncaam");
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].path(), "basketball/mens-college-basketball");
        assert_eq!(endpoints[0].display_league, "NCAAM");
    }

    #[test]
    fn test_resolve_unknown_code_by_substring() {
        let codes: Vec<&str> = resolve_sport("basketball").iter().map(|e| e.code).collect();
        assert_eq!(codes, vec!["nba", "ncaam", "wnba"]);

        let college: Vec<&str> = resolve_sport("college").iter().map(|e| e.code).collect();
        assert_eq!(college, vec!["ncaam", "cfb"]);

        assert!(resolve_sport("curling").is_empty());
        assert!(resolve_sport("").is_empty());
    }

    #[test]
    fn test_resolve_sports_dedups() {
        let codes = vec!["nba".to_string(), "basketball".to_string()];
        let endpoints = resolve_sports(&codes);
        assert_eq!(endpoints.len(), 3);
        assert_eq!(endpoints[0].code, "nba");
    }

    #[test]
    fn test_classify_live_spellings() {
        for name in ["STATUS_IN_PROGRESS", "STATUS_HALFTIME", "STATUS_END_PERIOD"] {
            let signals = StatusSignals {
                name: Some(name),
                ..Default::default()
            };
            assert_eq!(classify_status(&signals), EventStatus::Live, "{name}");
        }

        let by_state = StatusSignals {
            state: Some("in"),
            ..Default::default()
        };
        assert_eq!(classify_status(&by_state), EventStatus::Live);
    }

    #[test]
    fn test_classify_final_spellings() {
        for name in ["STATUS_FINAL", "STATUS_FULL_TIME", "Final/OT"] {
            let signals = StatusSignals {
                name: Some(name),
                ..Default::default()
            };
            assert_eq!(classify_status(&signals), EventStatus::Final, "{name}");
        }

        let completed = StatusSignals {
            name: Some("STATUS_SCHEDULED"),
            completed: Some(true),
            ..Default::default()
        };
        assert_eq!(classify_status(&completed), EventStatus::Final);
    }

    #[test]
    fn test_classify_defaults_to_upcoming() {
        let scheduled = StatusSignals {
            name: Some("STATUS_SCHEDULED"),
            state: Some("pre"),
            completed: Some(false),
            description: Some("Scheduled"),
        };
        assert_eq!(classify_status(&scheduled), EventStatus::Upcoming);
        assert_eq!(classify_status(&StatusSignals::default()), EventStatus::Upcoming);
    }

    #[test]
    fn test_interrupted_games_are_not_final() {
        for (name, description) in [
            ("STATUS_POSTPONED", "Postponed"),
            ("STATUS_CANCELED", "Canceled"),
            ("STATUS_SUSPENDED", "Suspended"),
            ("STATUS_DELAYED", "Rain Delay"),
        ] {
            let signals = StatusSignals {
                name: Some(name),
                description: Some(description),
                state: Some("post"),
                completed: Some(false),
            };
            assert_eq!(classify_status(&signals), EventStatus::Upcoming, "{name}");
        }

        // A bare "post" state is not enough to call a game final.
        let bare_post = StatusSignals {
            state: Some("post"),
            ..Default::default()
        };
        assert_eq!(classify_status(&bare_post), EventStatus::Upcoming);

        let finished = StatusSignals {
            state: Some("post"),
            completed: Some(true),
            ..Default::default()
        };
        assert_eq!(classify_status(&finished), EventStatus::Final);
    }

    #[test]
    fn test_categorize_first_match_wins() {
        assert_eq!(categorize("LeBron leads Lakers past Celtics"), "NBA");
        assert_eq!(categorize("Chiefs clinch AFC on late touchdown"), "NFL");
        assert_eq!(categorize("Alabama climbs in college football rankings"), "College Sports");
        assert_eq!(categorize("Messi scores twice for Inter Miami"), "Soccer");
        assert_eq!(categorize("Local marathon draws record crowd"), "Sports");
    }

    #[test]
    fn test_matches_sport_by_url_and_terms() {
        assert!(matches_sport(
            "ncaam",
            "https://www.espn.com/mens-college-basketball/story/_/id/1",
            "Duke holds on",
            "Sports",
            ""
        ));
        assert!(matches_sport("nba", "", "Curry drops 40", "Sports", ""));
        assert!(!matches_sport("nhl", "https://espn.com/nba/story", "Lakers win", "NBA", ""));
        // Unknown codes match on the code itself.
        assert!(matches_sport("cricket", "", "Cricket world cup final", "Sports", ""));
    }

    #[test]
    fn test_extract_tags_limited_to_four() {
        let tags = extract_tags("Breaking: injured MVP traded after playoff record contract");
        assert_eq!(tags.len(), MAX_TAGS);
        assert_eq!(tags[0], "Trade");

        assert!(extract_tags("Quiet night around the league").is_empty());
    }

    #[test]
    fn test_placeholder_image_never_empty() {
        assert!(placeholder_image("NBA").contains("1546519638"));
        assert_eq!(placeholder_image("Unknown Category"), DEFAULT_IMAGE);
        assert!(!placeholder_image("").is_empty());
    }

    #[test]
    fn test_sports_content_filter() {
        assert!(is_sports_content("Team announces new coach"));
        assert!(!is_sports_content("Stock market rallies on rate cut"));
    }
}
