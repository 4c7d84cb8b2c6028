//! Caller-facing aggregation surface.
//!
//! Every operation evaluates its fallback chain fresh, then dedups and ranks
//! the result. Aggregation calls never return an error: a total outage is
//! served as placeholder content.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::config::{AppConfig, FeedConfig, Secrets};
use crate::data::classify::{self, SportEndpoint};
use crate::data::news::{EspnNewsSource, NewsApiSource, NewsQuery};
use crate::data::rosters::{self, DirectoryQuery, EspnRosterSource, EspnTeamsSource};
use crate::data::rss::EspnRssSource;
use crate::data::scores::{EspnScoresSource, ScoresQuery};
use crate::data::{DataSource, UpstreamClient};
use crate::enrich::previews::{self, GamePreview};
use crate::enrich::Enricher;
use crate::feed::dedup::{dedup_articles, dedup_events, rank_articles, rank_events};
use crate::feed::fallback::{FallbackChain, FallbackOutcome, Stage, PLACEHOLDER_STAGE};
use crate::feed::ledger::StatusLedger;
use crate::feed::models::{NormalizedArticle, NormalizedEvent, Player, Team};
use crate::feed::snapshot::LastGoodSnapshot;
use crate::polls::{EventFeed, FeedSnapshot};

const MAX_TEAM_ARTICLES: usize = 10;
const MAX_TRENDING: usize = 8;
const DEFAULT_TRENDING: &[&str] = &["NBA", "NFL", "MLB", "College Football", "NBA Trade", "Injury Report"];
/// Team-name words this short ("new", "los") match too much to be useful.
const MIN_TEAM_WORD_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewsFilter {
    All,
    /// Sport code, e.g. "nba" or "ncaam".
    Sport(String),
    Team(String),
}

pub struct FeedService {
    config: FeedConfig,
    events: FallbackChain<ScoresQuery, NormalizedEvent>,
    scoreboard: Arc<EspnScoresSource>,
    snapshot: Arc<LastGoodSnapshot<ScoresQuery, NormalizedEvent>>,
    news: FallbackChain<NewsQuery, NormalizedArticle>,
    teams: FallbackChain<DirectoryQuery, Team>,
    players: FallbackChain<DirectoryQuery, Player>,
    ledger: StatusLedger,
    enricher: Option<Arc<Enricher>>,
}

impl FeedService {
    pub fn new(config: &AppConfig, secrets: &Secrets) -> Result<Self> {
        let client = UpstreamClient::new(&config.sources, &config.rate_limit)?;
        let sources = &config.sources;

        let scoreboard = Arc::new(EspnScoresSource::new(client.clone(), &sources.espn_site_base_url));
        let snapshot = Arc::new(LastGoodSnapshot::new(
            "last_good_scoreboard",
            config.feed.snapshot_max_age_seconds,
        ));
        let event_stages: Vec<Stage<ScoresQuery, NormalizedEvent>> =
            vec![scoreboard.clone() as Stage<_, _>, snapshot.clone() as Stage<_, _>];
        let events = FallbackChain::new("events", event_stages, || vec![NormalizedEvent::unavailable()]);

        let mut news_stages: Vec<Stage<NewsQuery, NormalizedArticle>> = vec![Arc::new(EspnNewsSource::new(
            client.clone(),
            &sources.espn_site_base_url,
            &sources.espn_news_url,
        )) as Stage<_, _>];
        match &secrets.news_api_key {
            Some(key) => news_stages.push(Arc::new(NewsApiSource::new(
                client.clone(),
                &sources.news_api_base_url,
                key.clone(),
                sources.news_queries.clone(),
                &sources.news_api_domains,
            ))),
            None => debug!("NEWS_API_KEY not set, keyword news stage disabled"),
        }
        news_stages.push(Arc::new(EspnRssSource::new(client.clone(), &sources.espn_rss_url)));
        let news = FallbackChain::new("news", news_stages, || {
            vec![NormalizedArticle::unavailable(classify::placeholder_image("Sports"))]
        });

        let teams = FallbackChain::new(
            "teams",
            vec![Arc::new(EspnTeamsSource::new(client.clone(), &sources.espn_site_base_url)) as Stage<_, _>],
            rosters::fallback_teams,
        );
        let players = FallbackChain::new(
            "players",
            vec![Arc::new(EspnRosterSource::new(client, &sources.espn_site_base_url)) as Stage<_, _>],
            rosters::fallback_players,
        );

        let enricher = Enricher::from_config(&config.enrichment, secrets)?.map(Arc::new);

        Ok(Self {
            config: config.feed.clone(),
            events,
            scoreboard,
            snapshot,
            news,
            teams,
            players,
            ledger: StatusLedger::new(),
            enricher,
        })
    }

    /// Upcoming and live events with the stage that served them.
    #[instrument(skip(self))]
    pub async fn live_events(&self, sport: Option<&str>) -> FallbackOutcome<NormalizedEvent> {
        let now = Utc::now();
        let endpoints = self.endpoints_for(sport, &self.config.default_sports);
        let leagues = display_leagues(&endpoints);

        let query = ScoresQuery::upcoming_window(endpoints, now);
        let outcome = self
            .events
            .run(&query, |event| leagues.contains(&event.league.as_str()))
            .await;

        // Only full, primary-served results may stand in for later outages.
        if sport.is_none() && outcome.stage == self.scoreboard.name() {
            self.snapshot.store(&outcome.records, now).await;
        }

        let events = self.ledger.apply(outcome.records, now).await;
        let events = rank_events(dedup_events(events), self.config.max_events);

        info!(stage = %outcome.stage, events = events.len(), "Live events served");
        FallbackOutcome {
            records: events,
            stage: outcome.stage,
        }
    }

    pub async fn fetch_live_events(&self, sport: Option<&str>) -> Vec<NormalizedEvent> {
        self.live_events(sport).await.records
    }

    /// Live and upcoming events involving `team`. May be empty.
    pub async fn fetch_team_events(&self, team: &str) -> Vec<NormalizedEvent> {
        let events: Vec<NormalizedEvent> = self
            .live_events(None)
            .await
            .records
            .into_iter()
            .filter(|e| !e.placeholder && e.involves_team(team))
            .collect();

        debug!(team, events = events.len(), "Team events filtered");
        events
    }

    #[instrument(skip(self))]
    pub async fn news(&self, filter: &NewsFilter) -> FallbackOutcome<NormalizedArticle> {
        let outcome = self.collect_news(filter).await;

        let articles = match &self.enricher {
            Some(enricher) => enricher.enrich_batch(outcome.records).await,
            None => outcome.records,
        };

        info!(stage = %outcome.stage, articles = articles.len(), "News served");
        FallbackOutcome {
            records: articles,
            stage: outcome.stage,
        }
    }

    /// Deduped, ranked and filtered news, before enrichment.
    async fn collect_news(&self, filter: &NewsFilter) -> FallbackOutcome<NormalizedArticle> {
        let (endpoints, sport) = match filter {
            NewsFilter::Sport(code) => (classify::resolve_sport(code), Some(code.as_str())),
            NewsFilter::All | NewsFilter::Team(_) => (classify::resolve_sports(&self.config.news_sports), None),
        };

        let query = NewsQuery { endpoints };
        let outcome = self
            .news
            .run(&query, |a| match sport {
                Some(code) => classify::matches_sport(code, &a.url, &a.title, &a.category, &a.summary),
                None => true,
            })
            .await;

        let articles = rank_articles(dedup_articles(outcome.records), self.config.max_articles);

        let articles = match filter {
            NewsFilter::Team(team) if !articles.iter().any(|a| a.placeholder) => {
                filter_team_articles(articles, team)
            }
            _ => articles,
        };

        FallbackOutcome {
            records: articles,
            stage: outcome.stage,
        }
    }

    pub async fn fetch_news(&self, filter: &NewsFilter) -> Vec<NormalizedArticle> {
        self.news(filter).await.records
    }

    /// Most frequent tags over current news, or a static list when there are none.
    pub async fn trending_topics(&self) -> Vec<String> {
        let outcome = self.collect_news(&NewsFilter::All).await;
        if outcome.is_placeholder() {
            return default_trending();
        }
        trending_from(&outcome.records)
    }

    /// Previews of upcoming games (live ones when nothing is scheduled).
    #[instrument(skip(self))]
    pub async fn game_previews(&self) -> Vec<GamePreview> {
        let now = Utc::now();
        let games = previews::preview_candidates(&self.live_events(None).await.records);
        if games.is_empty() {
            info!("No games to preview, serving static previews");
            return previews::fallback_previews(now);
        }

        match &self.enricher {
            Some(enricher) => enricher.preview_games(&games, now).await,
            None => previews::basic_previews(&games, now),
        }
    }

    pub async fn fetch_teams(&self, league: Option<&str>) -> Vec<Team> {
        let query = DirectoryQuery {
            endpoints: self.endpoints_for(league, &self.config.default_sports),
        };
        let leagues = display_leagues(&query.endpoints);
        let outcome = self
            .teams
            .run(&query, |t| league.is_none() || leagues.contains(&t.league.as_str()))
            .await;

        if outcome.is_placeholder() {
            return filter_by_league(outcome.records, league, |t| &t.league);
        }
        outcome.records
    }

    /// Featured roster players per league; golf is always included when unfiltered.
    pub async fn fetch_players(&self, league: Option<&str>) -> Vec<Player> {
        let mut codes = self.config.default_sports.clone();
        codes.push("pga".to_string());
        let query = DirectoryQuery {
            endpoints: self.endpoints_for(league, &codes),
        };
        let leagues = display_leagues(&query.endpoints);
        let outcome = self
            .players
            .run(&query, |p| league.is_none() || leagues.contains(&p.league.as_str()))
            .await;

        if outcome.is_placeholder() {
            return filter_by_league(outcome.records, league, |p| &p.league);
        }
        outcome.records
    }

    fn endpoints_for(&self, filter: Option<&str>, defaults: &[String]) -> Vec<SportEndpoint> {
        match filter {
            Some(code) => classify::resolve_sport(code),
            None => classify::resolve_sports(defaults),
        }
    }
}

#[async_trait]
impl EventFeed for FeedService {
    /// Yesterday through tomorrow, uncapped, placeholders removed.
    ///
    /// Reads the scoreboards directly so the poll core learns which leagues
    /// were unreachable; on a total outage the fresh snapshot stands in.
    async fn current_events(&self) -> FeedSnapshot {
        let now = Utc::now();
        let endpoints = classify::resolve_sports(&self.config.default_sports);
        let query = ScoresQuery::resolution_window(endpoints, now);

        let (events, stage, from_primary, failed_leagues) = match self.scoreboard.fetch_report(&query).await {
            Ok(report) => (
                report.events,
                self.scoreboard.name().to_string(),
                true,
                report.failed_leagues,
            ),
            Err(e) => {
                warn!(error = %e, "Scoreboards unreachable, resolving from snapshot only");
                let cached = self.snapshot.fresh(now).await;
                let stage = if cached.is_empty() {
                    PLACEHOLDER_STAGE
                } else {
                    self.snapshot.name()
                };
                (cached, stage.to_string(), false, Vec::new())
            }
        };

        let events = self.ledger.apply(events, now).await;
        FeedSnapshot {
            events: dedup_events(events).into_iter().filter(|e| !e.placeholder).collect(),
            stage,
            from_primary,
            failed_leagues,
        }
    }
}

fn display_leagues(endpoints: &[SportEndpoint]) -> Vec<&'static str> {
    endpoints.iter().map(|e| e.display_league).collect()
}

/// Whole-name matches first; failing that, any distinctive word of the name.
fn filter_team_articles(articles: Vec<NormalizedArticle>, team: &str) -> Vec<NormalizedArticle> {
    let needle = team.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }

    let direct: Vec<NormalizedArticle> = articles
        .iter()
        .filter(|a| {
            a.title.to_lowercase().contains(&needle)
                || a.content.to_lowercase().contains(&needle)
                || a.summary.to_lowercase().contains(&needle)
                || a.tags.iter().any(|t| t.to_lowercase().contains(&needle))
        })
        .take(MAX_TEAM_ARTICLES)
        .cloned()
        .collect();
    if !direct.is_empty() {
        return direct;
    }

    let words: Vec<&str> = needle
        .split_whitespace()
        .filter(|w| w.chars().count() >= MIN_TEAM_WORD_LEN)
        .collect();

    articles
        .into_iter()
        .filter(|a| {
            let title = a.title.to_lowercase();
            let content = a.content.to_lowercase();
            words.iter().any(|w| title.contains(w) || content.contains(w))
        })
        .take(MAX_TEAM_ARTICLES)
        .collect()
}

fn trending_from(articles: &[NormalizedArticle]) -> Vec<String> {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (order, tag) in articles.iter().flat_map(|a| a.tags.iter()).enumerate() {
        counts.entry(tag.as_str()).or_insert((0, order)).0 += 1;
    }
    if counts.is_empty() {
        return default_trending();
    }

    let mut ranked: Vec<(&str, (usize, usize))> = counts.into_iter().collect();
    // Frequency descending, first appearance breaks ties.
    ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));
    ranked
        .into_iter()
        .take(MAX_TRENDING)
        .map(|(tag, _)| tag.to_string())
        .collect()
}

fn default_trending() -> Vec<String> {
    DEFAULT_TRENDING.iter().map(|t| t.to_string()).collect()
}

/// Narrow a static directory to one league, keeping all of it if nothing matches.
fn filter_by_league<T>(records: Vec<T>, league: Option<&str>, key: impl Fn(&T) -> &String) -> Vec<T> {
    let Some(league) = league else {
        return records;
    };
    let wanted = classify::resolve_sport(league)
        .first()
        .map(|e| e.display_league.to_string())
        .unwrap_or_else(|| league.to_uppercase());

    if !records.iter().any(|r| key(r).eq_ignore_ascii_case(&wanted)) {
        return records;
    }
    records
        .into_iter()
        .filter(|r| key(r).eq_ignore_ascii_case(&wanted))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(title: &str, content: &str, tags: &[&str]) -> NormalizedArticle {
        let mut a = NormalizedArticle::unavailable(String::new());
        a.title = title.to_string();
        a.content = content.to_string();
        a.summary = String::new();
        a.tags = tags.iter().map(|t| t.to_string()).collect();
        a.placeholder = false;
        a
    }

    #[test]
    fn test_team_filter_prefers_whole_name() {
        let articles = vec![
            article("Tennessee Titans sign a kicker", "", &[]),
            article("Titans injury update", "", &[]),
        ];
        let out = filter_team_articles(articles, "Tennessee Titans");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "Tennessee Titans sign a kicker");
    }

    #[test]
    fn test_team_filter_partial_words() {
        let articles = vec![
            article("Titans injury update", "", &[]),
            article("New York Jets news", "", &[]),
        ];
        let out = filter_team_articles(articles, "Tennessee Titans");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "Titans injury update");

        // Short words alone never match.
        let out = filter_team_articles(vec![article("New deal", "", &[])], "New Era");
        assert!(out.is_empty());
    }

    #[test]
    fn test_team_filter_matches_tags() {
        let out = filter_team_articles(vec![article("Trade deadline", "", &["Lakers"])], "lakers");
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_trending_orders_by_frequency() {
        let articles = vec![
            article("a", "", &["Trade", "Injury"]),
            article("b", "", &["Injury"]),
            article("c", "", &["Draft", "Injury", "Trade"]),
        ];
        assert_eq!(trending_from(&articles), vec!["Injury", "Trade", "Draft"]);
    }

    #[test]
    fn test_trending_defaults_when_untagged() {
        assert_eq!(trending_from(&[article("a", "", &[])]), default_trending());
    }

    #[test]
    fn test_filter_by_league() {
        let teams = rosters::fallback_teams();
        let nba = filter_by_league(teams.clone(), Some("nba"), |t| &t.league);
        assert!(!nba.is_empty());
        assert!(nba.iter().all(|t| t.league == "NBA"));

        let unknown = filter_by_league(teams.clone(), Some("cricket"), |t| &t.league);
        assert_eq!(unknown.len(), teams.len());
    }
}
