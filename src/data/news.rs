//! News sources.
//!
//! `EspnNewsSource` pulls ESPN's aggregate and per-league news JSON;
//! `NewsApiSource` runs keyword searches against NewsAPI when a key is set.
//! Both normalize into `NormalizedArticle` through `build_article`.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use scraper::Html;
use serde::Deserialize;
use tracing::info;

use crate::data::classify::{self, SportEndpoint};
use crate::data::{fan_out, DataSource, UpstreamClient};
use crate::error::UpstreamError;
use crate::feed::models::NormalizedArticle;

const AGGREGATE_LIMIT: u32 = 50;
const LEAGUE_LIMIT: u32 = 25;
const NEWS_API_PAGE_SIZE: u32 = 5;

#[derive(Debug, Clone, Default)]
pub struct NewsQuery {
    /// Per-league news feeds to pull in addition to the aggregate feed.
    pub endpoints: Vec<SportEndpoint>,
}

/// Upstream story fields before normalization.
#[derive(Debug, Default)]
pub(crate) struct RawStory {
    pub title: String,
    pub description: String,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
    pub source: String,
}

/// Plain text of an HTML fragment: tags dropped, entities decoded once,
/// whitespace collapsed.
pub(crate) fn clean_html(raw: &str) -> String {
    let fragment = Html::parse_fragment(raw);
    let text: String = fragment.root_element().text().collect();
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize one story: keyword category, tags, never-empty image.
pub(crate) fn build_article(story: RawStory) -> NormalizedArticle {
    let title = clean_html(&story.title);
    let description = clean_html(&story.description);

    let category = classify::categorize(&format!("{title} {description} {}", story.url));
    let tags = classify::extract_tags(&format!("{title} {description}"));

    let image_url = story
        .image_url
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| classify::placeholder_image(category));

    let content = format!("{description} {}", story.url).trim().to_string();
    let summary = if description.is_empty() {
        "Latest sports news update".to_string()
    } else {
        description
    };

    NormalizedArticle {
        title,
        content,
        summary,
        category: category.to_string(),
        image_url,
        tags,
        published_at: story.published_at.unwrap_or_else(Utc::now),
        source: story.source,
        url: story.url,
        placeholder: false,
    }
}

pub struct EspnNewsSource {
    client: UpstreamClient,
    site_base_url: String,
    aggregate_url: String,
}

impl EspnNewsSource {
    pub fn new(client: UpstreamClient, site_base_url: &str, aggregate_url: &str) -> Self {
        Self {
            client,
            site_base_url: site_base_url.trim_end_matches('/').to_string(),
            aggregate_url: aggregate_url.to_string(),
        }
    }

    async fn fetch_feed(&self, url: String, limit: u32) -> Result<Vec<NormalizedArticle>, UpstreamError> {
        let feed: EspnNewsFeed = self
            .client
            .get_json(&url, &[("limit", limit.to_string())])
            .await?;

        Ok(feed
            .articles
            .into_iter()
            .filter_map(EspnNewsItem::into_story)
            .map(build_article)
            .collect())
    }
}

#[async_trait]
impl DataSource for EspnNewsSource {
    type Query = NewsQuery;
    type Record = NormalizedArticle;

    async fn fetch(&self, query: &NewsQuery) -> Result<Vec<NormalizedArticle>> {
        let mut calls = vec![(
            "aggregate".to_string(),
            self.fetch_feed(self.aggregate_url.clone(), AGGREGATE_LIMIT),
        )];

        for endpoint in &query.endpoints {
            // Golf news lives at the family level, not under a league.
            let path = if endpoint.family == "golf" {
                endpoint.family.to_string()
            } else {
                endpoint.path()
            };
            calls.push((
                path.clone(),
                self.fetch_feed(format!("{}/{path}/news", self.site_base_url), LEAGUE_LIMIT),
            ));
        }

        let result = fan_out(self.name(), calls).await;

        info!(
            source = self.name(),
            articles = result.records.len(),
            succeeded = result.succeeded,
            failed = result.failed.len(),
            "ESPN news fetched"
        );

        result.into_records(self.name())
    }

    fn name(&self) -> &str {
        "espn_news"
    }
}

pub struct NewsApiSource {
    client: UpstreamClient,
    base_url: String,
    api_key: SecretString,
    queries: Vec<String>,
    domains: String,
}

impl NewsApiSource {
    pub fn new(
        client: UpstreamClient,
        base_url: &str,
        api_key: SecretString,
        queries: Vec<String>,
        domains: &[String],
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            queries,
            domains: domains.join(","),
        }
    }

    async fn search(&self, term: &str) -> Result<Vec<NormalizedArticle>, UpstreamError> {
        let url = format!("{}/v2/everything", self.base_url);
        let yesterday = (Utc::now() - Duration::days(1)).format("%Y-%m-%d").to_string();

        let mut params = vec![
            ("q", term.to_string()),
            ("from", yesterday),
            ("sortBy", "publishedAt".to_string()),
            ("language", "en".to_string()),
            ("pageSize", NEWS_API_PAGE_SIZE.to_string()),
            ("apiKey", self.api_key.expose_secret().to_string()),
        ];
        if !self.domains.is_empty() {
            params.push(("domains", self.domains.clone()));
        }

        let response: NewsApiResponse = self.client.get_json(&url, &params).await?;

        if response.status.as_deref() == Some("error") {
            return Err(UpstreamError::Decode {
                url,
                reason: response
                    .message
                    .unwrap_or_else(|| "NewsAPI reported an error".to_string()),
            });
        }

        Ok(response
            .articles
            .into_iter()
            .filter_map(NewsApiArticle::into_story)
            .map(build_article)
            .collect())
    }
}

#[async_trait]
impl DataSource for NewsApiSource {
    type Query = NewsQuery;
    type Record = NormalizedArticle;

    async fn fetch(&self, _query: &NewsQuery) -> Result<Vec<NormalizedArticle>> {
        let calls: Vec<_> = self
            .queries
            .iter()
            .map(|term| (term.clone(), self.search(term)))
            .collect();

        let result = fan_out(self.name(), calls).await;

        info!(
            source = self.name(),
            articles = result.records.len(),
            succeeded = result.succeeded,
            failed = result.failed.len(),
            "NewsAPI searches settled"
        );

        result.into_records(self.name())
    }

    fn name(&self) -> &str {
        "news_api"
    }
}

// --- ESPN news response types ---

#[derive(Debug, Deserialize)]
struct EspnNewsFeed {
    #[serde(default, alias = "items", alias = "news")]
    articles: Vec<EspnNewsItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EspnNewsItem {
    #[serde(default)]
    headline: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    published: Option<String>,
    #[serde(default)]
    last_modified: Option<String>,
    #[serde(default)]
    links: Option<EspnLinks>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    images: Vec<EspnImage>,
}

impl EspnNewsItem {
    fn into_story(self) -> Option<RawStory> {
        let title = self
            .headline
            .or(self.title)
            .filter(|t| !t.trim().is_empty())?;

        let url = self
            .links
            .and_then(|l| l.web)
            .and_then(|w| w.href)
            .or(self.url)
            .unwrap_or_else(|| "https://espn.com".to_string());

        let published_at = self
            .published
            .or(self.last_modified)
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|dt| dt.with_timezone(&Utc));

        let image_url = self
            .images
            .into_iter()
            .find_map(|img| img.url.or(img.href));

        Some(RawStory {
            title,
            description: self.description.or(self.summary).unwrap_or_default(),
            url,
            published_at,
            image_url,
            source: "ESPN".to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct EspnLinks {
    #[serde(default)]
    web: Option<EspnHref>,
}

#[derive(Debug, Deserialize)]
struct EspnHref {
    #[serde(default)]
    href: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EspnImage {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    href: Option<String>,
}

// --- NewsAPI response types ---

#[derive(Debug, Deserialize)]
struct NewsApiResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<NewsApiArticle>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewsApiArticle {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    url_to_image: Option<String>,
    #[serde(default)]
    published_at: Option<String>,
    #[serde(default)]
    source: Option<NewsApiSourceName>,
}

#[derive(Debug, Deserialize)]
struct NewsApiSourceName {
    #[serde(default)]
    name: Option<String>,
}

impl NewsApiArticle {
    /// Drops removed items and anything that does not read like sports.
    fn into_story(self) -> Option<RawStory> {
        let title = self.title.filter(|t| !t.trim().is_empty())?;
        let description = self.description.filter(|d| !d.trim().is_empty())?;

        if title.contains("[Removed]") {
            return None;
        }
        if !classify::is_sports_content(&format!("{title} {description}")) {
            return None;
        }

        Some(RawStory {
            title,
            description,
            url: self.url.unwrap_or_default(),
            published_at: self
                .published_at
                .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
                .map(|dt| dt.with_timezone(&Utc)),
            image_url: self.url_to_image,
            source: self
                .source
                .and_then(|s| s.name)
                .unwrap_or_else(|| "NewsAPI".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_html() {
        assert_eq!(
            clean_html("<b>Big</b>&nbsp;win &quot;tonight&quot;\n  at   home"),
            "Big win \"tonight\" at home"
        );
        assert_eq!(clean_html("plain"), "plain");
    }

    #[test]
    fn test_clean_html_numeric_entities() {
        assert_eq!(
            clean_html("Ja&#8217;Marr Chase &#x2014; Bengals"),
            "Ja\u{2019}Marr Chase \u{2014} Bengals"
        );
    }

    #[test]
    fn test_clean_html_decodes_once() {
        assert_eq!(clean_html("&amp;lt;br&amp;gt;"), "&lt;br&gt;");
        assert_eq!(clean_html("<p>Score: 3 &lt; 5</p>"), "Score: 3 < 5");
    }

    #[test]
    fn test_build_article_fills_image_and_category() {
        let article = build_article(RawStory {
            title: "Lakers trade for veteran guard".to_string(),
            description: "The Lakers made a move before the deadline.".to_string(),
            url: "https://www.espn.com/nba/story/_/id/1".to_string(),
            ..Default::default()
        });

        assert_eq!(article.category, "NBA");
        assert!(!article.image_url.is_empty());
        assert!(article.tags.contains(&"Trade".to_string()));
        assert!(article.content.ends_with("https://www.espn.com/nba/story/_/id/1"));
        assert_eq!(article.summary, "The Lakers made a move before the deadline.");
    }

    #[test]
    fn test_build_article_default_summary() {
        let article = build_article(RawStory {
            title: "Quick hit".to_string(),
            ..Default::default()
        });
        assert_eq!(article.summary, "Latest sports news update");
        assert_eq!(article.category, "Sports");
    }

    #[test]
    fn test_espn_feed_field_aliases() {
        let json = r#"{"items": [
            {"title": "Chiefs win", "summary": "KC rolls", "url": "https://espn.com/nfl/x",
             "published": "2024-01-15T12:00:00Z", "images": [{"href": "https://img/1.jpg"}]},
            {"description": "no headline at all"}
        ]}"#;
        let feed: EspnNewsFeed = serde_json::from_str(json).unwrap();
        let stories: Vec<RawStory> = feed.articles.into_iter().filter_map(EspnNewsItem::into_story).collect();
        assert_eq!(stories.len(), 1);
        assert_eq!(stories[0].title, "Chiefs win");
        assert_eq!(stories[0].description, "KC rolls");
        assert_eq!(stories[0].image_url.as_deref(), Some("https://img/1.jpg"));
        assert!(stories[0].published_at.is_some());
    }

    #[test]
    fn test_espn_feed_prefers_web_link() {
        let json = r#"{"articles": [
            {"headline": "Duke advances", "links": {"web": {"href": "https://espn.com/mens-college-basketball/a"}}}
        ]}"#;
        let feed: EspnNewsFeed = serde_json::from_str(json).unwrap();
        let story = feed.articles.into_iter().next().and_then(EspnNewsItem::into_story).unwrap();
        assert_eq!(story.url, "https://espn.com/mens-college-basketball/a");
    }

    #[test]
    fn test_news_api_filters_removed_and_non_sports() {
        let json = r#"{"status": "ok", "articles": [
            {"title": "[Removed]", "description": "[Removed]"},
            {"title": "Markets rally", "description": "Stocks climb on earnings"},
            {"title": "Yankees rally late", "description": "Baseball walk-off in the Bronx",
             "source": {"name": "ESPN"}, "url": "https://espn.com/mlb/x"}
        ]}"#;
        let response: NewsApiResponse = serde_json::from_str(json).unwrap();
        let stories: Vec<RawStory> = response
            .articles
            .into_iter()
            .filter_map(NewsApiArticle::into_story)
            .collect();
        assert_eq!(stories.len(), 1);
        assert_eq!(stories[0].source, "ESPN");
    }
}
