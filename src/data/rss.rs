//! ESPN syndication feed (RSS 2.0), the secondary news stage.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rss::{Channel, Item};
use tracing::{debug, info};

use crate::data::news::{build_article, NewsQuery, RawStory};
use crate::data::{DataSource, UpstreamClient};
use crate::feed::models::NormalizedArticle;

const MAX_ITEMS: usize = 50;

pub struct EspnRssSource {
    client: UpstreamClient,
    url: String,
}

impl EspnRssSource {
    pub fn new(client: UpstreamClient, url: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl DataSource for EspnRssSource {
    type Query = NewsQuery;
    type Record = NormalizedArticle;

    async fn fetch(&self, _query: &NewsQuery) -> Result<Vec<NormalizedArticle>> {
        let body = self.client.get_text(&self.url, &[]).await?;
        let articles: Vec<NormalizedArticle> = parse_rss_items(&body)?
            .into_iter()
            .map(build_article)
            .collect();

        info!(source = self.name(), articles = articles.len(), "RSS feed parsed");
        Ok(articles)
    }

    fn name(&self) -> &str {
        "espn_rss"
    }
}

/// Stories from an RSS document; items need both a title and a description.
fn parse_rss_items(xml: &str) -> Result<Vec<RawStory>> {
    let channel = Channel::read_from(xml.as_bytes()).context("Malformed RSS feed")?;

    let total = channel.items().len();
    let stories: Vec<RawStory> = channel
        .items()
        .iter()
        .filter_map(story_from_item)
        .take(MAX_ITEMS)
        .collect();

    debug!(items = total, stories = stories.len(), "RSS items read");
    Ok(stories)
}

fn story_from_item(item: &Item) -> Option<RawStory> {
    let title = non_empty(item.title())?;
    let description = non_empty(item.description())?;

    Some(RawStory {
        title,
        description,
        url: non_empty(item.link()).unwrap_or_default(),
        published_at: item
            .pub_date()
            .and_then(|raw| DateTime::parse_from_rfc2822(raw.trim()).ok())
            .map(|dt| dt.with_timezone(&Utc)),
        image_url: item.enclosure().and_then(|e| non_empty(Some(e.url()))),
        source: "ESPN".to_string(),
    })
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>ESPN</title>
<item>
  <title><![CDATA[Celtics &amp; Heat renew rivalry]]></title>
  <description><![CDATA[<p>Boston   hosts Miami tonight.</p>]]></description>
  <link>https://www.espn.com/nba/story/_/id/123</link>
  <pubDate>Mon, 15 Jan 2024 18:30:00 GMT</pubDate>
  <enclosure url="https://a.espncdn.com/photo.jpg" type="image/jpeg" length="0"/>
</item>
<item>
  <title>Title only, no description</title>
  <link>https://www.espn.com/nfl/story/_/id/456</link>
</item>
<item>
  <title>Padres sign reliever</title>
  <description>One-year deal.</description>
  <link>https://www.espn.com/mlb/story/_/id/789</link>
</item>
</channel></rss>"#;

    #[test]
    fn test_parse_rss_items() {
        let items = parse_rss_items(FEED).unwrap();
        assert_eq!(items.len(), 2);

        // CDATA is literal; entity decoding happens once, in clean_html.
        assert_eq!(items[0].title, "Celtics &amp; Heat renew rivalry");
        assert_eq!(items[0].url, "https://www.espn.com/nba/story/_/id/123");
        assert!(items[0].published_at.is_some());
        assert_eq!(items[0].image_url.as_deref(), Some("https://a.espncdn.com/photo.jpg"));

        assert_eq!(items[1].title, "Padres sign reliever");
        assert!(items[1].published_at.is_none());
        assert!(items[1].image_url.is_none());
    }

    #[test]
    fn test_rss_items_normalize_cleanly() {
        let article = build_article(parse_rss_items(FEED).unwrap().remove(0));
        assert_eq!(article.title, "Celtics & Heat renew rivalry");
        assert_eq!(article.summary, "Boston hosts Miami tonight.");
        assert_eq!(article.category, "NBA");
    }

    #[test]
    fn test_attributes_and_escaped_text() {
        let feed = r#"<rss version="2.0"><channel><title>ESPN</title>
<item>
  <title type="text">Ja&#8217;Marr Chase &#x2014; Bengals</title>
  <description>&lt;p&gt;Cincinnati wins &amp;amp; moves on.&lt;/p&gt;</description>
</item>
</channel></rss>"#;
        let items = parse_rss_items(feed).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Ja\u{2019}Marr Chase \u{2014} Bengals");

        let article = build_article(items.into_iter().next().unwrap());
        // XML escaping, then HTML escaping inside the markup.
        assert_eq!(article.summary, "Cincinnati wins & moves on.");
    }

    #[test]
    fn test_garbage_feed_is_an_error() {
        assert!(parse_rss_items("<html>not a feed</html>").is_err());
    }
}
