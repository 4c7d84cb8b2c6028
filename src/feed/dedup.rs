//! Near-duplicate removal for articles and status ranking for events.

use std::collections::HashSet;

use crate::feed::models::{NormalizedArticle, NormalizedEvent};

/// Number of leading title tokens that identify a story.
pub const FINGERPRINT_TOKENS: usize = 5;

/// Lossy story key: lowercase alphanumeric title, first five tokens.
///
/// Titles with no alphanumeric content fall back to the URL so that
/// unrelated junk does not collapse into a single empty fingerprint.
pub fn fingerprint(article: &NormalizedArticle) -> String {
    let normalized: String = article
        .title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();

    let key = normalized
        .split_whitespace()
        .take(FINGERPRINT_TOKENS)
        .collect::<Vec<_>>()
        .join(" ");

    if key.is_empty() {
        format!("url:{}", article.url.trim().to_lowercase())
    } else {
        key
    }
}

/// First-seen-wins dedup, stable with respect to input order.
pub fn dedup_articles(articles: Vec<NormalizedArticle>) -> Vec<NormalizedArticle> {
    let mut seen = HashSet::new();
    articles
        .into_iter()
        .filter(|a| seen.insert(fingerprint(a)))
        .collect()
}

/// Drop repeated upstream event ids (the same game from two date windows).
pub fn dedup_events(events: Vec<NormalizedEvent>) -> Vec<NormalizedEvent> {
    let mut seen = HashSet::new();
    events
        .into_iter()
        .filter(|e| seen.insert(e.id.clone()))
        .collect()
}

/// Stable sort live > upcoming > final, then cap.
pub fn rank_events(mut events: Vec<NormalizedEvent>, max: usize) -> Vec<NormalizedEvent> {
    events.sort_by_key(|e| e.status.priority());
    events.truncate(max);
    events
}

/// Newest first, then cap.
pub fn rank_articles(mut articles: Vec<NormalizedArticle>, max: usize) -> Vec<NormalizedArticle> {
    articles.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    articles.truncate(max);
    articles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::models::EventStatus;

    fn article(title: &str, source: &str) -> NormalizedArticle {
        let mut a = NormalizedArticle::unavailable(String::new());
        a.title = title.to_string();
        a.source = source.to_string();
        a.url = format!("https://{source}/{}", title.len());
        a.placeholder = false;
        a
    }

    fn event(id: &str, status: EventStatus) -> NormalizedEvent {
        let mut e = NormalizedEvent::unavailable();
        e.id = id.to_string();
        e.status = status;
        e.placeholder = false;
        e
    }

    #[test]
    fn test_fingerprint_ignores_case_and_punctuation() {
        let a = article("Lakers' LeBron James: scores 40 in win!", "ESPN");
        let b = article("lakers lebron james scores 40 points tonight", "Yahoo");
        assert_eq!(fingerprint(&a), "lakers lebron james scores 40");
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_empty_title_uses_url() {
        let mut a = article("!!!", "ESPN");
        a.url = "https://espn.com/x".to_string();
        assert_eq!(fingerprint(&a), "url:https://espn.com/x");
    }

    #[test]
    fn test_dedup_first_seen_wins() {
        let articles = vec![
            article("Chiefs beat Bills in overtime thriller", "ESPN"),
            article("Yankees sign ace", "ESPN"),
            article("Chiefs beat Bills in overtime again", "NewsAPI"),
        ];
        let deduped = dedup_articles(articles);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].source, "ESPN");
        assert_eq!(deduped[1].title, "Yankees sign ace");
    }

    #[test]
    fn test_dedup_is_a_fixed_point() {
        let articles = vec![
            article("A B C D E F", "x"),
            article("a b c d e g", "y"),
            article("Completely different story", "z"),
        ];
        let once = dedup_articles(articles);
        let twice = dedup_articles(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_rank_events_stable_priority_and_cap() {
        let events = vec![
            event("f1", EventStatus::Final),
            event("u1", EventStatus::Upcoming),
            event("l1", EventStatus::Live),
            event("u2", EventStatus::Upcoming),
            event("l2", EventStatus::Live),
        ];
        let ids: Vec<String> = rank_events(events, 4).into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["l1", "l2", "u1", "u2"]);
    }

    #[test]
    fn test_dedup_events_by_id() {
        let events = vec![
            event("1", EventStatus::Upcoming),
            event("1", EventStatus::Upcoming),
            event("2", EventStatus::Live),
        ];
        assert_eq!(dedup_events(events).len(), 2);
    }
}
