//! Pulling a JSON object out of free-form model output.

use serde::Deserialize;
use serde_json::Value;

/// Fields a provider returns for one rewritten article.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct EnhancedArticle {
    pub title: String,
    pub content: String,
    pub summary: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Parse model text into an `EnhancedArticle`, or explain why not.
pub fn parse_enhanced(text: &str) -> Result<EnhancedArticle, String> {
    let value = extract_json(text).ok_or_else(|| "no JSON object in response".to_string())?;
    let article: EnhancedArticle =
        serde_json::from_value(value).map_err(|e| format!("unexpected JSON shape: {e}"))?;

    if article.title.trim().is_empty() || article.content.trim().is_empty() {
        return Err("empty title or content".to_string());
    }
    Ok(article)
}

/// First JSON object or array in `text`, preferring a fenced code block.
pub fn extract_json(text: &str) -> Option<Value> {
    fenced_block(text).or_else(|| first_embedded_value(text))
}

fn fenced_block(text: &str) -> Option<Value> {
    let (_, after_fence) = text.split_once("```")?;
    // The rest of the opening line is a language tag.
    let body = after_fence.split_once('\n').map_or(after_fence, |(_, rest)| rest);
    let (block, _) = body.split_once("```")?;
    serde_json::from_str::<Value>(block.trim())
        .ok()
        .filter(is_container)
}

/// Try each `{` or `[` in turn; the stream deserializer stops at the end of
/// the first complete value, so trailing prose is ignored.
fn first_embedded_value(text: &str) -> Option<Value> {
    text.char_indices()
        .filter(|(_, ch)| matches!(ch, '{' | '['))
        .find_map(|(i, _)| {
            serde_json::Deserializer::from_str(&text[i..])
                .into_iter::<Value>()
                .next()
                .and_then(|parsed| parsed.ok())
                .filter(is_container)
        })
}

fn is_container(value: &Value) -> bool {
    value.is_object() || value.is_array()
}

/// Cut at a char boundary at or before `max_len` bytes and append "...".
pub fn truncate(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        return text.to_string();
    }
    let mut boundary = max_len;
    while !text.is_char_boundary(boundary) {
        boundary -= 1;
    }
    format!("{}...", text[..boundary].trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_json_raw() {
        let text = r#"some text {"key": "value"} more text"#;
        assert_eq!(extract_json(text), Some(json!({"key": "value"})));
    }

    #[test]
    fn test_extract_json_fenced() {
        let text = "Here you go:\n```json\n{\"a\": 1}\n```\nanything else?";
        assert_eq!(extract_json(text), Some(json!({"a": 1})));
    }

    #[test]
    fn test_extract_json_braces_inside_strings() {
        let text = r#"{"title": "Score {tied}", "n": 2} trailing"#;
        assert_eq!(extract_json(text), Some(json!({"title": "Score {tied}", "n": 2})));
    }

    #[test]
    fn test_extract_json_array_after_bracketed_prose() {
        let text = r#"Picks [draft]: [{"id": "1"}, {"id": "2"}]"#;
        assert_eq!(extract_json(text), Some(json!([{"id": "1"}, {"id": "2"}])));
    }

    #[test]
    fn test_extract_json_bad_fence_falls_back_to_scan() {
        let text = "```\nnot json\n```\nretry: {\"ok\": true}";
        assert_eq!(extract_json(text), Some(json!({"ok": true})));
    }

    #[test]
    fn test_extract_json_none() {
        assert!(extract_json("no json here").is_none());
        assert!(extract_json("{ broken").is_none());
        assert!(extract_json("```\n42\n```").is_none());
    }

    #[test]
    fn test_parse_enhanced() {
        let text = r#"```json
{"title": "Lakers win 112-108", "content": "Full story.", "summary": "Short.", "tags": ["NBA"]}
```"#;
        let article = parse_enhanced(text).unwrap();
        assert_eq!(article.title, "Lakers win 112-108");
        assert_eq!(article.tags, vec!["NBA"]);

        assert!(parse_enhanced(r#"{"title": "", "content": "x", "summary": "y"}"#).is_err());
        assert!(parse_enhanced(r#"{"headline": "wrong shape"}"#).is_err());
    }

    #[test]
    fn test_truncate_multibyte_safe() {
        assert_eq!(truncate("short", 150), "short");
        let long = "é".repeat(100);
        let cut = truncate(&long, 151);
        assert!(cut.ends_with("..."));
        assert!(cut.len() <= 154);
    }
}
