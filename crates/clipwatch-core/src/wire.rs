//! The two line formats of the system contract: the pipe-delimited chat
//! stream that sources emit, and the one-line JSON records that clip
//! sinks consume.

use crate::types::{ChatMessage, ClipEvent};

/// Parse one canonical chat line: `<timestamp_ms>|<username>|<content>`.
///
/// The content field runs to end of line and may itself contain `|`.
/// Returns `None` for lines with fewer than three fields, unparseable
/// timestamps, or negative timestamps; callers skip and count those.
pub fn parse_line(line: &str) -> Option<ChatMessage> {
    let mut fields = line.splitn(3, '|');
    let timestamp = fields.next()?;
    let username = fields.next()?;
    let content = fields.next()?;

    let timestamp_ms: i64 = timestamp.trim().parse().ok()?;
    if timestamp_ms < 0 {
        return None;
    }

    Some(ChatMessage {
        timestamp_ms,
        username: username.to_string(),
        content: content.to_string(),
    })
}

/// Render a message as a canonical chat line. Field separators and line
/// breaks inside the message are replaced with spaces so the output is
/// always one well-formed record.
pub fn format_line(message: &ChatMessage) -> String {
    format!(
        "{}|{}|{}",
        message.timestamp_ms,
        sanitize(&message.username, true),
        sanitize(&message.content, false),
    )
}

fn sanitize(field: &str, strip_pipes: bool) -> String {
    field
        .chars()
        .map(|ch| match ch {
            '|' if strip_pipes => ' ',
            '\r' | '\n' => ' ',
            ch => ch,
        })
        .collect()
}

/// Canonical one-line JSON for an emitted clip:
/// `{"start_ms":..,"end_ms":..,"score":..,"category":"..","keywords":[..]}`.
/// The score is fixed to two decimal places.
pub fn clip_to_json(event: &ClipEvent) -> String {
    let keywords =
        serde_json::to_string(&event.keywords).unwrap_or_else(|_| "[]".to_string());
    format!(
        "{{\"start_ms\":{},\"end_ms\":{},\"score\":{:.2},\"category\":\"{}\",\"keywords\":{}}}",
        event.start_ms,
        event.end_ms,
        event.score,
        event.category.as_str(),
        keywords
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClipCategory;

    #[test]
    fn parses_well_formed_line() {
        let message = parse_line("1700000000000|chatfan|W").unwrap();
        assert_eq!(message.timestamp_ms, 1_700_000_000_000);
        assert_eq!(message.username, "chatfan");
        assert_eq!(message.content, "W");
    }

    #[test]
    fn content_keeps_embedded_pipes_and_may_be_empty() {
        let message = parse_line("1000|user|left | right").unwrap();
        assert_eq!(message.content, "left | right");

        let message = parse_line("1000|user|").unwrap();
        assert_eq!(message.content, "");
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(parse_line("").is_none());
        assert!(parse_line("1000").is_none());
        assert!(parse_line("1000|user").is_none());
        assert!(parse_line("not-a-number|user|hi").is_none());
        assert!(parse_line("-5|user|hi").is_none());
    }

    #[test]
    fn format_line_round_trips() {
        let message = ChatMessage {
            timestamp_ms: 42,
            username: "abc".to_string(),
            content: "hello | world".to_string(),
        };
        let parsed = parse_line(&format_line(&message)).unwrap();
        assert_eq!(parsed, message);
    }

    #[test]
    fn format_line_sanitizes_separators() {
        let message = ChatMessage {
            timestamp_ms: 42,
            username: "a|b".to_string(),
            content: "two\nlines".to_string(),
        };
        assert_eq!(format_line(&message), "42|a b|two lines");
    }

    #[test]
    fn clip_json_matches_contract() {
        let event = ClipEvent {
            start_ms: 1_000,
            end_ms: 61_000,
            score: 0.8512,
            keywords: vec!["W".to_string(), "pog".to_string()],
            category: ClipCategory::Win,
        };
        assert_eq!(
            clip_to_json(&event),
            r#"{"start_ms":1000,"end_ms":61000,"score":0.85,"category":"win","keywords":["W","pog"]}"#
        );
    }

    #[test]
    fn clip_json_pads_score_to_two_decimals() {
        let event = ClipEvent {
            start_ms: 0,
            end_ms: 60_000,
            score: 0.7,
            keywords: Vec::new(),
            category: ClipCategory::Spike,
        };
        assert_eq!(
            clip_to_json(&event),
            r#"{"start_ms":0,"end_ms":60000,"score":0.70,"category":"spike","keywords":[]}"#
        );
    }

    #[test]
    fn clip_json_escapes_keyword_strings() {
        let event = ClipEvent {
            start_ms: 0,
            end_ms: 1,
            score: 1.0,
            keywords: vec!["say \"gg\"".to_string()],
            category: ClipCategory::Hype,
        };
        let line = clip_to_json(&event);
        assert!(line.contains(r#""keywords":["say \"gg\""]"#));
    }
}
