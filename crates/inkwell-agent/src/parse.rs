// ABOUTME: Splits a model's reply into prose, a suggestions list, and a structured data payload.
// ABOUTME: Undecodable data never fails the parse; it yields an empty object and a diagnostic.

use serde_json::{Map, Value};
use thiserror::Error;

/// Why a data section could not be used. Recorded as a diagnostic only.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("data section is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("data section is JSON but not an object")]
    NotAnObject,
}

/// What happened to the structured-data section.
#[derive(Debug)]
pub enum DataSection {
    Absent,
    Decoded,
    Invalid(ParseError),
}

/// A reply split into its parts.
#[derive(Debug)]
pub struct ParsedResponse {
    pub content: String,
    pub suggestions: Vec<String>,
    /// Always a JSON object; `{}` when absent or undecodable.
    pub data: Value,
    pub data_section: DataSection,
}

impl ParsedResponse {
    /// 0.85 for decoded non-empty data, 0.4 for undecodable data, otherwise 0.7.
    pub fn confidence(&self) -> f64 {
        match &self.data_section {
            DataSection::Decoded if !is_empty_object(&self.data) => 0.85,
            DataSection::Invalid(_) => 0.4,
            _ => 0.7,
        }
    }

    /// A human should look again when data failed to decode or there is no prose.
    pub fn needs_follow_up(&self) -> bool {
        matches!(self.data_section, DataSection::Invalid(_)) || self.content.trim().is_empty()
    }
}

/// Start and end markers for one section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionMarkers {
    pub open: String,
    pub close: String,
}

impl SectionMarkers {
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Self {
        Self {
            open: open.into(),
            close: close.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseParser {
    pub suggestions: SectionMarkers,
    pub data: SectionMarkers,
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self {
            suggestions: SectionMarkers::new("[SUGGESTIONS]", "[/SUGGESTIONS]"),
            data: SectionMarkers::new("[DATA]", "[/DATA]"),
        }
    }
}

impl ResponseParser {
    /// Instructions appended to every prompt so replies use this parser's markers.
    pub fn format_instructions(&self, data_fields: &[&str]) -> String {
        format!(
            "Format your reply as follows:\n\
             1. Your answer in prose.\n\
             2. Concrete suggestions, one per line, between {} and {}.\n\
             3. A JSON object with the fields {} between {} and {}.",
            self.suggestions.open,
            self.suggestions.close,
            data_fields.join(", "),
            self.data.open,
            self.data.close,
        )
    }

    /// Split a reply. Without a data section the content is the full reply
    /// text, even when a suggestions section is present; suggestions are
    /// still extracted. With a data section, every marked section is cut out
    /// of the content.
    pub fn parse(&self, text: &str) -> ParsedResponse {
        let suggestions_span = find_section(text, &self.suggestions);
        let suggestions = suggestions_span
            .as_ref()
            .map(|s| parse_suggestions(s.inner))
            .unwrap_or_default();

        let Some(data_span) = find_section(text, &self.data) else {
            return ParsedResponse {
                content: text.to_string(),
                suggestions,
                data: empty_object(),
                data_section: DataSection::Absent,
            };
        };

        let (data, data_section) = match decode_data(data_span.inner) {
            Ok(value) => (value, DataSection::Decoded),
            Err(e) => {
                tracing::debug!(error = %e, "discarding undecodable data section");
                (empty_object(), DataSection::Invalid(e))
            }
        };

        let mut spans: Vec<(usize, usize)> = [suggestions_span, Some(data_span)]
            .into_iter()
            .flatten()
            .map(|s| (s.start, s.end))
            .collect();
        spans.sort();

        let mut content = String::new();
        let mut cursor = 0;
        for (start, end) in spans {
            if start >= cursor {
                content.push_str(&text[cursor..start]);
            }
            cursor = cursor.max(end);
        }
        content.push_str(&text[cursor..]);

        ParsedResponse {
            content: content.trim().to_string(),
            suggestions,
            data,
            data_section,
        }
    }
}

struct Section<'a> {
    start: usize,
    end: usize,
    inner: &'a str,
}

/// Locate a marked section. An unterminated section runs to the end of the text.
fn find_section<'a>(text: &'a str, markers: &SectionMarkers) -> Option<Section<'a>> {
    let start = text.find(&markers.open)?;
    let inner_start = start + markers.open.len();
    match text[inner_start..].find(&markers.close) {
        Some(rel) => Some(Section {
            start,
            end: inner_start + rel + markers.close.len(),
            inner: &text[inner_start..inner_start + rel],
        }),
        None => Some(Section {
            start,
            end: text.len(),
            inner: &text[inner_start..],
        }),
    }
}

fn parse_suggestions(section: &str) -> Vec<String> {
    section
        .lines()
        .map(strip_list_marker)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

/// Trim bullets ("-", "*", "•") and numbering ("1.", "2)") from a line.
fn strip_list_marker(line: &str) -> &str {
    let line = line.trim();
    if let Some(rest) = line
        .strip_prefix('-')
        .or_else(|| line.strip_prefix('*'))
        .or_else(|| line.strip_prefix('•'))
    {
        return rest.trim();
    }

    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            return rest.trim();
        }
    }
    line
}

fn decode_data(section: &str) -> Result<Value, ParseError> {
    let body = strip_code_fence(section.trim());
    match serde_json::from_str::<Value>(body)? {
        value @ Value::Object(_) => Ok(value),
        _ => Err(ParseError::NotAnObject),
    }
}

/// Remove a surrounding ```json ... ``` fence when present.
fn strip_code_fence(body: &str) -> &str {
    let Some(rest) = body.strip_prefix("```") else {
        return body;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

pub(crate) fn is_empty_object(value: &Value) -> bool {
    value.as_object().is_some_and(|m| m.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> ParsedResponse {
        ResponseParser::default().parse(text)
    }

    #[test]
    fn reply_without_sections_is_all_content() {
        let text = "  The story is about exile.\nAnd return.  ";
        let parsed = parse(text);
        assert_eq!(parsed.content, text);
        assert!(parsed.suggestions.is_empty());
        assert_eq!(parsed.data, serde_json::json!({}));
        assert!(matches!(parsed.data_section, DataSection::Absent));
        assert_eq!(parsed.confidence(), 0.7);
        assert!(!parsed.needs_follow_up());
    }

    #[test]
    fn full_reply_splits_into_parts() {
        let text = "Mara is restless.\n\
                    [SUGGESTIONS]\n- Give her a secret\n2) Let her fail early\n\n[/SUGGESTIONS]\n\
                    [DATA]\n```json\n{\"name\": \"Mara\", \"traits\": [\"restless\"]}\n```\n[/DATA]";
        let parsed = parse(text);

        assert_eq!(parsed.content, "Mara is restless.");
        assert_eq!(parsed.suggestions, vec!["Give her a secret", "Let her fail early"]);
        assert_eq!(parsed.data["name"], "Mara");
        assert_eq!(parsed.confidence(), 0.85);
        assert!(!parsed.needs_follow_up());
    }

    #[test]
    fn undecodable_data_is_empty_and_flags_follow_up() {
        let parsed = parse("Some prose.\n[DATA]{not json[/DATA]");
        assert_eq!(parsed.data, serde_json::json!({}));
        assert!(matches!(parsed.data_section, DataSection::Invalid(ParseError::Json(_))));
        assert_eq!(parsed.confidence(), 0.4);
        assert!(parsed.needs_follow_up());
        assert_eq!(parsed.content, "Some prose.");
    }

    #[test]
    fn non_object_data_is_rejected() {
        let parsed = parse("Prose [DATA][1, 2][/DATA]");
        assert!(matches!(parsed.data_section, DataSection::Invalid(ParseError::NotAnObject)));
    }

    #[test]
    fn empty_prose_needs_follow_up() {
        let parsed = parse("[DATA]{\"themes\": [\"grief\"]}[/DATA]");
        assert!(parsed.content.is_empty());
        assert!(parsed.needs_follow_up());
        assert_eq!(parsed.confidence(), 0.85);
    }

    #[test]
    fn unterminated_section_runs_to_end() {
        let parsed = parse("Intro\n[DATA]{\"tone\": \"dry\"}[/DATA]\n[SUGGESTIONS]\n* one\n* two");
        assert_eq!(parsed.content, "Intro");
        assert_eq!(parsed.suggestions, vec!["one", "two"]);
        assert_eq!(parsed.data["tone"], "dry");
    }

    #[test]
    fn suggestions_without_data_keep_full_text() {
        let text = "Mara is kind.\n[SUGGESTIONS]\n- give her a secret\n[/SUGGESTIONS]";
        let parsed = parse(text);
        assert_eq!(parsed.content, text);
        assert_eq!(parsed.suggestions, vec!["give her a secret"]);
        assert!(matches!(parsed.data_section, DataSection::Absent));
        assert_eq!(parsed.confidence(), 0.7);
    }

    #[test]
    fn custom_markers() {
        let parser = ResponseParser {
            suggestions: SectionMarkers::new("<ideas>", "</ideas>"),
            data: SectionMarkers::new("<json>", "</json>"),
        };
        let parsed = parser.parse("Text <json>{\"a\": 1}</json>");
        assert_eq!(parsed.data["a"], 1);
        assert!(parser.format_instructions(&["a"]).contains("<json>"));
    }
}
