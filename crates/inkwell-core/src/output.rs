// ABOUTME: Defines AgentOutput, the immutable result of one agent dispatch.
// ABOUTME: Confidence is clamped into [0, 1] on every construction path, including deserialization.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::specialty::Specialty;

/// The structured result an agent produces from a single dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentOutput {
    pub content: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
    /// Machine-usable payload other agents consume as collaboration data.
    #[serde(default = "empty_object")]
    pub data: Value,
    #[serde(deserialize_with = "clamped_confidence")]
    confidence: f64,
    #[serde(default)]
    pub needs_follow_up: bool,
    /// Specialties that would likely want to see this output.
    #[serde(default)]
    pub related_specialties: Vec<Specialty>,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

fn clamp(confidence: f64) -> f64 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

fn clamped_confidence<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    f64::deserialize(deserializer).map(clamp)
}

impl AgentOutput {
    /// Create an output with the given content, empty data, and confidence.
    pub fn new(content: impl Into<String>, confidence: f64) -> Self {
        Self {
            content: content.into(),
            suggestions: Vec::new(),
            data: empty_object(),
            confidence: clamp(confidence),
            needs_follow_up: false,
            related_specialties: Vec::new(),
        }
    }

    /// The fallback output used when a dispatch fails: zero confidence,
    /// follow-up required, empty data, and a human-readable diagnostic.
    pub fn degraded(diagnostic: impl Into<String>) -> Self {
        Self {
            content: diagnostic.into(),
            suggestions: Vec::new(),
            data: empty_object(),
            confidence: 0.0,
            needs_follow_up: true,
            related_specialties: Vec::new(),
        }
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = clamp(confidence);
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    pub fn with_related(mut self, related: Vec<Specialty>) -> Self {
        self.related_specialties = related;
        self
    }

    pub fn with_follow_up(mut self, needs_follow_up: bool) -> Self {
        self.needs_follow_up = needs_follow_up;
        self
    }

    /// True when the data payload carries no fields.
    pub fn has_empty_data(&self) -> bool {
        match &self.data {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            Value::Array(items) => items.is_empty(),
            _ => false,
        }
    }
}
