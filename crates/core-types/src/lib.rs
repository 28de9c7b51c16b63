use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Open key/value object used for event payloads, panel state and filter domains.
pub type JsonMap = Map<String, Value>;

/// Shared error type for the paneldeck crates.
#[derive(Debug, Error, Clone)]
pub enum DeckError {
    #[error("{message}")]
    Message { message: String },
}

impl DeckError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

/// Caller-assigned panel identifier.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PanelId(pub String);

impl PanelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PanelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PanelId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for PanelId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Kind of content a panel renders. Unknown tags survive as `Custom`.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ContentType {
    Map,
    Data,
    Filter,
    Stats,
    Chart,
    Custom(String),
}

impl ContentType {
    pub fn as_str(&self) -> &str {
        match self {
            ContentType::Map => "map",
            ContentType::Data => "data",
            ContentType::Filter => "filter",
            ContentType::Stats => "stats",
            ContentType::Chart => "chart",
            ContentType::Custom(tag) => tag.as_str(),
        }
    }
}

impl From<String> for ContentType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "map" => ContentType::Map,
            "data" => ContentType::Data,
            "filter" => ContentType::Filter,
            "stats" => ContentType::Stats,
            "chart" => ContentType::Chart,
            _ => ContentType::Custom(value),
        }
    }
}

impl From<&str> for ContentType {
    fn from(value: &str) -> Self {
        ContentType::from(value.to_string())
    }
}

impl From<ContentType> for String {
    fn from(value: ContentType) -> Self {
        match value {
            ContentType::Custom(tag) => tag,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Panel placement in layout units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Panel extent in layout units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Top-level shallow merge: every key in `patch` overwrites the key in `base`.
pub fn shallow_merge(base: &mut JsonMap, patch: &JsonMap) {
    for (key, value) in patch {
        base.insert(key.clone(), value.clone());
    }
}

/// Returns `base` with `patch` shallow-merged on top.
pub fn merged(base: &JsonMap, patch: &JsonMap) -> JsonMap {
    let mut out = base.clone();
    shallow_merge(&mut out, patch);
    out
}
