use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use paneldeck_core_types::{ContentType, JsonMap};

/// Persisted snapshot of one panel's state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelStateRecord {
    pub id: String,
    pub content_type: ContentType,
    #[serde(default)]
    pub state: JsonMap,
    pub last_updated: DateTime<Utc>,
    /// Starts at 1 and only grows.
    pub version: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_shape_is_camel_case() {
        let record: PanelStateRecord = serde_json::from_value(json!({
            "id": "mapPanel",
            "contentType": "map",
            "state": {"zoom": 4},
            "lastUpdated": "2024-05-01T10:00:00Z",
            "version": 3
        }))
        .unwrap();
        assert_eq!(record.content_type, ContentType::Map);
        assert_eq!(record.version, 3);

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["contentType"], json!("map"));
        assert!(value.get("lastUpdated").is_some());
    }
}
