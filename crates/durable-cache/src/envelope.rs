use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Wrapper written around every persisted value.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub version: u32,
    pub updated_at: DateTime<Utc>,
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Stored text after envelope detection. Legacy bare values carry no metadata.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Decoded {
    pub data: Value,
    pub schema_version: Option<u32>,
    pub updated_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Decoded {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }
}

pub(crate) fn decode(raw: &str) -> Result<Decoded, serde_json::Error> {
    let value: Value = serde_json::from_str(raw)?;
    if let Value::Object(map) = &value {
        let version = map.get("version").and_then(Value::as_u64);
        let updated_at = map.get("updatedAt").and_then(parse_timestamp);
        if let (Some(version), Some(updated_at), true) =
            (version, updated_at, map.contains_key("data"))
        {
            let mut map = map.clone();
            let expires_at = map.get("expiresAt").and_then(parse_timestamp);
            let data = map.remove("data").unwrap_or(Value::Null);
            return Ok(Decoded {
                data,
                schema_version: u32::try_from(version).ok(),
                updated_at: Some(updated_at),
                expires_at,
            });
        }
    }
    Ok(Decoded {
        data: value,
        schema_version: None,
        updated_at: None,
        expires_at: None,
    })
}

/// Accepts RFC 3339 strings and epoch-millisecond numbers.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(text) => DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|ts| ts.with_timezone(&Utc)),
        Value::Number(number) => number
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_current_envelope() {
        let envelope = Envelope {
            version: 2,
            updated_at: Utc::now(),
            data: json!({"property": {"a": 1}}),
            expires_at: None,
        };
        let raw = serde_json::to_string(&envelope).unwrap();
        let decoded = decode(&raw).unwrap();
        assert_eq!(decoded.schema_version, Some(2));
        assert_eq!(decoded.data, json!({"property": {"a": 1}}));
        assert!(!raw.contains("expiresAt"));
    }

    #[test]
    fn decodes_millisecond_timestamps() {
        let raw = r#"{"version":1,"updatedAt":1700000000000,"data":[1,2]}"#;
        let decoded = decode(raw).unwrap();
        assert_eq!(decoded.data, json!([1, 2]));
        assert_eq!(
            decoded.updated_at.map(|ts| ts.timestamp_millis()),
            Some(1_700_000_000_000)
        );
    }

    #[test]
    fn bare_values_are_legacy_data() {
        let decoded = decode(r#"{"version":3,"name":"not an envelope"}"#).unwrap();
        assert_eq!(decoded.schema_version, None);
        assert_eq!(decoded.data, json!({"version": 3, "name": "not an envelope"}));

        let decoded = decode("42").unwrap();
        assert_eq!(decoded.data, json!(42));
    }

    #[test]
    fn corrupt_text_is_an_error() {
        assert!(decode("{not json").is_err());
    }
}
