use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use paneldeck_core_types::{shallow_merge, JsonMap};

use crate::errors::FilterError;

/// Active cross-panel criteria keyed by domain (`property`, `geographic`, ...).
///
/// Domains are opaque JSON: unknown domains and non-object values are kept
/// verbatim so newer writers never lose data through older readers.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterSet(JsonMap);

impl FilterSet {
    pub fn new() -> Self {
        Self(JsonMap::new())
    }

    pub fn from_map(map: JsonMap) -> Self {
        Self(map)
    }

    pub fn with_domain(mut self, domain: impl Into<String>, filters: Value) -> Self {
        self.0.insert(domain.into(), filters);
        self
    }

    pub fn domain(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn domains(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn remove_domain(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_map(&self) -> &JsonMap {
        &self.0
    }

    pub fn into_map(self) -> JsonMap {
        self.0
    }

    /// Domain-keyed merge: each incoming domain object is shallow-merged onto
    /// the current one. Domains absent from `incoming` are untouched. When
    /// either side is not an object the incoming value replaces the domain.
    pub fn merge(&mut self, incoming: &FilterSet) {
        for (domain, value) in incoming.domains() {
            match (self.0.get_mut(domain), value) {
                (Some(Value::Object(current)), Value::Object(patch)) => {
                    shallow_merge(current, patch);
                }
                _ => {
                    self.0.insert(domain.clone(), value.clone());
                }
            }
        }
    }
}

impl TryFrom<Value> for FilterSet {
    type Error = FilterError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            _ => Err(FilterError::NotAnObject),
        }
    }
}

impl From<FilterSet> for Value {
    fn from(value: FilterSet) -> Self {
        Value::Object(value.0)
    }
}

fn first_version() -> u32 {
    1
}

/// Named, persisted filter preset.
///
/// Every field has a serde default so that damaged stored presets still load
/// and are then refused by [`FilterConfig::validate`] instead of by the parser.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterConfig {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub filters: Value,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default = "first_version")]
    pub version: u32,
}

impl FilterConfig {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        filters: FilterSet,
        description: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            description,
            filters: filters.into(),
            is_default: false,
            created_at: now,
            updated_at: now,
            version: first_version(),
        }
    }

    /// Valid iff it has a non-empty id, a non-empty name and object filters.
    pub fn validate(&self) -> Result<(), FilterError> {
        let reason = if self.id.trim().is_empty() {
            "missing id"
        } else if self.name.trim().is_empty() {
            "missing name"
        } else if !self.filters.is_object() {
            "filters is not an object"
        } else {
            return Ok(());
        };
        Err(FilterError::InvalidPreset {
            id: self.id.clone(),
            reason: reason.to_string(),
        })
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// The preset's filters, only if the preset is valid.
    pub fn filter_set(&self) -> Result<FilterSet, FilterError> {
        self.validate()?;
        FilterSet::try_from(self.filters.clone())
    }
}

/// Explicit partial update of a preset.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterConfigPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<FilterSet>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn set(value: Value) -> FilterSet {
        FilterSet::try_from(value).expect("object")
    }

    #[test]
    fn merge_accumulates_domains() {
        let mut active = FilterSet::new();
        active.merge(&set(json!({"property": {"a": 1}})));
        active.merge(&set(json!({"geographic": {"b": 2}})));
        assert_eq!(
            Value::from(active),
            json!({"property": {"a": 1}, "geographic": {"b": 2}})
        );
    }

    #[test]
    fn merge_is_shallow_within_a_domain() {
        let mut active = set(json!({"property": {"type": "Residential", "beds": 2}}));
        active.merge(&set(json!({"property": {"beds": 3, "baths": 1}})));
        assert_eq!(
            Value::from(active),
            json!({"property": {"type": "Residential", "beds": 3, "baths": 1}})
        );
    }

    #[test]
    fn merge_replaces_non_object_domains_verbatim() {
        let mut active = set(json!({"search": "oak", "future": {"x": 1}}));
        active.merge(&set(json!({"search": {"text": "elm"}})));
        assert_eq!(
            Value::from(active),
            json!({"search": {"text": "elm"}, "future": {"x": 1}})
        );
    }

    #[test]
    fn validation_rules() {
        let good = FilterConfig::new("filter_1", "Homes", set(json!({})), None);
        assert!(good.is_valid());

        let mut no_name = good.clone();
        no_name.name = "  ".into();
        assert_eq!(
            no_name.validate(),
            Err(FilterError::InvalidPreset {
                id: "filter_1".into(),
                reason: "missing name".into()
            })
        );

        let mut bad_filters = good.clone();
        bad_filters.filters = json!(["not", "an", "object"]);
        assert!(bad_filters.filter_set().is_err());

        let mut no_id = good;
        no_id.id.clear();
        assert!(!no_id.is_valid());
    }

    #[test]
    fn damaged_presets_still_parse() {
        let preset: FilterConfig = serde_json::from_value(json!({"name": "orphan"})).unwrap();
        assert_eq!(preset.version, 1);
        assert!(preset.filters.is_null());
        assert!(!preset.is_valid());
    }
}
