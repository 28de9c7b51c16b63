//! Record matching against an active [`FilterSet`].
//!
//! Filters are shaped by convention only, so the rules are deliberately small:
//! arrays match any element, `{min, max}` objects are inclusive numeric ranges
//! and everything else compares by equality. Unset criteria (null, `""`, `[]`)
//! never exclude a record.

use serde_json::Value;

use paneldeck_core_types::JsonMap;

use crate::model::FilterSet;

/// True when `record` satisfies every criterion in `filters`.
pub fn matches_record(filters: &FilterSet, record: &JsonMap) -> bool {
    filters.domains().all(|(domain, criteria)| match criteria {
        Value::Object(fields) => fields
            .iter()
            .all(|(field, expected)| matches_field(record, domain, field, expected)),
        // Non-object domains carry no per-field criteria.
        _ => true,
    })
}

fn matches_field(record: &JsonMap, domain: &str, field: &str, expected: &Value) -> bool {
    if is_unset(expected) {
        return true;
    }
    match lookup(record, domain, field) {
        Some(actual) => matches_value(actual, expected),
        None => false,
    }
}

/// Flat field first, then `record[domain][field]`.
fn lookup<'a>(record: &'a JsonMap, domain: &str, field: &str) -> Option<&'a Value> {
    record.get(field).or_else(|| {
        record
            .get(domain)
            .and_then(Value::as_object)
            .and_then(|nested| nested.get(field))
    })
}

fn is_unset(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn matches_value(actual: &Value, expected: &Value) -> bool {
    match expected {
        Value::Array(options) => match actual {
            Value::Array(values) => values.iter().any(|value| options.contains(value)),
            _ => options.contains(actual),
        },
        Value::Object(bounds) if is_range(bounds) => {
            let Some(number) = actual.as_f64() else {
                return false;
            };
            let above_min = bounds
                .get("min")
                .and_then(Value::as_f64)
                .map_or(true, |min| number >= min);
            let below_max = bounds
                .get("max")
                .and_then(Value::as_f64)
                .map_or(true, |max| number <= max);
            above_min && below_max
        }
        _ => actual == expected,
    }
}

fn is_range(bounds: &JsonMap) -> bool {
    !bounds.is_empty() && bounds.keys().all(|key| key == "min" || key == "max")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> JsonMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("record must be an object"),
        }
    }

    fn filters(value: Value) -> FilterSet {
        FilterSet::try_from(value).expect("object")
    }

    #[test]
    fn empty_filters_match_everything() {
        assert!(matches_record(&FilterSet::new(), &record(json!({"a": 1}))));
    }

    #[test]
    fn equality_on_flat_and_nested_fields() {
        let set = filters(json!({"property": {"propertyType": "Land"}}));
        assert!(matches_record(&set, &record(json!({"propertyType": "Land"}))));
        assert!(matches_record(
            &set,
            &record(json!({"property": {"propertyType": "Land"}}))
        ));
        assert!(!matches_record(&set, &record(json!({"propertyType": "Residential"}))));
        assert!(!matches_record(&set, &record(json!({"other": 1}))));
    }

    #[test]
    fn arrays_match_any_option() {
        let set = filters(json!({"geographic": {"county": ["Kent", "Essex"]}}));
        assert!(matches_record(&set, &record(json!({"county": "Essex"}))));
        assert!(!matches_record(&set, &record(json!({"county": "Surrey"}))));
        assert!(matches_record(&set, &record(json!({"county": ["Surrey", "Kent"]}))));
    }

    #[test]
    fn ranges_are_inclusive_and_open_ended() {
        let set = filters(json!({"price": {"value": {"min": 100, "max": 200}}}));
        assert!(matches_record(&set, &record(json!({"value": 100}))));
        assert!(matches_record(&set, &record(json!({"value": 200.0}))));
        assert!(!matches_record(&set, &record(json!({"value": 201}))));
        assert!(!matches_record(&set, &record(json!({"value": "cheap"}))));

        let open = filters(json!({"price": {"value": {"min": 150}}}));
        assert!(matches_record(&open, &record(json!({"value": 10_000}))));
    }

    #[test]
    fn unset_criteria_are_ignored() {
        let set = filters(json!({
            "property": {"propertyType": "", "tags": [], "owner": null},
            "search": "free text"
        }));
        assert!(matches_record(&set, &record(json!({}))));
    }
}
