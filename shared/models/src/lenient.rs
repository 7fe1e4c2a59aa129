//! Lenient field decoding for LLM-produced documents.
//!
//! The model is asked for a fixed schema but nothing enforces it, so these
//! helpers accept `null`, wrong scalar types and missing sequences instead of
//! rejecting the whole document.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Decode a text field. `null` becomes `""`, other scalars are rendered.
pub fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
    })
}

/// Decode a boolean field, defaulting to `false`.
pub fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?
        .as_ref()
        .and_then(value_as_flag)
        .unwrap_or(false))
}

/// Decode a boolean field where absence must stay distinguishable.
pub fn optional_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?
        .as_ref()
        .and_then(value_as_flag))
}

/// Decode a sequence. Anything but an array (`null`, `""`, an object) is
/// empty, and elements that do not decode are skipped.
pub fn seq<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

/// Decode a nested object section. A value that is not an object, or an
/// object that does not decode, counts as absent.
pub fn section<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(value @ Value::Object(_)) => serde_json::from_value(value).ok(),
        _ => None,
    })
}

fn value_as_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "y" | "1" => Some(true),
            "false" | "no" | "n" | "0" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Sample {
        #[serde(default, deserialize_with = "text")]
        name: String,
        #[serde(default, deserialize_with = "flag")]
        active: bool,
        #[serde(default, deserialize_with = "optional_flag")]
        primary: Option<bool>,
        #[serde(default, deserialize_with = "seq")]
        items: Vec<u32>,
        #[serde(default, deserialize_with = "section")]
        nested: Option<Nested>,
    }

    #[derive(Debug, PartialEq, Deserialize)]
    struct Nested {
        code: u32,
    }

    #[test]
    fn test_nulls_fall_back_to_defaults() {
        let sample: Sample = serde_json::from_value(json!({
            "name": null,
            "active": null,
            "primary": null,
            "items": null
        }))
        .unwrap();

        assert_eq!(sample.name, "");
        assert!(!sample.active);
        assert_eq!(sample.primary, None);
        assert!(sample.items.is_empty());
    }

    #[test]
    fn test_scalars_are_coerced() {
        let sample: Sample = serde_json::from_value(json!({
            "name": 42,
            "active": "Yes",
            "primary": 0
        }))
        .unwrap();

        assert_eq!(sample.name, "42");
        assert!(sample.active);
        assert_eq!(sample.primary, Some(false));
    }

    #[test]
    fn test_absent_optional_flag_stays_none() {
        let sample: Sample = serde_json::from_value(json!({})).unwrap();
        assert_eq!(sample.primary, None);
    }

    #[test]
    fn test_wrong_shaped_sequences_are_empty() {
        let sample: Sample = serde_json::from_value(json!({ "items": "" })).unwrap();
        assert!(sample.items.is_empty());

        let sample: Sample = serde_json::from_value(json!({ "items": { "a": 1 } })).unwrap();
        assert!(sample.items.is_empty());
    }

    #[test]
    fn test_undecodable_elements_are_skipped() {
        let sample: Sample = serde_json::from_value(json!({ "items": [1, "two", 3, null] })).unwrap();
        assert_eq!(sample.items, vec![1, 3]);
    }

    #[test]
    fn test_section_falls_back_to_absent() {
        let sample: Sample = serde_json::from_value(json!({ "nested": { "code": 7 } })).unwrap();
        assert_eq!(sample.nested, Some(Nested { code: 7 }));

        for wrong in [json!(""), json!(5), json!([1]), json!({ "code": "x" })] {
            let sample: Sample = serde_json::from_value(json!({ "nested": wrong })).unwrap();
            assert_eq!(sample.nested, None);
        }
    }
}
