use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::store::StoreError;

pub mod calendar_event;
pub mod column;
pub mod email;
pub mod email_account;
pub mod notification;
pub mod profile;
pub mod project;
pub mod task;

/// Build a PATCH body from an update payload; `updated_at` is stamped when
/// `touch` is set.
///
/// Payloads skip their unset fields when serialized, so every `null` left in
/// the body is an explicit request to clear that column.
pub(crate) fn changes<T: Serialize>(payload: &T, touch: bool) -> Result<Value, StoreError> {
    let mut map = match serde_json::to_value(payload)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    if touch {
        map.insert("updated_at".to_string(), serde_json::to_value(Utc::now())?);
    }
    Ok(Value::Object(map))
}

/// For `Option<Option<T>>` update fields: a missing field stays `None`
/// (with `#[serde(default)]`), an explicit `null` becomes `Some(None)`.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Deserialize)]
    struct Payload {
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(
            default,
            deserialize_with = "nullable",
            skip_serializing_if = "Option::is_none"
        )]
        description: Option<Option<String>>,
    }

    #[test]
    fn test_changes_drops_unset_fields() {
        let patch = changes(
            &Payload {
                title: Some("New".into()),
                description: None,
            },
            true,
        )
        .unwrap();
        assert_eq!(patch["title"], "New");
        assert!(patch.get("description").is_none());
        assert!(patch.get("updated_at").is_some());
    }

    #[test]
    fn test_explicit_null_survives_as_a_clear() {
        let payload: Payload = serde_json::from_str(r#"{"description": null}"#).unwrap();
        assert_eq!(payload.description, Some(None));

        let patch = changes(&payload, false).unwrap();
        assert!(patch.get("title").is_none());
        assert_eq!(patch["description"], Value::Null);

        let absent: Payload = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.description, None);
    }
}
