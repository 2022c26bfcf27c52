//! Shared helpers for decoding remote response fields into attributes.
//!
//! Absent fields become known-null, never unknown, so computed attributes
//! always resolve after a read-back.

use serde_json::Value;

use crate::attr::Attr;

/// Decodes a string field.
pub(crate) fn string_field(response: &Value, key: &str) -> Attr<String> {
    Attr::from_response(response.get(key).and_then(Value::as_str).map(String::from))
}

/// Decodes an integer field.
pub(crate) fn int_field(response: &Value, key: &str) -> Attr<i64> {
    Attr::from_response(response.get(key).and_then(Value::as_i64))
}

/// Decodes a boolean field.
pub(crate) fn bool_field(response: &Value, key: &str) -> Attr<bool> {
    Attr::from_response(response.get(key).and_then(Value::as_bool))
}

/// Decodes a dataset property that may come back flat or wrapped in the
/// middleware's `{"value": ..., "parsed": ...}` envelope.
pub(crate) fn string_property(response: &Value, key: &str) -> Attr<String> {
    let field = response.get(key);
    let flat = field.and_then(Value::as_str);
    let wrapped = field
        .and_then(|f| f.get("value"))
        .and_then(Value::as_str);
    Attr::from_response(flat.or(wrapped).map(String::from))
}

/// Decodes a numeric dataset property, flat or wrapped (`"parsed"`).
pub(crate) fn int_property(response: &Value, key: &str) -> Attr<i64> {
    let field = response.get(key);
    let flat = field.and_then(Value::as_i64);
    let wrapped = field
        .and_then(|f| f.get("parsed"))
        .and_then(Value::as_i64);
    Attr::from_response(flat.or(wrapped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_absent_fields_become_null_not_unknown() {
        let response = json!({"name": "tank/vol1"});
        assert_eq!(string_field(&response, "name"), Attr::known(String::from("tank/vol1")));
        assert_eq!(string_field(&response, "comments"), Attr::Null);
        assert_eq!(int_field(&response, "volsize"), Attr::Null);
        assert_eq!(bool_field(&response, "sparse"), Attr::Null);
    }

    #[test]
    fn test_wrapped_dataset_properties() {
        let response = json!({
            "compression": {"value": "LZ4", "rawvalue": "lz4"},
            "volsize": {"parsed": 1_073_741_824_i64, "rawvalue": "1G"},
        });
        assert_eq!(
            string_property(&response, "compression"),
            Attr::known(String::from("LZ4"))
        );
        assert_eq!(int_property(&response, "volsize"), Attr::known(1_073_741_824));
    }

    #[test]
    fn test_flat_properties_still_decode() {
        let response = json!({"compression": "ZSTD", "volsize": 2048});
        assert_eq!(
            string_property(&response, "compression"),
            Attr::known(String::from("ZSTD"))
        );
        assert_eq!(int_property(&response, "volsize"), Attr::known(2048));
    }
}
