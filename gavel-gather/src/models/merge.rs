//! Document merge rules applied by every Database implementation
//!
//! Upsert semantics are last-write-wins per field, except:
//! - `null`/absent incoming fields are not observations and never
//!   clobber stored values
//! - list-valued relation fields are unioned, de-duplicated by entry
//!   (entries are entity ids or URIs), never truncated
//! - `created` is preserved from the stored document

use serde_json::{Map, Value};

/// List-valued relation fields that merge by union instead of
/// replacement. De-duplication key is the entry itself: relation lists
/// hold entity ids (or attachment URIs), both stable.
pub const UNION_FIELDS: &[&str] = &[
    "thumbnail_file_ids",
    "keyword_ids",
    "matter_ids",
    "minutes_item_ids",
    "person_ids",
    "attachment_uris",
];

/// Merge an incoming document into a stored one
///
/// Both values are expected to be JSON objects; a non-object incoming
/// value wins outright (there is nothing field-wise to merge).
pub fn merge_documents(stored: &Value, incoming: &Value) -> Value {
    let (Some(stored_map), Some(incoming_map)) = (stored.as_object(), incoming.as_object())
    else {
        return incoming.clone();
    };

    let mut merged: Map<String, Value> = stored_map.clone();

    for (key, incoming_value) in incoming_map {
        if incoming_value.is_null() {
            continue;
        }

        if key == "created" {
            if !stored_map.contains_key("created") {
                merged.insert(key.clone(), incoming_value.clone());
            }
            continue;
        }

        if UNION_FIELDS.contains(&key.as_str()) {
            let unioned = union_arrays(stored_map.get(key), incoming_value);
            merged.insert(key.clone(), unioned);
            continue;
        }

        merged.insert(key.clone(), incoming_value.clone());
    }

    Value::Object(merged)
}

/// Union two JSON arrays, keeping stored order and appending unseen
/// incoming entries in their order
fn union_arrays(stored: Option<&Value>, incoming: &Value) -> Value {
    let mut result: Vec<Value> = stored
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();

    if let Some(incoming_entries) = incoming.as_array() {
        for entry in incoming_entries {
            if !result.contains(entry) {
                result.push(entry.clone());
            }
        }
    }

    Value::Array(result)
}
