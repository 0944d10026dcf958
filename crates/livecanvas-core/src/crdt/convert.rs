//! Conversion between shape records and Loro values.

use crate::record::ShapeRecord;
use loro::LoroValue;
use serde_json::{Map, Number, Value};
use std::collections::HashMap;

/// Convert a JSON value to a Loro value.
///
/// Integers stay integers and floats stay floats, so a value read back
/// compares equal to the one written.
pub fn json_to_loro(value: &Value) -> LoroValue {
    match value {
        Value::Null => LoroValue::Null,
        Value::Bool(b) => LoroValue::Bool(*b),
        Value::Number(n) => number_to_loro(n),
        Value::String(s) => LoroValue::String(s.clone().into()),
        Value::Array(items) => LoroValue::from(items.iter().map(json_to_loro).collect::<Vec<_>>()),
        Value::Object(map) => LoroValue::from(
            map.iter()
                .map(|(k, v)| (k.clone(), json_to_loro(v)))
                .collect::<HashMap<String, LoroValue>>(),
        ),
    }
}

fn number_to_loro(n: &Number) -> LoroValue {
    match n.as_i64() {
        Some(i) => LoroValue::I64(i),
        // Floats, and integers beyond i64 range at reduced precision.
        None => LoroValue::Double(n.as_f64().unwrap_or_default()),
    }
}

/// Convert a Loro value back to JSON. Binary and container values map to null.
pub fn loro_to_json(value: &LoroValue) -> Value {
    match value {
        LoroValue::Null => Value::Null,
        LoroValue::Bool(b) => Value::Bool(*b),
        LoroValue::I64(i) => Value::from(*i),
        LoroValue::Double(d) => Number::from_f64(*d).map_or(Value::Null, Value::Number),
        LoroValue::String(s) => Value::String(s.to_string()),
        LoroValue::List(items) => Value::Array(items.iter().map(loro_to_json).collect()),
        LoroValue::Map(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), loro_to_json(v)))
                .collect::<Map<String, Value>>(),
        ),
        LoroValue::Binary(_) | LoroValue::Container(_) => Value::Null,
    }
}

/// Convert a record to a Loro map value.
pub fn record_to_loro(record: &ShapeRecord) -> LoroValue {
    json_to_loro(&Value::Object(record.as_map().clone()))
}

/// Convert a stored Loro value to a record. Non-map values yield `None`.
pub fn record_from_loro(value: &LoroValue) -> Option<ShapeRecord> {
    match loro_to_json(value) {
        Value::Object(map) => Some(ShapeRecord::new(map)),
        _ => None,
    }
}
