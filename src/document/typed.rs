//! Typed JSON encoding for persisted documents, in the style of the
//! DynamoDB attribute format: every value is a single-key object naming its
//! type. Numeric payloads are strings so decimals keep their exact digits.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::{json, Map};

use super::{DocumentError, Fields, Value};

pub fn to_typed_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => json!({ "NULL": true }),
        Value::Bool(b) => json!({ "BOOL": b }),
        Value::Integer(i) => json!({ "INT": i.to_string() }),
        Value::Float(f) => json!({ "FLOAT": f.to_string() }),
        Value::Decimal(d) => json!({ "N": d.to_string() }),
        Value::String(s) => json!({ "S": s }),
        Value::List(items) => json!({ "L": items.iter().map(to_typed_json).collect::<Vec<_>>() }),
        Value::Map(fields) => json!({ "M": fields_to_typed_json(fields) }),
    }
}

pub fn fields_to_typed_json(fields: &Fields) -> serde_json::Value {
    let map: Map<String, serde_json::Value> = fields
        .iter()
        .map(|(key, value)| (key.to_owned(), to_typed_json(value)))
        .collect();
    serde_json::Value::Object(map)
}

pub fn from_typed_json(json: serde_json::Value) -> Result<Value, DocumentError> {
    let serde_json::Value::Object(map) = json else {
        return Err(DocumentError::NotTyped(json.to_string()));
    };
    if map.len() != 1 {
        return Err(DocumentError::NotTyped(serde_json::Value::Object(map).to_string()));
    }
    let Some((tag, payload)) = map.into_iter().next() else {
        return Err(DocumentError::NotTyped("{}".to_owned()));
    };

    let invalid = |payload: &serde_json::Value| DocumentError::InvalidPayload {
        tag: tag.clone(),
        payload: payload.to_string(),
    };

    match (tag.as_str(), payload) {
        ("NULL", serde_json::Value::Bool(true)) => Ok(Value::Null),
        ("BOOL", serde_json::Value::Bool(b)) => Ok(Value::Bool(b)),
        ("INT", serde_json::Value::String(s)) => s
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| invalid(&serde_json::Value::String(s))),
        ("FLOAT", serde_json::Value::String(s)) => s
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| invalid(&serde_json::Value::String(s))),
        ("N", serde_json::Value::String(s)) => Decimal::from_str(&s)
            .map(Value::Decimal)
            .map_err(|_| invalid(&serde_json::Value::String(s))),
        ("S", serde_json::Value::String(s)) => Ok(Value::String(s)),
        ("L", serde_json::Value::Array(items)) => items
            .into_iter()
            .map(from_typed_json)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        ("M", object @ serde_json::Value::Object(_)) => fields_from_typed_json(object).map(Value::Map),
        ("NULL" | "BOOL" | "INT" | "FLOAT" | "N" | "S" | "L" | "M", payload) => Err(invalid(&payload)),
        (other, _) => Err(DocumentError::UnknownType(other.to_owned())),
    }
}

pub fn fields_from_typed_json(json: serde_json::Value) -> Result<Fields, DocumentError> {
    let serde_json::Value::Object(map) = json else {
        return Err(DocumentError::NotTyped(json.to_string()));
    };
    map.into_iter()
        .map(|(key, value)| from_typed_json(value).map(|value| (key, value)))
        .collect()
}
