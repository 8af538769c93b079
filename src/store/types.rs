//! Firestore REST wire types and the entry schema codec.
//!
//! Firestore wraps every field in a typed value (`{"stringValue": "..."}`).
//! Entries cross the boundary as plain JSON objects first, so required and
//! optional fields are validated by the same serde schema used for the
//! Local Cache.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use super::error::SchemaError;
use crate::entry::{Entry, EntryPatch};

/// A single Firestore document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    /// Full resource name, `projects/p/databases/(default)/documents/col/id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
}

impl Document {
    /// Last path segment of the resource name.
    pub fn doc_id(&self) -> Option<&str> {
        self.name
            .as_deref()
            .and_then(|n| n.rsplit('/').next())
            .filter(|s| !s.is_empty())
    }
}

/// Response of `GET .../documents/{collection}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDocumentsResponse {
    #[serde(default)]
    pub documents: Vec<Document>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Error envelope returned by Google APIs.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Converts a plain JSON value into a Firestore typed value.
pub fn to_firestore(value: &Value) -> Value {
    match value {
        Value::Null => serde_json::json!({ "nullValue": null }),
        Value::Bool(b) => serde_json::json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => serde_json::json!({ "integerValue": i.to_string() }),
            None => serde_json::json!({ "doubleValue": n }),
        },
        Value::String(s) => serde_json::json!({ "stringValue": s }),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(to_firestore).collect();
            serde_json::json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => {
            let fields: Map<String, Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), to_firestore(v)))
                .collect();
            serde_json::json!({ "mapValue": { "fields": fields } })
        }
    }
}

/// Converts a Firestore typed value back into plain JSON.
pub fn from_firestore(field: &str, value: &Value) -> Result<Value, SchemaError> {
    let unsupported = |kind: &str| SchemaError::UnsupportedValue {
        field: field.to_string(),
        kind: kind.to_string(),
    };

    let Some((kind, inner)) = value.as_object().and_then(|o| o.iter().next()) else {
        return Err(unsupported("<untyped>"));
    };

    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" | "doubleValue" => Ok(inner.clone()),
        "stringValue" | "timestampValue" => Ok(inner.clone()),
        // Firestore encodes int64 as a decimal string.
        "integerValue" => inner
            .as_str()
            .and_then(|s| s.parse::<i64>().ok())
            .map(|i| Value::Number(Number::from(i)))
            .or_else(|| inner.as_i64().map(|i| Value::Number(Number::from(i))))
            .ok_or_else(|| unsupported("integerValue")),
        "arrayValue" => inner
            .get("values")
            .and_then(Value::as_array)
            .map(|vs| {
                vs.iter()
                    .map(|v| from_firestore(field, v))
                    .collect::<Result<Vec<_>, _>>()
            })
            .unwrap_or_else(|| Ok(Vec::new()))
            .map(Value::Array),
        "mapValue" => {
            let mut out = Map::new();
            if let Some(fields) = inner.get("fields").and_then(Value::as_object) {
                for (k, v) in fields {
                    out.insert(k.clone(), from_firestore(k, v)?);
                }
            }
            Ok(Value::Object(out))
        }
        other => Err(unsupported(other)),
    }
}

fn encode_object<T: Serialize>(record: &T) -> Result<BTreeMap<String, Value>, SchemaError> {
    let value = serde_json::to_value(record).map_err(|_| SchemaError::NotAnObject)?;
    let Value::Object(map) = value else {
        return Err(SchemaError::NotAnObject);
    };
    Ok(map.iter().map(|(k, v)| (k.clone(), to_firestore(v))).collect())
}

/// Encodes a full entry for `set_by_id`.
pub fn encode_entry(entry: &Entry) -> Result<Document, SchemaError> {
    Ok(Document {
        name: None,
        fields: encode_object(entry)?,
    })
}

/// Encodes a patch for `update_by_id`, returning the field mask alongside.
pub fn encode_patch(patch: &EntryPatch) -> Result<(Document, Vec<String>), SchemaError> {
    let fields = encode_object(patch)?;
    let mask = fields.keys().cloned().collect();
    Ok((Document { name: None, fields }, mask))
}

/// Decodes and validates a remote document.
///
/// The in-document `id` field wins; the document name is the fallback.
pub fn decode_entry(doc: &Document) -> Result<Entry, SchemaError> {
    let label = doc.doc_id().unwrap_or("<unnamed>").to_string();

    let mut map = Map::new();
    for (key, value) in &doc.fields {
        map.insert(key.clone(), from_firestore(key, value)?);
    }

    let has_id = map
        .get("id")
        .and_then(Value::as_str)
        .is_some_and(|s| !s.is_empty());
    if !has_id && let Some(doc_id) = doc.doc_id() {
        map.insert("id".into(), Value::String(doc_id.to_string()));
    }

    // Optional fields written as explicit nulls read back as absent.
    map.retain(|_, v| !v.is_null());

    serde_json::from_value(Value::Object(map)).map_err(|e| SchemaError::Invalid {
        document: label,
        reason: e.to_string(),
    })
}
