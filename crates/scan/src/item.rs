use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::sync::Arc;

/// An item returned by the lookup service.
///
/// The payload is passed through untouched; the only thing checked is that it
/// is a JSON object carrying a usable identity field. Cloning is cheap.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedItem {
    id: String,
    payload: Arc<Map<String, Value>>,
}
impl ResolvedItem {
    /// Accepts a JSON object whose `identity_field` is a non-blank string or a
    /// number. Everything else (`null`, arrays, `{}`, `{"id": ""}`...) is not
    /// an item.
    pub fn from_payload(payload: Value, identity_field: &str) -> Option<Self> {
        let Value::Object(map) = payload else {
            return None;
        };
        let id = match map.get(identity_field)? {
            Value::String(id) if !id.trim().is_empty() => id.clone(),
            Value::Number(id) => id.to_string(),
            _ => return None,
        };
        Some(Self { id, payload: Arc::new(map) })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name, when the payload has a string `name` field.
    pub fn name(&self) -> Option<&str> {
        self.get("name").and_then(Value::as_str)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.payload.get(field)
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }
}
impl Serialize for ResolvedItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.payload.serialize(serializer)
    }
}
