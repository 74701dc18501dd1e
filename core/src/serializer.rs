//! Wire format hooks.
//!
//! # Design
//! The adapter never touches JSON text directly; it asks a `Serializer` to
//! encode payloads, decode bodies and map field values through registered
//! transforms. `JsonSerializer` is the default and accepts bodies either bare
//! or wrapped in a root key (`{"post_group": {..}}`, `{"post_groups": [..]}`).
//!
//! Transforms are registered through `&mut` access only, which confines
//! registration to the configuration phase before an adapter is shared.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::SyncError;
use crate::resource::ResourceType;

/// Converts one field kind between its local and wire representation.
pub trait Transform: Send + Sync {
    /// Local value to wire value.
    fn serialize(&self, value: Value) -> Value;

    /// Wire value to local value.
    fn deserialize(&self, value: Value) -> Value;
}

/// Encodes outgoing payloads and decodes incoming bodies.
pub trait Serializer: Send + Sync {
    /// Short tag used for URL extensions, e.g. `json`.
    fn data_type(&self) -> Option<&str>;

    /// Media type of outgoing payloads, also sent as the accept hint.
    fn content_type(&self) -> &str;

    /// Local field map to wire payload.
    fn serialize(&self, ty: &ResourceType, fields: Map<String, Value>) -> Value;

    /// Wire data for one record to a local field map.
    fn deserialize(&self, ty: &ResourceType, data: Value) -> Result<Map<String, Value>, SyncError>;

    /// Wire data for a collection to local field maps, in order.
    fn deserialize_many(
        &self,
        ty: &ResourceType,
        data: Value,
    ) -> Result<Vec<Map<String, Value>>, SyncError>;

    /// Encode a payload for the request body.
    fn prepare_data(&self, payload: &Value) -> Result<String, SyncError>;

    /// Decode a response body. An empty body decodes to `None`.
    fn parse(&self, body: &str) -> Result<Option<Value>, SyncError>;

    fn register_transform(&mut self, kind: &str, transform: Arc<dyn Transform>);
}

/// JSON serializer with per-field-kind transforms.
#[derive(Default)]
pub struct JsonSerializer {
    transforms: HashMap<String, Arc<dyn Transform>>,
    wrap_root: bool,
}

impl JsonSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap outgoing payloads in the singular root key, Rails style.
    pub fn with_root_wrapping(mut self) -> Self {
        self.wrap_root = true;
        self
    }

    fn map_fields(
        &self,
        ty: &ResourceType,
        fields: Map<String, Value>,
        outgoing: bool,
    ) -> Map<String, Value> {
        if self.transforms.is_empty() {
            return fields;
        }
        fields
            .into_iter()
            .map(|(name, value)| {
                let transform = ty
                    .field_kind(&name)
                    .and_then(|kind| self.transforms.get(kind));
                let value = match transform {
                    Some(t) if outgoing => t.serialize(value),
                    Some(t) => t.deserialize(value),
                    None => value,
                };
                (name, value)
            })
            .collect()
    }
}

impl fmt::Debug for JsonSerializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&str> = self.transforms.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        f.debug_struct("JsonSerializer")
            .field("transforms", &kinds)
            .field("wrap_root", &self.wrap_root)
            .finish()
    }
}

impl Serializer for JsonSerializer {
    fn data_type(&self) -> Option<&str> {
        Some("json")
    }

    fn content_type(&self) -> &str {
        "application/json"
    }

    fn serialize(&self, ty: &ResourceType, fields: Map<String, Value>) -> Value {
        let fields = Value::Object(self.map_fields(ty, fields, true));
        if self.wrap_root {
            let mut root = Map::new();
            root.insert(ty.singular_key(), fields);
            Value::Object(root)
        } else {
            fields
        }
    }

    fn deserialize(&self, ty: &ResourceType, data: Value) -> Result<Map<String, Value>, SyncError> {
        let data = unwrap_root(data, &ty.singular_key());
        match data {
            Value::Object(fields) => Ok(self.map_fields(ty, fields, false)),
            other => Err(SyncError::Deserialization(format!(
                "expected an object for `{}`, got {}",
                ty.name,
                kind_of(&other)
            ))),
        }
    }

    fn deserialize_many(
        &self,
        ty: &ResourceType,
        data: Value,
    ) -> Result<Vec<Map<String, Value>>, SyncError> {
        let items = match unwrap_root(data, &ty.path_segment()) {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => {
                return Err(SyncError::Deserialization(format!(
                    "expected an array of `{}`, got {}",
                    ty.name,
                    kind_of(&other)
                )))
            }
        };
        items
            .into_iter()
            .map(|item| self.deserialize(ty, item))
            .collect()
    }

    fn prepare_data(&self, payload: &Value) -> Result<String, SyncError> {
        serde_json::to_string(payload).map_err(|e| SyncError::Serialization(e.to_string()))
    }

    fn parse(&self, body: &str) -> Result<Option<Value>, SyncError> {
        if body.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(body)
            .map(Some)
            .map_err(|e| SyncError::Deserialization(e.to_string()))
    }

    fn register_transform(&mut self, kind: &str, transform: Arc<dyn Transform>) {
        self.transforms.insert(kind.to_string(), transform);
    }
}

/// An object holding `key` yields the value under it, whatever sibling keys
/// (`meta`, `links`) sit next to it. Anything else is returned unchanged.
fn unwrap_root(data: Value, key: &str) -> Value {
    match data {
        Value::Object(mut map) if map.contains_key(key) => {
            map.remove(key).unwrap_or(Value::Null)
        }
        other => other,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
