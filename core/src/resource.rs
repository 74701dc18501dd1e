//! Resource capability and static schema metadata.
//!
//! # Design
//! A resource is any serde-serializable struct that names its `ResourceType`.
//! Serialization to and from a JSON field map is the only capability the core
//! needs, so the defaults here cover field access, merging and primary key
//! lookup; implementors override them only for unusual layouts.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::SyncError;
use crate::path;

/// A field whose wire representation goes through a registered transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub kind: &'static str,
}

/// Static schema metadata shared by every instance of a resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceType {
    pub name: &'static str,
    pub primary_key: &'static str,
    pub fields: &'static [Field],
}

impl ResourceType {
    pub const fn new(name: &'static str, primary_key: &'static str) -> Self {
        Self {
            name,
            primary_key,
            fields: &[],
        }
    }

    pub const fn with_fields(self, fields: &'static [Field]) -> Self {
        Self { fields, ..self }
    }

    /// Reject types the core cannot address. Called before every operation.
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.name.is_empty() {
            return Err(SyncError::MissingResourceName);
        }
        if self.primary_key.is_empty() {
            return Err(SyncError::MissingPrimaryKeyField { resource: self.name });
        }
        Ok(())
    }

    /// Network path segment, e.g. `post_groups`.
    pub fn path_segment(&self) -> String {
        path::resource_path(self.name)
    }

    /// Root key for a single wrapped record, e.g. `post_group`.
    pub fn singular_key(&self) -> String {
        path::decamelize(self.name)
    }

    pub fn field_kind(&self, field: &str) -> Option<&'static str> {
        self.fields.iter().find(|f| f.name == field).map(|f| f.kind)
    }
}

/// A domain entity synchronized with a remote service.
pub trait Resource: Serialize + DeserializeOwned + Default + Send + 'static {
    const TYPE: ResourceType;

    /// Current field values as a JSON object.
    fn to_fields(&self) -> Result<Map<String, Value>, SyncError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(SyncError::NotAnObject {
                resource: Self::TYPE.name,
            }),
            Err(e) => Err(SyncError::Serialization(e.to_string())),
        }
    }

    /// Overlay `data` on the current field values. Fields absent from `data`
    /// keep their local value.
    fn apply_fields(&mut self, data: Map<String, Value>) -> Result<(), SyncError> {
        let mut merged = self.to_fields()?;
        merged.extend(data);
        *self = serde_json::from_value(Value::Object(merged))
            .map_err(|e| SyncError::Deserialization(e.to_string()))?;
        Ok(())
    }

    /// The primary key rendered for use in a URL, or `None` when the server
    /// has not assigned one yet.
    fn primary_key(&self) -> Option<String> {
        let fields = self.to_fields().ok()?;
        fields.get(Self::TYPE.primary_key).and_then(key_string)
    }
}

/// Render a key value as a path segment. Null, empty strings and structured
/// values count as "no key".
pub fn key_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
