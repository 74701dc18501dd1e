//! Per-resource synchronization state.
//!
//! # Design
//! `Record<R>` pairs a resource with its lifecycle flags and the handle of the
//! request currently allowed to settle it. Every transition is a named method
//! that updates the flags in one step; the adapter calls them while holding
//! the record lock, so observers only ever see settled states.
//!
//! Each issued request bumps `generation` and remembers it in the handle.
//! A settlement whose token no longer matches belongs to a superseded request
//! and is dropped.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::error::SyncError;
use crate::http::{HttpMethod, HttpRequest};
use crate::resource::Resource;

/// A record shared between the owner and in-flight adapter operations.
pub type SharedRecord<R> = Arc<Mutex<Record<R>>>;

/// Lifecycle notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEvent {
    DidLoad,
    DidCreate,
    DidUpdate,
    DidDelete,
    BecameError,
}

/// Coarse view of a record's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Saving,
    SettledSuccess,
    SettledError,
}

/// The request currently entitled to settle a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHandle {
    pub token: u64,
    pub method: HttpMethod,
    pub url: String,
}

/// A resource plus its synchronization state.
#[derive(Debug)]
pub struct Record<R> {
    resource: R,
    is_dirty: bool,
    is_saving: bool,
    is_loaded: bool,
    is_error: bool,
    errors: Option<Value>,
    current_request: Option<RequestHandle>,
    generation: u64,
    destroyed: bool,
}

impl<R: Resource> Record<R> {
    /// Wrap a locally created resource. It is new unless it already carries a
    /// primary key.
    pub fn new(resource: R) -> Self {
        Self {
            resource,
            is_dirty: false,
            is_saving: false,
            is_loaded: false,
            is_error: false,
            errors: None,
            current_request: None,
            generation: 0,
            destroyed: false,
        }
    }

    /// A record about to be loaded by key. The key is set up front so the
    /// record is not new while it waits for its data. Keys are tried as
    /// strings first, then as numbers for numerically keyed resources.
    pub(crate) fn pending(key: &str) -> Result<Self, SyncError> {
        let mut resource = R::default();
        if let Err(err) = resource.apply_fields(key_fields::<R>(Value::from(key))) {
            match serde_json::from_str::<Value>(key) {
                Ok(number @ Value::Number(_)) => resource.apply_fields(key_fields::<R>(number))?,
                _ => return Err(err),
            }
        }
        Ok(Self::new(resource))
    }

    /// A record built from one element of a collection response.
    pub(crate) fn from_server(fields: Map<String, Value>) -> Result<Self, SyncError> {
        let mut resource = R::default();
        resource.apply_fields(fields)?;
        let mut record = Self::new(resource);
        record.is_loaded = true;
        Ok(record)
    }

    pub fn into_shared(self) -> SharedRecord<R> {
        Arc::new(Mutex::new(self))
    }

    pub fn resource(&self) -> &R {
        &self.resource
    }

    pub fn into_resource(self) -> R {
        self.resource
    }

    /// Edit the resource locally and mark the record dirty.
    pub fn update(&mut self, edit: impl FnOnce(&mut R)) {
        edit(&mut self.resource);
        self.is_dirty = true;
    }

    pub fn primary_key(&self) -> Option<String> {
        self.resource.primary_key()
    }

    /// No server-assigned identity yet.
    pub fn is_new(&self) -> bool {
        self.primary_key().is_none()
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    pub fn is_saving(&self) -> bool {
        self.is_saving
    }

    pub fn is_loaded(&self) -> bool {
        self.is_loaded
    }

    pub fn is_error(&self) -> bool {
        self.is_error
    }

    pub fn errors(&self) -> Option<&Value> {
        self.errors.as_ref()
    }

    pub fn current_request(&self) -> Option<&RequestHandle> {
        self.current_request.as_ref()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn phase(&self) -> SyncPhase {
        if self.is_saving {
            SyncPhase::Saving
        } else if !self.is_loaded {
            SyncPhase::Idle
        } else if self.is_error {
            SyncPhase::SettledError
        } else {
            SyncPhase::SettledSuccess
        }
    }

    pub(crate) fn ensure_live(&self) -> Result<(), SyncError> {
        if self.destroyed {
            return Err(SyncError::Destroyed {
                resource: R::TYPE.name,
            });
        }
        Ok(())
    }

    /// Make `request` the current one and return its token.
    pub(crate) fn begin(&mut self, request: &HttpRequest, saving: bool) -> u64 {
        self.generation += 1;
        self.current_request = Some(RequestHandle {
            token: self.generation,
            method: request.method,
            url: request.url.clone(),
        });
        if saving {
            self.is_saving = true;
        }
        self.generation
    }

    pub(crate) fn is_current(&self, token: u64) -> bool {
        !self.destroyed
            && self
                .current_request
                .as_ref()
                .is_some_and(|handle| handle.token == token)
    }

    /// Drop the current request without marking the record loaded.
    pub(crate) fn release(&mut self) {
        self.current_request = None;
        self.is_saving = false;
    }

    /// Settlement bookkeeping shared by saves and reads, whatever the outcome.
    pub(crate) fn finish(&mut self) {
        self.release();
        self.is_loaded = true;
    }

    pub(crate) fn merge(&mut self, fields: Map<String, Value>) -> Result<(), SyncError> {
        self.resource.apply_fields(fields)
    }

    pub(crate) fn clear_errors(&mut self) {
        self.is_error = false;
        self.errors = None;
    }

    pub(crate) fn mark_clean(&mut self) {
        self.is_dirty = false;
    }

    pub(crate) fn mark_error(&mut self, errors: Option<Value>) {
        self.is_error = true;
        self.errors = errors;
    }

    pub(crate) fn destroy(&mut self) {
        self.destroyed = true;
        self.current_request = None;
        self.is_saving = false;
    }
}

fn key_fields<R: Resource>(key: Value) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert(R::TYPE.primary_key.to_string(), key);
    fields
}
