//! Query results.

use std::slice;

use serde_json::Value;

use crate::record::Record;
use crate::resource::Resource;

/// Ordered records produced by a multi-record query, with the lifecycle of
/// the query itself. Members keep their own flags independently.
#[derive(Debug)]
pub struct CollectionResult<R> {
    items: Vec<Record<R>>,
    is_loaded: bool,
    is_error: bool,
    errors: Option<Value>,
}

impl<R: Resource> CollectionResult<R> {
    pub(crate) fn new() -> Self {
        Self {
            items: Vec::new(),
            is_loaded: false,
            is_error: false,
            errors: None,
        }
    }

    pub(crate) fn populate(&mut self, items: Vec<Record<R>>) {
        self.items = items;
        self.is_error = false;
        self.errors = None;
    }

    pub(crate) fn mark_error(&mut self, errors: Option<Value>) {
        self.is_error = true;
        self.errors = errors;
    }

    pub(crate) fn mark_loaded(&mut self) {
        self.is_loaded = true;
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Record<R>> {
        self.items.get(index)
    }

    pub fn iter(&self) -> slice::Iter<'_, Record<R>> {
        self.items.iter()
    }

    /// Borrow the member resources in order.
    pub fn resources(&self) -> impl Iterator<Item = &R> {
        self.items.iter().map(Record::resource)
    }

    pub fn into_records(self) -> Vec<Record<R>> {
        self.items
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
}

impl<R: Resource> IntoIterator for CollectionResult<R> {
    type Item = Record<R>;
    type IntoIter = std::vec::IntoIter<Record<R>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, R: Resource> IntoIterator for &'a CollectionResult<R> {
    type Item = &'a Record<R>;
    type IntoIter = slice::Iter<'a, Record<R>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
