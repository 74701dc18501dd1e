//! REST adapter: issues operations and reconciles their outcomes.
//!
//! # Design
//! Every operation has the same three steps:
//!
//! 1. Under the record lock: check preconditions, build the request, mark the
//!    record and take a supersession token.
//! 2. Without any lock: await the transport.
//! 3. Under the record lock again: drop the outcome if the token is stale,
//!    otherwise apply it in one step.
//!
//! Notifications go out after the lock is released, so an observer may
//! inspect or lock the record it is told about. For each settlement `DidLoad`
//! is emitted first (save, reload and finds), followed by the outcome event.
//!
//! Network failures and unparsable bodies never escape as `Err`; they end up
//! on the record as `is_error` plus normalized detail. `Err` is reserved for
//! precondition violations, which are rejected before anything is sent.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::collection::CollectionResult;
use crate::config::AdapterConfig;
use crate::error::SyncError;
use crate::http::HttpRequest;
use crate::normalize::{normalize, NormalizedError};
use crate::record::{Record, SharedRecord, SyncEvent};
use crate::request::{Operation, RequestBuilder};
use crate::resource::Resource;
use crate::serializer::{JsonSerializer, Serializer, Transform};
use crate::transport::TransportGateway;

/// A lifecycle event delivered to the adapter's observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub resource: &'static str,
    /// Primary key of the record, `None` for collections and unsaved records.
    pub key: Option<String>,
    pub event: SyncEvent,
}

/// How an operation ended, as seen by the caller that issued it.
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    /// Nothing to send; the record was already in sync.
    Skipped,
    Succeeded,
    /// The failure was recorded on the target.
    Failed(NormalizedError),
    /// A newer operation on the same record took over; this outcome was
    /// discarded.
    Superseded,
}

impl Settlement {
    pub fn is_success(&self) -> bool {
        matches!(self, Settlement::Skipped | Settlement::Succeeded)
    }
}

/// A successful exchange: the decoded body (if any) plus what is needed to
/// report a decoding failure.
struct Payload {
    status: u16,
    data: Option<Value>,
}

type Reply = Result<Payload, NormalizedError>;

const LOADED: &[SyncEvent] = &[SyncEvent::DidLoad];
const LOADED_WITH_ERROR: &[SyncEvent] = &[SyncEvent::DidLoad, SyncEvent::BecameError];

/// Synchronizes resources with a REST service through a `TransportGateway`.
pub struct RestAdapter<T> {
    config: AdapterConfig,
    builder: RequestBuilder,
    serializer: Box<dyn Serializer>,
    transport: T,
    observer: Option<Arc<dyn Fn(&Notice) + Send + Sync>>,
}

impl<T> fmt::Debug for RestAdapter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestAdapter")
            .field("config", &self.config)
            .field("root", &self.builder.root())
            .finish_non_exhaustive()
    }
}

impl<T: TransportGateway> RestAdapter<T> {
    /// Create an adapter with the default JSON serializer.
    pub fn new(config: AdapterConfig, transport: T) -> Self {
        Self {
            builder: RequestBuilder::new(&config),
            config,
            serializer: Box::new(JsonSerializer::new()),
            transport,
            observer: None,
        }
    }

    pub fn with_serializer(mut self, serializer: impl Serializer + 'static) -> Self {
        self.serializer = Box::new(serializer);
        self
    }

    /// Receive every lifecycle event this adapter produces.
    pub fn with_observer(mut self, observer: impl Fn(&Notice) + Send + Sync + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Register a field transform with the serializer. Takes `&mut self`, so
    /// it can only happen before the adapter is shared.
    pub fn register_transform(&mut self, kind: &str, transform: Arc<dyn Transform>) {
        self.serializer.register_transform(kind, transform);
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn root_path(&self) -> &str {
        self.builder.root()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// URL of `resource`, or of the record named by `resource_key`.
    pub fn build_url<R: Resource>(&self, resource: &R, resource_key: Option<&str>) -> String {
        self.builder.build_url(
            &R::TYPE,
            resource_key,
            resource.primary_key().as_deref(),
            self.serializer.data_type(),
        )
    }

    pub fn build_request<R: Resource>(
        &self,
        resource: &R,
        operation: Operation,
        query: &[(&str, &str)],
        resource_key: Option<&str>,
    ) -> Result<HttpRequest, SyncError> {
        self.builder
            .build_request(self.serializer.as_ref(), resource, operation, query, resource_key)
    }

    /// POST a new record or PUT a dirty one.
    ///
    /// A record that is neither new nor dirty is not sent and settles as
    /// `Skipped`.
    pub async fn save<R: Resource>(&self, record: &SharedRecord<R>) -> Result<Settlement, SyncError> {
        let (token, is_new, request) = {
            let mut rec = record.lock();
            preflight(&rec, false)?;
            if !rec.is_new() && !rec.is_dirty() {
                tracing::debug!(resource = R::TYPE.name, "record is clean, skipping save");
                return Ok(Settlement::Skipped);
            }
            let is_new = rec.is_new();
            let operation = if is_new {
                Operation::Create
            } else {
                Operation::Update
            };
            let request = self.build_request(rec.resource(), operation, &[], None)?;
            let token = rec.begin(&request, true);
            (token, is_new, request)
        };

        let reply = self.exchange::<R>(request).await;

        let (settlement, key, outcome) = {
            let mut rec = record.lock();
            if !rec.is_current(token) {
                tracing::debug!(resource = R::TYPE.name, token, "discarding superseded save");
                return Ok(Settlement::Superseded);
            }
            rec.finish();
            let (settlement, outcome) = match self.absorb(&mut rec, reply) {
                Ok(()) => {
                    rec.mark_clean();
                    let event = if is_new {
                        SyncEvent::DidCreate
                    } else {
                        SyncEvent::DidUpdate
                    };
                    (Settlement::Succeeded, event)
                }
                Err(err) => (Settlement::Failed(err), SyncEvent::BecameError),
            };
            (settlement, rec.primary_key(), outcome)
        };

        self.notify::<R>(key, &[SyncEvent::DidLoad, outcome]);
        Ok(settlement)
    }

    /// DELETE a saved record. On success the record is destroyed and further
    /// operations on it are rejected; on failure it stays usable.
    pub async fn delete<R: Resource>(&self, record: &SharedRecord<R>) -> Result<Settlement, SyncError> {
        let (token, key, request) = {
            let mut rec = record.lock();
            preflight(&rec, true)?;
            let request = self.build_request(rec.resource(), Operation::Delete, &[], None)?;
            let token = rec.begin(&request, false);
            (token, rec.primary_key(), request)
        };

        let reply = self.exchange::<R>(request).await;

        let (settlement, event) = {
            let mut rec = record.lock();
            if !rec.is_current(token) {
                tracing::debug!(resource = R::TYPE.name, token, "discarding superseded delete");
                return Ok(Settlement::Superseded);
            }
            match reply {
                Ok(_) => {
                    rec.destroy();
                    (Settlement::Succeeded, SyncEvent::DidDelete)
                }
                Err(err) => {
                    rec.release();
                    rec.mark_error(err.body.clone());
                    (Settlement::Failed(err), SyncEvent::BecameError)
                }
            }
        };

        self.notify::<R>(key, &[event]);
        Ok(settlement)
    }

    /// Re-read a saved record from the server into the same record.
    pub async fn reload<R: Resource>(&self, record: &SharedRecord<R>) -> Result<Settlement, SyncError> {
        let (token, request) = {
            let mut rec = record.lock();
            preflight(&rec, true)?;
            let request = self.build_request(rec.resource(), Operation::Read, &[], None)?;
            let token = rec.begin(&request, false);
            (token, request)
        };

        let reply = self.exchange::<R>(request).await;

        let (settlement, key, events) = {
            let mut rec = record.lock();
            if !rec.is_current(token) {
                tracing::debug!(resource = R::TYPE.name, token, "discarding superseded reload");
                return Ok(Settlement::Superseded);
            }
            let (settlement, events) = self.settle_read(&mut rec, reply);
            (settlement, rec.primary_key(), events)
        };

        self.notify::<R>(key, events);
        Ok(settlement)
    }

    /// GET one record by key. The returned record has settled: it is loaded,
    /// and carries the error if the read failed.
    pub async fn find_by_key<R: Resource>(
        &self,
        key: &str,
        query: &[(&str, &str)],
    ) -> Result<Record<R>, SyncError> {
        R::TYPE.validate().inspect_err(log_rejection::<R>)?;
        if key.is_empty() {
            let err = SyncError::MissingKey {
                resource: R::TYPE.name,
            };
            log_rejection::<R>(&err);
            return Err(err);
        }

        let mut record = Record::<R>::pending(key)?;
        let request = self
            .builder
            .build_read(self.serializer.as_ref(), &R::TYPE, query, Some(key))?;
        record.begin(&request, false);

        let reply = self.exchange::<R>(request).await;

        let (_, events) = self.settle_read(&mut record, reply);
        self.notify::<R>(record.primary_key(), events);
        Ok(record)
    }

    /// GET the whole collection.
    pub async fn find_all<R: Resource>(&self) -> Result<CollectionResult<R>, SyncError> {
        self.find_query(&[]).await
    }

    /// GET the collection filtered by `query`.
    pub async fn find_query<R: Resource>(
        &self,
        query: &[(&str, &str)],
    ) -> Result<CollectionResult<R>, SyncError> {
        R::TYPE.validate().inspect_err(log_rejection::<R>)?;
        let request = self
            .builder
            .build_read(self.serializer.as_ref(), &R::TYPE, query, None)?;

        let reply = self.exchange::<R>(request).await;

        let mut result = CollectionResult::new();
        let decoded = reply.and_then(|payload| self.decode_many::<R>(payload));
        let events = match decoded {
            Ok(records) => {
                result.populate(records);
                LOADED
            }
            Err(err) => {
                result.mark_error(err.body);
                LOADED_WITH_ERROR
            }
        };
        result.mark_loaded();

        self.notify::<R>(None, events);
        Ok(result)
    }

    /// Hand the request to the transport and classify the outcome.
    async fn exchange<R: Resource>(&self, request: HttpRequest) -> Reply {
        tracing::debug!(
            resource = R::TYPE.name,
            method = %request.method,
            url = %request.url,
            "issuing request"
        );
        let response = match self.transport.submit(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(resource = R::TYPE.name, error = %e, "transport failed");
                return Err(NormalizedError {
                    status: None,
                    body: None,
                    raw: e.to_string(),
                });
            }
        };

        tracing::debug!(resource = R::TYPE.name, status = response.status, "request settled");
        if !response.is_success() {
            return Err(normalize(
                self.serializer.as_ref(),
                Some(response.status),
                &response.body,
            ));
        }
        match self.serializer.parse(&response.body) {
            Ok(data) => Ok(Payload {
                status: response.status,
                data,
            }),
            Err(e) => Err(undecodable::<R>(Some(response.status), response.body, &e)),
        }
    }

    /// Apply a reply to a record: merge the body on success, attach the
    /// error on failure. Flags other than the error pair are left alone.
    fn absorb<R: Resource>(&self, rec: &mut Record<R>, reply: Reply) -> Result<(), NormalizedError> {
        let result = reply.and_then(|payload| self.decode_into(rec, payload));
        match &result {
            Ok(()) => rec.clear_errors(),
            Err(err) => rec.mark_error(err.body.clone()),
        }
        result
    }

    fn settle_read<R: Resource>(
        &self,
        rec: &mut Record<R>,
        reply: Reply,
    ) -> (Settlement, &'static [SyncEvent]) {
        rec.finish();
        match self.absorb(rec, reply) {
            Ok(()) => (Settlement::Succeeded, LOADED),
            Err(err) => (Settlement::Failed(err), LOADED_WITH_ERROR),
        }
    }

    /// Merge a decoded body into `rec`. An empty or `null` body keeps local
    /// values.
    fn decode_into<R: Resource>(&self, rec: &mut Record<R>, payload: Payload) -> Result<(), NormalizedError> {
        let Some(data) = payload.data.filter(|data| !data.is_null()) else {
            return Ok(());
        };
        let raw = data.to_string();
        self.serializer
            .deserialize(&R::TYPE, data)
            .and_then(|fields| rec.merge(fields))
            .map_err(|e| undecodable::<R>(Some(payload.status), raw, &e))
    }

    fn decode_many<R: Resource>(&self, payload: Payload) -> Result<Vec<Record<R>>, NormalizedError> {
        let data = payload.data.unwrap_or(Value::Null);
        let raw = data.to_string();
        self.serializer
            .deserialize_many(&R::TYPE, data)
            .and_then(|items| {
                items
                    .into_iter()
                    .map(Record::<R>::from_server)
                    .collect::<Result<Vec<_>, _>>()
            })
            .map_err(|e| undecodable::<R>(Some(payload.status), raw, &e))
    }

    fn notify<R: Resource>(&self, key: Option<String>, events: &[SyncEvent]) {
        for &event in events {
            tracing::debug!(resource = R::TYPE.name, key = ?key, ?event, "lifecycle event");
            if let Some(observer) = &self.observer {
                observer(&Notice {
                    resource: R::TYPE.name,
                    key: key.clone(),
                    event,
                });
            }
        }
    }
}

/// Shared precondition checks, run under the record lock.
fn preflight<R: Resource>(rec: &Record<R>, needs_key: bool) -> Result<(), SyncError> {
    R::TYPE
        .validate()
        .and_then(|()| rec.ensure_live())
        .and_then(|()| {
            if needs_key && rec.is_new() {
                return Err(SyncError::MissingKey {
                    resource: R::TYPE.name,
                });
            }
            Ok(())
        })
        .inspect_err(log_rejection::<R>)
}

fn log_rejection<R: Resource>(err: &SyncError) {
    tracing::warn!(resource = R::TYPE.name, error = %err, "operation rejected");
}

/// A success body that cannot be applied is recorded like a failure with no
/// structured detail.
fn undecodable<R: Resource>(status: Option<u16>, raw: String, err: &SyncError) -> NormalizedError {
    tracing::warn!(resource = R::TYPE.name, ?status, error = %err, "response body could not be applied");
    NormalizedError {
        status,
        body: None,
        raw,
    }
}
