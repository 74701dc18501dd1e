//! Resource synchronization core for REST services.
//!
//! # Overview
//! Resolves where a resource lives, builds the request for each CRUD
//! operation, hands it to a caller-supplied `TransportGateway`, and folds the
//! response back into the resource together with its sync flags
//! (new, dirty, saving, loaded, error).
//!
//! # Design
//! - The core never performs I/O; `TransportGateway` is the only seam to the
//!   network, and `MockTransport` scripts it in tests.
//! - `RestAdapter` holds an explicit `AdapterConfig` and serializer; there is
//!   no global configuration.
//! - Records live behind `SharedRecord` so several operations on the same
//!   record can be in flight. Only the newest one may settle it.
//! - Wire format concerns stay behind the `Serializer` trait, with
//!   `JsonSerializer` as the default.

pub mod adapter;
pub mod collection;
pub mod config;
pub mod error;
pub mod http;
pub mod normalize;
pub mod path;
pub mod record;
pub mod request;
pub mod resource;
pub mod serializer;
pub mod transport;

pub use adapter::{Notice, RestAdapter, Settlement};
pub use collection::CollectionResult;
pub use config::AdapterConfig;
pub use error::SyncError;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use normalize::NormalizedError;
pub use record::{Record, RequestHandle, SharedRecord, SyncEvent, SyncPhase};
pub use request::{Operation, RequestBuilder};
pub use resource::{Field, Resource, ResourceType};
pub use serializer::{JsonSerializer, Serializer, Transform};
pub use transport::{MockTransport, TransportError, TransportGateway};
