//! Client for the Simperium document sync service.
//!
//! # Architecture
//!
//! - **Transport**: sends one HTTP request and returns the raw response
//! - **Auth**: exchanges credentials for access tokens
//! - **Bucket**: document CRUD, paginated index, and the long-poll change feed
//! - **Api / Admin**: hands out bucket clients by name
//!
//! Ids come from `simperium-types`: one [`ClientId`] per bucket client, one
//! fresh [`ChangeId`] per write.
//!
//! ## Failure model
//!
//! Expected outcomes are values, not errors: `get` on a missing document
//! returns `None`, an idle or interrupted long-poll returns an empty list,
//! and `Auth::create` returns `None` when the account cannot be made. Every
//! other failure propagates as [`Error`]. Nothing is retried internally.
//!
//! # Example
//!
//! ```no_run
//! use simperium_core::{Bucket, PostOptions};
//! use serde_json::json;
//!
//! # async fn run() -> simperium_core::Result<()> {
//! let bucket = Bucket::new("myapp", "db3d2a64abf711e0b63012313d001a3b", "notes")?;
//! let data = json!({"age": 23}).as_object().cloned().unwrap_or_default();
//! bucket.post("item2", &data, PostOptions::default()).await?;
//! let doc = bucket.get("item2", None).await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod bucket;
pub mod change;
pub mod config;
pub mod diff;
mod error;
pub mod transport;

pub use api::{Admin, Api, Handle, SpUser, USER_BUCKET};
pub use auth::Auth;
pub use bucket::{
    AllOptions, Bucket, BucketOptions, BulkOutcome, Data, Document, IndexEntry, IndexOptions,
    IndexPage, PostOptions, PostResult, BATCH_DEFAULT_SIZE,
};
pub use change::{last_cv, Change, ChangeRecord, Operation};
pub use config::{Endpoint, TransportConfig};
pub use diff::{encode_create, Diff, FieldDiff, FieldOp};
pub use error::{Action, Error, Result, TransportError};
pub use transport::{HttpTransport, Request, RequestBody, Response, Transport};

pub use simperium_types::{ChangeId, ChangeVersion, ClientId};
