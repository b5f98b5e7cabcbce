//! Resumable, digest-verified HTTP downloads under idempotency policies.
//!
//! A [`Fetcher`] decides whether a destination needs downloading, streams
//! the remote body into a locked `X.download` sidecar, verifies the
//! primary digest and publishes the result atomically. Interrupted
//! downloads resume on the next run when their digest marker still
//! matches.
//!
//! # Architecture
//!
//! - [`core`]: pure functions (retry schedule, status codes, header parsing)
//! - `data`: options, fetch descriptors and throughput tracking
//! - `effects`: HTTP clients, sessions, remote sources, partial files
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use freshen_fetch::{FetchSpec, Fetcher, ReqwestClient, Session};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let session = Arc::new(Session::new(ReqwestClient::new()?));
//! let spec = FetchSpec::new("https://example.org/data.csv", "data.csv");
//! let (tx, _rx) = freshen_policy::channel(64);
//! let record = Fetcher::new(spec, session).run(None, &tx).await;
//! println!("{record:?}");
//! # Ok(())
//! # }
//! ```

pub mod core;
mod data;
mod effects;
mod error;

pub use data::{FetchOptions, FetchSpec, MOMENTUM, ResumeFallback, Throughput};
pub use effects::{
    Authenticator, BearerToken, Body, BoxStream, Fetcher, FnAuthenticator, Headers, HttpClient,
    Method, PartialTransfer, RemoteMetadata, RemoteSource, RemoteStream, Request, Response, Session, Sidecars,
    auth_fn, resolve_destination,
};
#[cfg(feature = "reqwest")]
pub use effects::ReqwestClient;
pub use error::{BoxError, FetchError, Result, TransportError};
