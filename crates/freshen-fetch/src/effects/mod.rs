//! I/O: HTTP, sessions, remote sources, partial files, and the fetcher.

pub mod fetcher;
pub mod http;
pub mod partial;
pub mod remote;
pub mod session;

#[cfg(test)]
pub(crate) mod mock;

pub use fetcher::{Fetcher, resolve_destination};
pub use http::{Body, BoxStream, Headers, HttpClient, Method, Request, Response};
#[cfg(feature = "reqwest")]
pub use http::ReqwestClient;
pub use partial::{PartialTransfer, Sidecars};
pub use remote::{RemoteMetadata, RemoteSource, RemoteStream};
pub use session::{Authenticator, BearerToken, FnAuthenticator, Session, auth_fn};
