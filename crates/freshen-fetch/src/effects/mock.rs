use std::sync::Mutex;

use bytes::Bytes;

use super::http::{Headers, HttpClient, Request, Response};
use crate::error::TransportError;

pub(crate) struct Reply {
    status: u16,
    headers: Headers,
    chunks: Vec<Bytes>,
}

impl Reply {
    pub(crate) fn status(status: u16) -> Self {
        Self {
            status,
            headers: Headers::new(),
            chunks: Vec::new(),
        }
    }

    pub(crate) fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    pub(crate) fn chunks(mut self, chunks: &[&[u8]]) -> Self {
        self.chunks = chunks.iter().map(|c| Bytes::copy_from_slice(c)).collect();
        self
    }
}

type Handler = dyn Fn(&Request) -> Result<Reply, TransportError> + Send + Sync;

/// Scripted client that records every request it sees.
pub(crate) struct MockClient {
    handler: Box<Handler>,
    log: Mutex<Vec<Request>>,
}

impl MockClient {
    pub(crate) fn new<F>(handler: F) -> Self
    where
        F: Fn(&Request) -> Result<Reply, TransportError> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            log: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn requests(&self) -> Vec<Request> {
        self.log.lock().unwrap().clone()
    }
}

impl HttpClient for MockClient {
    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        self.log.lock().unwrap().push(request.clone());
        let reply = (self.handler)(&request)?;
        let chunks: Vec<Result<Bytes, TransportError>> = reply.chunks.into_iter().map(Ok).collect();
        Ok(Response {
            status: reply.status,
            headers: reply.headers,
            body: Box::pin(futures_util::stream::iter(chunks)),
        })
    }
}
