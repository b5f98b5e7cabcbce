use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::http::{Headers, HttpClient, Request, Response};
use crate::error::{BoxError, FetchError, Result, TransportError};

/// Refreshes session credentials after a request was refused.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, headers: &mut Headers) -> std::result::Result<(), BoxError>;
}

/// Sends `Authorization: Bearer <token>`.
#[derive(Clone)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BearerToken(..)")
    }
}

#[async_trait]
impl Authenticator for BearerToken {
    async fn authenticate(&self, headers: &mut Headers) -> std::result::Result<(), BoxError> {
        headers.set("Authorization", format!("Bearer {}", self.0));
        Ok(())
    }
}

pub struct FnAuthenticator<F>(F);

#[async_trait]
impl<F> Authenticator for FnAuthenticator<F>
where
    F: Fn(&mut Headers) -> std::result::Result<(), BoxError> + Send + Sync,
{
    async fn authenticate(&self, headers: &mut Headers) -> std::result::Result<(), BoxError> {
        (self.0)(headers)
    }
}

pub fn auth_fn<F>(f: F) -> FnAuthenticator<F>
where
    F: Fn(&mut Headers) -> std::result::Result<(), BoxError> + Send + Sync,
{
    FnAuthenticator(f)
}

/// One HTTP client plus session-wide headers, shared read-only by every
/// fetch of a batch. Only [`authenticate`](Self::authenticate) mutates it.
pub struct Session<C> {
    client: C,
    headers: RwLock<Headers>,
    auth: Option<Arc<dyn Authenticator>>,
}

impl<C: HttpClient> Session<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            headers: RwLock::new(Headers::new()),
            auth: None,
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.get_mut().set(name, value);
        self
    }

    #[must_use]
    pub fn with_authenticator(mut self, auth: impl Authenticator + 'static) -> Self {
        self.auth = Some(Arc::new(auth));
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Sends `request` with session headers underneath its own.
    pub async fn send(&self, mut request: Request) -> std::result::Result<Response, TransportError> {
        let mut headers = self.headers.read().await.clone();
        headers.merge(&request.headers);
        request.headers = headers;
        self.client.send(request).await
    }

    pub fn can_authenticate(&self) -> bool {
        self.auth.is_some()
    }

    pub async fn authenticate(&self) -> Result<()> {
        let Some(auth) = &self.auth else {
            return Ok(());
        };
        let mut headers = self.headers.write().await;
        auth.authenticate(&mut headers).await.map_err(FetchError::Auth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::mock::{MockClient, Reply};
    use crate::effects::http::Method;
    use url::Url;

    #[tokio::test]
    async fn test_session_headers_sit_under_request_headers() {
        let client = MockClient::new(|_| Ok(Reply::status(200)));
        let session = Session::new(client)
            .with_header("User-Agent", "freshen")
            .with_header("X-Scope", "session");
        let request = Request::new(Method::Get, Url::parse("http://h/a").unwrap()).header("x-scope", "request");
        session.send(request).await.unwrap();

        let sent = &session.client().requests()[0];
        assert_eq!(sent.headers.get("user-agent"), Some("freshen"));
        assert_eq!(sent.headers.get("X-Scope"), Some("request"));
    }

    #[tokio::test]
    async fn test_authenticate_updates_session_headers() {
        let client = MockClient::new(|_| Ok(Reply::status(200)));
        let session = Session::new(client).with_authenticator(BearerToken::new("t0k"));
        assert!(session.can_authenticate());
        session.authenticate().await.unwrap();
        session
            .send(Request::new(Method::Head, Url::parse("http://h/a").unwrap()))
            .await
            .unwrap();
        assert_eq!(
            session.client().requests()[0].headers.get("authorization"),
            Some("Bearer t0k")
        );
    }

    #[tokio::test]
    async fn test_failed_authentication_is_reported() {
        let client = MockClient::new(|_| Ok(Reply::status(200)));
        let session = Session::new(client).with_authenticator(auth_fn(|_| Err("denied".into())));
        let err = session.authenticate().await.unwrap_err();
        assert!(matches!(err, FetchError::Auth(_)));
    }
}
