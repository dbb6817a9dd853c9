//! Authenticated HTTP client for the Snippy backend
//!
//! Wraps the transport with bearer-token injection and a single
//! refresh-and-retry pass on 401 replies. Commands describe calls as
//! [`ApiRequest`] values; the client seals them (absolute URL, headers,
//! request id), sends them, and classifies the reply.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{FileTokenStore, HostedIdentityProvider, IdentityProvider, TokenStore};
use crate::config::Config;

use super::error::{backend_message, ApiError};

/// One backend call as the command layer describes it.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            body: Some(body),
        }
    }

    pub fn post_empty(path: impl Into<String>) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            body: None,
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: Method::DELETE,
            path: path.into(),
            body: None,
        }
    }
}

/// A request after sealing: absolute URL, credentials attached, ready
/// for the wire. Exactly what the transport sends, nothing implicit.
#[derive(Debug, Clone)]
pub struct SealedRequest {
    pub method: Method,
    pub url: String,
    pub bearer: Option<String>,
    pub request_id: String,
    pub body: Option<serde_json::Value>,
}

/// Transport-level reply: status plus raw body bytes.
#[derive(Debug, Clone)]
pub struct RawReply {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl RawReply {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Wire-level send. One implementation speaks HTTP; tests substitute
/// scripted replies.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &SealedRequest) -> Result<RawReply, ApiError>;
}

/// [`Transport`] over a shared reqwest client.
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// Materialize a sealed request as a reqwest builder. Split out so
    /// header formation is checkable without a socket.
    fn build_request(&self, request: &SealedRequest) -> reqwest::RequestBuilder {
        let mut builder = self
            .http
            .request(request.method.clone(), &request.url)
            .header("X-Request-Id", &request.request_id);
        if let Some(bearer) = &request.bearer {
            builder = builder.bearer_auth(bearer);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        builder
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &SealedRequest) -> Result<RawReply, ApiError> {
        let resp = self.build_request(request).send().await?;
        let status = resp.status();
        let body = resp.bytes().await?.to_vec();
        Ok(RawReply { status, body })
    }
}

/// Classify a raw reply by status. A 401 keeps its body verbatim so a
/// failed refresh can surface the original failure unchanged.
fn check_reply(reply: RawReply) -> Result<RawReply, ApiError> {
    let status = reply.status;
    if status == StatusCode::UNAUTHORIZED {
        let body = reply.text();
        return Err(ApiError::Unauthorized {
            message: backend_message(status, &body),
            body,
        });
    }
    if !status.is_success() {
        let body = reply.text();
        return Err(ApiError::Api {
            status,
            message: backend_message(status, &body),
        });
    }
    Ok(reply)
}

/// Authenticated client for the Snippy backend.
pub struct SnippyClient {
    transport: Arc<dyn Transport>,
    store: Arc<dyn TokenStore>,
    provider: Arc<dyn IdentityProvider>,
    base_url: String,
}

impl SnippyClient {
    /// Build the production client: config-dir token store, hosted
    /// identity provider, HTTP transport.
    pub fn new() -> Result<Self> {
        let config = Config::load()?;
        let store: Arc<dyn TokenStore> = Arc::new(FileTokenStore::open(Config::token_path()?)?);
        let provider: Arc<dyn IdentityProvider> = Arc::new(HostedIdentityProvider::from_disk()?);

        let client = Self::with_parts(
            Arc::new(HttpTransport::new()),
            store,
            provider,
            config.api_base(),
        );
        client.watch_identity();
        Ok(client)
    }

    /// Assemble a client from explicit parts.
    pub fn with_parts(
        transport: Arc<dyn Transport>,
        store: Arc<dyn TokenStore>,
        provider: Arc<dyn IdentityProvider>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            store,
            provider,
            base_url: base_url.into(),
        }
    }

    pub fn token_store(&self) -> &dyn TokenStore {
        self.store.as_ref()
    }

    pub fn identity_provider(&self) -> &dyn IdentityProvider {
        self.provider.as_ref()
    }

    /// Log the restored identity once, then every later transition.
    fn watch_identity(&self) {
        let mut events = self.provider.subscribe();
        tokio::spawn(async move {
            loop {
                match events.borrow_and_update().as_ref() {
                    Some(identity) => tracing::debug!("Identity: {}", identity.uid),
                    None => tracing::debug!("Identity: signed out"),
                }
                if events.changed().await.is_err() {
                    break;
                }
            }
        });
    }

    /// Seal `request` (absolute URL, bearer if one is stored, request
    /// id) and send it once. No retry logic lives here.
    async fn dispatch(&self, request: &ApiRequest, request_id: &str) -> Result<RawReply, ApiError> {
        let sealed = SealedRequest {
            method: request.method.clone(),
            url: format!("{}{}", self.base_url, request.path),
            bearer: self.store.token(),
            request_id: request_id.to_string(),
            body: request.body.clone(),
        };

        tracing::debug!("{} {}", sealed.method, sealed.url);
        let reply = self.transport.send(&sealed).await?;
        check_reply(reply)
    }

    /// Send `request`, running a single refresh-and-retry pass when the
    /// backend answers 401. The retry reuses the request id so the
    /// backend sees one logical call; a second 401 comes back as is.
    pub async fn execute(&self, request: &ApiRequest) -> Result<RawReply, ApiError> {
        let request_id = Uuid::new_v4().to_string();

        let original = match self.dispatch(request, &request_id).await {
            Err(e) if e.is_unauthorized() => e,
            outcome => return outcome,
        };

        match self.refresh_session().await {
            Ok(()) => {
                tracing::debug!("Retrying {} after token refresh", request.path);
                self.dispatch(request, &request_id).await
            }
            Err(e) => {
                tracing::debug!("Token refresh not possible: {:#}", e);
                Err(original)
            }
        }
    }

    /// Mint a fresh bearer from the identity provider and store it.
    async fn refresh_session(&self) -> Result<()> {
        let identity = self
            .provider
            .current_identity()
            .context("No signed-in identity")?;
        let bearer = self.provider.force_refresh(&identity).await?;
        self.store.set_token(&bearer)?;
        Ok(())
    }

    /// GET returning a JSON-decoded body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let reply = self.execute(&ApiRequest::get(path)).await?;
        Ok(serde_json::from_slice(&reply.body)?)
    }

    /// GET returning raw bytes (QR code images).
    pub async fn get_bytes(&self, path: &str) -> Result<Vec<u8>, ApiError> {
        let reply = self.execute(&ApiRequest::get(path)).await?;
        Ok(reply.body)
    }

    /// POST with a JSON body, returning a JSON-decoded reply.
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, ApiError> {
        let reply = self
            .execute(&ApiRequest::post(path, body.clone()))
            .await?;
        Ok(serde_json::from_slice(&reply.body)?)
    }

    /// POST with no body, ignoring the reply payload.
    pub async fn post_empty(&self, path: &str) -> Result<(), ApiError> {
        self.execute(&ApiRequest::post_empty(path)).await?;
        Ok(())
    }

    /// DELETE, ignoring the reply payload.
    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.execute(&ApiRequest::delete(path)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store::MemoryTokenStore;
    use crate::auth::provider::{FederatedCredential, Identity};
    use crate::models::{Enveloped, ShortLink};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::sync::watch;

    /// Transport that hands out scripted replies and records what it
    /// was asked to send.
    struct FakeTransport {
        script: Mutex<VecDeque<RawReply>>,
        sent: Mutex<Vec<SealedRequest>>,
    }

    impl FakeTransport {
        fn scripted(replies: Vec<RawReply>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(replies.into()),
                sent: Mutex::new(Vec::new()),
            })
        }

        fn sent(&self) -> Vec<SealedRequest> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn send(&self, request: &SealedRequest) -> Result<RawReply, ApiError> {
            self.sent.lock().unwrap().push(request.clone());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| ApiError::Validation("reply script exhausted".into()))
        }
    }

    fn ok(body: &str) -> RawReply {
        RawReply {
            status: StatusCode::OK,
            body: body.as_bytes().to_vec(),
        }
    }

    fn unauthorized(body: &str) -> RawReply {
        RawReply {
            status: StatusCode::UNAUTHORIZED,
            body: body.as_bytes().to_vec(),
        }
    }

    /// Provider whose forced refresh hands out queued tokens and fails
    /// once the queue runs dry.
    struct FakeProvider {
        identity: Mutex<Option<Identity>>,
        tokens: Mutex<VecDeque<String>>,
        refresh_calls: Mutex<usize>,
        events: watch::Sender<Option<Identity>>,
    }

    impl FakeProvider {
        fn signed_in(tokens: Vec<&str>) -> Arc<Self> {
            let identity = Identity {
                uid: "uid-1".into(),
                email: Some("ada@snippy.test".into()),
                display_name: None,
                photo_url: None,
                email_verified: true,
                refresh_token: "rt-1".into(),
            };
            let (events, _) = watch::channel(Some(identity.clone()));
            Arc::new(Self {
                identity: Mutex::new(Some(identity)),
                tokens: Mutex::new(tokens.into_iter().map(String::from).collect()),
                refresh_calls: Mutex::new(0),
                events,
            })
        }

        fn signed_out() -> Arc<Self> {
            let (events, _) = watch::channel(None);
            Arc::new(Self {
                identity: Mutex::new(None),
                tokens: Mutex::new(VecDeque::new()),
                refresh_calls: Mutex::new(0),
                events,
            })
        }

        fn refresh_calls(&self) -> usize {
            *self.refresh_calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl IdentityProvider for FakeProvider {
        fn current_identity(&self) -> Option<Identity> {
            self.identity.lock().unwrap().clone()
        }

        async fn force_refresh(&self, _identity: &Identity) -> Result<String> {
            *self.refresh_calls.lock().unwrap() += 1;
            self.tokens
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| anyhow::anyhow!("refresh rejected"))
        }

        async fn sign_in_with_credential(&self, _credential: &str) -> Result<Identity> {
            anyhow::bail!("not exercised here")
        }

        async fn sign_in_federated(
            &self,
            _credential: &FederatedCredential,
        ) -> Result<(Identity, String)> {
            anyhow::bail!("not exercised here")
        }

        async fn send_password_reset(&self, _email: &str) -> Result<()> {
            Ok(())
        }

        fn sign_out(&self) -> Result<()> {
            *self.identity.lock().unwrap() = None;
            self.events.send_replace(None);
            Ok(())
        }

        fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
            let mut rx = self.events.subscribe();
            rx.mark_changed();
            rx
        }
    }

    fn client(
        transport: Arc<FakeTransport>,
        store: Arc<MemoryTokenStore>,
        provider: Arc<FakeProvider>,
    ) -> SnippyClient {
        SnippyClient::with_parts(transport, store, provider, "https://api.test")
    }

    #[tokio::test]
    async fn test_bearer_header_matches_stored_token() {
        let transport = FakeTransport::scripted(vec![ok(r#"{"data":[]}"#)]);
        let store = Arc::new(MemoryTokenStore::with_token("T1"));
        let client = client(transport.clone(), store, FakeProvider::signed_in(vec![]));

        client.execute(&ApiRequest::get("/user/urls")).await.unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].bearer.as_deref(), Some("T1"));
        assert_eq!(sent[0].url, "https://api.test/user/urls");
    }

    #[tokio::test]
    async fn test_no_token_sends_no_bearer() {
        let transport = FakeTransport::scripted(vec![ok("{}")]);
        let store = Arc::new(MemoryTokenStore::new());
        let client = client(transport.clone(), store, FakeProvider::signed_out());

        client.execute(&ApiRequest::get("/auth/me")).await.unwrap();
        assert_eq!(transport.sent()[0].bearer, None);
    }

    #[tokio::test]
    async fn test_401_refreshes_once_and_retries_with_fresh_token() {
        let transport = FakeTransport::scripted(vec![
            unauthorized(r#"{"message":"jwt expired"}"#),
            ok(r#"{"data":[]}"#),
        ]);
        let store = Arc::new(MemoryTokenStore::with_token("T1"));
        let provider = FakeProvider::signed_in(vec!["T2"]);
        let client = client(transport.clone(), store.clone(), provider.clone());

        client.execute(&ApiRequest::get("/user/urls")).await.unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].bearer.as_deref(), Some("T1"));
        assert_eq!(sent[1].bearer.as_deref(), Some("T2"));
        assert_eq!(sent[1].request_id, sent[0].request_id);
        assert_eq!(store.token().as_deref(), Some("T2"));
        assert_eq!(provider.refresh_calls(), 1);
    }

    #[tokio::test]
    async fn test_second_401_is_surfaced_without_another_refresh() {
        let transport = FakeTransport::scripted(vec![
            unauthorized(r#"{"message":"jwt expired"}"#),
            unauthorized(r#"{"message":"account disabled"}"#),
        ]);
        let store = Arc::new(MemoryTokenStore::with_token("T1"));
        let provider = FakeProvider::signed_in(vec!["T2", "T3"]);
        let client = client(transport.clone(), store, provider.clone());

        let err = client
            .execute(&ApiRequest::get("/user/urls"))
            .await
            .unwrap_err();
        assert!(err.is_unauthorized());
        assert!(err.to_string().contains("account disabled"));
        assert_eq!(transport.sent().len(), 2);
        assert_eq!(provider.refresh_calls(), 1);
    }

    #[tokio::test]
    async fn test_401_without_identity_returns_original_failure() {
        let transport =
            FakeTransport::scripted(vec![unauthorized(r#"{"message":"jwt expired"}"#)]);
        let store = Arc::new(MemoryTokenStore::with_token("T1"));
        let client = client(transport.clone(), store, FakeProvider::signed_out());

        let err = client
            .execute(&ApiRequest::get("/user/urls"))
            .await
            .unwrap_err();
        match err {
            ApiError::Unauthorized { body, .. } => {
                assert_eq!(body, r#"{"message":"jwt expired"}"#);
            }
            other => panic!("expected Unauthorized, got {:?}", other),
        }
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_returns_original_failure() {
        let transport =
            FakeTransport::scripted(vec![unauthorized(r#"{"message":"jwt expired"}"#)]);
        let store = Arc::new(MemoryTokenStore::with_token("T1"));
        let provider = FakeProvider::signed_in(vec![]);
        let client = client(transport.clone(), store.clone(), provider.clone());

        let err = client
            .execute(&ApiRequest::get("/user/urls"))
            .await
            .unwrap_err();
        assert!(err.is_unauthorized());
        assert!(err.to_string().contains("jwt expired"));
        assert_eq!(store.token().as_deref(), Some("T1"));
        assert_eq!(transport.sent().len(), 1);
        assert_eq!(provider.refresh_calls(), 1);
    }

    #[tokio::test]
    async fn test_request_id_is_stable_across_the_retry() {
        let transport = FakeTransport::scripted(vec![unauthorized("{}"), ok("{}"), ok("{}")]);
        let store = Arc::new(MemoryTokenStore::with_token("T1"));
        let provider = FakeProvider::signed_in(vec!["T2"]);
        let client = client(transport.clone(), store, provider);

        client.execute(&ApiRequest::get("/a")).await.unwrap();
        client.execute(&ApiRequest::get("/b")).await.unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].request_id, sent[1].request_id);
        assert_ne!(sent[1].request_id, sent[2].request_id);
    }

    #[tokio::test]
    async fn test_overlapping_sessions_keep_the_newest_token() {
        let transport = FakeTransport::scripted(vec![
            unauthorized("{}"),
            ok("{}"),
            unauthorized("{}"),
            ok("{}"),
        ]);
        let store = Arc::new(MemoryTokenStore::with_token("T1"));
        let provider = FakeProvider::signed_in(vec!["T2", "T3"]);
        let client = client(transport.clone(), store.clone(), provider);

        let first = ApiRequest::get("/a");
        let second = ApiRequest::get("/b");
        let (a, b) = tokio::join!(client.execute(&first), client.execute(&second));
        a.unwrap();
        b.unwrap();
        assert_eq!(store.token().as_deref(), Some("T3"));
    }

    #[tokio::test]
    async fn test_malformed_success_body_is_a_decode_error() {
        let transport = FakeTransport::scripted(vec![ok("not json")]);
        let store = Arc::new(MemoryTokenStore::with_token("T1"));
        let client = client(transport, store, FakeProvider::signed_in(vec![]));

        let err = client
            .get_json::<Enveloped<Vec<ShortLink>>>("/user/urls")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[test]
    fn test_check_reply_classifies_statuses() {
        assert!(check_reply(ok("{}")).is_ok());

        let err = check_reply(unauthorized(r#"{"message":"nope"}"#)).unwrap_err();
        assert!(err.is_unauthorized());

        let err = check_reply(RawReply {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: b"boom".to_vec(),
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "HTTP 500 Internal Server Error: boom");
    }

    #[test]
    fn test_http_transport_forms_bearer_and_request_id_headers() {
        let transport = HttpTransport::new();
        let sealed = SealedRequest {
            method: Method::GET,
            url: "https://api.test/user/urls".into(),
            bearer: Some("T2".into()),
            request_id: "rid-1".into(),
            body: None,
        };
        let request = transport.build_request(&sealed).build().unwrap();
        assert_eq!(request.headers()["Authorization"], "Bearer T2");
        assert_eq!(request.headers()["X-Request-Id"], "rid-1");
        assert_eq!(request.url().as_str(), "https://api.test/user/urls");
    }

    #[test]
    fn test_http_transport_omits_bearer_when_absent() {
        let transport = HttpTransport::new();
        let sealed = SealedRequest {
            method: Method::GET,
            url: "https://api.test/auth/me".into(),
            bearer: None,
            request_id: "rid-2".into(),
            body: None,
        };
        let request = transport.build_request(&sealed).build().unwrap();
        assert!(request.headers().get("Authorization").is_none());
    }
}
