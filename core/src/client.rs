//! Generic typed-request dispatch shared by every resource facade.
//!
//! # Design
//! A facade describes one API operation as an `Endpoint` (method, relative
//! path, query, optional payload) and hands it to `Client::call`, which
//! resolves the URL against the base, attaches the access token, runs the
//! exchange through the configured `Transport` and decodes the JSON body.
//!
//! `Client` holds only immutable configuration and an `Arc<dyn Transport>`,
//! so it is cheap to clone and safe to share across threads. No call writes
//! shared state.

use std::io::{self, Read};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::bots::Bots;
use crate::chats::Chats;
use crate::config::{AuthPlacement, Config};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::http::{HttpMethod, HttpRequest, ResponseBody, Transport};
use crate::messages::Messages;
use crate::multipart::Form;
use crate::subscriptions::Subscriptions;
use crate::transport::UreqTransport;
use crate::uploads::Uploads;

/// Error bodies larger than this are truncated before parsing.
const ERROR_BODY_LIMIT: u64 = 64 * 1024;

/// Ordered query parameters with unique keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pairs: Vec<(String, String)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key`, replacing an existing value in place.
    pub fn set(&mut self, key: &str, value: impl ToString) -> &mut Self {
        let value = value.to_string();
        match self.pairs.iter_mut().find(|(k, _)| k == key) {
            Some(pair) => pair.1 = value,
            None => self.pairs.push((key.to_string(), value)),
        }
        self
    }

    /// Sets `key` only when `value` is positive; zero and negative values
    /// leave the server default in effect.
    pub fn set_positive(&mut self, key: &str, value: i64) -> &mut Self {
        if value > 0 {
            self.set(key, value);
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Request body attached to an endpoint.
#[derive(Debug, Clone)]
pub enum Payload {
    Json(Vec<u8>),
    Multipart(Form),
}

/// Description of a single API call, built fresh by a facade per request.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub method: HttpMethod,
    pub path: String,
    /// Raw path segments appended after `path`, each percent-encoded as one
    /// segment.
    pub segments: Vec<String>,
    pub query: Query,
    pub payload: Option<Payload>,
    /// Whether the access token is attached. Upload URLs issued by the
    /// server are pre-signed and are sent without it.
    pub authenticated: bool,
}

impl Endpoint {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            segments: Vec::new(),
            query: Query::new(),
            payload: None,
            authenticated: true,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Patch, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    /// Appends a caller-supplied identifier as a single path segment.
    pub fn segment(mut self, segment: impl Into<String>) -> Self {
        self.segments.push(segment.into());
        self
    }

    pub fn query(mut self, query: Query) -> Self {
        self.query = query;
        self
    }

    /// Serializes `body` as the JSON payload.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        let bytes = serde_json::to_vec(body).map_err(Error::Serialization)?;
        self.payload = Some(Payload::Json(bytes));
        Ok(self)
    }

    pub fn multipart(mut self, form: Form) -> Self {
        self.payload = Some(Payload::Multipart(form));
        self
    }

    pub fn unauthenticated(mut self) -> Self {
        self.authenticated = false;
        self
    }
}

/// Error payload carried by non-2xx responses.
#[derive(Debug, Default, Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    code: String,
    #[serde(default, alias = "error")]
    message: String,
}

/// Authenticated dispatcher for the bot API.
#[derive(Clone)]
pub struct Client {
    base_url: Url,
    token: String,
    auth: AuthPlacement,
    api_version: Option<String>,
    transport: Arc<dyn Transport>,
}

impl Client {
    /// Builds a client that talks HTTP through `ureq`.
    pub fn new(config: Config) -> Result<Self> {
        let transport = UreqTransport::new(config.timeout);
        Self::with_transport(config, Arc::new(transport))
    }

    /// Builds a client over an arbitrary transport.
    pub fn with_transport(config: Config, transport: Arc<dyn Transport>) -> Result<Self> {
        let base_url = parse_base_url(&config.base_url)?;
        Ok(Self {
            base_url,
            token: config.token,
            auth: config.auth,
            api_version: config.api_version,
            transport,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn bots(&self) -> Bots<'_> {
        Bots::new(self)
    }

    pub fn chats(&self) -> Chats<'_> {
        Chats::new(self)
    }

    pub fn messages(&self) -> Messages<'_> {
        Messages::new(self)
    }

    pub fn subscriptions(&self) -> Subscriptions<'_> {
        Subscriptions::new(self)
    }

    pub fn uploads(&self) -> Uploads<'_> {
        Uploads::new(self)
    }

    /// Performs `endpoint` and returns the open body of a 2xx response.
    ///
    /// Non-2xx responses are turned into `Error::Api`; their body is read
    /// and released here, so the caller only ever owns a successful body.
    pub fn execute(&self, ctx: &Context, endpoint: Endpoint) -> Result<ResponseBody> {
        ctx.check()?;
        let request = self.build_request(endpoint)?;
        let method = request.method;
        let path = request_path(&request.url).to_string();
        debug!(%method, %path, "dispatching request");

        let response = self.transport.execute(ctx, request)?;
        if ctx.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if response.is_success() {
            debug!(%method, %path, status = response.status, "request succeeded");
            return Ok(response.body);
        }

        let status = response.status;
        let bytes = response
            .body
            .read_limited(ERROR_BODY_LIMIT)
            .unwrap_or_default();
        let text = String::from_utf8_lossy(&bytes);
        let payload: ErrorPayload = serde_json::from_str(&text).unwrap_or_else(|_| ErrorPayload {
            code: String::new(),
            message: text.trim().to_string(),
        });
        warn!(%method, %path, status, code = %payload.code, message = %payload.message, "request failed");
        Err(Error::Api {
            status,
            code: payload.code,
            message: payload.message,
        })
    }

    /// Performs `endpoint` and decodes the JSON body into `T`.
    pub fn call<T: DeserializeOwned>(&self, ctx: &Context, endpoint: Endpoint) -> Result<T> {
        let body = self.execute(ctx, endpoint)?;
        let reader = WatchedBody {
            body,
            ctx: ctx.clone(),
        };
        serde_json::from_reader(reader).map_err(|err| {
            if ctx.is_cancelled() {
                Error::Cancelled
            } else {
                Error::Decode(err)
            }
        })
    }

    /// Turns an endpoint into a transport-level request.
    pub fn build_request(&self, endpoint: Endpoint) -> Result<HttpRequest> {
        let Endpoint {
            method,
            path,
            segments,
            query,
            payload,
            authenticated,
        } = endpoint;

        let mut url = self.base_url.join(path.trim_start_matches('/'))?;
        if !segments.is_empty() {
            push_segments(&mut url, &segments)?;
        }
        {
            let mut pairs = url.query_pairs_mut();
            if authenticated {
                if let Some(version) = &self.api_version {
                    pairs.append_pair("v", version);
                }
                if self.auth == AuthPlacement::Query {
                    pairs.append_pair("access_token", &self.token);
                }
            }
            for (key, value) in query.iter() {
                pairs.append_pair(key, value);
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }

        let mut headers = Vec::new();
        if authenticated && self.auth == AuthPlacement::Header {
            headers.push(("Authorization".to_string(), self.token.clone()));
        }
        let body = match payload {
            Some(Payload::Json(bytes)) => {
                headers.push(("Content-Type".to_string(), "application/json".to_string()));
                Some(bytes)
            }
            Some(Payload::Multipart(form)) => {
                headers.push(("Content-Type".to_string(), form.content_type()));
                Some(form.into_bytes())
            }
            None => None,
        };

        Ok(HttpRequest {
            method,
            url: url.into(),
            headers,
            body,
        })
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url.as_str())
            .field("auth", &self.auth)
            .field("api_version", &self.api_version)
            .finish_non_exhaustive()
    }
}

/// Parses the base URL, making sure relative paths join beneath it.
fn parse_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw)?;
    if url.cannot_be_a_base() {
        return Err(Error::Config(format!("base URL {raw:?} cannot be a base")));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Appends `segments` to the path of `url`. `/`, `?`, `#` and `%` are
/// percent-encoded; dot segments would be dropped by the URL parser and are
/// rejected instead.
fn push_segments(url: &mut Url, segments: &[String]) -> Result<()> {
    if let Some(bad) = segments
        .iter()
        .find(|s| s.is_empty() || s.as_str() == "." || s.as_str() == "..")
    {
        return Err(Error::InvalidInput(format!("invalid path segment {bad:?}")));
    }
    let mut path = url
        .path_segments_mut()
        .map_err(|_| Error::Config("base URL cannot take path segments".to_string()))?;
    path.pop_if_empty().extend(segments);
    Ok(())
}

/// URL without its query, so tokens never reach the logs.
fn request_path(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

/// Body reader that stops as soon as the call's context is cancelled.
struct WatchedBody {
    body: ResponseBody,
    ctx: Context,
}

impl Read for WatchedBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.ctx.is_cancelled() {
            // Not `Interrupted`: std readers retry that kind forever.
            return Err(io::Error::other("request cancelled"));
        }
        self.body.read(buf)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::context::CancelToken;
    use crate::http::HttpResponse;

    #[derive(Default)]
    struct Recorder {
        status: u16,
        body: Vec<u8>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl Recorder {
        fn responding(status: u16, body: impl AsRef<[u8]>) -> Arc<Self> {
            Arc::new(Self {
                status,
                body: body.as_ref().to_vec(),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn last(&self) -> HttpRequest {
            self.requests.lock().unwrap().last().cloned().unwrap()
        }
    }

    impl Transport for Recorder {
        fn execute(&self, _ctx: &Context, request: HttpRequest) -> Result<HttpResponse> {
            self.requests.lock().unwrap().push(request);
            Ok(HttpResponse {
                status: self.status,
                headers: Vec::new(),
                body: ResponseBody::from_bytes(self.body.clone()),
            })
        }
    }

    fn client(config: Config, transport: Arc<Recorder>) -> Client {
        Client::with_transport(config, transport).unwrap()
    }

    fn config() -> Config {
        Config::new("tok").with_base_url("http://localhost:3000")
    }

    #[test]
    fn query_set_replaces_in_place() {
        let mut query = Query::new();
        query.set("a", 1).set("b", 2).set("a", 3);
        let pairs: Vec<_> = query.iter().collect();
        assert_eq!(pairs, vec![("a", "3"), ("b", "2")]);
    }

    #[test]
    fn set_positive_omits_unset_values() {
        let mut query = Query::new();
        query
            .set_positive("count", 0)
            .set_positive("marker", -7)
            .set_positive("from", 42);
        assert!(!query.contains("count"));
        assert!(!query.contains("marker"));
        assert_eq!(query.get("from"), Some("42"));
    }

    #[test]
    fn token_goes_in_query_by_default() {
        let c = client(config(), Recorder::responding(200, "{}"));
        let mut query = Query::new();
        query.set("count", 2);
        let req = c.build_request(Endpoint::get("chats").query(query)).unwrap();
        assert_eq!(req.url, "http://localhost:3000/chats?access_token=tok&count=2");
        assert!(req.header("authorization").is_none());
        assert!(req.body.is_none());
    }

    #[test]
    fn token_goes_in_header_when_configured() {
        let c = client(
            config().with_auth(AuthPlacement::Header),
            Recorder::responding(200, "{}"),
        );
        let req = c.build_request(Endpoint::get("me")).unwrap();
        assert_eq!(req.url, "http://localhost:3000/me");
        assert_eq!(req.header("Authorization"), Some("tok"));
    }

    #[test]
    fn api_version_precedes_token() {
        let c = client(
            config().with_api_version("1.2.5"),
            Recorder::responding(200, "{}"),
        );
        let req = c.build_request(Endpoint::get("me")).unwrap();
        assert_eq!(req.url, "http://localhost:3000/me?v=1.2.5&access_token=tok");
    }

    #[test]
    fn base_url_path_is_preserved() {
        let c = client(
            config().with_base_url("http://localhost:3000/api"),
            Recorder::responding(200, "{}"),
        );
        let req = c.build_request(Endpoint::get("/chats/10")).unwrap();
        assert!(req.url.starts_with("http://localhost:3000/api/chats/10?"));
    }

    #[test]
    fn absolute_upload_urls_are_sent_without_token() {
        let c = client(config(), Recorder::responding(200, "{}"));
        let req = c
            .build_request(Endpoint::post("https://upload.example/file?sig=abc").unauthenticated())
            .unwrap();
        assert_eq!(req.url, "https://upload.example/file?sig=abc");
    }

    #[test]
    fn json_payload_sets_content_type() {
        let c = client(config(), Recorder::responding(200, "{}"));
        let endpoint = Endpoint::patch("me")
            .json(&serde_json::json!({"first_name": "Bot"}))
            .unwrap();
        let req = c.build_request(endpoint).unwrap();
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.body.as_deref(), Some(br#"{"first_name":"Bot"}"#.as_slice()));
    }

    #[test]
    fn multipart_payload_sets_boundary() {
        let c = client(config(), Recorder::responding(200, "{}"));
        let form = Form::new().file("data", "a.txt", b"hi".to_vec());
        let boundary = form.boundary().to_string();
        let req = c.build_request(Endpoint::post("upload").multipart(form)).unwrap();
        assert_eq!(
            req.header("content-type").unwrap(),
            format!("multipart/form-data; boundary={boundary}")
        );
        assert!(req.body.is_some());
    }

    #[test]
    fn malformed_base_url_fails_at_construction() {
        let err = Client::with_transport(
            Config::new("tok").with_base_url("not a url"),
            Recorder::responding(200, "{}"),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidUrl(_)));

        let err = Client::with_transport(
            Config::new("tok").with_base_url("mailto:bot@example.com"),
            Recorder::responding(200, "{}"),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn non_2xx_becomes_api_error() {
        let c = client(
            config(),
            Recorder::responding(403, r#"{"code":"FORBIDDEN","message":"no access"}"#),
        );
        let err = c
            .call::<serde_json::Value>(&Context::background(), Endpoint::get("chats/1"))
            .unwrap_err();
        match err {
            Error::Api {
                status,
                code,
                message,
            } => {
                assert_eq!(status, 403);
                assert_eq!(code, "FORBIDDEN");
                assert_eq!(message, "no access");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn non_json_error_body_becomes_message() {
        let c = client(config(), Recorder::responding(502, "Bad Gateway\n"));
        let err = c
            .call::<serde_json::Value>(&Context::background(), Endpoint::get("me"))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Api { status: 502, ref message, .. } if message == "Bad Gateway"
        ));
    }

    #[test]
    fn malformed_success_body_is_decode_error() {
        let c = client(config(), Recorder::responding(200, "not json"));
        let err = c
            .call::<serde_json::Value>(&Context::background(), Endpoint::get("me"))
            .unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn cancelled_context_never_reaches_transport() {
        let recorder = Recorder::responding(200, "{}");
        let c = client(config(), recorder.clone());
        let token = CancelToken::new();
        token.cancel();
        let ctx = Context::background().with_cancel(token);
        let err = c.call::<serde_json::Value>(&ctx, Endpoint::get("me")).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert!(recorder.requests.lock().unwrap().is_empty());
    }

    #[test]
    fn recorded_request_matches_endpoint() {
        let recorder = Recorder::responding(200, "{}");
        let c = client(config(), recorder.clone());
        let mut query = Query::new();
        query.set("user_id", 5);
        let _: serde_json::Value = c
            .call(&Context::background(), Endpoint::delete("chats/10/members").query(query))
            .unwrap();
        let req = recorder.last();
        assert_eq!(req.method, HttpMethod::Delete);
        assert_eq!(
            req.url,
            "http://localhost:3000/chats/10/members?access_token=tok&user_id=5"
        );
    }

    /// Body that hands out one byte per read and cancels `token` after the
    /// first one.
    struct CancelAfterFirstRead {
        inner: Cursor<Vec<u8>>,
        token: CancelToken,
        released: Arc<AtomicUsize>,
    }

    impl Read for CancelAfterFirstRead {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let len = buf.len().min(1);
            let n = self.inner.read(&mut buf[..len])?;
            self.token.cancel();
            Ok(n)
        }
    }

    impl Drop for CancelAfterFirstRead {
        fn drop(&mut self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct CancellingTransport {
        token: CancelToken,
        released: Arc<AtomicUsize>,
    }

    impl Transport for CancellingTransport {
        fn execute(&self, _ctx: &Context, _request: HttpRequest) -> Result<HttpResponse> {
            Ok(HttpResponse {
                status: 200,
                headers: Vec::new(),
                body: ResponseBody::new(CancelAfterFirstRead {
                    inner: Cursor::new(br#"{"user_id":1,"first_name":"Bot"}"#.to_vec()),
                    token: self.token.clone(),
                    released: self.released.clone(),
                }),
            })
        }
    }

    #[test]
    fn cancel_during_body_read_is_cancelled() {
        let token = CancelToken::new();
        let released = Arc::new(AtomicUsize::new(0));
        let transport = Arc::new(CancellingTransport {
            token: token.clone(),
            released: released.clone(),
        });
        let c = Client::with_transport(config(), transport).unwrap();
        let ctx = Context::background().with_cancel(token);

        let err = c
            .call::<serde_json::Value>(&ctx, Endpoint::get("me"))
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled), "got {err:?}");
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn non_utf8_error_body_keeps_message() {
        let c = client(config(), Recorder::responding(502, b"\xffgateway down\xfe"));
        let err = c
            .call::<serde_json::Value>(&Context::background(), Endpoint::get("me"))
            .unwrap_err();
        match err {
            Error::Api {
                status, message, ..
            } => {
                assert_eq!(status, 502);
                assert!(message.contains("gateway down"), "message: {message:?}");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn segments_are_percent_encoded() {
        let c = client(config(), Recorder::responding(200, "{}"));

        let req = c
            .build_request(Endpoint::get("messages").segment("mid.1?chat_id=7"))
            .unwrap();
        assert_eq!(
            req.url,
            "http://localhost:3000/messages/mid.1%3Fchat_id=7?access_token=tok"
        );

        let req = c
            .build_request(Endpoint::get("messages").segment("a/../me#x"))
            .unwrap();
        assert_eq!(
            req.url,
            "http://localhost:3000/messages/a%2F..%2Fme%23x?access_token=tok"
        );

        let req = c
            .build_request(Endpoint::get("messages").segment("%2e%2e"))
            .unwrap();
        assert_eq!(req.url, "http://localhost:3000/messages/%252e%252e?access_token=tok");
    }

    #[test]
    fn dot_segments_are_rejected_before_sending() {
        let recorder = Recorder::responding(200, "{}");
        let c = client(config(), recorder.clone());
        for bad in ["..", ".", ""] {
            let err = c
                .call::<serde_json::Value>(
                    &Context::background(),
                    Endpoint::get("messages").segment(bad),
                )
                .unwrap_err();
            assert!(matches!(err, Error::InvalidInput(_)), "{bad:?}: {err:?}");
        }
        assert!(recorder.requests.lock().unwrap().is_empty());
    }

    #[test]
    fn logged_path_drops_query() {
        assert_eq!(
            request_path("http://h/chats?access_token=secret"),
            "http://h/chats"
        );
    }
}
