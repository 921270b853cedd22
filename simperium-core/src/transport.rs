//! Transport layer abstraction.
//!
//! The client speaks to the service through the [`Transport`] trait so the
//! protocol logic can run against the real HTTP stack or an in-memory double.
//! A transport only fails when no response was obtained; every HTTP status,
//! including 4xx/5xx, comes back as a [`Response`] for the caller to classify.

use crate::config::TransportConfig;
use crate::error::TransportError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::error::Error as StdError;
use std::io;
use std::time::Duration;
use tracing::debug;

/// Body of an outgoing request.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    Form(Vec<(String, String)>),
}

/// An outgoing request.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
    /// Whole-request deadline. `None` waits as long as the server holds the
    /// connection open.
    pub timeout: Option<Duration>,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            query: Vec::new(),
            body: RequestBody::Empty,
            timeout: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn form(mut self, fields: Vec<(String, String)>) -> Self {
        self.body = RequestBody::Form(fields);
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// First value of a query parameter.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every value of a repeated query parameter, in order.
    pub fn query_values(&self, key: &str) -> Vec<&str> {
        self.query
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Header value, matched case-insensitively.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A response as seen by the protocol layer.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl Response {
    /// Builds a response from parts; mostly useful for test doubles.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Builds a 200 response carrying `value` as JSON.
    pub fn json_ok(value: &Value) -> Self {
        Self::new(200, value.to_string())
    }

    /// Adds a header; invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Decodes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// Issues requests to the service.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request) -> Result<Response, TransportError>;
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Creates a transport with default settings.
    pub fn new() -> Result<Self, TransportError> {
        Self::with_config(&TransportConfig::default())
    }

    pub fn with_config(config: &TransportConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| TransportError::Other(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        debug!("{} {}", request.method, request.url);

        let mut builder = self.client.request(request.method, &request.url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Form(fields) => builder.form(&fields),
        };
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(classify)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(classify)?;

        Ok(Response {
            status,
            headers,
            body,
        })
    }
}

/// Maps a `reqwest` failure onto the transport taxonomy.
fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        return TransportError::Timeout;
    }
    if err.is_builder() {
        return TransportError::InvalidRequest(err.to_string());
    }

    let kind = io_kind(&err);

    // Only an explicit refusal counts as refused; DNS and TLS failures do not.
    if err.is_connect() {
        return match kind {
            Some(io::ErrorKind::ConnectionRefused) => {
                TransportError::ConnectionRefused(err.to_string())
            }
            Some(io::ErrorKind::TimedOut) => TransportError::Timeout,
            _ => TransportError::Connect(describe(&err)),
        };
    }

    match kind {
        Some(io::ErrorKind::TimedOut) => TransportError::Timeout,
        Some(io::ErrorKind::ConnectionRefused) => {
            TransportError::ConnectionRefused(err.to_string())
        }
        Some(
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof,
        ) => TransportError::ConnectionReset(err.to_string()),
        _ if closed_early(&err) => TransportError::ConnectionReset(err.to_string()),
        _ => TransportError::Other(describe(&err)),
    }
}

fn causes<'a>(err: &'a reqwest::Error) -> impl Iterator<Item = &'a (dyn StdError + 'static)> {
    std::iter::successors(err.source(), |&cause| cause.source())
}

/// Kind of the first `io::Error` in the source chain.
fn io_kind(err: &reqwest::Error) -> Option<io::ErrorKind> {
    causes(err).find_map(|cause| cause.downcast_ref::<io::Error>().map(io::Error::kind))
}

/// hyper reports a peer hanging up mid-response without an `io::Error`.
fn closed_early(err: &reqwest::Error) -> bool {
    causes(err).any(|cause| {
        cause
            .to_string()
            .contains("connection closed before message completed")
    })
}

/// The error with its innermost cause, which names what actually went wrong.
fn describe(err: &reqwest::Error) -> String {
    match causes(err).last() {
        Some(root) => format!("{err}: {root}"),
        None => err.to_string(),
    }
}

/// A scripted transport for testing.
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Replays queued outcomes in order and records every request it sees.
    #[derive(Debug, Clone, Default)]
    pub struct MockTransport {
        replies: Arc<Mutex<VecDeque<Result<Response, TransportError>>>>,
        requests: Arc<Mutex<Vec<Request>>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queues a response.
        pub fn respond(&self, response: Response) -> &Self {
            self.replies.lock().unwrap().push_back(Ok(response));
            self
        }

        /// Queues a transport failure.
        pub fn fail(&self, error: TransportError) -> &Self {
            self.replies.lock().unwrap().push_back(Err(error));
            self
        }

        /// Requests received so far.
        pub fn requests(&self) -> Vec<Request> {
            self.requests.lock().unwrap().clone()
        }

        /// The most recent request.
        pub fn last_request(&self) -> Option<Request> {
            self.requests.lock().unwrap().last().cloned()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&self, request: Request) -> Result<Response, TransportError> {
            self.requests.lock().unwrap().push(request);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Other("no scripted reply".into())))
        }
    }
}
