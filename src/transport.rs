//! HTTP transport: sends [`TransportRequest`]s and captures the raw outcome.
//!
//! Nothing in here returns an error to the caller. Connection failures,
//! timeouts and undecodable bodies are recorded on the [`TransportOutcome`]
//! and later folded into the normalized response.

use std::io;
use std::sync::OnceLock;
use std::time::Duration;

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

use crate::request::{HttpMethod, TransportRequest};

/// Transport-level failure captured on an outcome.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The server could not be reached.
    #[error("failed to connect to server: {0}")]
    Connect(#[source] reqwest::Error),

    /// The request did not complete within the configured timeout.
    #[error("request timed out: {0}")]
    Timeout(#[source] reqwest::Error),

    /// Any other failure while sending or reading the response.
    #[error("HTTP request failed: {0}")]
    Request(#[source] reqwest::Error),

    /// The body was not valid JSON for the requested type.
    #[error("failed to decode response body: {0}")]
    Decode(#[source] serde_json::Error),

    /// No runtime could be started, or the thread running the exchange died.
    #[error("transport runtime failure: {0}")]
    Runtime(#[source] std::io::Error),
}

impl TransportError {
    fn from_reqwest(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TransportError::Timeout(error)
        } else if error.is_connect() {
            TransportError::Connect(error)
        } else {
            TransportError::Request(error)
        }
    }

    pub fn response_status(&self) -> ResponseStatus {
        match self {
            TransportError::Timeout(_) => ResponseStatus::TimedOut,
            _ => ResponseStatus::Error,
        }
    }
}

/// Whether the exchange itself completed, independent of the HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    Completed,
    Error,
    TimedOut,
}

/// Raw result of sending one request.
#[derive(Debug)]
pub struct TransportOutcome<T> {
    /// `None` when no response was received.
    pub status_code: Option<u16>,
    pub status_description: Option<String>,
    pub raw_content: String,
    pub content: Option<T>,
    pub transport_error: Option<TransportError>,
    pub response_status: ResponseStatus,
}

impl<T: DeserializeOwned> TransportOutcome<T> {
    /// A response was received; decode its body as JSON when non-empty.
    pub fn completed(status_code: u16, status_description: Option<&str>, raw_content: String) -> Self {
        let mut outcome = Self {
            status_code: Some(status_code),
            status_description: status_description.map(str::to_string),
            raw_content: String::new(),
            content: None,
            transport_error: None,
            response_status: ResponseStatus::Completed,
        };

        if !raw_content.trim().is_empty() {
            match serde_json::from_str(&raw_content) {
                Ok(content) => outcome.content = Some(content),
                Err(e) => {
                    outcome.transport_error = Some(TransportError::Decode(e));
                    outcome.response_status = ResponseStatus::Error;
                }
            }
        }
        outcome.raw_content = raw_content;
        outcome
    }
}

impl<T> TransportOutcome<T> {
    /// No usable response; only the failure is known.
    pub fn failed(status_code: Option<u16>, error: TransportError) -> Self {
        Self {
            status_code,
            status_description: None,
            raw_content: String::new(),
            content: None,
            response_status: error.response_status(),
            transport_error: Some(error),
        }
    }
}

/// Sends requests against a data source.
pub trait Transport: Send + Sync {
    /// Blocking send.
    fn send<T>(&self, base_url: &str, request: &TransportRequest) -> TransportOutcome<T>
    where
        T: DeserializeOwned;

    /// Returns immediately; `callback` runs exactly once on a thread owned by
    /// the transport.
    fn send_async<T, F>(&self, base_url: &str, request: TransportRequest, callback: F)
    where
        T: DeserializeOwned + Send + 'static,
        F: FnOnce(TransportOutcome<T>) + Send + 'static;
}

/// [`Transport`] backed by `reqwest`.
///
/// The blocking client is created on first use so that a transport living in
/// an async context never owns one. A blocking send issued from inside a Tokio
/// runtime runs on a scoped thread with a client of its own, since
/// `reqwest::blocking` clients may neither be used nor dropped on a runtime
/// thread.
#[derive(Debug, Default)]
pub struct HttpTransport {
    blocking: OnceLock<reqwest::blocking::Client>,
    client: OnceLock<reqwest::Client>,
    timeout: Option<Duration>,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

/// Status and body text as received, or the failure that stopped the
/// exchange. Decoding happens afterwards on the caller's thread.
type Exchange = Result<(reqwest::StatusCode, String), (Option<u16>, TransportError)>;

/// Applies method, query, headers, credentials, body and timeout. The
/// blocking and async `reqwest` builders share these method names.
macro_rules! prepare_request {
    ($client:expr, $url:expr, $request:expr, $timeout:expr) => {{
        let request: &TransportRequest = $request;
        let mut builder = $client
            .request(to_reqwest_method(request.method), $url)
            .query(&request.query);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(credentials) = &request.credentials {
            builder = builder.basic_auth(&credentials.username, Some(&credentials.password));
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        if let Some(timeout) = $timeout {
            builder = builder.timeout(timeout);
        }
        builder
    }};
}

impl Transport for HttpTransport {
    fn send<T>(&self, base_url: &str, request: &TransportRequest) -> TransportOutcome<T>
    where
        T: DeserializeOwned,
    {
        let url = join_url(base_url, &request.path);

        let exchange = if tokio::runtime::Handle::try_current().is_ok() {
            std::thread::scope(|scope| {
                scope
                    .spawn(|| {
                        let client = reqwest::blocking::Client::new();
                        exchange_blocking(&client, &url, request, self.timeout)
                    })
                    .join()
                    .unwrap_or_else(|_| {
                        Err((
                            None,
                            TransportError::Runtime(io::Error::other("blocking transport thread panicked")),
                        ))
                    })
            })
        } else {
            let client = self.blocking.get_or_init(reqwest::blocking::Client::new);
            exchange_blocking(client, &url, request, self.timeout)
        };

        let outcome = into_outcome(exchange);
        log_outcome(request, &url, &outcome);
        outcome
    }

    fn send_async<T, F>(&self, base_url: &str, request: TransportRequest, callback: F)
    where
        T: DeserializeOwned + Send + 'static,
        F: FnOnce(TransportOutcome<T>) + Send + 'static,
    {
        let url = join_url(base_url, &request.path);
        let timeout = self.timeout;

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let client = self.client.get_or_init(reqwest::Client::new).clone();
                handle.spawn(async move {
                    callback(fetch(client, url, request, timeout).await);
                });
            }
            Err(_) => {
                // Pooled connections are bound to the runtime that opened
                // them, so the per-thread runtime gets its own client.
                std::thread::spawn(move || {
                    let outcome = match tokio::runtime::Builder::new_current_thread()
                        .enable_all()
                        .build()
                    {
                        Ok(runtime) => runtime.block_on(fetch(reqwest::Client::new(), url, request, timeout)),
                        Err(e) => TransportOutcome::failed(None, TransportError::Runtime(e)),
                    };
                    callback(outcome);
                });
            }
        }
    }
}

fn exchange_blocking(
    client: &reqwest::blocking::Client,
    url: &str,
    request: &TransportRequest,
    timeout: Option<Duration>,
) -> Exchange {
    let response = prepare_request!(client, url, request, timeout)
        .send()
        .map_err(|e| (None, TransportError::from_reqwest(e)))?;
    let status = response.status();
    let text = response
        .text()
        .map_err(|e| (Some(status.as_u16()), TransportError::from_reqwest(e)))?;
    Ok((status, text))
}

async fn fetch<T>(
    client: reqwest::Client,
    url: String,
    request: TransportRequest,
    timeout: Option<Duration>,
) -> TransportOutcome<T>
where
    T: DeserializeOwned,
{
    let exchange = exchange_async(&client, &url, &request, timeout).await;

    let outcome = into_outcome(exchange);
    log_outcome(&request, &url, &outcome);
    outcome
}

async fn exchange_async(
    client: &reqwest::Client,
    url: &str,
    request: &TransportRequest,
    timeout: Option<Duration>,
) -> Exchange {
    let response = prepare_request!(client, url, request, timeout)
        .send()
        .await
        .map_err(|e| (None, TransportError::from_reqwest(e)))?;
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| (Some(status.as_u16()), TransportError::from_reqwest(e)))?;
    Ok((status, text))
}

fn into_outcome<T: DeserializeOwned>(exchange: Exchange) -> TransportOutcome<T> {
    match exchange {
        Ok((status, text)) => TransportOutcome::completed(status.as_u16(), status.canonical_reason(), text),
        Err((status_code, error)) => TransportOutcome::failed(status_code, error),
    }
}

fn log_outcome<T>(request: &TransportRequest, url: &str, outcome: &TransportOutcome<T>) {
    match &outcome.transport_error {
        Some(error) => warn!(
            method = %request.method,
            url = %url,
            status = ?outcome.status_code,
            error = %error,
            "request failed"
        ),
        None => debug!(
            method = %request.method,
            url = %url,
            status = ?outcome.status_code,
            "request completed"
        ),
    }
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
    }
}

/// Join the data source and a request path with exactly one slash.
pub fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
