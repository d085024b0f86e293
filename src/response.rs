//! Normalized responses.

use crate::transport::{ResponseStatus, TransportError, TransportOutcome};

/// Coarse classification of a call's outcome.
///
/// Failure causes are not distinguished here; see
/// [`Response::error_message`] and [`Response::transport_error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 200
    Accepted,
    /// 304
    NotModified,
    /// 300
    Ambiguous,
    /// Everything else, including transport failures.
    NotAvailable,
}

impl StatusCode {
    pub fn from_http(status: u16) -> Self {
        match status {
            200 => StatusCode::Accepted,
            304 => StatusCode::NotModified,
            300 => StatusCode::Ambiguous,
            _ => StatusCode::NotAvailable,
        }
    }
}

/// The uniform result handed back for every call.
#[derive(Debug)]
pub struct Response<T> {
    pub content: Option<T>,
    pub status: StatusCode,
    pub error_message: Option<String>,
    pub transport_error: Option<TransportError>,
    /// HTTP reason phrase, when a response was received.
    pub status_description: Option<String>,
    pub http_status: Option<u16>,
    pub response_status: ResponseStatus,
}

impl<T> Response<T> {
    pub fn is_accepted(&self) -> bool {
        self.status == StatusCode::Accepted
    }
}

impl<T> From<TransportOutcome<T>> for Response<T> {
    fn from(outcome: TransportOutcome<T>) -> Self {
        normalize(outcome)
    }
}

/// Map a raw transport outcome onto a [`Response`]. Never fails.
pub fn normalize<T>(outcome: TransportOutcome<T>) -> Response<T> {
    let status = match (&outcome.transport_error, outcome.status_code) {
        (Some(_), _) | (None, None) => StatusCode::NotAvailable,
        (None, Some(code)) => StatusCode::from_http(code),
    };

    let error_message = match &outcome.transport_error {
        Some(error) => Some(error.to_string()),
        None if status == StatusCode::NotAvailable => Some(match (outcome.status_code, &outcome.status_description) {
            (Some(code), Some(reason)) => format!("HTTP {} {}", code, reason),
            (Some(code), None) => format!("HTTP {}", code),
            (None, _) => "no response received".to_string(),
        }),
        None => None,
    };

    Response {
        content: outcome.content,
        status,
        error_message,
        transport_error: outcome.transport_error,
        status_description: outcome.status_description,
        http_status: outcome.status_code,
        response_status: outcome.response_status,
    }
}
