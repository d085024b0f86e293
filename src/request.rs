//! Request descriptors and the builder that turns them into transport requests.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::ast::{FilterNode, FilterTree, SortEntry, SortList};
use crate::config::FieldMappings;
use crate::error::{Error, Result};
use crate::query_compiler::{format_http_date, QueryCompiler};

pub const HEADER_ACCEPT_CHARSET: &str = "Accept-Charset";
pub const HEADER_USER_AGENT: &str = "User-Agent";
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";
pub const HEADER_IF_MODIFIED_SINCE: &str = "If-Modified-Since";
pub const HEADER_IF_NONE_MATCH: &str = "If-None-Match";

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Returns the client identification string, `eve-rs/{version}`.
pub fn user_agent() -> String {
    format!("eve-rs/{}", env!("CARGO_PKG_VERSION"))
}

/// HTTP basic-auth credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Whether a call reads documents or creates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Read,
    Create,
}

/// Abstract description of one call against the API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestDescriptor {
    pub resource: String,
    /// Selects single-item fetch when present.
    #[serde(default)]
    pub document_id: Option<String>,
    #[serde(default)]
    pub filters: FilterTree,
    #[serde(default)]
    pub sort: SortList,
    #[serde(default)]
    pub if_modified_since: Option<DateTime<Utc>>,
    /// ETag of the cached representation.
    #[serde(default)]
    pub if_none_match: Option<String>,
    /// Items to create; must be a JSON array.
    #[serde(default)]
    pub payload: Option<Value>,
    /// Overrides the client's default credentials for this call.
    #[serde(default)]
    pub credentials: Option<Credentials>,
}

impl RequestDescriptor {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            ..Default::default()
        }
    }

    pub fn with_document_id(mut self, id: impl Into<String>) -> Self {
        self.document_id = Some(id.into());
        self
    }

    pub fn with_filters(mut self, filters: FilterTree) -> Self {
        self.filters = filters;
        self
    }

    /// Append a filter or group to the top-level tree.
    pub fn filter(mut self, node: impl Into<FilterNode>) -> Self {
        self.filters.push(node.into());
        self
    }

    pub fn with_sort(mut self, sort: SortList) -> Self {
        self.sort = sort;
        self
    }

    /// Append a sort key.
    pub fn sort_by(mut self, entry: SortEntry) -> Self {
        self.sort.push(entry);
        self
    }

    pub fn with_if_modified_since(mut self, since: DateTime<Utc>) -> Self {
        self.if_modified_since = Some(since);
        self
    }

    pub fn with_if_none_match(mut self, etag: impl Into<String>) -> Self {
        self.if_none_match = Some(etag.into());
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Serialize `items` as the create payload.
    pub fn with_payload<T: Serialize>(mut self, items: &[T]) -> Result<Self> {
        let value = serde_json::to_value(items).map_err(|e| Error::InvalidPayload(e.to_string()))?;
        self.payload = Some(value);
        Ok(self)
    }

    pub fn with_raw_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully-formed HTTP request, ready for a [`Transport`](crate::transport::Transport).
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub method: HttpMethod,
    /// Path relative to the data source, always starting with `/`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub credentials: Option<Credentials>,
}

impl TransportRequest {
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Header lookup, case-insensitive on the name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Builds [`TransportRequest`]s from descriptors. Performs no I/O.
pub struct RequestBuilder<'a> {
    default_credentials: Option<&'a Credentials>,
    mappings: &'a FieldMappings,
}

impl<'a> RequestBuilder<'a> {
    pub fn new(mappings: &'a FieldMappings) -> Self {
        Self {
            default_credentials: None,
            mappings,
        }
    }

    pub fn with_default_credentials(mut self, credentials: Option<&'a Credentials>) -> Self {
        self.default_credentials = credentials;
        self
    }

    pub fn build(&self, descriptor: &RequestDescriptor, mode: Mode) -> Result<TransportRequest> {
        let resource = descriptor.resource.trim_matches('/');
        if resource.is_empty() {
            return Err(Error::MissingResource);
        }

        let mut headers = vec![
            (HEADER_ACCEPT_CHARSET.to_string(), "utf-8".to_string()),
            (HEADER_USER_AGENT.to_string(), user_agent()),
        ];
        let mut query = Vec::new();
        let mut body = None;

        let (method, path) = match (mode, &descriptor.document_id) {
            (Mode::Read, Some(id)) => {
                if id.is_empty() {
                    return Err(Error::EmptyDocumentId);
                }
                if let Some(etag) = &descriptor.if_none_match {
                    headers.push((HEADER_IF_NONE_MATCH.to_string(), etag.clone()));
                }
                // the id is one path segment, whatever it contains
                (HttpMethod::Get, format!("/{}/{}/", resource, urlencoding::encode(id)))
            }
            (Mode::Read, None) => {
                let mapper = self.mappings.for_resource(resource);
                let compiler = QueryCompiler::new(&mapper);
                if let Some(filter) = compiler.compile_where(&descriptor.filters) {
                    query.push(("where".to_string(), filter));
                }
                if let Some(sort) = compiler.compile_sort(&descriptor.sort) {
                    query.push(("sort".to_string(), sort));
                }
                if let Some(since) = &descriptor.if_modified_since {
                    headers.push((HEADER_IF_MODIFIED_SINCE.to_string(), format_http_date(since)));
                }
                (HttpMethod::Get, format!("/{}", resource))
            }
            (Mode::Create, _) => {
                body = Some(payload_body(descriptor.payload.as_ref())?);
                headers.push((HEADER_CONTENT_TYPE.to_string(), JSON_CONTENT_TYPE.to_string()));
                (HttpMethod::Post, format!("/{}", resource))
            }
        };

        let credentials = descriptor
            .credentials
            .as_ref()
            .or(self.default_credentials)
            .cloned();

        debug!(
            method = %method,
            path = %path,
            query = ?query,
            authenticated = credentials.is_some(),
            "built request"
        );

        Ok(TransportRequest {
            method,
            path,
            query,
            headers,
            body,
            credentials,
        })
    }
}

/// `{"item1": …, "item2": …}` in payload order.
fn payload_body(payload: Option<&Value>) -> Result<String> {
    let items = match payload {
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(Error::InvalidPayload(
                "payload must be an ordered sequence".to_string(),
            ))
        }
        None => return Err(Error::InvalidPayload("payload is missing".to_string())),
    };

    let mut object = serde_json::Map::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        object.insert(format!("item{}", index + 1), item.clone());
    }

    serde_json::to_string(&Value::Object(object)).map_err(|e| Error::InvalidPayload(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Filter, FilterGroup};
    use chrono::TimeZone;
    use serde_json::json;

    fn build(descriptor: &RequestDescriptor, mode: Mode) -> Result<TransportRequest> {
        let mappings = FieldMappings::new();
        RequestBuilder::new(&mappings).build(descriptor, mode)
    }

    #[test]
    fn test_missing_resource() {
        assert_eq!(build(&RequestDescriptor::new(""), Mode::Read), Err(Error::MissingResource));
        assert_eq!(build(&RequestDescriptor::new("/"), Mode::Create), Err(Error::MissingResource));
    }

    #[test]
    fn test_list_request() {
        let since = Utc.with_ymd_and_hms(2013, 1, 1, 10, 0, 0).unwrap();
        let descriptor = RequestDescriptor::new("people")
            .filter(Filter::gt("age", 18).unwrap().and())
            .filter(Filter::eq("status", "active").unwrap())
            .sort_by(SortEntry::asc("name"))
            .with_if_modified_since(since)
            .with_if_none_match("ignored-in-list-mode");

        let request = build(&descriptor, Mode::Read).unwrap();
        assert_eq!(request.method, HttpMethod::Get);
        assert_eq!(request.path, "/people");
        assert_eq!(
            request.query_param("where"),
            Some(r#"{ "age": { "$gt": 18 }, "status": "active" }"#)
        );
        assert_eq!(request.query_param("sort"), Some(r#"[("name", 1)]"#));
        assert_eq!(request.header("if-modified-since"), Some("Tue, 01 Jan 2013 10:00:00 GMT"));
        assert_eq!(request.header(HEADER_IF_NONE_MATCH), None);
        assert!(request.body.is_none());
        assert!(!request.path.ends_with('/'));
    }

    #[test]
    fn test_list_request_without_filters_or_sort() {
        let request = build(&RequestDescriptor::new("people"), Mode::Read).unwrap();
        assert!(request.query.is_empty());
        assert_eq!(request.header(HEADER_IF_MODIFIED_SINCE), None);
    }

    #[test]
    fn test_sort_without_filters_is_attached() {
        let descriptor = RequestDescriptor::new("people").sort_by(SortEntry::desc("age"));
        let request = build(&descriptor, Mode::Read).unwrap();
        assert_eq!(request.query_param("where"), None);
        assert_eq!(request.query_param("sort"), Some(r#"[("age", -1)]"#));
    }

    #[test]
    fn test_empty_group_does_not_attach_where() {
        let descriptor = RequestDescriptor::new("people").filter(FilterGroup::default());
        let request = build(&descriptor, Mode::Read).unwrap();
        assert_eq!(request.query_param("where"), None);
    }

    #[test]
    fn test_single_item_request() {
        let since = Utc.with_ymd_and_hms(2013, 1, 1, 10, 0, 0).unwrap();
        let descriptor = RequestDescriptor::new("people")
            .with_document_id("51f63e0838345b6dcd7eabff")
            .filter(Filter::eq("ignored", 1).unwrap())
            .sort_by(SortEntry::asc("ignored"))
            .with_if_none_match("\"abc123\"")
            .with_if_modified_since(since);

        let request = build(&descriptor, Mode::Read).unwrap();
        assert_eq!(request.method, HttpMethod::Get);
        assert_eq!(request.path, "/people/51f63e0838345b6dcd7eabff/");
        assert!(request.query.is_empty());
        assert_eq!(request.header(HEADER_IF_NONE_MATCH), Some("\"abc123\""));
        assert_eq!(request.header(HEADER_IF_MODIFIED_SINCE), None);
    }

    #[test]
    fn test_document_id_is_one_path_segment() {
        let descriptor = RequestDescriptor::new("people").with_document_id("a?b#c/d");
        let request = build(&descriptor, Mode::Read).unwrap();
        assert_eq!(request.path, "/people/a%3Fb%23c%2Fd/");
        assert!(request.query.is_empty());
    }

    #[test]
    fn test_empty_document_id() {
        let descriptor = RequestDescriptor::new("people").with_document_id("");
        assert_eq!(build(&descriptor, Mode::Read), Err(Error::EmptyDocumentId));
    }

    #[test]
    fn test_always_sends_charset_and_user_agent() {
        for (descriptor, mode) in [
            (RequestDescriptor::new("people"), Mode::Read),
            (RequestDescriptor::new("people").with_document_id("1"), Mode::Read),
            (RequestDescriptor::new("people").with_raw_payload(json!([])), Mode::Create),
        ] {
            let request = build(&descriptor, mode).unwrap();
            assert_eq!(request.header("accept-charset"), Some("utf-8"));
            assert!(request.header(HEADER_USER_AGENT).unwrap().starts_with("eve-rs/"));
        }
    }

    #[test]
    fn test_create_request_body_keeps_payload_order() {
        let items: Vec<_> = (1..=11).map(|n| json!({ "n": n })).collect();
        let descriptor = RequestDescriptor::new("people").with_payload(&items).unwrap();

        let request = build(&descriptor, Mode::Create).unwrap();
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.path, "/people");
        assert_eq!(request.header(HEADER_CONTENT_TYPE), Some(JSON_CONTENT_TYPE));

        let body = request.body.unwrap();
        assert!(body.starts_with(r#"{"item1":{"n":1},"item2":{"n":2},"#));
        assert!(body.ends_with(r#""item10":{"n":10},"item11":{"n":11}}"#));
    }

    #[test]
    fn test_create_request_rejects_bad_payload() {
        let missing = RequestDescriptor::new("people");
        assert!(matches!(build(&missing, Mode::Create), Err(Error::InvalidPayload(_))));

        let not_a_sequence = RequestDescriptor::new("people").with_raw_payload(json!({ "name": "x" }));
        assert!(matches!(build(&not_a_sequence, Mode::Create), Err(Error::InvalidPayload(_))));
    }

    #[test]
    fn test_call_credentials_override_default() {
        let mappings = FieldMappings::new();
        let default = Credentials::new("default-user", "default-pw");
        let builder = RequestBuilder::new(&mappings).with_default_credentials(Some(&default));

        let call = Credentials::new("call-user", "call-pw");
        let descriptor = RequestDescriptor::new("people").with_credentials(call.clone());
        let request = builder.build(&descriptor, Mode::Read).unwrap();
        assert_eq!(request.credentials, Some(call));

        let request = builder.build(&RequestDescriptor::new("people"), Mode::Read).unwrap();
        assert_eq!(request.credentials, Some(default));
    }

    #[test]
    fn test_no_credentials_is_unauthenticated() {
        let request = build(&RequestDescriptor::new("people"), Mode::Read).unwrap();
        assert_eq!(request.credentials, None);
    }

    #[test]
    fn test_field_mappings_follow_resource() {
        let mut mappings = FieldMappings::new();
        mappings.insert("people", "lastName", "lastname");
        let descriptor = RequestDescriptor::new("people")
            .filter(Filter::eq("lastName", "Doe").unwrap())
            .sort_by(SortEntry::asc("lastName"));

        let request = RequestBuilder::new(&mappings).build(&descriptor, Mode::Read).unwrap();
        assert_eq!(request.query_param("where"), Some(r#"{ "lastname": "Doe" }"#));
        assert_eq!(request.query_param("sort"), Some(r#"[("lastname", 1)]"#));
    }

    #[test]
    fn test_credentials_debug_is_redacted() {
        let credentials = Credentials::new("user", "hunter2");
        let debug = format!("{:?}", credentials);
        assert!(debug.contains("user"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_descriptor_from_json() {
        let json = r#"{
            "resource": "people",
            "filters": [{"field": "age", "comparator": "gte", "value": 21}],
            "sort": [{"field": "age", "direction": "desc"}]
        }"#;
        let descriptor: RequestDescriptor = serde_json::from_str(json).unwrap();
        let request = build(&descriptor, Mode::Read).unwrap();
        assert_eq!(request.query_param("where"), Some(r#"{ "age": { "$gte": 21 } }"#));
        assert_eq!(request.query_param("sort"), Some(r#"[("age", -1)]"#));
    }
}
