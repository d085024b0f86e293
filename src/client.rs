//! REST data access against Eve-style APIs.

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::{ClientConfig, FieldMappings};
use crate::error::{Error, Result};
use crate::request::{Credentials, Mode, RequestBuilder, RequestDescriptor, TransportRequest};
use crate::response::{normalize, Response};
use crate::transport::{HttpTransport, Transport};

/// Executes request descriptors against a data source.
///
/// Structural problems (no data source, no resource, bad payload) are
/// returned as [`Error`] before any I/O. Everything that happens on the wire
/// ends up in the [`Response`].
pub trait DataAccess {
    /// Blocking call.
    fn execute<T>(&self, descriptor: &RequestDescriptor, mode: Mode) -> Result<Response<T>>
    where
        T: DeserializeOwned;

    /// Returns once the request is submitted. `callback` is invoked exactly
    /// once with the normalized response and the original descriptor.
    fn execute_async<T, F>(&self, descriptor: RequestDescriptor, mode: Mode, callback: F) -> Result<()>
    where
        T: DeserializeOwned + Send + 'static,
        F: FnOnce(Response<T>, RequestDescriptor) + Send + 'static;
}

/// The [`DataAccess`] implementation for REST APIs following the Eve
/// conventions.
#[derive(Debug)]
pub struct RestDataAccess<Tr = HttpTransport> {
    data_source: Option<String>,
    credentials: Option<Credentials>,
    field_mappings: FieldMappings,
    transport: Tr,
}

impl RestDataAccess<HttpTransport> {
    /// A client with no data source and no default credentials.
    pub fn new() -> Self {
        Self::with_transport(HttpTransport::new())
    }

    pub fn with_data_source(data_source: impl Into<String>) -> Self {
        let mut client = Self::new();
        client.set_data_source(data_source);
        client
    }

    pub fn with_credentials(credentials: Credentials) -> Self {
        let mut client = Self::new();
        client.set_credentials(Some(credentials));
        client
    }

    pub fn with_data_source_and_credentials(data_source: impl Into<String>, credentials: Credentials) -> Self {
        let mut client = Self::with_data_source(data_source);
        client.set_credentials(Some(credentials));
        client
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        let mut client = Self::with_transport(HttpTransport::with_timeout(config.timeout()));
        client.data_source = config.data_source.clone();
        client.credentials = config.credentials.clone();
        client.field_mappings = config.field_mappings.clone();
        client
    }
}

impl Default for RestDataAccess<HttpTransport> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Tr: Transport> RestDataAccess<Tr> {
    pub fn with_transport(transport: Tr) -> Self {
        Self {
            data_source: None,
            credentials: None,
            field_mappings: FieldMappings::default(),
            transport,
        }
    }

    pub fn data_source(&self) -> Option<&str> {
        self.data_source.as_deref()
    }

    pub fn set_data_source(&mut self, data_source: impl Into<String>) {
        self.data_source = Some(data_source.into());
    }

    /// Default credentials, used when a descriptor carries none.
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn set_credentials(&mut self, credentials: Option<Credentials>) {
        self.credentials = credentials;
    }

    pub fn field_mappings(&self) -> &FieldMappings {
        &self.field_mappings
    }

    pub fn set_field_mappings(&mut self, field_mappings: FieldMappings) {
        self.field_mappings = field_mappings;
    }

    pub fn transport(&self) -> &Tr {
        &self.transport
    }

    /// Build the request for `descriptor` without sending it.
    pub fn prepare(&self, descriptor: &RequestDescriptor, mode: Mode) -> Result<TransportRequest> {
        RequestBuilder::new(&self.field_mappings)
            .with_default_credentials(self.credentials.as_ref())
            .build(descriptor, mode)
    }

    fn base_url(&self) -> Result<&str> {
        match self.data_source.as_deref() {
            Some(url) if !url.trim().is_empty() => Ok(url),
            _ => Err(Error::MissingDataSource),
        }
    }
}

impl<Tr: Transport> DataAccess for RestDataAccess<Tr> {
    fn execute<T>(&self, descriptor: &RequestDescriptor, mode: Mode) -> Result<Response<T>>
    where
        T: DeserializeOwned,
    {
        let base_url = self.base_url()?;
        let request = self.prepare(descriptor, mode)?;
        debug!(resource = %descriptor.resource, mode = ?mode, "executing request");

        Ok(normalize(self.transport.send(base_url, &request)))
    }

    fn execute_async<T, F>(&self, descriptor: RequestDescriptor, mode: Mode, callback: F) -> Result<()>
    where
        T: DeserializeOwned + Send + 'static,
        F: FnOnce(Response<T>, RequestDescriptor) + Send + 'static,
    {
        let base_url = self.base_url()?;
        let request = self.prepare(&descriptor, mode)?;
        debug!(resource = %descriptor.resource, mode = ?mode, "submitting request");

        self.transport.send_async(base_url, request, move |outcome| {
            callback(normalize(outcome), descriptor);
        });
        Ok(())
    }
}
