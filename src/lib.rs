//! Client-side data access for REST APIs that follow the Eve conventions.
//!
//! A [`RequestDescriptor`] describes what to fetch or create: filters, sort
//! order, conditional-fetch headers and an optional payload. The client
//! compiles the filters into Eve's `where` parameter and the sort list into
//! `sort`, sends the request and normalizes the outcome into a [`Response`].
//!
//! ```no_run
//! use eve_access::{DataAccess, Filter, Mode, RequestDescriptor, RestDataAccess, SortEntry};
//!
//! # fn main() -> eve_access::Result<()> {
//! let client = RestDataAccess::with_data_source("http://localhost:5000/api");
//! let descriptor = RequestDescriptor::new("people")
//!     .filter(Filter::gt("age", 18)?.and())
//!     .filter(Filter::eq("status", "active")?)
//!     .sort_by(SortEntry::asc("lastname"));
//!
//! let response = client.execute::<serde_json::Value>(&descriptor, Mode::Read)?;
//! println!("{:?}: {:?}", response.status, response.content);
//! # Ok(())
//! # }
//! ```

pub mod ast;
pub mod client;
pub mod config;
pub mod error;
pub mod query_compiler;
pub mod request;
pub mod response;
pub mod transport;

pub use ast::{
    Comparator, Concatenator, Filter, FilterGroup, FilterNode, FilterTree, FilterValue, SortDirection,
    SortEntry, SortList,
};
pub use client::{DataAccess, RestDataAccess};
pub use config::{ClientConfig, ConfigError, FieldMappings};
pub use error::{Error, Result};
pub use query_compiler::{compile_sort, compile_where, FieldMapper, IdentityMapper, QueryCompiler};
pub use request::{Credentials, HttpMethod, Mode, RequestBuilder, RequestDescriptor, TransportRequest};
pub use response::{normalize, Response, StatusCode};
pub use transport::{HttpTransport, ResponseStatus, Transport, TransportError, TransportOutcome};
