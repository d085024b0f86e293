//! Compiler that renders filter trees and sort lists into Eve query fragments.
//!
//! The `where` fragment is a flat, MongoDB-flavoured expression:
//!
//! ```text
//! { "age": { "$gt": 18 }, "status": "active", $or "role": "admin" }
//! ```
//!
//! Siblings are joined left to right by the concatenator of the node that
//! precedes them. Groups only scope their children; they never add braces.

use chrono::{DateTime, Utc};

use crate::ast::{Comparator, Concatenator, FilterNode, FilterValue, SortDirection, SortEntry};

/// Date format used for timestamp literals and conditional-fetch headers.
pub const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Resolves logical field names to the remote schema's physical names.
pub trait FieldMapper {
    fn map_field(&self, field: &str) -> String;
}

impl<F> FieldMapper for F
where
    F: Fn(&str) -> String,
{
    fn map_field(&self, field: &str) -> String {
        self(field)
    }
}

/// Passes field names through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityMapper;

impl FieldMapper for IdentityMapper {
    fn map_field(&self, field: &str) -> String {
        field.to_string()
    }
}

/// Compiler for the `where` and `sort` query parameters
pub struct QueryCompiler<'a> {
    mapper: &'a dyn FieldMapper,
}

impl<'a> QueryCompiler<'a> {
    pub fn new(mapper: &'a dyn FieldMapper) -> Self {
        Self { mapper }
    }

    /// Compile a filter tree into the `where` fragment.
    ///
    /// Returns `None` when the tree (after dropping empty groups) has nothing
    /// to emit.
    pub fn compile_where(&self, tree: &[FilterNode]) -> Option<String> {
        let mut body = String::new();
        self.compile_nodes(tree, &mut body);
        if body.is_empty() {
            None
        } else {
            Some(format!("{{ {} }}", body))
        }
    }

    /// Compile a sort list into the `sort` fragment, `None` when empty.
    pub fn compile_sort(&self, list: &[SortEntry]) -> Option<String> {
        if list.is_empty() {
            return None;
        }

        let entries: Vec<String> = list
            .iter()
            .map(|entry| {
                let direction = match entry.direction {
                    SortDirection::Ascending => 1,
                    SortDirection::Descending => -1,
                };
                format!("({}, {})", quote(&self.mapper.map_field(&entry.field)), direction)
            })
            .collect();

        Some(format!("[{}]", entries.join(", ")))
    }

    /// Append the contribution of `nodes` to `out`.
    ///
    /// The separator owed by the last contributing node is written only once
    /// the next contribution is known to be non-empty.
    fn compile_nodes(&self, nodes: &[FilterNode], out: &mut String) {
        let mut pending: Option<&'static str> = None;

        for node in nodes {
            let contribution = match node {
                FilterNode::Filter(filter) => format!(
                    "{}: {}",
                    quote(&self.mapper.map_field(filter.field())),
                    render_comparison(filter.comparator(), filter.value())
                ),
                FilterNode::Group(group) => {
                    let mut inner = String::new();
                    self.compile_nodes(&group.children, &mut inner);
                    inner
                }
            };

            // empty groups neither emit nor join
            if contribution.is_empty() {
                continue;
            }

            if let Some(separator) = pending {
                out.push_str(separator);
            }
            out.push_str(&contribution);

            pending = separator_for(node.concatenator());
        }
    }
}

fn separator_for(concatenator: Concatenator) -> Option<&'static str> {
    match concatenator {
        Concatenator::And => Some(", "),
        Concatenator::Or => Some(", $or "),
        Concatenator::None => None,
    }
}

/// Fill the comparator template with the rendered literal.
pub fn render_comparison(comparator: Comparator, value: &FilterValue) -> String {
    let literal = render_literal(value);
    match comparator {
        Comparator::Equal => literal,
        Comparator::NotEqual => format!("{{ \"$ne\": {} }}", literal),
        Comparator::GreaterThan => format!("{{ \"$gt\": {} }}", literal),
        Comparator::GreaterOrEqual => format!("{{ \"$gte\": {} }}", literal),
        Comparator::LessThan => format!("{{ \"$lt\": {} }}", literal),
        Comparator::LessOrEqual => format!("{{ \"$lte\": {} }}", literal),
    }
}

/// Render a literal in the query dialect's syntax.
pub fn render_literal(value: &FilterValue) -> String {
    match value {
        FilterValue::String(s) => quote(s),
        FilterValue::Timestamp(t) => quote(&format_http_date(t)),
        FilterValue::Integer(n) => n.to_string(),
        FilterValue::Float(f) => f.to_string(),
        FilterValue::Boolean(b) => b.to_string(),
    }
}

/// `Tue, 15 Nov 1994 08:12:31 GMT`
pub fn format_http_date(date: &DateTime<Utc>) -> String {
    date.format(HTTP_DATE_FORMAT).to_string()
}

fn quote(s: &str) -> String {
    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('"');
    for c in s.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            _ => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

/// Compile `tree` with the given mapper.
pub fn compile_where(tree: &[FilterNode], mapper: &dyn FieldMapper) -> Option<String> {
    QueryCompiler::new(mapper).compile_where(tree)
}

/// Compile `list` with the given mapper.
pub fn compile_sort(list: &[SortEntry], mapper: &dyn FieldMapper) -> Option<String> {
    QueryCompiler::new(mapper).compile_sort(list)
}
