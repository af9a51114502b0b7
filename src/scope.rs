//! Per-operation execution context threaded through the interceptor chain.

use serde_json::Value;
use tracing::Span;

use crate::error::OperationError;
use crate::parser;

/// Mutable record for one logical database operation.
///
/// Created by the execution layer before the chain runs, annotated with the
/// result or error by the innermost handler, read by every interceptor on
/// the way out, and discarded when the chain completes.
///
/// Statement and bound parameters are fixed at construction: interceptors
/// render them for display but cannot alter what executes.
pub struct Scope {
    statement: String,
    binds: Vec<Value>,
    table: Option<String>,
    value: Option<Value>,
    error: Option<OperationError>,
    parent_span: Option<Span>,
}

impl Scope {
    /// Create a scope for the given statement.
    pub fn new(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            binds: Vec::new(),
            table: None,
            value: None,
            error: None,
            parent_span: None,
        }
    }

    /// Attach bound parameter values.
    pub fn with_binds(mut self, binds: Vec<Value>) -> Self {
        self.binds = binds;
        self
    }

    /// Name the target resource (table) explicitly.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Attach an externally-supplied span to parent the operation's trace
    /// span on. Only the trace interceptor consumes this.
    pub fn with_parent_span(mut self, span: Span) -> Self {
        self.parent_span = Some(span);
        self
    }

    pub fn statement(&self) -> &str {
        &self.statement
    }

    pub fn binds(&self) -> &[Value] {
        &self.binds
    }

    /// The target resource name: the explicit table if one was supplied,
    /// otherwise derived from the statement text.
    pub fn target_resource(&self) -> String {
        self.table
            .clone()
            .or_else(|| parser::target_table(&self.statement))
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Record the operation's result value.
    pub fn set_value(&mut self, value: Value) {
        self.value = Some(value);
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Record an operation failure.
    pub fn fail(&mut self, error: OperationError) {
        self.error = Some(error);
    }

    pub fn error(&self) -> Option<&OperationError> {
        self.error.as_ref()
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn parent_span(&self) -> Option<&Span> {
        self.parent_span.as_ref()
    }

    /// The statement for display. With `include_binds`, placeholder `?`
    /// marks are replaced by the rendered bound values, in order.
    pub fn rendered_statement(&self, include_binds: bool) -> String {
        if !include_binds || self.binds.is_empty() {
            return self.statement.clone();
        }
        bind_sql(&self.statement, &self.binds)
    }
}

fn bind_sql(sql: &str, binds: &[Value]) -> String {
    let mut out = String::with_capacity(sql.len() + 16 * binds.len());
    let mut values = binds.iter();
    for ch in sql.chars() {
        if ch == '?' {
            if let Some(value) = values.next() {
                out.push_str(&render_value(value));
                continue;
            }
        }
        out.push(ch);
    }
    out
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => format!("'{s}'"),
        other => other.to_string(),
    }
}
