//! Table API query strings (`select`, `col=eq.v`, `order=col.desc`).

use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Asc,
    Desc,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TableQuery {
    table: &'static str,
    params: Vec<(String, String)>,
    order: Vec<String>,
}

impl TableQuery {
    pub(crate) fn new(table: &'static str) -> Self {
        Self {
            table,
            params: Vec::new(),
            order: Vec::new(),
        }
    }

    pub(crate) fn table(&self) -> &'static str {
        self.table
    }

    pub(crate) fn path(&self) -> String {
        format!("/rest/v1/{}", self.table)
    }

    pub(crate) fn select(mut self, columns: &str) -> Self {
        self.params.push(("select".into(), columns.into()));
        self
    }

    pub(crate) fn eq(mut self, column: &str, value: impl Display) -> Self {
        self.params.push((column.into(), format!("eq.{value}")));
        self
    }

    pub(crate) fn neq(mut self, column: &str, value: impl Display) -> Self {
        self.params.push((column.into(), format!("neq.{value}")));
        self
    }

    /// Order clauses accumulate into a single `order=` parameter.
    pub(crate) fn order(mut self, column: &str, direction: Direction) -> Self {
        self.order.push(format!("{column}.{}", direction.as_str()));
        self
    }

    pub(crate) fn params(&self) -> Vec<(String, String)> {
        let mut params = self.params.clone();
        if !self.order.is_empty() {
            params.push(("order".into(), self.order.join(",")));
        }
        params
    }
}

/// Total from a `Content-Range` header: `0-24/3573` or `*/42`.
pub(crate) fn parse_content_range(value: &str) -> Option<u64> {
    let (_, total) = value.trim().rsplit_once('/')?;
    total.parse().ok()
}

/// First user-facing reason in an error body; falls back to the raw text.
pub(crate) fn error_message(body: &str) -> String {
    const FIELDS: [&str; 4] = ["msg", "message", "error_description", "error"];

    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(body) {
        for field in FIELDS {
            if let Some(serde_json::Value::String(reason)) = map.get(field) {
                if !reason.is_empty() {
                    return reason.clone();
                }
            }
        }
    }
    let body = body.trim();
    if body.is_empty() { "Unknown error".to_string() } else { body.to_string() }
}
