//! Collaborator interfaces consumed by the autocomplete engine
//!
//! - [`CalculationSession`]: variables currently defined by the calculator
//! - [`HistorySource`]: past calculations shown in the history panel
//!
//! The history panel is exposed as structured [`HistoryRecord`]s. Panels
//! that only keep display text can be adapted with [`LogLineHistory`], which
//! parses lines of the form `op: expr => result`, `op: expr, other => result`
//! or `expr = result`.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Variables defined in the current calculation session
pub trait CalculationSession: Send + Sync {
    /// Variable name to display value
    fn list_variables(&self) -> BTreeMap<String, String>;

    fn has_variable(&self, name: &str) -> bool {
        self.list_variables().contains_key(name)
    }
}

/// Session backed by an in-memory variable table
#[derive(Debug, Default)]
pub struct InMemorySession {
    variables: RwLock<BTreeMap<String, String>>,
}

impl InMemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_variables<I, K, V>(variables: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let session = Self::new();
        for (name, value) in variables {
            session.define(name, value);
        }
        session
    }

    pub fn define(&self, name: impl Into<String>, value: impl Into<String>) {
        self.variables.write().insert(name.into(), value.into());
    }

    pub fn remove(&self, name: &str) -> Option<String> {
        self.variables.write().remove(name)
    }
}

impl CalculationSession for InMemorySession {
    fn list_variables(&self) -> BTreeMap<String, String> {
        self.variables.read().clone()
    }

    fn has_variable(&self, name: &str) -> bool {
        self.variables.read().contains_key(name)
    }
}

/// One past calculation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub expression: String,
    pub result: Option<String>,
}

impl HistoryRecord {
    pub fn new(expression: impl Into<String>, result: Option<String>) -> Self {
        Self { expression: expression.into(), result }
    }
}

/// Ordered past calculations, newest first
pub trait HistorySource: Send + Sync {
    fn records(&self) -> Vec<HistoryRecord>;
}

/// History kept as structured records
#[derive(Debug, Default)]
pub struct InMemoryHistory {
    records: RwLock<Vec<HistoryRecord>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a calculation at the top of the history
    pub fn push(&self, record: HistoryRecord) {
        self.records.write().insert(0, record);
    }

    pub fn clear(&self) {
        self.records.write().clear();
    }
}

impl HistorySource for InMemoryHistory {
    fn records(&self) -> Vec<HistoryRecord> {
        self.records.read().clone()
    }
}

/// Adapter over a panel that only keeps display lines
#[derive(Debug, Default)]
pub struct LogLineHistory {
    lines: RwLock<Vec<String>>,
}

impl LogLineHistory {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: RwLock::new(lines.into_iter().map(Into::into).collect()),
        }
    }

    pub fn push_line(&self, line: impl Into<String>) {
        self.lines.write().insert(0, line.into());
    }
}

impl HistorySource for LogLineHistory {
    fn records(&self) -> Vec<HistoryRecord> {
        self.lines
            .read()
            .iter()
            .filter_map(|line| parse_history_line(line))
            .collect()
    }
}

/// Recover the expression from a history panel display line
///
/// Splits are applied in a fixed order: `=>` (result), `:` (operation
/// prefix), `,` (secondary operand), then ` = ` for plain `expr = result`
/// lines. Returns `None` for lines without an expression.
pub fn parse_history_line(line: &str) -> Option<HistoryRecord> {
    let line = line.trim();

    let (mut expression, mut result) = match line.split_once("=>") {
        Some((lhs, rhs)) => (lhs, Some(rhs.trim())),
        None => (line, None),
    };

    if let Some((_, rest)) = expression.split_once(':') {
        expression = rest;
    }
    if let Some((first, _)) = expression.split_once(',') {
        expression = first;
    }
    if result.is_none() {
        if let Some((lhs, rhs)) = expression.split_once(" = ") {
            expression = lhs;
            result = Some(rhs.trim());
        }
    }

    let expression = expression.trim();
    if expression.is_empty() {
        return None;
    }

    Some(HistoryRecord {
        expression: expression.to_string(),
        result: result.filter(|r| !r.is_empty()).map(str::to_string),
    })
}
