// rivet-net/src/xml/handler.rs
//! Callback surfaces a parse drives.

use std::fmt;

use rivet_common::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Warning,
    Error,
    Fatal,
}

/// A schema or well-formedness problem, handed to the content handler
/// instead of being raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationProblem {
    pub severity: Severity,
    pub message: String,
    /// Byte offset in the document where the problem was noticed.
    pub position: u64,
    pub system_id: String,
}

impl ValidationProblem {
    pub fn new(
        severity: Severity,
        message: impl Into<String>,
        position: u64,
        system_id: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            message: message.into(),
            position,
            system_id: system_id.into(),
        }
    }
}

impl fmt::Display for ValidationProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}: {}",
            self.system_id, self.position, self.message
        )
    }
}

/// Attributes of one start tag, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    entries: Vec<(String, String)>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Receives structural events and validation problems.
///
/// Structural callbacks may return an error to stop the parse; it is
/// propagated unchanged. Problem callbacks cannot stop anything.
pub trait ContentHandler {
    fn start_document(&mut self) -> Result<()> {
        Ok(())
    }

    fn end_document(&mut self) -> Result<()> {
        Ok(())
    }

    fn start_element(&mut self, _name: &str, _attributes: &Attributes) -> Result<()> {
        Ok(())
    }

    fn end_element(&mut self, _name: &str) -> Result<()> {
        Ok(())
    }

    fn characters(&mut self, _text: &str) -> Result<()> {
        Ok(())
    }

    fn warning(&mut self, _problem: &ValidationProblem) {}

    fn error(&mut self, _problem: &ValidationProblem) {}

    /// Called once, right before a malformed document aborts the parse.
    fn fatal_error(&mut self, _problem: &ValidationProblem) {}
}

/// Lower-level events, delivered only by engines that support them.
pub trait LexicalHandler {
    fn comment(&mut self, _text: &str) {}

    fn start_cdata(&mut self) {}

    fn end_cdata(&mut self) {}

    fn doctype(&mut self, _declaration: &str) {}
}

pub(crate) fn dispatch_problem(handler: &mut dyn ContentHandler, problem: &ValidationProblem) {
    match problem.severity {
        Severity::Warning => handler.warning(problem),
        Severity::Error => handler.error(problem),
        Severity::Fatal => handler.fatal_error(problem),
    }
}
