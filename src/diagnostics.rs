//! Diagnostics returned from every provider operation.
//!
//! Problems are reported as data rather than as Rust errors, because a single
//! call can produce several of them from different sources: encoding the
//! request locally, the RPC itself, the provider's own checks, and decoding
//! the response. [`Diagnostics`] keeps them in the order they were found.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;
use tracing::{info, warn};

use crate::path::AttributePath;

/// Summary used for diagnostics created when an RPC could not be completed.
///
/// Distinguishes "could not reach the provider" from diagnostics the provider
/// itself returned.
pub const RPC_ERROR_SUMMARY: &str = "RPC communication error";

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// An error that prevents the operation from completing.
    Error,
    /// A warning that doesn't prevent the operation but should be addressed.
    Warning,
}

/// A single diagnostic message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The severity of the diagnostic.
    pub severity: Severity,
    /// A short summary of the issue.
    pub summary: String,
    /// A detailed description of the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// The attribute the issue relates to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<AttributePath>,
}

impl Diagnostic {
    /// Create an error diagnostic.
    pub fn error(summary: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    /// Create a warning diagnostic.
    pub fn warning(summary: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    /// Add detail to this diagnostic.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Set the attribute path for this diagnostic.
    ///
    /// An empty path leaves the diagnostic unattributed.
    pub fn with_attribute(mut self, attribute: AttributePath) -> Self {
        self.attribute = if attribute.is_empty() {
            None
        } else {
            Some(attribute)
        };
        self
    }

    /// Whether this diagnostic has error severity.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.severity, self.summary)?;
        if let Some(detail) = &self.detail {
            write!(f, ": {}", detail)?;
        }
        if let Some(attr) = &self.attribute {
            write!(f, " (at {})", attr)?;
        }
        Ok(())
    }
}

/// An ordered collection of diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append a single diagnostic.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.0.push(diagnostic);
    }

    /// Append every diagnostic from `other`, keeping its order.
    pub fn append(&mut self, other: Diagnostics) {
        self.0.extend(other.0);
    }

    /// Whether any diagnostic has error severity.
    pub fn has_errors(&self) -> bool {
        self.0.iter().any(Diagnostic::is_error)
    }

    /// Iterate over the error-severity diagnostics only.
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter().filter(|d| d.is_error())
    }

    /// Consume the collection, returning the underlying vector.
    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.0
    }

    /// A single error diagnostic describing a local failure.
    ///
    /// The detail is formatted as `"<detail>: <err>"`.
    pub fn from_error(
        summary: impl Into<String>,
        detail: impl fmt::Display,
        err: impl fmt::Display,
    ) -> Self {
        Diagnostic::error(summary)
            .with_detail(format!("{}: {}", detail, err))
            .into()
    }

    /// A single error diagnostic for an RPC that could not be completed.
    ///
    /// Cancellation and timeouts arrive here as well; they are reported like
    /// any other transport failure.
    pub fn rpc_error(status: &tonic::Status) -> Self {
        Diagnostic::error(RPC_ERROR_SUMMARY)
            .with_detail(format!(
                "Error while calling provider: {:?}: {}",
                status.code(),
                status.message()
            ))
            .into()
    }

    /// Log the end of an operation at a level matching its outcome.
    pub(crate) fn log_outcome(&self, operation: &str) {
        if self.has_errors() {
            warn!(
                diagnostics = self.0.len(),
                "{} completed with errors", operation
            );
        } else {
            info!(diagnostics = self.0.len(), "{} completed successfully", operation);
        }
    }
}

impl Deref for Diagnostics {
    type Target = [Diagnostic];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Diagnostic> for Diagnostics {
    fn from(diagnostic: Diagnostic) -> Self {
        Self(vec![diagnostic])
    }
}

impl From<Vec<Diagnostic>> for Diagnostics {
    fn from(diagnostics: Vec<Diagnostic>) -> Self {
        Self(diagnostics)
    }
}

impl FromIterator<Diagnostic> for Diagnostics {
    fn from_iter<I: IntoIterator<Item = Diagnostic>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<Diagnostic> for Diagnostics {
    fn extend<I: IntoIterator<Item = Diagnostic>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} diagnostic(s):", self.0.len())?;
        for diag in &self.0 {
            writeln!(f, "  {}", diag)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_errors() {
        let mut diags = Diagnostics::new();
        assert!(!diags.has_errors());

        diags.push(Diagnostic::warning("heads up"));
        assert!(!diags.has_errors());

        diags.push(Diagnostic::error("broken"));
        assert!(diags.has_errors());
        assert_eq!(diags.errors().count(), 1);
    }

    #[test]
    fn test_append_preserves_order() {
        let mut diags: Diagnostics = Diagnostic::warning("first").into();
        let more: Diagnostics = vec![Diagnostic::error("second"), Diagnostic::warning("third")].into();
        diags.append(more);

        let summaries: Vec<_> = diags.iter().map(|d| d.summary.as_str()).collect();
        assert_eq!(summaries, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_rpc_error_is_distinguishable() {
        let status = tonic::Status::unavailable("connection refused");
        let diags = Diagnostics::rpc_error(&status);

        assert_eq!(diags.len(), 1);
        assert!(diags.has_errors());
        assert_eq!(diags[0].summary, RPC_ERROR_SUMMARY);
        let detail = diags[0].detail.as_deref().unwrap_or_default();
        assert!(detail.contains("connection refused"));
        assert!(detail.contains("Unavailable"));
    }

    #[test]
    fn test_from_error_detail_format() {
        let diags = Diagnostics::from_error("Invalid object", "Value does not conform", "bad");
        assert_eq!(
            diags[0].detail.as_deref(),
            Some("Value does not conform: bad")
        );
    }

    #[test]
    fn test_empty_attribute_is_dropped() {
        let diag = Diagnostic::error("x").with_attribute(AttributePath::new());
        assert!(diag.attribute.is_none());

        let diag = Diagnostic::error("x").with_attribute(AttributePath::new().attribute("name"));
        assert_eq!(diag.to_string(), "[Error] x (at name)");
    }

    #[test]
    fn test_serialization() {
        let diag = Diagnostic::error("Invalid configuration")
            .with_detail("The value must be positive")
            .with_attribute(AttributePath::new().attribute("count"));
        let json = serde_json::to_value(&diag).unwrap();
        assert_eq!(json["severity"], "error");
        assert_eq!(json["attribute"][0]["attribute"], "count");
    }
}
