// src/error.rs
//! Failure classification shared by every source.
//!
//! A source never hands the orchestrator a raw transport/parse error: it
//! hands over a [`SourceError`] whose [`ErrorClass`] drives the retry policy.

use std::fmt;
use std::time::Duration;

/// Where a `Malformed` fault was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The whole resource (response body, file) is unusable.
    Resource,
    /// One item (row, article, element) is unusable; siblings are fine.
    Item,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Network blip, timeout, connection refused, 5xx.
    Transient,
    /// Explicit throttling; `retry_after` is the server-signalled wait, if any.
    RateLimited { retry_after: Option<Duration> },
    /// Credential or configuration fault.
    Unauthorized,
    Malformed(Scope),
    /// Expected resource absent.
    NotFound,
    /// Expected extraction pattern absent.
    StructureChanged,
}

impl ErrorClass {
    /// Short stable label used in log fields and metric labels.
    pub fn label(&self) -> &'static str {
        match self {
            ErrorClass::Transient => "transient",
            ErrorClass::RateLimited { .. } => "rate_limited",
            ErrorClass::Unauthorized => "unauthorized",
            ErrorClass::Malformed(Scope::Resource) => "malformed_resource",
            ErrorClass::Malformed(Scope::Item) => "malformed_item",
            ErrorClass::NotFound => "not_found",
            ErrorClass::StructureChanged => "structure_changed",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("{class}: {message}")]
    Classified { class: ErrorClass, message: String },

    /// Anything a source could not classify. Treated as fail-fast.
    #[error("unclassified: {0:#}")]
    Unclassified(#[from] anyhow::Error),
}

impl SourceError {
    pub fn new(class: ErrorClass, message: impl Into<String>) -> Self {
        SourceError::Classified {
            class,
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Transient, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Unauthorized, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::NotFound, message)
    }

    pub fn malformed_item(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Malformed(Scope::Item), message)
    }

    pub fn malformed_resource(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Malformed(Scope::Resource), message)
    }

    /// `None` for unclassified failures.
    pub fn class(&self) -> Option<ErrorClass> {
        match self {
            SourceError::Classified { class, .. } => Some(*class),
            SourceError::Unclassified(_) => None,
        }
    }

    pub fn is_item_level(&self) -> bool {
        self.class() == Some(ErrorClass::Malformed(Scope::Item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_class_label_and_message() {
        let e = SourceError::unauthorized("HTTP 401");
        assert_eq!(e.to_string(), "unauthorized: HTTP 401");
        assert_eq!(e.class(), Some(ErrorClass::Unauthorized));
    }

    #[test]
    fn anyhow_errors_are_unclassified() {
        let e: SourceError = anyhow::anyhow!("boom").into();
        assert!(e.class().is_none());
        assert!(!e.is_item_level());
    }
}
