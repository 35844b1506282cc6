use crate::value::ValueTag;

/// Category of a response-building error. Lets callers tell a client
/// mistake (bad wire input) apart from a failure while building data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A Value was read with the wrong expectation.
    Type,
    /// Malformed wire input, reported back to the client.
    Wire,
    /// Caller-supplied error threaded through a PropertyUpdate.
    Domain,
    /// A data source failed while handling its queries.
    Source,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Type => f.write_str("type"),
            ErrorKind::Wire => f.write_str("wire"),
            ErrorKind::Domain => f.write_str("domain"),
            ErrorKind::Source => f.write_str("source"),
        }
    }
}

/// Unified error type for value access, property updates and data sources.
///
/// Carries an `ErrorKind` for categorization and a human-readable message.
/// `From` impls assign the appropriate kind automatically and allow
/// ergonomic `?` in data source implementations.
#[derive(Clone, PartialEq, Eq)]
pub struct VizError {
    kind: ErrorKind,
    message: String,
}

impl VizError {
    /// Generic domain error (default kind).
    pub fn new(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Domain, message: msg.into() }
    }

    /// Expect-as-T called against a Value of another tag.
    pub fn type_mismatch(expected: ValueTag, found: ValueTag) -> Self {
        Self {
            kind: ErrorKind::Type,
            message: format!("expected value type '{expected}', got '{found}'"),
        }
    }

    /// Malformed wire input.
    pub fn wire(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Wire, message: msg.into() }
    }

    /// Data source failure.
    pub fn source(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Source, message: msg.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Prefix the message with context, preserving the kind.
    ///
    /// Produces: `"context: message"`.
    pub fn with_context(self, ctx: impl std::fmt::Display) -> Self {
        Self {
            kind: self.kind,
            message: format!("{ctx}: {}", self.message),
        }
    }
}

impl std::fmt::Debug for VizError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl std::fmt::Display for VizError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for VizError {}

impl From<String> for VizError {
    fn from(s: String) -> Self { Self { kind: ErrorKind::Domain, message: s } }
}

impl From<&str> for VizError {
    fn from(s: &str) -> Self { Self { kind: ErrorKind::Domain, message: s.to_string() } }
}

impl From<serde_json::Error> for VizError {
    fn from(e: serde_json::Error) -> Self { Self { kind: ErrorKind::Wire, message: e.to_string() } }
}

// ═══════════════════════════════════════════════════════════════
//  ResponseError — everything the error sink recorded
// ═══════════════════════════════════════════════════════════════

/// All errors recorded while assembling one response, in recording order.
#[derive(Clone, PartialEq, Eq)]
pub struct ResponseError {
    errors: Vec<VizError>,
}

impl ResponseError {
    pub(crate) fn new(errors: Vec<VizError>) -> Self {
        Self { errors }
    }

    pub fn errors(&self) -> &[VizError] {
        &self.errors
    }
}

impl std::fmt::Debug for ResponseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(&self.errors).finish()
    }
}

impl std::fmt::Display for ResponseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ResponseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_error_joins_messages() {
        let err = ResponseError::new(vec![
            VizError::new("axis type mismatch"),
            VizError::type_mismatch(ValueTag::Int, ValueTag::Double),
        ]);
        assert_eq!(
            err.to_string(),
            "axis type mismatch, expected value type 'int', got 'dbl'"
        );
    }

    #[test]
    fn context_preserves_kind() {
        let err = VizError::wire("bad tag").with_context("GlobalFilters");
        assert_eq!(err.kind(), ErrorKind::Wire);
        assert_eq!(err.message(), "GlobalFilters: bad tag");
    }
}
