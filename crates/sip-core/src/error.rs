//! Error types for SDP and SIP message handling

use thiserror::Error;

/// Result type alias for sip-core operations
pub type Result<T> = std::result::Result<T, SdpError>;

/// Errors raised while reading SDP bodies or SIP messages
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SdpError {
    /// A line did not have the `x=value` shape
    #[error("Malformed SDP line: {line}")]
    MalformedLine { line: String },

    /// An `a=` line could not be split into a usable attribute
    #[error("Malformed SDP attribute: {line}")]
    MalformedAttribute { line: String },

    /// A field needed for negotiation was absent
    #[error("Missing required SDP field: {field}")]
    MissingField { field: &'static str },

    /// A field was present but its value could not be interpreted
    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },

    /// A SIP header the caller depends on is missing
    #[error("Missing SIP header: {name}")]
    MissingHeader { name: &'static str },
}

impl SdpError {
    /// Create a malformed attribute error
    pub fn malformed_attribute(line: impl Into<String>) -> Self {
        Self::MalformedAttribute { line: line.into() }
    }

    /// Create an invalid value error
    pub fn invalid_value(field: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            value: value.into(),
        }
    }
}
