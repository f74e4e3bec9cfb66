//! Error types shared by every beamplot crate
//!
//! Every failure in the plot-message core is recoverable: the offending
//! message or edit is dropped and the last committed state is kept. These
//! enums carry enough detail for the caller to log the rejection or hand it
//! to a UI.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure to turn a wire array payload into a typed view
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "details")]
pub enum DecodeError {
    #[error("Array length mismatch: expected {expected} bytes but got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Unknown dtype: {dtype}")]
    UnknownDtype { dtype: String },

    #[error("Payload is not flagged as an n-dimensional array")]
    NotAnArray,

    #[error("Array shape {shape:?} overflows the addressable size")]
    ShapeOverflow { shape: Vec<usize> },

    #[error("Expected an array of rank {expected} but got shape {shape:?}")]
    RankMismatch { expected: String, shape: Vec<usize> },

    #[error("Array of {bytes} bytes exceeds the {limit} byte limit")]
    TooLarge { bytes: usize, limit: usize },
}

impl DecodeError {
    /// Stable machine-readable reason tag
    pub fn reason(&self) -> &'static str {
        match self {
            DecodeError::LengthMismatch { .. } => "length-mismatch",
            DecodeError::UnknownDtype { .. } => "unknown-dtype",
            DecodeError::NotAnArray => "not-an-array",
            DecodeError::ShapeOverflow { .. } => "shape-overflow",
            DecodeError::RankMismatch { .. } => "rank-mismatch",
            DecodeError::TooLarge { .. } => "too-large",
        }
    }
}

/// Base error type for plot session operations
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "details")]
pub enum PlotError {
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Unrecognized message kind: {kind}")]
    UnrecognizedMessageKind { kind: String },

    #[error("Invalid {kind} payload: {message}")]
    InvalidPayload { kind: String, message: String },

    // Baton errors
    #[error("Client {uuid} does not hold the baton")]
    BatonConflict { uuid: String },

    #[error("Stale baton approval for epoch {epoch}, current epoch is {current}")]
    StaleBatonApproval { epoch: u64, current: u64 },

    #[error("Unknown client: {uuid}")]
    UnknownClient { uuid: String },

    // Plot state errors
    #[error("Plot {plot_id} is busy")]
    Busy { plot_id: String },

    #[error("Unknown plot: {plot_id}")]
    UnknownPlot { plot_id: String },

    // Selection errors
    #[error("Selection {id} not found in plot {plot_id}")]
    SelectionNotFound { plot_id: String, id: String },

    #[error("Selection {id} is fixed")]
    FixedSelection { id: String },

    #[error("Selection {id} cannot change kind from {from} to {to}")]
    SelectionKindChange { id: String, from: String, to: String },

    #[error("Invalid selection: {message}")]
    InvalidSelection { message: String },

    #[error("Codec error: {message}")]
    Codec { message: String },
}

impl PlotError {
    pub fn invalid_payload(kind: impl Into<String>, message: impl Into<String>) -> Self {
        PlotError::InvalidPayload {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for plot session operations
pub type PlotResult<T> = Result<T, PlotError>;

impl From<serde_json::Error> for PlotError {
    fn from(err: serde_json::Error) -> Self {
        PlotError::Codec {
            message: err.to_string(),
        }
    }
}

/// A rejected message or edit, kept for whoever reports rejections
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorResponse {
    pub plot_id: Option<String>,
    /// Message kind or local edit that was refused
    pub operation: String,
    pub error: PlotError,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

impl ErrorResponse {
    pub fn new(error: PlotError, plot_id: Option<&str>, operation: impl Into<String>) -> Self {
        Self {
            plot_id: plot_id.map(str::to_string),
            operation: operation.into(),
            error,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// One-line summary for logs
    pub fn summary(&self) -> String {
        match &self.plot_id {
            Some(plot_id) => format!("{} on plot {}: {}", self.operation, plot_id, self.error),
            None => format!("{}: {}", self.operation, self.error),
        }
    }

    pub fn to_json(&self) -> PlotResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_tags() {
        let err = DecodeError::LengthMismatch {
            expected: 12,
            actual: 8,
        };
        assert_eq!(err.reason(), "length-mismatch");
        assert_eq!(
            DecodeError::UnknownDtype {
                dtype: "<c16".to_string()
            }
            .reason(),
            "unknown-dtype"
        );
    }

    #[test]
    fn test_error_response() {
        let error = PlotError::from(DecodeError::NotAnArray);
        let response = ErrorResponse::new(error.clone(), Some("plot_0"), "new_image_data");
        assert_eq!(
            response.summary(),
            "new_image_data on plot plot_0: Decode error: Payload is not flagged as an n-dimensional array"
        );

        let json = response.to_json().unwrap();
        assert!(json.contains("\"operation\":\"new_image_data\""));
        let back: ErrorResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(back.error, error);
        assert_eq!(back.plot_id.as_deref(), Some("plot_0"));

        let global = ErrorResponse::new(error, None, "decode");
        assert!(global.summary().starts_with("decode: "));
    }

    #[test]
    fn test_error_round_trips_through_json() {
        let error = PlotError::StaleBatonApproval {
            epoch: 3,
            current: 5,
        };
        let json = serde_json::to_string(&error).unwrap();
        let back: PlotError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, error);
    }
}
