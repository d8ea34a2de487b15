//! Error types for timeline construction and configuration

use crate::ids::NodeId;
use serde::{Deserialize, Serialize};

/// Errors raised while building or configuring animatables.
///
/// Playback controls never fail: a no-op transition is not an error.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum TimelineError {
    /// Label name does not match `^[a-z][^+\-=]*$`
    #[error("The label \"{label}\" contains invalid symbols")]
    InvalidLabel { label: String },

    /// A property block was not a plain object
    #[error("Invalid property block: {reason}")]
    InvalidPropertyBlock { reason: String },

    /// No backend registered under this name
    #[error("Driver {name} not found")]
    DriverNotFound { name: String },

    /// Id does not refer to a live node
    #[error("Node not found: {id}")]
    NodeNotFound { id: NodeId },

    /// Operation requires a different node kind
    #[error("Node {id} is a {actual}, expected a {expected}")]
    WrongNodeKind {
        id: NodeId,
        expected: String,
        actual: String,
    },

    /// Child cannot be attached to this timeline
    #[error("Cannot add {child} to timeline {timeline}: {reason}")]
    InvalidChild {
        timeline: NodeId,
        child: NodeId,
        reason: String,
    },

    /// No macro registered under this name
    #[error("Macro {name} not found")]
    MacroNotFound { name: String },

    /// Options object could not be decoded
    #[error("Invalid options: {reason}")]
    InvalidOptions { reason: String },

    /// Engine configuration rejected
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl TimelineError {
    /// Get error category for logging
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidLabel { .. } | Self::InvalidPropertyBlock { .. } => "validation",
            Self::DriverNotFound { .. } => "driver",
            Self::MacroNotFound { .. } => "macro",
            Self::NodeNotFound { .. } | Self::WrongNodeKind { .. } | Self::InvalidChild { .. } => {
                "graph"
            }
            Self::InvalidOptions { .. } | Self::InvalidConfig { .. } => "configuration",
        }
    }
}

impl From<serde_json::Error> for TimelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidOptions {
            reason: err.to_string(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, TimelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_message_names_the_label() {
        let err = TimelineError::InvalidLabel {
            label: "1st".into(),
        };
        assert_eq!(
            err.to_string(),
            "The label \"1st\" contains invalid symbols"
        );
        assert_eq!(err.category(), "validation");
    }

    #[test]
    fn json_errors_become_invalid_options() {
        let bad = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: TimelineError = bad.into();
        assert!(matches!(err, TimelineError::InvalidOptions { .. }));
        assert_eq!(err.category(), "configuration");
    }

    #[test]
    fn test_serialization() {
        let error = TimelineError::NodeNotFound { id: NodeId(3) };
        let serialized = serde_json::to_string(&error).unwrap();
        let deserialized: TimelineError = serde_json::from_str(&serialized).unwrap();
        assert_eq!(error, deserialized);
    }
}
