// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for golden model and codec operations

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for golden model operations
pub type Result<T> = std::result::Result<T, GoldenError>;

/// Errors that can occur while decoding, emulating or comparing
///
/// Divergences between golden and simulated tensors are not errors; they are
/// returned as data by [`crate::compare`].
#[derive(Debug, Error)]
pub enum GoldenError {
    /// A required input file does not exist
    #[error("Input file not found: {path}")]
    MissingInput {
        /// Path that was attempted
        path: PathBuf,
    },

    /// Element count or tensor shape disagrees with the layer dimensions
    #[error("Shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// What was being decoded or compared
        context: String,
        /// Expected shape or count
        expected: String,
        /// Actual shape or count
        actual: String,
    },

    /// A value cannot be represented in the declared bit width
    #[error("Value {value} does not fit in {bits} bits")]
    RangeViolation {
        /// Offending value
        value: i64,
        /// Declared width
        bits: u32,
    },

    /// Malformed text in an input file
    #[error("Parse error at line {line}: {reason}")]
    Parse {
        /// 1-based line number (0 when not tied to a line)
        line: usize,
        /// Reason for failure
        reason: String,
    },

    /// Layer or layout configuration rejected at construction
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Reason for failure
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },
}

impl GoldenError {
    /// Create a missing input error
    pub fn missing_input(path: impl Into<PathBuf>) -> Self {
        Self::MissingInput { path: path.into() }
    }

    /// Create a shape mismatch error
    pub fn shape_mismatch(
        context: impl Into<String>,
        expected: impl ToString,
        actual: impl ToString,
    ) -> Self {
        Self::ShapeMismatch {
            context: context.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Create a range violation error
    pub fn range_violation(value: i64, bits: u32) -> Self {
        Self::RangeViolation { value, bits }
    }

    /// Create a parse error
    pub fn parse(line: usize, reason: impl Into<String>) -> Self {
        Self::Parse {
            line,
            reason: reason.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// True for the failures that must abort a verification run
    /// (missing files and shape mismatches).
    pub fn is_fatal_input(&self) -> bool {
        matches!(self, Self::MissingInput { .. } | Self::ShapeMismatch { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_mismatch_reports_both_sides() {
        let err = GoldenError::shape_mismatch("conv1 weights", 25, 24);
        assert_eq!(
            err.to_string(),
            "Shape mismatch in conv1 weights: expected 25, got 24"
        );
        assert!(err.is_fatal_input());
    }

    #[test]
    fn missing_input_names_path() {
        let err = GoldenError::missing_input("init/conv1_bias.hex");
        assert!(err.to_string().contains("init/conv1_bias.hex"));
    }

    #[test]
    fn range_violation_is_not_input_error() {
        assert!(!GoldenError::range_violation(300, 8).is_fatal_input());
    }
}
