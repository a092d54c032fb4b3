// SPDX-License-Identifier: AGPL-3.0-only

//! Golden vs. simulated tensor comparison
//!
//! Divergences are returned as data, in the scan order of the tensors' axis
//! order (for `Hwc` dumps: row, then column, then channel). Nothing is
//! dropped here; [`ComparisonReport::render`] is the only place a listing
//! gets truncated.

use std::fmt::Write as _;

use tracing::{info, warn};

use crate::error::{GoldenError, Result};
use crate::tensor::{AxisOrder, Tensor};

/// One mismatching element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Divergence {
    /// Multi-dimensional index in the compared axis order
    pub index: Vec<usize>,
    /// Golden value
    pub expected: i32,
    /// Simulated value
    pub actual: i32,
    /// `expected - actual`
    pub diff: i64,
}

impl Divergence {
    /// Index rendered with axis labels, e.g. `row=3, col=4, ch=2`
    pub fn labelled_index(&self, order: AxisOrder) -> String {
        order
            .labels()
            .iter()
            .zip(&self.index)
            .map(|(label, i)| format!("{label}={i}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Every element-wise difference between `golden` and `actual`
///
/// An empty result means the tensors are bit-exact.
///
/// # Errors
///
/// Returns `ShapeMismatch` (with both shapes) if the shapes or axis orders
/// differ.
pub fn compare(golden: &Tensor, actual: &Tensor) -> Result<Vec<Divergence>> {
    if golden.shape() != actual.shape() || golden.order() != actual.order() {
        return Err(GoldenError::shape_mismatch(
            "comparison",
            format!("{:?} {}", golden.order(), golden.shape()),
            format!("{:?} {}", actual.order(), actual.shape()),
        ));
    }
    Ok(golden
        .data()
        .iter()
        .zip(actual.data())
        .enumerate()
        .filter(|(_, (e, a))| e != a)
        .map(|(offset, (&expected, &actual_value))| Divergence {
            index: golden.unravel(offset),
            expected,
            actual: actual_value,
            diff: i64::from(expected) - i64::from(actual_value),
        })
        .collect())
}

/// A labelled comparison result
#[derive(Debug, Clone)]
pub struct ComparisonReport {
    /// What was compared, e.g. `conv1/quantized`
    pub label: String,
    /// Axis order the indices refer to
    pub order: AxisOrder,
    /// Number of elements compared
    pub compared: usize,
    /// All divergences, in scan order
    pub divergences: Vec<Divergence>,
}

impl ComparisonReport {
    /// Compare and label
    ///
    /// # Errors
    ///
    /// See [`compare`].
    pub fn new(label: impl Into<String>, golden: &Tensor, actual: &Tensor) -> Result<Self> {
        let label = label.into();
        let divergences = compare(golden, actual)?;
        if divergences.is_empty() {
            info!("{label}: bit-exact ({} values)", golden.len());
        } else {
            warn!(
                "{label}: {} divergence(s) in {} values",
                divergences.len(),
                golden.len()
            );
        }
        Ok(Self {
            label,
            order: golden.order(),
            compared: golden.len(),
            divergences,
        })
    }

    /// True if no element differs
    pub fn is_match(&self) -> bool {
        self.divergences.is_empty()
    }

    /// Human-readable listing of at most `limit` divergences
    pub fn render(&self, limit: usize) -> String {
        let mut out = String::new();
        if self.is_match() {
            let _ = writeln!(out, "{}: bit-exact ({} values)", self.label, self.compared);
            return out;
        }
        let _ = writeln!(
            out,
            "{}: {} divergence(s) in {} values",
            self.label,
            self.divergences.len(),
            self.compared
        );
        for d in self.divergences.iter().take(limit) {
            let _ = writeln!(
                out,
                "  [{}] expected {}, got {} (diff {:+})",
                d.labelled_index(self.order),
                d.expected,
                d.actual,
                d.diff
            );
        }
        if self.divergences.len() > limit {
            let _ = writeln!(out, "  ... {} more", self.divergences.len() - limit);
        }
        out
    }
}
