// SPDX-License-Identifier: AGPL-3.0-only

//! Integer tensors with a declared bit width and axis order

use crate::error::{GoldenError, Result};
use crate::fixed;

/// Tensor shape (dimensions)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape {
    /// Dimensions, outermost first
    pub dims: Vec<usize>,
}

impl Shape {
    /// Create new shape
    pub const fn new(dims: Vec<usize>) -> Self {
        Self { dims }
    }

    /// Get total number of elements
    #[must_use]
    pub fn total_elements(&self) -> usize {
        self.dims.iter().product()
    }

    /// Get number of dimensions
    #[must_use]
    pub fn rank(&self) -> usize {
        self.dims.len()
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Self::new(dims)
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(dims: [usize; N]) -> Self {
        Self::new(dims.to_vec())
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, dim) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{dim}")?;
        }
        write!(f, "]")
    }
}

/// Semantic meaning of a tensor's axes, outermost first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxisOrder {
    /// Channel, row, column (golden model layout)
    Chw,
    /// Row, column, channel (hardware dump layout)
    Hwc,
    /// Single feature axis
    Linear,
    /// Output channel, input channel, kernel row, kernel column
    Kcrs,
    /// Row, column (dense weight matrix, `[out, in]`)
    Matrix,
}

impl AxisOrder {
    /// Number of axes
    #[must_use]
    pub const fn rank(self) -> usize {
        match self {
            Self::Linear => 1,
            Self::Matrix => 2,
            Self::Chw | Self::Hwc => 3,
            Self::Kcrs => 4,
        }
    }

    /// Axis labels used when reporting indices
    #[must_use]
    pub const fn labels(self) -> &'static [&'static str] {
        match self {
            Self::Chw => &["ch", "row", "col"],
            Self::Hwc => &["row", "col", "ch"],
            Self::Linear => &["idx"],
            Self::Kcrs => &["out", "in", "r", "s"],
            Self::Matrix => &["row", "col"],
        }
    }
}

/// Declared element width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitWidth {
    /// Signed 8-bit
    W8,
    /// Signed 32-bit
    W32,
}

impl BitWidth {
    /// Width in bits
    #[must_use]
    pub const fn bits(self) -> u32 {
        match self {
            Self::W8 => 8,
            Self::W32 => 32,
        }
    }

    /// True if `value` is representable
    #[must_use]
    pub fn contains(self, value: i64) -> bool {
        fixed::fits(value, self.bits())
    }
}

/// Immutable N-dimensional integer tensor
///
/// Elements are stored row-major in the declared [`AxisOrder`]. Every element
/// fits in the declared [`BitWidth`]; construction fails otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tensor {
    shape: Shape,
    order: AxisOrder,
    width: BitWidth,
    data: Vec<i32>,
}

impl Tensor {
    /// Create a tensor from row-major data
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` if the rank disagrees with `order` or the
    /// element count disagrees with `shape`, and `RangeViolation` if an
    /// element does not fit `width`.
    pub fn new(
        shape: impl Into<Shape>,
        order: AxisOrder,
        width: BitWidth,
        data: Vec<i32>,
    ) -> Result<Self> {
        let shape = shape.into();
        check_rank(&shape, order)?;
        if data.len() != shape.total_elements() {
            return Err(GoldenError::shape_mismatch(
                format!("tensor {shape}"),
                format!("{} elements", shape.total_elements()),
                format!("{} elements", data.len()),
            ));
        }
        if let Some(&bad) = data.iter().find(|&&v| !width.contains(i64::from(v))) {
            return Err(GoldenError::range_violation(i64::from(bad), width.bits()));
        }
        Ok(Self {
            shape,
            order,
            width,
            data,
        })
    }

    /// All-zero tensor
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` if the rank disagrees with `order`.
    pub fn zeros(shape: impl Into<Shape>, order: AxisOrder, width: BitWidth) -> Result<Self> {
        let shape = shape.into();
        check_rank(&shape, order)?;
        let data = vec![0; shape.total_elements()];
        Ok(Self {
            shape,
            order,
            width,
            data,
        })
    }

    /// Build a tensor by evaluating `f` at every index in row-major order
    ///
    /// # Errors
    ///
    /// Returns `RangeViolation` if `f` yields a value outside `width`.
    pub fn from_fn(
        shape: impl Into<Shape>,
        order: AxisOrder,
        width: BitWidth,
        mut f: impl FnMut(&[usize]) -> i64,
    ) -> Result<Self> {
        let shape = shape.into();
        check_rank(&shape, order)?;
        let total = shape.total_elements();
        let mut data = Vec::with_capacity(total);
        let mut index = vec![0; shape.rank()];
        for _ in 0..total {
            let value = f(&index);
            if !width.contains(value) {
                return Err(GoldenError::range_violation(value, width.bits()));
            }
            #[allow(clippy::cast_possible_truncation)]
            data.push(value as i32);
            increment(&mut index, &shape.dims);
        }
        Ok(Self {
            shape,
            order,
            width,
            data,
        })
    }

    /// Shape
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Dimensions, outermost first
    pub fn dims(&self) -> &[usize] {
        &self.shape.dims
    }

    /// Axis order
    pub fn order(&self) -> AxisOrder {
        self.order
    }

    /// Declared element width
    pub fn width(&self) -> BitWidth {
        self.width
    }

    /// Row-major elements
    pub fn data(&self) -> &[i32] {
        &self.data
    }

    /// Consume into row-major elements
    pub fn into_data(self) -> Vec<i32> {
        self.data
    }

    /// Element count
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if the tensor has no elements
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Row-major offset of `index`, if in bounds
    pub fn offset(&self, index: &[usize]) -> Option<usize> {
        if index.len() != self.shape.rank() {
            return None;
        }
        let mut offset = 0;
        for (&i, &dim) in index.iter().zip(&self.shape.dims) {
            if i >= dim {
                return None;
            }
            offset = offset * dim + i;
        }
        Some(offset)
    }

    /// Element at `index`, if in bounds
    pub fn get(&self, index: &[usize]) -> Option<i32> {
        self.offset(index).map(|o| self.data[o])
    }

    /// Multi-dimensional index of a row-major offset
    pub fn unravel(&self, mut offset: usize) -> Vec<usize> {
        let mut index = vec![0; self.shape.rank()];
        for (slot, &dim) in index.iter_mut().zip(&self.shape.dims).rev() {
            if dim > 0 {
                *slot = offset % dim;
                offset /= dim;
            }
        }
        index
    }

    /// `(channels, rows, cols)` of a feature map
    pub fn feature_dims(&self) -> Option<(usize, usize, usize)> {
        let d = &self.shape.dims;
        match self.order {
            AxisOrder::Chw => Some((d[0], d[1], d[2])),
            AxisOrder::Hwc => Some((d[2], d[0], d[1])),
            _ => None,
        }
    }

    /// Same elements re-laid-out in another feature-map order
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` unless both orders are `Chw`/`Hwc` (or equal).
    pub fn to_order(&self, order: AxisOrder) -> Result<Self> {
        if order == self.order {
            return Ok(self.clone());
        }
        let (channels, rows, cols) = self.feature_dims().ok_or_else(|| {
            GoldenError::invalid_config(format!(
                "cannot permute {:?} tensor to {order:?}",
                self.order
            ))
        })?;
        let (shape, source): (Vec<usize>, fn(&[usize]) -> [usize; 3]) = match order {
            AxisOrder::Hwc => (vec![rows, cols, channels], chw_index_of_hwc),
            AxisOrder::Chw => (vec![channels, rows, cols], hwc_index_of_chw),
            _ => {
                return Err(GoldenError::invalid_config(format!(
                    "cannot permute {:?} tensor to {order:?}",
                    self.order
                )))
            }
        };
        let data = iter_indices(&shape)
            .map(|index| {
                let [a, b, c] = source(&index);
                let d = &self.shape.dims;
                self.data[(a * d[1] + b) * d[2] + c]
            })
            .collect();
        Ok(Self {
            shape: Shape::new(shape),
            order,
            width: self.width,
            data,
        })
    }

    /// Same elements under a new shape and order with equal element count
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` if the element count or rank disagrees.
    pub fn reshaped(&self, shape: impl Into<Shape>, order: AxisOrder) -> Result<Self> {
        Self::new(shape, order, self.width, self.data.clone())
    }
}

/// Row-major iterator over every index of `dims`
pub fn iter_indices(dims: &[usize]) -> impl Iterator<Item = Vec<usize>> + '_ {
    let total: usize = dims.iter().product();
    let mut index = vec![0; dims.len()];
    (0..total).map(move |_| {
        let current = index.clone();
        increment(&mut index, dims);
        current
    })
}

fn chw_index_of_hwc(i: &[usize]) -> [usize; 3] {
    [i[2], i[0], i[1]]
}

fn hwc_index_of_chw(i: &[usize]) -> [usize; 3] {
    [i[1], i[2], i[0]]
}

fn increment(index: &mut [usize], dims: &[usize]) {
    for (slot, &dim) in index.iter_mut().zip(dims).rev() {
        *slot += 1;
        if *slot < dim {
            return;
        }
        *slot = 0;
    }
}

fn check_rank(shape: &Shape, order: AxisOrder) -> Result<()> {
    if shape.rank() != order.rank() {
        return Err(GoldenError::shape_mismatch(
            format!("{order:?} tensor rank"),
            order.rank(),
            shape.rank(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_chw(c: usize, h: usize, w: usize) -> Tensor {
        Tensor::from_fn([c, h, w], AxisOrder::Chw, BitWidth::W32, |i| {
            (i[0] * 100 + i[1] * 10 + i[2]) as i64
        })
        .unwrap()
    }

    #[test]
    fn test_shape_display() {
        let shape = Shape::new(vec![6, 24, 24]);
        assert_eq!(format!("{shape}"), "[6, 24, 24]");
        assert_eq!(shape.total_elements(), 3456);
    }

    #[test]
    fn construction_rejects_out_of_range() {
        let err = Tensor::new([2], AxisOrder::Linear, BitWidth::W8, vec![1, 128]).unwrap_err();
        assert!(matches!(err, GoldenError::RangeViolation { value: 128, bits: 8 }));
    }

    #[test]
    fn construction_rejects_wrong_count() {
        let err = Tensor::new([2, 2], AxisOrder::Matrix, BitWidth::W8, vec![1, 2, 3]).unwrap_err();
        assert!(matches!(err, GoldenError::ShapeMismatch { .. }));
    }

    #[test]
    fn construction_rejects_wrong_rank() {
        assert!(Tensor::zeros([2, 2], AxisOrder::Chw, BitWidth::W8).is_err());
    }

    #[test]
    fn indexing() {
        let t = ramp_chw(2, 3, 4);
        assert_eq!(t.get(&[1, 2, 3]), Some(123));
        assert_eq!(t.get(&[2, 0, 0]), None);
        assert_eq!(t.unravel(t.offset(&[1, 0, 2]).unwrap()), vec![1, 0, 2]);
    }

    #[test]
    fn permute_to_hwc_and_back() {
        let t = ramp_chw(3, 2, 2);
        let hwc = t.to_order(AxisOrder::Hwc).unwrap();
        assert_eq!(hwc.dims(), &[2, 2, 3]);
        assert_eq!(hwc.get(&[1, 0, 2]), Some(210));
        assert_eq!(hwc.feature_dims(), t.feature_dims());
        assert_eq!(hwc.to_order(AxisOrder::Chw).unwrap(), t);
    }

    #[test]
    fn permute_rejects_non_feature_maps() {
        let t = Tensor::zeros([4], AxisOrder::Linear, BitWidth::W8).unwrap();
        assert!(t.to_order(AxisOrder::Hwc).is_err());
    }

    #[test]
    fn construction_checks_range() {
        assert!(Tensor::new([2], AxisOrder::Linear, BitWidth::W8, vec![5, 1000]).is_err());
        assert!(Tensor::new([2], AxisOrder::Linear, BitWidth::W32, vec![5, 1000]).is_ok());
    }
}
