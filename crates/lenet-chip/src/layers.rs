// SPDX-License-Identifier: AGPL-3.0-only

//! LeNet-5 layer geometry as mapped onto the accelerator.
//!
//! ```text
//! image   1×28×28 ─pad 2→ 1×32×32
//! conv1   5×5, 6 ch   → 6×28×28 → ReLU → pool → 6×14×14
//! conv2   5×5, 16 ch  → 16×10×10 → ReLU → pool → 16×5×5   (3 passes)
//! flatten channel-major → 400
//! fc1     400 → 120, ReLU
//! fc2     120 → 84,  ReLU
//! fc3      84 → 10,  logits (no ReLU)
//! ```

use crate::quant::{CONV_FRAC_BITS, DENSE_FRAC_BITS, QUANT_SHIFT};

/// Kind of compute a layer maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerShape {
    /// Square-kernel valid convolution.
    Conv {
        /// Kernel side length.
        kernel: usize,
    },
    /// Matrix-vector product.
    Dense,
}

/// Static description of one network layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerGeometry {
    /// Layer name, also the init file prefix.
    pub name: &'static str,
    /// Compute kind.
    pub shape: LayerShape,
    /// Input channels (input features for dense layers).
    pub in_channels: usize,
    /// Output channels (output features for dense layers).
    pub out_channels: usize,
    /// Input rows before padding (1 for dense layers).
    pub in_rows: usize,
    /// Input columns before padding (1 for dense layers).
    pub in_cols: usize,
    /// Zero border added by the input loader.
    pub padding: usize,
    /// ReLU stage enabled.
    pub relu: bool,
    /// 2×2 max-pool stage enabled.
    pub pool: bool,
    /// Requantization shift.
    pub shift: u32,
    /// Fractional bits of the layer's weights.
    pub weight_frac_bits: u32,
}

impl LayerGeometry {
    /// Rows and columns after padding.
    #[must_use]
    pub const fn padded_dims(&self) -> (usize, usize) {
        (self.in_rows + 2 * self.padding, self.in_cols + 2 * self.padding)
    }

    /// Rows and columns of the final (pooled) output.
    #[must_use]
    pub const fn output_dims(&self) -> (usize, usize) {
        let (rows, cols) = self.padded_dims();
        let (rows, cols) = match self.shape {
            LayerShape::Conv { kernel } => (rows - kernel + 1, cols - kernel + 1),
            LayerShape::Dense => (1, 1),
        };
        if self.pool {
            (rows / 2, cols / 2)
        } else {
            (rows, cols)
        }
    }

    /// Products summed into one accumulator.
    #[must_use]
    pub const fn fan_in(&self) -> usize {
        match self.shape {
            LayerShape::Conv { kernel } => self.in_channels * kernel * kernel,
            LayerShape::Dense => self.in_channels,
        }
    }
}

/// First convolution: 1 → 6 channels, padding 2.
pub const CONV1: LayerGeometry = LayerGeometry {
    name: "conv1",
    shape: LayerShape::Conv { kernel: 5 },
    in_channels: 1,
    out_channels: 6,
    in_rows: 28,
    in_cols: 28,
    padding: 2,
    relu: true,
    pool: true,
    shift: QUANT_SHIFT,
    weight_frac_bits: CONV_FRAC_BITS,
};

/// Second convolution: 6 → 16 channels, three reload passes.
pub const CONV2: LayerGeometry = LayerGeometry {
    name: "conv2",
    shape: LayerShape::Conv { kernel: 5 },
    in_channels: 6,
    out_channels: 16,
    in_rows: 14,
    in_cols: 14,
    padding: 0,
    relu: true,
    pool: true,
    shift: QUANT_SHIFT,
    weight_frac_bits: CONV_FRAC_BITS,
};

/// First dense layer: 400 → 120.
pub const FC1: LayerGeometry = dense("fc1", 400, 120, true);

/// Second dense layer: 120 → 84.
pub const FC2: LayerGeometry = dense("fc2", 120, 84, true);

/// Output layer: 84 → 10 logits, no activation.
pub const FC3: LayerGeometry = dense("fc3", 84, 10, false);

/// All layers in execution order.
pub const LENET5: [LayerGeometry; 5] = [CONV1, CONV2, FC1, FC2, FC3];

const fn dense(name: &'static str, inputs: usize, outputs: usize, relu: bool) -> LayerGeometry {
    LayerGeometry {
        name,
        shape: LayerShape::Dense,
        in_channels: inputs,
        out_channels: outputs,
        in_rows: 1,
        in_cols: 1,
        padding: 0,
        relu,
        pool: false,
        shift: QUANT_SHIFT,
        weight_frac_bits: DENSE_FRAC_BITS,
    }
}
