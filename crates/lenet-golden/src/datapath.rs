// SPDX-License-Identifier: AGPL-3.0-only

//! Datapath emulator: the accelerator's five-stage layer pipeline
//!
//! ```text
//! padded input ─▶ ConvAccumulate ─▶ BiasAdd ─▶ Activation ─▶ Pool ─▶ Requantize ─▶ int8
//!                  (i32, Q14)        (i32)      (ReLU?)      (2×2?)   (>> shift)
//! ```
//!
//! Every stage materializes a new tensor so that each one can be compared
//! against the matching RTL probe. Disabled stages (no ReLU, no pool) still
//! produce their tensor, equal to the stage input.

use std::fmt;
use std::str::FromStr;

use lenet_chip::layers::{LayerGeometry, LayerShape};
use lenet_chip::quant::{INT8_MIN, QUANT_SHIFT};
use tracing::{debug, info};

use crate::error::{GoldenError, Result};
use crate::fixed::{self, Activation, FixedPointFormat};
use crate::tensor::{AxisOrder, BitWidth, Shape, Tensor};

/// Named pipeline stage, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Raw multiply-accumulate sums
    Accumulated,
    /// Sums plus bias
    Biased,
    /// After ReLU (identity when disabled)
    Activated,
    /// After 2×2 max pool (identity when disabled)
    Pooled,
    /// Requantized int8 output
    Quantized,
}

impl Stage {
    /// All stages in pipeline order
    pub const ALL: [Self; 5] = [
        Self::Accumulated,
        Self::Biased,
        Self::Activated,
        Self::Pooled,
        Self::Quantized,
    ];

    /// Lower-case name, as used on the command line and in dump file names
    pub const fn name(self) -> &'static str {
        match self {
            Self::Accumulated => "accumulated",
            Self::Biased => "biased",
            Self::Activated => "activated",
            Self::Pooled => "pooled",
            Self::Quantized => "quantized",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stage {
    type Err = GoldenError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|stage| stage.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| GoldenError::invalid_config(format!("unknown stage '{s}'")))
    }
}

/// Compute performed by a layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    /// Valid-mode convolution with a square kernel
    Conv {
        /// Kernel side length
        kernel: usize,
    },
    /// Matrix-vector product
    Dense,
}

/// Explicit configuration of one emulated layer
///
/// Built from the [`lenet_chip::layers`] constants with
/// [`LayerConfig::from_geometry`] or by hand for custom geometries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerConfig {
    /// Layer name (init file prefix)
    pub name: String,
    /// Compute kind
    pub kind: LayerKind,
    /// Input channels or features
    pub in_channels: usize,
    /// Output channels or features
    pub out_channels: usize,
    /// Unpadded input rows
    pub in_rows: usize,
    /// Unpadded input columns
    pub in_cols: usize,
    /// Zero border width
    pub padding: usize,
    /// ReLU stage enabled
    pub relu: bool,
    /// Pool stage enabled
    pub pool: bool,
    /// Requantizer shift
    pub shift: u32,
    /// Fixed-point format of the weights
    pub weight_format: FixedPointFormat,
}

impl LayerConfig {
    /// Configuration of a fixed LeNet-5 layer
    pub fn from_geometry(geometry: &LayerGeometry) -> Self {
        let kind = match geometry.shape {
            LayerShape::Conv { kernel } => LayerKind::Conv { kernel },
            LayerShape::Dense => LayerKind::Dense,
        };
        Self {
            name: geometry.name.to_string(),
            kind,
            in_channels: geometry.in_channels,
            out_channels: geometry.out_channels,
            in_rows: geometry.in_rows,
            in_cols: geometry.in_cols,
            padding: geometry.padding,
            relu: geometry.relu,
            pool: geometry.pool,
            shift: geometry.shift,
            weight_format: FixedPointFormat::new(8, geometry.weight_frac_bits),
        }
    }

    /// Convolution with ReLU, no padding, no pooling and the default shift
    pub fn conv(
        name: impl Into<String>,
        in_channels: usize,
        out_channels: usize,
        kernel: usize,
        in_rows: usize,
        in_cols: usize,
    ) -> Self {
        Self {
            name: name.into(),
            kind: LayerKind::Conv { kernel },
            in_channels,
            out_channels,
            in_rows,
            in_cols,
            padding: 0,
            relu: true,
            pool: false,
            shift: QUANT_SHIFT,
            weight_format: FixedPointFormat::Q7,
        }
    }

    /// Dense layer with ReLU and the default shift
    pub fn dense(name: impl Into<String>, inputs: usize, outputs: usize) -> Self {
        Self {
            name: name.into(),
            kind: LayerKind::Dense,
            in_channels: inputs,
            out_channels: outputs,
            in_rows: 1,
            in_cols: 1,
            padding: 0,
            relu: true,
            pool: false,
            shift: QUANT_SHIFT,
            weight_format: FixedPointFormat::Q6,
        }
    }

    /// Set the zero border
    #[must_use]
    pub fn with_padding(mut self, padding: usize) -> Self {
        self.padding = padding;
        self
    }

    /// Enable or disable ReLU
    #[must_use]
    pub fn with_relu(mut self, relu: bool) -> Self {
        self.relu = relu;
        self
    }

    /// Set the requantizer shift
    #[must_use]
    pub fn with_shift(mut self, shift: u32) -> Self {
        self.shift = shift;
        self
    }

    /// Input rows and columns after padding
    pub fn padded_dims(&self) -> (usize, usize) {
        (
            self.in_rows + 2 * self.padding,
            self.in_cols + 2 * self.padding,
        )
    }

    /// Rows and columns of the accumulator tensor
    pub fn conv_dims(&self) -> (usize, usize) {
        let (rows, cols) = self.padded_dims();
        match self.kind {
            LayerKind::Conv { kernel } => (
                rows.saturating_sub(kernel) + 1,
                cols.saturating_sub(kernel) + 1,
            ),
            LayerKind::Dense => (1, 1),
        }
    }

    /// Rows and columns of the layer output
    pub fn output_dims(&self) -> (usize, usize) {
        let (rows, cols) = self.conv_dims();
        if self.pool {
            (rows / 2, cols / 2)
        } else {
            (rows, cols)
        }
    }

    /// Elements of the layer output
    pub fn output_len(&self) -> usize {
        let (rows, cols) = self.output_dims();
        self.out_channels * rows * cols
    }

    /// Products summed into one accumulator
    pub fn fan_in(&self) -> usize {
        match self.kind {
            LayerKind::Conv { kernel } => self.in_channels * kernel * kernel,
            LayerKind::Dense => self.in_channels,
        }
    }

    /// Expected weight shape and order
    pub fn weight_layout(&self) -> (Shape, AxisOrder) {
        match self.kind {
            LayerKind::Conv { kernel } => (
                Shape::from([self.out_channels, self.in_channels, kernel, kernel]),
                AxisOrder::Kcrs,
            ),
            LayerKind::Dense => (
                Shape::from([self.out_channels, self.in_channels]),
                AxisOrder::Matrix,
            ),
        }
    }

    /// Expected (padded) input shape and order of [`LayerEmulator::run`]
    pub fn input_layout(&self) -> (Shape, AxisOrder) {
        match self.kind {
            LayerKind::Conv { .. } => {
                let (rows, cols) = self.padded_dims();
                (Shape::from([self.in_channels, rows, cols]), AxisOrder::Chw)
            }
            LayerKind::Dense => (Shape::from([self.in_channels]), AxisOrder::Linear),
        }
    }

    /// Check the geometry is realizable
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.in_channels == 0 || self.out_channels == 0 {
            return Err(GoldenError::invalid_config(format!(
                "{}: channel counts must be non-zero",
                self.name
            )));
        }
        match self.kind {
            LayerKind::Conv { kernel } => {
                let (rows, cols) = self.padded_dims();
                if kernel == 0 || kernel > rows || kernel > cols {
                    return Err(GoldenError::invalid_config(format!(
                        "{}: kernel {kernel} does not fit {rows}x{cols} input",
                        self.name
                    )));
                }
            }
            LayerKind::Dense => {
                if self.padding != 0 || self.pool {
                    return Err(GoldenError::invalid_config(format!(
                        "{}: dense layers take no padding or pooling",
                        self.name
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Every stage tensor of one layer evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoldenRecord {
    /// Layer name
    pub layer: String,
    /// Multiply-accumulate sums (32-bit)
    pub accumulated: Tensor,
    /// Sums plus bias (32-bit)
    pub biased: Tensor,
    /// After activation (32-bit)
    pub activated: Tensor,
    /// After pooling (32-bit)
    pub pooled: Tensor,
    /// Requantized output (8-bit)
    pub quantized: Tensor,
}

impl GoldenRecord {
    /// Tensor of a named stage
    pub fn stage(&self, stage: Stage) -> &Tensor {
        match stage {
            Stage::Accumulated => &self.accumulated,
            Stage::Biased => &self.biased,
            Stage::Activated => &self.activated,
            Stage::Pooled => &self.pooled,
            Stage::Quantized => &self.quantized,
        }
    }

    /// Final layer output
    pub fn output(&self) -> &Tensor {
        &self.quantized
    }

    /// Stages with their tensors, in pipeline order
    pub fn stages(&self) -> impl Iterator<Item = (Stage, &Tensor)> {
        Stage::ALL.into_iter().map(move |stage| (stage, self.stage(stage)))
    }
}

/// A golden record plus the padded input the layer consumed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerTrace {
    /// Input after [`pad_input`]
    pub padded_input: Tensor,
    /// Stage tensors
    pub record: GoldenRecord,
}

/// One configured layer with its quantized parameters
#[derive(Debug, Clone)]
pub struct LayerEmulator {
    config: LayerConfig,
    weights: Tensor,
    bias: Tensor,
}

impl LayerEmulator {
    /// Create an emulator
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for an unrealizable geometry, non-8-bit
    /// weights, or when `fan_in × 128 × 128 + max|bias|` would not fit a
    /// 32-bit accumulator, and `ShapeMismatch` when weight or bias shapes
    /// disagree with the configuration.
    pub fn new(config: LayerConfig, weights: Tensor, bias: Tensor) -> Result<Self> {
        config.validate()?;

        let (weight_shape, weight_order) = config.weight_layout();
        if weights.shape() != &weight_shape || weights.order() != weight_order {
            return Err(GoldenError::shape_mismatch(
                format!("{} weights", config.name),
                format!("{weight_order:?} {weight_shape}"),
                format!("{:?} {}", weights.order(), weights.shape()),
            ));
        }
        if weights.width() != BitWidth::W8 {
            return Err(GoldenError::invalid_config(format!(
                "{}: weights must be 8-bit",
                config.name
            )));
        }
        if bias.order() != AxisOrder::Linear || bias.dims() != [config.out_channels] {
            return Err(GoldenError::shape_mismatch(
                format!("{} bias", config.name),
                format!("Linear [{}]", config.out_channels),
                format!("{:?} {}", bias.order(), bias.shape()),
            ));
        }

        let max_product = i64::from(INT8_MIN) * i64::from(INT8_MIN);
        let max_bias = bias
            .data()
            .iter()
            .map(|&b| i64::from(b).abs())
            .max()
            .unwrap_or(0);
        let fan_in = i64::try_from(config.fan_in()).unwrap_or(i64::MAX);
        let bound = fan_in.saturating_mul(max_product).saturating_add(max_bias);
        if bound > i64::from(i32::MAX) {
            return Err(GoldenError::invalid_config(format!(
                "{}: worst-case accumulator {bound} exceeds 32 bits (fan-in {fan_in}, max |bias| {max_bias})",
                config.name
            )));
        }

        debug!(
            "{}: {:?}, fan-in {}, accumulator bound {}",
            config.name,
            config.kind,
            config.fan_in(),
            bound
        );
        Ok(Self {
            config,
            weights,
            bias,
        })
    }

    /// Layer configuration
    pub fn config(&self) -> &LayerConfig {
        &self.config
    }

    /// Quantized weights
    pub fn weights(&self) -> &Tensor {
        &self.weights
    }

    /// Quantized bias
    pub fn bias(&self) -> &Tensor {
        &self.bias
    }

    /// Run the five stages on an already padded input
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` if `input` is not at the padded input shape.
    pub fn run(&self, input: &Tensor) -> Result<GoldenRecord> {
        let (shape, order) = self.config.input_layout();
        if input.shape() != &shape || input.order() != order {
            return Err(GoldenError::shape_mismatch(
                format!("{} input", self.config.name),
                format!("{order:?} {shape}"),
                format!("{:?} {}", input.order(), input.shape()),
            ));
        }

        let accumulated = match self.config.kind {
            LayerKind::Conv { .. } => conv_accumulate(input, &self.weights)?,
            LayerKind::Dense => dense_accumulate(input, &self.weights)?,
        };
        let biased = bias_add(&accumulated, &self.bias)?;
        let activated = activate(&biased, Activation::from_relu(self.config.relu))?;
        let pooled = if self.config.pool {
            max_pool_2x2(&activated)?
        } else {
            activated.clone()
        };
        let quantized = requantize(&pooled, self.config.shift)?;

        info!(
            "{}: {} -> {} (relu={}, pool={}, shift={})",
            self.config.name,
            input.shape(),
            quantized.shape(),
            self.config.relu,
            self.config.pool,
            self.config.shift
        );
        Ok(GoldenRecord {
            layer: self.config.name.clone(),
            accumulated,
            biased,
            activated,
            pooled,
            quantized,
        })
    }

    /// Pad `input` and run, keeping the padded input
    ///
    /// # Errors
    ///
    /// See [`pad_input`] and [`LayerEmulator::run`].
    pub fn trace(&self, input: &Tensor) -> Result<LayerTrace> {
        let padded_input = match self.config.kind {
            LayerKind::Conv { .. } => pad_input(input, self.config.padding)?,
            LayerKind::Dense => input.clone(),
        };
        let record = self.run(&padded_input)?;
        Ok(LayerTrace {
            padded_input,
            record,
        })
    }
}

/// Surround every channel with `padding` rows and columns of zeros
///
/// # Errors
///
/// Returns `InvalidConfig` if `input` is not a feature map.
pub fn pad_input(input: &Tensor, padding: usize) -> Result<Tensor> {
    let chw = input.to_order(AxisOrder::Chw)?;
    if padding == 0 {
        return Ok(chw);
    }
    let (channels, rows, cols) = chw
        .feature_dims()
        .ok_or_else(|| GoldenError::invalid_config("padding needs a feature map"))?;
    let padded = [channels, rows + 2 * padding, cols + 2 * padding];
    Tensor::from_fn(padded, AxisOrder::Chw, chw.width(), |i| {
        let (r, c) = (i[1], i[2]);
        if r < padding || c < padding || r >= rows + padding || c >= cols + padding {
            0
        } else {
            i64::from(chw.data()[(i[0] * rows + r - padding) * cols + c - padding])
        }
    })
}

/// Valid-mode convolution: `[C, H, W] ⊛ [K, C, R, S] → [K, H-R+1, W-S+1]`
///
/// # Errors
///
/// Returns `ShapeMismatch` if the channel counts disagree or the kernel is
/// larger than the input, and `RangeViolation` if a sum leaves 32 bits.
pub fn conv_accumulate(input: &Tensor, weights: &Tensor) -> Result<Tensor> {
    let (channels, rows, cols) = input
        .feature_dims()
        .ok_or_else(|| GoldenError::invalid_config("convolution input must be a feature map"))?;
    let input = input.to_order(AxisOrder::Chw)?;
    let &[kernels, kernel_channels, kr, ks] = weights.dims() else {
        return Err(GoldenError::shape_mismatch("conv weights", "rank 4", weights.shape()));
    };
    if kernel_channels != channels || kr > rows || ks > cols {
        return Err(GoldenError::shape_mismatch(
            "convolution",
            format!("kernel [{kernels}, {channels}, <={rows}, <={cols}]"),
            weights.shape(),
        ));
    }

    let (out_rows, out_cols) = (rows - kr + 1, cols - ks + 1);
    let x = input.data();
    let w = weights.data();
    let mut data = Vec::with_capacity(kernels * out_rows * out_cols);
    for k in 0..kernels {
        for y in 0..out_rows {
            for xo in 0..out_cols {
                let mut sum: i64 = 0;
                for c in 0..channels {
                    for r in 0..kr {
                        for s in 0..ks {
                            let pixel = x[(c * rows + y + r) * cols + xo + s];
                            let tap = w[((k * channels + c) * kr + r) * ks + s];
                            sum += i64::from(pixel) * i64::from(tap);
                        }
                    }
                }
                data.push(narrow_accumulator(sum)?);
            }
        }
    }
    Tensor::new([kernels, out_rows, out_cols], AxisOrder::Chw, BitWidth::W32, data)
}

/// Matrix-vector product: `[O, I] · [I] → [O]`
///
/// # Errors
///
/// Returns `ShapeMismatch` if the dimensions disagree and `RangeViolation`
/// if a sum leaves 32 bits.
pub fn dense_accumulate(input: &Tensor, weights: &Tensor) -> Result<Tensor> {
    let &[outputs, inputs] = weights.dims() else {
        return Err(GoldenError::shape_mismatch("dense weights", "rank 2", weights.shape()));
    };
    if input.len() != inputs {
        return Err(GoldenError::shape_mismatch(
            "dense input",
            format!("{inputs} features"),
            format!("{} features", input.len()),
        ));
    }
    let x = input.data();
    let data = weights
        .data()
        .chunks(inputs.max(1))
        .take(outputs)
        .map(|row| {
            let sum: i64 = row
                .iter()
                .zip(x)
                .map(|(&w, &v)| i64::from(w) * i64::from(v))
                .sum();
            narrow_accumulator(sum)
        })
        .collect::<Result<Vec<_>>>()?;
    Tensor::new([outputs], AxisOrder::Linear, BitWidth::W32, data)
}

/// Add one bias per channel (`Chw`) or per feature (`Linear`)
///
/// # Errors
///
/// Returns `ShapeMismatch` if the bias length differs from the channel
/// count and `RangeViolation` if a sum leaves 32 bits.
pub fn bias_add(acc: &Tensor, bias: &Tensor) -> Result<Tensor> {
    let (channels, plane) = match acc.order() {
        AxisOrder::Chw => (acc.dims()[0], acc.dims()[1] * acc.dims()[2]),
        AxisOrder::Linear => (acc.len(), 1),
        other => {
            return Err(GoldenError::invalid_config(format!(
                "bias add on {other:?} tensor"
            )))
        }
    };
    if bias.len() != channels {
        return Err(GoldenError::shape_mismatch(
            "bias add",
            format!("{channels} biases"),
            format!("{} biases", bias.len()),
        ));
    }
    let data = acc
        .data()
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            let b = bias.data()[i / plane.max(1)];
            narrow_accumulator(i64::from(v) + i64::from(b))
        })
        .collect::<Result<Vec<_>>>()?;
    Tensor::new(acc.shape().clone(), acc.order(), BitWidth::W32, data)
}

/// Element-wise activation
///
/// # Errors
///
/// Never fails for a 32-bit input; errors are propagated from construction.
pub fn activate(t: &Tensor, activation: Activation) -> Result<Tensor> {
    let data = t.data().iter().map(|&v| activation.apply(v)).collect();
    Tensor::new(t.shape().clone(), t.order(), t.width(), data)
}

/// Non-overlapping 2×2 max pool, stride 2, output `floor(dim / 2)`
///
/// # Errors
///
/// Returns `InvalidConfig` if `t` is not a feature map.
pub fn max_pool_2x2(t: &Tensor) -> Result<Tensor> {
    let t = t.to_order(AxisOrder::Chw)?;
    let (channels, rows, cols) = t
        .feature_dims()
        .ok_or_else(|| GoldenError::invalid_config("pooling needs a feature map"))?;
    let (out_rows, out_cols) = (rows / 2, cols / 2);
    let x = t.data();
    Tensor::from_fn(
        [channels, out_rows, out_cols],
        AxisOrder::Chw,
        t.width(),
        |i| {
            let (c, y, xo) = (i[0], 2 * i[1], 2 * i[2]);
            let at = |r: usize, s: usize| x[(c * rows + r) * cols + s];
            let max = at(y, xo)
                .max(at(y, xo + 1))
                .max(at(y + 1, xo))
                .max(at(y + 1, xo + 1));
            i64::from(max)
        },
    )
}

/// Arithmetic right shift by `shift`, then saturate to int8
///
/// # Errors
///
/// Never fails; errors are propagated from construction.
pub fn requantize(t: &Tensor, shift: u32) -> Result<Tensor> {
    let data = t
        .data()
        .iter()
        .map(|&v| i32::from(fixed::requantize(v, shift, Activation::Identity)))
        .collect();
    Tensor::new(t.shape().clone(), t.order(), BitWidth::W8, data)
}

fn narrow_accumulator(sum: i64) -> Result<i32> {
    i32::try_from(sum).map_err(|_| GoldenError::range_violation(sum, 32))
}

/// The full network: conv1 → conv2 → flatten → fc1 → fc2 → fc3
#[derive(Debug, Clone)]
pub struct LenetNetwork {
    layers: Vec<LayerEmulator>,
}

impl LenetNetwork {
    /// Chain layers, checking each output feeds the next input
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` naming the first pair that does not chain.
    pub fn new(layers: Vec<LayerEmulator>) -> Result<Self> {
        for pair in layers.windows(2) {
            let (prev, next) = (pair[0].config(), pair[1].config());
            let (rows, cols) = prev.output_dims();
            let chains = match next.kind {
                LayerKind::Conv { .. } => {
                    (prev.out_channels, rows, cols) == (next.in_channels, next.in_rows, next.in_cols)
                        && !matches!(prev.kind, LayerKind::Dense)
                }
                LayerKind::Dense => prev.output_len() == next.in_channels,
            };
            if !chains {
                return Err(GoldenError::shape_mismatch(
                    format!("{} -> {}", prev.name, next.name),
                    format!("{} inputs", next.in_channels * next.in_rows * next.in_cols),
                    format!("{} outputs ({}x{rows}x{cols})", prev.output_len(), prev.out_channels),
                ));
            }
        }
        Ok(Self { layers })
    }

    /// Layers in execution order
    pub fn layers(&self) -> &[LayerEmulator] {
        &self.layers
    }

    /// Layer by name
    pub fn layer(&self, name: &str) -> Option<&LayerEmulator> {
        self.layers.iter().find(|l| l.config().name == name)
    }

    /// Evaluate every layer on an unpadded image
    ///
    /// Feature maps entering a dense layer are flattened channel-major.
    ///
    /// # Errors
    ///
    /// Propagates the first layer error.
    pub fn run(&self, image: &Tensor) -> Result<Vec<LayerTrace>> {
        let mut traces: Vec<LayerTrace> = Vec::with_capacity(self.layers.len());
        for layer in &self.layers {
            let previous = traces.last().map(|t| t.record.output());
            let input = previous.unwrap_or(image);
            let input = match layer.config().kind {
                LayerKind::Dense if input.order() != AxisOrder::Linear => {
                    let chw = input.to_order(AxisOrder::Chw)?;
                    chw.reshaped([chw.len()], AxisOrder::Linear)?
                }
                _ => input.clone(),
            };
            traces.push(layer.trace(&input)?);
        }
        Ok(traces)
    }

    /// Index of the largest logit (first on ties)
    ///
    /// # Errors
    ///
    /// Propagates layer errors; `InvalidConfig` if the network is empty.
    pub fn classify(&self, image: &Tensor) -> Result<usize> {
        let traces = self.run(image)?;
        let logits = traces
            .last()
            .ok_or_else(|| GoldenError::invalid_config("network has no layers"))?
            .record
            .output();
        let best = argmax(logits)
            .ok_or_else(|| GoldenError::invalid_config("network produced no logits"))?;
        debug!("logits {:?} -> class {best}", logits.data());
        Ok(best)
    }
}

/// Offset of the largest element, first on ties; `None` when empty
pub fn argmax(t: &Tensor) -> Option<usize> {
    let data = t.data();
    let mut best = None;
    for (i, &v) in data.iter().enumerate() {
        match best {
            Some(b) if data[b] >= v => {}
            _ => best = Some(i),
        }
    }
    best
}
