// SPDX-License-Identifier: AGPL-3.0-only

//! Layout codec: tensors ⇄ packed hardware buffer words
//!
//! Every on-chip buffer stores one wide word per address. A word is
//! `lane_count` lanes of `lane_bits` each; lane 0 is the least-significant
//! lane (see [`lenet_chip::lanes`]). Channel counts larger than the lane
//! count are split into reload passes by [`pack_multipass`], and every
//! file layout below iterates passes outermost so that the words for one
//! pass are contiguous and precede the words of the next pass.
//!
//! | Layout | Word | Order of words |
//! |--------|------|----------------|
//! | [`encode_conv_weights`] | 6 × 8 bit, one output channel per lane | pass → in ch → r → s |
//! | [`encode_bias`] `Column` | 1 × 32 bit | pass → lane (zero padded) |
//! | [`encode_bias`] `Wide` | 6 × 32 bit | pass |
//! | [`encode_feature_map`] | `lanes` × 8 bit, one channel per lane | pass → row → col |
//! | [`encode_linear`] | 1 × width | row-major |

use std::ops::Range;

use bytes::Bytes;
use lenet_chip::lanes::{BIAS_LANE_BITS, DATA_LANE_BITS, HARDWARE_LANE_ORDER, LANE_COUNT};
use tracing::debug;

use crate::error::{GoldenError, Result};
use crate::fixed;
use crate::tensor::{AxisOrder, BitWidth, Shape, Tensor};

pub use lenet_chip::lanes::LaneOrder;

/// How a logical channel group is serialized into one hardware word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutDescriptor {
    /// Width of one lane (8, 16, 24 or 32)
    pub lane_bits: u32,
    /// Lanes per word
    pub lane_count: usize,
    /// Channel-to-lane assignment
    pub order: LaneOrder,
}

impl LayoutDescriptor {
    /// Weight ROM and feature-map words: 6 × 8 bit.
    pub const WEIGHTS: Self = Self {
        lane_bits: DATA_LANE_BITS,
        lane_count: LANE_COUNT,
        order: HARDWARE_LANE_ORDER,
    };

    /// Bias buffer words: 6 × 32 bit.
    pub const BIASES: Self = Self {
        lane_bits: BIAS_LANE_BITS,
        lane_count: LANE_COUNT,
        order: HARDWARE_LANE_ORDER,
    };

    /// Single-channel image: one byte per line.
    pub const IMAGE: Self = Self {
        lane_bits: DATA_LANE_BITS,
        lane_count: 1,
        order: HARDWARE_LANE_ORDER,
    };

    /// Create a descriptor
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` unless lanes are byte-aligned, at most 32 bits
    /// wide, and there is at least one lane.
    pub fn new(lane_bits: u32, lane_count: usize, order: LaneOrder) -> Result<Self> {
        if lane_bits == 0 || lane_bits > 32 || lane_bits % 8 != 0 {
            return Err(GoldenError::invalid_config(format!(
                "lane width must be 8, 16, 24 or 32 bits, got {lane_bits}"
            )));
        }
        if lane_count == 0 {
            return Err(GoldenError::invalid_config("descriptor needs at least one lane"));
        }
        Ok(Self {
            lane_bits,
            lane_count,
            order,
        })
    }

    /// Same geometry with another lane order
    #[must_use]
    pub const fn with_order(self, order: LaneOrder) -> Self {
        Self { order, ..self }
    }

    /// Word width in bits
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn word_bits(&self) -> u32 {
        self.lane_bits * self.lane_count as u32
    }

    /// Tensor width of one lane
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for lane widths other than 8 or 32.
    pub fn element_width(&self) -> Result<BitWidth> {
        match self.lane_bits {
            8 => Ok(BitWidth::W8),
            32 => Ok(BitWidth::W32),
            other => Err(GoldenError::invalid_config(format!(
                "no tensor width for {other}-bit lanes"
            ))),
        }
    }

    const fn lane_bytes(&self) -> usize {
        (self.lane_bits / 8) as usize
    }
}

/// One packed hardware word of arbitrary width
///
/// Stored little-endian: byte 0 holds bits `[7:0]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WideWord {
    bits: u32,
    bytes: Bytes,
}

impl WideWord {
    /// Word from little-endian bytes
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` if `bytes` is not `bits / 8` long.
    pub fn from_le_bytes(bits: u32, bytes: impl Into<Bytes>) -> Result<Self> {
        let bytes = bytes.into();
        if bits % 8 != 0 || bytes.len() != (bits / 8) as usize {
            return Err(GoldenError::shape_mismatch(
                format!("{bits}-bit word"),
                format!("{} bytes", bits / 8),
                format!("{} bytes", bytes.len()),
            ));
        }
        Ok(Self { bits, bytes })
    }

    /// Parse a hex line (MSB first, no prefix) into a `bits`-wide word
    ///
    /// Shorter text is zero-extended.
    ///
    /// # Errors
    ///
    /// Returns `Parse` for empty text, non-hex characters or text wider than
    /// the word, and `InvalidConfig` if `bits` is not byte-aligned.
    pub fn from_hex(text: &str, bits: u32) -> Result<Self> {
        if bits == 0 || bits % 8 != 0 {
            return Err(GoldenError::invalid_config(format!(
                "word width must be a multiple of 8, got {bits}"
            )));
        }
        let digits = text.trim();
        if digits.is_empty() {
            return Err(GoldenError::parse(0, "empty hex word"));
        }
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(GoldenError::parse(0, format!("invalid hex word '{digits}'")));
        }
        let width = (bits / 4) as usize;
        if digits.len() > width {
            return Err(GoldenError::parse(
                0,
                format!("'{digits}' is wider than {bits} bits"),
            ));
        }
        let padded = format!("{digits:0>width$}");
        let mut bytes = Vec::with_capacity(width / 2);
        for pair in padded.as_bytes().chunks(2).rev() {
            let pair = std::str::from_utf8(pair)
                .map_err(|e| GoldenError::parse(0, format!("invalid hex word: {e}")))?;
            let byte = u8::from_str_radix(pair, 16)
                .map_err(|e| GoldenError::parse(0, format!("invalid hex word '{digits}': {e}")))?;
            bytes.push(byte);
        }
        Self::from_le_bytes(bits, bytes)
    }

    /// Render as zero-padded hex, most-significant digit first
    pub fn to_hex(&self) -> String {
        use std::fmt::Write as _;
        self.bytes.iter().rev().fold(
            String::with_capacity(self.bytes.len() * 2),
            |mut out, b| {
                let _ = write!(out, "{b:02x}");
                out
            },
        )
    }

    /// Word width in bits
    pub fn bits(&self) -> u32 {
        self.bits
    }

    fn raw_lane(&self, lane: usize, lane_bytes: usize) -> u64 {
        self.bytes[lane * lane_bytes..(lane + 1) * lane_bytes]
            .iter()
            .rev()
            .fold(0_u64, |acc, &b| (acc << 8) | u64::from(b))
    }
}

impl std::fmt::Display for WideWord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Pack per-channel values into one wide word
///
/// `values[i]` goes to lane `descriptor.order.lane_of(i)`. Lanes beyond
/// `values.len()` are zero; this is how an incomplete pass is padded.
///
/// # Errors
///
/// Returns `ShapeMismatch` if there are more values than lanes, and
/// `RangeViolation` if a value does not fit the lane width.
pub fn pack_channels(values: &[i32], descriptor: &LayoutDescriptor) -> Result<WideWord> {
    if values.len() > descriptor.lane_count {
        return Err(GoldenError::shape_mismatch(
            "packed word",
            format!("at most {} lanes", descriptor.lane_count),
            format!("{} values", values.len()),
        ));
    }
    let lane_bytes = descriptor.lane_bytes();
    let mut bytes = vec![0_u8; lane_bytes * descriptor.lane_count];
    for (channel, &value) in values.iter().enumerate() {
        if !fixed::fits(i64::from(value), descriptor.lane_bits) {
            return Err(GoldenError::range_violation(
                i64::from(value),
                descriptor.lane_bits,
            ));
        }
        let lane = descriptor.order.lane_of(channel, descriptor.lane_count);
        bytes[lane * lane_bytes..(lane + 1) * lane_bytes]
            .copy_from_slice(&value.to_le_bytes()[..lane_bytes]);
    }
    WideWord::from_le_bytes(descriptor.word_bits(), bytes)
}

/// Split a wide word into per-channel signed values (channel order)
///
/// # Errors
///
/// Returns `ShapeMismatch` if the word width disagrees with the descriptor.
pub fn unpack(word: &WideWord, descriptor: &LayoutDescriptor) -> Result<Vec<i32>> {
    if word.bits() != descriptor.word_bits() {
        return Err(GoldenError::shape_mismatch(
            "unpacked word",
            format!("{} bits", descriptor.word_bits()),
            format!("{} bits", word.bits()),
        ));
    }
    let lane_bytes = descriptor.lane_bytes();
    #[allow(clippy::cast_possible_truncation)]
    let lanes = (0..descriptor.lane_count)
        .map(|channel| {
            let lane = descriptor.order.lane_of(channel, descriptor.lane_count);
            fixed::sign_extend(word.raw_lane(lane, lane_bytes), descriptor.lane_bits) as i32
        })
        .collect();
    Ok(lanes)
}

/// One buffer reload: a consecutive channel range mapped onto the lanes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassGroup {
    /// Position in reload order (also the word index of wide bias words)
    pub index: usize,
    /// Channels carried by this pass
    pub channels: Range<usize>,
    /// Lanes per word
    pub lanes: usize,
}

impl PassGroup {
    /// Channels in this pass
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// True if the pass carries no channels
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Zero lanes at the top of each word of this pass
    pub fn padding(&self) -> usize {
        self.lanes - self.channels.len()
    }
}

/// Group `channels` into consecutive passes of `lanes_per_word`
///
/// The returned order is the reload order: every pass's weight and bias
/// reload precedes its compute pass, and passes run in this order.
///
/// # Errors
///
/// Returns `InvalidConfig` if `lanes_per_word` is zero.
pub fn pack_multipass(channels: usize, lanes_per_word: usize) -> Result<Vec<PassGroup>> {
    if lanes_per_word == 0 {
        return Err(GoldenError::invalid_config("pass grouping needs at least one lane"));
    }
    Ok((0..channels)
        .step_by(lanes_per_word)
        .enumerate()
        .map(|(index, start)| PassGroup {
            index,
            channels: start..(start + lanes_per_word).min(channels),
            lanes: lanes_per_word,
        })
        .collect())
}

/// Scalars of `tensor` in the scan order of `order`
///
/// # Errors
///
/// Returns `InvalidConfig` if the tensor cannot be viewed in `order`.
pub fn flatten(tensor: &Tensor, order: AxisOrder) -> Result<Vec<i32>> {
    if order == tensor.order() {
        return Ok(tensor.data().to_vec());
    }
    Ok(tensor.to_order(order)?.into_data())
}

/// Rebuild a tensor from scalars laid out row-major in `order`
///
/// # Errors
///
/// Returns `ShapeMismatch` with expected and actual counts when the scalar
/// count disagrees with `shape`; nothing is truncated or padded.
pub fn reshape(
    scalars: Vec<i32>,
    shape: impl Into<Shape>,
    order: AxisOrder,
    width: BitWidth,
) -> Result<Tensor> {
    Tensor::new(shape, order, width, scalars)
}

/// Encode `[K, C, R, S]` conv weights into weight ROM words
///
/// Output channels are spread over the lanes, one pass per lane group;
/// within a pass words run input channel → kernel row → kernel column.
///
/// # Errors
///
/// Returns `InvalidConfig` if the tensor is not `Kcrs`.
pub fn encode_conv_weights(weights: &Tensor, descriptor: &LayoutDescriptor) -> Result<Vec<WideWord>> {
    if weights.order() != AxisOrder::Kcrs {
        return Err(GoldenError::invalid_config(format!(
            "conv weights must be Kcrs, got {:?}",
            weights.order()
        )));
    }
    let &[k, c, r, s] = weights.dims() else {
        return Err(GoldenError::shape_mismatch("conv weights", "rank 4", weights.shape()));
    };
    let data = weights.data();
    let mut words = Vec::with_capacity(pass_words(k, descriptor) * c * r * s);
    for pass in pack_multipass(k, descriptor.lane_count)? {
        debug!(
            "weight pass {}: out channels {:?} ({} padding lanes)",
            pass.index,
            pass.channels,
            pass.padding()
        );
        for ci in 0..c {
            for ri in 0..r {
                for si in 0..s {
                    let values: Vec<i32> = pass
                        .channels
                        .clone()
                        .map(|ki| data[((ki * c + ci) * r + ri) * s + si])
                        .collect();
                    words.push(pack_channels(&values, descriptor)?);
                }
            }
        }
    }
    Ok(words)
}

/// Decode weight ROM words back into `[K, C, kernel, kernel]` weights
///
/// # Errors
///
/// Returns `ShapeMismatch` if the word count disagrees with the geometry and
/// `Parse` if a padding lane is non-zero.
pub fn decode_conv_weights(
    words: &[WideWord],
    out_channels: usize,
    in_channels: usize,
    kernel: usize,
    descriptor: &LayoutDescriptor,
) -> Result<Tensor> {
    let taps = in_channels * kernel * kernel;
    let expected = pass_words(out_channels, descriptor) * taps;
    if words.len() != expected {
        return Err(GoldenError::shape_mismatch(
            format!("conv weights {out_channels}x{in_channels}x{kernel}x{kernel}"),
            format!("{expected} words"),
            format!("{} words", words.len()),
        ));
    }
    let mut data = vec![0; out_channels * taps];
    let mut next = words.iter().enumerate();
    for pass in pack_multipass(out_channels, descriptor.lane_count)? {
        for tap in 0..taps {
            let Some((line, word)) = next.next() else {
                break;
            };
            let lanes = unpack_pass(word, descriptor, &pass, line)?;
            for (ki, value) in pass.channels.clone().zip(lanes) {
                data[ki * taps + tap] = value;
            }
        }
    }
    Tensor::new(
        [out_channels, in_channels, kernel, kernel],
        AxisOrder::Kcrs,
        descriptor.element_width()?,
        data,
    )
}

/// Serialization of a bias vector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BiasFormat {
    /// One lane-width value per line, each pass padded to the lane count
    Column,
    /// One full bias word per pass
    Wide,
}

/// Encode a bias vector for the bias buffer
///
/// # Errors
///
/// Returns `InvalidConfig` if the tensor is not `Linear` and
/// `RangeViolation` if a bias does not fit the lane width.
pub fn encode_bias(
    bias: &Tensor,
    descriptor: &LayoutDescriptor,
    format: BiasFormat,
) -> Result<Vec<WideWord>> {
    if bias.order() != AxisOrder::Linear {
        return Err(GoldenError::invalid_config(format!(
            "bias must be Linear, got {:?}",
            bias.order()
        )));
    }
    let column = LayoutDescriptor {
        lane_count: 1,
        ..*descriptor
    };
    let mut words = Vec::new();
    for pass in pack_multipass(bias.len(), descriptor.lane_count)? {
        let values = &bias.data()[pass.channels.clone()];
        match format {
            BiasFormat::Wide => words.push(pack_channels(values, descriptor)?),
            BiasFormat::Column => {
                for slot in 0..pass.lanes {
                    let value = values.get(slot).copied().unwrap_or(0);
                    words.push(pack_channels(&[value], &column)?);
                }
            }
        }
    }
    Ok(words)
}

/// Decode bias words into a `channels`-long vector
///
/// # Errors
///
/// Returns `ShapeMismatch` if the word count disagrees with the pass
/// grouping and `Parse` if a padding slot is non-zero.
pub fn decode_bias(
    words: &[WideWord],
    channels: usize,
    descriptor: &LayoutDescriptor,
    format: BiasFormat,
) -> Result<Tensor> {
    let passes = pack_multipass(channels, descriptor.lane_count)?;
    let expected = match format {
        BiasFormat::Wide => passes.len(),
        BiasFormat::Column => passes.len() * descriptor.lane_count,
    };
    if words.len() != expected {
        return Err(GoldenError::shape_mismatch(
            format!("bias for {channels} channels ({format:?})"),
            format!("{expected} words"),
            format!("{} words", words.len()),
        ));
    }
    let mut data = Vec::with_capacity(channels);
    match format {
        BiasFormat::Wide => {
            for (pass, word) in passes.iter().zip(words) {
                data.extend(unpack_pass(word, descriptor, pass, pass.index)?);
            }
        }
        BiasFormat::Column => {
            let column = LayoutDescriptor {
                lane_count: 1,
                ..*descriptor
            };
            for pass in &passes {
                let base = pass.index * descriptor.lane_count;
                for slot in 0..descriptor.lane_count {
                    let value = unpack(&words[base + slot], &column)?[0];
                    if slot < pass.len() {
                        data.push(value);
                    } else if value != 0 {
                        return Err(GoldenError::parse(
                            base + slot + 1,
                            format!("padding slot of pass {} holds {value}", pass.index),
                        ));
                    }
                }
            }
        }
    }
    Tensor::new([channels], AxisOrder::Linear, descriptor.element_width()?, data)
}

/// Encode a feature map: pass-major, then raster order, one word per pixel
///
/// # Errors
///
/// Returns `InvalidConfig` if the tensor is not a feature map and
/// `RangeViolation` if a value does not fit the lane width.
pub fn encode_feature_map(tensor: &Tensor, descriptor: &LayoutDescriptor) -> Result<Vec<WideWord>> {
    let chw = tensor.to_order(AxisOrder::Chw)?;
    let (channels, rows, cols) = chw
        .feature_dims()
        .ok_or_else(|| GoldenError::invalid_config("feature map must be Chw or Hwc"))?;
    let data = chw.data();
    let plane = rows * cols;
    let mut words = Vec::with_capacity(pass_words(channels, descriptor) * plane);
    for pass in pack_multipass(channels, descriptor.lane_count)? {
        for pixel in 0..plane {
            let values: Vec<i32> = pass
                .channels
                .clone()
                .map(|ch| data[ch * plane + pixel])
                .collect();
            words.push(pack_channels(&values, descriptor)?);
        }
    }
    Ok(words)
}

/// Decode feature-map words into a `Chw` tensor
///
/// # Errors
///
/// Returns `ShapeMismatch` if the word count disagrees with the geometry.
pub fn decode_feature_map(
    words: &[WideWord],
    channels: usize,
    rows: usize,
    cols: usize,
    descriptor: &LayoutDescriptor,
) -> Result<Tensor> {
    let plane = rows * cols;
    let expected = pass_words(channels, descriptor) * plane;
    if words.len() != expected {
        return Err(GoldenError::shape_mismatch(
            format!("feature map {channels}x{rows}x{cols}"),
            format!("{expected} words"),
            format!("{} words", words.len()),
        ));
    }
    let mut data = vec![0; channels * plane];
    let passes = pack_multipass(channels, descriptor.lane_count)?;
    for (pass, chunk) in passes.iter().zip(words.chunks(plane)) {
        for (pixel, word) in chunk.iter().enumerate() {
            let line = pass.index * plane + pixel;
            let lanes = unpack_pass(word, descriptor, pass, line)?;
            for (ch, value) in pass.channels.clone().zip(lanes) {
                data[ch * plane + pixel] = value;
            }
        }
    }
    Tensor::new(
        [channels, rows, cols],
        AxisOrder::Chw,
        descriptor.element_width()?,
        data,
    )
}

/// Encode every element as its own word (row-major), at the tensor's width
///
/// # Errors
///
/// Never fails for a valid tensor; errors are propagated from packing.
pub fn encode_linear(tensor: &Tensor) -> Result<Vec<WideWord>> {
    let descriptor = LayoutDescriptor::new(tensor.width().bits(), 1, HARDWARE_LANE_ORDER)?;
    tensor
        .data()
        .iter()
        .map(|&v| pack_channels(&[v], &descriptor))
        .collect()
}

/// Decode one-value-per-word data into a tensor of `shape`
///
/// # Errors
///
/// Returns `ShapeMismatch` with expected vs. actual counts.
pub fn decode_linear(
    words: &[WideWord],
    shape: impl Into<Shape>,
    order: AxisOrder,
    width: BitWidth,
) -> Result<Tensor> {
    let shape = shape.into();
    if words.len() != shape.total_elements() {
        return Err(GoldenError::shape_mismatch(
            format!("linear data {shape}"),
            format!("{} words", shape.total_elements()),
            format!("{} words", words.len()),
        ));
    }
    let descriptor = LayoutDescriptor::new(width.bits(), 1, HARDWARE_LANE_ORDER)?;
    let scalars = words
        .iter()
        .map(|w| unpack(w, &descriptor).map(|lanes| lanes[0]))
        .collect::<Result<Vec<_>>>()?;
    reshape(scalars, shape, order, width)
}

fn pass_words(channels: usize, descriptor: &LayoutDescriptor) -> usize {
    lenet_chip::lanes::pass_count(channels, descriptor.lane_count)
}

/// Unpack a word belonging to `pass`, returning only its live channels
fn unpack_pass(
    word: &WideWord,
    descriptor: &LayoutDescriptor,
    pass: &PassGroup,
    line: usize,
) -> Result<Vec<i32>> {
    let mut lanes = unpack(word, descriptor)?;
    if lanes[pass.len()..].iter().any(|&v| v != 0) {
        return Err(GoldenError::parse(
            line + 1,
            format!("padding lanes of pass {} are not zero", pass.index),
        ));
    }
    lanes.truncate(pass.len());
    Ok(lanes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn kcrs(k: usize, c: usize, r: usize) -> Tensor {
        Tensor::from_fn([k, c, r, r], AxisOrder::Kcrs, BitWidth::W8, |i| {
            ((i[0] * 31 + i[1] * 7 + i[2] * 5 + i[3]) % 256) as i64 - 128
        })
        .unwrap()
    }

    #[test]
    fn channel_zero_is_least_significant_lane() {
        let word = pack_channels(&[1, 2, 3, 4, 5, 6], &LayoutDescriptor::WEIGHTS).unwrap();
        assert_eq!(word.to_hex(), "060504030201");
        let reversed = LayoutDescriptor::WEIGHTS.with_order(LaneOrder::MsbFirst);
        let word = pack_channels(&[1, 2, 3, 4, 5, 6], &reversed).unwrap();
        assert_eq!(word.to_hex(), "010203040506");
    }

    #[test]
    fn negative_lanes_are_twos_complement() {
        let word = pack_channels(&[-1, 0, -128], &LayoutDescriptor::WEIGHTS).unwrap();
        assert_eq!(word.to_hex(), "0000008000ff");
        assert_eq!(unpack(&word, &LayoutDescriptor::WEIGHTS).unwrap(), vec![-1, 0, -128, 0, 0, 0]);
    }

    #[test]
    fn pack_rejects_overflowing_lane() {
        let err = pack_channels(&[200], &LayoutDescriptor::WEIGHTS).unwrap_err();
        assert!(matches!(err, GoldenError::RangeViolation { value: 200, bits: 8 }));
        assert!(pack_channels(&[0; 7], &LayoutDescriptor::WEIGHTS).is_err());
    }

    #[test]
    fn wide_bias_word_is_192_bits() {
        let word = pack_channels(&[-164, 1], &LayoutDescriptor::BIASES).unwrap();
        assert_eq!(word.bits(), 192);
        assert_eq!(word.to_hex().len(), 48);
        assert!(word.to_hex().ends_with("00000001ffffff5c"));
    }

    #[test]
    fn hex_word_parse() {
        let word = WideWord::from_hex("fe0102030405", 48).unwrap();
        assert_eq!(
            unpack(&word, &LayoutDescriptor::WEIGHTS).unwrap(),
            vec![5, 4, 3, 2, 1, -2]
        );
        // short text is zero-extended
        assert_eq!(WideWord::from_hex("ff", 48).unwrap().to_hex(), "0000000000ff");
        assert!(WideWord::from_hex("1ffffffffffff", 48).is_err());
        assert!(WideWord::from_hex("zz", 48).is_err());
    }

    #[test]
    fn sixteen_channels_make_three_passes() {
        let passes = pack_multipass(16, 6).unwrap();
        let ranges: Vec<_> = passes.iter().map(|p| p.channels.clone()).collect();
        assert_eq!(ranges, vec![0..6, 6..12, 12..16]);
        assert_eq!(passes.iter().map(|p| p.index).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(passes[2].padding(), 2);
        assert!(pack_multipass(16, 0).is_err());
    }

    #[test]
    fn third_pass_padding_lanes_are_zero() {
        let bias = Tensor::from_fn([16], AxisOrder::Linear, BitWidth::W32, |i| {
            -(i[0] as i64) - 1
        })
        .unwrap();
        let words = encode_bias(&bias, &LayoutDescriptor::BIASES, BiasFormat::Wide).unwrap();
        assert_eq!(words.len(), 3);
        let lanes = unpack(&words[2], &LayoutDescriptor::BIASES).unwrap();
        assert_eq!(lanes, vec![-13, -14, -15, -16, 0, 0]);
    }

    #[test]
    fn column_bias_is_pass_padded() {
        let bias = Tensor::new([16], AxisOrder::Linear, BitWidth::W32, (0..16).collect()).unwrap();
        let words = encode_bias(&bias, &LayoutDescriptor::BIASES, BiasFormat::Column).unwrap();
        assert_eq!(words.len(), 18);
        assert_eq!(words[16].to_hex(), "00000000");
        assert_eq!(words[15].to_hex(), "0000000f");
        let back = decode_bias(&words, 16, &LayoutDescriptor::BIASES, BiasFormat::Column).unwrap();
        assert_eq!(back, bias);
    }

    #[test]
    fn conv1_weights_make_25_words() {
        let w = kcrs(6, 1, 5);
        let words = encode_conv_weights(&w, &LayoutDescriptor::WEIGHTS).unwrap();
        assert_eq!(words.len(), 25);
        // word 7 = tap (1, 2); lane k holds w[k, 0, 1, 2]
        let lanes = unpack(&words[7], &LayoutDescriptor::WEIGHTS).unwrap();
        for (k, lane) in lanes.iter().enumerate() {
            assert_eq!(Some(*lane), w.get(&[k, 0, 1, 2]));
        }
    }

    #[test]
    fn conv2_weights_are_pass_major() {
        let w = kcrs(16, 6, 5);
        let words = encode_conv_weights(&w, &LayoutDescriptor::WEIGHTS).unwrap();
        assert_eq!(words.len(), 450);
        // first word of pass 1 carries out channels 6..12 at tap (0, 0, 0)
        let lanes = unpack(&words[150], &LayoutDescriptor::WEIGHTS).unwrap();
        assert_eq!(Some(lanes[0]), w.get(&[6, 0, 0, 0]));
        // last pass pads lanes 4 and 5
        let lanes = unpack(&words[449], &LayoutDescriptor::WEIGHTS).unwrap();
        assert_eq!(&lanes[4..], &[0, 0]);
        let back = decode_conv_weights(&words, 16, 6, 5, &LayoutDescriptor::WEIGHTS).unwrap();
        assert_eq!(back, w);
    }

    #[test]
    fn decode_reports_expected_and_actual_counts() {
        let w = kcrs(6, 1, 5);
        let words = encode_conv_weights(&w, &LayoutDescriptor::WEIGHTS).unwrap();
        let err = decode_conv_weights(&words[..24], 6, 1, 5, &LayoutDescriptor::WEIGHTS)
            .unwrap_err();
        match err {
            GoldenError::ShapeMismatch { expected, actual, .. } => {
                assert_eq!(expected, "25 words");
                assert_eq!(actual, "24 words");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn decode_rejects_dirty_padding() {
        let mut words = encode_conv_weights(&kcrs(16, 1, 1), &LayoutDescriptor::WEIGHTS).unwrap();
        words[2] = WideWord::from_hex("010000000000", 48).unwrap();
        assert!(matches!(
            decode_conv_weights(&words, 16, 1, 1, &LayoutDescriptor::WEIGHTS),
            Err(GoldenError::Parse { line: 3, .. })
        ));
    }

    #[test]
    fn image_is_one_byte_per_line_in_raster_order() {
        let img = Tensor::from_fn([1, 2, 3], AxisOrder::Chw, BitWidth::W8, |i| {
            (i[1] * 3 + i[2]) as i64
        })
        .unwrap();
        let words = encode_feature_map(&img, &LayoutDescriptor::IMAGE).unwrap();
        let hex: Vec<String> = words.iter().map(WideWord::to_hex).collect();
        assert_eq!(hex, vec!["00", "01", "02", "03", "04", "05"]);
    }

    #[test]
    fn reshape_reports_count_mismatch() {
        let err = reshape(vec![0; 10], [2, 2, 2], AxisOrder::Chw, BitWidth::W8).unwrap_err();
        assert!(err.to_string().contains("expected 8 elements, got 10 elements"));
    }

    fn arb_chw() -> impl Strategy<Value = Tensor> {
        (1_usize..9, 1_usize..5, 1_usize..5).prop_flat_map(|(c, h, w)| {
            proptest::collection::vec(-128_i32..128, c * h * w).prop_map(move |data| {
                Tensor::new([c, h, w], AxisOrder::Chw, BitWidth::W8, data).unwrap()
            })
        })
    }

    proptest! {
        #[test]
        fn prop_unpack_inverts_pack(values in proptest::collection::vec(-128_i32..128, 6)) {
            let word = pack_channels(&values, &LayoutDescriptor::WEIGHTS).unwrap();
            prop_assert_eq!(unpack(&word, &LayoutDescriptor::WEIGHTS).unwrap(), values);
        }

        #[test]
        fn prop_reshape_inverts_flatten(t in arb_chw()) {
            let scalars = flatten(&t, AxisOrder::Hwc).unwrap();
            let hwc = reshape(scalars, [t.dims()[1], t.dims()[2], t.dims()[0]], AxisOrder::Hwc, BitWidth::W8).unwrap();
            prop_assert_eq!(hwc.to_order(AxisOrder::Chw).unwrap(), t.clone());
            let same = reshape(flatten(&t, AxisOrder::Chw).unwrap(), t.shape().clone(), AxisOrder::Chw, BitWidth::W8).unwrap();
            prop_assert_eq!(same, t);
        }

        #[test]
        fn prop_feature_map_codec_inverts(t in arb_chw()) {
            let (c, h, w) = t.feature_dims().unwrap();
            let words = encode_feature_map(&t, &LayoutDescriptor::WEIGHTS).unwrap();
            prop_assert_eq!(words.len(), c.div_ceil(6) * h * w);
            let back = decode_feature_map(&words, c, h, w, &LayoutDescriptor::WEIGHTS).unwrap();
            prop_assert_eq!(back, t);
        }
    }
}
