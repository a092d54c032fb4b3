// SPDX-License-Identifier: AGPL-3.0-only

//! Quantized parameter sets, test images, and the hardware init file set
//!
//! Trained checkpoints are produced elsewhere; [`LayerParameters::from_real`]
//! quantizes real-valued tensors handed over from outside, and
//! [`ParameterSet::synthetic`] generates a reproducible set from a seed so
//! that the whole flow can run without one.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use lenet_chip::files;
use lenet_chip::layers::{LayerGeometry, LENET5};
use tracing::info;

use crate::datapath::{LayerConfig, LayerEmulator, LayerKind, LenetNetwork};
use crate::error::{GoldenError, Result};
use crate::fixed;
use crate::hexfile;
use crate::layout::{self, BiasFormat, LayoutDescriptor};
use crate::tensor::{AxisOrder, BitWidth, Tensor};

/// Side length of the input image
pub const IMAGE_SIZE: usize = 28;

/// xoshiro256++ seeded through splitmix64
struct Xoshiro {
    s: [u64; 4],
}

impl Xoshiro {
    fn new(seed: u64) -> Self {
        let mut state = seed;
        let mut s = [0_u64; 4];
        for slot in &mut s {
            state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
            let mut z = state;
            z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
            z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
            *slot = z ^ (z >> 31);
        }
        Self { s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = self.s[0]
            .wrapping_add(self.s[3])
            .rotate_left(23)
            .wrapping_add(self.s[0]);
        let t = self.s[1] << 17;
        self.s[2] ^= self.s[0];
        self.s[3] ^= self.s[1];
        self.s[1] ^= self.s[2];
        self.s[0] ^= self.s[3];
        self.s[2] ^= t;
        self.s[3] = self.s[3].rotate_left(45);
        result
    }

    /// Uniform in `[-1, 1)`
    fn next_signed(&mut self) -> f64 {
        let bits = (self.next_u64() >> 11) | 0x3ff0_0000_0000_0000;
        (f64::from_bits(bits) - 1.0) * 2.0 - 1.0
    }

    fn uniform(&mut self, len: usize, amplitude: f64) -> Vec<f64> {
        (0..len).map(|_| self.next_signed() * amplitude).collect()
    }
}

/// Quantized weights and bias of one layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerParameters {
    /// Layer configuration
    pub config: LayerConfig,
    /// 8-bit weights (`Kcrs` or `Matrix`)
    pub weights: Tensor,
    /// 32-bit bias at the accumulator scale
    pub bias: Tensor,
}

impl LayerParameters {
    /// Quantize real-valued weights (row-major in the layer's weight layout)
    /// and biases
    ///
    /// Weights use the layer's fractional bits; biases use twice that (Q14
    /// for conv layers, Q12 for dense layers) and are not clamped to 8 bits.
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` if the slice lengths disagree with the layer.
    pub fn from_real(config: LayerConfig, weights: &[f64], bias: &[f64]) -> Result<Self> {
        let (shape, order) = config.weight_layout();
        let weight_format = config.weight_format;
        let bias_format = weight_format.accumulator_with(weight_format);
        let weights = Tensor::new(
            shape,
            order,
            BitWidth::W8,
            weights.iter().map(|&w| weight_format.to_fixed(w)).collect(),
        )?;
        let bias = Tensor::new(
            [config.out_channels],
            AxisOrder::Linear,
            BitWidth::W32,
            bias.iter().map(|&b| bias_format.to_fixed(b)).collect(),
        )?;
        Ok(Self {
            config,
            weights,
            bias,
        })
    }

    /// Emulator for this layer
    ///
    /// # Errors
    ///
    /// See [`LayerEmulator::new`].
    pub fn emulator(&self) -> Result<LayerEmulator> {
        LayerEmulator::new(self.config.clone(), self.weights.clone(), self.bias.clone())
    }
}

/// Parameters of every LeNet-5 layer, in execution order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSet {
    layers: Vec<LayerParameters>,
}

impl ParameterSet {
    /// Deterministic parameters for all five layers
    ///
    /// Weights are uniform in `±1/√fan_in`, biases in `±0.1`.
    ///
    /// # Errors
    ///
    /// Propagates quantization errors (none for the fixed geometry).
    pub fn synthetic(seed: u64) -> Result<Self> {
        let mut rng = Xoshiro::new(seed);
        let layers = LENET5
            .iter()
            .map(|geometry| {
                let config = LayerConfig::from_geometry(geometry);
                let (shape, _) = config.weight_layout();
                #[allow(clippy::cast_precision_loss)]
                let amplitude = 1.0 / (config.fan_in() as f64).sqrt();
                let weights = rng.uniform(shape.total_elements(), amplitude);
                let bias = rng.uniform(config.out_channels, 0.1);
                LayerParameters::from_real(config, &weights, &bias)
            })
            .collect::<Result<Vec<_>>>()?;
        info!("Generated synthetic parameters (seed {seed})");
        Ok(Self { layers })
    }

    /// Layers in execution order
    pub fn layers(&self) -> &[LayerParameters] {
        &self.layers
    }

    /// Layer by name
    pub fn layer(&self, name: &str) -> Option<&LayerParameters> {
        self.layers.iter().find(|l| l.config.name == name)
    }

    /// Build the network emulator
    ///
    /// # Errors
    ///
    /// See [`LayerEmulator::new`] and [`LenetNetwork::new`].
    pub fn network(&self) -> Result<LenetNetwork> {
        let layers = self
            .layers
            .iter()
            .map(LayerParameters::emulator)
            .collect::<Result<Vec<_>>>()?;
        LenetNetwork::new(layers)
    }

    /// Write `<layer>_weights.hex` and `<layer>_bias.hex` for every layer
    ///
    /// Conv weights use packed 48-bit words; dense weights one byte per
    /// line. Conv biases use `bias_format`; dense biases one 32-bit value
    /// per line.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if a file cannot be written.
    pub fn write_init_files<P: AsRef<Path>>(
        &self,
        dir: P,
        bias_format: BiasFormat,
    ) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        let mut written = Vec::with_capacity(self.layers.len() * 2);
        for layer in &self.layers {
            let name = &layer.config.name;
            let (weights, bias) = match layer.config.kind {
                LayerKind::Conv { .. } => (
                    layout::encode_conv_weights(&layer.weights, &LayoutDescriptor::WEIGHTS)?,
                    layout::encode_bias(&layer.bias, &LayoutDescriptor::BIASES, bias_format)?,
                ),
                LayerKind::Dense => (
                    layout::encode_linear(&layer.weights)?,
                    layout::encode_linear(&layer.bias)?,
                ),
            };
            let weight_path = dir.join(files::weights(name));
            hexfile::write_words(&weight_path, &weights)?;
            let bias_path = dir.join(files::bias(name));
            hexfile::write_words(&bias_path, &bias)?;
            info!(
                "Exported {name}: {} weight line(s), {} bias line(s)",
                weights.len(),
                bias.len()
            );
            written.push(weight_path);
            written.push(bias_path);
        }
        Ok(written)
    }

    /// Read the init files of every LeNet-5 layer
    ///
    /// # Errors
    ///
    /// Returns `MissingInput` for an absent file, `ShapeMismatch` when a
    /// file has the wrong number of lines, or `Parse`.
    pub fn read_init_files<P: AsRef<Path>>(dir: P, bias_format: BiasFormat) -> Result<Self> {
        let dir = dir.as_ref();
        let layers = LENET5
            .iter()
            .map(|geometry| read_layer(dir, geometry, bias_format))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { layers })
    }
}

fn read_layer(dir: &Path, geometry: &LayerGeometry, bias_format: BiasFormat) -> Result<LayerParameters> {
    let config = LayerConfig::from_geometry(geometry);
    let weight_path = dir.join(files::weights(geometry.name));
    let bias_path = dir.join(files::bias(geometry.name));
    let (weights, bias) = match config.kind {
        LayerKind::Conv { kernel } => {
            let desc = LayoutDescriptor::WEIGHTS;
            let words = hexfile::read_words(&weight_path, desc.word_bits())?;
            let weights = layout::decode_conv_weights(
                &words,
                config.out_channels,
                config.in_channels,
                kernel,
                &desc,
            )?;
            let desc = LayoutDescriptor::BIASES;
            let bits = match bias_format {
                BiasFormat::Column => desc.lane_bits,
                BiasFormat::Wide => desc.word_bits(),
            };
            let words = hexfile::read_words(&bias_path, bits)?;
            let bias = layout::decode_bias(&words, config.out_channels, &desc, bias_format)?;
            (weights, bias)
        }
        LayerKind::Dense => {
            let words = hexfile::read_words(&weight_path, BitWidth::W8.bits())?;
            let weights = layout::decode_linear(
                &words,
                [config.out_channels, config.in_channels],
                AxisOrder::Matrix,
                BitWidth::W8,
            )?;
            let words = hexfile::read_words(&bias_path, BitWidth::W32.bits())?;
            let bias = layout::decode_linear(
                &words,
                [config.out_channels],
                AxisOrder::Linear,
                BitWidth::W32,
            )?;
            (weights, bias)
        }
    };
    info!("Loaded {} parameters from {}", geometry.name, dir.display());
    Ok(LayerParameters {
        config,
        weights,
        bias,
    })
}

/// Deterministic 28×28 test images
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputPattern {
    /// `((y·28 + x) mod 255) / 255`
    Ramp,
    /// `((y + x) mod 16) / 16`
    Diagonal,
}

impl InputPattern {
    /// Real pixel value in `[0, 1]`
    #[allow(clippy::cast_precision_loss)]
    pub fn real(self, y: usize, x: usize) -> f64 {
        match self {
            Self::Ramp => ((y * IMAGE_SIZE + x) % 255) as f64 / 255.0,
            Self::Diagonal => ((y + x) % 16) as f64 / 16.0,
        }
    }

    /// Q7-quantized `[1, 28, 28]` image
    ///
    /// # Errors
    ///
    /// Never fails; construction errors are propagated.
    pub fn image(self) -> Result<Tensor> {
        Tensor::from_fn(
            [1, IMAGE_SIZE, IMAGE_SIZE],
            AxisOrder::Chw,
            BitWidth::W8,
            |i| i64::from(fixed::quantize(self.real(i[1], i[2]), lenet_chip::quant::CONV_FRAC_BITS)),
        )
    }
}

impl FromStr for InputPattern {
    type Err = GoldenError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ramp" => Ok(Self::Ramp),
            "diagonal" => Ok(Self::Diagonal),
            other => Err(GoldenError::invalid_config(format!(
                "unknown input pattern '{other}'"
            ))),
        }
    }
}

/// Write a single-channel image as one byte per line, raster order
///
/// # Errors
///
/// Returns `InvalidConfig` unless the image has one channel, or an I/O
/// error.
pub fn write_image<P: AsRef<Path>>(path: P, image: &Tensor) -> Result<()> {
    if image.feature_dims().map(|(c, _, _)| c) != Some(1) {
        return Err(GoldenError::invalid_config(format!(
            "input image must have one channel, got {:?} {}",
            image.order(),
            image.shape()
        )));
    }
    let words = layout::encode_feature_map(image, &LayoutDescriptor::IMAGE)?;
    hexfile::write_words(path, &words)
}

/// Read a 28×28 input image
///
/// # Errors
///
/// Returns `MissingInput`, `Parse`, or `ShapeMismatch` when the file does
/// not hold 784 bytes.
pub fn read_image<P: AsRef<Path>>(path: P) -> Result<Tensor> {
    let desc = LayoutDescriptor::IMAGE;
    let words = hexfile::read_words(path, desc.word_bits())?;
    layout::decode_feature_map(&words, 1, IMAGE_SIZE, IMAGE_SIZE, &desc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_is_deterministic() {
        let a = ParameterSet::synthetic(7).unwrap();
        let b = ParameterSet::synthetic(7).unwrap();
        let c = ParameterSet::synthetic(8).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.layers().len(), 5);
        assert_eq!(a.layer("conv2").unwrap().weights.dims(), &[16, 6, 5, 5]);
        assert_eq!(a.layer("fc1").unwrap().weights.dims(), &[120, 400]);
    }

    #[test]
    fn synthetic_network_builds() {
        let net = ParameterSet::synthetic(1).unwrap().network().unwrap();
        assert_eq!(net.layers().len(), 5);
        let class = net.classify(&InputPattern::Ramp.image().unwrap()).unwrap();
        assert!(class < 10);
    }

    #[test]
    fn rng_stays_in_range() {
        let mut rng = Xoshiro::new(42);
        for _ in 0..1000 {
            let v = rng.next_signed();
            assert!((-1.0..1.0).contains(&v));
        }
    }

    #[test]
    fn ramp_pixels() {
        let img = InputPattern::Ramp.image().unwrap();
        assert_eq!(img.get(&[0, 0, 0]), Some(0));
        // 1/255 * 128 = 0.502 -> 1
        assert_eq!(img.get(&[0, 0, 1]), Some(1));
        // 254/255 * 128 = 127.498 -> 127
        assert_eq!(img.get(&[0, 9, 2]), Some(127));
        // (9*28 + 3) mod 255 = 0
        assert_eq!(img.get(&[0, 9, 3]), Some(0));
    }

    #[test]
    fn diagonal_pixels() {
        let img = InputPattern::Diagonal.image().unwrap();
        assert_eq!(img.get(&[0, 3, 5]), Some(64));
        assert_eq!(img.get(&[0, 10, 6]), Some(0));
        assert_eq!("Diagonal".parse::<InputPattern>().unwrap(), InputPattern::Diagonal);
    }

    #[test]
    fn from_real_uses_accumulator_scale_for_bias() {
        let config = LayerConfig::dense("fc", 2, 1);
        let p = LayerParameters::from_real(config, &[0.5, -0.25], &[0.5]).unwrap();
        // Q6 weights, Q12 bias
        assert_eq!(p.weights.data(), &[32, -16]);
        assert_eq!(p.bias.data(), &[2048]);
        assert!(LayerParameters::from_real(LayerConfig::dense("fc", 2, 1), &[0.0], &[0.0]).is_err());

        // Q7 weights, Q14 bias, wider than any weight
        let config = LayerConfig::conv("c", 1, 1, 1, 1, 1);
        let p = LayerParameters::from_real(config, &[3.0], &[1.5]).unwrap();
        assert_eq!(p.weights.data(), &[127]);
        assert_eq!(p.bias.data(), &[24_576]);
    }

    #[test]
    fn init_files_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let params = ParameterSet::synthetic(3).unwrap();
        let written = params.write_init_files(dir.path(), BiasFormat::Column).unwrap();
        assert_eq!(written.len(), 10);
        let conv2 = hexfile::read_hex_lines(dir.path().join("conv2_weights.hex")).unwrap();
        assert_eq!(conv2.len(), 450);
        assert_eq!(conv2[0].len(), 12);
        let bias = hexfile::read_hex_lines(dir.path().join("conv2_bias.hex")).unwrap();
        assert_eq!(bias.len(), 18);
        let back = ParameterSet::read_init_files(dir.path(), BiasFormat::Column).unwrap();
        assert_eq!(back, params);
    }

    #[test]
    fn wide_bias_init_files_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let params = ParameterSet::synthetic(4).unwrap();
        params.write_init_files(dir.path(), BiasFormat::Wide).unwrap();
        let bias = hexfile::read_hex_lines(dir.path().join("conv2_bias.hex")).unwrap();
        assert_eq!(bias.len(), 3);
        assert_eq!(bias[0].len(), 48);
        assert_eq!(ParameterSet::read_init_files(dir.path(), BiasFormat::Wide).unwrap(), params);
    }

    #[test]
    fn missing_init_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = ParameterSet::read_init_files(dir.path(), BiasFormat::Column).unwrap_err();
        assert!(matches!(err, GoldenError::MissingInput { .. }));
    }

    #[test]
    fn image_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(files::INPUT_IMAGE);
        let img = InputPattern::Diagonal.image().unwrap();
        write_image(&path, &img).unwrap();
        assert_eq!(hexfile::read_hex_lines(&path).unwrap().len(), 784);
        assert_eq!(read_image(&path).unwrap(), img);
    }
}
