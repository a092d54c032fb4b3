// SPDX-License-Identifier: AGPL-3.0-only

//! Decimal text dumps: per-stage debug files and simulator output
//!
//! Debug dumps start with `# Description:` and `# Shape:` comment lines and
//! then list feature maps one pixel per line (row-major, channels separated
//! by spaces) or vectors one value per line.
//!
//! Simulator output is grouped by reload pass: for each pass, one line per
//! output pixel in raster order, holding that pass's channels.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::datapath::{LayerConfig, LayerTrace};
use crate::error::{GoldenError, Result};
use crate::layout::pack_multipass;
use crate::tensor::{AxisOrder, BitWidth, Shape, Tensor};

/// View a feature map or vector as `Hwc` (vectors become `[1, 1, n]`)
///
/// # Errors
///
/// Returns `InvalidConfig` for weight tensors.
pub fn hwc_view(t: &Tensor) -> Result<Tensor> {
    match t.order() {
        AxisOrder::Linear => t.reshaped([1, 1, t.len()], AxisOrder::Hwc),
        _ => t.to_order(AxisOrder::Hwc),
    }
}

/// Write a debug dump of `tensor`
///
/// # Errors
///
/// Returns `InvalidConfig` for weight tensors, or an I/O error.
pub fn write_dump<P: AsRef<Path>>(path: P, tensor: &Tensor, description: &str) -> Result<()> {
    let path = path.as_ref();
    let mut text = format!("# Description: {description}\n");
    if tensor.order() == AxisOrder::Linear {
        text.push_str(&format!("# Shape: {}\n", tensor.len()));
        for v in tensor.data() {
            text.push_str(&format!("{v}\n"));
        }
    } else {
        let hwc = tensor.to_order(AxisOrder::Hwc)?;
        let &[rows, cols, channels] = hwc.dims() else {
            return Err(GoldenError::invalid_config("dump needs a feature map"));
        };
        text.push_str(&format!("# Shape: {rows}x{cols}x{channels}\n"));
        for pixel in hwc.data().chunks(channels.max(1)) {
            text.push_str(&join(pixel));
            text.push('\n');
        }
    }
    fs::write(path, text)?;
    debug!("Wrote dump {} ({description})", path.display());
    Ok(())
}

/// Read a debug dump into a tensor of `shape` in `order`
///
/// Feature-map dumps are always in `Hwc` scan order on disk; a `Chw` request
/// is permuted after reading.
///
/// # Errors
///
/// Returns `MissingInput`, `Parse` (with line number), `ShapeMismatch` when
/// the value count disagrees with `shape`, or `RangeViolation`.
pub fn read_dump<P: AsRef<Path>>(
    path: P,
    shape: impl Into<Shape>,
    order: AxisOrder,
    width: BitWidth,
) -> Result<Tensor> {
    let path = path.as_ref();
    let shape = shape.into();
    let values: Vec<i32> = read_decimal_lines(path)?
        .into_iter()
        .flat_map(|(_, values)| values)
        .collect();
    if values.len() != shape.total_elements() {
        return Err(GoldenError::shape_mismatch(
            format!("dump {}", path.display()),
            format!("{} values", shape.total_elements()),
            format!("{} values", values.len()),
        ));
    }
    match order {
        AxisOrder::Chw => {
            let &[c, h, w] = shape.dims.as_slice() else {
                return Err(GoldenError::shape_mismatch("Chw dump", "rank 3", shape));
            };
            Tensor::new([h, w, c], AxisOrder::Hwc, width, values)?.to_order(AxisOrder::Chw)
        }
        _ => Tensor::new(shape, order, width, values),
    }
}

/// Write every stage of a layer trace as `<layer>_debug_<n>_<stage>.txt`
///
/// Number 0 is the padded input, 1 to 5 the pipeline stages.
///
/// # Errors
///
/// Returns an I/O error if a file cannot be written.
pub fn write_trace<P: AsRef<Path>>(dir: P, trace: &LayerTrace) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let layer = &trace.record.layer;
    let mut written = Vec::with_capacity(6);

    let path = dir.join(format!("{layer}_debug_0_padded_input.txt"));
    write_dump(&path, &trace.padded_input, "Padded input")?;
    written.push(path);

    for (n, (stage, tensor)) in trace.record.stages().enumerate() {
        let path = dir.join(format!("{layer}_debug_{}_{stage}.txt", n + 1));
        write_dump(&path, tensor, &format!("{layer} {stage}"))?;
        written.push(path);
    }
    info!("{layer}: wrote {} debug dump(s) to {}", written.len(), dir.display());
    Ok(written)
}

/// Shape of a simulator output file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimOutputFormat {
    /// Channels of the dumped tensor
    pub channels: usize,
    /// Rows of the dumped tensor
    pub rows: usize,
    /// Columns of the dumped tensor
    pub cols: usize,
    /// Lanes per output word (pass width)
    pub lanes: usize,
}

impl SimOutputFormat {
    /// Output of a layer's final stage, six lanes per pass
    pub fn for_layer(config: &LayerConfig) -> Self {
        let (rows, cols) = config.output_dims();
        Self {
            channels: config.out_channels,
            rows,
            cols,
            lanes: lenet_chip::lanes::LANE_COUNT,
        }
    }

    /// Output of a layer's pre-requantize stages
    pub fn for_stage(config: &LayerConfig, pooled: bool) -> Self {
        let (rows, cols) = if pooled {
            config.output_dims()
        } else {
            config.conv_dims()
        };
        Self {
            rows,
            cols,
            ..Self::for_layer(config)
        }
    }

    /// Lines the file must contain
    pub fn expected_lines(&self) -> usize {
        lenet_chip::lanes::pass_count(self.channels, self.lanes) * self.rows * self.cols
    }
}

/// Read simulator output into an `Hwc` tensor `[rows, cols, channels]`
///
/// Each line holds either the pass's channels or all lanes; in the latter
/// case padding lanes must be zero. Values are kept at 32 bits whatever the
/// probed stage, so an out-of-range value shows up as a divergence.
///
/// # Errors
///
/// Returns `MissingInput`, `ShapeMismatch` when the line count is not
/// `passes × rows × cols`, or `Parse` for bad lines.
pub fn read_sim_output<P: AsRef<Path>>(path: P, format: &SimOutputFormat) -> Result<Tensor> {
    let path = path.as_ref();
    info!("Loading simulation output: {}", path.display());

    let passes = pack_multipass(format.channels, format.lanes)?;
    let lines = read_decimal_lines(path)?;
    let plane = format.rows * format.cols;
    if lines.len() != format.expected_lines() {
        return Err(GoldenError::shape_mismatch(
            format!("simulation output {}", path.display()),
            format!("{} lines", format.expected_lines()),
            format!("{} lines", lines.len()),
        ));
    }

    let mut data = vec![0; plane * format.channels];
    for (pass, chunk) in passes.iter().zip(lines.chunks(plane.max(1))) {
        for (pixel, (line, values)) in chunk.iter().enumerate() {
            let line = *line;
            if values.len() != pass.len() && values.len() != format.lanes {
                return Err(GoldenError::parse(
                    line,
                    format!(
                        "expected {} or {} values, found {}",
                        pass.len(),
                        format.lanes,
                        values.len()
                    ),
                ));
            }
            if values[pass.len()..].iter().any(|&v| v != 0) {
                return Err(GoldenError::parse(
                    line,
                    format!("padding lanes of pass {} are not zero", pass.index),
                ));
            }
            for (ch, &v) in pass.channels.clone().zip(values) {
                data[pixel * format.channels + ch] = v;
            }
        }
        debug!("pass {}: channels {:?}", pass.index, pass.channels);
    }
    Tensor::new(
        [format.rows, format.cols, format.channels],
        AxisOrder::Hwc,
        BitWidth::W32,
        data,
    )
}

/// Write `tensor` in simulator output form, `lanes` channels per pass
///
/// # Errors
///
/// Returns `InvalidConfig` for weight tensors or zero lanes, or an I/O
/// error.
pub fn write_sim_output<P: AsRef<Path>>(path: P, tensor: &Tensor, lanes: usize) -> Result<()> {
    let path = path.as_ref();
    let hwc = hwc_view(tensor)?;
    let &[rows, cols, channels] = hwc.dims() else {
        return Err(GoldenError::invalid_config("simulation output needs a feature map"));
    };
    let mut text = String::new();
    for pass in pack_multipass(channels, lanes)? {
        for pixel in 0..rows * cols {
            let base = pixel * channels;
            text.push_str(&join(&hwc.data()[base + pass.channels.start..base + pass.channels.end]));
            text.push('\n');
        }
    }
    fs::write(path, text)?;
    info!("Wrote comparison file {}", path.display());
    Ok(())
}

fn join(values: &[i32]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Non-comment, non-blank lines parsed as whitespace-separated decimals,
/// each with its 1-based line number in the file
fn read_decimal_lines(path: &Path) -> Result<Vec<(usize, Vec<i32>)>> {
    if !path.exists() {
        return Err(GoldenError::missing_input(path));
    }
    let text = fs::read_to_string(path)?;
    let mut lines = Vec::new();
    for (n, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let values = line
            .split_whitespace()
            .map(|token| {
                token
                    .parse::<i32>()
                    .map_err(|e| GoldenError::parse(n + 1, format!("'{token}': {e}")))
            })
            .collect::<Result<Vec<_>>>()?;
        lines.push((n + 1, values));
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datapath::LayerConfig;
    use lenet_chip::layers::{CONV2, FC3};

    fn feature_map(c: usize, h: usize, w: usize) -> Tensor {
        Tensor::from_fn([c, h, w], AxisOrder::Chw, BitWidth::W8, |i| {
            ((i[0] * 25 + i[1] * 5 + i[2]) % 200) as i64 - 100
        })
        .unwrap()
    }

    #[test]
    fn dump_has_header_and_pixel_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("l.txt");
        let t = feature_map(2, 1, 2);
        write_dump(&path, &t, "Final L1 Out").unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "# Description: Final L1 Out");
        assert_eq!(lines[1], "# Shape: 1x2x2");
        assert_eq!(lines[2], "-100 -75");
        assert_eq!(lines[3], "-99 -74");
    }

    #[test]
    fn dump_reads_back_in_either_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("d.txt");
        let t = feature_map(3, 4, 5);
        write_dump(&path, &t, "x").unwrap();
        let back = read_dump(&path, [3, 4, 5], AxisOrder::Chw, BitWidth::W8).unwrap();
        assert_eq!(back, t);
        let hwc = read_dump(&path, [4, 5, 3], AxisOrder::Hwc, BitWidth::W8).unwrap();
        assert_eq!(hwc, t.to_order(AxisOrder::Hwc).unwrap());
        assert!(read_dump(&path, [3, 4, 4], AxisOrder::Chw, BitWidth::W8).is_err());
    }

    #[test]
    fn vector_dump_is_one_value_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fc.txt");
        let t = Tensor::new([3], AxisOrder::Linear, BitWidth::W32, vec![7, -70000, 0]).unwrap();
        write_dump(&path, &t, "Raw Accumulation").unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "# Description: Raw Accumulation\n# Shape: 3\n7\n-70000\n0\n"
        );
        assert_eq!(read_dump(&path, [3], AxisOrder::Linear, BitWidth::W32).unwrap(), t);
    }

    #[test]
    fn conv2_sim_output_is_pass_grouped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sim.txt");
        let t = feature_map(16, 5, 5);
        write_sim_output(&path, &t, 6).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 75);
        assert_eq!(lines[0].split_whitespace().count(), 6);
        assert_eq!(lines[50].split_whitespace().count(), 4);
        // pass 1, pixel 0 starts at channel 6
        assert_eq!(lines[25].split_whitespace().next(), Some("50"));

        let format = SimOutputFormat::for_layer(&LayerConfig::from_geometry(&CONV2));
        assert_eq!(format.expected_lines(), 75);
        let back = read_sim_output(&path, &format).unwrap();
        let hwc = t.to_order(AxisOrder::Hwc).unwrap();
        assert_eq!(back.width(), BitWidth::W32);
        assert_eq!(back.dims(), hwc.dims());
        assert_eq!(back.data(), hwc.data());
    }

    #[test]
    fn sim_output_accepts_zero_padded_lanes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sim.txt");
        let format = SimOutputFormat {
            channels: 4,
            rows: 1,
            cols: 2,
            lanes: 6,
        };
        fs::write(&path, "1 2 3 4 0 0\n5 6 7 8\n").unwrap();
        let t = read_sim_output(&path, &format).unwrap();
        assert_eq!(t.data(), &[1, 2, 3, 4, 5, 6, 7, 8]);

        fs::write(&path, "1 2 3 4 0 9\n5 6 7 8\n").unwrap();
        assert!(matches!(
            read_sim_output(&path, &format),
            Err(GoldenError::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn parse_errors_name_the_file_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sim.txt");
        let format = SimOutputFormat {
            channels: 4,
            rows: 1,
            cols: 2,
            lanes: 6,
        };
        fs::write(&path, "# header\n1 2 3 4\n\n5 6 7 8 0 9\n").unwrap();
        assert!(matches!(
            read_sim_output(&path, &format),
            Err(GoldenError::Parse { line: 4, .. })
        ));
    }

    #[test]
    fn unsigned_byte_in_sim_output_is_a_divergence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sim.txt");
        let format = SimOutputFormat {
            channels: 6,
            rows: 1,
            cols: 1,
            lanes: 6,
        };
        // -56 printed as an unsigned byte
        fs::write(&path, "200 0 0 0 0 0\n").unwrap();
        let actual = read_sim_output(&path, &format).unwrap();
        let golden = Tensor::new(
            [1, 1, 6],
            AxisOrder::Hwc,
            BitWidth::W8,
            vec![-56, 0, 0, 0, 0, 0],
        )
        .unwrap();

        let found = crate::compare::compare(&golden, &actual).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].index, vec![0, 0, 0]);
        assert_eq!(found[0].actual, 200);
        assert_eq!(found[0].diff, -256);
    }

    #[test]
    fn sim_output_line_count_is_checked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sim.txt");
        fs::write(&path, "1 2 3 4 5 6\n").unwrap();
        let format = SimOutputFormat::for_layer(&LayerConfig::from_geometry(&FC3));
        assert_eq!(format.expected_lines(), 2);
        let err = read_sim_output(&path, &format).unwrap_err();
        assert!(err.is_fatal_input());
        assert!(err.to_string().contains("expected 2 lines, got 1 lines"));
    }

    #[test]
    fn missing_sim_output_is_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let format = SimOutputFormat::for_layer(&LayerConfig::from_geometry(&FC3));
        assert!(matches!(
            read_sim_output(dir.path().join("nope.txt"), &format),
            Err(GoldenError::MissingInput { .. })
        ));
    }
}
