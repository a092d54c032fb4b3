// SPDX-License-Identifier: AGPL-3.0-only

//! Init file names loaded by the testbench (`$readmemh`).

/// Quantized Q7 input image, one byte per line, raster order.
pub const INPUT_IMAGE: &str = "input_image.hex";

/// Default name of the simulator's output dump.
pub const SIM_OUTPUT: &str = "sim_output.txt";

/// Weight file of a layer (`<layer>_weights.hex`).
#[must_use]
pub fn weights(layer: &str) -> String {
    format!("{layer}_weights.hex")
}

/// Bias file of a layer (`<layer>_bias.hex`).
#[must_use]
pub fn bias(layer: &str) -> String {
    format!("{layer}_bias.hex")
}
