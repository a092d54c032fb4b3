// SPDX-License-Identifier: AGPL-3.0-only

#![deny(unsafe_code)]

//! Bit-exact golden model of the LeNet-5 accelerator datapath
//!
//! This crate reproduces, in the accelerator's own integer arithmetic, every
//! intermediate tensor the RTL computes, and translates tensors to and from
//! the packed multi-pass buffer layouts the RTL loads.
//!
//! # Components
//!
//! - [`fixed`]: scalar quantization, requantization and hex rendering
//! - [`tensor`]: integer tensors with a declared width and axis order
//! - [`layout`] / [`hexfile`]: wide-word packing, pass grouping, init files
//! - [`datapath`]: the five-stage layer pipeline and the full network
//! - [`compare`] / [`dump`]: simulator output decoding and divergence reports
//! - [`params`]: parameter sets, test images, init file export
//!
//! # Example
//!
//! ```no_run
//! use lenet_golden::prelude::*;
//!
//! # fn main() -> lenet_golden::Result<()> {
//! let params = ParameterSet::read_init_files("init", BiasFormat::Column)?;
//! let image = read_image("init/input_image.hex")?;
//! let traces = params.network()?.run(&image)?;
//!
//! let conv1 = &traces[0].record;
//! let sim = read_sim_output("sim_output.txt", &SimOutputFormat::for_layer(&params.layers()[0].config))?;
//! let report = ComparisonReport::new("conv1", &hwc_view(conv1.output())?, &sim)?;
//! println!("{}", report.render(10));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod compare;
pub mod datapath;
pub mod dump;
mod error;
pub mod fixed;
pub mod hexfile;
pub mod layout;
pub mod params;
pub mod tensor;

pub use compare::{compare, ComparisonReport, Divergence};
pub use datapath::{
    pad_input, GoldenRecord, LayerConfig, LayerEmulator, LayerKind, LayerTrace, LenetNetwork,
    Stage,
};
pub use dump::{hwc_view, read_sim_output, write_sim_output, SimOutputFormat};
pub use error::{GoldenError, Result};
pub use fixed::{Activation, FixedPointFormat};
pub use layout::{BiasFormat, LaneOrder, LayoutDescriptor, PassGroup, WideWord};
pub use params::{read_image, write_image, InputPattern, LayerParameters, ParameterSet};
pub use tensor::{AxisOrder, BitWidth, Shape, Tensor};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        compare, hwc_view, read_image, read_sim_output, AxisOrder, BiasFormat, BitWidth,
        ComparisonReport, InputPattern, LayerConfig, LayerEmulator, LenetNetwork, ParameterSet,
        Result, SimOutputFormat, Stage, Tensor,
    };
}
