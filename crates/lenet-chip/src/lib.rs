// SPDX-License-Identifier: AGPL-3.0-only

//! Silicon model of the LeNet-5 convolution accelerator.
//!
//! This crate has **no dependencies**. It is a pure description of the
//! datapath as the RTL builds it: buffer word widths,
//! which channel sits in which lane, how channel counts larger than the
//! systolic width are split into reload passes, and the per-layer geometry
//! of the LeNet-5 network the accelerator runs.
//!
//! Everything here is a hardware contract. The golden model in
//! `lenet-golden` is parameterized with these values; it never discovers
//! them at runtime.
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`lanes`] | Lane widths, lanes per word, lane order contract |
//! | [`quant`] | Fixed-point formats and the requantization shift |
//! | [`layers`] | LeNet-5 layer geometry (conv1, conv2, fc1..fc3) |
//! | [`files`] | Init file names consumed by the testbench loaders |

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod files;
pub mod lanes;
pub mod layers;
pub mod quant;
