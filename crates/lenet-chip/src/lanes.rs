// SPDX-License-Identifier: AGPL-3.0-only

//! Buffer word geometry and the lane order contract.
//!
//! The systolic array processes [`LANE_COUNT`] channels in parallel. Every
//! on-chip buffer that feeds it is therefore one wide word per address, made
//! of `LANE_COUNT` lanes:
//!
//! | Buffer | Lane width | Word width | Content per address |
//! |--------|-----------|------------|---------------------|
//! | Weight ROM | 8 bit | 48 bit | one kernel tap for 6 output channels |
//! | Bias buffer | 32 bit | 192 bit | bias for the 6 channels of one pass |
//! | Feature map | 8 bit | 48 bit | one pixel for 6 channels |
//!
//! ## Lane order
//!
//! ```text
//!  bit 47        40 39        32        ...        15         8 7          0
//! +-------------+-------------+-------------------+-------------+-----------+
//! |   lane 5    |   lane 4    |        ...        |   lane 1    |  lane 0   |
//! |   ch  5     |   ch  4     |                   |   ch  1     |  ch  0    |
//! +-------------+-------------+-------------------+-------------+-----------+
//! ```
//!
//! Channel 0 of a pass occupies the least-significant lane. This was settled
//! by computing output (0,0) of conv1 under both assignments and matching
//! the hardware dump: array row 0 reads bits `[7:0]`. The reversed order is
//! kept as [`LaneOrder::MsbFirst`] only so the contract can be tested.

/// Parallel channels per hardware pass (systolic array rows).
pub const LANE_COUNT: usize = 6;

/// Lane width of weight, image and feature-map words.
pub const DATA_LANE_BITS: u32 = 8;

/// Lane width of bias words (accumulator width).
pub const BIAS_LANE_BITS: u32 = 32;

/// Mapping between channel index within a pass and lane position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LaneOrder {
    /// Channel 0 in the least-significant lane. The hardware contract.
    LsbFirst,
    /// Channel 0 in the most-significant lane. Rejected hypothesis.
    MsbFirst,
}

impl LaneOrder {
    /// Lane position that carries channel `index` of a `lane_count`-lane word.
    #[must_use]
    pub const fn lane_of(self, index: usize, lane_count: usize) -> usize {
        match self {
            Self::LsbFirst => index,
            Self::MsbFirst => lane_count - 1 - index,
        }
    }
}

/// Lane order used by every buffer on the accelerator.
pub const HARDWARE_LANE_ORDER: LaneOrder = LaneOrder::LsbFirst;

/// Number of reload passes needed for `channels` channels.
#[must_use]
pub const fn pass_count(channels: usize, lanes: usize) -> usize {
    channels.div_ceil(lanes)
}
