//! Turning run events into size-bounded chat blocks
//!
//! The [`Accumulator`] owns the document for one run; [`Block`]s are what the
//! chat channel receives.

pub mod accumulator;
pub mod blocks;
pub mod format;
pub mod split;

pub use accumulator::{Accumulator, Segment};
pub use blocks::{
    enforce_block_limit, error_banner, exit_code_banner, to_plain_text, Block, RenderLimits,
};
pub use split::{split_chunks, split_text};
