//! Incremental capture of subprocess output
//!
//! Raw pipe chunks are split into lines by [`LineBuffer`] and structured lines
//! are decoded by [`JsonLineDecoder`]. Consumers read the results through a
//! bounded channel so a slow consumer applies backpressure to the reader.

pub mod lines;
pub mod processor;
pub mod types;

pub use lines::LineBuffer;
pub use processor::JsonLineDecoder;
pub use types::{StreamSource, EVENT_CHANNEL_CAPACITY, READ_CHUNK_SIZE};
