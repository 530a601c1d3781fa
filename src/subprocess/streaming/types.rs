//! Core types for streaming infrastructure

/// Stream source identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamSource {
    Stdout,
    Stderr,
}

impl StreamSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamSource::Stdout => "stdout",
            StreamSource::Stderr => "stderr",
        }
    }
}

/// Read size used when pulling raw chunks off a child pipe
pub const READ_CHUNK_SIZE: usize = 8192;

/// Capacity of the bounded channel between a reader task and its consumer
pub const EVENT_CHANNEL_CAPACITY: usize = 256;
