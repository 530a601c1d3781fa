//! Line decoders for structured subprocess output

use serde::de::DeserializeOwned;
use std::marker::PhantomData;

/// Decodes newline-delimited JSON, skipping anything that is not a valid record.
///
/// Tools tend to print banners or warnings before their JSON stream starts, so
/// a line that fails to parse is counted and dropped instead of failing the run.
#[derive(Debug)]
pub struct JsonLineDecoder<T> {
    decoded: usize,
    discarded: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> JsonLineDecoder<T> {
    pub fn new() -> Self {
        Self {
            decoded: 0,
            discarded: 0,
            _marker: PhantomData,
        }
    }

    /// Decode one line; `None` for blank or unparsable input
    pub fn decode(&mut self, line: &str) -> Option<T> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }

        match serde_json::from_str::<T>(trimmed) {
            Ok(value) => {
                self.decoded += 1;
                Some(value)
            }
            Err(e) => {
                self.discarded += 1;
                tracing::trace!("Discarding non-JSON line ({}): {}", e, trimmed);
                None
            }
        }
    }

    pub fn decoded(&self) -> usize {
        self.decoded
    }

    pub fn discarded(&self) -> usize {
        self.discarded
    }
}

impl<T: DeserializeOwned> Default for JsonLineDecoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_decodes_json_and_skips_noise() {
        let mut decoder = JsonLineDecoder::<Value>::new();

        let inputs = [
            r#"{"key": "value1"}"#,
            "Starting opencode...",
            "",
            r#"{"key": "value2"}"#,
            "{broken",
        ];
        let values: Vec<Value> = inputs.iter().filter_map(|l| decoder.decode(l)).collect();

        assert_eq!(values.len(), 2);
        assert_eq!(values[0]["key"], "value1");
        assert_eq!(values[1]["key"], "value2");
        assert_eq!(decoder.decoded(), 2);
        assert_eq!(decoder.discarded(), 2);
    }
}
