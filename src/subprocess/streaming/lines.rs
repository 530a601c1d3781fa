//! Incremental newline splitting over raw byte chunks

/// Accumulates bytes from a pipe and yields complete lines as they appear.
///
/// Chunks may end in the middle of a line or even in the middle of a UTF-8
/// sequence; bytes stay buffered until their terminating `\n` arrives, so
/// decoding only ever happens on whole lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning every line it completed (without terminators)
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.pending[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            lines.push(decode_line(&self.pending[start..end]));
            start = end + 1;
        }
        self.pending.drain(..start);
        lines
    }

    /// Take whatever partial line remains after the stream closed
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = decode_line(&self.pending);
        self.pending.clear();
        if line.trim().is_empty() {
            None
        } else {
            Some(line)
        }
    }

    pub fn buffered_len(&self) -> usize {
        self.pending.len()
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splits_complete_lines() {
        let mut buffer = LineBuffer::new();
        let lines = buffer.push(b"one\ntwo\nthr");
        assert_eq!(lines, vec!["one", "two"]);
        assert_eq!(buffer.buffered_len(), 3);

        let lines = buffer.push(b"ee\n");
        assert_eq!(lines, vec!["three"]);
        assert_eq!(buffer.finish(), None);
    }

    #[test]
    fn test_line_split_across_many_chunks() {
        let mut buffer = LineBuffer::new();
        let mut seen = Vec::new();
        for byte in br#"{"type":"text"}"#.iter() {
            seen.extend(buffer.push(&[*byte]));
        }
        assert!(seen.is_empty());
        seen.extend(buffer.push(b"\n"));
        assert_eq!(seen, vec![r#"{"type":"text"}"#]);
    }

    #[test]
    fn test_multibyte_char_split_between_chunks() {
        let mut buffer = LineBuffer::new();
        let bytes = "héllo\n".as_bytes();
        // Split inside the two-byte 'é'
        assert!(buffer.push(&bytes[..2]).is_empty());
        assert_eq!(buffer.push(&bytes[2..]), vec!["héllo"]);
    }

    #[test]
    fn test_strips_carriage_return() {
        let mut buffer = LineBuffer::new();
        assert_eq!(buffer.push(b"a\r\nb\r\n"), vec!["a", "b"]);
    }

    #[test]
    fn test_finish_returns_trailing_partial() {
        let mut buffer = LineBuffer::new();
        buffer.push(b"done\n{\"partial\":true}");
        assert_eq!(buffer.finish().as_deref(), Some("{\"partial\":true}"));
        assert_eq!(buffer.finish(), None);
    }

    #[test]
    fn test_finish_ignores_whitespace_tail() {
        let mut buffer = LineBuffer::new();
        buffer.push(b"x\n  ");
        assert_eq!(buffer.finish(), None);
    }
}
