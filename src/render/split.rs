//! Lossless splitting of long text into size-bounded chunks

/// A piece of split text and whether a newline was consumed right after it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub newline_stripped: bool,
}

/// Split `text` into chunks of at most `limit` characters.
///
/// Each cut prefers the last newline within the limit (the newline itself is
/// dropped), then the last space (kept at the end of the chunk), then a hard
/// cut. Re-joining the chunks, with a newline restored after each chunk that
/// had one stripped, reproduces the input exactly.
pub fn split_chunks(text: &str, limit: usize) -> Vec<Chunk> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut rest = text;

    while let Some((cut, _)) = rest.char_indices().nth(limit) {
        let window = &rest[..cut];

        if rest[cut..].starts_with('\n') {
            chunks.push(Chunk {
                text: window.to_string(),
                newline_stripped: true,
            });
            rest = &rest[cut + 1..];
        } else if let Some(pos) = window.rfind('\n').filter(|pos| *pos > 0) {
            chunks.push(Chunk {
                text: window[..pos].to_string(),
                newline_stripped: true,
            });
            rest = &rest[pos + 1..];
        } else if let Some(pos) = window.rfind(' ').filter(|pos| *pos > 0) {
            chunks.push(Chunk {
                text: rest[..=pos].to_string(),
                newline_stripped: false,
            });
            rest = &rest[pos + 1..];
        } else {
            chunks.push(Chunk {
                text: window.to_string(),
                newline_stripped: false,
            });
            rest = &rest[cut..];
        }
    }

    if !rest.is_empty() {
        chunks.push(Chunk {
            text: rest.to_string(),
            newline_stripped: false,
        });
    }
    chunks
}

pub fn split_text(text: &str, limit: usize) -> Vec<String> {
    split_chunks(text, limit)
        .into_iter()
        .map(|chunk| chunk.text)
        .collect()
}

/// Shorten `text` to at most `limit` characters, marking the cut with an ellipsis
pub fn clip(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit.saturating_sub(1)) {
        Some((cut, _)) if text[cut..].chars().count() > 1 => format!("{}…", &text[..cut]),
        _ => text.to_string(),
    }
}
