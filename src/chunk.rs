//! Splitting outbound messages into size-bounded chunks.
//!
//! Chat transports cap message length. Splitting happens at line
//! boundaries so formatted agent output stays readable; only a line that
//! alone exceeds the limit is hard-split mid-line.

/// Split `text` into chunks of at most `limit` characters.
///
/// Lines are never split across chunks unless a single line exceeds the
/// limit by itself. For inputs without such oversize lines, joining the
/// chunks with `"\n"` reproduces the input exactly.
pub fn chunkify(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut buf: Vec<&str> = Vec::new();
    let mut length = 0usize;

    for line in text.split('\n') {
        for piece in split_oversize(line, limit) {
            let piece_len = piece.chars().count();
            if length + piece_len + 1 > limit && !buf.is_empty() {
                chunks.push(buf.join("\n"));
                buf.clear();
                length = 0;
            }
            buf.push(piece);
            length += piece_len + 1;
        }
    }

    if !buf.is_empty() {
        chunks.push(buf.join("\n"));
    }
    chunks
}

/// Split a single line into pieces of at most `limit` characters.
///
/// Returns the line unchanged when it fits. Splits respect char
/// boundaries, never bytes.
fn split_oversize(line: &str, limit: usize) -> Vec<&str> {
    if line.chars().count() <= limit {
        return vec![line];
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (idx, _) in line.char_indices() {
        if count == limit {
            pieces.push(&line[start..idx]);
            start = idx;
            count = 0;
        }
        count += 1;
    }
    pieces.push(&line[start..]);
    pieces
}
