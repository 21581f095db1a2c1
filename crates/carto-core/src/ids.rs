use xxhash_rust::xxh64::xxh64;

use crate::types::NodeKind;

const BASE62_CHARS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Encode a u64 value as a base62 string (11 chars, zero-padded).
fn base62_encode(mut value: u64) -> String {
    if value == 0 {
        return "0".repeat(11);
    }
    let mut result = Vec::with_capacity(11);
    while value > 0 {
        let idx = (value % 62) as usize;
        result.push(BASE62_CHARS[idx]);
        value /= 62;
    }
    // Pad to 11 chars
    while result.len() < 11 {
        result.push(b'0');
    }
    result.reverse();
    String::from_utf8(result).expect("base62 chars are valid UTF-8")
}

/// Compute the deterministic node ID.
///
/// id = base62(xxhash64(kind + file_path + qualified_name + start_line))
///
/// Stable across reruns iff the entity's position and name are stable, which
/// makes sync a delete-and-reinsert per file and keeps cross-run citations
/// valid without any global ID negotiation.
pub fn node_id(kind: NodeKind, file_path: &str, qualified_name: &str, start_line: u32) -> String {
    let kind = kind.as_str();
    let line = start_line.to_string();
    let mut input =
        String::with_capacity(kind.len() + file_path.len() + qualified_name.len() + line.len() + 3);
    input.push_str(kind);
    input.push('\0'); // separator
    input.push_str(file_path);
    input.push('\0');
    input.push_str(qualified_name);
    input.push('\0');
    input.push_str(&line);

    base62_encode(xxh64(input.as_bytes(), 0))
}

/// Content hash of a file's raw bytes, used for change detection.
pub fn content_hash(bytes: &[u8]) -> String {
    base62_encode(xxh64(bytes, 0))
}
