//! Naming helpers for storage keys and draft identifiers.

/// Convert an arbitrary key into a filesystem-safe identifier.
///
/// Lowercase letters, digits and `-` pass through; everything else is
/// hex-escaped as `_xx` per UTF-8 byte, so distinct keys never share a file
/// (including on case-insensitive filesystems).
pub fn safe_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' {
            out.push(ch);
        } else {
            let mut buf = [0u8; 4];
            for b in ch.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("_{b:02x}"));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_simple_ids() {
        assert_eq!(safe_name("agent-123"), "agent-123");
    }

    #[test]
    fn escapes_separators_and_case() {
        assert_eq!(safe_name("agent-draft:create"), "agent-draft_3acreate");
        assert_ne!(safe_name("a/b"), safe_name("a_b"));
        assert_ne!(safe_name("Ab"), safe_name("ab"));
    }
}
