use crate::interpreter::OPERATORS;

/// Find the first complete command in free-form model output.
///
/// Scans for `(`, checks that the head symbol is a known operator, then walks
/// forward balancing parentheses while skipping over string literals. Nested
/// lists of any depth are returned whole. Candidates that never close are
/// skipped and the scan continues after their opening paren.
pub fn extract_command(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut pos = 0;
    while let Some(offset) = text[pos..].find('(') {
        let start = pos + offset;
        if head_is_operator(&text[start + 1..]) {
            if let Some(end) = balanced_end(bytes, start) {
                return Some(&text[start..=end]);
            }
        }
        pos = start + 1;
    }
    None
}

fn head_is_operator(rest: &str) -> bool {
    let rest = rest.trim_start();
    let head_len = rest
        .find(|c: char| c.is_whitespace() || c == '(' || c == ')' || c == '"')
        .unwrap_or(rest.len());
    OPERATORS.contains(&&rest[..head_len])
}

/// Byte index of the paren closing the one at `start`.
fn balanced_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}
