use std::path::Path;

/// Longest name component kept in a staging file name, in bytes.
pub const MAX_STAGED_NAME_LEN: usize = 100;

/// Reduces an uploaded file name to something safe to embed in a local file name.
///
/// Only the last path component is kept, separators and reserved characters are
/// replaced with `_`, and the result is truncated on a char boundary.
pub fn sanitize_filename(filename: &str) -> String {
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        tracing::debug!("Stripping path components from upload name: {}", filename);
    }

    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_control()
                || c == '/'
                || c == '\\'
                || c == ':'
                || c == '*'
                || c == '?'
                || c == '"'
                || c == '<'
                || c == '>'
                || c == '|'
                || c == ';'
            {
                '_'
            } else {
                c
            }
        })
        .collect();

    let sanitized = if sanitized.len() > MAX_STAGED_NAME_LEN {
        let mut end = MAX_STAGED_NAME_LEN;
        while !sanitized.is_char_boundary(end) {
            end -= 1;
        }
        sanitized[..end].to_string()
    } else {
        sanitized
    };

    if sanitized.is_empty() {
        "unnamed".to_string()
    } else {
        sanitized
    }
}
