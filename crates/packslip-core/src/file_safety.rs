//! Filename sanitation for uploads, extracted identifiers and archive names.

/// Longest file name produced, in bytes.
const MAX_FILENAME_LEN: usize = 255;

/// Sanitize an uploaded filename for safe storage.
///
/// Strips directory components, replaces characters that are unsafe on
/// common filesystems, and bounds the length while keeping the extension.
pub fn sanitize_filename(filename: &str) -> String {
    // Remove path components
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);

    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let sanitized = sanitized.trim();
    if sanitized.is_empty() || sanitized == "." || sanitized == ".." {
        return "unnamed_file".to_string();
    }

    if sanitized.len() > MAX_FILENAME_LEN {
        let (stem, ext) = match sanitized.rfind('.') {
            Some(dot) if sanitized.len() - dot < MAX_FILENAME_LEN => {
                (&sanitized[..dot], &sanitized[dot..])
            }
            _ => (sanitized, ""),
        };
        return format!("{}{}", truncate_bytes(stem, MAX_FILENAME_LEN - ext.len()), ext);
    }

    sanitized.to_string()
}

/// Make an extracted item identifier usable as a file name component.
///
/// Path separators become `_` and surrounding whitespace is trimmed; nothing
/// else changes, so identifiers stay recognisable.
pub fn sanitize_item_id(item_id: &str) -> String {
    item_id.replace(['/', '\\'], "_").trim().to_string()
}

/// Stem of an uploaded filename, used to name the finished archive.
///
/// Returns `None` when nothing usable is left after sanitation.
pub fn archive_stem(original_filename: &str) -> Option<String> {
    let name = sanitize_filename(original_filename);
    if name == "unnamed_file" {
        return None;
    }
    let stem = match name.rfind('.') {
        Some(0) | None => name.as_str(),
        Some(dot) => &name[..dot],
    };
    let stem = stem.trim();
    if stem.is_empty() {
        None
    } else {
        Some(stem.to_string())
    }
}

fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
