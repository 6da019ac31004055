#![forbid(unsafe_code)]

/// Compress a recalled fact to one payload-friendly line.
pub(crate) fn compact_fact(text: &str, max_len: usize) -> String {
    let flat = text.trim().replace('\n', " ");
    truncate_chars(&flat, max_len)
}

pub(crate) fn truncate_chars(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let mut out = value.chars().take(max_chars).collect::<String>();
    out.push_str("...");
    out
}
