use std::borrow::Cow;

/// Returns `true` for bytes that must never reach the published feed:
/// DEL and C0 controls other than tab, newline and carriage return.
#[inline]
fn is_stripped_byte(b: u8) -> bool {
    b == 0x7f || (b < 0x20 && b != 0x09 && b != 0x0a && b != 0x0d)
}

/// Strips control characters from scraped text.
///
/// Removes NUL, BEL, ESC and the rest of the C0 range plus DEL. These are not
/// legal in XML 1.0 documents, so a single stray byte in a scraped title would
/// otherwise make the whole feed unparseable for readers.
///
/// Preserves: tab (0x09), newline (0x0A), carriage return (0x0D).
///
/// Returns `Cow::Borrowed` when the input is already clean (the common case).
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    let bytes = s.as_bytes();

    if !bytes.iter().any(|&b| is_stripped_byte(b)) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if is_stripped_byte(bytes[i]) {
            i += 1;
            continue;
        }

        let start = i;
        i += 1;
        while i < bytes.len() && !is_stripped_byte(bytes[i]) {
            i += 1;
        }
        // SAFETY: we only break on ASCII control bytes, which cannot appear
        // mid-codepoint in valid UTF-8, so s[start..i] is valid UTF-8.
        out.push_str(&s[start..i]);
    }

    Cow::Owned(out)
}

/// Collapses every run of whitespace into a single space and trims both ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalizes a scraped text node for storage: control characters stripped,
/// whitespace collapsed.
pub fn clean_text(s: &str) -> String {
    collapse_whitespace(&strip_control_chars(s))
}

/// Truncates to at most `max_chars` characters, never splitting a codepoint.
pub fn truncate_chars(s: &str, max_chars: usize) -> Cow<'_, str> {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => Cow::Owned(s[..idx].to_owned()),
        None => Cow::Borrowed(s),
    }
}
