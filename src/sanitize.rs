// src/sanitize.rs

/// Characters that cannot appear in a filename on common filesystems.
pub const RESERVED_CHARS: [char; 9] = ['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Maps a catalog title onto a filesystem-safe file stem.
///
/// Every reserved character is replaced with `_`; nothing else changes, so the
/// result has the same number of characters as the input. Empty input stays empty.
pub fn sanitize(title: &str) -> String {
    title
        .chars()
        .map(|c| if RESERVED_CHARS.contains(&c) { '_' } else { c })
        .collect()
}
