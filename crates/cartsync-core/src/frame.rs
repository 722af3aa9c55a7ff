//! Frame normalization.

/// Separator used when several queued frames are written as one.
pub const FRAME_SEPARATOR: u8 = b'\n';

/// Normalize an inbound frame before it reaches the hub.
///
/// Line breaks become spaces and surrounding whitespace is trimmed, so a
/// normalized frame never contains [`FRAME_SEPARATOR`]. UTF-8 frames are
/// trimmed of Unicode whitespace (including `\x0B`, U+0085 and U+00A0);
/// other frames only of ASCII whitespace.
pub fn normalize(raw: &[u8]) -> Vec<u8> {
    let trimmed = match std::str::from_utf8(raw) {
        Ok(text) => text.trim().as_bytes(),
        Err(_) => raw.trim_ascii(),
    };
    trimmed
        .iter()
        .map(|&b| if b == FRAME_SEPARATOR { b' ' } else { b })
        .collect()
}
