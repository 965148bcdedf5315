use encoding_rs::WINDOWS_1252;

/// Reads raw symbol bytes as UTF-8, falling back to Latin-1. Some state printers emit
/// single-byte text in byte mode without an ECI header.
pub fn decode_text(bytes: &[u8]) -> Option<String> {
    if let Ok(s) = std::str::from_utf8(bytes) {
        return Some(s.to_owned());
    }

    let (text, had_errors) = WINDOWS_1252.decode_without_bom_handling(bytes);
    (!had_errors).then(|| text.into_owned())
}
