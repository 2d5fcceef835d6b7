//! Wire encoding
//!
//! Every message travels as `<BOR>` + body + `<EOR>`, encoded as UTF-16LE
//! without a byte-order mark, followed by the raw trailer `03 04 07`.

/// Textual begin-of-record marker.
pub const BOR: &str = "<BOR>";

/// Textual end-of-record marker.
pub const EOR: &str = "<EOR>";

/// Raw bytes appended after the encoded envelope.
pub const TRAILER: [u8; 3] = [0x03, 0x04, 0x07];

/// Control characters the trailer turns into once it lands in decoded text.
pub const TRAILER_CHARS: [char; 3] = ['\u{3}', '\u{4}', '\u{7}'];

/// Encodes text as UTF-16LE.
pub fn encode_utf16le(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(|unit| unit.to_le_bytes()).collect()
}

/// Decodes UTF-16LE, dropping unpaired surrogates and any odd trailing byte.
pub fn decode_utf16le_lossy(bytes: &[u8]) -> String {
    let units = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]));

    char::decode_utf16(units).filter_map(|c| c.ok()).collect()
}

/// Removes trailer control characters from decoded text.
pub fn strip_trailer_chars(text: &str) -> String {
    text.chars().filter(|c| !TRAILER_CHARS.contains(c)).collect()
}

/// Builds the outbound byte form of a message body.
///
/// Markers are added only where missing, so a body that already carries
/// `<BOR>` or `<EOR>` is not double-wrapped.
pub fn encode_message(body: &str) -> Vec<u8> {
    let mut text = String::with_capacity(body.len() + BOR.len() + EOR.len());
    if !body.starts_with(BOR) {
        text.push_str(BOR);
    }
    text.push_str(body);
    if !body.ends_with(EOR) {
        text.push_str(EOR);
    }

    let mut bytes = encode_utf16le(&text);
    bytes.extend_from_slice(&TRAILER);
    bytes
}

/// Renders bytes as lowercase hex without separators.
pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
