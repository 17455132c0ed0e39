//! CRC16 frame protection.
//!
//! Readers can be switched into CRC mode, in which every frame in both
//! directions carries a 16-bit checksum rendered as 4 uppercase hex
//! digits. The checksum uses the reflected polynomial 0x8408 with an
//! initial register of 0xFFFF, and covers the frame text plus the single
//! space that separates the text from the checksum digits.

/// Reflected CRC16 polynomial.
pub const CRC_POLY: u16 = 0x8408;

/// Initial CRC register value.
pub const CRC_INIT: u16 = 0xFFFF;

/// Feed one byte into the CRC register, LSB first.
fn crc16_update(mut crc: u16, byte: u8) -> u16 {
    crc ^= byte as u16;
    for _ in 0..8 {
        if crc & 1 != 0 {
            crc = (crc >> 1) ^ CRC_POLY;
        } else {
            crc >>= 1;
        }
    }
    crc
}

/// Compute the CRC16 of a byte sequence.
pub fn crc16(data: &[u8]) -> u16 {
    data.iter().fold(CRC_INIT, |crc, &b| crc16_update(crc, b))
}

/// Compute the checksum a frame with the given text must carry.
///
/// The checksum covers the text plus one trailing space, which is the
/// same space that separates the text from the rendered digits on the
/// wire.
pub fn frame_crc(text: &str) -> u16 {
    crc16_update(crc16(text.as_bytes()), b' ')
}

/// Append a frame checksum to a command, separated by a single space.
///
/// ```
/// use taglink_ascii::crc;
///
/// let framed = crc::append_crc("BRK");
/// assert!(framed.starts_with("BRK "));
/// assert_eq!(framed.len(), "BRK ".len() + 4);
/// ```
pub fn append_crc(text: &str) -> String {
    format!("{} {:04X}", text, frame_crc(text))
}

/// Validate a received line's checksum and return the text with the
/// checksum suffix removed.
///
/// The line must end in a space followed by 4 hex digits, and the
/// checksum computed over everything up to and including that space must
/// match the digits. Returns `None` if the line is too short, not in
/// checksum form, or fails validation. The protocol is ASCII, so a line
/// with multibyte characters (line noise surviving lossy decoding) is
/// rejected outright.
pub fn validate_and_strip(line: &str) -> Option<&str> {
    if line.len() < 5 || !line.is_ascii() {
        return None;
    }
    let (head, digits) = line.split_at(line.len() - 4);
    if !head.ends_with(' ') {
        return None;
    }
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let claimed = u16::from_str_radix(digits, 16).ok()?;
    if crc16(head.as_bytes()) != claimed {
        return None;
    }
    Some(&head[..head.len() - 1])
}
