//! Functions to convert a Rust string to a Java Modified UTF-8 byte array and vice versa.
//!
//! Modified UTF-8 differs from standard UTF-8 in two ways: U+0000 is encoded as the two byte
//! sequence `C0 80`, and supplementary code points are encoded as CESU-8 surrogate pairs (two
//! three-byte sequences) rather than a single four-byte sequence.
//!
//! Decoding is lenient: bytes that do not form a valid sequence are skipped rather than
//! rejected. Obfuscated class files routinely carry ill-formed UTF-8 payloads, and a pool that
//! refuses to load makes the rest of the file unreachable.

/// Converts a Rust string to a Java Modified UTF-8 byte array.
#[must_use]
pub fn to_bytes(data: &str) -> Vec<u8> {
    let mut encoded = Vec::with_capacity(data.len());

    for ch in data.chars() {
        let code = ch as u32;
        match code {
            0x0000 => encoded.extend_from_slice(&[0xC0, 0x80]),
            0x0001..=0x007F => encoded.push(code as u8),
            0x0080..=0x07FF => {
                encoded.push(0xC0 | ((code >> 6) as u8));
                encoded.push(0x80 | ((code & 0x3F) as u8));
            }
            0x0800..=0xFFFF => {
                encoded.push(0xE0 | ((code >> 12) as u8));
                encoded.push(0x80 | (((code >> 6) & 0x3F) as u8));
                encoded.push(0x80 | ((code & 0x3F) as u8));
            }
            _ => {
                // CESU-8: encode the UTF-16 surrogate pair as two 3-byte sequences
                let value = code - 0x1_0000;
                let high = 0xD800 + (value >> 10);
                let low = 0xDC00 + (value & 0x3FF);
                for surrogate in [high, low] {
                    encoded.push(0xE0 | ((surrogate >> 12) as u8));
                    encoded.push(0x80 | (((surrogate >> 6) & 0x3F) as u8));
                    encoded.push(0x80 | ((surrogate & 0x3F) as u8));
                }
            }
        }
    }

    encoded
}

/// Converts a Java Modified UTF-8 byte array to a Rust string.
///
/// Ill-formed sequences are skipped. A high surrogate followed by a low surrogate is combined
/// into a supplementary code point; a lone surrogate is dropped.
#[must_use]
pub fn from_bytes(bytes: &[u8]) -> String {
    let mut decoded = String::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        let (code, length) = match decode_one(&bytes[i..]) {
            Some(result) => result,
            None => {
                i += 1;
                continue;
            }
        };

        if (0xD800..=0xDBFF).contains(&code) {
            // High surrogate: combine with a following low surrogate when present
            if let Some((low, low_length)) = decode_one(&bytes[i + length..]) {
                if (0xDC00..=0xDFFF).contains(&low) {
                    let value = 0x1_0000 + ((code - 0xD800) << 10) + (low - 0xDC00);
                    if let Some(ch) = char::from_u32(value) {
                        decoded.push(ch);
                    }
                    i += length + low_length;
                    continue;
                }
            }
            i += length;
        } else if let Some(ch) = char::from_u32(code) {
            decoded.push(ch);
            i += length;
        } else {
            i += length;
        }
    }

    decoded
}

/// Decode a single one-to-three byte sequence, returning the code unit and its encoded length.
///
/// Returns `None` when the leading byte does not start a well-formed sequence. Four-byte
/// standard UTF-8 is also accepted so files written by tools that ignore the CESU-8 rule still
/// decode.
fn decode_one(bytes: &[u8]) -> Option<(u32, usize)> {
    let byte1 = *bytes.first()?;

    if byte1 & 0x80 == 0 {
        return Some((u32::from(byte1), 1));
    }
    if byte1 & 0xE0 == 0xC0 {
        let byte2 = *bytes.get(1)?;
        if byte2 & 0xC0 != 0x80 {
            return None;
        }
        let code = (u32::from(byte1 & 0x1F) << 6) | u32::from(byte2 & 0x3F);
        return Some((code, 2));
    }
    if byte1 & 0xF0 == 0xE0 {
        let byte2 = *bytes.get(1)?;
        let byte3 = *bytes.get(2)?;
        if byte2 & 0xC0 != 0x80 || byte3 & 0xC0 != 0x80 {
            return None;
        }
        let code = (u32::from(byte1 & 0x0F) << 12)
            | (u32::from(byte2 & 0x3F) << 6)
            | u32::from(byte3 & 0x3F);
        return Some((code, 3));
    }
    if byte1 & 0xF8 == 0xF0 {
        let byte2 = *bytes.get(1)?;
        let byte3 = *bytes.get(2)?;
        let byte4 = *bytes.get(3)?;
        if byte2 & 0xC0 != 0x80 || byte3 & 0xC0 != 0x80 || byte4 & 0xC0 != 0x80 {
            return None;
        }
        let code = (u32::from(byte1 & 0x07) << 18)
            | (u32::from(byte2 & 0x3F) << 12)
            | (u32::from(byte3 & 0x3F) << 6)
            | u32::from(byte4 & 0x3F);
        return Some((code, 4));
    }
    None
}

#[cfg(test)]
mod test {
    use super::*;

    #[test_log::test]
    fn test_to_bytes_basic_planes() {
        let data = "\u{0000}\u{007F}\u{0080}\u{07FF}\u{0800}\u{FFFF}";
        let expected = vec![
            0xC0, 0x80, // '\u{0000}'
            0x7F, // '\u{007F}'
            0xC2, 0x80, // '\u{0080}'
            0xDF, 0xBF, // '\u{07FF}'
            0xE0, 0xA0, 0x80, // '\u{0800}'
            0xEF, 0xBF, 0xBF, // '\u{FFFF}'
        ];
        assert_eq!(to_bytes(data), expected);
    }

    #[test_log::test]
    fn test_supplementary_cesu8() {
        // U+10400 = surrogate pair D801/DC00
        let bytes = to_bytes("\u{10400}");
        assert_eq!(bytes, vec![0xED, 0xA0, 0x81, 0xED, 0xB0, 0x80]);
        assert_eq!(from_bytes(&bytes), "\u{10400}");
    }

    #[test_log::test]
    fn test_round_trip_all_chars() {
        for i in (0..=0x10_FFFF).step_by(257) {
            if let Some(ch) = char::from_u32(i) {
                let s = ch.to_string();
                assert_eq!(from_bytes(&to_bytes(&s)), s, "code point {i:#x}");
            }
        }
    }

    #[test_log::test]
    fn test_from_bytes_skips_ill_formed() {
        // Continuation byte with no lead, then 'A'
        assert_eq!(from_bytes(&[0x80, 0x41]), "A");
        // Truncated two byte sequence at end of input
        assert_eq!(from_bytes(&[0x41, 0xC2]), "A");
        // Lead byte with an invalid continuation: both skipped independently
        assert_eq!(from_bytes(&[0xE0, 0x41, 0x42]), "AB");
    }

    #[test_log::test]
    fn test_from_bytes_lone_surrogate_dropped() {
        // A high surrogate with no low surrogate following
        let bytes = [0xED, 0xA0, 0x81, 0x41];
        assert_eq!(from_bytes(&bytes), "A");
    }

    #[test_log::test]
    fn test_from_bytes_standard_utf8_supplementary() {
        // Four byte standard UTF-8 is tolerated on input
        assert_eq!(from_bytes(&[0xF0, 0x90, 0x90, 0x80]), "\u{10400}");
    }

    #[test_log::test]
    fn test_null_round_trip() {
        let bytes = to_bytes("a\u{0000}b");
        assert_eq!(bytes, vec![0x61, 0xC0, 0x80, 0x62]);
        assert_eq!(from_bytes(&bytes), "a\u{0000}b");
    }
}
