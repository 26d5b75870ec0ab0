//! URL safe base64 as used by GPP segments.
//!
//! Segments are unpadded: the bit string is first padded with zeroes to a
//! multiple of 8 bits, then to a multiple of 6 bits, and every 6 bits map to
//! one character of the URL safe alphabet.
use crate::core::{BitString, DecodeError, EncodeError};

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

fn base64_value(b: u8) -> Option<u8> {
    match b {
        b'A'..=b'Z' => Some(b - b'A'),
        b'a'..=b'z' => Some(b - b'a' + 26),
        b'0'..=b'9' => Some(b - b'0' + 52),
        b'-' => Some(62),
        b'_' => Some(63),
        _ => None,
    }
}

/// Decodes a base64 segment into exactly `6 * s.len()` bits.
pub fn decode_base64_url(s: &str) -> Result<BitString, DecodeError> {
    let values = s
        .char_indices()
        .map(|(offset, c)| {
            u8::try_from(c)
                .ok()
                .and_then(base64_value)
                .ok_or(DecodeError::InvalidBase64 {
                    offset,
                    character: c,
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(BitString::from_bits(
        values
            .into_iter()
            .flat_map(|n| (0..6).rev().map(move |i| (n >> i) & 1 == 1)),
    ))
}

/// Encodes bits with compressed padding, zero filled to a byte boundary then
/// to a 6 bit boundary.
pub fn encode_base64_url(bits: &BitString) -> Result<String, EncodeError> {
    let mut padded = bits.len().div_ceil(8) * 8;
    if padded % 6 != 0 {
        padded += 6 - padded % 6;
    }

    let mut r = bits.reader();
    let mut out = String::with_capacity((padded / 6) as usize);
    let mut consumed = 0;
    while consumed < padded {
        let available = r.remaining().min(6) as u32;
        let n = r
            .read_fixed_integer(available)
            .map_err(|_| EncodeError::UnalignedBits(bits.len()))?;
        let n = n << (6 - available);
        out.push(char::from(ALPHABET[n as usize]));
        consumed += 6;
    }

    Ok(out)
}
