//! Bit level building blocks of the GPP wire format.
//!
//! A [`BitString`] is an exactly sized sequence of bits. Values are written to
//! it with a [`DataWriter`] and read back with a [`DataReader`], which never
//! reads past the declared length of the string.
use crate::core::fibonacci::{fibonacci_iterator, zeckendorf_bits};
use bitstream_io::{BigEndian, BitRead, BitReader, BitWrite, BitWriter};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

pub mod base64;
pub mod datatype;
mod error;
mod fibonacci;
pub mod range;

pub use error::{DecodeError, EncodeError, SubstringError};

/// An ordered set of vendor, purpose or section identifiers.
pub type IdSet = BTreeSet<u16>;

const STRING_CHAR_BITS: u32 = 6;
const STRING_SPACE: u64 = 63;
const DATETIME_BITS: u32 = 36;

/// An owned sequence of bits.
///
/// Bits are stored most significant first. The unused bits of the last byte
/// are always zero, so two bit strings with the same bits compare equal.
#[derive(Clone, Default, Eq, Hash, PartialEq)]
pub struct BitString {
    bytes: Vec<u8>,
    len: u64,
}

impl BitString {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(mut bytes: Vec<u8>, len: u64) -> Self {
        let needed = len.div_ceil(8) as usize;
        bytes.resize(needed, 0);
        if len % 8 != 0 {
            if let Some(last) = bytes.last_mut() {
                *last &= 0xff << (8 - len % 8);
            }
        }
        Self { bytes, len }
    }

    pub fn from_bits<I: IntoIterator<Item = bool>>(bits: I) -> Self {
        let mut bytes = vec![];
        let mut len = 0;
        for bit in bits {
            if len % 8 == 0 {
                bytes.push(0);
            }
            if bit {
                if let Some(last) = bytes.last_mut() {
                    *last |= 0x80 >> (len % 8);
                }
            }
            len += 1;
        }
        Self { bytes, len }
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the bit at `index`, or `None` past the end of the string.
    pub fn bit(&self, index: u64) -> Option<bool> {
        if index >= self.len {
            return None;
        }
        let byte = self.bytes[(index / 8) as usize];
        Some((byte >> (7 - index % 8)) & 1 == 1)
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.len).map(|i| self.bit(i) == Some(true))
    }

    pub fn reader(&self) -> DataReader<'_> {
        DataReader::new(&self.bytes, self.len)
    }

    /// Returns a reader positioned `offset` bits into the string.
    pub fn reader_at(&self, offset: u64) -> Result<DataReader<'_>, DecodeError> {
        let mut r = self.reader();
        r.skip(offset)?;
        Ok(r)
    }

    /// Copies the bits in `start..end`, clamped to the string length.
    pub fn slice(&self, start: u64, end: u64) -> BitString {
        let end = end.min(self.len);
        let start = start.min(end);
        BitString::from_bits((start..end).map(|i| self.bit(i) == Some(true)))
    }
}

impl fmt::Display for BitString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for bit in self.iter() {
            f.write_str(if bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl fmt::Debug for BitString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitString({self})")
    }
}

/// Parses literal binary digits. Any other character is ignored, so that
/// groups of bits can be separated for readability.
impl FromStr for BitString {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_bits(
            s.chars()
                .filter(|&c| c == '0' || c == '1')
                .map(|c| c == '1'),
        ))
    }
}

/// Reads primitive values from a [`BitString`].
pub struct DataReader<'a> {
    bytes: &'a [u8],
    reader: BitReader<&'a [u8], BigEndian>,
    position: u64,
    len: u64,
}

impl<'a> DataReader<'a> {
    pub fn new(bytes: &'a [u8], len: u64) -> Self {
        Self {
            bytes,
            reader: BitReader::endian(bytes, BigEndian),
            position: 0,
            len: len.min(bytes.len() as u64 * 8),
        }
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn remaining(&self) -> u64 {
        self.len - self.position
    }

    /// Returns an independent reader at the same position.
    pub fn fork(&self) -> Result<DataReader<'a>, DecodeError> {
        let mut r = DataReader::new(self.bytes, self.len);
        r.skip(self.position)?;
        Ok(r)
    }

    fn ensure(&self, needed: u64) -> Result<(), DecodeError> {
        if needed > self.remaining() {
            return Err(DecodeError::UnexpectedEnd {
                position: self.position,
                needed,
                available: self.remaining(),
            });
        }
        Ok(())
    }

    pub fn skip(&mut self, bits: u64) -> Result<(), DecodeError> {
        self.ensure(bits)?;
        let mut left = bits;
        while left > 0 {
            let step = left.min(u64::from(u32::MAX)) as u32;
            self.reader.skip(step)?;
            left -= u64::from(step);
        }
        self.position += bits;
        Ok(())
    }

    pub fn read_bool(&mut self) -> Result<bool, DecodeError> {
        self.ensure(1)?;
        let bit = self.reader.read_bit()?;
        self.position += 1;
        Ok(bit)
    }

    pub fn read_fixed_integer(&mut self, bits: u32) -> Result<u64, DecodeError> {
        self.ensure(u64::from(bits))?;
        if bits == 0 {
            return Ok(0);
        }
        if bits > 64 {
            // only leading zeroes fit in a u64
            for _ in 0..bits - 64 {
                if self.read_bool()? {
                    return Err(DecodeError::InvalidValue {
                        expected: "an integer of at most 64 bits".to_string(),
                        found: format!("a {bits} bits integer"),
                    });
                }
            }
            return self.read_fixed_integer(64);
        }
        let n = self.reader.read_unsigned_var::<u64>(bits)?;
        self.position += u64::from(bits);
        Ok(n)
    }

    /// Reads a Zeckendorf encoded integer terminated by two consecutive ones.
    pub fn read_fibonacci_integer(&mut self) -> Result<u64, DecodeError> {
        let start = self.position;
        let mut fib = fibonacci_iterator::<u64>();
        let mut total = 0u64;
        let mut last_bit = false;

        loop {
            let bit = self.read_bool()?;

            // two consecutive 1's signal the end of the value
            if last_bit && bit {
                break;
            }

            let fib_value = fib.next();
            if bit {
                total = fib_value
                    .and_then(|v| total.checked_add(v))
                    .ok_or_else(|| DecodeError::InvalidValue {
                        expected: "a fibonacci integer fitting in 64 bits".to_string(),
                        found: format!("{} bits", self.position - start),
                    })?;
            }
            last_bit = bit;
        }

        Ok(total)
    }

    pub fn skip_fibonacci_integer(&mut self) -> Result<(), DecodeError> {
        let mut last_bit = false;
        loop {
            let bit = self.read_bool()?;
            if last_bit && bit {
                return Ok(());
            }
            last_bit = bit;
        }
    }

    pub fn read_string(&mut self, chars: usize) -> Result<String, DecodeError> {
        self.ensure(chars as u64 * u64::from(STRING_CHAR_BITS))?;
        (0..chars)
            .map(|_| {
                self.read_fixed_integer(STRING_CHAR_BITS).map(|n| match n {
                    STRING_SPACE => ' ',
                    n => char::from(b'A' + n as u8),
                })
            })
            .collect()
    }

    /// Reads a datetime as seconds since the unix epoch.
    pub fn read_datetime(&mut self) -> Result<u64, DecodeError> {
        Ok(self.read_fixed_integer(DATETIME_BITS)? / 10)
    }

    pub fn read_fixed_bitfield(&mut self, bits: usize) -> Result<Vec<bool>, DecodeError> {
        self.ensure(bits as u64)?;
        (0..bits).map(|_| self.read_bool()).collect()
    }

    pub fn read_fixed_integer_list(
        &mut self,
        width: u32,
        len: usize,
    ) -> Result<Vec<u64>, DecodeError> {
        self.ensure(u64::from(width) * len as u64)?;
        (0..len).map(|_| self.read_fixed_integer(width)).collect()
    }
}

/// Writes primitive values into a new [`BitString`].
pub struct DataWriter {
    writer: BitWriter<Vec<u8>, BigEndian>,
    len: u64,
}

impl Default for DataWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl DataWriter {
    pub fn new() -> Self {
        Self {
            writer: BitWriter::endian(Vec::new(), BigEndian),
            len: 0,
        }
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn write_bool(&mut self, bit: bool) -> Result<(), EncodeError> {
        self.writer.write_bit(bit)?;
        self.len += 1;
        Ok(())
    }

    pub fn write_fixed_integer(&mut self, value: u64, bits: u32) -> Result<(), EncodeError> {
        if bits < 64 && value >> bits != 0 {
            return Err(EncodeError::ValueTooLarge { value, bits });
        }
        if bits == 0 {
            return Ok(());
        }
        if bits > 64 {
            for _ in 0..bits - 64 {
                self.write_bool(false)?;
            }
            return self.write_fixed_integer(value, 64);
        }
        self.writer.write_unsigned_var::<u64>(bits, value)?;
        self.len += u64::from(bits);
        Ok(())
    }

    pub fn write_bits(&mut self, bits: &BitString) -> Result<(), EncodeError> {
        bits.iter().try_for_each(|bit| self.write_bool(bit))
    }

    pub fn write_fibonacci_integer(&mut self, value: u64) -> Result<(), EncodeError> {
        let bits = zeckendorf_bits(value).ok_or_else(|| EncodeError::InvalidValue {
            expected: "a positive integer".to_string(),
            found: value.to_string(),
        })?;
        bits.into_iter().try_for_each(|bit| self.write_bool(bit))
    }

    /// Writes `s` as 6 bit characters, padded with spaces to `chars`.
    pub fn write_string(&mut self, s: &str, chars: usize) -> Result<(), EncodeError> {
        let found = s.chars().count();
        if found > chars {
            return Err(EncodeError::TooManyElements {
                max: chars,
                found,
            });
        }
        for c in s.chars().chain(std::iter::repeat_n(' ', chars - found)) {
            let n = match c {
                ' ' => STRING_SPACE,
                c if ('A'..='\u{7f}').contains(&c) => c as u64 - 65,
                _ => return Err(EncodeError::InvalidCharacter(c)),
            };
            self.write_fixed_integer(n, STRING_CHAR_BITS)?;
        }
        Ok(())
    }

    /// Writes seconds since the unix epoch as deciseconds.
    pub fn write_datetime(&mut self, seconds: u64) -> Result<(), EncodeError> {
        let deciseconds = seconds
            .checked_mul(10)
            .ok_or(EncodeError::ValueTooLarge {
                value: seconds,
                bits: DATETIME_BITS,
            })?;
        self.write_fixed_integer(deciseconds, DATETIME_BITS)
    }

    /// Writes `bits` padded with unset bits to `len`.
    pub fn write_fixed_bitfield(&mut self, bits: &[bool], len: usize) -> Result<(), EncodeError> {
        if bits.len() > len {
            return Err(EncodeError::TooManyElements {
                max: len,
                found: bits.len(),
            });
        }
        for &bit in bits {
            self.write_bool(bit)?;
        }
        for _ in bits.len()..len {
            self.write_bool(false)?;
        }
        Ok(())
    }

    pub fn write_fixed_integer_list(
        &mut self,
        values: &[u64],
        width: u32,
        len: usize,
    ) -> Result<(), EncodeError> {
        if values.len() > len {
            return Err(EncodeError::TooManyElements {
                max: len,
                found: values.len(),
            });
        }
        for &v in values {
            self.write_fixed_integer(v, width)?;
        }
        for _ in values.len()..len {
            self.write_fixed_integer(0, width)?;
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<BitString, EncodeError> {
        let len = self.len;
        self.writer.byte_align()?;
        Ok(BitString::from_parts(self.writer.into_writer(), len))
    }
}

/// Current time in seconds since the unix epoch.
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
