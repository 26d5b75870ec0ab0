use std::io;
use thiserror::Error;

/// The error type for values which cannot be represented on the wire.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum EncodeError {
    /// The value does not fit in the declared number of bits.
    #[error("value {value} does not fit in {bits} bits")]
    ValueTooLarge { value: u64, bits: u32 },
    /// A list or bitfield has more elements than its declared length.
    #[error("too many elements (maximum {max}, found {found})")]
    TooManyElements { max: usize, found: usize },
    /// A character cannot be represented in the 6-bit string alphabet.
    #[error("unencodable character {0:?}")]
    InvalidCharacter(char),
    /// The value has the wrong shape for the field data type.
    #[error("type mismatch (expected {expected}, found {found})")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    /// A value is representable in bits but not allowed by the format.
    #[error("invalid value (expected {expected}, found {found})")]
    InvalidValue { expected: String, found: String },
    /// A field needed to encode a segment has no value.
    #[error("missing field {0}")]
    MissingField(String),
    /// The `Version` field names a version with no known layout.
    #[error("unsupported version {0}")]
    UnsupportedVersion(u64),
    /// The bit string length is not a multiple of 6 after padding.
    #[error("bit string of length {0} cannot be base64 encoded")]
    UnalignedBits(u64),
    #[error("unable to encode field {field}: {source}")]
    Field {
        field: String,
        #[source]
        source: Box<EncodeError>,
    },
    #[error("unable to write bits: {0}")]
    Write(#[from] io::Error),
}

impl EncodeError {
    pub(crate) fn in_field(self, field: &str) -> Self {
        Self::Field {
            field: field.to_string(),
            source: Box::new(self),
        }
    }
}

/// The error type that describes failures to decode bit strings and segments.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum DecodeError {
    /// The input is shorter than required. Truncated input is never zero-padded.
    #[error("unexpected end of input at bit {position} (needed {needed}, available {available})")]
    UnexpectedEnd {
        position: u64,
        needed: u64,
        available: u64,
    },
    /// An invalid byte was found in a base64 encoded string.
    #[error("invalid base64 character {character:?} at offset {offset}")]
    InvalidBase64 { offset: usize, character: char },
    /// A value was decoded from a slice which still has unread bits.
    #[error("trailing bits after value (consumed {consumed} of {len})")]
    TrailingBits { consumed: u64, len: u64 },
    /// A character outside of the format alphabet.
    #[error("invalid character {character:?} at position {position}")]
    InvalidCharacter { character: char, position: usize },
    /// A decoded value is structurally invalid.
    #[error("invalid value (expected {expected}, found {found})")]
    InvalidValue { expected: String, found: String },
    #[error("unknown version {0}")]
    UnknownVersion(u64),
    #[error("unknown segment type {0}")]
    UnknownSegmentType(u64),
    #[error("duplicate segment type {0}")]
    DuplicateSegmentType(u64),
    #[error("empty segment")]
    EmptySegment,
    #[error("unable to find the bits of field {field}: {source}")]
    Substring {
        field: String,
        #[source]
        source: SubstringError,
    },
    #[error("unable to decode field {field}: {source}")]
    Field {
        field: String,
        #[source]
        source: Box<DecodeError>,
    },
    #[error("unable to read bits: {0}")]
    Read(#[from] io::Error),
}

impl DecodeError {
    pub(crate) fn in_field(self, field: &str) -> Self {
        Self::Field {
            field: field.to_string(),
            source: Box::new(self),
        }
    }
}

/// The error type for failures to measure a value inside a bit string.
///
/// It is distinct from [`DecodeError`] so that scanning for field boundaries
/// can fail independently of full parsing.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SubstringError {
    #[error("offset {offset} is out of bounds (needed {needed} bits, available {available})")]
    OutOfBounds {
        offset: u64,
        needed: u64,
        available: u64,
    },
    #[error("flexible length field {0} is missing or not an integer")]
    MissingLength(String),
    #[error("unable to read bits: {0}")]
    Read(#[from] io::Error),
}

impl SubstringError {
    pub(crate) fn from_decode(offset: u64, e: DecodeError) -> Self {
        match e {
            DecodeError::UnexpectedEnd {
                position,
                needed,
                available,
            } => Self::OutOfBounds {
                offset: offset.max(position),
                needed,
                available,
            },
            DecodeError::Read(e) => Self::Read(e),
            other => Self::Read(io::Error::new(io::ErrorKind::InvalidData, other.to_string())),
        }
    }
}
