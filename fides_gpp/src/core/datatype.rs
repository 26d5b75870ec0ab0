//! Encodable data types of section fields and their runtime values.
use crate::core::range::RangeEntry;
use crate::core::{
    BitString, DataReader, DataWriter, DecodeError, EncodeError, IdSet, SubstringError,
};
use serde::Serialize;
use std::collections::BTreeMap;

/// Field values of a section or segment, keyed by field name.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// The wire representation of a field.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DataType {
    Boolean,
    FixedInteger(u32),
    FixedIntegerList { width: u32, len: usize },
    FixedBitfield(usize),
    /// A bitfield whose length is the value of another field.
    FlexibleBitfield { length_field: &'static str },
    FixedString(usize),
    Datetime,
    FibonacciIntegerRange,
    FixedIntegerRange,
    OptimizedFixedRange,
    ArrayOfRanges { key_bits: u32, type_bits: u32 },
}

/// The runtime value of a field.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Int(u64),
    IntList(Vec<u64>),
    Bitfield(Vec<bool>),
    IdSet(IdSet),
    String(String),
    Ranges(Vec<RangeEntry>),
}

impl FieldValue {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::IntList(_) => "integer list",
            Self::Bitfield(_) => "bitfield",
            Self::IdSet(_) => "id set",
            Self::String(_) => "string",
            Self::Ranges(_) => "ranges",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<u64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_int_list(&self) -> Option<&[u64]> {
        match self {
            Self::IntList(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bitfield(&self) -> Option<&[bool]> {
        match self {
            Self::Bitfield(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_id_set(&self) -> Option<&IdSet> {
        match self {
            Self::IdSet(ids) => Some(ids),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_ranges(&self) -> Option<&[RangeEntry]> {
        match self {
            Self::Ranges(r) => Some(r),
            _ => None,
        }
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<u64> for FieldValue {
    fn from(n: u64) -> Self {
        Self::Int(n)
    }
}

impl From<u32> for FieldValue {
    fn from(n: u32) -> Self {
        Self::Int(u64::from(n))
    }
}

impl From<Vec<u64>> for FieldValue {
    fn from(v: Vec<u64>) -> Self {
        Self::IntList(v)
    }
}

impl From<Vec<bool>> for FieldValue {
    fn from(v: Vec<bool>) -> Self {
        Self::Bitfield(v)
    }
}

impl From<IdSet> for FieldValue {
    fn from(ids: IdSet) -> Self {
        Self::IdSet(ids)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Vec<RangeEntry>> for FieldValue {
    fn from(r: Vec<RangeEntry>) -> Self {
        Self::Ranges(r)
    }
}

fn flexible_length(fields: &FieldMap, length_field: &str) -> Option<usize> {
    fields
        .get(length_field)
        .and_then(FieldValue::as_int)
        .map(|n| n as usize)
}

fn json_kind(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

impl DataType {
    /// The kind of [`FieldValue`] this type encodes.
    pub fn value_kind(&self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::FixedInteger(_) | Self::Datetime => "integer",
            Self::FixedIntegerList { .. } => "integer list",
            Self::FixedBitfield(_) | Self::FlexibleBitfield { .. } => "bitfield",
            Self::FixedString(_) => "string",
            Self::FibonacciIntegerRange | Self::FixedIntegerRange | Self::OptimizedFixedRange => {
                "id set"
            }
            Self::ArrayOfRanges { .. } => "ranges",
        }
    }

    pub fn accepts(&self, value: &FieldValue) -> bool {
        self.value_kind() == value.kind()
    }

    /// The zero value of the type: false, 0, unset bits, empty sets.
    pub fn natural_default(&self) -> FieldValue {
        match self {
            Self::Boolean => FieldValue::Bool(false),
            Self::FixedInteger(_) | Self::Datetime => FieldValue::Int(0),
            Self::FixedIntegerList { len, .. } => FieldValue::IntList(vec![0; *len]),
            Self::FixedBitfield(n) => FieldValue::Bitfield(vec![false; *n]),
            Self::FlexibleBitfield { .. } => FieldValue::Bitfield(vec![]),
            Self::FixedString(n) => FieldValue::String(" ".repeat(*n)),
            Self::FibonacciIntegerRange | Self::FixedIntegerRange | Self::OptimizedFixedRange => {
                FieldValue::IdSet(IdSet::new())
            }
            Self::ArrayOfRanges { .. } => FieldValue::Ranges(vec![]),
        }
    }

    /// Encodes `value` on its own. `fields` provides the values that
    /// flexible lengths refer to.
    pub fn encode(&self, value: &FieldValue, fields: &FieldMap) -> Result<BitString, EncodeError> {
        let mut w = DataWriter::new();
        self.write(value, fields, &mut w)?;
        w.finish()
    }

    pub(crate) fn write(
        &self,
        value: &FieldValue,
        fields: &FieldMap,
        w: &mut DataWriter,
    ) -> Result<(), EncodeError> {
        match (self, value) {
            (Self::Boolean, FieldValue::Bool(b)) => w.write_bool(*b),
            (Self::FixedInteger(bits), FieldValue::Int(n)) => w.write_fixed_integer(*n, *bits),
            (Self::FixedIntegerList { width, len }, FieldValue::IntList(v)) => {
                w.write_fixed_integer_list(v, *width, *len)
            }
            (Self::FixedBitfield(len), FieldValue::Bitfield(v)) => w.write_fixed_bitfield(v, *len),
            (Self::FlexibleBitfield { length_field }, FieldValue::Bitfield(v)) => {
                let len = flexible_length(fields, length_field)
                    .ok_or_else(|| EncodeError::MissingField(length_field.to_string()))?;
                w.write_fixed_bitfield(v, len)
            }
            (Self::FixedString(chars), FieldValue::String(s)) => w.write_string(s, *chars),
            (Self::Datetime, FieldValue::Int(seconds)) => w.write_datetime(*seconds),
            (Self::FibonacciIntegerRange, FieldValue::IdSet(ids)) => w.write_fibonacci_range(ids),
            (Self::FixedIntegerRange, FieldValue::IdSet(ids)) => w.write_integer_range(ids),
            (Self::OptimizedFixedRange, FieldValue::IdSet(ids)) => w.write_optimized_range(ids),
            (
                Self::ArrayOfRanges {
                    key_bits,
                    type_bits,
                },
                FieldValue::Ranges(entries),
            ) => w.write_array_of_ranges(entries, *key_bits, *type_bits),
            (dt, v) => Err(EncodeError::TypeMismatch {
                expected: dt.value_kind(),
                found: v.kind(),
            }),
        }
    }

    /// Decodes a value which must span all of `bits`.
    pub fn decode(&self, bits: &BitString, fields: &FieldMap) -> Result<FieldValue, DecodeError> {
        let mut r = bits.reader();
        let value = self.read(&mut r, fields)?;
        if r.remaining() != 0 {
            return Err(DecodeError::TrailingBits {
                consumed: r.position(),
                len: bits.len(),
            });
        }
        Ok(value)
    }

    pub(crate) fn read(
        &self,
        r: &mut DataReader<'_>,
        fields: &FieldMap,
    ) -> Result<FieldValue, DecodeError> {
        Ok(match self {
            Self::Boolean => FieldValue::Bool(r.read_bool()?),
            Self::FixedInteger(bits) => FieldValue::Int(r.read_fixed_integer(*bits)?),
            Self::FixedIntegerList { width, len } => {
                FieldValue::IntList(r.read_fixed_integer_list(*width, *len)?)
            }
            Self::FixedBitfield(len) => FieldValue::Bitfield(r.read_fixed_bitfield(*len)?),
            Self::FlexibleBitfield { length_field } => {
                let len = flexible_length(fields, length_field).ok_or_else(|| {
                    DecodeError::InvalidValue {
                        expected: format!("an integer in field {length_field}"),
                        found: "no value".to_string(),
                    }
                })?;
                FieldValue::Bitfield(r.read_fixed_bitfield(len)?)
            }
            Self::FixedString(chars) => FieldValue::String(r.read_string(*chars)?),
            Self::Datetime => FieldValue::Int(r.read_datetime()?),
            Self::FibonacciIntegerRange => FieldValue::IdSet(r.read_fibonacci_range()?),
            Self::FixedIntegerRange => FieldValue::IdSet(r.read_integer_range()?),
            Self::OptimizedFixedRange => FieldValue::IdSet(r.read_optimized_range()?),
            Self::ArrayOfRanges {
                key_bits,
                type_bits,
            } => FieldValue::Ranges(r.read_array_of_ranges(*key_bits, *type_bits)?),
        })
    }

    /// Returns exactly the bits a value of this type occupies at `offset`,
    /// without decoding it.
    pub fn substring(
        &self,
        bits: &BitString,
        offset: u64,
        fields: &FieldMap,
    ) -> Result<BitString, SubstringError> {
        let mut r = bits
            .reader_at(offset)
            .map_err(|e| SubstringError::from_decode(offset, e))?;
        let skipped = match self {
            Self::Boolean => r.skip(1),
            Self::FixedInteger(n) => r.skip(u64::from(*n)),
            Self::FixedIntegerList { width, len } => r.skip(u64::from(*width) * *len as u64),
            Self::FixedBitfield(len) => r.skip(*len as u64),
            Self::FlexibleBitfield { length_field } => {
                let len = flexible_length(fields, length_field)
                    .ok_or_else(|| SubstringError::MissingLength(length_field.to_string()))?;
                r.skip(len as u64)
            }
            Self::FixedString(chars) => r.skip(6 * *chars as u64),
            Self::Datetime => r.skip(36),
            Self::FibonacciIntegerRange => r.skip_fibonacci_range(),
            Self::FixedIntegerRange => r.skip_integer_range(),
            Self::OptimizedFixedRange => r.skip_optimized_range(),
            Self::ArrayOfRanges {
                key_bits,
                type_bits,
            } => r.skip_array_of_ranges(*key_bits, *type_bits),
        };
        skipped.map_err(|e| SubstringError::from_decode(offset, e))?;
        Ok(bits.slice(offset, r.position()))
    }

    /// Converts a JSON value into a field value of this type.
    pub fn value_from_json(&self, json: &serde_json::Value) -> Result<FieldValue, EncodeError> {
        let mismatch = || EncodeError::TypeMismatch {
            expected: self.value_kind(),
            found: json_kind(json),
        };
        let id = |v: &serde_json::Value| {
            v.as_u64()
                .and_then(|n| u16::try_from(n).ok())
                .ok_or_else(mismatch)
        };

        match self {
            Self::Boolean => json.as_bool().map(FieldValue::Bool).ok_or_else(mismatch),
            Self::FixedInteger(_) | Self::Datetime => {
                json.as_u64().map(FieldValue::Int).ok_or_else(mismatch)
            }
            Self::FixedIntegerList { .. } => json
                .as_array()
                .ok_or_else(mismatch)?
                .iter()
                .map(|v| v.as_u64().ok_or_else(mismatch))
                .collect::<Result<Vec<_>, _>>()
                .map(FieldValue::IntList),
            Self::FixedBitfield(_) | Self::FlexibleBitfield { .. } => json
                .as_array()
                .ok_or_else(mismatch)?
                .iter()
                .map(|v| v.as_bool().ok_or_else(mismatch))
                .collect::<Result<Vec<_>, _>>()
                .map(FieldValue::Bitfield),
            Self::FixedString(_) => json
                .as_str()
                .map(|s| FieldValue::String(s.to_string()))
                .ok_or_else(mismatch),
            Self::FibonacciIntegerRange | Self::FixedIntegerRange | Self::OptimizedFixedRange => json
                .as_array()
                .ok_or_else(mismatch)?
                .iter()
                .map(id)
                .collect::<Result<IdSet, _>>()
                .map(FieldValue::IdSet),
            Self::ArrayOfRanges { .. } => serde_json::from_value::<Vec<RangeEntry>>(json.clone())
                .map(FieldValue::Ranges)
                .map_err(|_| mismatch()),
        }
    }
}
