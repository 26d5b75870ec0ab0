//! Section schemas and the generic section codec.
//!
//! All section IDs of the GPP registry are listed in the [`SectionId`] enum.
//! The supported sections are described by a static [`SectionSchema`] each,
//! declared in the corresponding submodule. A schema lists the segments of a
//! section and their fields in wire order, and [`encode_section`] and
//! [`decode_section`] walk these tables to convert between a [`FieldMap`] and
//! the encoded section string.
//!
//! The GPP specification states that each section specification is supposed
//! to be independent, so there is a lot of repetition between the field
//! tables of the US state sections.
//!
//! A section with several core versions (such as `usnat`) selects its layout
//! from the `Version` field of the map when encoding, and from the first 6
//! bits of the core segment when decoding.
use crate::core::base64::{decode_base64_url, encode_base64_url};
use crate::core::datatype::{DataType, FieldMap, FieldValue};
use crate::core::{BitString, DataWriter, DecodeError, EncodeError, unix_now};
use num_derive::{FromPrimitive, ToPrimitive};
use serde::{Serialize, Serializer};
use std::collections::BTreeSet;
use strum_macros::{Display, EnumIter, EnumString};
use thiserror::Error;
use tracing::debug;

pub mod tcfcav1;
pub mod tcfeuv2;
pub mod us_common;
pub mod usca;
pub mod usco;
pub mod usct;
pub mod usnat;
pub mod uspv1;
pub mod usut;
pub mod usva;

pub use crate::core::IdSet;

/// Name of the field every core segment starts with.
pub const VERSION_FIELD: &str = "Version";
const VERSION_BITS: u32 = 6;

#[derive(
    Clone,
    Copy,
    Debug,
    Display,
    EnumIter,
    EnumString,
    Eq,
    PartialEq,
    Hash,
    Ord,
    PartialOrd,
    FromPrimitive,
    ToPrimitive,
)]
#[strum(serialize_all = "lowercase")]
#[non_exhaustive]
pub enum SectionId {
    TcfEuV1 = 1,
    TcfEuV2 = 2,
    #[strum(serialize = "header")]
    GppHeader = 3,
    #[strum(serialize = "signalintegrity")]
    GppSignalIntegrity = 4,
    TcfCaV1 = 5,
    UspV1 = 6,
    UsNat = 7,
    UsCa = 8,
    UsVa = 9,
    UsCo = 10,
    UsUt = 11,
    UsCt = 12,
    UsFl = 13,
    UsMt = 14,
    UsOr = 15,
    UsTx = 16,
    UsDe = 17,
    UsIa = 18,
    UsNe = 19,
    UsNh = 20,
    UsNj = 21,
    UsTn = 22,
}

impl SectionId {
    /// The schema of this section, if it is supported.
    pub fn schema(self) -> Option<&'static SectionSchema> {
        schema(self)
    }
}

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SectionError {
    #[error("unsupported section {0:?}")]
    UnsupportedSection(String),
    #[error("unsupported section id {0}")]
    UnsupportedSectionId(SectionId),
    #[error("missing section {0}")]
    MissingSection(SectionId),
    #[error("unknown field {field} in section {section}")]
    UnknownField {
        section: &'static str,
        field: String,
    },
    #[error("unable to encode section {section}: {source}")]
    Encode {
        section: &'static str,
        #[source]
        source: EncodeError,
    },
    #[error("unable to decode section {section}: {source}")]
    Decode {
        section: &'static str,
        #[source]
        source: DecodeError,
    },
}

/// Value assigned to a field when a section is created.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldDefault {
    /// The zero value of the data type.
    Natural,
    Bool(bool),
    Int(u64),
    Str(&'static str),
    /// The current time, for datetime fields.
    Now,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Field {
    pub name: &'static str,
    pub data_type: DataType,
    pub default: FieldDefault,
}

impl Field {
    pub const fn new(name: &'static str, data_type: DataType) -> Self {
        Self {
            name,
            data_type,
            default: FieldDefault::Natural,
        }
    }

    pub const fn default_to(self, default: FieldDefault) -> Self {
        Self { default, ..self }
    }

    pub fn default_value(&self) -> FieldValue {
        match self.default {
            FieldDefault::Natural => self.data_type.natural_default(),
            FieldDefault::Bool(b) => FieldValue::Bool(b),
            FieldDefault::Int(n) => FieldValue::Int(n),
            FieldDefault::Str(s) => FieldValue::String(s.to_string()),
            FieldDefault::Now => FieldValue::Int(unix_now()),
        }
    }
}

/// Rule deciding whether an optional segment is emitted.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Inclusion {
    Always,
    WhenTrue(&'static str),
    WhenFalse(&'static str),
}

#[derive(Debug)]
pub struct SegmentSchema {
    pub name: &'static str,
    pub fields: &'static [Field],
    pub inclusion: Inclusion,
}

impl SegmentSchema {
    pub fn is_included(&self, fields: &FieldMap) -> bool {
        let flag = |name: &str| {
            fields
                .get(name)
                .and_then(FieldValue::as_bool)
                .unwrap_or(false)
        };
        match self.inclusion {
            Inclusion::Always => true,
            Inclusion::WhenTrue(name) => flag(name),
            Inclusion::WhenFalse(name) => !flag(name),
        }
    }

    pub fn encode_bits(&self, fields: &FieldMap) -> Result<BitString, EncodeError> {
        let mut w = DataWriter::new();
        for f in self.fields {
            let value = fields
                .get(f.name)
                .ok_or_else(|| EncodeError::MissingField(f.name.to_string()))?;
            f.data_type
                .write(value, fields, &mut w)
                .map_err(|e| e.in_field(f.name))?;
        }
        w.finish()
    }

    pub fn encode(&self, fields: &FieldMap) -> Result<String, EncodeError> {
        encode_base64_url(&self.encode_bits(fields)?)
    }

    /// Decodes the fields of this segment into `fields`, one field at a time.
    ///
    /// Padding bits after the last field are ignored.
    pub fn decode_bits(&self, bits: &BitString, fields: &mut FieldMap) -> Result<(), DecodeError> {
        let mut offset = 0;
        for f in self.fields {
            let sub = f
                .data_type
                .substring(bits, offset, fields)
                .map_err(|source| DecodeError::Substring {
                    field: f.name.to_string(),
                    source,
                })?;
            let value = f
                .data_type
                .decode(&sub, fields)
                .map_err(|e| e.in_field(f.name))?;
            offset += sub.len();
            fields.insert(f.name.to_string(), value);
        }
        Ok(())
    }

    pub fn decode(&self, s: &str, fields: &mut FieldMap) -> Result<(), DecodeError> {
        if s.is_empty() {
            return Err(DecodeError::EmptySegment);
        }
        self.decode_bits(&decode_base64_url(s)?, fields)
    }
}

/// A core segment layout and the value of its `Version` field.
#[derive(Debug)]
pub struct CoreSegment {
    pub version: u64,
    pub segment: SegmentSchema,
}

/// An optional segment, identified by its segment type prefix.
#[derive(Debug)]
pub struct OptionalSegment {
    pub segment_type: u64,
    pub segment: SegmentSchema,
}

#[derive(Debug)]
pub enum SectionFormat {
    /// Base64 segments separated by `.`: a core segment followed by optional
    /// segments.
    Segmented {
        /// Core segment layouts, oldest version first.
        cores: &'static [CoreSegment],
        segment_type_bits: u32,
        optional: &'static [OptionalSegment],
        /// Fields held in the map but never encoded. They record whether an
        /// optional segment is present.
        flags: &'static [Field],
    },
    /// The four character US Privacy string.
    UsPrivacy { fields: &'static [Field] },
}

#[derive(Debug)]
pub struct SectionSchema {
    pub id: SectionId,
    pub name: &'static str,
    pub format: SectionFormat,
}

impl SectionSchema {
    fn core(&self, version: Option<u64>) -> Option<&'static CoreSegment> {
        match self.format {
            SectionFormat::Segmented { cores, .. } => match version {
                Some(v) => cores.iter().find(|c| c.version == v),
                None => cores.last(),
            },
            SectionFormat::UsPrivacy { .. } => None,
        }
    }

    /// Versions with a known layout.
    pub fn versions(&self) -> Vec<u64> {
        match self.format {
            SectionFormat::Segmented { cores, .. } => cores.iter().map(|c| c.version).collect(),
            SectionFormat::UsPrivacy { .. } => vec![uspv1::VERSION],
        }
    }

    /// All fields of the section for the given core version, or for the
    /// latest version when `version` is `None`.
    pub fn fields(&self, version: Option<u64>) -> Vec<&'static Field> {
        match self.format {
            SectionFormat::Segmented {
                optional, flags, ..
            } => self
                .core(version)
                .or_else(|| self.core(None))
                .into_iter()
                .flat_map(|c| c.segment.fields)
                .chain(optional.iter().flat_map(|o| o.segment.fields))
                .chain(flags)
                .collect(),
            SectionFormat::UsPrivacy { fields } => fields.iter().collect(),
        }
    }

    /// Looks up a field, using the version recorded in `fields`.
    pub fn field(&self, name: &str, fields: &FieldMap) -> Option<&'static Field> {
        let version = fields.get(VERSION_FIELD).and_then(FieldValue::as_int);
        self.fields(version).into_iter().find(|f| f.name == name)
    }

    pub fn defaults(&self) -> FieldMap {
        self.fields(None)
            .into_iter()
            .map(|f| (f.name.to_string(), f.default_value()))
            .collect()
    }

    pub fn encode(&self, fields: &FieldMap) -> Result<String, SectionError> {
        let encoded = match self.format {
            SectionFormat::Segmented { optional, .. } => self.encode_segmented(optional, fields),
            SectionFormat::UsPrivacy { .. } => uspv1::encode(fields),
        };
        encoded.map_err(|source| SectionError::Encode {
            section: self.name,
            source,
        })
    }

    fn encode_segmented(
        &self,
        optional: &'static [OptionalSegment],
        fields: &FieldMap,
    ) -> Result<String, EncodeError> {
        let version = match fields.get(VERSION_FIELD) {
            Some(FieldValue::Int(v)) => *v,
            Some(other) => {
                return Err(EncodeError::TypeMismatch {
                    expected: "integer",
                    found: other.kind(),
                }
                .in_field(VERSION_FIELD));
            }
            None => return Err(EncodeError::MissingField(VERSION_FIELD.to_string())),
        };
        let core = self
            .core(Some(version))
            .ok_or(EncodeError::UnsupportedVersion(version))?;

        let mut segments = vec![core.segment.encode(fields)?];
        for o in optional {
            if !o.segment.is_included(fields) {
                continue;
            }
            if let Some(type_field) = o.segment.fields.first() {
                let found = fields.get(type_field.name).and_then(FieldValue::as_int);
                if found != Some(o.segment_type) {
                    return Err(EncodeError::InvalidValue {
                        expected: format!("segment type {}", o.segment_type),
                        found: format!("{found:?}"),
                    }
                    .in_field(type_field.name));
                }
            }
            segments.push(o.segment.encode(fields)?);
        }

        Ok(segments.join("."))
    }

    pub fn decode(&self, s: &str) -> Result<FieldMap, SectionError> {
        let decoded = match self.format {
            SectionFormat::Segmented {
                segment_type_bits,
                optional,
                flags,
                ..
            } => self.decode_segmented(segment_type_bits, optional, flags, s),
            SectionFormat::UsPrivacy { .. } => uspv1::decode(s),
        };
        decoded.map_err(|source| SectionError::Decode {
            section: self.name,
            source,
        })
    }

    fn decode_segmented(
        &self,
        segment_type_bits: u32,
        optional: &'static [OptionalSegment],
        flags: &'static [Field],
        s: &str,
    ) -> Result<FieldMap, DecodeError> {
        let mut parts = s.split('.');
        let core_str = parts
            .next()
            .filter(|p| !p.is_empty())
            .ok_or(DecodeError::EmptySegment)?;
        let core_bits = decode_base64_url(core_str)?;
        let version = core_bits
            .reader()
            .read_fixed_integer(VERSION_BITS)
            .map_err(|e| e.in_field(VERSION_FIELD))?;
        let core = self
            .core(Some(version))
            .ok_or(DecodeError::UnknownVersion(version))?;

        let mut fields = self
            .fields(Some(version))
            .into_iter()
            .map(|f| (f.name.to_string(), f.default_value()))
            .collect::<FieldMap>();
        core.segment.decode_bits(&core_bits, &mut fields)?;

        let mut seen = BTreeSet::new();
        for part in parts {
            if part.is_empty() {
                return Err(DecodeError::EmptySegment);
            }
            let bits = decode_base64_url(part)?;
            let segment_type = bits.reader().read_fixed_integer(segment_type_bits)?;
            let segment = optional
                .iter()
                .find(|o| o.segment_type == segment_type)
                .ok_or(DecodeError::UnknownSegmentType(segment_type))?;
            if !seen.insert(segment_type) {
                return Err(DecodeError::DuplicateSegmentType(segment_type));
            }
            segment.segment.decode_bits(&bits, &mut fields)?;
        }

        for o in optional {
            if let Inclusion::WhenTrue(flag) = o.segment.inclusion {
                if flags.iter().any(|f| f.name == flag) {
                    fields.insert(
                        flag.to_string(),
                        FieldValue::Bool(seen.contains(&o.segment_type)),
                    );
                }
            }
        }

        Ok(fields)
    }
}

static SCHEMAS: &[&SectionSchema] = &[
    &tcfeuv2::SCHEMA,
    &tcfcav1::SCHEMA,
    &uspv1::SCHEMA,
    &usnat::SCHEMA,
    &usca::SCHEMA,
    &usva::SCHEMA,
    &usco::SCHEMA,
    &usut::SCHEMA,
    &usct::SCHEMA,
];

pub fn schema(id: SectionId) -> Option<&'static SectionSchema> {
    SCHEMAS.iter().copied().find(|s| s.id == id)
}

pub fn schema_by_name(name: &str) -> Option<&'static SectionSchema> {
    SCHEMAS.iter().copied().find(|s| s.name == name)
}

/// Schemas of all supported sections, in ascending id order.
pub fn supported_sections() -> impl Iterator<Item = &'static SectionSchema> {
    SCHEMAS.iter().copied()
}

fn known_schema(name: &str) -> Result<&'static SectionSchema, SectionError> {
    schema_by_name(name).ok_or_else(|| SectionError::UnsupportedSection(name.to_string()))
}

/// Encodes a section from its field values.
pub fn encode_section(name: &str, fields: &FieldMap) -> Result<String, SectionError> {
    let s = known_schema(name)?.encode(fields)?;
    debug!(section = name, encoded = %s, "encoded section");
    Ok(s)
}

/// Decodes a section string into its field values.
pub fn decode_section(name: &str, s: &str) -> Result<FieldMap, SectionError> {
    let fields = known_schema(name)?.decode(s)?;
    debug!(section = name, fields = fields.len(), "decoded section");
    Ok(fields)
}

/// A supported section with its field values.
#[derive(Clone, Debug)]
pub struct Section {
    schema: &'static SectionSchema,
    fields: FieldMap,
}

impl PartialEq for Section {
    fn eq(&self, other: &Self) -> bool {
        self.schema.id == other.schema.id && self.fields == other.fields
    }
}

impl Serialize for Section {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

impl Section {
    /// Creates a section populated with default values.
    pub fn new(id: SectionId) -> Result<Self, SectionError> {
        let schema = schema(id).ok_or(SectionError::UnsupportedSectionId(id))?;
        Ok(Self::from_schema(schema))
    }

    pub fn from_name(name: &str) -> Result<Self, SectionError> {
        Ok(Self::from_schema(known_schema(name)?))
    }

    fn from_schema(schema: &'static SectionSchema) -> Self {
        Self {
            schema,
            fields: schema.defaults(),
        }
    }

    pub fn decode(id: SectionId, s: &str) -> Result<Self, SectionError> {
        let schema = schema(id).ok_or(SectionError::UnsupportedSectionId(id))?;
        Ok(Self {
            schema,
            fields: schema.decode(s)?,
        })
    }

    pub fn id(&self) -> SectionId {
        self.schema.id
    }

    pub fn name(&self) -> &'static str {
        self.schema.name
    }

    pub fn schema(&self) -> &'static SectionSchema {
        self.schema
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    /// Sets a field after checking that the section has it and that the
    /// value has the shape of its data type.
    ///
    /// Changing `Version` switches the field layout: fields whose data type
    /// differs in the new version are reset to their default value.
    pub fn set_field(&mut self, name: &str, value: FieldValue) -> Result<(), SectionError> {
        let field =
            self.schema
                .field(name, &self.fields)
                .ok_or_else(|| SectionError::UnknownField {
                    section: self.schema.name,
                    field: name.to_string(),
                })?;
        let encode_error = |source: EncodeError| SectionError::Encode {
            section: self.schema.name,
            source: source.in_field(name),
        };
        if !field.data_type.accepts(&value) {
            return Err(encode_error(EncodeError::TypeMismatch {
                expected: field.data_type.value_kind(),
                found: value.kind(),
            }));
        }

        if name == VERSION_FIELD {
            let version = value.as_int().unwrap_or_default();
            if !self.schema.versions().contains(&version) {
                return Err(encode_error(EncodeError::UnsupportedVersion(version)));
            }
            let previous = self
                .schema
                .fields(self.fields.get(VERSION_FIELD).and_then(FieldValue::as_int));
            for f in self.schema.fields(Some(version)) {
                let unchanged = previous
                    .iter()
                    .any(|p| p.name == f.name && p.data_type == f.data_type);
                if !unchanged {
                    self.fields.insert(f.name.to_string(), f.default_value());
                }
            }
        }

        self.fields.insert(name.to_string(), value);
        Ok(())
    }

    /// Sets a field from its JSON representation.
    pub fn set_field_json(&mut self, name: &str, json: &serde_json::Value) -> Result<(), SectionError> {
        let field =
            self.schema
                .field(name, &self.fields)
                .ok_or_else(|| SectionError::UnknownField {
                    section: self.schema.name,
                    field: name.to_string(),
                })?;
        let value = field
            .data_type
            .value_from_json(json)
            .map_err(|e| SectionError::Encode {
                section: self.schema.name,
                source: e.in_field(name),
            })?;
        self.set_field(name, value)
    }

    pub fn encode(&self) -> Result<String, SectionError> {
        self.schema.encode(&self.fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;
    use test_case::test_case;

    #[test_case("tcfeuv2" => SectionId::TcfEuV2)]
    #[test_case("usnat" => SectionId::UsNat)]
    #[test_case("header" => SectionId::GppHeader)]
    fn section_id_from_name(name: &str) -> SectionId {
        SectionId::from_str(name).unwrap()
    }

    #[test]
    fn schema_names_match_section_ids() {
        for s in supported_sections() {
            assert_eq!(s.name, s.id.to_string());
            assert_eq!(schema_by_name(s.name).map(|s| s.id), Some(s.id));
        }
        assert_eq!(
            SectionId::iter().filter(|id| id.schema().is_some()).count(),
            supported_sections().count()
        );
    }

    #[test]
    fn schema_field_names_are_unique() {
        for s in supported_sections() {
            for v in s.versions() {
                let fields = s.fields(Some(v));
                let names = fields.iter().map(|f| f.name).collect::<BTreeSet<_>>();
                assert_eq!(names.len(), fields.len(), "{} v{v}", s.name);
            }
        }
    }

    #[test]
    fn defaults_round_trip_for_every_section() {
        for s in supported_sections() {
            let defaults = s.defaults();
            let encoded = encode_section(s.name, &defaults).unwrap();
            assert_eq!(decode_section(s.name, &encoded).unwrap(), defaults, "{}", s.name);
        }
    }

    #[test]
    fn unknown_section_name() {
        assert!(matches!(
            encode_section("usxx", &FieldMap::new()),
            Err(SectionError::UnsupportedSection(s)) if s == "usxx"
        ));
        assert!(matches!(
            decode_section("tcfeuv1", "BAAA"),
            Err(SectionError::UnsupportedSection(_))
        ));
    }

    #[test]
    fn unsupported_section_id() {
        assert!(matches!(
            Section::new(SectionId::UsFl),
            Err(SectionError::UnsupportedSectionId(SectionId::UsFl))
        ));
    }

    #[test]
    fn missing_field_fails_to_encode() {
        let mut fields = usva::SCHEMA.defaults();
        fields.remove("SaleOptOut");
        let e = encode_section("usva", &fields).unwrap_err();
        let SectionError::Encode { source, .. } = e else {
            panic!("unexpected error {e}");
        };
        assert!(matches!(source, EncodeError::MissingField(f) if f == "SaleOptOut"));
    }

    #[test]
    fn short_segment_fails_to_decode() {
        // 12 bits, the usva core needs 42
        assert!(matches!(
            decode_section("usva", "BV"),
            Err(SectionError::Decode {
                section: "usva",
                source: DecodeError::Substring { .. }
            })
        ));
    }

    #[test]
    fn unknown_version_fails_to_decode() {
        assert!(matches!(
            decode_section("usva", "CVVVVWY"),
            Err(SectionError::Decode {
                source: DecodeError::UnknownVersion(2),
                ..
            })
        ));
    }

    #[test]
    fn unknown_and_duplicate_segments_fail_to_decode() {
        assert!(matches!(
            decode_section("usca", "BVVVVVVVVWA.wA"),
            Err(SectionError::Decode {
                source: DecodeError::UnknownSegmentType(3),
                ..
            })
        ));
        assert!(matches!(
            decode_section("usca", "BVVVVVVVVWA.YA.YA"),
            Err(SectionError::Decode {
                source: DecodeError::DuplicateSegmentType(1),
                ..
            })
        ));
    }

    #[test]
    fn set_field_checks_name_and_type() {
        let mut s = Section::new(SectionId::UsVa).unwrap();
        s.set_field("SaleOptOut", FieldValue::Int(1)).unwrap();
        assert_eq!(s.field("SaleOptOut"), Some(&FieldValue::Int(1)));

        assert!(matches!(
            s.set_field("Gpc", FieldValue::Bool(true)),
            Err(SectionError::UnknownField { section: "usva", .. })
        ));
        assert!(matches!(
            s.set_field("SaleOptOut", FieldValue::Bool(true)),
            Err(SectionError::Encode { .. })
        ));
    }

    #[test]
    fn set_version_switches_layout() {
        let mut s = Section::new(SectionId::UsNat).unwrap();
        s.set_field(VERSION_FIELD, FieldValue::Int(1)).unwrap();
        s.set_field("SensitiveDataProcessing", FieldValue::IntList(vec![1; 12]))
            .unwrap();
        let encoded = s.encode().unwrap();
        let decoded = Section::decode(SectionId::UsNat, &encoded).unwrap();
        assert_eq!(decoded.field(VERSION_FIELD), Some(&FieldValue::Int(1)));
        assert_eq!(
            decoded.field("SensitiveDataProcessing"),
            Some(&FieldValue::IntList(vec![1; 12]))
        );

        assert!(matches!(
            s.set_field(VERSION_FIELD, FieldValue::Int(9)),
            Err(SectionError::Encode {
                source: EncodeError::Field { .. },
                ..
            })
        ));
    }

    #[test]
    fn section_serializes_as_field_map() {
        let s = Section::new(SectionId::UspV1).unwrap();
        assert_eq!(
            serde_json::to_value(&s).unwrap(),
            serde_json::json!({
                "Version": 1,
                "Notice": "-",
                "OptOutSale": "-",
                "LspaCovered": "-",
            })
        );
    }
}
