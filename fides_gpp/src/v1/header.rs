//! The GPP header segment.
//!
//! The header is always the first part of a GPP string. It holds the header
//! type (3), the GPP version (1), and the ids of the sections which follow,
//! as a Fibonacci encoded integer range.
use crate::core::IdSet;
use crate::core::datatype::{DataType, FieldMap, FieldValue};
use crate::core::{BitString, DecodeError, EncodeError};
use crate::core::base64::decode_base64_url;
use crate::sections::{Field, FieldDefault, Inclusion, SectionId, SegmentSchema, VERSION_FIELD};
use num_traits::{FromPrimitive, ToPrimitive};

pub(crate) const GPP_HEADER: u64 = 3;
pub(crate) const GPP_VERSION: u64 = 1;

const ID_FIELD: &str = "Id";
const SECTION_IDS_FIELD: &str = "SectionIds";

static HEADER: SegmentSchema = SegmentSchema {
    name: "header",
    fields: &[
        Field::new(ID_FIELD, DataType::FixedInteger(6)).default_to(FieldDefault::Int(GPP_HEADER)),
        Field::new(VERSION_FIELD, DataType::FixedInteger(6))
            .default_to(FieldDefault::Int(GPP_VERSION)),
        Field::new(SECTION_IDS_FIELD, DataType::FibonacciIntegerRange),
    ],
    inclusion: Inclusion::Always,
};

/// Failure to read a header segment.
#[derive(Debug)]
pub(crate) enum HeaderError {
    InvalidType(u64),
    InvalidVersion(u64),
    UnsupportedSectionId(u16),
    Decode(DecodeError),
}

impl From<DecodeError> for HeaderError {
    fn from(e: DecodeError) -> Self {
        Self::Decode(e)
    }
}

/// The decoded GPP header: the list of sections present in the string,
/// in ascending id order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Header {
    section_ids: Vec<SectionId>,
}

impl Header {
    pub fn new<I: IntoIterator<Item = SectionId>>(ids: I) -> Self {
        let mut section_ids = ids.into_iter().collect::<Vec<_>>();
        section_ids.sort();
        section_ids.dedup();
        Self { section_ids }
    }

    pub fn section_ids(&self) -> &[SectionId] {
        &self.section_ids
    }

    pub fn version(&self) -> u64 {
        GPP_VERSION
    }

    /// Encodes the header, `DBAA` for a header without sections.
    pub fn encode(&self) -> Result<String, EncodeError> {
        let ids = self
            .section_ids
            .iter()
            .filter_map(|id| id.to_u16())
            .collect::<IdSet>();
        let mut fields = HEADER
            .fields
            .iter()
            .map(|f| (f.name.to_string(), f.default_value()))
            .collect::<FieldMap>();
        fields.insert(SECTION_IDS_FIELD.to_string(), FieldValue::IdSet(ids));
        HEADER.encode(&fields)
    }

    pub(crate) fn decode(s: &str) -> Result<Self, HeaderError> {
        if s.is_empty() {
            return Err(DecodeError::EmptySegment.into());
        }
        Self::decode_bits(&decode_base64_url(s)?)
    }

    fn decode_bits(bits: &BitString) -> Result<Self, HeaderError> {
        let mut r = bits.reader();
        let header_type = r.read_fixed_integer(6)?;
        if header_type != GPP_HEADER {
            return Err(HeaderError::InvalidType(header_type));
        }
        let version = r.read_fixed_integer(6)?;
        if version != GPP_VERSION {
            return Err(HeaderError::InvalidVersion(version));
        }

        let mut fields = FieldMap::new();
        HEADER.decode_bits(bits, &mut fields)?;
        let section_ids = fields
            .get(SECTION_IDS_FIELD)
            .and_then(FieldValue::as_id_set)
            .into_iter()
            .flatten()
            .map(|&id| SectionId::from_u16(id).ok_or(HeaderError::UnsupportedSectionId(id)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { section_ids })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(&[] => "DBAA" ; "empty")]
    #[test_case(&[SectionId::TcfEuV2] => "DBABMA" ; "tcf eu v2")]
    #[test_case(&[SectionId::UspV1] => "DBABTA" ; "usp v1")]
    #[test_case(&[SectionId::UspV1, SectionId::TcfEuV2] => "DBACNYA" ; "unordered")]
    #[test_case(&[SectionId::TcfCaV1, SectionId::UspV1] => "DBABjw" ; "contiguous ids")]
    fn encode(ids: &[SectionId]) -> String {
        Header::new(ids.iter().copied()).encode().unwrap()
    }

    #[test_case("DBAA" => Vec::<SectionId>::new() ; "empty")]
    #[test_case("DBABM" => vec![SectionId::TcfEuV2] ; "unpadded")]
    #[test_case("DBACNY" => vec![SectionId::TcfEuV2, SectionId::UspV1] ; "two sections")]
    #[test_case("DBABjw" => vec![SectionId::TcfCaV1, SectionId::UspV1] ; "range")]
    fn decode(s: &str) -> Vec<SectionId> {
        Header::decode(s).unwrap().section_ids().to_vec()
    }

    #[test_case("" => matches HeaderError::Decode(DecodeError::EmptySegment) ; "empty")]
    #[test_case("CBAA" => matches HeaderError::InvalidType(2) ; "tcf string")]
    #[test_case("DCAA" => matches HeaderError::InvalidVersion(2) ; "version")]
    #[test_case("DB" => matches HeaderError::Decode(_) ; "truncated")]
    #[test_case("D*AA" => matches HeaderError::Decode(DecodeError::InvalidBase64 { .. }) ; "bad character")]
    fn decode_error(s: &str) -> HeaderError {
        Header::decode(s).unwrap_err()
    }
}
