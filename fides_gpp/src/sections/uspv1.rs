//! US Privacy string, carried as section 6.
//!
//! See <https://github.com/InteractiveAdvertisingBureau/USPrivacy/blob/master/CCPA/US%20Privacy%20String.md#us-privacy-string-format>
use crate::core::datatype::{DataType, FieldMap, FieldValue};
use crate::core::{DecodeError, EncodeError};
use crate::sections::{Field, FieldDefault, SectionFormat, SectionId, SectionSchema, VERSION_FIELD};

pub const VERSION: u64 = 1;
pub const NOTICE: &str = "Notice";
pub const OPT_OUT_SALE: &str = "OptOutSale";
pub const LSPA_COVERED: &str = "LspaCovered";

const FLAG_FIELDS: [&str; 3] = [NOTICE, OPT_OUT_SALE, LSPA_COVERED];

pub static SCHEMA: SectionSchema = SectionSchema {
    id: SectionId::UspV1,
    name: "uspv1",
    format: SectionFormat::UsPrivacy {
        fields: &[
            Field::new(VERSION_FIELD, DataType::FixedInteger(6))
                .default_to(FieldDefault::Int(VERSION)),
            Field::new(NOTICE, DataType::FixedString(1)).default_to(FieldDefault::Str("-")),
            Field::new(OPT_OUT_SALE, DataType::FixedString(1)).default_to(FieldDefault::Str("-")),
            Field::new(LSPA_COVERED, DataType::FixedString(1)).default_to(FieldDefault::Str("-")),
        ],
    },
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Flag {
    Yes,
    No,
    NotApplicable,
}

impl Flag {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'Y' => Some(Self::Yes),
            'N' => Some(Self::No),
            '-' => Some(Self::NotApplicable),
            _ => None,
        }
    }

    pub fn to_char(self) -> char {
        match self {
            Self::Yes => 'Y',
            Self::No => 'N',
            Self::NotApplicable => '-',
        }
    }
}

impl From<Flag> for FieldValue {
    fn from(f: Flag) -> Self {
        FieldValue::String(f.to_char().to_string())
    }
}

fn flag_char(fields: &FieldMap, name: &str) -> Result<char, EncodeError> {
    let value = fields
        .get(name)
        .ok_or_else(|| EncodeError::MissingField(name.to_string()))?;
    let s = value.as_str().ok_or_else(|| {
        EncodeError::TypeMismatch {
            expected: "string",
            found: value.kind(),
        }
        .in_field(name)
    })?;

    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if Flag::from_char(c).is_some() => Ok(c),
        (Some(c), _) if Flag::from_char(c).is_none() => {
            Err(EncodeError::InvalidCharacter(c).in_field(name))
        }
        _ => Err(EncodeError::InvalidValue {
            expected: "one of Y, N or -".to_string(),
            found: format!("{s:?}"),
        }
        .in_field(name)),
    }
}

pub(crate) fn encode(fields: &FieldMap) -> Result<String, EncodeError> {
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
    if version != VERSION {
        return Err(EncodeError::UnsupportedVersion(version));
    }

    let mut s = version.to_string();
    for name in FLAG_FIELDS {
        s.push(flag_char(fields, name)?);
    }
    Ok(s)
}

pub(crate) fn decode(s: &str) -> Result<FieldMap, DecodeError> {
    let chars = s.chars().collect::<Vec<_>>();
    if chars.len() < 4 {
        return Err(DecodeError::UnexpectedEnd {
            position: chars.len() as u64,
            needed: 4,
            available: chars.len() as u64,
        });
    }
    if chars.len() > 4 {
        return Err(DecodeError::InvalidValue {
            expected: "a 4 characters string".to_string(),
            found: format!("{s:?}"),
        });
    }

    let version = chars[0]
        .to_digit(10)
        .ok_or(DecodeError::InvalidCharacter {
            character: chars[0],
            position: 0,
        })?;
    if u64::from(version) != VERSION {
        return Err(DecodeError::UnknownVersion(u64::from(version)));
    }

    let mut fields = FieldMap::from([(VERSION_FIELD.to_string(), FieldValue::Int(VERSION))]);
    for (i, name) in FLAG_FIELDS.into_iter().enumerate() {
        let c = chars[i + 1];
        let flag = Flag::from_char(c).ok_or(DecodeError::InvalidCharacter {
            character: c,
            position: i + 1,
        })?;
        fields.insert(name.to_string(), flag.into());
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sections::{SectionError, decode_section, encode_section};
    use test_case::test_case;

    fn fields(notice: &str, opt_out_sale: &str, lspa: &str) -> FieldMap {
        FieldMap::from([
            (VERSION_FIELD.to_string(), FieldValue::Int(1)),
            (NOTICE.to_string(), FieldValue::from(notice)),
            (OPT_OUT_SALE.to_string(), FieldValue::from(opt_out_sale)),
            (LSPA_COVERED.to_string(), FieldValue::from(lspa)),
        ])
    }

    #[test_case("1YNN" => fields("Y", "N", "N") ; "all set")]
    #[test_case("1---" => fields("-", "-", "-") ; "not applicable")]
    #[test_case("1NY-" => fields("N", "Y", "-") ; "mixed")]
    fn parse(s: &str) -> FieldMap {
        decode_section("uspv1", s).unwrap()
    }

    #[test_case("1YNN")]
    #[test_case("1-Y-")]
    fn round_trip(s: &str) {
        let decoded = decode_section("uspv1", s).unwrap();
        assert_eq!(encode_section("uspv1", &decoded).unwrap(), s);
    }

    #[test_case("" => matches DecodeError::UnexpectedEnd { needed: 4, available: 0, .. } ; "empty")]
    #[test_case("1YN" => matches DecodeError::UnexpectedEnd { needed: 4, available: 3, .. } ; "short")]
    #[test_case("1YNNN" => matches DecodeError::InvalidValue { .. } ; "long")]
    #[test_case("2YNN" => matches DecodeError::UnknownVersion(2) ; "version")]
    #[test_case("AYNN" => matches DecodeError::InvalidCharacter { character: 'A', position: 0 } ; "version digit")]
    #[test_case("1YXN" => matches DecodeError::InvalidCharacter { character: 'X', position: 2 } ; "flag")]
    fn parse_error(s: &str) -> DecodeError {
        match decode_section("uspv1", s) {
            Err(SectionError::Decode { source, .. }) => source,
            r => panic!("unexpected result {r:?}"),
        }
    }

    #[test]
    fn encode_rejects_invalid_flags() {
        assert!(matches!(
            encode(&fields("y", "N", "N")),
            Err(EncodeError::Field { .. })
        ));
        assert!(matches!(
            encode(&fields("YN", "N", "N")),
            Err(EncodeError::Field { .. })
        ));
        let mut f = fields("Y", "N", "N");
        f.insert(VERSION_FIELD.to_string(), FieldValue::Int(2));
        assert!(matches!(encode(&f), Err(EncodeError::UnsupportedVersion(2))));
    }

    #[test]
    fn flag_values() {
        assert_eq!(FieldValue::from(Flag::Yes), FieldValue::from("Y"));
        assert_eq!(Flag::from_char('-'), Some(Flag::NotApplicable));
        assert_eq!(Flag::from_char('n'), None);
    }
}
