//! US Virginia section.
use crate::core::datatype::DataType;
use crate::sections::us_common::*;
use crate::sections::{
    CoreSegment, Field, FieldDefault, Inclusion, SectionFormat, SectionId, SectionSchema,
    SegmentSchema, VERSION_FIELD,
};

pub static SCHEMA: SectionSchema = SectionSchema {
    id: SectionId::UsVa,
    name: "usva",
    format: SectionFormat::Segmented {
        cores: &[CoreSegment {
            version: 1,
            segment: SegmentSchema {
                name: "core",
                fields: &[
                    Field::new(VERSION_FIELD, DataType::FixedInteger(6))
                        .default_to(FieldDefault::Int(1)),
                    two_bits(SHARING_NOTICE),
                    two_bits(SALE_OPT_OUT_NOTICE),
                    two_bits(TARGETED_ADVERTISING_OPT_OUT_NOTICE),
                    two_bits(SALE_OPT_OUT),
                    two_bits(TARGETED_ADVERTISING_OPT_OUT),
                    two_bits_list(SENSITIVE_DATA_PROCESSING, 8),
                    two_bits(KNOWN_CHILD_SENSITIVE_DATA_CONSENTS),
                    MSPA_COVERED_TRANSACTION_FIELD,
                    MSPA_OPT_OUT_OPTION_MODE_FIELD,
                    MSPA_SERVICE_PROVIDER_MODE_FIELD,
                ],
                inclusion: Inclusion::Always,
            },
        }],
        segment_type_bits: 0,
        optional: &[],
        flags: &[],
    },
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DecodeError;
    use crate::core::datatype::FieldValue;
    use crate::sections::{SectionError, decode_section, encode_section};
    use test_case::test_case;

    #[test]
    fn parse() {
        let f = decode_section("usva", "BVVVVWY").unwrap();
        for name in [
            SHARING_NOTICE,
            SALE_OPT_OUT_NOTICE,
            TARGETED_ADVERTISING_OPT_OUT_NOTICE,
            SALE_OPT_OUT,
            TARGETED_ADVERTISING_OPT_OUT,
        ] {
            assert_eq!(f.get(name), Some(&FieldValue::Int(1)), "{name}");
        }
        assert_eq!(
            f.get(SENSITIVE_DATA_PROCESSING),
            Some(&FieldValue::IntList(vec![1; 8]))
        );
        assert_eq!(
            f.get(KNOWN_CHILD_SENSITIVE_DATA_CONSENTS),
            Some(&FieldValue::Int(1))
        );
        assert_eq!(f.get(MSPA_COVERED_TRANSACTION), Some(&FieldValue::Int(2)));
        assert_eq!(f.get(MSPA_OPT_OUT_OPTION_MODE), Some(&FieldValue::from(MspaMode::Yes)));
        assert_eq!(f.get(MSPA_SERVICE_PROVIDER_MODE), Some(&FieldValue::from(MspaMode::No)));
        assert!(f.get(GPC_SEGMENT_INCLUDED).is_none());
    }

    #[test]
    fn decode_then_encode_is_identity() {
        let f = decode_section("usva", "BVVVVWY").unwrap();
        assert_eq!(encode_section("usva", &f).unwrap(), "BVVVVWY");
    }

    #[test_case("CVVVVVVVVWA" => matches DecodeError::UnknownVersion(2) ; "unknown segment version")]
    #[test_case("BVVVVWY.AA" => matches DecodeError::UnknownSegmentType(0) ; "unknown segment type")]
    #[test_case("BVVV" => matches DecodeError::Substring { .. } ; "truncated core")]
    fn error(s: &str) -> DecodeError {
        match decode_section("usva", s) {
            Err(SectionError::Decode { source, .. }) => source,
            r => panic!("unexpected result {r:?}"),
        }
    }
}
