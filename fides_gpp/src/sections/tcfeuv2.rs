//! IAB TCF EU v2 section.
//!
//! The core segment is followed by the optional allowed vendors, disclosed
//! vendors and publisher purposes segments, each prefixed with a 3 bits
//! segment type. Service specific strings carry publisher purposes, global
//! strings carry the vendor segments.
use crate::core::datatype::{DataType, FieldMap, FieldValue};
use crate::core::range::find_entry;
use crate::sections::{
    CoreSegment, Field, FieldDefault, IdSet, Inclusion, OptionalSegment, SectionFormat, SectionId,
    SectionSchema, SegmentSchema, VERSION_FIELD,
};
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::ToPrimitive;
use serde::Serialize;

pub const CREATED: &str = "Created";
pub const LAST_UPDATED: &str = "LastUpdated";
pub const CMP_ID: &str = "CmpId";
pub const CMP_VERSION: &str = "CmpVersion";
pub const CONSENT_SCREEN: &str = "ConsentScreen";
pub const CONSENT_LANGUAGE: &str = "ConsentLanguage";
pub const VENDOR_LIST_VERSION: &str = "VendorListVersion";
pub const POLICY_VERSION: &str = "PolicyVersion";
pub const IS_SERVICE_SPECIFIC: &str = "IsServiceSpecific";
pub const USE_NON_STANDARD_STACKS: &str = "UseNonStandardStacks";
pub const SPECIAL_FEATURE_OPTINS: &str = "SpecialFeatureOptins";
pub const PURPOSE_CONSENTS: &str = "PurposeConsents";
pub const PURPOSE_LEGITIMATE_INTERESTS: &str = "PurposeLegitimateInterests";
pub const PURPOSE_ONE_TREATMENT: &str = "PurposeOneTreatment";
pub const PUBLISHER_COUNTRY_CODE: &str = "PublisherCountryCode";
pub const VENDOR_CONSENTS: &str = "VendorConsents";
pub const VENDOR_LEGITIMATE_INTERESTS: &str = "VendorLegitimateInterests";
pub const PUBLISHER_RESTRICTIONS: &str = "PublisherRestrictions";

pub const VENDORS_DISCLOSED_SEGMENT_TYPE: &str = "VendorsDisclosedSegmentType";
pub const VENDORS_DISCLOSED: &str = "VendorsDisclosed";
pub const VENDORS_ALLOWED_SEGMENT_TYPE: &str = "VendorsAllowedSegmentType";
pub const VENDORS_ALLOWED: &str = "VendorsAllowed";
pub const PUBLISHER_PURPOSES_SEGMENT_TYPE: &str = "PublisherPurposesSegmentType";
pub const PUBLISHER_CONSENTS: &str = "PublisherConsents";
pub const PUBLISHER_LEGITIMATE_INTERESTS: &str = "PublisherLegitimateInterests";
pub const NUM_CUSTOM_PURPOSES: &str = "NumCustomPurposes";
pub const PUBLISHER_CUSTOM_CONSENTS: &str = "PublisherCustomConsents";
pub const PUBLISHER_CUSTOM_LEGITIMATE_INTERESTS: &str = "PublisherCustomLegitimateInterests";

pub static SCHEMA: SectionSchema = SectionSchema {
    id: SectionId::TcfEuV2,
    name: "tcfeuv2",
    format: SectionFormat::Segmented {
        cores: &[CoreSegment {
            version: 2,
            segment: SegmentSchema {
                name: "core",
                fields: &[
                    Field::new(VERSION_FIELD, DataType::FixedInteger(6))
                        .default_to(FieldDefault::Int(2)),
                    Field::new(CREATED, DataType::Datetime).default_to(FieldDefault::Now),
                    Field::new(LAST_UPDATED, DataType::Datetime).default_to(FieldDefault::Now),
                    Field::new(CMP_ID, DataType::FixedInteger(12)),
                    Field::new(CMP_VERSION, DataType::FixedInteger(12)),
                    Field::new(CONSENT_SCREEN, DataType::FixedInteger(6)),
                    Field::new(CONSENT_LANGUAGE, DataType::FixedString(2))
                        .default_to(FieldDefault::Str("EN")),
                    Field::new(VENDOR_LIST_VERSION, DataType::FixedInteger(12)),
                    Field::new(POLICY_VERSION, DataType::FixedInteger(6))
                        .default_to(FieldDefault::Int(4)),
                    Field::new(IS_SERVICE_SPECIFIC, DataType::Boolean),
                    Field::new(USE_NON_STANDARD_STACKS, DataType::Boolean),
                    Field::new(SPECIAL_FEATURE_OPTINS, DataType::FixedBitfield(12)),
                    Field::new(PURPOSE_CONSENTS, DataType::FixedBitfield(24)),
                    Field::new(PURPOSE_LEGITIMATE_INTERESTS, DataType::FixedBitfield(24)),
                    Field::new(PURPOSE_ONE_TREATMENT, DataType::Boolean),
                    Field::new(PUBLISHER_COUNTRY_CODE, DataType::FixedString(2))
                        .default_to(FieldDefault::Str("AA")),
                    Field::new(VENDOR_CONSENTS, DataType::OptimizedFixedRange),
                    Field::new(VENDOR_LEGITIMATE_INTERESTS, DataType::OptimizedFixedRange),
                    Field::new(
                        PUBLISHER_RESTRICTIONS,
                        DataType::ArrayOfRanges {
                            key_bits: 6,
                            type_bits: 2,
                        },
                    ),
                ],
                inclusion: Inclusion::Always,
            },
        }],
        segment_type_bits: 3,
        optional: &[
            OptionalSegment {
                segment_type: 2,
                segment: SegmentSchema {
                    name: "vendors allowed",
                    fields: &[
                        Field::new(VENDORS_ALLOWED_SEGMENT_TYPE, DataType::FixedInteger(3))
                            .default_to(FieldDefault::Int(2)),
                        Field::new(VENDORS_ALLOWED, DataType::OptimizedFixedRange),
                    ],
                    inclusion: Inclusion::WhenFalse(IS_SERVICE_SPECIFIC),
                },
            },
            OptionalSegment {
                segment_type: 1,
                segment: SegmentSchema {
                    name: "vendors disclosed",
                    fields: &[
                        Field::new(VENDORS_DISCLOSED_SEGMENT_TYPE, DataType::FixedInteger(3))
                            .default_to(FieldDefault::Int(1)),
                        Field::new(VENDORS_DISCLOSED, DataType::OptimizedFixedRange),
                    ],
                    inclusion: Inclusion::WhenFalse(IS_SERVICE_SPECIFIC),
                },
            },
            OptionalSegment {
                segment_type: 3,
                segment: SegmentSchema {
                    name: "publisher purposes",
                    fields: &[
                        Field::new(PUBLISHER_PURPOSES_SEGMENT_TYPE, DataType::FixedInteger(3))
                            .default_to(FieldDefault::Int(3)),
                        Field::new(PUBLISHER_CONSENTS, DataType::FixedBitfield(24)),
                        Field::new(PUBLISHER_LEGITIMATE_INTERESTS, DataType::FixedBitfield(24)),
                        Field::new(NUM_CUSTOM_PURPOSES, DataType::FixedInteger(6)),
                        Field::new(
                            PUBLISHER_CUSTOM_CONSENTS,
                            DataType::FlexibleBitfield {
                                length_field: NUM_CUSTOM_PURPOSES,
                            },
                        ),
                        Field::new(
                            PUBLISHER_CUSTOM_LEGITIMATE_INTERESTS,
                            DataType::FlexibleBitfield {
                                length_field: NUM_CUSTOM_PURPOSES,
                            },
                        ),
                    ],
                    inclusion: Inclusion::WhenTrue(IS_SERVICE_SPECIFIC),
                },
            },
        ],
        flags: &[],
    },
};

#[derive(Clone, Copy, Debug, Eq, PartialEq, FromPrimitive, ToPrimitive, Serialize)]
pub enum RestrictionType {
    NotAllowed = 0,
    RequireConsent = 1,
    RequireLegitimateInterest = 2,
    Undefined = 3,
}

/// Vendors restricted by the publisher for a purpose, if any.
pub fn restricted_vendors(
    fields: &FieldMap,
    purpose_id: u16,
    restriction_type: RestrictionType,
) -> Option<&IdSet> {
    let entries = fields
        .get(PUBLISHER_RESTRICTIONS)
        .and_then(FieldValue::as_ranges)?;
    let range_type = restriction_type.to_u16()?;
    find_entry(entries, purpose_id, range_type).map(|e| &e.ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DecodeError;
    use crate::core::range::RangeEntry;
    use crate::sections::{Section, SectionError, decode_section, encode_section};
    use test_case::test_case;

    const CORE: &str = "CPXxRfAPXxRfAAfKABENB-CgAAAAAAAAAAYgAAAAAAAA";
    const PUBLISHER_PURPOSES: &str = "ZAAgH9794ulA";
    const VENDORS_DISCLOSED_SEGMENT: &str = "IFoEUQQgAIQwgIwQABAEAAAAOIAACAIAAAAQAIAgEAACEAAAAAgAQBAAAAAAAGBAAgAAAAAAAFAAECAAAgAAQARAEQAAAAAJAAIAAgAAAYQEAAAQmAgBC3ZAYzUw";

    fn bits(len: usize, set: &[usize]) -> FieldValue {
        FieldValue::Bitfield((1..=len).map(|i| set.contains(&i)).collect())
    }

    #[test]
    fn parse_core() {
        let f = decode_section("tcfeuv2", CORE).unwrap();
        assert_eq!(f[VERSION_FIELD], FieldValue::Int(2));
        assert_eq!(f[CREATED], FieldValue::Int(1650492000));
        assert_eq!(f[LAST_UPDATED], FieldValue::Int(1650492000));
        assert_eq!(f[CMP_ID], FieldValue::Int(31));
        assert_eq!(f[CMP_VERSION], FieldValue::Int(640));
        assert_eq!(f[CONSENT_SCREEN], FieldValue::Int(1));
        assert_eq!(f[CONSENT_LANGUAGE], FieldValue::from("EN"));
        assert_eq!(f[VENDOR_LIST_VERSION], FieldValue::Int(126));
        assert_eq!(f[POLICY_VERSION], FieldValue::Int(2));
        assert_eq!(f[IS_SERVICE_SPECIFIC], FieldValue::Bool(true));
        assert_eq!(f[PURPOSE_CONSENTS], bits(24, &[]));
        assert_eq!(f[PUBLISHER_COUNTRY_CODE], FieldValue::from("DE"));
        assert_eq!(f[VENDOR_CONSENTS], FieldValue::IdSet(IdSet::new()));
        assert_eq!(f[PUBLISHER_RESTRICTIONS], FieldValue::Ranges(vec![]));
    }

    #[test]
    fn parse_publisher_purposes() {
        let f = decode_section("tcfeuv2", &format!("{CORE}.{PUBLISHER_PURPOSES}")).unwrap();
        assert_eq!(f[PUBLISHER_CONSENTS], bits(24, &[3, 16]));
        assert_eq!(
            f[PUBLISHER_LEGITIMATE_INTERESTS],
            bits(
                24,
                &[1, 2, 3, 4, 5, 6, 7, 9, 10, 11, 12, 14, 15, 16, 17, 18, 19, 21, 22, 23, 24]
            )
        );
        assert_eq!(f[NUM_CUSTOM_PURPOSES], FieldValue::Int(5));
        assert_eq!(f[PUBLISHER_CUSTOM_CONSENTS], bits(5, &[1, 2, 4]));
        assert_eq!(f[PUBLISHER_CUSTOM_LEGITIMATE_INTERESTS], bits(5, &[2, 4]));
    }

    #[test]
    fn parse_vendors_disclosed() {
        let f =
            decode_section("tcfeuv2", &format!("{CORE}.{VENDORS_DISCLOSED_SEGMENT}")).unwrap();
        let vendors = f[VENDORS_DISCLOSED].as_id_set().unwrap();
        assert_eq!(vendors.len(), 79);
        assert_eq!(vendors.iter().take(4).copied().collect::<Vec<_>>(), [2, 6, 8, 12]);
        assert_eq!(vendors.last(), Some(&720));
    }

    #[test]
    fn decode_then_encode_is_identity() {
        let s = format!("{CORE}.{PUBLISHER_PURPOSES}");
        let fields = decode_section("tcfeuv2", &s).unwrap();
        assert_eq!(encode_section("tcfeuv2", &fields).unwrap(), s);
    }

    #[test]
    fn optional_segments_follow_service_specific_flag() {
        let mut s = Section::new(SectionId::TcfEuV2).unwrap();
        s.set_field(VENDORS_ALLOWED, FieldValue::IdSet(IdSet::from([4, 5, 6])))
            .unwrap();
        let global = s.encode().unwrap();
        assert_eq!(global.split('.').count(), 3);
        let decoded = Section::decode(SectionId::TcfEuV2, &global).unwrap();
        assert_eq!(decoded, s);

        s.set_field(IS_SERVICE_SPECIFIC, FieldValue::Bool(true))
            .unwrap();
        let service_specific = s.encode().unwrap();
        assert_eq!(service_specific.split('.').count(), 2);
        let decoded = Section::decode(SectionId::TcfEuV2, &service_specific).unwrap();
        assert_eq!(decoded.field(VENDORS_ALLOWED), Some(&FieldValue::IdSet(IdSet::new())));
    }

    #[test]
    fn publisher_restrictions() {
        let mut s = Section::new(SectionId::TcfEuV2).unwrap();
        s.set_field(
            PUBLISHER_RESTRICTIONS,
            FieldValue::Ranges(vec![
                RangeEntry::new(1, 0, [10, 11, 12, 40]),
                RangeEntry::new(2, 1, [10]),
                RangeEntry::new(7, 2, [300, 301]),
            ]),
        )
        .unwrap();
        let decoded = Section::decode(SectionId::TcfEuV2, &s.encode().unwrap()).unwrap();
        assert_eq!(decoded, s);

        let f = decoded.fields();
        assert_eq!(
            restricted_vendors(f, 1, RestrictionType::NotAllowed),
            Some(&IdSet::from([10, 11, 12, 40]))
        );
        assert_eq!(
            restricted_vendors(f, 7, RestrictionType::RequireLegitimateInterest),
            Some(&IdSet::from([300, 301]))
        );
        assert_eq!(restricted_vendors(f, 1, RestrictionType::RequireConsent), None);
        assert_eq!(restricted_vendors(f, 3, RestrictionType::NotAllowed), None);
    }

    #[test_case("CPX" => matches DecodeError::Substring { .. } ; "decode error")]
    #[test_case("" => matches DecodeError::EmptySegment ; "empty string")]
    #[test_case(VENDORS_DISCLOSED_SEGMENT => matches DecodeError::UnknownVersion(8) ; "disclosed vendors only")]
    #[test_case(PUBLISHER_PURPOSES => matches DecodeError::UnknownVersion(25) ; "publisher purposes only")]
    fn error(s: &str) -> DecodeError {
        match decode_section("tcfeuv2", s) {
            Err(SectionError::Decode { source, .. }) => source,
            r => panic!("unexpected result {r:?}"),
        }
    }
}
