//! IAB TCF Canada v1 section.
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
pub const TCF_POLICY_VERSION: &str = "TcfPolicyVersion";
pub const USE_NON_STANDARD_STACKS: &str = "UseNonStandardStacks";
pub const SPECIAL_FEATURE_EXPRESS_CONSENT: &str = "SpecialFeatureExpressConsent";
pub const PURPOSES_EXPRESS_CONSENT: &str = "PurposesExpressConsent";
pub const PURPOSES_IMPLIED_CONSENT: &str = "PurposesImpliedConsent";
pub const VENDOR_EXPRESS_CONSENT: &str = "VendorExpressConsent";
pub const VENDOR_IMPLIED_CONSENT: &str = "VendorImpliedConsent";
/// Introduced in TCF CA v1.1.
pub const PUB_RESTRICTIONS: &str = "PubRestrictions";

pub const PUB_PURPOSES_SEGMENT_TYPE: &str = "PubPurposesSegmentType";
pub const PUB_PURPOSES_EXPRESS_CONSENT: &str = "PubPurposesExpressConsent";
pub const PUB_PURPOSES_IMPLIED_CONSENT: &str = "PubPurposesImpliedConsent";
pub const NUM_CUSTOM_PURPOSES: &str = "NumCustomPurposes";
pub const CUSTOM_PURPOSES_EXPRESS_CONSENT: &str = "CustomPurposesExpressConsent";
pub const CUSTOM_PURPOSES_IMPLIED_CONSENT: &str = "CustomPurposesImpliedConsent";

pub const DISCLOSED_VENDORS_SEGMENT_TYPE: &str = "DisclosedVendorsSegmentType";
pub const DISCLOSED_VENDORS: &str = "DisclosedVendors";

pub static SCHEMA: SectionSchema = SectionSchema {
    id: SectionId::TcfCaV1,
    name: "tcfcav1",
    format: SectionFormat::Segmented {
        cores: &[CoreSegment {
            version: 1,
            segment: SegmentSchema {
                name: "core",
                fields: &[
                    Field::new(VERSION_FIELD, DataType::FixedInteger(6))
                        .default_to(FieldDefault::Int(1)),
                    Field::new(CREATED, DataType::Datetime).default_to(FieldDefault::Now),
                    Field::new(LAST_UPDATED, DataType::Datetime).default_to(FieldDefault::Now),
                    Field::new(CMP_ID, DataType::FixedInteger(12)),
                    Field::new(CMP_VERSION, DataType::FixedInteger(12)),
                    Field::new(CONSENT_SCREEN, DataType::FixedInteger(6)),
                    Field::new(CONSENT_LANGUAGE, DataType::FixedString(2))
                        .default_to(FieldDefault::Str("EN")),
                    Field::new(VENDOR_LIST_VERSION, DataType::FixedInteger(12)),
                    Field::new(TCF_POLICY_VERSION, DataType::FixedInteger(6))
                        .default_to(FieldDefault::Int(2)),
                    Field::new(USE_NON_STANDARD_STACKS, DataType::Boolean),
                    Field::new(SPECIAL_FEATURE_EXPRESS_CONSENT, DataType::FixedBitfield(12)),
                    Field::new(PURPOSES_EXPRESS_CONSENT, DataType::FixedBitfield(24)),
                    Field::new(PURPOSES_IMPLIED_CONSENT, DataType::FixedBitfield(24)),
                    Field::new(VENDOR_EXPRESS_CONSENT, DataType::OptimizedFixedRange),
                    Field::new(VENDOR_IMPLIED_CONSENT, DataType::OptimizedFixedRange),
                    Field::new(
                        PUB_RESTRICTIONS,
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
                segment_type: 3,
                segment: SegmentSchema {
                    name: "publisher purposes",
                    fields: &[
                        Field::new(PUB_PURPOSES_SEGMENT_TYPE, DataType::FixedInteger(3))
                            .default_to(FieldDefault::Int(3)),
                        Field::new(PUB_PURPOSES_EXPRESS_CONSENT, DataType::FixedBitfield(24)),
                        Field::new(PUB_PURPOSES_IMPLIED_CONSENT, DataType::FixedBitfield(24)),
                        Field::new(NUM_CUSTOM_PURPOSES, DataType::FixedInteger(6)),
                        Field::new(
                            CUSTOM_PURPOSES_EXPRESS_CONSENT,
                            DataType::FlexibleBitfield {
                                length_field: NUM_CUSTOM_PURPOSES,
                            },
                        ),
                        Field::new(
                            CUSTOM_PURPOSES_IMPLIED_CONSENT,
                            DataType::FlexibleBitfield {
                                length_field: NUM_CUSTOM_PURPOSES,
                            },
                        ),
                    ],
                    inclusion: Inclusion::Always,
                },
            },
            OptionalSegment {
                segment_type: 1,
                segment: SegmentSchema {
                    name: "disclosed vendors",
                    fields: &[
                        Field::new(DISCLOSED_VENDORS_SEGMENT_TYPE, DataType::FixedInteger(3))
                            .default_to(FieldDefault::Int(1)),
                        Field::new(DISCLOSED_VENDORS, DataType::OptimizedFixedRange),
                    ],
                    inclusion: Inclusion::Always,
                },
            },
        ],
        flags: &[],
    },
};

#[derive(Clone, Copy, Debug, Eq, PartialEq, FromPrimitive, ToPrimitive, Serialize)]
pub enum RestrictionType {
    NotAllowed = 0,
    RequireExpressConsent = 1,
    RequireImpliedConsent = 2,
    Undefined = 3,
}

/// Vendors restricted by the publisher for a purpose, if any.
pub fn restricted_vendors(
    fields: &FieldMap,
    purpose_id: u16,
    restriction_type: RestrictionType,
) -> Option<&IdSet> {
    let entries = fields
        .get(PUB_RESTRICTIONS)
        .and_then(FieldValue::as_ranges)?;
    find_entry(entries, purpose_id, restriction_type.to_u16()?).map(|e| &e.ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DecodeError;
    use crate::core::range::RangeEntry;
    use crate::sections::{Section, SectionError, decode_section};
    use test_case::test_case;

    fn section() -> Section {
        let mut s = Section::new(SectionId::TcfCaV1).unwrap();
        s.set_field(CMP_ID, FieldValue::Int(50)).unwrap();
        s.set_field(CONSENT_LANGUAGE, FieldValue::from("FR")).unwrap();
        s.set_field(VENDOR_LIST_VERSION, FieldValue::Int(413)).unwrap();
        s.set_field(
            PURPOSES_EXPRESS_CONSENT,
            FieldValue::Bitfield((0..24).map(|i| i % 3 == 0).collect()),
        )
        .unwrap();
        s.set_field(VENDOR_EXPRESS_CONSENT, FieldValue::IdSet(IdSet::from([2, 3, 4, 700])))
            .unwrap();
        s.set_field(
            PUB_RESTRICTIONS,
            FieldValue::Ranges(vec![RangeEntry::new(
                2,
                RestrictionType::RequireImpliedConsent as u16,
                [8, 9],
            )]),
        )
        .unwrap();
        s.set_field(NUM_CUSTOM_PURPOSES, FieldValue::Int(3)).unwrap();
        s.set_field(
            CUSTOM_PURPOSES_IMPLIED_CONSENT,
            FieldValue::Bitfield(vec![true, false, true]),
        )
        .unwrap();
        s.set_field(CUSTOM_PURPOSES_EXPRESS_CONSENT, FieldValue::Bitfield(vec![false; 3]))
            .unwrap();
        s.set_field(DISCLOSED_VENDORS, FieldValue::IdSet(IdSet::from([2, 3, 4, 10])))
            .unwrap();
        s
    }

    #[test]
    fn decode_reverses_encode() {
        let s = section();
        let encoded = s.encode().unwrap();
        assert_eq!(Section::decode(SectionId::TcfCaV1, &encoded).unwrap(), s);
    }

    #[test]
    fn segments_are_emitted_in_order() {
        let s = section();
        let encoded = s.encode().unwrap();
        let segments = encoded.split('.').collect::<Vec<_>>();
        assert_eq!(segments.len(), 3);
        // the first base64 character holds the 3 bits segment type
        assert!(('Y'..='f').contains(&segments[1].chars().next().unwrap()));
        assert!(('I'..='P').contains(&segments[2].chars().next().unwrap()));

        let swapped = [segments[0], segments[2], segments[1]].join(".");
        assert_eq!(Section::decode(SectionId::TcfCaV1, &swapped).unwrap(), s);
    }

    #[test]
    fn publisher_restrictions() {
        let s = section();
        assert_eq!(
            restricted_vendors(s.fields(), 2, RestrictionType::RequireImpliedConsent),
            Some(&IdSet::from([8, 9]))
        );
        assert_eq!(
            restricted_vendors(s.fields(), 2, RestrictionType::NotAllowed),
            None
        );
    }

    #[test_case("BPX" => matches DecodeError::Substring { .. } ; "decode error")]
    #[test_case("" => matches DecodeError::EmptySegment ; "empty string")]
    fn error(s: &str) -> DecodeError {
        match decode_section("tcfcav1", s) {
            Err(SectionError::Decode { source, .. }) => source,
            r => panic!("unexpected result {r:?}"),
        }
    }
}
