//! US Connecticut section.
use crate::core::datatype::DataType;
use crate::sections::us_common::*;
use crate::sections::{
    CoreSegment, Field, FieldDefault, Inclusion, SectionFormat, SectionId, SectionSchema,
    SegmentSchema, VERSION_FIELD,
};

pub static SCHEMA: SectionSchema = SectionSchema {
    id: SectionId::UsCt,
    name: "usct",
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
                    two_bits_list(KNOWN_CHILD_SENSITIVE_DATA_CONSENTS, 3),
                    MSPA_COVERED_TRANSACTION_FIELD,
                    MSPA_OPT_OUT_OPTION_MODE_FIELD,
                    MSPA_SERVICE_PROVIDER_MODE_FIELD,
                ],
                inclusion: Inclusion::Always,
            },
        }],
        segment_type_bits: GPC_SEGMENT_TYPE_BITS,
        optional: GPC_SEGMENTS,
        flags: GPC_FLAGS,
    },
};
