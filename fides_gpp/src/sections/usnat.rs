//! US National Privacy section.
use crate::core::datatype::DataType;
use crate::sections::us_common::*;
use crate::sections::{
    CoreSegment, Field, FieldDefault, Inclusion, SectionFormat, SectionId, SectionSchema,
    SegmentSchema, VERSION_FIELD,
};

const fn core_fields(version: u64, sensitive_data: usize, known_child: usize) -> [Field; 16] {
    [
        Field::new(VERSION_FIELD, DataType::FixedInteger(6)).default_to(FieldDefault::Int(version)),
        two_bits(SHARING_NOTICE),
        two_bits(SALE_OPT_OUT_NOTICE),
        two_bits(SHARING_OPT_OUT_NOTICE),
        two_bits(TARGETED_ADVERTISING_OPT_OUT_NOTICE),
        two_bits(SENSITIVE_DATA_PROCESSING_OPT_OUT_NOTICE),
        two_bits(SENSITIVE_DATA_LIMIT_USE_NOTICE),
        two_bits(SALE_OPT_OUT),
        two_bits(SHARING_OPT_OUT),
        two_bits(TARGETED_ADVERTISING_OPT_OUT),
        two_bits_list(SENSITIVE_DATA_PROCESSING, sensitive_data),
        two_bits_list(KNOWN_CHILD_SENSITIVE_DATA_CONSENTS, known_child),
        two_bits(PERSONAL_DATA_CONSENTS),
        MSPA_COVERED_TRANSACTION_FIELD,
        MSPA_OPT_OUT_OPTION_MODE_FIELD,
        MSPA_SERVICE_PROVIDER_MODE_FIELD,
    ]
}

const CORE_V1: [Field; 16] = core_fields(1, 12, 2);
const CORE_V2: [Field; 16] = core_fields(2, 16, 3);

pub static SCHEMA: SectionSchema = SectionSchema {
    id: SectionId::UsNat,
    name: "usnat",
    format: SectionFormat::Segmented {
        cores: &[
            CoreSegment {
                version: 1,
                segment: SegmentSchema {
                    name: "core",
                    fields: &CORE_V1,
                    inclusion: Inclusion::Always,
                },
            },
            CoreSegment {
                version: 2,
                segment: SegmentSchema {
                    name: "core",
                    fields: &CORE_V2,
                    inclusion: Inclusion::Always,
                },
            },
        ],
        segment_type_bits: GPC_SEGMENT_TYPE_BITS,
        optional: GPC_SEGMENTS,
        flags: GPC_FLAGS,
    },
};
