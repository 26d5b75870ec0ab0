//! Fields, value types and validation shared by the US sections.
use crate::core::datatype::{DataType, FieldMap, FieldValue};
use crate::sections::{Field, FieldDefault, Inclusion, OptionalSegment, SegmentSchema};
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::{FromPrimitive, ToPrimitive};
use serde::Serialize;

pub const GPC_SEGMENT_TYPE: &str = "GpcSegmentType";
pub const GPC: &str = "Gpc";
pub const GPC_SEGMENT_INCLUDED: &str = "GpcSegmentIncluded";

pub const SHARING_NOTICE: &str = "SharingNotice";
pub const SALE_OPT_OUT_NOTICE: &str = "SaleOptOutNotice";
pub const SHARING_OPT_OUT_NOTICE: &str = "SharingOptOutNotice";
pub const TARGETED_ADVERTISING_OPT_OUT_NOTICE: &str = "TargetedAdvertisingOptOutNotice";
pub const SENSITIVE_DATA_PROCESSING_OPT_OUT_NOTICE: &str = "SensitiveDataProcessingOptOutNotice";
pub const SENSITIVE_DATA_LIMIT_USE_NOTICE: &str = "SensitiveDataLimitUseNotice";
pub const SALE_OPT_OUT: &str = "SaleOptOut";
pub const SHARING_OPT_OUT: &str = "SharingOptOut";
pub const TARGETED_ADVERTISING_OPT_OUT: &str = "TargetedAdvertisingOptOut";
pub const SENSITIVE_DATA_PROCESSING: &str = "SensitiveDataProcessing";
pub const KNOWN_CHILD_SENSITIVE_DATA_CONSENTS: &str = "KnownChildSensitiveDataConsents";
pub const PERSONAL_DATA_CONSENTS: &str = "PersonalDataConsents";
pub const MSPA_COVERED_TRANSACTION: &str = "MspaCoveredTransaction";
pub const MSPA_OPT_OUT_OPTION_MODE: &str = "MspaOptOutOptionMode";
pub const MSPA_SERVICE_PROVIDER_MODE: &str = "MspaServiceProviderMode";

/// A 2 bits field holding one of the enums below.
pub(crate) const fn two_bits(name: &'static str) -> Field {
    Field::new(name, DataType::FixedInteger(2))
}

pub(crate) const fn two_bits_list(name: &'static str, len: usize) -> Field {
    Field::new(name, DataType::FixedIntegerList { width: 2, len })
}

/// The trailing MSPA fields of every US core segment.
pub(crate) const MSPA_COVERED_TRANSACTION_FIELD: Field =
    two_bits(MSPA_COVERED_TRANSACTION).default_to(FieldDefault::Int(1));
pub(crate) const MSPA_OPT_OUT_OPTION_MODE_FIELD: Field = two_bits(MSPA_OPT_OUT_OPTION_MODE);
pub(crate) const MSPA_SERVICE_PROVIDER_MODE_FIELD: Field = two_bits(MSPA_SERVICE_PROVIDER_MODE);

/// Global Privacy Control segment, type 1 with a 2 bits type prefix.
pub(crate) const GPC_SEGMENTS: &[OptionalSegment] = &[OptionalSegment {
    segment_type: 1,
    segment: SegmentSchema {
        name: "gpc",
        fields: &[
            Field::new(GPC_SEGMENT_TYPE, DataType::FixedInteger(2))
                .default_to(FieldDefault::Int(1)),
            Field::new(GPC, DataType::Boolean),
        ],
        inclusion: Inclusion::WhenTrue(GPC_SEGMENT_INCLUDED),
    },
}];

pub(crate) const GPC_FLAGS: &[Field] =
    &[Field::new(GPC_SEGMENT_INCLUDED, DataType::Boolean).default_to(FieldDefault::Bool(true))];

pub(crate) const GPC_SEGMENT_TYPE_BITS: u32 = 2;

macro_rules! two_bits_value {
    ($($t:ty),*) => {
        $(
            impl From<$t> for FieldValue {
                fn from(v: $t) -> Self {
                    FieldValue::Int(v.to_u64().unwrap_or_default())
                }
            }

            impl $t {
                /// Reads the value of a 2 bits field, `None` for the reserved value 3.
                pub fn from_value(v: &FieldValue) -> Option<Self> {
                    v.as_int().and_then(Self::from_u64)
                }
            }
        )*
    };
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, FromPrimitive, ToPrimitive, Serialize)]
pub enum Notice {
    NotApplicable = 0,
    Provided = 1,
    NotProvided = 2,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, FromPrimitive, ToPrimitive, Serialize)]
pub enum OptOut {
    NotApplicable = 0,
    OptedOut = 1,
    DidNotOptOut = 2,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, FromPrimitive, ToPrimitive, Serialize)]
pub enum Consent {
    NotApplicable = 0,
    NoConsent = 1,
    Consent = 2,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, FromPrimitive, ToPrimitive, Serialize)]
pub enum MspaMode {
    NotApplicable = 0,
    Yes = 1,
    No = 2,
}

two_bits_value!(Notice, OptOut, Consent, MspaMode);

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ValidationError {
    /// A value outside of the ones the field allows.
    InvalidValue { field: &'static str, value: u64 },
    /// Two values which cannot be set together.
    Combination {
        field1: (&'static str, u64),
        field2: (&'static str, u64),
    },
}

impl ValidationError {
    fn new(field1: &'static str, val1: u64, field2: &'static str, val2: u64) -> Self {
        Self::Combination {
            field1: (field1, val1),
            field2: (field2, val2),
        }
    }
}

fn is_notice_and_opt_out_combination_ok(notice: Option<Notice>, opt_out: Option<OptOut>) -> bool {
    notice == Some(Notice::NotApplicable) && opt_out == Some(OptOut::NotApplicable)
        || notice == Some(Notice::Provided)
            && opt_out.is_some()
            && opt_out != Some(OptOut::NotApplicable)
        || notice == Some(Notice::NotProvided) && opt_out == Some(OptOut::OptedOut)
}

const NOTICE_OPT_OUT_PAIRS: [(&str, &str); 3] = [
    (SALE_OPT_OUT_NOTICE, SALE_OPT_OUT),
    (SHARING_OPT_OUT_NOTICE, SHARING_OPT_OUT),
    (TARGETED_ADVERTISING_OPT_OUT_NOTICE, TARGETED_ADVERTISING_OPT_OUT),
];

/// Checks the consistency of notice, opt-out and MSPA values of a US
/// section.
///
/// CMPs shouldn't be able to generate invalid combinations, but the binary
/// wire format does not prevent them.
pub fn validate(fields: &FieldMap) -> Result<(), Vec<ValidationError>> {
    let int = |name: &str| fields.get(name).and_then(FieldValue::as_int);
    let mut errors = vec![];

    // 1 for yes, 2 for no
    if let Some(value) = int(MSPA_COVERED_TRANSACTION).filter(|&v| !matches!(v, 1 | 2)) {
        errors.push(ValidationError::InvalidValue {
            field: MSPA_COVERED_TRANSACTION,
            value,
        });
    }

    for (notice_field, opt_out_field) in NOTICE_OPT_OUT_PAIRS {
        let (Some(notice), Some(opt_out)) = (int(notice_field), int(opt_out_field)) else {
            continue;
        };
        if !is_notice_and_opt_out_combination_ok(
            Notice::from_u64(notice),
            OptOut::from_u64(opt_out),
        ) {
            errors.push(ValidationError::new(
                notice_field,
                notice,
                opt_out_field,
                opt_out,
            ));
        }
    }

    let service_provider_mode = int(MSPA_SERVICE_PROVIDER_MODE).unwrap_or_default();
    let opt_out_option_mode = int(MSPA_OPT_OUT_OPTION_MODE).unwrap_or_default();
    let sale_opt_out_notice = int(SALE_OPT_OUT_NOTICE).unwrap_or_default();
    match MspaMode::from_u64(service_provider_mode) {
        Some(MspaMode::NotApplicable) => {
            if sale_opt_out_notice != Notice::NotApplicable as u64 {
                errors.push(ValidationError::new(
                    MSPA_SERVICE_PROVIDER_MODE,
                    service_provider_mode,
                    SALE_OPT_OUT_NOTICE,
                    sale_opt_out_notice,
                ));
            }
        }
        Some(MspaMode::Yes) => {
            if opt_out_option_mode != MspaMode::No as u64 {
                errors.push(ValidationError::new(
                    MSPA_SERVICE_PROVIDER_MODE,
                    service_provider_mode,
                    MSPA_OPT_OUT_OPTION_MODE,
                    opt_out_option_mode,
                ));
            }
            if sale_opt_out_notice != Notice::NotApplicable as u64 {
                errors.push(ValidationError::new(
                    MSPA_SERVICE_PROVIDER_MODE,
                    service_provider_mode,
                    SALE_OPT_OUT_NOTICE,
                    sale_opt_out_notice,
                ));
            }
        }
        Some(MspaMode::No) => {
            if opt_out_option_mode != MspaMode::Yes as u64 {
                errors.push(ValidationError::new(
                    MSPA_SERVICE_PROVIDER_MODE,
                    service_provider_mode,
                    MSPA_OPT_OUT_OPTION_MODE,
                    opt_out_option_mode,
                ));
            }
        }
        None => {}
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
