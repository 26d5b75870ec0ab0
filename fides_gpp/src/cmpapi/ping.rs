use crate::cmpapi::status::{CmpDisplayStatus, CmpStatus, SignalStatus};
use crate::core::datatype::FieldMap;
use serde::Serialize;
use std::collections::BTreeMap;

/// Version of the CMP API implemented.
pub const GPP_VERSION: &str = "1.1";

/// The answer to the `ping` command, also attached to every event.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PingData {
    pub gpp_version: &'static str,
    pub cmp_status: CmpStatus,
    pub cmp_display_status: CmpDisplayStatus,
    pub signal_status: SignalStatus,
    #[serde(rename = "supportedAPIs")]
    pub supported_apis: Vec<String>,
    pub cmp_id: u16,
    /// Ids of the sections present in the GPP string.
    pub section_list: Vec<u16>,
    pub applicable_sections: Vec<i32>,
    /// `None` when the current sections fail to encode.
    pub gpp_string: Option<String>,
    /// Field values of each section, keyed by section name.
    pub parsed_sections: BTreeMap<String, FieldMap>,
}
