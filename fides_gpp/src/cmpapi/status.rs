//! The statuses reported by a CMP, serialized with their IAB names.
use serde::Serialize;
use strum_macros::{Display, EnumString};

#[derive(Clone, Copy, Debug, Display, EnumString, Eq, PartialEq, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CmpStatus {
    Stub,
    Loading,
    Loaded,
    Error,
}

#[derive(Clone, Copy, Debug, Display, EnumString, Eq, PartialEq, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CmpDisplayStatus {
    Hidden,
    Visible,
    Disabled,
}

/// Whether the GPP string is stable for the current page load.
#[derive(Clone, Copy, Debug, Display, EnumString, Eq, PartialEq, Serialize)]
pub enum SignalStatus {
    #[strum(serialize = "not ready")]
    #[serde(rename = "not ready")]
    NotReady,
    #[strum(serialize = "ready")]
    #[serde(rename = "ready")]
    Ready,
}

/// The last user facing event of the CMP.
#[derive(Clone, Copy, Debug, Display, EnumString, Eq, PartialEq, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    CmpUiShown,
    UserActionComplete,
}
