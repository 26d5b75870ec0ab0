//! The IAB Global Vendor List (GVL), used to resolve the vendor ids found in
//! TCF sections.
//!
//! A vendor list can be parsed from a JSON document with [`Gvl::from_json`],
//! or fetched and cached with a [`GvlLoader`].
use crate::core::IdSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

mod loader;

#[cfg(feature = "http")]
pub use loader::ReqwestFetcher;
pub use loader::{GvlCache, GvlFetcher, GvlLoader};

/// Errors returned when loading a vendor list.
///
/// Loads are shared between callers, so the error keeps the messages of its
/// sources rather than the sources themselves.
#[derive(Error, Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum GvlError {
    #[error("invalid vendor list url: {0}")]
    InvalidUrl(String),
    #[error("request to {url} failed: {reason}")]
    Network { url: String, reason: String },
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("request to {url} failed with status {status}")]
    Status { url: String, status: u16 },
    #[error("malformed vendor list: {0}")]
    Malformed(String),
    #[error("invalid vendor list: {0}")]
    Invalid(String),
}

impl GvlError {
    /// Whether loading again may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } | Self::Timeout { .. } => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for GvlError {
    fn from(e: serde_json::Error) -> Self {
        Self::Malformed(e.to_string())
    }
}

/// A purpose or feature, or a data category.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Purpose {
    pub id: u16,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub illustrations: Vec<String>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stack {
    pub id: u16,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub purposes: Vec<u16>,
    #[serde(default)]
    pub special_features: Vec<u16>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Vendor {
    pub id: u16,
    pub name: String,
    #[serde(default)]
    pub purposes: Vec<u16>,
    #[serde(default)]
    pub leg_int_purposes: Vec<u16>,
    #[serde(default)]
    pub flexible_purposes: Vec<u16>,
    #[serde(default)]
    pub special_purposes: Vec<u16>,
    #[serde(default)]
    pub features: Vec<u16>,
    #[serde(default)]
    pub special_features: Vec<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie_max_age_seconds: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uses_cookies: Option<bool>,
    /// Set when the vendor has been removed from the list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_date: Option<String>,
}

/// The vendor list document as published by the IAB.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorList {
    #[serde(default)]
    pub gvl_specification_version: u32,
    pub vendor_list_version: u32,
    #[serde(default)]
    pub tcf_policy_version: u32,
    #[serde(default)]
    pub last_updated: String,
    #[serde(default)]
    pub purposes: BTreeMap<u16, Purpose>,
    #[serde(default)]
    pub special_purposes: BTreeMap<u16, Purpose>,
    #[serde(default)]
    pub features: BTreeMap<u16, Purpose>,
    #[serde(default)]
    pub special_features: BTreeMap<u16, Purpose>,
    #[serde(default)]
    pub stacks: BTreeMap<u16, Stack>,
    #[serde(default)]
    pub data_categories: BTreeMap<u16, Purpose>,
    pub vendors: BTreeMap<u16, Vendor>,
}

fn check_keys<T>(
    kind: &str,
    records: &BTreeMap<u16, T>,
    id: impl Fn(&T) -> u16,
) -> Result<(), GvlError> {
    match records.iter().find(|&(&key, record)| key != id(record)) {
        Some((key, record)) => Err(GvlError::Invalid(format!(
            "{kind} {key} has id {}",
            id(record)
        ))),
        None => Ok(()),
    }
}

/// A validated vendor list.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Gvl {
    list: VendorList,
}

impl Gvl {
    pub fn from_json(s: &str) -> Result<Self, GvlError> {
        Self::from_vendor_list(serde_json::from_str(s)?)
    }

    /// Checks that the list has a version and that every record is stored
    /// under its own id.
    pub fn from_vendor_list(list: VendorList) -> Result<Self, GvlError> {
        if list.vendor_list_version == 0 {
            return Err(GvlError::Invalid("missing vendor list version".to_string()));
        }
        check_keys("purpose", &list.purposes, |p| p.id)?;
        check_keys("special purpose", &list.special_purposes, |p| p.id)?;
        check_keys("feature", &list.features, |p| p.id)?;
        check_keys("special feature", &list.special_features, |p| p.id)?;
        check_keys("stack", &list.stacks, |s| s.id)?;
        check_keys("data category", &list.data_categories, |c| c.id)?;
        check_keys("vendor", &list.vendors, |v| v.id)?;
        Ok(Self { list })
    }

    pub fn version(&self) -> u32 {
        self.list.vendor_list_version
    }

    pub fn tcf_policy_version(&self) -> u32 {
        self.list.tcf_policy_version
    }

    pub fn vendor_list(&self) -> &VendorList {
        &self.list
    }

    pub fn vendor(&self, id: u16) -> Option<&Vendor> {
        self.list.vendors.get(&id)
    }

    pub fn purpose(&self, id: u16) -> Option<&Purpose> {
        self.list.purposes.get(&id)
    }

    pub fn special_feature(&self, id: u16) -> Option<&Purpose> {
        self.list.special_features.get(&id)
    }

    pub fn vendors(&self) -> impl Iterator<Item = &Vendor> {
        self.list.vendors.values()
    }

    /// The vendors of a decoded vendor id set. Ids missing from the list are
    /// skipped.
    pub fn resolve_vendors<'a>(&'a self, ids: &'a IdSet) -> impl Iterator<Item = &'a Vendor> + 'a {
        ids.iter().filter_map(|id| self.vendor(*id))
    }
}
