//! Configuration of a CMP instance.
//!
//! ```
//! use fides_gpp::config::CmpConfig;
//!
//! let config = CmpConfig::from_json(r#"{ "cmp_id": 31, "cmp_version": 2 }"#).unwrap();
//! assert_eq!(config.gvl.base_url, "https://vendor-list.consensu.org/v3");
//! ```
use serde::Deserialize;
use thiserror::Error;
use url::Url;

/// Largest value of the 12-bit CMP id and version fields.
pub const MAX_CMP_ID: u16 = (1 << 12) - 1;

pub const DEFAULT_GVL_BASE_URL: &str = "https://vendor-list.consensu.org/v3";
pub const DEFAULT_GVL_TIMEOUT_MS: u64 = 10_000;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("unable to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("cmp id must be between 1 and {MAX_CMP_ID}, got {0}")]
    InvalidCmpId(u16),
    #[error("cmp version must be at most {MAX_CMP_ID}, got {0}")]
    InvalidCmpVersion(u16),
    #[error("invalid vendor list url {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("vendor list timeout must be non-zero")]
    InvalidTimeout,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct CmpConfig {
    pub cmp_id: u16,
    #[serde(default)]
    pub cmp_version: u16,
    /// APIs advertised in ping responses, such as `2:tcfeuv2`.
    #[serde(default)]
    pub supported_apis: Vec<String>,
    #[serde(default)]
    pub gvl: GvlConfig,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct GvlConfig {
    pub base_url: String,
    /// Vendor list version to load, the latest one when absent.
    pub version: Option<u32>,
    pub timeout_ms: u64,
}

impl Default for GvlConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GVL_BASE_URL.to_string(),
            version: None,
            timeout_ms: DEFAULT_GVL_TIMEOUT_MS,
        }
    }
}

impl CmpConfig {
    pub fn new(cmp_id: u16, cmp_version: u16) -> Self {
        Self {
            cmp_id,
            cmp_version,
            supported_apis: Vec::new(),
            gvl: GvlConfig::default(),
        }
    }

    /// Parses and validates a JSON config document.
    pub fn from_json(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cmp_id == 0 || self.cmp_id > MAX_CMP_ID {
            return Err(ConfigError::InvalidCmpId(self.cmp_id));
        }
        if self.cmp_version > MAX_CMP_ID {
            return Err(ConfigError::InvalidCmpVersion(self.cmp_version));
        }
        self.gvl.validate()
    }
}

impl GvlConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.url()?;
        if self.timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(())
    }

    /// The base URL, which must be an http or https URL.
    pub fn url(&self) -> Result<Url, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidBaseUrl {
            url: self.base_url.clone(),
            reason,
        };
        let url = Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(invalid(format!("unsupported scheme {scheme}"))),
        }
    }
}
