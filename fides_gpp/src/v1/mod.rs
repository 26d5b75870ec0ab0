//! Version 1 of the IAB Global Privacy Platform string.
//!
//! A GPP string contains a header which lists the sections which are present
//! in the next optional parts.
//!
//! A typical GPP string will look like this:
//!
//! ```text
//! DBACNY~CPXxRfAPXxRfAAfKABENB-CgAAAAAAAAAAYgAAAAAAAA~1YNN
//! ```
//!
//! It contains a header (`DBACNY`) and two sections separated by a `~` character.
//!
//! GPP string sections are usually encoded in a variation of URL-safe Base64.
//!
//! It is not mandatory though, and certain sections, such as the deprecated USP v1 are using
//! a simpler character set.
//! In the example above, the first section is a base64 encoded TCF EU v2.2 section.
//! The second section is a USP v1 section where `Y` and `N` characters simply mean yes and no
//! respectively.
//!
//! # Examples
//!
//! Since [`GPPString`] implements the [`FromStr`] trait, you can use [`str::parse`] to try to
//! parse a consent string:
//!
//! ```
//! use fides_gpp::v1::GPPString;
//! use fides_gpp::v1::GPPDecodeError;
//!
//! fn main() -> Result<(), GPPDecodeError> {
//!     let s: GPPString = "DBABTA~1YNN".parse()?;
//!     Ok(())
//! }
//! ```
//!
//! If parsing fails, a [`GPPDecodeError`] is returned instead.
//!
//! Strings are built with [`encode_gpp_string`] from already encoded
//! sections, or through a [`GppModel`] which holds the field values of each
//! section.
use crate::core::{DecodeError, EncodeError};
use crate::sections::{Section, SectionError, SectionId};
use fnv::FnvHashMap;
use header::HeaderError;
use std::collections::BTreeMap;
use std::iter::FusedIterator;
use std::slice::Iter;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

mod header;
mod model;

pub use header::Header;
pub use model::{GppError, GppModel};

use header::{GPP_HEADER, GPP_VERSION};

/// Separates the header and the sections of a GPP string.
pub const SECTION_SEPARATOR: char = '~';
/// Separates the segments of a section.
pub const SEGMENT_SEPARATOR: char = '.';

/// The error type for GPP String decoding operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GPPDecodeError {
    /// The string does not contain the mandatory header section.
    #[error("no header found")]
    NoHeaderFound,
    /// The header has an invalid type for this version of GPP.
    #[error("invalid header type (expected {GPP_HEADER}, found {found})")]
    InvalidHeaderType { found: u64 },
    /// The header has an invalid GPP version.
    ///
    /// Note that there is currently only V1 of the standard.
    #[error("invalid GPP version (expected {GPP_VERSION}, found {found})")]
    InvalidGPPVersion { found: u64 },
    /// The header could not be read, usually because it is truncated.
    #[error("unable to read header: {source}")]
    Read {
        #[from]
        source: DecodeError,
    },
    /// A section with an unknown identifier is listed in the string header.
    #[error("unsupported section id {0}")]
    UnsupportedSectionId(u16),
    /// The number of sections listed in the header does not match the number of actual sections
    /// present in the string.
    #[error("ids do not match sections (number of ids {ids}, number of sections {sections})")]
    IdSectionMismatch { ids: usize, sections: usize },
}

impl GPPDecodeError {
    fn from_header(e: HeaderError) -> Self {
        match e {
            HeaderError::InvalidType(found) => Self::InvalidHeaderType { found },
            HeaderError::InvalidVersion(found) => Self::InvalidGPPVersion { found },
            HeaderError::UnsupportedSectionId(id) => Self::UnsupportedSectionId(id),
            HeaderError::Decode(source) => Self::Read { source },
        }
    }
}

/// Builds a GPP string from encoded sections.
///
/// Sections are emitted in ascending id order after a header listing them.
/// Without any section, the result is the bare header `DBAA`.
pub fn encode_gpp_string(sections: &BTreeMap<SectionId, String>) -> Result<String, EncodeError> {
    let header = Header::new(sections.keys().copied());
    let mut parts = vec![header.encode()?];
    parts.extend(sections.values().cloned());
    let s = parts.join(&SECTION_SEPARATOR.to_string());
    debug!(sections = sections.len(), "encoded gpp string");
    Ok(s)
}

/// The representation of a parsed GPP consent string.
///
/// This structure gives access to the list of section IDs which it contains, as well as the raw
/// section strings.
///
/// It also offers methods to decode either a specific section, or all sections at once.
#[derive(Debug, Clone)]
pub struct GPPString {
    header: Header,
    sections: FnvHashMap<SectionId, String>,
}

impl GPPString {
    /// Parses a string and returns a [`GPPString`] if successful.
    ///
    /// # Errors
    ///
    /// Returns a [`GPPDecodeError`] if unable to parse the string.
    pub fn parse_str(s: &str) -> Result<Self, GPPDecodeError> {
        s.parse()
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Returns a reference to a raw section contained in this GPP string.
    ///
    /// If the given section is not present within the GPP string, the method returns [`None`].
    ///
    /// # Example
    ///
    /// ```
    /// use std::str::FromStr;
    /// use fides_gpp::sections::SectionId;
    /// use fides_gpp::v1::GPPString;
    /// use fides_gpp::v1::GPPDecodeError;
    ///
    /// fn main() -> Result<(), GPPDecodeError> {
    ///     let gpp_str = GPPString::from_str("DBABTA~1YNN")?;
    ///     let s = gpp_str.section(SectionId::UspV1);
    ///
    ///     assert_eq!(s, Some("1YNN"));
    ///
    ///     Ok(())
    /// }
    /// ```
    pub fn section(&self, id: SectionId) -> Option<&str> {
        self.sections.get(&id).map(|s| s.as_str())
    }

    /// Returns an iterator that yields the list of section IDs present in this GPP string.
    pub fn section_ids(&self) -> SectionIds<'_> {
        SectionIds(self.header.section_ids().iter())
    }

    /// Returns an iterator that yields the list of raw section strings present in this GPP string.
    pub fn sections(&self) -> Sections<'_> {
        Sections {
            gpp_str: self,
            idx: 0,
        }
    }

    /// Decodes and returns a single section of this GPP string.
    ///
    /// # Example
    ///
    /// ```
    /// use fides_gpp::sections::SectionId;
    /// use fides_gpp::v1::GPPString;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let gpp_str = GPPString::parse_str("DBABTA~1YNN")?;
    /// let section = gpp_str.decode_section(SectionId::UspV1)?;
    ///
    /// assert_eq!(section.field("OptOutSale").and_then(|v| v.as_str()), Some("N"));
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a [`SectionError`] if decoding the section fails or if the section is not
    /// present in the string.
    pub fn decode_section(&self, id: SectionId) -> Result<Section, SectionError> {
        let s = self.section(id).ok_or(SectionError::MissingSection(id))?;
        Section::decode(id, s)
    }

    /// Decodes and returns all sections present in this GPP string, each entry being either the
    /// decoded section or an error if decoding fails.
    pub fn decode_all_sections(&self) -> Vec<Result<Section, SectionError>> {
        self.section_ids()
            .map(|id| self.decode_section(*id))
            .collect()
    }
}

impl FromStr for GPPString {
    type Err = GPPDecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(SECTION_SEPARATOR);
        let header_str = parts
            .next()
            .filter(|h| !h.is_empty())
            .ok_or(GPPDecodeError::NoHeaderFound)?;
        let header = Header::decode(header_str).map_err(GPPDecodeError::from_header)?;

        let sections = parts.collect::<Vec<_>>();
        let ids = header.section_ids();
        if sections.len() != ids.len() {
            return Err(GPPDecodeError::IdSectionMismatch {
                ids: ids.len(),
                sections: sections.len(),
            });
        }

        let sections = ids
            .iter()
            .zip(sections)
            .map(|(&id, s)| (id, s.to_string()))
            .collect();

        Ok(Self { header, sections })
    }
}

/// Created with the method [`sections`](GPPString::sections).
pub struct Sections<'a> {
    gpp_str: &'a GPPString,
    idx: usize,
}

impl<'a> Iterator for Sections<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let section_id = self.gpp_str.header.section_ids().get(self.idx)?;
        self.idx += 1;
        self.gpp_str.section(*section_id)
    }
}

impl ExactSizeIterator for Sections<'_> {
    fn len(&self) -> usize {
        self.gpp_str.header.section_ids().len() - self.idx
    }
}

impl FusedIterator for Sections<'_> {}

/// Created with the method [`section_ids`](GPPString::section_ids).
pub struct SectionIds<'a>(Iter<'a, SectionId>);

impl<'a> Iterator for SectionIds<'a> {
    type Item = &'a SectionId;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next()
    }
}

impl ExactSizeIterator for SectionIds<'_> {
    fn len(&self) -> usize {
        self.0.len()
    }
}

impl FusedIterator for SectionIds<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::datatype::FieldValue;
    use test_case::test_case;

    const TCF_CA_AND_USP: &str =
        "DBABjw~BPXuQIAPXuQIAAfKABENB-CgAAAAAAAAAAAAAAAA.YAAAAAAAAAA~1YNN";
    const TCF_EU_AND_USP: &str = "DBACNY~CPXxRfAPXxRfAAfKABENB-CgAAAAAAAAAAYgAAAAAAAA~1YNN";

    #[test_case(TCF_CA_AND_USP, SectionId::TcfCaV1 => Some("BPXuQIAPXuQIAAfKABENB-CgAAAAAAAAAAAAAAAA.YAAAAAAAAAA".to_string()) ; "tcf ca")]
    #[test_case(TCF_CA_AND_USP, SectionId::UspV1 => Some("1YNN".to_string()) ; "usp v1")]
    #[test_case(TCF_CA_AND_USP, SectionId::TcfEuV2 => None ; "tcf eu v2")]
    fn gpp_string_section(s: &str, section_id: SectionId) -> Option<String> {
        GPPString::from_str(s)
            .unwrap()
            .section(section_id)
            .map(|s| s.to_string())
    }

    #[test_case("DBABM~CPXxRfAPXxRfAAfKABENB-CgAAAAAAAAAAYgAAAAAAAA" => vec![SectionId::TcfEuV2] ; "single section")]
    #[test_case(TCF_EU_AND_USP => vec![SectionId::TcfEuV2, SectionId::UspV1] ; "tcf eu and us sections")]
    #[test_case(TCF_CA_AND_USP => vec![SectionId::TcfCaV1, SectionId::UspV1] ; "tcf ca and us sections")]
    fn gpp_string_section_ids(s: &str) -> Vec<SectionId> {
        GPPString::from_str(s)
            .unwrap()
            .section_ids()
            .copied()
            .collect()
    }

    #[test_case("DBABM~CPXxRfAPXxRfAAfKABENB-CgAAAAAAAAAAYgAAAAAAAA" => vec!["CPXxRfAPXxRfAAfKABENB-CgAAAAAAAAAAYgAAAAAAAA"] ; "single section")]
    #[test_case(TCF_EU_AND_USP => vec!["CPXxRfAPXxRfAAfKABENB-CgAAAAAAAAAAYgAAAAAAAA", "1YNN"] ; "tcf eu and us sections")]
    fn gpp_string_sections(s: &str) -> Vec<String> {
        GPPString::from_str(s)
            .unwrap()
            .sections()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn gpp_string_decode_all() {
        let sections = GPPString::from_str(TCF_EU_AND_USP)
            .unwrap()
            .decode_all_sections()
            .into_iter()
            .map(|s| s.unwrap().id())
            .collect::<Vec<_>>();
        assert_eq!(sections, vec![SectionId::TcfEuV2, SectionId::UspV1]);
    }

    #[test]
    fn decode_missing_section() {
        let r = GPPString::from_str("DBABTA~1YNN")
            .unwrap()
            .decode_section(SectionId::UsNat);
        assert!(matches!(
            r,
            Err(SectionError::MissingSection(SectionId::UsNat))
        ));
    }

    #[test]
    fn truncated_string() {
        let r = GPPString::from_str(
            "DBACNY~CPytTYAPytTYABEACBENDXCoAP_AAH_AAAIwgoNf_X__b3_v-_7___t0eY1f9_7__-0zjhfdt-8N3f_X_L8X_2M7",
        );
        assert!(matches!(
            r,
            Err(GPPDecodeError::IdSectionMismatch {
                ids: 2,
                sections: 1
            })
        ));
    }

    #[test]
    fn too_many_sections() {
        let r = GPPString::from_str("DBABTA~1YNN~1YNN");
        assert!(matches!(
            r,
            Err(GPPDecodeError::IdSectionMismatch {
                ids: 1,
                sections: 2
            })
        ));
    }

    #[test_case("" => matches GPPDecodeError::NoHeaderFound ; "empty")]
    #[test_case("~1YNN" => matches GPPDecodeError::NoHeaderFound ; "empty header")]
    #[test_case("DB" => matches GPPDecodeError::Read { .. } ; "truncated header")]
    #[test_case("DBABIYA~1YNN" => matches GPPDecodeError::UnsupportedSectionId(23) ; "unknown section id")]
    fn header_error(s: &str) -> GPPDecodeError {
        GPPString::from_str(s).unwrap_err()
    }

    #[test]
    fn non_gpp_tcfeuv2_string() {
        let r = GPPString::from_str("CP48G0AP48G0AEsACCPLAkEgAAAAAEPgAB5YAAAQaQD2F2K2kKFkPCmQWYAQBCijYEAhQAAAAkCBIAAgAUgQAgFIIAgAIFAAAAAAAAAQEgCQAAQABAAAIACgAAAAAAIAAAAAAAQQAAAAAIAAAAAAAAEAAAAAAAQAAAAIAABEhCAAQQAEAAAAAAAQAAAAAAAAAAABAAAAAAAAAAAAAAAAAAAAgAA");
        assert!(matches!(
            r,
            Err(GPPDecodeError::InvalidHeaderType { found: 2 })
        ));
    }

    #[test]
    fn invalid_tcfca_section() {
        let r = GPPString::from_str("DBABjw~CPXxRfAPXxRfAAfKABENB-CgAAAAAAAAAAYgAAAAAAAA~1YNN")
            .unwrap()
            .decode_all_sections();
        assert!(matches!(
            r[0],
            Err(SectionError::Decode {
                source: DecodeError::UnknownVersion(2),
                ..
            })
        ));
        assert!(r[1].is_ok());
    }

    #[test]
    fn tcfca_section_without_publisher_restrictions() {
        let r = GPPString::from_str(TCF_CA_AND_USP)
            .unwrap()
            .decode_section(SectionId::TcfCaV1);
        assert!(matches!(
            r,
            Err(SectionError::Decode {
                source: DecodeError::Substring { .. },
                ..
            })
        ));
    }

    #[test]
    fn invalid_tcfeuv2_section() {
        let r = GPPString::from_str("DBABMA~CQLvHAAQLvHAAAKA4DENBaFsAP_gAEPgAAwIKxtX_G9_bXlr8X736ftkeY1f99h77sQxBhZBk-4FzLvW_JwX32E7NA36tqYKmRIAu3TBIQNlHJDURVCgaogVrTDMaEyUoTtKJ6BkiFMRY2dYCFxvm4tjeQCY5vr991d52R-tbdrs3dzyy4hnv3a9_-S1WJCdA5-tDfv9bROb89IO5_x8v4v4_N7pE2_eT1l_tWvp7D9-ctv_9XX99_fbff9Pn_-uB_-_X__f_H37grAAQYCABAEAQICAAAAAQAAEAAEABAAAAAAACgAABEEAAEDAAAQAIAQAAABAABAAAAIAAAAAgACAAAAAEAgAAAACgADAAAAAAAYAAAMAEgIAAAAAQACmABAIFAAEJAFAEACEAEEAIQAABAEACAEABRwBAACBAoAAAQAAEAAAFgIDgAQEpAgACIgEAAAIAEAggAAEQjYACCAASCqqBAiiCAQLBoQFPaQAkgBACDgmQAgABQAHAAsA.f_gAAAAAAAAA").unwrap()
            .decode_all_sections();
        assert!(matches!(
            r[0],
            Err(SectionError::Decode {
                source: DecodeError::Substring { .. },
                ..
            })
        ));
    }

    #[test]
    fn very_large_string() {
        let s = "DBACMYA~CQMC4oAQMC4oAPoABABGBaEAAP_gAP_gAAqIKxtX_G__bXlv-X736ftkeY1f99h77sQxBhbJs-4FzLvW_JwX32E7NE36tqYKmRIAu3TBIQNtHJjURVChaogVrTDsaEyUoTtKJ-BkiHMRY2dYCFxvm4tjeQCZ5vr_91d52R_t7dr-3dzyy5hnv3a9_-S1WJidK5-tHfv9bROb-_I-9_x-_4v4_N7pE2_eT1t_tWvt739-8tv_9__99__7_f______3_-_f__f____grG1f8b_9teW_5fvfp-2R5jV_32HvuxDEGFsmz7gXMu9b8nBffYTs0Tfq2pgqZEgC7dMEhA20cmNRFUKFqiBWtMOxoTJShO0on4GSIcxFjZ1gIXG-bi2N5AJnm-v_3V3nZH-3t2v7d3PLLmGe_dr3_5LVYmJ0rn60d-_1tE5v78j73_H7_i_j83ukTb95PW3-1a-3vf37y2__3__33__v9_______f_79__9____-AAA.QKxtX_G__bXlv-X736ftkeY1f99h77sQxBhbJs-4FzLvW_JwX32E7NE36tqYKmRIAu3TBIQNtHJjURVChaogVrTDsaEyUoTtKJ-BkiHMRY2dYCFxvm4tjeQCZ5vr_91d52R_t7dr-3dzyy5hnv3a9_-S1WJidK5-tHfv9bROb-_I-9_x-_4v4_N7pE2_eT1t_tWvt739-8tv_9__99__7_f______3_-_f__f____gAA.IKxtX_G__bXlv-X736ftkeY1f99h77sQxBhbJs-4FzLvW_JwX32E7NE36tqYKmRIAu3TBIQNtHJjURVChaogVrTDsaEyUoTtKJ-BkiHMRY2dYCFxvm4tjeQCZ5vr_91d52R_t7dr-3dzyy5hnv3a9_-S1WJidK5-tHfv9bROb-_I-9_x-_4v4_N7pE2_eT1t_tWvt739-8tv_9__99__7_f______3_-_f__f____gAA~BQMC4oAQMC4oAPoABABGB0CYAf8AAf8AAAqdA-AAUABwAFQALQAaABLACgAF0ANoAdwA_QCCAIQARQAnwBWgC3AGUANMAc4A7gCAQElASYAnYBPwDFAGaAM6AZ8A14B_AEngJyAT-Ao8BUQCpQFvALhAXQAvcBf4DBwGYANNAbUA3EBxoDxAHmgPkAgIBCQCNwEpYJgAmCBNUCa4E5gJ-AUmApYBU4FToHwACgAOAAqABaADQAJYAUAAugBtADuAH6AQQBCACKAE-AK0AW4AygBpgDnAHcAQCAkoCTAE7AJ-AYoAzQBnQDPgGvAP4Ak8BOQCfwFHgKiAVKAt4BcIC6AF7gL_AYOAzABpoDagG4gONAeIA80B8gEBAISARuAlLBMAEwQJqgTXAnMBPwCkwFLAKnAAAA.YAAAAAAAAAA";
        let gpp = GPPString::from_str(s).unwrap();
        assert_eq!(
            gpp.section_ids().copied().collect::<Vec<_>>(),
            vec![SectionId::TcfEuV2, SectionId::TcfCaV1]
        );

        let tcfeuv2 = gpp.decode_section(SectionId::TcfEuV2).unwrap();
        assert_eq!(tcfeuv2.field("CmpId"), Some(&FieldValue::from(1000u64)));
        assert_eq!(tcfeuv2.field("PublisherCountryCode"), Some(&FieldValue::from("FR")));

        let tcfcav1 = gpp.decode_section(SectionId::TcfCaV1).unwrap();
        assert_eq!(tcfcav1.field("VendorListVersion"), Some(&FieldValue::from(116u64)));
    }

    #[test]
    fn encode_empty() {
        assert_eq!(encode_gpp_string(&BTreeMap::new()).unwrap(), "DBAA");
    }

    #[test]
    fn encode_orders_sections_by_id() {
        let sections = BTreeMap::from([
            (SectionId::UspV1, "1YNN".to_string()),
            (
                SectionId::TcfEuV2,
                "CPXxRfAPXxRfAAfKABENB-CgAAAAAAAAAAYgAAAAAAAA".to_string(),
            ),
        ]);
        let s = encode_gpp_string(&sections).unwrap();
        assert_eq!(
            s,
            "DBACNYA~CPXxRfAPXxRfAAfKABENB-CgAAAAAAAAAAYgAAAAAAAA~1YNN"
        );
        let parsed = GPPString::from_str(&s).unwrap();
        assert_eq!(parsed.section(SectionId::UspV1), Some("1YNN"));
    }

    macro_rules! assert_implements {
        ($type:ty, [$($trait:path),+]) => {
            {
                $(const _: fn() = || {
                    fn _assert_impl<T: $trait>() {}
                    _assert_impl::<$type>();
                };)+
            }
        };
    }

    #[test]
    fn gpp_string_implements_traits() {
        assert_implements!(GPPString, [Send, Sync]);
    }

    #[test]
    fn section_implements_traits() {
        assert_implements!(Section, [Send, Sync]);
    }
}
