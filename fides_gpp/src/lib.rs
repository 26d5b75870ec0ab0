//! This crate is an implementation of the IAB Global Privacy Platform (GPP)
//! [Consent String Specification](https://github.com/InteractiveAdvertisingBureau/Global-Privacy-Platform),
//! with the pieces a consent management platform (CMP) needs around it.
//!
//! It can encode and decode the TCF EU v2, TCF CA v1, USP v1 and US state
//! sections of GPP strings, keep the state of a CMP and notify listeners of
//! its changes, and load the IAB Global Vendor List.
//!
//! NOTE: This is not an official IAB library.
//!
//! # Parsing GPP strings
//!
//! A GPP Consent String is made of a mandatory header and a list of optional sections.
//!
//! The [`GPPString`](v1::GPPString) type is used to parse consent strings and decode
//! sections.
//!
//! ```
//! # use std::error::Error;
//! #
//! # fn main() -> Result<(), Box<dyn Error>> {
//! use std::str::FromStr;
//! use fides_gpp::v1::GPPString;
//!
//! let s = "DBACNYA~CPXxRfAPXxRfAAfKABENB-CgAAAAAAAAAAYgAAAAAAAA.ZAAgH9794ulA~1YNN";
//! let gpp_string = GPPString::from_str(s)?;
//!
//! // Individual sections can be then be accessed:
//! for &id in gpp_string.section_ids() {
//!     let section_str = gpp_string.section(id).ok_or("missing section")?;
//!     println!("{section_str}");
//!
//!     let section = gpp_string.decode_section(id)?;
//!     println!("Section: {:?}", section.fields());
//! }
//!
//! // All sections can be decoded at once as well:
//! let sections = gpp_string.decode_all_sections();
//! # Ok(())
//! # }
//! ```
//!
//! # Building GPP strings
//!
//! A [`GppModel`](v1::GppModel) holds the field values of each section by name. Sections are
//! created with their default values the first time one of their fields is set.
//!
//! ```
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use fides_gpp::core::datatype::FieldValue;
//! use fides_gpp::v1::GppModel;
//!
//! let mut model = GppModel::new();
//! model.set_field_value("uspv1", "Notice", FieldValue::from("Y"))?;
//! model.set_field_value("uspv1", "OptOutSale", FieldValue::from("N"))?;
//! model.set_field_value("uspv1", "LspaCovered", FieldValue::from("N"))?;
//!
//! assert_eq!(model.encode()?, "DBABTA~1YNN");
//! # Ok(())
//! # }
//! ```
//!
//! # Accessing section data
//!
//! Depending on the legislation which applies with regard to the data you are handling, you may
//! want to decode and analyze only specific sections.
//!
//! For example, let's assume your users are located in the European Union, where GDPR rules apply.
//! The section that you need to extract and decode would be TCF EU v2.
//!
//! ```
//! # use std::error::Error;
//! #
//! # fn main() -> Result<(), Box<dyn Error>> {
//! use std::str::FromStr;
//! use fides_gpp::sections::SectionId;
//! use fides_gpp::sections::tcfeuv2::{CMP_ID, PUBLISHER_COUNTRY_CODE, VENDOR_CONSENTS};
//! use fides_gpp::v1::GPPString;
//!
//! let s = "DBABMA~CPXxRfAPXxRfAAfKABENB-CgAAAAAAAAAAYgAAAAAAAA.ZAAgH9794ulA";
//! let gpp = GPPString::from_str(s)?;
//! let tcf = gpp.decode_section(SectionId::TcfEuV2)?;
//!
//! assert_eq!(tcf.field(CMP_ID).and_then(|v| v.as_int()), Some(31));
//! assert_eq!(tcf.field(PUBLISHER_COUNTRY_CODE).and_then(|v| v.as_str()), Some("DE"));
//!
//! // does the user consent to vendor Google Advertising Products using their data?
//! let vendor_consent = tcf
//!     .field(VENDOR_CONSENTS)
//!     .and_then(|v| v.as_id_set())
//!     .is_some_and(|vendors| vendors.contains(&755));
//! assert!(!vendor_consent);
//! # Ok(())
//! # }
//! ```
//!
//! # Error handling
//!
//! This crate is conservative with regard to how it handles parsing failure. If a string cannot be
//! fully decoded, then it is considered as an error.
//!
//! This is done to avoid obtaining erroneous user consent information from potentially corrupted
//! payloads.
//!
//! # Logging
//!
//! The crate emits [`tracing`] events and never installs a subscriber itself.
//!
pub mod cmpapi;
pub mod config;
pub mod core;
pub mod gvl;
pub mod sections;
pub mod v1;
