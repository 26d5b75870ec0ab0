use assert_json_diff::assert_json_include;
use fides_gpp::sections::SectionError;
use fides_gpp::v1::GPPString;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs::File;
use std::io;
use std::io::ErrorKind;
use std::path::Path;
use std::str::FromStr;

/// A GPP string with the fields expected in each of its sections.
///
/// Only the listed fields are checked, but every decoded section must be
/// listed.
#[derive(Deserialize)]
pub struct TestCase {
    gpp_string: String,
    expected_sections: Map<String, Value>,
}

impl TestCase {
    pub fn load_from_file<P: AsRef<Path>>(p: P) -> io::Result<Self> {
        let f = File::open(p)?;
        let tc: Self = serde_json::from_reader(&f)
            .map_err(|e| io::Error::new(ErrorKind::InvalidData, e.to_string()))?;
        Ok(tc)
    }

    pub fn assert_json_matches(&self) {
        let s = GPPString::from_str(&self.gpp_string).expect("invalid GPP string");

        let sections = s
            .decode_all_sections()
            .into_iter()
            .collect::<Result<Vec<_>, SectionError>>()
            .unwrap_or_else(|e| panic!("sections decode error: {e}"));

        let actual = sections
            .iter()
            .map(|s| (s.name().to_string(), serde_json::to_value(s).unwrap()))
            .collect::<Map<_, _>>();

        assert_eq!(
            actual.keys().collect::<Vec<_>>(),
            self.expected_sections.keys().collect::<Vec<_>>()
        );
        assert_json_include!(
            actual: Value::Object(actual),
            expected: Value::Object(self.expected_sections.clone())
        );
    }
}
