use crate::core::EncodeError;
use crate::core::datatype::FieldValue;
use crate::sections::{Section, SectionError, SectionId, VERSION_FIELD, schema_by_name};
use crate::v1::{GPPDecodeError, GPPString, Header, encode_gpp_string};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GppError {
    #[error(transparent)]
    Decode(#[from] GPPDecodeError),
    #[error(transparent)]
    Section(#[from] SectionError),
    #[error("unable to encode header: {0}")]
    Header(#[from] EncodeError),
    #[error("invalid json: {0}")]
    Json(String),
}

fn section_id(name: &str) -> Result<SectionId, SectionError> {
    schema_by_name(name)
        .map(|s| s.id)
        .ok_or_else(|| SectionError::UnsupportedSection(name.to_string()))
}

/// The field values of every section of a GPP string.
///
/// The encoded string is computed on demand and kept until the next
/// mutation.
#[derive(Clone, Debug, Default)]
pub struct GppModel {
    sections: BTreeMap<SectionId, Section>,
    encoded: OnceLock<String>,
}

impl GppModel {
    pub fn new() -> Self {
        Self::default()
    }

    fn invalidate(&mut self) {
        self.encoded.take();
    }

    /// Sets a field value, creating the section with default values if it
    /// is not present yet.
    ///
    /// The model is left unchanged when the section or the field is unknown,
    /// or when the value does not fit the field.
    pub fn set_field_value(
        &mut self,
        section: &str,
        field: &str,
        value: FieldValue,
    ) -> Result<(), GppError> {
        let id = section_id(section)?;
        match self.sections.entry(id) {
            Entry::Occupied(mut e) => e.get_mut().set_field(field, value)?,
            Entry::Vacant(e) => {
                let mut s = Section::new(id)?;
                s.set_field(field, value)?;
                e.insert(s);
            }
        }
        self.invalidate();
        Ok(())
    }

    pub fn field_value(&self, section: &str, field: &str) -> Option<&FieldValue> {
        self.section(section)?.field(field)
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        let id = section_id(name).ok()?;
        self.sections.get(&id)
    }

    pub fn section_by_id(&self, id: SectionId) -> Option<&Section> {
        self.sections.get(&id)
    }

    pub fn has_section(&self, name: &str) -> bool {
        self.section(name).is_some()
    }

    /// Removes a section, returning whether it was present.
    pub fn delete_section(&mut self, name: &str) -> bool {
        let Ok(id) = section_id(name) else {
            return false;
        };
        let removed = self.sections.remove(&id).is_some();
        if removed {
            self.invalidate();
        }
        removed
    }

    pub fn clear(&mut self) {
        self.sections.clear();
        self.invalidate();
    }

    /// Ids of the sections present, in ascending order.
    pub fn section_ids(&self) -> impl Iterator<Item = SectionId> + '_ {
        self.sections.keys().copied()
    }

    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.values()
    }

    /// Replaces a section with the decoded value of `s`.
    pub fn set_section_string(&mut self, name: &str, s: &str) -> Result<(), GppError> {
        let id = section_id(name)?;
        let section = Section::decode(id, s)?;
        self.sections.insert(id, section);
        self.invalidate();
        Ok(())
    }

    /// The encoded value of a section, `None` if it is not present.
    pub fn section_string(&self, name: &str) -> Result<Option<String>, GppError> {
        let id = section_id(name)?;
        self.sections
            .get(&id)
            .map(Section::encode)
            .transpose()
            .map_err(GppError::from)
    }

    pub fn header(&self) -> Header {
        Header::new(self.section_ids())
    }

    /// Encodes the model as a GPP string.
    pub fn encode(&self) -> Result<String, GppError> {
        if let Some(s) = self.encoded.get() {
            return Ok(s.clone());
        }

        let sections = self
            .sections
            .iter()
            .map(|(&id, s)| Ok((id, s.encode()?)))
            .collect::<Result<BTreeMap<_, _>, SectionError>>()?;
        let s = encode_gpp_string(&sections)?;
        Ok(self.encoded.get_or_init(|| s).clone())
    }

    /// Replaces the content of the model with the sections of a GPP string.
    ///
    /// Every section must decode, otherwise the model is left unchanged.
    pub fn decode(&mut self, s: &str) -> Result<(), GppError> {
        let gpp = GPPString::from_str(s)?;
        let sections = gpp
            .decode_all_sections()
            .into_iter()
            .map(|r| r.map(|s| (s.id(), s)))
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        debug!(sections = sections.len(), "decoded gpp string");
        self.sections = sections;
        self.invalidate();
        Ok(())
    }

    /// All sections as a JSON object keyed by section name.
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        let sections = self
            .sections
            .values()
            .map(|s| Ok((s.name().to_string(), serde_json::to_value(s)?)))
            .collect::<Result<serde_json::Map<_, _>, serde_json::Error>>()?;
        Ok(sections.into())
    }

    /// Builds a model from a JSON object keyed by section name, in the
    /// format of [`GppModel::to_json`]. Missing fields keep their default
    /// value.
    pub fn from_json(json: &serde_json::Value) -> Result<Self, GppError> {
        let sections = json
            .as_object()
            .ok_or_else(|| GppError::Json("expected an object of sections".to_string()))?;

        let mut model = Self::new();
        for (name, fields) in sections {
            let fields = fields
                .as_object()
                .ok_or_else(|| GppError::Json(format!("expected an object of fields for {name}")))?;
            let mut section = Section::from_name(name)?;
            // the version selects the layout of the other fields
            let version = fields.get(VERSION_FIELD).map(|v| (VERSION_FIELD, v));
            let others = fields
                .iter()
                .filter(|(f, _)| f.as_str() != VERSION_FIELD)
                .map(|(f, v)| (f.as_str(), v));
            for (field, value) in version.into_iter().chain(others) {
                section.set_field_json(field, value)?;
            }
            model.sections.insert(section.id(), section);
        }
        Ok(model)
    }
}

impl FromStr for GppModel {
    type Err = GppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut model = Self::new();
        model.decode(s)?;
        Ok(model)
    }
}
