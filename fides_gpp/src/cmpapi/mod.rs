//! A CMP API: the statuses of a consent management platform, the sections of
//! its GPP string, and the listeners notified when they change.
//!
//! ```
//! use fides_gpp::cmpapi::{CmpApi, EventName, SignalStatus};
//! use fides_gpp::core::datatype::FieldValue;
//!
//! let api = CmpApi::new(31, 1);
//! api.add_event_listener(|api, event| {
//!     if event.event_name == EventName::SignalStatus {
//!         println!("{}", api.gpp_string()?);
//!     }
//!     Ok(())
//! });
//!
//! api.set_field_value("uspv1", "Notice", FieldValue::from("Y")).unwrap();
//! api.set_signal_status(SignalStatus::Ready);
//! ```
use crate::config::CmpConfig;
use crate::core::datatype::FieldValue;
use crate::sections::Section;
use crate::v1::{GppError, GppModel};
use num_traits::ToPrimitive;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;
use tracing::{debug, error};

pub mod event;
pub mod ping;
pub mod status;

pub use event::{Event, EventData, EventName, ListenerResult};
pub use ping::{GPP_VERSION, PingData};
pub use status::{CmpDisplayStatus, CmpStatus, EventStatus, SignalStatus};

use event::{Listener, Listeners, notify};

/// The state owned by a [`CmpApi`].
#[derive(Clone, Debug)]
pub struct CmpApiContext {
    pub cmp_id: u16,
    pub cmp_version: u16,
    pub signal_status: SignalStatus,
    pub cmp_status: CmpStatus,
    pub cmp_display_status: CmpDisplayStatus,
    pub event_status: Option<EventStatus>,
    pub applicable_sections: Vec<i32>,
    pub supported_apis: Vec<String>,
    pub gpp_model: GppModel,
}

impl CmpApiContext {
    fn new(cmp_id: u16, cmp_version: u16) -> Self {
        Self {
            cmp_id,
            cmp_version,
            signal_status: SignalStatus::NotReady,
            cmp_status: CmpStatus::Loading,
            cmp_display_status: CmpDisplayStatus::Hidden,
            event_status: None,
            applicable_sections: vec![-1],
            supported_apis: Vec::new(),
            gpp_model: GppModel::new(),
        }
    }
}

/// The CMP API of a single page.
///
/// Listeners are called synchronously, in registration order, before the
/// method that triggered the event returns. They receive the `CmpApi` itself
/// and may call any of its methods, including ones firing further events.
///
/// Every successful section mutation fires one `sectionChange` event per
/// section it touched, once the model has been updated.
pub struct CmpApi {
    context: RefCell<CmpApiContext>,
    listeners: Listeners,
}

impl CmpApi {
    pub fn new(cmp_id: u16, cmp_version: u16) -> Self {
        Self {
            context: RefCell::new(CmpApiContext::new(cmp_id, cmp_version)),
            listeners: Listeners::default(),
        }
    }

    /// Creates an API from a config. The CMP status starts as
    /// [`CmpStatus::Error`] when the config is invalid.
    pub fn from_config(config: &CmpConfig) -> Self {
        let api = Self::new(config.cmp_id, config.cmp_version);
        {
            let mut context = api.context.borrow_mut();
            context.supported_apis = config.supported_apis.clone();
            if let Err(e) = config.validate() {
                error!(error = %e, "invalid cmp config");
                context.cmp_status = CmpStatus::Error;
            }
        }
        api
    }

    /// A copy of the current state.
    pub fn context(&self) -> CmpApiContext {
        self.context.borrow().clone()
    }

    pub fn cmp_status(&self) -> CmpStatus {
        self.context.borrow().cmp_status
    }

    pub fn set_cmp_status(&self, status: CmpStatus) {
        self.context.borrow_mut().cmp_status = status;
        self.fire_event(EventName::CmpStatus, status.to_string());
    }

    pub fn cmp_display_status(&self) -> CmpDisplayStatus {
        self.context.borrow().cmp_display_status
    }

    pub fn set_cmp_display_status(&self, status: CmpDisplayStatus) {
        self.context.borrow_mut().cmp_display_status = status;
        self.fire_event(EventName::CmpDisplayStatus, status.to_string());
    }

    pub fn signal_status(&self) -> SignalStatus {
        self.context.borrow().signal_status
    }

    pub fn set_signal_status(&self, status: SignalStatus) {
        self.context.borrow_mut().signal_status = status;
        self.fire_event(EventName::SignalStatus, status.to_string());
    }

    pub fn event_status(&self) -> Option<EventStatus> {
        self.context.borrow().event_status
    }

    pub fn set_event_status(&self, status: EventStatus) {
        self.context.borrow_mut().event_status = Some(status);
        self.fire_event(EventName::EventStatus, status.to_string());
    }

    pub fn applicable_sections(&self) -> Vec<i32> {
        self.context.borrow().applicable_sections.clone()
    }

    /// Sets the ids of the sections applying to the current user, `[-1]`
    /// meaning none.
    pub fn set_applicable_sections(&self, sections: Vec<i32>) {
        self.context.borrow_mut().applicable_sections = sections;
    }

    pub fn supported_apis(&self) -> Vec<String> {
        self.context.borrow().supported_apis.clone()
    }

    pub fn set_supported_apis(&self, apis: Vec<String>) {
        self.context.borrow_mut().supported_apis = apis;
    }

    fn report<T>(&self, result: Result<T, GppError>) -> Result<T, GppError> {
        if let Err(e) = &result {
            self.fire_error_event(&e.to_string());
        }
        result
    }

    fn section_names(&self) -> BTreeSet<String> {
        self.context
            .borrow()
            .gpp_model
            .sections()
            .map(|s| s.name().to_string())
            .collect()
    }

    /// Replaces every section with the ones of a GPP string. A
    /// `sectionChange` event is fired for every section present before or
    /// after the call.
    pub fn set_gpp_string(&self, s: &str) -> Result<(), GppError> {
        let mut changed = self.section_names();
        let result = self.context.borrow_mut().gpp_model.decode(s);
        self.report(result)?;
        changed.extend(self.section_names());
        for section in &changed {
            self.fire_section_change(section);
        }
        Ok(())
    }

    pub fn gpp_string(&self) -> Result<String, GppError> {
        let result = self.context.borrow().gpp_model.encode();
        self.report(result)
    }

    pub fn set_section_string(&self, section: &str, s: &str) -> Result<(), GppError> {
        let result = self
            .context
            .borrow_mut()
            .gpp_model
            .set_section_string(section, s);
        self.report(result)?;
        self.fire_section_change(section);
        Ok(())
    }

    pub fn section_string(&self, section: &str) -> Result<Option<String>, GppError> {
        let result = self.context.borrow().gpp_model.section_string(section);
        self.report(result)
    }

    pub fn set_field_value(
        &self,
        section: &str,
        field: &str,
        value: FieldValue,
    ) -> Result<(), GppError> {
        let result = self
            .context
            .borrow_mut()
            .gpp_model
            .set_field_value(section, field, value);
        self.report(result)?;
        self.fire_section_change(section);
        Ok(())
    }

    pub fn field_value(&self, section: &str, field: &str) -> Option<FieldValue> {
        self.context
            .borrow()
            .gpp_model
            .field_value(section, field)
            .cloned()
    }

    pub fn section(&self, section: &str) -> Option<Section> {
        self.context.borrow().gpp_model.section(section).cloned()
    }

    pub fn has_section(&self, section: &str) -> bool {
        self.context.borrow().gpp_model.has_section(section)
    }

    pub fn delete_section(&self, section: &str) -> bool {
        let deleted = self.context.borrow_mut().gpp_model.delete_section(section);
        if deleted {
            self.fire_section_change(section);
        }
        deleted
    }

    /// Removes every section, firing `sectionChange` for each of them.
    pub fn clear(&self) {
        let removed = self.section_names();
        self.context.borrow_mut().gpp_model.clear();
        for section in &removed {
            self.fire_section_change(section);
        }
    }

    /// Sends an event to every listener registered when the call is made.
    pub fn fire_event(&self, name: EventName, data: impl Into<EventData>) {
        let listeners = self.listeners.snapshot();
        notify(self, &listeners, name, &data.into());
    }

    pub fn fire_error_event(&self, message: &str) {
        error!(error = message, "cmp api error");
        self.fire_event(EventName::Error, message);
    }

    pub fn fire_section_change(&self, section: &str) {
        self.fire_event(EventName::SectionChange, section);
    }

    /// Registers a listener and sends it a `listenerRegistered` event.
    ///
    /// Returns the id to pass to [`CmpApi::remove_event_listener`].
    pub fn add_event_listener<F>(&self, listener: F) -> u32
    where
        F: Fn(&CmpApi, &Event) -> ListenerResult + 'static,
    {
        let listener: Listener = Rc::new(listener);
        let id = self.listeners.add(Rc::clone(&listener));
        debug!(listener_id = id, "registered event listener");
        notify(self, &[(id, listener)], EventName::ListenerRegistered, &true.into());
        id
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Unregisters a listener, returning whether it was registered.
    pub fn remove_event_listener(&self, id: u32) -> bool {
        self.listeners.remove(id)
    }

    pub fn has_event_listener(&self, id: u32) -> bool {
        self.listeners.get(id).is_some()
    }

    pub fn ping(&self) -> PingData {
        let context = self.context.borrow();
        let model = &context.gpp_model;
        PingData {
            gpp_version: GPP_VERSION,
            cmp_status: context.cmp_status,
            cmp_display_status: context.cmp_display_status,
            signal_status: context.signal_status,
            supported_apis: context.supported_apis.clone(),
            cmp_id: context.cmp_id,
            section_list: model.section_ids().filter_map(|id| id.to_u16()).collect(),
            applicable_sections: context.applicable_sections.clone(),
            gpp_string: model.encode().ok(),
            parsed_sections: model
                .sections()
                .map(|s| (s.name().to_string(), s.fields().clone()))
                .collect(),
        }
    }
}
