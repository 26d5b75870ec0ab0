//! Events sent to the listeners registered on a [`CmpApi`].
use crate::cmpapi::CmpApi;
use crate::cmpapi::ping::PingData;
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;
use strum_macros::{Display, EnumString};
use tracing::{debug, warn};

#[derive(Clone, Copy, Debug, Display, EnumString, Eq, PartialEq, Serialize)]
#[strum(serialize_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum EventName {
    ListenerRegistered,
    CmpStatus,
    CmpDisplayStatus,
    SignalStatus,
    EventStatus,
    SectionChange,
    Error,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventData {
    Bool(bool),
    String(String),
    None,
}

impl From<bool> for EventData {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<String> for EventData {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for EventData {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub event_name: EventName,
    /// Id of the listener receiving the event.
    pub listener_id: u32,
    pub data: EventData,
    /// State of the CMP when the listener is called.
    pub ping_data: PingData,
}

pub type ListenerResult = Result<(), Box<dyn std::error::Error>>;

pub(crate) type Listener = Rc<dyn Fn(&CmpApi, &Event) -> ListenerResult>;

/// Registered listeners, in registration order.
#[derive(Default)]
pub(crate) struct Listeners {
    next_id: Cell<u32>,
    listeners: RefCell<Vec<(u32, Listener)>>,
}

impl Listeners {
    pub(crate) fn add(&self, listener: Listener) -> u32 {
        let id = self.next_id.get();
        self.next_id.set(id.wrapping_add(1));
        self.listeners.borrow_mut().push((id, listener));
        id
    }

    pub(crate) fn remove(&self, id: u32) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let len = listeners.len();
        listeners.retain(|(i, _)| *i != id);
        listeners.len() != len
    }

    pub(crate) fn get(&self, id: u32) -> Option<Listener> {
        self.listeners
            .borrow()
            .iter()
            .find(|(i, _)| *i == id)
            .map(|(_, l)| Rc::clone(l))
    }

    pub(crate) fn snapshot(&self) -> Vec<(u32, Listener)> {
        self.listeners.borrow().clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.borrow().len()
    }
}

/// Calls each listener in order. Failing and panicking listeners are logged
/// and skipped.
pub(crate) fn notify(api: &CmpApi, listeners: &[(u32, Listener)], name: EventName, data: &EventData) {
    debug!(event = %name, listeners = listeners.len(), "dispatching event");
    for (id, listener) in listeners {
        let event = Event {
            event_name: name,
            listener_id: *id,
            data: data.clone(),
            ping_data: api.ping(),
        };
        match catch_unwind(AssertUnwindSafe(|| listener(api, &event))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(listener_id = id, event = %name, error = %e, "event listener failed"),
            Err(_) => warn!(listener_id = id, event = %name, "event listener panicked"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(EventName::ListenerRegistered => "listenerRegistered")]
    #[test_case(EventName::CmpDisplayStatus => "cmpDisplayStatus")]
    #[test_case(EventName::SectionChange => "sectionChange")]
    #[test_case(EventName::Error => "error")]
    fn event_names(name: EventName) -> String {
        name.to_string()
    }

    #[test]
    fn event_data_serialization() {
        assert_eq!(serde_json::to_value(EventData::from(true)).unwrap(), true);
        assert_eq!(
            serde_json::to_value(EventData::from("ready")).unwrap(),
            "ready"
        );
        assert!(serde_json::to_value(EventData::None).unwrap().is_null());
    }

    fn noop(_: &CmpApi, _: &Event) -> ListenerResult {
        Ok(())
    }

    #[test]
    fn listeners_keep_registration_order() {
        let listeners = Listeners::default();
        let noop: Listener = Rc::new(noop);
        let a = listeners.add(Rc::clone(&noop));
        let b = listeners.add(Rc::clone(&noop));
        let c = listeners.add(noop);
        assert_eq!((a, b, c), (0, 1, 2));

        assert!(listeners.remove(b));
        assert!(!listeners.remove(b));
        let ids = listeners
            .snapshot()
            .iter()
            .map(|(id, _)| *id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![0, 2]);
        assert!(listeners.get(2).is_some());
        assert_eq!(listeners.len(), 2);
    }
}
