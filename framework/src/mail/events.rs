//! Delivery events and the collaborators that receive them.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;

/// Delivery record kept by the caller. Only the success flag is touched here.
pub trait DeliveryLog: fmt::Debug + Send + Sync {
    fn set_success(&self, success: bool);
}

/// In-memory [`DeliveryLog`] for development and testing.
#[derive(Debug, Default)]
pub struct MemoryLog {
    success: Mutex<Option<bool>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` until the transport has written to it.
    pub fn success(&self) -> Option<bool> {
        *lock(&self.success)
    }
}

impl DeliveryLog for MemoryLog {
    fn set_success(&self, success: bool) {
        *lock(&self.success) = Some(success);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Sent,
    Failed,
}

impl EventKind {
    pub fn base_name(&self) -> &'static str {
        match self {
            EventKind::Sent => "sendthis:sent",
            EventKind::Failed => "sendthis:failed",
        }
    }
}

/// One fired event. `results` and `data` both carry the decoded response.
#[derive(Debug, Clone)]
pub struct MailEvent {
    pub name: String,
    pub kind: EventKind,
    pub subject: String,
    pub message_id: String,
    pub email: String,
    pub results: Value,
    pub data: Value,
    pub log: Option<Arc<dyn DeliveryLog>>,
}

pub trait EventBus: Send + Sync {
    fn fire(&self, event: MailEvent);
}

/// Resolves the name an event is fired under.
pub trait EventNaming: Send + Sync {
    fn named(&self, event: &str, subject: &str) -> String;
}

/// Fires events under their base names.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainNaming;

impl EventNaming for PlainNaming {
    fn named(&self, event: &str, _subject: &str) -> String {
        event.to_string()
    }
}

/// Host application display name, used to build the client identifier.
pub trait ApplicationName: Send + Sync {
    fn application_name(&self) -> String;
}

impl ApplicationName for String {
    fn application_name(&self) -> String {
        self.clone()
    }
}

impl ApplicationName for &'static str {
    fn application_name(&self) -> String {
        self.to_string()
    }
}

/// Records every event in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryEvents {
    events: Arc<Mutex<Vec<MailEvent>>>,
}

impl MemoryEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MailEvent> {
        lock(&self.events).clone()
    }

    pub fn of_kind(&self, kind: EventKind) -> Vec<MailEvent> {
        lock(&self.events)
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }
}

impl EventBus for MemoryEvents {
    fn fire(&self, event: MailEvent) {
        lock(&self.events).push(event);
    }
}

/// Writes each event to the `tracing` subscriber and drops it.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEvents;

impl EventBus for TracingEvents {
    fn fire(&self, event: MailEvent) {
        match event.kind {
            EventKind::Sent => tracing::info!(
                event = %event.name,
                message_id = %event.message_id,
                email = %event.email,
                "mail sent"
            ),
            EventKind::Failed => tracing::warn!(
                event = %event.name,
                message_id = %event.message_id,
                email = %event.email,
                results = %event.results,
                "mail failed"
            ),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(kind: EventKind) -> MailEvent {
        MailEvent {
            name: kind.base_name().to_string(),
            kind,
            subject: "Mandrill".into(),
            message_id: "abc".into(),
            email: "a@b.com".into(),
            results: json!([]),
            data: json!([]),
            log: None,
        }
    }

    #[test]
    fn memory_events_filters_by_kind() {
        let bus = MemoryEvents::new();
        bus.fire(event(EventKind::Sent));
        bus.fire(event(EventKind::Failed));
        bus.fire(event(EventKind::Sent));

        assert_eq!(bus.events().len(), 3);
        assert_eq!(bus.of_kind(EventKind::Sent).len(), 2);
        assert_eq!(bus.of_kind(EventKind::Failed).len(), 1);
    }

    #[test]
    fn memory_log_starts_unset() {
        let log = MemoryLog::new();
        assert_eq!(log.success(), None);

        log.set_success(false);
        assert_eq!(log.success(), Some(false));
    }

    #[test]
    fn plain_naming_keeps_base_name() {
        assert_eq!(
            PlainNaming.named(EventKind::Failed.base_name(), "Mandrill"),
            "sendthis:failed"
        );
    }
}
