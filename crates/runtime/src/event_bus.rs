/// Structured notification channel between the engine and its host view.
///
/// The contract is "one event per logical change": consumers that drain the
/// bus after an operation see each visible-layer change or warning exactly
/// once, regardless of how many internal fields the operation touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: &'static str,
    pub message: String,
}

/// Event kinds used across the engine.
pub const LAYER_CHANGED: &str = "layer-changed";
pub const WARNING: &str = "warning";
pub const ERROR: &str = "error";

#[derive(Debug, Default)]
pub struct EventBus {
    events: Vec<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn emit(&mut self, kind: &'static str, message: impl Into<String>) {
        self.events.push(Event {
            kind,
            message: message.into(),
        });
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn count_of(&self, kind: &'static str) -> usize {
        self.events.iter().filter(|e| e.kind == kind).count()
    }

    pub fn drain(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }
}
