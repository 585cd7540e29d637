use crate::frame::Frame;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EventKind {
    Info,
    Warning,
    Error,
}

/// A user-visible message, stamped with the frame it was raised in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub frame_index: u64,
    pub kind: EventKind,
    pub message: String,
}

/// Ordered queue of user-visible notices.
///
/// The shell raises notices here instead of propagating service failures;
/// the presentation layer drains them.
#[derive(Debug, Default)]
pub struct EventBus {
    events: Vec<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn emit(&mut self, frame: Frame, kind: EventKind, message: impl Into<String>) {
        self.events.push(Event {
            frame_index: frame.index,
            kind,
            message: message.into(),
        });
    }

    pub fn info(&mut self, frame: Frame, message: impl Into<String>) {
        self.emit(frame, EventKind::Info, message);
    }

    pub fn warn(&mut self, frame: Frame, message: impl Into<String>) {
        self.emit(frame, EventKind::Warning, message);
    }

    pub fn error(&mut self, frame: Frame, message: impl Into<String>) {
        self.emit(frame, EventKind::Error, message);
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn last(&self) -> Option<&Event> {
        self.events.last()
    }

    pub fn drain(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::{EventBus, EventKind};
    use crate::frame::Frame;

    #[test]
    fn records_events_with_frame_index() {
        let mut bus = EventBus::new();
        bus.error(Frame::new(2, 0.1), "service unavailable");
        assert_eq!(bus.events().len(), 1);
        assert_eq!(bus.events()[0].frame_index, 2);
        assert_eq!(bus.last().map(|e| e.kind), Some(EventKind::Error));
    }

    #[test]
    fn drain_clears_events_in_order() {
        let mut bus = EventBus::new();
        bus.info(Frame::new(0, 1.0), "a");
        bus.warn(Frame::new(1, 1.0), "b");
        let drained = bus.drain();
        let messages: Vec<&str> = drained.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["a", "b"]);
        assert!(bus.events().is_empty());
    }
}
