//! Observability for notecore
//!
//! Structured JSON logging of typed lifecycle events.
//!
//! ```ignore
//! use notecore::observability::{log_event_with_fields, Event};
//!
//! log_event_with_fields(Event::FileShaReadFailed, &[("ws_path", "ws:a.md")]);
//! ```

mod events;
mod logger;

pub use events::Event;
pub use logger::{Logger, Severity};

/// Log an event at its default severity
pub fn log_event(event: Event) {
    Logger::log(event.severity(), event.as_str(), &[]);
}

/// Log an event with fields at its default severity
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}
