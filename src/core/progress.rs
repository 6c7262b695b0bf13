//! Progress reporting for multi-step orchestrations.
//!
//! Orchestrators emit one [`ProgressEvent`] per state entry. Sinks are called
//! inline, so they must return promptly; UIs that render slowly should take
//! the channel sink and drain it on their own thread.

use serde::Serialize;
use std::sync::mpsc::Sender;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub operation: &'static str,
    pub state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ProgressEvent {
    pub fn new(operation: &'static str, state: &'static str, message: Option<String>) -> Self {
        Self {
            operation,
            state,
            message,
        }
    }
}

pub trait ProgressSink {
    fn emit(&self, event: ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressEvent),
{
    fn emit(&self, event: ProgressEvent) {
        self(event)
    }
}

/// Never blocks: a dropped receiver just discards events.
impl ProgressSink for Sender<ProgressEvent> {
    fn emit(&self, event: ProgressEvent) {
        let _ = self.send(event);
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn emit(&self, _event: ProgressEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::sync::mpsc;

    #[test]
    fn closures_receive_events() {
        let seen = RefCell::new(Vec::new());
        let sink = |event: ProgressEvent| seen.borrow_mut().push(event.state);
        sink.emit(ProgressEvent::new("deploy", "Preparing", None));
        sink.emit(ProgressEvent::new("deploy", "BackingUp", None));
        assert_eq!(*seen.borrow(), vec!["Preparing", "BackingUp"]);
    }

    #[test]
    fn channel_sink_survives_dropped_receiver() {
        let (tx, rx) = mpsc::channel();
        tx.emit(ProgressEvent::new("rollback", "Clearing", None));
        assert_eq!(rx.recv().unwrap().state, "Clearing");
        drop(rx);
        tx.emit(ProgressEvent::new("rollback", "Extracting", None));
    }
}
