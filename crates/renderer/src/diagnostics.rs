//! Diagnostics reporting shared by every stage of the demo.
//!
//! Components never log backend failures directly. They receive a
//! [`Diagnostics`] handle, which keeps recent messages in an inspectable log
//! and forwards them to an injected [`DiagnosticSink`]. The binary wires in
//! [`TracingSink`]; tests usually build [`Diagnostics::capturing`] and assert
//! on [`Diagnostics::entries`].
//!
//! Errors that recur every frame must not grow memory or flood the sink: the
//! log keeps at most [`RETAINED_ENTRIES`] messages, and a run of identical
//! messages is forwarded once followed by a single repeat count.

use std::cell::RefCell;
use std::collections::VecDeque;

use crate::backend::GraphicsBackend;

/// Log target every diagnostic is emitted under.
pub const APP_TAG: &str = "HackDemo";

/// Most recent messages kept in memory; older ones are counted and dropped.
pub const RETAINED_ENTRIES: usize = 256;

/// Fire-and-forget destination for diagnostic text.
pub trait DiagnosticSink {
    fn report(&self, message: &str);
}

/// Forwards diagnostics to `tracing` under the [`APP_TAG`] target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, message: &str) {
        tracing::warn!(target: APP_TAG, "{message}");
    }
}

#[derive(Debug, Default)]
struct Log {
    entries: VecDeque<String>,
    dropped: u64,
    last_forwarded: Option<String>,
    repeats: u64,
}

impl Log {
    fn retain(&mut self, message: String) {
        if self.entries.len() == RETAINED_ENTRIES {
            self.entries.pop_front();
            self.dropped += 1;
        }
        self.entries.push_back(message);
    }

    /// Returns the repeat summary owed for the previous run, if any, and
    /// whether `message` itself should be forwarded.
    fn admit(&mut self, message: &str) -> (Option<String>, bool) {
        if self.last_forwarded.as_deref() == Some(message) {
            self.repeats += 1;
            return (None, false);
        }
        let summary = self.take_summary();
        self.last_forwarded = Some(message.to_string());
        (summary, true)
    }

    fn take_summary(&mut self) -> Option<String> {
        let repeats = std::mem::take(&mut self.repeats);
        match &self.last_forwarded {
            Some(previous) if repeats > 0 => {
                Some(format!("{previous} (repeated {repeats} more times)"))
            }
            _ => None,
        }
    }
}

/// Bounded diagnostics channel.
pub struct Diagnostics {
    log: RefCell<Log>,
    sink: Option<Box<dyn DiagnosticSink>>,
}

impl Diagnostics {
    pub fn new(sink: impl DiagnosticSink + 'static) -> Self {
        Self {
            log: RefCell::new(Log::default()),
            sink: Some(Box::new(sink)),
        }
    }

    /// Keeps messages in memory only.
    pub fn capturing() -> Self {
        Self {
            log: RefCell::new(Log::default()),
            sink: None,
        }
    }

    pub fn report(&self, message: impl Into<String>) {
        let message = message.into();
        let mut log = self.log.borrow_mut();
        if let Some(sink) = &self.sink {
            let (summary, forward) = log.admit(&message);
            if let Some(summary) = summary {
                sink.report(&summary);
            }
            if forward {
                sink.report(&message);
            }
        }
        log.retain(message);
    }

    /// Drains every pending backend error code, reporting each one against
    /// `operation`. Returns how many were found.
    pub fn check_backend<B>(&self, backend: &mut B, operation: &str) -> usize
    where
        B: GraphicsBackend + ?Sized,
    {
        let mut found = 0;
        while let Some(error) = backend.take_error() {
            self.report(format!("{operation}: {error}"));
            found += 1;
        }
        found
    }

    /// Reads (and thereby clears) the backend's last error string.
    pub fn drain_message<B>(&self, backend: &mut B, context: &str) -> bool
    where
        B: GraphicsBackend + ?Sized,
    {
        match backend.take_message() {
            Some(message) if !message.is_empty() => {
                self.report(format!("{context}: {message}"));
                true
            }
            _ => false,
        }
    }

    /// Retained messages, oldest first.
    pub fn entries(&self) -> Vec<String> {
        self.log.borrow().entries.iter().cloned().collect()
    }

    pub fn take_entries(&self) -> Vec<String> {
        std::mem::take(&mut self.log.borrow_mut().entries).into()
    }

    /// Messages evicted from the log since creation.
    pub fn dropped(&self) -> u64 {
        self.log.borrow().dropped
    }

    pub fn len(&self) -> usize {
        self.log.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.borrow().entries.is_empty()
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new(TracingSink)
    }
}

impl Drop for Diagnostics {
    fn drop(&mut self) {
        if let Some(sink) = &self.sink {
            if let Some(summary) = self.log.get_mut().take_summary() {
                sink.report(&summary);
            }
        }
    }
}

impl std::fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let log = self.log.borrow();
        f.debug_struct("Diagnostics")
            .field("entries", &log.entries.len())
            .field("dropped", &log.dropped)
            .field("forwarding", &self.sink.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::backend::BackendError;
    use crate::testing::MockBackend;

    struct SharedSink(Rc<RefCell<Vec<String>>>);

    impl DiagnosticSink for SharedSink {
        fn report(&self, message: &str) {
            self.0.borrow_mut().push(message.to_string());
        }
    }

    #[test]
    fn forwards_and_keeps_messages() {
        let forwarded = Rc::new(RefCell::new(Vec::new()));
        let diagnostics = Diagnostics::new(SharedSink(forwarded.clone()));
        diagnostics.report("first");
        diagnostics.report(String::from("second"));

        assert_eq!(diagnostics.entries(), vec!["first", "second"]);
        assert_eq!(*forwarded.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn check_backend_drains_every_error_code() {
        let diagnostics = Diagnostics::capturing();
        let mut backend = MockBackend::new();
        backend.push_error(BackendError::InvalidValue);
        backend.push_error(BackendError::OutOfMemory);

        assert_eq!(diagnostics.check_backend(&mut backend, "draw"), 2);
        assert_eq!(diagnostics.check_backend(&mut backend, "draw"), 0);
        assert_eq!(
            diagnostics.entries(),
            vec!["draw: invalid value", "draw: out of memory"]
        );
    }

    #[test]
    fn last_error_string_is_cleared_by_reading() {
        let diagnostics = Diagnostics::capturing();
        let mut backend = MockBackend::new();
        backend.set_message("surface lost");

        assert!(diagnostics.drain_message(&mut backend, "present"));
        assert!(!diagnostics.drain_message(&mut backend, "present"));
        assert_eq!(diagnostics.take_entries(), vec!["present: surface lost"]);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn log_keeps_only_the_most_recent_messages() {
        let diagnostics = Diagnostics::capturing();
        for frame in 0..RETAINED_ENTRIES + 10 {
            diagnostics.report(format!("frame {frame}"));
        }

        let entries = diagnostics.entries();
        assert_eq!(entries.len(), RETAINED_ENTRIES);
        assert_eq!(entries[0], "frame 10");
        assert_eq!(diagnostics.dropped(), 10);
    }

    #[test]
    fn repeated_messages_reach_the_sink_once_with_a_count() {
        let forwarded = Rc::new(RefCell::new(Vec::new()));
        let diagnostics = Diagnostics::new(SharedSink(forwarded.clone()));
        for _ in 0..4 {
            diagnostics.report("draw: out of memory");
        }
        diagnostics.report("present: surface lost");
        diagnostics.report("present: surface lost");
        drop(diagnostics);

        assert_eq!(
            *forwarded.borrow(),
            vec![
                "draw: out of memory",
                "draw: out of memory (repeated 3 more times)",
                "present: surface lost",
                "present: surface lost (repeated 1 more times)",
            ]
        );
    }
}
