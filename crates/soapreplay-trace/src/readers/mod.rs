//! Trace format readers
//!
//! A [`TraceFormatReader`] is set up once with a byte stream and then yields
//! qualifying request messages one by one until the trace is exhausted.
//! Two formats are built in:
//! - [`MessageLogReader`]: structured message-log records (the default)
//! - [`HttpCaptureReader`]: flat HTTP capture text with embedded envelopes
//!
//! Alternate formats are registered by name in a [`ReaderRegistry`].

use crate::error::TraceError;
use crate::message::ParsedMessage;
use std::io::BufRead;
use std::path::{Path, PathBuf};

mod http_capture;
mod message_log;

pub use http_capture::{CaptureSource, HttpCaptureReader, RESPONSE_SECTIONS};
pub use message_log::{CaptureSide, MessageLogReader, E2E_TRACE_NS, MESSAGE_TRACE_NS};

/// Name of the reader used when no alternate format is configured
pub const DEFAULT_READER: &str = "message-log";

/// Reader for one trace wire format
///
/// `setup` must be called exactly once before the first `read_next`.
pub trait TraceFormatReader {
    /// Attach the trace stream
    ///
    /// `file_name` is only used to qualify error messages.
    fn setup(
        &mut self,
        source: Box<dyn BufRead>,
        file_name: &Path,
        client_side: bool,
        service_side: bool,
    ) -> Result<(), TraceError>;

    /// Next qualifying message, `Ok(None)` at end of trace
    fn read_next(&mut self) -> Result<Option<ParsedMessage>, TraceError>;

    /// Registered format name
    fn name(&self) -> &'static str;
}

impl<T: TraceFormatReader + ?Sized> TraceFormatReader for Box<T> {
    fn setup(
        &mut self,
        source: Box<dyn BufRead>,
        file_name: &Path,
        client_side: bool,
        service_side: bool,
    ) -> Result<(), TraceError> {
        (**self).setup(source, file_name, client_side, service_side)
    }

    fn read_next(&mut self) -> Result<Option<ParsedMessage>, TraceError> {
        (**self).read_next()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Options common to every reader, captured at setup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Trace file name for error messages
    pub file_name: PathBuf,
    /// Yield client-side captures
    pub client_side: bool,
    /// Yield service-side captures
    pub service_side: bool,
}

/// Setup-once state shared by the built-in readers
pub(crate) enum SetupState<S> {
    Pending,
    Ready(S),
}

impl<S> Default for SetupState<S> {
    fn default() -> Self {
        Self::Pending
    }
}

impl<S> SetupState<S> {
    /// Install session state; fails if already installed
    pub(crate) fn install(&mut self, session: S) -> Result<(), TraceError> {
        match self {
            Self::Pending => {
                *self = Self::Ready(session);
                Ok(())
            }
            Self::Ready(_) => Err(TraceError::AlreadySetUp),
        }
    }

    /// Session state; fails before setup
    pub(crate) fn session(&mut self) -> Result<&mut S, TraceError> {
        match self {
            Self::Pending => Err(TraceError::NotSetUp),
            Self::Ready(session) => Ok(session),
        }
    }
}

/// Factory producing a fresh reader
pub type ReaderFactory = fn() -> Box<dyn TraceFormatReader>;

/// Named reader factories
pub struct ReaderRegistry {
    factories: Vec<(&'static str, ReaderFactory)>,
}

impl Default for ReaderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for ReaderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderRegistry")
            .field("readers", &self.names())
            .finish()
    }
}

impl ReaderRegistry {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            factories: Vec::new(),
        }
    }

    /// Create registry with the built-in readers
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(DEFAULT_READER, || -> Box<dyn TraceFormatReader> { Box::new(MessageLogReader::new()) });
        registry.register("http-capture", || -> Box<dyn TraceFormatReader> { Box::new(HttpCaptureReader::new()) });
        registry
    }

    /// Register a factory, replacing any factory of the same name
    pub fn register(&mut self, name: &'static str, factory: ReaderFactory) {
        self.factories.retain(|(n, _)| *n != name);
        self.factories.push((name, factory));
    }

    /// Create reader by name
    #[must_use]
    pub fn create(&self, name: &str) -> Option<Box<dyn TraceFormatReader>> {
        self.factories
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, factory)| factory())
    }

    /// Registered names in registration order
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.factories.iter().map(|(n, _)| *n).collect()
    }

    /// Check if a name is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.iter().any(|(n, _)| *n == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_defaults() {
        let registry = ReaderRegistry::with_defaults();
        assert_eq!(registry.names(), vec!["message-log", "http-capture"]);
        assert_eq!(registry.create("message-log").unwrap().name(), "message-log");
        assert_eq!(registry.create("http-capture").unwrap().name(), "http-capture");
        assert!(registry.create("pcap").is_none());
    }

    #[test]
    fn registry_replaces_same_name() {
        let mut registry = ReaderRegistry::new();
        registry.register("x", || -> Box<dyn TraceFormatReader> { Box::new(MessageLogReader::new()) });
        registry.register("x", || -> Box<dyn TraceFormatReader> { Box::new(HttpCaptureReader::new()) });
        assert_eq!(registry.names().len(), 1);
        assert_eq!(registry.create("x").unwrap().name(), "http-capture");
    }

    #[test]
    fn registry_debug() {
        let debug = format!("{:?}", ReaderRegistry::default());
        assert!(debug.contains("ReaderRegistry"));
        assert!(debug.contains("message-log"));
    }

    #[test]
    fn setup_state_guards() {
        let mut state: SetupState<u8> = SetupState::default();
        assert!(matches!(state.session(), Err(TraceError::NotSetUp)));
        state.install(1).unwrap();
        assert_eq!(*state.session().unwrap(), 1);
        assert!(matches!(state.install(2), Err(TraceError::AlreadySetUp)));
    }
}
