//! soapreplay trace reading
//!
//! Turns a captured trace byte stream into a sequence of buffered SOAP
//! request messages.
//!
//! # Core Concepts
//!
//! - [`XmlElement`]: owned element tree the envelope is buffered into
//! - [`MessageVersion`]: envelope + addressing version detected from namespaces
//! - [`BufferedMessage`] / [`ParsedMessage`]: re-readable message plus action and time
//! - [`TraceFormatReader`]: setup-once, read-until-`None` reader contract
//! - [`MessageLogReader`] / [`HttpCaptureReader`]: the two built-in formats
//! - [`MessageFilter`]: include/exclude adapter over any reader
//! - [`ReaderRegistry`]: reader factories by name
//!
//! # Example
//!
//! ```rust,ignore
//! use soapreplay_trace::{ActionFilter, MessageFilter, ReaderRegistry, TraceFormatReader};
//!
//! let reader = ReaderRegistry::with_defaults().create("message-log").unwrap();
//! let mut filtered = MessageFilter::new(reader, ActionFilter::include(["http://tempuri.org/Calc/Add"]));
//! filtered.setup(Box::new(file), Path::new("calls.svclog"), true, false)?;
//! while let Some(message) = filtered.read_next()? {
//!     println!("{}", message.action());
//! }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod envelope;
mod error;
mod filter;
mod message;
mod readers;
mod xml;

// Re-exports
pub use envelope::{
    AddressingVersion, EnvelopeVersion, MessageVersion, SOAP11_NS, SOAP12_NS, WSA10_NS,
    WSA2004_NS,
};
pub use error::{EnvelopeError, TraceError, XmlError};
pub use filter::{ActionFilter, FilterMode, FilterObserver, MessageFilter};
pub use message::{BufferedMessage, ParsedMessage};
pub use readers::{
    CaptureSide, CaptureSource, HttpCaptureReader, MessageLogReader, ReaderFactory,
    ReaderOptions, ReaderRegistry, TraceFormatReader, DEFAULT_READER, E2E_TRACE_NS,
    MESSAGE_TRACE_NS, RESPONSE_SECTIONS,
};
pub use xml::{NamespaceDecl, NamespaceScope, QName, XmlAttribute, XmlElement, XmlNode, XML_NS, XSI_NS};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for common imports
pub mod prelude {
    pub use crate::{
        ActionFilter, BufferedMessage, FilterMode, MessageFilter, ParsedMessage, ReaderRegistry,
        TraceError, TraceFormatReader, XmlElement,
    };
}
