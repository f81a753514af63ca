//! Error types for trace reading
//!
//! Three layers:
//! - [`XmlError`]: the XML tokenizer or tree builder rejected the input
//! - [`EnvelopeError`]: the XML is well formed but not a usable SOAP envelope
//! - [`TraceError`]: a reader-level failure, always qualified by the trace file name

use std::path::PathBuf;

/// Errors while building an [`XmlElement`](crate::XmlElement) tree
#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    /// Tokenizer error
    #[error("xml syntax error: {0}")]
    Syntax(#[from] quick_xml::Error),

    /// Malformed attribute
    #[error("xml attribute error: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    /// Element or attribute used a prefix with no namespace binding
    #[error("undeclared namespace prefix '{0}'")]
    UnknownPrefix(String),

    /// Input ended inside an element
    #[error("unexpected end of input inside <{0}>")]
    UnexpectedEof(String),

    /// Non-whitespace text found outside any element
    #[error("unexpected text outside of an element: '{0}'")]
    StrayText(String),

    /// End tag with no open element
    #[error("unexpected end tag </{0}>")]
    StrayEndTag(String),

    /// Input contained no element at all
    #[error("no root element found")]
    NoRootElement,
}

/// Errors while interpreting an element as a SOAP envelope
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    /// Root element is not named `Envelope`
    #[error("expected an Envelope element, found <{0}>")]
    NotAnEnvelope(String),

    /// Envelope namespace is neither SOAP 1.1 nor SOAP 1.2
    #[error("unsupported envelope namespace '{0}'")]
    UnsupportedEnvelope(String),

    /// Both addressing namespaces appear in the same envelope
    #[error("unsupported addressing combination: '{first}' and '{second}'")]
    ConflictingAddressing { first: String, second: String },

    /// Envelope has no Body element
    #[error("envelope has no Body element")]
    MissingBody,
}

/// Reader-level failures
///
/// Every variant that stems from the trace content names the file, so the
/// message can be shown to a user as-is.
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    /// `read_next` was called before `setup`
    #[error("trace reader used before setup")]
    NotSetUp,

    /// `setup` was called a second time
    #[error("trace reader was already set up")]
    AlreadySetUp,

    /// The log structure is not what this reader understands
    #[error("invalid message log {file}: {message}")]
    InvalidLog { file: PathBuf, message: String },

    /// XML could not be parsed
    #[error("invalid message log {file}: {source}")]
    Xml {
        file: PathBuf,
        #[source]
        source: XmlError,
    },

    /// A record carried an envelope that cannot be interpreted
    #[error("invalid message in {file}: {source}")]
    Envelope {
        file: PathBuf,
        #[source]
        source: EnvelopeError,
    },

    /// IO error while reading the trace
    #[error("io error reading {file}: {source}")]
    Io {
        file: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TraceError {
    /// Create invalid-log error for file
    pub fn invalid_log(file: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::InvalidLog {
            file: file.into(),
            message: message.into(),
        }
    }

    /// Wrap an XML error for file
    pub fn xml(file: impl Into<PathBuf>, source: XmlError) -> Self {
        Self::Xml {
            file: file.into(),
            source,
        }
    }

    /// Wrap an envelope error for file
    pub fn envelope(file: impl Into<PathBuf>, source: EnvelopeError) -> Self {
        Self::Envelope {
            file: file.into(),
            source,
        }
    }

    /// Wrap an IO error for file
    pub fn io(file: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            file: file.into(),
            source,
        }
    }
}
