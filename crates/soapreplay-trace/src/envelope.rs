//! Envelope and addressing version detection
//!
//! Versions are recognized by direct comparison of namespace URIs found on
//! the envelope, its header block and the header entries.

use crate::error::EnvelopeError;
use crate::xml::XmlElement;
use std::fmt;

/// SOAP 1.1 envelope namespace
pub const SOAP11_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// SOAP 1.2 envelope namespace
pub const SOAP12_NS: &str = "http://www.w3.org/2003/05/soap-envelope";

/// WS-Addressing 1.0 namespace
pub const WSA10_NS: &str = "http://www.w3.org/2005/08/addressing";

/// WS-Addressing August 2004 namespace
pub const WSA2004_NS: &str = "http://schemas.xmlsoap.org/ws/2004/08/addressing";

/// SOAP envelope version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvelopeVersion {
    /// SOAP 1.1
    Soap11,
    /// SOAP 1.2
    Soap12,
}

impl EnvelopeVersion {
    /// Envelope namespace URI
    #[inline]
    #[must_use]
    pub fn namespace(self) -> &'static str {
        match self {
            Self::Soap11 => SOAP11_NS,
            Self::Soap12 => SOAP12_NS,
        }
    }

    /// Match a namespace URI
    #[must_use]
    pub fn from_namespace(namespace: &str) -> Option<Self> {
        match namespace {
            SOAP11_NS => Some(Self::Soap11),
            SOAP12_NS => Some(Self::Soap12),
            _ => None,
        }
    }
}

/// WS-Addressing version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressingVersion {
    /// No addressing headers
    None,
    /// WS-Addressing August 2004
    August2004,
    /// WS-Addressing 1.0
    WsAddressing10,
}

impl AddressingVersion {
    /// Addressing namespace URI, if any
    #[inline]
    #[must_use]
    pub fn namespace(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::August2004 => Some(WSA2004_NS),
            Self::WsAddressing10 => Some(WSA10_NS),
        }
    }

    /// Match a namespace URI
    #[must_use]
    pub fn from_namespace(namespace: &str) -> Option<Self> {
        match namespace {
            WSA2004_NS => Some(Self::August2004),
            WSA10_NS => Some(Self::WsAddressing10),
            _ => None,
        }
    }
}

/// Combined envelope + addressing version of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageVersion {
    /// Envelope version
    pub envelope: EnvelopeVersion,
    /// Addressing version
    pub addressing: AddressingVersion,
}

impl MessageVersion {
    /// Create message version
    #[inline]
    #[must_use]
    pub fn new(envelope: EnvelopeVersion, addressing: AddressingVersion) -> Self {
        Self {
            envelope,
            addressing,
        }
    }

    /// Detect the version from an `Envelope` element
    ///
    /// The envelope version comes from the root element's namespace. The
    /// addressing version comes from addressing namespaces declared on the
    /// envelope or header block or used by header entries; none at all means
    /// [`AddressingVersion::None`].
    pub fn detect(envelope: &XmlElement) -> Result<Self, EnvelopeError> {
        if envelope.local_name() != "Envelope" {
            return Err(EnvelopeError::NotAnEnvelope(envelope.name().to_string()));
        }
        let namespace = envelope.namespace().unwrap_or_default();
        let envelope_version = EnvelopeVersion::from_namespace(namespace)
            .ok_or_else(|| EnvelopeError::UnsupportedEnvelope(namespace.to_string()))?;

        let mut candidates: Vec<&str> = envelope
            .namespace_decls()
            .iter()
            .map(|d| d.uri.as_str())
            .collect();
        if let Some(header) = envelope.child(Some(namespace), "Header") {
            candidates.extend(header.namespace_decls().iter().map(|d| d.uri.as_str()));
            candidates.extend(header.elements().filter_map(XmlElement::namespace));
        }

        let mut addressing = AddressingVersion::None;
        for candidate in candidates {
            let Some(found) = AddressingVersion::from_namespace(candidate) else {
                continue;
            };
            match addressing {
                AddressingVersion::None => addressing = found,
                current if current == found => {}
                current => {
                    return Err(EnvelopeError::ConflictingAddressing {
                        first: current.namespace().unwrap_or_default().to_string(),
                        second: candidate.to_string(),
                    })
                }
            }
        }

        Ok(Self::new(envelope_version, addressing))
    }
}

impl fmt::Display for MessageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let envelope = match self.envelope {
            EnvelopeVersion::Soap11 => "Soap11",
            EnvelopeVersion::Soap12 => "Soap12",
        };
        let addressing = match self.addressing {
            AddressingVersion::None => "",
            AddressingVersion::August2004 => "WSAddressingAugust2004",
            AddressingVersion::WsAddressing10 => "WSAddressing10",
        };
        write!(f, "{}{}", envelope, addressing)
    }
}
