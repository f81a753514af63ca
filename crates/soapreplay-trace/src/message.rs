//! Buffered messages
//!
//! A [`BufferedMessage`] holds the whole envelope in memory so that the body
//! can be read as many times as the deserializer needs. [`ParsedMessage`]
//! adds what the trace reader learned about the record (action, time).

use crate::envelope::{MessageVersion, WSA10_NS, WSA2004_NS};
use crate::error::EnvelopeError;
use crate::xml::{NamespaceScope, XmlElement};
use chrono::{DateTime, Utc};

/// Re-readable SOAP message
#[derive(Debug, Clone, PartialEq)]
pub struct BufferedMessage {
    version: MessageVersion,
    envelope: XmlElement,
    action: String,
}

impl BufferedMessage {
    /// Buffer an `Envelope` element
    ///
    /// The built-in action is read from the `Action` header of the detected
    /// addressing version; it is empty when that header is absent.
    pub fn from_envelope(envelope: XmlElement) -> Result<Self, EnvelopeError> {
        let version = MessageVersion::detect(&envelope)?;
        if envelope
            .child(Some(version.envelope.namespace()), "Body")
            .is_none()
        {
            return Err(EnvelopeError::MissingBody);
        }
        let action = version
            .addressing
            .namespace()
            .and_then(|ns| {
                envelope
                    .child(Some(version.envelope.namespace()), "Header")
                    .and_then(|h| h.child(Some(ns), "Action"))
            })
            .map(|a| a.text().trim().to_string())
            .unwrap_or_default();

        Ok(Self {
            version,
            envelope,
            action,
        })
    }

    /// Parse and buffer envelope text
    pub fn parse_str(xml: &str) -> Result<Self, crate::error::TraceError> {
        let envelope = XmlElement::parse_str(xml)
            .map_err(|e| crate::error::TraceError::xml("<inline>", e))?;
        Self::from_envelope(envelope).map_err(|e| crate::error::TraceError::envelope("<inline>", e))
    }

    /// Message version
    #[inline]
    #[must_use]
    pub fn version(&self) -> MessageVersion {
        self.version
    }

    /// Full envelope
    #[inline]
    #[must_use]
    pub fn envelope(&self) -> &XmlElement {
        &self.envelope
    }

    /// Action identifier (may be empty until [`resolve_action`](Self::resolve_action))
    #[inline]
    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Overwrite the action identifier
    pub fn set_action(&mut self, action: impl Into<String>) {
        self.action = action.into();
    }

    /// Fill in an empty action from the headers
    ///
    /// Scans the header entries for an `Action` element under either
    /// addressing namespace and writes the value back onto the message, so
    /// later readers see a populated action.
    pub fn resolve_action(&mut self) -> &str {
        if self.action.is_empty() {
            let found = self
                .headers()
                .find(|h| {
                    h.local_name() == "Action"
                        && matches!(h.namespace(), Some(WSA10_NS) | Some(WSA2004_NS))
                })
                .map(|h| h.text().trim().to_string());
            if let Some(action) = found {
                self.action = action;
            }
        }
        &self.action
    }

    /// Header entries
    pub fn headers(&self) -> impl Iterator<Item = &XmlElement> {
        self.envelope
            .child(Some(self.version.envelope.namespace()), "Header")
            .into_iter()
            .flat_map(|h| h.elements())
    }

    /// Header entry by name
    #[must_use]
    pub fn header(&self, namespace: Option<&str>, local: &str) -> Option<&XmlElement> {
        self.headers().find(|h| h.is(namespace, local))
    }

    /// The `Body` element
    #[must_use]
    pub fn body(&self) -> &XmlElement {
        // Presence is checked in `from_envelope`.
        self.envelope
            .child(Some(self.version.envelope.namespace()), "Body")
            .unwrap_or(&self.envelope)
    }

    /// Elements inside the body
    pub fn body_contents(&self) -> impl Iterator<Item = &XmlElement> {
        self.body().elements()
    }

    /// First element inside the body
    #[must_use]
    pub fn first_body_element(&self) -> Option<&XmlElement> {
        self.body().first_element()
    }

    /// Whether the body has no element content
    #[must_use]
    pub fn is_body_empty(&self) -> bool {
        !self.body().has_elements()
    }

    /// Namespace bindings in scope for the body's children
    #[must_use]
    pub fn body_scope(&self) -> NamespaceScope {
        let mut scope = NamespaceScope::new();
        scope.enter(&self.envelope);
        scope.enter(self.body());
        scope
    }

    /// Namespace bindings in scope for the header entries
    #[must_use]
    pub fn header_scope(&self) -> NamespaceScope {
        let mut scope = NamespaceScope::new();
        scope.enter(&self.envelope);
        if let Some(header) = self
            .envelope
            .child(Some(self.version.envelope.namespace()), "Header")
        {
            scope.enter(header);
        }
        scope
    }
}

/// One qualifying message from a trace
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedMessage {
    message: BufferedMessage,
    timestamp: Option<DateTime<Utc>>,
}

impl ParsedMessage {
    /// Create parsed message
    #[inline]
    #[must_use]
    pub fn new(message: BufferedMessage, timestamp: Option<DateTime<Utc>>) -> Self {
        Self { message, timestamp }
    }

    /// Buffered message
    #[inline]
    #[must_use]
    pub fn message(&self) -> &BufferedMessage {
        &self.message
    }

    /// Action identifier
    #[inline]
    #[must_use]
    pub fn action(&self) -> &str {
        self.message.action()
    }

    /// Capture time, when the trace records one
    #[inline]
    #[must_use]
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    /// Unwrap into the buffered message
    #[inline]
    #[must_use]
    pub fn into_message(self) -> BufferedMessage {
        self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{AddressingVersion, EnvelopeVersion, SOAP11_NS, SOAP12_NS};

    fn soap12_with_action(action_ns: &str) -> String {
        format!(
            r#"<s:Envelope xmlns:s="{SOAP12_NS}"><s:Header><Action xmlns="{action_ns}">urn:Calc/Add</Action></s:Header><s:Body><Add xmlns="urn:calc"><a>2</a></Add></s:Body></s:Envelope>"#
        )
    }

    #[test]
    fn reads_builtin_action() {
        let message = BufferedMessage::parse_str(&soap12_with_action(WSA10_NS)).unwrap();
        assert_eq!(message.version().envelope, EnvelopeVersion::Soap12);
        assert_eq!(message.version().addressing, AddressingVersion::WsAddressing10);
        assert_eq!(message.action(), "urn:Calc/Add");
        assert_eq!(message.first_body_element().unwrap().local_name(), "Add");
    }

    #[test]
    fn resolve_action_writes_back() {
        let mut message = BufferedMessage::parse_str(&soap12_with_action(WSA10_NS)).unwrap();
        message.set_action("");
        assert_eq!(message.resolve_action(), "urn:Calc/Add");
        assert_eq!(message.action(), "urn:Calc/Add");
    }

    #[test]
    fn body_is_rereadable() {
        let message = BufferedMessage::parse_str(&soap12_with_action(WSA2004_NS)).unwrap();
        let first: Vec<_> = message.body_contents().map(|e| e.local_name().to_string()).collect();
        let second: Vec<_> = message.body_contents().map(|e| e.local_name().to_string()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn missing_body_is_rejected() {
        let xml = format!(r#"<s:Envelope xmlns:s="{SOAP11_NS}"><s:Header/></s:Envelope>"#);
        let envelope = XmlElement::parse_str(&xml).unwrap();
        assert!(matches!(
            BufferedMessage::from_envelope(envelope),
            Err(EnvelopeError::MissingBody)
        ));
    }

    #[test]
    fn soap11_without_addressing_has_empty_action() {
        let xml = format!(r#"<s:Envelope xmlns:s="{SOAP11_NS}"><s:Body/></s:Envelope>"#);
        let message = BufferedMessage::parse_str(&xml).unwrap();
        assert_eq!(message.action(), "");
        assert!(message.is_body_empty());
    }
}
