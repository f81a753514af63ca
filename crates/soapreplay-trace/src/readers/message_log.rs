//! Structured message-log reader
//!
//! The log is a stream of `MessageLogTraceRecord` elements, either bare or
//! wrapped in `E2ETraceEvent` records. Each record carries a `Source`
//! attribute telling which side captured it and a `Type` attribute naming the
//! message class; the record's child is the captured envelope.

use super::{ReaderOptions, SetupState, TraceFormatReader};
use crate::error::TraceError;
use crate::message::{BufferedMessage, ParsedMessage};
use crate::xml::XmlElement;
use chrono::{DateTime, Utc};
use quick_xml::NsReader;
use std::io::BufRead;
use std::path::Path;

/// Namespace of `MessageLogTraceRecord`
pub const MESSAGE_TRACE_NS: &str =
    "http://schemas.microsoft.com/2004/06/ServiceModel/Management/MessageTrace";

/// Namespace of the `E2ETraceEvent` wrapper
pub const E2E_TRACE_NS: &str = "http://schemas.microsoft.com/2004/06/E2ETraceEvent";

const RECORD: &str = "MessageLogTraceRecord";
const NULL_MESSAGE_SUFFIX: &str = "NullMessage";

/// Which end of the exchange captured a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureSide {
    /// Request as sent by the client
    Client,
    /// Request as received by the service
    Service,
}

impl CaptureSide {
    /// Classify a record's `Source` attribute; `None` for non-request records
    #[must_use]
    pub fn from_source(source: &str) -> Option<Self> {
        match source {
            "ServiceLevelSendRequest" => Some(Self::Client),
            "ServiceLevelReceiveRequest" => Some(Self::Service),
            _ => None,
        }
    }
}

struct Session {
    reader: NsReader<Box<dyn BufRead>>,
    buf: Vec<u8>,
    options: ReaderOptions,
}

/// Reader for structured message logs
#[derive(Default)]
pub struct MessageLogReader {
    state: SetupState<Session>,
}

impl std::fmt::Debug for MessageLogReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ready = matches!(self.state, SetupState::Ready(_));
        f.debug_struct("MessageLogReader")
            .field("ready", &ready)
            .finish()
    }
}

impl MessageLogReader {
    /// Create reader
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TraceFormatReader for MessageLogReader {
    fn setup(
        &mut self,
        source: Box<dyn BufRead>,
        file_name: &Path,
        client_side: bool,
        service_side: bool,
    ) -> Result<(), TraceError> {
        self.state.install(Session {
            reader: NsReader::from_reader(source),
            buf: Vec::new(),
            options: ReaderOptions {
                file_name: file_name.to_path_buf(),
                client_side,
                service_side,
            },
        })
    }

    fn read_next(&mut self) -> Result<Option<ParsedMessage>, TraceError> {
        let session = self.state.session()?;
        let file = session.options.file_name.clone();
        loop {
            let element = XmlElement::read_next(&mut session.reader, &mut session.buf)
                .map_err(|e| TraceError::xml(&file, e))?;
            let Some(element) = element else {
                return Ok(None);
            };

            let (record, system_time) = unwrap_record(element)
                .ok_or_else(|| TraceError::invalid_log(&file, "expected a message log record"))?;

            let Some(side) = record.attribute("Source").and_then(CaptureSide::from_source) else {
                tracing::trace!(source = ?record.attribute("Source"), "skipping non-request record");
                continue;
            };
            let wanted = match side {
                CaptureSide::Client => session.options.client_side,
                CaptureSide::Service => session.options.service_side,
            };
            if !wanted {
                tracing::trace!(?side, "skipping record from unrequested side");
                continue;
            }
            if record
                .attribute("Type")
                .is_some_and(|t| t.ends_with(NULL_MESSAGE_SUFFIX))
            {
                tracing::trace!("skipping null message record");
                continue;
            }

            let timestamp = record
                .attribute("Time")
                .map(str::to_string)
                .or(system_time)
                .and_then(|t| parse_timestamp(&t));

            let envelope = record
                .into_first_element()
                .ok_or_else(|| TraceError::invalid_log(&file, "record has no message"))?;
            let mut message =
                BufferedMessage::from_envelope(envelope).map_err(|e| TraceError::envelope(&file, e))?;
            message.resolve_action();

            tracing::debug!(action = message.action(), ?side, "read message record");
            return Ok(Some(ParsedMessage::new(message, timestamp)));
        }
    }

    fn name(&self) -> &'static str {
        super::DEFAULT_READER
    }
}

/// Locate the record inside an optional `E2ETraceEvent` wrapper
///
/// Returns the record and, for wrapped records, the wrapper's `SystemTime`.
fn unwrap_record(element: XmlElement) -> Option<(XmlElement, Option<String>)> {
    if element.is(Some(MESSAGE_TRACE_NS), RECORD) {
        return Some((element, None));
    }
    if !element.is(Some(E2E_TRACE_NS), "E2ETraceEvent") {
        return None;
    }
    let system_time = element
        .child(Some(E2E_TRACE_NS), "System")
        .and_then(|s| s.child(Some(E2E_TRACE_NS), "TimeCreated"))
        .and_then(|t| t.attribute("SystemTime"))
        .map(str::to_string);
    element
        .into_descendant(Some(MESSAGE_TRACE_NS), RECORD)
        .map(|record| (record, system_time))
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|t| t.with_timezone(&Utc))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{SOAP12_NS, WSA10_NS};
    use std::io::Cursor;

    fn record(source: &str, kind: &str, action: &str) -> String {
        format!(
            r#"<MessageLogTraceRecord Time="2024-03-01T10:00:00.1234567+00:00" Source="{source}" Type="{kind}" xmlns="{MESSAGE_TRACE_NS}"><s:Envelope xmlns:s="{SOAP12_NS}" xmlns:a="{WSA10_NS}"><s:Header><a:Action>{action}</a:Action></s:Header><s:Body><Add xmlns="http://tempuri.org/"><a>1</a></Add></s:Body></s:Envelope></MessageLogTraceRecord>"#
        )
    }

    fn reader_over(text: String, client: bool, service: bool) -> MessageLogReader {
        let mut reader = MessageLogReader::new();
        reader
            .setup(Box::new(Cursor::new(text.into_bytes())), Path::new("t.svclog"), client, service)
            .unwrap();
        reader
    }

    #[test]
    fn reads_client_records() {
        let text = record("ServiceLevelSendRequest", "OperationFormatterMessage", "urn:A");
        let mut reader = reader_over(text, true, false);
        let msg = reader.read_next().unwrap().unwrap();
        assert_eq!(msg.action(), "urn:A");
        assert!(msg.timestamp().is_some());
        assert!(reader.read_next().unwrap().is_none());
    }

    #[test]
    fn skips_unrequested_side_and_null_messages() {
        let text = [
            record("ServiceLevelReceiveRequest", "X", "urn:service"),
            record("ServiceLevelSendRequest", "System.ServiceModel.Channels.NullMessage", "urn:null"),
            record("TransportSend", "X", "urn:transport"),
            record("ServiceLevelSendRequest", "X", "urn:client"),
        ]
        .concat();
        let mut reader = reader_over(text, true, false);
        assert_eq!(reader.read_next().unwrap().unwrap().action(), "urn:client");
        assert!(reader.read_next().unwrap().is_none());
    }

    #[test]
    fn wrong_record_element_is_invalid_log() {
        let mut reader = reader_over("<Other/>".to_string(), true, true);
        let err = reader.read_next().unwrap_err();
        assert!(matches!(err, TraceError::InvalidLog { .. }));
        assert!(err.to_string().contains("t.svclog"));
    }

    #[test]
    fn read_before_setup_fails() {
        let mut reader = MessageLogReader::new();
        assert!(matches!(reader.read_next(), Err(TraceError::NotSetUp)));
    }

    #[test]
    fn double_setup_fails() {
        let mut reader = reader_over(String::new(), true, true);
        let again = reader.setup(Box::new(Cursor::new(Vec::new())), Path::new("t"), true, true);
        assert!(matches!(again, Err(TraceError::AlreadySetUp)));
    }

    #[test]
    fn unwraps_e2e_events() {
        let text = format!(
            r#"<E2ETraceEvent xmlns="{E2E_TRACE_NS}"><System><TimeCreated SystemTime="2024-03-01T10:00:00Z"/></System><ApplicationData><TraceData><DataItem>{}</DataItem></TraceData></ApplicationData></E2ETraceEvent>"#,
            record("ServiceLevelReceiveRequest", "X", "urn:wrapped")
        );
        let mut reader = reader_over(text, false, true);
        assert_eq!(reader.read_next().unwrap().unwrap().action(), "urn:wrapped");
    }

    #[test]
    fn capture_side_classification() {
        assert_eq!(CaptureSide::from_source("ServiceLevelSendRequest"), Some(CaptureSide::Client));
        assert_eq!(CaptureSide::from_source("ServiceLevelReceiveRequest"), Some(CaptureSide::Service));
        assert_eq!(CaptureSide::from_source("TransportReceive"), None);
    }
}
