//! HTTP capture reader
//!
//! Reads a flat text capture of HTTP traffic where each request announces
//! its action in a `SOAPAction` header line, followed by the remaining
//! headers, a blank line and the request envelope. The paired response
//! (headers and body) follows and is discarded.
//!
//! The XML tokenizer pulls from the same stream as the line scanner. While
//! an envelope is being parsed the stream only hands out one byte at a time,
//! so the tokenizer never buffers text past the end of the envelope.

use super::{ReaderOptions, SetupState, TraceFormatReader};
use crate::error::TraceError;
use crate::message::{BufferedMessage, ParsedMessage};
use crate::xml::XmlElement;
use once_cell::sync::Lazy;
use quick_xml::NsReader;
use regex::Regex;
use std::io::{self, BufRead, Read};
use std::path::Path;

/// Blank-line delimited sections discarded after each request
/// (response headers, response body)
pub const RESPONSE_SECTIONS: usize = 2;

static ANNOUNCEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)^\s*SOAPAction\s*:\s*"?([^"\r\n]*)"?\s*$"#)
        .expect("announcement pattern is valid")
});

/// Buffered text source with a single-byte mode for XML parsing
#[derive(Debug)]
pub struct CaptureSource<R> {
    inner: R,
    xml_mode: bool,
}

impl<R: BufRead> CaptureSource<R> {
    /// Wrap a buffered reader
    #[inline]
    #[must_use]
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            xml_mode: false,
        }
    }

    /// Limit every read to a single byte while `on`
    #[inline]
    pub fn set_xml_mode(&mut self, on: bool) {
        self.xml_mode = on;
    }

    /// Whether single-byte mode is active
    #[inline]
    #[must_use]
    pub fn xml_mode(&self) -> bool {
        self.xml_mode
    }
}

impl<R: BufRead> Read for CaptureSource<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.xml_mode && out.len() > 1 {
            return self.inner.read(&mut out[..1]);
        }
        self.inner.read(out)
    }
}

impl<R: BufRead> BufRead for CaptureSource<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        let xml_mode = self.xml_mode;
        let buf = self.inner.fill_buf()?;
        if xml_mode && buf.len() > 1 {
            Ok(&buf[..1])
        } else {
            Ok(buf)
        }
    }

    fn consume(&mut self, amount: usize) {
        self.inner.consume(amount);
    }
}

struct Session {
    source: CaptureSource<Box<dyn BufRead>>,
    options: ReaderOptions,
    line: String,
}

impl Session {
    /// Next line without its terminator, `None` at end of stream
    fn next_line(&mut self) -> io::Result<Option<&str>> {
        self.line.clear();
        if self.source.read_line(&mut self.line)? == 0 {
            return Ok(None);
        }
        Ok(Some(self.line.trim_end_matches(['\r', '\n'])))
    }

    /// Skip lines up to and including the next blank line
    fn skip_to_blank_line(&mut self) -> io::Result<bool> {
        while let Some(line) = self.next_line()? {
            if line.trim().is_empty() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Discard `count` blank-line delimited sections
    fn skip_sections(&mut self, count: usize) -> io::Result<()> {
        for _ in 0..count {
            let mut seen_content = false;
            loop {
                let Some(line) = self.next_line()? else {
                    return Ok(());
                };
                if !line.trim().is_empty() {
                    seen_content = true;
                } else if seen_content {
                    break;
                }
            }
        }
        Ok(())
    }
}

/// Reader for HTTP capture text
#[derive(Default)]
pub struct HttpCaptureReader {
    state: SetupState<Session>,
}

impl std::fmt::Debug for HttpCaptureReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ready = matches!(self.state, SetupState::Ready(_));
        f.debug_struct("HttpCaptureReader")
            .field("ready", &ready)
            .finish()
    }
}

impl HttpCaptureReader {
    /// Create reader
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TraceFormatReader for HttpCaptureReader {
    fn setup(
        &mut self,
        source: Box<dyn BufRead>,
        file_name: &Path,
        client_side: bool,
        service_side: bool,
    ) -> Result<(), TraceError> {
        tracing::debug!("side filters do not apply to HTTP captures");
        self.state.install(Session {
            source: CaptureSource::new(source),
            options: ReaderOptions {
                file_name: file_name.to_path_buf(),
                client_side,
                service_side,
            },
            line: String::new(),
        })
    }

    fn read_next(&mut self) -> Result<Option<ParsedMessage>, TraceError> {
        let session = self.state.session()?;
        let file = session.options.file_name.clone();
        let io_err = |e| TraceError::io(&file, e);

        let action = loop {
            let Some(line) = session.next_line().map_err(io_err)? else {
                return Ok(None);
            };
            if let Some(captures) = ANNOUNCEMENT.captures(line) {
                break captures[1].trim().to_string();
            }
        };

        if !session.skip_to_blank_line().map_err(io_err)? {
            return Err(TraceError::invalid_log(
                &file,
                format!("request for action '{}' has no body", action),
            ));
        }

        session.source.set_xml_mode(true);
        let parsed = {
            let mut xml = NsReader::from_reader(&mut session.source);
            let mut buf = Vec::new();
            XmlElement::read_next(&mut xml, &mut buf)
        };
        session.source.set_xml_mode(false);

        let envelope = parsed.map_err(|e| TraceError::xml(&file, e))?.ok_or_else(|| {
            TraceError::invalid_log(&file, format!("request for action '{}' has no envelope", action))
        })?;
        let mut message =
            BufferedMessage::from_envelope(envelope).map_err(|e| TraceError::envelope(&file, e))?;
        message.set_action(action);

        // Rest of the line the envelope ended on, then the paired response.
        session.next_line().map_err(io_err)?;
        session.skip_sections(RESPONSE_SECTIONS).map_err(io_err)?;

        tracing::debug!(action = message.action(), "read captured request");
        Ok(Some(ParsedMessage::new(message, None)))
    }

    fn name(&self) -> &'static str {
        "http-capture"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::SOAP11_NS;
    use std::io::Cursor;

    fn exchange(action: &str, a: i32) -> String {
        format!(
            "POST /Calc.svc HTTP/1.1\r\n\
             Content-Type: text/xml; charset=utf-8\r\n\
             SOAPAction: \"{action}\"\r\n\
             Host: localhost\r\n\
             \r\n\
             <s:Envelope xmlns:s=\"{SOAP11_NS}\"><s:Body><Add xmlns=\"http://tempuri.org/\"><a>{a}</a></Add></s:Body></s:Envelope>\r\n\
             \r\n\
             HTTP/1.1 200 OK\r\n\
             Content-Type: text/xml\r\n\
             \r\n\
             <s:Envelope xmlns:s=\"{SOAP11_NS}\"><s:Body><AddResponse/></s:Body></s:Envelope>\r\n\
             \r\n"
        )
    }

    fn reader_over(text: String) -> HttpCaptureReader {
        let mut reader = HttpCaptureReader::new();
        reader
            .setup(Box::new(Cursor::new(text.into_bytes())), Path::new("cap.txt"), true, false)
            .unwrap();
        reader
    }

    #[test]
    fn reads_requests_and_discards_responses() {
        let text = format!("{}{}", exchange("urn:Calc/Add", 1), exchange("urn:Calc/Sub", 2));
        let mut reader = reader_over(text);

        let first = reader.read_next().unwrap().unwrap();
        assert_eq!(first.action(), "urn:Calc/Add");
        let body = first.message().first_body_element().unwrap();
        assert_eq!(body.first_element().unwrap().text(), "1");

        let second = reader.read_next().unwrap().unwrap();
        assert_eq!(second.action(), "urn:Calc/Sub");
        assert!(reader.read_next().unwrap().is_none());
    }

    #[test]
    fn announcement_is_case_insensitive_and_quotes_optional() {
        let caps = ANNOUNCEMENT.captures("soapaction: urn:x/Y").unwrap();
        assert_eq!(&caps[1], "urn:x/Y");
        let caps = ANNOUNCEMENT.captures("SOAPAction: \"\"").unwrap();
        assert_eq!(&caps[1], "");
        assert!(ANNOUNCEMENT.captures("X-SOAPAction: a").is_none());
    }

    #[test]
    fn xml_mode_limits_reads_to_one_byte() {
        let mut source = CaptureSource::new(Cursor::new(b"<a/>tail".to_vec()));
        source.set_xml_mode(true);
        assert_eq!(source.fill_buf().unwrap().len(), 1);
        let mut out = [0u8; 8];
        assert_eq!(source.read(&mut out).unwrap(), 1);
        source.set_xml_mode(false);
        assert!(source.fill_buf().unwrap().len() > 1);
    }

    #[test]
    fn cursor_stops_exactly_after_envelope() {
        let mut source = CaptureSource::new(Cursor::new(b"<a><b/></a>REST".to_vec()));
        source.set_xml_mode(true);
        {
            let mut xml = NsReader::from_reader(&mut source);
            let mut buf = Vec::new();
            XmlElement::read_next(&mut xml, &mut buf).unwrap().unwrap();
        }
        source.set_xml_mode(false);
        let mut rest = String::new();
        source.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "REST");
    }

    #[test]
    fn garbage_body_is_fatal() {
        let text = "SOAPAction: \"urn:a\"\r\n\r\nnot xml\r\n".to_string();
        let mut reader = reader_over(text);
        assert!(matches!(reader.read_next(), Err(TraceError::Xml { .. })));
    }
}
