//! Reader integration tests: registry lookup, filtering and both formats

use soapreplay_trace::prelude::*;
use soapreplay_trace::{SOAP11_NS, SOAP12_NS, WSA10_NS, MESSAGE_TRACE_NS};
use std::io::Cursor;
use std::path::Path;

fn log_record(action: &str) -> String {
    format!(
        r#"<MessageLogTraceRecord Time="2024-05-02T08:15:00Z" Source="ServiceLevelSendRequest" Type="System.ServiceModel.Dispatcher.OperationFormatter+OperationFormatterMessage" xmlns="{MESSAGE_TRACE_NS}">
  <s:Envelope xmlns:s="{SOAP12_NS}" xmlns:a="{WSA10_NS}">
    <s:Header><a:Action s:mustUnderstand="1">{action}</a:Action></s:Header>
    <s:Body><Add xmlns="http://tempuri.org/"><a>2</a><b>3</b></Add></s:Body>
  </s:Envelope>
</MessageLogTraceRecord>
"#
    )
}

fn open(name: &str, text: String, filter: ActionFilter) -> MessageFilter<Box<dyn TraceFormatReader>> {
    let reader = ReaderRegistry::with_defaults().create(name).unwrap();
    let mut filtered = MessageFilter::new(reader, filter);
    filtered
        .setup(Box::new(Cursor::new(text.into_bytes())), Path::new("trace.log"), true, false)
        .unwrap();
    filtered
}

fn actions(reader: &mut impl TraceFormatReader) -> Vec<String> {
    let mut out = Vec::new();
    while let Some(message) = reader.read_next().unwrap() {
        out.push(message.action().to_string());
    }
    out
}

#[test]
fn message_log_through_registry_and_filter() {
    let text = [
        log_record("http://tempuri.org/Calc/Add"),
        log_record("http://tempuri.org/Calc/Sub"),
        log_record("http://tempuri.org/Calc/Add"),
    ]
    .concat();
    let mut reader = open("message-log", text, ActionFilter::exclude(["http://tempuri.org/Calc/Sub"]));
    assert_eq!(
        actions(&mut reader),
        vec!["http://tempuri.org/Calc/Add", "http://tempuri.org/Calc/Add"]
    );
    assert_eq!(reader.seen(), 3);
}

#[test]
fn message_body_survives_buffering() {
    let mut reader = open("message-log", log_record("urn:x"), ActionFilter::pass_all());
    let message = reader.read_next().unwrap().unwrap();
    let add = message.message().first_body_element().unwrap();
    let values: Vec<String> = add.elements().map(XmlElement::text).collect();
    assert_eq!(values, vec!["2", "3"]);
    assert!(message.timestamp().is_some());
}

#[test]
fn http_capture_through_registry() {
    let text = format!(
        "POST /svc HTTP/1.1\nSOAPAction: \"urn:Calc/Add\"\nContent-Length: 10\n\n\
         <e:Envelope xmlns:e=\"{SOAP11_NS}\"><e:Body><Add/></e:Body></e:Envelope>\n\n\
         HTTP/1.1 200 OK\n\n<e:Envelope xmlns:e=\"{SOAP11_NS}\"><e:Body/></e:Envelope>\n\n\
         POST /svc HTTP/1.1\nSOAPAction: urn:Calc/Sub\n\n\
         <e:Envelope xmlns:e=\"{SOAP11_NS}\"><e:Body><Sub/></e:Body></e:Envelope>\n"
    );
    let mut reader = open("http-capture", text, ActionFilter::pass_all());
    assert_eq!(actions(&mut reader), vec!["urn:Calc/Add", "urn:Calc/Sub"]);
}

#[test]
fn malformed_log_error_names_file() {
    let mut reader = open("message-log", "<NotARecord/>".to_string(), ActionFilter::pass_all());
    let err = reader.read_next().unwrap_err();
    assert!(err.to_string().contains("trace.log"));
}

#[test]
fn unsupported_envelope_is_fatal() {
    let text = format!(
        r#"<MessageLogTraceRecord Source="ServiceLevelSendRequest" Type="X" xmlns="{MESSAGE_TRACE_NS}"><Envelope xmlns="urn:bogus"><Body/></Envelope></MessageLogTraceRecord>"#
    );
    let mut reader = open("message-log", text, ActionFilter::pass_all());
    assert!(matches!(reader.read_next(), Err(TraceError::Envelope { .. })));
}
