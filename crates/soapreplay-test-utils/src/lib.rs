//! Testing utilities for the soapreplay workspace
//!
//! Shared fixtures: a sample arithmetic service contract, trace builders for
//! both trace formats and value helpers.

#![allow(missing_docs)]

use indexmap::IndexMap;
use soapreplay_contract::{
    DataContractInfo, Marker, MemberDef, MethodDef, OperationContractInfo, ParameterDef,
    ServiceContractInfo, TypeContainer, TypeDef, TypeKind, TypeRef, TypeRegistry, Value,
};
use soapreplay_trace::{BufferedMessage, MESSAGE_TRACE_NS, SOAP12_NS, WSA10_NS};

pub const ADD_ACTION: &str = "http://tempuri.org/IArithmetic/Add";
pub const DIVIDE_ACTION: &str = "http://tempuri.org/IArithmetic/Divide";
pub const SUBMIT_ACTION: &str = "http://tempuri.org/IArithmetic/Submit";
pub const REPORT_ACTION: &str = "http://tempuri.org/IReporting/Report";
pub const CLIENT_SOURCE: &str = "ServiceLevelSendRequest";
pub const SERVICE_SOURCE: &str = "ServiceLevelReceiveRequest";

fn ty(name: &str) -> TypeRef {
    name.parse().unwrap()
}

fn operation(name: &str, params: &[(&str, &str)], returns: Option<&str>) -> MethodDef {
    MethodDef {
        name: name.to_string(),
        parameters: params.iter().map(|(n, t)| ParameterDef::new(*n, ty(t))).collect(),
        returns: returns.map(ty),
        markers: vec![Marker::OperationContract(OperationContractInfo::default())],
        ..MethodDef::default()
    }
}

fn data_contract(name: &str, members: &[(&str, &str)]) -> TypeDef {
    let mut def = TypeDef::new("Calc", name);
    def.markers.push(Marker::DataContract(DataContractInfo::default()));
    def.members = members
        .iter()
        .map(|(n, t)| MemberDef::new(*n, ty(t)).data_member())
        .collect();
    def
}

/// Types of the sample service
pub fn arithmetic_types() -> Vec<TypeDef> {
    let mut divide = operation("Divide", &[("a", "int"), ("b", "int"), ("remainder", "int")], Some("int"));
    divide.parameters[2].out = true;

    let mut contract = TypeDef::new("Calc", "IArithmetic");
    contract.kind = TypeKind::Interface;
    contract.markers.push(Marker::ServiceContract(ServiceContractInfo::default()));
    contract.methods = vec![
        operation("Add", &[("a", "int"), ("b", "int")], Some("int")),
        divide,
        operation("Submit", &[("order", "Calc.Order")], None),
    ];

    let mut client = TypeDef::new("Calc", "ArithmeticClient");
    client.base = Some(ty("System.ServiceModel.ClientBase<Calc.IArithmetic>"));
    client.interfaces.push(ty("Calc.IArithmetic"));
    client.methods = contract
        .methods
        .iter()
        .cloned()
        .map(|mut m| {
            m.markers.clear();
            m
        })
        .collect();

    let mut reporting = TypeDef::new("Calc", "IReporting");
    reporting.kind = TypeKind::Interface;
    reporting.markers.push(Marker::ServiceContract(ServiceContractInfo::default()));
    reporting.methods = vec![operation("Report", &[("text", "string")], None)];

    let mut status = TypeDef::new("Calc", "Status");
    status.kind = TypeKind::Enum;
    status.enum_members = vec!["Open".to_string(), "Closed".to_string()];

    vec![
        contract,
        client,
        reporting,
        data_contract(
            "Order",
            &[
                ("Id", "int"),
                ("Lines", "System.Collections.Generic.List<Calc.Line>"),
                ("Status", "Calc.Status"),
            ],
        ),
        data_contract("Line", &[("Sku", "string"), ("Quantity", "int")]),
        data_contract("Node", &[("Value", "int"), ("Next", "Calc.Node")]),
        status,
    ]
}

pub fn arithmetic_container() -> TypeContainer {
    TypeContainer::new("calc", arithmetic_types())
}

pub fn arithmetic_registry() -> TypeRegistry {
    TypeRegistry::from_containers(vec![arithmetic_container()])
}

/// The sample container as a JSON manifest
pub fn arithmetic_manifest_json() -> String {
    serde_json::to_string_pretty(&arithmetic_container()).unwrap()
}

/// SOAP 1.2 + WS-Addressing 1.0 request envelope
pub fn envelope(action: &str, body: &str) -> String {
    format!(
        r#"<s:Envelope xmlns:s="{SOAP12_NS}" xmlns:a="{WSA10_NS}"><s:Header><a:Action s:mustUnderstand="1">{action}</a:Action></s:Header><s:Body>{body}</s:Body></s:Envelope>"#
    )
}

pub fn add_body(a: i32, b: i32) -> String {
    format!(r#"<Add xmlns="http://tempuri.org/"><a>{a}</a><b>{b}</b></Add>"#)
}

pub fn message(action: &str, body: &str) -> BufferedMessage {
    BufferedMessage::parse_str(&envelope(action, body)).unwrap()
}

/// Builds structured message-log traces
#[derive(Debug, Default)]
pub struct MessageLogBuilder {
    records: Vec<String>,
}

impl MessageLogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(mut self, source: &str, kind: &str, action: &str, body: &str) -> Self {
        self.records.push(format!(
            r#"<MessageLogTraceRecord Time="2024-03-01T10:00:0{}Z" Source="{source}" Type="{kind}" xmlns="{MESSAGE_TRACE_NS}">{}</MessageLogTraceRecord>"#,
            self.records.len() % 10,
            envelope(action, body),
        ));
        self
    }

    /// Client-side request
    pub fn request(self, action: &str, body: &str) -> Self {
        self.record(CLIENT_SOURCE, "System.ServiceModel.Dispatcher.OperationFormatter+OperationFormatterMessage", action, body)
    }

    /// Service-side request
    pub fn service_request(self, action: &str, body: &str) -> Self {
        self.record(SERVICE_SOURCE, "System.ServiceModel.Channels.BufferedMessage", action, body)
    }

    /// Request record without a body
    pub fn null_message(self, action: &str) -> Self {
        self.record(CLIENT_SOURCE, "System.ServiceModel.Channels.NullMessage", action, "")
    }

    pub fn build(&self) -> String {
        self.records.join("\n")
    }
}

/// Builds line-oriented HTTP capture traces
#[derive(Debug, Default)]
pub struct HttpCaptureBuilder {
    text: String,
}

impl HttpCaptureBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request plus its response
    pub fn exchange(mut self, action: &str, body: &str) -> Self {
        self.text.push_str(&format!(
            "POST /calc HTTP/1.1\r\nContent-Type: text/xml; charset=utf-8\r\nSOAPAction: \"{action}\"\r\nHost: localhost\r\n\r\n{}\r\n\r\nHTTP/1.1 200 OK\r\nContent-Type: text/xml\r\n\r\n<s:Envelope xmlns:s=\"{SOAP12_NS}\"><s:Body><Result>0</Result></s:Body></s:Envelope>\r\n\r\n",
            envelope(action, body)
        ));
        self
    }

    pub fn build(&self) -> String {
        self.text.clone()
    }
}

/// Chain of `Calc.Node` values whose graph depth is `depth` (at least 2)
pub fn node_chain(depth: usize) -> Value {
    let node = |next: Option<Value>| {
        let mut fields = IndexMap::new();
        fields.insert("Value".to_string(), Value::int(1));
        if let Some(next) = next {
            fields.insert("Next".to_string(), next);
        }
        Value::Object {
            ty: ty("Calc.Node"),
            fields,
        }
    };
    let mut value = node(None);
    for _ in 2..depth {
        value = node(Some(value));
    }
    value
}
