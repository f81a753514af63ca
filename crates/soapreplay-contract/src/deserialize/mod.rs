//! Message body deserialization
//!
//! Rebuilds the parameter values of a contract operation from a buffered
//! request message. The body layout is chosen per operation by
//! [`SerializationStrategy::select`]:
//!
//! - **Data contract**: one element per parameter inside the operation
//!   wrapper, in the contract namespace
//! - **XML element**: the same layout read with XML-serializer member rules
//! - **Message wrapper**: a single message contract parameter spanning
//!   headers and body
//!
//! Output parameters never travel in a request and always receive the
//! default value of their type.

mod dataset;
mod primitive;
mod reader;
mod wrapper;

pub use dataset::{DIFFGR_NS, MSDATA_NS};
pub use primitive::{parse_primitive, schema_type, SERIALIZATION_NS, XS_NS};

use crate::call::{CallParameterInfo, Direction};
use crate::error::DeserializeError;
use crate::registry::{Marker, ParameterDef, TypeDef, TypeRegistry};
use crate::resolver::{ContractMethod, DEFAULT_CONTRACT_NS};
use crate::strategy::{MemberRules, SerializationStrategy};
use crate::typeref::TypeRef;
use crate::value::Value;
use reader::ValueReader;
use soapreplay_trace::{BufferedMessage, XmlElement};

/// Body text a streamed request is logged with
pub const STREAM_PLACEHOLDER: &str = "... stream ...";

/// Element a streamed request body is wrapped in
pub const STREAM_ELEMENT: &str = "Binary";

/// Rebuilds call parameters from request messages
#[derive(Debug, Clone, Copy)]
pub struct MessageDeserializer<'r> {
    registry: &'r TypeRegistry,
}

impl<'r> MessageDeserializer<'r> {
    /// Create deserializer over a registry
    #[inline]
    #[must_use]
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self { registry }
    }

    /// Strategy used for an operation
    #[must_use]
    pub fn strategy(&self, call: &ContractMethod<'_>) -> SerializationStrategy {
        SerializationStrategy::select(self.registry, call.contract, call.method)
    }

    /// Parameter values of `call` captured in `message`, in formal order
    pub fn deserialize(
        &self,
        message: &BufferedMessage,
        call: &ContractMethod<'_>,
    ) -> Result<Vec<CallParameterInfo>, DeserializeError> {
        let strategy = self.strategy(call);
        tracing::debug!(
            operation = %call.method.name,
            %strategy,
            "deserializing request body"
        );
        match strategy {
            SerializationStrategy::DataContract => self.read_parameters(message, call, MemberRules::DataContract),
            SerializationStrategy::XmlElement => self.read_parameters(message, call, MemberRules::XmlSerializer),
            SerializationStrategy::MessageWrapper { .. } => {
                Ok(self.read_message_wrapper(message, call, strategy.member_rules()))
            }
        }
    }

    fn reader(&self, call: &ContractMethod<'_>, rules: MemberRules) -> ValueReader<'r> {
        ValueReader::new(self.registry, rules).with_known_types(
            call.contract
                .service_known_types()
                .chain(service_known_types_of(call)),
        )
    }

    /// One element per parameter inside the operation wrapper element
    fn read_parameters(
        &self,
        message: &BufferedMessage,
        call: &ContractMethod<'_>,
        rules: MemberRules,
    ) -> Result<Vec<CallParameterInfo>, DeserializeError> {
        let params = &call.method.parameters;

        if is_stream_placeholder(message) {
            tracing::debug!(operation = %call.method.name, "request body is a stream placeholder");
            return Ok(params
                .iter()
                .map(|p| {
                    let value = if p.effective_type().is_stream() {
                        Value::Null
                    } else {
                        Value::default_for(p.effective_type(), self.registry)
                    };
                    parameter(p, value)
                })
                .collect());
        }

        let wrapper = match message.first_body_element() {
            Some(wrapper) => wrapper,
            None if params.iter().all(|p| p.direction() == Direction::Out) => {
                return Ok(params.iter().map(|p| self.default_parameter(p)).collect());
            }
            None => {
                return Err(DeserializeError::EmptyBody {
                    operation: call.method.name.clone(),
                })
            }
        };

        let namespace = contract_namespace(call.contract);
        let reader = self.reader(call, rules);
        let mut scope = message.body_scope();
        let mark = scope.enter(wrapper);
        let mut out = Vec::with_capacity(params.len());
        for p in params {
            if p.direction() == Direction::Out {
                out.push(self.default_parameter(p));
                continue;
            }
            if p.effective_type().is_stream() {
                out.push(parameter(p, Value::Stream));
                continue;
            }
            let value = match find_part(wrapper, namespace, p.wire_name()) {
                Some(part) => reader.read(part, &mut scope, p.effective_type())?,
                None => {
                    tracing::debug!(parameter = %p.name, "parameter missing from body, using default");
                    Value::default_for(p.effective_type(), self.registry)
                }
            };
            out.push(parameter(p, value));
        }
        scope.truncate(mark);
        Ok(out)
    }

    /// Single message contract parameter, read best-effort
    fn read_message_wrapper(
        &self,
        message: &BufferedMessage,
        call: &ContractMethod<'_>,
        rules: MemberRules,
    ) -> Vec<CallParameterInfo> {
        let reader = self.reader(call, rules);
        call.method
            .parameters
            .iter()
            .map(|p| {
                let ty = p.effective_type();
                let value = wrapper::read_message_contract(&reader, message, ty).unwrap_or_else(|error| {
                    tracing::warn!(
                        operation = %call.method.name,
                        %error,
                        "message contract could not be read, substituting a default instance"
                    );
                    match self.registry.find_ref(ty) {
                        Some(def) if def.default_constructor => Value::empty_object(ty.clone()),
                        _ => Value::default_for(ty, self.registry),
                    }
                });
                parameter(p, value)
            })
            .collect()
    }

    fn default_parameter(&self, p: &ParameterDef) -> CallParameterInfo {
        parameter(p, Value::default_for(p.effective_type(), self.registry))
    }
}

fn parameter(p: &ParameterDef, value: Value) -> CallParameterInfo {
    CallParameterInfo {
        name: p.name.clone(),
        declared_type: p.effective_type().clone(),
        direction: p.direction(),
        value,
    }
}

fn service_known_types_of<'a>(call: &'a ContractMethod<'_>) -> impl Iterator<Item = &'a TypeRef> {
    call.method.markers.iter().filter_map(|m| match m {
        Marker::ServiceKnownType(k) => Some(&k.ty),
        _ => None,
    })
}

/// Namespace parameter elements are written in
fn contract_namespace(contract: &TypeDef) -> &str {
    contract
        .service_contract()
        .and_then(|info| info.namespace.as_deref())
        .unwrap_or(DEFAULT_CONTRACT_NS)
}

/// Parameter element by name in the contract namespace, then by local name
fn find_part<'a>(wrapper: &'a XmlElement, namespace: &str, wire_name: &str) -> Option<&'a XmlElement> {
    let ns = (!namespace.is_empty()).then_some(namespace);
    wrapper
        .child(ns, wire_name)
        .or_else(|| wrapper.child_local(wire_name))
}

fn is_stream_placeholder(message: &BufferedMessage) -> bool {
    match message.first_body_element() {
        Some(first) => {
            first.local_name() == STREAM_ELEMENT
                || (!first.has_elements() && first.text().trim() == STREAM_PLACEHOLDER)
        }
        None => message.body().text().trim() == STREAM_PLACEHOLDER,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{
        DataContractInfo, MemberDef, MessageContractInfo, MethodDef, OperationContractInfo,
        ServiceContractInfo, TypeContainer, TypeKind,
    };
    use crate::resolver::ContractResolver;
    use crate::value::PrimitiveValue;
    use pretty_assertions::assert_eq;

    fn envelope(body: &str) -> BufferedMessage {
        BufferedMessage::parse_str(&format!(
            r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
                 <s:Header><Tenant xmlns="urn:h">acme</Tenant></s:Header>
                 <s:Body>{body}</s:Body>
               </s:Envelope>"#
        ))
        .unwrap()
    }

    fn method(name: &str, params: Vec<ParameterDef>, markers: Vec<Marker>) -> MethodDef {
        let mut all = vec![Marker::OperationContract(OperationContractInfo::default())];
        all.extend(markers);
        MethodDef {
            name: name.to_string(),
            parameters: params,
            markers: all,
            ..MethodDef::default()
        }
    }

    fn registry() -> TypeRegistry {
        let mut contract = TypeDef::new("Calc", "IArithmetic");
        contract.kind = TypeKind::Interface;
        contract.markers.push(Marker::ServiceContract(ServiceContractInfo::default()));
        let mut remainder = ParameterDef::new("remainder", "int".parse().unwrap());
        remainder.out = true;
        contract.methods = vec![
            method(
                "Add",
                vec![
                    ParameterDef::new("a", "int".parse().unwrap()),
                    ParameterDef::new("b", "int".parse().unwrap()),
                ],
                vec![],
            ),
            method(
                "Divide",
                vec![
                    ParameterDef::new("a", "int".parse().unwrap()),
                    ParameterDef::new("b", "int".parse().unwrap()),
                    remainder,
                ],
                vec![],
            ),
            method(
                "Upload",
                vec![ParameterDef::new("data", "System.IO.Stream".parse().unwrap())],
                vec![],
            ),
            method(
                "Echo",
                vec![ParameterDef::new("text", "string".parse().unwrap())],
                vec![Marker::XmlSerializerFormat],
            ),
            method(
                "Submit",
                vec![ParameterDef::new("request", "Calc.SubmitRequest".parse().unwrap())],
                vec![],
            ),
            method(
                "Store",
                vec![ParameterDef::new("item", "Calc.Item".parse().unwrap())],
                vec![],
            ),
        ];

        let mut request = TypeDef::new("Calc", "SubmitRequest");
        request.markers.push(Marker::MessageContract(MessageContractInfo::default()));
        let mut tenant = MemberDef::new("Tenant", "string".parse().unwrap());
        tenant.message_header = true;
        let mut amount = MemberDef::new("Amount", "int".parse().unwrap());
        amount.message_body = true;
        request.members = vec![tenant, amount];

        let mut item = TypeDef::new("Calc", "Item");
        item.markers.push(Marker::DataContract(DataContractInfo::default()));
        item.members = vec![MemberDef::new("Name", "string".parse().unwrap()).data_member()];

        TypeRegistry::from_containers(vec![TypeContainer::new("calc", vec![contract, request, item])])
    }

    fn call<'r>(reg: &'r TypeRegistry, op: &str) -> ContractMethod<'r> {
        ContractResolver::new(reg)
            .resolve_action(&format!("http://tempuri.org/IArithmetic/{op}"))
            .unwrap()
    }

    #[test]
    fn reads_data_contract_parameters() {
        let reg = registry();
        let msg = envelope(r#"<Add xmlns="http://tempuri.org/"><a>2</a><b>3</b></Add>"#);
        let params = MessageDeserializer::new(&reg).deserialize(&msg, &call(&reg, "Add")).unwrap();
        assert_eq!(
            params.iter().map(|p| (&p.name[..], &p.value)).collect::<Vec<_>>(),
            vec![("a", &Value::int(2)), ("b", &Value::int(3))]
        );
        assert!(params.iter().all(|p| p.direction == Direction::In));
    }

    #[test]
    fn out_parameters_get_defaults() {
        let reg = registry();
        let msg = envelope(r#"<Divide xmlns="http://tempuri.org/"><a>7</a><b>2</b></Divide>"#);
        let params = MessageDeserializer::new(&reg).deserialize(&msg, &call(&reg, "Divide")).unwrap();
        assert_eq!(params[2].direction, Direction::Out);
        assert_eq!(params[2].value, Value::int(0));
    }

    #[test]
    fn missing_parameters_get_defaults() {
        let reg = registry();
        let msg = envelope(r#"<Add xmlns="http://tempuri.org/"><a>2</a></Add>"#);
        let params = MessageDeserializer::new(&reg).deserialize(&msg, &call(&reg, "Add")).unwrap();
        assert_eq!(params[1].value, Value::int(0));
    }

    #[test]
    fn empty_body_is_an_error() {
        let reg = registry();
        let msg = envelope("");
        assert!(matches!(
            MessageDeserializer::new(&reg).deserialize(&msg, &call(&reg, "Add")),
            Err(DeserializeError::EmptyBody { .. })
        ));
    }

    #[test]
    fn stream_placeholder_yields_null_stream() {
        let reg = registry();
        let msg = envelope("... stream ...");
        let params = MessageDeserializer::new(&reg).deserialize(&msg, &call(&reg, "Upload")).unwrap();
        assert_eq!(params[0].value, Value::Null);
    }

    #[test]
    fn xml_element_strategy() {
        let reg = registry();
        let echo = call(&reg, "Echo");
        let de = MessageDeserializer::new(&reg);
        assert_eq!(de.strategy(&echo), SerializationStrategy::XmlElement);
        let msg = envelope(r#"<Echo xmlns="http://tempuri.org/"><text>hi</text></Echo>"#);
        let params = de.deserialize(&msg, &echo).unwrap();
        assert_eq!(params[0].value, Value::string("hi"));
    }

    #[test]
    fn message_contract_reads_headers_and_body() {
        let reg = registry();
        let submit = call(&reg, "Submit");
        let msg = envelope(r#"<SubmitRequest xmlns="http://tempuri.org/"><Amount>12</Amount></SubmitRequest>"#);
        let params = MessageDeserializer::new(&reg).deserialize(&msg, &submit).unwrap();
        let Value::Object { fields, .. } = &params[0].value else {
            panic!("not an object");
        };
        assert_eq!(fields["Tenant"], Value::string("acme"));
        assert_eq!(fields["Amount"], Value::Primitive(PrimitiveValue::Int32(12)));
    }

    #[test]
    fn malformed_message_contract_gets_default_instance() {
        let reg = registry();
        let submit = call(&reg, "Submit");
        let msg = envelope(r#"<SubmitRequest xmlns="http://tempuri.org/"><Amount>lots</Amount></SubmitRequest>"#);
        let params = MessageDeserializer::new(&reg).deserialize(&msg, &submit).unwrap();
        assert_eq!(params[0].value, Value::empty_object("Calc.SubmitRequest".parse().unwrap()));
    }

    #[test]
    fn data_contract_parameter_objects() {
        let reg = registry();
        let msg = envelope(
            r#"<Store xmlns="http://tempuri.org/"><item xmlns:d="http://schemas.datacontract.org/2004/07/Calc"><d:Name>pen</d:Name></item></Store>"#,
        );
        let params = MessageDeserializer::new(&reg).deserialize(&msg, &call(&reg, "Store")).unwrap();
        let Value::Object { fields, .. } = &params[0].value else {
            panic!("not an object");
        };
        assert_eq!(fields["Name"], Value::string("pen"));
    }
}
