//! Message contract reading
//!
//! A message contract parameter maps onto the whole message: header members
//! come from the SOAP headers and body members from the body, inside the
//! wrapper element when the contract is wrapped.

use super::reader::ValueReader;
use crate::error::DeserializeError;
use crate::registry::{MemberDef, TypeDef};
use crate::typeref::TypeRef;
use crate::value::Value;
use indexmap::IndexMap;
use soapreplay_trace::BufferedMessage;

pub(crate) fn read_message_contract(
    reader: &ValueReader<'_>,
    message: &BufferedMessage,
    ty: &TypeRef,
) -> Result<Value, DeserializeError> {
    let registry = reader.registry();
    let def = registry
        .find_ref(ty)
        .ok_or_else(|| DeserializeError::UnknownType(ty.to_string()))?;
    let info = def.message_contract().cloned().unwrap_or_default();

    let mut header_scope = message.header_scope();
    let mut body_scope = message.body_scope();
    let container = if info.is_wrapped {
        let wrapper_name = info.wrapper_name.as_deref().unwrap_or(&def.name);
        let wrapper = message
            .body_contents()
            .find(|e| e.local_name() == wrapper_name)
            .or_else(|| message.first_body_element())
            .ok_or_else(|| DeserializeError::EmptyBody {
                operation: def.full_name(),
            })?;
        body_scope.enter(wrapper);
        wrapper
    } else {
        message.body()
    };

    let mut fields = IndexMap::new();
    for member in contract_members(registry.ancestry(def)) {
        let wire = member_wire_name(member);
        if member.message_header {
            if let Some(header) = message.headers().find(|h| h.local_name() == wire) {
                let value = reader.read(header, &mut header_scope, &member.ty)?;
                fields.insert(member.name.clone(), value);
            }
        } else if let Some(part) = container.child_local(wire) {
            let value = reader.read(part, &mut body_scope, &member.ty)?;
            fields.insert(member.name.clone(), value);
        }
    }
    Ok(Value::Object {
        ty: ty.clone(),
        fields,
    })
}

/// Header and body members, base types first
fn contract_members<'a>(mut chain: Vec<&'a TypeDef>) -> impl Iterator<Item = &'a MemberDef> {
    chain.reverse();
    chain
        .into_iter()
        .flat_map(|def| def.members.iter())
        .filter(|m| (m.message_header || m.message_body) && !m.ignore)
}

fn member_wire_name(member: &MemberDef) -> &str {
    member
        .xml
        .as_ref()
        .and_then(|x| x.element_name.as_deref())
        .or_else(|| member.data_member.as_ref().and_then(|d| d.name.as_deref()))
        .unwrap_or(&member.name)
}
