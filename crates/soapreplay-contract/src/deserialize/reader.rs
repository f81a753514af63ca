//! Element-to-value reading shared by every strategy

use super::dataset;
use super::primitive::{parse_primitive, schema_type};
use crate::error::DeserializeError;
use crate::registry::{CollectionShape, TypeDef, TypeRegistry};
use crate::strategy::MemberRules;
use crate::typeref::{PrimitiveKind, TypeRef, WellKnown};
use crate::value::{PrimitiveValue, Value};
use base64::Engine;
use indexmap::IndexMap;
use soapreplay_trace::{NamespaceScope, XmlElement, XSI_NS};

/// Reads XML elements into [`Value`] graphs
#[derive(Debug, Clone)]
pub(crate) struct ValueReader<'r> {
    registry: &'r TypeRegistry,
    rules: MemberRules,
    known_types: Vec<&'r TypeDef>,
}

impl<'r> ValueReader<'r> {
    pub(crate) fn new(registry: &'r TypeRegistry, rules: MemberRules) -> Self {
        Self {
            registry,
            rules,
            known_types: Vec::new(),
        }
    }

    /// Add types consulted first when resolving `xsi:type`
    pub(crate) fn with_known_types<'a>(mut self, types: impl IntoIterator<Item = &'a TypeRef>) -> Self {
        let registry = self.registry;
        self.known_types
            .extend(types.into_iter().filter_map(|ty| registry.find_ref(ty)));
        self
    }

    #[inline]
    pub(crate) fn registry(&self) -> &'r TypeRegistry {
        self.registry
    }

    /// Read `element` as a value of `declared`
    ///
    /// `scope` must hold the declarations of the element's ancestors.
    pub(crate) fn read(
        &self,
        element: &XmlElement,
        scope: &mut NamespaceScope,
        declared: &TypeRef,
    ) -> Result<Value, DeserializeError> {
        let mark = scope.enter(element);
        let result = self.read_in_scope(element, scope, declared);
        scope.truncate(mark);
        result
    }

    fn read_in_scope(
        &self,
        element: &XmlElement,
        scope: &mut NamespaceScope,
        declared: &TypeRef,
    ) -> Result<Value, DeserializeError> {
        if element
            .attribute_ns(Some(XSI_NS), "nil")
            .is_some_and(|v| v.trim() == "true" || v.trim() == "1")
        {
            return Ok(Value::Null);
        }
        let runtime = match element.attribute_ns(Some(XSI_NS), "type") {
            Some(name) => self.resolve_xsi_type(name, scope)?,
            None => declared.effective().clone(),
        };
        self.read_as(element, scope, &runtime)
    }

    fn resolve_xsi_type(&self, value: &str, scope: &NamespaceScope) -> Result<TypeRef, DeserializeError> {
        let qname = scope.resolve_qname(value);
        if let Some(ty) = schema_type(qname.namespace.as_deref(), &qname.local) {
            return Ok(ty);
        }
        let rules = self.rules;
        let matches = |def: &&TypeDef| match rules {
            MemberRules::DataContract => {
                def.contract_name() == qname.local
                    && qname
                        .namespace
                        .as_deref()
                        .map_or(true, |ns| def.contract_namespace() == ns)
            }
            MemberRules::XmlSerializer => def.name == qname.local,
        };
        if let Some(def) = self.known_types.iter().copied().find(matches) {
            return Ok(def.type_ref());
        }
        let found = match rules {
            MemberRules::DataContract => self
                .registry
                .find_by_contract_name(qname.namespace.as_deref(), &qname.local),
            MemberRules::XmlSerializer => self.registry.types().find(matches),
        };
        found
            .map(TypeDef::type_ref)
            .ok_or_else(|| DeserializeError::UnknownXsiType(value.to_string()))
    }

    fn read_as(
        &self,
        element: &XmlElement,
        scope: &mut NamespaceScope,
        ty: &TypeRef,
    ) -> Result<Value, DeserializeError> {
        match ty {
            TypeRef::ByRef(inner) => self.read_as(element, scope, inner),
            TypeRef::Nullable(inner) => {
                if !element.has_elements() && element.text().trim().is_empty() {
                    Ok(Value::Null)
                } else {
                    self.read_as(element, scope, inner)
                }
            }
            TypeRef::Primitive(kind) => {
                parse_primitive(*kind, &element.text(), scope).map(Value::Primitive)
            }
            TypeRef::Array { element: item, .. } if item.primitive() == Some(PrimitiveKind::Byte) => {
                let text: String = element.text().split_whitespace().collect();
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(&text)
                    .map_err(|_| DeserializeError::invalid(ty, text))?;
                Ok(Value::Array {
                    ty: ty.clone(),
                    items: bytes
                        .into_iter()
                        .map(|b| Value::Primitive(PrimitiveValue::Byte(b)))
                        .collect(),
                })
            }
            TypeRef::Array { element: item, .. } => Ok(Value::Array {
                ty: ty.clone(),
                items: self.read_items(element, scope, item)?,
            }),
            TypeRef::Named { .. } => self.read_named(element, scope, ty),
        }
    }

    fn read_items(
        &self,
        element: &XmlElement,
        scope: &mut NamespaceScope,
        item: &TypeRef,
    ) -> Result<Vec<Value>, DeserializeError> {
        element
            .elements()
            .map(|child| self.read(child, scope, item))
            .collect()
    }

    fn read_named(
        &self,
        element: &XmlElement,
        scope: &mut NamespaceScope,
        ty: &TypeRef,
    ) -> Result<Value, DeserializeError> {
        match ty.well_known() {
            Some(WellKnown::Object) => return Ok(read_untyped(element)),
            Some(WellKnown::Stream) => return Ok(Value::Stream),
            Some(WellKnown::XmlElement | WellKnown::XmlNode) => {
                return Ok(element
                    .first_element()
                    .map_or(Value::Null, |e| Value::Xml(e.clone())));
            }
            Some(WellKnown::DataSet) => return dataset::read_dataset(element, ty, false, scope),
            _ => {}
        }
        if self.registry.is_dataset(ty) {
            return dataset::read_dataset(element, ty, true, scope);
        }

        if let Some(shape) = self.registry.collection_shape(ty) {
            let concrete = ty.concrete_collection().unwrap_or_else(|| ty.clone());
            return match shape {
                CollectionShape::Sequence { element: item } => Ok(Value::Collection {
                    ty: concrete,
                    items: self.read_items(element, scope, &item)?,
                }),
                CollectionShape::Map { key, value } => {
                    let mut entries = Vec::new();
                    for entry in element.elements() {
                        let mark = scope.enter(entry);
                        let pair = self.read_entry(entry, scope, &key, &value);
                        scope.truncate(mark);
                        entries.push(pair?);
                    }
                    Ok(Value::Dictionary { ty: concrete, entries })
                }
            };
        }

        let def = self
            .registry
            .find_ref(ty)
            .ok_or_else(|| DeserializeError::UnknownType(ty.to_string()))?;
        if def.is_enum() {
            return read_enum(def, ty, &element.text());
        }
        if !self.registry.is_serializable(ty, self.rules) {
            return Err(DeserializeError::NotSerializable {
                ty: ty.to_string(),
                strategy: self.rules.label().to_string(),
            });
        }
        self.read_object(element, scope, ty, def)
    }

    fn read_entry(
        &self,
        entry: &XmlElement,
        scope: &mut NamespaceScope,
        key: &TypeRef,
        value: &TypeRef,
    ) -> Result<(Value, Value), DeserializeError> {
        let part = |local: &str| {
            entry
                .child_local(local)
                .ok_or_else(|| DeserializeError::invalid(format!("dictionary entry {}", local), entry.to_xml_string()))
        };
        let k = self.read(part("Key")?, scope, key)?;
        let v = self.read(part("Value")?, scope, value)?;
        Ok((k, v))
    }

    /// Read a compound value member by member
    pub(crate) fn read_object(
        &self,
        element: &XmlElement,
        scope: &mut NamespaceScope,
        ty: &TypeRef,
        def: &TypeDef,
    ) -> Result<Value, DeserializeError> {
        let mut fields = IndexMap::new();
        for member in self.registry.serializable_members(def, self.rules) {
            let wire = member.wire_name(self.rules);
            if self.rules == MemberRules::XmlSerializer && member.is_xml_attribute() {
                if let Some(text) = element.attribute(wire) {
                    let value = self.read_attribute(text, scope, &member.ty)?;
                    fields.insert(member.name.clone(), value);
                }
                continue;
            }
            if let Some(child) = element.child_local(wire) {
                fields.insert(member.name.clone(), self.read(child, scope, &member.ty)?);
            }
        }
        Ok(Value::Object {
            ty: ty.clone(),
            fields,
        })
    }

    fn read_attribute(
        &self,
        text: &str,
        scope: &NamespaceScope,
        ty: &TypeRef,
    ) -> Result<Value, DeserializeError> {
        let ty = match ty.effective() {
            TypeRef::Nullable(inner) => inner.as_ref(),
            other => other,
        };
        if let Some(kind) = ty.primitive() {
            return parse_primitive(kind, text, scope).map(Value::Primitive);
        }
        match self.registry.find_ref(ty) {
            Some(def) if def.is_enum() => read_enum(def, ty, text),
            _ => Err(DeserializeError::NotSerializable {
                ty: ty.to_string(),
                strategy: "XML attribute".to_string(),
            }),
        }
    }
}

/// Value of an `object` slot with no `xsi:type`
fn read_untyped(element: &XmlElement) -> Value {
    if let Some(child) = element.first_element() {
        return Value::Xml(child.clone());
    }
    let text = element.text();
    if text.is_empty() {
        Value::empty_object(TypeRef::object())
    } else {
        Value::string(text)
    }
}

fn read_enum(def: &TypeDef, ty: &TypeRef, text: &str) -> Result<Value, DeserializeError> {
    let member = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if member.is_empty() {
        return Err(DeserializeError::invalid(ty, text));
    }
    let known = |name: &str| def.enum_members.is_empty() || def.enum_members.iter().any(|m| m == name);
    if let Some(unknown) = member.split(' ').find(|name| !known(name)) {
        return Err(DeserializeError::invalid(ty, unknown));
    }
    Ok(Value::Enum {
        ty: ty.clone(),
        member,
    })
}
