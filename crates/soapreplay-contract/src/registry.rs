//! Type registry
//!
//! Contract metadata is read from type containers: manifest files (JSON, or
//! YAML by extension) describing types, their markers, members and methods.
//! The registry answers the questions the resolver, deserializer and code
//! generator need: lookup by name, assignability, contract implementation,
//! proxy lifecycle capability and per-rule serializable members.

use crate::call::Direction;
use crate::error::ContractError;
use crate::strategy::MemberRules;
use crate::typeref::{simple_name, TypeRef, WellKnown};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Base-chain walks stop after this many hops
const MAX_BASE_DEPTH: usize = 64;

/// Namespace prefix for data contracts without an explicit namespace
pub const DATA_CONTRACT_NS_PREFIX: &str = "http://schemas.datacontract.org/2004/07/";

fn default_true() -> bool {
    true
}

/// Kind of type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    /// Reference type
    #[default]
    Class,
    /// Value type
    Struct,
    /// Interface
    Interface,
    /// Enumeration
    Enum,
}

/// Accessibility of a type or member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Exported
    #[default]
    Public,
    /// Container-internal
    Internal,
    /// Declaring-type private
    Private,
}

/// Field or property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberKind {
    /// Property
    #[default]
    Property,
    /// Field
    Field,
}

/// Service contract marker arguments
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServiceContractInfo {
    /// Explicit contract name
    pub name: Option<String>,
    /// Explicit namespace (`Some("")` is an explicit empty namespace)
    pub namespace: Option<String>,
}

/// Operation contract marker arguments
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OperationContractInfo {
    /// Explicit operation name
    pub name: Option<String>,
    /// Explicit action
    pub action: Option<String>,
    /// Explicit reply action
    pub reply_action: Option<String>,
    /// One-way operation
    #[serde(default)]
    pub is_one_way: bool,
}

/// Data contract marker arguments
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DataContractInfo {
    /// Explicit contract name
    pub name: Option<String>,
    /// Explicit namespace
    pub namespace: Option<String>,
}

/// Collection data contract marker arguments
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CollectionContractInfo {
    /// Explicit contract name
    pub name: Option<String>,
    /// Explicit namespace
    pub namespace: Option<String>,
    /// Element name of each item
    pub item_name: Option<String>,
}

/// Message contract marker arguments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageContractInfo {
    /// Wrapper element name
    pub wrapper_name: Option<String>,
    /// Wrapper element namespace
    pub wrapper_namespace: Option<String>,
    /// Body members sit inside a wrapper element
    #[serde(default = "default_true")]
    pub is_wrapped: bool,
}

impl Default for MessageContractInfo {
    fn default() -> Self {
        Self {
            wrapper_name: None,
            wrapper_namespace: None,
            is_wrapped: true,
        }
    }
}

/// Known-type marker argument
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownTypeInfo {
    /// The auxiliary type
    #[serde(rename = "type")]
    pub ty: TypeRef,
}

/// Custom marker on a type or method
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Marker {
    /// Interface is a service contract
    ServiceContract(ServiceContractInfo),
    /// Method is a service operation
    OperationContract(OperationContractInfo),
    /// Type is a data contract
    DataContract(DataContractInfo),
    /// Type is a collection data contract
    CollectionDataContract(CollectionContractInfo),
    /// Use XML-serializer rules
    XmlSerializerFormat,
    /// Use data-contract rules
    DataContractFormat,
    /// Type is serializable by fields
    Serializable,
    /// Type describes a whole message
    MessageContract(MessageContractInfo),
    /// Auxiliary type a service accepts polymorphically
    ServiceKnownType(KnownTypeInfo),
    /// Auxiliary type a data contract accepts polymorphically
    KnownType(KnownTypeInfo),
}

/// Data-member override
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DataMemberInfo {
    /// Wire name
    pub name: Option<String>,
    /// Explicit order
    pub order: Option<i32>,
}

/// XML-serializer override
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct XmlMemberInfo {
    /// Wire element (or attribute) name
    pub element_name: Option<String>,
    /// Member is written as an attribute
    #[serde(default)]
    pub attribute: bool,
    /// Wire namespace
    pub namespace: Option<String>,
}

/// Field or property of a type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberDef {
    /// Member name
    pub name: String,
    /// Declared type
    #[serde(rename = "type")]
    pub ty: TypeRef,
    /// Field or property
    #[serde(default)]
    pub kind: MemberKind,
    /// Accessibility
    #[serde(default)]
    pub visibility: Visibility,
    /// Has a setter (always true for fields)
    #[serde(default = "default_true")]
    pub writable: bool,
    /// Data-member override
    #[serde(default)]
    pub data_member: Option<DataMemberInfo>,
    /// XML-serializer override
    #[serde(default)]
    pub xml: Option<XmlMemberInfo>,
    /// Excluded from serialization
    #[serde(default)]
    pub ignore: bool,
    /// Message contract header member
    #[serde(default)]
    pub message_header: bool,
    /// Message contract body member
    #[serde(default)]
    pub message_body: bool,
    /// Wire namespace for message contract members
    #[serde(default)]
    pub namespace: Option<String>,
}

impl MemberDef {
    /// Public writable property
    #[must_use]
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            kind: MemberKind::Property,
            visibility: Visibility::Public,
            writable: true,
            data_member: None,
            xml: None,
            ignore: false,
            message_header: false,
            message_body: false,
            namespace: None,
        }
    }

    /// Builder: mark as data member
    #[must_use]
    pub fn data_member(mut self) -> Self {
        self.data_member = Some(DataMemberInfo::default());
        self
    }

    /// Wire name under the given rules
    #[must_use]
    pub fn wire_name(&self, rules: MemberRules) -> &str {
        let name = match rules {
            MemberRules::DataContract => self.data_member.as_ref().and_then(|d| d.name.as_deref()),
            MemberRules::XmlSerializer => self.xml.as_ref().and_then(|x| x.element_name.as_deref()),
        };
        name.unwrap_or(&self.name)
    }

    /// Whether the member is written as an XML attribute
    #[inline]
    #[must_use]
    pub fn is_xml_attribute(&self) -> bool {
        self.xml.as_ref().is_some_and(|x| x.attribute)
    }

    /// Whether code outside the type can assign the member
    #[inline]
    #[must_use]
    pub fn is_public_writable(&self) -> bool {
        self.visibility == Visibility::Public && (self.writable || self.kind == MemberKind::Field)
    }
}

/// Formal parameter of a method
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDef {
    /// Parameter name
    pub name: String,
    /// Declared type (`T&` for by-reference parameters)
    #[serde(rename = "type")]
    pub ty: TypeRef,
    /// Passed by reference
    #[serde(default)]
    pub by_ref: bool,
    /// Output parameter
    #[serde(default)]
    pub out: bool,
    /// Wire name override
    #[serde(default)]
    pub wire_name: Option<String>,
}

impl ParameterDef {
    /// By-value parameter
    #[must_use]
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            by_ref: false,
            out: false,
            wire_name: None,
        }
    }

    /// Direction derived from the by-reference and output markers
    #[must_use]
    pub fn direction(&self) -> Direction {
        if self.out {
            Direction::Out
        } else if self.by_ref || matches!(self.ty, TypeRef::ByRef(_)) {
            Direction::Ref
        } else {
            Direction::In
        }
    }

    /// Type of the value itself (pointed-to type for by-reference parameters)
    #[inline]
    #[must_use]
    pub fn effective_type(&self) -> &TypeRef {
        self.ty.effective()
    }

    /// Element name on the wire
    #[inline]
    #[must_use]
    pub fn wire_name(&self) -> &str {
        self.wire_name.as_deref().unwrap_or(&self.name)
    }
}

/// Method of a type
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MethodDef {
    /// Method name (mangled `Namespace.Contract.Method` for explicit implementations)
    pub name: String,
    /// Formal parameters
    #[serde(default)]
    pub parameters: Vec<ParameterDef>,
    /// Return type, absent for void
    #[serde(default)]
    pub returns: Option<TypeRef>,
    /// Markers
    #[serde(default)]
    pub markers: Vec<Marker>,
    /// Accessibility
    #[serde(default)]
    pub visibility: Visibility,
    /// Explicit interface implementation
    #[serde(default)]
    pub explicit_interface: bool,
}

impl MethodDef {
    /// Operation contract marker
    #[must_use]
    pub fn operation(&self) -> Option<&OperationContractInfo> {
        self.markers.iter().find_map(|m| match m {
            Marker::OperationContract(info) => Some(info),
            _ => None,
        })
    }

    /// Whether the method returns nothing
    #[inline]
    #[must_use]
    pub fn is_void(&self) -> bool {
        self.returns.is_none()
    }

    /// Whether the method is part of the exported surface
    #[inline]
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }

    /// Parameter types match another method's, position by position
    #[must_use]
    pub fn same_signature(&self, other: &MethodDef) -> bool {
        self.parameters.len() == other.parameters.len()
            && self
                .parameters
                .iter()
                .zip(&other.parameters)
                .all(|(a, b)| a.ty.effective().same_type(b.ty.effective()) && a.out == b.out)
    }
}

/// Type described by a container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDef {
    /// Type name (nested types as `Outer+Inner`)
    pub name: String,
    /// Namespace, empty for the global namespace
    #[serde(default)]
    pub namespace: String,
    /// Kind of type
    #[serde(default)]
    pub kind: TypeKind,
    /// Accessibility
    #[serde(default)]
    pub visibility: Visibility,
    /// Base type
    #[serde(default)]
    pub base: Option<TypeRef>,
    /// Implemented interfaces
    #[serde(default)]
    pub interfaces: Vec<TypeRef>,
    /// Markers
    #[serde(default)]
    pub markers: Vec<Marker>,
    /// Fields and properties
    #[serde(default)]
    pub members: Vec<MemberDef>,
    /// Methods
    #[serde(default)]
    pub methods: Vec<MethodDef>,
    /// Enumeration members in declaration order
    #[serde(default)]
    pub enum_members: Vec<String>,
    /// Has an accessible parameterless constructor
    #[serde(default = "default_true")]
    pub default_constructor: bool,
}

impl TypeDef {
    /// Public class with a default constructor
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            kind: TypeKind::Class,
            visibility: Visibility::Public,
            base: None,
            interfaces: Vec::new(),
            markers: Vec::new(),
            members: Vec::new(),
            methods: Vec::new(),
            enum_members: Vec::new(),
            default_constructor: true,
        }
    }

    /// `Namespace.Name`
    #[must_use]
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    /// Reference to this type
    #[must_use]
    pub fn type_ref(&self) -> TypeRef {
        TypeRef::named(self.full_name())
    }

    /// Whether the type is part of the exported surface
    #[inline]
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }

    /// Check for an interface
    #[inline]
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    /// Check for an enumeration
    #[inline]
    #[must_use]
    pub fn is_enum(&self) -> bool {
        self.kind == TypeKind::Enum
    }

    /// Check whether `name` names this type (full or simple name)
    #[must_use]
    pub fn is_named(&self, name: &str) -> bool {
        name == self.name || name == self.full_name()
    }

    /// Service contract marker
    #[must_use]
    pub fn service_contract(&self) -> Option<&ServiceContractInfo> {
        self.markers.iter().find_map(|m| match m {
            Marker::ServiceContract(info) => Some(info),
            _ => None,
        })
    }

    /// Data contract marker
    #[must_use]
    pub fn data_contract(&self) -> Option<&DataContractInfo> {
        self.markers.iter().find_map(|m| match m {
            Marker::DataContract(info) => Some(info),
            _ => None,
        })
    }

    /// Collection data contract marker
    #[must_use]
    pub fn collection_contract(&self) -> Option<&CollectionContractInfo> {
        self.markers.iter().find_map(|m| match m {
            Marker::CollectionDataContract(info) => Some(info),
            _ => None,
        })
    }

    /// Message contract marker
    #[must_use]
    pub fn message_contract(&self) -> Option<&MessageContractInfo> {
        self.markers.iter().find_map(|m| match m {
            Marker::MessageContract(info) => Some(info),
            _ => None,
        })
    }

    /// Check for the field-serialization marker
    #[must_use]
    pub fn is_serializable_marked(&self) -> bool {
        self.markers.iter().any(|m| matches!(m, Marker::Serializable))
    }

    /// Service-level known types
    pub fn service_known_types(&self) -> impl Iterator<Item = &TypeRef> {
        self.markers.iter().filter_map(|m| match m {
            Marker::ServiceKnownType(info) => Some(&info.ty),
            _ => None,
        })
    }

    /// Data-contract known types
    pub fn known_types(&self) -> impl Iterator<Item = &TypeRef> {
        self.markers.iter().filter_map(|m| match m {
            Marker::KnownType(info) => Some(&info.ty),
            _ => None,
        })
    }

    /// Data contract name on the wire
    #[must_use]
    pub fn contract_name(&self) -> &str {
        self.data_contract()
            .and_then(|d| d.name.as_deref())
            .or_else(|| self.collection_contract().and_then(|c| c.name.as_deref()))
            .unwrap_or_else(|| simple_name(&self.name))
    }

    /// Data contract namespace on the wire
    #[must_use]
    pub fn contract_namespace(&self) -> String {
        self.data_contract()
            .and_then(|d| d.namespace.clone())
            .or_else(|| self.collection_contract().and_then(|c| c.namespace.clone()))
            .unwrap_or_else(|| format!("{}{}", DATA_CONTRACT_NS_PREFIX, self.namespace))
    }

    /// Member by name
    #[must_use]
    pub fn member(&self, name: &str) -> Option<&MemberDef> {
        self.members.iter().find(|m| m.name == name)
    }

    /// Methods with the given name
    pub fn methods_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a MethodDef> {
        self.methods.iter().filter(move |m| m.name == name)
    }
}

/// One metadata manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeContainer {
    /// Container name
    pub name: String,
    /// Described types
    #[serde(default)]
    pub types: Vec<TypeDef>,
}

impl TypeContainer {
    /// Create container
    #[must_use]
    pub fn new(name: impl Into<String>, types: Vec<TypeDef>) -> Self {
        Self {
            name: name.into(),
            types,
        }
    }

    /// Load a manifest; `.yaml`/`.yml` files are YAML, everything else JSON
    pub fn load(path: &Path) -> Result<Self, ContractError> {
        let text = std::fs::read_to_string(path).map_err(|source| ContractError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));
        if is_yaml {
            serde_yaml::from_str(&text).map_err(|e| ContractError::manifest(path, e))
        } else {
            serde_json::from_str(&text).map_err(|e| ContractError::manifest(path, e))
        }
    }
}

/// Container skipped during loading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedContainer {
    /// Manifest path
    pub path: PathBuf,
    /// Load error
    pub reason: String,
}

/// Element shape of a collection-like type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionShape {
    /// Ordered items
    Sequence {
        /// Item type
        element: TypeRef,
    },
    /// Key/value entries
    Map {
        /// Key type
        key: TypeRef,
        /// Value type
        value: TypeRef,
    },
}

/// Loaded type containers
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    containers: Vec<TypeContainer>,
    skipped: Vec<SkippedContainer>,
}

impl TypeRegistry {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry over in-memory containers
    #[must_use]
    pub fn from_containers(containers: Vec<TypeContainer>) -> Self {
        Self {
            containers,
            skipped: Vec::new(),
        }
    }

    /// Load every candidate container in order
    ///
    /// A container that cannot be read or parsed is logged and skipped.
    #[must_use]
    pub fn load<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut registry = Self::new();
        for path in paths {
            let path = path.as_ref();
            match TypeContainer::load(path) {
                Ok(container) => {
                    tracing::debug!(
                        path = %path.display(),
                        container = %container.name,
                        types = container.types.len(),
                        "loaded type container"
                    );
                    registry.containers.push(container);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping type container");
                    registry.skipped.push(SkippedContainer {
                        path: path.to_path_buf(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        registry
    }

    /// Add a container after the existing ones
    pub fn add_container(&mut self, container: TypeContainer) {
        self.containers.push(container);
    }

    /// Loaded containers
    #[inline]
    #[must_use]
    pub fn containers(&self) -> &[TypeContainer] {
        &self.containers
    }

    /// Containers skipped during loading
    #[inline]
    #[must_use]
    pub fn skipped(&self) -> &[SkippedContainer] {
        &self.skipped
    }

    /// All types, container order then declaration order
    pub fn types(&self) -> impl Iterator<Item = &TypeDef> {
        self.containers.iter().flat_map(|c| c.types.iter())
    }

    /// Public types only
    pub fn exported_types(&self) -> impl Iterator<Item = &TypeDef> {
        self.types().filter(|t| t.is_public())
    }

    /// Look up a type by full name, or by simple name when unqualified
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&TypeDef> {
        self.types().find(|t| t.full_name() == name).or_else(|| {
            if name.contains('.') {
                None
            } else {
                self.types().find(|t| t.name == name)
            }
        })
    }

    /// Look up the definition behind a named reference
    #[must_use]
    pub fn find_ref(&self, ty: &TypeRef) -> Option<&TypeDef> {
        match ty {
            TypeRef::Named { name, .. } => self.find(name),
            _ => None,
        }
    }

    /// Type followed by its base types, nearest first
    #[must_use]
    pub fn ancestry<'a>(&'a self, ty: &'a TypeDef) -> Vec<&'a TypeDef> {
        let mut chain = vec![ty];
        let mut current = ty;
        while let Some(base) = current.base.as_ref().and_then(|b| self.find_ref(b)) {
            if chain.len() >= MAX_BASE_DEPTH || chain.iter().any(|t| std::ptr::eq(*t, base)) {
                break;
            }
            chain.push(base);
            current = base;
        }
        chain
    }

    /// Every base and interface reference reachable from `ty`
    fn supertypes<'a>(&'a self, ty: &'a TypeDef) -> Vec<&'a TypeRef> {
        let mut refs = Vec::new();
        let mut pending = vec![ty];
        let mut visited: Vec<&TypeDef> = Vec::new();
        while let Some(current) = pending.pop() {
            if visited.iter().any(|t| std::ptr::eq(*t, current)) || visited.len() >= MAX_BASE_DEPTH {
                continue;
            }
            visited.push(current);
            for r in current.base.iter().chain(current.interfaces.iter()) {
                refs.push(r);
                if let Some(def) = self.find_ref(r) {
                    pending.push(def);
                }
            }
        }
        refs
    }

    /// Whether a value of type `from` can be stored in a slot of type `to`
    #[must_use]
    pub fn is_assignable(&self, from: &TypeRef, to: &TypeRef) -> bool {
        let (from, to) = (from.effective(), to.effective());
        if from.same_type(to) || to.is_object() {
            return true;
        }
        if let TypeRef::Nullable(inner) = to {
            return from.same_type(inner);
        }
        if to.concrete_collection().is_some_and(|c| from.same_type(&c)) {
            return true;
        }
        if let (TypeRef::Array { element, rank: 1 }, Some(known)) = (from, to.well_known()) {
            let sequence = matches!(
                known,
                WellKnown::IList | WellKnown::ICollection | WellKnown::IEnumerable
            );
            return sequence && to.args().first().map_or(true, |arg| element.same_type(arg));
        }
        match (from.well_known(), to.well_known()) {
            (Some(WellKnown::Stream), Some(WellKnown::Stream)) => return true,
            (Some(WellKnown::XmlElement), Some(WellKnown::XmlNode)) => return true,
            _ => {}
        }
        let Some(def) = self.find_ref(from) else {
            return false;
        };
        self.supertypes(def).into_iter().any(|r| r.same_type(to))
    }

    /// Whether `ty` implements `contract` by identity, interface or subclassing
    #[must_use]
    pub fn implements(&self, ty: &TypeDef, contract: &TypeDef) -> bool {
        if std::ptr::eq(ty, contract) || ty.full_name() == contract.full_name() {
            return true;
        }
        let target = contract.type_ref();
        self.supertypes(ty).into_iter().any(|r| {
            r.same_type(&target) || self.find_ref(r).is_some_and(|d| d.full_name() == contract.full_name())
        })
    }

    /// Whether `ty` has the connection lifecycle (open, close, state)
    #[must_use]
    pub fn has_lifecycle(&self, ty: &TypeDef) -> bool {
        let inherited = self.supertypes(ty).into_iter().any(|r| {
            matches!(
                r.well_known(),
                Some(WellKnown::ClientBase) | Some(WellKnown::ICommunicationObject)
            )
        });
        if inherited {
            return true;
        }
        let chain = self.ancestry(ty);
        let has_method = |name: &str| chain.iter().any(|t| t.methods_named(name).next().is_some());
        let has_state = chain.iter().any(|t| t.member("State").is_some());
        has_method("Open") && has_method("Close") && has_state
    }

    /// Check for a registered enumeration
    #[must_use]
    pub fn is_enum(&self, ty: &TypeRef) -> bool {
        self.find_ref(ty).is_some_and(TypeDef::is_enum)
    }

    /// Check for a registered value type (struct or enum)
    #[must_use]
    pub fn is_value_type(&self, ty: &TypeRef) -> bool {
        match ty.effective() {
            TypeRef::Primitive(kind) => kind.is_value_type(),
            TypeRef::Nullable(_) => true,
            other => self
                .find_ref(other)
                .is_some_and(|t| matches!(t.kind, TypeKind::Struct | TypeKind::Enum)),
        }
    }

    /// Whether `ty` derives from `System.Data.DataSet`
    #[must_use]
    pub fn is_dataset(&self, ty: &TypeRef) -> bool {
        if ty.well_known() == Some(WellKnown::DataSet) {
            return true;
        }
        self.find_ref(ty).is_some_and(|def| {
            self.supertypes(def)
                .into_iter()
                .any(|r| r.well_known() == Some(WellKnown::DataSet))
        })
    }

    /// Item shape of a collection-like type; `None` for non-collections
    ///
    /// Strings and XML nodes are never collections.
    #[must_use]
    pub fn collection_shape(&self, ty: &TypeRef) -> Option<CollectionShape> {
        let object = TypeRef::object;
        match ty.effective() {
            TypeRef::Array { element, .. } => {
                return Some(CollectionShape::Sequence {
                    element: (**element).clone(),
                })
            }
            TypeRef::Primitive(_) | TypeRef::Nullable(_) | TypeRef::ByRef(_) => return None,
            TypeRef::Named { .. } => {}
        }
        let args = ty.args();
        match ty.well_known() {
            Some(
                WellKnown::List | WellKnown::IList | WellKnown::ICollection | WellKnown::IEnumerable,
            ) => {
                return Some(CollectionShape::Sequence {
                    element: args.first().cloned().unwrap_or_else(object),
                })
            }
            Some(WellKnown::ArrayList) => return Some(CollectionShape::Sequence { element: object() }),
            Some(WellKnown::Dictionary | WellKnown::IDictionary) if args.len() == 2 => {
                return Some(CollectionShape::Map {
                    key: args[0].clone(),
                    value: args[1].clone(),
                })
            }
            Some(WellKnown::IDictionary | WellKnown::Hashtable) => {
                return Some(CollectionShape::Map {
                    key: object(),
                    value: object(),
                })
            }
            Some(_) => return None,
            None => {}
        }
        let def = self.find_ref(ty)?;
        let root = *self.ancestry(def).last()?;
        root.base.as_ref().and_then(|b| self.collection_shape(b))
    }

    /// Whether a compound value of `ty` can be read and written under `rules`
    #[must_use]
    pub fn is_serializable(&self, ty: &TypeRef, rules: MemberRules) -> bool {
        match ty.effective() {
            TypeRef::Primitive(_) => return true,
            TypeRef::Nullable(inner) => return self.is_serializable(inner, rules),
            TypeRef::Array { element, .. } => return self.is_serializable(element, rules),
            TypeRef::ByRef(_) => return false,
            TypeRef::Named { .. } => {}
        }
        if ty.well_known().is_some() || self.collection_shape(ty).is_some() {
            return true;
        }
        let Some(def) = self.find_ref(ty) else {
            return false;
        };
        if def.is_enum() {
            return true;
        }
        if def.is_interface() {
            return false;
        }
        match rules {
            MemberRules::DataContract => {
                def.data_contract().is_some()
                    || def.collection_contract().is_some()
                    || def.message_contract().is_some()
                    || def.is_serializable_marked()
                    || (def.is_public() && def.default_constructor)
            }
            MemberRules::XmlSerializer => {
                def.is_public() && (def.default_constructor || def.kind == TypeKind::Struct)
            }
        }
    }

    /// Members written on the wire under `rules`, base type members first
    #[must_use]
    pub fn serializable_members<'a>(&'a self, ty: &'a TypeDef, rules: MemberRules) -> Vec<&'a MemberDef> {
        let mut chain = self.ancestry(ty);
        chain.reverse();
        let mut out = Vec::new();
        for def in chain {
            match rules {
                MemberRules::DataContract => {
                    let mut members: Vec<&MemberDef> = if def.data_contract().is_some() {
                        def.members.iter().filter(|m| m.data_member.is_some()).collect()
                    } else if def.is_serializable_marked() {
                        def.members
                            .iter()
                            .filter(|m| m.kind == MemberKind::Field && !m.ignore)
                            .collect()
                    } else {
                        def.members
                            .iter()
                            .filter(|m| m.is_public_writable() && !m.ignore)
                            .collect()
                    };
                    if !def.is_serializable_marked() {
                        members.sort_by(|a, b| {
                            let order = |m: &MemberDef| {
                                m.data_member.as_ref().and_then(|d| d.order).unwrap_or(-1)
                            };
                            order(a)
                                .cmp(&order(b))
                                .then_with(|| a.wire_name(rules).cmp(b.wire_name(rules)))
                        });
                    }
                    out.extend(members);
                }
                MemberRules::XmlSerializer => out.extend(
                    def.members
                        .iter()
                        .filter(|m| m.is_public_writable() && !m.ignore),
                ),
            }
        }
        out
    }

    /// Type whose data contract name and namespace match
    #[must_use]
    pub fn find_by_contract_name(&self, namespace: Option<&str>, name: &str) -> Option<&TypeDef> {
        self.types().find(|t| {
            t.contract_name() == name && namespace.map_or(true, |ns| t.contract_namespace() == ns)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ty(s: &str) -> TypeRef {
        s.parse().unwrap()
    }

    fn sample() -> TypeRegistry {
        let mut contract = TypeDef::new("Calc", "ICalculator");
        contract.kind = TypeKind::Interface;
        contract.markers.push(Marker::ServiceContract(ServiceContractInfo::default()));

        let mut client = TypeDef::new("Calc", "CalculatorClient");
        client.base = Some(ty("System.ServiceModel.ClientBase<Calc.ICalculator>"));
        client.interfaces.push(ty("Calc.ICalculator"));

        let mut shape = TypeDef::new("Calc", "Shape");
        shape.markers.push(Marker::DataContract(DataContractInfo::default()));
        let mut area = MemberDef::new("Area", ty("double")).data_member();
        area.data_member = Some(DataMemberInfo { name: None, order: Some(2) });
        shape.members = vec![
            area,
            MemberDef::new("Name", ty("string")).data_member(),
            MemberDef::new("Cache", ty("string")),
        ];

        let mut circle = TypeDef::new("Calc", "Circle");
        circle.base = Some(ty("Calc.Shape"));
        circle.markers.push(Marker::DataContract(DataContractInfo {
            name: Some("Round".to_string()),
            namespace: None,
        }));
        circle.members = vec![MemberDef::new("Radius", ty("double")).data_member()];

        let mut tags = TypeDef::new("Calc", "TagList");
        tags.base = Some(ty("System.Collections.Generic.List<string>"));

        TypeRegistry::from_containers(vec![TypeContainer::new(
            "calc",
            vec![contract, client, shape, circle, tags],
        )])
    }

    #[test]
    fn find_by_full_or_simple_name() {
        let reg = sample();
        assert_eq!(reg.find("Calc.Circle").unwrap().name, "Circle");
        assert_eq!(reg.find("Circle").unwrap().name, "Circle");
        assert!(reg.find("Other.Circle").is_none());
    }

    #[test]
    fn implements_and_lifecycle() {
        let reg = sample();
        let contract = reg.find("Calc.ICalculator").unwrap();
        let client = reg.find("Calc.CalculatorClient").unwrap();
        assert!(reg.implements(client, contract));
        assert!(reg.implements(contract, contract));
        assert!(reg.has_lifecycle(client));
        assert!(!reg.has_lifecycle(reg.find("Calc.Circle").unwrap()));
    }

    #[test]
    fn lifecycle_by_members() {
        let mut proxy = TypeDef::new("X", "Proxy");
        proxy.methods = vec![
            MethodDef { name: "Open".into(), ..MethodDef::default() },
            MethodDef { name: "Close".into(), ..MethodDef::default() },
        ];
        proxy.members.push(MemberDef::new("State", ty("System.ServiceModel.CommunicationState")));
        let reg = TypeRegistry::from_containers(vec![TypeContainer::new("x", vec![proxy])]);
        assert!(reg.has_lifecycle(reg.find("X.Proxy").unwrap()));
    }

    #[test]
    fn assignability() {
        let reg = sample();
        assert!(reg.is_assignable(&ty("Calc.Circle"), &ty("Calc.Shape")));
        assert!(reg.is_assignable(&ty("Calc.Circle"), &ty("object")));
        assert!(!reg.is_assignable(&ty("Calc.Shape"), &ty("Calc.Circle")));
        assert!(reg.is_assignable(&ty("int"), &ty("int?")));
        assert!(reg.is_assignable(&ty("System.Collections.Generic.List<int>"), &ty("IList<int>")));
        assert!(reg.is_assignable(&ty("int[]"), &ty("IEnumerable<int>")));
        assert!(!reg.is_assignable(&ty("string[]"), &ty("IEnumerable<int>")));
    }

    #[test]
    fn data_contract_members_base_first_then_order() {
        let reg = sample();
        let circle = reg.find("Calc.Circle").unwrap();
        let names: Vec<&str> = reg
            .serializable_members(circle, MemberRules::DataContract)
            .into_iter()
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(names, vec!["Name", "Area", "Radius"]);
    }

    #[test]
    fn xml_serializer_members_in_declaration_order() {
        let reg = sample();
        let shape = reg.find("Calc.Shape").unwrap();
        let names: Vec<&str> = reg
            .serializable_members(shape, MemberRules::XmlSerializer)
            .into_iter()
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(names, vec!["Area", "Name", "Cache"]);
    }

    #[test]
    fn contract_names() {
        let reg = sample();
        let circle = reg.find("Calc.Circle").unwrap();
        assert_eq!(circle.contract_name(), "Round");
        assert_eq!(circle.contract_namespace(), "http://schemas.datacontract.org/2004/07/Calc");
        assert_eq!(
            reg.find_by_contract_name(Some("http://schemas.datacontract.org/2004/07/Calc"), "Round")
                .unwrap()
                .name,
            "Circle"
        );
    }

    #[test]
    fn collection_shapes() {
        let reg = sample();
        assert_eq!(
            reg.collection_shape(&ty("Calc.TagList")),
            Some(CollectionShape::Sequence { element: ty("string") })
        );
        assert_eq!(
            reg.collection_shape(&ty("System.Collections.Hashtable")),
            Some(CollectionShape::Map { key: ty("object"), value: ty("object") })
        );
        assert_eq!(reg.collection_shape(&ty("string")), None);
        assert_eq!(reg.collection_shape(&ty("Calc.Circle")), None);
    }

    #[test]
    fn load_skips_broken_containers() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("calc.json");
        std::fs::write(&good, r#"{"name":"calc","types":[{"name":"Circle","namespace":"Calc"}]}"#).unwrap();
        let yaml = dir.path().join("more.yaml");
        std::fs::write(&yaml, "name: more\ntypes:\n  - name: Square\n    namespace: Calc\n").unwrap();
        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{ not json").unwrap();
        let missing = dir.path().join("missing.json");

        let reg = TypeRegistry::load([&good, &bad, &yaml, &missing]);
        assert_eq!(reg.containers().len(), 2);
        assert_eq!(reg.skipped().len(), 2);
        assert!(reg.find("Calc.Square").is_some());
        assert!(reg.skipped()[0].reason.contains("bad.json"));
    }

    #[test]
    fn manifest_markers_deserialize() {
        let json = r#"{
            "name": "ICalculator", "namespace": "Calc", "kind": "interface",
            "markers": [{"kind": "service_contract", "namespace": ""}],
            "methods": [{
                "name": "Add",
                "parameters": [{"name": "a", "type": "int"}, {"name": "r", "type": "int&", "out": true}],
                "returns": "int",
                "markers": [{"kind": "operation_contract", "action": "urn:add"}]
            }]
        }"#;
        let def: TypeDef = serde_json::from_str(json).unwrap();
        assert_eq!(def.service_contract().unwrap().namespace.as_deref(), Some(""));
        let add = &def.methods[0];
        assert_eq!(add.operation().unwrap().action.as_deref(), Some("urn:add"));
        assert_eq!(add.parameters[1].direction(), Direction::Out);
        assert_eq!(add.parameters[1].effective_type(), &ty("int"));
    }
}
