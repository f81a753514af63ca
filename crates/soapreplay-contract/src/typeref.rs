//! Type references
//!
//! [`TypeRef`] names a type the way contract metadata writes it:
//! `int`, `System.String`, `Contoso.Order`, `List<Contoso.Line>`,
//! `int[]`, `double[,]`, `DateTime?`, `int&` (by-reference parameter).
//! Primitive aliases in any spelling normalise to [`TypeRef::Primitive`] and
//! `Nullable<T>` normalises to [`TypeRef::Nullable`].

use crate::error::ContractError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Built-in scalar types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveKind {
    /// `bool`
    Bool,
    /// `byte`
    Byte,
    /// `sbyte`
    SByte,
    /// `short`
    Int16,
    /// `ushort`
    UInt16,
    /// `int`
    Int32,
    /// `uint`
    UInt32,
    /// `long`
    Int64,
    /// `ulong`
    UInt64,
    /// `float`
    Single,
    /// `double`
    Double,
    /// `decimal`
    Decimal,
    /// `char`
    Char,
    /// `string`
    String,
    /// `System.DateTime`
    DateTime,
    /// `System.TimeSpan`
    TimeSpan,
    /// `System.Guid`
    Guid,
    /// `System.Xml.XmlQualifiedName`
    QName,
    /// `System.Uri`
    Uri,
}

impl PrimitiveKind {
    /// Every primitive kind
    pub const ALL: [Self; 19] = [
        Self::Bool,
        Self::Byte,
        Self::SByte,
        Self::Int16,
        Self::UInt16,
        Self::Int32,
        Self::UInt32,
        Self::Int64,
        Self::UInt64,
        Self::Single,
        Self::Double,
        Self::Decimal,
        Self::Char,
        Self::String,
        Self::DateTime,
        Self::TimeSpan,
        Self::Guid,
        Self::QName,
        Self::Uri,
    ];

    /// Name as printed in generated code
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Byte => "byte",
            Self::SByte => "sbyte",
            Self::Int16 => "short",
            Self::UInt16 => "ushort",
            Self::Int32 => "int",
            Self::UInt32 => "uint",
            Self::Int64 => "long",
            Self::UInt64 => "ulong",
            Self::Single => "float",
            Self::Double => "double",
            Self::Decimal => "decimal",
            Self::Char => "char",
            Self::String => "string",
            Self::DateTime => "System.DateTime",
            Self::TimeSpan => "System.TimeSpan",
            Self::Guid => "System.Guid",
            Self::QName => "System.Xml.XmlQualifiedName",
            Self::Uri => "System.Uri",
        }
    }

    /// Fully qualified framework name
    #[must_use]
    pub fn clr_name(self) -> &'static str {
        match self {
            Self::Bool => "System.Boolean",
            Self::Byte => "System.Byte",
            Self::SByte => "System.SByte",
            Self::Int16 => "System.Int16",
            Self::UInt16 => "System.UInt16",
            Self::Int32 => "System.Int32",
            Self::UInt32 => "System.UInt32",
            Self::Int64 => "System.Int64",
            Self::UInt64 => "System.UInt64",
            Self::Single => "System.Single",
            Self::Double => "System.Double",
            Self::Decimal => "System.Decimal",
            Self::Char => "System.Char",
            Self::String => "System.String",
            Self::DateTime => "System.DateTime",
            Self::TimeSpan => "System.TimeSpan",
            Self::Guid => "System.Guid",
            Self::QName => "System.Xml.XmlQualifiedName",
            Self::Uri => "System.Uri",
        }
    }

    /// Match a keyword, framework name or bare framework name
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| {
            let clr = kind.clr_name();
            name == kind.keyword()
                || name == clr
                || clr.rsplit('.').next().is_some_and(|simple| simple == name)
        })
    }

    /// Whether values of this kind can never be null
    #[inline]
    #[must_use]
    pub fn is_value_type(self) -> bool {
        !matches!(self, Self::String | Self::QName | Self::Uri)
    }

    /// Whether this kind is an integer type
    #[inline]
    #[must_use]
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            Self::Byte
                | Self::SByte
                | Self::Int16
                | Self::UInt16
                | Self::Int32
                | Self::UInt32
                | Self::Int64
                | Self::UInt64
        )
    }
}

/// Framework types the pipeline treats specially
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WellKnown {
    /// `System.Object`
    Object,
    /// `System.IO.Stream` and `MemoryStream`
    Stream,
    /// `System.Xml.XmlElement`
    XmlElement,
    /// `System.Xml.XmlNode`
    XmlNode,
    /// `System.Data.DataSet`
    DataSet,
    /// `System.Collections.Hashtable`
    Hashtable,
    /// `System.Collections.ArrayList`
    ArrayList,
    /// `List<T>`
    List,
    /// `IList` / `IList<T>`
    IList,
    /// `ICollection` / `ICollection<T>`
    ICollection,
    /// `IEnumerable` / `IEnumerable<T>`
    IEnumerable,
    /// `Dictionary<K, V>`
    Dictionary,
    /// `IDictionary` / `IDictionary<K, V>`
    IDictionary,
    /// `ClientBase<TContract>`
    ClientBase,
    /// `ICommunicationObject`
    ICommunicationObject,
}

const WELL_KNOWN: &[(&str, &str, WellKnown)] = &[
    ("System", "Object", WellKnown::Object),
    ("System.IO", "Stream", WellKnown::Stream),
    ("System.IO", "MemoryStream", WellKnown::Stream),
    ("System.Xml", "XmlElement", WellKnown::XmlElement),
    ("System.Xml", "XmlNode", WellKnown::XmlNode),
    ("System.Data", "DataSet", WellKnown::DataSet),
    ("System.Collections", "Hashtable", WellKnown::Hashtable),
    ("System.Collections", "ArrayList", WellKnown::ArrayList),
    ("System.Collections.Generic", "List", WellKnown::List),
    ("System.Collections.Generic", "IList", WellKnown::IList),
    ("System.Collections", "IList", WellKnown::IList),
    ("System.Collections.Generic", "ICollection", WellKnown::ICollection),
    ("System.Collections", "ICollection", WellKnown::ICollection),
    ("System.Collections.Generic", "IEnumerable", WellKnown::IEnumerable),
    ("System.Collections", "IEnumerable", WellKnown::IEnumerable),
    ("System.Collections.Generic", "Dictionary", WellKnown::Dictionary),
    ("System.Collections.Generic", "IDictionary", WellKnown::IDictionary),
    ("System.Collections", "IDictionary", WellKnown::IDictionary),
    ("System.ServiceModel", "ClientBase", WellKnown::ClientBase),
    ("System.ServiceModel", "ICommunicationObject", WellKnown::ICommunicationObject),
];

/// Reference to a type by name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TypeRef {
    /// Built-in scalar
    Primitive(PrimitiveKind),
    /// Named type with optional generic arguments
    Named {
        /// Dotted name as written
        name: String,
        /// Generic arguments
        args: Vec<TypeRef>,
    },
    /// Array of `rank` dimensions
    Array {
        /// Element type
        element: Box<TypeRef>,
        /// Number of dimensions
        rank: usize,
    },
    /// Nullable value type
    Nullable(Box<TypeRef>),
    /// By-reference (`ref`/`out`) parameter type
    ByRef(Box<TypeRef>),
}

impl TypeRef {
    /// Named non-generic type
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Named generic type
    #[must_use]
    pub fn generic(name: impl Into<String>, args: Vec<TypeRef>) -> Self {
        Self::Named {
            name: name.into(),
            args,
        }
    }

    /// Single-dimension array of `element`
    #[must_use]
    pub fn array_of(element: TypeRef) -> Self {
        Self::Array {
            element: Box::new(element),
            rank: 1,
        }
    }

    /// Nullable `inner`
    #[must_use]
    pub fn nullable(inner: TypeRef) -> Self {
        Self::Nullable(Box::new(inner))
    }

    /// `System.Object`
    #[must_use]
    pub fn object() -> Self {
        Self::named("object")
    }

    /// Name of a named type
    #[inline]
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Named { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Generic arguments of a named type
    #[inline]
    #[must_use]
    pub fn args(&self) -> &[TypeRef] {
        match self {
            Self::Named { args, .. } => args,
            _ => &[],
        }
    }

    /// Last segment of the name (`Order` for `Contoso.Order`)
    #[must_use]
    pub fn simple_name(&self) -> Option<&str> {
        self.name().map(simple_name)
    }

    /// Type with any by-reference marker removed
    #[must_use]
    pub fn effective(&self) -> &TypeRef {
        match self {
            Self::ByRef(inner) => inner.effective(),
            other => other,
        }
    }

    /// Primitive kind, looking through nothing
    #[inline]
    #[must_use]
    pub fn primitive(&self) -> Option<PrimitiveKind> {
        match self {
            Self::Primitive(kind) => Some(*kind),
            _ => None,
        }
    }

    /// Well-known framework type, if this is one
    #[must_use]
    pub fn well_known(&self) -> Option<WellKnown> {
        let Self::Named { name, args } = self else {
            return None;
        };
        if name == "object" {
            return Some(WellKnown::Object);
        }
        let found = WELL_KNOWN
            .iter()
            .find(|(ns, simple, _)| {
                name == simple
                    || name
                        .strip_prefix(ns)
                        .and_then(|rest| rest.strip_prefix('.'))
                        .is_some_and(|rest| rest == *simple)
            })
            .map(|(_, _, known)| *known)?;
        let arity_ok = match found {
            WellKnown::List | WellKnown::ClientBase => args.len() == 1,
            WellKnown::Dictionary => args.len() == 2,
            WellKnown::IList | WellKnown::ICollection | WellKnown::IEnumerable => args.len() <= 1,
            WellKnown::IDictionary => args.is_empty() || args.len() == 2,
            _ => args.is_empty(),
        };
        arity_ok.then_some(found)
    }

    /// Check for `System.Object`
    #[inline]
    #[must_use]
    pub fn is_object(&self) -> bool {
        self.well_known() == Some(WellKnown::Object)
    }

    /// Check for `string`
    #[inline]
    #[must_use]
    pub fn is_string(&self) -> bool {
        self.primitive() == Some(PrimitiveKind::String)
    }

    /// Check for a stream type
    #[inline]
    #[must_use]
    pub fn is_stream(&self) -> bool {
        self.effective().well_known() == Some(WellKnown::Stream)
    }

    /// Whether a `null` of this type is representable
    #[must_use]
    pub fn is_nullable_slot(&self) -> bool {
        match self {
            Self::Primitive(kind) => !kind.is_value_type(),
            Self::Nullable(_) | Self::Array { .. } | Self::Named { .. } => true,
            Self::ByRef(inner) => inner.is_nullable_slot(),
        }
    }

    /// Concrete collection type standing in for a collection interface
    ///
    /// `IList<T>`, `ICollection<T>` and `IEnumerable<T>` map to `List<T>`,
    /// `IDictionary<K, V>` to `Dictionary<K, V>`, and the non-generic
    /// interfaces to `ArrayList` / `Hashtable`. Other types map to `None`.
    #[must_use]
    pub fn concrete_collection(&self) -> Option<TypeRef> {
        let args = self.args().to_vec();
        match self.well_known()? {
            WellKnown::IList | WellKnown::ICollection | WellKnown::IEnumerable => {
                Some(if args.is_empty() {
                    Self::named("System.Collections.ArrayList")
                } else {
                    Self::generic("System.Collections.Generic.List", args)
                })
            }
            WellKnown::IDictionary => Some(if args.is_empty() {
                Self::named("System.Collections.Hashtable")
            } else {
                Self::generic("System.Collections.Generic.Dictionary", args)
            }),
            _ => None,
        }
    }

    /// Compare two references, letting an unqualified name match a
    /// qualified one with the same last segment
    #[must_use]
    pub fn same_type(&self, other: &TypeRef) -> bool {
        match (self, other) {
            (Self::Named { name: a, args: x }, Self::Named { name: b, args: y }) => {
                let names_match = a == b
                    || ((!a.contains('.') || !b.contains('.')) && simple_name(a) == simple_name(b));
                names_match
                    && x.len() == y.len()
                    && x.iter().zip(y).all(|(l, r)| l.same_type(r))
            }
            (Self::Array { element: a, rank: r }, Self::Array { element: b, rank: s }) => {
                r == s && a.same_type(b)
            }
            (Self::Nullable(a), Self::Nullable(b)) | (Self::ByRef(a), Self::ByRef(b)) => {
                a.same_type(b)
            }
            (a, b) => a == b,
        }
    }
}

/// Last segment of a dotted or nested (`+`) type name
#[must_use]
pub fn simple_name(name: &str) -> &str {
    name.rsplit(['.', '+']).next().unwrap_or(name)
}

impl Display for TypeRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(kind) => write!(f, "{}", kind.keyword()),
            Self::Named { name, args } => {
                write!(f, "{}", name)?;
                if !args.is_empty() {
                    write!(f, "<")?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", arg)?;
                    }
                    write!(f, ">")?;
                }
                Ok(())
            }
            Self::Array { element, rank } => {
                write!(f, "{}[{}]", element, ",".repeat(rank.saturating_sub(1)))
            }
            Self::Nullable(inner) => write!(f, "{}?", inner),
            Self::ByRef(inner) => write!(f, "{}&", inner),
        }
    }
}

impl FromStr for TypeRef {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parser = Parser { src: s, pos: 0 };
        let ty = parser
            .parse_type()
            .map_err(|reason| ContractError::invalid_type(s, reason))?;
        parser.skip_ws();
        if parser.pos != s.len() {
            return Err(ContractError::invalid_type(
                s,
                format!("unexpected '{}'", &s[parser.pos..]),
            ));
        }
        Ok(ty)
    }
}

impl TryFrom<String> for TypeRef {
    type Error = ContractError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TypeRef> for String {
    fn from(value: TypeRef) -> Self {
        value.to_string()
    }
}

impl From<PrimitiveKind> for TypeRef {
    fn from(kind: PrimitiveKind) -> Self {
        Self::Primitive(kind)
    }
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek().filter(|c| c.is_whitespace()) {
            self.pos += c.len_utf8();
        }
    }

    fn eat(&mut self, c: char) -> bool {
        self.skip_ws();
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> Result<(), String> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(format!("expected '{}' at offset {}", c, self.pos))
        }
    }

    fn name(&mut self) -> Result<&str, String> {
        self.skip_ws();
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || matches!(c, '_' | '.' | '+') {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        let name = &self.src[start..self.pos];
        if name.is_empty() || name.starts_with('.') || name.ends_with('.') || name.contains("..") {
            return Err(format!("expected a type name at offset {}", start));
        }
        Ok(name)
    }

    fn parse_type(&mut self) -> Result<TypeRef, String> {
        let name = self.name()?.to_string();
        let mut args = Vec::new();
        if self.eat('<') {
            args.push(self.parse_type()?);
            while self.eat(',') {
                args.push(self.parse_type()?);
            }
            self.expect('>')?;
        }

        let mut ty = if args.is_empty() {
            PrimitiveKind::from_name(&name).map_or_else(|| TypeRef::named(name.clone()), TypeRef::Primitive)
        } else if args.len() == 1 && (name == "Nullable" || name == "System.Nullable") {
            TypeRef::nullable(args.remove(0))
        } else {
            TypeRef::generic(name, args)
        };

        loop {
            if self.eat('[') {
                let mut rank = 1;
                while self.eat(',') {
                    rank += 1;
                }
                self.expect(']')?;
                ty = TypeRef::Array {
                    element: Box::new(ty),
                    rank,
                };
            } else if self.eat('?') {
                ty = TypeRef::nullable(ty);
            } else if self.eat('&') {
                ty = TypeRef::ByRef(Box::new(ty));
            } else {
                return Ok(ty);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> TypeRef {
        s.parse().unwrap()
    }

    #[test]
    fn primitive_aliases_normalise() {
        assert_eq!(parse("int"), TypeRef::Primitive(PrimitiveKind::Int32));
        assert_eq!(parse("System.Int32"), TypeRef::Primitive(PrimitiveKind::Int32));
        assert_eq!(parse("Int32"), TypeRef::Primitive(PrimitiveKind::Int32));
        assert_eq!(parse("Guid"), TypeRef::Primitive(PrimitiveKind::Guid));
        assert_eq!(parse("XmlQualifiedName"), TypeRef::Primitive(PrimitiveKind::QName));
    }

    #[test]
    fn generics_arrays_and_suffixes() {
        let ty = parse("System.Collections.Generic.Dictionary<string, Contoso.Order[]>");
        assert_eq!(ty.args().len(), 2);
        assert_eq!(ty.args()[1], TypeRef::array_of(TypeRef::named("Contoso.Order")));

        assert_eq!(
            parse("double[,]"),
            TypeRef::Array {
                element: Box::new(PrimitiveKind::Double.into()),
                rank: 2
            }
        );
        assert_eq!(parse("Nullable<int>"), parse("int?"));
        assert_eq!(parse("int&").effective(), &TypeRef::Primitive(PrimitiveKind::Int32));
    }

    #[test]
    fn display_reparses() {
        for s in ["int", "List<Contoso.Line>", "int[][]", "System.DateTime?", "string[,]&"] {
            let ty = parse(s);
            assert_eq!(parse(&ty.to_string()), ty, "{}", s);
        }
    }

    #[test]
    fn rejects_malformed_names() {
        for s in ["", "List<int", "a..b", "int]", "<int>"] {
            assert!(s.parse::<TypeRef>().is_err(), "{}", s);
        }
    }

    #[test]
    fn well_known_types() {
        assert_eq!(parse("object").well_known(), Some(WellKnown::Object));
        assert_eq!(parse("System.IO.Stream").well_known(), Some(WellKnown::Stream));
        assert_eq!(parse("IList<int>").well_known(), Some(WellKnown::IList));
        assert_eq!(parse("List").well_known(), None);
        assert_eq!(parse("Contoso.Stream").well_known(), None);
    }

    #[test]
    fn interfaces_map_to_concrete_collections() {
        assert_eq!(
            parse("IList<int>").concrete_collection(),
            Some(parse("System.Collections.Generic.List<int>"))
        );
        assert_eq!(
            parse("System.Collections.IDictionary").concrete_collection(),
            Some(parse("System.Collections.Hashtable"))
        );
        assert_eq!(parse("List<int>").concrete_collection(), None);
    }

    #[test]
    fn same_type_ignores_missing_namespace() {
        assert!(parse("Order").same_type(&parse("Contoso.Order")));
        assert!(!parse("Fabrikam.Order").same_type(&parse("Contoso.Order")));
        assert!(parse("List<Order>").same_type(&parse("List<Contoso.Order>")));
    }

    #[test]
    fn serde_as_string() {
        let ty: TypeRef = serde_json::from_str("\"List<int>\"").unwrap();
        assert_eq!(serde_json::to_string(&ty).unwrap(), "\"List<int>\"");
    }
}
