//! Owned XML element tree
//!
//! Messages are buffered as a small DOM so the body can be walked any number
//! of times. The tree keeps namespace declarations and prefixes so a subtree
//! can be written back out as a standalone fragment.

use crate::error::XmlError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{PrefixDeclaration, ResolveResult};
use quick_xml::NsReader;
use std::fmt;
use std::io::BufRead;

/// Namespace bound to the reserved `xml` prefix
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// XML Schema instance namespace (`xsi:type`, `xsi:nil`)
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Namespace-qualified name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    /// Namespace URI, `None` when unqualified
    pub namespace: Option<String>,
    /// Local part
    pub local: String,
}

impl QName {
    /// Create qualified name
    #[inline]
    #[must_use]
    pub fn new(namespace: Option<&str>, local: impl Into<String>) -> Self {
        Self {
            namespace: namespace.filter(|ns| !ns.is_empty()).map(str::to_string),
            local: local.into(),
        }
    }

    /// Check namespace and local name
    #[inline]
    #[must_use]
    pub fn is(&self, namespace: Option<&str>, local: &str) -> bool {
        self.local == local && self.namespace.as_deref() == namespace.filter(|ns| !ns.is_empty())
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{}}}{}", ns, self.local),
            None => write!(f, "{}", self.local),
        }
    }
}

/// `xmlns` / `xmlns:p` declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceDecl {
    /// Declared prefix (`None` for the default namespace)
    pub prefix: Option<String>,
    /// Bound URI (empty undeclares the default namespace)
    pub uri: String,
}

/// Attribute with resolved name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlAttribute {
    /// Prefix as written
    pub prefix: Option<String>,
    /// Resolved name
    pub name: QName,
    /// Unescaped value
    pub value: String,
}

/// Child node
#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    /// Nested element
    Element(XmlElement),
    /// Character data (text or CDATA)
    Text(String),
}

/// Element with its attributes and children
#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    prefix: Option<String>,
    name: QName,
    namespace_decls: Vec<NamespaceDecl>,
    attributes: Vec<XmlAttribute>,
    children: Vec<XmlNode>,
}

impl XmlElement {
    /// Create empty element
    #[must_use]
    pub fn new(namespace: Option<&str>, local: impl Into<String>) -> Self {
        Self {
            prefix: None,
            name: QName::new(namespace, local),
            namespace_decls: Vec::new(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder: set text content
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlNode::Text(text.into()));
        self
    }

    /// Builder: add child element
    #[must_use]
    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    /// Builder: add unqualified attribute
    #[must_use]
    pub fn with_attribute(mut self, local: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(XmlAttribute {
            prefix: None,
            name: QName::new(None, local),
            value: value.into(),
        });
        self
    }

    /// Parse a single-rooted document from a string
    pub fn parse_str(xml: &str) -> Result<Self, XmlError> {
        let mut reader = NsReader::from_str(xml);
        let mut buf = Vec::new();
        Self::read_next(&mut reader, &mut buf)?.ok_or(XmlError::NoRootElement)
    }

    /// Read the next top-level element from a reader
    ///
    /// Skips declarations, comments and whitespace. Returns `Ok(None)` at end
    /// of input. The reader is left positioned immediately after the closing
    /// tag of the element that was read.
    pub fn read_next<R: BufRead>(
        reader: &mut NsReader<R>,
        buf: &mut Vec<u8>,
    ) -> Result<Option<Self>, XmlError> {
        loop {
            buf.clear();
            match reader.read_event_into(buf)? {
                Event::Start(start) => {
                    let element = Self::from_start(reader, &start)?;
                    return Self::read_children(reader, element).map(Some);
                }
                Event::Empty(start) => return Self::from_start(reader, &start).map(Some),
                Event::Text(text) => {
                    let text = text.unescape()?;
                    if !text.trim().is_empty() {
                        return Err(XmlError::StrayText(text.trim().to_string()));
                    }
                }
                Event::End(end) => {
                    return Err(XmlError::StrayEndTag(
                        String::from_utf8_lossy(end.name().as_ref()).into_owned(),
                    ))
                }
                Event::Eof => return Ok(None),
                _ => {}
            }
        }
    }

    fn from_start<R>(reader: &NsReader<R>, start: &BytesStart<'_>) -> Result<Self, XmlError> {
        let (ns, local) = reader.resolve_element(start.name());
        let mut element = Self {
            prefix: start.name().prefix().map(|p| utf8(p.as_ref())),
            name: QName {
                namespace: namespace_of(ns)?,
                local: utf8(local.as_ref()),
            },
            namespace_decls: Vec::new(),
            attributes: Vec::new(),
            children: Vec::new(),
        };

        for attr in start.attributes() {
            let attr = attr?;
            let value = attr.unescape_value()?.into_owned();
            if let Some(binding) = attr.key.as_namespace_binding() {
                let prefix = match binding {
                    PrefixDeclaration::Default => None,
                    PrefixDeclaration::Named(p) => Some(utf8(p)),
                };
                element.namespace_decls.push(NamespaceDecl { prefix, uri: value });
                continue;
            }
            let (ns, local) = reader.resolve_attribute(attr.key);
            element.attributes.push(XmlAttribute {
                prefix: attr.key.prefix().map(|p| utf8(p.as_ref())),
                name: QName {
                    namespace: namespace_of(ns)?,
                    local: utf8(local.as_ref()),
                },
                value,
            });
        }
        Ok(element)
    }

    fn read_children<R: BufRead>(
        reader: &mut NsReader<R>,
        mut element: Self,
    ) -> Result<Self, XmlError> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_event_into(&mut buf)? {
                Event::Start(start) => {
                    let child = Self::from_start(reader, &start)?;
                    let child = Self::read_children(reader, child)?;
                    element.children.push(XmlNode::Element(child));
                }
                Event::Empty(start) => {
                    let child = Self::from_start(reader, &start)?;
                    element.children.push(XmlNode::Element(child));
                }
                Event::Text(text) => {
                    let text = text.unescape()?;
                    if !text.is_empty() {
                        element.children.push(XmlNode::Text(text.into_owned()));
                    }
                }
                Event::CData(data) => {
                    element
                        .children
                        .push(XmlNode::Text(utf8(&data.into_inner())));
                }
                Event::End(_) => return Ok(element),
                Event::Eof => return Err(XmlError::UnexpectedEof(element.name.local)),
                _ => {}
            }
        }
    }

    /// Resolved name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &QName {
        &self.name
    }

    /// Local name
    #[inline]
    #[must_use]
    pub fn local_name(&self) -> &str {
        &self.name.local
    }

    /// Namespace URI
    #[inline]
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.name.namespace.as_deref()
    }

    /// Prefix as written
    #[inline]
    #[must_use]
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Check namespace and local name
    #[inline]
    #[must_use]
    pub fn is(&self, namespace: Option<&str>, local: &str) -> bool {
        self.name.is(namespace, local)
    }

    /// Namespace declarations made on this element
    #[inline]
    #[must_use]
    pub fn namespace_decls(&self) -> &[NamespaceDecl] {
        &self.namespace_decls
    }

    /// Attributes (namespace declarations excluded)
    #[inline]
    #[must_use]
    pub fn attributes(&self) -> &[XmlAttribute] {
        &self.attributes
    }

    /// Unqualified attribute value
    #[must_use]
    pub fn attribute(&self, local: &str) -> Option<&str> {
        self.attribute_ns(None, local)
    }

    /// Qualified attribute value
    #[must_use]
    pub fn attribute_ns(&self, namespace: Option<&str>, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.is(namespace, local))
            .map(|a| a.value.as_str())
    }

    /// All child nodes
    #[inline]
    #[must_use]
    pub fn children(&self) -> &[XmlNode] {
        &self.children
    }

    /// Child elements in document order
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|c| match c {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }

    /// Mutable child elements
    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut XmlElement> {
        self.children.iter_mut().filter_map(|c| match c {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }

    /// First child element
    #[must_use]
    pub fn first_element(&self) -> Option<&XmlElement> {
        self.elements().next()
    }

    /// First child element with the given name
    #[must_use]
    pub fn child(&self, namespace: Option<&str>, local: &str) -> Option<&XmlElement> {
        self.elements().find(|e| e.is(namespace, local))
    }

    /// First child element with the given local name in any namespace
    #[must_use]
    pub fn child_local(&self, local: &str) -> Option<&XmlElement> {
        self.elements().find(|e| e.local_name() == local)
    }

    /// Whether the element has child elements
    #[must_use]
    pub fn has_elements(&self) -> bool {
        self.elements().next().is_some()
    }

    /// Concatenated direct text content
    #[must_use]
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|c| match c {
                XmlNode::Text(t) => Some(t.as_str()),
                XmlNode::Element(_) => None,
            })
            .collect()
    }

    /// Replace all children with a single text node
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children = vec![XmlNode::Text(text.into())];
    }

    /// Append child element
    pub fn push_child(&mut self, child: XmlElement) {
        self.children.push(XmlNode::Element(child));
    }

    /// Take ownership of the first child element
    #[must_use]
    pub fn into_first_element(self) -> Option<XmlElement> {
        self.children.into_iter().find_map(|c| match c {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }

    /// Take ownership of the first descendant (or self) with the given name
    ///
    /// Breadth-first, so a shallow match wins over a deeper one.
    #[must_use]
    pub fn into_descendant(self, namespace: Option<&str>, local: &str) -> Option<XmlElement> {
        let mut queue = std::collections::VecDeque::from([self]);
        while let Some(element) = queue.pop_front() {
            if element.is(namespace, local) {
                return Some(element);
            }
            for child in element.children {
                if let XmlNode::Element(e) = child {
                    queue.push_back(e);
                }
            }
        }
        None
    }

    /// Serialize as a standalone fragment
    ///
    /// Namespace bindings inherited from ancestors are re-declared on the
    /// outermost element that needs them.
    #[must_use]
    pub fn to_xml_string(&self) -> String {
        let mut out = String::new();
        let mut scope = NamespaceScope::new();
        self.write_into(&mut out, &mut scope);
        out
    }

    fn write_into(&self, out: &mut String, scope: &mut NamespaceScope) {
        let mark = scope.depth();
        let mut decls = self.namespace_decls.clone();
        ensure_bound(&mut decls, scope, self.prefix.as_deref(), self.namespace());
        for attr in &self.attributes {
            if attr.name.namespace.is_some() {
                ensure_bound(
                    &mut decls,
                    scope,
                    attr.prefix.as_deref(),
                    attr.name.namespace.as_deref(),
                );
            }
        }
        scope.push_decls(&decls);

        let tag = qualified(self.prefix.as_deref(), &self.name.local);
        out.push('<');
        out.push_str(&tag);
        for decl in &decls {
            match &decl.prefix {
                Some(p) => out.push_str(&format!(" xmlns:{}=\"", p)),
                None => out.push_str(" xmlns=\""),
            }
            out.push_str(&quick_xml::escape::escape(decl.uri.as_str()));
            out.push('"');
        }
        for attr in &self.attributes {
            out.push(' ');
            out.push_str(&qualified(attr.prefix.as_deref(), &attr.name.local));
            out.push_str("=\"");
            out.push_str(&quick_xml::escape::escape(attr.value.as_str()));
            out.push('"');
        }

        if self.children.is_empty() {
            out.push_str(" />");
        } else {
            out.push('>');
            for child in &self.children {
                match child {
                    XmlNode::Element(e) => e.write_into(out, scope),
                    XmlNode::Text(t) => out.push_str(&quick_xml::escape::escape(t.as_str())),
                }
            }
            out.push_str("</");
            out.push_str(&tag);
            out.push('>');
        }
        scope.truncate(mark);
    }
}

impl fmt::Display for XmlElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_xml_string())
    }
}

/// Stack of in-scope namespace bindings
///
/// Used to resolve prefixes that appear inside attribute values
/// (e.g. `xsi:type="b:Circle"`) while walking a tree top-down.
#[derive(Debug, Clone, Default)]
pub struct NamespaceScope {
    bindings: Vec<NamespaceDecl>,
}

impl NamespaceScope {
    /// Create empty scope
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current stack depth (for [`truncate`](Self::truncate))
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.bindings.len()
    }

    /// Push the declarations made on `element`, returning the previous depth
    pub fn enter(&mut self, element: &XmlElement) -> usize {
        let mark = self.depth();
        self.push_decls(element.namespace_decls());
        mark
    }

    /// Push declarations
    pub fn push_decls(&mut self, decls: &[NamespaceDecl]) {
        self.bindings.extend(decls.iter().cloned());
    }

    /// Drop bindings above `depth`
    #[inline]
    pub fn truncate(&mut self, depth: usize) {
        self.bindings.truncate(depth);
    }

    /// Resolve a prefix (`None` = default namespace)
    #[must_use]
    pub fn resolve(&self, prefix: Option<&str>) -> Option<&str> {
        if prefix == Some("xml") {
            return Some(XML_NS);
        }
        self.bindings
            .iter()
            .rev()
            .find(|d| d.prefix.as_deref() == prefix)
            .map(|d| d.uri.as_str())
            .filter(|uri| !uri.is_empty())
    }

    /// Resolve a `prefix:local` string value into a qualified name
    #[must_use]
    pub fn resolve_qname(&self, value: &str) -> QName {
        let value = value.trim();
        match value.split_once(':') {
            Some((prefix, local)) => QName::new(self.resolve(Some(prefix)), local),
            None => QName::new(self.resolve(None), value),
        }
    }
}

fn ensure_bound(
    decls: &mut Vec<NamespaceDecl>,
    scope: &NamespaceScope,
    prefix: Option<&str>,
    namespace: Option<&str>,
) {
    if prefix == Some("xml") {
        return;
    }
    let bound = decls
        .iter()
        .rev()
        .find(|d| d.prefix.as_deref() == prefix)
        .map(|d| d.uri.as_str())
        .filter(|uri| !uri.is_empty())
        .or_else(|| scope.resolve(prefix));
    if bound == namespace {
        return;
    }
    match namespace {
        Some(uri) => decls.push(NamespaceDecl {
            prefix: prefix.map(str::to_string),
            uri: uri.to_string(),
        }),
        None if prefix.is_none() => decls.push(NamespaceDecl {
            prefix: None,
            uri: String::new(),
        }),
        None => {}
    }
}

fn qualified(prefix: Option<&str>, local: &str) -> String {
    match prefix {
        Some(p) => format!("{}:{}", p, local),
        None => local.to_string(),
    }
}

fn namespace_of(result: ResolveResult<'_>) -> Result<Option<String>, XmlError> {
    match result {
        ResolveResult::Bound(ns) => Ok(Some(utf8(ns.as_ref())).filter(|s| !s.is_empty())),
        ResolveResult::Unbound => Ok(None),
        ResolveResult::Unknown(prefix) => Err(XmlError::UnknownPrefix(utf8(&prefix))),
    }
}

fn utf8(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
