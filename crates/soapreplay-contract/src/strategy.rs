//! Serialization strategy selection
//!
//! Each contract method is read with one of three conventions. The choice is
//! made from markers on the method and its declaring contract; a marker on
//! the method wins over one on the contract, and no marker at all means
//! data-contract style.

use crate::registry::{Marker, MethodDef, TypeDef, TypeRegistry};
use std::fmt::{self, Display, Formatter};

/// Member selection and naming rules for compound types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberRules {
    /// Data-contract members (opt-in, ordered)
    DataContract,
    /// XML-serializer members (public read/write, declaration order)
    XmlSerializer,
}

impl MemberRules {
    /// Label used in diagnostics
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::DataContract => "data contract",
            Self::XmlSerializer => "XML serializer",
        }
    }
}

/// How a method's request body is laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SerializationStrategy {
    /// One element per parameter, data-contract rules
    DataContract,
    /// One element per parameter inside the operation wrapper, XML-serializer rules
    XmlElement,
    /// The single parameter is a message contract covering the whole message
    MessageWrapper {
        /// Body members follow XML-serializer rules
        xml_members: bool,
    },
}

impl SerializationStrategy {
    /// Pick the strategy for `method` declared on `contract`
    #[must_use]
    pub fn select(registry: &TypeRegistry, contract: &TypeDef, method: &MethodDef) -> Self {
        let rules = format_marker(&method.markers).or_else(|| format_marker(&contract.markers));
        let xml_style = rules == Some(MemberRules::XmlSerializer);
        let wrapper = takes_message_wrapper(registry, method);

        match (xml_style, wrapper) {
            (true, true) => Self::MessageWrapper { xml_members: true },
            (true, false) => Self::XmlElement,
            (false, true) => Self::MessageWrapper { xml_members: false },
            (false, false) => Self::DataContract,
        }
    }

    /// Member rules for compound values read under this strategy
    #[must_use]
    pub fn member_rules(self) -> MemberRules {
        match self {
            Self::DataContract | Self::MessageWrapper { xml_members: false } => {
                MemberRules::DataContract
            }
            Self::XmlElement | Self::MessageWrapper { xml_members: true } => {
                MemberRules::XmlSerializer
            }
        }
    }
}

impl Display for SerializationStrategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::DataContract => write!(f, "data contract"),
            Self::XmlElement => write!(f, "XML element"),
            Self::MessageWrapper { .. } => write!(f, "message contract"),
        }
    }
}

fn format_marker(markers: &[Marker]) -> Option<MemberRules> {
    markers.iter().find_map(|m| match m {
        Marker::XmlSerializerFormat => Some(MemberRules::XmlSerializer),
        Marker::DataContractFormat => Some(MemberRules::DataContract),
        _ => None,
    })
}

/// Whether the method's only parameter is a message contract
fn takes_message_wrapper(registry: &TypeRegistry, method: &MethodDef) -> bool {
    match method.parameters.as_slice() {
        [only] => registry
            .find_ref(only.ty.effective())
            .is_some_and(|t| t.message_contract().is_some()),
        _ => false,
    }
}
