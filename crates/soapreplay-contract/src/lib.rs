//! soapreplay contract model
//!
//! Loads service contract metadata from type containers, maps wire actions
//! back to contract operations and rebuilds call parameters from captured
//! request bodies.
//!
//! # Core Concepts
//!
//! - [`TypeRef`]: parsed type name (generics, arrays, nullables, by-ref)
//! - [`TypeRegistry`]: types from all loaded containers, with assignability
//!   and serialization queries
//! - [`ContractResolver`]: action to operation, operation to proxy method
//! - [`SerializationStrategy`]: body layout chosen per operation
//! - [`MessageDeserializer`]: request message to [`CallParameterInfo`]s
//! - [`Value`]: captured object graph carrying its runtime types
//!
//! # Example
//!
//! ```rust,ignore
//! use soapreplay_contract::{ContractResolver, MessageDeserializer, TypeRegistry};
//!
//! let registry = TypeRegistry::load(["contracts/calc.yaml"]);
//! let resolver = ContractResolver::new(&registry);
//! let add = resolver.resolve_action(message.action()).unwrap();
//! let params = MessageDeserializer::new(&registry).deserialize(&message, &add)?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod call;
mod deserialize;
mod error;
mod registry;
mod resolver;
mod strategy;
mod typeref;
mod value;

// Re-exports
pub use call::{CallParameterInfo, Direction, ResolvedCall};
pub use deserialize::{
    parse_primitive, schema_type, MessageDeserializer, DIFFGR_NS, MSDATA_NS, SERIALIZATION_NS,
    STREAM_ELEMENT, STREAM_PLACEHOLDER, XS_NS,
};
pub use error::{ContractError, DeserializeError};
pub use registry::{
    CollectionContractInfo, CollectionShape, DataContractInfo, DataMemberInfo, KnownTypeInfo,
    Marker, MemberDef, MemberKind, MessageContractInfo, MethodDef, OperationContractInfo,
    ParameterDef, ServiceContractInfo, SkippedContainer, TypeContainer, TypeDef, TypeKind,
    TypeRegistry, Visibility, XmlMemberInfo, DATA_CONTRACT_NS_PREFIX,
};
pub use resolver::{
    action_prefix, contract_prefix, operation_action, ContractMethod, ContractResolver,
    ImplementingMethod, DEFAULT_CONTRACT_NS,
};
pub use strategy::{MemberRules, SerializationStrategy};
pub use typeref::{simple_name, PrimitiveKind, TypeRef, WellKnown};
pub use value::{
    epoch, ticks_of, DataColumnValue, DataSetValue, DataTableValue, DateTimeKind, PrimitiveValue,
    Value, DEFAULT_DATASET_NAME, TICKS_PER_SECOND,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for common imports
pub mod prelude {
    pub use crate::{
        CallParameterInfo, ContractMethod, ContractResolver, Direction, MessageDeserializer,
        ResolvedCall, SerializationStrategy, TypeRef, TypeRegistry, Value,
    };
}
