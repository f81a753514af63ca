//! Resolved calls

use crate::resolver::{ContractMethod, ImplementingMethod};
use crate::strategy::SerializationStrategy;
use crate::typeref::TypeRef;
use crate::value::Value;
use chrono::{DateTime, Utc};

/// Parameter passing direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// By value
    In,
    /// Output only
    Out,
    /// By reference
    Ref,
}

/// One parameter value for a captured call
#[derive(Debug, Clone, PartialEq)]
pub struct CallParameterInfo {
    /// Formal parameter name
    pub name: String,
    /// Declared type (pointed-to type for by-reference parameters)
    pub declared_type: TypeRef,
    /// Passing direction
    pub direction: Direction,
    /// Captured value
    pub value: Value,
}

/// A captured call matched to its contract
#[derive(Debug, Clone)]
pub struct ResolvedCall<'r> {
    /// Wire action of the captured message
    pub action: String,
    /// Capture time, when the trace records one
    pub timestamp: Option<DateTime<Utc>>,
    /// Contract-level operation
    pub contract_method: ContractMethod<'r>,
    /// Proxy method to call; `None` means call through the contract only
    pub implementing_method: Option<ImplementingMethod<'r>>,
    /// Strategy the body was read with
    pub strategy: SerializationStrategy,
    /// Parameters in formal order
    pub parameters: Vec<CallParameterInfo>,
}
