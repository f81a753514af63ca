//! Contract resolution
//!
//! Maps a wire action back to the contract operation that produces it, and
//! a contract operation to the proxy method that implements it.

use crate::registry::{MethodDef, TypeDef, TypeRegistry};
use crate::typeref::simple_name;

/// Namespace used by contracts that do not declare one
pub const DEFAULT_CONTRACT_NS: &str = "http://tempuri.org/";

/// Default action prefix of a contract
///
/// - no namespace: `http://tempuri.org/{name}/`
/// - explicit empty namespace: `urn:{name}/`
/// - otherwise: `{namespace}{name}/`, with a `/` inserted when the namespace
///   does not end in one
#[must_use]
pub fn action_prefix(name: &str, namespace: Option<&str>) -> String {
    match namespace {
        None => format!("{}{}/", DEFAULT_CONTRACT_NS, name),
        Some("") => format!("urn:{}/", name),
        Some(ns) if ns.ends_with('/') => format!("{}{}/", ns, name),
        Some(ns) => format!("{}/{}/", ns, name),
    }
}

/// Operation on a service contract
#[derive(Debug, Clone, Copy)]
pub struct ContractMethod<'r> {
    /// Declaring contract
    pub contract: &'r TypeDef,
    /// Operation method
    pub method: &'r MethodDef,
}

impl ContractMethod<'_> {
    /// Effective wire action
    #[must_use]
    pub fn action(&self) -> Option<String> {
        let prefix = contract_prefix(self.contract)?;
        operation_action(&prefix, self.method)
    }
}

/// Proxy method implementing a contract operation
#[derive(Debug, Clone, Copy)]
pub struct ImplementingMethod<'r> {
    /// Proxy type
    pub proxy: &'r TypeDef,
    /// Method on the proxy
    pub method: &'r MethodDef,
}

impl ImplementingMethod<'_> {
    /// Whether the method is an explicit interface implementation
    #[inline]
    #[must_use]
    pub fn is_explicit(&self) -> bool {
        self.method.explicit_interface
    }
}

/// Action prefix of a type, `None` unless it is a service contract
#[must_use]
pub fn contract_prefix(contract: &TypeDef) -> Option<String> {
    let info = contract.service_contract()?;
    let name = info.name.as_deref().unwrap_or(&contract.name);
    Some(action_prefix(name, info.namespace.as_deref()))
}

/// Action of an operation, `None` unless it is an operation contract
#[must_use]
pub fn operation_action(prefix: &str, method: &MethodDef) -> Option<String> {
    let op = method.operation()?;
    Some(match (&op.action, &op.name) {
        (Some(action), _) => action.clone(),
        (None, Some(name)) => format!("{}{}", prefix, name),
        (None, None) => format!("{}{}", prefix, method.name),
    })
}

/// Resolver over a registry's exported surface
#[derive(Debug, Clone, Copy)]
pub struct ContractResolver<'r> {
    registry: &'r TypeRegistry,
}

impl<'r> ContractResolver<'r> {
    /// Create resolver
    #[inline]
    #[must_use]
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self { registry }
    }

    /// Every exported operation with its action, in enumeration order
    pub fn operations(&self) -> impl Iterator<Item = (String, ContractMethod<'r>)> + 'r {
        self.registry.exported_types().flat_map(|contract| {
            let prefix = contract_prefix(contract);
            contract
                .methods
                .iter()
                .filter(|m| m.is_public())
                .filter_map(move |method| {
                    let action = operation_action(prefix.as_deref()?, method)?;
                    Some((action, ContractMethod { contract, method }))
                })
        })
    }

    /// Contract operation for a wire action
    ///
    /// The first exact match in enumeration order wins.
    #[must_use]
    pub fn resolve_action(&self, action: &str) -> Option<ContractMethod<'r>> {
        let found = self
            .operations()
            .find(|(candidate, _)| candidate == action)
            .map(|(_, method)| method);
        match &found {
            Some(m) => tracing::debug!(
                action,
                contract = %m.contract.full_name(),
                method = %m.method.name,
                "resolved action"
            ),
            None => tracing::debug!(action, "no contract operation for action"),
        }
        found
    }

    /// Proxy method implementing a contract operation
    ///
    /// A proxy is a non-interface type that implements the contract and has
    /// the connection lifecycle. The method is matched by name and parameter
    /// types, falling back to explicit implementations named
    /// `(Namespace.)*Contract.Method`.
    #[must_use]
    pub fn resolve_implementation(&self, target: &ContractMethod<'_>) -> Option<ImplementingMethod<'r>> {
        let proxies = self.registry.exported_types().filter(|t| {
            !t.is_interface()
                && self.registry.implements(t, target.contract)
                && self.registry.has_lifecycle(t)
        });
        for proxy in proxies {
            let direct = proxy.methods.iter().find(|m| {
                m.is_public()
                    && !m.explicit_interface
                    && m.name == target.method.name
                    && m.same_signature(target.method)
            });
            let explicit = || {
                proxy.methods.iter().find(|m| {
                    m.explicit_interface
                        && is_mangled_name(&m.name, target.contract, &target.method.name)
                        && m.same_signature(target.method)
                })
            };
            if let Some(method) = direct.or_else(explicit) {
                tracing::debug!(
                    proxy = %proxy.full_name(),
                    method = %method.name,
                    "resolved implementation"
                );
                return Some(ImplementingMethod { proxy, method });
            }
        }
        None
    }
}

/// Check `mangled` against `(Namespace.)*Contract.Method`
fn is_mangled_name(mangled: &str, contract: &TypeDef, method: &str) -> bool {
    let Some(qualifier) = mangled
        .strip_suffix(method)
        .and_then(|rest| rest.strip_suffix('.'))
    else {
        return false;
    };
    simple_name(qualifier) == simple_name(&contract.name)
        && format!(".{}", contract.full_name()).ends_with(&format!(".{}", qualifier))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{
        Marker, OperationContractInfo, ParameterDef, ServiceContractInfo, TypeContainer, TypeKind,
    };
    use proptest::prelude::*;

    fn op(name: &str, info: OperationContractInfo) -> MethodDef {
        MethodDef {
            name: name.to_string(),
            parameters: vec![
                ParameterDef::new("a", "int".parse().unwrap()),
                ParameterDef::new("b", "int".parse().unwrap()),
            ],
            returns: Some("int".parse().unwrap()),
            markers: vec![Marker::OperationContract(info)],
            ..MethodDef::default()
        }
    }

    fn contract(namespace: Option<&str>) -> TypeDef {
        let mut c = TypeDef::new("Calc", "IArithmetic");
        c.kind = TypeKind::Interface;
        c.markers.push(Marker::ServiceContract(ServiceContractInfo {
            name: Some("Arithmetic".to_string()),
            namespace: namespace.map(str::to_string),
        }));
        c.methods = vec![
            op("Add", OperationContractInfo::default()),
            op(
                "Subtract",
                OperationContractInfo {
                    name: Some("Minus".to_string()),
                    ..OperationContractInfo::default()
                },
            ),
            op(
                "Multiply",
                OperationContractInfo {
                    action: Some("urn:custom/Times".to_string()),
                    ..OperationContractInfo::default()
                },
            ),
        ];
        c
    }

    fn proxy(explicit: bool) -> TypeDef {
        let mut p = TypeDef::new("Calc", "ArithmeticClient");
        p.base = Some("System.ServiceModel.ClientBase<Calc.IArithmetic>".parse().unwrap());
        p.interfaces.push("Calc.IArithmetic".parse().unwrap());
        let mut add = op("Add", OperationContractInfo::default());
        add.markers.clear();
        if explicit {
            add.name = "Calc.IArithmetic.Add".to_string();
            add.explicit_interface = true;
            add.visibility = crate::registry::Visibility::Private;
        }
        p.methods.push(add);
        p
    }

    fn registry(types: Vec<TypeDef>) -> TypeRegistry {
        TypeRegistry::from_containers(vec![TypeContainer::new("calc", types)])
    }

    #[test]
    fn action_prefix_cases() {
        assert_eq!(action_prefix("Arithmetic", None), "http://tempuri.org/Arithmetic/");
        assert_eq!(action_prefix("Arithmetic", Some("")), "urn:Arithmetic/");
        assert_eq!(action_prefix("Arithmetic", Some("http://x/")), "http://x/Arithmetic/");
        assert_eq!(action_prefix("Arithmetic", Some("http://x")), "http://x/Arithmetic/");
    }

    #[test]
    fn resolves_default_named_and_explicit_actions() {
        let reg = registry(vec![contract(None)]);
        let resolver = ContractResolver::new(&reg);
        let add = resolver.resolve_action("http://tempuri.org/Arithmetic/Add").unwrap();
        assert_eq!(add.method.name, "Add");
        assert_eq!(add.action().as_deref(), Some("http://tempuri.org/Arithmetic/Add"));
        assert_eq!(
            resolver.resolve_action("http://tempuri.org/Arithmetic/Minus").unwrap().method.name,
            "Subtract"
        );
        assert_eq!(resolver.resolve_action("urn:custom/Times").unwrap().method.name, "Multiply");
        assert!(resolver.resolve_action("http://tempuri.org/Arithmetic/Subtract").is_none());
    }

    #[test]
    fn non_public_contracts_are_invisible() {
        let mut c = contract(Some(""));
        c.visibility = crate::registry::Visibility::Internal;
        let reg = registry(vec![c]);
        assert!(ContractResolver::new(&reg).resolve_action("urn:Arithmetic/Add").is_none());
    }

    #[test]
    fn first_match_wins() {
        let mut second = contract(None);
        second.name = "IArithmetic2".to_string();
        let reg = registry(vec![contract(None), second]);
        let found = ContractResolver::new(&reg)
            .resolve_action("http://tempuri.org/Arithmetic/Add")
            .unwrap();
        assert_eq!(found.contract.name, "IArithmetic");
    }

    #[test]
    fn resolves_direct_implementation() {
        let reg = registry(vec![contract(None), proxy(false)]);
        let resolver = ContractResolver::new(&reg);
        let add = resolver.resolve_action("http://tempuri.org/Arithmetic/Add").unwrap();
        let imp = resolver.resolve_implementation(&add).unwrap();
        assert_eq!(imp.proxy.name, "ArithmeticClient");
        assert!(!imp.is_explicit());
    }

    #[test]
    fn resolves_explicit_implementation() {
        let reg = registry(vec![contract(None), proxy(true)]);
        let resolver = ContractResolver::new(&reg);
        let add = resolver.resolve_action("http://tempuri.org/Arithmetic/Add").unwrap();
        let imp = resolver.resolve_implementation(&add).unwrap();
        assert!(imp.is_explicit());
        assert_eq!(imp.method.name, "Calc.IArithmetic.Add");
    }

    #[test]
    fn no_proxy_without_lifecycle() {
        let mut p = proxy(false);
        p.base = None;
        let reg = registry(vec![contract(None), p]);
        let resolver = ContractResolver::new(&reg);
        let add = resolver.resolve_action("http://tempuri.org/Arithmetic/Add").unwrap();
        assert!(resolver.resolve_implementation(&add).is_none());
    }

    #[test]
    fn mangled_names() {
        let c = contract(None);
        assert!(is_mangled_name("IArithmetic.Add", &c, "Add"));
        assert!(is_mangled_name("Calc.IArithmetic.Add", &c, "Add"));
        assert!(!is_mangled_name("Other.IArithmetic.Add", &c, "Add"));
        assert!(!is_mangled_name("Calc.IArithmetic.Sub", &c, "Add"));
    }

    proptest! {
        #[test]
        fn prefix_always_ends_with_name_and_slash(
            name in "[A-Z][a-z]{0,8}",
            ns in prop::option::of("(http://[a-z]{1,6}(/[a-z]{1,4})?/?)?"),
        ) {
            let prefix = action_prefix(&name, ns.as_deref());
            let suffix = format!("/{}/", name);
            let ends_correctly = prefix.ends_with(&suffix) || prefix == format!("urn:{}/", name);
            prop_assert!(ends_correctly);
            prop_assert!(!prefix.trim_start_matches("http://").contains("//"));
        }
    }
}
