//! Scenario assembly
//!
//! [`ScenarioCodeEmitter`] turns resolved calls into one private method each
//! and collects them into two compilation units:
//!
//! - the primary unit: test class, proxy tables, the aggregate scenario
//!   method and the call methods
//! - the stub unit: per-thread proxy accessors and customisation hooks
//!
//! Both units declare the same partial class.

use crate::ast::{
    Access, Arg, BinaryOp, ClassDecl, CompilationUnit, Expr, FieldDecl, Member, MethodDecl, Param,
    PassMode, PropertyDecl, Stmt,
};
use crate::context::GenContext;
use crate::error::CodegenError;
use crate::object_graph::ObjectGraphCodeGenerator;
use crate::printer::CodePrinter;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use soapreplay_contract::{simple_name, Direction, PrimitiveKind, ResolvedCall, TypeRef, TypeRegistry};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

const TEST_NAMESPACE: &str = "Microsoft.VisualStudio.TestTools.UnitTesting";
const COMMUNICATION_OBJECT: &str = "System.ServiceModel.ICommunicationObject";
const FAULTED: &str = "Faulted";

/// Output shape of a generated scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioOptions {
    /// Namespace of the generated class
    pub namespace: String,
    /// Name of the generated partial class
    pub class_name: String,
    /// Name of the aggregate test method
    pub scenario_method: String,
    /// Wrap each call in a named timer
    pub timers: bool,
    /// Call a customisation hook before each call
    pub customise: bool,
}

impl Default for ScenarioOptions {
    fn default() -> Self {
        Self {
            namespace: "ReplayTests".to_string(),
            class_name: "ReplayScenario".to_string(),
            scenario_method: "RunScenario".to_string(),
            timers: true,
            customise: true,
        }
    }
}

/// How a proxy instance is created
#[derive(Debug, Clone, PartialEq, Eq)]
enum ProxyKind {
    /// Concrete proxy class with a default constructor
    Class,
    /// Channel created from the contract alone
    Channel,
}

#[derive(Debug, Clone)]
struct ProxySlot {
    ty: TypeRef,
    kind: ProxyKind,
    table: String,
    getter: String,
}

#[derive(Debug)]
struct CallMethod {
    method: MethodDecl,
    hook: Option<MethodDecl>,
}

/// The two generated units, before printing
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedScenario {
    /// Test class with the scenario and call methods
    pub primary: CompilationUnit,
    /// Proxy harness and customisation hooks
    pub stubs: CompilationUnit,
}

/// Printed units
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedScenario {
    /// Primary unit source
    pub primary: String,
    /// Stub unit source
    pub stubs: String,
}

impl GeneratedScenario {
    /// Print both units
    #[must_use]
    pub fn render(&self, printer: &dyn CodePrinter) -> RenderedScenario {
        RenderedScenario {
            primary: printer.print_unit(&self.primary),
            stubs: printer.print_unit(&self.stubs),
        }
    }
}

/// Builds one scenario from resolved calls, in trace order
#[derive(Debug)]
pub struct ScenarioCodeEmitter<'r> {
    registry: &'r TypeRegistry,
    options: ScenarioOptions,
    ctx: GenContext,
    calls: Vec<CallMethod>,
    name_counts: HashMap<String, usize>,
    issued: HashSet<String>,
    proxies: IndexMap<String, ProxySlot>,
}

impl<'r> ScenarioCodeEmitter<'r> {
    /// Create emitter
    #[must_use]
    pub fn new(registry: &'r TypeRegistry, options: ScenarioOptions) -> Self {
        Self::with_context(registry, options, GenContext::new())
    }

    /// Create emitter over an existing context
    #[must_use]
    pub fn with_context(registry: &'r TypeRegistry, options: ScenarioOptions, ctx: GenContext) -> Self {
        Self {
            registry,
            options,
            ctx,
            calls: Vec::new(),
            name_counts: HashMap::new(),
            issued: HashSet::new(),
            proxies: IndexMap::new(),
        }
    }

    /// Options in effect
    #[inline]
    #[must_use]
    pub fn options(&self) -> &ScenarioOptions {
        &self.options
    }

    /// Number of call methods generated so far
    #[inline]
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.len()
    }

    /// Generate the method for one call and return its name
    ///
    /// Repeated operation names get a numeric suffix from the second
    /// occurrence on (`Add`, `Add2`, ...). A suffix already issued to
    /// another method is skipped.
    pub fn add_call(&mut self, call: &ResolvedCall<'_>) -> Result<String, CodegenError> {
        let operation = call.contract_method.method.name.clone();
        let mut occurrence = self.name_counts.get(&operation).copied().unwrap_or(0) + 1;
        let name = loop {
            let candidate = if occurrence == 1 {
                operation.clone()
            } else {
                format!("{}{}", operation, occurrence)
            };
            if !self.issued.contains(&candidate) && candidate != self.options.scenario_method {
                break candidate;
            }
            occurrence += 1;
        };

        let proxy = self.proxy_slot(call);
        self.ctx.push_sink();
        let built = self.call_body(call, &name, &proxy);
        let body = self.ctx.pop_sink();
        built?;

        let mut method = MethodDecl::new(&name);
        method.returns = call.contract_method.method.returns.clone();
        method.body = body;
        let hook = self.options.customise.then(|| hook_stub(&name, call));

        self.name_counts.insert(operation, occurrence);
        self.issued.insert(name.clone());
        self.calls.push(CallMethod { method, hook });
        info!(method = %name, action = %call.action, strategy = %call.strategy, "generated call");
        Ok(name)
    }

    fn proxy_slot(&mut self, call: &ResolvedCall<'_>) -> ProxySlot {
        let (ty, kind) = match &call.implementing_method {
            Some(im) => (im.proxy.type_ref(), ProxyKind::Class),
            None => (call.contract_method.contract.type_ref(), ProxyKind::Channel),
        };
        let key = ty.to_string();
        if let Some(slot) = self.proxies.get(&key) {
            return slot.clone();
        }
        let simple = ty.simple_name().unwrap_or("Proxy").to_string();
        let clashes = self
            .proxies
            .values()
            .filter(|p| p.ty.simple_name() == Some(simple.as_str()))
            .count();
        let stem = if clashes == 0 {
            simple
        } else {
            format!("{}{}", simple, clashes + 1)
        };
        let slot = ProxySlot {
            ty,
            kind,
            table: format!("{}Proxies", lower_first(&stem)),
            getter: format!("Get{}", stem),
        };
        debug!(proxy = %key, getter = %slot.getter, "new proxy type");
        self.proxies.insert(key, slot.clone());
        slot
    }

    fn call_body(&mut self, call: &ResolvedCall<'_>, name: &str, proxy: &ProxySlot) -> Result<(), CodegenError> {
        let generator = ObjectGraphCodeGenerator::new(self.registry, call.strategy.member_rules());
        let ctx = &mut self.ctx;
        ctx.begin_method(call.parameters.iter().map(|p| p.name.clone()));

        for param in &call.parameters {
            if param.direction == Direction::Out {
                ctx.emit(Stmt::Declare {
                    ty: param.declared_type.clone(),
                    name: param.name.clone(),
                    init: None,
                });
            } else {
                generator.declare(ctx, &param.name, &param.declared_type, &param.value)?;
            }
        }

        if self.options.customise {
            let args = call
                .parameters
                .iter()
                .filter(|p| p.direction != Direction::Out)
                .map(|p| Arg {
                    mode: PassMode::Ref,
                    expr: Expr::var(&p.name),
                })
                .collect();
            ctx.emit(Stmt::Expr(Expr::This.call_with(format!("Customise{}", name), args)));
        }

        let proxy_var = ctx.local_name("proxy");
        ctx.emit(Stmt::Declare {
            ty: proxy.ty.clone(),
            name: proxy_var.clone(),
            init: Some(Expr::This.call(&proxy.getter, vec![])),
        });

        let receiver = match &call.implementing_method {
            Some(im) if im.is_explicit() => Expr::Cast {
                ty: call.contract_method.contract.type_ref(),
                expr: Box::new(Expr::var(&proxy_var)),
            },
            _ => Expr::var(&proxy_var),
        };
        let args = call
            .parameters
            .iter()
            .map(|p| Arg {
                mode: match p.direction {
                    Direction::In => PassMode::Value,
                    Direction::Out => PassMode::Out,
                    Direction::Ref => PassMode::Ref,
                },
                expr: Expr::var(&p.name),
            })
            .collect();
        let invocation = receiver.call_with(&call.contract_method.method.name, args);
        let returns = call.contract_method.method.returns.clone();

        if !self.options.timers {
            ctx.emit(match returns {
                Some(_) => Stmt::Return(Some(invocation)),
                None => Stmt::Expr(invocation),
            });
            return Ok(());
        }

        let timer = |method: &str| {
            Stmt::Expr(Expr::This.member("TestContext").call(method, vec![Expr::string(name)]))
        };
        let (result, protected) = match &returns {
            Some(ty) => {
                let result = ctx.local_name("result");
                ctx.emit(Stmt::Declare {
                    ty: ty.clone(),
                    name: result.clone(),
                    init: None,
                });
                let assign = Stmt::Assign {
                    target: Expr::var(&result),
                    value: invocation,
                };
                (Some(result), assign)
            }
            None => (None, Stmt::Expr(invocation)),
        };
        ctx.emit(timer("BeginTimer"));
        ctx.emit(Stmt::TryFinally {
            body: vec![protected],
            finally: vec![timer("EndTimer")],
        });
        if let Some(result) = result {
            ctx.emit(Stmt::Return(Some(Expr::var(result))));
        }
        Ok(())
    }

    /// Assemble both units
    #[must_use]
    pub fn finish(self) -> GeneratedScenario {
        let options = &self.options;
        let mut primary_members = vec![Member::Property(PropertyDecl {
            access: Access::Public,
            ty: TypeRef::named("TestContext"),
            name: "TestContext".to_string(),
        })];
        for slot in self.proxies.values() {
            let table = table_type(&slot.ty);
            primary_members.push(Member::Field(FieldDecl {
                access: Access::Private,
                is_static: true,
                ty: table.clone(),
                name: slot.table.clone(),
                init: Some(Expr::new_object(table, vec![])),
            }));
        }

        let mut scenario = MethodDecl::new(&options.scenario_method);
        scenario.access = Access::Public;
        scenario.attributes.push("TestMethod".to_string());
        scenario.body = self
            .calls
            .iter()
            .map(|c| Stmt::Expr(Expr::This.call(&c.method.name, vec![])))
            .collect();
        primary_members.push(Member::Method(scenario));

        let mut stub_members: Vec<Member> = self
            .proxies
            .values()
            .map(|slot| Member::Method(proxy_getter(slot)))
            .collect();
        for call in self.calls {
            primary_members.push(Member::Method(call.method));
            if let Some(hook) = call.hook {
                stub_members.push(Member::Method(hook));
            }
        }

        let class = |attributes: Vec<String>, members: Vec<Member>| ClassDecl {
            attributes,
            access: Access::Public,
            is_partial: true,
            name: options.class_name.clone(),
            members,
        };
        GeneratedScenario {
            primary: CompilationUnit {
                header: vec![
                    format!("Replay scenario generated by soapreplay {}.", crate::VERSION),
                    "Changes to this file are lost when it is regenerated.".to_string(),
                ],
                usings: vec!["System".to_string(), TEST_NAMESPACE.to_string()],
                namespace: options.namespace.clone(),
                classes: vec![class(vec!["TestClass".to_string()], primary_members)],
            },
            stubs: CompilationUnit {
                header: vec![format!(
                    "Proxy harness and customisation hooks for {}.",
                    options.class_name
                )],
                usings: vec!["System".to_string()],
                namespace: options.namespace.clone(),
                classes: vec![class(Vec::new(), stub_members)],
            },
        }
    }
}

/// `Dictionary<int, TProxy>` keyed by managed thread id
fn table_type(proxy: &TypeRef) -> TypeRef {
    TypeRef::generic(
        "System.Collections.Generic.Dictionary",
        vec![TypeRef::Primitive(PrimitiveKind::Int32), proxy.clone()],
    )
}

/// Per-thread accessor that recreates absent or faulted proxies under a lock
fn proxy_getter(slot: &ProxySlot) -> MethodDecl {
    let table = || Expr::var(&slot.table);
    let proxy = || Expr::var("proxy");
    let communication = || match slot.kind {
        ProxyKind::Class => proxy(),
        ProxyKind::Channel => Expr::Cast {
            ty: TypeRef::named(COMMUNICATION_OBJECT),
            expr: Box::new(proxy()),
        },
    };
    let create = match slot.kind {
        ProxyKind::Class => Expr::new_object(slot.ty.clone(), vec![]),
        ProxyKind::Channel => Expr::new_object(
            TypeRef::generic("System.ServiceModel.ChannelFactory", vec![slot.ty.clone()]),
            vec![Expr::string("*")],
        )
        .call("CreateChannel", vec![]),
    };

    let found = table().call_with(
        "TryGetValue",
        vec![
            Arg::value(Expr::var("threadId")),
            Arg {
                mode: PassMode::Out,
                expr: proxy(),
            },
        ],
    );
    let faulted = Expr::binary(
        BinaryOp::Eq,
        communication().member("State"),
        Expr::static_member("System.ServiceModel.CommunicationState", FAULTED),
    );
    let recreate = vec![
        Stmt::If {
            cond: Expr::binary(BinaryOp::NotEq, proxy(), Expr::null()),
            then: vec![Stmt::Expr(communication().call("Abort", vec![]))],
            otherwise: Vec::new(),
        },
        Stmt::Assign {
            target: proxy(),
            value: create,
        },
        Stmt::Assign {
            target: Expr::Index {
                target: Box::new(table()),
                index: vec![Expr::var("threadId")],
            },
            value: proxy(),
        },
    ];

    let mut method = MethodDecl::new(&slot.getter);
    method.returns = Some(slot.ty.clone());
    method.body = vec![
        Stmt::Declare {
            ty: TypeRef::Primitive(PrimitiveKind::Int32),
            name: "threadId".to_string(),
            init: Some(Expr::static_member("System.Threading.Thread", "CurrentThread").member("ManagedThreadId")),
        },
        Stmt::Lock {
            target: table(),
            body: vec![
                Stmt::Declare {
                    ty: slot.ty.clone(),
                    name: "proxy".to_string(),
                    init: None,
                },
                Stmt::If {
                    cond: Expr::binary(BinaryOp::Or, Expr::Not(Box::new(found)), faulted),
                    then: recreate,
                    otherwise: Vec::new(),
                },
                Stmt::Return(Some(proxy())),
            ],
        },
    ];
    method
}

/// Empty hook receiving every non-output parameter by reference
fn hook_stub(name: &str, call: &ResolvedCall<'_>) -> MethodDecl {
    let mut hook = MethodDecl::new(format!("Customise{}", name));
    hook.params = call
        .parameters
        .iter()
        .filter(|p| p.direction != Direction::Out)
        .map(|p| Param {
            mode: PassMode::Ref,
            ty: p.declared_type.clone(),
            name: p.name.clone(),
        })
        .collect();
    hook
}

fn lower_first(name: &str) -> String {
    let name = simple_name(name);
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options() {
        let options = ScenarioOptions::default();
        assert!(options.timers && options.customise);
        assert_eq!(options.scenario_method, "RunScenario");
    }

    #[test]
    fn options_fill_missing_fields() {
        let options: ScenarioOptions = serde_yaml::from_str("class_name: Checkout\ntimers: false\n").unwrap();
        assert_eq!(options.class_name, "Checkout");
        assert!(!options.timers);
        assert_eq!(options.namespace, "ReplayTests");
    }

    #[test]
    fn table_names_are_lower_camel() {
        assert_eq!(lower_first("ArithmeticClient"), "arithmeticClient");
        assert_eq!(lower_first("Calc.IArithmetic"), "iArithmetic");
    }
}
