//! Object graph code generation
//!
//! [`ObjectGraphCodeGenerator`] turns a captured [`Value`] into statements
//! that rebuild it. Scalars become literal expressions; everything else is
//! built into a typed temporary whose name is returned as the expression.
//! Statements go to the active sink of the [`GenContext`].

use crate::ast::{BinaryOp, Expr, Literal, Stmt};
use crate::context::GenContext;
use crate::error::CodegenError;
use indexmap::IndexMap;
use soapreplay_contract::{
    ticks_of, CollectionShape, DataSetValue, DataTableValue, DateTimeKind, MemberRules,
    PrimitiveKind, PrimitiveValue, TypeRef, TypeRegistry, Value,
};
use tracing::debug;

const XML_DOCUMENT: &str = "System.Xml.XmlDocument";
const DATA_TABLE: &str = "System.Data.DataTable";
const MEMORY_STREAM: &str = "System.IO.MemoryStream";

/// Generates construction code for captured values
#[derive(Debug, Clone, Copy)]
pub struct ObjectGraphCodeGenerator<'r> {
    registry: &'r TypeRegistry,
    rules: MemberRules,
}

impl<'r> ObjectGraphCodeGenerator<'r> {
    /// Create generator for values read under `rules`
    #[must_use]
    pub fn new(registry: &'r TypeRegistry, rules: MemberRules) -> Self {
        Self { registry, rules }
    }

    /// Member rules compound values are checked against
    #[inline]
    #[must_use]
    pub fn rules(&self) -> MemberRules {
        self.rules
    }

    /// Emit the statements that rebuild `value` for a slot of type `declared`
    ///
    /// Returns the expression referring to the rebuilt value, or `None` when
    /// the slot should be left without an initializer (a null value).
    /// `target` names the slot in diagnostics.
    pub fn emit(
        &self,
        ctx: &mut GenContext,
        target: &str,
        declared: &TypeRef,
        value: &Value,
    ) -> Result<Option<Expr>, CodegenError> {
        ctx.nested(target, |ctx| self.emit_nested(ctx, target, declared, value))
    }

    /// Declare local `name` of type `declared` holding `value`
    ///
    /// Compound values whose type matches the declaration are built directly
    /// into `name`. A null value becomes `null` or the type's default.
    pub fn declare(
        &self,
        ctx: &mut GenContext,
        name: &str,
        declared: &TypeRef,
        value: &Value,
    ) -> Result<(), CodegenError> {
        let init = match value {
            Value::Object { ty, fields } if ty.same_type(declared.effective()) => Some(ctx.nested(name, |ctx| {
                self.reconcile(name, declared, value)?;
                self.object_into(ctx, name, name, ty, fields)
            })?),
            _ => self.emit(ctx, name, declared, value)?,
        };
        if init.as_ref().is_some_and(|e| matches!(e, Expr::Var(v) if v == name)) {
            return Ok(());
        }
        let init = init.unwrap_or_else(|| null_of(declared));
        ctx.emit(Stmt::Declare {
            ty: declared.effective().clone(),
            name: name.to_string(),
            init: Some(init),
        });
        Ok(())
    }

    fn emit_nested(
        &self,
        ctx: &mut GenContext,
        target: &str,
        declared: &TypeRef,
        value: &Value,
    ) -> Result<Option<Expr>, CodegenError> {
        if value.is_null() {
            return Ok(None);
        }
        let runtime = self.reconcile(target, declared, value)?;
        let expr = match value {
            Value::Null => return Ok(None),
            Value::Primitive(p) => primitive(p),
            Value::Enum { ty, member } => enum_literal(ty, member),
            Value::Array { items, .. } => self.array(ctx, target, &runtime, items)?,
            Value::Collection { items, .. } => self.collection(ctx, target, &runtime, items)?,
            Value::Dictionary { entries, .. } => self.dictionary(ctx, target, &runtime, entries)?,
            Value::Xml(element) => xml(ctx, element.to_xml_string()),
            Value::DataSet(ds) => self.dataset(ctx, target, ds)?,
            Value::Stream => Expr::new_object(TypeRef::named(MEMORY_STREAM), vec![]),
            Value::Object { fields, .. } => {
                let temp = ctx.temp_name(&hint(&runtime));
                self.object_into(ctx, target, &temp, &runtime, fields)?
            }
        };
        Ok(Some(expr))
    }

    /// Type to construct for `value` in a slot declared as `declared`
    ///
    /// 1. a nullable slot takes only its wrapped type
    /// 2. identical types pass
    /// 3. collection interfaces take compatible concrete collections
    /// 4. `object` and base-typed slots take derived runtime types
    /// 5. anything else is a mismatch
    fn reconcile(&self, target: &str, declared: &TypeRef, value: &Value) -> Result<TypeRef, CodegenError> {
        let declared = declared.effective();
        let Some(runtime) = value.runtime_type() else {
            return Ok(declared.clone());
        };
        if let TypeRef::Nullable(inner) = declared {
            return if runtime.same_type(inner) {
                Ok(runtime)
            } else {
                Err(CodegenError::nullable_mismatch(target, declared, &runtime))
            };
        }
        if let TypeRef::Nullable(_) = runtime {
            return Err(CodegenError::nullable_mismatch(target, declared, &runtime));
        }
        if runtime.same_type(declared) {
            return Ok(runtime);
        }
        if declared.concrete_collection().is_some() {
            if !self.registry.is_assignable(&runtime, declared) || !self.items_fit(declared, value) {
                return Err(CodegenError::mismatch(target, declared, &runtime));
            }
            return Ok(runtime);
        }
        if declared.is_object() || self.registry.is_assignable(&runtime, declared) {
            return Ok(runtime);
        }
        Err(CodegenError::mismatch(target, declared, &runtime))
    }

    /// Whether every captured item fits the element type of a collection interface
    fn items_fit(&self, declared: &TypeRef, value: &Value) -> bool {
        let fits = |slot: &TypeRef, item: &Value| {
            item.runtime_type()
                .map_or(true, |rt| slot.is_object() || self.registry.is_assignable(&rt, slot))
        };
        match (self.registry.collection_shape(declared), value) {
            (
                Some(CollectionShape::Sequence { element }),
                Value::Array { items, .. } | Value::Collection { items, .. },
            ) => items.iter().all(|item| fits(&element, item)),
            (Some(CollectionShape::Map { key, value: slot }), Value::Dictionary { entries, .. }) => {
                entries.iter().all(|(k, v)| fits(&key, k) && fits(&slot, v))
            }
            (Some(CollectionShape::Sequence { .. }), Value::Dictionary { .. })
            | (Some(CollectionShape::Map { .. }), Value::Array { .. } | Value::Collection { .. }) => false,
            _ => true,
        }
    }

    fn array(
        &self,
        ctx: &mut GenContext,
        target: &str,
        runtime: &TypeRef,
        items: &[Value],
    ) -> Result<Expr, CodegenError> {
        let TypeRef::Array { element, rank } = runtime else {
            return Err(CodegenError::Unsupported(format!("'{}' is not an array type", runtime)));
        };
        if *rank > 1 {
            return Err(CodegenError::Unsupported(format!(
                "multi-dimensional array '{}' for '{}'",
                runtime, target
            )));
        }
        let temp = ctx.temp_name(&hint(runtime));
        ctx.emit(Stmt::Declare {
            ty: runtime.clone(),
            name: temp.clone(),
            init: Some(Expr::NewArray {
                element: (**element).clone(),
                length: items.len(),
            }),
        });
        for (i, item) in items.iter().enumerate() {
            let slot = format!("{}[{}]", target, i);
            if let Some(expr) = self.emit(ctx, &slot, element, item)? {
                ctx.emit(Stmt::Assign {
                    target: Expr::Index {
                        target: Box::new(Expr::var(&temp)),
                        index: vec![Expr::Literal(Literal::Int(i as i64))],
                    },
                    value: expr,
                });
            }
        }
        Ok(Expr::var(temp))
    }

    fn collection(
        &self,
        ctx: &mut GenContext,
        target: &str,
        runtime: &TypeRef,
        items: &[Value],
    ) -> Result<Expr, CodegenError> {
        let element = match self.registry.collection_shape(runtime) {
            Some(CollectionShape::Sequence { element }) => element,
            _ => TypeRef::object(),
        };
        let temp = self.construct(ctx, runtime);
        for (i, item) in items.iter().enumerate() {
            let slot = format!("{}[{}]", target, i);
            let expr = self.emit(ctx, &slot, &element, item)?.unwrap_or_else(|| null_of(&element));
            ctx.emit(Stmt::Expr(Expr::var(&temp).call("Add", vec![expr])));
        }
        Ok(Expr::var(temp))
    }

    fn dictionary(
        &self,
        ctx: &mut GenContext,
        target: &str,
        runtime: &TypeRef,
        entries: &[(Value, Value)],
    ) -> Result<Expr, CodegenError> {
        let (key_ty, value_ty) = match self.registry.collection_shape(runtime) {
            Some(CollectionShape::Map { key, value }) => (key, value),
            _ => (TypeRef::object(), TypeRef::object()),
        };
        let temp = self.construct(ctx, runtime);
        for (i, (key, value)) in entries.iter().enumerate() {
            let key_slot = format!("{}.Key[{}]", target, i);
            let key = self
                .emit(ctx, &key_slot, &key_ty, key)?
                .ok_or_else(|| CodegenError::Unsupported(format!("null dictionary key in '{}'", target)))?;
            let value_slot = format!("{}[{}]", target, i);
            let value = self
                .emit(ctx, &value_slot, &value_ty, value)?
                .unwrap_or_else(|| null_of(&value_ty));
            ctx.emit(Stmt::Expr(Expr::var(&temp).call("Add", vec![key, value])));
        }
        Ok(Expr::var(temp))
    }

    fn dataset(&self, ctx: &mut GenContext, target: &str, ds: &DataSetValue) -> Result<Expr, CodegenError> {
        let temp = ctx.temp_name(&hint(&ds.ty));
        let init = if ds.typed || ds.has_default_name() {
            Expr::new_object(ds.ty.clone(), vec![])
        } else {
            Expr::new_object(ds.ty.clone(), vec![Expr::string(&ds.name)])
        };
        ctx.emit(Stmt::Declare {
            ty: ds.ty.clone(),
            name: temp.clone(),
            init: Some(init),
        });
        if !ds.typed && !ds.namespace.is_empty() {
            ctx.emit(Stmt::Assign {
                target: Expr::var(&temp).member("Namespace"),
                value: Expr::string(&ds.namespace),
            });
        }
        if let Some(locale) = &ds.locale {
            ctx.emit(Stmt::Assign {
                target: Expr::var(&temp).member("Locale"),
                value: Expr::new_object(
                    TypeRef::named("System.Globalization.CultureInfo"),
                    vec![Expr::string(locale)],
                ),
            });
        }
        for table in &ds.tables {
            self.table(ctx, target, &temp, ds, table)?;
        }
        Ok(Expr::var(temp))
    }

    fn table(
        &self,
        ctx: &mut GenContext,
        target: &str,
        dataset: &str,
        ds: &DataSetValue,
        table: &DataTableValue,
    ) -> Result<(), CodegenError> {
        let tables = Expr::var(dataset).member("Tables");
        let init = if ds.typed {
            Expr::Index {
                target: Box::new(tables),
                index: vec![Expr::string(&table.name)],
            }
        } else if table.has_default_name() {
            tables.call("Add", vec![])
        } else if table.namespace.is_empty() || table.namespace == ds.namespace {
            tables.call("Add", vec![Expr::string(&table.name)])
        } else {
            tables.call("Add", vec![Expr::string(&table.name), Expr::string(&table.namespace)])
        };
        let temp = ctx.temp_name("table");
        ctx.emit(Stmt::Declare {
            ty: TypeRef::named(DATA_TABLE),
            name: temp.clone(),
            init: Some(init),
        });
        if !ds.typed {
            for column in &table.columns {
                ctx.emit(Stmt::Expr(Expr::var(&temp).member("Columns").call(
                    "Add",
                    vec![Expr::string(&column.name), Expr::TypeOf(column.ty.clone())],
                )));
            }
        }
        for (r, row) in table.rows.iter().enumerate() {
            let mut cells = Vec::with_capacity(table.columns.len());
            for (column, cell) in table.columns.iter().zip(row) {
                let slot = format!("{}.{}[{}].{}", target, table.name, r, column.name);
                let expr = match cell {
                    Some(value) => self.emit(ctx, &slot, &column.ty, value)?,
                    None => None,
                };
                cells.push(expr.unwrap_or_else(|| Expr::static_member("System.DBNull", "Value")));
            }
            ctx.emit(Stmt::Expr(Expr::var(&temp).member("Rows").call(
                "Add",
                vec![Expr::ArrayInit {
                    element: TypeRef::object(),
                    items: cells,
                }],
            )));
        }
        Ok(())
    }

    /// Declare `var` as `runtime` and assign its captured members
    fn object_into(
        &self,
        ctx: &mut GenContext,
        target: &str,
        var: &str,
        runtime: &TypeRef,
        fields: &IndexMap<String, Value>,
    ) -> Result<Expr, CodegenError> {
        if runtime.is_object() {
            return Ok(Expr::new_object(TypeRef::object(), vec![]));
        }
        if !self.registry.is_serializable(runtime, self.rules) {
            return Err(CodegenError::NotSerializable {
                ty: runtime.to_string(),
                strategy: self.rules.label().to_string(),
            });
        }
        let def = self
            .registry
            .find_ref(runtime)
            .ok_or_else(|| CodegenError::UnknownType(runtime.to_string()))?;
        ctx.emit(Stmt::Declare {
            ty: runtime.clone(),
            name: var.to_string(),
            init: Some(Expr::new_object(runtime.clone(), vec![])),
        });
        for member in self.registry.serializable_members(def, self.rules) {
            let Some(value) = fields.get(&member.name) else {
                continue;
            };
            if !member.is_public_writable() {
                debug!(ty = %runtime, member = %member.name, "skipping member that generated code cannot assign");
                continue;
            }
            let slot = format!("{}.{}", target, member.name);
            if let Some(expr) = self.emit(ctx, &slot, &member.ty, value)? {
                ctx.emit(Stmt::Assign {
                    target: Expr::var(var).member(&member.name),
                    value: expr,
                });
            }
        }
        Ok(Expr::var(var))
    }

    /// Declare a temporary holding an empty `ty`
    fn construct(&self, ctx: &mut GenContext, ty: &TypeRef) -> String {
        let temp = ctx.temp_name(&hint(ty));
        ctx.emit(Stmt::Declare {
            ty: ty.clone(),
            name: temp.clone(),
            init: Some(Expr::new_object(ty.clone(), vec![])),
        });
        temp
    }
}

/// Expression standing for a missing value in a slot of type `ty`
fn null_of(ty: &TypeRef) -> Expr {
    if ty.effective().is_nullable_slot() {
        Expr::null()
    } else {
        Expr::Default(ty.effective().clone())
    }
}

/// Base for temporary names
fn hint(ty: &TypeRef) -> String {
    match ty {
        TypeRef::Primitive(kind) => soapreplay_contract::simple_name(kind.clr_name()).to_string(),
        TypeRef::Named { name, .. } => soapreplay_contract::simple_name(name).to_string(),
        TypeRef::Array { element, .. } => format!("{}Array", hint(element)),
        TypeRef::Nullable(inner) | TypeRef::ByRef(inner) => hint(inner),
    }
}

fn primitive(value: &PrimitiveValue) -> Expr {
    let cast = |kind: PrimitiveKind, i: i64| Expr::Cast {
        ty: TypeRef::Primitive(kind),
        expr: Box::new(Expr::Literal(Literal::Int(i))),
    };
    let lit = Expr::Literal;
    match value {
        PrimitiveValue::Bool(b) => lit(Literal::Bool(*b)),
        PrimitiveValue::Byte(v) => cast(PrimitiveKind::Byte, i64::from(*v)),
        PrimitiveValue::SByte(v) => cast(PrimitiveKind::SByte, i64::from(*v)),
        PrimitiveValue::Int16(v) => cast(PrimitiveKind::Int16, i64::from(*v)),
        PrimitiveValue::UInt16(v) => cast(PrimitiveKind::UInt16, i64::from(*v)),
        PrimitiveValue::Int32(v) => lit(Literal::Int(i64::from(*v))),
        PrimitiveValue::UInt32(v) => lit(Literal::UInt(u64::from(*v))),
        PrimitiveValue::Int64(v) => lit(Literal::Long(*v)),
        PrimitiveValue::UInt64(v) => lit(Literal::ULong(*v)),
        PrimitiveValue::Single(v) => lit(Literal::Float(*v)),
        PrimitiveValue::Double(v) => lit(Literal::Double(*v)),
        PrimitiveValue::Decimal(v) => lit(Literal::Decimal(v.clone())),
        PrimitiveValue::Char(c) => lit(Literal::Char(*c)),
        PrimitiveValue::String(s) => Expr::string(s),
        PrimitiveValue::DateTime { value, kind } => {
            let kind = match kind {
                DateTimeKind::Unspecified => "Unspecified",
                DateTimeKind::Utc => "Utc",
                DateTimeKind::Local => "Local",
            };
            Expr::new_object(
                TypeRef::Primitive(PrimitiveKind::DateTime),
                vec![
                    lit(Literal::Long(ticks_of(*value))),
                    Expr::static_member("System.DateTimeKind", kind),
                ],
            )
        }
        PrimitiveValue::TimeSpan(ticks) => Expr::new_object(
            TypeRef::Primitive(PrimitiveKind::TimeSpan),
            vec![lit(Literal::Long(*ticks))],
        ),
        PrimitiveValue::Guid(g) => Expr::new_object(
            TypeRef::Primitive(PrimitiveKind::Guid),
            vec![Expr::string(g.to_string())],
        ),
        PrimitiveValue::QName { namespace, name } => Expr::new_object(
            TypeRef::Primitive(PrimitiveKind::QName),
            vec![Expr::string(name), Expr::string(namespace)],
        ),
        PrimitiveValue::Uri(uri) => Expr::new_object(
            TypeRef::Primitive(PrimitiveKind::Uri),
            vec![Expr::string(uri), Expr::static_member("System.UriKind", "RelativeOrAbsolute")],
        ),
    }
}

/// `T.A`, `T.A | T.B` for flags, `(T)0` for no flags
fn enum_literal(ty: &TypeRef, member: &str) -> Expr {
    let members = member.split_whitespace().map(|m| Expr::Type(ty.clone()).member(m));
    members
        .reduce(|acc, next| Expr::binary(BinaryOp::BitOr, acc, next))
        .unwrap_or_else(|| Expr::Cast {
            ty: ty.clone(),
            expr: Box::new(Expr::Literal(Literal::Int(0))),
        })
}

/// Parse the captured markup into a scratch document and use its root
fn xml(ctx: &mut GenContext, markup: String) -> Expr {
    let doc = ctx.temp_name("doc");
    ctx.emit(Stmt::Declare {
        ty: TypeRef::named(XML_DOCUMENT),
        name: doc.clone(),
        init: Some(Expr::new_object(TypeRef::named(XML_DOCUMENT), vec![])),
    });
    ctx.emit(Stmt::Expr(Expr::var(&doc).call("LoadXml", vec![Expr::string(markup)])));
    Expr::var(doc).member("DocumentElement")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printer::{CSharpPrinter, CodePrinter};
    use pretty_assertions::assert_eq;
    use soapreplay_contract::{DataColumnValue, TypeContainer, TypeDef};
    use soapreplay_trace::XmlElement;

    fn ty(s: &str) -> TypeRef {
        s.parse().unwrap()
    }

    fn registry() -> TypeRegistry {
        soapreplay_test_utils::arithmetic_registry()
    }

    fn render(stmts: &[Stmt]) -> Vec<String> {
        let printer = CSharpPrinter::new();
        stmts
            .iter()
            .map(|s| match s {
                Stmt::Declare { ty, name, init: Some(e) } => {
                    format!("{} {} = {};", printer.print_type(ty), name, printer.print_expr(e))
                }
                Stmt::Assign { target, value } => {
                    format!("{} = {};", printer.print_expr(target), printer.print_expr(value))
                }
                Stmt::Expr(e) => format!("{};", printer.print_expr(e)),
                other => format!("{:?}", other),
            })
            .collect()
    }

    fn emit(reg: &TypeRegistry, declared: &str, value: &Value) -> (Option<String>, Vec<String>) {
        let gen = ObjectGraphCodeGenerator::new(reg, MemberRules::DataContract);
        let mut ctx = GenContext::new();
        let expr = gen.emit(&mut ctx, "x", &ty(declared), value).unwrap();
        let printer = CSharpPrinter::new();
        (expr.map(|e| printer.print_expr(&e)), render(&ctx.pop_sink()))
    }

    fn order() -> Value {
        let line = |sku: &str, qty: i32| {
            let mut fields = IndexMap::new();
            fields.insert("Sku".to_string(), Value::string(sku));
            fields.insert("Quantity".to_string(), Value::int(qty));
            Value::Object { ty: ty("Calc.Line"), fields }
        };
        let mut fields = IndexMap::new();
        fields.insert("Id".to_string(), Value::int(7));
        fields.insert(
            "Lines".to_string(),
            Value::Collection {
                ty: ty("System.Collections.Generic.List<Calc.Line>"),
                items: vec![line("a", 1), line("b", 2)],
            },
        );
        fields.insert("Status".to_string(), Value::Enum { ty: ty("Calc.Status"), member: "Closed".into() });
        Value::Object { ty: ty("Calc.Order"), fields }
    }

    #[test]
    fn scalars_are_inline() {
        let reg = registry();
        assert_eq!(emit(&reg, "int", &Value::int(-3)).0.as_deref(), Some("-3"));
        assert_eq!(
            emit(&reg, "object", &PrimitiveValue::Int16(4).into()).0.as_deref(),
            Some("(short)4")
        );
        assert_eq!(
            emit(&reg, "System.TimeSpan", &PrimitiveValue::TimeSpan(600_000_000).into()).0.as_deref(),
            Some("new System.TimeSpan(600000000L)")
        );
        let (expr, stmts) = emit(&reg, "string", &Value::Null);
        assert_eq!(expr, None);
        assert!(stmts.is_empty());
    }

    #[test]
    fn date_times_use_ticks_and_kind() {
        let value = PrimitiveValue::DateTime {
            value: soapreplay_contract::epoch() + chrono::Duration::seconds(1),
            kind: DateTimeKind::Utc,
        };
        assert_eq!(
            emit(&registry(), "System.DateTime", &value.into()).0.as_deref(),
            Some("new System.DateTime(10000000L, System.DateTimeKind.Utc)")
        );
    }

    #[test]
    fn flag_enums_are_or_ed() {
        let value = Value::Enum { ty: ty("Calc.Status"), member: "Open Closed".into() };
        assert_eq!(
            emit(&registry(), "Calc.Status", &value).0.as_deref(),
            Some("Calc.Status.Open | Calc.Status.Closed")
        );
    }

    #[test]
    fn compound_values_build_in_order() {
        let (expr, stmts) = emit(&registry(), "Calc.Order", &order());
        assert_eq!(expr.as_deref(), Some("order1"));
        assert_eq!(
            stmts,
            vec![
                "Calc.Order order1 = new Calc.Order();",
                "order1.Id = 7;",
                "System.Collections.Generic.List<Calc.Line> list2 = new System.Collections.Generic.List<Calc.Line>();",
                "Calc.Line line3 = new Calc.Line();",
                "line3.Quantity = 1;",
                "line3.Sku = \"a\";",
                "list2.Add(line3);",
                "Calc.Line line4 = new Calc.Line();",
                "line4.Quantity = 2;",
                "line4.Sku = \"b\";",
                "list2.Add(line4);",
                "order1.Lines = list2;",
                "order1.Status = Calc.Status.Closed;",
            ]
        );
    }

    #[test]
    fn arrays_skip_null_elements() {
        let value = Value::Array {
            ty: ty("string[]"),
            items: vec![Value::string("a"), Value::Null, Value::string("c")],
        };
        let (expr, stmts) = emit(&registry(), "string[]", &value);
        assert_eq!(expr.as_deref(), Some("stringArray1"));
        assert_eq!(
            stmts,
            vec![
                "string[] stringArray1 = new string[3];",
                "stringArray1[0] = \"a\";",
                "stringArray1[2] = \"c\";",
            ]
        );
    }

    #[test]
    fn multi_dimensional_arrays_are_rejected() {
        let reg = registry();
        let gen = ObjectGraphCodeGenerator::new(&reg, MemberRules::DataContract);
        let value = Value::Array { ty: ty("int[,]"), items: vec![] };
        let err = gen.emit(&mut GenContext::new(), "grid", &ty("int[,]"), &value).unwrap_err();
        assert!(matches!(err, CodegenError::Unsupported(_)));
    }

    #[test]
    fn interface_slots_take_concrete_collections() {
        let value = Value::Dictionary {
            ty: ty("System.Collections.Generic.Dictionary<string, int>"),
            entries: vec![(Value::string("k"), Value::int(1))],
        };
        let (expr, stmts) = emit(&registry(), "System.Collections.Generic.IDictionary<string, int>", &value);
        assert_eq!(expr.as_deref(), Some("dictionary1"));
        assert_eq!(stmts[1], "dictionary1.Add(\"k\", 1);");
    }

    #[test]
    fn mismatched_collection_items_fail() {
        let reg = registry();
        let gen = ObjectGraphCodeGenerator::new(&reg, MemberRules::DataContract);
        let value = Value::Collection {
            ty: ty("System.Collections.Generic.List<string>"),
            items: vec![Value::string("a")],
        };
        let err = gen
            .emit(&mut GenContext::new(), "ids", &ty("System.Collections.Generic.IList<int>"), &value)
            .unwrap_err();
        assert!(matches!(err, CodegenError::TypeMismatch { .. }));
    }

    #[test]
    fn nullable_mismatch_is_an_error() {
        let reg = registry();
        let gen = ObjectGraphCodeGenerator::new(&reg, MemberRules::DataContract);
        let err = gen
            .emit(&mut GenContext::new(), "n", &ty("int?"), &Value::string("x"))
            .unwrap_err();
        assert!(matches!(err, CodegenError::NullableMismatch { .. }));
        assert_eq!(emit(&reg, "int?", &Value::int(5)).0.as_deref(), Some("5"));
    }

    #[test]
    fn unrelated_types_are_rejected() {
        let reg = registry();
        let gen = ObjectGraphCodeGenerator::new(&reg, MemberRules::DataContract);
        let err = gen
            .emit(&mut GenContext::new(), "o", &ty("Calc.Line"), &order())
            .unwrap_err();
        assert!(matches!(err, CodegenError::TypeMismatch { .. }));
    }

    #[test]
    fn non_serializable_types_are_rejected() {
        let mut plain = TypeDef::new("Calc", "Plain");
        plain.default_constructor = false;
        let reg = TypeRegistry::from_containers(vec![TypeContainer::new("c", vec![plain])]);
        let gen = ObjectGraphCodeGenerator::new(&reg, MemberRules::DataContract);
        let err = gen
            .emit(&mut GenContext::new(), "p", &ty("Calc.Plain"), &Value::empty_object(ty("Calc.Plain")))
            .unwrap_err();
        assert_eq!(err.to_string(), "type 'Calc.Plain' is not serializable with data contract rules");
    }

    #[test]
    fn xml_goes_through_a_document() {
        let element = XmlElement::parse_str("<note>hi</note>").unwrap();
        let (expr, stmts) = emit(&registry(), "System.Xml.XmlElement", &Value::Xml(element));
        assert_eq!(expr.as_deref(), Some("doc1.DocumentElement"));
        assert_eq!(
            stmts,
            vec![
                "System.Xml.XmlDocument doc1 = new System.Xml.XmlDocument();",
                "doc1.LoadXml(\"<note>hi</note>\");",
            ]
        );
    }

    #[test]
    fn datasets_rebuild_tables_and_rows() {
        let ds = DataSetValue {
            ty: ty("System.Data.DataSet"),
            typed: false,
            name: "Orders".into(),
            namespace: String::new(),
            locale: Some("en-US".into()),
            tables: vec![DataTableValue {
                name: "Table".into(),
                namespace: String::new(),
                columns: vec![
                    DataColumnValue { name: "Id".into(), ty: ty("int") },
                    DataColumnValue { name: "Note".into(), ty: ty("string") },
                ],
                rows: vec![vec![Some(Value::int(1)), None]],
            }],
        };
        let (expr, stmts) = emit(&registry(), "System.Data.DataSet", &Value::DataSet(ds));
        assert_eq!(expr.as_deref(), Some("dataSet1"));
        assert_eq!(
            stmts,
            vec![
                "System.Data.DataSet dataSet1 = new System.Data.DataSet(\"Orders\");",
                "dataSet1.Locale = new System.Globalization.CultureInfo(\"en-US\");",
                "System.Data.DataTable table2 = dataSet1.Tables.Add();",
                "table2.Columns.Add(\"Id\", typeof(int));",
                "table2.Columns.Add(\"Note\", typeof(string));",
                "table2.Rows.Add(new object[] { 1, System.DBNull.Value });",
            ]
        );
    }

    #[test]
    fn streams_become_empty_memory_streams() {
        assert_eq!(
            emit(&registry(), "System.IO.Stream", &Value::Stream).0.as_deref(),
            Some("new System.IO.MemoryStream()")
        );
    }

    #[test]
    fn declare_builds_matching_objects_in_place() {
        let reg = registry();
        let gen = ObjectGraphCodeGenerator::new(&reg, MemberRules::DataContract);
        let mut ctx = GenContext::new();
        let mut fields = IndexMap::new();
        fields.insert("Sku".to_string(), Value::string("a"));
        let line = Value::Object { ty: ty("Calc.Line"), fields };
        gen.declare(&mut ctx, "line", &ty("Calc.Line"), &line).unwrap();
        gen.declare(&mut ctx, "note", &ty("string"), &Value::Null).unwrap();
        gen.declare(&mut ctx, "count", &ty("int"), &Value::Null).unwrap();
        assert_eq!(
            render(&ctx.pop_sink()),
            vec![
                "Calc.Line line = new Calc.Line();",
                "line.Sku = \"a\";",
                "string note = null;",
                "int count = default(int);",
            ]
        );
    }
}
