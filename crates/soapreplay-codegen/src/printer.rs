//! Source printers
//!
//! [`CodePrinter`] turns a [`CompilationUnit`] into text. [`CSharpPrinter`]
//! is the built-in target.

use crate::ast::{
    Access, Arg, ClassDecl, CompilationUnit, Expr, FieldDecl, Literal, Member, MethodDecl, Param,
    PassMode, PropertyDecl, Stmt,
};
use soapreplay_contract::TypeRef;
use std::fmt::Write as _;

/// Renders the code model in a target language
pub trait CodePrinter {
    /// Target language name
    fn language(&self) -> &'static str;

    /// File extension for printed units, without the dot
    fn file_extension(&self) -> &'static str;

    /// Print a whole file
    fn print_unit(&self, unit: &CompilationUnit) -> String;

    /// Print a single expression
    fn print_expr(&self, expr: &Expr) -> String;

    /// Print a type name
    fn print_type(&self, ty: &TypeRef) -> String;
}

const CSHARP_KEYWORDS: &[&str] = &[
    "abstract", "as", "base", "bool", "break", "byte", "case", "catch", "char", "checked", "class",
    "const", "continue", "decimal", "default", "delegate", "do", "double", "else", "enum", "event",
    "explicit", "extern", "false", "finally", "fixed", "float", "for", "foreach", "goto", "if",
    "implicit", "in", "int", "interface", "internal", "is", "lock", "long", "namespace", "new",
    "null", "object", "operator", "out", "override", "params", "private", "protected", "public",
    "readonly", "ref", "return", "sbyte", "sealed", "short", "sizeof", "stackalloc", "static",
    "string", "struct", "switch", "this", "throw", "true", "try", "typeof", "uint", "ulong",
    "unchecked", "unsafe", "ushort", "using", "virtual", "void", "volatile", "while",
];

/// Escape an identifier that collides with a keyword
#[must_use]
pub fn escape_identifier(name: &str) -> String {
    if CSHARP_KEYWORDS.contains(&name) {
        format!("@{}", name)
    } else {
        name.to_string()
    }
}

/// Quoted, escaped string literal
#[must_use]
pub fn string_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        push_escaped(&mut out, c, '"');
    }
    out.push('"');
    out
}

/// Quoted, escaped character literal
#[must_use]
pub fn char_literal(value: char) -> String {
    let mut out = String::from("'");
    push_escaped(&mut out, value, '\'');
    out.push('\'');
    out
}

fn push_escaped(out: &mut String, c: char, quote: char) {
    match c {
        '\\' => out.push_str("\\\\"),
        '\0' => out.push_str("\\0"),
        '\n' => out.push_str("\\n"),
        '\r' => out.push_str("\\r"),
        '\t' => out.push_str("\\t"),
        c if c == quote => {
            out.push('\\');
            out.push(c);
        }
        c if c.is_control() || c == '\u{2028}' || c == '\u{2029}' => {
            let _ = write!(out, "\\u{:04X}", c as u32);
        }
        c => out.push(c),
    }
}

/// C# printer
#[derive(Debug, Clone)]
pub struct CSharpPrinter {
    indent: String,
}

impl Default for CSharpPrinter {
    fn default() -> Self {
        Self {
            indent: "    ".to_string(),
        }
    }
}

impl CSharpPrinter {
    /// Printer with four-space indentation
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Printer with a custom indent unit
    #[must_use]
    pub fn with_indent(indent: impl Into<String>) -> Self {
        Self {
            indent: indent.into(),
        }
    }

    fn literal(&self, literal: &Literal) -> String {
        match literal {
            Literal::Null => "null".to_string(),
            Literal::Bool(b) => b.to_string(),
            Literal::Int(i) => i.to_string(),
            Literal::Long(i) => format!("{}L", i),
            Literal::UInt(u) => format!("{}U", u),
            Literal::ULong(u) => format!("{}UL", u),
            Literal::Float(f) => float_literal(f64::from(*f), "float", "F"),
            Literal::Double(d) => float_literal(*d, "double", "D"),
            Literal::Decimal(d) => format!("{}M", d),
            Literal::Char(c) => char_literal(*c),
            Literal::String(s) => string_literal(s),
        }
    }

    fn args(&self, args: &[Arg]) -> String {
        args.iter()
            .map(|a| {
                let expr = self.print_expr(&a.expr);
                match a.mode {
                    PassMode::Value => expr,
                    PassMode::Ref => format!("ref {}", expr),
                    PassMode::Out => format!("out {}", expr),
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Expression used as the receiver of a member access or call
    fn target(&self, expr: &Expr) -> String {
        match expr {
            Expr::Cast { .. } | Expr::Binary { .. } | Expr::Not(_) => format!("({})", self.print_expr(expr)),
            other => self.print_expr(other),
        }
    }

    fn operand(&self, expr: &Expr) -> String {
        match expr {
            Expr::Binary { .. } | Expr::Cast { .. } => format!("({})", self.print_expr(expr)),
            other => self.print_expr(other),
        }
    }

    fn stmt(&self, w: &mut Writer<'_>, stmt: &Stmt) {
        match stmt {
            Stmt::Declare { ty, name, init } => {
                let head = format!("{} {}", self.print_type(ty), escape_identifier(name));
                match init {
                    Some(init) => w.line(&format!("{} = {};", head, self.print_expr(init))),
                    None => w.line(&format!("{};", head)),
                }
            }
            Stmt::Assign { target, value } => {
                w.line(&format!("{} = {};", self.print_expr(target), self.print_expr(value)));
            }
            Stmt::Expr(expr) => w.line(&format!("{};", self.print_expr(expr))),
            Stmt::Return(Some(expr)) => w.line(&format!("return {};", self.print_expr(expr))),
            Stmt::Return(None) => w.line("return;"),
            Stmt::If { cond, then, otherwise } => {
                w.line(&format!("if ({})", self.print_expr(cond)));
                self.block(w, then);
                if !otherwise.is_empty() {
                    w.line("else");
                    self.block(w, otherwise);
                }
            }
            Stmt::Lock { target, body } => {
                w.line(&format!("lock ({})", self.print_expr(target)));
                self.block(w, body);
            }
            Stmt::TryFinally { body, finally } => {
                w.line("try");
                self.block(w, body);
                w.line("finally");
                self.block(w, finally);
            }
            Stmt::Comment(text) => {
                for line in text.lines() {
                    w.line(&format!("// {}", line));
                }
            }
        }
    }

    fn block(&self, w: &mut Writer<'_>, body: &[Stmt]) {
        w.open();
        for stmt in body {
            self.stmt(w, stmt);
        }
        w.close();
    }

    fn attributes(&self, w: &mut Writer<'_>, attributes: &[String]) {
        for attribute in attributes {
            w.line(&format!("[{}]", attribute));
        }
    }

    fn field(&self, w: &mut Writer<'_>, field: &FieldDecl) {
        let mut head = String::from(field.access.as_str());
        if field.is_static {
            head.push_str(" static");
        }
        let _ = write!(head, " {} {}", self.print_type(&field.ty), escape_identifier(&field.name));
        match &field.init {
            Some(init) => w.line(&format!("{} = {};", head, self.print_expr(init))),
            None => w.line(&format!("{};", head)),
        }
    }

    fn property(&self, w: &mut Writer<'_>, property: &PropertyDecl) {
        w.line(&format!(
            "{} {} {} {{ get; set; }}",
            property.access.as_str(),
            self.print_type(&property.ty),
            escape_identifier(&property.name)
        ));
    }

    fn param(&self, param: &Param) -> String {
        let mode = match param.mode {
            PassMode::Value => "",
            PassMode::Ref => "ref ",
            PassMode::Out => "out ",
        };
        format!("{}{} {}", mode, self.print_type(&param.ty), escape_identifier(&param.name))
    }

    fn method(&self, w: &mut Writer<'_>, method: &MethodDecl) {
        self.attributes(w, &method.attributes);
        let mut head = String::from(method.access.as_str());
        if method.is_static {
            head.push_str(" static");
        }
        let returns = method
            .returns
            .as_ref()
            .map_or_else(|| "void".to_string(), |t| self.print_type(t));
        let params = method.params.iter().map(|p| self.param(p)).collect::<Vec<_>>().join(", ");
        w.line(&format!("{} {} {}({})", head, returns, escape_identifier(&method.name), params));
        self.block(w, &method.body);
    }

    fn class(&self, w: &mut Writer<'_>, class: &ClassDecl) {
        self.attributes(w, &class.attributes);
        let partial = if class.is_partial { " partial" } else { "" };
        w.line(&format!("{}{} class {}", class.access.as_str(), partial, escape_identifier(&class.name)));
        w.open();
        for (i, member) in class.members.iter().enumerate() {
            if i > 0 {
                w.blank();
            }
            match member {
                Member::Field(f) => self.field(w, f),
                Member::Property(p) => self.property(w, p),
                Member::Method(m) => self.method(w, m),
            }
        }
        w.close();
    }
}

fn float_literal(value: f64, keyword: &str, suffix: &str) -> String {
    if value.is_nan() {
        format!("{}.NaN", keyword)
    } else if value.is_infinite() {
        let which = if value > 0.0 { "PositiveInfinity" } else { "NegativeInfinity" };
        format!("{}.{}", keyword, which)
    } else if suffix == "F" {
        format!("{:?}{}", value as f32, suffix)
    } else {
        format!("{:?}{}", value, suffix)
    }
}

impl CodePrinter for CSharpPrinter {
    fn language(&self) -> &'static str {
        "C#"
    }

    fn file_extension(&self) -> &'static str {
        "cs"
    }

    fn print_unit(&self, unit: &CompilationUnit) -> String {
        let mut w = Writer::new(&self.indent);
        for line in &unit.header {
            w.line(&format!("// {}", line));
        }
        if !unit.header.is_empty() {
            w.blank();
        }
        for using in &unit.usings {
            w.line(&format!("using {};", using));
        }
        if !unit.usings.is_empty() {
            w.blank();
        }
        let wrapped = !unit.namespace.is_empty();
        if wrapped {
            w.line(&format!("namespace {}", unit.namespace));
            w.open();
        }
        for (i, class) in unit.classes.iter().enumerate() {
            if i > 0 {
                w.blank();
            }
            self.class(&mut w, class);
        }
        if wrapped {
            w.close();
        }
        w.finish()
    }

    fn print_expr(&self, expr: &Expr) -> String {
        match expr {
            Expr::Literal(l) => self.literal(l),
            Expr::Var(name) => escape_identifier(name),
            Expr::This => "this".to_string(),
            Expr::Type(ty) => self.print_type(ty),
            Expr::Member { target, name } => format!("{}.{}", self.target(target), escape_identifier(name)),
            Expr::Index { target, index } => format!(
                "{}[{}]",
                self.target(target),
                index.iter().map(|e| self.print_expr(e)).collect::<Vec<_>>().join(", ")
            ),
            Expr::Call { target, method, args } => {
                format!("{}.{}({})", self.target(target), escape_identifier(method), self.args(args))
            }
            Expr::New { ty, args } => format!(
                "new {}({})",
                self.print_type(ty),
                args.iter().map(|e| self.print_expr(e)).collect::<Vec<_>>().join(", ")
            ),
            Expr::NewArray { element, length } => new_array(&self.print_type(element), *length),
            Expr::ArrayInit { element, items } => format!(
                "new {}[] {{ {} }}",
                self.print_type(element),
                items.iter().map(|e| self.print_expr(e)).collect::<Vec<_>>().join(", ")
            ),
            Expr::Cast { ty, expr } => format!("({}){}", self.print_type(ty), self.target(expr)),
            Expr::Binary { op, left, right } => {
                format!("{} {} {}", self.operand(left), op.as_str(), self.operand(right))
            }
            Expr::Not(inner) => format!("!{}", self.operand(inner)),
            Expr::TypeOf(ty) => format!("typeof({})", self.print_type(ty)),
            Expr::Default(ty) => format!("default({})", self.print_type(ty)),
        }
    }

    fn print_type(&self, ty: &TypeRef) -> String {
        match ty {
            TypeRef::Primitive(kind) => kind.keyword().to_string(),
            TypeRef::Named { name, args } => {
                let base = name
                    .split(['.', '+'])
                    .map(escape_identifier)
                    .collect::<Vec<_>>()
                    .join(".");
                if args.is_empty() {
                    base
                } else {
                    let args = args.iter().map(|a| self.print_type(a)).collect::<Vec<_>>();
                    format!("{}<{}>", base, args.join(", "))
                }
            }
            TypeRef::Array { element, rank } => {
                format!("{}[{}]", self.print_type(element), ",".repeat(rank.saturating_sub(1)))
            }
            TypeRef::Nullable(inner) => format!("{}?", self.print_type(inner)),
            TypeRef::ByRef(inner) => self.print_type(inner),
        }
    }
}

/// `new T[n]`, keeping jagged element ranks after the length
fn new_array(element: &str, length: usize) -> String {
    match element.find('[') {
        Some(split) => format!("new {}[{}]{}", &element[..split], length, &element[split..]),
        None => format!("new {}[{}]", element, length),
    }
}

/// Indenting line writer
struct Writer<'a> {
    out: String,
    level: usize,
    indent: &'a str,
}

impl<'a> Writer<'a> {
    fn new(indent: &'a str) -> Self {
        Self {
            out: String::new(),
            level: 0,
            indent,
        }
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.level {
            self.out.push_str(self.indent);
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }

    fn open(&mut self) {
        self.line("{");
        self.level += 1;
    }

    fn close(&mut self) {
        self.level = self.level.saturating_sub(1);
        self.line("}");
    }

    fn finish(self) -> String {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, ClassDecl};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn p() -> CSharpPrinter {
        CSharpPrinter::new()
    }

    #[test]
    fn keywords_are_escaped() {
        assert_eq!(escape_identifier("event"), "@event");
        assert_eq!(escape_identifier("order"), "order");
        assert_eq!(p().print_expr(&Expr::var("params")), "@params");
    }

    #[test]
    fn literals() {
        let printer = p();
        let lit = |l: Literal| printer.print_expr(&Expr::Literal(l));
        assert_eq!(lit(Literal::Long(5)), "5L");
        assert_eq!(lit(Literal::ULong(5)), "5UL");
        assert_eq!(lit(Literal::Double(2.0)), "2.0D");
        assert_eq!(lit(Literal::Float(1.5)), "1.5F");
        assert_eq!(lit(Literal::Double(f64::NAN)), "double.NaN");
        assert_eq!(lit(Literal::Float(f32::NEG_INFINITY)), "float.NegativeInfinity");
        assert_eq!(lit(Literal::Decimal("12.50".into())), "12.50M");
        assert_eq!(lit(Literal::Char('\'')), r"'\''");
        assert_eq!(lit(Literal::String("a\"b\\\n".into())), r#""a\"b\\\n""#);
        assert_eq!(lit(Literal::String("\u{1}".into())), r#""\u0001""#);
    }

    #[test]
    fn types() {
        let printer = p();
        let ty = |s: &str| printer.print_type(&s.parse().unwrap());
        assert_eq!(ty("System.Collections.Generic.Dictionary<string, Calc.Line[]>"),
            "System.Collections.Generic.Dictionary<string, Calc.Line[]>");
        assert_eq!(ty("int?"), "int?");
        assert_eq!(ty("int[,]"), "int[,]");
        assert_eq!(ty("Calc.Outer+Inner"), "Calc.Outer.Inner");
        assert_eq!(ty("Calc.event.Item"), "Calc.@event.Item");
    }

    #[test]
    fn expressions() {
        let printer = p();
        let cast = Expr::Cast {
            ty: "Calc.IArithmetic".parse().unwrap(),
            expr: Box::new(Expr::var("proxy")),
        };
        assert_eq!(printer.print_expr(&cast.call("Add", vec![Expr::var("a")])), "((Calc.IArithmetic)proxy).Add(a)");
        let cond = Expr::binary(
            BinaryOp::Or,
            Expr::Not(Box::new(Expr::var("found"))),
            Expr::binary(BinaryOp::Eq, Expr::var("x"), Expr::null()),
        );
        assert_eq!(printer.print_expr(&cond), "!found || (x == null)");
        let jagged = Expr::NewArray {
            element: "int[]".parse().unwrap(),
            length: 3,
        };
        assert_eq!(printer.print_expr(&jagged), "new int[3][]");
    }

    #[test]
    fn prints_unit() {
        let mut method = MethodDecl::new("Run");
        method.access = Access::Public;
        method.attributes.push("TestMethod".into());
        method.body = vec![
            Stmt::Declare {
                ty: "int".parse().unwrap(),
                name: "a".into(),
                init: Some(Expr::Literal(Literal::Int(2))),
            },
            Stmt::TryFinally {
                body: vec![Stmt::Expr(Expr::This.call("Add", vec![]))],
                finally: vec![Stmt::Return(None)],
            },
        ];
        let unit = CompilationUnit {
            header: vec!["generated".into()],
            usings: vec!["System".into()],
            namespace: "Replay".into(),
            classes: vec![ClassDecl {
                attributes: vec!["TestClass".into()],
                access: Access::Public,
                is_partial: true,
                name: "Scenario".into(),
                members: vec![Member::Method(method)],
            }],
        };
        let expected = "\
// generated

using System;

namespace Replay
{
    [TestClass]
    public partial class Scenario
    {
        [TestMethod]
        public void Run()
        {
            int a = 2;
            try
            {
                this.Add();
            }
            finally
            {
                return;
            }
        }
    }
}
";
        assert_eq!(p().print_unit(&unit), expected);
    }

    proptest! {
        #[test]
        fn string_literals_stay_on_one_line(s in "\\PC*") {
            let lit = string_literal(&s);
            prop_assert!(lit.starts_with('"') && lit.ends_with('"'));
            prop_assert!(!lit.contains('\n') && !lit.contains('\r'));
            let inner = &lit[1..lit.len() - 1];
            let mut escaped = false;
            for c in inner.chars() {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else {
                    prop_assert_ne!(c, '"');
                }
            }
        }
    }
}
