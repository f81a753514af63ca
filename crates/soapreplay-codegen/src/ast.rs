//! Language-neutral code model
//!
//! Generators build these trees; a [`CodePrinter`](crate::CodePrinter)
//! turns them into source text. Type names are carried as [`TypeRef`]s so
//! the printer controls how they are spelled.

use soapreplay_contract::TypeRef;

/// Literal constant
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// `null`
    Null,
    /// Boolean
    Bool(bool),
    /// 32-bit or narrower signed integer
    Int(i64),
    /// 64-bit signed integer
    Long(i64),
    /// 32-bit or narrower unsigned integer
    UInt(u64),
    /// 64-bit unsigned integer
    ULong(u64),
    /// Single precision float
    Float(f32),
    /// Double precision float
    Double(f64),
    /// Decimal in its lexical form
    Decimal(String),
    /// Character
    Char(char),
    /// String
    String(String),
}

/// Argument passing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassMode {
    /// By value
    Value,
    /// `ref`
    Ref,
    /// `out`
    Out,
}

/// Call argument
#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    /// Passing mode
    pub mode: PassMode,
    /// Argument expression
    pub expr: Expr,
}

impl Arg {
    /// By-value argument
    #[must_use]
    pub fn value(expr: Expr) -> Self {
        Self {
            mode: PassMode::Value,
            expr,
        }
    }
}

/// Binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// `==`
    Eq,
    /// `!=`
    NotEq,
    /// `||`
    Or,
    /// `|`
    BitOr,
}

impl BinaryOp {
    /// Operator token
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Or => "||",
            Self::BitOr => "|",
        }
    }
}

/// Expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Constant
    Literal(Literal),
    /// Local variable, parameter or field
    Var(String),
    /// `this`
    This,
    /// Type used as an expression target (static access)
    Type(TypeRef),
    /// Member access
    Member {
        /// Accessed object
        target: Box<Expr>,
        /// Member name
        name: String,
    },
    /// Indexer access
    Index {
        /// Indexed object
        target: Box<Expr>,
        /// Index arguments
        index: Vec<Expr>,
    },
    /// Method call
    Call {
        /// Receiver
        target: Box<Expr>,
        /// Method name
        method: String,
        /// Arguments
        args: Vec<Arg>,
    },
    /// Object construction
    New {
        /// Constructed type
        ty: TypeRef,
        /// Constructor arguments
        args: Vec<Expr>,
    },
    /// Array of a fixed length
    NewArray {
        /// Element type
        element: TypeRef,
        /// Length
        length: usize,
    },
    /// Array with initializer
    ArrayInit {
        /// Element type
        element: TypeRef,
        /// Items
        items: Vec<Expr>,
    },
    /// Type cast
    Cast {
        /// Target type
        ty: TypeRef,
        /// Converted value
        expr: Box<Expr>,
    },
    /// Binary operation
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        left: Box<Expr>,
        /// Right operand
        right: Box<Expr>,
    },
    /// Logical negation
    Not(Box<Expr>),
    /// Runtime type handle (`typeof`)
    TypeOf(TypeRef),
    /// Default value of a type
    Default(TypeRef),
}

impl Expr {
    /// `null`
    #[must_use]
    pub fn null() -> Self {
        Self::Literal(Literal::Null)
    }

    /// String literal
    #[must_use]
    pub fn string(s: impl Into<String>) -> Self {
        Self::Literal(Literal::String(s.into()))
    }

    /// Variable reference
    #[must_use]
    pub fn var(name: impl Into<String>) -> Self {
        Self::Var(name.into())
    }

    /// Static member of a type
    #[must_use]
    pub fn static_member(ty: &str, name: impl Into<String>) -> Self {
        Self::Type(TypeRef::named(ty)).member(name)
    }

    /// Member access on this expression
    #[must_use]
    pub fn member(self, name: impl Into<String>) -> Self {
        Self::Member {
            target: Box::new(self),
            name: name.into(),
        }
    }

    /// Call a method on this expression with by-value arguments
    #[must_use]
    pub fn call(self, method: impl Into<String>, args: Vec<Expr>) -> Self {
        self.call_with(method, args.into_iter().map(Arg::value).collect())
    }

    /// Call a method on this expression
    #[must_use]
    pub fn call_with(self, method: impl Into<String>, args: Vec<Arg>) -> Self {
        Self::Call {
            target: Box::new(self),
            method: method.into(),
            args,
        }
    }

    /// Construct `ty`
    #[must_use]
    pub fn new_object(ty: TypeRef, args: Vec<Expr>) -> Self {
        Self::New { ty, args }
    }

    /// Binary operation
    #[must_use]
    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Self::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Whether the expression is a constant
    #[inline]
    #[must_use]
    pub fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_))
    }
}

/// Statement
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Local declaration, optionally initialized
    Declare {
        /// Declared type
        ty: TypeRef,
        /// Variable name
        name: String,
        /// Initializer
        init: Option<Expr>,
    },
    /// Assignment
    Assign {
        /// Assigned location
        target: Expr,
        /// New value
        value: Expr,
    },
    /// Expression evaluated for its effect
    Expr(Expr),
    /// Return from the method
    Return(Option<Expr>),
    /// Conditional
    If {
        /// Condition
        cond: Expr,
        /// Taken branch
        then: Vec<Stmt>,
        /// Other branch
        otherwise: Vec<Stmt>,
    },
    /// Mutual exclusion region
    Lock {
        /// Lock object
        target: Expr,
        /// Guarded statements
        body: Vec<Stmt>,
    },
    /// `try`/`finally`
    TryFinally {
        /// Protected statements
        body: Vec<Stmt>,
        /// Always-run statements
        finally: Vec<Stmt>,
    },
    /// Line comment
    Comment(String),
}

/// Member accessibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Access {
    /// `public`
    Public,
    /// `private`
    #[default]
    Private,
    /// `internal`
    Internal,
}

impl Access {
    /// Modifier keyword
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::Internal => "internal",
        }
    }
}

/// Formal parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    /// Passing mode
    pub mode: PassMode,
    /// Parameter type
    pub ty: TypeRef,
    /// Parameter name
    pub name: String,
}

/// Field declaration
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    /// Accessibility
    pub access: Access,
    /// `static`
    pub is_static: bool,
    /// Field type
    pub ty: TypeRef,
    /// Field name
    pub name: String,
    /// Initializer
    pub init: Option<Expr>,
}

/// Auto-implemented property
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDecl {
    /// Accessibility
    pub access: Access,
    /// Property type
    pub ty: TypeRef,
    /// Property name
    pub name: String,
}

/// Method declaration
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDecl {
    /// Attributes, without brackets
    pub attributes: Vec<String>,
    /// Accessibility
    pub access: Access,
    /// `static`
    pub is_static: bool,
    /// Return type, `None` for void
    pub returns: Option<TypeRef>,
    /// Method name
    pub name: String,
    /// Formal parameters
    pub params: Vec<Param>,
    /// Body
    pub body: Vec<Stmt>,
}

impl MethodDecl {
    /// Private void method without parameters
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            attributes: Vec::new(),
            access: Access::Private,
            is_static: false,
            returns: None,
            name: name.into(),
            params: Vec::new(),
            body: Vec::new(),
        }
    }
}

/// Class member
#[derive(Debug, Clone, PartialEq)]
pub enum Member {
    /// Field
    Field(FieldDecl),
    /// Property
    Property(PropertyDecl),
    /// Method
    Method(MethodDecl),
}

/// Class declaration
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    /// Attributes, without brackets
    pub attributes: Vec<String>,
    /// Accessibility
    pub access: Access,
    /// `partial`
    pub is_partial: bool,
    /// Class name
    pub name: String,
    /// Members in declaration order
    pub members: Vec<Member>,
}

/// One output file
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompilationUnit {
    /// Leading comment lines
    pub header: Vec<String>,
    /// Imported namespaces
    pub usings: Vec<String>,
    /// Enclosing namespace
    pub namespace: String,
    /// Declared classes
    pub classes: Vec<ClassDecl>,
}
