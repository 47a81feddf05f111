//! Node kinds of the Java syntax tree.
//!
//! Children are stored positionally on the owning [`crate::Node`]; the
//! comments on each variant describe the child layout.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Visibility {
    Private,
    #[default]
    PackagePrivate,
    Protected,
    Public,
}

impl Visibility {
    pub fn keyword(self) -> Option<&'static str> {
        match self {
            Visibility::Private => Some("private"),
            Visibility::PackagePrivate => None,
            Visibility::Protected => Some("protected"),
            Visibility::Public => Some("public"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub visibility: Visibility,
    pub is_abstract: bool,
    pub is_static: bool,
    pub is_final: bool,
    pub is_transient: bool,
    pub is_volatile: bool,
    pub is_synchronized: bool,
    pub is_native: bool,
    pub is_default: bool,
    /// Annotation names without the leading `@` (arguments are not kept).
    pub annotations: Vec<String>,
}

impl Modifiers {
    /// Modifier keywords in canonical Java order.
    pub fn keywords(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if let Some(kw) = self.visibility.keyword() {
            out.push(kw);
        }
        if self.is_abstract {
            out.push("abstract");
        }
        if self.is_default {
            out.push("default");
        }
        if self.is_static {
            out.push("static");
        }
        if self.is_final {
            out.push("final");
        }
        if self.is_transient {
            out.push("transient");
        }
        if self.is_volatile {
            out.push("volatile");
        }
        if self.is_synchronized {
            out.push("synchronized");
        }
        if self.is_native {
            out.push("native");
        }
        out
    }

    pub fn final_only() -> Self {
        Modifiers {
            is_final: true,
            ..Modifiers::default()
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassKind {
    Class,
    Interface,
    Enum,
}

impl ClassKind {
    pub fn keyword(self) -> &'static str {
        match self {
            ClassKind::Class => "class",
            ClassKind::Interface => "interface",
            ClassKind::Enum => "enum",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassData {
    pub name: String,
    pub kind: ClassKind,
    pub modifiers: Modifiers,
    /// Raw type parameter list including the angle brackets, e.g. `<T extends Number>`.
    pub type_params: Option<String>,
    pub extends: Option<String>,
    /// Implemented interfaces (or extended interfaces for an interface).
    pub implements: Vec<String>,
    pub doc: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodData {
    pub name: String,
    /// `None` for constructors.
    pub return_ty: Option<String>,
    pub modifiers: Modifiers,
    pub type_params: Option<String>,
    pub throws: Vec<String>,
    pub doc: Option<String>,
}

impl MethodData {
    pub fn is_void(&self) -> bool {
        self.return_ty.as_deref() == Some("void")
    }
}

/// Shared payload of every variable-like declaration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarData {
    pub name: String,
    /// Declared type text. Empty for implicitly typed lambda parameters.
    pub ty: String,
    pub modifiers: Modifiers,
    pub varargs: bool,
    pub doc: Option<String>,
}

impl VarData {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        VarData {
            name: name.into(),
            ty: ty.into(),
            modifiers: Modifiers::default(),
            varargs: false,
            doc: None,
        }
    }

    pub fn has_explicit_type(&self) -> bool {
        !self.ty.is_empty()
    }

    /// The type as seen inside the body (`T...` is `T[]`).
    pub fn effective_ty(&self) -> String {
        if self.varargs {
            format!("{}[]", self.ty)
        } else {
            self.ty.clone()
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LiteralKind {
    Int,
    Long,
    Float,
    Double,
    Char,
    String,
    Bool,
    Null,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Plus,
    Minus,
    Not,
    BitNot,
    PreInc,
    PreDec,
    PostInc,
    PostDec,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Plus => "+",
            UnaryOp::Minus => "-",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
            UnaryOp::PreInc | UnaryOp::PostInc => "++",
            UnaryOp::PreDec | UnaryOp::PostDec => "--",
        }
    }

    pub fn is_postfix(self) -> bool {
        matches!(self, UnaryOp::PostInc | UnaryOp::PostDec)
    }

    pub fn is_increment(self) -> bool {
        matches!(
            self,
            UnaryOp::PreInc | UnaryOp::PreDec | UnaryOp::PostInc | UnaryOp::PostDec
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Or,
    And,
    BitOr,
    BitXor,
    BitAnd,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Shl,
    Shr,
    UShr,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::BitAnd => "&",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::UShr => ">>>",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
        }
    }

    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 3,
            BinaryOp::And => 4,
            BinaryOp::BitOr => 5,
            BinaryOp::BitXor => 6,
            BinaryOp::BitAnd => 7,
            BinaryOp::Eq | BinaryOp::Ne => 8,
            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge => 9,
            BinaryOp::Shl | BinaryOp::Shr | BinaryOp::UShr => 10,
            BinaryOp::Add | BinaryOp::Sub => 11,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 12,
        }
    }

    /// `&&` and `||` evaluate their right operand conditionally.
    pub fn is_short_circuit(self) -> bool {
        matches!(self, BinaryOp::Or | BinaryOp::And)
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::Ne
                | BinaryOp::Lt
                | BinaryOp::Gt
                | BinaryOp::Le
                | BinaryOp::Ge
                | BinaryOp::Or
                | BinaryOp::And
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    UShr,
}

impl AssignOp {
    pub fn symbol(self) -> &'static str {
        match self {
            AssignOp::Assign => "=",
            AssignOp::Add => "+=",
            AssignOp::Sub => "-=",
            AssignOp::Mul => "*=",
            AssignOp::Div => "/=",
            AssignOp::Rem => "%=",
            AssignOp::BitAnd => "&=",
            AssignOp::BitOr => "|=",
            AssignOp::BitXor => "^=",
            AssignOp::Shl => "<<=",
            AssignOp::Shr => ">>=",
            AssignOp::UShr => ">>>=",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    /// Children: type declarations.
    CompilationUnit {
        package: Option<String>,
        imports: Vec<String>,
    },
    /// Children: members (fields, methods, constructors, initializers,
    /// nested classes, enum constants first for enums).
    Class(ClassData),
    /// Body of `new T(..) { .. }`. Children: members.
    AnonymousClass,
    /// Children: arguments.
    EnumConstant { name: String, doc: Option<String> },
    /// Children: `[initializer]`.
    Field(VarData),
    /// Children: params..., `[Block]`.
    Method(MethodData),
    /// Children: params..., Block.
    Constructor(MethodData),
    Param(VarData),
    /// Children: Block.
    Initializer { is_static: bool },

    /// Children: statements.
    Block,
    /// Children: `[initializer]`.
    LocalVar(VarData),
    /// Children: expression.
    ExprStmt,
    /// Children: `[expression]`.
    Return,
    /// Children: condition, then, `[else]`.
    If,
    /// Children: condition, body.
    While,
    /// Children: body, condition.
    DoWhile,
    /// Children: ForInit, `[condition]`, ForUpdate, body.
    For { has_condition: bool },
    /// Children: LocalVar or ExprStmt nodes.
    ForInit,
    /// Children: expressions.
    ForUpdate,
    /// Children: iterable expression, body.
    ForEach(VarData),
    /// Children: statement.
    Labeled { label: String },
    /// Children: lock expression, Block.
    Synchronized,
    /// Children: expression.
    Throw,
    /// Children: Block, Catch..., `[Block]` (finally).
    Try { has_finally: bool },
    /// Children: Block. The payload declares the caught exception.
    Catch(VarData),
    Break { label: Option<String> },
    Continue { label: Option<String> },
    Empty,
    /// A line or block comment kept verbatim, markers included.
    Comment { text: String },

    Literal { kind: LiteralKind, text: String },
    Name { ident: String },
    /// Children: receiver.
    FieldAccess { name: String },
    /// Children: `[receiver]`, arguments...
    MethodCall { name: String, has_receiver: bool },
    /// `this(..)` / `super(..)`. Children: arguments.
    CtorCall { is_super: bool },
    /// Children: arguments..., `[AnonymousClass]`.
    New { ty: String, has_body: bool },
    /// Children: dimension expressions... or a single ArrayInit.
    NewArray { ty: String, dims: usize, has_init: bool },
    /// Children: elements.
    ArrayInit,
    /// Children: operand.
    Unary { op: UnaryOp },
    /// Children: lhs, rhs.
    Binary { op: BinaryOp },
    /// Children: target, value.
    Assign { op: AssignOp },
    /// Children: condition, then, else.
    Conditional,
    /// Children: operand.
    Cast { ty: String },
    /// Children: expression.
    Paren,
    /// Children: array, index.
    ArrayAccess,
    This { qualifier: Option<String> },
    Super { qualifier: Option<String> },
    ClassLiteral { ty: String },
    /// Children: operand. A pattern binding declares `binding`.
    InstanceOf { ty: String, binding: Option<String> },
    /// Children: params..., body (expression or Block).
    Lambda { param_count: usize, parenthesized: bool },
    /// Children: receiver.
    MethodRef { name: String },
}

impl NodeKind {
    pub fn is_statement(&self) -> bool {
        matches!(
            self,
            NodeKind::Block
                | NodeKind::LocalVar(_)
                | NodeKind::ExprStmt
                | NodeKind::Return
                | NodeKind::If
                | NodeKind::While
                | NodeKind::DoWhile
                | NodeKind::For { .. }
                | NodeKind::ForEach(_)
                | NodeKind::Labeled { .. }
                | NodeKind::Synchronized
                | NodeKind::Throw
                | NodeKind::Try { .. }
                | NodeKind::Break { .. }
                | NodeKind::Continue { .. }
                | NodeKind::Empty
                | NodeKind::Comment { .. }
        )
    }

    pub fn is_expression(&self) -> bool {
        matches!(
            self,
            NodeKind::Literal { .. }
                | NodeKind::Name { .. }
                | NodeKind::FieldAccess { .. }
                | NodeKind::MethodCall { .. }
                | NodeKind::CtorCall { .. }
                | NodeKind::New { .. }
                | NodeKind::NewArray { .. }
                | NodeKind::ArrayInit
                | NodeKind::Unary { .. }
                | NodeKind::Binary { .. }
                | NodeKind::Assign { .. }
                | NodeKind::Conditional
                | NodeKind::Cast { .. }
                | NodeKind::Paren
                | NodeKind::ArrayAccess
                | NodeKind::This { .. }
                | NodeKind::Super { .. }
                | NodeKind::ClassLiteral { .. }
                | NodeKind::InstanceOf { .. }
                | NodeKind::Lambda { .. }
                | NodeKind::MethodRef { .. }
        )
    }

    pub fn is_loop(&self) -> bool {
        matches!(
            self,
            NodeKind::While | NodeKind::DoWhile | NodeKind::For { .. } | NodeKind::ForEach(_)
        )
    }

    /// Class-like containers whose members form a new `this` scope.
    pub fn is_type_body(&self) -> bool {
        matches!(self, NodeKind::Class(_) | NodeKind::AnonymousClass)
    }

    pub fn is_member(&self) -> bool {
        matches!(
            self,
            NodeKind::Field(_)
                | NodeKind::Method(_)
                | NodeKind::Constructor(_)
                | NodeKind::Initializer { .. }
                | NodeKind::Class(_)
                | NodeKind::EnumConstant { .. }
        )
    }

    /// Declarations that introduce a variable binding.
    pub fn var_data(&self) -> Option<&VarData> {
        match self {
            NodeKind::Field(data)
            | NodeKind::LocalVar(data)
            | NodeKind::Param(data)
            | NodeKind::ForEach(data)
            | NodeKind::Catch(data) => Some(data),
            _ => None,
        }
    }

    pub fn var_data_mut(&mut self) -> Option<&mut VarData> {
        match self {
            NodeKind::Field(data)
            | NodeKind::LocalVar(data)
            | NodeKind::Param(data)
            | NodeKind::ForEach(data)
            | NodeKind::Catch(data) => Some(data),
            _ => None,
        }
    }

    pub fn method_data(&self) -> Option<&MethodData> {
        match self {
            NodeKind::Method(data) | NodeKind::Constructor(data) => Some(data),
            _ => None,
        }
    }

    pub fn class_data(&self) -> Option<&ClassData> {
        match self {
            NodeKind::Class(data) => Some(data),
            _ => None,
        }
    }

    /// The name introduced by a declaration node.
    pub fn declared_name(&self) -> Option<&str> {
        match self {
            NodeKind::Class(data) => Some(&data.name),
            NodeKind::Method(data) | NodeKind::Constructor(data) => Some(&data.name),
            NodeKind::EnumConstant { name, .. } => Some(name),
            NodeKind::InstanceOf {
                binding: Some(name),
                ..
            } => Some(name),
            other => other.var_data().map(|data| data.name.as_str()),
        }
    }

    pub fn modifiers(&self) -> Option<&Modifiers> {
        match self {
            NodeKind::Class(data) => Some(&data.modifiers),
            NodeKind::Method(data) | NodeKind::Constructor(data) => Some(&data.modifiers),
            other => other.var_data().map(|data| &data.modifiers),
        }
    }

    pub fn modifiers_mut(&mut self) -> Option<&mut Modifiers> {
        match self {
            NodeKind::Class(data) => Some(&mut data.modifiers),
            NodeKind::Method(data) | NodeKind::Constructor(data) => Some(&mut data.modifiers),
            other => other.var_data_mut().map(|data| &mut data.modifiers),
        }
    }

    pub fn doc(&self) -> Option<&str> {
        match self {
            NodeKind::Class(data) => data.doc.as_deref(),
            NodeKind::Method(data) | NodeKind::Constructor(data) => data.doc.as_deref(),
            NodeKind::EnumConstant { doc, .. } => doc.as_deref(),
            NodeKind::Field(data) => data.doc.as_deref(),
            _ => None,
        }
    }

    pub fn doc_mut(&mut self) -> Option<&mut Option<String>> {
        match self {
            NodeKind::Class(data) => Some(&mut data.doc),
            NodeKind::Method(data) | NodeKind::Constructor(data) => Some(&mut data.doc),
            NodeKind::EnumConstant { doc, .. } => Some(doc),
            NodeKind::Field(data) => Some(&mut data.doc),
            _ => None,
        }
    }
}
