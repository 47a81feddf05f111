//! Node factories and operator-precedence aware substitution.
//!
//! All factories return detached subtrees; attach them with
//! [`Tree::insert_child`] or [`replace_expr`].

use crate::kind::{AssignOp, LiteralKind, NodeKind, VarData};
use crate::tree::{NodeId, Tree, TreeError};

pub const PREC_LAMBDA: u8 = 0;
pub const PREC_ASSIGN: u8 = 1;
pub const PREC_CONDITIONAL: u8 = 2;
pub const PREC_RELATIONAL: u8 = 9;
pub const PREC_UNARY: u8 = 13;
pub const PREC_POSTFIX: u8 = 14;
pub const PREC_PRIMARY: u8 = 15;

pub fn name(tree: &mut Tree, ident: impl Into<String>) -> NodeId {
    tree.alloc(NodeKind::Name {
        ident: ident.into(),
    })
}

pub fn literal(tree: &mut Tree, kind: LiteralKind, text: impl Into<String>) -> NodeId {
    tree.alloc(NodeKind::Literal {
        kind,
        text: text.into(),
    })
}

pub fn this(tree: &mut Tree, qualifier: Option<String>) -> NodeId {
    tree.alloc(NodeKind::This { qualifier })
}

pub fn field_access(tree: &mut Tree, receiver: NodeId, name: impl Into<String>) -> NodeId {
    let receiver = parenthesize(tree, receiver, PREC_PRIMARY);
    tree.build(NodeKind::FieldAccess { name: name.into() }, [receiver])
}

pub fn method_call(
    tree: &mut Tree,
    receiver: Option<NodeId>,
    name: impl Into<String>,
    args: Vec<NodeId>,
) -> NodeId {
    let has_receiver = receiver.is_some();
    let receiver = receiver.map(|r| parenthesize(tree, r, PREC_PRIMARY));
    let kind = NodeKind::MethodCall {
        name: name.into(),
        has_receiver,
    };
    tree.build(kind, receiver.into_iter().chain(args))
}

pub fn paren(tree: &mut Tree, expr: NodeId) -> NodeId {
    tree.build(NodeKind::Paren, [expr])
}

pub fn cast(tree: &mut Tree, ty: impl Into<String>, operand: NodeId) -> NodeId {
    let operand = parenthesize(tree, operand, PREC_UNARY);
    tree.build(NodeKind::Cast { ty: ty.into() }, [operand])
}

pub fn assign(tree: &mut Tree, target: NodeId, value: NodeId) -> NodeId {
    tree.build(NodeKind::Assign { op: AssignOp::Assign }, [target, value])
}

pub fn local_var(tree: &mut Tree, data: VarData, init: Option<NodeId>) -> NodeId {
    tree.build(NodeKind::LocalVar(data), init)
}

pub fn expr_stmt(tree: &mut Tree, expr: NodeId) -> NodeId {
    tree.build(NodeKind::ExprStmt, [expr])
}

pub fn return_stmt(tree: &mut Tree, value: Option<NodeId>) -> NodeId {
    tree.build(NodeKind::Return, value)
}

pub fn block(tree: &mut Tree, stmts: Vec<NodeId>) -> NodeId {
    tree.build(NodeKind::Block, stmts)
}

pub fn labeled(tree: &mut Tree, label: impl Into<String>, stmt: NodeId) -> NodeId {
    tree.build(
        NodeKind::Labeled {
            label: label.into(),
        },
        [stmt],
    )
}

pub fn break_stmt(tree: &mut Tree, label: Option<String>) -> NodeId {
    tree.alloc(NodeKind::Break { label })
}

pub fn synchronized(tree: &mut Tree, lock: NodeId, body: NodeId) -> NodeId {
    tree.build(NodeKind::Synchronized, [lock, body])
}

pub fn class_literal(tree: &mut Tree, ty: impl Into<String>) -> NodeId {
    tree.alloc(NodeKind::ClassLiteral { ty: ty.into() })
}

/// `new T[] {elements}`; `ty` is the element type.
pub fn new_array(tree: &mut Tree, ty: impl Into<String>, elements: Vec<NodeId>) -> NodeId {
    let init = tree.build(NodeKind::ArrayInit, elements);
    let kind = NodeKind::NewArray {
        ty: ty.into(),
        dims: 1,
        has_init: true,
    };
    tree.build(kind, [init])
}

pub fn lambda(tree: &mut Tree, params: Vec<VarData>, body: NodeId) -> NodeId {
    let parenthesized = params.len() != 1 || params.iter().any(VarData::has_explicit_type);
    let param_count = params.len();
    let mut children: Vec<NodeId> = params
        .into_iter()
        .map(|p| tree.alloc(NodeKind::Param(p)))
        .collect();
    children.push(body);
    tree.build(
        NodeKind::Lambda {
            param_count,
            parenthesized,
        },
        children,
    )
}

/// Binding strength of an expression node; higher binds tighter.
pub fn precedence(kind: &NodeKind) -> u8 {
    match kind {
        NodeKind::Lambda { .. } => PREC_LAMBDA,
        NodeKind::Assign { .. } => PREC_ASSIGN,
        NodeKind::Conditional => PREC_CONDITIONAL,
        NodeKind::Binary { op } => op.precedence(),
        NodeKind::InstanceOf { .. } => PREC_RELATIONAL,
        NodeKind::Unary { op } if op.is_postfix() => PREC_POSTFIX,
        NodeKind::Unary { .. } | NodeKind::Cast { .. } => PREC_UNARY,
        _ => PREC_PRIMARY,
    }
}

/// Minimum precedence an expression must have to sit in child slot `index`
/// of `parent` without parentheses.
pub fn required_precedence(tree: &Tree, parent: NodeId, index: usize) -> u8 {
    match tree.kind(parent) {
        NodeKind::Binary { op } if index == 0 => op.precedence(),
        NodeKind::Binary { op } => op.precedence() + 1,
        NodeKind::InstanceOf { .. } => PREC_RELATIONAL + 1,
        NodeKind::Unary { op } if op.is_postfix() => PREC_POSTFIX,
        NodeKind::Unary { .. } | NodeKind::Cast { .. } => PREC_UNARY,
        NodeKind::Conditional => match index {
            0 => PREC_CONDITIONAL + 1,
            1 => PREC_LAMBDA,
            _ => PREC_CONDITIONAL,
        },
        NodeKind::Assign { .. } if index == 0 => PREC_POSTFIX,
        NodeKind::FieldAccess { .. } | NodeKind::MethodRef { .. } => PREC_PRIMARY,
        NodeKind::MethodCall {
            has_receiver: true,
            ..
        } if index == 0 => PREC_PRIMARY,
        NodeKind::ArrayAccess if index == 0 => PREC_PRIMARY,
        _ => PREC_LAMBDA,
    }
}

pub fn needs_parens(tree: &Tree, expr: NodeId, parent: NodeId, index: usize) -> bool {
    tree.kind(expr).is_expression()
        && precedence(tree.kind(expr)) < required_precedence(tree, parent, index)
}

/// Wraps the detached `expr` in parentheses when it binds looser than `min`.
pub fn parenthesize(tree: &mut Tree, expr: NodeId, min: u8) -> NodeId {
    if precedence(tree.kind(expr)) < min {
        paren(tree, expr)
    } else {
        expr
    }
}

/// Replaces the expression `old` with the detached `new`, adding parentheses
/// when the surrounding operator would otherwise regroup it. Returns the node
/// now occupying the slot.
pub fn replace_expr(tree: &mut Tree, old: NodeId, new: NodeId) -> Result<NodeId, TreeError> {
    let parent = tree.parent(old).ok_or(TreeError::Detached(old))?;
    let index = tree.index_in_parent(old).ok_or(TreeError::Detached(old))?;
    let new = if needs_parens(tree, new, parent, index) {
        paren(tree, new)
    } else {
        new
    };
    tree.replace(old, new)?;
    Ok(new)
}

/// Drops parentheses around `paren` when its parent slot no longer needs them.
pub fn strip_redundant_paren(tree: &mut Tree, paren: NodeId) -> Result<NodeId, TreeError> {
    if !matches!(tree.kind(paren), NodeKind::Paren) {
        return Ok(paren);
    }
    let (Some(parent), Some(index)) = (tree.parent(paren), tree.index_in_parent(paren)) else {
        return Ok(paren);
    };
    let Some(inner) = tree.child(paren, 0) else {
        return Ok(paren);
    };
    if needs_parens(tree, inner, parent, index) {
        return Ok(paren);
    }
    tree.detach(inner)?;
    tree.replace(paren, inner)?;
    Ok(inner)
}
