//! Statement context for inlined bodies.
//!
//! A body that expands into several statements needs a block to land in:
//! single-statement branches and loop bodies get braces, and expression
//! lambdas get a block body. Both are undone after cleanup when the result
//! fits back into one statement or expression.

use quill_resolve::resolve_call;
use quill_syntax::{make, NodeId, NodeKind, Tree, TreeError};

/// Where statements produced for an expression are inserted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockContext {
    /// The statement containing the expression; its parent is a block.
    pub statement: NodeId,
    /// A block that was added around `statement`.
    pub wrapper: Option<NodeId>,
    /// An expression lambda whose body was turned into a block.
    pub lambda: Option<NodeId>,
}

/// Makes sure the statement containing `expr` sits directly in a block.
/// Returns `None` when `expr` is not inside any statement (a field
/// initializer, for instance).
pub fn ensure_block_context(
    tree: &mut Tree,
    expr: NodeId,
) -> Result<Option<BlockContext>, TreeError> {
    let mut current = expr;
    let mut lambda = None;
    let mut statement = loop {
        let Some(parent) = tree.parent(current) else {
            return Ok(None);
        };
        let is_lambda_body = match tree.kind(parent) {
            NodeKind::Lambda { param_count, .. } => {
                tree.index_in_parent(current) == Some(*param_count)
            }
            _ => false,
        };
        if is_lambda_body {
            let statement = lambda_body_to_block(tree, parent, current)?;
            lambda = Some(parent);
            break statement;
        }
        let kind = tree.kind(parent);
        if kind.is_member() || matches!(kind, NodeKind::Lambda { .. } | NodeKind::AnonymousClass) {
            return Ok(None);
        }
        if kind.is_statement() {
            break parent;
        }
        current = parent;
    };

    loop {
        let Some(parent) = tree.parent(statement) else {
            return Ok(None);
        };
        match tree.kind(parent) {
            NodeKind::ForInit => {
                statement = tree.parent(parent).ok_or(TreeError::Detached(parent))?;
            }
            NodeKind::Labeled { .. } => statement = parent,
            _ => break,
        }
    }

    let parent = tree.parent(statement).ok_or(TreeError::Detached(statement))?;
    if matches!(tree.kind(parent), NodeKind::Block) {
        return Ok(Some(BlockContext {
            statement,
            wrapper: None,
            lambda,
        }));
    }
    let wrapper = make::block(tree, Vec::new());
    tree.replace_keep(statement, wrapper)?;
    tree.append_child(wrapper, statement)?;
    tracing::trace!(target: "quill.refactor", ?wrapper, "added braces");
    Ok(Some(BlockContext {
        statement,
        wrapper: Some(wrapper),
        lambda,
    }))
}

/// `x -> e` becomes `x -> { return e; }`, or `x -> { e; }` when `e` calls a
/// void method. Returns the new statement.
fn lambda_body_to_block(
    tree: &mut Tree,
    lambda: NodeId,
    body: NodeId,
) -> Result<NodeId, TreeError> {
    let void = matches!(tree.kind(body), NodeKind::MethodCall { .. })
        && resolve_call(tree, body)
            .unique()
            .and_then(|m| tree.kind(m).method_data())
            .is_some_and(|d| d.is_void());
    tree.detach(body)?;
    let statement = if void {
        make::expr_stmt(tree, body)
    } else {
        make::return_stmt(tree, Some(body))
    };
    let block = make::block(tree, vec![statement]);
    tree.append_child(lambda, block)?;
    Ok(statement)
}

/// Removes added braces that hold a single statement again. Returns the
/// number of wrappers that had to stay.
pub fn unwrap_blocks(tree: &mut Tree, wrappers: &[NodeId]) -> Result<usize, TreeError> {
    let mut kept = 0;
    for &wrapper in wrappers {
        if !tree.is_alive(wrapper) || tree.parent(wrapper).is_none() {
            continue;
        }
        if !can_unwrap(tree, wrapper) {
            kept += 1;
            continue;
        }
        let inner = tree.children(wrapper)[0];
        tree.detach(inner)?;
        tree.replace(wrapper, inner)?;
    }
    Ok(kept)
}

fn can_unwrap(tree: &Tree, wrapper: NodeId) -> bool {
    let [inner] = tree.children(wrapper) else {
        return false;
    };
    if matches!(tree.kind(*inner), NodeKind::LocalVar(_)) {
        return false;
    }
    // `if (a) { if (b) x(); } else y();` must keep its braces.
    let is_then_branch = tree.parent(wrapper).is_some_and(|p| {
        matches!(tree.kind(p), NodeKind::If)
            && tree.children(p).len() == 3
            && tree.index_in_parent(wrapper) == Some(1)
    });
    !(is_then_branch && ends_with_open_if(tree, *inner))
}

/// Whether a trailing `else` after `stmt` would bind to an `if` inside it.
fn ends_with_open_if(tree: &Tree, stmt: NodeId) -> bool {
    let children = tree.children(stmt);
    match tree.kind(stmt) {
        NodeKind::If if children.len() == 2 => true,
        NodeKind::If
        | NodeKind::While
        | NodeKind::For { .. }
        | NodeKind::ForEach(_)
        | NodeKind::Labeled { .. } => children
            .last()
            .is_some_and(|&last| ends_with_open_if(tree, last)),
        _ => false,
    }
}

/// Turns `x -> { return e; }` and `x -> { e; }` back into `x -> e`.
pub fn simplify_lambda(tree: &mut Tree, lambda: NodeId) -> Result<(), TreeError> {
    if !tree.is_alive(lambda) {
        return Ok(());
    }
    let NodeKind::Lambda { param_count, .. } = tree.kind(lambda) else {
        return Ok(());
    };
    let Some(body) = tree.child(lambda, *param_count) else {
        return Ok(());
    };
    if !matches!(tree.kind(body), NodeKind::Block) {
        return Ok(());
    }
    let [statement] = tree.children(body) else {
        return Ok(());
    };
    let statement = *statement;
    let expr = match tree.kind(statement) {
        NodeKind::Return | NodeKind::ExprStmt => tree.child(statement, 0),
        _ => None,
    };
    let Some(expr) = expr else {
        return Ok(());
    };
    tree.detach(expr)?;
    tree.replace(body, expr)?;
    Ok(())
}
