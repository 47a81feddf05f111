//! Lexical name resolution for variables.
//!
//! Resolution walks outward from the use site. Blocks contribute locals
//! declared before the use, callables contribute parameters, class bodies
//! contribute (inherited) fields, and conditions contribute pattern bindings
//! in the branches where the pattern is known to have matched.

use quill_syntax::{BinaryOp, NodeId, NodeKind, Tree, UnaryOp};

use crate::members::find_field;

/// Resolves a `Name` expression to the declaration of the variable it reads.
///
/// Returns `None` for names that denote a type or package, or that are not
/// declared in the tree.
pub fn resolve_name(tree: &Tree, name: NodeId) -> Option<NodeId> {
    match tree.kind(name) {
        NodeKind::Name { ident } => resolve_ident_at(tree, name, ident),
        _ => None,
    }
}

/// Declaration `ident` would resolve to if written at `at`.
pub fn resolve_ident_at(tree: &Tree, at: NodeId, ident: &str) -> Option<NodeId> {
    let mut prev = at;
    for scope in tree.ancestors(at) {
        if let Some(decl) = lookup_in(tree, scope, prev, ident) {
            return Some(decl);
        }
        prev = scope;
    }
    None
}

/// Looks `ident` up among the declarations `scope` makes visible to its
/// child `from`.
fn lookup_in(tree: &Tree, scope: NodeId, from: NodeId, ident: &str) -> Option<NodeId> {
    let children = tree.children(scope);
    let index = children.iter().position(|&c| c == from)?;
    let named = |id: NodeId| tree.kind(id).declared_name() == Some(ident);
    match tree.kind(scope) {
        NodeKind::Block => children[..index].iter().rev().find_map(|&stmt| {
            if matches!(tree.kind(stmt), NodeKind::LocalVar(_)) && named(stmt) {
                return Some(stmt);
            }
            guard_bindings(tree, stmt)
                .into_iter()
                .find(|&b| named(b))
        }),
        NodeKind::ForInit => children[..index]
            .iter()
            .rev()
            .copied()
            .find(|&c| matches!(tree.kind(c), NodeKind::LocalVar(_)) && named(c)),
        NodeKind::For { has_condition } => {
            let init = children.first().copied()?;
            if from == init {
                return None;
            }
            if let Some(found) = tree
                .children(init)
                .iter()
                .copied()
                .find(|&c| matches!(tree.kind(c), NodeKind::LocalVar(_)) && named(c))
            {
                return Some(found);
            }
            if *has_condition && index >= 2 {
                return condition_bindings(tree, children[1], true)
                    .into_iter()
                    .find(|&b| named(b));
            }
            None
        }
        NodeKind::ForEach(_) if index == 1 && named(scope) => Some(scope),
        NodeKind::Catch(_) if named(scope) => Some(scope),
        NodeKind::Lambda { param_count, .. } => children[..*param_count]
            .iter()
            .copied()
            .find(|&p| named(p)),
        NodeKind::Method(_) | NodeKind::Constructor(_) => children
            .iter()
            .copied()
            .find(|&p| matches!(tree.kind(p), NodeKind::Param(_)) && named(p)),
        NodeKind::Class(_) | NodeKind::AnonymousClass => find_field(tree, scope, ident),
        NodeKind::If if index > 0 => {
            condition_bindings(tree, children[0], index == 1)
                .into_iter()
                .find(|&b| named(b))
        }
        NodeKind::While if index == 1 => condition_bindings(tree, children[0], true)
            .into_iter()
            .find(|&b| named(b)),
        NodeKind::Conditional if index > 0 => {
            condition_bindings(tree, children[0], index == 1)
                .into_iter()
                .find(|&b| named(b))
        }
        NodeKind::Binary { op: BinaryOp::And } if index == 1 => {
            condition_bindings(tree, children[0], true)
                .into_iter()
                .find(|&b| named(b))
        }
        NodeKind::Binary { op: BinaryOp::Or } if index == 1 => {
            condition_bindings(tree, children[0], false)
                .into_iter()
                .find(|&b| named(b))
        }
        _ => None,
    }
}

/// Pattern bindings introduced by `cond` when it evaluates to `when_true`.
pub fn condition_bindings(tree: &Tree, cond: NodeId, when_true: bool) -> Vec<NodeId> {
    match tree.kind(cond) {
        NodeKind::InstanceOf {
            binding: Some(_), ..
        } if when_true => vec![cond],
        NodeKind::Paren => tree
            .child(cond, 0)
            .map(|inner| condition_bindings(tree, inner, when_true))
            .unwrap_or_default(),
        NodeKind::Unary { op: UnaryOp::Not } => tree
            .child(cond, 0)
            .map(|inner| condition_bindings(tree, inner, !when_true))
            .unwrap_or_default(),
        NodeKind::Binary { op } => {
            let joins = match op {
                BinaryOp::And => when_true,
                BinaryOp::Or => !when_true,
                _ => false,
            };
            if !joins {
                return Vec::new();
            }
            tree.children(cond)
                .iter()
                .flat_map(|&side| condition_bindings(tree, side, when_true))
                .collect()
        }
        _ => Vec::new(),
    }
}

/// Bindings a guard statement like `if (!(o instanceof T t)) return;`
/// introduces into the rest of its block.
fn guard_bindings(tree: &Tree, stmt: NodeId) -> Vec<NodeId> {
    if !matches!(tree.kind(stmt), NodeKind::If) || tree.children(stmt).len() != 2 {
        return Vec::new();
    }
    let (cond, then) = (tree.children(stmt)[0], tree.children(stmt)[1]);
    if completes_normally(tree, then) {
        return Vec::new();
    }
    condition_bindings(tree, cond, false)
}

/// Conservative check: `false` only for statements that certainly jump away.
pub fn completes_normally(tree: &Tree, stmt: NodeId) -> bool {
    match tree.kind(stmt) {
        NodeKind::Return
        | NodeKind::Throw
        | NodeKind::Break { .. }
        | NodeKind::Continue { .. } => false,
        NodeKind::Block => tree
            .children(stmt)
            .last()
            .map_or(true, |&last| completes_normally(tree, last)),
        NodeKind::If => {
            let children = tree.children(stmt);
            children.len() != 3
                || completes_normally(tree, children[1])
                || completes_normally(tree, children[2])
        }
        _ => true,
    }
}

/// Every variable declared inside `root`, pattern bindings included.
pub fn declarations_in(tree: &Tree, root: NodeId) -> Vec<NodeId> {
    tree.descendants(root)
        .into_iter()
        .filter(|&n| {
            matches!(
                tree.kind(n),
                NodeKind::LocalVar(_)
                    | NodeKind::Param(_)
                    | NodeKind::ForEach(_)
                    | NodeKind::Catch(_)
                    | NodeKind::InstanceOf {
                        binding: Some(_),
                        ..
                    }
            )
        })
        .collect()
}

/// Whether `decl` is a local variable, parameter or pattern binding (as
/// opposed to a field).
pub fn is_local_decl(tree: &Tree, decl: NodeId) -> bool {
    matches!(
        tree.kind(decl),
        NodeKind::LocalVar(_)
            | NodeKind::Param(_)
            | NodeKind::ForEach(_)
            | NodeKind::Catch(_)
            | NodeKind::InstanceOf { .. }
    )
}
