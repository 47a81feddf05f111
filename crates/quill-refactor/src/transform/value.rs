//! Inlining of locals, fields, parameters and pattern bindings: every read
//! is replaced by a copy of the value.

use std::sync::OnceLock;

use quill_resolve::{
    body_of, call_args, find_references, params_of, resolve_field_access, resolve_name,
};
use quill_syntax::{make, print_node, NodeId, NodeKind, Tree};
use regex::Regex;

use crate::entity::{Entity, EntityKind};
use crate::error::{InlineError, PreconditionFailure};
use crate::occurrence::{Usage, UsageClass};
use crate::scope::{apply_move, check_move, expected_bindings, verify_bindings, Receiver};
use crate::transform::{
    clean_up_references, make_final, reverse_document_order, site_ready, Rewriter,
    TransformResult,
};

/// Where the substituted value comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValueSource {
    /// The initializer of a local or field.
    Initializer(NodeId),
    /// `operand instanceof T binding`; reads become `(T) operand`.
    Pattern { operand: NodeId, ty: String },
    /// The argument every call passes for a parameter.
    Argument {
        arg: NodeId,
        index: usize,
        calls: Vec<NodeId>,
    },
}

impl ValueSource {
    pub fn expr(&self) -> NodeId {
        match self {
            ValueSource::Initializer(expr) => *expr,
            ValueSource::Pattern { operand, .. } => *operand,
            ValueSource::Argument { arg, .. } => *arg,
        }
    }
}

pub fn value_source(tree: &Tree, entity: &Entity) -> Result<ValueSource, PreconditionFailure> {
    let name = entity.name.clone();
    match entity.kind {
        EntityKind::Local | EntityKind::Field => {
            if tree
                .parent(entity.decl)
                .is_some_and(|p| matches!(tree.kind(p), NodeKind::ForInit))
            {
                return Err(PreconditionFailure::ForInitDeclaration { name });
            }
            let init = entity
                .initializer(tree)
                .ok_or_else(|| PreconditionFailure::NoInitializer { name: name.clone() })?;
            if matches!(tree.kind(init), NodeKind::ArrayInit) {
                return Err(PreconditionFailure::ArrayInitializer { name });
            }
            Ok(ValueSource::Initializer(init))
        }
        EntityKind::PatternBinding => match tree.kind(entity.decl) {
            NodeKind::InstanceOf { ty, .. } => {
                let operand = tree
                    .child(entity.decl, 0)
                    .ok_or(PreconditionFailure::NoDeclaration)?;
                Ok(ValueSource::Pattern {
                    operand,
                    ty: ty.clone(),
                })
            }
            _ => Err(PreconditionFailure::NoDeclaration),
        },
        EntityKind::Parameter => argument_source(tree, entity),
        EntityKind::Method | EntityKind::Constructor => Err(PreconditionFailure::NoDeclaration),
    }
}

fn argument_source(tree: &Tree, entity: &Entity) -> Result<ValueSource, PreconditionFailure> {
    let owner = entity.owner(tree).ok_or(PreconditionFailure::NoDeclaration)?;
    let method_name = tree
        .kind(owner)
        .declared_name()
        .unwrap_or_default()
        .to_string();
    if body_of(tree, owner).is_none() {
        return Err(PreconditionFailure::NoBody { name: method_name });
    }
    if tree.kind(entity.decl).var_data().is_some_and(|d| d.varargs) {
        return Err(PreconditionFailure::UnsupportedDeclaration {
            what: format!("varargs parameter `{}`", entity.name),
        });
    }
    let index = params_of(tree, owner)
        .iter()
        .position(|&p| p == entity.decl)
        .ok_or(PreconditionFailure::NoDeclaration)?;

    let mut calls = Vec::new();
    for reference in find_references(tree, owner) {
        if matches!(tree.kind(reference.node), NodeKind::MethodRef { .. }) {
            return Err(PreconditionFailure::UnsupportedDeclaration {
                what: format!(
                    "parameter `{}` of a method used as a method reference",
                    entity.name
                ),
            });
        }
        calls.push(reference.node);
    }
    if calls.is_empty() {
        return Err(PreconditionFailure::NeverUsed { name: method_name });
    }

    let differ = || PreconditionFailure::ArgumentsDiffer {
        name: entity.name.clone(),
    };
    let mut args = Vec::with_capacity(calls.len());
    for &call in &calls {
        args.push(*call_args(tree, call).get(index).ok_or_else(differ)?);
    }
    let first = args[0];
    let text = print_node(tree, first);
    if args.iter().any(|&arg| print_node(tree, arg) != text) {
        return Err(differ());
    }
    if !is_constant(tree, first) {
        return Err(PreconditionFailure::ArgumentNotConstant {
            name: entity.name.clone(),
        });
    }
    Ok(ValueSource::Argument {
        arg: first,
        index,
        calls,
    })
}

/// Literals, static final fields, enum constants and operators over them.
fn is_constant(tree: &Tree, expr: NodeId) -> bool {
    let constant_decl = |decl: Option<NodeId>| match decl.map(|d| tree.kind(d)) {
        Some(NodeKind::EnumConstant { .. }) => true,
        Some(NodeKind::Field(data)) => data.modifiers.is_static && data.modifiers.is_final,
        _ => false,
    };
    match tree.kind(expr) {
        NodeKind::Literal { .. } | NodeKind::ClassLiteral { .. } => true,
        NodeKind::Name { .. } => constant_decl(resolve_name(tree, expr)),
        NodeKind::FieldAccess { .. } => constant_decl(resolve_field_access(tree, expr)),
        NodeKind::Unary { op } if op.is_increment() => false,
        NodeKind::Unary { .. }
        | NodeKind::Binary { .. }
        | NodeKind::Paren
        | NodeKind::Cast { .. }
        | NodeKind::Conditional => tree
            .children(expr)
            .iter()
            .all(|&child| is_constant(tree, child)),
        _ => false,
    }
}

/// The object a moved field initializer runs on at `site`.
pub fn value_receiver(tree: &Tree, entity: &Entity, site: NodeId) -> Receiver {
    if entity.kind != EntityKind::Field {
        return Receiver::Implicit;
    }
    if !matches!(tree.kind(site), NodeKind::FieldAccess { .. }) {
        return Receiver::Implicit;
    }
    let Some(qualifier) = tree.child(site, 0) else {
        return Receiver::Implicit;
    };
    match tree.kind(qualifier) {
        NodeKind::This { qualifier: None } | NodeKind::Super { qualifier: None } => {
            Receiver::Implicit
        }
        NodeKind::Name { ident } if resolve_name(tree, qualifier).is_none() => {
            Receiver::Type(ident.clone())
        }
        _ => Receiver::Expr(qualifier),
    }
}

pub(crate) fn inline_value(
    tree: &mut Tree,
    entity: &Entity,
    usages: &[Usage],
    rw: &Rewriter<'_>,
    result: &mut TransformResult,
) -> Result<(), InlineError> {
    let source = value_source(tree, entity)?;
    let mut captured = Vec::new();
    for site in reverse_document_order(tree, usages, |class| class == UsageClass::Read) {
        if !site_ready(tree, site) {
            result.skipped += 1;
            continue;
        }
        captured.extend(inline_at(tree, entity, &source, site)?);
        result.inlined += 1;
    }
    make_final(tree, &captured)?;

    if rw.should_delete(tree, entity, result) {
        delete_declaration(tree, entity, &source)?;
        result.declaration_removed = true;
    }
    Ok(())
}

/// Replaces the read `site` with a copy of the value. Returns the variables
/// that have to become `final`.
fn inline_at(
    tree: &mut Tree,
    entity: &Entity,
    source: &ValueSource,
    site: NodeId,
) -> Result<Vec<NodeId>, InlineError> {
    let value = source.expr();
    let receiver = value_receiver(tree, entity, site);
    let analysis = check_move(tree, value, site, &receiver, &[]);
    if let Some(problem) = analysis.problems.first() {
        return Err(InlineError::invariant(format!(
            "value of `{}` cannot move to the occurrence: {}",
            entity.name, problem.message
        )));
    }

    let (copy, map) = tree.deep_copy_with_map(value);
    let expected = expected_bindings(tree, value, &map, &analysis, &[]);
    // The holder gives the copied root a parent so it can be requalified too.
    let holder = make::paren(tree, copy);
    apply_move(tree, &analysis, &map)?;
    let moved = tree
        .child(holder, 0)
        .ok_or_else(|| InlineError::invariant("copied value lost its holder"))?;
    tree.detach(moved)?;
    tree.remove(holder)?;

    let moved = match source {
        ValueSource::Pattern { ty, .. } => make::cast(tree, ty.clone(), moved),
        _ => moved,
    };
    let placed = make::replace_expr(tree, site, moved)?;
    make::strip_redundant_paren(tree, placed)?;

    let mismatched = verify_bindings(tree, &expected);
    if !mismatched.is_empty() {
        return Err(InlineError::invariant(format!(
            "{} name(s) changed meaning while inlining `{}`",
            mismatched.len(),
            entity.name
        )));
    }
    tracing::debug!(
        target: "quill.refactor",
        name = %entity.name,
        value = %print_node(tree, placed),
        "inlined value"
    );
    Ok(analysis.make_final)
}

fn param_doc_line(name: &str) -> Regex {
    Regex::new(&format!(r"(?m)^[ \t]*\*?[ \t]*@param[ \t]+{}\b.*\n?", regex::escape(name)))
        .expect("valid regex")
}

fn blank_doc() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^/\*\*[\s*]*\*/$").expect("valid regex"))
}

fn delete_declaration(
    tree: &mut Tree,
    entity: &Entity,
    source: &ValueSource,
) -> Result<(), InlineError> {
    match source {
        ValueSource::Pattern { .. } => {
            if let NodeKind::InstanceOf { binding, .. } = tree.kind_mut(entity.decl)? {
                *binding = None;
            }
        }
        ValueSource::Argument { index, calls, .. } => {
            for &call in calls {
                if !tree.is_alive(call) {
                    continue;
                }
                if let Some(&arg) = call_args(tree, call).get(*index) {
                    tree.remove(arg)?;
                }
            }
            let owner = entity
                .owner(tree)
                .ok_or_else(|| InlineError::invariant("parameter has no owner"))?;
            tree.remove(entity.decl)?;
            let doc = tree.kind(owner).doc().map(str::to_string);
            if let Some(doc) = doc {
                let trimmed = param_doc_line(&entity.name).replace_all(&doc, "").into_owned();
                if let Some(slot) = tree.kind_mut(owner)?.doc_mut() {
                    *slot = (!blank_doc().is_match(trimmed.trim())).then_some(trimmed);
                }
            }
        }
        ValueSource::Initializer(_) => {
            if entity.kind == EntityKind::Field {
                clean_up_references(tree, entity)?;
            }
            tree.remove(entity.decl)?;
        }
    }
    tracing::debug!(target: "quill.refactor", name = %entity.name, "removed declaration");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_doc_lines_are_dropped() {
        let doc = "/**\n * Scales.\n * @param factor the factor\n * @param value the value\n */";
        let out = param_doc_line("factor").replace_all(doc, "");
        assert_eq!(out, "/**\n * Scales.\n * @param value the value\n */");
        assert!(blank_doc().is_match("/**\n */"));
    }
}
