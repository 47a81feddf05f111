//! Inlining of constructors that only delegate with `this(..)`: every
//! `new T(..)`, `this(..)` and `super(..)` that calls the constructor passes
//! the delegated arguments instead.

use quill_resolve::{call_args, params_of, references_in};
use quill_syntax::{make, print_node, DocumentOrder, NodeId, NodeKind, Tree};

use crate::conflicts::{move_kind, ConflictKind};
use crate::entity::Entity;
use crate::error::InlineError;
use crate::occurrence::{Usage, UsageClass};
use crate::safety::has_side_effects;
use crate::scope::{apply_move, check_move, expected_bindings, verify_bindings, Receiver};
use crate::transform::{reverse_document_order, site_ready, Rewriter, TransformResult};

/// The `this(..)` call a constructor body consists of.
pub fn delegation_of(tree: &Tree, ctor: NodeId) -> Option<NodeId> {
    let body = quill_resolve::body_of(tree, ctor)?;
    let [stmt] = tree.children(body) else {
        return None;
    };
    if !matches!(tree.kind(*stmt), NodeKind::ExprStmt) {
        return None;
    }
    let call = tree.child(*stmt, 0)?;
    matches!(tree.kind(call), NodeKind::CtorCall { is_super: false }).then_some(call)
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CtorPlan {
    pub delegation: Option<NodeId>,
    pub problems: Vec<(ConflictKind, String)>,
}

pub fn plan_ctor_call(tree: &Tree, site: NodeId, ctor: NodeId) -> CtorPlan {
    let mut plan = CtorPlan::default();
    let Some(delegation) = delegation_of(tree, ctor) else {
        plan.problems.push((
            ConflictKind::UnsupportedPosition,
            "the constructor does more than delegate to another constructor".to_string(),
        ));
        return plan;
    };
    plan.delegation = Some(delegation);

    let params = params_of(tree, ctor);
    let args = call_args(tree, site);
    if args.len() != params.len() {
        plan.problems.push((
            ConflictKind::UnsupportedPosition,
            format!(
                "the call passes {} argument(s) for {} parameter(s)",
                args.len(),
                params.len()
            ),
        ));
        return plan;
    }

    let mut effect_refs = Vec::new();
    for (&param, &arg) in params.iter().zip(&args) {
        if !has_side_effects(tree, arg) {
            continue;
        }
        let refs = references_in(tree, delegation, param);
        match refs.as_slice() {
            [only] => effect_refs.push(only.node),
            _ => plan.problems.push((
                ConflictKind::SideEffect,
                format!(
                    "`{}` would be evaluated {} times",
                    print_node(tree, arg),
                    refs.len()
                ),
            )),
        }
    }
    let order = DocumentOrder::new(tree, delegation);
    if effect_refs
        .windows(2)
        .any(|pair| !order.precedes(pair[0], pair[1]))
    {
        plan.problems.push((
            ConflictKind::EvaluationOrder,
            "arguments with side effects would be evaluated in another order".to_string(),
        ));
    }

    let analysis = check_move(tree, delegation, site, &Receiver::Implicit, &params);
    plan.problems.extend(
        analysis
            .problems
            .into_iter()
            .map(|p| (move_kind(p.kind), p.message)),
    );
    plan
}

pub(crate) fn inline_constructor(
    tree: &mut Tree,
    entity: &Entity,
    usages: &[Usage],
    rw: &Rewriter<'_>,
    result: &mut TransformResult,
) -> Result<(), InlineError> {
    let ctor = entity.decl;
    let delegation = delegation_of(tree, ctor)
        .ok_or_else(|| InlineError::invariant("constructor no longer delegates"))?;
    for site in reverse_document_order(tree, usages, UsageClass::is_code) {
        if !site_ready(tree, site) {
            result.skipped += 1;
            continue;
        }
        redirect(tree, ctor, delegation, site)?;
        result.inlined += 1;
    }
    if rw.should_delete(tree, entity, result) {
        tree.remove(ctor)?;
        result.declaration_removed = true;
        tracing::debug!(target: "quill.refactor", name = %entity.name, "removed constructor");
    }
    Ok(())
}

/// Gives `site` the delegated argument list with parameters substituted.
fn redirect(
    tree: &mut Tree,
    ctor: NodeId,
    delegation: NodeId,
    site: NodeId,
) -> Result<(), InlineError> {
    let params = params_of(tree, ctor);
    let args = call_args(tree, site);
    let analysis = check_move(tree, delegation, site, &Receiver::Implicit, &params);
    if let Some(problem) = analysis.problems.first() {
        return Err(InlineError::invariant(format!(
            "delegated arguments cannot move to the call: {}",
            problem.message
        )));
    }

    let mut expected = Vec::new();
    let mut new_args = Vec::new();
    for delegated in call_args(tree, delegation) {
        let param_refs: Vec<(usize, NodeId)> = params
            .iter()
            .enumerate()
            .flat_map(|(i, &p)| {
                references_in(tree, delegated, p)
                    .into_iter()
                    .map(move |r| (i, r.node))
            })
            .collect();
        let (copy, map) = tree.deep_copy_with_map(delegated);
        expected.extend(expected_bindings(tree, delegated, &map, &analysis, &params));
        let holder = make::paren(tree, copy);
        apply_move(tree, &analysis, &map)?;
        for (index, reference) in param_refs {
            let (Some(&target), Some(&arg)) = (map.get(&reference), args.get(index)) else {
                continue;
            };
            let value = tree.deep_copy(arg);
            let placed = make::replace_expr(tree, target, value)?;
            make::strip_redundant_paren(tree, placed)?;
        }
        let moved = tree
            .child(holder, 0)
            .ok_or_else(|| InlineError::invariant("copied argument lost its holder"))?;
        tree.detach(moved)?;
        tree.remove(holder)?;
        new_args.push(moved);
    }

    for arg in args {
        tree.remove(arg)?;
    }
    for (index, arg) in new_args.into_iter().enumerate() {
        tree.insert_child(site, index, arg)?;
    }

    let mismatched = verify_bindings(tree, &expected);
    if !mismatched.is_empty() {
        return Err(InlineError::invariant(format!(
            "{} name(s) changed meaning in the delegated arguments",
            mismatched.len()
        )));
    }
    tracing::debug!(
        target: "quill.refactor",
        call = %print_node(tree, site),
        "redirected constructor call"
    );
    Ok(())
}
