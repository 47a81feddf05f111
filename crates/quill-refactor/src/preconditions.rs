//! Checks that rule a request out before anything is rewritten.

use quill_config::InlineOptions;
use quill_resolve::{body_of, enclosing_class, params_of};
use quill_syntax::{ClassKind, NodeId, Tree};

use crate::entity::{Entity, EntityKind};
use crate::error::PreconditionFailure;
use crate::occurrence::{Usage, UsageClass};
use crate::transform::ctor::delegation_of;
use crate::transform::value::value_source;

/// Properties of the declaration itself.
pub fn check_declaration(tree: &Tree, entity: &Entity) -> Result<(), PreconditionFailure> {
    let name = entity.name.clone();
    match entity.kind {
        EntityKind::Field => {
            if !entity.is_final(tree) && !in_interface(tree, entity.decl) {
                return Err(PreconditionFailure::NotFinalField { name });
            }
            value_source(tree, entity).map(drop)
        }
        EntityKind::Local | EntityKind::Parameter | EntityKind::PatternBinding => {
            value_source(tree, entity).map(drop)
        }
        EntityKind::Method => {
            let data = tree
                .kind(entity.decl)
                .method_data()
                .ok_or(PreconditionFailure::NoDeclaration)?;
            if data.modifiers.is_abstract || body_of(tree, entity.decl).is_none() {
                return Err(PreconditionFailure::NoBody { name });
            }
            if data.type_params.is_some() {
                return Err(PreconditionFailure::GenericMethod { name });
            }
            Ok(())
        }
        EntityKind::Constructor => {
            let class = enclosing_class(tree, entity.decl)
                .and_then(|c| tree.kind(c).class_data())
                .map(|d| d.name.clone())
                .unwrap_or(name);
            if delegation_of(tree, entity.decl).is_none() {
                return Err(PreconditionFailure::NotChainingConstructor { name: class });
            }
            let varargs = params_of(tree, entity.decl)
                .last()
                .and_then(|&p| tree.kind(p).var_data())
                .is_some_and(|d| d.varargs);
            if varargs {
                return Err(PreconditionFailure::VarargsConstructor { name: class });
            }
            Ok(())
        }
    }
}

/// Interface fields are implicitly final.
fn in_interface(tree: &Tree, decl: NodeId) -> bool {
    enclosing_class(tree, decl)
        .and_then(|c| tree.kind(c).class_data())
        .is_some_and(|d| d.kind == ClassKind::Interface)
}

/// Properties of the classified occurrences.
pub fn check_usages(
    entity: &Entity,
    usages: &[Usage],
    options: &InlineOptions,
    reference: Option<NodeId>,
) -> Result<(), PreconditionFailure> {
    let name = entity.name.clone();
    let code: Vec<&Usage> = usages.iter().filter(|u| u.class.is_code()).collect();

    match reference {
        Some(reference) => {
            if !code.iter().any(|u| u.node() == Some(reference)) {
                return Err(PreconditionFailure::ReferenceNotFound { name });
            }
        }
        None if options.inline_this_only => {
            return Err(PreconditionFailure::ReferenceNotFound { name });
        }
        None => {}
    }

    if code.is_empty() && entity.kind != EntityKind::Parameter {
        return Err(PreconditionFailure::NeverUsed { name });
    }

    if entity.kind.is_value() {
        let selected = reference.and_then(|r| code.iter().find(|u| u.node() == Some(r)));
        if options.inline_this_only {
            if selected.is_some_and(|u| u.class.is_write()) {
                return Err(PreconditionFailure::WriteOccurrence { name });
            }
        } else if code.iter().any(|u| u.class.is_write()) {
            return Err(PreconditionFailure::WrittenVariable { name });
        }
    }

    tracing::trace!(
        target: "quill.refactor",
        name = %entity.name,
        reads = code.iter().filter(|u| u.class == UsageClass::Read).count(),
        "preconditions hold"
    );
    Ok(())
}
