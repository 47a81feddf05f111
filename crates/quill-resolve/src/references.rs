//! Code references to a declaration.

use quill_syntax::{NodeId, NodeKind, Tree};

use crate::members::{
    enclosing_member, resolve_call, resolve_field_access, resolve_method_ref, CallResolution,
};
use crate::scopes::{is_local_decl, resolve_name};

/// A node in code that refers to a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference {
    pub node: NodeId,
    /// The call resolves to several overloads, one of which is the target.
    pub ambiguous: bool,
}

/// All code references to `decl` across every Java file, in document order.
pub fn find_references(tree: &Tree, decl: NodeId) -> Vec<Reference> {
    if is_local_decl(tree, decl) {
        let scope = enclosing_member(tree, decl).unwrap_or_else(|| tree.root_of(decl));
        return references_in(tree, scope, decl);
    }
    tree.java_files()
        .flat_map(|(_, root)| references_in(tree, root, decl))
        .collect()
}

/// References to `decl` inside the subtree rooted at `scope`.
pub fn references_in(tree: &Tree, scope: NodeId, decl: NodeId) -> Vec<Reference> {
    let Some(name) = target_name(tree, decl) else {
        return Vec::new();
    };
    tree.descendants(scope)
        .into_iter()
        .filter_map(|node| reference_at(tree, node, decl, &name))
        .collect()
}

fn target_name(tree: &Tree, decl: NodeId) -> Option<String> {
    tree.kind(decl).declared_name().map(str::to_string)
}

fn reference_at(tree: &Tree, node: NodeId, decl: NodeId, name: &str) -> Option<Reference> {
    let resolution = match tree.kind(node) {
        NodeKind::Name { ident } if ident == name => {
            single(resolve_name(tree, node))
        }
        NodeKind::FieldAccess { name: n } if n == name => {
            single(resolve_field_access(tree, node))
        }
        NodeKind::MethodCall { name: n, .. } if n == name => resolve_call(tree, node),
        NodeKind::MethodRef { name: n } if n == name => resolve_method_ref(tree, node),
        NodeKind::CtorCall { .. } | NodeKind::New { .. }
            if matches!(tree.kind(decl), NodeKind::Constructor(_)) =>
        {
            resolve_call(tree, node)
        }
        _ => return None,
    };
    match resolution {
        CallResolution::Unique(found) if found == decl => Some(Reference {
            node,
            ambiguous: false,
        }),
        CallResolution::Ambiguous(candidates) if candidates.contains(&decl) => Some(Reference {
            node,
            ambiguous: true,
        }),
        _ => None,
    }
}

fn single(found: Option<NodeId>) -> CallResolution {
    found.map_or(CallResolution::Unresolved, CallResolution::Unique)
}
