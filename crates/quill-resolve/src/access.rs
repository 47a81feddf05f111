//! Java access control for members moved between classes.

use quill_syntax::{ClassKind, NodeId, NodeKind, Tree, Visibility};

use crate::members::{enclosing_class, is_subclass_of, top_level_class};

/// Package declared by the file containing `node`.
pub fn package_of(tree: &Tree, node: NodeId) -> Option<String> {
    match tree.kind(tree.root_of(node)) {
        NodeKind::CompilationUnit { package, .. } => package.clone(),
        _ => None,
    }
}

/// Effective visibility of a member declaration. Interface members without
/// a modifier are public.
pub fn effective_visibility(tree: &Tree, member: NodeId) -> Visibility {
    let declared = tree
        .kind(member)
        .modifiers()
        .map(|m| m.visibility)
        .unwrap_or_default();
    let in_interface = tree
        .parent(member)
        .and_then(|p| tree.kind(p).class_data())
        .is_some_and(|c| c.kind == ClassKind::Interface);
    if in_interface && declared == Visibility::PackagePrivate {
        Visibility::Public
    } else {
        declared
    }
}

/// Whether code at `from` may refer to `member` by the default Java rules.
pub fn is_accessible(tree: &Tree, member: NodeId, from: NodeId) -> bool {
    let same_package = || package_of(tree, member) == package_of(tree, from);
    match effective_visibility(tree, member) {
        Visibility::Public => true,
        Visibility::Private => {
            let owner = top_level_class(tree, member);
            owner.is_some() && owner == top_level_class(tree, from)
        }
        Visibility::PackagePrivate => same_package(),
        Visibility::Protected => {
            if same_package() {
                return true;
            }
            let Some(owner) = tree.parent(member) else {
                return false;
            };
            tree.ancestors(from)
                .filter(|&a| tree.kind(a).is_type_body())
                .any(|class| is_subclass_of(tree, class, owner))
        }
    }
}

/// Whether `member` is declared in a class other than the one enclosing `from`.
pub fn is_foreign_member(tree: &Tree, member: NodeId, from: NodeId) -> bool {
    let owner = tree.parent(member);
    owner.is_some() && owner != enclosing_class(tree, from)
}
