//! The declaration being inlined.

use quill_resolve::{resolve_call, resolve_field_access, resolve_method_ref, resolve_name};
use quill_syntax::{FileId, NodeId, NodeKind, TextSize, Tree, TreeError};
use serde::Serialize;

use crate::error::PreconditionFailure;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum EntityKind {
    Local,
    Field,
    Method,
    Constructor,
    Parameter,
    PatternBinding,
}

impl EntityKind {
    /// Entities whose value (rather than body) is substituted.
    pub fn is_value(self) -> bool {
        !matches!(self, EntityKind::Method | EntityKind::Constructor)
    }

    /// Entities that can only be referenced from their own file.
    pub fn is_local_like(self) -> bool {
        matches!(
            self,
            EntityKind::Local | EntityKind::Parameter | EntityKind::PatternBinding
        )
    }

    /// Stable identifier used in lifecycle events.
    pub fn refactoring_id(self) -> &'static str {
        match self {
            EntityKind::Local => "inline.local",
            EntityKind::Field => "inline.field",
            EntityKind::Method => "inline.method",
            EntityKind::Constructor => "inline.constructor",
            EntityKind::Parameter => "inline.parameter",
            EntityKind::PatternBinding => "inline.pattern",
        }
    }
}

/// A non-owning handle to the declaration being inlined. The node id is
/// revalidated before every mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entity {
    pub kind: EntityKind,
    pub decl: NodeId,
    pub name: String,
    pub file: Option<FileId>,
}

impl Entity {
    pub fn from_decl(tree: &Tree, decl: NodeId) -> Result<Entity, PreconditionFailure> {
        if !tree.is_alive(decl) {
            return Err(PreconditionFailure::NoDeclaration);
        }
        let unsupported = |what: String| PreconditionFailure::UnsupportedDeclaration { what };
        let kind = tree.kind(decl);
        let entity_kind = match kind {
            NodeKind::LocalVar(_) => EntityKind::Local,
            NodeKind::Field(_) => EntityKind::Field,
            NodeKind::Method(_) => EntityKind::Method,
            NodeKind::Constructor(_) => EntityKind::Constructor,
            NodeKind::InstanceOf {
                binding: Some(_), ..
            } => EntityKind::PatternBinding,
            NodeKind::Param(data) => match tree.parent(decl).map(|p| tree.kind(p)) {
                Some(NodeKind::Method(_) | NodeKind::Constructor(_)) => EntityKind::Parameter,
                _ => return Err(unsupported(format!("lambda parameter `{}`", data.name))),
            },
            NodeKind::EnumConstant { name, .. } => {
                return Err(unsupported(format!("enum constant `{name}`")))
            }
            NodeKind::Class(data) => return Err(unsupported(format!("type `{}`", data.name))),
            NodeKind::ForEach(data) => {
                return Err(unsupported(format!("loop variable `{}`", data.name)))
            }
            NodeKind::Catch(data) => {
                return Err(unsupported(format!("catch parameter `{}`", data.name)))
            }
            _ => return Err(PreconditionFailure::NoDeclaration),
        };
        let name = kind
            .declared_name()
            .ok_or(PreconditionFailure::NoDeclaration)?
            .to_string();
        Ok(Entity {
            kind: entity_kind,
            decl,
            name,
            file: tree.file_of(decl),
        })
    }

    pub fn revalidate(&self, tree: &Tree) -> Result<(), TreeError> {
        tree.ensure_alive(self.decl)
    }

    /// Initializer expression of a local or field.
    pub fn initializer(&self, tree: &Tree) -> Option<NodeId> {
        match tree.kind(self.decl) {
            NodeKind::LocalVar(_) | NodeKind::Field(_) => tree.child(self.decl, 0),
            _ => None,
        }
    }

    /// Method or constructor declaring a parameter.
    pub fn owner(&self, tree: &Tree) -> Option<NodeId> {
        match self.kind {
            EntityKind::Parameter => tree.parent(self.decl),
            _ => None,
        }
    }

    /// Whether the declaration carries an explicit `final`.
    pub fn is_final(&self, tree: &Tree) -> bool {
        tree.kind(self.decl)
            .modifiers()
            .is_some_and(|m| m.is_final)
    }
}

/// What a caret position asks to inline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InlineTarget {
    pub declaration: NodeId,
    /// The occurrence under the caret, when the caret is on a use.
    pub reference: Option<NodeId>,
}

/// Maps a caret position to the declaration it denotes.
pub fn target_at(tree: &Tree, file: FileId, offset: TextSize) -> Option<InlineTarget> {
    let node = tree.node_at_offset(file, offset)?;
    for candidate in std::iter::once(node).chain(tree.ancestors(node)) {
        let kind = tree.kind(candidate);
        let resolved = match kind {
            NodeKind::Name { .. } => resolve_name(tree, candidate),
            NodeKind::FieldAccess { .. } => resolve_field_access(tree, candidate),
            NodeKind::MethodCall { .. } | NodeKind::CtorCall { .. } | NodeKind::New { .. } => {
                resolve_call(tree, candidate).unique()
            }
            NodeKind::MethodRef { .. } => resolve_method_ref(tree, candidate).unique(),
            NodeKind::LocalVar(_)
            | NodeKind::Field(_)
            | NodeKind::Method(_)
            | NodeKind::Constructor(_)
            | NodeKind::Param(_)
            | NodeKind::InstanceOf {
                binding: Some(_), ..
            } => {
                return Some(InlineTarget {
                    declaration: candidate,
                    reference: None,
                })
            }
            kind if kind.is_statement() || kind.is_member() => return None,
            _ => continue,
        };
        return resolved.map(|declaration| InlineTarget {
            declaration,
            reference: Some(candidate),
        });
    }
    None
}
