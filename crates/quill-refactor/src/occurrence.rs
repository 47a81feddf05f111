//! Occurrences of an entity and their classification.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use quill_resolve::members::{find_class, is_subclass_of, simple_type_name};
use quill_resolve::{call_args, call_receiver, enclosing_class};
use quill_syntax::{AssignOp, FileId, NodeId, NodeKind, TextRange, Tree};
use regex::Regex;
use serde::Serialize;

use crate::entity::Entity;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum OccurrenceKind {
    /// A resolved reference in code.
    Code,
    /// `recv::name` method reference.
    MethodReference,
    /// `#name` inside a doc comment; `node` is the documented member.
    Doc,
    /// A word match inside a line or block comment.
    Comment,
    /// A match inside a string literal.
    StringLiteral,
    /// A word match in a non-code file; `node` is `None`.
    TextFile,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum AccessMode {
    Read,
    Write,
    ReadWrite,
    NonCode,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum UsageClass {
    Read,
    Write,
    ReadWrite,
    Doc,
    Reflective,
    NonCode,
}

impl UsageClass {
    pub fn is_write(self) -> bool {
        matches!(self, UsageClass::Write | UsageClass::ReadWrite)
    }

    /// Occurrences that are rewritten by the transformation.
    pub fn is_code(self) -> bool {
        matches!(
            self,
            UsageClass::Read | UsageClass::Write | UsageClass::ReadWrite
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Occurrence {
    pub file: FileId,
    pub node: Option<NodeId>,
    /// Range of the match inside the comment, doc, literal or file text.
    pub text_range: Option<TextRange>,
    pub kind: OccurrenceKind,
    /// The reference is one of several equally applicable overloads.
    pub ambiguous: bool,
}

impl Occurrence {
    pub fn code(file: FileId, node: NodeId, ambiguous: bool) -> Self {
        Occurrence {
            file,
            node: Some(node),
            text_range: None,
            kind: OccurrenceKind::Code,
            ambiguous,
        }
    }

    pub fn access_mode(&self, tree: &Tree) -> AccessMode {
        match (self.kind, self.node) {
            (OccurrenceKind::Code, Some(node)) => access_mode(tree, node),
            (OccurrenceKind::MethodReference, _) => AccessMode::Read,
            _ => AccessMode::NonCode,
        }
    }
}

/// An occurrence together with its classification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Usage {
    pub occurrence: Occurrence,
    pub class: UsageClass,
}

impl Usage {
    pub fn node(&self) -> Option<NodeId> {
        self.occurrence.node
    }
}

/// How the expression `node` is accessed. Parentheses and array indexing
/// between the reference and an assignment still count as a write.
pub fn access_mode(tree: &Tree, node: NodeId) -> AccessMode {
    let mut current = node;
    while let Some(parent) = tree.parent(current) {
        match tree.kind(parent) {
            NodeKind::Paren => current = parent,
            NodeKind::ArrayAccess if tree.index_in_parent(current) == Some(0) => {
                current = parent
            }
            NodeKind::Assign { op } if tree.index_in_parent(current) == Some(0) => {
                return if *op == AssignOp::Assign {
                    AccessMode::Write
                } else {
                    AccessMode::ReadWrite
                };
            }
            NodeKind::Unary { op } if op.is_increment() => return AccessMode::ReadWrite,
            _ => break,
        }
    }
    AccessMode::Read
}

fn reflective_lookup() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(getMethod|getDeclaredMethod|getField|getDeclaredField|getConstructor|getDeclaredConstructor|findVirtual|findStatic|findSpecial|findGetter|findSetter|findStaticGetter|findStaticSetter|findVarHandle)$",
        )
        .expect("reflective lookup pattern is valid")
    })
}

/// Whether the string literal `literal` names `entity` in a reflective
/// lookup such as `getDeclaredField("name")`. A lookup on a class literal
/// must name the declaring class or a subclass; any other receiver might.
pub fn is_reflective_literal(tree: &Tree, literal: NodeId, entity: &Entity) -> bool {
    let NodeKind::Literal { text, .. } = tree.kind(literal) else {
        return false;
    };
    if text.trim_matches('"') != entity.name {
        return false;
    }
    let Some(call) = tree.parent(literal) else {
        return false;
    };
    let NodeKind::MethodCall { name: method, .. } = tree.kind(call) else {
        return false;
    };
    if !reflective_lookup().is_match(method) || !call_args(tree, call).contains(&literal) {
        return false;
    }
    match call_receiver(tree, call).map(|r| tree.kind(r)) {
        Some(NodeKind::ClassLiteral { ty }) => owner_of(tree, entity)
            .map_or(true, |owner| names_class_of(tree, ty, owner)),
        _ => true,
    }
}

/// Whether a doc link `qualifier#name` written on `doc_node` refers to
/// `entity`. An empty qualifier resolves through the classes enclosing the
/// doc, stopping at the first one that declares its own member of that name.
pub fn doc_link_targets(tree: &Tree, doc_node: NodeId, qualifier: &str, entity: &Entity) -> bool {
    let Some(owner) = owner_of(tree, entity) else {
        return true;
    };
    if !qualifier.is_empty() {
        return names_class_of(tree, qualifier, owner);
    }
    let own = matches!(tree.kind(doc_node), NodeKind::Class(_)).then_some(doc_node);
    for class in own
        .into_iter()
        .chain(tree.ancestors(doc_node).filter(|&a| tree.kind(a).is_type_body()))
    {
        if class == owner {
            return true;
        }
        if declares_member(tree, class, &entity.name) {
            return false;
        }
        if is_subclass_of(tree, class, owner) {
            return true;
        }
    }
    false
}

fn owner_of(tree: &Tree, entity: &Entity) -> Option<NodeId> {
    enclosing_class(tree, entity.decl)
}

/// `ty` is matched by simple name, like every other type lookup here.
fn names_class_of(tree: &Tree, ty: &str, owner: NodeId) -> bool {
    let simple = simple_type_name(ty);
    if tree.kind(owner).class_data().is_some_and(|c| c.name == simple) {
        return true;
    }
    find_class(tree, simple).is_some_and(|class| is_subclass_of(tree, class, owner))
}

fn declares_member(tree: &Tree, class: NodeId, name: &str) -> bool {
    tree.children(class).iter().any(|&m| match tree.kind(m) {
        NodeKind::Field(data) => data.name == name,
        NodeKind::Method(data) => data.name == name,
        NodeKind::EnumConstant { name: n, .. } => n == name,
        _ => false,
    })
}

pub fn classify(tree: &Tree, entity: &Entity, occurrence: &Occurrence) -> UsageClass {
    let class = match occurrence.kind {
        OccurrenceKind::Code | OccurrenceKind::MethodReference => {
            match occurrence.access_mode(tree) {
                AccessMode::Write => UsageClass::Write,
                AccessMode::ReadWrite => UsageClass::ReadWrite,
                _ => UsageClass::Read,
            }
        }
        OccurrenceKind::Doc => UsageClass::Doc,
        OccurrenceKind::StringLiteral => match occurrence.node {
            Some(literal) if is_reflective_literal(tree, literal, entity) => {
                UsageClass::Reflective
            }
            _ => UsageClass::NonCode,
        },
        OccurrenceKind::Comment | OccurrenceKind::TextFile => UsageClass::NonCode,
    };
    tracing::trace!(
        target: "quill.refactor",
        name = %entity.name,
        kind = ?occurrence.kind,
        ?class,
        "classified occurrence"
    );
    class
}

/// Classifies every occurrence.
pub fn classify_all(tree: &Tree, entity: &Entity, occurrences: Vec<Occurrence>) -> Vec<Usage> {
    occurrences
        .into_iter()
        .map(|occurrence| Usage {
            class: classify(tree, entity, &occurrence),
            occurrence,
        })
        .collect()
}

/// Groups usages by the file containing them.
pub fn bucket_by_file(usages: &[Usage]) -> BTreeMap<FileId, Vec<&Usage>> {
    let mut buckets: BTreeMap<FileId, Vec<&Usage>> = BTreeMap::new();
    for usage in usages {
        buckets.entry(usage.occurrence.file).or_default().push(usage);
    }
    buckets
}
