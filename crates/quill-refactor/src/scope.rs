//! Name binding consequences of moving an expression or body to another
//! place in the tree.
//!
//! [`check_move`] inspects the original code and reports what has to change
//! for every name to keep its meaning at the target; [`apply_move`] performs
//! those changes on a copy, and [`verify_bindings`] re-resolves the copy once
//! it is attached.

use std::collections::HashMap;

use quill_resolve::members::{find_field, find_methods};
use quill_resolve::scopes::is_local_decl;
use quill_resolve::{enclosing_class, resolve_call, resolve_ident_at, resolve_name};
use quill_syntax::{make, NodeId, NodeKind, Tree, TreeError};

use crate::safety::is_effectively_final;

/// The object the moved code runs on at the target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Receiver {
    /// The instance enclosing the target, as before.
    Implicit,
    /// A variable introduced for the receiver.
    Named(String),
    /// A side-effect free receiver expression, copied for every use.
    Expr(NodeId),
    /// Static context qualified with a type name.
    Type(String),
}

/// How a qualifier is spelled in the rewritten code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Qualifier {
    This,
    OuterThis(String),
    Type(String),
    Named(String),
    Expr(NodeId),
}

impl Qualifier {
    fn from_receiver(receiver: &Receiver) -> Option<Qualifier> {
        match receiver {
            Receiver::Implicit => None,
            Receiver::Named(name) => Some(Qualifier::Named(name.clone())),
            Receiver::Expr(expr) => Some(Qualifier::Expr(*expr)),
            Receiver::Type(ty) => Some(Qualifier::Type(ty.clone())),
        }
    }

    fn build(&self, tree: &mut Tree) -> NodeId {
        match self {
            Qualifier::This => make::this(tree, None),
            Qualifier::OuterThis(class) => make::this(tree, Some(class.clone())),
            Qualifier::Type(ty) | Qualifier::Named(ty) => make::name(tree, ty.clone()),
            Qualifier::Expr(expr) => tree.deep_copy(*expr),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Requalify {
    /// Replace an unqualified `this`.
    ReplaceThis { node: NodeId, with: Qualifier },
    /// Qualify an unqualified field name or method call.
    Qualify { node: NodeId, with: Qualifier },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveProblemKind {
    /// A name would bind to a different declaration.
    Shadowed,
    /// A captured variable is not effectively final.
    Capture,
    /// `this` or a member cannot be qualified at the target.
    Unqualifiable,
    /// A `super` access would refer to another class.
    Super,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MoveProblem {
    pub node: NodeId,
    pub kind: MoveProblemKind,
    pub message: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MoveAnalysis {
    pub requalify: Vec<Requalify>,
    /// Locals captured by a newly crossed class boundary; marked `final`.
    pub make_final: Vec<NodeId>,
    pub problems: Vec<MoveProblem>,
}

impl MoveAnalysis {
    pub fn is_clean(&self) -> bool {
        self.problems.is_empty()
    }

    fn problem(&mut self, node: NodeId, kind: MoveProblemKind, message: String) {
        self.problems.push(MoveProblem {
            node,
            kind,
            message,
        });
    }
}

/// Checks what moving `expr` (still at its original place) to the position
/// of `target` would change. Names bound to a declaration in `bound` are
/// substituted by the caller and skipped.
pub fn check_move(
    tree: &Tree,
    expr: NodeId,
    target: NodeId,
    receiver: &Receiver,
    bound: &[NodeId],
) -> MoveAnalysis {
    let mut analysis = MoveAnalysis::default();
    let origin_class = enclosing_class(tree, expr);
    let target_class = enclosing_class(tree, target);

    for node in tree.descendants(expr) {
        match tree.kind(node) {
            NodeKind::Name { ident } => {
                if is_qualifier_position(tree, node) {
                    continue;
                }
                let now = resolve_ident_at(tree, target, ident);
                match resolve_name(tree, node) {
                    None => {
                        if let Some(found) = now.filter(|&d| is_local_decl(tree, d)) {
                            analysis.problem(
                                node,
                                MoveProblemKind::Shadowed,
                                format!(
                                    "`{ident}` would resolve to the variable declared at {:?}",
                                    tree.range(found)
                                ),
                            );
                        }
                    }
                    Some(decl) if tree.is_within(decl, expr) || bound.contains(&decl) => {}
                    Some(decl) if is_local_decl(tree, decl) => {
                        if now != Some(decl) {
                            analysis.problem(
                                node,
                                MoveProblemKind::Shadowed,
                                format!("`{ident}` would resolve to a different declaration"),
                            );
                            continue;
                        }
                        check_capture(tree, &mut analysis, node, decl, target, ident);
                    }
                    Some(decl) => {
                        let is_static = tree
                            .kind(decl)
                            .modifiers()
                            .is_some_and(|m| m.is_static)
                            || matches!(tree.kind(decl), NodeKind::EnumConstant { .. });
                        let holder = tree
                            .ancestors(node)
                            .filter(|&a| tree.kind(a).is_type_body())
                            .find(|&c| find_field(tree, c, ident) == Some(decl));
                        member_access(
                            tree,
                            &mut analysis,
                            MemberUse {
                                node,
                                name: ident,
                                is_static,
                                holder,
                                owner: tree.parent(decl),
                                resolves_same: now == Some(decl),
                                origin_class,
                            },
                            target,
                            receiver,
                        );
                    }
                }
            }
            NodeKind::MethodCall {
                name,
                has_receiver: false,
            } => {
                let Some(method) = resolve_call(tree, node).unique() else {
                    continue;
                };
                if tree.is_within(method, expr) {
                    continue;
                }
                let is_static = tree
                    .kind(method)
                    .modifiers()
                    .is_some_and(|m| m.is_static);
                let declaring = |at: NodeId| {
                    tree.ancestors(at)
                        .filter(|&a| tree.kind(a).is_type_body())
                        .find(|&c| !find_methods(tree, c, name).is_empty())
                };
                let holder = declaring(node);
                member_access(
                    tree,
                    &mut analysis,
                    MemberUse {
                        node,
                        name,
                        is_static,
                        holder,
                        owner: tree.parent(method),
                        resolves_same: declaring(target) == holder,
                        origin_class,
                    },
                    target,
                    receiver,
                );
            }
            NodeKind::This { qualifier: None } => {
                let class = enclosing_class(tree, node);
                if class != origin_class {
                    // `this` of a class nested inside the moved code.
                    continue;
                }
                if let Some(with) = Qualifier::from_receiver(receiver) {
                    analysis.requalify.push(Requalify::ReplaceThis { node, with });
                    continue;
                }
                if target_class == class || same_instance(tree, target_class, class) {
                    continue;
                }
                match outer_this(tree, class, target) {
                    Ok(with) => analysis
                        .requalify
                        .push(Requalify::ReplaceThis { node, with }),
                    Err(message) => {
                        analysis.problem(node, MoveProblemKind::Unqualifiable, message)
                    }
                }
            }
            NodeKind::This {
                qualifier: Some(q),
            } => {
                let visible = tree
                    .ancestors(target)
                    .any(|a| matches!(tree.kind(a), NodeKind::Class(d) if &d.name == q));
                if !visible {
                    analysis.problem(
                        node,
                        MoveProblemKind::Unqualifiable,
                        format!("`{q}.this` is not available at the new location"),
                    );
                }
            }
            NodeKind::Super { .. } => {
                let class = enclosing_class(tree, node);
                let moved_away = matches!(receiver, Receiver::Named(_) | Receiver::Expr(_))
                    || (target_class != class && !same_instance(tree, target_class, class));
                if class == origin_class && moved_away {
                    analysis.problem(
                        node,
                        MoveProblemKind::Super,
                        "`super` would refer to a different class".to_string(),
                    );
                }
            }
            _ => {}
        }
    }
    analysis.make_final.sort();
    analysis.make_final.dedup();
    analysis
}

/// A `Name` used as the receiver of a field access or call may be a type
/// name; those are handled by the member lookups, not as variables.
fn is_qualifier_position(tree: &Tree, name: NodeId) -> bool {
    let Some(parent) = tree.parent(name) else {
        return false;
    };
    tree.index_in_parent(name) == Some(0)
        && matches!(
            tree.kind(parent),
            NodeKind::FieldAccess { .. }
                | NodeKind::MethodRef { .. }
                | NodeKind::MethodCall {
                    has_receiver: true,
                    ..
                }
        )
        && resolve_name(tree, name).is_none()
}

/// Whether code in `target_class` runs on the same instance as code in
/// `class` (it is the class or inherits from it).
fn same_instance(tree: &Tree, target_class: Option<NodeId>, class: Option<NodeId>) -> bool {
    match (target_class, class) {
        (Some(t), Some(c)) => quill_resolve::members::is_subclass_of(tree, t, c),
        _ => false,
    }
}

fn outer_this(tree: &Tree, class: Option<NodeId>, target: NodeId) -> Result<Qualifier, String> {
    let Some(class) = class else {
        return Err("`this` has no enclosing class".to_string());
    };
    let NodeKind::Class(data) = tree.kind(class) else {
        return Err("`this` of an anonymous class cannot be qualified".to_string());
    };
    if !tree.is_within(target, class) {
        return Err(format!(
            "`this` would not refer to an instance of `{}`",
            data.name
        ));
    }
    Ok(Qualifier::OuterThis(data.name.clone()))
}

struct MemberUse<'a> {
    node: NodeId,
    name: &'a str,
    is_static: bool,
    /// Innermost class through which the member was visible at the origin.
    holder: Option<NodeId>,
    owner: Option<NodeId>,
    resolves_same: bool,
    origin_class: Option<NodeId>,
}

fn member_access(
    tree: &Tree,
    analysis: &mut MoveAnalysis,
    member: MemberUse<'_>,
    target: NodeId,
    receiver: &Receiver,
) {
    let node = member.node;
    if member.is_static {
        if member.resolves_same {
            return;
        }
        match member.owner.map(|o| tree.kind(o)) {
            Some(NodeKind::Class(data)) => analysis.requalify.push(Requalify::Qualify {
                node,
                with: Qualifier::Type(data.name.clone()),
            }),
            _ => analysis.problem(
                node,
                MoveProblemKind::Unqualifiable,
                format!("`{}` cannot be qualified at the new location", member.name),
            ),
        }
        return;
    }
    let on_receiver = member.holder.is_some() && member.holder == member.origin_class;
    if on_receiver {
        if let Some(with) = Qualifier::from_receiver(receiver) {
            if matches!(with, Qualifier::Type(_)) {
                analysis.problem(
                    node,
                    MoveProblemKind::Unqualifiable,
                    format!("instance member `{}` used from a static context", member.name),
                );
            } else {
                analysis.requalify.push(Requalify::Qualify { node, with });
            }
            return;
        }
    }
    if member.resolves_same {
        return;
    }
    let target_class = enclosing_class(tree, target);
    if target_class.is_some() && target_class == member.holder {
        analysis.requalify.push(Requalify::Qualify {
            node,
            with: Qualifier::This,
        });
        return;
    }
    match outer_this(tree, member.holder, target) {
        Ok(with) => analysis.requalify.push(Requalify::Qualify { node, with }),
        Err(message) => analysis.problem(node, MoveProblemKind::Unqualifiable, message),
    }
}

fn check_capture(
    tree: &Tree,
    analysis: &mut MoveAnalysis,
    node: NodeId,
    decl: NodeId,
    target: NodeId,
    ident: &str,
) {
    let boundaries = |at: NodeId| -> Vec<NodeId> {
        tree.ancestors(at)
            .filter(|&a| {
                matches!(
                    tree.kind(a),
                    NodeKind::Lambda { .. } | NodeKind::AnonymousClass | NodeKind::Class(_)
                ) && !tree.is_within(decl, a)
            })
            .collect()
    };
    let before = boundaries(node);
    let crossed: Vec<NodeId> = boundaries(target)
        .into_iter()
        .filter(|b| !before.contains(b))
        .collect();
    if crossed.is_empty() {
        return;
    }
    if !is_effectively_final(tree, decl) {
        analysis.problem(
            node,
            MoveProblemKind::Capture,
            format!("`{ident}` would be captured but is not effectively final"),
        );
        return;
    }
    let declared_final = tree.kind(decl).modifiers().is_some_and(|m| m.is_final);
    let crosses_class = crossed
        .iter()
        .any(|&b| !matches!(tree.kind(b), NodeKind::Lambda { .. }));
    if crosses_class && !declared_final {
        analysis.make_final.push(decl);
    }
}

/// Applies the requalifications of `analysis` to the copy described by
/// `map` (original node -> copied node).
pub fn apply_move(
    tree: &mut Tree,
    analysis: &MoveAnalysis,
    map: &HashMap<NodeId, NodeId>,
) -> Result<(), TreeError> {
    for action in &analysis.requalify {
        match action {
            Requalify::ReplaceThis { node, with } => {
                let Some(&copy) = map.get(node) else {
                    continue;
                };
                let qualifier = with.build(tree);
                if tree.parent(copy).is_some() {
                    make::replace_expr(tree, copy, qualifier)?;
                }
            }
            Requalify::Qualify { node, with } => {
                let Some(&copy) = map.get(node) else {
                    continue;
                };
                match tree.kind(copy).clone() {
                    NodeKind::Name { ident } => {
                        let qualifier = with.build(tree);
                        let access = make::field_access(tree, qualifier, ident);
                        if tree.parent(copy).is_some() {
                            make::replace_expr(tree, copy, access)?;
                        }
                    }
                    NodeKind::MethodCall {
                        name,
                        has_receiver: false,
                    } => {
                        let qualifier = with.build(tree);
                        let qualifier = make::parenthesize(tree, qualifier, make::PREC_PRIMARY);
                        *tree.kind_mut(copy)? = NodeKind::MethodCall {
                            name,
                            has_receiver: true,
                        };
                        tree.insert_child(copy, 0, qualifier)?;
                    }
                    _ => {}
                }
            }
        }
    }
    Ok(())
}

/// Pairs of (copied name, declaration it must resolve to) for every variable
/// name in `expr` that is not rewritten by `analysis`.
pub fn expected_bindings(
    tree: &Tree,
    expr: NodeId,
    map: &HashMap<NodeId, NodeId>,
    analysis: &MoveAnalysis,
    bound: &[NodeId],
) -> Vec<(NodeId, NodeId)> {
    let rewritten = |node: NodeId| {
        analysis.requalify.iter().any(|r| match r {
            Requalify::ReplaceThis { node: n, .. } | Requalify::Qualify { node: n, .. } => {
                *n == node
            }
        })
    };
    tree.descendants(expr)
        .into_iter()
        .filter(|&n| matches!(tree.kind(n), NodeKind::Name { .. }) && !rewritten(n))
        .filter_map(|n| {
            let decl = resolve_name(tree, n).filter(|d| !bound.contains(d))?;
            let expected = map.get(&decl).copied().unwrap_or(decl);
            Some((*map.get(&n)?, expected))
        })
        .collect()
}

/// Re-resolves moved names; returns the ones that bind elsewhere. Each
/// mismatch is logged as an invariant violation.
pub fn verify_bindings(tree: &Tree, expected: &[(NodeId, NodeId)]) -> Vec<NodeId> {
    expected
        .iter()
        .filter(|&&(name, decl)| tree.is_alive(name) && resolve_name(tree, name) != Some(decl))
        .map(|&(name, decl)| {
            tracing::error!(
                target: "quill.refactor",
                ?name,
                ?decl,
                found = ?resolve_name(tree, name),
                "moved name resolves to another declaration"
            );
            name
        })
        .collect()
}
