//! Whether substituting an expression for a reference preserves behavior.
//!
//! The checks are syntactic. A write is assumed to reach a read when it
//! follows the point the value was taken in document order and precedes the
//! read, or when both sit in a loop that does not contain that point. Writes
//! in opposite branches of the same `if` or `?:` never reach each other.

use quill_resolve::{find_references, resolve_field_access, resolve_name};
use quill_syntax::{print_node, DocumentOrder, NodeId, NodeKind, Tree};

use crate::occurrence::{access_mode, AccessMode};

/// Outcome of a substitution check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Safe,
    /// Allowed, but the user should confirm.
    Review(String),
    Unsafe(String),
}

impl Verdict {
    pub fn is_substitutable(&self) -> bool {
        !matches!(self, Verdict::Unsafe(_))
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Verdict::Safe => None,
            Verdict::Review(reason) | Verdict::Unsafe(reason) => Some(reason),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Verdict::Safe => 0,
            Verdict::Review(_) => 1,
            Verdict::Unsafe(_) => 2,
        }
    }

    /// The more severe of two verdicts; the first one wins ties.
    #[must_use]
    pub fn worst(self, other: Verdict) -> Verdict {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }
}

/// Decides whether `init` may replace the reference at `site`.
///
/// `access_count` is the number of places the expression would be evaluated
/// after inlining; calls and instance creations are only allowed once.
/// With `requires_final`, every variable read by `init` must be effectively
/// final (the expression moves into a capturing scope).
pub fn can_substitute(
    tree: &Tree,
    init: NodeId,
    site: NodeId,
    access_count: usize,
    requires_final: bool,
) -> Verdict {
    if access_mode(tree, site) != AccessMode::Read {
        return Verdict::Unsafe("the occurrence is written to".to_string());
    }
    verdict(tree, init, site, access_count, requires_final)
}

fn verdict(
    tree: &Tree,
    expr: NodeId,
    site: NodeId,
    access_count: usize,
    requires_final: bool,
) -> Verdict {
    let children = |tree: &Tree| -> Verdict {
        tree.children(expr)
            .iter()
            .filter(|&&c| !matches!(tree.kind(c), NodeKind::AnonymousClass | NodeKind::Param(_)))
            .fold(Verdict::Safe, |acc, &c| {
                acc.worst(verdict(tree, c, site, access_count, requires_final))
            })
    };
    match tree.kind(expr) {
        NodeKind::Literal { .. }
        | NodeKind::This { .. }
        | NodeKind::Super { .. }
        | NodeKind::ClassLiteral { .. }
        | NodeKind::Lambda { .. } => Verdict::Safe,
        NodeKind::Name { ident } => match resolve_name(tree, expr) {
            // A type or package qualifier.
            None => Verdict::Safe,
            Some(decl) => variable_verdict(tree, decl, ident, expr, site, requires_final),
        },
        NodeKind::FieldAccess { name } => {
            let receiver = children(tree);
            match resolve_field_access(tree, expr) {
                Some(field) => receiver.worst(variable_verdict(
                    tree,
                    field,
                    name,
                    expr,
                    site,
                    requires_final,
                )),
                None => receiver,
            }
        }
        NodeKind::MethodCall { .. }
        | NodeKind::New { .. }
        | NodeKind::NewArray { .. }
        | NodeKind::CtorCall { .. }
        | NodeKind::Assign { .. } => {
            if access_count != 1 {
                return Verdict::Unsafe(format!(
                    "`{}` would be evaluated {access_count} times",
                    print_node(tree, expr)
                ));
            }
            children(tree)
        }
        NodeKind::Unary { op } if op.is_increment() && access_count != 1 => {
            Verdict::Unsafe(format!(
                "`{}` would be evaluated {access_count} times",
                print_node(tree, expr)
            ))
        }
        _ => children(tree),
    }
}

fn variable_verdict(
    tree: &Tree,
    decl: NodeId,
    name: &str,
    read: NodeId,
    site: NodeId,
    requires_final: bool,
) -> Verdict {
    match tree.kind(decl) {
        NodeKind::Field(data) => {
            if data.modifiers.is_final {
                Verdict::Safe
            } else {
                Verdict::Review(format!(
                    "field `{name}` may change before it is read at the new location"
                ))
            }
        }
        NodeKind::EnumConstant { .. } => Verdict::Safe,
        _ => {
            if write_reaches(tree, decl, read, site) {
                Verdict::Unsafe(format!("`{name}` is reassigned before the occurrence"))
            } else if requires_final && !is_effectively_final(tree, decl) {
                Verdict::Unsafe(format!("`{name}` is not effectively final"))
            } else {
                Verdict::Safe
            }
        }
    }
}

/// References to `var` that assign it.
pub fn writes_of(tree: &Tree, var: NodeId) -> Vec<NodeId> {
    find_references(tree, var)
        .into_iter()
        .map(|r| r.node)
        .filter(|&node| access_mode(tree, node) != AccessMode::Read)
        .collect()
}

/// The assignment or increment performing the write at reference `write`.
fn write_effect(tree: &Tree, write: NodeId) -> NodeId {
    tree.ancestors(write)
        .find(|&a| {
            matches!(tree.kind(a), NodeKind::Assign { .. })
                || matches!(tree.kind(a), NodeKind::Unary { op } if op.is_increment())
        })
        .unwrap_or(write)
}

/// Whether a write to `var` can happen after `from` and before `to` is
/// evaluated.
pub fn write_reaches(tree: &Tree, var: NodeId, from: NodeId, to: NodeId) -> bool {
    let order = DocumentOrder::for_node(tree, to);
    writes_of(tree, var).into_iter().any(|write| {
        let effect = write_effect(tree, write);
        if tree.is_within(to, effect) || tree.is_within(effect, from) {
            return false;
        }
        let in_between = order.precedes(from, effect)
            && order.precedes(effect, to)
            && !exclusive_branches(tree, effect, to);
        in_between || shares_loop(tree, effect, to, from)
    })
}

/// A loop containing both `a` and `b` but not `outside`.
fn shares_loop(tree: &Tree, a: NodeId, b: NodeId, outside: NodeId) -> bool {
    tree.ancestors(a).any(|l| {
        tree.kind(l).is_loop() && tree.is_within(b, l) && !tree.is_within(outside, l)
    })
}

/// `a` and `b` sit in different branches of the same `if` or `?:`.
fn exclusive_branches(tree: &Tree, a: NodeId, b: NodeId) -> bool {
    let Some(common) = tree.ancestors(a).find(|&anc| tree.is_within(b, anc)) else {
        return false;
    };
    if !matches!(tree.kind(common), NodeKind::If | NodeKind::Conditional) {
        return false;
    }
    let branch = |n: NodeId| {
        tree.child_towards(common, n)
            .and_then(|c| tree.index_in_parent(c))
    };
    matches!((branch(a), branch(b)), (Some(1), Some(2)) | (Some(2), Some(1)))
}

/// Never reassigned after initialization.
pub fn is_effectively_final(tree: &Tree, var: NodeId) -> bool {
    if tree.kind(var).modifiers().is_some_and(|m| m.is_final) {
        return true;
    }
    let writes = writes_of(tree, var);
    match tree.kind(var) {
        NodeKind::LocalVar(_) if tree.children(var).is_empty() => {
            writes.len() <= 1
                && writes
                    .iter()
                    .all(|&w| access_mode(tree, w) == AccessMode::Write)
        }
        _ => writes.is_empty(),
    }
}

/// Whether evaluating `expr` may have an observable effect. Lambda bodies and
/// anonymous class bodies are not evaluated.
pub fn has_side_effects(tree: &Tree, expr: NodeId) -> bool {
    match tree.kind(expr) {
        NodeKind::MethodCall { .. }
        | NodeKind::New { .. }
        | NodeKind::CtorCall { .. }
        | NodeKind::Assign { .. } => true,
        NodeKind::Unary { op } if op.is_increment() => true,
        NodeKind::Lambda { .. } | NodeKind::AnonymousClass | NodeKind::Class(_) => false,
        _ => tree
            .children(expr)
            .iter()
            .any(|&child| has_side_effects(tree, child)),
    }
}

/// Number of method calls, instance creations and constructor calls in `root`.
pub fn count_calls(tree: &Tree, root: NodeId) -> usize {
    tree.descendants(root)
        .into_iter()
        .filter(|&n| {
            matches!(
                tree.kind(n),
                NodeKind::MethodCall { .. } | NodeKind::New { .. } | NodeKind::CtorCall { .. }
            )
        })
        .count()
}

/// Expressions evaluated before `site` on the way up to `within`.
pub fn preceding_evaluations(tree: &Tree, site: NodeId, within: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut current = site;
    while current != within {
        let Some(parent) = tree.parent(current) else {
            break;
        };
        let Some(index) = tree.index_in_parent(current) else {
            break;
        };
        let siblings = tree.children(parent);
        match tree.kind(parent) {
            NodeKind::If | NodeKind::Conditional if index == 2 => out.push(siblings[0]),
            NodeKind::Block | NodeKind::Lambda { .. } => {}
            _ => out.extend(
                siblings[..index]
                    .iter()
                    .copied()
                    .filter(|&s| !matches!(tree.kind(s), NodeKind::Param(_))),
            ),
        }
        current = parent;
    }
    out
}

/// Whether `site` may run zero or several times per execution of `boundary`:
/// it sits in a branch, a short-circuit operand, a loop, a deferred body, or
/// after a statement that may jump away.
pub fn is_conditionally_evaluated(tree: &Tree, site: NodeId, boundary: NodeId) -> bool {
    let mut current = site;
    while current != boundary {
        let Some(parent) = tree.parent(current) else {
            return false;
        };
        let index = tree.index_in_parent(current).unwrap_or(0);
        let conditional = match tree.kind(parent) {
            NodeKind::Conditional | NodeKind::If => index > 0,
            NodeKind::Binary { op } => op.is_short_circuit() && index == 1,
            NodeKind::While | NodeKind::DoWhile => true,
            NodeKind::For { .. } | NodeKind::ForEach(_) => index > 0,
            NodeKind::Lambda { .. } | NodeKind::AnonymousClass | NodeKind::Class(_) => true,
            NodeKind::Try { .. } => index > 0,
            NodeKind::Block => tree.children(parent)[..index]
                .iter()
                .any(|&stmt| may_jump(tree, stmt)),
            _ => false,
        };
        if conditional {
            return true;
        }
        current = parent;
    }
    false
}

/// Contains a `return`, `throw`, `break` or `continue` outside nested bodies.
pub(crate) fn may_jump(tree: &Tree, stmt: NodeId) -> bool {
    match tree.kind(stmt) {
        NodeKind::Return
        | NodeKind::Throw
        | NodeKind::Break { .. }
        | NodeKind::Continue { .. } => true,
        NodeKind::Lambda { .. } | NodeKind::AnonymousClass | NodeKind::Class(_) => false,
        _ => tree.children(stmt).iter().any(|&c| may_jump(tree, c)),
    }
}

/// Statements after `decl_stmt` in its block that precede the statement
/// containing `site`. Empty when `site` is not later in the same block.
pub fn intervening_statements(tree: &Tree, decl_stmt: NodeId, site: NodeId) -> Vec<NodeId> {
    let Some(block) = tree.parent(decl_stmt) else {
        return Vec::new();
    };
    let Some(site_stmt) = tree.child_towards(block, site) else {
        return Vec::new();
    };
    let children = tree.children(block);
    match (
        children.iter().position(|&c| c == decl_stmt),
        children.iter().position(|&c| c == site_stmt),
    ) {
        (Some(from), Some(to)) if from < to => children[from + 1..to].to_vec(),
        _ => Vec::new(),
    }
}

/// Why moving the initializer `init` of the local declared by `decl_stmt`
/// down to `site` would change when or how often it runs. `None` when the
/// initializer is free of side effects or the move keeps its timing.
pub fn evaluation_order_problem(
    tree: &Tree,
    init: NodeId,
    decl_stmt: NodeId,
    site: NodeId,
) -> Option<String> {
    if !has_side_effects(tree, init) {
        return None;
    }
    let text = print_node(tree, init);
    let moved_out = || Some(format!("`{text}` cannot be moved to the occurrence"));
    let Some(block) = tree.parent(decl_stmt) else {
        return moved_out();
    };
    let Some(site_stmt) = tree.child_towards(block, site) else {
        return moved_out();
    };
    let intervening = intervening_statements(tree, decl_stmt, site);
    if is_conditionally_evaluated(tree, site, site_stmt)
        || intervening.iter().any(|&stmt| may_jump(tree, stmt))
    {
        return Some(format!(
            "`{text}` would no longer run exactly once at its original point"
        ));
    }
    if intervening.iter().any(|&stmt| has_side_effects(tree, stmt)) {
        return Some(format!(
            "`{text}` would run after statements that have side effects"
        ));
    }
    if preceding_evaluations(tree, site, site_stmt)
        .into_iter()
        .any(|expr| has_side_effects(tree, expr))
    {
        return Some(format!(
            "`{text}` would run after expressions that precede the occurrence"
        ));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_resolve::resolve_name;
    use quill_test_utils::Fixture;

    fn decl_of(fixture: &Fixture, marker: u32) -> NodeId {
        let name = fixture.node_at(marker);
        resolve_name(&fixture.tree, name).unwrap()
    }

    #[test]
    fn writes_in_the_other_branch_do_not_reach() {
        let fixture = Fixture::parse(
            r#"class A {
    void m(boolean c) {
        int x = 1;
        if (c) {
            x = 2;
        } else {
            System.out.println($1x);
        }
        System.out.println($2x);
    }
}
"#,
        );
        let tree = &fixture.tree;
        let var = decl_of(&fixture, 1);
        assert!(!write_reaches(tree, var, var, fixture.node_at(1)));
        assert!(write_reaches(tree, var, var, fixture.node_at(2)));
        assert!(!is_effectively_final(tree, var));
    }

    #[test]
    fn loop_writes_reach_earlier_reads() {
        let fixture = Fixture::parse(
            r#"class A {
    void m() {
        int x = 0;
        while (true) {
            System.out.println($1x);
            x++;
        }
    }
}
"#,
        );
        let var = decl_of(&fixture, 1);
        assert!(write_reaches(&fixture.tree, var, var, fixture.node_at(1)));
    }

    #[test]
    fn calls_are_substituted_only_once() {
        let fixture = Fixture::parse(
            r#"class A {
    int f() {
        return 1;
    }

    void m() {
        int a = $1f();
        System.out.println($2a);
    }
}
"#,
        );
        let tree = &fixture.tree;
        let init = fixture.node_at(1);
        let site = fixture.node_at(2);
        assert_eq!(can_substitute(tree, init, site, 1, false), Verdict::Safe);
        assert!(!can_substitute(tree, init, site, 2, false).is_substitutable());
        assert!(has_side_effects(tree, init));
    }

    #[test]
    fn mutable_field_reads_need_review() {
        let fixture = Fixture::parse(
            r#"class A {
    int count;

    void m() {
        int a = $1count + 1;
        System.out.println($2a);
    }
}
"#,
        );
        let init = fixture.tree.parent(fixture.node_at(1)).unwrap();
        let verdict = can_substitute(&fixture.tree, init, fixture.node_at(2), 1, false);
        assert!(matches!(verdict, Verdict::Review(_)), "{verdict:?}");
    }

    #[test]
    fn lambda_bodies_are_not_evaluated() {
        let fixture = Fixture::parse(
            r#"class A {
    void m() {
        Runnable r = $1() -> System.out.println(1);
    }
}
"#,
        );
        assert!(!has_side_effects(&fixture.tree, fixture.node_at(1)));
    }
}
