//! Class hierarchy queries and member lookup.
//!
//! Types are matched by simple name across every Java file of the tree;
//! generic arguments, array dimensions and package qualifiers are ignored.

use std::collections::HashSet;

use quill_syntax::{BinaryOp, LiteralKind, NodeId, NodeKind, Tree, UnaryOp};

use crate::scopes::resolve_name;

/// Outcome of overload resolution for a call-like node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallResolution {
    Unique(NodeId),
    Ambiguous(Vec<NodeId>),
    Unresolved,
}

impl CallResolution {
    #[must_use]
    pub fn unique(&self) -> Option<NodeId> {
        match self {
            CallResolution::Unique(id) => Some(*id),
            _ => None,
        }
    }

    #[must_use]
    pub fn candidates(&self) -> Vec<NodeId> {
        match self {
            CallResolution::Unique(id) => vec![*id],
            CallResolution::Ambiguous(ids) => ids.clone(),
            CallResolution::Unresolved => Vec::new(),
        }
    }
}

/// `java.util.List<String>[]` -> `List`.
pub fn simple_type_name(ty: &str) -> &str {
    let base = ty.split('<').next().unwrap_or(ty);
    let base = base.trim_end_matches("[]").trim();
    base.rsplit('.').next().unwrap_or(base)
}

/// Finds a class, interface or enum declaration by (possibly qualified) name.
pub fn find_class(tree: &Tree, name: &str) -> Option<NodeId> {
    let simple = simple_type_name(name);
    tree.java_files().find_map(|(_, root)| {
        tree.descendants(root).into_iter().find(|&n| {
            matches!(tree.kind(n), NodeKind::Class(data) if data.name == simple)
        })
    })
}

/// Nearest enclosing class body, anonymous classes included.
pub fn enclosing_class(tree: &Tree, node: NodeId) -> Option<NodeId> {
    tree.ancestors(node).find(|&a| tree.kind(a).is_type_body())
}

pub fn top_level_class(tree: &Tree, node: NodeId) -> Option<NodeId> {
    let mut top = None;
    if matches!(tree.kind(node), NodeKind::Class(_)) {
        top = Some(node);
    }
    for ancestor in tree.ancestors(node) {
        if matches!(tree.kind(ancestor), NodeKind::Class(_)) {
            top = Some(ancestor);
        }
    }
    top
}

/// The method, constructor, field, initializer or enum constant containing `node`.
pub fn enclosing_member(tree: &Tree, node: NodeId) -> Option<NodeId> {
    std::iter::once(node)
        .chain(tree.ancestors(node))
        .find(|&a| is_body_owner(tree.kind(a)))
}

fn is_body_owner(kind: &NodeKind) -> bool {
    matches!(
        kind,
        NodeKind::Method(_)
            | NodeKind::Constructor(_)
            | NodeKind::Field(_)
            | NodeKind::Initializer { .. }
            | NodeKind::EnumConstant { .. }
    )
}

/// Nearest method, constructor, initializer or lambda containing `node`.
pub fn enclosing_callable(tree: &Tree, node: NodeId) -> Option<NodeId> {
    tree.ancestors(node).find(|&a| {
        matches!(
            tree.kind(a),
            NodeKind::Method(_)
                | NodeKind::Constructor(_)
                | NodeKind::Initializer { .. }
                | NodeKind::Lambda { .. }
                | NodeKind::Field(_)
        )
    })
}

/// Whether `node` sits in a static context (static member or nested in one).
pub fn is_static_context(tree: &Tree, node: NodeId) -> bool {
    for ancestor in std::iter::once(node).chain(tree.ancestors(node)) {
        match tree.kind(ancestor) {
            NodeKind::Method(data) | NodeKind::Constructor(data) => {
                return data.modifiers.is_static
            }
            NodeKind::Field(data) => return data.modifiers.is_static,
            NodeKind::Initializer { is_static } => return *is_static,
            NodeKind::AnonymousClass | NodeKind::Class(_) => return false,
            _ => {}
        }
    }
    false
}

pub fn params_of(tree: &Tree, callable: NodeId) -> Vec<NodeId> {
    tree.children(callable)
        .iter()
        .copied()
        .filter(|&c| matches!(tree.kind(c), NodeKind::Param(_)))
        .collect()
}

pub fn body_of(tree: &Tree, callable: NodeId) -> Option<NodeId> {
    match tree.kind(callable) {
        NodeKind::Lambda { param_count, .. } => tree.child(callable, *param_count),
        _ => tree
            .children(callable)
            .iter()
            .copied()
            .find(|&c| matches!(tree.kind(c), NodeKind::Block)),
    }
}

/// Argument expressions of a call-like node.
pub fn call_args(tree: &Tree, call: NodeId) -> Vec<NodeId> {
    let children = tree.children(call);
    match tree.kind(call) {
        NodeKind::MethodCall {
            has_receiver: true,
            ..
        } => children[1..].to_vec(),
        NodeKind::New { has_body: true, .. } => children[..children.len() - 1].to_vec(),
        NodeKind::MethodCall { .. }
        | NodeKind::New { .. }
        | NodeKind::CtorCall { .. }
        | NodeKind::EnumConstant { .. } => children.to_vec(),
        _ => Vec::new(),
    }
}

pub fn call_receiver(tree: &Tree, call: NodeId) -> Option<NodeId> {
    match tree.kind(call) {
        NodeKind::MethodCall {
            has_receiver: true,
            ..
        }
        | NodeKind::FieldAccess { .. }
        | NodeKind::MethodRef { .. } => tree.child(call, 0),
        _ => None,
    }
}

/// Declared supertypes: superclass first, then interfaces. For an anonymous
/// class this is the instantiated type.
pub fn supertype_names(tree: &Tree, class: NodeId) -> Vec<String> {
    match tree.kind(class) {
        NodeKind::Class(data) => data.extends.iter().chain(&data.implements).cloned().collect(),
        NodeKind::AnonymousClass => match tree.parent(class).map(|p| tree.kind(p)) {
            Some(NodeKind::New { ty, .. }) => vec![ty.clone()],
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

pub fn supertypes(tree: &Tree, class: NodeId) -> Vec<NodeId> {
    supertype_names(tree, class)
        .iter()
        .filter_map(|name| find_class(tree, name))
        .filter(|&found| found != class)
        .collect()
}

pub fn superclass(tree: &Tree, class: NodeId) -> Option<NodeId> {
    match tree.kind(class) {
        NodeKind::Class(data) => data.extends.as_deref().and_then(|n| find_class(tree, n)),
        NodeKind::AnonymousClass => supertypes(tree, class).into_iter().next(),
        _ => None,
    }
}

/// All transitive supertypes of `class`, nearest first, excluding `class`.
pub fn all_supertypes(tree: &Tree, class: NodeId) -> Vec<NodeId> {
    let mut seen = HashSet::from([class]);
    let mut out = Vec::new();
    let mut queue = vec![class];
    while let Some(current) = queue.pop() {
        for sup in supertypes(tree, current) {
            if seen.insert(sup) {
                out.push(sup);
                queue.insert(0, sup);
            }
        }
    }
    out
}

/// Whether `class` is `base` or inherits from it.
pub fn is_subclass_of(tree: &Tree, class: NodeId, base: NodeId) -> bool {
    class == base || all_supertypes(tree, class).contains(&base)
}

/// Field (or enum constant) named `name`, searching supertypes too.
pub fn find_field(tree: &Tree, class: NodeId, name: &str) -> Option<NodeId> {
    std::iter::once(class)
        .chain(all_supertypes(tree, class))
        .find_map(|c| own_field(tree, c, name))
}

fn own_field(tree: &Tree, class: NodeId, name: &str) -> Option<NodeId> {
    tree.children(class).iter().copied().find(|&m| match tree.kind(m) {
        NodeKind::Field(data) => data.name == name,
        NodeKind::EnumConstant { name: n, .. } => n == name,
        _ => false,
    })
}

/// Methods named `name` visible in `class`, own declarations first.
pub fn find_methods(tree: &Tree, class: NodeId, name: &str) -> Vec<NodeId> {
    std::iter::once(class)
        .chain(all_supertypes(tree, class))
        .flat_map(|c| {
            tree.children(c)
                .iter()
                .copied()
                .filter(|&m| matches!(tree.kind(m), NodeKind::Method(data) if data.name == name))
                .collect::<Vec<_>>()
        })
        .collect()
}

pub fn constructors_of(tree: &Tree, class: NodeId) -> Vec<NodeId> {
    tree.children(class)
        .iter()
        .copied()
        .filter(|&m| matches!(tree.kind(m), NodeKind::Constructor(_)))
        .collect()
}

/// Parameter types of a method or constructor, varargs as `T...`.
pub fn param_types(tree: &Tree, callable: NodeId) -> Vec<String> {
    params_of(tree, callable)
        .into_iter()
        .filter_map(|p| tree.kind(p).var_data())
        .map(|data| {
            if data.varargs {
                format!("{}...", data.ty)
            } else {
                data.ty.clone()
            }
        })
        .collect()
}

pub fn is_varargs(tree: &Tree, callable: NodeId) -> bool {
    params_of(tree, callable)
        .last()
        .and_then(|&p| tree.kind(p).var_data())
        .is_some_and(|data| data.varargs)
}

fn same_signature(tree: &Tree, a: NodeId, b: NodeId) -> bool {
    let (Some(da), Some(db)) = (tree.kind(a).method_data(), tree.kind(b).method_data()) else {
        return false;
    };
    da.name == db.name
        && param_types(tree, a)
            .iter()
            .map(|t| simple_type_name(t).to_string())
            .eq(param_types(tree, b).iter().map(|t| simple_type_name(t).to_string()))
}

fn arity_matches(tree: &Tree, callable: NodeId, args: usize) -> bool {
    let params = params_of(tree, callable).len();
    if is_varargs(tree, callable) {
        args + 1 >= params
    } else {
        args == params
    }
}

/// Picks the applicable overloads among `candidates` for `args`.
fn select_overload(tree: &Tree, candidates: Vec<NodeId>, args: &[NodeId]) -> CallResolution {
    let mut applicable: Vec<NodeId> = Vec::new();
    for candidate in candidates {
        if !arity_matches(tree, candidate, args.len()) {
            continue;
        }
        // Overridden declarations further up the hierarchy are hidden.
        if applicable.iter().any(|&a| same_signature(tree, a, candidate)) {
            continue;
        }
        applicable.push(candidate);
    }
    if applicable.len() > 1 {
        let arg_types: Vec<Option<String>> =
            args.iter().map(|&a| static_type(tree, a)).collect();
        let typed: Vec<NodeId> = applicable
            .iter()
            .copied()
            .filter(|&c| types_match(tree, c, &arg_types))
            .collect();
        if !typed.is_empty() {
            applicable = typed;
        }
    }
    if applicable.len() > 1 {
        let exact: Vec<NodeId> = applicable
            .iter()
            .copied()
            .filter(|&c| !is_varargs(tree, c))
            .collect();
        if exact.len() == 1 {
            applicable = exact;
        }
    }
    match applicable.len() {
        0 => CallResolution::Unresolved,
        1 => CallResolution::Unique(applicable[0]),
        _ => CallResolution::Ambiguous(applicable),
    }
}

fn types_match(tree: &Tree, callable: NodeId, arg_types: &[Option<String>]) -> bool {
    let params = param_types(tree, callable);
    arg_types.iter().enumerate().all(|(i, arg)| {
        let Some(arg) = arg else {
            return true;
        };
        let param = params
            .get(i)
            .or_else(|| params.last())
            .map(|p| p.trim_end_matches("...").to_string());
        match param {
            Some(param) => {
                simple_type_name(&param) == simple_type_name(arg)
                    || param == "Object"
                    || boxes_to(arg, &param)
            }
            None => false,
        }
    })
}

fn boxes_to(primitive: &str, boxed: &str) -> bool {
    matches!(
        (primitive, boxed),
        ("int", "Integer")
            | ("long", "Long")
            | ("double", "Double")
            | ("float", "Float")
            | ("boolean", "Boolean")
            | ("char", "Character")
            | ("short", "Short")
            | ("byte", "Byte")
            | ("int", "long")
            | ("int", "double")
            | ("long", "double")
            | ("float", "double")
    )
}

/// Class whose members an unqualified or qualified access refers to.
fn receiver_class(tree: &Tree, receiver: NodeId) -> Option<NodeId> {
    match tree.kind(receiver) {
        NodeKind::This { qualifier: None } => enclosing_class(tree, receiver),
        NodeKind::This {
            qualifier: Some(q),
        } => find_class(tree, q),
        NodeKind::Super { qualifier: None } => {
            enclosing_class(tree, receiver).and_then(|c| superclass(tree, c))
        }
        NodeKind::Super {
            qualifier: Some(q),
        } => find_class(tree, q).and_then(|c| superclass(tree, c)),
        NodeKind::Name { ident } => match resolve_name(tree, receiver) {
            Some(decl) => decl_type(tree, decl).and_then(|ty| find_class(tree, &ty)),
            None => find_class(tree, ident),
        },
        NodeKind::Paren => tree.child(receiver, 0).and_then(|e| receiver_class(tree, e)),
        _ => static_type(tree, receiver).and_then(|ty| find_class(tree, &ty)),
    }
}

/// Resolves a method call to its declaration(s).
pub fn resolve_call(tree: &Tree, call: NodeId) -> CallResolution {
    let NodeKind::MethodCall { name, has_receiver } = tree.kind(call) else {
        return match tree.kind(call) {
            NodeKind::CtorCall { .. } => resolve_ctor_call(tree, call),
            NodeKind::New { .. } => resolve_new(tree, call),
            _ => CallResolution::Unresolved,
        };
    };
    let args = call_args(tree, call);
    if *has_receiver {
        let Some(class) = tree.child(call, 0).and_then(|r| receiver_class(tree, r)) else {
            return CallResolution::Unresolved;
        };
        return select_overload(tree, find_methods(tree, class, name), &args);
    }
    // Unqualified calls bind to the innermost class declaring the name.
    for class in tree.ancestors(call).filter(|&a| tree.kind(a).is_type_body()) {
        let candidates = find_methods(tree, class, name);
        if !candidates.is_empty() {
            return select_overload(tree, candidates, &args);
        }
    }
    CallResolution::Unresolved
}

/// `this(..)` / `super(..)` constructor invocations.
pub fn resolve_ctor_call(tree: &Tree, call: NodeId) -> CallResolution {
    let NodeKind::CtorCall { is_super } = tree.kind(call) else {
        return CallResolution::Unresolved;
    };
    let Some(mut class) = tree.ancestors(call).find(|&a| matches!(tree.kind(a), NodeKind::Class(_)))
    else {
        return CallResolution::Unresolved;
    };
    if *is_super {
        match superclass(tree, class) {
            Some(sup) => class = sup,
            None => return CallResolution::Unresolved,
        }
    }
    select_overload(tree, constructors_of(tree, class), &call_args(tree, call))
}

pub fn resolve_new(tree: &Tree, new: NodeId) -> CallResolution {
    let NodeKind::New { ty, .. } = tree.kind(new) else {
        return CallResolution::Unresolved;
    };
    match find_class(tree, ty) {
        Some(class) => select_overload(tree, constructors_of(tree, class), &call_args(tree, new)),
        None => CallResolution::Unresolved,
    }
}

pub fn resolve_field_access(tree: &Tree, access: NodeId) -> Option<NodeId> {
    let NodeKind::FieldAccess { name } = tree.kind(access) else {
        return None;
    };
    let class = receiver_class(tree, tree.child(access, 0)?)?;
    find_field(tree, class, name)
}

/// `Type::name` / `expr::name`. Constructor references are not resolved.
pub fn resolve_method_ref(tree: &Tree, reference: NodeId) -> CallResolution {
    let NodeKind::MethodRef { name } = tree.kind(reference) else {
        return CallResolution::Unresolved;
    };
    if name == "new" {
        return CallResolution::Unresolved;
    }
    let Some(class) = tree.child(reference, 0).and_then(|r| receiver_class(tree, r)) else {
        return CallResolution::Unresolved;
    };
    let mut candidates: Vec<NodeId> = Vec::new();
    for method in find_methods(tree, class, name) {
        if !candidates.iter().any(|&c| same_signature(tree, c, method)) {
            candidates.push(method);
        }
    }
    match candidates.len() {
        0 => CallResolution::Unresolved,
        1 => CallResolution::Unique(candidates[0]),
        _ => CallResolution::Ambiguous(candidates),
    }
}

/// Declarations in supertypes that `method` overrides.
pub fn super_methods(tree: &Tree, method: NodeId) -> Vec<NodeId> {
    let Some(name) = tree.kind(method).method_data().map(|d| d.name.clone()) else {
        return Vec::new();
    };
    let Some(class) = tree.parent(method) else {
        return Vec::new();
    };
    all_supertypes(tree, class)
        .into_iter()
        .flat_map(|sup| {
            tree.children(sup)
                .iter()
                .copied()
                .filter(|&m| {
                    matches!(tree.kind(m), NodeKind::Method(d) if d.name == name)
                        && same_signature(tree, m, method)
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Declarations in subclasses (anonymous ones included) that override `method`.
pub fn overriding_methods(tree: &Tree, method: NodeId) -> Vec<NodeId> {
    let Some(data) = tree.kind(method).method_data() else {
        return Vec::new();
    };
    if data.modifiers.is_static
        || data.modifiers.visibility == quill_syntax::Visibility::Private
        || data.return_ty.is_none()
    {
        return Vec::new();
    }
    let Some(class) = tree.parent(method) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for (_, root) in tree.java_files() {
        for node in tree.descendants(root) {
            if node == class || !tree.kind(node).is_type_body() {
                continue;
            }
            if !all_supertypes(tree, node).contains(&class) {
                continue;
            }
            out.extend(
                tree.children(node)
                    .iter()
                    .copied()
                    .filter(|&m| same_signature(tree, m, method)),
            );
        }
    }
    out
}

/// Declared type of a variable-like declaration.
pub fn decl_type(tree: &Tree, decl: NodeId) -> Option<String> {
    match tree.kind(decl) {
        NodeKind::InstanceOf { ty, .. } => Some(ty.clone()),
        NodeKind::EnumConstant { .. } => enclosing_class(tree, decl)
            .and_then(|c| tree.kind(c).class_data())
            .map(|d| d.name.clone()),
        kind => kind
            .var_data()
            .filter(|d| d.has_explicit_type() && d.ty != "var")
            .map(|d| d.effective_ty()),
    }
}

/// Best-effort static type of an expression as source text.
pub fn static_type(tree: &Tree, expr: NodeId) -> Option<String> {
    let child = |i: usize| tree.child(expr, i);
    match tree.kind(expr) {
        NodeKind::Literal { kind, .. } => match kind {
            LiteralKind::Int => Some("int".into()),
            LiteralKind::Long => Some("long".into()),
            LiteralKind::Float => Some("float".into()),
            LiteralKind::Double => Some("double".into()),
            LiteralKind::Char => Some("char".into()),
            LiteralKind::String => Some("String".into()),
            LiteralKind::Bool => Some("boolean".into()),
            LiteralKind::Null => None,
        },
        NodeKind::Name { .. } => resolve_name(tree, expr).and_then(|d| decl_type(tree, d)),
        NodeKind::FieldAccess { name } => match resolve_field_access(tree, expr) {
            Some(field) => decl_type(tree, field),
            None if name == "length" => Some("int".into()),
            None => None,
        },
        NodeKind::MethodCall { .. } => resolve_call(tree, expr)
            .unique()
            .and_then(|m| tree.kind(m).method_data())
            .and_then(|d| d.return_ty.clone()),
        NodeKind::New { ty, .. } | NodeKind::Cast { ty } => Some(ty.clone()),
        NodeKind::NewArray { ty, dims, .. } => Some(format!("{ty}{}", "[]".repeat(*dims))),
        NodeKind::ClassLiteral { .. } => Some("Class".into()),
        NodeKind::InstanceOf { .. } => Some("boolean".into()),
        NodeKind::This { qualifier } => match qualifier {
            Some(q) => Some(q.clone()),
            None => enclosing_class(tree, expr)
                .and_then(|c| tree.kind(c).class_data())
                .map(|d| d.name.clone()),
        },
        NodeKind::Paren | NodeKind::Assign { .. } => child(0).and_then(|e| static_type(tree, e)),
        NodeKind::Conditional => child(1)
            .and_then(|e| static_type(tree, e))
            .or_else(|| child(2).and_then(|e| static_type(tree, e))),
        NodeKind::Unary { op: UnaryOp::Not } => Some("boolean".into()),
        NodeKind::Unary { .. } => child(0).and_then(|e| static_type(tree, e)),
        NodeKind::Binary { op } if op.is_comparison() => Some("boolean".into()),
        NodeKind::Binary { op } => {
            let lhs = child(0).and_then(|e| static_type(tree, e));
            let rhs = child(1).and_then(|e| static_type(tree, e));
            if *op == BinaryOp::Add
                && (lhs.as_deref() == Some("String") || rhs.as_deref() == Some("String"))
            {
                return Some("String".into());
            }
            binary_numeric_type(lhs, rhs)
        }
        NodeKind::ArrayAccess => child(0)
            .and_then(|e| static_type(tree, e))
            .and_then(|ty| ty.strip_suffix("[]").map(str::to_string)),
        _ => None,
    }
}

fn binary_numeric_type(lhs: Option<String>, rhs: Option<String>) -> Option<String> {
    const RANK: &[&str] = &["int", "long", "float", "double"];
    match (lhs, rhs) {
        (Some(l), Some(r)) => {
            let rank = |t: &str| RANK.iter().position(|&p| p == t);
            match (rank(&l), rank(&r)) {
                (Some(a), Some(b)) => Some(RANK[a.max(b)].to_string()),
                _ => Some(l),
            }
        }
        (l, r) => l.or(r),
    }
}
