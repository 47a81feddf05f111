//! Method inlining.
//!
//! A call is replaced by the method body. Arguments and a non-trivial
//! receiver are first bound to fresh locals so they are evaluated exactly
//! once and in order; the locals that turn out to be unnecessary are
//! substituted back afterwards. How `return` statements are lowered depends
//! on the shape of the body, see [`Strategy`].

use std::collections::HashSet;

use quill_resolve::members::{is_subclass_of, is_varargs};
use quill_resolve::scopes::{declarations_in, is_local_decl};
use quill_resolve::{
    body_of, call_args, call_receiver, completes_normally, decl_type, enclosing_class,
    find_references, params_of, references_in, resolve_name, static_type,
};
use quill_syntax::{
    make, print_node, LiteralKind, MethodData, NodeId, NodeKind, Tree, TreeError, VarData,
};
use serde::Serialize;

use crate::conflicts::{move_kind, ConflictKind};
use crate::entity::Entity;
use crate::error::InlineError;
use crate::occurrence::{access_mode, AccessMode, Usage, UsageClass};
use crate::oracle::base_name;
use crate::safety::{
    can_substitute, evaluation_order_problem, has_side_effects, intervening_statements,
    is_conditionally_evaluated, preceding_evaluations, Verdict,
};
use crate::scope::{apply_move, check_move, expected_bindings, verify_bindings, Receiver};
use crate::transform::braces::{ensure_block_context, simplify_lambda, unwrap_blocks};
use crate::transform::{
    clean_up_references, make_final, reverse_document_order, site_ready, Rewriter,
    TransformResult,
};

/// How the body replaces a call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// The body is `return e;` and `e` replaces the call.
    Expression,
    /// Statements are spliced before the call; a trailing `return e` supplies
    /// the value.
    TrailingReturn,
    /// Every return assigns a result variable declared before the body.
    ResultVariable,
    /// The body runs in a labeled block; returns become assignments plus
    /// `break label`.
    LabeledBlock,
}

/// Where the call sits relative to its statement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallPosition {
    /// `call(..);`
    Statement,
    /// `T v = call(..);`
    LocalInit,
    /// Somewhere inside a larger expression of a statement.
    Nested,
    /// `x -> call(..)`
    LambdaBody,
    /// Not inside any statement, e.g. a field initializer.
    NoStatement,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallPlan {
    pub call: NodeId,
    pub method: NodeId,
    pub position: CallPosition,
    pub strategy: Strategy,
    pub receiver: Receiver,
    /// Receiver expression that is bound to a fresh local first.
    pub receiver_temp: Option<NodeId>,
    /// The body expression replaces the call in place, without temporaries.
    pub direct: bool,
    /// The body is wrapped in `synchronized` on the receiver.
    pub synchronize: bool,
    pub problems: Vec<(ConflictKind, String)>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MethodRefPlan {
    pub warnings: Vec<(ConflictKind, String)>,
    pub problems: Vec<(ConflictKind, String)>,
}

/// Decides how the call `call` of `method` would be inlined and what would
/// prevent it.
pub fn plan_call(tree: &Tree, call: NodeId, method: NodeId) -> CallPlan {
    let data = tree.kind(method).method_data().cloned().unwrap_or_else(|| MethodData {
        name: String::new(),
        return_ty: None,
        modifiers: Default::default(),
        type_params: None,
        throws: Vec::new(),
        doc: None,
    });
    let name = data.name.clone();
    let mut problems = Vec::new();
    let position = call_position(tree, call);
    let (receiver, receiver_temp) = plan_receiver(tree, call, method, &data, &mut problems);
    let synchronize = data.modifiers.is_synchronized && !holds_lock(tree, call, method, &receiver);

    let mut plan = CallPlan {
        call,
        method,
        position,
        strategy: Strategy::TrailingReturn,
        receiver,
        receiver_temp,
        direct: false,
        synchronize,
        problems: Vec::new(),
    };
    let Some(body) = body_of(tree, method) else {
        problems.push((
            ConflictKind::UnsupportedPosition,
            format!("`{name}` has no body"),
        ));
        plan.problems = problems;
        return plan;
    };

    let returns = returns_in(tree, body);
    plan.strategy = choose_strategy(tree, body, &returns, position, synchronize);

    if data.is_void() && !matches!(position, CallPosition::Statement | CallPosition::LambdaBody) {
        problems.push((
            ConflictKind::VoidAsValue,
            format!("`{name}` returns nothing but its result is used"),
        ));
    }
    if !data.is_void()
        && returns.is_empty()
        && !matches!(position, CallPosition::Statement)
    {
        problems.push((
            ConflictKind::UnsupportedPosition,
            format!("`{name}` never returns a value to use here"),
        ));
    }

    if let Some((kind, reason)) = forced_direct(tree, call, body, position) {
        match direct_problem(tree, &plan, body) {
            None => plan.direct = true,
            Some(why) => problems.push((kind, format!("{reason} and {why}"))),
        }
    }

    let params = params_of(tree, method);
    let analysis = check_move(tree, body, call, &plan.receiver, &params);
    problems.extend(
        analysis
            .problems
            .into_iter()
            .map(|p| (move_kind(p.kind), p.message)),
    );
    plan.problems = problems;
    plan
}

fn call_position(tree: &Tree, call: NodeId) -> CallPosition {
    let Some(parent) = tree.parent(call) else {
        return CallPosition::NoStatement;
    };
    match tree.kind(parent) {
        NodeKind::ExprStmt => CallPosition::Statement,
        NodeKind::LocalVar(_) => CallPosition::LocalInit,
        NodeKind::Lambda { param_count, .. }
            if tree.index_in_parent(call) == Some(*param_count) =>
        {
            CallPosition::LambdaBody
        }
        _ if statement_boundary(tree, call).is_some() => CallPosition::Nested,
        _ => CallPosition::NoStatement,
    }
}

/// The statement containing `expr`, or the body of an expression lambda
/// containing it.
fn statement_boundary(tree: &Tree, expr: NodeId) -> Option<NodeId> {
    let mut current = expr;
    for ancestor in tree.ancestors(expr) {
        let kind = tree.kind(ancestor);
        match kind {
            NodeKind::Lambda { param_count, .. } => {
                return (tree.index_in_parent(current) == Some(*param_count)).then_some(current);
            }
            _ if kind.is_statement() => return Some(ancestor),
            _ if kind.is_member() || kind.is_type_body() => return None,
            _ => {}
        }
        current = ancestor;
    }
    None
}

/// Why statements cannot be inserted before the call, if they cannot.
fn forced_direct(
    tree: &Tree,
    call: NodeId,
    body: NodeId,
    position: CallPosition,
) -> Option<(ConflictKind, String)> {
    let unsupported = |why: &str| Some((ConflictKind::UnsupportedPosition, why.to_string()));
    let Some(boundary) = statement_boundary(tree, call) else {
        return unsupported("the call is not inside a statement");
    };
    if position == CallPosition::NoStatement {
        return unsupported("the call is not inside a statement");
    }

    let mut current = call;
    while current != boundary {
        let Some(parent) = tree.parent(current) else {
            break;
        };
        let index = tree.index_in_parent(current);
        match tree.kind(parent) {
            NodeKind::CtorCall { .. } => {
                return unsupported("the call is an argument of a constructor call")
            }
            NodeKind::ForUpdate => return unsupported("the call is in a loop update"),
            NodeKind::While if index == Some(0) => {
                return unsupported("the call is in a loop condition")
            }
            NodeKind::DoWhile if index == Some(1) => {
                return unsupported("the call is in a loop condition")
            }
            NodeKind::For { has_condition: true } if index == Some(1) => {
                return unsupported("the call is in a loop condition")
            }
            _ => {}
        }
        current = parent;
    }

    if is_conditionally_evaluated(tree, call, boundary) {
        return unsupported("the call is evaluated conditionally");
    }
    let preceding = preceding_evaluations(tree, call, boundary);
    let order_sensitive = preceding.iter().any(|&e| has_side_effects(tree, e))
        || (has_side_effects(tree, body)
            && preceding.iter().any(|&e| reads_mutable_field(tree, e)));
    if order_sensitive {
        return Some((
            ConflictKind::EvaluationOrder,
            "expressions evaluated before the call have side effects".to_string(),
        ));
    }
    None
}

fn reads_mutable_field(tree: &Tree, expr: NodeId) -> bool {
    tree.descendants(expr).into_iter().any(|n| {
        let decl = match tree.kind(n) {
            NodeKind::Name { .. } => resolve_name(tree, n),
            NodeKind::FieldAccess { .. } => quill_resolve::resolve_field_access(tree, n),
            _ => None,
        };
        decl.is_some_and(|d| {
            matches!(tree.kind(d), NodeKind::Field(data) if !data.modifiers.is_final)
        })
    })
}

/// Why the body cannot replace the call as a plain expression.
fn direct_problem(tree: &Tree, plan: &CallPlan, body: NodeId) -> Option<String> {
    if plan.synchronize {
        return Some("the method is synchronized".to_string());
    }
    if plan.strategy != Strategy::Expression {
        return Some("its body is more than a single return".to_string());
    }
    if plan.receiver_temp.is_some() {
        return Some("its receiver has side effects".to_string());
    }
    let value = single_return_value(tree, body)?;
    let params = params_of(tree, plan.method);
    let args = arg_values(tree, plan.call, plan.method);

    let mut effect_refs = Vec::new();
    for (index, &param) in params.iter().enumerate() {
        let refs: Vec<NodeId> = references_in(tree, value, param)
            .into_iter()
            .map(|r| r.node)
            .collect();
        let name = tree.kind(param).declared_name().unwrap_or_default();
        if refs.iter().any(|&r| access_mode(tree, r) != AccessMode::Read) {
            return Some(format!("parameter `{name}` is reassigned"));
        }
        let Some(arg) = args.get(index) else {
            return Some("the arguments do not match the parameters".to_string());
        };
        if !arg.has_side_effects(tree) {
            continue;
        }
        match refs.as_slice() {
            [only] => {
                if is_conditionally_evaluated(tree, *only, value) {
                    return Some(format!("argument for `{name}` would be evaluated conditionally"));
                }
                if preceding_evaluations(tree, *only, value)
                    .into_iter()
                    .any(|e| has_side_effects(tree, e))
                {
                    return Some(format!("argument for `{name}` would be evaluated out of order"));
                }
                effect_refs.push(*only);
            }
            _ => {
                return Some(format!(
                    "argument for `{name}` would be evaluated {} times",
                    refs.len()
                ))
            }
        }
    }
    let order = quill_syntax::DocumentOrder::new(tree, value);
    if effect_refs
        .windows(2)
        .any(|pair| !order.precedes(pair[0], pair[1]))
    {
        return Some("arguments would be evaluated out of order".to_string());
    }
    None
}

fn plan_receiver(
    tree: &Tree,
    call: NodeId,
    method: NodeId,
    data: &MethodData,
    problems: &mut Vec<(ConflictKind, String)>,
) -> (Receiver, Option<NodeId>) {
    let Some(qualifier) = call_receiver(tree, call) else {
        return (Receiver::Implicit, None);
    };
    if data.modifiers.is_static {
        if has_side_effects(tree, qualifier) {
            problems.push((
                ConflictKind::SideEffect,
                format!(
                    "qualifier `{}` of a static call would no longer be evaluated",
                    print_node(tree, qualifier)
                ),
            ));
        }
        let receiver = owner_name(tree, method).map_or(Receiver::Implicit, Receiver::Type);
        return (receiver, None);
    }
    match tree.kind(qualifier) {
        NodeKind::This { qualifier: None } | NodeKind::Super { qualifier: None } => {
            (Receiver::Implicit, None)
        }
        NodeKind::This { qualifier: Some(_) } => (Receiver::Expr(qualifier), None),
        NodeKind::Name { ident } => match resolve_name(tree, qualifier) {
            None => (Receiver::Type(ident.clone()), None),
            Some(decl) if is_local_decl(tree, decl) || is_final_field(tree, decl) => {
                (Receiver::Expr(qualifier), None)
            }
            Some(_) => (Receiver::Named(String::new()), Some(qualifier)),
        },
        _ if is_final_chain(tree, qualifier) => (Receiver::Expr(qualifier), None),
        _ => (Receiver::Named(String::new()), Some(qualifier)),
    }
}

fn is_final_field(tree: &Tree, decl: NodeId) -> bool {
    matches!(tree.kind(decl), NodeKind::Field(data) if data.modifiers.is_final)
}

/// `this.a.b` or `x.a.b` where every field is final.
fn is_final_chain(tree: &Tree, expr: NodeId) -> bool {
    match tree.kind(expr) {
        NodeKind::This { .. } => true,
        NodeKind::Name { .. } => resolve_name(tree, expr)
            .is_some_and(|d| is_local_decl(tree, d) || is_final_field(tree, d)),
        NodeKind::FieldAccess { .. } => {
            quill_resolve::resolve_field_access(tree, expr).is_some_and(|f| is_final_field(tree, f))
                && tree.child(expr, 0).is_some_and(|q| is_final_chain(tree, q))
        }
        _ => false,
    }
}

fn owner_name(tree: &Tree, method: NodeId) -> Option<String> {
    enclosing_class(tree, method)
        .and_then(|c| tree.kind(c).class_data())
        .map(|d| d.name.clone())
}

/// Whether the monitor the method would take is already held at `call`.
fn holds_lock(tree: &Tree, call: NodeId, method: NodeId, receiver: &Receiver) -> bool {
    let is_static = tree
        .kind(method)
        .modifiers()
        .is_some_and(|m| m.is_static);
    let owner = enclosing_class(tree, method);
    let owner_name = owner_name(tree, method);
    for ancestor in tree.ancestors(call) {
        match tree.kind(ancestor) {
            NodeKind::Synchronized => {
                let Some(lock) = tree.child(ancestor, 0) else {
                    continue;
                };
                let matches = match (tree.kind(lock), receiver) {
                    (NodeKind::ClassLiteral { ty }, _) if is_static => {
                        owner_name.as_deref() == Some(ty.as_str())
                    }
                    (NodeKind::This { qualifier: None }, Receiver::Implicit) => !is_static,
                    (_, Receiver::Expr(expr)) => print_node(tree, lock) == print_node(tree, *expr),
                    _ => false,
                };
                if matches {
                    return true;
                }
            }
            NodeKind::Method(data) => {
                if !data.modifiers.is_synchronized || data.modifiers.is_static != is_static {
                    return false;
                }
                let class = enclosing_class(tree, ancestor);
                return match (class, owner) {
                    (Some(class), Some(owner)) if is_static => class == owner,
                    (Some(class), Some(owner)) => {
                        *receiver == Receiver::Implicit && is_subclass_of(tree, class, owner)
                    }
                    _ => false,
                };
            }
            NodeKind::Lambda { .. } | NodeKind::AnonymousClass | NodeKind::Class(_) => {
                return false
            }
            _ => {}
        }
    }
    false
}

fn single_return_value(tree: &Tree, body: NodeId) -> Option<NodeId> {
    match tree.children(body) {
        [only] if matches!(tree.kind(*only), NodeKind::Return) => tree.child(*only, 0),
        _ => None,
    }
}

fn is_statement_expression(tree: &Tree, expr: NodeId) -> bool {
    match tree.kind(expr) {
        NodeKind::MethodCall { .. } | NodeKind::New { .. } | NodeKind::Assign { .. } => true,
        NodeKind::Unary { op } => op.is_increment(),
        _ => false,
    }
}

/// A value that may be dropped or kept as an expression statement.
fn droppable(tree: &Tree, value: NodeId) -> bool {
    is_statement_expression(tree, value) || !has_side_effects(tree, value)
}

fn choose_strategy(
    tree: &Tree,
    body: NodeId,
    returns: &[NodeId],
    position: CallPosition,
    synchronize: bool,
) -> Strategy {
    let stmts = tree.children(body);
    let statement = position == CallPosition::Statement;
    if !synchronize {
        if let Some(value) = single_return_value(tree, body) {
            if !statement {
                return Strategy::Expression;
            }
            if droppable(tree, value) {
                return Strategy::TrailingReturn;
            }
        } else if returns.is_empty() {
            return Strategy::TrailingReturn;
        } else if let [only] = returns {
            let trailing = stmts.last() == Some(only);
            let value_ok = tree
                .child(*only, 0)
                .map_or(true, |v| !statement || droppable(tree, v));
            if trailing && value_ok {
                return Strategy::TrailingReturn;
            }
        }
    }
    if tail_returns_only(tree, stmts) {
        Strategy::ResultVariable
    } else {
        Strategy::LabeledBlock
    }
}

/// Every `return` in `root` outside nested lambdas and classes, in document
/// order.
fn returns_in(tree: &Tree, root: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        match tree.kind(node) {
            NodeKind::Return => out.push(node),
            NodeKind::Lambda { .. } | NodeKind::AnonymousClass | NodeKind::Class(_) => continue,
            _ => {}
        }
        stack.extend(tree.children(node).iter().rev().copied());
    }
    out
}

fn contains_return(tree: &Tree, stmt: NodeId) -> bool {
    !returns_in(tree, stmt).is_empty()
}

/// Whether every return in `stmts` ends its path once `if (c) { .. return; }
/// rest` is rewritten to `if (c) { .. } else { rest }`.
fn tail_returns_only(tree: &Tree, stmts: &[NodeId]) -> bool {
    for (i, &stmt) in stmts.iter().enumerate() {
        if i + 1 == stmts.len() {
            return tail_ok(tree, stmt);
        }
        if !contains_return(tree, stmt) {
            continue;
        }
        return is_early_exit(tree, stmt)
            && tail_ok(tree, tree.children(stmt)[1])
            && tail_returns_only(tree, &stmts[i + 1..]);
    }
    true
}

fn tail_ok(tree: &Tree, stmt: NodeId) -> bool {
    match tree.kind(stmt) {
        NodeKind::Return => true,
        NodeKind::Block => tail_returns_only(tree, tree.children(stmt)),
        NodeKind::If => tree.children(stmt)[1..].iter().all(|&b| tail_ok(tree, b)),
        _ => !contains_return(tree, stmt),
    }
}

/// `if (c) stmt` without `else` whose branch never completes normally.
fn is_early_exit(tree: &Tree, stmt: NodeId) -> bool {
    let children = tree.children(stmt);
    matches!(tree.kind(stmt), NodeKind::If)
        && children.len() == 2
        && !completes_normally(tree, children[1])
}

/// Moves the statements after an early exit into a new `else` branch.
fn normalize_early_exits(tree: &mut Tree, block: NodeId) -> Result<(), TreeError> {
    let stmts = tree.children(block).to_vec();
    for (i, &stmt) in stmts.iter().enumerate() {
        match tree.kind(stmt) {
            NodeKind::Block => normalize_early_exits(tree, stmt)?,
            NodeKind::If => {
                let moved = i + 1 < stmts.len()
                    && contains_return(tree, stmt)
                    && is_early_exit(tree, stmt);
                if moved {
                    let else_block = make::block(tree, stmts[i + 1..].to_vec());
                    tree.append_child(stmt, else_block)?;
                }
                let branches = tree.children(stmt)[1..].to_vec();
                for branch in branches {
                    if matches!(tree.kind(branch), NodeKind::Block) {
                        normalize_early_exits(tree, branch)?;
                    }
                }
                if moved {
                    return Ok(());
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// An argument as bound to a parameter: varargs are packed into an array.
#[derive(Clone, Debug)]
enum ArgValue {
    Single(NodeId),
    Packed { ty: String, elements: Vec<NodeId> },
}

impl ArgValue {
    fn has_side_effects(&self, tree: &Tree) -> bool {
        match self {
            ArgValue::Single(arg) => has_side_effects(tree, *arg),
            ArgValue::Packed { elements, .. } => {
                elements.iter().any(|&e| has_side_effects(tree, e))
            }
        }
    }

    fn build(&self, tree: &mut Tree) -> NodeId {
        match self {
            ArgValue::Single(arg) => tree.deep_copy(*arg),
            ArgValue::Packed { ty, elements } => {
                let copies = elements.iter().map(|&e| tree.deep_copy(e)).collect();
                make::new_array(tree, ty.clone(), copies)
            }
        }
    }
}

fn arg_values(tree: &Tree, call: NodeId, method: NodeId) -> Vec<ArgValue> {
    let params = params_of(tree, method);
    let args = call_args(tree, call);
    if !is_varargs(tree, method) || params.is_empty() {
        return args.into_iter().map(ArgValue::Single).collect();
    }
    let fixed = params.len() - 1;
    let mut values: Vec<ArgValue> = args
        .iter()
        .take(fixed)
        .copied()
        .map(ArgValue::Single)
        .collect();
    let rest = args.get(fixed..).unwrap_or_default();
    let passes_array = match rest {
        [only] => {
            matches!(tree.kind(*only), NodeKind::Literal { kind: LiteralKind::Null, .. })
                || static_type(tree, *only).is_some_and(|t| t.ends_with("[]"))
        }
        _ => false,
    };
    if passes_array {
        values.push(ArgValue::Single(rest[0]));
    } else {
        let ty = tree
            .kind(params[fixed])
            .var_data()
            .map(|d| d.ty.clone())
            .unwrap_or_default();
        values.push(ArgValue::Packed {
            ty,
            elements: rest.to_vec(),
        });
    }
    values
}

/// Plans the rewrite of `qualifier::method` into a lambda calling the body.
pub fn plan_method_ref(tree: &Tree, site: NodeId, method: NodeId) -> MethodRefPlan {
    let mut plan = MethodRefPlan::default();
    let Some(data) = tree.kind(method).method_data() else {
        return plan;
    };
    let Some(body) = body_of(tree, method) else {
        plan.problems.push((
            ConflictKind::UnsupportedPosition,
            format!("`{}` has no body", data.name),
        ));
        return plan;
    };
    let Some(qualifier) = tree.child(site, 0) else {
        return plan;
    };
    let type_qualifier = matches!(tree.kind(qualifier), NodeKind::Name { .. })
        && resolve_name(tree, qualifier).is_none();
    if !type_qualifier && has_side_effects(tree, qualifier) {
        plan.warnings.push((
            ConflictKind::SideEffect,
            format!(
                "`{}` would be evaluated on every call instead of once",
                print_node(tree, qualifier)
            ),
        ));
    }
    let receiver = if data.modifiers.is_static {
        owner_name(tree, method).map_or(Receiver::Implicit, Receiver::Type)
    } else {
        match tree.kind(qualifier) {
            NodeKind::This { qualifier: None } | NodeKind::Super { qualifier: None } => {
                Receiver::Implicit
            }
            _ => Receiver::Named(String::new()),
        }
    };
    let params = params_of(tree, method);
    let analysis = check_move(tree, body, site, &receiver, &params);
    plan.problems.extend(
        analysis
            .problems
            .into_iter()
            .map(|p| (move_kind(p.kind), p.message)),
    );
    plan
}

/// Introduced declarations that are revisited once every call is done.
#[derive(Default)]
struct Leftovers {
    temps: Vec<NodeId>,
    result_vars: Vec<String>,
    wrappers: Vec<NodeId>,
    lambdas: Vec<NodeId>,
}

pub(crate) fn inline_method(
    tree: &mut Tree,
    entity: &Entity,
    usages: &[Usage],
    rw: &Rewriter<'_>,
    result: &mut TransformResult,
) -> Result<(), InlineError> {
    let method = entity.decl;
    let mut leftovers = Leftovers::default();
    for site in reverse_document_order(tree, usages, UsageClass::is_code) {
        if !site_ready(tree, site) {
            result.skipped += 1;
            continue;
        }
        let call = if matches!(tree.kind(site), NodeKind::MethodRef { .. }) {
            let (lambda, call) = method_ref_to_lambda(tree, site, method, rw)?;
            leftovers.lambdas.push(lambda);
            call
        } else {
            site
        };
        let strategy = inline_call(tree, call, method, rw, &mut leftovers)?;
        result.strategies.push(strategy);
        result.inlined += 1;
    }

    for &temp in leftovers.temps.iter().rev() {
        if let Some(name) = clean_up_temp(tree, temp)? {
            result.temporaries.push(name);
        }
    }
    result.temporaries.reverse();
    result.temporaries.extend(leftovers.result_vars);
    result.wrapper_blocks = unwrap_blocks(tree, &leftovers.wrappers)?;
    for &lambda in &leftovers.lambdas {
        simplify_lambda(tree, lambda)?;
    }

    if rw.should_delete(tree, entity, result) {
        clean_up_references(tree, entity)?;
        tree.remove(method)?;
        result.declaration_removed = true;
        tracing::debug!(target: "quill.refactor", name = %entity.name, "removed method");
    }
    Ok(())
}

/// `q::m` becomes `(a, b) -> q.m(a, b)`. Returns the lambda and the call.
fn method_ref_to_lambda(
    tree: &mut Tree,
    site: NodeId,
    method: NodeId,
    rw: &Rewriter<'_>,
) -> Result<(NodeId, NodeId), InlineError> {
    let qualifier = tree
        .child(site, 0)
        .ok_or_else(|| InlineError::invariant("method reference without qualifier"))?;
    let data = tree
        .kind(method)
        .method_data()
        .cloned()
        .ok_or_else(|| InlineError::invariant("method reference to a non-method"))?;
    let mut reserved = HashSet::new();
    let mut lambda_params = Vec::new();

    let unbound = match tree.kind(qualifier) {
        NodeKind::Name { ident } if resolve_name(tree, qualifier).is_none() => {
            (!data.modifiers.is_static).then(|| ident.clone())
        }
        _ => None,
    };
    let receiver_name = unbound.map(|ty| {
        let name = rw.suggester.suggest(tree, &base_name(&ty), site, &reserved);
        reserved.insert(name.clone());
        lambda_params.push(VarData::new(name.clone(), ""));
        name
    });
    let mut arg_names = Vec::new();
    for param in params_of(tree, method) {
        let base = tree.kind(param).declared_name().unwrap_or_default().to_string();
        let name = rw.suggester.suggest(tree, &base, site, &reserved);
        reserved.insert(name.clone());
        lambda_params.push(VarData::new(name.clone(), ""));
        arg_names.push(name);
    }

    let receiver = match receiver_name {
        Some(name) => make::name(tree, name),
        None => tree.deep_copy(qualifier),
    };
    let args = arg_names.into_iter().map(|n| make::name(tree, n)).collect();
    let call = make::method_call(tree, Some(receiver), data.name.clone(), args);
    let lambda = make::lambda(tree, lambda_params, call);
    make::replace_expr(tree, site, lambda)?;
    tracing::trace!(
        target: "quill.refactor",
        lambda = %print_node(tree, lambda),
        "expanded method reference"
    );
    Ok((lambda, call))
}

fn inline_call(
    tree: &mut Tree,
    call: NodeId,
    method: NodeId,
    rw: &Rewriter<'_>,
    leftovers: &mut Leftovers,
) -> Result<Strategy, InlineError> {
    let plan = plan_call(tree, call, method);
    if let Some((_, message)) = plan.problems.first() {
        return Err(InlineError::invariant(format!("call cannot be inlined: {message}")));
    }
    if plan.direct {
        substitute_directly(tree, &plan)?;
        return Ok(Strategy::Expression);
    }

    let context = ensure_block_context(tree, call)?
        .ok_or_else(|| InlineError::invariant("call is not inside a statement"))?;
    leftovers.wrappers.extend(context.wrapper);
    leftovers.lambdas.extend(context.lambda);
    let plan = if context.lambda.is_some() {
        let plan = plan_call(tree, call, method);
        if let Some((_, message)) = plan.problems.first() {
            return Err(InlineError::invariant(format!("call cannot be inlined: {message}")));
        }
        plan
    } else {
        plan
    };
    expand(tree, &plan, context.statement, rw, leftovers)?;
    Ok(plan.strategy)
}

/// Replaces the call with the single returned expression.
fn substitute_directly(tree: &mut Tree, plan: &CallPlan) -> Result<(), InlineError> {
    let body = body_of(tree, plan.method)
        .ok_or_else(|| InlineError::invariant("method lost its body"))?;
    let value = single_return_value(tree, body)
        .ok_or_else(|| InlineError::invariant("body is not a single return"))?;
    let params = params_of(tree, plan.method);
    let args = arg_values(tree, plan.call, plan.method);
    let analysis = check_move(tree, value, plan.call, &plan.receiver, &params);
    let param_refs: Vec<(usize, NodeId)> = params
        .iter()
        .enumerate()
        .flat_map(|(i, &p)| references_in(tree, value, p).into_iter().map(move |r| (i, r.node)))
        .collect();

    let (copy, map) = tree.deep_copy_with_map(value);
    let expected = expected_bindings(tree, value, &map, &analysis, &params);
    let holder = make::paren(tree, copy);
    apply_move(tree, &analysis, &map)?;
    for (index, reference) in param_refs {
        let Some(&target) = map.get(&reference) else {
            continue;
        };
        let arg = args
            .get(index)
            .ok_or_else(|| InlineError::invariant("missing argument"))?
            .build(tree);
        make::replace_expr(tree, target, arg)?;
    }
    let moved = tree
        .child(holder, 0)
        .ok_or_else(|| InlineError::invariant("copied body lost its holder"))?;
    tree.detach(moved)?;
    tree.remove(holder)?;
    let placed = make::replace_expr(tree, plan.call, moved)?;
    make_final(tree, &analysis.make_final)?;
    check_bindings(tree, &expected)?;
    tracing::debug!(
        target: "quill.refactor",
        value = %print_node(tree, placed),
        "substituted call"
    );
    Ok(())
}

fn check_bindings(tree: &Tree, expected: &[(NodeId, NodeId)]) -> Result<(), InlineError> {
    let mismatched = verify_bindings(tree, expected);
    if mismatched.is_empty() {
        Ok(())
    } else {
        Err(InlineError::invariant(format!(
            "{} name(s) changed meaning in the inlined body",
            mismatched.len()
        )))
    }
}

/// Splices the body before `statement`, which sits directly in a block.
fn expand(
    tree: &mut Tree,
    plan: &CallPlan,
    statement: NodeId,
    rw: &Rewriter<'_>,
    leftovers: &mut Leftovers,
) -> Result<(), InlineError> {
    let method = plan.method;
    let body = body_of(tree, method).ok_or_else(|| InlineError::invariant("method lost its body"))?;
    let data = tree
        .kind(method)
        .method_data()
        .cloned()
        .ok_or_else(|| InlineError::invariant("call target is not a method"))?;
    let params = params_of(tree, method);
    let args = arg_values(tree, plan.call, method);
    if args.len() != params.len() {
        return Err(InlineError::invariant("arguments do not match the parameters"));
    }

    let mut reserved = HashSet::new();
    let mut suggest = |tree: &Tree, base: &str| {
        let name = rw.suggester.suggest(tree, base, statement, &reserved);
        reserved.insert(name.clone());
        name
    };

    let mut prefix = Vec::new();
    let mut receiver = plan.receiver.clone();
    if let Some(qualifier) = plan.receiver_temp {
        let ty = static_type(tree, qualifier)
            .or_else(|| owner_name(tree, method))
            .unwrap_or_else(|| "Object".to_string());
        let name = suggest(tree, &base_name(quill_resolve::members::simple_type_name(&ty)));
        let init = tree.deep_copy(qualifier);
        let decl = make::local_var(tree, VarData::new(name.clone(), ty), Some(init));
        prefix.push(decl);
        leftovers.temps.push(decl);
        receiver = Receiver::Named(name);
    }

    let mut param_decls = Vec::new();
    let mut param_names = Vec::new();
    for (index, &param) in params.iter().enumerate() {
        let Some(var) = tree.kind(param).var_data().cloned() else {
            continue;
        };
        let name = suggest(tree, &var.name);
        let value = args[index].build(tree);
        let mut temp = VarData::new(name.clone(), var.effective_ty());
        temp.modifiers.is_final = var.modifiers.is_final;
        let decl = make::local_var(tree, temp, Some(value));
        prefix.push(decl);
        leftovers.temps.push(decl);
        param_decls.push(decl);
        param_names.push(name);
    }

    let returns = returns_in(tree, body);
    let lowered = matches!(plan.strategy, Strategy::ResultVariable | Strategy::LabeledBlock);
    let needs_value = !data.is_void()
        && (plan.position != CallPosition::Statement
            || returns
                .iter()
                .filter_map(|&r| tree.child(r, 0))
                .any(|v| !droppable(tree, v)));
    let reuse_local = (lowered && plan.position == CallPosition::LocalInit)
        .then(|| tree.parent(plan.call))
        .flatten()
        .filter(|&local| {
            local == statement
                && tree
                    .kind(local)
                    .var_data()
                    .is_some_and(|d| d.has_explicit_type() && d.ty != "var")
        });
    let result_var = match (lowered && needs_value, reuse_local) {
        (false, _) => None,
        (true, Some(local)) => tree.kind(local).declared_name().map(str::to_string),
        (true, None) => Some(suggest(tree, "result")),
    };
    let label = (plan.strategy == Strategy::LabeledBlock).then(|| suggest(tree, &data.name));

    let mut renames = Vec::new();
    for decl in declarations_in(tree, body) {
        let Some(name) = tree.kind(decl).declared_name().map(str::to_string) else {
            continue;
        };
        let fresh = suggest(tree, &name);
        if fresh != name {
            let refs: Vec<NodeId> = references_in(tree, body, decl)
                .into_iter()
                .map(|r| r.node)
                .collect();
            renames.push((decl, fresh, refs));
        }
    }
    let param_refs: Vec<Vec<NodeId>> = params
        .iter()
        .map(|&p| references_in(tree, body, p).into_iter().map(|r| r.node).collect())
        .collect();

    let analysis = check_move(tree, body, plan.call, &receiver, &params);
    if let Some(problem) = analysis.problems.first() {
        return Err(InlineError::invariant(format!(
            "body of `{}` cannot move to the call: {}",
            data.name, problem.message
        )));
    }
    let (copy, map) = tree.deep_copy_with_map(body);
    let mut expected = expected_bindings(tree, body, &map, &analysis, &params);
    apply_move(tree, &analysis, &map)?;

    for (index, refs) in param_refs.iter().enumerate() {
        for reference in refs {
            let Some(&target) = map.get(reference) else {
                continue;
            };
            let name = make::name(tree, param_names[index].clone());
            make::replace_expr(tree, target, name)?;
            expected.push((name, param_decls[index]));
        }
    }
    for (decl, fresh, refs) in &renames {
        if let Some(&copied) = map.get(decl) {
            match tree.kind_mut(copied)? {
                NodeKind::InstanceOf {
                    binding: Some(binding),
                    ..
                } => *binding = fresh.clone(),
                kind => {
                    if let Some(var) = kind.var_data_mut() {
                        var.name = fresh.clone();
                    }
                }
            }
        }
        for reference in refs {
            if let Some(&copied) = map.get(reference) {
                if let NodeKind::Name { ident } = tree.kind_mut(copied)? {
                    *ident = fresh.clone();
                }
            }
        }
    }

    let mut value = None;
    let stmts = if lowered {
        if plan.strategy == Strategy::ResultVariable {
            normalize_early_exits(tree, copy)?;
        }
        lower_returns(tree, copy, result_var.as_deref(), label.as_deref())?;
        let mut unit = copy;
        if plan.synchronize {
            let lock = lock_expr(tree, plan, &receiver, statement);
            unit = make::synchronized(tree, lock, unit);
        }
        if let Some(label) = &label {
            unit = make::labeled(tree, label.clone(), unit);
        }
        if reuse_local.is_none() {
            value = result_var.as_ref().map(|name| make::name(tree, name.clone()));
        }
        if unit == copy {
            unwrap_children(tree, copy)?
        } else {
            vec![unit]
        }
    } else {
        let mut stmts = unwrap_children(tree, copy)?;
        if let Some(last) = stmts.last().copied() {
            if matches!(tree.kind(last), NodeKind::Return) {
                stmts.pop();
                value = tree.child(last, 0);
                if let Some(v) = value {
                    tree.detach(v)?;
                }
                tree.remove(last)?;
            }
        }
        if plan.position == CallPosition::Statement {
            if let Some(v) = value.take() {
                if is_statement_expression(tree, v) {
                    stmts.push(make::expr_stmt(tree, v));
                } else {
                    tree.remove(v)?;
                }
            }
        }
        stmts
    };

    let block = tree
        .parent(statement)
        .ok_or_else(|| InlineError::invariant("statement has no block"))?;
    let mut index = tree
        .index_in_parent(statement)
        .ok_or_else(|| InlineError::invariant("statement has no block"))?;
    for decl in prefix {
        tree.insert_child(block, index, decl)?;
        index += 1;
    }

    if let Some(local) = reuse_local {
        // `T v = m();` keeps `T v;` and the body assigns `v`.
        tree.remove(plan.call)?;
        let mut at = tree
            .index_in_parent(local)
            .ok_or_else(|| InlineError::invariant("local has no block"))?
            + 1;
        for stmt in stmts {
            tree.insert_child(block, at, stmt)?;
            at += 1;
        }
    } else {
        if let (Some(name), true) = (&result_var, lowered) {
            let ty = data.return_ty.clone().unwrap_or_else(|| "Object".to_string());
            let decl = make::local_var(tree, VarData::new(name.clone(), ty), None);
            tree.insert_child(block, index, decl)?;
            index += 1;
            leftovers.result_vars.push(name.clone());
        }
        for stmt in stmts {
            tree.insert_child(block, index, stmt)?;
            index += 1;
        }
        match value {
            Some(value) => {
                make::replace_expr(tree, plan.call, value)?;
            }
            None if plan.position == CallPosition::Statement => {
                let stmt = tree
                    .parent(plan.call)
                    .ok_or_else(|| InlineError::invariant("call statement vanished"))?;
                remove_statement(tree, stmt)?;
            }
            None => return Err(InlineError::invariant("inlined call has no value")),
        }
    }

    make_final(tree, &analysis.make_final)?;
    check_bindings(tree, &expected)?;
    tracing::debug!(
        target: "quill.refactor",
        method = %data.name,
        strategy = ?plan.strategy,
        "inlined call"
    );
    Ok(())
}

fn unwrap_children(tree: &mut Tree, block: NodeId) -> Result<Vec<NodeId>, TreeError> {
    let stmts = tree.children(block).to_vec();
    for &stmt in &stmts {
        tree.detach(stmt)?;
    }
    tree.remove(block)?;
    Ok(stmts)
}

fn remove_statement(tree: &mut Tree, stmt: NodeId) -> Result<(), TreeError> {
    let in_block = tree
        .parent(stmt)
        .is_some_and(|p| matches!(tree.kind(p), NodeKind::Block));
    if in_block {
        tree.remove(stmt)
    } else {
        let empty = make::block(tree, Vec::new());
        tree.replace(stmt, empty)
    }
}

/// Rewrites every `return` in `root` according to the chosen result
/// variable and label.
fn lower_returns(
    tree: &mut Tree,
    root: NodeId,
    result: Option<&str>,
    label: Option<&str>,
) -> Result<(), TreeError> {
    for ret in returns_in(tree, root) {
        let mut replacement = Vec::new();
        if let Some(value) = tree.child(ret, 0) {
            tree.detach(value)?;
            match result {
                Some(var) => {
                    let target = make::name(tree, var);
                    let assign = make::assign(tree, target, value);
                    replacement.push(make::expr_stmt(tree, assign));
                }
                None if is_statement_expression(tree, value) => {
                    replacement.push(make::expr_stmt(tree, value));
                }
                None => tree.remove(value)?,
            }
        }
        let last_statement =
            tree.parent(ret) == Some(root) && tree.children(root).last() == Some(&ret);
        if let (Some(label), false) = (label, last_statement) {
            replacement.push(make::break_stmt(tree, Some(label.to_string())));
        }
        replace_statement(tree, ret, replacement)?;
    }
    Ok(())
}

fn replace_statement(tree: &mut Tree, old: NodeId, new: Vec<NodeId>) -> Result<(), TreeError> {
    let parent = tree.parent(old).ok_or(TreeError::Detached(old))?;
    if matches!(tree.kind(parent), NodeKind::Block) {
        let index = tree.index_in_parent(old).ok_or(TreeError::Detached(old))?;
        for (offset, stmt) in new.into_iter().enumerate() {
            tree.insert_child(parent, index + offset, stmt)?;
        }
        return tree.remove(old);
    }
    let replacement = match <[NodeId; 1]>::try_from(new) {
        Ok([single]) => single,
        Err(many) => make::block(tree, many),
    };
    tree.replace(old, replacement)
}

fn lock_expr(tree: &mut Tree, plan: &CallPlan, receiver: &Receiver, statement: NodeId) -> NodeId {
    let owner = enclosing_class(tree, plan.method);
    let owner_name = owner_name(tree, plan.method).unwrap_or_default();
    let is_static = tree
        .kind(plan.method)
        .modifiers()
        .is_some_and(|m| m.is_static);
    if is_static {
        return make::class_literal(tree, owner_name);
    }
    match receiver {
        Receiver::Implicit => {
            let inside_owner = enclosing_class(tree, statement)
                .zip(owner)
                .is_some_and(|(class, owner)| is_subclass_of(tree, class, owner));
            make::this(tree, (!inside_owner).then_some(owner_name))
        }
        Receiver::Named(name) => make::name(tree, name.clone()),
        Receiver::Expr(expr) => tree.deep_copy(*expr),
        Receiver::Type(ty) => make::class_literal(tree, ty.clone()),
    }
}

/// Substitutes an introduced local back into its uses when that changes
/// nothing. Returns the name when the local has to stay.
fn clean_up_temp(tree: &mut Tree, temp: NodeId) -> Result<Option<String>, InlineError> {
    if !tree.is_alive(temp) {
        return Ok(None);
    }
    let Some(name) = tree.kind(temp).declared_name().map(str::to_string) else {
        return Ok(None);
    };
    let Some(init) = tree.child(temp, 0) else {
        return Ok(Some(name));
    };
    let refs: Vec<NodeId> = find_references(tree, temp)
        .into_iter()
        .map(|r| r.node)
        .collect();
    if refs.iter().any(|&r| access_mode(tree, r) != AccessMode::Read) {
        return Ok(Some(name));
    }
    if refs.is_empty() {
        if !has_side_effects(tree, init) {
            tree.remove(temp)?;
            return Ok(None);
        }
        if is_statement_expression(tree, init) {
            tree.detach(init)?;
            let stmt = make::expr_stmt(tree, init);
            tree.replace(temp, stmt)?;
            return Ok(None);
        }
        return Ok(Some(name));
    }
    if !temp_inlinable(tree, temp, init, &refs) {
        return Ok(Some(name));
    }
    for &reference in refs.iter().rev() {
        let copy = tree.deep_copy(init);
        let placed = make::replace_expr(tree, reference, copy)?;
        make::strip_redundant_paren(tree, placed)?;
    }
    tree.remove(temp)?;
    tracing::trace!(target: "quill.refactor", %name, "folded temporary");
    Ok(None)
}

fn temp_inlinable(tree: &Tree, temp: NodeId, init: NodeId, refs: &[NodeId]) -> bool {
    if refs.len() > 1 && !is_trivial(tree, init) {
        return false;
    }
    let same_type = match (static_type(tree, init), decl_type(tree, temp)) {
        (Some(found), Some(declared)) => {
            found.replace(' ', "") == declared.replace(' ', "")
        }
        (None, _) => matches!(
            tree.kind(init),
            NodeKind::Name { .. } | NodeKind::This { .. }
        ),
        (Some(_), None) => true,
    };
    if !same_type {
        return false;
    }
    refs.iter().all(|&site| {
        let verdict = can_substitute(tree, init, site, refs.len(), false);
        let substitutable = match verdict {
            Verdict::Safe => true,
            Verdict::Review(_) => quiet_between(tree, temp, site),
            Verdict::Unsafe(_) => false,
        };
        if !substitutable {
            return false;
        }
        if refs.len() == 1 && evaluation_order_problem(tree, init, temp, site).is_some() {
            return false;
        }
        let analysis = check_move(tree, init, site, &Receiver::Implicit, &[]);
        analysis.is_clean() && analysis.requalify.is_empty() && analysis.make_final.is_empty()
    })
}

fn quiet_between(tree: &Tree, temp: NodeId, site: NodeId) -> bool {
    let Some(block) = tree.parent(temp) else {
        return false;
    };
    let Some(site_stmt) = tree.child_towards(block, site) else {
        return false;
    };
    intervening_statements(tree, temp, site)
        .into_iter()
        .all(|stmt| !has_side_effects(tree, stmt))
        && preceding_evaluations(tree, site, site_stmt)
            .into_iter()
            .all(|e| !has_side_effects(tree, e))
}

fn is_trivial(tree: &Tree, expr: NodeId) -> bool {
    match tree.kind(expr) {
        NodeKind::Literal { .. }
        | NodeKind::Name { .. }
        | NodeKind::This { .. }
        | NodeKind::ClassLiteral { .. } => true,
        NodeKind::FieldAccess { .. } => tree
            .child(expr, 0)
            .is_some_and(|q| matches!(tree.kind(q), NodeKind::This { .. } | NodeKind::Name { .. })),
        NodeKind::Unary { op } if !op.is_increment() => tree
            .child(expr, 0)
            .is_some_and(|o| matches!(tree.kind(o), NodeKind::Literal { .. })),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_test_utils::Fixture;

    fn method_named(tree: &Tree, name: &str) -> NodeId {
        tree.java_files()
            .flat_map(|(_, root)| tree.descendants(root))
            .find(|&n| {
                matches!(tree.kind(n), NodeKind::Method(d) if d.name == name)
            })
            .expect("method exists")
    }

    fn strategy_of(source: &str, method: &str) -> Strategy {
        let fixture = Fixture::parse(source);
        let tree = &fixture.tree;
        let call = fixture.node_at(1);
        let call = tree
            .ancestors(call)
            .into_iter()
            .chain(std::iter::once(call))
            .find(|&n| matches!(tree.kind(n), NodeKind::MethodCall { .. }))
            .expect("call at marker");
        plan_call(tree, call, method_named(tree, method)).strategy
    }

    #[test]
    fn single_return_is_an_expression() {
        let strategy = strategy_of(
            r#"
//- /A.java
class A {
    int twice(int v) { return v * 2; }
    void use() { int x = 1 + $1twice(3); }
}
"#,
            "twice",
        );
        assert_eq!(strategy, Strategy::Expression);
    }

    #[test]
    fn early_exits_use_a_result_variable() {
        let strategy = strategy_of(
            r#"
//- /A.java
class A {
    int sign(int v) {
        if (v < 0) {
            return -1;
        }
        return 1;
    }
    void use() { int x = 1 + $1sign(3); }
}
"#,
            "sign",
        );
        assert_eq!(strategy, Strategy::ResultVariable);
    }

    #[test]
    fn returns_inside_loops_need_a_label() {
        let strategy = strategy_of(
            r#"
//- /A.java
class A {
    int first(int[] values) {
        for (int v : values) {
            if (v > 0) {
                return v;
            }
        }
        return 0;
    }
    void use(int[] xs) { int x = 1 + $1first(xs); }
}
"#,
            "first",
        );
        assert_eq!(strategy, Strategy::LabeledBlock);
    }

    #[test]
    fn loop_conditions_are_rejected_when_the_body_is_not_an_expression() {
        let fixture = Fixture::parse(
            r#"
//- /A.java
class A {
    boolean more() {
        System.out.println("checking");
        return true;
    }
    void use() { while ($1more()) { } }
}
"#,
        );
        let tree = &fixture.tree;
        let call = fixture.node_at(1);
        let call = std::iter::once(call)
            .chain(tree.ancestors(call))
            .find(|&n| matches!(tree.kind(n), NodeKind::MethodCall { .. }))
            .expect("call");
        let plan = plan_call(tree, call, method_named(tree, "more"));
        assert!(plan
            .problems
            .iter()
            .any(|(kind, _)| *kind == ConflictKind::UnsupportedPosition));
    }
}
