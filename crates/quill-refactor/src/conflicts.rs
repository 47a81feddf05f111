//! Conflict collection.
//!
//! Every check here is read-only. A report with a blocking conflict stops the
//! refactoring before the tree is touched; warnings are shown to the user for
//! confirmation.

use std::collections::{BTreeMap, HashSet};

use quill_config::InlineOptions;
use quill_resolve::{
    enclosing_class, enclosing_member, overriding_methods, resolve_call, resolve_field_access,
    resolve_name, super_methods,
};
use quill_syntax::{print_node, FileId, NodeId, NodeKind, TextSize, Tree};
use serde::{Serialize, Serializer};

use crate::entity::{Entity, EntityKind};
use crate::occurrence::{bucket_by_file, OccurrenceKind, Usage, UsageClass};
use crate::oracle::AccessibilityOracle;
use crate::safety::{
    can_substitute, evaluation_order_problem, has_side_effects, write_reaches, Verdict,
};
use crate::scope::{check_move, MoveProblemKind, Receiver};
use crate::transform::ctor::plan_ctor_call;
use crate::transform::method::{plan_call, plan_method_ref, Strategy};
use crate::transform::value::{value_receiver, value_source, ValueSource};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Warning,
    Blocking,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ConflictKind {
    Accessibility,
    Overriding,
    UnsupportedPosition,
    WriteUsage,
    SideEffect,
    SemanticChange,
    FieldRead,
    Reflective,
    DocReference,
    NonCodeUsage,
    CrossFile,
    Shadowing,
    Capture,
    AmbiguousOverload,
    VoidAsValue,
    SuperCall,
    EvaluationOrder,
    FallbackStrategy,
    Recursive,
    ReadOnly,
}

/// Where a conflict was found.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ConflictLocation {
    /// The declaration as a whole.
    Entity,
    Node { file: Option<FileId>, node: NodeId },
    /// A match in comment, documentation or non-code text.
    Text { file: FileId, offset: TextSize },
}

impl ConflictLocation {
    pub fn node(tree: &Tree, node: NodeId) -> Self {
        ConflictLocation::Node {
            file: tree.file_of(node),
            node,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub severity: Severity,
    pub kind: ConflictKind,
    pub message: String,
}

impl Conflict {
    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Blocking
    }
}

/// Conflicts keyed by location. Adding the same conflict twice at one
/// location keeps a single entry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConflictReport {
    entries: BTreeMap<ConflictLocation, Vec<Conflict>>,
}

impl ConflictReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, location: ConflictLocation, conflict: Conflict) {
        let at = self.entries.entry(location).or_default();
        if !at.contains(&conflict) {
            at.push(conflict);
        }
    }

    pub fn blocking(
        &mut self,
        location: ConflictLocation,
        kind: ConflictKind,
        message: impl Into<String>,
    ) {
        self.add(
            location,
            Conflict {
                severity: Severity::Blocking,
                kind,
                message: message.into(),
            },
        );
    }

    pub fn warning(
        &mut self,
        location: ConflictLocation,
        kind: ConflictKind,
        message: impl Into<String>,
    ) {
        self.add(
            location,
            Conflict {
                severity: Severity::Warning,
                kind,
                message: message.into(),
            },
        );
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ConflictLocation, &Conflict)> {
        self.entries
            .iter()
            .flat_map(|(location, conflicts)| conflicts.iter().map(move |c| (location, c)))
    }

    pub fn blocking_conflicts(&self) -> impl Iterator<Item = (&ConflictLocation, &Conflict)> {
        self.iter().filter(|(_, c)| c.is_blocking())
    }

    pub fn warnings(&self) -> impl Iterator<Item = (&ConflictLocation, &Conflict)> {
        self.iter().filter(|(_, c)| !c.is_blocking())
    }

    pub fn has_blocking(&self) -> bool {
        self.blocking_conflicts().next().is_some()
    }

    pub fn has_kind(&self, kind: ConflictKind) -> bool {
        self.iter().any(|(_, c)| c.kind == kind)
    }

    pub fn messages(&self) -> Vec<String> {
        self.iter().map(|(_, c)| c.message.clone()).collect()
    }

    pub fn merge(&mut self, other: ConflictReport) {
        for (location, conflicts) in other.entries {
            for conflict in conflicts {
                self.add(location, conflict);
            }
        }
    }
}

impl Serialize for ConflictReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Entry<'a> {
            location: &'a ConflictLocation,
            #[serde(flatten)]
            conflict: &'a Conflict,
        }
        serializer.collect_seq(
            self.iter()
                .map(|(location, conflict)| Entry { location, conflict }),
        )
    }
}

/// Read-only inputs of conflict collection.
pub struct ConflictContext<'a> {
    pub tree: &'a Tree,
    pub options: &'a InlineOptions,
    pub oracle: &'a dyn AccessibilityOracle,
    /// The occurrence selected by the user, if any.
    pub reference: Option<NodeId>,
}

impl ConflictContext<'_> {
    fn deletes_declaration(&self) -> bool {
        !self.options.inline_this_only && self.options.delete_declaration
    }
}

/// Collects every conflict of inlining `entity` at `usages`.
pub fn collect_conflicts(
    cx: &ConflictContext<'_>,
    entity: &Entity,
    usages: &[Usage],
) -> ConflictReport {
    let mut report = ConflictReport::new();
    let tree = cx.tree;

    let buckets = bucket_by_file(usages);
    if entity.kind.is_local_like() && buckets.len() > 1 {
        report.blocking(
            ConflictLocation::Entity,
            ConflictKind::CrossFile,
            format!(
                "local `{}` is referenced from {} files",
                entity.name,
                buckets.len()
            ),
        );
    }

    for usage in usages {
        let location = usage_location(usage);
        match usage.class {
            UsageClass::Doc => report.warning(
                location,
                ConflictKind::DocReference,
                format!("`{}` is referenced from documentation", entity.name),
            ),
            UsageClass::Reflective => report.warning(
                location,
                ConflictKind::Reflective,
                format!(
                    "`{}` is looked up by name through reflection",
                    entity.name
                ),
            ),
            UsageClass::NonCode => report.warning(
                location,
                ConflictKind::NonCodeUsage,
                format!("`{}` is mentioned in a non-code location", entity.name),
            ),
            UsageClass::Read | UsageClass::Write | UsageClass::ReadWrite => {
                if let Some(node) = usage.node() {
                    if tree.check_writable(node).is_err() {
                        report.blocking(
                            location,
                            ConflictKind::ReadOnly,
                            "the occurrence is in a read-only file",
                        );
                    }
                }
            }
        }
    }

    match entity.kind {
        EntityKind::Method => method_conflicts(cx, entity, usages, &mut report),
        EntityKind::Constructor => constructor_conflicts(cx, entity, usages, &mut report),
        _ => value_conflicts(cx, entity, usages, &mut report),
    }

    tracing::debug!(
        target: "quill.refactor",
        name = %entity.name,
        total = report.len(),
        blocking = report.blocking_conflicts().count(),
        "collected conflicts"
    );
    report
}

fn usage_location(usage: &Usage) -> ConflictLocation {
    let occurrence = &usage.occurrence;
    match (occurrence.kind, occurrence.node, occurrence.text_range) {
        (OccurrenceKind::Code | OccurrenceKind::MethodReference, Some(node), _) => {
            ConflictLocation::Node {
                file: Some(occurrence.file),
                node,
            }
        }
        (_, _, Some(range)) => ConflictLocation::Text {
            file: occurrence.file,
            offset: range.start(),
        },
        (_, Some(node), None) => ConflictLocation::Node {
            file: Some(occurrence.file),
            node,
        },
        (_, None, None) => ConflictLocation::Entity,
    }
}

pub(crate) fn move_kind(kind: MoveProblemKind) -> ConflictKind {
    match kind {
        MoveProblemKind::Shadowed => ConflictKind::Shadowing,
        MoveProblemKind::Capture => ConflictKind::Capture,
        MoveProblemKind::Unqualifiable => ConflictKind::SemanticChange,
        MoveProblemKind::Super => ConflictKind::SuperCall,
    }
}

fn code_reads(usages: &[Usage]) -> Vec<NodeId> {
    usages
        .iter()
        .filter(|u| u.class == UsageClass::Read)
        .filter_map(Usage::node)
        .collect()
}

fn value_conflicts(
    cx: &ConflictContext<'_>,
    entity: &Entity,
    usages: &[Usage],
    report: &mut ConflictReport,
) {
    let tree = cx.tree;
    let Ok(source) = value_source(tree, entity) else {
        return;
    };
    let init = source.expr();
    let reads = code_reads(usages);
    let access_count = reads.len();
    let init_has_effects = has_side_effects(tree, init);
    let init_text = print_node(tree, init);

    if init_has_effects {
        match (&source, entity.kind) {
            (ValueSource::Pattern { .. }, _) => report.blocking(
                ConflictLocation::Entity,
                ConflictKind::SideEffect,
                format!("`{init_text}` has side effects and would be evaluated again"),
            ),
            (_, EntityKind::Local) if cx.options.inline_this_only => report.blocking(
                ConflictLocation::Entity,
                ConflictKind::SideEffect,
                format!(
                    "`{init_text}` would run both at the declaration and at the occurrence"
                ),
            ),
            (_, EntityKind::Field) if access_count == 1 => report.warning(
                ConflictLocation::Entity,
                ConflictKind::EvaluationOrder,
                format!("`{init_text}` would run at the occurrence instead of at initialization"),
            ),
            _ => {}
        }
    }

    let mut accessibility_seen = HashSet::new();
    for &site in &reads {
        let location = ConflictLocation::node(tree, site);

        if entity.kind.is_local_like() && write_reaches(tree, entity.decl, entity.decl, site) {
            report.blocking(
                location,
                ConflictKind::WriteUsage,
                format!("`{}` is reassigned before this occurrence", entity.name),
            );
        }

        match can_substitute(tree, init, site, access_count, false) {
            Verdict::Safe => {}
            Verdict::Review(reason) => report.warning(location, ConflictKind::FieldRead, reason),
            Verdict::Unsafe(reason) => {
                let kind = if init_has_effects && access_count != 1 {
                    ConflictKind::SideEffect
                } else {
                    ConflictKind::SemanticChange
                };
                report.blocking(location, kind, reason);
            }
        }

        if entity.kind == EntityKind::Local && access_count == 1 {
            if let Some(reason) = evaluation_order_problem(tree, init, entity.decl, site) {
                report.blocking(location, ConflictKind::EvaluationOrder, reason);
            }
        }

        let receiver = value_receiver(tree, entity, site);
        if let Receiver::Expr(qualifier) = receiver {
            if has_side_effects(tree, qualifier) {
                report.blocking(
                    location,
                    ConflictKind::SideEffect,
                    format!(
                        "qualifier `{}` would no longer be evaluated",
                        print_node(tree, qualifier)
                    ),
                );
            }
        }
        let analysis = check_move(tree, init, site, &receiver, &[]);
        for problem in analysis.problems {
            report.blocking(location, move_kind(problem.kind), problem.message);
        }

        if entity.kind != EntityKind::Local {
            check_accessibility(cx, init, site, &mut accessibility_seen, report);
        }
    }

    if let ValueSource::Argument { calls, .. } = &source {
        for &call in calls {
            if tree.check_writable(call).is_err() {
                report.blocking(
                    ConflictLocation::node(tree, call),
                    ConflictKind::ReadOnly,
                    "the call is in a read-only file and its argument cannot be removed",
                );
            }
        }
        if let Some(owner) = entity.owner(tree) {
            hierarchy_conflicts(cx, owner, report, true);
        }
    }
}

/// Reports members referenced inside `code` that `site` cannot access,
/// once per containing declaration of the site.
fn check_accessibility(
    cx: &ConflictContext<'_>,
    code: NodeId,
    site: NodeId,
    seen: &mut HashSet<(Option<NodeId>, NodeId)>,
    report: &mut ConflictReport,
) {
    let tree = cx.tree;
    let container = enclosing_member(tree, site).or_else(|| enclosing_class(tree, site));
    for member in referenced_members(tree, code) {
        if tree.is_within(member, code) || cx.oracle.is_accessible(tree, member, site) {
            continue;
        }
        if !seen.insert((container, member)) {
            continue;
        }
        let name = tree.kind(member).declared_name().unwrap_or("member");
        let from = container
            .and_then(|c| tree.kind(c).declared_name())
            .unwrap_or("the call site");
        report.blocking(
            ConflictLocation::node(tree, site),
            ConflictKind::Accessibility,
            format!("`{name}` is not accessible from `{from}`"),
        );
    }
}

/// Fields, methods and constructors referenced inside `root`.
fn referenced_members(tree: &Tree, root: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    for node in tree.descendants(root) {
        let member = match tree.kind(node) {
            NodeKind::Name { .. } => resolve_name(tree, node).filter(|&d| {
                matches!(tree.kind(d), NodeKind::Field(_) | NodeKind::EnumConstant { .. })
            }),
            NodeKind::FieldAccess { .. } => resolve_field_access(tree, node),
            NodeKind::MethodCall { .. } | NodeKind::New { .. } | NodeKind::CtorCall { .. } => {
                resolve_call(tree, node).unique()
            }
            _ => None,
        };
        if let Some(member) = member {
            if !out.contains(&member) {
                out.push(member);
            }
        }
    }
    out
}

/// Overriding relations of a method whose body or signature changes.
fn hierarchy_conflicts(
    cx: &ConflictContext<'_>,
    method: NodeId,
    report: &mut ConflictReport,
    signature_changes: bool,
) {
    let tree = cx.tree;
    let name = tree.kind(method).declared_name().unwrap_or("method");
    let overriders = overriding_methods(tree, method);
    if !overriders.is_empty() {
        report.blocking(
            ConflictLocation::Entity,
            ConflictKind::Overriding,
            format!(
                "`{name}` is overridden in {} place(s); inlining would bypass dynamic dispatch",
                overriders.len()
            ),
        );
    }
    if !super_methods(tree, method).is_empty() {
        let message = format!("`{name}` overrides a method of a supertype");
        if signature_changes || cx.deletes_declaration() {
            report.blocking(ConflictLocation::Entity, ConflictKind::Overriding, message);
        } else {
            report.warning(ConflictLocation::Entity, ConflictKind::Overriding, message);
        }
    }
}

fn method_conflicts(
    cx: &ConflictContext<'_>,
    entity: &Entity,
    usages: &[Usage],
    report: &mut ConflictReport,
) {
    let tree = cx.tree;
    let method = entity.decl;
    hierarchy_conflicts(cx, method, report, false);

    let recursive = quill_resolve::body_of(tree, method).is_some_and(|body| {
        tree.descendants(body).into_iter().any(|n| {
            let resolution = match tree.kind(n) {
                NodeKind::MethodRef { .. } => quill_resolve::resolve_method_ref(tree, n),
                _ => resolve_call(tree, n),
            };
            resolution.candidates().contains(&method)
        })
    });
    if recursive && !(cx.options.inline_this_only && cx.reference.is_some()) {
        report.blocking(
            ConflictLocation::Entity,
            ConflictKind::Recursive,
            format!("`{}` is recursive", entity.name),
        );
    }

    let mut accessibility_seen = HashSet::new();
    for usage in usages {
        let Some(site) = usage.node() else {
            continue;
        };
        if !usage.class.is_code() {
            continue;
        }
        let location = ConflictLocation::node(tree, site);
        if usage.occurrence.ambiguous {
            report.blocking(
                location,
                ConflictKind::AmbiguousOverload,
                format!("the call of `{}` matches several overloads", entity.name),
            );
            continue;
        }
        let plan_problems = match usage.occurrence.kind {
            OccurrenceKind::MethodReference => {
                let plan = plan_method_ref(tree, site, method);
                for warning in plan.warnings {
                    report.warning(location, warning.0, warning.1);
                }
                plan.problems
            }
            _ => {
                let plan = plan_call(tree, site, method);
                if plan.strategy == Strategy::LabeledBlock {
                    report.warning(
                        location,
                        ConflictKind::FallbackStrategy,
                        format!(
                            "the body of `{}` is inlined as a labeled block",
                            entity.name
                        ),
                    );
                }
                plan.problems
            }
        };
        for (kind, message) in plan_problems {
            report.blocking(location, kind, message);
        }
        if let Some(body) = quill_resolve::body_of(tree, method) {
            check_accessibility(cx, body, site, &mut accessibility_seen, report);
        }
    }
}

fn constructor_conflicts(
    cx: &ConflictContext<'_>,
    entity: &Entity,
    usages: &[Usage],
    report: &mut ConflictReport,
) {
    let tree = cx.tree;
    let mut accessibility_seen = HashSet::new();
    for usage in usages.iter().filter(|u| u.class.is_code()) {
        let Some(site) = usage.node() else {
            continue;
        };
        let location = ConflictLocation::node(tree, site);
        if usage.occurrence.ambiguous {
            report.blocking(
                location,
                ConflictKind::AmbiguousOverload,
                format!("the call of `{}` matches several constructors", entity.name),
            );
            continue;
        }
        let plan = plan_ctor_call(tree, site, entity.decl);
        for (kind, message) in plan.problems {
            report.blocking(location, kind, message);
        }
        if let Some(delegation) = plan.delegation {
            check_accessibility(cx, delegation, site, &mut accessibility_seen, report);
        }
    }
}
