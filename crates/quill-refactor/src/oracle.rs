//! Collaborators consulted while planning a refactoring.

use std::collections::HashSet;

use quill_resolve::scopes::declarations_in;
use quill_resolve::{enclosing_member, resolve_ident_at};
use quill_syntax::{NodeId, NodeKind, Tree};

/// Decides whether a member is visible from an access point.
pub trait AccessibilityOracle: Send + Sync {
    fn is_accessible(&self, tree: &Tree, member: NodeId, from: NodeId) -> bool;
}

/// The default Java access rules.
#[derive(Clone, Copy, Debug, Default)]
pub struct JavaAccessRules;

impl AccessibilityOracle for JavaAccessRules {
    fn is_accessible(&self, tree: &Tree, member: NodeId, from: NodeId) -> bool {
        quill_resolve::is_accessible(tree, member, from)
    }
}

/// Produces identifiers for introduced temporaries and labels.
pub trait NameSuggester: Send + Sync {
    /// A name based on `base` that neither resolves to anything at `at` nor
    /// is declared in the member containing `at`, and is not in `reserved`.
    fn suggest(&self, tree: &Tree, base: &str, at: NodeId, reserved: &HashSet<String>) -> String;
}

/// Appends a counter (`x`, `x1`, `x2`, ..) until the name is free.
#[derive(Clone, Copy, Debug, Default)]
pub struct CounterNameSuggester;

impl NameSuggester for CounterNameSuggester {
    fn suggest(&self, tree: &Tree, base: &str, at: NodeId, reserved: &HashSet<String>) -> String {
        let declared: HashSet<String> = enclosing_member(tree, at)
            .map(|member| {
                declarations_in(tree, member)
                    .into_iter()
                    .filter_map(|d| tree.kind(d).declared_name().map(str::to_string))
                    .chain(labels_in(tree, member))
                    .collect()
            })
            .unwrap_or_default();
        let base = if base.is_empty() { "value" } else { base };
        let is_free = |candidate: &str| {
            !reserved.contains(candidate)
                && !declared.contains(candidate)
                && resolve_ident_at(tree, at, candidate).is_none()
        };
        if is_free(base) {
            return base.to_string();
        }
        (1..)
            .map(|n| format!("{base}{n}"))
            .find(|candidate| is_free(candidate))
            .unwrap_or_else(|| base.to_string())
    }
}

fn labels_in(tree: &Tree, root: NodeId) -> Vec<String> {
    tree.descendants(root)
        .into_iter()
        .filter_map(|n| match tree.kind(n) {
            NodeKind::Labeled { label } => Some(label.clone()),
            _ => None,
        })
        .collect()
}

/// `getValue` -> `value`, `Point` -> `point`.
pub fn base_name(name: &str) -> String {
    let stripped = ["get", "is"]
        .iter()
        .find_map(|prefix| {
            name.strip_prefix(prefix)
                .filter(|rest| rest.chars().next().is_some_and(char::is_uppercase))
        })
        .unwrap_or(name);
    let simple = stripped
        .split('<')
        .next()
        .unwrap_or(stripped)
        .trim_end_matches("[]");
    let simple = simple.rsplit('.').next().unwrap_or(simple);
    let mut chars = simple.chars();
    let name: String = match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    };
    if KEYWORDS.contains(&name.as_str()) {
        format!("{name}Value")
    } else {
        name
    }
}

const KEYWORDS: &[&str] = &[
    "boolean", "byte", "char", "class", "default", "double", "float", "int", "long", "new",
    "short", "super", "this",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_names() {
        assert_eq!(base_name("getValue"), "value");
        assert_eq!(base_name("isDone"), "done");
        assert_eq!(base_name("issue"), "issue");
        assert_eq!(base_name("java.util.List<String>"), "list");
        assert_eq!(base_name("Point"), "point");
        assert_eq!(base_name("Class<?>"), "classValue");
    }
}
