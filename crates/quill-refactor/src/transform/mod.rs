//! Tree rewriting for each kind of inlined entity.
//!
//! Everything here runs after conflict collection accepted the request and
//! while the session holds the write lock. Occurrences are rewritten in
//! reverse document order so earlier node handles stay meaningful.

pub mod braces;
pub mod ctor;
pub mod method;
pub mod value;

use std::sync::OnceLock;

use quill_config::InlineOptions;
use quill_resolve::enclosing_class;
use quill_syntax::{DocumentOrder, NodeId, NodeKind, Tree, TreeError};
use regex::Regex;
use serde::Serialize;

use crate::entity::{Entity, EntityKind};
use crate::error::InlineError;
use crate::occurrence::{doc_link_targets, Usage, UsageClass};
use crate::oracle::NameSuggester;

pub use method::Strategy;

/// What a transformation did.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TransformResult {
    pub inlined: usize,
    /// Introduced variables that survived cleanup.
    pub temporaries: Vec<String>,
    /// Braces added around single statements that had to stay.
    pub wrapper_blocks: usize,
    pub strategies: Vec<Strategy>,
    /// Occurrences left untouched because they could no longer be rewritten.
    pub skipped: usize,
    pub declaration_removed: bool,
}

/// Collaborators used while rewriting.
pub struct Rewriter<'a> {
    pub suggester: &'a dyn NameSuggester,
    pub options: &'a InlineOptions,
}

/// Rewrites every code usage of `entity`.
pub fn apply(
    tree: &mut Tree,
    entity: &Entity,
    usages: &[Usage],
    rw: &Rewriter<'_>,
) -> Result<TransformResult, InlineError> {
    entity.revalidate(tree)?;
    let mut result = TransformResult::default();
    match entity.kind {
        EntityKind::Method => method::inline_method(tree, entity, usages, rw, &mut result)?,
        EntityKind::Constructor => ctor::inline_constructor(tree, entity, usages, rw, &mut result)?,
        _ => value::inline_value(tree, entity, usages, rw, &mut result)?,
    }
    tracing::debug!(
        target: "quill.refactor",
        name = %entity.name,
        inlined = result.inlined,
        skipped = result.skipped,
        removed = result.declaration_removed,
        "transformed"
    );
    Ok(result)
}

/// Code usages of the given classes, last occurrence first. Files are
/// processed in reverse id order; inside a file deeper and later nodes come
/// first.
pub(crate) fn reverse_document_order(
    tree: &Tree,
    usages: &[Usage],
    include: impl Fn(UsageClass) -> bool,
) -> Vec<NodeId> {
    let mut keyed: Vec<((Option<u32>, u32), NodeId)> = usages
        .iter()
        .filter(|u| include(u.class))
        .filter_map(|u| u.node())
        .filter(|&node| tree.is_alive(node))
        .map(|node| {
            let order = DocumentOrder::for_node(tree, node);
            let file = tree.file_of(node).map(|f| f.to_raw());
            ((file, order.position(node).unwrap_or(0)), node)
        })
        .collect();
    keyed.sort_by(|a, b| b.0.cmp(&a.0));
    keyed.dedup_by_key(|(_, node)| *node);
    keyed.into_iter().map(|(_, node)| node).collect()
}

/// Whether a site can still be rewritten; logs the reason when it cannot.
pub(crate) fn site_ready(tree: &Tree, site: NodeId) -> bool {
    let check = tree
        .ensure_alive(site)
        .and_then(|()| tree.check_writable(site));
    match check {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(target: "quill.refactor", ?site, %err, "skipping occurrence");
            false
        }
    }
}

impl Rewriter<'_> {
    /// The declaration goes away only when every occurrence was rewritten.
    pub(crate) fn should_delete(
        &self,
        tree: &Tree,
        entity: &Entity,
        result: &TransformResult,
    ) -> bool {
        !self.options.inline_this_only
            && self.options.delete_declaration
            && result.skipped == 0
            && tree.is_alive(entity.decl)
            && tree.check_writable(entity.decl).is_ok()
    }
}

/// Marks the given variables `final`.
pub(crate) fn make_final(tree: &mut Tree, decls: &[NodeId]) -> Result<(), TreeError> {
    for &decl in decls {
        if !tree.is_alive(decl) {
            continue;
        }
        if tree.kind(decl).modifiers().is_some_and(|m| m.is_final) {
            continue;
        }
        if let Some(modifiers) = tree.kind_mut(decl)?.modifiers_mut() {
            modifiers.is_final = true;
            tracing::debug!(target: "quill.refactor", ?decl, "marked captured variable final");
        }
    }
    Ok(())
}

fn doc_link_pattern(name: &str) -> Regex {
    Regex::new(&format!(
        r"\{{@link(?:plain)?\s+([\w.]*)#{}(?:\([^)]*\))?(?:\s+([^}}]*))?\}}",
        regex::escape(name)
    ))
    .expect("valid regex")
}

fn static_import_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^static\s+").expect("valid regex"))
}

/// Rewrites doc links to a deleted member and drops its static imports.
/// Read-only files are left alone.
pub(crate) fn clean_up_references(tree: &mut Tree, entity: &Entity) -> Result<(), TreeError> {
    let link = doc_link_pattern(&entity.name);
    let owner = enclosing_class(tree, entity.decl)
        .and_then(|c| tree.kind(c).class_data())
        .map(|c| c.name.clone());
    let import_suffix = owner.map(|owner| format!("{owner}.{}", entity.name));

    let roots: Vec<_> = tree.java_files().map(|(_, root)| root).collect();
    for root in roots {
        if tree.check_writable(root).is_err() {
            continue;
        }
        for node in tree.descendants(root) {
            let Some(doc) = tree.kind(node).doc() else {
                continue;
            };
            if !link.is_match(doc) {
                continue;
            }
            let rewritten = link
                .replace_all(doc, |caps: &regex::Captures<'_>| {
                    let qualifier = caps.get(1).map_or("", |q| q.as_str());
                    if !doc_link_targets(tree, node, qualifier, entity) {
                        return caps[0].to_string();
                    }
                    match caps.get(2) {
                        Some(label) if !label.as_str().trim().is_empty() => {
                            label.as_str().trim().to_string()
                        }
                        _ => format!("{{@code {}}}", entity.name),
                    }
                })
                .into_owned();
            if rewritten == doc {
                continue;
            }
            if let Some(slot) = tree.kind_mut(node)?.doc_mut() {
                *slot = Some(rewritten);
            }
        }
        let Some(suffix) = &import_suffix else {
            continue;
        };
        let NodeKind::CompilationUnit { imports, .. } = tree.kind(root) else {
            continue;
        };
        let stale = |import: &String| {
            static_import_prefix()
                .replace(import, "")
                .strip_suffix(suffix.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.ends_with('.'))
                && static_import_prefix().is_match(import)
        };
        if imports.iter().any(stale) {
            let kept: Vec<String> = imports.iter().filter(|i| !stale(*i)).cloned().collect();
            if let NodeKind::CompilationUnit { imports, .. } = tree.kind_mut(root)? {
                *imports = kept;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_test_utils::Fixture;

    fn field_named(fixture: &Fixture, name: &str) -> Entity {
        let tree = &fixture.tree;
        let decl = tree
            .java_files()
            .flat_map(|(_, root)| tree.descendants(root))
            .find(|&n| matches!(tree.kind(n), NodeKind::Field(data) if data.name == name))
            .unwrap();
        Entity::from_decl(tree, decl).unwrap()
    }

    #[test]
    fn doc_links_to_the_member_become_code_spans() {
        let mut fixture = Fixture::parse(
            r#"class A {
    static final int helper = 1;

    /** See {@link #helper} and {@link A#helper the helper}, not {@link #helperX}. */
    int a() {
        return helper;
    }
}
"#,
        );
        let entity = field_named(&fixture, "helper");
        clean_up_references(&mut fixture.tree, &entity).unwrap();
        assert_eq!(
            fixture.text("/Main.java"),
            r#"class A {
    static final int helper = 1;

    /** See {@code helper} and the helper, not {@link #helperX}. */
    int a() {
        return helper;
    }
}
"#
        );
    }

    #[test]
    fn links_to_a_same_named_member_elsewhere_survive() {
        let mut fixture = Fixture::parse(
            r#"class A {
    static final int K = 1;
}

class B {
    static final int K = 2;

    /** Uses {@link B#K} and {@link #K}, unlike {@link A#K}. */
    int b() {
        return K;
    }
}
"#,
        );
        let entity = field_named(&fixture, "K");
        clean_up_references(&mut fixture.tree, &entity).unwrap();
        assert!(
            fixture
                .text("/Main.java")
                .contains("/** Uses {@link B#K} and {@link #K}, unlike {@code K}. */"),
            "{}",
            fixture.text("/Main.java")
        );
    }
}
