//! Occurrence search.

use quill_resolve::{enclosing_member, references_in};
use quill_syntax::{FileContent, FileId, LiteralKind, NodeId, NodeKind, TextRange, TextSize, Tree};
use regex::Regex;

use crate::cancel::CancellationToken;
use crate::entity::Entity;
use crate::error::InlineError;
use crate::occurrence::{doc_link_targets, is_reflective_literal, Occurrence, OccurrenceKind};

/// Which non-code places are searched in addition to code references.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SearchScope {
    pub comments_and_strings: bool,
    pub text_files: bool,
}

/// Enumerates the occurrences of an entity.
pub trait ReferenceSearch: Send + Sync {
    fn find_occurrences(
        &self,
        tree: &Tree,
        entity: &Entity,
        scope: SearchScope,
        cancel: &CancellationToken,
    ) -> Result<Vec<Occurrence>, InlineError>;
}

/// Searches the tree directly. Doc references and reflective string literals
/// are always reported; other comment, string and text matches only when the
/// scope asks for them.
#[derive(Clone, Copy, Debug, Default)]
pub struct TreeReferenceSearch;

impl ReferenceSearch for TreeReferenceSearch {
    fn find_occurrences(
        &self,
        tree: &Tree,
        entity: &Entity,
        scope: SearchScope,
        cancel: &CancellationToken,
    ) -> Result<Vec<Occurrence>, InlineError> {
        let word = word_pattern(&entity.name);
        let doc_link = Regex::new(&format!(r"([\w.]*)#{}\b", regex::escape(&entity.name)))
            .expect("valid regex");
        let mut out = Vec::new();

        // Locals never escape their enclosing member.
        let roots: Vec<_> = if entity.kind.is_local_like() {
            let member = enclosing_member(tree, tree.parent(entity.decl).unwrap_or(entity.decl))
                .unwrap_or_else(|| tree.root_of(entity.decl));
            entity
                .file
                .map(|file| vec![(file, member)])
                .unwrap_or_default()
        } else {
            tree.java_files().collect()
        };

        for (file, root) in roots {
            cancel.check()?;
            for reference in references_in(tree, root, entity.decl) {
                let mut occurrence = Occurrence::code(file, reference.node, reference.ambiguous);
                if matches!(tree.kind(reference.node), NodeKind::MethodRef { .. }) {
                    occurrence.kind = OccurrenceKind::MethodReference;
                }
                out.push(occurrence);
            }
            if entity.kind.is_local_like() {
                if scope.comments_and_strings {
                    out.extend(comment_matches(tree, file, root, &word));
                }
                continue;
            }
            for node in tree.descendants(root) {
                if let Some(doc) = tree.kind(node).doc() {
                    for caps in doc_link.captures_iter(doc) {
                        let (Some(link), Some(qualifier)) = (caps.get(0), caps.get(1)) else {
                            continue;
                        };
                        if !doc_link_targets(tree, node, qualifier.as_str(), entity) {
                            continue;
                        }
                        out.push(Occurrence {
                            file,
                            node: Some(node),
                            text_range: Some(text_range(link.start(), link.end())),
                            kind: OccurrenceKind::Doc,
                            ambiguous: false,
                        });
                    }
                }
                if let NodeKind::Literal {
                    kind: LiteralKind::String,
                    text,
                } = tree.kind(node)
                {
                    let reflective = is_reflective_literal(tree, node, entity);
                    if reflective || (scope.comments_and_strings && word.is_match(text)) {
                        out.push(Occurrence {
                            file,
                            node: Some(node),
                            text_range: word
                                .find(text)
                                .map(|m| text_range(m.start(), m.end())),
                            kind: OccurrenceKind::StringLiteral,
                            ambiguous: false,
                        });
                    }
                }
            }
            if scope.comments_and_strings {
                out.extend(comment_matches(tree, file, root, &word));
            }
        }

        if scope.text_files && !entity.kind.is_local_like() {
            for file in tree.files() {
                cancel.check()?;
                let FileContent::Text { text } = file.content() else {
                    continue;
                };
                out.extend(word.find_iter(text).map(|m| Occurrence {
                    file: file.id(),
                    node: None,
                    text_range: Some(text_range(m.start(), m.end())),
                    kind: OccurrenceKind::TextFile,
                    ambiguous: false,
                }));
            }
        }

        tracing::debug!(
            target: "quill.refactor",
            name = %entity.name,
            count = out.len(),
            "found occurrences"
        );
        Ok(out)
    }
}

fn word_pattern(name: &str) -> Regex {
    Regex::new(&format!(r"\b{}\b", regex::escape(name))).expect("valid regex")
}

fn text_range(start: usize, end: usize) -> TextRange {
    TextRange::new(TextSize::from(start as u32), TextSize::from(end as u32))
}

fn comment_matches(tree: &Tree, file: FileId, root: NodeId, word: &Regex) -> Vec<Occurrence> {
    tree.descendants(root)
        .into_iter()
        .filter_map(|node| match tree.kind(node) {
            NodeKind::Comment { text } => word.find(text).map(|m| Occurrence {
                file,
                node: Some(node),
                text_range: Some(text_range(m.start(), m.end())),
                kind: OccurrenceKind::Comment,
                ambiguous: false,
            }),
            _ => None,
        })
        .collect()
}
