//! The inline pipeline over a shared tree.
//!
//! Analysis runs under an upgradable read lock; the same guard is upgraded
//! for the rewrite, so no other writer can slip in between the conflict check
//! and the mutation.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use quill_config::InlineOptions;
use quill_resolve::members::top_level_class;
use quill_syntax::{FileId, NodeId, TextSize, Tree};
use serde::Serialize;

use crate::cancel::CancellationToken;
use crate::conflicts::{collect_conflicts, ConflictContext, ConflictReport};
use crate::entity::{target_at, Entity, EntityKind};
use crate::error::{AnalysisError, InlineError};
use crate::listener::{RefactoringEvent, RefactoringListener};
use crate::occurrence::{classify_all, OccurrenceKind, Usage};
use crate::oracle::{AccessibilityOracle, CounterNameSuggester, JavaAccessRules, NameSuggester};
use crate::preconditions::{check_declaration, check_usages};
use crate::preview::{diff_trees, InlinePreview};
use crate::search::{ReferenceSearch, SearchScope, TreeReferenceSearch};
use crate::transform::{self, Rewriter, Strategy};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineRequest {
    pub declaration: NodeId,
    /// The occurrence the user selected, if any.
    pub reference: Option<NodeId>,
    pub options: InlineOptions,
}

impl InlineRequest {
    pub fn new(declaration: NodeId) -> Self {
        Self {
            declaration,
            reference: None,
            options: InlineOptions::default(),
        }
    }

    /// Inline only `reference` and keep the declaration.
    pub fn this_only(declaration: NodeId, reference: NodeId) -> Self {
        Self {
            declaration,
            reference: Some(reference),
            options: InlineOptions::this_only(),
        }
    }

    /// The request for whatever sits under the caret.
    pub fn at(tree: &Tree, file: FileId, offset: TextSize) -> Option<Self> {
        let target = target_at(tree, file, offset)?;
        Some(Self {
            declaration: target.declaration,
            reference: target.reference,
            options: InlineOptions::default(),
        })
    }

    #[must_use]
    pub fn with_options(mut self, options: InlineOptions) -> Self {
        self.options = options;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InlineOutcome {
    pub kind: EntityKind,
    pub name: String,
    pub inlined: usize,
    pub skipped: usize,
    pub strategies: Vec<Strategy>,
    pub temporaries: Vec<String>,
    pub declaration_removed: bool,
    pub accepted_warnings: Vec<String>,
    pub affected: Vec<String>,
}

/// Result of the read-only phase.
#[derive(Clone, Debug)]
pub struct InlineAnalysis {
    pub entity: Entity,
    pub usages: Vec<Usage>,
    pub conflicts: ConflictReport,
}

type Confirm = Box<dyn Fn(&ConflictReport) -> bool + Send + Sync>;

pub struct InlineSession {
    tree: Arc<RwLock<Tree>>,
    search: Box<dyn ReferenceSearch>,
    oracle: Box<dyn AccessibilityOracle>,
    suggester: Box<dyn NameSuggester>,
    listeners: Vec<Arc<dyn RefactoringListener>>,
    confirm: Option<Confirm>,
    cancel: CancellationToken,
    next_id: AtomicU64,
}

impl InlineSession {
    pub fn new(tree: Arc<RwLock<Tree>>) -> Self {
        Self {
            tree,
            search: Box::new(TreeReferenceSearch),
            oracle: Box::new(JavaAccessRules),
            suggester: Box::new(CounterNameSuggester),
            listeners: Vec::new(),
            confirm: None,
            cancel: CancellationToken::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn from_tree(tree: Tree) -> Self {
        Self::new(Arc::new(RwLock::new(tree)))
    }

    #[must_use]
    pub fn with_search(mut self, search: impl ReferenceSearch + 'static) -> Self {
        self.search = Box::new(search);
        self
    }

    #[must_use]
    pub fn with_oracle(mut self, oracle: impl AccessibilityOracle + 'static) -> Self {
        self.oracle = Box::new(oracle);
        self
    }

    #[must_use]
    pub fn with_suggester(mut self, suggester: impl NameSuggester + 'static) -> Self {
        self.suggester = Box::new(suggester);
        self
    }

    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn RefactoringListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Called with the warnings of a request; returning `false` aborts it.
    /// Without a callback any warning aborts.
    #[must_use]
    pub fn with_confirmation(
        mut self,
        confirm: impl Fn(&ConflictReport) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.confirm = Some(Box::new(confirm));
        self
    }

    pub fn tree(&self) -> Arc<RwLock<Tree>> {
        Arc::clone(&self.tree)
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs preconditions, search, classification and conflict collection.
    pub fn analyze(&self, request: &InlineRequest) -> Result<InlineAnalysis, InlineError> {
        let tree = self.tree.read();
        self.analyze_in(&tree, request)
    }

    fn analyze_in(
        &self,
        tree: &Tree,
        request: &InlineRequest,
    ) -> Result<InlineAnalysis, InlineError> {
        let options = &request.options;
        let entity = Entity::from_decl(tree, request.declaration)?;
        check_declaration(tree, &entity)?;

        let scope = SearchScope {
            comments_and_strings: options.search_in_comments,
            text_files: options.search_text_occurrences,
        };
        self.cancel.check()?;
        let occurrences = self
            .search
            .find_occurrences(tree, &entity, scope, &self.cancel)?;

        let mut misplaced = BTreeSet::new();
        for occurrence in &occurrences {
            let Some(node) = occurrence.node else {
                continue;
            };
            tree.ensure_alive(node).map_err(AnalysisError::from)?;
            let is_code = matches!(
                occurrence.kind,
                OccurrenceKind::Code | OccurrenceKind::MethodReference
            );
            if is_code && tree.file_of(node) != Some(occurrence.file) {
                misplaced.insert(occurrence.file);
            }
        }
        if !misplaced.is_empty() {
            return Err(AnalysisError::InconsistentIndex {
                name: entity.name.clone(),
                files: misplaced.len(),
            }
            .into());
        }

        let usages = classify_all(tree, &entity, occurrences);
        check_usages(&entity, &usages, options, request.reference)?;
        let usages: Vec<Usage> = if options.inline_this_only {
            usages
                .into_iter()
                .filter(|u| u.node().is_some() && u.node() == request.reference)
                .collect()
        } else {
            usages
        };

        let cx = ConflictContext {
            tree,
            options,
            oracle: &*self.oracle,
            reference: request.reference,
        };
        let conflicts = collect_conflicts(&cx, &entity, &usages);
        tracing::debug!(
            target: "quill.refactor",
            name = %entity.name,
            kind = ?entity.kind,
            usages = usages.len(),
            conflicts = conflicts.len(),
            "analyzed inline request"
        );
        Ok(InlineAnalysis {
            entity,
            usages,
            conflicts,
        })
    }

    /// Analyzes and, when nothing blocks and warnings are confirmed,
    /// rewrites the shared tree.
    pub fn inline(&self, request: &InlineRequest) -> Result<InlineOutcome, InlineError> {
        let guard = self.tree.upgradable_read();
        let analysis = self.analyze_in(&guard, request)?;
        let InlineAnalysis {
            entity,
            usages,
            conflicts,
        } = analysis;

        if conflicts.has_blocking() {
            tracing::info!(
                target: "quill.refactor",
                name = %entity.name,
                blocking = conflicts.blocking_conflicts().count(),
                "inline blocked by conflicts"
            );
            return Err(InlineError::Conflicts(conflicts));
        }
        if !conflicts.is_empty() {
            let confirmed = self
                .confirm
                .as_ref()
                .is_some_and(|confirm| confirm(&conflicts));
            if !confirmed {
                return Err(InlineError::Unconfirmed(conflicts));
            }
        }
        self.cancel.check()?;

        let event = RefactoringEvent {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            refactoring: entity.kind.refactoring_id(),
            affected: affected_declarations(&guard, &entity, &usages),
        };
        for listener in &self.listeners {
            listener.started(&event);
        }

        let mut tree = RwLockUpgradableReadGuard::upgrade(guard);
        let snapshot = tree.clone();
        let rw = Rewriter {
            suggester: &*self.suggester,
            options: &request.options,
        };
        let result = match transform::apply(&mut tree, &entity, &usages, &rw) {
            Ok(result) => result,
            Err(err) => {
                *tree = snapshot;
                tracing::warn!(
                    target: "quill.refactor",
                    name = %entity.name,
                    %err,
                    "inline failed; tree restored"
                );
                return Err(err);
            }
        };
        drop(tree);

        for listener in &self.listeners {
            listener.done(&event);
        }
        tracing::info!(
            target: "quill.refactor",
            refactoring = event.refactoring,
            name = %entity.name,
            inlined = result.inlined,
            removed = result.declaration_removed,
            "inlined"
        );
        Ok(InlineOutcome {
            kind: entity.kind,
            name: entity.name,
            inlined: result.inlined,
            skipped: result.skipped,
            strategies: result.strategies,
            temporaries: result.temporaries,
            declaration_removed: result.declaration_removed,
            accepted_warnings: conflicts.messages(),
            affected: event.affected,
        })
    }

    /// What `inline` would do, computed on a copy of the tree. Warnings are
    /// reported but need no confirmation.
    pub fn preview(&self, request: &InlineRequest) -> Result<InlinePreview, InlineError> {
        let tree = self.tree.read();
        let analysis = self.analyze_in(&tree, request)?;
        if analysis.conflicts.has_blocking() {
            return Ok(InlinePreview {
                conflicts: analysis.conflicts,
                files: Vec::new(),
            });
        }
        let mut scratch = tree.clone();
        let rw = Rewriter {
            suggester: &*self.suggester,
            options: &request.options,
        };
        transform::apply(&mut scratch, &analysis.entity, &analysis.usages, &rw)?;
        Ok(InlinePreview {
            files: diff_trees(&tree, &scratch),
            conflicts: analysis.conflicts,
        })
    }
}

/// Names of the top-level classes holding the declaration or a code usage.
fn affected_declarations(tree: &Tree, entity: &Entity, usages: &[Usage]) -> Vec<String> {
    std::iter::once(entity.decl)
        .chain(usages.iter().filter(|u| u.class.is_code()).filter_map(Usage::node))
        .filter_map(|node| top_level_class(tree, node))
        .filter_map(|class| tree.kind(class).class_data().map(|d| d.name.clone()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
