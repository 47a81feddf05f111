use quill_syntax::TreeError;
use thiserror::Error;

use crate::conflicts::ConflictReport;

/// A condition that rules the request out before any search or analysis.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionFailure {
    #[error("cannot find a declaration to inline")]
    NoDeclaration,
    #[error("{what} cannot be inlined")]
    UnsupportedDeclaration { what: String },
    #[error("variable `{name}` has no initializer")]
    NoInitializer { name: String },
    #[error("variable `{name}` is initialized with an array initializer")]
    ArrayInitializer { name: String },
    #[error("variable `{name}` is declared in a `for` initializer")]
    ForInitDeclaration { name: String },
    #[error("`{name}` is never used")]
    NeverUsed { name: String },
    #[error("`{name}` is accessed for writing")]
    WrittenVariable { name: String },
    #[error("inline is supported only for final fields; `{name}` is not final")]
    NotFinalField { name: String },
    #[error("the selected occurrence of `{name}` is a write")]
    WriteOccurrence { name: String },
    #[error("the selected node is not an occurrence of `{name}`")]
    ReferenceNotFound { name: String },
    #[error("method `{name}` has no body")]
    NoBody { name: String },
    #[error("generic method `{name}` is not supported")]
    GenericMethod { name: String },
    #[error("constructor of `{name}` does not delegate with a single `this(..)` call")]
    NotChainingConstructor { name: String },
    #[error("varargs constructor of `{name}` is not supported")]
    VarargsConstructor { name: String },
    #[error("arguments passed for parameter `{name}` differ between call sites")]
    ArgumentsDiffer { name: String },
    #[error("argument passed for parameter `{name}` is not a constant")]
    ArgumentNotConstant { name: String },
}

/// Failures of the read-only analysis phase.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error("search results for `{name}` point into {files} file(s) that do not hold them")]
    InconsistentIndex { name: String, files: usize },
}

#[derive(Debug, Error)]
pub enum InlineError {
    #[error(transparent)]
    Precondition(#[from] PreconditionFailure),
    #[error("inlining is blocked by {} conflict(s)", .0.blocking_conflicts().count())]
    Conflicts(ConflictReport),
    #[error("{} warning(s) were not confirmed", .0.len())]
    Unconfirmed(ConflictReport),
    #[error("refactoring was cancelled")]
    Cancelled,
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error("failed to rewrite the tree: {0}")]
    Mutation(#[from] TreeError),
    #[error("internal invariant violated: {0}")]
    Invariant(String),
}

impl InlineError {
    /// Logs and wraps a broken internal assumption.
    pub(crate) fn invariant(message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::error!(target: "quill.refactor", %message, "invariant violation");
        InlineError::Invariant(message)
    }

    /// The conflict report carried by conflict-related errors.
    pub fn conflicts(&self) -> Option<&ConflictReport> {
        match self {
            InlineError::Conflicts(report) | InlineError::Unconfirmed(report) => Some(report),
            _ => None,
        }
    }
}
