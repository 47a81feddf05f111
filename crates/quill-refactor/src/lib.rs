//! Inline refactorings for Java syntax trees.
//!
//! Supported entities are local variables, final fields, parameters that
//! receive the same constant at every call, `instanceof` pattern bindings,
//! methods and constructors that only delegate to another constructor.
//!
//! A request goes through [`InlineSession`]:
//! - preconditions on the declaration (`preconditions`)
//! - occurrence search and classification (`search`, `occurrence`)
//! - conflict collection; nothing is mutated while a blocking conflict exists
//! - the rewrite itself (`transform`), in reverse document order
//!
//! [`InlineSession::preview`] runs the same pipeline on a copy of the tree and
//! returns unified diffs.

pub mod cancel;
pub mod conflicts;
pub mod entity;
pub mod error;
pub mod listener;
pub mod occurrence;
pub mod oracle;
pub mod preconditions;
pub mod preview;
pub mod safety;
pub mod scope;
pub mod search;
pub mod session;
pub mod transform;

pub use cancel::CancellationToken;
pub use conflicts::{
    collect_conflicts, Conflict, ConflictContext, ConflictKind, ConflictLocation, ConflictReport,
    Severity,
};
pub use entity::{target_at, Entity, EntityKind, InlineTarget};
pub use error::{AnalysisError, InlineError, PreconditionFailure};
pub use listener::{RefactoringEvent, RefactoringListener, TracingListener};
pub use occurrence::{classify, AccessMode, Occurrence, OccurrenceKind, Usage, UsageClass};
pub use oracle::{AccessibilityOracle, CounterNameSuggester, JavaAccessRules, NameSuggester};
pub use preview::{FilePreview, InlinePreview};
pub use safety::{can_substitute, Verdict};
pub use search::{ReferenceSearch, SearchScope, TreeReferenceSearch};
pub use session::{InlineAnalysis, InlineOutcome, InlineRequest, InlineSession};
pub use transform::{Strategy, TransformResult};

pub use quill_config::InlineOptions;
