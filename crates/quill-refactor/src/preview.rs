use serde::Serialize;
use similar::TextDiff;

use quill_syntax::{print_file, FileContent, Tree};

use crate::conflicts::ConflictReport;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FilePreview {
    pub path: String,
    pub original: String,
    pub modified: String,
    pub unified_diff: String,
}

/// What an inline request would change, computed on a copy of the tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InlinePreview {
    pub conflicts: ConflictReport,
    /// Changed Java files in file order. Empty when a conflict blocks the
    /// request.
    pub files: Vec<FilePreview>,
}

impl InlinePreview {
    pub fn is_blocked(&self) -> bool {
        self.conflicts.has_blocking()
    }
}

/// Unified diffs of every Java file whose printed text differs.
pub fn diff_trees(before: &Tree, after: &Tree) -> Vec<FilePreview> {
    let mut out = Vec::new();
    for file in before.files() {
        if !matches!(file.content(), FileContent::Java { .. }) {
            continue;
        }
        let (Some(original), Some(modified)) =
            (print_file(before, file.id()), print_file(after, file.id()))
        else {
            continue;
        };
        if original == modified {
            continue;
        }
        let path = file.path().trim_start_matches('/');
        let unified_diff = TextDiff::from_lines(&original, &modified)
            .unified_diff()
            .context_radius(3)
            .header(&format!("a/{path}"), &format!("b/{path}"))
            .to_string();
        out.push(FilePreview {
            path: file.path().to_string(),
            original,
            modified,
            unified_diff,
        });
    }
    out
}
