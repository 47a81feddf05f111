use std::sync::Arc;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use quill_refactor::{
    AnalysisError, CancellationToken, ConflictKind, Entity, InlineError, InlineRequest,
    InlineSession, Occurrence, RefactoringEvent, RefactoringListener, ReferenceSearch,
    SearchScope, TreeReferenceSearch, UsageClass,
};
use quill_syntax::{print_file, Tree};
use quill_test_utils::Fixture;

const SIMPLE: &str = r#"class Main {
    void run() {
        int /*caret*/x = 5;
        System.out.println(x);
    }
}
"#;

fn session_at_caret(src: &str) -> (InlineSession, InlineRequest) {
    let fixture = Fixture::parse(src);
    let (file, offset) = fixture.caret();
    let request = InlineRequest::at(&fixture.tree, file, offset).unwrap();
    (InlineSession::from_tree(fixture.tree), request)
}

fn text(session: &InlineSession) -> String {
    let tree = session.tree();
    let tree = tree.read();
    let file = tree.file_by_path("/Main.java").unwrap();
    print_file(&tree, file).unwrap()
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<(String, RefactoringEvent)>>,
}

impl RefactoringListener for Recorder {
    fn started(&self, event: &RefactoringEvent) {
        self.events.lock().push(("started".to_string(), event.clone()));
    }

    fn done(&self, event: &RefactoringEvent) {
        self.events.lock().push(("done".to_string(), event.clone()));
    }
}

#[test]
fn preview_leaves_the_tree_alone() {
    let (session, request) = session_at_caret(SIMPLE);
    let before = text(&session);

    let preview = session.preview(&request).unwrap();
    assert!(!preview.is_blocked());
    assert_eq!(preview.files.len(), 1);
    let file = &preview.files[0];
    assert_eq!(file.path, "/Main.java");
    assert_eq!(file.original, before);
    assert_eq!(
        file.unified_diff,
        r#"--- a/Main.java
+++ b/Main.java
@@ -1,6 +1,5 @@
 class Main {
     void run() {
-        int x = 5;
-        System.out.println(x);
+        System.out.println(5);
     }
 }
"#
    );
    assert_eq!(text(&session), before);

    session.inline(&request).unwrap();
    assert_eq!(text(&session), file.modified);
}

#[test]
fn blocked_preview_has_no_files() {
    let (session, request) = session_at_caret(
        r#"class Main {
    int next() {
        return 1;
    }

    void run() {
        int /*caret*/value = next();
        System.out.println(value + value);
    }
}
"#,
    );

    let preview = session.preview(&request).unwrap();
    assert!(preview.is_blocked());
    assert!(preview.files.is_empty());
}

#[test]
fn listeners_see_start_and_finish() {
    let recorder = Arc::new(Recorder::default());
    let (session, request) = session_at_caret(SIMPLE);
    let session = session.with_listener(recorder.clone());

    session.inline(&request).unwrap();

    let events = recorder.events.lock();
    let phases: Vec<&str> = events.iter().map(|(phase, _)| phase.as_str()).collect();
    assert_eq!(phases, vec!["started", "done"]);
    let event = &events[0].1;
    assert_eq!(event.refactoring, "inline.local");
    assert_eq!(event.affected, vec!["Main".to_string()]);
    assert_eq!(events[0].1, events[1].1);
}

#[test]
fn rejected_request_notifies_nobody() {
    let recorder = Arc::new(Recorder::default());
    let (session, request) = session_at_caret(
        r#"class Main {
    void run() {
        int /*caret*/x = 1;
        x = 2;
        System.out.println(x);
    }
}
"#,
    );
    let session = session.with_listener(recorder.clone());

    assert!(session.inline(&request).is_err());
    assert!(recorder.events.lock().is_empty());
}

#[test]
fn cancelled_session_does_not_rewrite() {
    let (session, request) = session_at_caret(SIMPLE);
    let before = text(&session);
    let token = session.cancellation_token();
    token.cancel();

    let err = session.inline(&request).unwrap_err();
    assert!(matches!(err, InlineError::Cancelled), "{err:?}");
    assert_eq!(text(&session), before);

    token.reset();
    session.inline(&request).unwrap();
    assert_ne!(text(&session), before);
}

#[test]
fn analyze_reports_usages_without_mutation() {
    let (session, request) = session_at_caret(
        r#"class Main {
    void run() {
        int /*caret*/x = 5;
        // prints x
        System.out.println(x + x);
    }
}
"#,
    );
    let before = text(&session);
    let mut request = request;
    request.options.search_in_comments = true;

    let analysis = session.analyze(&request).unwrap();
    let reads = analysis
        .usages
        .iter()
        .filter(|u| u.class == UsageClass::Read)
        .count();
    assert_eq!(reads, 2);
    assert!(analysis.usages.iter().any(|u| u.class == UsageClass::NonCode));
    assert!(analysis.conflicts.has_kind(ConflictKind::NonCodeUsage));
    assert_eq!(text(&session), before);
}

#[test]
fn caret_outside_any_declaration_has_no_target() {
    let fixture = Fixture::parse(
        r#"class Main {
    void run() {
        /*caret*/return;
    }
}
"#,
    );
    let (file, offset) = fixture.caret();
    assert_eq!(InlineRequest::at(&fixture.tree, file, offset), None);
}

/// Reports every occurrence as if it lived in another file.
struct MisplacedSearch;

impl ReferenceSearch for MisplacedSearch {
    fn find_occurrences(
        &self,
        tree: &Tree,
        entity: &Entity,
        scope: SearchScope,
        cancel: &CancellationToken,
    ) -> Result<Vec<Occurrence>, InlineError> {
        let other = tree
            .files()
            .map(|f| f.id())
            .find(|&f| Some(f) != entity.file)
            .unwrap();
        let mut found = TreeReferenceSearch.find_occurrences(tree, entity, scope, cancel)?;
        for occurrence in &mut found {
            occurrence.file = other;
        }
        Ok(found)
    }
}

#[test]
fn inconsistent_search_results_are_an_error() {
    let fixture = Fixture::parse(
        r#"//- /Main.java
class Main {
    void run() {
        int /*caret*/x = 5;
        System.out.println(x);
    }
}
//- /Other.java
class Other {
}
"#,
    );
    let (file, offset) = fixture.caret();
    let request = InlineRequest::at(&fixture.tree, file, offset).unwrap();
    let session = InlineSession::from_tree(fixture.tree).with_search(MisplacedSearch);

    let err = session.inline(&request).unwrap_err();
    assert!(
        matches!(
            err,
            InlineError::Analysis(AnalysisError::InconsistentIndex { files: 1, .. })
        ),
        "{err:?}"
    );
}

#[test]
fn outcome_serializes_to_json() {
    let (session, request) = session_at_caret(SIMPLE);
    let outcome = session.inline(&request).unwrap();
    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["kind"], "Local");
    assert_eq!(json["name"], "x");
    assert_eq!(json["inlined"], 1);
    assert_eq!(json["declaration_removed"], true);
}
