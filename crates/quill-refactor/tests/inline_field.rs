use pretty_assertions::assert_eq;
use quill_refactor::{
    ConflictKind, EntityKind, InlineError, InlineRequest, InlineSession, PreconditionFailure,
};
use quill_syntax::print_file;
use quill_test_utils::Fixture;

fn session_at(src: &str, marker: u32) -> (InlineSession, InlineRequest) {
    let fixture = Fixture::parse(src);
    let (file, offset) = fixture.marker(marker);
    let request = InlineRequest::at(&fixture.tree, file, offset).unwrap();
    (InlineSession::from_tree(fixture.tree), request)
}

fn text(session: &InlineSession, path: &str) -> String {
    let tree = session.tree();
    let tree = tree.read();
    let file = tree.file_by_path(path).unwrap();
    print_file(&tree, file).unwrap()
}

#[test]
fn non_final_field_is_rejected() {
    let src = r#"class Counter {
    int $0limit = 10;

    void reset() {
        limit = 20;
    }

    int read() {
        return limit;
    }
}
"#;
    let (session, request) = session_at(src, 0);
    let before = text(&session, "/Main.java");

    let err = session.inline(&request).unwrap_err();
    assert!(
        matches!(
            err,
            InlineError::Precondition(PreconditionFailure::NotFinalField { ref name })
                if name == "limit"
        ),
        "{err:?}"
    );
    assert!(err.to_string().contains("final fields"));
    assert_eq!(text(&session, "/Main.java"), before);
}

#[test]
fn interface_constant_is_implicitly_final() {
    let (session, request) = session_at(
        r#"interface Config {
    int $0RETRIES = 3;
}

class Client {
    int attempts() {
        return Config.RETRIES + 1;
    }
}
"#,
        0,
    );

    let outcome = session.inline(&request).unwrap();
    assert_eq!(outcome.kind, EntityKind::Field);
    assert_eq!(
        text(&session, "/Main.java"),
        r#"interface Config {
}

class Client {
    int attempts() {
        return 3 + 1;
    }
}
"#
    );
}

const LIMITS: &str = r#"//- /p/Limits.java
package p;

class Limits {
    static final int $0MAX = 10;

    /** Clamps to {@link #MAX}. */
    static int clamp(int v) {
        return Math.min(v, MAX);
    }
}
//- /p/User.java
package p;

import static p.Limits.MAX;

class User {
    int twice() {
        return Limits.MAX * 2;
    }
}
"#;

#[test]
fn doc_reference_needs_confirmation() {
    let (session, request) = session_at(LIMITS, 0);
    let before = text(&session, "/p/Limits.java");

    let err = session.inline(&request).unwrap_err();
    let report = match &err {
        InlineError::Unconfirmed(report) => report,
        other => panic!("expected unconfirmed warnings, got {other:?}"),
    };
    assert!(report.has_kind(ConflictKind::DocReference), "{report:?}");
    assert!(!report.has_blocking());
    assert_eq!(text(&session, "/p/Limits.java"), before);
}

#[test]
fn confirmed_field_inline_cleans_up_docs_and_imports() {
    let (session, request) = session_at(LIMITS, 0);
    let session = session.with_confirmation(|report| !report.has_blocking());

    let outcome = session.inline(&request).unwrap();
    assert_eq!(outcome.inlined, 2);
    assert!(outcome.declaration_removed);
    assert_eq!(outcome.affected, vec!["Limits".to_string(), "User".to_string()]);
    assert_eq!(outcome.accepted_warnings.len(), 1);
    assert_eq!(
        text(&session, "/p/Limits.java"),
        r#"package p;

class Limits {
    /** Clamps to {@code MAX}. */
    static int clamp(int v) {
        return Math.min(v, 10);
    }
}
"#
    );
    assert_eq!(
        text(&session, "/p/User.java"),
        r#"package p;

class User {
    int twice() {
        return 10 * 2;
    }
}
"#
    );
}

#[test]
fn read_only_occurrence_blocks_the_field() {
    let (session, request) = session_at(
        r#"//- /Config.java
class Config {
    static final int $0PORT = 8080;
}
//- /lib/Server.java read-only
class Server {
    int port() {
        return Config.PORT;
    }
}
"#,
        0,
    );

    let err = session.inline(&request).unwrap_err();
    let report = err.conflicts().unwrap();
    assert!(report.has_kind(ConflictKind::ReadOnly), "{report:?}");
}

#[test]
fn reflective_lookup_is_reported() {
    let (session, request) = session_at(
        r#"class Holder {
    static final String $0NAME = "holder";

    String name() {
        return NAME;
    }

    Object lookup() throws Exception {
        return Holder.class.getDeclaredField("NAME");
    }
}
"#,
        0,
    );

    let analysis = session.analyze(&request).unwrap();
    assert_eq!(analysis.entity.name, "NAME");
    assert!(analysis.conflicts.has_kind(ConflictKind::Reflective));
    assert!(!analysis.conflicts.has_blocking());
}

#[test]
fn same_named_member_of_another_class_is_not_a_usage() {
    let (session, request) = session_at(
        r#"class Main {
    static final int $0K = 1;

    int a() {
        return K + 1;
    }
}

class Other {
    static final int K = 2;

    /** Uses {@link Other#K}. */
    int b() {
        return K;
    }

    Object lookup() throws Exception {
        return Other.class.getDeclaredField("K");
    }
}
"#,
        0,
    );

    let analysis = session.analyze(&request).unwrap();
    assert!(!analysis.conflicts.has_kind(ConflictKind::DocReference));
    assert!(!analysis.conflicts.has_kind(ConflictKind::Reflective));

    let outcome = session.inline(&request).unwrap();
    assert!(outcome.accepted_warnings.is_empty());
    assert_eq!(
        text(&session, "/Main.java"),
        r#"class Main {
    int a() {
        return 1 + 1;
    }
}

class Other {
    static final int K = 2;

    /** Uses {@link Other#K}. */
    int b() {
        return K;
    }

    Object lookup() throws Exception {
        return Other.class.getDeclaredField("K");
    }
}
"#
    );
}
