use pretty_assertions::assert_eq;
use quill_refactor::{
    ConflictKind, EntityKind, InlineError, InlineRequest, InlineSession, PreconditionFailure,
};
use quill_syntax::print_file;
use quill_test_utils::Fixture;

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

#[test]
fn delegating_constructor_is_inlined_into_creations() {
    let (session, request) = session_at_caret(
        r#"class Point {
    final int x;
    final int y;

    Point(int x, int y) {
        this.x = x;
        this.y = y;
    }

    /*caret*/Point(int x) {
        this(x, 0);
    }

    static Point origin() {
        return new Point(5);
    }

    static Point diagonal(int d) {
        return new Point(d + 1);
    }
}
"#,
    );

    let outcome = session.inline(&request).unwrap();
    assert_eq!(outcome.kind, EntityKind::Constructor);
    assert_eq!(outcome.inlined, 2);
    assert!(outcome.declaration_removed);
    assert_eq!(
        text(&session),
        r#"class Point {
    final int x;
    final int y;

    Point(int x, int y) {
        this.x = x;
        this.y = y;
    }

    static Point origin() {
        return new Point(5, 0);
    }

    static Point diagonal(int d) {
        return new Point(d + 1, 0);
    }
}
"#
    );
}

#[test]
fn constructor_chain_is_redirected() {
    let (session, request) = session_at_caret(
        r#"class Range {
    final int from;
    final int to;

    Range(int from, int to) {
        this.from = from;
        this.to = to;
    }

    /*caret*/Range(int to) {
        this(0, to);
    }

    Range() {
        this(10);
    }
}
"#,
    );

    session.inline(&request).unwrap();
    assert_eq!(
        text(&session),
        r#"class Range {
    final int from;
    final int to;

    Range(int from, int to) {
        this.from = from;
        this.to = to;
    }

    Range() {
        this(0, 10);
    }
}
"#
    );
}

#[test]
fn constructor_with_a_body_is_rejected() {
    let (session, request) = session_at_caret(
        r#"class Point {
    int x;

    /*caret*/Point(int x) {
        this.x = x;
    }

    static Point origin() {
        return new Point(0);
    }
}
"#,
    );

    let err = session.inline(&request).unwrap_err();
    assert!(
        matches!(
            err,
            InlineError::Precondition(PreconditionFailure::NotChainingConstructor { ref name })
                if name == "Point"
        ),
        "{err:?}"
    );
}

#[test]
fn side_effecting_argument_used_twice_is_rejected() {
    let (session, request) = session_at_caret(
        r#"class Pair {
    final int a;
    final int b;

    Pair(int a, int b) {
        this.a = a;
        this.b = b;
    }

    /*caret*/Pair(int both) {
        this(both, both);
    }

    static int next() {
        return 1;
    }

    static Pair make() {
        return new Pair(next());
    }
}
"#,
    );

    let err = session.inline(&request).unwrap_err();
    assert!(err.conflicts().unwrap().has_kind(ConflictKind::SideEffect));
}
