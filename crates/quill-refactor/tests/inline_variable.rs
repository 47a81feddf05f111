use pretty_assertions::assert_eq;
use quill_refactor::{
    ConflictKind, EntityKind, InlineError, InlineOptions, InlineRequest, InlineSession,
    PreconditionFailure,
};
use quill_syntax::print_file;
use quill_test_utils::Fixture;

fn session_at_caret(src: &str) -> (InlineSession, InlineRequest) {
    let fixture = Fixture::parse(src);
    let (file, offset) = fixture.caret();
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
fn inline_local_with_single_read() {
    let (session, request) = session_at_caret(
        r#"class Main {
    void run() {
        int /*caret*/x = 5;
        System.out.println(x);
    }
}
"#,
    );

    let outcome = session.inline(&request).unwrap();
    assert_eq!(outcome.kind, EntityKind::Local);
    assert_eq!(outcome.inlined, 1);
    assert!(outcome.declaration_removed);
    assert_eq!(
        text(&session, "/Main.java"),
        r#"class Main {
    void run() {
        System.out.println(5);
    }
}
"#
    );
}

#[test]
fn inline_local_from_a_reference() {
    let (session, request) = session_at_caret(
        r#"class Main {
    int run(int a) {
        int sum = a + 1;
        return /*caret*/sum * 2;
    }
}
"#,
    );

    assert!(request.reference.is_some());
    session.inline(&request).unwrap();
    assert_eq!(
        text(&session, "/Main.java"),
        r#"class Main {
    int run(int a) {
        return (a + 1) * 2;
    }
}
"#
    );
}

#[test]
fn written_local_is_rejected() {
    let src = r#"class Main {
    void run() {
        int /*caret*/x = 1;
        x = 2;
        System.out.println(x);
    }
}
"#;
    let (session, request) = session_at_caret(src);
    let before = text(&session, "/Main.java");

    let err = session.inline(&request).unwrap_err();
    assert!(
        matches!(
            err,
            InlineError::Precondition(PreconditionFailure::WrittenVariable { ref name })
                if name == "x"
        ),
        "{err:?}"
    );
    assert_eq!(text(&session, "/Main.java"), before);
}

#[test]
fn inline_this_occurrence_keeps_the_declaration() {
    let (session, request) = session_at_caret(
        r#"class Main {
    void run() {
        String greeting = "hi";
        System.out.println(/*caret*/greeting);
        System.out.println(greeting);
    }
}
"#,
    );
    let reference = request.reference.unwrap();
    let request = InlineRequest::this_only(request.declaration, reference);

    let outcome = session.inline(&request).unwrap();
    assert_eq!(outcome.inlined, 1);
    assert!(!outcome.declaration_removed);
    assert_eq!(
        text(&session, "/Main.java"),
        r#"class Main {
    void run() {
        String greeting = "hi";
        System.out.println("hi");
        System.out.println(greeting);
    }
}
"#
    );
}

#[test]
fn inline_this_occurrence_rejects_side_effecting_initializer() {
    let (session, request) = session_at_caret(
        r#"class Main {
    int next() {
        return 1;
    }

    void run() {
        int value = next();
        System.out.println(/*caret*/value);
        System.out.println(value);
    }
}
"#,
    );
    let request = InlineRequest::this_only(request.declaration, request.reference.unwrap());

    let err = session.inline(&request).unwrap_err();
    let report = err.conflicts().unwrap();
    assert!(report.has_kind(ConflictKind::SideEffect), "{report:?}");
}

#[test]
fn side_effecting_initializer_used_twice_is_rejected() {
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

    let err = session.inline(&request).unwrap_err();
    assert!(matches!(err, InlineError::Conflicts(_)), "{err:?}");
    assert!(err.conflicts().unwrap().has_kind(ConflictKind::SideEffect));
}

#[test]
fn capture_in_anonymous_class_marks_variable_final() {
    let (session, request) = session_at_caret(
        r#"class Main {
    void run() {
        int base = 1;
        int /*caret*/x = base + 1;
        Runnable r = new Runnable() {
            public void run() {
                System.out.println(x);
            }
        };
        r.run();
    }
}
"#,
    );

    session.inline(&request).unwrap();
    assert_eq!(
        text(&session, "/Main.java"),
        r#"class Main {
    void run() {
        final int base = 1;
        Runnable r = new Runnable() {
            public void run() {
                System.out.println(base + 1);
            }
        };
        r.run();
    }
}
"#
    );
}

#[test]
fn capture_of_reassigned_variable_is_rejected() {
    let src = r#"class Main {
    void run() {
        int base = 1;
        int /*caret*/x = base + 1;
        Runnable r = new Runnable() {
            public void run() {
                System.out.println(x);
            }
        };
        base = 2;
        r.run();
    }
}
"#;
    let (session, request) = session_at_caret(src);
    let before = text(&session, "/Main.java");

    let err = session.inline(&request).unwrap_err();
    let report = err.conflicts().unwrap();
    assert!(report.has_kind(ConflictKind::Capture), "{report:?}");
    assert_eq!(text(&session, "/Main.java"), before);
}

#[test]
fn pattern_binding_becomes_a_cast() {
    let (session, request) = session_at_caret(
        r#"class Main {
    int length(Object o) {
        if (o instanceof String /*caret*/s) {
            return s.length();
        }
        return 0;
    }
}
"#,
    );

    let outcome = session.inline(&request).unwrap();
    assert_eq!(outcome.kind, EntityKind::PatternBinding);
    assert_eq!(
        text(&session, "/Main.java"),
        r#"class Main {
    int length(Object o) {
        if (o instanceof String) {
            return ((String) o).length();
        }
        return 0;
    }
}
"#
    );
}

#[test]
fn parameter_with_the_same_constant_everywhere() {
    let (session, request) = session_at_caret(
        r#"class Main {
    /**
     * Scales a value.
     * @param value the value
     * @param factor the factor
     */
    int scale(int value, int /*caret*/factor) {
        return value * factor;
    }

    void run() {
        System.out.println(scale(1, 10));
        System.out.println(scale(2, 10));
    }
}
"#,
    );

    let outcome = session.inline(&request).unwrap();
    assert_eq!(outcome.kind, EntityKind::Parameter);
    assert!(outcome.declaration_removed);
    assert_eq!(
        text(&session, "/Main.java"),
        r#"class Main {
    /**
     * Scales a value.
     * @param value the value
     */
    int scale(int value) {
        return value * 10;
    }

    void run() {
        System.out.println(scale(1));
        System.out.println(scale(2));
    }
}
"#
    );
}

#[test]
fn parameter_with_different_arguments_is_rejected() {
    let (session, request) = session_at_caret(
        r#"class Main {
    int scale(int value, int /*caret*/factor) {
        return value * factor;
    }

    void run() {
        System.out.println(scale(1, 10));
        System.out.println(scale(2, 20));
    }
}
"#,
    );

    let err = session.inline(&request).unwrap_err();
    assert!(
        matches!(
            err,
            InlineError::Precondition(PreconditionFailure::ArgumentsDiffer { .. })
        ),
        "{err:?}"
    );
}

#[test]
fn local_without_reads_is_never_used() {
    let (session, request) = session_at_caret(
        r#"class Main {
    void run() {
        int /*caret*/unused = 3;
    }
}
"#,
    );

    let err = session.inline(&request).unwrap_err();
    assert!(
        matches!(
            err,
            InlineError::Precondition(PreconditionFailure::NeverUsed { .. })
        ),
        "{err:?}"
    );
}

#[test]
fn keep_declaration_when_deletion_is_disabled() {
    let (session, request) = session_at_caret(
        r#"class Main {
    void run() {
        int /*caret*/x = 5;
        System.out.println(x);
    }
}
"#,
    );
    let request = request.with_options(InlineOptions {
        delete_declaration: false,
        ..InlineOptions::default()
    });

    let outcome = session.inline(&request).unwrap();
    assert!(!outcome.declaration_removed);
    assert_eq!(
        text(&session, "/Main.java"),
        r#"class Main {
    void run() {
        int x = 5;
        System.out.println(5);
    }
}
"#
    );
}

#[test]
fn this_moved_into_an_anonymous_class_names_the_outer_instance() {
    let (session, request) = session_at_caret(
        r#"class Main {
    final int v = 1;

    void run() {
        int /*caret*/x = this.v;
        Runnable r = new Runnable() {
            public void run() {
                System.out.println(x);
            }
        };
        r.run();
    }
}
"#,
    );

    session.inline(&request).unwrap();
    assert_eq!(
        text(&session, "/Main.java"),
        r#"class Main {
    final int v = 1;

    void run() {
        Runnable r = new Runnable() {
            public void run() {
                System.out.println(Main.this.v);
            }
        };
        r.run();
    }
}
"#
    );
}
