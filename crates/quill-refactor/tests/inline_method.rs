use pretty_assertions::assert_eq;
use quill_refactor::{
    ConflictKind, EntityKind, InlineError, InlineRequest, InlineSession, PreconditionFailure,
    Strategy,
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
fn inline_expression_bodied_method() {
    let (session, request) = session_at_caret(
        r#"class A {
    private int addOne(int x) {
        return x + 1;
    }

    int test() {
        return /*caret*/addOne(41) * 2;
    }
}
"#,
    );

    let outcome = session.inline(&request).unwrap();
    assert_eq!(outcome.kind, EntityKind::Method);
    assert_eq!(outcome.strategies, vec![Strategy::Expression]);
    assert!(outcome.temporaries.is_empty());
    assert_eq!(
        text(&session, "/Main.java"),
        r#"class A {
    int test() {
        return (41 + 1) * 2;
    }
}
"#
    );
}

#[test]
fn multiple_returns_are_lowered_into_a_result_variable() {
    let (session, request) = session_at_caret(
        r#"class Calc {
    int counter;

    int next() {
        counter++;
        return counter;
    }

    int pick(int v) {
        if (v > 0) {
            return v;
        } else {
            return -v;
        }
    }

    int use() {
        int total = 1 + /*caret*/pick(next());
        return total;
    }
}
"#,
    );

    let outcome = session.inline(&request).unwrap();
    assert_eq!(outcome.strategies, vec![Strategy::ResultVariable]);
    assert_eq!(outcome.temporaries, vec!["v".to_string(), "result".to_string()]);
    assert_eq!(
        text(&session, "/Main.java"),
        r#"class Calc {
    int counter;

    int next() {
        counter++;
        return counter;
    }

    int use() {
        int v = next();
        int result;
        if (v > 0) {
            result = v;
        } else {
            result = -v;
        }
        int total = 1 + result;
        return total;
    }
}
"#
    );
}

#[test]
fn local_initializer_is_reused_as_the_result() {
    let (session, request) = session_at_caret(
        r#"class Calc {
    int sign(int v) {
        if (v < 0) {
            return -1;
        }
        return 1;
    }

    int use(int n) {
        int s = /*caret*/sign(n);
        return s;
    }
}
"#,
    );

    let outcome = session.inline(&request).unwrap();
    assert_eq!(outcome.strategies, vec![Strategy::ResultVariable]);
    assert_eq!(
        text(&session, "/Main.java"),
        r#"class Calc {
    int use(int n) {
        int s;
        if (n < 0) {
            s = -1;
        } else {
            s = 1;
        }
        return s;
    }
}
"#
    );
}

#[test]
fn void_method_called_as_a_statement() {
    let (session, request) = session_at_caret(
        r#"class Log {
    void log(String message) {
        System.out.println("> " + message);
    }

    void run() {
        /*caret*/log("start");
        log("stop");
    }
}
"#,
    );

    let outcome = session.inline(&request).unwrap();
    assert_eq!(outcome.inlined, 2);
    assert_eq!(
        outcome.strategies,
        vec![Strategy::TrailingReturn, Strategy::TrailingReturn]
    );
    assert_eq!(
        text(&session, "/Main.java"),
        r#"class Log {
    void run() {
        System.out.println("> " + "start");
        System.out.println("> " + "stop");
    }
}
"#
    );
}

#[test]
fn recursive_method_is_rejected() {
    let src = r#"class Math2 {
    int fact(int n) {
        if (n <= 1) {
            return 1;
        }
        return n * fact(n - 1);
    }

    int use() {
        return /*caret*/fact(5);
    }
}
"#;
    let (session, request) = session_at_caret(src);
    let before = text(&session, "/Main.java");

    let err = session.inline(&request).unwrap_err();
    let report = match &err {
        InlineError::Conflicts(report) => report,
        other => panic!("expected conflicts, got {other:?}"),
    };
    assert!(report.has_kind(ConflictKind::Recursive), "{report:?}");
    assert_eq!(text(&session, "/Main.java"), before);
}

#[test]
fn method_reference_becomes_a_lambda() {
    let (session, request) = session_at_caret(
        r#"import java.util.function.IntUnaryOperator;

class Ops {
    static int /*caret*/twice(int x) {
        return x * 2;
    }

    IntUnaryOperator op() {
        return Ops::twice;
    }
}
"#,
    );

    session.inline(&request).unwrap();
    assert_eq!(
        text(&session, "/Main.java"),
        r#"import java.util.function.IntUnaryOperator;

class Ops {
    IntUnaryOperator op() {
        return x -> x * 2;
    }
}
"#
    );
}

#[test]
fn call_in_loop_condition_is_rejected() {
    let (session, request) = session_at_caret(
        r#"class Loop {
    int limit;

    boolean more(int i) {
        if (i > limit) {
            return false;
        }
        return true;
    }

    void run() {
        int i = 0;
        while (/*caret*/more(i)) {
            i++;
        }
    }
}
"#,
    );

    let err = session.inline(&request).unwrap_err();
    let report = err.conflicts().unwrap();
    assert!(report.has_kind(ConflictKind::UnsupportedPosition), "{report:?}");
}

#[test]
fn abstract_method_has_no_body() {
    let (session, request) = session_at_caret(
        r#"abstract class Shape {
    abstract double /*caret*/area();

    double twice() {
        return area() * 2;
    }
}
"#,
    );

    let err = session.inline(&request).unwrap_err();
    assert!(
        matches!(err, InlineError::Precondition(PreconditionFailure::NoBody { .. })),
        "{err:?}"
    );
}

#[test]
fn overridden_method_is_rejected() {
    let (session, request) = session_at_caret(
        r#"class Base {
    int /*caret*/size() {
        return 0;
    }

    int twice() {
        return size() * 2;
    }
}

class Derived extends Base {
    int size() {
        return 1;
    }
}
"#,
    );

    let err = session.inline(&request).unwrap_err();
    assert!(err.conflicts().unwrap().has_kind(ConflictKind::Overriding));
}

#[test]
fn early_return_in_loop_needs_a_label() {
    let (session, request) = session_at_caret(
        r#"class Search {
    int find(int[] values, int wanted) {
        for (int i = 0; i < values.length; i++) {
            if (values[i] == wanted) {
                return i;
            }
        }
        return -1;
    }

    void run(int[] data) {
        int at = /*caret*/find(data, 3);
        System.out.println(at);
    }
}
"#,
    );

    let err = session.inline(&request).unwrap_err();
    let report = err.conflicts().unwrap();
    assert!(!report.has_blocking(), "{report:?}");
    assert!(report.has_kind(ConflictKind::FallbackStrategy));
    assert!(matches!(err, InlineError::Unconfirmed(_)));
}

#[test]
fn synchronized_method_locks_its_receiver() {
    let (session, request) = session_at_caret(
        r#"class Main {
    int v;

    synchronized void /*caret*/bump() {
        v++;
    }

    static void run(Main m) {
        m.bump();
    }
}
"#,
    );

    let outcome = session.inline(&request).unwrap();
    assert_eq!(outcome.strategies, vec![Strategy::ResultVariable]);
    assert_eq!(
        text(&session, "/Main.java"),
        r#"class Main {
    int v;

    static void run(Main m) {
        synchronized (m) {
            m.v++;
        }
    }
}
"#
    );
}

#[test]
fn static_synchronized_method_locks_the_class() {
    let (session, request) = session_at_caret(
        r#"class Main {
    static int count;

    static synchronized void /*caret*/tick() {
        count++;
    }

    void run() {
        tick();
    }
}
"#,
    );

    session.inline(&request).unwrap();
    assert_eq!(
        text(&session, "/Main.java"),
        r#"class Main {
    static int count;

    void run() {
        synchronized (Main.class) {
            count++;
        }
    }
}
"#
    );
}

#[test]
fn varargs_are_packed_into_an_array() {
    let (session, request) = session_at_caret(
        r#"class Main {
    static int /*caret*/count(int... values) {
        return values.length;
    }

    int run() {
        return count(1, 2, 3);
    }
}
"#,
    );

    let outcome = session.inline(&request).unwrap();
    assert!(outcome.temporaries.is_empty(), "{:?}", outcome.temporaries);
    assert_eq!(
        text(&session, "/Main.java"),
        r#"class Main {
    int run() {
        return new int[]{1, 2, 3}.length;
    }
}
"#
    );
}

#[test]
fn braces_stay_when_removing_them_would_move_an_else() {
    let (session, request) = session_at_caret(
        r#"class Main {
    void /*caret*/report(int v) {
        if (v > 0) {
            System.out.println(v);
        }
    }

    void run(int n, boolean quiet) {
        if (!quiet) report(n);
        else {
            System.out.println("quiet");
        }
    }
}
"#,
    );

    let outcome = session.inline(&request).unwrap();
    assert_eq!(outcome.strategies, vec![Strategy::TrailingReturn]);
    assert!(outcome.temporaries.is_empty(), "{:?}", outcome.temporaries);
    assert_eq!(
        text(&session, "/Main.java"),
        r#"class Main {
    void run(int n, boolean quiet) {
        if (!quiet) {
            if (n > 0) {
                System.out.println(n);
            }
        } else {
            System.out.println("quiet");
        }
    }
}
"#
    );
}
