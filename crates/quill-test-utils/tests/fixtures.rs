use quill_syntax::{NodeKind, TextSize};
use quill_test_utils::{extract_caret, EnvVarGuard, Fixture};

#[test]
fn caret_is_removed_and_located() {
    let (text, offset) = extract_caret("int /*caret*/x = 1;");
    assert_eq!(text, "int x = 1;");
    assert_eq!(offset, TextSize::from(4));
}

#[test]
fn multi_file_fixture_tracks_markers_per_file() {
    let fixture = Fixture::parse(
        r#"//- /A.java
class A {
    int f() {
        return $0g();
    }
}
//- /lib/B.java read-only
class B {
    int $1h;
}
//- /app.properties
name=g
"#,
    );
    let a = fixture.file("/A.java");
    let b = fixture.file("/lib/B.java");
    assert_eq!(fixture.marker(0).0, a);
    assert_eq!(fixture.marker(1).0, b);
    assert!(fixture.tree.file(b).expect("file").is_read_only());
    assert!(matches!(
        fixture.tree.kind(fixture.node_at(0)),
        NodeKind::MethodCall { name, .. } if name == "g"
    ));
    assert!(matches!(fixture.tree.kind(fixture.node_at(1)), NodeKind::Field(_)));
    assert_eq!(fixture.text("/app.properties"), "name=g\n");
}

#[test]
fn headerless_fixture_is_main_java() {
    let fixture = Fixture::parse("class Main {\n    void /*caret*/run() {\n    }\n}\n");
    assert!(matches!(
        fixture.tree.kind(fixture.node_at(0)),
        NodeKind::Method(data) if data.name == "run"
    ));
    assert_eq!(fixture.text("/Main.java"), "class Main {\n    void run() {\n    }\n}\n");
}

#[test]
fn env_guard_restores_previous_value() {
    let _lock = quill_test_utils::env_lock();
    std::env::set_var("QUILL_TEST_UTILS_VAR", "before");
    {
        let _guard = EnvVarGuard::set("QUILL_TEST_UTILS_VAR", "during");
        assert_eq!(std::env::var("QUILL_TEST_UTILS_VAR").as_deref(), Ok("during"));
    }
    assert_eq!(std::env::var("QUILL_TEST_UTILS_VAR").as_deref(), Ok("before"));
    std::env::remove_var("QUILL_TEST_UTILS_VAR");
}
