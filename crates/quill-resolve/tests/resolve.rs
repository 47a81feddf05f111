use pretty_assertions::assert_eq;

use quill_resolve::{
    find_references, is_accessible, overriding_methods, resolve_call, resolve_name, static_type,
    CallResolution,
};
use quill_syntax::{NodeId, NodeKind, Tree};
use quill_test_utils::Fixture;

fn decl_named(tree: &Tree, name: &str, pred: impl Fn(&NodeKind) -> bool) -> NodeId {
    tree.java_files()
        .flat_map(|(_, root)| tree.descendants(root))
        .find(|&n| pred(tree.kind(n)) && tree.kind(n).declared_name() == Some(name))
        .unwrap_or_else(|| panic!("no declaration `{name}`"))
}

#[test]
fn locals_shadow_fields_only_after_declaration() {
    let fixture = Fixture::parse(
        r#"class A {
    int x;

    void m() {
        use($0x);
        int x = 1;
        use($1x);
    }
}
"#,
    );
    let tree = &fixture.tree;
    let field = decl_named(tree, "x", |k| matches!(k, NodeKind::Field(_)));
    let local = decl_named(tree, "x", |k| matches!(k, NodeKind::LocalVar(_)));
    assert_eq!(resolve_name(tree, fixture.node_at(0)), Some(field));
    assert_eq!(resolve_name(tree, fixture.node_at(1)), Some(local));
}

#[test]
fn pattern_bindings_are_scoped_to_true_branch() {
    let fixture = Fixture::parse(
        r#"class A {
    void m(Object o) {
        if (o instanceof String s && $0s.isEmpty()) {
            use($1s);
        } else {
            use($2s);
        }
    }
}
"#,
    );
    let tree = &fixture.tree;
    let binding = tree
        .descendants(tree.java_files().next().expect("file").1)
        .into_iter()
        .find(|&n| matches!(tree.kind(n), NodeKind::InstanceOf { .. }))
        .expect("instanceof");
    assert_eq!(resolve_name(tree, fixture.node_at(0)), Some(binding));
    assert_eq!(resolve_name(tree, fixture.node_at(1)), Some(binding));
    assert_eq!(resolve_name(tree, fixture.node_at(2)), None);
}

#[test]
fn guard_statement_binding_flows_into_rest_of_block() {
    let fixture = Fixture::parse(
        r#"class A {
    int m(Object o) {
        if (!(o instanceof String s)) return 0;
        return $0s.length();
    }
}
"#,
    );
    let tree = &fixture.tree;
    let found = resolve_name(tree, fixture.node_at(0)).expect("resolved");
    assert!(matches!(tree.kind(found), NodeKind::InstanceOf { .. }));
}

#[test]
fn overloads_resolve_by_arity_then_argument_type() {
    let fixture = Fixture::parse(
        r#"class A {
    void f(int a) {
    }

    void f(String a) {
    }

    void f(int a, int b) {
    }

    void m() {
        $0f(1);
        $1f("s");
        $2f(1, 2);
    }
}
"#,
    );
    let tree = &fixture.tree;
    let methods: Vec<NodeId> = tree
        .descendants(tree.java_files().next().expect("file").1)
        .into_iter()
        .filter(|&n| matches!(tree.kind(n), NodeKind::Method(d) if d.name == "f"))
        .collect();
    assert_eq!(resolve_call(tree, fixture.node_at(0)), CallResolution::Unique(methods[0]));
    assert_eq!(resolve_call(tree, fixture.node_at(1)), CallResolution::Unique(methods[1]));
    assert_eq!(resolve_call(tree, fixture.node_at(2)), CallResolution::Unique(methods[2]));
}

#[test]
fn untyped_arguments_leave_overloads_ambiguous() {
    let fixture = Fixture::parse(
        r#"class A {
    void f(int a) {
    }

    void f(String a) {
    }

    void m() {
        $0f(null);
    }
}
"#,
    );
    let resolution = resolve_call(&fixture.tree, fixture.node_at(0));
    assert!(matches!(resolution, CallResolution::Ambiguous(ref c) if c.len() == 2));
}

#[test]
fn calls_through_receivers_and_supertypes() {
    let fixture = Fixture::parse(
        r#"//- /Base.java
class Base {
    int size() {
        return 0;
    }
}
//- /Main.java
class Main extends Base {
    void m(Base other) {
        int a = $0size();
        int b = other.$1size();
    }
}
"#,
    );
    let tree = &fixture.tree;
    let size = decl_named(tree, "size", |k| matches!(k, NodeKind::Method(_)));
    let call_b = tree
        .ancestors(fixture.node_at(1))
        .chain(std::iter::once(fixture.node_at(1)))
        .find(|&n| matches!(tree.kind(n), NodeKind::MethodCall { .. }))
        .expect("call");
    assert_eq!(resolve_call(tree, fixture.node_at(0)).unique(), Some(size));
    assert_eq!(resolve_call(tree, call_b).unique(), Some(size));
    assert_eq!(find_references(tree, size).len(), 2);
}

#[test]
fn references_to_a_local_stay_in_its_method() {
    let fixture = Fixture::parse(
        r#"class A {
    void m() {
        int v = 1;
        v = v + 1;
    }

    void n() {
        int v = 2;
        use(v);
    }
}
"#,
    );
    let tree = &fixture.tree;
    let v = decl_named(tree, "v", |k| matches!(k, NodeKind::LocalVar(_)));
    let refs = find_references(tree, v);
    assert_eq!(refs.len(), 2);
    assert!(refs.iter().all(|r| !r.ambiguous));
}

#[test]
fn overriding_methods_include_anonymous_classes() {
    let fixture = Fixture::parse(
        r#"class Task {
    void run() {
    }
}

class Sub extends Task {
    void run() {
    }
}

class User {
    Task make() {
        return new Task() {
            void run() {
            }
        };
    }
}
"#,
    );
    let tree = &fixture.tree;
    let root = tree.java_files().next().expect("file").1;
    let run = tree
        .descendants(root)
        .into_iter()
        .find(|&n| matches!(tree.kind(n), NodeKind::Method(d) if d.name == "run"))
        .expect("run");
    assert_eq!(overriding_methods(tree, run).len(), 2);
}

#[test]
fn private_members_are_visible_within_the_top_level_class() {
    let fixture = Fixture::parse(
        r#"//- /A.java
package p;

class A {
    private int secret;

    class Inner {
        int get() {
            return $0secret;
        }
    }
}
//- /B.java
package q;

class B {
    void m() {
        $1use();
    }
}
"#,
    );
    let tree = &fixture.tree;
    let secret = decl_named(tree, "secret", |k| matches!(k, NodeKind::Field(_)));
    assert!(is_accessible(tree, secret, fixture.node_at(0)));
    assert!(!is_accessible(tree, secret, fixture.node_at(1)));
}

#[test]
fn static_types_of_common_expressions() {
    let fixture = Fixture::parse(
        r#"class A {
    long total;

    void m(int[] xs) {
        use($0xs[0] + total);
        use($1"n=" + xs.length);
    }
}
"#,
    );
    let tree = &fixture.tree;
    let binary = |id| {
        tree.ancestors(fixture.node_at(id))
            .find(|&n| matches!(tree.kind(n), NodeKind::Binary { .. }))
            .expect("binary")
    };
    assert_eq!(static_type(tree, binary(0)).as_deref(), Some("long"));
    assert_eq!(static_type(tree, binary(1)).as_deref(), Some("String"));
}
