use pretty_assertions::assert_eq;

use crate::{
    lex, make, parse_expression, parse_java_file, parse_statement, print_file, print_node,
    BinaryOp, DocumentOrder, NodeKind, TextSize, TokenKind, Tree, TreeError,
};

fn kinds(input: &str) -> Vec<(TokenKind, String)> {
    lex(input)
        .expect("lex")
        .into_iter()
        .map(|t| (t.kind, t.text))
        .collect()
}

fn find(tree: &Tree, root: crate::NodeId, pred: impl Fn(&NodeKind) -> bool) -> crate::NodeId {
    tree.descendants(root)
        .into_iter()
        .find(|&n| pred(tree.kind(n)))
        .expect("node not found")
}

#[test]
fn lexer_splits_literals_and_trivia() {
    assert_eq!(
        kinds("x += 1L; // hi\n/** doc */ 'c'"),
        vec![
            (TokenKind::Ident, "x".to_string()),
            (TokenKind::Punct, "+=".to_string()),
            (TokenKind::LongLiteral, "1L".to_string()),
            (TokenKind::Punct, ";".to_string()),
            (TokenKind::LineComment, "// hi".to_string()),
            (TokenKind::DocComment, "/** doc */".to_string()),
            (TokenKind::CharLiteral, "'c'".to_string()),
            (TokenKind::Eof, String::new()),
        ]
    );
}

#[test]
fn lexer_reports_unterminated_string() {
    let err = lex("String s = \"abc").unwrap_err();
    assert!(err.message.contains("unterminated"), "{err}");
}

#[test]
fn canonical_source_round_trips() {
    let source = r#"package com.example;

import java.util.List;
import static java.lang.Math.max;

/** Utility. */
public class Util<T> extends Base implements Runnable, Cloneable {
    private static final int LIMIT = 10;
    private int count;

    public Util(int count) {
        this.count = count;
    }

    @Override
    public void run() {
        for (int i = 0; i < LIMIT; i++) {
            if (i % 2 == 0) continue;
            count += i;
        }
        // done
        while (count > 0) {
            count--;
        }
    }

    int sum(List<Integer> xs) {
        int total = 0;
        for (int x : xs) {
            total += x;
        }
        return total > LIMIT ? LIMIT : total;
    }

    Runnable task() {
        return () -> System.out.println(count);
    }

    String describe(Object o) {
        if (o instanceof String s && !s.isEmpty()) {
            return s;
        } else {
            return String.valueOf(o);
        }
    }
}
"#;
    let mut tree = Tree::new();
    let file = parse_java_file(&mut tree, "Util.java", source).expect("parse");
    assert_eq!(print_file(&tree, file).as_deref(), Some(source));
}

#[test]
fn enum_constants_print_before_members() {
    let source = "enum Color {\n    RED,\n    GREEN(\"g\");\n\n    private String code;\n}\n";
    let mut tree = Tree::new();
    let file = parse_java_file(&mut tree, "Color.java", source).expect("parse");
    assert_eq!(print_file(&tree, file).as_deref(), Some(source));
}

#[test]
fn binary_operators_respect_precedence() {
    let mut tree = Tree::new();
    let expr = parse_expression(&mut tree, "a + b * c").expect("parse");
    assert_eq!(tree.kind(expr), &NodeKind::Binary { op: BinaryOp::Add });
    let rhs = tree.child(expr, 1).expect("rhs");
    assert_eq!(tree.kind(rhs), &NodeKind::Binary { op: BinaryOp::Mul });
}

#[test]
fn shifts_are_reassembled_from_angle_brackets() {
    let mut tree = Tree::new();
    let expr = parse_expression(&mut tree, "a >> 2").expect("parse");
    assert_eq!(tree.kind(expr), &NodeKind::Binary { op: BinaryOp::Shr });
    let generic = parse_statement(&mut tree, "List<List<String>> xs = null;").expect("parse");
    assert_eq!(print_node(&tree, generic), "List<List<String>> xs = null;");
}

#[test]
fn replacing_an_operand_adds_parentheses() {
    let mut tree = Tree::new();
    let stmt = parse_statement(&mut tree, "x = a * b;").expect("parse");
    let b = find(&tree, stmt, |k| matches!(k, NodeKind::Name { ident } if ident == "b"));
    let sum = parse_expression(&mut tree, "c + d").expect("parse");
    make::replace_expr(&mut tree, b, sum).expect("replace");
    assert_eq!(print_node(&tree, stmt), "x = a * (c + d);");
    assert!(!tree.is_alive(b));
}

#[test]
fn left_associative_operators_keep_right_parentheses() {
    let mut tree = Tree::new();
    let stmt = parse_statement(&mut tree, "x = a - b;").expect("parse");
    let b = find(&tree, stmt, |k| matches!(k, NodeKind::Name { ident } if ident == "b"));
    let diff = parse_expression(&mut tree, "c - d").expect("parse");
    make::replace_expr(&mut tree, b, diff).expect("replace");
    assert_eq!(print_node(&tree, stmt), "x = a - (c - d);");

    let a = find(&tree, stmt, |k| matches!(k, NodeKind::Name { ident } if ident == "a"));
    let diff = parse_expression(&mut tree, "e - f").expect("parse");
    make::replace_expr(&mut tree, a, diff).expect("replace");
    assert_eq!(print_node(&tree, stmt), "x = e - f - (c - d);");
}

#[test]
fn redundant_parentheses_are_stripped() {
    let mut tree = Tree::new();
    let stmt = parse_statement(&mut tree, "foo((a + b));").expect("parse");
    let paren = find(&tree, stmt, |k| matches!(k, NodeKind::Paren));
    let inner = make::strip_redundant_paren(&mut tree, paren).expect("strip");
    assert!(matches!(tree.kind(inner), NodeKind::Binary { .. }));
    assert_eq!(print_node(&tree, stmt), "foo(a + b);");
}

#[test]
fn removed_nodes_are_stale_and_ids_are_not_reused() {
    let mut tree = Tree::new();
    let block = parse_statement(&mut tree, "{ int a = 1; int b = 2; }").expect("parse");
    let first = tree.child(block, 0).expect("first");
    let init = tree.child(first, 0).expect("init");
    tree.remove(first).expect("remove");
    assert_eq!(tree.ensure_alive(init), Err(TreeError::Stale(init)));
    assert_eq!(tree.children(block).len(), 1);

    let fresh = make::name(&mut tree, "c");
    assert_ne!(fresh, first);
    assert_ne!(fresh, init);
    assert_eq!(print_node(&tree, block), "{\n    int b = 2;\n}");
}

#[test]
fn moving_a_node_preserves_its_identity() {
    let mut tree = Tree::new();
    let block = parse_statement(&mut tree, "{ a(); b(); }").expect("parse");
    let first = tree.child(block, 0).expect("first");
    tree.detach(first).expect("detach");
    tree.append_child(block, first).expect("append");
    assert!(tree.is_alive(first));
    assert_eq!(print_node(&tree, block), "{\n    b();\n    a();\n}");
}

#[test]
fn read_only_files_reject_mutation() {
    let mut tree = Tree::new();
    let file = parse_java_file(&mut tree, "Lib.java", "class Lib {\n    int x = 1;\n}\n")
        .expect("parse");
    tree.set_read_only(file, true).expect("known file");
    let root = tree.file(file).and_then(|f| f.root()).expect("root");
    let field = find(&tree, root, |k| matches!(k, NodeKind::Field(_)));
    assert_eq!(
        tree.remove(field),
        Err(TreeError::ReadOnly {
            path: "Lib.java".to_string()
        })
    );
    assert!(tree.is_alive(field));
}

#[test]
fn node_at_offset_finds_innermost_node() {
    let source = "class A {\n    void m() {\n        foo(bar);\n    }\n}\n";
    let mut tree = Tree::new();
    let file = parse_java_file(&mut tree, "A.java", source).expect("parse");
    let offset = source.find("bar").expect("offset") as u32;
    let node = tree
        .node_at_offset(file, TextSize::from(offset))
        .expect("node");
    assert_eq!(
        tree.kind(node),
        &NodeKind::Name {
            ident: "bar".to_string()
        }
    );
}

#[test]
fn document_order_compares_subtrees() {
    let mut tree = Tree::new();
    let block = parse_statement(&mut tree, "{ a(); { b(); } c(); }").expect("parse");
    let children = tree.children(block).to_vec();
    let order = DocumentOrder::new(&tree, block);
    assert!(order.precedes(children[0], children[1]));
    assert!(order.precedes(children[1], children[2]));
    assert!(!order.precedes(children[2], children[0]));
    assert!(order.contains(block, children[1]));
    let inner = tree.child(children[1], 0).expect("inner");
    assert!(order.contains(children[1], inner));
    assert!(!order.precedes(children[1], inner));
}

#[test]
fn unsupported_statements_are_rejected() {
    let mut tree = Tree::new();
    let err = parse_java_file(
        &mut tree,
        "S.java",
        "class S {\n    void m(int x) {\n        switch (x) {}\n    }\n}\n",
    )
    .unwrap_err();
    assert!(err.message.contains("not supported"), "{err}");
}

#[test]
fn deep_copy_is_detached_and_independent() {
    let mut tree = Tree::new();
    let expr = parse_expression(&mut tree, "f(x, y + 1)").expect("parse");
    let (copy, map) = tree.deep_copy_with_map(expr);
    assert_eq!(tree.parent(copy), None);
    assert_eq!(print_node(&tree, copy), "f(x, y + 1)");
    assert_eq!(map.len(), tree.descendants(expr).len());
    tree.remove(copy).expect("remove");
    assert!(tree.is_alive(expr));
}

#[test]
fn else_branches_follow_block_layout() {
    let mut tree = Tree::new();
    let stmt = parse_statement(&mut tree, "if (a) x(); else if (b) { y(); } else z();")
        .expect("parse");
    assert_eq!(
        print_node(&tree, stmt),
        "if (a) x();\nelse if (b) {\n    y();\n} else z();"
    );
}
