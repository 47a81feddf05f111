//! Canonical pretty printer.
//!
//! Formatting is deterministic: four-space indentation, one statement per
//! line, and a blank line between class members unless both are fields.

use crate::kind::{ClassKind, Modifiers, NodeKind, VarData};
use crate::tree::{FileContent, FileId, NodeId, Tree};

const INDENT: &str = "    ";

/// Prints a whole file. Text files are returned verbatim.
pub fn print_file(tree: &Tree, file: FileId) -> Option<String> {
    match tree.file(file)?.content() {
        FileContent::Java { root } => Some(print_node(tree, *root)),
        FileContent::Text { text } => Some(text.clone()),
    }
}

pub fn print_node(tree: &Tree, id: NodeId) -> String {
    let mut printer = Printer {
        tree,
        out: String::new(),
        indent: 0,
    };
    printer.node(id);
    printer.out
}

struct Printer<'a> {
    tree: &'a Tree,
    out: String,
    indent: usize,
}

impl Printer<'_> {
    fn push(&mut self, text: &str) {
        self.out.push_str(text);
    }

    fn line_start(&mut self) {
        for _ in 0..self.indent {
            self.out.push_str(INDENT);
        }
    }

    fn kind(&self, id: NodeId) -> &NodeKind {
        self.tree.kind(id)
    }

    fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.tree.children(id).to_vec()
    }

    fn node(&mut self, id: NodeId) {
        let kind = self.kind(id);
        if let NodeKind::CompilationUnit { .. } = kind {
            self.unit(id);
        } else if kind.is_expression() {
            self.expr(id);
        } else if kind.is_statement() {
            self.stmt(id);
        } else {
            self.member(id);
        }
    }

    fn unit(&mut self, id: NodeId) {
        let NodeKind::CompilationUnit { package, imports } = self.kind(id).clone() else {
            return;
        };
        if let Some(package) = package {
            self.push(&format!("package {package};\n\n"));
        }
        for import in &imports {
            self.push(&format!("import {import};\n"));
        }
        if !imports.is_empty() {
            self.push("\n");
        }
        for (i, ty) in self.children(id).into_iter().enumerate() {
            if i > 0 {
                self.push("\n");
            }
            self.member(ty);
            self.push("\n");
        }
    }

    fn doc(&mut self, doc: Option<&str>) {
        if let Some(doc) = doc {
            self.line_start();
            self.push(doc);
            self.push("\n");
        }
    }

    fn member_modifiers(&mut self, modifiers: &Modifiers) {
        for annotation in &modifiers.annotations {
            self.line_start();
            self.push(&format!("@{annotation}\n"));
        }
        self.line_start();
        for keyword in modifiers.keywords() {
            self.push(keyword);
            self.push(" ");
        }
    }

    fn inline_modifiers(&mut self, modifiers: &Modifiers) {
        for annotation in &modifiers.annotations {
            self.push(&format!("@{annotation} "));
        }
        for keyword in modifiers.keywords() {
            self.push(keyword);
            self.push(" ");
        }
    }

    fn member(&mut self, id: NodeId) {
        match self.kind(id).clone() {
            NodeKind::Class(data) => {
                self.doc(data.doc.as_deref());
                self.member_modifiers(&data.modifiers);
                self.push(data.kind.keyword());
                self.push(" ");
                self.push(&data.name);
                if let Some(params) = &data.type_params {
                    self.push(params);
                }
                if let Some(extends) = &data.extends {
                    self.push(&format!(" extends {extends}"));
                }
                if !data.implements.is_empty() {
                    let keyword = if data.kind == ClassKind::Interface {
                        "extends"
                    } else {
                        "implements"
                    };
                    self.push(&format!(" {keyword} {}", data.implements.join(", ")));
                }
                self.push(" ");
                self.class_body(id);
            }
            NodeKind::Field(data) => {
                self.doc(data.doc.as_deref());
                self.member_modifiers(&data.modifiers);
                self.push(&format!("{} {}", data.ty, data.name));
                if let Some(&init) = self.tree.children(id).first() {
                    self.push(" = ");
                    self.expr(init);
                }
                self.push(";");
            }
            NodeKind::Method(data) | NodeKind::Constructor(data) => {
                self.doc(data.doc.as_deref());
                self.member_modifiers(&data.modifiers);
                if let Some(params) = &data.type_params {
                    self.push(params);
                    self.push(" ");
                }
                if let Some(ret) = &data.return_ty {
                    self.push(ret);
                    self.push(" ");
                }
                self.push(&data.name);
                self.push("(");
                let mut body = None;
                let mut first = true;
                for child in self.children(id) {
                    match self.kind(child).clone() {
                        NodeKind::Param(param) => {
                            if !first {
                                self.push(", ");
                            }
                            first = false;
                            self.param(&param);
                        }
                        NodeKind::Block => body = Some(child),
                        _ => {}
                    }
                }
                self.push(")");
                if !data.throws.is_empty() {
                    self.push(&format!(" throws {}", data.throws.join(", ")));
                }
                match body {
                    Some(body) => {
                        self.push(" ");
                        self.block(body);
                    }
                    None => self.push(";"),
                }
            }
            NodeKind::Initializer { is_static } => {
                self.line_start();
                if is_static {
                    self.push("static ");
                }
                if let Some(&body) = self.tree.children(id).first() {
                    self.block(body);
                }
            }
            NodeKind::EnumConstant { doc, .. } => {
                self.doc(doc.as_deref());
                self.line_start();
                self.enum_constant(id);
            }
            NodeKind::Param(data) => self.param(&data),
            NodeKind::Comment { text } => {
                self.line_start();
                self.push(&text);
            }
            _ => {}
        }
    }

    fn param(&mut self, data: &VarData) {
        self.inline_modifiers(&data.modifiers);
        if data.has_explicit_type() {
            self.push(&data.ty);
            self.push(if data.varargs { "... " } else { " " });
        }
        self.push(&data.name);
    }

    fn enum_constant(&mut self, id: NodeId) {
        let NodeKind::EnumConstant { name, .. } = self.kind(id).clone() else {
            return;
        };
        self.push(&name);
        let args = self.children(id);
        if !args.is_empty() {
            self.args(&args);
        }
    }

    /// `{ members }` of a class or anonymous class body.
    fn class_body(&mut self, id: NodeId) {
        self.push("{\n");
        self.indent += 1;
        let members = self.children(id);
        let (constants, others): (Vec<NodeId>, Vec<NodeId>) = members
            .into_iter()
            .partition(|&m| matches!(self.kind(m), NodeKind::EnumConstant { .. }));
        for (i, &constant) in constants.iter().enumerate() {
            let doc = self.kind(constant).doc().map(str::to_string);
            self.doc(doc.as_deref());
            self.line_start();
            self.enum_constant(constant);
            if i + 1 < constants.len() {
                self.push(",\n");
            } else if !others.is_empty() {
                self.push(";\n\n");
            } else {
                self.push("\n");
            }
        }
        let mut prev_is_field = None;
        for member in others {
            let is_field = matches!(self.kind(member), NodeKind::Field(_));
            if let Some(prev) = prev_is_field {
                if !(prev && is_field) {
                    self.push("\n");
                }
            }
            prev_is_field = Some(is_field);
            self.member(member);
            self.push("\n");
        }
        self.indent -= 1;
        self.line_start();
        self.push("}");
    }

    // ---------------------------------------------------------------------
    // Statements

    fn block(&mut self, id: NodeId) {
        self.push("{\n");
        self.indent += 1;
        for stmt in self.children(id) {
            self.line_start();
            self.stmt(stmt);
            self.push("\n");
        }
        self.indent -= 1;
        self.line_start();
        self.push("}");
    }

    /// Body of a compound statement: blocks stay on the same line.
    fn branch(&mut self, id: NodeId) {
        if matches!(self.kind(id), NodeKind::Block) {
            self.block(id);
        } else {
            self.stmt(id);
        }
    }

    fn var_decl(&mut self, data: &VarData, init: Option<NodeId>) {
        self.inline_modifiers(&data.modifiers);
        self.push(&format!("{} {}", data.ty, data.name));
        if let Some(init) = init {
            self.push(" = ");
            self.expr(init);
        }
    }

    fn stmt(&mut self, id: NodeId) {
        let children = self.children(id);
        match self.kind(id).clone() {
            NodeKind::Block => self.block(id),
            NodeKind::LocalVar(data) => {
                self.var_decl(&data, children.first().copied());
                self.push(";");
            }
            NodeKind::ExprStmt => {
                if let Some(&expr) = children.first() {
                    self.expr(expr);
                }
                self.push(";");
            }
            NodeKind::Return => {
                self.push("return");
                if let Some(&expr) = children.first() {
                    self.push(" ");
                    self.expr(expr);
                }
                self.push(";");
            }
            NodeKind::If => {
                self.push("if (");
                self.expr(children[0]);
                self.push(") ");
                self.branch(children[1]);
                if let Some(&otherwise) = children.get(2) {
                    if matches!(self.kind(children[1]), NodeKind::Block) {
                        self.push(" else ");
                    } else {
                        self.push("\n");
                        self.line_start();
                        self.push("else ");
                    }
                    self.branch(otherwise);
                }
            }
            NodeKind::While => {
                self.push("while (");
                self.expr(children[0]);
                self.push(") ");
                self.branch(children[1]);
            }
            NodeKind::DoWhile => {
                self.push("do ");
                self.branch(children[0]);
                if matches!(self.kind(children[0]), NodeKind::Block) {
                    self.push(" ");
                } else {
                    self.push("\n");
                    self.line_start();
                }
                self.push("while (");
                self.expr(children[1]);
                self.push(");");
            }
            NodeKind::For { has_condition } => {
                self.push("for (");
                let init = children[0];
                let mut first = true;
                for part in self.children(init) {
                    match self.kind(part).clone() {
                        NodeKind::LocalVar(data) => {
                            let value = self.tree.children(part).first().copied();
                            if first {
                                self.var_decl(&data, value);
                            } else {
                                self.push(", ");
                                self.push(&data.name);
                                if let Some(value) = value {
                                    self.push(" = ");
                                    self.expr(value);
                                }
                            }
                        }
                        _ => {
                            if !first {
                                self.push(", ");
                            }
                            if let Some(&expr) = self.tree.children(part).first() {
                                self.expr(expr);
                            }
                        }
                    }
                    first = false;
                }
                self.push(";");
                let mut next = 1;
                if has_condition {
                    self.push(" ");
                    self.expr(children[1]);
                    next = 2;
                }
                self.push(";");
                let updates = self.children(children[next]);
                if !updates.is_empty() {
                    self.push(" ");
                    self.expr_list(&updates);
                }
                self.push(") ");
                self.branch(children[next + 1]);
            }
            NodeKind::ForEach(data) => {
                self.push("for (");
                self.inline_modifiers(&data.modifiers);
                self.push(&format!("{} {} : ", data.ty, data.name));
                self.expr(children[0]);
                self.push(") ");
                self.branch(children[1]);
            }
            NodeKind::Labeled { label } => {
                self.push(&format!("{label}: "));
                self.stmt(children[0]);
            }
            NodeKind::Synchronized => {
                self.push("synchronized (");
                self.expr(children[0]);
                self.push(") ");
                self.block(children[1]);
            }
            NodeKind::Throw => {
                self.push("throw ");
                self.expr(children[0]);
                self.push(";");
            }
            NodeKind::Try { has_finally } => {
                self.push("try ");
                self.block(children[0]);
                let catch_end = if has_finally {
                    children.len() - 1
                } else {
                    children.len()
                };
                for &catch in &children[1..catch_end] {
                    if let NodeKind::Catch(data) = self.kind(catch).clone() {
                        self.push(" catch (");
                        self.inline_modifiers(&data.modifiers);
                        self.push(&format!("{} {}) ", data.ty, data.name));
                        if let Some(&body) = self.tree.children(catch).first() {
                            self.block(body);
                        }
                    }
                }
                if has_finally {
                    self.push(" finally ");
                    self.block(children[children.len() - 1]);
                }
            }
            NodeKind::Break { label } | NodeKind::Continue { label } => {
                let keyword = if matches!(self.kind(id), NodeKind::Break { .. }) {
                    "break"
                } else {
                    "continue"
                };
                self.push(keyword);
                if let Some(label) = label {
                    self.push(" ");
                    self.push(&label);
                }
                self.push(";");
            }
            NodeKind::Empty => self.push(";"),
            NodeKind::Comment { text } => self.push(&text),
            _ => self.expr(id),
        }
    }

    // ---------------------------------------------------------------------
    // Expressions

    fn expr_list(&mut self, items: &[NodeId]) {
        for (i, &item) in items.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.expr(item);
        }
    }

    fn args(&mut self, args: &[NodeId]) {
        self.push("(");
        self.expr_list(args);
        self.push(")");
    }

    fn expr(&mut self, id: NodeId) {
        let children = self.children(id);
        match self.kind(id).clone() {
            NodeKind::Literal { text, .. } => self.push(&text),
            NodeKind::Name { ident } => self.push(&ident),
            NodeKind::FieldAccess { name } => {
                self.expr(children[0]);
                self.push(".");
                self.push(&name);
            }
            NodeKind::MethodCall { name, has_receiver } => {
                let args = if has_receiver {
                    self.expr(children[0]);
                    self.push(".");
                    &children[1..]
                } else {
                    &children[..]
                };
                self.push(&name);
                self.args(args);
            }
            NodeKind::CtorCall { is_super } => {
                self.push(if is_super { "super" } else { "this" });
                self.args(&children);
            }
            NodeKind::New { ty, has_body } => {
                self.push("new ");
                self.push(&ty);
                let args = if has_body {
                    &children[..children.len() - 1]
                } else {
                    &children[..]
                };
                self.args(args);
                if has_body {
                    if let Some(&body) = children.last() {
                        self.push(" ");
                        self.class_body(body);
                    }
                }
            }
            NodeKind::NewArray { ty, dims, has_init } => {
                self.push("new ");
                self.push(&ty);
                let dim_exprs = if has_init {
                    &children[..children.len() - 1]
                } else {
                    &children[..]
                };
                for &dim in dim_exprs {
                    self.push("[");
                    self.expr(dim);
                    self.push("]");
                }
                for _ in dim_exprs.len()..dims {
                    self.push("[]");
                }
                if has_init {
                    if let Some(&init) = children.last() {
                        self.expr(init);
                    }
                }
            }
            NodeKind::ArrayInit => {
                self.push("{");
                self.expr_list(&children);
                self.push("}");
            }
            NodeKind::Unary { op } => {
                if op.is_postfix() {
                    self.expr(children[0]);
                    self.push(op.symbol());
                } else {
                    self.push(op.symbol());
                    self.expr(children[0]);
                }
            }
            NodeKind::Binary { op } => {
                self.expr(children[0]);
                self.push(&format!(" {} ", op.symbol()));
                self.expr(children[1]);
            }
            NodeKind::Assign { op } => {
                self.expr(children[0]);
                self.push(&format!(" {} ", op.symbol()));
                self.expr(children[1]);
            }
            NodeKind::Conditional => {
                self.expr(children[0]);
                self.push(" ? ");
                self.expr(children[1]);
                self.push(" : ");
                self.expr(children[2]);
            }
            NodeKind::Cast { ty } => {
                self.push(&format!("({ty}) "));
                self.expr(children[0]);
            }
            NodeKind::Paren => {
                self.push("(");
                self.expr(children[0]);
                self.push(")");
            }
            NodeKind::ArrayAccess => {
                self.expr(children[0]);
                self.push("[");
                self.expr(children[1]);
                self.push("]");
            }
            NodeKind::This { qualifier } => {
                if let Some(qualifier) = qualifier {
                    self.push(&qualifier);
                    self.push(".");
                }
                self.push("this");
            }
            NodeKind::Super { qualifier } => {
                if let Some(qualifier) = qualifier {
                    self.push(&qualifier);
                    self.push(".");
                }
                self.push("super");
            }
            NodeKind::ClassLiteral { ty } => {
                self.push(&ty);
                self.push(".class");
            }
            NodeKind::InstanceOf { ty, binding } => {
                self.expr(children[0]);
                self.push(" instanceof ");
                self.push(&ty);
                if let Some(binding) = binding {
                    self.push(" ");
                    self.push(&binding);
                }
            }
            NodeKind::Lambda {
                param_count,
                parenthesized,
            } => {
                let params: Vec<VarData> = children[..param_count]
                    .iter()
                    .filter_map(|&p| self.kind(p).var_data().cloned())
                    .collect();
                let bare = !parenthesized
                    && params.len() == 1
                    && !params[0].has_explicit_type();
                if bare {
                    self.push(&params[0].name);
                } else {
                    self.push("(");
                    for (i, param) in params.iter().enumerate() {
                        if i > 0 {
                            self.push(", ");
                        }
                        self.param(param);
                    }
                    self.push(")");
                }
                self.push(" -> ");
                let body = children[param_count];
                if matches!(self.kind(body), NodeKind::Block) {
                    self.block(body);
                } else {
                    self.expr(body);
                }
            }
            NodeKind::MethodRef { name } => {
                self.expr(children[0]);
                self.push("::");
                self.push(&name);
            }
            _ => {}
        }
    }
}
