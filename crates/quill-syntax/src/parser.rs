//! Recursive-descent parser for the supported Java subset.
//!
//! The parser produces nodes directly in a [`Tree`]; generic type arguments
//! and type parameter lists are kept as normalized text.

use text_size::{TextRange, TextSize};

use crate::kind::{
    AssignOp, BinaryOp, ClassData, ClassKind, LiteralKind, MethodData, Modifiers, NodeKind,
    UnaryOp, VarData, Visibility,
};
use crate::lexer::{lex, Token, TokenKind};
use crate::tree::{FileId, NodeId, Tree};
use crate::ParseError;

const RESERVED: &[&str] = &[
    "abstract", "assert", "boolean", "break", "byte", "case", "catch", "char", "class", "const",
    "continue", "default", "do", "double", "else", "enum", "extends", "final", "finally", "float",
    "for", "goto", "if", "implements", "import", "instanceof", "int", "interface", "long",
    "native", "new", "package", "private", "protected", "public", "return", "short", "static",
    "strictfp", "super", "switch", "synchronized", "this", "throw", "throws", "transient", "try",
    "void", "volatile", "while", "true", "false", "null",
];

const PRIMITIVES: &[&str] = &[
    "boolean", "byte", "char", "short", "int", "long", "float", "double", "void",
];

pub fn is_primitive_type(ty: &str) -> bool {
    PRIMITIVES.contains(&ty)
}

/// Parses `text` and registers it as a Java file of `tree`.
pub fn parse_java_file(
    tree: &mut Tree,
    path: impl Into<String>,
    text: &str,
) -> Result<FileId, ParseError> {
    let path = path.into();
    let _span = tracing::debug_span!("parse_java_file", path = %path).entered();
    let root = {
        let mut parser = Parser::new(tree, text)?;
        parser.compilation_unit().map_err(|err| {
            tracing::debug!(error = %err, "parse failed");
            err
        })?
    };
    Ok(tree.add_java_file(path, root))
}

/// Parses a standalone expression into a detached subtree.
pub fn parse_expression(tree: &mut Tree, text: &str) -> Result<NodeId, ParseError> {
    let mut parser = Parser::new(tree, text)?;
    let expr = parser.expr()?;
    parser.expect_eof()?;
    Ok(expr)
}

/// Parses a single statement into a detached subtree.
pub fn parse_statement(tree: &mut Tree, text: &str) -> Result<NodeId, ParseError> {
    let mut parser = Parser::new(tree, text)?;
    let mut stmts = parser.block_statement()?;
    parser.expect_eof()?;
    if stmts.len() != 1 {
        return Err(ParseError {
            message: "expected a single statement".to_string(),
            range: TextRange::up_to(TextSize::from(text.len() as u32)),
        });
    }
    Ok(stmts.remove(0))
}

struct Parser<'t> {
    tree: &'t mut Tree,
    tokens: Vec<Token>,
    comments: Vec<Token>,
    pos: usize,
}

impl<'t> Parser<'t> {
    fn new(tree: &'t mut Tree, text: &str) -> Result<Self, ParseError> {
        let (comments, tokens): (Vec<Token>, Vec<Token>) = lex(text)?
            .into_iter()
            .partition(|t: &Token| t.kind.is_trivia());
        Ok(Parser {
            tree,
            tokens,
            comments,
            pos: 0,
        })
    }

    // ---------------------------------------------------------------------
    // Token cursor

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn nth(&self, n: usize) -> &Token {
        let index = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[index]
    }

    fn nth_at(&self, n: usize, text: &str) -> bool {
        let tok = self.nth(n);
        matches!(tok.kind, TokenKind::Punct | TokenKind::Ident) && tok.text == text
    }

    fn at(&self, text: &str) -> bool {
        self.nth_at(0, text)
    }

    fn at_eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn at_ident(&self) -> bool {
        is_ident(self.peek())
    }

    /// Token `n` ends exactly where token `n + 1` starts.
    fn adjacent(&self, n: usize) -> bool {
        self.nth(n).range.end() == self.nth(n + 1).range.start()
    }

    fn bump(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, text: &str) -> bool {
        if self.at(text) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, text: &str) -> Result<Token, ParseError> {
        if self.at(text) {
            Ok(self.bump())
        } else {
            Err(self.error(format!("expected `{text}`")))
        }
    }

    fn expect_eof(&self) -> Result<(), ParseError> {
        if self.at_eof() {
            Ok(())
        } else {
            Err(self.error("expected end of input"))
        }
    }

    fn ident(&mut self) -> Result<String, ParseError> {
        if self.at_ident() {
            Ok(self.bump().text)
        } else {
            Err(self.error("expected identifier"))
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        let tok = self.peek();
        let found = if tok.kind == TokenKind::Eof {
            "end of input".to_string()
        } else {
            format!("`{}`", tok.text)
        };
        ParseError {
            message: format!("{}, found {found}", message.into()),
            range: tok.range,
        }
    }

    fn start(&self) -> TextSize {
        self.peek().range.start()
    }

    fn prev_end(&self) -> TextSize {
        if self.pos == 0 {
            TextSize::from(0)
        } else {
            self.tokens[self.pos - 1].range.end()
        }
    }

    fn finish(&mut self, kind: NodeKind, children: Vec<NodeId>, start: TextSize) -> NodeId {
        let id = self.tree.build(kind, children);
        let end = self.prev_end().max(start);
        self.tree.set_range(id, TextRange::new(start, end));
        id
    }

    fn skip_balanced(&mut self, open: &str, close: &str) -> Result<(), ParseError> {
        let mut depth = 0usize;
        loop {
            if self.at_eof() {
                return Err(self.error(format!("unbalanced `{open}`")));
            }
            let tok = self.bump();
            if tok.text == open {
                depth += 1;
            } else if tok.text == close {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
        }
    }

    /// Trivia between the previous token and the current one.
    fn gap_comments(&self) -> Vec<Token> {
        let from = self.prev_end();
        let to = self.start();
        self.comments
            .iter()
            .filter(|c| c.range.start() >= from && c.range.end() <= to)
            .cloned()
            .collect()
    }

    fn doc_comment(&self) -> Option<String> {
        self.gap_comments()
            .into_iter()
            .filter(|c| c.kind == TokenKind::DocComment)
            .last()
            .map(|c| c.text)
    }

    fn comments_into(&mut self, out: &mut Vec<NodeId>) {
        for comment in self.gap_comments() {
            let id = self.tree.alloc_with_range(
                NodeKind::Comment { text: comment.text },
                Some(comment.range),
            );
            out.push(id);
        }
    }

    // ---------------------------------------------------------------------
    // Declarations

    fn compilation_unit(&mut self) -> Result<NodeId, ParseError> {
        let start = self.start();
        let mut package = None;
        if self.eat("package") {
            package = Some(self.qualified_name()?);
            self.expect(";")?;
        }
        let mut imports = Vec::new();
        while self.eat("import") {
            let mut text = String::new();
            if self.eat("static") {
                text.push_str("static ");
            }
            text.push_str(&self.qualified_name()?);
            if self.eat(".") {
                self.expect("*")?;
                text.push_str(".*");
            }
            self.expect(";")?;
            imports.push(text);
        }
        let mut types = Vec::new();
        while !self.at_eof() {
            if self.eat(";") {
                continue;
            }
            let doc = self.doc_comment();
            let decl_start = self.start();
            let modifiers = self.modifiers()?;
            types.push(self.class_declaration(doc, modifiers, decl_start)?);
        }
        Ok(self.finish(NodeKind::CompilationUnit { package, imports }, types, start))
    }

    fn qualified_name(&mut self) -> Result<String, ParseError> {
        let mut text = self.ident()?;
        while self.at(".") && is_ident(self.nth(1)) {
            self.bump();
            text.push('.');
            text.push_str(&self.bump().text);
        }
        Ok(text)
    }

    fn modifiers(&mut self) -> Result<Modifiers, ParseError> {
        let mut m = Modifiers::default();
        loop {
            if self.at("@") && !self.nth_at(1, "interface") {
                self.bump();
                let name = self.qualified_name()?;
                if self.at("(") {
                    self.skip_balanced("(", ")")?;
                }
                m.annotations.push(name);
                continue;
            }
            if self.peek().kind != TokenKind::Ident {
                break;
            }
            match self.peek().text.as_str() {
                "public" => m.visibility = Visibility::Public,
                "protected" => m.visibility = Visibility::Protected,
                "private" => m.visibility = Visibility::Private,
                "abstract" => m.is_abstract = true,
                "static" => m.is_static = true,
                "final" => m.is_final = true,
                "transient" => m.is_transient = true,
                "volatile" => m.is_volatile = true,
                "synchronized" if !self.nth_at(1, "(") => m.is_synchronized = true,
                "native" => m.is_native = true,
                "default" => m.is_default = true,
                "strictfp" => {}
                _ => break,
            }
            self.bump();
        }
        Ok(m)
    }

    fn class_declaration(
        &mut self,
        doc: Option<String>,
        modifiers: Modifiers,
        start: TextSize,
    ) -> Result<NodeId, ParseError> {
        let kind = if self.eat("class") {
            ClassKind::Class
        } else if self.eat("interface") {
            ClassKind::Interface
        } else if self.eat("enum") {
            ClassKind::Enum
        } else {
            return Err(self.error("expected `class`, `interface` or `enum`"));
        };
        let name = self.ident()?;
        let type_params = if self.at("<") {
            Some(self.type_params()?)
        } else {
            None
        };
        let mut extends = None;
        let mut implements = Vec::new();
        if self.eat("extends") {
            if kind == ClassKind::Interface {
                implements = self.type_list()?;
            } else {
                extends = Some(self.ty()?);
            }
        }
        if self.eat("implements") {
            implements.extend(self.type_list()?);
        }
        let members = self.class_body(&name, kind)?;
        let data = ClassData {
            name,
            kind,
            modifiers,
            type_params,
            extends,
            implements,
            doc,
        };
        Ok(self.finish(NodeKind::Class(data), members, start))
    }

    fn type_list(&mut self) -> Result<Vec<String>, ParseError> {
        let mut out = vec![self.ty()?];
        while self.eat(",") {
            out.push(self.ty()?);
        }
        Ok(out)
    }

    fn type_params(&mut self) -> Result<String, ParseError> {
        self.expect("<")?;
        let mut text = String::from("<");
        loop {
            text.push_str(&self.ident()?);
            if self.eat("extends") {
                text.push_str(" extends ");
                text.push_str(&self.ty()?);
                while self.eat("&") {
                    text.push_str(" & ");
                    text.push_str(&self.ty()?);
                }
            }
            if self.eat(",") {
                text.push_str(", ");
                continue;
            }
            break;
        }
        self.expect(">")?;
        text.push('>');
        Ok(text)
    }

    fn class_body(&mut self, class_name: &str, kind: ClassKind) -> Result<Vec<NodeId>, ParseError> {
        self.expect("{")?;
        let mut members = Vec::new();
        if kind == ClassKind::Enum {
            members.extend(self.enum_constants()?);
        }
        while !self.at("}") {
            if self.at_eof() {
                return Err(self.error("expected `}`"));
            }
            if self.eat(";") {
                continue;
            }
            members.extend(self.member(class_name)?);
        }
        self.expect("}")?;
        Ok(members)
    }

    fn enum_constants(&mut self) -> Result<Vec<NodeId>, ParseError> {
        let mut out = Vec::new();
        while self.at_ident() {
            let doc = self.doc_comment();
            let start = self.start();
            let name = self.ident()?;
            let args = if self.at("(") { self.args()? } else { Vec::new() };
            if self.at("{") {
                return Err(self.error("enum constant bodies are not supported"));
            }
            out.push(self.finish(NodeKind::EnumConstant { name, doc }, args, start));
            if !self.eat(",") {
                break;
            }
        }
        self.eat(";");
        Ok(out)
    }

    fn member(&mut self, class_name: &str) -> Result<Vec<NodeId>, ParseError> {
        let doc = self.doc_comment();
        let start = self.start();
        let modifiers = self.modifiers()?;
        if self.at("{") {
            let body = self.block()?;
            let kind = NodeKind::Initializer {
                is_static: modifiers.is_static,
            };
            return Ok(vec![self.finish(kind, vec![body], start)]);
        }
        if self.at("class") || self.at("interface") || self.at("enum") {
            return Ok(vec![self.class_declaration(doc, modifiers, start)?]);
        }
        let type_params = if self.at("<") {
            Some(self.type_params()?)
        } else {
            None
        };
        if self.at_ident() && self.peek().text == class_name && self.nth_at(1, "(") {
            let name = self.ident()?;
            let data = MethodData {
                name,
                return_ty: None,
                modifiers,
                type_params,
                throws: Vec::new(),
                doc,
            };
            return Ok(vec![self.method_rest(data, start, true)?]);
        }
        let ty = self.ty()?;
        let name = self.ident()?;
        if self.at("(") {
            let data = MethodData {
                name,
                return_ty: Some(ty),
                modifiers,
                type_params,
                throws: Vec::new(),
                doc,
            };
            return Ok(vec![self.method_rest(data, start, false)?]);
        }

        let mut fields = Vec::new();
        let mut name = name;
        let mut doc = doc;
        loop {
            let mut var_ty = ty.clone();
            while self.at("[") && self.nth_at(1, "]") {
                self.bump();
                self.bump();
                var_ty.push_str("[]");
            }
            let init = if self.eat("=") {
                vec![self.var_initializer()?]
            } else {
                Vec::new()
            };
            let data = VarData {
                name,
                ty: var_ty,
                modifiers: modifiers.clone(),
                varargs: false,
                doc: doc.take(),
            };
            fields.push(self.finish(NodeKind::Field(data), init, start));
            if self.eat(",") {
                name = self.ident()?;
                continue;
            }
            break;
        }
        self.expect(";")?;
        Ok(fields)
    }

    fn method_rest(
        &mut self,
        mut data: MethodData,
        start: TextSize,
        is_constructor: bool,
    ) -> Result<NodeId, ParseError> {
        let mut children = self.params()?;
        if let Some(ty) = data.return_ty.as_mut() {
            while self.at("[") && self.nth_at(1, "]") {
                self.bump();
                self.bump();
                ty.push_str("[]");
            }
        }
        if self.eat("throws") {
            data.throws = self.type_list()?;
        }
        if self.at("{") {
            children.push(self.block()?);
        } else {
            self.expect(";")?;
        }
        let kind = if is_constructor {
            NodeKind::Constructor(data)
        } else {
            NodeKind::Method(data)
        };
        Ok(self.finish(kind, children, start))
    }

    fn params(&mut self) -> Result<Vec<NodeId>, ParseError> {
        self.expect("(")?;
        let mut params = Vec::new();
        if !self.at(")") {
            loop {
                let start = self.start();
                let modifiers = self.modifiers()?;
                let ty = self.ty()?;
                let varargs = self.eat("...");
                let name = self.ident()?;
                let data = VarData {
                    name,
                    ty,
                    modifiers,
                    varargs,
                    doc: None,
                };
                params.push(self.finish(NodeKind::Param(data), Vec::new(), start));
                if !self.eat(",") {
                    break;
                }
            }
        }
        self.expect(")")?;
        Ok(params)
    }

    // ---------------------------------------------------------------------
    // Types

    fn at_type_start(&self) -> bool {
        let tok = self.peek();
        tok.kind == TokenKind::Ident && (is_primitive_type(&tok.text) || is_ident(tok))
    }

    fn ty(&mut self) -> Result<String, ParseError> {
        let mut text = self.base_ty()?;
        while self.at("[") && self.nth_at(1, "]") {
            self.bump();
            self.bump();
            text.push_str("[]");
        }
        Ok(text)
    }

    /// A type without trailing array dimensions.
    fn base_ty(&mut self) -> Result<String, ParseError> {
        if !self.at_type_start() {
            return Err(self.error("expected type"));
        }
        let first = self.bump().text;
        let mut text = first.clone();
        if is_primitive_type(&first) {
            return Ok(text);
        }
        self.type_args_into(&mut text)?;
        while self.at(".") && is_ident(self.nth(1)) {
            self.bump();
            text.push('.');
            text.push_str(&self.bump().text);
            self.type_args_into(&mut text)?;
        }
        Ok(text)
    }

    fn type_args_into(&mut self, text: &mut String) -> Result<(), ParseError> {
        if !self.at("<") {
            return Ok(());
        }
        self.bump();
        text.push('<');
        if self.eat(">") {
            text.push('>');
            return Ok(());
        }
        loop {
            if self.eat("?") {
                text.push('?');
                if self.eat("extends") {
                    text.push_str(" extends ");
                    text.push_str(&self.ty()?);
                } else if self.eat("super") {
                    text.push_str(" super ");
                    text.push_str(&self.ty()?);
                }
            } else {
                text.push_str(&self.ty()?);
            }
            if self.eat(",") {
                text.push_str(", ");
                continue;
            }
            break;
        }
        self.expect(">")?;
        text.push('>');
        Ok(())
    }

    fn try_ty(&mut self) -> Option<String> {
        let saved = self.pos;
        match self.ty() {
            Ok(ty) => Some(ty),
            Err(_) => {
                self.pos = saved;
                None
            }
        }
    }

    // ---------------------------------------------------------------------
    // Statements

    fn block(&mut self) -> Result<NodeId, ParseError> {
        let start = self.start();
        self.expect("{")?;
        let mut stmts = Vec::new();
        loop {
            self.comments_into(&mut stmts);
            if self.at("}") {
                break;
            }
            if self.at_eof() {
                return Err(self.error("expected `}`"));
            }
            stmts.extend(self.block_statement()?);
        }
        self.expect("}")?;
        Ok(self.finish(NodeKind::Block, stmts, start))
    }

    fn block_statement(&mut self) -> Result<Vec<NodeId>, ParseError> {
        if self.at("class") || (self.at("final") && self.nth_at(1, "class")) {
            return Err(self.error("local classes are not supported"));
        }
        if self.at_local_var_decl() {
            let start = self.start();
            let modifiers = self.modifiers()?;
            let ty = self.ty()?;
            let name = self.ident()?;
            let vars = self.local_var_rest(start, modifiers, ty, name)?;
            self.expect(";")?;
            return Ok(vars);
        }
        Ok(vec![self.statement()?])
    }

    fn at_local_var_decl(&mut self) -> bool {
        if self.at("final") || self.at("@") {
            return true;
        }
        if !self.at_type_start() {
            return false;
        }
        let saved = self.pos;
        let result = self.try_ty().is_some()
            && self.at_ident()
            && ["=", ";", ",", "[", ":"]
                .iter()
                .any(|t| self.nth_at(1, t));
        self.pos = saved;
        result
    }

    fn local_var_rest(
        &mut self,
        start: TextSize,
        modifiers: Modifiers,
        ty: String,
        first: String,
    ) -> Result<Vec<NodeId>, ParseError> {
        let mut vars = Vec::new();
        let mut name = first;
        loop {
            let mut var_ty = ty.clone();
            while self.at("[") && self.nth_at(1, "]") {
                self.bump();
                self.bump();
                var_ty.push_str("[]");
            }
            let init = if self.eat("=") {
                vec![self.var_initializer()?]
            } else {
                Vec::new()
            };
            let data = VarData {
                name,
                ty: var_ty,
                modifiers: modifiers.clone(),
                varargs: false,
                doc: None,
            };
            vars.push(self.finish(NodeKind::LocalVar(data), init, start));
            if self.eat(",") {
                name = self.ident()?;
                continue;
            }
            return Ok(vars);
        }
    }

    fn var_initializer(&mut self) -> Result<NodeId, ParseError> {
        if self.at("{") {
            self.array_init()
        } else {
            self.expr()
        }
    }

    fn statement(&mut self) -> Result<NodeId, ParseError> {
        let start = self.start();
        let keyword = match self.peek().kind {
            TokenKind::Ident | TokenKind::Punct => self.peek().text.clone(),
            _ => String::new(),
        };
        match keyword.as_str() {
            "{" => self.block(),
            ";" => {
                self.bump();
                Ok(self.finish(NodeKind::Empty, Vec::new(), start))
            }
            "if" => {
                self.bump();
                let cond = self.paren_condition()?;
                let then = self.statement()?;
                let mut children = vec![cond, then];
                if self.eat("else") {
                    children.push(self.statement()?);
                }
                Ok(self.finish(NodeKind::If, children, start))
            }
            "while" => {
                self.bump();
                let cond = self.paren_condition()?;
                let body = self.statement()?;
                Ok(self.finish(NodeKind::While, vec![cond, body], start))
            }
            "do" => {
                self.bump();
                let body = self.statement()?;
                self.expect("while")?;
                let cond = self.paren_condition()?;
                self.expect(";")?;
                Ok(self.finish(NodeKind::DoWhile, vec![body, cond], start))
            }
            "for" => self.for_statement(start),
            "return" => {
                self.bump();
                let mut children = Vec::new();
                if !self.at(";") {
                    children.push(self.expr()?);
                }
                self.expect(";")?;
                Ok(self.finish(NodeKind::Return, children, start))
            }
            "throw" => {
                self.bump();
                let expr = self.expr()?;
                self.expect(";")?;
                Ok(self.finish(NodeKind::Throw, vec![expr], start))
            }
            "break" | "continue" => {
                self.bump();
                let label = if self.at_ident() {
                    Some(self.ident()?)
                } else {
                    None
                };
                self.expect(";")?;
                let kind = if keyword == "break" {
                    NodeKind::Break { label }
                } else {
                    NodeKind::Continue { label }
                };
                Ok(self.finish(kind, Vec::new(), start))
            }
            "synchronized" => {
                self.bump();
                let lock = self.paren_condition()?;
                let body = self.block()?;
                Ok(self.finish(NodeKind::Synchronized, vec![lock, body], start))
            }
            "try" => self.try_statement(start),
            "switch" | "assert" => Err(self.error("statement is not supported")),
            _ if self.at_ident() && self.nth_at(1, ":") => {
                let label = self.ident()?;
                self.bump();
                let body = self.statement()?;
                Ok(self.finish(NodeKind::Labeled { label }, vec![body], start))
            }
            "this" | "super" if self.nth_at(1, "(") => {
                let is_super = self.bump().text == "super";
                let args = self.args()?;
                let call = self.finish(NodeKind::CtorCall { is_super }, args, start);
                self.expect(";")?;
                Ok(self.finish(NodeKind::ExprStmt, vec![call], start))
            }
            _ => {
                let expr = self.expr()?;
                self.expect(";")?;
                Ok(self.finish(NodeKind::ExprStmt, vec![expr], start))
            }
        }
    }

    fn paren_condition(&mut self) -> Result<NodeId, ParseError> {
        self.expect("(")?;
        let expr = self.expr()?;
        self.expect(")")?;
        Ok(expr)
    }

    fn for_statement(&mut self, start: TextSize) -> Result<NodeId, ParseError> {
        self.bump();
        self.expect("(")?;
        let init_start = self.start();
        let mut inits = Vec::new();
        if self.at_local_var_decl() {
            let decl_start = self.start();
            let modifiers = self.modifiers()?;
            let ty = self.ty()?;
            let name = self.ident()?;
            if self.eat(":") {
                let iterable = self.expr()?;
                self.expect(")")?;
                let body = self.statement()?;
                let data = VarData {
                    name,
                    ty,
                    modifiers,
                    varargs: false,
                    doc: None,
                };
                return Ok(self.finish(NodeKind::ForEach(data), vec![iterable, body], start));
            }
            inits = self.local_var_rest(decl_start, modifiers, ty, name)?;
        } else if !self.at(";") {
            loop {
                let expr_start = self.start();
                let expr = self.expr()?;
                inits.push(self.finish(NodeKind::ExprStmt, vec![expr], expr_start));
                if !self.eat(",") {
                    break;
                }
            }
        }
        self.expect(";")?;
        let init = self.finish(NodeKind::ForInit, inits, init_start);

        let mut children = vec![init];
        let has_condition = !self.at(";");
        if has_condition {
            children.push(self.expr()?);
        }
        self.expect(";")?;

        let update_start = self.start();
        let mut updates = Vec::new();
        if !self.at(")") {
            loop {
                updates.push(self.expr()?);
                if !self.eat(",") {
                    break;
                }
            }
        }
        children.push(self.finish(NodeKind::ForUpdate, updates, update_start));
        self.expect(")")?;
        children.push(self.statement()?);
        Ok(self.finish(NodeKind::For { has_condition }, children, start))
    }

    fn try_statement(&mut self, start: TextSize) -> Result<NodeId, ParseError> {
        self.bump();
        if self.at("(") {
            return Err(self.error("try-with-resources is not supported"));
        }
        let mut children = vec![self.block()?];
        while self.at("catch") {
            let catch_start = self.start();
            self.bump();
            self.expect("(")?;
            let modifiers = self.modifiers()?;
            let mut ty = self.ty()?;
            while self.eat("|") {
                ty.push_str(" | ");
                ty.push_str(&self.ty()?);
            }
            let name = self.ident()?;
            self.expect(")")?;
            let body = self.block()?;
            let data = VarData {
                name,
                ty,
                modifiers,
                varargs: false,
                doc: None,
            };
            children.push(self.finish(NodeKind::Catch(data), vec![body], catch_start));
        }
        let has_finally = self.eat("finally");
        if has_finally {
            children.push(self.block()?);
        }
        if children.len() == 1 {
            return Err(self.error("expected `catch` or `finally`"));
        }
        Ok(self.finish(NodeKind::Try { has_finally }, children, start))
    }

    // ---------------------------------------------------------------------
    // Expressions

    fn expr(&mut self) -> Result<NodeId, ParseError> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<NodeId, ParseError> {
        if self.at_lambda() {
            return self.lambda();
        }
        let start = self.start();
        let lhs = self.conditional()?;
        if let Some((op, len)) = self.assign_op() {
            for _ in 0..len {
                self.bump();
            }
            let rhs = self.assignment()?;
            return Ok(self.finish(NodeKind::Assign { op }, vec![lhs, rhs], start));
        }
        Ok(lhs)
    }

    fn assign_op(&self) -> Option<(AssignOp, usize)> {
        if self.peek().kind != TokenKind::Punct {
            return None;
        }
        let op = match self.peek().text.as_str() {
            "=" => AssignOp::Assign,
            "+=" => AssignOp::Add,
            "-=" => AssignOp::Sub,
            "*=" => AssignOp::Mul,
            "/=" => AssignOp::Div,
            "%=" => AssignOp::Rem,
            "&=" => AssignOp::BitAnd,
            "|=" => AssignOp::BitOr,
            "^=" => AssignOp::BitXor,
            "<<=" => AssignOp::Shl,
            ">" if self.adjacent(0) && self.nth_at(1, ">=") => return Some((AssignOp::Shr, 2)),
            ">" if self.adjacent(0)
                && self.nth_at(1, ">")
                && self.adjacent(1)
                && self.nth_at(2, ">=") =>
            {
                return Some((AssignOp::UShr, 3))
            }
            _ => return None,
        };
        Some((op, 1))
    }

    fn at_lambda(&self) -> bool {
        if self.at_ident() && self.nth_at(1, "->") {
            return true;
        }
        if !self.at("(") {
            return false;
        }
        let mut depth = 0usize;
        let mut index = self.pos;
        while index < self.tokens.len() {
            let tok = &self.tokens[index];
            if tok.kind == TokenKind::Punct {
                match tok.text.as_str() {
                    "(" => depth += 1,
                    ")" => {
                        depth -= 1;
                        if depth == 0 {
                            return self
                                .tokens
                                .get(index + 1)
                                .is_some_and(|t| t.kind == TokenKind::Punct && t.text == "->");
                        }
                    }
                    ";" | "{" | "}" => return false,
                    _ => {}
                }
            }
            index += 1;
        }
        false
    }

    fn lambda(&mut self) -> Result<NodeId, ParseError> {
        let start = self.start();
        let mut children = Vec::new();
        let parenthesized = self.at("(");
        if parenthesized {
            self.bump();
            if !self.at(")") {
                loop {
                    let param_start = self.start();
                    let data = if self.at_ident() && (self.nth_at(1, ",") || self.nth_at(1, ")")) {
                        VarData::new(self.ident()?, "")
                    } else {
                        let modifiers = self.modifiers()?;
                        let ty = self.ty()?;
                        let varargs = self.eat("...");
                        VarData {
                            name: self.ident()?,
                            ty,
                            modifiers,
                            varargs,
                            doc: None,
                        }
                    };
                    children.push(self.finish(NodeKind::Param(data), Vec::new(), param_start));
                    if !self.eat(",") {
                        break;
                    }
                }
            }
            self.expect(")")?;
        } else {
            let param_start = self.start();
            let data = VarData::new(self.ident()?, "");
            children.push(self.finish(NodeKind::Param(data), Vec::new(), param_start));
        }
        self.expect("->")?;
        let param_count = children.len();
        let body = if self.at("{") {
            self.block()?
        } else {
            self.expr()?
        };
        children.push(body);
        let kind = NodeKind::Lambda {
            param_count,
            parenthesized,
        };
        Ok(self.finish(kind, children, start))
    }

    fn conditional(&mut self) -> Result<NodeId, ParseError> {
        let start = self.start();
        let cond = self.binary(0)?;
        if !self.eat("?") {
            return Ok(cond);
        }
        let then = self.expr()?;
        self.expect(":")?;
        let otherwise = if self.at_lambda() {
            self.lambda()?
        } else {
            self.conditional()?
        };
        Ok(self.finish(NodeKind::Conditional, vec![cond, then, otherwise], start))
    }

    fn binary(&mut self, min_prec: u8) -> Result<NodeId, ParseError> {
        let start = self.start();
        let mut lhs = self.unary()?;
        loop {
            if self.at("instanceof") {
                if min_prec > 9 {
                    break;
                }
                self.bump();
                self.eat("final");
                let ty = self.ty()?;
                let binding = if self.at_ident() {
                    Some(self.ident()?)
                } else {
                    None
                };
                lhs = self.finish(NodeKind::InstanceOf { ty, binding }, vec![lhs], start);
                continue;
            }
            let Some((op, len)) = self.binary_op() else {
                break;
            };
            let prec = op.precedence();
            if prec < min_prec {
                break;
            }
            for _ in 0..len {
                self.bump();
            }
            let rhs = self.binary(prec + 1)?;
            lhs = self.finish(NodeKind::Binary { op }, vec![lhs, rhs], start);
        }
        Ok(lhs)
    }

    fn binary_op(&self) -> Option<(BinaryOp, usize)> {
        if self.peek().kind != TokenKind::Punct {
            return None;
        }
        let op = match self.peek().text.as_str() {
            "||" => BinaryOp::Or,
            "&&" => BinaryOp::And,
            "|" => BinaryOp::BitOr,
            "^" => BinaryOp::BitXor,
            "&" => BinaryOp::BitAnd,
            "==" => BinaryOp::Eq,
            "!=" => BinaryOp::Ne,
            "<" => BinaryOp::Lt,
            "<=" => BinaryOp::Le,
            ">=" => BinaryOp::Ge,
            "<<" => BinaryOp::Shl,
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Rem,
            ">" => {
                if !self.adjacent(0) {
                    return Some((BinaryOp::Gt, 1));
                }
                if self.nth_at(1, ">=") {
                    return None;
                }
                if !self.nth_at(1, ">") {
                    return Some((BinaryOp::Gt, 1));
                }
                if self.adjacent(1) && self.nth_at(2, ">=") {
                    return None;
                }
                if self.adjacent(1) && self.nth_at(2, ">") {
                    return Some((BinaryOp::UShr, 3));
                }
                return Some((BinaryOp::Shr, 2));
            }
            _ => return None,
        };
        Some((op, 1))
    }

    fn unary(&mut self) -> Result<NodeId, ParseError> {
        let start = self.start();
        let op = if self.peek().kind == TokenKind::Punct {
            match self.peek().text.as_str() {
                "+" => Some(UnaryOp::Plus),
                "-" => Some(UnaryOp::Minus),
                "!" => Some(UnaryOp::Not),
                "~" => Some(UnaryOp::BitNot),
                "++" => Some(UnaryOp::PreInc),
                "--" => Some(UnaryOp::PreDec),
                _ => None,
            }
        } else {
            None
        };
        if let Some(op) = op {
            self.bump();
            let operand = self.unary()?;
            return Ok(self.finish(NodeKind::Unary { op }, vec![operand], start));
        }
        if self.at("(") {
            if let Some(ty) = self.try_cast() {
                let operand = self.unary()?;
                return Ok(self.finish(NodeKind::Cast { ty }, vec![operand], start));
            }
        }
        let primary = self.primary()?;
        self.postfix(primary, start)
    }

    fn try_cast(&mut self) -> Option<String> {
        let saved = self.pos;
        self.bump();
        let Some(ty) = self.try_ty() else {
            self.pos = saved;
            return None;
        };
        if !self.at(")") {
            self.pos = saved;
            return None;
        }
        self.bump();
        let next = self.peek();
        let base = ty.trim_end_matches("[]");
        let is_cast = if is_primitive_type(base) && !ty.ends_with("[]") {
            starts_unary(next)
                || (next.kind == TokenKind::Punct
                    && ["+", "-", "++", "--"].contains(&next.text.as_str()))
        } else {
            starts_unary(next)
        };
        if is_cast {
            Some(ty)
        } else {
            self.pos = saved;
            None
        }
    }

    fn primary(&mut self) -> Result<NodeId, ParseError> {
        let start = self.start();
        let tok = self.peek().clone();
        let literal = match tok.kind {
            TokenKind::IntLiteral => Some(LiteralKind::Int),
            TokenKind::LongLiteral => Some(LiteralKind::Long),
            TokenKind::FloatLiteral => Some(LiteralKind::Float),
            TokenKind::DoubleLiteral => Some(LiteralKind::Double),
            TokenKind::CharLiteral => Some(LiteralKind::Char),
            TokenKind::StringLiteral => Some(LiteralKind::String),
            TokenKind::Ident if tok.text == "true" || tok.text == "false" => {
                Some(LiteralKind::Bool)
            }
            TokenKind::Ident if tok.text == "null" => Some(LiteralKind::Null),
            _ => None,
        };
        if let Some(kind) = literal {
            self.bump();
            let node = NodeKind::Literal {
                kind,
                text: tok.text,
            };
            return Ok(self.finish(node, Vec::new(), start));
        }
        if self.at("(") {
            self.bump();
            let inner = self.expr()?;
            self.expect(")")?;
            return Ok(self.finish(NodeKind::Paren, vec![inner], start));
        }
        if tok.kind != TokenKind::Ident {
            return Err(self.error("expected expression"));
        }
        match tok.text.as_str() {
            "this" => {
                self.bump();
                Ok(self.finish(NodeKind::This { qualifier: None }, Vec::new(), start))
            }
            "super" => {
                self.bump();
                Ok(self.finish(NodeKind::Super { qualifier: None }, Vec::new(), start))
            }
            "new" => self.creator(start),
            text if is_primitive_type(text) => {
                let ty = self.ty()?;
                self.expect(".")?;
                self.expect("class")?;
                Ok(self.finish(NodeKind::ClassLiteral { ty }, Vec::new(), start))
            }
            _ if is_ident(&tok) => {
                self.bump();
                if self.at("(") {
                    let args = self.args()?;
                    let kind = NodeKind::MethodCall {
                        name: tok.text.clone(),
                        has_receiver: false,
                    };
                    Ok(self.finish(kind, args, start))
                } else {
                    let kind = NodeKind::Name {
                        ident: tok.text.clone(),
                    };
                    Ok(self.finish(kind, Vec::new(), start))
                }
            }
            _ => Err(self.error("expected expression")),
        }
    }

    fn postfix(&mut self, mut expr: NodeId, start: TextSize) -> Result<NodeId, ParseError> {
        loop {
            if self.at(".") {
                self.bump();
                if self.at("this") || self.at("class") || self.at("super") {
                    let keyword = self.bump().text;
                    let Some(qualifier) = self.name_chain(expr) else {
                        return Err(self.error(format!("invalid qualifier for `{keyword}`")));
                    };
                    let _ = self.tree.remove(expr);
                    let kind = match keyword.as_str() {
                        "this" => NodeKind::This {
                            qualifier: Some(qualifier),
                        },
                        "super" => NodeKind::Super {
                            qualifier: Some(qualifier),
                        },
                        _ => NodeKind::ClassLiteral { ty: qualifier },
                    };
                    expr = self.finish(kind, Vec::new(), start);
                    continue;
                }
                if self.at("new") || self.at("<") {
                    return Err(self.error(
                        "qualified creation and explicit type arguments are not supported",
                    ));
                }
                let name = self.ident()?;
                if self.at("(") {
                    let mut children = vec![expr];
                    children.extend(self.args()?);
                    let kind = NodeKind::MethodCall {
                        name,
                        has_receiver: true,
                    };
                    expr = self.finish(kind, children, start);
                } else {
                    expr = self.finish(NodeKind::FieldAccess { name }, vec![expr], start);
                }
            } else if self.at("[") {
                self.bump();
                let index = self.expr()?;
                self.expect("]")?;
                expr = self.finish(NodeKind::ArrayAccess, vec![expr, index], start);
            } else if self.at("++") || self.at("--") {
                let op = if self.bump().text == "++" {
                    UnaryOp::PostInc
                } else {
                    UnaryOp::PostDec
                };
                expr = self.finish(NodeKind::Unary { op }, vec![expr], start);
            } else if self.at("::") {
                self.bump();
                let name = if self.eat("new") {
                    "new".to_string()
                } else {
                    self.ident()?
                };
                expr = self.finish(NodeKind::MethodRef { name }, vec![expr], start);
            } else {
                return Ok(expr);
            }
        }
    }

    fn name_chain(&self, id: NodeId) -> Option<String> {
        match self.tree.kind(id) {
            NodeKind::Name { ident } => Some(ident.clone()),
            NodeKind::FieldAccess { name } => {
                let receiver = self.tree.child(id, 0)?;
                Some(format!("{}.{}", self.name_chain(receiver)?, name))
            }
            _ => None,
        }
    }

    fn creator(&mut self, start: TextSize) -> Result<NodeId, ParseError> {
        self.expect("new")?;
        let ty = self.base_ty()?;
        if self.at("[") {
            let mut dims = 0;
            let mut children = Vec::new();
            while self.at("[") {
                self.bump();
                if !self.eat("]") {
                    children.push(self.expr()?);
                    self.expect("]")?;
                }
                dims += 1;
            }
            let has_init = self.at("{");
            if has_init {
                children.push(self.array_init()?);
            }
            let kind = NodeKind::NewArray { ty, dims, has_init };
            return Ok(self.finish(kind, children, start));
        }
        let mut children = self.args()?;
        let has_body = self.at("{");
        if has_body {
            let body_start = self.start();
            let members = self.class_body("", ClassKind::Class)?;
            children.push(self.finish(NodeKind::AnonymousClass, members, body_start));
        }
        Ok(self.finish(NodeKind::New { ty, has_body }, children, start))
    }

    fn args(&mut self) -> Result<Vec<NodeId>, ParseError> {
        self.expect("(")?;
        let mut args = Vec::new();
        if !self.at(")") {
            loop {
                args.push(self.expr()?);
                if !self.eat(",") {
                    break;
                }
            }
        }
        self.expect(")")?;
        Ok(args)
    }

    fn array_init(&mut self) -> Result<NodeId, ParseError> {
        let start = self.start();
        self.expect("{")?;
        let mut elems = Vec::new();
        while !self.at("}") {
            elems.push(self.var_initializer()?);
            if !self.eat(",") {
                break;
            }
        }
        self.expect("}")?;
        Ok(self.finish(NodeKind::ArrayInit, elems, start))
    }
}

fn is_ident(tok: &Token) -> bool {
    tok.kind == TokenKind::Ident && !RESERVED.contains(&tok.text.as_str())
}

fn starts_unary(tok: &Token) -> bool {
    match tok.kind {
        TokenKind::Ident => {
            is_ident(tok)
                || ["this", "super", "new", "true", "false", "null"].contains(&tok.text.as_str())
        }
        TokenKind::Punct => ["(", "!", "~"].contains(&tok.text.as_str()),
        TokenKind::Eof
        | TokenKind::LineComment
        | TokenKind::BlockComment
        | TokenKind::DocComment => false,
        _ => true,
    }
}
