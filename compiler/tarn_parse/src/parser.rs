//! Recursive descent parser.
//!
//! Turns the token list of one file into a [`SyntaxTree`]. Expressions use
//! precedence climbing driven by [`BinaryOp::precedence`]. No validation
//! beyond syntax happens here; see `ast_builder` for the structural checks.

use tarn_ir::{
    ensure_sufficient_stack, BinaryOp, ImportSpec, LineIndex, Name, NodeArena, NodeId, NodeKind,
    Param, Span, StringInterner, SyntaxTree, TypeExpr, UnaryOp,
};

use crate::lexer::{lex, unescape, Token, TokenKind};
use crate::ParseError;

/// Parse one source file.
#[tracing::instrument(level = "debug", skip(text, interner))]
pub fn parse(
    text: &str,
    file_name: &str,
    interner: &StringInterner,
) -> Result<SyntaxTree, ParseError> {
    let line_index = LineIndex::new(text);
    let tokens = lex(text, file_name, &line_index)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        source: text,
        file_name,
        interner,
        lines: &line_index,
        arena: NodeArena::new(),
    };
    let (package, imports, decls) = parser.parse_file()?;
    let arena = parser.arena;
    tracing::debug!(
        file = file_name,
        nodes = arena.len(),
        decls = decls.len(),
        "parsed"
    );
    Ok(SyntaxTree {
        file_name: file_name.to_string(),
        package,
        imports,
        decls,
        arena,
        line_index,
    })
}

type FileParts = (Option<(Name, Span)>, Vec<ImportSpec>, Vec<NodeId>);

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    source: &'a str,
    file_name: &'a str,
    interner: &'a StringInterner,
    lines: &'a LineIndex,
    arena: NodeArena,
}

impl<'a> Parser<'a> {
    // === Cursor ===

    #[inline]
    fn current(&self) -> Token {
        // The list always ends with Eof and the cursor never moves past it.
        self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    #[inline]
    fn current_kind(&self) -> TokenKind {
        self.current().kind
    }

    fn peek_kind(&self, offset: usize) -> TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map_or(TokenKind::Eof, |t| t.kind)
    }

    #[inline]
    fn check(&self, kind: TokenKind) -> bool {
        self.current_kind() == kind
    }

    fn advance(&mut self) -> Token {
        let token = self.current();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn previous_span(&self) -> Span {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map_or(Span::DUMMY, |t| t.span)
    }

    fn text(&self, span: Span) -> &'a str {
        self.source
            .get(span.start as usize..span.end as usize)
            .unwrap_or("")
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(kind.describe()))
        }
    }

    fn expect_ident(&mut self) -> Result<(Name, Span), ParseError> {
        let token = self.expect(TokenKind::Ident)?;
        Ok((self.interner.intern(self.text(token.span)), token.span))
    }

    /// A statement or declaration ends at `;`, or right before a closer.
    fn expect_terminator(&mut self, closer: TokenKind) -> Result<(), ParseError> {
        if self.eat(TokenKind::Semi) || self.check(closer) {
            Ok(())
        } else {
            Err(self.unexpected(TokenKind::Semi.describe()))
        }
    }

    // === Errors ===

    #[cold]
    fn unexpected(&self, expected: &str) -> ParseError {
        let token = self.current();
        let found = match token.kind {
            TokenKind::Ident | TokenKind::Int => format!("{:?}", self.text(token.span)),
            TokenKind::Semi if token.span.is_empty() => "newline".to_string(),
            other => other.describe().to_string(),
        };
        ParseError::expected(
            self.file_name,
            self.lines.span_start(token.span),
            expected,
            &found,
        )
    }

    #[cold]
    fn error_at(&self, span: Span, message: impl Into<String>) -> ParseError {
        ParseError::new(self.file_name, self.lines.span_start(span), message)
    }

    fn alloc(&mut self, kind: NodeKind, start: Span) -> NodeId {
        let span = start.merge(self.previous_span());
        self.arena.alloc(kind, span)
    }

    // === File level ===

    fn parse_file(&mut self) -> Result<FileParts, ParseError> {
        let package = if self.eat(TokenKind::Package) {
            let clause = self.expect_ident()?;
            self.expect_terminator(TokenKind::Eof)?;
            Some(clause)
        } else {
            None
        };

        let mut imports = Vec::new();
        while self.check(TokenKind::Import) {
            self.parse_import(&mut imports)?;
            self.expect_terminator(TokenKind::Eof)?;
        }

        let mut decls = Vec::new();
        while !self.check(TokenKind::Eof) {
            if self.eat(TokenKind::Semi) {
                continue;
            }
            self.parse_top_decl(&mut decls)?;
            self.expect_terminator(TokenKind::Eof)?;
        }

        Ok((package, imports, decls))
    }

    fn parse_import(&mut self, out: &mut Vec<ImportSpec>) -> Result<(), ParseError> {
        self.expect(TokenKind::Import)?;
        if self.eat(TokenKind::LParen) {
            while !self.eat(TokenKind::RParen) {
                if self.eat(TokenKind::Semi) {
                    continue;
                }
                out.push(self.parse_import_spec()?);
                self.expect_terminator(TokenKind::RParen)?;
            }
        } else {
            out.push(self.parse_import_spec()?);
        }
        Ok(())
    }

    fn parse_import_spec(&mut self) -> Result<ImportSpec, ParseError> {
        let start = self.current().span;
        let alias = if self.check(TokenKind::Ident) {
            Some(self.expect_ident()?.0)
        } else {
            None
        };
        let path = self.parse_string_literal("import path")?;
        if path.is_empty() {
            return Err(self.error_at(start, "import path is empty"));
        }
        Ok(ImportSpec {
            alias,
            path,
            span: start.merge(self.previous_span()),
        })
    }

    fn parse_string_literal(&mut self, what: &str) -> Result<String, ParseError> {
        let token = self.current();
        match token.kind {
            TokenKind::Str => {
                self.advance();
                unescape(self.text(token.span)).map_err(|msg| self.error_at(token.span, msg))
            }
            TokenKind::RawStr => {
                self.advance();
                let raw = self.text(token.span);
                Ok(raw[1..raw.len() - 1].to_string())
            }
            _ => Err(self.unexpected(what)),
        }
    }

    fn parse_top_decl(&mut self, out: &mut Vec<NodeId>) -> Result<(), ParseError> {
        match self.current_kind() {
            TokenKind::Var | TokenKind::Const => {
                let constant = self.advance().kind == TokenKind::Const;
                if self.eat(TokenKind::LParen) {
                    while !self.eat(TokenKind::RParen) {
                        if self.eat(TokenKind::Semi) {
                            continue;
                        }
                        out.push(self.parse_value_spec(constant)?);
                        self.expect_terminator(TokenKind::RParen)?;
                    }
                } else {
                    out.push(self.parse_value_spec(constant)?);
                }
                Ok(())
            }
            TokenKind::Type => {
                let start = self.advance().span;
                let (name, _) = self.expect_ident()?;
                let underlying = self.parse_type()?;
                out.push(self.alloc(NodeKind::TypeDecl { name, underlying }, start));
                Ok(())
            }
            TokenKind::Func => {
                out.push(self.parse_func()?);
                Ok(())
            }
            _ => Err(self.unexpected("declaration")),
        }
    }

    /// `name [type] [= expr]` at package level.
    fn parse_value_spec(&mut self, constant: bool) -> Result<NodeId, ParseError> {
        let (name, start) = self.expect_ident()?;
        let ty = if self.check(TokenKind::Ident) {
            Some(self.parse_type()?)
        } else {
            None
        };
        let value = if self.eat(TokenKind::Assign) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        if ty.is_none() && value.is_none() {
            return Err(self.unexpected("type or '='"));
        }
        Ok(self.alloc(
            NodeKind::Var {
                name,
                ty,
                value,
                constant,
            },
            start,
        ))
    }

    fn parse_type(&mut self) -> Result<TypeExpr, ParseError> {
        let (first, start) = self.expect_ident()?;
        if self.eat(TokenKind::Dot) {
            let (name, end) = self.expect_ident()?;
            Ok(TypeExpr {
                package: Some(first),
                name,
                span: start.merge(end),
            })
        } else {
            Ok(TypeExpr {
                package: None,
                name: first,
                span: start,
            })
        }
    }

    fn parse_func(&mut self) -> Result<NodeId, ParseError> {
        let start = self.expect(TokenKind::Func)?.span;
        let (name, _) = self.expect_ident()?;
        self.expect(TokenKind::LParen)?;
        let params = self.parse_params()?;
        self.expect(TokenKind::RParen)?;
        let result = if self.check(TokenKind::Ident) {
            Some(self.parse_type()?)
        } else {
            None
        };
        let body = self.parse_block()?;
        Ok(self.alloc(
            NodeKind::Func {
                name,
                params,
                result,
                body,
            },
            start,
        ))
    }

    /// `a, b int, c string`: names share the type that follows them.
    fn parse_params(&mut self) -> Result<Vec<Param>, ParseError> {
        let mut params = Vec::new();
        let mut pending: Vec<(Name, Span)> = Vec::new();
        while self.check(TokenKind::Ident) {
            pending.push(self.expect_ident()?);
            if self.eat(TokenKind::Comma) {
                continue;
            }
            let ty = self.parse_type()?;
            params.extend(pending.drain(..).map(|(name, span)| Param { name, ty, span }));
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        if !pending.is_empty() {
            return Err(self.unexpected("parameter type"));
        }
        Ok(params)
    }

    // === Statements ===

    fn parse_block(&mut self) -> Result<NodeId, ParseError> {
        let start = self.expect(TokenKind::LBrace)?.span;
        let mut stmts = Vec::new();
        while !self.check(TokenKind::RBrace) {
            if self.check(TokenKind::Eof) {
                return Err(self.unexpected(TokenKind::RBrace.describe()));
            }
            if self.eat(TokenKind::Semi) {
                continue;
            }
            stmts.push(self.parse_stmt()?);
            self.expect_terminator(TokenKind::RBrace)?;
        }
        self.advance();
        Ok(self.alloc(NodeKind::Block(stmts), start))
    }

    fn parse_stmt(&mut self) -> Result<NodeId, ParseError> {
        ensure_sufficient_stack(|| self.parse_stmt_inner())
    }

    fn parse_stmt_inner(&mut self) -> Result<NodeId, ParseError> {
        let start = self.current().span;
        match self.current_kind() {
            TokenKind::Var => {
                self.advance();
                let (name, _) = self.expect_ident()?;
                let ty = if self.check(TokenKind::Ident) {
                    Some(self.parse_type()?)
                } else {
                    None
                };
                let value = if self.eat(TokenKind::Assign) {
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                if ty.is_none() && value.is_none() {
                    return Err(self.unexpected("type or '='"));
                }
                Ok(self.alloc(NodeKind::LocalVar { name, ty, value }, start))
            }
            TokenKind::If => self.parse_if(),
            TokenKind::For => self.parse_for(),
            TokenKind::Return => {
                self.advance();
                let value = if self.check(TokenKind::Semi) || self.check(TokenKind::RBrace) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                Ok(self.alloc(NodeKind::Return(value), start))
            }
            TokenKind::Break => {
                self.advance();
                Ok(self.alloc(NodeKind::Break, start))
            }
            TokenKind::Continue => {
                self.advance();
                Ok(self.alloc(NodeKind::Continue, start))
            }
            TokenKind::LBrace => self.parse_block(),
            _ => self.parse_simple_stmt(),
        }
    }

    /// Short variable declaration, assignment, inc/dec or expression.
    fn parse_simple_stmt(&mut self) -> Result<NodeId, ParseError> {
        let start = self.current().span;
        if self.check(TokenKind::Ident) && self.peek_kind(1) == TokenKind::Define {
            let (name, _) = self.expect_ident()?;
            self.advance();
            let value = self.parse_expr()?;
            return Ok(self.alloc(
                NodeKind::LocalVar {
                    name,
                    ty: None,
                    value: Some(value),
                },
                start,
            ));
        }

        let target = self.parse_expr()?;
        let op = match self.current_kind() {
            TokenKind::Assign => None,
            TokenKind::PlusAssign => Some(BinaryOp::Add),
            TokenKind::MinusAssign => Some(BinaryOp::Sub),
            TokenKind::StarAssign => Some(BinaryOp::Mul),
            TokenKind::SlashAssign => Some(BinaryOp::Div),
            TokenKind::PercentAssign => Some(BinaryOp::Rem),
            TokenKind::Inc | TokenKind::Dec => {
                let token = self.advance();
                let op = if token.kind == TokenKind::Inc {
                    BinaryOp::Add
                } else {
                    BinaryOp::Sub
                };
                let one = self.arena.alloc(NodeKind::Int(1), token.span);
                return Ok(self.alloc(
                    NodeKind::Assign {
                        target,
                        op: Some(op),
                        value: one,
                    },
                    start,
                ));
            }
            _ => return Ok(self.alloc(NodeKind::ExprStmt(target), start)),
        };
        self.advance();
        let value = self.parse_expr()?;
        Ok(self.alloc(NodeKind::Assign { target, op, value }, start))
    }

    /// Unwrap an expression statement used as a condition.
    fn as_condition(&self, stmt: NodeId) -> Result<NodeId, ParseError> {
        match self.arena.kind(stmt) {
            NodeKind::ExprStmt(expr) => Ok(*expr),
            _ => Err(self.error_at(
                self.arena.span(stmt),
                "expected boolean expression, found statement",
            )),
        }
    }

    fn parse_if(&mut self) -> Result<NodeId, ParseError> {
        let start = self.expect(TokenKind::If)?.span;
        let first = self.parse_simple_stmt()?;
        let (init, cond) = if self.eat(TokenKind::Semi) {
            (Some(first), self.parse_expr()?)
        } else {
            (None, self.as_condition(first)?)
        };
        let then_branch = self.parse_block()?;
        let else_branch = if self.eat(TokenKind::Else) {
            if self.check(TokenKind::If) {
                Some(self.parse_if()?)
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };
        Ok(self.alloc(
            NodeKind::If {
                init,
                cond,
                then_branch,
                else_branch,
            },
            start,
        ))
    }

    fn parse_for(&mut self) -> Result<NodeId, ParseError> {
        let start = self.expect(TokenKind::For)?.span;
        let (init, cond, post) = if self.check(TokenKind::LBrace) {
            (None, None, None)
        } else {
            let first = if self.check(TokenKind::Semi) {
                None
            } else {
                Some(self.parse_simple_stmt()?)
            };
            if self.eat(TokenKind::Semi) {
                let cond = if self.check(TokenKind::Semi) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(TokenKind::Semi)?;
                let post = if self.check(TokenKind::LBrace) {
                    None
                } else {
                    Some(self.parse_simple_stmt()?)
                };
                (first, cond, post)
            } else {
                let Some(first) = first else {
                    return Err(self.unexpected("loop condition"));
                };
                (None, Some(self.as_condition(first)?), None)
            }
        };
        let body = self.parse_block()?;
        Ok(self.alloc(
            NodeKind::For {
                init,
                cond,
                post,
                body,
            },
            start,
        ))
    }

    // === Expressions ===

    fn parse_expr(&mut self) -> Result<NodeId, ParseError> {
        ensure_sufficient_stack(|| self.parse_binary(1))
    }

    fn binary_op(&self) -> Option<BinaryOp> {
        let op = match self.current_kind() {
            TokenKind::Star => BinaryOp::Mul,
            TokenKind::Slash => BinaryOp::Div,
            TokenKind::Percent => BinaryOp::Rem,
            TokenKind::Plus => BinaryOp::Add,
            TokenKind::Minus => BinaryOp::Sub,
            TokenKind::EqEq => BinaryOp::Eq,
            TokenKind::NotEq => BinaryOp::NotEq,
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::LtEq => BinaryOp::LtEq,
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::GtEq => BinaryOp::GtEq,
            TokenKind::AndAnd => BinaryOp::And,
            TokenKind::OrOr => BinaryOp::Or,
            _ => return None,
        };
        Some(op)
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<NodeId, ParseError> {
        let start = self.current().span;
        let mut lhs = self.parse_unary()?;
        while let Some(op) = self.binary_op() {
            let prec = op.precedence();
            if prec < min_prec {
                break;
            }
            self.advance();
            let rhs = ensure_sufficient_stack(|| self.parse_binary(prec + 1))?;
            lhs = self.alloc(NodeKind::Binary { op, lhs, rhs }, start);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<NodeId, ParseError> {
        let start = self.current().span;
        let op = match self.current_kind() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Bang => UnaryOp::Not,
            _ => return self.parse_postfix(),
        };
        self.advance();
        let operand = ensure_sufficient_stack(|| self.parse_unary())?;
        Ok(self.alloc(NodeKind::Unary { op, operand }, start))
    }

    fn parse_postfix(&mut self) -> Result<NodeId, ParseError> {
        let start = self.current().span;
        let mut expr = self.parse_primary()?;
        while self.eat(TokenKind::LParen) {
            let mut args = Vec::new();
            while !self.check(TokenKind::RParen) {
                args.push(self.parse_expr()?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RParen)?;
            expr = self.alloc(NodeKind::Call { callee: expr, args }, start);
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<NodeId, ParseError> {
        let token = self.current();
        let start = token.span;
        match token.kind {
            TokenKind::Int => {
                self.advance();
                let value: i64 = self
                    .text(token.span)
                    .parse()
                    .map_err(|_| self.error_at(token.span, "integer literal out of range"))?;
                Ok(self.alloc(NodeKind::Int(value), start))
            }
            TokenKind::Str | TokenKind::RawStr => {
                let value = self.parse_string_literal("string literal")?;
                Ok(self.alloc(NodeKind::Str(value), start))
            }
            TokenKind::True | TokenKind::False => {
                self.advance();
                Ok(self.alloc(NodeKind::Bool(token.kind == TokenKind::True), start))
            }
            TokenKind::Ident => {
                let (name, _) = self.expect_ident()?;
                if self.eat(TokenKind::Dot) {
                    let (member, _) = self.expect_ident()?;
                    Ok(self.alloc(NodeKind::Selector { base: name, member }, start))
                } else {
                    Ok(self.alloc(NodeKind::Ident(name), start))
                }
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            _ => Err(self.unexpected("expression")),
        }
    }
}
