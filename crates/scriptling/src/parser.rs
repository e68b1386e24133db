//! Recursive-descent parser: token stream to AST with error recovery.
//!
//! On a statement-level error the parser records a diagnostic, skips to the
//! next `NEWLINE`/`DEDENT`, and resumes, so one bad line does not hide the
//! rest of the file from the linter.

use std::rc::Rc;

use crate::{
    ast::{
        BinOp, BoolOp, CallArg, CmpOp, CompClause, ExceptHandler, Expr, ExprKind, FStringPart,
        FuncDef, Index, Module, ParamSpec, Stmt, StmtKind, UnaryOp,
    },
    lexer::{decode_escapes, tokenize},
    token::{Token, TokenKind},
};

/// A parse diagnostic with a 1-indexed source position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub line: u32,
    pub column: u32,
    pub message: String,
}

/// Parses `source` into a module plus any errors encountered.
///
/// The module contains every statement that parsed cleanly; callers that
/// require a fully valid program must check that the error list is empty.
pub fn parse(source: &str) -> (Module, Vec<ParseError>) {
    let tokens = tokenize(source);
    let mut parser = Parser::new(tokens);
    let module = parser.parse_module();
    (module, parser.errors)
}

/// Internal sentinel: the error itself has already been recorded.
type PResult<T> = Result<T, ()>;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<ParseError>,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            errors: Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Token helpers
    // ------------------------------------------------------------------

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or_else(|| {
            self.tokens.last().expect("token stream always ends with Eof")
        })
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn peek_kind_at(&self, offset: usize) -> TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map_or(TokenKind::Eof, |t| t.kind)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn accept(&mut self, kind: TokenKind) -> bool {
        if self.peek_kind() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> PResult<Token> {
        if self.peek_kind() == kind {
            Ok(self.advance())
        } else {
            self.error_here(format!("expected {what}, found '{}'", describe(self.peek())));
            Err(())
        }
    }

    fn error_here(&mut self, message: String) {
        let token = self.peek().clone();
        self.errors.push(ParseError {
            line: token.line,
            column: token.column,
            message,
        });
    }

    fn error_at(&mut self, line: u32, column: u32, message: String) {
        self.errors.push(ParseError { line, column, message });
    }

    /// Skips to the start of the next statement after an error.
    fn synchronize(&mut self) {
        loop {
            match self.peek_kind() {
                TokenKind::Newline => {
                    self.advance();
                    return;
                }
                TokenKind::Dedent | TokenKind::Eof => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn parse_module(&mut self) -> Module {
        let mut body = Vec::new();
        loop {
            match self.peek_kind() {
                TokenKind::Eof => break,
                TokenKind::Newline => {
                    self.advance();
                }
                TokenKind::Indent => {
                    self.error_here("unexpected indent".to_string());
                    self.advance();
                    self.synchronize();
                }
                TokenKind::Dedent => {
                    self.advance();
                }
                _ => match self.parse_statement() {
                    Ok(stmts) => body.extend(stmts),
                    Err(()) => self.synchronize(),
                },
            }
        }
        Module { body }
    }

    /// Parses one statement. Simple-statement lines may hold several
    /// `;`-separated statements, hence the `Vec`.
    fn parse_statement(&mut self) -> PResult<Vec<Stmt>> {
        match self.peek_kind() {
            TokenKind::If => Ok(vec![self.parse_if()?]),
            TokenKind::While => Ok(vec![self.parse_while()?]),
            TokenKind::For => Ok(vec![self.parse_for()?]),
            TokenKind::Try => Ok(vec![self.parse_try()?]),
            TokenKind::With => Ok(vec![self.parse_with()?]),
            TokenKind::Def => Ok(vec![self.parse_funcdef(Vec::new())?]),
            TokenKind::Class => Ok(vec![self.parse_classdef(Vec::new())?]),
            TokenKind::At => self.parse_decorated().map(|s| vec![s]),
            _ => self.parse_simple_line(),
        }
    }

    fn parse_simple_line(&mut self) -> PResult<Vec<Stmt>> {
        let mut stmts = vec![self.parse_simple_stmt()?];
        while self.accept(TokenKind::Semicolon) {
            if matches!(self.peek_kind(), TokenKind::Newline | TokenKind::Eof) {
                break;
            }
            stmts.push(self.parse_simple_stmt()?);
        }
        match self.peek_kind() {
            TokenKind::Newline => {
                self.advance();
            }
            TokenKind::Eof | TokenKind::Dedent => {}
            _ => {
                self.error_here(format!(
                    "expected end of statement, found '{}'",
                    describe(self.peek())
                ));
                return Err(());
            }
        }
        Ok(stmts)
    }

    fn parse_simple_stmt(&mut self) -> PResult<Stmt> {
        let line = self.peek().line;
        let node = match self.peek_kind() {
            TokenKind::Pass => {
                self.advance();
                StmtKind::Pass
            }
            TokenKind::Break => {
                self.advance();
                StmtKind::Break
            }
            TokenKind::Continue => {
                self.advance();
                StmtKind::Continue
            }
            TokenKind::Return => {
                self.advance();
                let value = if starts_expr(self.peek_kind()) {
                    Some(self.parse_testlist()?)
                } else {
                    None
                };
                StmtKind::Return(value)
            }
            TokenKind::Raise => {
                self.advance();
                let (exc, cause) = if starts_expr(self.peek_kind()) {
                    let exc = self.parse_test()?;
                    let cause = if self.accept(TokenKind::From) {
                        Some(self.parse_test()?)
                    } else {
                        None
                    };
                    (Some(exc), cause)
                } else {
                    (None, None)
                };
                StmtKind::Raise { exc, cause }
            }
            TokenKind::Global => {
                self.advance();
                StmtKind::Global(self.parse_name_list()?)
            }
            TokenKind::Nonlocal => {
                self.advance();
                StmtKind::Nonlocal(self.parse_name_list()?)
            }
            TokenKind::Import => {
                self.advance();
                let module = self.parse_dotted_name()?;
                let alias = if self.accept(TokenKind::As) {
                    Some(self.expect(TokenKind::Ident, "name after 'as'")?.literal)
                } else {
                    None
                };
                StmtKind::Import { module, alias }
            }
            TokenKind::From => {
                self.advance();
                let module = self.parse_dotted_name()?;
                self.expect(TokenKind::Import, "'import'")?;
                let mut names = Vec::new();
                loop {
                    let name = self.expect(TokenKind::Ident, "imported name")?.literal;
                    let alias = if self.accept(TokenKind::As) {
                        Some(self.expect(TokenKind::Ident, "name after 'as'")?.literal)
                    } else {
                        None
                    };
                    names.push((name, alias));
                    if !self.accept(TokenKind::Comma) {
                        break;
                    }
                }
                StmtKind::FromImport { module, names }
            }
            TokenKind::Yield => {
                self.error_here("yield is not supported".to_string());
                return Err(());
            }
            TokenKind::Illegal => {
                let token = self.peek().clone();
                self.error_at(
                    token.line,
                    token.column,
                    format!("illegal character '{}'", token.literal),
                );
                return Err(());
            }
            _ => return self.parse_expr_stmt(),
        };
        Ok(Stmt { line, node })
    }

    fn parse_expr_stmt(&mut self) -> PResult<Stmt> {
        let line = self.peek().line;
        let first = self.parse_testlist()?;

        let kind = self.peek_kind();
        if kind.is_aug_assign() {
            let op = aug_assign_op(kind);
            self.advance();
            self.check_target(&first, false)?;
            let value = self.parse_testlist()?;
            return Ok(Stmt {
                line,
                node: StmtKind::AugAssign { target: first, op, value },
            });
        }

        if kind == TokenKind::Assign {
            let mut targets = vec![first];
            let mut value = None;
            while self.accept(TokenKind::Assign) {
                let next = self.parse_testlist()?;
                if self.peek_kind() == TokenKind::Assign {
                    targets.push(next);
                } else {
                    value = Some(next);
                }
            }
            for target in &targets {
                self.check_target(target, true)?;
            }
            let value = value.ok_or(())?;
            return Ok(Stmt {
                line,
                node: StmtKind::Assign { targets, value },
            });
        }

        Ok(Stmt {
            line,
            node: StmtKind::Expr(first),
        })
    }

    /// Validates an assignment target; `allow_unpack` permits tuple/list
    /// destructuring (augmented assignment does not).
    fn check_target(&mut self, target: &Expr, allow_unpack: bool) -> PResult<()> {
        match &target.node {
            ExprKind::Ident(_) | ExprKind::Attribute { .. } | ExprKind::Subscript { .. } => Ok(()),
            ExprKind::Tuple(items) | ExprKind::List(items) if allow_unpack => {
                for item in items {
                    self.check_target(item, true)?;
                }
                Ok(())
            }
            _ => {
                self.error_at(
                    target.line,
                    1,
                    "cannot assign to this expression".to_string(),
                );
                Err(())
            }
        }
    }

    fn parse_name_list(&mut self) -> PResult<Vec<String>> {
        let mut names = vec![self.expect(TokenKind::Ident, "name")?.literal];
        while self.accept(TokenKind::Comma) {
            names.push(self.expect(TokenKind::Ident, "name")?.literal);
        }
        Ok(names)
    }

    fn parse_dotted_name(&mut self) -> PResult<String> {
        let mut name = self.expect(TokenKind::Ident, "module name")?.literal;
        while self.peek_kind() == TokenKind::Dot {
            self.advance();
            name.push('.');
            name.push_str(&self.expect(TokenKind::Ident, "name after '.'")?.literal);
        }
        Ok(name)
    }

    // ------------------------------------------------------------------
    // Compound statements
    // ------------------------------------------------------------------

    /// Parses `: suite` — either an indented block or a single-line suite.
    fn parse_suite(&mut self) -> PResult<Vec<Stmt>> {
        self.expect(TokenKind::Colon, "':'")?;
        if self.accept(TokenKind::Newline) {
            self.expect(TokenKind::Indent, "an indented block")?;
            let mut body = Vec::new();
            loop {
                match self.peek_kind() {
                    TokenKind::Dedent => {
                        self.advance();
                        break;
                    }
                    TokenKind::Eof => break,
                    TokenKind::Newline => {
                        self.advance();
                    }
                    _ => match self.parse_statement() {
                        Ok(stmts) => body.extend(stmts),
                        Err(()) => self.synchronize(),
                    },
                }
            }
            if body.is_empty() {
                self.error_here("expected at least one statement in block".to_string());
                return Err(());
            }
            Ok(body)
        } else {
            // Single-line suite: `if x: y`.
            self.parse_simple_line()
        }
    }

    fn parse_if(&mut self) -> PResult<Stmt> {
        let line = self.peek().line;
        self.advance();
        let mut branches = vec![(self.parse_test()?, self.parse_suite()?)];
        let mut orelse = Vec::new();
        loop {
            if self.peek_kind() == TokenKind::Elif {
                self.advance();
                branches.push((self.parse_test()?, self.parse_suite()?));
            } else if self.peek_kind() == TokenKind::Else {
                self.advance();
                orelse = self.parse_suite()?;
                break;
            } else {
                break;
            }
        }
        Ok(Stmt {
            line,
            node: StmtKind::If { branches, orelse },
        })
    }

    fn parse_while(&mut self) -> PResult<Stmt> {
        let line = self.peek().line;
        self.advance();
        let test = self.parse_test()?;
        let body = self.parse_suite()?;
        let orelse = if self.peek_kind() == TokenKind::Else {
            self.advance();
            self.parse_suite()?
        } else {
            Vec::new()
        };
        Ok(Stmt {
            line,
            node: StmtKind::While { test, body, orelse },
        })
    }

    fn parse_for(&mut self) -> PResult<Stmt> {
        let line = self.peek().line;
        self.advance();
        let target = self.parse_target_list()?;
        self.expect(TokenKind::In, "'in'")?;
        let iter = self.parse_testlist()?;
        let body = self.parse_suite()?;
        let orelse = if self.peek_kind() == TokenKind::Else {
            self.advance();
            self.parse_suite()?
        } else {
            Vec::new()
        };
        Ok(Stmt {
            line,
            node: StmtKind::For { target, iter, body, orelse },
        })
    }

    /// A loop/comprehension target: one or more comma-separated targets.
    fn parse_target_list(&mut self) -> PResult<Expr> {
        let line = self.peek().line;
        let first = self.parse_trailer_expr()?;
        self.check_target(&first, true)?;
        if self.peek_kind() != TokenKind::Comma {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.accept(TokenKind::Comma) {
            if !starts_expr(self.peek_kind()) {
                break;
            }
            let item = self.parse_trailer_expr()?;
            self.check_target(&item, true)?;
            items.push(item);
        }
        Ok(Expr {
            line,
            node: ExprKind::Tuple(items),
        })
    }

    fn parse_try(&mut self) -> PResult<Stmt> {
        let line = self.peek().line;
        self.advance();
        let body = self.parse_suite()?;
        let mut handlers = Vec::new();
        while self.peek_kind() == TokenKind::Except {
            let handler_line = self.peek().line;
            self.advance();
            let exc = if starts_expr(self.peek_kind()) {
                Some(self.parse_test()?)
            } else {
                None
            };
            let name = if self.accept(TokenKind::As) {
                Some(self.expect(TokenKind::Ident, "name after 'as'")?.literal)
            } else {
                None
            };
            let handler_body = self.parse_suite()?;
            handlers.push(ExceptHandler {
                exc,
                name,
                body: handler_body,
                line: handler_line,
            });
        }
        let finally = if self.peek_kind() == TokenKind::Finally {
            self.advance();
            self.parse_suite()?
        } else {
            Vec::new()
        };
        if handlers.is_empty() && finally.is_empty() {
            self.error_here("expected 'except' or 'finally' after try block".to_string());
            return Err(());
        }
        Ok(Stmt {
            line,
            node: StmtKind::Try { body, handlers, finally },
        })
    }

    fn parse_with(&mut self) -> PResult<Stmt> {
        let line = self.peek().line;
        self.advance();
        let context = self.parse_test()?;
        let alias = if self.accept(TokenKind::As) {
            Some(self.expect(TokenKind::Ident, "name after 'as'")?.literal)
        } else {
            None
        };
        let body = self.parse_suite()?;
        Ok(Stmt {
            line,
            node: StmtKind::With { context, alias, body },
        })
    }

    fn parse_decorated(&mut self) -> PResult<Stmt> {
        let mut decorators = Vec::new();
        while self.peek_kind() == TokenKind::At {
            self.advance();
            decorators.push(self.parse_test()?);
            self.expect(TokenKind::Newline, "newline after decorator")?;
            while self.accept(TokenKind::Newline) {}
        }
        match self.peek_kind() {
            TokenKind::Def => self.parse_funcdef(decorators),
            TokenKind::Class => self.parse_classdef(decorators),
            _ => {
                self.error_here("expected 'def' or 'class' after decorators".to_string());
                Err(())
            }
        }
    }

    fn parse_funcdef(&mut self, decorators: Vec<Expr>) -> PResult<Stmt> {
        let line = self.peek().line;
        self.advance();
        let name = self.expect(TokenKind::Ident, "function name")?.literal;
        self.expect(TokenKind::LParen, "'('")?;
        let (params, vararg, kwarg) = self.parse_params()?;
        self.expect(TokenKind::RParen, "')'")?;
        let body = self.parse_suite()?;
        Ok(Stmt {
            line,
            node: StmtKind::FuncDef(Rc::new(FuncDef {
                name,
                params,
                vararg,
                kwarg,
                body,
                decorators,
                line,
            })),
        })
    }

    fn parse_params(&mut self) -> PResult<(Vec<ParamSpec>, Option<String>, Option<String>)> {
        let mut params = Vec::new();
        let mut vararg = None;
        let mut kwarg = None;
        let mut seen_default = false;
        while self.peek_kind() != TokenKind::RParen {
            match self.peek_kind() {
                TokenKind::Star => {
                    self.advance();
                    if vararg.is_some() {
                        self.error_here("duplicate *args parameter".to_string());
                        return Err(());
                    }
                    vararg = Some(self.expect(TokenKind::Ident, "parameter name after '*'")?.literal);
                }
                TokenKind::DoubleStar => {
                    self.advance();
                    kwarg = Some(self.expect(TokenKind::Ident, "parameter name after '**'")?.literal);
                }
                TokenKind::Ident => {
                    if kwarg.is_some() {
                        self.error_here("parameter after **kwargs".to_string());
                        return Err(());
                    }
                    let name = self.advance().literal;
                    let default = if self.accept(TokenKind::Assign) {
                        seen_default = true;
                        Some(self.parse_test()?)
                    } else {
                        if seen_default && vararg.is_none() {
                            self.error_here(format!(
                                "parameter without a default follows one with a default: '{name}'"
                            ));
                            return Err(());
                        }
                        None
                    };
                    params.push(ParamSpec { name, default });
                }
                _ => {
                    self.error_here(format!("expected parameter, found '{}'", describe(self.peek())));
                    return Err(());
                }
            }
            if !self.accept(TokenKind::Comma) {
                break;
            }
        }
        Ok((params, vararg, kwarg))
    }

    fn parse_classdef(&mut self, decorators: Vec<Expr>) -> PResult<Stmt> {
        let line = self.peek().line;
        self.advance();
        let name = self.expect(TokenKind::Ident, "class name")?.literal;
        let base = if self.accept(TokenKind::LParen) {
            let base = if self.peek_kind() == TokenKind::RParen {
                None
            } else {
                Some(self.parse_test()?)
            };
            self.expect(TokenKind::RParen, "')'")?;
            base
        } else {
            None
        };
        let body = self.parse_suite()?;
        Ok(Stmt {
            line,
            node: StmtKind::ClassDef { name, base, body, decorators },
        })
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    /// `testlist`: one or more tests; two or more (or a trailing comma)
    /// form a tuple.
    fn parse_testlist(&mut self) -> PResult<Expr> {
        let line = self.peek().line;
        let first = self.parse_test()?;
        if self.peek_kind() != TokenKind::Comma {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.accept(TokenKind::Comma) {
            if !starts_expr(self.peek_kind()) {
                break;
            }
            items.push(self.parse_test()?);
        }
        Ok(Expr {
            line,
            node: ExprKind::Tuple(items),
        })
    }

    fn parse_test(&mut self) -> PResult<Expr> {
        if self.peek_kind() == TokenKind::Lambda {
            return self.parse_lambda();
        }
        let line = self.peek().line;
        let body = self.parse_or()?;
        if self.peek_kind() == TokenKind::If {
            self.advance();
            let test = self.parse_or()?;
            self.expect(TokenKind::Else, "'else' in conditional expression")?;
            let orelse = self.parse_test()?;
            return Ok(Expr {
                line,
                node: ExprKind::Cond {
                    test: Box::new(test),
                    body: Box::new(body),
                    orelse: Box::new(orelse),
                },
            });
        }
        Ok(body)
    }

    fn parse_lambda(&mut self) -> PResult<Expr> {
        let line = self.peek().line;
        self.advance();
        let mut params = Vec::new();
        let mut vararg = None;
        let mut kwarg = None;
        let mut seen_default = false;
        while self.peek_kind() != TokenKind::Colon {
            match self.peek_kind() {
                TokenKind::Star => {
                    self.advance();
                    vararg = Some(self.expect(TokenKind::Ident, "parameter name after '*'")?.literal);
                }
                TokenKind::DoubleStar => {
                    self.advance();
                    kwarg = Some(self.expect(TokenKind::Ident, "parameter name after '**'")?.literal);
                }
                TokenKind::Ident => {
                    let name = self.advance().literal;
                    let default = if self.accept(TokenKind::Assign) {
                        seen_default = true;
                        Some(self.parse_test()?)
                    } else {
                        if seen_default {
                            self.error_here(
                                "parameter without a default follows one with a default".to_string(),
                            );
                            return Err(());
                        }
                        None
                    };
                    params.push(ParamSpec { name, default });
                }
                _ => {
                    self.error_here(format!("expected parameter, found '{}'", describe(self.peek())));
                    return Err(());
                }
            }
            if !self.accept(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::Colon, "':'")?;
        let value = self.parse_test()?;
        let body = vec![Stmt {
            line,
            node: StmtKind::Return(Some(value)),
        }];
        Ok(Expr {
            line,
            node: ExprKind::Lambda(Rc::new(FuncDef {
                name: "<lambda>".to_string(),
                params,
                vararg,
                kwarg,
                body,
                decorators: Vec::new(),
                line,
            })),
        })
    }

    fn parse_or(&mut self) -> PResult<Expr> {
        let mut left = self.parse_and()?;
        while self.peek_kind() == TokenKind::Or {
            let line = self.advance().line;
            let right = self.parse_and()?;
            left = Expr {
                line,
                node: ExprKind::Bool {
                    op: BoolOp::Or,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> PResult<Expr> {
        let mut left = self.parse_not()?;
        while self.peek_kind() == TokenKind::And {
            let line = self.advance().line;
            let right = self.parse_not()?;
            left = Expr {
                line,
                node: ExprKind::Bool {
                    op: BoolOp::And,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            };
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> PResult<Expr> {
        if self.peek_kind() == TokenKind::Not {
            let line = self.advance().line;
            let operand = self.parse_not()?;
            return Ok(Expr {
                line,
                node: ExprKind::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                },
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> PResult<Expr> {
        let first = self.parse_bitor()?;
        let mut rest = Vec::new();
        while let Some(op) = cmp_op(self.peek_kind()) {
            self.advance();
            rest.push((op, self.parse_bitor()?));
        }
        if rest.is_empty() {
            return Ok(first);
        }
        let line = first.line;
        Ok(Expr {
            line,
            node: ExprKind::Compare {
                first: Box::new(first),
                rest,
            },
        })
    }

    fn parse_bitor(&mut self) -> PResult<Expr> {
        let mut left = self.parse_bitxor()?;
        while self.peek_kind() == TokenKind::Pipe {
            let line = self.advance().line;
            left = binary(line, BinOp::BitOr, left, self.parse_bitxor()?);
        }
        Ok(left)
    }

    fn parse_bitxor(&mut self) -> PResult<Expr> {
        let mut left = self.parse_bitand()?;
        while self.peek_kind() == TokenKind::Caret {
            let line = self.advance().line;
            left = binary(line, BinOp::BitXor, left, self.parse_bitand()?);
        }
        Ok(left)
    }

    fn parse_bitand(&mut self) -> PResult<Expr> {
        let mut left = self.parse_shift()?;
        while self.peek_kind() == TokenKind::Amp {
            let line = self.advance().line;
            left = binary(line, BinOp::BitAnd, left, self.parse_shift()?);
        }
        Ok(left)
    }

    fn parse_shift(&mut self) -> PResult<Expr> {
        let mut left = self.parse_arith()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Shl => BinOp::Shl,
                TokenKind::Shr => BinOp::Shr,
                _ => break,
            };
            let line = self.advance().line;
            left = binary(line, op, left, self.parse_arith()?);
        }
        Ok(left)
    }

    fn parse_arith(&mut self) -> PResult<Expr> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            let line = self.advance().line;
            left = binary(line, op, left, self.parse_term()?);
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> PResult<Expr> {
        let mut left = self.parse_factor()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::DoubleSlash => BinOp::FloorDiv,
                TokenKind::Percent => BinOp::Mod,
                _ => break,
            };
            let line = self.advance().line;
            left = binary(line, op, left, self.parse_factor()?);
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> PResult<Expr> {
        let op = match self.peek_kind() {
            TokenKind::Plus => Some(UnaryOp::Pos),
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Tilde => Some(UnaryOp::Invert),
            _ => None,
        };
        if let Some(op) = op {
            let line = self.advance().line;
            let operand = self.parse_factor()?;
            return Ok(Expr {
                line,
                node: ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
            });
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> PResult<Expr> {
        let base = self.parse_trailer_expr()?;
        if self.peek_kind() == TokenKind::DoubleStar {
            let line = self.advance().line;
            // Right-associative: the exponent may itself be a power.
            let exponent = self.parse_factor()?;
            return Ok(binary(line, BinOp::Pow, base, exponent));
        }
        Ok(base)
    }

    fn parse_trailer_expr(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_atom()?;
        loop {
            match self.peek_kind() {
                TokenKind::LParen => {
                    let line = self.peek().line;
                    self.advance();
                    let args = self.parse_call_args()?;
                    self.expect(TokenKind::RParen, "')'")?;
                    expr = Expr {
                        line,
                        node: ExprKind::Call {
                            func: Box::new(expr),
                            args,
                        },
                    };
                }
                TokenKind::LBracket => {
                    let line = self.peek().line;
                    self.advance();
                    let index = self.parse_index()?;
                    self.expect(TokenKind::RBracket, "']'")?;
                    expr = Expr {
                        line,
                        node: ExprKind::Subscript {
                            value: Box::new(expr),
                            index: Box::new(index),
                        },
                    };
                }
                TokenKind::Dot => {
                    let line = self.peek().line;
                    self.advance();
                    let attr = self.expect(TokenKind::Ident, "attribute name")?.literal;
                    expr = Expr {
                        line,
                        node: ExprKind::Attribute {
                            value: Box::new(expr),
                            attr,
                        },
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_call_args(&mut self) -> PResult<Vec<CallArg>> {
        let mut args = Vec::new();
        while self.peek_kind() != TokenKind::RParen {
            match self.peek_kind() {
                TokenKind::Star => {
                    self.advance();
                    args.push(CallArg::Star(self.parse_test()?));
                }
                TokenKind::DoubleStar => {
                    self.advance();
                    args.push(CallArg::DoubleStar(self.parse_test()?));
                }
                TokenKind::Ident if self.peek_kind_at(1) == TokenKind::Assign => {
                    let name = self.advance().literal;
                    self.advance();
                    args.push(CallArg::Keyword(name, self.parse_test()?));
                }
                _ => args.push(CallArg::Pos(self.parse_test()?)),
            }
            if !self.accept(TokenKind::Comma) {
                break;
            }
        }
        Ok(args)
    }

    fn parse_index(&mut self) -> PResult<Index> {
        let start = if matches!(self.peek_kind(), TokenKind::Colon) {
            None
        } else {
            Some(self.parse_test()?)
        };
        if !self.accept(TokenKind::Colon) {
            return Ok(Index::Single(start.ok_or_else(|| {
                self.error_here("expected subscript expression".to_string());
            })?));
        }
        let stop = if matches!(self.peek_kind(), TokenKind::RBracket | TokenKind::Colon) {
            None
        } else {
            Some(self.parse_test()?)
        };
        let step = if self.accept(TokenKind::Colon) {
            if self.peek_kind() == TokenKind::RBracket {
                None
            } else {
                Some(self.parse_test()?)
            }
        } else {
            None
        };
        Ok(Index::Slice { start, stop, step })
    }

    fn parse_atom(&mut self) -> PResult<Expr> {
        let token = self.peek().clone();
        let line = token.line;
        match token.kind {
            TokenKind::None => {
                self.advance();
                Ok(Expr { line, node: ExprKind::NoneLit })
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr { line, node: ExprKind::True })
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr { line, node: ExprKind::False })
            }
            TokenKind::IntLit => {
                self.advance();
                match parse_int_literal(&token.literal) {
                    Some(value) => Ok(Expr { line, node: ExprKind::Int(value) }),
                    None => {
                        self.error_at(line, token.column, format!("invalid integer literal '{}'", token.literal));
                        Err(())
                    }
                }
            }
            TokenKind::FloatLit => {
                self.advance();
                let cleaned: String = token.literal.chars().filter(|&c| c != '_').collect();
                match cleaned.parse::<f64>() {
                    Ok(value) => Ok(Expr { line, node: ExprKind::Float(value) }),
                    Err(_) => {
                        self.error_at(line, token.column, format!("invalid float literal '{}'", token.literal));
                        Err(())
                    }
                }
            }
            TokenKind::StrLit => {
                self.advance();
                // Adjacent string literals concatenate.
                let mut text = token.literal;
                while self.peek_kind() == TokenKind::StrLit {
                    text.push_str(&self.advance().literal);
                }
                Ok(Expr {
                    line,
                    node: ExprKind::Str(Rc::from(text.as_str())),
                })
            }
            TokenKind::FStrLit => {
                self.advance();
                let parts = self.parse_fstring(&token.literal, line, token.column)?;
                Ok(Expr { line, node: ExprKind::FString(parts) })
            }
            TokenKind::Ident => {
                self.advance();
                Ok(Expr {
                    line,
                    node: ExprKind::Ident(token.literal),
                })
            }
            TokenKind::LParen => {
                self.advance();
                if self.accept(TokenKind::RParen) {
                    return Ok(Expr { line, node: ExprKind::Tuple(Vec::new()) });
                }
                let first = self.parse_test()?;
                if self.peek_kind() == TokenKind::Comma {
                    let mut items = vec![first];
                    while self.accept(TokenKind::Comma) {
                        if self.peek_kind() == TokenKind::RParen {
                            break;
                        }
                        items.push(self.parse_test()?);
                    }
                    self.expect(TokenKind::RParen, "')'")?;
                    return Ok(Expr { line, node: ExprKind::Tuple(items) });
                }
                if self.peek_kind() == TokenKind::For {
                    self.error_here("generator expressions are not supported".to_string());
                    return Err(());
                }
                self.expect(TokenKind::RParen, "')'")?;
                Ok(first)
            }
            TokenKind::LBracket => {
                self.advance();
                if self.accept(TokenKind::RBracket) {
                    return Ok(Expr { line, node: ExprKind::List(Vec::new()) });
                }
                let first = self.parse_test()?;
                if self.peek_kind() == TokenKind::For {
                    let clauses = self.parse_comp_clauses()?;
                    self.expect(TokenKind::RBracket, "']'")?;
                    return Ok(Expr {
                        line,
                        node: ExprKind::ListComp {
                            elt: Box::new(first),
                            clauses,
                        },
                    });
                }
                let mut items = vec![first];
                while self.accept(TokenKind::Comma) {
                    if self.peek_kind() == TokenKind::RBracket {
                        break;
                    }
                    items.push(self.parse_test()?);
                }
                self.expect(TokenKind::RBracket, "']'")?;
                Ok(Expr { line, node: ExprKind::List(items) })
            }
            TokenKind::LBrace => {
                self.advance();
                if self.accept(TokenKind::RBrace) {
                    return Ok(Expr { line, node: ExprKind::Dict(Vec::new()) });
                }
                let first = self.parse_test()?;
                if self.accept(TokenKind::Colon) {
                    let value = self.parse_test()?;
                    if self.peek_kind() == TokenKind::For {
                        let clauses = self.parse_comp_clauses()?;
                        self.expect(TokenKind::RBrace, "'}'")?;
                        return Ok(Expr {
                            line,
                            node: ExprKind::DictComp {
                                key: Box::new(first),
                                value: Box::new(value),
                                clauses,
                            },
                        });
                    }
                    let mut pairs = vec![(first, value)];
                    while self.accept(TokenKind::Comma) {
                        if self.peek_kind() == TokenKind::RBrace {
                            break;
                        }
                        let key = self.parse_test()?;
                        self.expect(TokenKind::Colon, "':' in dict literal")?;
                        pairs.push((key, self.parse_test()?));
                    }
                    self.expect(TokenKind::RBrace, "'}'")?;
                    return Ok(Expr { line, node: ExprKind::Dict(pairs) });
                }
                if self.peek_kind() == TokenKind::For {
                    let clauses = self.parse_comp_clauses()?;
                    self.expect(TokenKind::RBrace, "'}'")?;
                    return Ok(Expr {
                        line,
                        node: ExprKind::SetComp {
                            elt: Box::new(first),
                            clauses,
                        },
                    });
                }
                let mut items = vec![first];
                while self.accept(TokenKind::Comma) {
                    if self.peek_kind() == TokenKind::RBrace {
                        break;
                    }
                    items.push(self.parse_test()?);
                }
                self.expect(TokenKind::RBrace, "'}'")?;
                Ok(Expr { line, node: ExprKind::Set(items) })
            }
            TokenKind::Yield => {
                self.error_here("yield is not supported".to_string());
                Err(())
            }
            TokenKind::Illegal => {
                self.error_at(line, token.column, format!("illegal character '{}'", token.literal));
                self.advance();
                Err(())
            }
            _ => {
                self.error_here(format!("unexpected '{}'", describe(&token)));
                Err(())
            }
        }
    }

    fn parse_comp_clauses(&mut self) -> PResult<Vec<CompClause>> {
        let mut clauses = Vec::new();
        while self.peek_kind() == TokenKind::For {
            self.advance();
            let target = self.parse_target_list()?;
            self.expect(TokenKind::In, "'in'")?;
            let iter = self.parse_or()?;
            let mut ifs = Vec::new();
            while self.peek_kind() == TokenKind::If {
                self.advance();
                ifs.push(self.parse_or()?);
            }
            clauses.push(CompClause { target, iter, ifs });
        }
        Ok(clauses)
    }

    // ------------------------------------------------------------------
    // F-strings
    // ------------------------------------------------------------------

    /// Parses the raw body of an f-string into literal and expression parts.
    fn parse_fstring(&mut self, raw: &str, line: u32, column: u32) -> PResult<Vec<FStringPart>> {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let chars: Vec<char> = raw.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            if c == '{' {
                if chars.get(i + 1) == Some(&'{') {
                    literal.push('{');
                    i += 2;
                    continue;
                }
                if !literal.is_empty() {
                    parts.push(FStringPart::Literal(decode_escapes(&literal)));
                    literal.clear();
                }
                let (inner, consumed) = match scan_braced(&chars[i + 1..]) {
                    Some(found) => found,
                    None => {
                        self.error_at(line, column, "unterminated '{' in f-string".to_string());
                        return Err(());
                    }
                };
                i += 1 + consumed + 1;
                parts.push(self.parse_fstring_expr(&inner, line, column)?);
            } else if c == '}' {
                if chars.get(i + 1) == Some(&'}') {
                    literal.push('}');
                    i += 2;
                } else {
                    self.error_at(line, column, "single '}' in f-string".to_string());
                    return Err(());
                }
            } else {
                literal.push(c);
                i += 1;
            }
        }
        if !literal.is_empty() {
            parts.push(FStringPart::Literal(decode_escapes(&literal)));
        }
        Ok(parts)
    }

    /// Parses the inside of one `{...}` replacement field.
    fn parse_fstring_expr(&mut self, inner: &str, line: u32, column: u32) -> PResult<FStringPart> {
        let (expr_text, format) = split_format_spec(inner);
        let (expr_text, conversion) = match expr_text.strip_suffix("!r") {
            Some(stripped) => (stripped, Some('r')),
            None => match expr_text.strip_suffix("!s") {
                Some(stripped) => (stripped, Some('s')),
                None => (expr_text, None),
            },
        };
        if expr_text.trim().is_empty() {
            self.error_at(line, column, "empty expression in f-string".to_string());
            return Err(());
        }
        let tokens = tokenize(expr_text);
        let mut sub = Parser::new(tokens);
        let expr = sub.parse_test();
        for mut err in sub.errors {
            err.line = line;
            err.column = column;
            self.errors.push(err);
        }
        let mut expr = expr?;
        relocate(&mut expr, line);
        Ok(FStringPart::Expr {
            expr,
            conversion,
            format: format.map(str::to_string),
        })
    }
}

/// Scans a `{`-delimited replacement field, respecting nested brackets and
/// string quotes. Returns the inner text and the number of chars consumed
/// (excluding the closing brace).
fn scan_braced(chars: &[char]) -> Option<(String, usize)> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut inner = String::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if let Some(q) = quote {
            inner.push(c);
            if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match c {
            '\'' | '"' => {
                quote = Some(c);
                inner.push(c);
            }
            '(' | '[' | '{' => {
                depth += 1;
                inner.push(c);
            }
            ')' | ']' => {
                depth = depth.saturating_sub(1);
                inner.push(c);
            }
            '}' => {
                if depth == 0 {
                    return Some((inner, i));
                }
                depth -= 1;
                inner.push(c);
            }
            _ => inner.push(c),
        }
        i += 1;
    }
    None
}

/// Splits `expr:spec` at the first top-level colon.
fn split_format_spec(inner: &str) -> (&str, Option<&str>) {
    let chars: Vec<char> = inner.chars().collect();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut byte_pos = 0usize;
    for c in &chars {
        if let Some(q) = quote {
            if *c == q {
                quote = None;
            }
        } else {
            match c {
                '\'' | '"' => quote = Some(*c),
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => depth = depth.saturating_sub(1),
                ':' if depth == 0 => {
                    return (&inner[..byte_pos], Some(&inner[byte_pos + 1..]));
                }
                _ => {}
            }
        }
        byte_pos += c.len_utf8();
    }
    (inner, None)
}

/// Rewrites the line of every node in a parsed f-string fragment to the line
/// of the enclosing f-string token.
fn relocate(expr: &mut Expr, line: u32) {
    expr.line = line;
    match &mut expr.node {
        ExprKind::Unary { operand, .. } => relocate(operand, line),
        ExprKind::Binary { left, right, .. } | ExprKind::Bool { left, right, .. } => {
            relocate(left, line);
            relocate(right, line);
        }
        ExprKind::Compare { first, rest } => {
            relocate(first, line);
            for (_, e) in rest {
                relocate(e, line);
            }
        }
        ExprKind::Cond { test, body, orelse } => {
            relocate(test, line);
            relocate(body, line);
            relocate(orelse, line);
        }
        ExprKind::Call { func, args } => {
            relocate(func, line);
            for arg in args {
                match arg {
                    CallArg::Pos(e) | CallArg::Keyword(_, e) | CallArg::Star(e) | CallArg::DoubleStar(e) => {
                        relocate(e, line);
                    }
                }
            }
        }
        ExprKind::Attribute { value, .. } => relocate(value, line),
        ExprKind::Subscript { value, index } => {
            relocate(value, line);
            match index.as_mut() {
                Index::Single(e) => relocate(e, line),
                Index::Slice { start, stop, step } => {
                    for e in [start, stop, step].into_iter().flatten() {
                        relocate(e, line);
                    }
                }
            }
        }
        ExprKind::List(items) | ExprKind::Tuple(items) | ExprKind::Set(items) => {
            for e in items {
                relocate(e, line);
            }
        }
        ExprKind::Dict(pairs) => {
            for (k, v) in pairs {
                relocate(k, line);
                relocate(v, line);
            }
        }
        _ => {}
    }
}

fn binary(line: u32, op: BinOp, left: Expr, right: Expr) -> Expr {
    Expr {
        line,
        node: ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
    }
}

fn cmp_op(kind: TokenKind) -> Option<CmpOp> {
    Some(match kind {
        TokenKind::EqEq => CmpOp::Eq,
        TokenKind::NotEq => CmpOp::NotEq,
        TokenKind::Lt => CmpOp::Lt,
        TokenKind::LtEq => CmpOp::LtEq,
        TokenKind::Gt => CmpOp::Gt,
        TokenKind::GtEq => CmpOp::GtEq,
        TokenKind::In => CmpOp::In,
        TokenKind::NotIn => CmpOp::NotIn,
        TokenKind::Is => CmpOp::Is,
        TokenKind::IsNot => CmpOp::IsNot,
        _ => return None,
    })
}

fn aug_assign_op(kind: TokenKind) -> BinOp {
    match kind {
        TokenKind::PlusAssign => BinOp::Add,
        TokenKind::MinusAssign => BinOp::Sub,
        TokenKind::StarAssign => BinOp::Mul,
        TokenKind::SlashAssign => BinOp::Div,
        TokenKind::DoubleSlashAssign => BinOp::FloorDiv,
        TokenKind::PercentAssign => BinOp::Mod,
        TokenKind::DoubleStarAssign => BinOp::Pow,
        TokenKind::ShlAssign => BinOp::Shl,
        TokenKind::ShrAssign => BinOp::Shr,
        TokenKind::AmpAssign => BinOp::BitAnd,
        TokenKind::PipeAssign => BinOp::BitOr,
        TokenKind::CaretAssign => BinOp::BitXor,
        _ => unreachable!("guarded by TokenKind::is_aug_assign"),
    }
}

/// True if `kind` can start an expression.
fn starts_expr(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Ident
            | TokenKind::IntLit
            | TokenKind::FloatLit
            | TokenKind::StrLit
            | TokenKind::FStrLit
            | TokenKind::True
            | TokenKind::False
            | TokenKind::None
            | TokenKind::Not
            | TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Tilde
            | TokenKind::LParen
            | TokenKind::LBracket
            | TokenKind::LBrace
            | TokenKind::Lambda
    )
}

/// Parses a decimal/hex/binary/octal integer literal.
fn parse_int_literal(literal: &str) -> Option<i64> {
    let cleaned: String = literal.chars().filter(|&c| c != '_').collect();
    if let Some(rest) = cleaned.strip_prefix("0x").or_else(|| cleaned.strip_prefix("0X")) {
        i64::from_str_radix(rest, 16).ok()
    } else if let Some(rest) = cleaned.strip_prefix("0b").or_else(|| cleaned.strip_prefix("0B")) {
        i64::from_str_radix(rest, 2).ok()
    } else if let Some(rest) = cleaned.strip_prefix("0o").or_else(|| cleaned.strip_prefix("0O")) {
        i64::from_str_radix(rest, 8).ok()
    } else {
        cleaned.parse().ok()
    }
}

fn describe(token: &Token) -> String {
    match token.kind {
        TokenKind::Newline => "end of line".to_string(),
        TokenKind::Eof => "end of input".to_string(),
        TokenKind::Indent => "indent".to_string(),
        TokenKind::Dedent => "dedent".to_string(),
        _ if token.literal.is_empty() => token.kind.to_string(),
        _ => token.literal.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Module {
        let (module, errors) = parse(source);
        assert!(errors.is_empty(), "unexpected parse errors: {errors:?}");
        module
    }

    #[test]
    fn precedence_of_arith_over_comparison() {
        let module = parse_ok("a + b * 2 < c\n");
        let StmtKind::Expr(expr) = &module.body[0].node else {
            panic!("expected expression statement")
        };
        assert!(matches!(expr.node, ExprKind::Compare { .. }));
    }

    #[test]
    fn power_is_right_associative() {
        let module = parse_ok("x = 2 ** 3 ** 2\n");
        let StmtKind::Assign { value, .. } = &module.body[0].node else {
            panic!("expected assignment")
        };
        let ExprKind::Binary { op, right, .. } = &value.node else {
            panic!("expected binary")
        };
        assert_eq!(*op, BinOp::Pow);
        assert!(matches!(right.node, ExprKind::Binary { op: BinOp::Pow, .. }));
    }

    #[test]
    fn chained_comparison_collects_rest() {
        let module = parse_ok("a < b < c\n");
        let StmtKind::Expr(expr) = &module.body[0].node else {
            panic!("expected expression statement")
        };
        let ExprKind::Compare { rest, .. } = &expr.node else {
            panic!("expected comparison")
        };
        assert_eq!(rest.len(), 2);
    }

    #[test]
    fn chained_assignment_keeps_all_targets() {
        let module = parse_ok("a = b = c = 1\n");
        let StmtKind::Assign { targets, .. } = &module.body[0].node else {
            panic!("expected assignment")
        };
        assert_eq!(targets.len(), 3);
    }

    #[test]
    fn tuple_destructuring_target() {
        let module = parse_ok("a, b = 1, 2\n");
        let StmtKind::Assign { targets, .. } = &module.body[0].node else {
            panic!("expected assignment")
        };
        assert!(matches!(targets[0].node, ExprKind::Tuple(_)));
    }

    #[test]
    fn decorators_attach_in_order() {
        let module = parse_ok("@outer\n@inner\ndef f():\n    pass\n");
        let StmtKind::FuncDef(def) = &module.body[0].node else {
            panic!("expected def")
        };
        assert_eq!(def.decorators.len(), 2);
    }

    #[test]
    fn single_line_suite() {
        let module = parse_ok("if x: y = 1\n");
        let StmtKind::If { branches, .. } = &module.body[0].node else {
            panic!("expected if")
        };
        assert_eq!(branches[0].1.len(), 1);
    }

    #[test]
    fn for_else_and_while_else() {
        let module = parse_ok("for i in xs:\n    pass\nelse:\n    done = 1\n");
        let StmtKind::For { orelse, .. } = &module.body[0].node else {
            panic!("expected for")
        };
        assert_eq!(orelse.len(), 1);
    }

    #[test]
    fn try_except_as_finally() {
        let module = parse_ok(
            "try:\n    x = 1\nexcept ValueError as e:\n    y = 2\nexcept:\n    z = 3\nfinally:\n    w = 4\n",
        );
        let StmtKind::Try { handlers, finally, .. } = &module.body[0].node else {
            panic!("expected try")
        };
        assert_eq!(handlers.len(), 2);
        assert_eq!(handlers[0].name.as_deref(), Some("e"));
        assert!(handlers[1].exc.is_none());
        assert_eq!(finally.len(), 1);
    }

    #[test]
    fn comprehension_forms() {
        parse_ok("a = [x * 2 for x in xs if x > 0]\n");
        parse_ok("b = {k: v for k, v in pairs}\n");
        parse_ok("c = {x for x in xs}\n");
    }

    #[test]
    fn fstring_parts() {
        let module = parse_ok("s = f\"sum={a + b:>8} raw={c!r} lit={{x}}\"\n");
        let StmtKind::Assign { value, .. } = &module.body[0].node else {
            panic!("expected assignment")
        };
        let ExprKind::FString(parts) = &value.node else {
            panic!("expected f-string")
        };
        assert_eq!(parts.len(), 5, "literal/expr/literal/expr/literal: {parts:?}");
        let FStringPart::Expr { format, .. } = &parts[1] else {
            panic!("expected expression part")
        };
        assert_eq!(format.as_deref(), Some(">8"));
        let FStringPart::Expr { conversion, .. } = &parts[3] else {
            panic!("expected expression part")
        };
        assert_eq!(*conversion, Some('r'));
    }

    #[test]
    fn fstring_nested_quotes() {
        parse_ok("s = f\"{d['k']}\"\n");
    }

    #[test]
    fn slice_forms() {
        parse_ok("a = xs[1:3]\nb = xs[:2]\nc = xs[::2]\nd = xs[1:]\n");
    }

    #[test]
    fn keyword_and_star_call_args() {
        let module = parse_ok("f(1, x=2, *rest, **extra)\n");
        let StmtKind::Expr(expr) = &module.body[0].node else {
            panic!("expected expression")
        };
        let ExprKind::Call { args, .. } = &expr.node else {
            panic!("expected call")
        };
        assert_eq!(args.len(), 4);
    }

    #[test]
    fn yield_is_rejected() {
        let (_, errors) = parse("def f():\n    yield 1\n");
        assert!(errors.iter().any(|e| e.message.contains("yield")));
    }

    #[test]
    fn error_recovery_continues_parsing() {
        let (module, errors) = parse("x = = 1\ny = 2\n");
        assert!(!errors.is_empty());
        // The second statement still parses.
        assert!(module
            .body
            .iter()
            .any(|s| matches!(&s.node, StmtKind::Assign { targets, .. }
                if matches!(&targets[0].node, ExprKind::Ident(n) if n == "y"))));
    }

    #[test]
    fn import_forms() {
        let module = parse_ok("import a.b.c\nimport a.b as x\nfrom m import p, q as r\n");
        assert!(matches!(
            &module.body[0].node,
            StmtKind::Import { module, alias: None } if module == "a.b.c"
        ));
        assert!(matches!(
            &module.body[1].node,
            StmtKind::Import { alias: Some(a), .. } if a == "x"
        ));
        let StmtKind::FromImport { names, .. } = &module.body[2].node else {
            panic!("expected from-import")
        };
        assert_eq!(names.len(), 2);
        assert_eq!(names[1], ("q".to_string(), Some("r".to_string())));
    }

    #[test]
    fn lambda_with_defaults() {
        parse_ok("f = lambda x, y=2: x + y\n");
    }

    #[test]
    fn errors_carry_line_numbers() {
        let (_, errors) = parse("a = 1\nb = = 2\n");
        assert_eq!(errors[0].line, 2);
    }
}
