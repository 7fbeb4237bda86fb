//! Recursive-descent parser with one-token look-ahead and Pratt-style
//! precedence climbing for expressions.

use crate::ast::{FnDecl, Node, Param, Program, Stmt, VarDeclElem};
use crate::diagnostics::{Diagnostic, Result};
use crate::lexer::Lexer;
use crate::pos::{Pos, Span};
use crate::token::{Token, TokenKind};

pub struct Parser {
    lexer: Lexer,
    cur: Token,
    /// Position just past the most recently consumed token; `expect`
    /// failures are anchored here ("expected ';'" after the last token).
    last_end: Pos,
}

impl Parser {
    pub fn new(source: &str) -> Result<Self> {
        let mut lexer = Lexer::new(source);
        let cur = lexer.next_token()?;
        Ok(Parser { lexer, cur, last_end: Pos::default() })
    }

    /// Source lines buffered so far, for rendering diagnostics raised after
    /// parsing (lowering runs against the same buffer).
    pub fn source_lines(&self) -> &[String] {
        &self.lexer.lines
    }

    fn advance(&mut self) -> Result<Token> {
        self.last_end = Pos::new(self.cur.pos.row, self.cur.pos.col + self.cur.len.max(1));
        let next = self.lexer.next_token()?;
        Ok(std::mem::replace(&mut self.cur, next))
    }

    fn at_eof(&self) -> bool {
        self.cur.is_eof()
    }

    fn expect_simple(&mut self, matches: impl Fn(&TokenKind) -> bool, msg: &str) -> Result<Token> {
        if matches(&self.cur.kind) {
            self.advance()
        } else {
            Err(Diagnostic::at(msg.to_string(), self.last_end))
        }
    }

    fn expect_ident(&mut self, msg: &str) -> Result<(String, Pos)> {
        let pos = self.cur.pos;
        match self.cur.kind.clone() {
            TokenKind::Ident(name) => {
                self.advance()?;
                Ok((name, pos))
            }
            _ => Err(Diagnostic::at(msg.to_string(), self.last_end)),
        }
    }

    fn expect_type_name(&mut self) -> Result<(String, Pos)> {
        self.expect_ident("expected a type name")
    }

    fn check_ident(&self) -> bool {
        matches!(self.cur.kind, TokenKind::Ident(_))
    }

    // ---- top level -------------------------------------------------

    pub fn parse_program(&mut self) -> Result<Program> {
        let mut decls = Vec::new();
        while !self.at_eof() {
            decls.push(self.parse_fn_decl()?);
        }
        Ok(Program { decls })
    }

    fn parse_fn_decl(&mut self) -> Result<FnDecl> {
        let decl_pos = self.cur.pos;
        let is_pub = if matches!(self.cur.kind, TokenKind::Pub) {
            self.advance()?;
            true
        } else {
            false
        };
        if !matches!(self.cur.kind, TokenKind::Fn) {
            return Err(Diagnostic::at(
                "only declarations permitted at the top level",
                self.cur.pos,
            ));
        }
        self.advance()?; // 'fn'
        let (name, name_pos) = self.expect_ident("expected function name")?;
        let params = if matches!(self.cur.kind, TokenKind::LParen) {
            self.advance()?;
            let params = self.parse_params()?;
            self.expect_simple(|k| matches!(k, TokenKind::RParen), "expected ',' or ')'")?;
            params
        } else {
            Vec::new()
        };
        let return_type = if matches!(self.cur.kind, TokenKind::Colon) {
            self.advance()?;
            Some(self.expect_type_name()?.0)
        } else {
            None
        };
        let body = self.parse_body()?;
        let end_pos = self.last_end;
        Ok(FnDecl { name, is_pub, return_type, params, body, decl_pos, name_pos, end_pos })
    }

    fn parse_params(&mut self) -> Result<Vec<Param>> {
        let mut params = Vec::new();
        if matches!(self.cur.kind, TokenKind::RParen) {
            return Ok(params);
        }
        loop {
            let (name, pos) = self.expect_ident("expected parameter name")?;
            self.expect_simple(|k| matches!(k, TokenKind::Colon), "expected ':'")?;
            let (type_name, _) = self.expect_type_name()?;
            params.push(Param { name, type_name, pos });
            if matches!(self.cur.kind, TokenKind::Comma) {
                self.advance()?;
                continue;
            }
            break;
        }
        Ok(params)
    }

    /// `body ::= ";" | scope | instr`
    fn parse_body(&mut self) -> Result<Option<Node>> {
        if matches!(self.cur.kind, TokenKind::Eol) {
            self.advance()?;
            return Ok(None);
        }
        if matches!(self.cur.kind, TokenKind::LBrace) {
            return Ok(Some(self.parse_scope()?));
        }
        Ok(Some(self.parse_instr()?))
    }

    fn parse_scope(&mut self) -> Result<Node> {
        self.expect_simple(|k| matches!(k, TokenKind::LBrace), "expected '{'")?;
        let mut nodes = Vec::new();
        while !matches!(self.cur.kind, TokenKind::RBrace) && !self.at_eof() {
            if matches!(self.cur.kind, TokenKind::LBrace) {
                nodes.push(self.parse_scope()?);
            } else {
                nodes.push(self.parse_instr()?);
            }
        }
        self.expect_simple(|k| matches!(k, TokenKind::RBrace), "expected '}'")?;
        Ok(Node::Scope(nodes))
    }

    /// A scope-or-single-instruction branch, used by `if`/`else` and as the
    /// `while` loop body.
    fn parse_branch(&mut self) -> Result<Node> {
        if matches!(self.cur.kind, TokenKind::LBrace) {
            self.parse_scope()
        } else {
            self.parse_instr()
        }
    }

    fn parse_instr(&mut self) -> Result<Node> {
        match &self.cur.kind {
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::Break => {
                let pos = self.cur.pos;
                self.advance()?;
                self.expect_simple(|k| matches!(k, TokenKind::Eol), "expected ';'")?;
                Ok(Node::Break(pos))
            }
            TokenKind::Continue => {
                let pos = self.cur.pos;
                self.advance()?;
                self.expect_simple(|k| matches!(k, TokenKind::Eol), "expected ';'")?;
                Ok(Node::Continue(pos))
            }
            TokenKind::Ret => self.parse_ret(),
            TokenKind::Var => self.parse_var_decl(),
            TokenKind::Ident(_) => self.parse_ident_led(),
            _ => Err(Diagnostic::at("expected an instruction", self.cur.pos)),
        }
    }

    fn parse_if(&mut self) -> Result<Node> {
        self.advance()?; // 'if'
        let cond = self.parse_expr(0)?;
        let then_branch = Box::new(self.parse_branch()?);
        let else_branch = if matches!(self.cur.kind, TokenKind::Else) {
            self.advance()?;
            Some(Box::new(self.parse_branch()?))
        } else {
            None
        };
        Ok(Node::If { cond, then_branch, else_branch })
    }

    fn parse_while(&mut self) -> Result<Node> {
        self.advance()?; // 'while'
        let cond = self.parse_expr(0)?;
        let step = if matches!(self.cur.kind, TokenKind::Colon) {
            self.advance()?;
            Some(self.parse_expr(0)?)
        } else {
            None
        };
        let body = self.parse_body()?;
        Ok(Node::While { cond, step, body: body.map(Box::new) })
    }

    fn parse_ret(&mut self) -> Result<Node> {
        let pos = self.cur.pos;
        self.advance()?; // 'ret'
        let value = if matches!(self.cur.kind, TokenKind::Eol) {
            None
        } else {
            Some(self.parse_expr(0)?)
        };
        self.expect_simple(|k| matches!(k, TokenKind::Eol), "expected ';'")?;
        Ok(Node::Ret { value, pos })
    }

    fn parse_var_decl(&mut self) -> Result<Node> {
        self.advance()?; // 'var'
        let mut elems = Vec::new();
        loop {
            elems.push(self.parse_var_decl_elem()?);
            if matches!(self.cur.kind, TokenKind::Comma) {
                self.advance()?;
                continue;
            }
            break;
        }
        self.expect_simple(|k| matches!(k, TokenKind::Eol), "expected ';'")?;
        Ok(Node::VarDecl(elems))
    }

    fn parse_var_decl_elem(&mut self) -> Result<VarDeclElem> {
        let (name, name_pos) = self.expect_ident("expected identifier")?;
        let declared_type = if matches!(self.cur.kind, TokenKind::Colon) {
            self.advance()?;
            Some(self.expect_type_name()?.0)
        } else {
            None
        };
        let initializer = if matches!(self.cur.kind, TokenKind::Assign) {
            self.advance()?;
            Some(self.parse_expr(0)?)
        } else {
            None
        };
        // Whether at least one of type/initializer is present is a semantic
        // check (the "void placeholder" rule), not a syntactic one -- see
        // the lowering pass.
        Ok(VarDeclElem { name, name_pos, declared_type, initializer })
    }

    fn parse_ident_led(&mut self) -> Result<Node> {
        let (first_name, first_pos) = self.expect_ident("expected identifier")?;

        if matches!(self.cur.kind, TokenKind::LParen) {
            let (args, end) = self.parse_call_args()?;
            let span = Span::new(first_pos, (end.col - first_pos.col).max(1));
            self.expect_simple(|k| matches!(k, TokenKind::Eol), "expected ';'")?;
            return Ok(Node::Expr(Stmt::Call { name: first_name, args, span }));
        }

        if matches!(self.cur.kind, TokenKind::Assign) {
            self.advance()?;
            let value = self.parse_expr(0)?;
            let span = Span::new(first_pos, 1).merge(value.span());
            self.expect_simple(|k| matches!(k, TokenKind::Eol), "expected ';'")?;
            return Ok(Node::Assign { name: first_name, name_pos: first_pos, value, span });
        }

        if matches!(self.cur.kind, TokenKind::Comma) {
            let mut names = vec![(first_name, first_pos)];
            while matches!(self.cur.kind, TokenKind::Comma) {
                self.advance()?;
                names.push(self.expect_ident("expected identifier")?);
            }
            self.expect_simple(|k| matches!(k, TokenKind::Assign), "expected '='")?;
            let mut values = vec![self.parse_expr(0)?];
            while matches!(self.cur.kind, TokenKind::Comma) {
                self.advance()?;
                values.push(self.parse_expr(0)?);
            }
            if names.len() != values.len() {
                return Err(Diagnostic::at("swap statement parity mismatch", first_pos));
            }
            self.expect_simple(|k| matches!(k, TokenKind::Eol), "expected ';'")?;
            return Ok(Node::Swap { names, values, pos: first_pos });
        }

        Err(Diagnostic::at(
            "unrecognized symbol or unused expression result",
            first_pos,
        ))
    }

    fn parse_call_args(&mut self) -> Result<(Vec<Stmt>, Pos)> {
        self.advance()?; // '('
        let mut args = Vec::new();
        if !matches!(self.cur.kind, TokenKind::RParen) {
            args.push(self.parse_expr(0)?);
            while matches!(self.cur.kind, TokenKind::Comma) {
                self.advance()?;
                args.push(self.parse_expr(0)?);
            }
        }
        self.expect_simple(|k| matches!(k, TokenKind::RParen), "expected ',' or ')'")?;
        Ok((args, self.last_end))
    }

    // ---- expressions -------------------------------------------------

    fn binop_prio(op: &str) -> i32 {
        match op {
            "*" | "/" | "%" => 2,
            "+" | "-" => 1,
            "==" | "!=" | "<" | ">" | "<=" | ">=" => 0,
            _ => unreachable!("not a binary operator: {op}"),
        }
    }

    fn peek_binop(&self) -> Option<(String, i32)> {
        match &self.cur.kind {
            TokenKind::BinOp(op) => Some((op.clone(), Self::binop_prio(op))),
            _ => None,
        }
    }

    pub fn parse_expr(&mut self, min_prio: i32) -> Result<Stmt> {
        let lhs = self.parse_primary()?;
        self.parse_binop(min_prio, lhs)
    }

    fn parse_binop(&mut self, min_prio: i32, mut lhs: Stmt) -> Result<Stmt> {
        loop {
            let Some((op, prio)) = self.peek_binop() else { break };
            if prio < min_prio {
                break;
            }
            self.advance()?; // operator
            let mut rhs = self.parse_primary()?;
            loop {
                let Some((_, next_prio)) = self.peek_binop() else { break };
                if next_prio > prio {
                    rhs = self.parse_binop(prio + 1, rhs)?;
                } else {
                    break;
                }
            }
            let span = lhs.span().merge(rhs.span());
            lhs = Stmt::BinOp { op, lhs: Box::new(lhs), rhs: Box::new(rhs), span };
        }
        Ok(lhs)
    }

    fn parse_primary(&mut self) -> Result<Stmt> {
        let pos = self.cur.pos;
        let len = self.cur.len;
        match self.cur.kind.clone() {
            TokenKind::Ident(name) => {
                self.advance()?;
                if matches!(self.cur.kind, TokenKind::LParen) {
                    let (args, end) = self.parse_call_args()?;
                    let span = Span::new(pos, (end.col - pos.col).max(1));
                    Ok(Stmt::Call { name, args, span })
                } else {
                    Ok(Stmt::Ident { name, span: Span::new(pos, len) })
                }
            }
            TokenKind::Number(raw) => {
                self.advance()?;
                Ok(Stmt::Num { raw, span: Span::new(pos, len) })
            }
            TokenKind::Character(raw) => {
                self.advance()?;
                Ok(Stmt::Num { raw, span: Span::new(pos, len) })
            }
            TokenKind::LParen => {
                self.advance()?;
                let inner = self.parse_expr(0)?;
                self.expect_simple(|k| matches!(k, TokenKind::RParen), "expected ')'")?;
                Ok(inner)
            }
            TokenKind::UnOp(op) => {
                self.advance()?;
                let val = self.parse_primary()?;
                let span = Span::new(pos, len).merge(val.span());
                Ok(Stmt::UnOp { op, val: Box::new(val), span })
            }
            TokenKind::BinOp(ref op) if op == "-" => {
                self.advance()?;
                let val = self.parse_primary()?;
                let span = Span::new(pos, len).merge(val.span());
                Ok(Stmt::UnOp { op: "-".to_string(), val: Box::new(val), span })
            }
            _ => Err(Diagnostic::at("expected an expression", pos)),
        }
    }
}

impl std::fmt::Debug for Parser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parser").field("cur", &self.cur.kind).finish()
    }
}
