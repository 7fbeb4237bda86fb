//! Abstract Syntax Tree for Anx.
//!
//! A tagged-variant tree rather than a class hierarchy: one recursive
//! `lower` function walks `Node`/`Stmt` and matches exhaustively, so adding a
//! variant here is a compile error everywhere it isn't handled.

use crate::pos::{Pos, Span};

#[derive(Debug, Clone)]
pub struct Program {
    pub decls: Vec<FnDecl>,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub type_name: String,
    pub pos: Pos,
}

#[derive(Debug, Clone)]
pub struct FnDecl {
    pub name: String,
    pub is_pub: bool,
    pub return_type: Option<String>,
    pub params: Vec<Param>,
    /// `None` means a forward declaration / external function (`;` body).
    pub body: Option<Node>,
    pub decl_pos: Pos,
    pub name_pos: Pos,
    pub end_pos: Pos,
}

#[derive(Debug, Clone)]
pub struct VarDeclElem {
    pub name: String,
    pub name_pos: Pos,
    pub declared_type: Option<String>,
    pub initializer: Option<Stmt>,
}

#[derive(Debug, Clone)]
pub enum Node {
    Scope(Vec<Node>),
    VarDecl(Vec<VarDeclElem>),
    Ret {
        value: Option<Stmt>,
        pos: Pos,
    },
    If {
        cond: Stmt,
        then_branch: Box<Node>,
        else_branch: Option<Box<Node>>,
    },
    While {
        cond: Stmt,
        step: Option<Stmt>,
        body: Option<Box<Node>>,
    },
    Break(Pos),
    Continue(Pos),
    /// A swap / parallel assignment: `n1, n2 = e1, e2;`.
    Swap {
        names: Vec<(String, Pos)>,
        values: Vec<Stmt>,
        pos: Pos,
    },
    Assign {
        name: String,
        name_pos: Pos,
        value: Stmt,
        span: Span,
    },
    Expr(Stmt),
}

/// Expression statements: every one produces a value and carries its
/// lexical span for diagnostics.
#[derive(Debug, Clone)]
pub enum Stmt {
    BinOp {
        op: String,
        lhs: Box<Stmt>,
        rhs: Box<Stmt>,
        span: Span,
    },
    UnOp {
        op: String,
        val: Box<Stmt>,
        span: Span,
    },
    Call {
        name: String,
        args: Vec<Stmt>,
        span: Span,
    },
    Ident {
        name: String,
        span: Span,
    },
    Num {
        raw: String,
        span: Span,
    },
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::BinOp { span, .. }
            | Stmt::UnOp { span, .. }
            | Stmt::Call { span, .. }
            | Stmt::Ident { span, .. }
            | Stmt::Num { span, .. } => *span,
        }
    }
}
