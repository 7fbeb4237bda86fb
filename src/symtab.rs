//! Symbol table: a stack of lexical scopes mapping mangled names to symbols.

use std::collections::HashMap;

use crate::diagnostics::{Diagnostic, Result};
use crate::pos::Pos;
use crate::types::Type;

/// An opaque reference into the IR builder's own bookkeeping. The textual
/// LLVM backend realizes these as value/slot names (`"%3"`, `"%x.addr"`,
/// `"@fact.anx"`); other backends could use integer ids instead.
pub type IrRef = String;

#[derive(Debug, Clone)]
pub enum Symbol {
    Function {
        handle: IrRef,
        return_type: Type,
        param_types: Vec<Type>,
    },
    /// A non-addressable SSA value: a function parameter binding or an
    /// intermediate expression result.
    Value { handle: IrRef, ty: Type },
    /// An addressable stack slot.
    Variable { slot: IrRef, ty: Type },
}

/// `main` is kept unmangled; every other name is reserved into the `.anx`
/// namespace so user code can never collide with externally-linked runtime
/// symbols.
pub fn mangle(name: &str) -> String {
    if name == "main" {
        "main".to_string()
    } else {
        format!("{name}.anx")
    }
}

#[derive(Default)]
pub struct SymbolTable {
    scopes: Vec<HashMap<String, Symbol>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable { scopes: Vec::new() }
    }

    pub fn push(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop(&mut self) {
        self.scopes.pop();
    }

    /// Always inserts into the innermost (top) scope.
    pub fn add(&mut self, name: &str, symbol: Symbol) {
        let mangled = mangle(name);
        self.scopes
            .last_mut()
            .expect("add called with no open scope")
            .insert(mangled, symbol);
    }

    /// Whether `name` already exists in the *innermost* scope only, used by
    /// the same-scope shadowing check.
    pub fn exists_in_top_scope(&self, name: &str) -> bool {
        let mangled = mangle(name);
        self.scopes
            .last()
            .is_some_and(|scope| scope.contains_key(&mangled))
    }

    /// Searches from innermost to outermost scope.
    pub fn search(&self, name: &str, pos: Pos) -> Result<Symbol> {
        let mangled = mangle(name);
        for scope in self.scopes.iter().rev() {
            if let Some(sym) = scope.get(&mangled) {
                return Ok(sym.clone());
            }
        }
        Err(Diagnostic::at(
            format!("unrecognized symbol '{name}'"),
            pos,
        ))
    }

    /// Whether `name` resolves to *any* scope, without erroring (used to
    /// decide between "declare" and "redeclare" at the top level, where the
    /// table only has one scope open anyway).
    pub fn exists(&self, name: &str) -> bool {
        let mangled = mangle(name);
        self.scopes.iter().rev().any(|scope| scope.contains_key(&mangled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mangling_reserves_main() {
        assert_eq!(mangle("main"), "main");
        assert_eq!(mangle("fact"), "fact.anx");
    }

    #[test]
    fn lookup_searches_innermost_out() {
        let mut t = SymbolTable::new();
        t.push();
        t.add("x", Symbol::Value { handle: "%0".into(), ty: Type::I32 });
        t.push();
        t.add("x", Symbol::Value { handle: "%1".into(), ty: Type::I64 });
        let sym = t.search("x", Pos::default()).unwrap();
        match sym {
            Symbol::Value { handle, .. } => assert_eq!(handle, "%1"),
            _ => panic!("expected value"),
        }
        t.pop();
        let sym = t.search("x", Pos::default()).unwrap();
        match sym {
            Symbol::Value { handle, .. } => assert_eq!(handle, "%0"),
            _ => panic!("expected value"),
        }
    }

    #[test]
    fn unknown_symbol_errors() {
        let t = SymbolTable::new();
        assert!(t.search("nope", Pos::default()).is_err());
    }

    #[test]
    fn top_scope_shadow_check_ignores_outer_scopes() {
        let mut t = SymbolTable::new();
        t.push();
        t.add("x", Symbol::Value { handle: "%0".into(), ty: Type::I32 });
        t.push();
        assert!(!t.exists_in_top_scope("x"));
        t.add("x", Symbol::Value { handle: "%1".into(), ty: Type::I32 });
        assert!(t.exists_in_top_scope("x"));
    }

    #[test]
    fn popped_scope_is_no_longer_searched() {
        let mut t = SymbolTable::new();
        t.push();
        t.push();
        t.add("y", Symbol::Value { handle: "%0".into(), ty: Type::I32 });
        t.pop();
        assert!(!t.exists("y"));
    }
}
