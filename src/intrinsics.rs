//! The `@`-prefixed intrinsic table: lazily materialized external
//! declarations rather than a process-global registry, so the table lives on
//! the lowering context and a fresh `Compiler` always starts clean.

use std::collections::HashMap;

use crate::config::CompilerConfig;
use crate::diagnostics::{Diagnostic, Result};
use crate::ir::IrBuilder;
use crate::pos::Pos;
use crate::symtab::Symbol;
use crate::types::Type;

struct IntrinsicDef {
    symbol: String,
    return_type: Type,
    param_types: Vec<Type>,
}

/// Caches `Symbol::Function`s for intrinsics already declared to the IR
/// backend, so repeat calls to e.g. `@out` reuse one external declaration
/// instead of emitting a fresh `declare` every time.
pub struct IntrinsicTable {
    defs: HashMap<String, IntrinsicDef>,
    cache: HashMap<String, Symbol>,
}

impl IntrinsicTable {
    /// Builds the table for one compilation: the built-in `@out` plus
    /// whatever the host registered through `CompilerConfig`.
    pub fn new(config: &CompilerConfig) -> Self {
        let mut defs = HashMap::new();
        defs.insert(
            "@out".to_string(),
            IntrinsicDef {
                symbol: "anx_out".to_string(),
                return_type: Type::I32,
                param_types: vec![Type::I32],
            },
        );
        for intrinsic in &config.external_intrinsics {
            defs.insert(
                intrinsic.anx_name.clone(),
                IntrinsicDef {
                    symbol: intrinsic.symbol.clone(),
                    return_type: intrinsic.return_type,
                    param_types: intrinsic.param_types.clone(),
                },
            );
        }
        IntrinsicTable {
            defs,
            cache: HashMap::new(),
        }
    }

    /// Resolves `name` (including the leading `@`) to a `Function` symbol,
    /// declaring it to `ir` on first use.
    pub fn resolve(&mut self, name: &str, pos: Pos, ir: &mut dyn IrBuilder) -> Result<Symbol> {
        if let Some(sym) = self.cache.get(name) {
            return Ok(sym.clone());
        }
        let def = self
            .defs
            .get(name)
            .ok_or_else(|| Diagnostic::at(format!("unrecognized intrinsic function {name}"), pos))?;
        ir.declare_external(&def.symbol, def.return_type, &def.param_types);
        let sym = Symbol::Function {
            handle: def.symbol.clone(),
            return_type: def.return_type,
            param_types: def.param_types.clone(),
        };
        self.cache.insert(name.to_string(), sym.clone());
        Ok(sym)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExternalIntrinsic;
    use crate::ir::LlvmTextBuilder;

    #[test]
    fn resolves_builtin_out() {
        let mut table = IntrinsicTable::new(&CompilerConfig::new());
        let mut ir = LlvmTextBuilder::new();
        let sym = table.resolve("@out", Pos::default(), &mut ir).unwrap();
        match sym {
            Symbol::Function { handle, return_type, param_types } => {
                assert_eq!(handle, "anx_out");
                assert_eq!(return_type, Type::I32);
                assert_eq!(param_types, vec![Type::I32]);
            }
            _ => panic!("expected function symbol"),
        }
        assert!(ir.render().contains("declare i32 @anx_out(i32)"));
    }

    #[test]
    fn repeat_resolution_reuses_cache_without_redeclaring() {
        let mut table = IntrinsicTable::new(&CompilerConfig::new());
        let mut ir = LlvmTextBuilder::new();
        table.resolve("@out", Pos::default(), &mut ir).unwrap();
        table.resolve("@out", Pos::default(), &mut ir).unwrap();
        let text = ir.render();
        assert_eq!(text.matches("declare").count(), 1);
    }

    #[test]
    fn unknown_intrinsic_errors() {
        let mut table = IntrinsicTable::new(&CompilerConfig::new());
        let mut ir = LlvmTextBuilder::new();
        assert!(table.resolve("@nope", Pos::default(), &mut ir).is_err());
    }

    #[test]
    fn host_registered_intrinsics_resolve() {
        let config = CompilerConfig::new().with_intrinsic(ExternalIntrinsic::new(
            "@panic",
            "anx_host_panic",
            Type::Void,
            vec![Type::I32],
        ));
        let mut table = IntrinsicTable::new(&config);
        let mut ir = LlvmTextBuilder::new();
        let sym = table.resolve("@panic", Pos::default(), &mut ir).unwrap();
        match sym {
            Symbol::Function { handle, .. } => assert_eq!(handle, "anx_host_panic"),
            _ => panic!("expected function symbol"),
        }
    }
}
