//! Compiler configuration for extensibility.
//!
//! Lets an embedding host register additional `@`-prefixed intrinsics beyond
//! the built-in `@out`, without modifying the lowering pass.
//!
//! # Example
//!
//! ```rust,ignore
//! use anxc::{CompilerConfig, ExternalIntrinsic};
//! use anxc::types::Type;
//!
//! let config = CompilerConfig::new().with_intrinsic(ExternalIntrinsic::new(
//!     "@panic",
//!     "anx_host_panic",
//!     Type::Void,
//!     vec![Type::I32],
//! ));
//! ```

use serde::Deserialize;

use crate::types::Type;

/// Definition of a host-provided intrinsic function.
///
/// External intrinsics are declared to the IR backend as ordinary external
/// functions and called exactly like the built-in `@out`; the host is
/// responsible for linking an implementation under `symbol`.
#[derive(Debug, Clone)]
pub struct ExternalIntrinsic {
    /// The `@`-prefixed name used in Anx source (e.g. `"@panic"`).
    pub anx_name: String,

    /// The symbol name for linking (e.g. `"anx_host_panic"`).
    ///
    /// Must contain only alphanumeric characters and underscores; this is
    /// validated at construction time since it is spliced directly into
    /// emitted LLVM-IR.
    pub symbol: String,

    pub return_type: Type,
    pub param_types: Vec<Type>,
}

impl ExternalIntrinsic {
    fn validate_symbol(symbol: &str) {
        assert!(!symbol.is_empty(), "intrinsic symbol cannot be empty");
        for c in symbol.chars() {
            assert!(
                c.is_alphanumeric() || c == '_',
                "invalid character '{c}' in intrinsic symbol '{symbol}': \
                 symbols may only contain alphanumeric characters and underscores"
            );
        }
    }

    pub fn new(
        anx_name: impl Into<String>,
        symbol: impl Into<String>,
        return_type: Type,
        param_types: Vec<Type>,
    ) -> Self {
        let symbol = symbol.into();
        Self::validate_symbol(&symbol);
        ExternalIntrinsic {
            anx_name: anx_name.into(),
            symbol,
            return_type,
            param_types,
        }
    }
}

/// Configuration for the Anx compiler.
///
/// Lets an embedding host extend the compiler with additional intrinsics
/// without forking `lowering.rs`.
#[derive(Debug, Clone, Default)]
pub struct CompilerConfig {
    pub external_intrinsics: Vec<ExternalIntrinsic>,
}

impl CompilerConfig {
    pub fn new() -> Self {
        CompilerConfig::default()
    }

    pub fn with_intrinsic(mut self, intrinsic: ExternalIntrinsic) -> Self {
        self.external_intrinsics.push(intrinsic);
        self
    }

    pub fn with_intrinsics(
        mut self,
        intrinsics: impl IntoIterator<Item = ExternalIntrinsic>,
    ) -> Self {
        self.external_intrinsics.extend(intrinsics);
        self
    }

    /// Anx-side names of every configured intrinsic, used to reject
    /// duplicate registration against the built-in table.
    pub fn intrinsic_names(&self) -> Vec<&str> {
        self.external_intrinsics
            .iter()
            .map(|i| i.anx_name.as_str())
            .collect()
    }

    /// Loads intrinsics from a TOML manifest, the declarative alternative to
    /// `with_intrinsic` for hosts that would rather ship a config file than
    /// link Rust code:
    ///
    /// ```toml
    /// [[intrinsic]]
    /// anx_name = "@panic"
    /// symbol = "anx_host_panic"
    /// return_type = "void"
    /// param_types = ["i32"]
    /// ```
    pub fn from_toml_str(contents: &str) -> Result<Self, String> {
        let manifest: IntrinsicManifest =
            toml::from_str(contents).map_err(|e| format!("failed to parse intrinsic manifest: {e}"))?;
        let mut config = CompilerConfig::new();
        for entry in manifest.intrinsic {
            let return_type = Type::from_str(&entry.return_type, true, crate::pos::Span::default())
                .map_err(|d| d.message)?;
            let param_types = entry
                .param_types
                .iter()
                .map(|name| {
                    Type::from_str(name, false, crate::pos::Span::default()).map_err(|d| d.message)
                })
                .collect::<Result<Vec<_>, _>>()?;
            config = config.with_intrinsic(ExternalIntrinsic::new(
                entry.anx_name,
                entry.symbol,
                return_type,
                param_types,
            ));
        }
        Ok(config)
    }
}

#[derive(Debug, Deserialize)]
struct IntrinsicManifest {
    #[serde(default, rename = "intrinsic")]
    intrinsic: Vec<IntrinsicEntry>,
}

#[derive(Debug, Deserialize)]
struct IntrinsicEntry {
    anx_name: String,
    symbol: String,
    return_type: String,
    #[serde(default)]
    param_types: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_intrinsic_new() {
        let i = ExternalIntrinsic::new("@panic", "anx_host_panic", Type::Void, vec![Type::I32]);
        assert_eq!(i.anx_name, "@panic");
        assert_eq!(i.symbol, "anx_host_panic");
        assert_eq!(i.param_types, vec![Type::I32]);
    }

    #[test]
    fn config_builder_accumulates() {
        let config = CompilerConfig::new()
            .with_intrinsic(ExternalIntrinsic::new("@a", "sym_a", Type::Void, vec![]))
            .with_intrinsic(ExternalIntrinsic::new("@b", "sym_b", Type::Void, vec![]));
        assert_eq!(config.external_intrinsics.len(), 2);
        assert_eq!(config.intrinsic_names(), vec!["@a", "@b"]);
    }

    #[test]
    #[should_panic(expected = "invalid character")]
    fn rejects_symbol_with_hyphen() {
        let _ = ExternalIntrinsic::new("@a", "bad-symbol", Type::Void, vec![]);
    }

    #[test]
    #[should_panic(expected = "invalid character")]
    fn rejects_symbol_with_at() {
        let _ = ExternalIntrinsic::new("@a", "@injected", Type::Void, vec![]);
    }

    #[test]
    fn loads_intrinsics_from_toml_manifest() {
        let toml = r#"
            [[intrinsic]]
            anx_name = "@panic"
            symbol = "anx_host_panic"
            return_type = "void"
            param_types = ["i32"]

            [[intrinsic]]
            anx_name = "@getc"
            symbol = "anx_host_getc"
            return_type = "i32"
        "#;
        let config = CompilerConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.external_intrinsics.len(), 2);
        assert_eq!(config.external_intrinsics[0].anx_name, "@panic");
        assert_eq!(config.external_intrinsics[0].return_type, Type::Void);
        assert_eq!(config.external_intrinsics[0].param_types, vec![Type::I32]);
        assert_eq!(config.external_intrinsics[1].param_types, Vec::new());
    }

    #[test]
    fn rejects_manifest_with_unknown_type_name() {
        let toml = r#"
            [[intrinsic]]
            anx_name = "@bad"
            symbol = "anx_bad"
            return_type = "not_a_type"
        "#;
        assert!(CompilerConfig::from_toml_str(toml).is_err());
    }
}
