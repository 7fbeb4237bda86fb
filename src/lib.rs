//! Anx Compiler Library
//!
//! Front end (lexer, parser), a closed numeric type system, SSA-form
//! lowering onto an abstract IR-builder contract, and a driver that turns
//! the result into a native executable via `clang`.
//!
//! # Extending the compiler
//!
//! Embedding hosts can register additional `@`-prefixed intrinsics without
//! forking the lowering pass:
//!
//! ```rust,ignore
//! use anxc::config::{CompilerConfig, ExternalIntrinsic};
//! use anxc::types::Type;
//! use anxc::driver;
//!
//! let config = CompilerConfig::new().with_intrinsic(ExternalIntrinsic::new(
//!     "@panic",
//!     "anx_host_panic",
//!     Type::Void,
//!     vec![Type::I32],
//! ));
//!
//! driver::compile_file_with_config("in.anx".as_ref(), "a.out".as_ref(), false, &config)?;
//! # Ok::<(), anxc::driver::DriverError>(())
//! ```

pub mod ast;
pub mod codegen;
pub mod config;
pub mod diagnostics;
pub mod driver;
pub mod intrinsics;
pub mod ir;
pub mod lexer;
pub mod parser;
pub mod pos;
pub mod symtab;
pub mod token;
pub mod types;

pub use ast::Program;
pub use codegen::Compiler;
pub use config::{CompilerConfig, ExternalIntrinsic};
pub use diagnostics::Diagnostic;
pub use driver::DriverError;
pub use ir::{IrBuilder, LlvmTextBuilder};
pub use parser::Parser;
pub use types::Type;
