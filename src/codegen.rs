//! Semantic lowering: AST -> SSA IR.
//!
//! Split into this thin mod file plus `codegen::lowering`, which holds the
//! recursive AST walk and the numeric coercion matrix. Splitting the
//! coercion matrix out of `types.rs` keeps `Type` itself free of any
//! dependency on the `IrBuilder` trait -- applying a coercion emits IR, while
//! deciding whether one is legal does not.

pub mod lowering;

pub use lowering::{coerce, Compiler};
