//! Type system for Anx
//!
//! A closed enumeration of numeric/bool/void types, their widths and
//! signedness classes, plus the `to_string`/`from_str` pair used by the
//! parser (type annotations) and the lowering pass (diagnostics).
//!
//! The coercion matrix itself lives in `codegen::lowering` since applying a
//! coercion requires emitting IR, not just deciding it is legal.

use std::fmt;

use crate::diagnostics::{Diagnostic, Result};
use crate::pos::Span;

/// Base types in the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Void,
    Bool,
    I8,
    I16,
    I32,
    I64,
    I128,
    U8,
    U16,
    U32,
    U64,
    U128,
    F32,
    F64,
}

impl Type {
    /// Bit width. `Void` is 0, `Bool` is 1.
    pub fn width(self) -> u32 {
        match self {
            Type::Void => 0,
            Type::Bool => 1,
            Type::I8 | Type::U8 => 8,
            Type::I16 | Type::U16 => 16,
            Type::I32 | Type::U32 | Type::F32 => 32,
            Type::I64 | Type::U64 | Type::F64 => 64,
            Type::I128 | Type::U128 => 128,
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            Type::I8 | Type::I16 | Type::I32 | Type::I64 | Type::I128
        )
    }

    /// Unsigned integers *and* bool -- `bool` behaves as an unsigned
    /// one-bit integer for coercion purposes.
    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            Type::U8 | Type::U16 | Type::U32 | Type::U64 | Type::U128 | Type::Bool
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, Type::F32 | Type::F64)
    }

    pub fn is_double(self) -> bool {
        matches!(self, Type::F64)
    }

    pub fn is_bool(self) -> bool {
        matches!(self, Type::Bool)
    }

    pub fn is_void(self) -> bool {
        matches!(self, Type::Void)
    }

    pub fn is_integer(self) -> bool {
        self.is_signed() || self.is_unsigned()
    }

    /// An unsigned type of the same width, used by unary `-` on unsigned
    /// operands (the result is the signed type of equal width).
    pub fn signed_of_same_width(self) -> Type {
        match self.width() {
            8 => Type::I8,
            16 => Type::I16,
            32 => Type::I32,
            64 => Type::I64,
            128 => Type::I128,
            _ => self,
        }
    }

    /// An unsigned integer wide enough to hold `bits` bits, clamped to the
    /// three widths the numeric-literal analyzer ever synthesizes (32/64/128
    /// -- never 8 or 16, per the source's preserved quirk).
    pub fn min_unsigned_for_bits(bits: u32) -> Type {
        if bits <= 32 {
            Type::U32
        } else if bits <= 64 {
            Type::U64
        } else {
            Type::U128
        }
    }

    pub fn from_str(name: &str, allow_void: bool, span: Span) -> Result<Type> {
        let ty = match name {
            "void" => Type::Void,
            "bool" => Type::Bool,
            "i8" => Type::I8,
            "i16" => Type::I16,
            "i32" => Type::I32,
            "i64" => Type::I64,
            "i128" => Type::I128,
            "u8" => Type::U8,
            "u16" => Type::U16,
            "u32" => Type::U32,
            "u64" => Type::U64,
            "u128" => Type::U128,
            "f32" => Type::F32,
            "f64" => Type::F64,
            other => {
                return Err(Diagnostic::spanning(
                    format!("unrecognized type '{other}'"),
                    span,
                ));
            }
        };
        if ty.is_void() && !allow_void {
            return Err(Diagnostic::spanning("void not allowed here", span));
        }
        Ok(ty)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Type::Void => "void",
            Type::Bool => "bool",
            Type::I8 => "i8",
            Type::I16 => "i16",
            Type::I32 => "i32",
            Type::I64 => "i64",
            Type::I128 => "i128",
            Type::U8 => "u8",
            Type::U16 => "u16",
            Type::U32 => "u32",
            Type::U64 => "u64",
            Type::U128 => "u128",
            Type::F32 => "f32",
            Type::F64 => "f64",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pos::Pos;

    fn span() -> Span {
        Span::point(Pos::new(0, 0))
    }

    #[test]
    fn width_matches_suffix() {
        assert_eq!(Type::I32.width(), 32);
        assert_eq!(Type::U128.width(), 128);
        assert_eq!(Type::Bool.width(), 1);
        assert_eq!(Type::Void.width(), 0);
    }

    #[test]
    fn signedness_classes() {
        assert!(Type::I16.is_signed());
        assert!(!Type::I16.is_unsigned());
        assert!(Type::U16.is_unsigned());
        assert!(Type::Bool.is_unsigned());
        assert!(!Type::Bool.is_signed());
        assert!(Type::F32.is_float());
        assert!(!Type::F32.is_double());
        assert!(Type::F64.is_double());
    }

    #[test]
    fn from_str_round_trips_through_display() {
        for name in [
            "void", "bool", "i8", "i16", "i32", "i64", "i128", "u8", "u16", "u32", "u64",
            "u128", "f32", "f64",
        ] {
            let ty = Type::from_str(name, true, span()).unwrap();
            assert_eq!(ty.to_string(), name);
        }
    }

    #[test]
    fn void_rejected_unless_allowed() {
        assert!(Type::from_str("void", false, span()).is_err());
        assert!(Type::from_str("void", true, span()).is_ok());
    }

    #[test]
    fn unknown_type_name_fails() {
        let err = Type::from_str("i33", true, span()).unwrap_err();
        assert!(err.message.contains("unrecognized type"));
    }

    #[test]
    fn min_unsigned_for_bits_boundaries() {
        assert_eq!(Type::min_unsigned_for_bits(32), Type::U32);
        assert_eq!(Type::min_unsigned_for_bits(33), Type::U64);
        assert_eq!(Type::min_unsigned_for_bits(64), Type::U64);
        assert_eq!(Type::min_unsigned_for_bits(65), Type::U128);
    }
}
