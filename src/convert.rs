//! Scalar conversion engine
//!
//! Pure functions converting between a tagged [`Variant`] and the scalar kinds
//! consumers work with. Every numeric conversion goes through one generic,
//! range-checked routine parametrized by the [`Scalar`] trait:
//!
//! - integer to wider integer sign/zero-extends per the source signedness
//! - float to integer truncates toward zero, and fails with
//!   [`BridgeError::RangeOverflow`] if the truncated value does not fit
//! - float to float narrows/widens with IEEE semantics
//! - booleans behave as 0/1, numeric strings are parsed
//!
//! String and array copies never fail on truncation. They report how much was
//! copied ([`CopyReport`] / element count) and the caller compares counts.
//!
//! Requesting a scalar from an array or structure, or an array from a scalar,
//! fails with [`BridgeError::TypeMismatch`].

use crate::error::{BridgeError, Result};
use crate::types::{BuiltinType, Variant};
use std::fmt;

/// Intermediate numeric form used by all scalar conversions
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Signed(i64),
    Unsigned(u64),
    Float(f64),
}

impl Number {
    /// Extract a number from a scalar variant, None if the kind is incompatible
    pub fn from_variant(value: &Variant) -> Option<Number> {
        Some(match value {
            Variant::Boolean(v) => Number::Unsigned(*v as u64),
            Variant::SByte(v) => Number::Signed(*v as i64),
            Variant::Int16(v) => Number::Signed(*v as i64),
            Variant::Int32(v) => Number::Signed(*v as i64),
            Variant::Int64(v) => Number::Signed(*v),
            Variant::Byte(v) => Number::Unsigned(*v as u64),
            Variant::UInt16(v) => Number::Unsigned(*v as u64),
            Variant::UInt32(v) => Number::Unsigned(*v as u64),
            Variant::UInt64(v) => Number::Unsigned(*v),
            Variant::Float(v) => Number::Float(*v as f64),
            Variant::Double(v) => Number::Float(*v),
            Variant::String(s) => return Number::parse(s),
            Variant::Empty | Variant::Array(_) | Variant::Structure(_) => return None,
        })
    }

    /// Parse a numeric string, preferring the integer forms
    pub fn parse(s: &str) -> Option<Number> {
        let s = s.trim();
        if let Ok(v) = s.parse::<i64>() {
            return Some(Number::Signed(v));
        }
        if let Ok(v) = s.parse::<u64>() {
            return Some(Number::Unsigned(v));
        }
        s.parse::<f64>().ok().map(Number::Float)
    }

    fn cast<T: num_traits::NumCast>(self) -> Option<T> {
        match self {
            Number::Signed(v) => num_traits::cast(v),
            Number::Unsigned(v) => num_traits::cast(v),
            Number::Float(v) => num_traits::cast(v),
        }
    }

    fn is_zero(self) -> bool {
        match self {
            Number::Signed(v) => v == 0,
            Number::Unsigned(v) => v == 0,
            Number::Float(v) => v == 0.0,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Signed(v) => write!(f, "{}", v),
            Number::Unsigned(v) => write!(f, "{}", v),
            Number::Float(v) => write!(f, "{}", v),
        }
    }
}

/// A scalar kind a consumer can read or write
pub trait Scalar: Copy + Default + fmt::Debug + Send + Sync + 'static {
    /// The native type this scalar maps to when no other type is known
    const BUILTIN: BuiltinType;

    /// Range-checked conversion from the intermediate form
    fn from_number(n: Number) -> Option<Self>;

    fn to_number(self) -> Number;

    fn into_variant(self) -> Variant;
}

macro_rules! impl_scalar_int {
    ($($t:ty => $builtin:ident, $num:ident, $wide:ty);* $(;)?) => {
        $(
            impl Scalar for $t {
                const BUILTIN: BuiltinType = BuiltinType::$builtin;

                fn from_number(n: Number) -> Option<Self> {
                    n.cast::<$t>()
                }

                fn to_number(self) -> Number {
                    Number::$num(self as $wide)
                }

                fn into_variant(self) -> Variant {
                    Variant::$builtin(self)
                }
            }
        )*
    };
}

macro_rules! impl_scalar_float {
    ($($t:ty => $builtin:ident);* $(;)?) => {
        $(
            impl Scalar for $t {
                const BUILTIN: BuiltinType = BuiltinType::$builtin;

                fn from_number(n: Number) -> Option<Self> {
                    Some(match n {
                        Number::Signed(v) => v as $t,
                        Number::Unsigned(v) => v as $t,
                        Number::Float(v) => v as $t,
                    })
                }

                fn to_number(self) -> Number {
                    Number::Float(self as f64)
                }

                fn into_variant(self) -> Variant {
                    Variant::$builtin(self)
                }
            }
        )*
    };
}

impl_scalar_int! {
    i8 => SByte, Signed, i64;
    i16 => Int16, Signed, i64;
    i32 => Int32, Signed, i64;
    i64 => Int64, Signed, i64;
    u8 => Byte, Unsigned, u64;
    u16 => UInt16, Unsigned, u64;
    u32 => UInt32, Unsigned, u64;
    u64 => UInt64, Unsigned, u64;
}

impl_scalar_float! {
    f32 => Float;
    f64 => Double;
}

impl Scalar for bool {
    const BUILTIN: BuiltinType = BuiltinType::Boolean;

    fn from_number(n: Number) -> Option<Self> {
        Some(!n.is_zero())
    }

    fn to_number(self) -> Number {
        Number::Unsigned(self as u64)
    }

    fn into_variant(self) -> Variant {
        Variant::Boolean(self)
    }
}

/// Result of a bounded string copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyReport {
    /// Bytes copied, not counting the terminating NUL
    pub copied: usize,
    /// Length of the source in bytes
    pub source_len: usize,
}

impl CopyReport {
    pub fn is_truncated(&self) -> bool {
        self.copied < self.source_len
    }
}

/// Convert a scalar variant to `T`
pub fn to_scalar<T: Scalar>(value: &Variant) -> Result<T> {
    let n = Number::from_variant(value)
        .ok_or_else(|| BridgeError::type_mismatch(value.kind_name(), T::BUILTIN))?;
    T::from_number(n).ok_or_else(|| BridgeError::range_overflow(n, T::BUILTIN))
}

/// Render a scalar variant as text
pub fn to_text(value: &Variant) -> Result<String> {
    match value {
        Variant::String(s) => Ok(s.clone()),
        Variant::Empty | Variant::Array(_) | Variant::Structure(_) => {
            Err(BridgeError::type_mismatch(value.kind_name(), BuiltinType::String))
        }
        scalar => Ok(scalar.to_string()),
    }
}

/// Copy `src` into `dest`, always NUL-terminating
///
/// At most `dest.len() - 1` bytes are copied. An empty destination receives
/// nothing.
pub fn copy_cstring(src: &str, dest: &mut [u8]) -> CopyReport {
    let source_len = src.len();
    if dest.is_empty() {
        return CopyReport {
            copied: 0,
            source_len,
        };
    }
    let n = source_len.min(dest.len() - 1);
    dest[..n].copy_from_slice(&src.as_bytes()[..n]);
    dest[n] = 0;
    CopyReport {
        copied: n,
        source_len,
    }
}

fn array_elements<'a>(value: &'a Variant, requested: &str) -> Result<&'a [Variant]> {
    value
        .as_array()
        .ok_or_else(|| BridgeError::type_mismatch(value.kind_name(), format!("Array of {}", requested)))
}

/// Copy `min(source length, dest.len())` converted elements into `dest`
///
/// Returns the number of elements copied. On a conversion error the contents
/// of `dest` are unspecified.
pub fn copy_array<T: Scalar>(value: &Variant, dest: &mut [T]) -> Result<usize> {
    let elements = array_elements(value, &T::BUILTIN.to_string())?;
    let n = elements.len().min(dest.len());
    for (slot, element) in dest.iter_mut().zip(&elements[..n]) {
        *slot = to_scalar(element)?;
    }
    Ok(n)
}

/// Copy an array as fixed-width NUL-terminated strings
pub fn copy_string_array<const N: usize>(value: &Variant, dest: &mut [[u8; N]]) -> Result<usize> {
    let elements = array_elements(value, "String")?;
    let n = elements.len().min(dest.len());
    for (slot, element) in dest.iter_mut().zip(&elements[..n]) {
        copy_cstring(&to_text(element)?, slot);
    }
    Ok(n)
}

/// Build a variant of kind `target` from a number
pub fn number_to_variant(n: Number, target: BuiltinType) -> Result<Variant> {
    let overflow = || BridgeError::range_overflow(n, target);
    Ok(match target {
        BuiltinType::Boolean => Variant::Boolean(!n.is_zero()),
        BuiltinType::SByte => Variant::SByte(i8::from_number(n).ok_or_else(overflow)?),
        BuiltinType::Byte => Variant::Byte(u8::from_number(n).ok_or_else(overflow)?),
        BuiltinType::Int16 => Variant::Int16(i16::from_number(n).ok_or_else(overflow)?),
        BuiltinType::UInt16 => Variant::UInt16(u16::from_number(n).ok_or_else(overflow)?),
        BuiltinType::Int32 => Variant::Int32(i32::from_number(n).ok_or_else(overflow)?),
        BuiltinType::UInt32 => Variant::UInt32(u32::from_number(n).ok_or_else(overflow)?),
        BuiltinType::Int64 => Variant::Int64(i64::from_number(n).ok_or_else(overflow)?),
        BuiltinType::UInt64 => Variant::UInt64(u64::from_number(n).ok_or_else(overflow)?),
        BuiltinType::Float => Variant::Float(f32::from_number(n).ok_or_else(overflow)?),
        BuiltinType::Double => Variant::Double(f64::from_number(n).ok_or_else(overflow)?),
        BuiltinType::String => Variant::String(n.to_string()),
        BuiltinType::Null => return Err(BridgeError::type_mismatch("Number", target)),
        BuiltinType::Structure => return Err(BridgeError::type_mismatch("Number", target)),
    })
}

/// Convert an outgoing scalar to the native type of the bound path
///
/// With an unknown native type (`Null`) the value keeps its own kind.
pub fn scalar_to_native<T: Scalar>(value: T, native: BuiltinType) -> Result<Variant> {
    match native {
        BuiltinType::Null => Ok(value.into_variant()),
        BuiltinType::String => Ok(Variant::String(value.into_variant().to_string())),
        BuiltinType::Structure => Err(BridgeError::type_mismatch(T::BUILTIN, native)),
        _ => number_to_variant(value.to_number(), native),
    }
}

/// Convert an outgoing string to the native type of the bound path
pub fn text_to_native(value: &str, native: BuiltinType) -> Result<Variant> {
    match native {
        BuiltinType::Null | BuiltinType::String => Ok(Variant::String(value.to_string())),
        BuiltinType::Structure => Err(BridgeError::type_mismatch(BuiltinType::String, native)),
        _ => {
            let n = Number::parse(value)
                .ok_or_else(|| BridgeError::type_mismatch(format!("String '{}'", value), native))?;
            number_to_variant(n, native)
        }
    }
}

/// Convert an outgoing array to the native element type of the bound path
pub fn array_to_native<T: Scalar>(values: &[T], native: BuiltinType) -> Result<Variant> {
    values
        .iter()
        .map(|v| scalar_to_native(*v, native))
        .collect::<Result<Vec<_>>>()
        .map(Variant::Array)
}

/// Convert an outgoing string array to the native element type of the bound path
pub fn text_array_to_native<S: AsRef<str>>(values: &[S], native: BuiltinType) -> Result<Variant> {
    values
        .iter()
        .map(|v| text_to_native(v.as_ref(), native))
        .collect::<Result<Vec<_>>>()
        .map(Variant::Array)
}
