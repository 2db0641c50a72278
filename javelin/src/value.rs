use std::fmt;

use crate::heap::Gc;

/// A single operand-stack or local-variable slot.
///
/// Longs and doubles occupy one slot each; the declared `max_stack` /
/// `max_locals` of a method counts slots in this representation.
#[derive(Debug, Clone, Default)]
pub enum Value {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    #[default]
    Null,
    Ref(Gc),
}

impl Value {
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Null => "null",
            Value::Ref(_) => "reference",
        }
    }

    #[must_use]
    pub fn is_reference(&self) -> bool {
        matches!(self, Value::Null | Value::Ref(_))
    }

    /// Reference identity, with both-null counting as equal.
    #[must_use]
    pub fn ref_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Ref(a), Value::Ref(b)) => Gc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Ref(a), Value::Ref(b)) => Gc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Long(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Null => write!(f, "null"),
            Value::Ref(gc) => write!(f, "{}@{:x}", gc.type_name(), Gc::address(gc)),
        }
    }
}

/// Primitive and reference type tags used in field layouts and method
/// signatures. Reference tags carry the fully qualified type name; the
/// linker resolves them against the registry on first use.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Ty {
    Int,
    Long,
    Float,
    Double,
    Ref(String),
}

impl Ty {
    /// Zero value a freshly allocated slot of this type holds.
    #[must_use]
    pub fn zero(&self) -> Value {
        match self {
            Ty::Int => Value::Int(0),
            Ty::Long => Value::Long(0),
            Ty::Float => Value::Float(0.0),
            Ty::Double => Value::Double(0.0),
            Ty::Ref(_) => Value::Null,
        }
    }

    #[must_use]
    pub fn object(name: impl Into<String>) -> Ty {
        Ty::Ref(name.into())
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Int => write!(f, "I"),
            Ty::Long => write!(f, "J"),
            Ty::Float => write!(f, "F"),
            Ty::Double => write!(f, "D"),
            Ty::Ref(name) => write!(f, "L{name};"),
        }
    }
}

// Narrowing float-to-integer conversions saturate at the target bounds and
// map NaN to zero. Rust's `as` casts have had exactly these semantics since
// 1.45, but the interpreter goes through these helpers so the contract is
// pinned by the unit tests below rather than by a language reference.

#[inline]
#[must_use]
pub fn f32_to_i32(v: f32) -> i32 {
    v as i32
}

#[inline]
#[must_use]
pub fn f32_to_i64(v: f32) -> i64 {
    v as i64
}

#[inline]
#[must_use]
pub fn f64_to_i32(v: f64) -> i32 {
    v as i32
}

#[inline]
#[must_use]
pub fn f64_to_i64(v: f64) -> i64 {
    v as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrowing_saturates_above_and_below() {
        assert_eq!(f32_to_i32(3.0e10), i32::MAX);
        assert_eq!(f32_to_i32(-3.0e10), i32::MIN);
        assert_eq!(f64_to_i32(1.0e100), i32::MAX);
        assert_eq!(f64_to_i32(-1.0e100), i32::MIN);
        assert_eq!(f32_to_i64(f32::INFINITY), i64::MAX);
        assert_eq!(f64_to_i64(f64::NEG_INFINITY), i64::MIN);
        assert_eq!(f64_to_i64(1.0e300), i64::MAX);
    }

    #[test]
    fn narrowing_maps_nan_to_zero() {
        assert_eq!(f32_to_i32(f32::NAN), 0);
        assert_eq!(f32_to_i64(f32::NAN), 0);
        assert_eq!(f64_to_i32(f64::NAN), 0);
        assert_eq!(f64_to_i64(f64::NAN), 0);
    }

    #[test]
    fn narrowing_truncates_toward_zero_in_range() {
        assert_eq!(f64_to_i32(2.9), 2);
        assert_eq!(f64_to_i32(-2.9), -2);
        assert_eq!(f32_to_i64(-0.5), 0);
    }

    #[test]
    fn ty_zero_values() {
        assert_eq!(Ty::Int.zero(), Value::Int(0));
        assert_eq!(Ty::Long.zero(), Value::Long(0));
        assert_eq!(Ty::object("Point").zero(), Value::Null);
    }

    #[test]
    fn value_equality_is_by_content_for_primitives() {
        assert_eq!(Value::Int(3), Value::Int(3));
        assert_ne!(Value::Int(3), Value::Long(3));
        assert_eq!(Value::Null, Value::Null);
    }
}
