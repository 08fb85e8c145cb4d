//! Typed destinations for `RowSet::scan`.
//!
//! Supported targets: `i16`, `i32`, `i64`, `isize`, `String`, `Vec<u8>`,
//! `f64` and `bool`. Integer targets accept any integer value that fits
//! without loss. A `String` accepts every value through its display
//! rendering, and `Vec<u8>` accepts the bytes of a string value.

use crate::value::Value;

/// A destination that one decoded column value can be copied into.
pub trait ScanTarget {
    /// Type name used in mismatch errors.
    fn target_name(&self) -> &'static str;

    /// Stores `value`, or returns false if the types are incompatible.
    fn assign(&mut self, value: &Value) -> bool;
}

macro_rules! int_target {
    ($ty:ty, $name:literal) => {
        impl ScanTarget for $ty {
            fn target_name(&self) -> &'static str {
                $name
            }

            fn assign(&mut self, value: &Value) -> bool {
                match value.as_i64().and_then(|v| <$ty>::try_from(v).ok()) {
                    // Only accept widening from a narrower variant, never a value
                    // that merely happens to fit.
                    Some(v) if int_width(value) <= <$ty>::BITS => {
                        *self = v;
                        true
                    }
                    _ => false,
                }
            }
        }
    };
}

fn int_width(value: &Value) -> u32 {
    match value {
        Value::I16(_) => i16::BITS,
        Value::I32(_) => i32::BITS,
        _ => i64::BITS,
    }
}

int_target!(i16, "i16");
int_target!(i32, "i32");
int_target!(i64, "i64");
int_target!(isize, "isize");

impl ScanTarget for f64 {
    fn target_name(&self) -> &'static str {
        "f64"
    }

    fn assign(&mut self, value: &Value) -> bool {
        match value {
            Value::Double(v) => {
                *self = *v;
                true
            }
            _ => false,
        }
    }
}

impl ScanTarget for bool {
    fn target_name(&self) -> &'static str {
        "bool"
    }

    fn assign(&mut self, value: &Value) -> bool {
        match value {
            Value::Bool(v) => {
                *self = *v;
                true
            }
            _ => false,
        }
    }
}

impl ScanTarget for String {
    fn target_name(&self) -> &'static str {
        "String"
    }

    fn assign(&mut self, value: &Value) -> bool {
        *self = value.to_display_string();
        true
    }
}

impl ScanTarget for Vec<u8> {
    fn target_name(&self) -> &'static str {
        "Vec<u8>"
    }

    fn assign(&mut self, value: &Value) -> bool {
        match value {
            Value::String(s) => {
                *self = s.as_bytes().to_vec();
                true
            }
            _ => false,
        }
    }
}
