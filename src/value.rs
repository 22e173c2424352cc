//! Runtime values for typed buffer access.

use std::fmt;

/// A single field value as read from or written to a block buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Byte(u8),
    /// Raw character byte.
    Char(u8),
    /// 16-bit signed (Int).
    Int(i16),
    /// 16-bit unsigned (Word, S5Time, Date).
    Word(u16),
    /// 32-bit signed (DInt, Time).
    DInt(i32),
    /// 32-bit unsigned (DWord, UDInt, Time_of_Day).
    DWord(u32),
    Real(f32),
    DReal(f64),
    Str(String),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Byte(x) => Some(*x as i64),
            Value::Char(x) => Some(*x as i64),
            Value::Int(x) => Some(*x as i64),
            Value::Word(x) => Some(*x as i64),
            Value::DInt(x) => Some(*x as i64),
            Value::DWord(x) => Some(*x as i64),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Byte(x) => Some(*x as u64),
            Value::Char(x) => Some(*x as u64),
            Value::Word(x) => Some(*x as u64),
            Value::DWord(x) => Some(*x as u64),
            Value::Int(x) => u64::try_from(*x).ok(),
            Value::DInt(x) => u64::try_from(*x).ok(),
            _ => None,
        }
    }

    /// Numeric view: floats directly, integers widened.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(x) => Some(*x as f64),
            Value::DReal(x) => Some(*x),
            _ => self.as_i64().map(|i| i as f64),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(x) => write!(f, "{}", x),
            Value::Byte(x) => write!(f, "{}", x),
            Value::Char(x) => write!(f, "{}", *x as char),
            Value::Int(x) => write!(f, "{}", x),
            Value::Word(x) => write!(f, "{}", x),
            Value::DInt(x) => write!(f, "{}", x),
            Value::DWord(x) => write!(f, "{}", x),
            Value::Real(x) => write!(f, "{}", x),
            Value::DReal(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{}", s),
        }
    }
}
