//! 字面量、常量和运行时成员值使用的标量值

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;

use crate::error::ParseError;
use crate::schema::MemberType;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Decimal(BigDecimal),
    String(String),
    Char(char),
    /// 枚举成员的底层整数
    Enum(i64),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Decimal(_) => "decimal",
            Value::String(_) => "string",
            Value::Char(_) => "char",
            Value::Enum(_) => "enum",
        }
    }

    /// 读取无符号数字字面量: 放得下时为 `Int`, 否则为 `Decimal`
    pub fn from_number_literal(text: &str) -> Option<Value> {
        if !text.contains('.') {
            if let Ok(n) = text.parse::<i64>() {
                return Some(Value::Int(n));
            }
        }
        BigDecimal::from_str(text).ok().map(Value::Decimal)
    }

    /// 将值转换为可以代表 `ty` 类型成员的值
    ///
    /// 整数可以拓宽为 decimal 或枚举的整数, 单字符字符串转为 char,
    /// 只有可空类型接受 null
    pub fn coerce_to(self, ty: &MemberType) -> Result<Value, ParseError> {
        let mismatch = |found: &Value| ParseError::TypeMismatch {
            expected: ty.to_string(),
            found: found.kind_name().to_string(),
        };

        if self.is_null() {
            return if ty.is_nullable() {
                Ok(Value::Null)
            } else {
                Err(mismatch(&self))
            };
        }

        match (ty.underlying(), self) {
            (MemberType::Bool, v @ Value::Bool(_)) => Ok(v),
            (MemberType::Int, v @ Value::Int(_)) => Ok(v),
            (MemberType::Decimal, v @ Value::Decimal(_)) => Ok(v),
            (MemberType::Decimal, Value::Int(n)) => Ok(Value::Decimal(BigDecimal::from(n))),
            (MemberType::String, v @ Value::String(_)) => Ok(v),
            (MemberType::Char, v @ Value::Char(_)) => Ok(v),
            (MemberType::Char, Value::String(s)) => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(Value::Char(c)),
                    _ => Err(mismatch(&Value::String(s))),
                }
            }
            (MemberType::Enum(_), v @ Value::Enum(_)) => Ok(v),
            (MemberType::Enum(_), Value::Int(n)) => Ok(Value::Enum(n)),
            (_, other) => Err(mismatch(&other)),
        }
    }

    /// 没有其他约束时该常量的成员类型
    pub fn natural_type(&self) -> Option<MemberType> {
        match self {
            Value::Bool(_) => Some(MemberType::Bool),
            Value::Int(_) => Some(MemberType::Int),
            Value::Decimal(_) => Some(MemberType::Decimal),
            Value::String(_) => Some(MemberType::String),
            Value::Char(_) => Some(MemberType::Char),
            Value::Null | Value::Enum(_) => None,
        }
    }

    /// 比较同种类的两个值, null 或种类不同时为 `None`。
    /// 枚举按底层整数比较, 因此 `Int` 与 `Enum` 可以互相比较
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a) | Value::Enum(a), Value::Int(b) | Value::Enum(b)) => Some(a.cmp(b)),
            (Value::Decimal(a), Value::Decimal(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Decimal(b)) => Some(BigDecimal::from(*a).cmp(b)),
            (Value::Decimal(a), Value::Int(b)) => Some(a.cmp(&BigDecimal::from(*b))),
            (Value::Char(a), Value::Char(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) | Value::Enum(n) => write!(f, "{}", n),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::String(s) => write!(f, "{}", s),
            Value::Char(c) => write!(f, "{}", c),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<BigDecimal> for Value {
    fn from(value: BigDecimal) -> Self {
        Value::Decimal(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<char> for Value {
    fn from(value: char) -> Self {
        Value::Char(value)
    }
}

impl<V: Into<Value>> From<Option<V>> for Value {
    fn from(value: Option<V>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}
