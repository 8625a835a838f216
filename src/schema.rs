//! 可绑定 Filter 的实体类型的静态成员元数据
//!
//! 每个可绑定的类型在一个 `static` [`Schema`] 中声明其可读成员,
//! 并通过 [`Record::field`] 暴露运行时的值。解析器、selector 辅助函数和 JSON
//! 解码器只通过这两个 trait 访问实体。

use std::fmt;

use crate::error::ParseError;
use crate::value::Value;

/// 可读成员的声明类型
#[derive(Debug, Clone, Copy)]
pub enum MemberType {
    Bool,
    Int,
    Decimal,
    String,
    Char,
    Enum(&'static EnumSchema),
    /// 嵌套实体。以函数形式持有, 以便 schema 之间可以互相引用
    Record(fn() -> &'static Schema),
    /// 可为 null 的值类型
    Optional(&'static MemberType),
}

impl MemberType {
    /// 去掉一层 `Optional` 之后的类型
    pub fn underlying(&self) -> MemberType {
        match self {
            MemberType::Optional(inner) => **inner,
            other => *other,
        }
    }

    /// 引用类型总是可以为 null
    pub fn is_reference(&self) -> bool {
        matches!(self, MemberType::String | MemberType::Record(_))
    }

    pub fn is_nullable(&self) -> bool {
        self.is_reference() || matches!(self, MemberType::Optional(_))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.underlying(), MemberType::Int | MemberType::Decimal)
    }

    /// 支持 `> < >= <=` 的类型
    pub fn is_ordered(&self) -> bool {
        matches!(
            self.underlying(),
            MemberType::Int | MemberType::Decimal | MemberType::Char | MemberType::Enum(_)
        )
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, MemberType::Bool)
    }

    pub fn is_string(&self) -> bool {
        matches!(self, MemberType::String)
    }

    /// (可能为 optional 的)嵌套实体类型的 schema
    pub fn record_schema(&self) -> Option<&'static Schema> {
        match self.underlying() {
            MemberType::Record(schema) => Some(schema()),
            _ => None,
        }
    }

    /// 忽略可空性后两个类型是否持有同一种值
    pub fn same_kind(&self, other: &MemberType) -> bool {
        self.underlying() == other.underlying()
    }
}

impl PartialEq for MemberType {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (MemberType::Bool, MemberType::Bool)
            | (MemberType::Int, MemberType::Int)
            | (MemberType::Decimal, MemberType::Decimal)
            | (MemberType::String, MemberType::String)
            | (MemberType::Char, MemberType::Char) => true,
            (MemberType::Enum(a), MemberType::Enum(b)) => a.name == b.name,
            (MemberType::Record(a), MemberType::Record(b)) => a().name == b().name,
            (MemberType::Optional(a), MemberType::Optional(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for MemberType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberType::Bool => f.write_str("bool"),
            MemberType::Int => f.write_str("int"),
            MemberType::Decimal => f.write_str("decimal"),
            MemberType::String => f.write_str("string"),
            MemberType::Char => f.write_str("char"),
            MemberType::Enum(e) => f.write_str(e.name),
            MemberType::Record(schema) => f.write_str(schema().name),
            MemberType::Optional(inner) => write!(f, "{}?", inner),
        }
    }
}

/// 枚举类型通过其整数表示进行比较
#[derive(Debug)]
pub struct EnumSchema {
    pub name: &'static str,
    pub variants: &'static [(&'static str, i64)],
}

impl EnumSchema {
    pub fn variant_name(&self, value: i64) -> Option<&'static str> {
        self.variants
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(name, _)| *name)
    }
}

/// 实体类型的单个可读成员
#[derive(Debug)]
pub struct Member {
    pub name: &'static str,
    pub ty: MemberType,
}

/// 实体类型声明的全部可读成员
#[derive(Debug)]
pub struct Schema {
    pub name: &'static str,
    pub members: &'static [Member],
}

impl Schema {
    pub fn member(&'static self, name: &str) -> Option<&'static Member> {
        self.members.iter().find(|m| m.name == name)
    }

    /// 解析点号分隔的成员路径, 例如 `Company.Name`
    ///
    /// 除最后一段外, 每一段都必须是实体类型的成员
    pub fn resolve_path(&'static self, path: &str) -> Result<MemberPath, ParseError> {
        let mut schema = self;
        let mut segments = Vec::new();

        for (index, name) in path.split('.').enumerate() {
            if index > 0 {
                let previous: &Member = segments[index - 1];
                schema = previous
                    .ty
                    .record_schema()
                    .ok_or_else(|| ParseError::UnknownMember {
                        path: path.to_string(),
                        type_name: previous.ty.to_string(),
                    })?;
            }
            let member = schema
                .member(name)
                .ok_or_else(|| ParseError::UnknownMember {
                    path: path.to_string(),
                    type_name: schema.name.to_string(),
                })?;
            segments.push(member);
        }

        Ok(MemberPath { segments })
    }
}

/// 已解析的非空成员链
#[derive(Debug, Clone)]
pub struct MemberPath {
    pub segments: Vec<&'static Member>,
}

impl MemberPath {
    pub fn last(&self) -> &'static Member {
        // resolve_path 不会产生空链
        self.segments[self.segments.len() - 1]
    }

    pub fn ty(&self) -> MemberType {
        self.last().ty
    }
}

impl fmt::Display for MemberPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, member) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(member.name)?;
        }
        Ok(())
    }
}

/// 成员的运行时值: 标量, 或(可能为 null 的)嵌套实体
pub enum Field<'a> {
    Value(Value),
    Record(Option<&'a dyn Record>),
}

/// 运行时访问 [`Schema`] 中声明的成员
///
/// 枚举成员可以返回 `Value::Enum` 或 `Value::Int`
pub trait Record {
    /// 名称不是该记录的成员时返回 `None`
    fn field(&self, name: &str) -> Option<Field<'_>>;
}

/// 可以绑定 Filter 和描述符的类型
pub trait Entity: Record + 'static {
    fn schema() -> &'static Schema;
}

/// 无类型投影目标的标记, 接受任意成员名
#[derive(Debug, Clone, Copy, Default)]
pub struct Dynamic;

static DYNAMIC: Schema = Schema {
    name: "object",
    members: &[],
};

impl Record for Dynamic {
    fn field(&self, _name: &str) -> Option<Field<'_>> {
        None
    }
}

impl Entity for Dynamic {
    fn schema() -> &'static Schema {
        &DYNAMIC
    }
}
