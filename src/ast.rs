//! 不可变的谓词/selector 表达式树
//!
//! 由解析器和构建 API 生成, 供编译、文本输出和 SQL 生成使用

use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use crate::error::{ParseError, UnsupportedConstruct};
use crate::schema::{Entity, Member, MemberType, Schema};
use crate::value::Value;

/// 比较运算符, 每种对应一种二元比较节点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ComparisonType {
    #[default]
    EqualTo,
    NotEqualTo,
    GreaterThan,
    GreaterThanOrEqualTo,
    LessThan,
    LessThanOrEqualTo,
}

impl ComparisonType {
    pub fn symbol(&self) -> &'static str {
        match self {
            ComparisonType::EqualTo => "==",
            ComparisonType::NotEqualTo => "!=",
            ComparisonType::GreaterThan => ">",
            ComparisonType::GreaterThanOrEqualTo => ">=",
            ComparisonType::LessThan => "<",
            ComparisonType::LessThanOrEqualTo => "<=",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "==" => Some(ComparisonType::EqualTo),
            "!=" => Some(ComparisonType::NotEqualTo),
            ">" => Some(ComparisonType::GreaterThan),
            ">=" => Some(ComparisonType::GreaterThanOrEqualTo),
            "<" => Some(ComparisonType::LessThan),
            "<=" => Some(ComparisonType::LessThanOrEqualTo),
            _ => None,
        }
    }

    /// `> >= < <=`, 相对于相等运算符
    pub fn is_ordering(&self) -> bool {
        !matches!(self, ComparisonType::EqualTo | ComparisonType::NotEqualTo)
    }

    /// 交换左右操作数后结果相同的运算符
    pub fn mirrored(&self) -> Self {
        match self {
            ComparisonType::GreaterThan => ComparisonType::LessThan,
            ComparisonType::GreaterThanOrEqualTo => ComparisonType::LessThanOrEqualTo,
            ComparisonType::LessThan => ComparisonType::GreaterThan,
            ComparisonType::LessThanOrEqualTo => ComparisonType::GreaterThanOrEqualTo,
            other => *other,
        }
    }

    /// 比较节点的种类名
    pub fn node_kind(&self) -> &'static str {
        match self {
            ComparisonType::EqualTo => "Equal",
            ComparisonType::NotEqualTo => "NotEqual",
            ComparisonType::GreaterThan => "GreaterThan",
            ComparisonType::GreaterThanOrEqualTo => "GreaterThanOrEqual",
            ComparisonType::LessThan => "LessThan",
            ComparisonType::LessThanOrEqualTo => "LessThanOrEqual",
        }
    }
}

/// Filter 语言可以调用的字符串方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringMethod {
    Contains,
    StartsWith,
    EndsWith,
}

impl StringMethod {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Contains" => Some(StringMethod::Contains),
            "StartsWith" => Some(StringMethod::StartsWith),
            "EndsWith" => Some(StringMethod::EndsWith),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StringMethod::Contains => "Contains",
            StringMethod::StartsWith => "StartsWith",
            StringMethod::EndsWith => "EndsWith",
        }
    }

    pub fn apply(&self, target: &str, arg: &str) -> bool {
        match self {
            StringMethod::Contains => target.contains(arg),
            StringMethod::StartsWith => target.starts_with(arg),
            StringMethod::EndsWith => target.ends_with(arg),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl ArithmeticOp {
    pub fn node_kind(&self) -> &'static str {
        match self {
            ArithmeticOp::Add => "Add",
            ArithmeticOp::Subtract => "Subtract",
            ArithmeticOp::Multiply => "Multiply",
            ArithmeticOp::Divide => "Divide",
        }
    }
}

/// 表达式节点, 构建后不可变
#[derive(Debug, Clone)]
pub enum Expr {
    /// lambda 自身的参数, 即绑定实体类型的实例
    Parameter { schema: fn() -> &'static Schema },
    Member {
        target: Box<Expr>,
        member: &'static Member,
    },
    Constant { value: Value, ty: MemberType },
    Comparison {
        op: ComparisonType,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Call {
        target: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
    Arithmetic {
        op: ArithmeticOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        if_true: Box<Expr>,
        if_false: Box<Expr>,
    },
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Expr::Parameter { schema: a }, Expr::Parameter { schema: b }) => {
                std::ptr::eq(a(), b())
            }
            (
                Expr::Member { target: t1, member: m1 },
                Expr::Member { target: t2, member: m2 },
            ) => std::ptr::eq(*m1, *m2) && t1 == t2,
            (
                Expr::Constant { value: v1, ty: ty1 },
                Expr::Constant { value: v2, ty: ty2 },
            ) => v1 == v2 && ty1 == ty2,
            (
                Expr::Comparison { op: o1, left: l1, right: r1 },
                Expr::Comparison { op: o2, left: l2, right: r2 },
            ) => o1 == o2 && l1 == l2 && r1 == r2,
            (Expr::And(l1, r1), Expr::And(l2, r2)) | (Expr::Or(l1, r1), Expr::Or(l2, r2)) => {
                l1 == l2 && r1 == r2
            }
            (Expr::Not(a), Expr::Not(b)) => a == b,
            (
                Expr::Call { target: t1, method: m1, args: a1 },
                Expr::Call { target: t2, method: m2, args: a2 },
            ) => m1 == m2 && t1 == t2 && a1 == a2,
            (
                Expr::Arithmetic { op: o1, left: l1, right: r1 },
                Expr::Arithmetic { op: o2, left: l2, right: r2 },
            ) => o1 == o2 && l1 == l2 && r1 == r2,
            (
                Expr::Conditional { test: c1, if_true: t1, if_false: f1 },
                Expr::Conditional { test: c2, if_true: t2, if_false: f2 },
            ) => c1 == c2 && t1 == t2 && f1 == f2,
            _ => false,
        }
    }
}

impl Expr {
    pub fn parameter<T: Entity>() -> Expr {
        Expr::Parameter { schema: T::schema }
    }

    /// 按值自身确定类型的常量。null 视为 string, 枚举值视为整数;
    /// 需要指定类型时直接构造 `Expr::Constant`
    pub fn constant(value: impl Into<Value>) -> Expr {
        let value = value.into();
        let ty = match &value {
            Value::Null => MemberType::String,
            Value::Enum(_) => MemberType::Int,
            other => other.natural_type().unwrap_or(MemberType::Int),
        };
        Expr::Constant { value, ty }
    }

    pub fn member(target: Expr, member: &'static Member) -> Expr {
        Expr::Member {
            target: Box::new(target),
            member,
        }
    }

    /// 节点种类名, 用于诊断信息
    pub fn kind(&self) -> String {
        match self {
            Expr::Parameter { .. } => "Parameter".to_string(),
            Expr::Member { .. } => "MemberAccess".to_string(),
            Expr::Constant { .. } => "Constant".to_string(),
            Expr::Comparison { op, .. } => op.node_kind().to_string(),
            Expr::And(..) => "AndAlso".to_string(),
            Expr::Or(..) => "OrElse".to_string(),
            Expr::Not(..) => "Not".to_string(),
            Expr::Call { method, .. } => format!("Call-{}", method),
            Expr::Arithmetic { op, .. } => op.node_kind().to_string(),
            Expr::Conditional { .. } => "Conditional".to_string(),
        }
    }

    /// 节点产出值的静态类型
    pub fn ty(&self) -> MemberType {
        match self {
            Expr::Parameter { schema } => MemberType::Record(*schema),
            Expr::Member { member, .. } => member.ty,
            Expr::Constant { ty, .. } => *ty,
            Expr::Comparison { .. }
            | Expr::And(..)
            | Expr::Or(..)
            | Expr::Not(..)
            | Expr::Call { .. } => MemberType::Bool,
            Expr::Arithmetic { left, .. } => left.ty(),
            Expr::Conditional { if_true, .. } => if_true.ty(),
        }
    }

    /// 以参数为根的成员链的点号路径
    pub fn member_path(&self) -> Option<String> {
        match self {
            Expr::Member { target, member } => match target.as_ref() {
                Expr::Parameter { .. } => Some(member.name.to_string()),
                inner => inner.member_path().map(|p| format!("{}.{}", p, member.name)),
            },
            _ => None,
        }
    }

    /// 以参数为根的成员链, 最外层在最后
    pub fn member_chain(&self) -> Option<Vec<&'static Member>> {
        match self {
            Expr::Member { target, member } => {
                let mut chain = match target.as_ref() {
                    Expr::Parameter { .. } => Vec::new(),
                    inner => inner.member_chain()?,
                };
                chain.push(*member);
                Some(chain)
            }
            _ => None,
        }
    }
}

/// 实体类型 `T` 上的单参数 lambda: `x => body`
pub struct Lambda<T> {
    param: String,
    body: Expr,
    _entity: PhantomData<fn(&T)>,
}

/// 未指定时使用的参数名
pub const DEFAULT_PARAMETER: &str = "x";

impl<T: Entity> Lambda<T> {
    /// 包装已构建的表达式, 此处不做检查; criteria 和描述符的构造函数负责校验
    pub fn new(param: impl Into<String>, body: Expr) -> Self {
        Self {
            param: param.into(),
            body,
            _entity: PhantomData,
        }
    }

    /// 将 Filter 文本解析为绑定到 `T` 的谓词
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        Self::parse_as(DEFAULT_PARAMETER, text)
    }

    /// 解析 Filter 文本, lambda 参数命名为 `param`
    pub fn parse_as(param: &str, text: &str) -> Result<Self, ParseError> {
        let body = crate::parser::parse_predicate::<T>(text)?;
        Ok(Self::new(param, body))
    }

    /// 成员 selector `param => param.Path`
    pub fn member(param: &str, path: &str) -> Result<Self, ParseError> {
        let body = crate::binder::member_path(Expr::parameter::<T>(), path)?;
        Ok(Self::new(param, body))
    }

    pub fn param(&self) -> &str {
        &self.param
    }

    pub fn body(&self) -> &Expr {
        &self.body
    }

    pub fn into_body(self) -> Expr {
        self.body
    }

    /// 表达式为纯成员链时返回点号路径
    pub fn member_path(&self) -> Option<String> {
        self.body.member_path()
    }

    /// 表达式的规范 Filter 文本
    pub fn to_dsl(&self) -> Result<String, UnsupportedConstruct> {
        crate::printer::to_dsl(&self.body)
    }
}

impl<T> Clone for Lambda<T> {
    fn clone(&self) -> Self {
        Self {
            param: self.param.clone(),
            body: self.body.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T> PartialEq for Lambda<T> {
    fn eq(&self, other: &Self) -> bool {
        self.param == other.param && self.body == other.body
    }
}

impl<T> fmt::Debug for Lambda<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lambda")
            .field("param", &self.param)
            .field("body", &self.body)
            .finish()
    }
}
