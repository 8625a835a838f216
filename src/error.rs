//! 各阶段的错误类型: 分词、绑定、输出、求值和解码。
//! 每个阶段都立即失败, 不会静默使用默认值。

use thiserror::Error;

use crate::token::TokenKind;

/// 分词时整个输入被拒绝
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenizeError {
    #[error("Unexpected character '{ch}' at position {position}")]
    UnexpectedCharacter { ch: char, position: usize },

    #[error("Unexpected '{ch}' at position {position}, only '{ch}{ch}' is an operator")]
    LoneOperator { ch: char, position: usize },

    #[error("Unterminated string literal starting at position {position}")]
    UnterminatedString { position: usize },
}

impl TokenizeError {
    /// 出错的字符(如果有)
    pub fn offending_char(&self) -> Option<char> {
        match self {
            TokenizeError::UnexpectedCharacter { ch, .. }
            | TokenizeError::LoneOperator { ch, .. } => Some(*ch),
            TokenizeError::UnterminatedString { .. } => Some('"'),
        }
    }
}

/// 表达式无法解析或无法绑定到实体类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error(transparent)]
    Tokenize(#[from] TokenizeError),

    #[error("'{path}' is not a readable member of {type_name}")]
    UnknownMember { path: String, type_name: String },

    #[error("Operator '{op}' is not supported for {type_name}")]
    UnsupportedOperator { op: String, type_name: String },

    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("Method '{name}' is not supported")]
    UnsupportedMethod { name: String },

    #[error("Expression must produce a boolean, found {found}")]
    NotPredicate { found: String },

    #[error("Unexpected {found} '{text}' at position {position}")]
    UnexpectedToken {
        found: TokenKind,
        text: String,
        position: usize,
    },

    #[error("Unexpected end of input")]
    UnexpectedEnd,
}

/// 输出时遇到 DSL 之外的节点种类
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Expression node '{kind}' cannot be converted to filter text")]
pub struct UnsupportedConstruct {
    pub kind: String,
}

impl UnsupportedConstruct {
    pub fn new(kind: impl Into<String>) -> Self {
        Self { kind: kind.into() }
    }
}

/// 编译后谓词求值时的运行时错误。
/// criteria 的调用方只会把它看作 [`CriteriaError::Evaluation`] 的 source
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalFault {
    #[error("Null reference while reading '{member}'")]
    NullReference { member: String },

    #[error("Record does not expose member '{member}'")]
    MissingField { member: String },

    #[error("Arithmetic fault in {op}: {reason}")]
    Arithmetic { op: &'static str, reason: &'static str },

    #[error("Unexpected {found} value where {expected} was required")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CriteriaError {
    #[error("Criteria name must not be empty or whitespace")]
    BlankName,

    #[error("A value is required for non-nullable type {type_name}")]
    NullValueForValueType { type_name: String },

    #[error("Expected a direct member access, found '{kind}'")]
    NotMemberAccess { kind: String },

    #[error("Compound expression '{kind}' cannot be reduced to a single criteria")]
    CompoundComparison { kind: String },

    #[error("Expression '{kind}' is not a supported member comparison")]
    UnsupportedComparison { kind: String },

    #[error("Cannot evaluate a filter against a null entity")]
    NullEntity,

    #[error("Failed to evaluate filter against {entity_type}")]
    Evaluation {
        entity_type: &'static str,
        #[source]
        source: EvalFault,
    },

    #[error(transparent)]
    Expression(#[from] ParseError),

    #[error(transparent)]
    Unsupported(#[from] UnsupportedConstruct),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("Expected a direct member access, found '{kind}'")]
    NotMemberAccess { kind: String },

    #[error("An assignee must not be set when projecting to {type_name}")]
    AssigneeNotAllowed { type_name: String },

    #[error("Destination member '{member}' does not exist on {type_name}")]
    MissingDestinationMember { member: String, type_name: String },

    #[error(transparent)]
    Member(#[from] ParseError),
}

/// 从 JSON 解码描述符失败
///
/// `Malformed` 和 `InvalidFilter` 表示文档本身有问题;
/// `UnknownMember` 表示格式正确的文档引用了绑定类型中不存在的成员
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Malformed document: {0}")]
    Malformed(String),

    #[error("Member path '{path}' does not exist on {type_name}")]
    UnknownMember { path: String, type_name: String },

    #[error("Filter text must not be missing, empty or whitespace")]
    EmptyFilter,

    #[error("Invalid filter text: {0}")]
    InvalidFilter(#[source] ParseError),

    #[error(transparent)]
    Criteria(#[from] CriteriaError),

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
}

impl DecodeError {
    pub fn is_malformed(&self) -> bool {
        matches!(self, DecodeError::Malformed(_) | DecodeError::InvalidFilter(_))
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        DecodeError::Malformed(err.to_string())
    }
}

impl From<ParseError> for DecodeError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::UnknownMember { path, type_name } => {
                DecodeError::UnknownMember { path, type_name }
            }
            other => DecodeError::InvalidFilter(other),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SqlError {
    #[error("Expression node '{kind}' has no SQL translation")]
    Unsupported { kind: String },
}
