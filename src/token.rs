//! Filter 语言的 token 定义

use std::fmt;

/// Token 是语言的最小单元, 包含种类、(已反转义的)文本和在源文本中的位置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, value: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            value: value.into(),
            span,
        }
    }

    /// 是否为文本恰好等于 `op` 的运算符 token
    pub fn is_operator(&self, op: &str) -> bool {
        self.kind == TokenKind::Operator && self.value == op
    }
}

/// Token 的种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // 名称
    Identifier, // Company, Name, StartsWith

    // 字面量
    StringLiteral,  // "text", value 为反转义后的内容
    NumberLiteral,  // 42, 3.14
    BooleanLiteral, // true, false
    NullLiteral,    // null

    // 运算符: == != > < >= <= && || !
    Operator,

    // 标点
    Dot,        // .
    Comma,      // ,
    OpenParen,  // (
    CloseParen, // )

    // 特殊
    EndOfInput,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Identifier => "identifier",
            TokenKind::StringLiteral => "string literal",
            TokenKind::NumberLiteral => "number literal",
            TokenKind::BooleanLiteral => "boolean literal",
            TokenKind::NullLiteral => "null",
            TokenKind::Operator => "operator",
            TokenKind::Dot => "'.'",
            TokenKind::Comma => "','",
            TokenKind::OpenParen => "'('",
            TokenKind::CloseParen => "')'",
            TokenKind::EndOfInput => "end of input",
        };
        f.write_str(name)
    }
}

/// 源文本中的一个区间
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Span {
    /// 起始字节偏移
    pub start: usize,
    /// 结束字节偏移
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}
