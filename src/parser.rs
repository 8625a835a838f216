//! Filter 语言的解析器和绑定器
//!
//! ## 语法
//!
//! ```text
//! or_expr     := and_expr ( "||" and_expr )*
//! and_expr    := comparison ( "&&" comparison )*
//! comparison  := unary ( ( "==" | "!=" | ">" | ">=" | "<" | "<=" ) unary )?
//! unary       := "!" unary | primary
//! primary     := "(" or_expr ")"
//!              | member_path ( "." method "(" args ")" )?
//!              | STRING | NUMBER | "true" | "false" | "null"
//! member_path := IDENT ( "." IDENT )*
//! ```
//!
//! ## 优先级 (由高到低)
//!
//! 1. 分组 `( ... )`、成员访问、方法调用
//! 2. `!`
//! 3. 比较运算
//! 4. `&&`
//! 5. `||`
//!
//! 绑定在解析过程中完成: 成员路径读到即按绑定的实体类型解析,
//! 字面量转换为与之比较的成员类型。第一个错误即终止解析。

use tracing::debug;

use crate::ast::{ComparisonType, Expr};
use crate::binder::{self, Operand};
use crate::error::ParseError;
use crate::lexer::tokenize;
use crate::schema::Entity;
use crate::token::{Token, TokenKind};
use crate::value::Value;

pub struct Parser<'a> {
    tokens: &'a [Token],
    position: usize,
    root: Expr,
}

impl<'a> Parser<'a> {
    /// 创建解析器, 成员路径按 `T` 解析
    pub fn new<T: Entity>(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            position: 0,
            root: Expr::parameter::<T>(),
        }
    }

    /// 查看当前 token, 不前进
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.position)
    }

    /// 返回当前 token 并前进
    fn advance(&mut self) -> Result<&'a Token, ParseError> {
        match self.tokens.get(self.position) {
            Some(token) if token.kind != TokenKind::EndOfInput => {
                self.position += 1;
                Ok(token)
            }
            _ => Err(ParseError::UnexpectedEnd),
        }
    }

    /// 期望指定种类的 token 并前进
    fn expect(&mut self, expected: TokenKind) -> Result<&'a Token, ParseError> {
        let token = self.advance()?;
        if token.kind == expected {
            Ok(token)
        } else {
            Err(unexpected(token))
        }
    }

    fn match_kind(&self, kind: TokenKind) -> bool {
        self.peek().is_some_and(|t| t.kind == kind)
    }

    fn match_operator(&self, op: &str) -> bool {
        self.peek().is_some_and(|t| t.is_operator(op))
    }

    /// 将整个 token 流解析为布尔谓词
    pub fn parse(&mut self) -> Result<Expr, ParseError> {
        let operand = self.parse_or_expression()?;
        match self.peek() {
            Some(token) if token.kind != TokenKind::EndOfInput => Err(unexpected(token)),
            _ => binder::predicate(operand),
        }
    }

    /// `and_expr ( "||" and_expr )*`
    fn parse_or_expression(&mut self) -> Result<Operand, ParseError> {
        let mut left = self.parse_and_expression()?;

        while self.match_operator("||") {
            self.advance()?;
            let right = self.parse_and_expression()?;
            left = binder::or(binder::predicate(left)?, binder::predicate(right)?)?.into();
        }

        Ok(left)
    }

    /// `comparison ( "&&" comparison )*`
    fn parse_and_expression(&mut self) -> Result<Operand, ParseError> {
        let mut left = self.parse_comparison()?;

        while self.match_operator("&&") {
            self.advance()?;
            let right = self.parse_comparison()?;
            left = binder::and(binder::predicate(left)?, binder::predicate(right)?)?.into();
        }

        Ok(left)
    }

    /// `unary ( op unary )?`
    fn parse_comparison(&mut self) -> Result<Operand, ParseError> {
        let left = self.parse_unary()?;

        let op = match self.peek() {
            Some(token) if token.kind == TokenKind::Operator => {
                ComparisonType::from_symbol(&token.value)
            }
            _ => None,
        };

        match op {
            Some(op) => {
                self.advance()?;
                let right = self.parse_unary()?;
                Ok(binder::comparison(op, left, right)?.into())
            }
            None => Ok(left),
        }
    }

    /// `"!" unary | primary`
    fn parse_unary(&mut self) -> Result<Operand, ParseError> {
        if self.match_operator("!") {
            self.advance()?;
            let operand = self.parse_unary()?;
            let operand = match operand {
                Operand::Literal(Value::Bool(b)) => binder::predicate(Value::Bool(b))?,
                Operand::Literal(other) => {
                    return Err(ParseError::UnsupportedOperator {
                        op: "!".to_string(),
                        type_name: other.kind_name().to_string(),
                    })
                }
                Operand::Expr(expr) => expr,
            };
            return Ok(binder::not(operand)?.into());
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Operand, ParseError> {
        let token = self.advance()?;
        match token.kind {
            TokenKind::OpenParen => {
                let inner = self.parse_or_expression()?;
                self.expect(TokenKind::CloseParen)?;
                Ok(inner)
            }
            TokenKind::Identifier => self.parse_member_or_call(token),
            TokenKind::StringLiteral => Ok(Operand::Literal(Value::String(token.value.clone()))),
            TokenKind::NumberLiteral => Value::from_number_literal(&token.value)
                .map(Operand::Literal)
                .ok_or_else(|| unexpected(token)),
            TokenKind::BooleanLiteral => Ok(Operand::Literal(Value::Bool(token.value == "true"))),
            TokenKind::NullLiteral => Ok(Operand::Literal(Value::Null)),
            _ => Err(unexpected(token)),
        }
    }

    /// `IDENT ( "." IDENT )* ( "(" args ")" )?`, 调用的方法名是最后一个标识符
    fn parse_member_or_call(&mut self, first: &'a Token) -> Result<Operand, ParseError> {
        let mut path = first.value.clone();

        while self.match_kind(TokenKind::Dot) {
            self.advance()?;
            let name = self.expect(TokenKind::Identifier)?;

            if self.match_kind(TokenKind::OpenParen) {
                let target = binder::member_path(self.root.clone(), &path)?;
                let args = self.parse_arguments()?;
                return Ok(binder::call(target, &name.value, args)?.into());
            }

            path.push('.');
            path.push_str(&name.value);
        }

        if self.match_kind(TokenKind::OpenParen) {
            // 没有接收者的调用不是受支持的方法
            return Err(ParseError::UnsupportedMethod {
                name: first.value.clone(),
            });
        }

        Ok(binder::member_path(self.root.clone(), &path)?.into())
    }

    /// `"(" ( or_expr ( "," or_expr )* )? ")"`
    fn parse_arguments(&mut self) -> Result<Vec<Operand>, ParseError> {
        self.expect(TokenKind::OpenParen)?;
        let mut args = Vec::new();

        if !self.match_kind(TokenKind::CloseParen) {
            loop {
                args.push(self.parse_or_expression()?);
                if self.match_kind(TokenKind::CloseParen) {
                    break;
                }
                self.expect(TokenKind::Comma)?;
            }
        }

        self.expect(TokenKind::CloseParen)?;
        Ok(args)
    }
}

fn unexpected(token: &Token) -> ParseError {
    ParseError::UnexpectedToken {
        found: token.kind,
        text: token.value.clone(),
        position: token.span.start,
    }
}

/// 对 `text` 分词并解析为 `T` 上的谓词
pub fn parse_predicate<T: Entity>(text: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(text)?;
    let expr = Parser::new::<T>(&tokens).parse()?;
    debug!(entity = T::schema().name, kind = %expr.kind(), "bound filter text");
    Ok(expr)
}
