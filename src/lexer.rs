//! Filter 的词法分析器
//!
//! `Lexer` 是一个惰性的 `Result<Token, TokenizeError>` 迭代器, 结尾恰好产出一个
//! `EndOfInput`。遇到第一个错误后不再产出任何 token, 被拒绝的输入不会得到部分 token 流。

use tracing::trace;

use crate::error::TokenizeError;
use crate::token::{Span, Token, TokenKind};

pub struct Lexer<'a> {
    input: &'a str,
    /// 输入字符串中的当前位置（字节索引）
    position: usize,
    done: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer {
            input,
            position: 0,
            done: false,
        }
    }

    /// 查看当前字符, 不前进
    fn peek(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    /// 查看下一个字符, 不前进
    fn peek_next(&self) -> Option<char> {
        self.input[self.position..].chars().nth(1)
    }

    /// 前进一个字符并返回它
    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if let Some(c) = c {
            self.position += c.len_utf8();
        }
        c
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn token(&self, kind: TokenKind, start: usize) -> Token {
        Token::new(kind, &self.input[start..self.position], Span::new(start, self.position))
    }

    /// 无符号数字, 最多一个小数点。只有后面跟着数字时小数点才属于该数字
    fn read_number(&mut self, start: usize) -> Token {
        let mut seen_point = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.bump();
            } else if c == '.'
                && !seen_point
                && self.peek_next().is_some_and(|n| n.is_ascii_digit())
            {
                seen_point = true;
                self.bump();
            } else {
                break;
            }
        }
        self.token(TokenKind::NumberLiteral, start)
    }

    /// 读取双引号字符串, 开头的引号已被消费。`\"` 表示引号, `\\` 表示反斜杠
    fn read_string(&mut self, start: usize) -> Result<Token, TokenizeError> {
        let mut content = String::new();
        loop {
            match self.bump() {
                Some('"') => break,
                Some('\\') if matches!(self.peek(), Some('"') | Some('\\')) => {
                    if let Some(escaped) = self.bump() {
                        content.push(escaped);
                    }
                }
                Some(c) => content.push(c),
                None => return Err(TokenizeError::UnterminatedString { position: start }),
            }
        }
        Ok(Token::new(
            TokenKind::StringLiteral,
            content,
            Span::new(start, self.position),
        ))
    }

    /// 读取标识符, 或字面量关键字 `true`、`false`、`null`
    fn read_identifier(&mut self, start: usize) -> Token {
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.bump();
            } else {
                break;
            }
        }
        let kind = match &self.input[start..self.position] {
            "true" | "false" => TokenKind::BooleanLiteral,
            "null" => TokenKind::NullLiteral,
            _ => TokenKind::Identifier,
        };
        self.token(kind, start)
    }

    /// 读取必须成对出现的运算符, 例如 `&&` 或 `==`
    fn read_doubled(&mut self, c: char, start: usize) -> Result<Token, TokenizeError> {
        if self.peek() == Some(c) {
            self.bump();
            Ok(self.token(TokenKind::Operator, start))
        } else {
            Err(TokenizeError::LoneOperator { ch: c, position: start })
        }
    }

    /// 读取 `>`、`<`、`!` 以及带 `=` 后缀的形式
    fn read_comparison(&mut self, start: usize) -> Token {
        if self.peek() == Some('=') {
            self.bump();
        }
        self.token(TokenKind::Operator, start)
    }

    fn next_token(&mut self) -> Result<Token, TokenizeError> {
        self.skip_whitespace();
        let start = self.position;

        let Some(c) = self.bump() else {
            return Ok(self.token(TokenKind::EndOfInput, start));
        };

        match c {
            '.' => Ok(self.token(TokenKind::Dot, start)),
            ',' => Ok(self.token(TokenKind::Comma, start)),
            '(' => Ok(self.token(TokenKind::OpenParen, start)),
            ')' => Ok(self.token(TokenKind::CloseParen, start)),
            '=' => {
                if self.peek() == Some('=') {
                    self.bump();
                    Ok(self.token(TokenKind::Operator, start))
                } else {
                    Err(TokenizeError::LoneOperator { ch: '=', position: start })
                }
            }
            '&' | '|' => self.read_doubled(c, start),
            '>' | '<' | '!' => Ok(self.read_comparison(start)),
            '"' => self.read_string(start),
            c if c.is_ascii_digit() => Ok(self.read_number(start)),
            c if c.is_ascii_alphabetic() || c == '_' => Ok(self.read_identifier(start)),
            _ => Err(TokenizeError::UnexpectedCharacter { ch: c, position: start }),
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token, TokenizeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let result = self.next_token();
        match &result {
            Ok(token) if token.kind == TokenKind::EndOfInput => self.done = true,
            Ok(_) => {}
            Err(_) => self.done = true,
        }
        Some(result)
    }
}

impl std::iter::FusedIterator for Lexer<'_> {}

/// 对整个输入分词, 以一个 `EndOfInput` 结尾
pub fn tokenize(input: &str) -> Result<Vec<Token>, TokenizeError> {
    let tokens = Lexer::new(input).collect::<Result<Vec<_>, _>>()?;
    trace!(count = tokens.len(), "tokenized filter text");
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input).unwrap().into_iter().map(|t| t.kind).collect()
    }

    fn values(input: &str) -> Vec<String> {
        tokenize(input).unwrap().into_iter().map(|t| t.value).collect()
    }

    #[test]
    fn test_simple_comparison() {
        let mut lexer = Lexer::new("Age > 18");

        let token = lexer.next().unwrap().unwrap();
        assert_eq!(token.kind, TokenKind::Identifier);
        assert_eq!(token.value, "Age");
        assert_eq!(token.span, Span::new(0, 3));

        let token = lexer.next().unwrap().unwrap();
        assert!(token.is_operator(">"));

        let token = lexer.next().unwrap().unwrap();
        assert_eq!(token.kind, TokenKind::NumberLiteral);
        assert_eq!(token.value, "18");

        assert_eq!(lexer.next().unwrap().unwrap().kind, TokenKind::EndOfInput);
        assert!(lexer.next().is_none());
    }

    #[test]
    fn test_all_operators_and_punctuation() {
        assert_eq!(
            values("== != >= <= && || > < ! . , ( )"),
            vec!["==", "!=", ">=", "<=", "&&", "||", ">", "<", "!", ".", ",", "(", ")", ""]
        );
        assert_eq!(
            kinds(". , ( )"),
            vec![
                TokenKind::Dot,
                TokenKind::Comma,
                TokenKind::OpenParen,
                TokenKind::CloseParen,
                TokenKind::EndOfInput,
            ]
        );
    }

    #[test]
    fn test_literal_words() {
        assert_eq!(
            kinds("true false null nullable _x1"),
            vec![
                TokenKind::BooleanLiteral,
                TokenKind::BooleanLiteral,
                TokenKind::NullLiteral,
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::EndOfInput,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(values("42 3.14"), vec!["42", "3.14", ""]);
        // 第二个小数点不属于数字
        assert_eq!(
            kinds("1.2.3"),
            vec![
                TokenKind::NumberLiteral,
                TokenKind::Dot,
                TokenKind::NumberLiteral,
                TokenKind::EndOfInput,
            ]
        );
    }

    #[test]
    fn test_strings_with_escaped_quote() {
        let tokens = tokenize(r#"Name == "say \"hi\"""#).unwrap();
        assert_eq!(tokens[2].kind, TokenKind::StringLiteral);
        assert_eq!(tokens[2].value, r#"say "hi""#);
    }

    #[test]
    fn test_strings_with_escaped_backslash() {
        let tokens = tokenize(r#"Name == "C:\\" && Name != "a\b""#).unwrap();
        assert_eq!(tokens[2].value, r"C:\");
        assert_eq!(tokens[6].value, r"a\b");
    }

    #[test]
    fn test_method_call() {
        assert_eq!(
            kinds(r#"Name.StartsWith("Jo")"#),
            vec![
                TokenKind::Identifier,
                TokenKind::Dot,
                TokenKind::Identifier,
                TokenKind::OpenParen,
                TokenKind::StringLiteral,
                TokenKind::CloseParen,
                TokenKind::EndOfInput,
            ]
        );
    }

    #[test]
    fn test_empty_input_is_end_of_input() {
        assert_eq!(kinds("   "), vec![TokenKind::EndOfInput]);
    }

    #[test]
    fn test_single_equals_is_rejected() {
        assert_eq!(
            tokenize(r#"Name = "x""#),
            Err(TokenizeError::LoneOperator { ch: '=', position: 5 })
        );
    }

    #[test]
    fn test_single_ampersand_and_pipe_are_rejected() {
        assert!(matches!(
            tokenize("A & B"),
            Err(TokenizeError::LoneOperator { ch: '&', .. })
        ));
        assert!(matches!(
            tokenize("A | B"),
            Err(TokenizeError::LoneOperator { ch: '|', .. })
        ));
    }

    #[test]
    fn test_unknown_character_is_rejected() {
        let err = tokenize("Age > 18 # comment").unwrap_err();
        assert_eq!(err, TokenizeError::UnexpectedCharacter { ch: '#', position: 9 });
        assert_eq!(err.offending_char(), Some('#'));
    }

    #[test]
    fn test_unterminated_string() {
        assert_eq!(
            tokenize(r#"Name == "abc"#),
            Err(TokenizeError::UnterminatedString { position: 8 })
        );
    }

    #[test]
    fn test_lexer_stops_after_error() {
        let mut lexer = Lexer::new("A $ B");
        assert!(lexer.next().unwrap().is_ok());
        assert!(lexer.next().unwrap().is_err());
        assert!(lexer.next().is_none());
    }

    #[test]
    fn test_tokenize_is_restartable() {
        let input = r#"Age > 18 && Name.StartsWith("Jo")"#;
        assert_eq!(tokenize(input).unwrap(), tokenize(input).unwrap());
    }
}
