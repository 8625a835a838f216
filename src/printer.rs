//! 将表达式树输出为规范的 Filter 文本
//!
//! 只支持解析器能产生的节点种类; 其他节点(算术、条件、其他方法调用、
//! 不以参数为根的成员访问)返回 [`UnsupportedConstruct`]。
//! 输出的文本可以解析回相等的树, 再次输出得到相同的文本。

use crate::ast::{Expr, StringMethod};
use crate::error::UnsupportedConstruct;
use crate::value::Value;

/// 将表达式转换为规范 Filter 文本
pub fn to_dsl(expr: &Expr) -> Result<String, UnsupportedConstruct> {
    let mut out = String::with_capacity(64);
    write_expr(expr, &mut out)?;
    Ok(out)
}

fn write_expr(expr: &Expr, out: &mut String) -> Result<(), UnsupportedConstruct> {
    match expr {
        Expr::Comparison { op, left, right } => {
            write_binary(left, op.symbol(), right, out)?;
        }
        Expr::And(left, right) => write_binary(left, "&&", right, out)?,
        Expr::Or(left, right) => write_binary(left, "||", right, out)?,
        Expr::Not(operand) => {
            out.push('!');
            write_expr(operand, out)?;
        }
        Expr::Member { .. } => write_member(expr, out)?,
        Expr::Constant { value, .. } => write_constant(value, out),
        Expr::Call { target, method, args } => {
            if StringMethod::from_name(method).is_none() {
                return Err(UnsupportedConstruct::new(expr.kind()));
            }
            write_member(target, out)?;
            out.push('.');
            out.push_str(method);
            out.push('(');
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_expr(arg, out)?;
            }
            out.push(')');
        }
        Expr::Parameter { .. } | Expr::Arithmetic { .. } | Expr::Conditional { .. } => {
            return Err(UnsupportedConstruct::new(expr.kind()));
        }
    }
    Ok(())
}

fn write_binary(
    left: &Expr,
    op: &str,
    right: &Expr,
    out: &mut String,
) -> Result<(), UnsupportedConstruct> {
    out.push('(');
    write_expr(left, out)?;
    out.push(' ');
    out.push_str(op);
    out.push(' ');
    write_expr(right, out)?;
    out.push(')');
    Ok(())
}

/// 成员链输出为不带参数名的点号路径
fn write_member(expr: &Expr, out: &mut String) -> Result<(), UnsupportedConstruct> {
    match expr.member_path() {
        Some(path) => {
            out.push_str(&path);
            Ok(())
        }
        None => Err(UnsupportedConstruct::new(expr.kind())),
    }
}

fn write_constant(value: &Value, out: &mut String) {
    match value {
        Value::String(s) => write_quoted(s, out),
        Value::Char(c) => write_quoted(&c.to_string(), out),
        // 不使用指数形式, 词法分析器不接受指数
        Value::Decimal(d) => out.push_str(&d.to_plain_string()),
        other => out.push_str(&other.to_string()),
    }
}

fn write_quoted(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
}
