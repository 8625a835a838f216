//! Filter 语言的类型规则
//!
//! 解析器和构建 API 创建的每个节点都经过这里的构造函数,
//! [`check`] 对手工构建的树应用同样的规则

use tracing::trace;

use crate::ast::{ComparisonType, Expr, StringMethod};
use crate::error::ParseError;
use crate::schema::MemberType;
use crate::value::Value;

/// 绑定前的操作数: 字面量在遇到比较的另一侧时才确定类型
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Expr(Expr),
    Literal(Value),
}

impl From<Expr> for Operand {
    fn from(expr: Expr) -> Self {
        Operand::Expr(expr)
    }
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Operand::Literal(value)
    }
}

/// 相对 `root` 解析点号路径, `root` 必须是实体类型
pub fn member_path(root: Expr, path: &str) -> Result<Expr, ParseError> {
    let root_ty = root.ty();
    let schema = root_ty
        .record_schema()
        .ok_or_else(|| ParseError::UnknownMember {
            path: path.to_string(),
            type_name: root_ty.to_string(),
        })?;
    let resolved = schema.resolve_path(path)?;
    Ok(resolved
        .segments
        .into_iter()
        .fold(root, |target, member| Expr::member(target, member)))
}

/// 将 `value` 转换为被比较一侧类型后的常量
pub fn typed_constant(value: Value, ty: MemberType) -> Result<Expr, ParseError> {
    let value = value.coerce_to(&ty)?;
    Ok(Expr::Constant { value, ty })
}

/// 绑定 `left op right`, 字面量一侧转换为另一侧的类型
pub fn comparison(
    op: ComparisonType,
    left: impl Into<Operand>,
    right: impl Into<Operand>,
) -> Result<Expr, ParseError> {
    let (left, right) = match (left.into(), right.into()) {
        (Operand::Expr(l), Operand::Expr(r)) => (l, r),
        (Operand::Expr(l), Operand::Literal(v)) => {
            let r = typed_constant(v, l.ty())?;
            (l, r)
        }
        (Operand::Literal(v), Operand::Expr(r)) => {
            let l = typed_constant(v, r.ty())?;
            (l, r)
        }
        (Operand::Literal(a), Operand::Literal(b)) => {
            let ty = a
                .natural_type()
                .or_else(|| b.natural_type())
                .ok_or_else(|| ParseError::TypeMismatch {
                    expected: "a typed operand".to_string(),
                    found: "null".to_string(),
                })?;
            (typed_constant(a, ty)?, typed_constant(b, ty)?)
        }
    };

    check_comparison(op, &left, &right)?;
    Ok(Expr::Comparison {
        op,
        left: Box::new(left),
        right: Box::new(right),
    })
}

fn is_null_constant(expr: &Expr) -> bool {
    matches!(expr, Expr::Constant { value: Value::Null, .. })
}

fn check_comparison(op: ComparisonType, left: &Expr, right: &Expr) -> Result<(), ParseError> {
    let (lt, rt) = (left.ty(), right.ty());
    if !lt.same_kind(&rt) {
        return Err(ParseError::TypeMismatch {
            expected: lt.to_string(),
            found: rt.to_string(),
        });
    }
    if op.is_ordering() {
        if !lt.is_ordered() {
            return Err(ParseError::UnsupportedOperator {
                op: op.symbol().to_string(),
                type_name: lt.to_string(),
            });
        }
        if is_null_constant(left) || is_null_constant(right) {
            return Err(ParseError::UnsupportedOperator {
                op: op.symbol().to_string(),
                type_name: "null".to_string(),
            });
        }
    }
    Ok(())
}

/// 将操作数转为可单独使用的布尔表达式
pub fn predicate(operand: impl Into<Operand>) -> Result<Expr, ParseError> {
    match operand.into() {
        Operand::Literal(Value::Bool(b)) => Ok(Expr::Constant {
            value: Value::Bool(b),
            ty: MemberType::Bool,
        }),
        Operand::Literal(other) => Err(ParseError::NotPredicate {
            found: other.kind_name().to_string(),
        }),
        Operand::Expr(expr) => {
            let ty = expr.ty();
            if ty.is_bool() {
                Ok(expr)
            } else {
                Err(ParseError::NotPredicate {
                    found: ty.to_string(),
                })
            }
        }
    }
}

fn require_bool(op: &str, expr: &Expr) -> Result<(), ParseError> {
    let ty = expr.ty();
    if ty.is_bool() {
        Ok(())
    } else {
        Err(ParseError::UnsupportedOperator {
            op: op.to_string(),
            type_name: ty.to_string(),
        })
    }
}

pub fn and(left: Expr, right: Expr) -> Result<Expr, ParseError> {
    require_bool("&&", &left)?;
    require_bool("&&", &right)?;
    Ok(Expr::And(Box::new(left), Box::new(right)))
}

pub fn or(left: Expr, right: Expr) -> Result<Expr, ParseError> {
    require_bool("||", &left)?;
    require_bool("||", &right)?;
    Ok(Expr::Or(Box::new(left), Box::new(right)))
}

pub fn not(operand: Expr) -> Result<Expr, ParseError> {
    require_bool("!", &operand)?;
    Ok(Expr::Not(Box::new(operand)))
}

/// 绑定受支持的字符串方法 `target.Method(arg)`
pub fn call(target: Expr, method: &str, args: Vec<Operand>) -> Result<Expr, ParseError> {
    check_call_shape(&target, method, args.len())?;

    let args = args
        .into_iter()
        .map(|arg| match arg {
            Operand::Literal(Value::Null) => Err(ParseError::TypeMismatch {
                expected: MemberType::String.to_string(),
                found: "null".to_string(),
            }),
            Operand::Literal(v) => typed_constant(v, MemberType::String),
            Operand::Expr(e) => {
                let ty = e.ty();
                if ty.is_string() {
                    Ok(e)
                } else {
                    Err(ParseError::TypeMismatch {
                        expected: MemberType::String.to_string(),
                        found: ty.to_string(),
                    })
                }
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Expr::Call {
        target: Box::new(target),
        method: method.to_string(),
        args,
    })
}

fn check_call_shape(target: &Expr, method: &str, arg_count: usize) -> Result<(), ParseError> {
    if StringMethod::from_name(method).is_none() {
        return Err(ParseError::UnsupportedMethod {
            name: method.to_string(),
        });
    }
    let ty = target.ty();
    if !ty.is_string() {
        return Err(ParseError::UnsupportedOperator {
            op: method.to_string(),
            type_name: ty.to_string(),
        });
    }
    if arg_count != 1 {
        return Err(ParseError::TypeMismatch {
            expected: "1 argument".to_string(),
            found: format!("{} arguments", arg_count),
        });
    }
    Ok(())
}

/// 对整棵树做类型检查, 返回其产出的类型
///
/// 成员访问必须经由实体类型成员以参数为根, 每个节点都必须满足其构造函数的规则
pub fn check(expr: &Expr) -> Result<MemberType, ParseError> {
    let ty = match expr {
        Expr::Parameter { .. } => expr.ty(),
        Expr::Member { target, member } => {
            let target_ty = check(target)?;
            let schema = target_ty
                .record_schema()
                .ok_or_else(|| ParseError::TypeMismatch {
                    expected: "an entity".to_string(),
                    found: target_ty.to_string(),
                })?;
            match schema.member(member.name) {
                Some(found) if std::ptr::eq(found, *member) => member.ty,
                _ => {
                    return Err(ParseError::UnknownMember {
                        path: member.name.to_string(),
                        type_name: schema.name.to_string(),
                    })
                }
            }
        }
        Expr::Constant { value, ty } => {
            value.clone().coerce_to(ty)?;
            *ty
        }
        Expr::Comparison { op, left, right } => {
            check(left)?;
            check(right)?;
            check_comparison(*op, left, right)?;
            MemberType::Bool
        }
        Expr::And(left, right) | Expr::Or(left, right) => {
            let op = if matches!(expr, Expr::And(..)) { "&&" } else { "||" };
            check(left)?;
            check(right)?;
            require_bool(op, left)?;
            require_bool(op, right)?;
            MemberType::Bool
        }
        Expr::Not(operand) => {
            check(operand)?;
            require_bool("!", operand)?;
            MemberType::Bool
        }
        Expr::Call { target, method, args } => {
            check(target)?;
            check_call_shape(target, method, args.len())?;
            for arg in args {
                let ty = check(arg)?;
                if !ty.is_string() || is_null_constant(arg) {
                    return Err(ParseError::TypeMismatch {
                        expected: MemberType::String.to_string(),
                        found: if is_null_constant(arg) {
                            "null".to_string()
                        } else {
                            ty.to_string()
                        },
                    });
                }
            }
            MemberType::Bool
        }
        Expr::Arithmetic { op, left, right } => {
            let (lt, rt) = (check(left)?, check(right)?);
            if !lt.is_numeric() || !lt.same_kind(&rt) {
                return Err(ParseError::UnsupportedOperator {
                    op: op.node_kind().to_string(),
                    type_name: format!("{} and {}", lt, rt),
                });
            }
            lt
        }
        Expr::Conditional { test, if_true, if_false } => {
            check(test)?;
            require_bool("?:", test)?;
            let (tt, ft) = (check(if_true)?, check(if_false)?);
            if !tt.same_kind(&ft) {
                return Err(ParseError::TypeMismatch {
                    expected: tt.to_string(),
                    found: ft.to_string(),
                });
            }
            tt
        }
    };
    trace!(kind = %expr.kind(), ty = %ty, "checked node");
    Ok(ty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ArithmeticOp;
    use crate::demo::{Person, PERSON};

    fn person() -> Expr {
        Expr::parameter::<Person>()
    }

    fn path(p: &str) -> Expr {
        member_path(person(), p).unwrap()
    }

    #[test]
    fn test_numeric_literal_coerces_to_decimal_member() {
        let expr =
            comparison(ComparisonType::GreaterThan, path("Balance"), Value::Int(10)).unwrap();
        if let Expr::Comparison { right, .. } = &expr {
            assert_eq!(right.ty(), MemberType::Decimal);
            assert!(matches!(right.as_ref(), Expr::Constant { value: Value::Decimal(_), .. }));
        } else {
            panic!("Expected comparison");
        }
    }

    #[test]
    fn test_enum_member_accepts_integer() {
        let expr = comparison(ComparisonType::EqualTo, path("Status"), Value::Int(1)).unwrap();
        if let Expr::Comparison { right, .. } = &expr {
            assert!(matches!(right.as_ref(), Expr::Constant { value: Value::Enum(1), .. }));
        } else {
            panic!("Expected comparison");
        }
    }

    #[test]
    fn test_literal_on_left_is_coerced() {
        assert!(comparison(ComparisonType::LessThan, Value::Int(18), path("Age")).is_ok());
    }

    #[test]
    fn test_optional_member_compares_to_value_and_null() {
        assert!(comparison(ComparisonType::GreaterThan, path("Score"), Value::Int(3)).is_ok());
        assert!(comparison(ComparisonType::EqualTo, path("Score"), Value::Null).is_ok());
    }

    #[test]
    fn test_null_against_value_type_is_rejected() {
        assert!(matches!(
            comparison(ComparisonType::EqualTo, path("Age"), Value::Null),
            Err(ParseError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_ordering_on_string_is_rejected() {
        assert_eq!(
            comparison(ComparisonType::GreaterThan, path("Name"), Value::from("A")),
            Err(ParseError::UnsupportedOperator {
                op: ">".to_string(),
                type_name: "string".to_string(),
            })
        );
    }

    #[test]
    fn test_string_literal_against_int_is_rejected() {
        assert!(matches!(
            comparison(ComparisonType::EqualTo, path("Age"), Value::from("x")),
            Err(ParseError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_logical_operators_require_booleans() {
        let age = path("Age");
        let active = path("IsActive");
        assert!(and(active.clone(), active.clone()).is_ok());
        assert!(matches!(
            or(active, age.clone()),
            Err(ParseError::UnsupportedOperator { .. })
        ));
        assert!(matches!(not(age), Err(ParseError::UnsupportedOperator { .. })));
    }

    #[test]
    fn test_call_rules() {
        assert!(call(path("Name"), "StartsWith", vec![Value::from("Jo").into()]).is_ok());
        assert_eq!(
            call(path("Name"), "Trim", vec![]),
            Err(ParseError::UnsupportedMethod {
                name: "Trim".to_string()
            })
        );
        assert!(matches!(
            call(path("Age"), "Contains", vec![Value::from("1").into()]),
            Err(ParseError::UnsupportedOperator { .. })
        ));
        assert!(call(path("Name"), "Contains", vec![Value::Null.into()]).is_err());
    }

    #[test]
    fn test_predicate_requires_bool() {
        assert!(predicate(path("IsActive")).is_ok());
        assert!(predicate(Value::Bool(true)).is_ok());
        assert_eq!(
            predicate(path("Age")),
            Err(ParseError::NotPredicate {
                found: "int".to_string()
            })
        );
    }

    #[test]
    fn test_check_rejects_member_on_constant() {
        let bad = Expr::member(Expr::constant("text"), &PERSON.members[0]);
        assert!(matches!(check(&bad), Err(ParseError::TypeMismatch { .. })));
    }

    #[test]
    fn test_check_accepts_arithmetic_on_numbers() {
        let sum = Expr::Arithmetic {
            op: ArithmeticOp::Add,
            left: Box::new(path("Age")),
            right: Box::new(Expr::constant(1)),
        };
        assert_eq!(check(&sum), Ok(MemberType::Int));

        let bad = Expr::Arithmetic {
            op: ArithmeticOp::Add,
            left: Box::new(path("Name")),
            right: Box::new(Expr::constant("x")),
        };
        assert!(check(&bad).is_err());
    }
}
