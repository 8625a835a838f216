//! 将检查过的表达式树编译为闭包
//!
//! [`crate::binder::check`] 负责可能失败的校验, [`compile`] 本身不会失败。
//! 运行时仍可能遇到的问题(记录缺少声明的成员、成员链中的 null)以 [`EvalFault`] 返回。

use std::cmp::Ordering;
use std::sync::Arc;

use bigdecimal::{BigDecimal, Zero};

use crate::ast::{ArithmeticOp, ComparisonType, Expr, Lambda, StringMethod};
use crate::error::EvalFault;
use crate::schema::{Entity, Field, Record};
use crate::value::Value;

/// `T` 上编译后的谓词
pub type FilterFn<T> = Arc<dyn Fn(&T) -> Result<bool, EvalFault> + Send + Sync>;

/// 编译后的节点, 针对根记录求值
type Node = Box<dyn for<'a> Fn(&'a dyn Record) -> Result<Field<'a>, EvalFault> + Send + Sync>;

fn node<F>(f: F) -> Node
where
    F: for<'a> Fn(&'a dyn Record) -> Result<Field<'a>, EvalFault> + Send + Sync + 'static,
{
    Box::new(f)
}

/// 编译谓词 lambda
pub fn compile<T: Entity>(lambda: &Lambda<T>) -> FilterFn<T> {
    let body = compile_node(lambda.body());
    Arc::new(move |entity: &T| {
        let field = body(entity as &dyn Record)?;
        as_bool(field)
    })
}

fn compile_node(expr: &Expr) -> Node {
    match expr {
        Expr::Parameter { .. } => node(|root| Ok(Field::Record(Some(root)))),

        Expr::Member { target, member } => {
            let target = compile_node(target);
            let name = member.name;
            node(move |root| match target(root)? {
                Field::Record(Some(record)) => {
                    record.field(name).ok_or_else(|| EvalFault::MissingField {
                        member: name.to_string(),
                    })
                }
                Field::Record(None) | Field::Value(Value::Null) => Err(EvalFault::NullReference {
                    member: name.to_string(),
                }),
                Field::Value(other) => Err(EvalFault::TypeMismatch {
                    expected: "entity",
                    found: other.kind_name(),
                }),
            })
        }

        Expr::Constant { value, .. } => {
            let value = value.clone();
            node(move |_| Ok(Field::Value(value.clone())))
        }

        Expr::Comparison { op, left, right } => {
            let (op, left, right) = (*op, compile_node(left), compile_node(right));
            node(move |root| {
                let result = compare(op, &left(root)?, &right(root)?)?;
                Ok(Field::Value(Value::Bool(result)))
            })
        }

        Expr::And(left, right) => {
            let (left, right) = (compile_node(left), compile_node(right));
            node(move |root| {
                let result = as_bool(left(root)?)? && as_bool(right(root)?)?;
                Ok(Field::Value(Value::Bool(result)))
            })
        }

        Expr::Or(left, right) => {
            let (left, right) = (compile_node(left), compile_node(right));
            node(move |root| {
                let result = as_bool(left(root)?)? || as_bool(right(root)?)?;
                Ok(Field::Value(Value::Bool(result)))
            })
        }

        Expr::Not(operand) => {
            let operand = compile_node(operand);
            node(move |root| Ok(Field::Value(Value::Bool(!as_bool(operand(root)?)?))))
        }

        Expr::Call { target, method, args } => {
            let target = compile_node(target);
            let args: Vec<Node> = args.iter().map(compile_node).collect();
            let method_name = method.clone();
            let method = StringMethod::from_name(method);
            node(move |root| {
                let Some(method) = method else {
                    return Err(EvalFault::MissingField {
                        member: method_name.clone(),
                    });
                };
                let receiver = match target(root)? {
                    Field::Value(Value::String(s)) => s,
                    Field::Value(Value::Null) | Field::Record(None) => {
                        return Err(EvalFault::NullReference {
                            member: method_name.clone(),
                        })
                    }
                    other => return Err(type_mismatch("string", &other)),
                };
                let arg = match args.first() {
                    Some(arg) => match arg(root)? {
                        Field::Value(Value::String(s)) => s,
                        Field::Value(Value::Null) | Field::Record(None) => {
                            return Err(EvalFault::NullReference {
                                member: format!("{} argument", method_name),
                            })
                        }
                        other => return Err(type_mismatch("string", &other)),
                    },
                    None => return Err(EvalFault::TypeMismatch {
                        expected: "string",
                        found: "nothing",
                    }),
                };
                Ok(Field::Value(Value::Bool(method.apply(&receiver, &arg))))
            })
        }

        Expr::Arithmetic { op, left, right } => {
            let (op, left, right) = (*op, compile_node(left), compile_node(right));
            node(move |root| {
                let result = arithmetic(op, scalar(left(root)?)?, scalar(right(root)?)?)?;
                Ok(Field::Value(result))
            })
        }

        Expr::Conditional { test, if_true, if_false } => {
            let (test, if_true, if_false) =
                (compile_node(test), compile_node(if_true), compile_node(if_false));
            node(move |root| {
                if as_bool(test(root)?)? {
                    if_true(root)
                } else {
                    if_false(root)
                }
            })
        }
    }
}

fn type_mismatch(expected: &'static str, found: &Field<'_>) -> EvalFault {
    let found = match found {
        Field::Value(v) => v.kind_name(),
        Field::Record(_) => "entity",
    };
    EvalFault::TypeMismatch { expected, found }
}

fn as_bool(field: Field<'_>) -> Result<bool, EvalFault> {
    match field {
        Field::Value(Value::Bool(b)) => Ok(b),
        other => Err(type_mismatch("bool", &other)),
    }
}

fn scalar(field: Field<'_>) -> Result<Value, EvalFault> {
    match field {
        Field::Value(v) => Ok(v),
        Field::Record(None) => Ok(Value::Null),
        other => Err(type_mismatch("scalar", &other)),
    }
}

/// 相等比较把 null 当作值; 与 null 的大小比较总是 false
fn compare(op: ComparisonType, left: &Field<'_>, right: &Field<'_>) -> Result<bool, EvalFault> {
    let equal = match (left, right) {
        (Field::Record(a), Field::Record(b)) => match (a, b) {
            (Some(a), Some(b)) => std::ptr::addr_eq(*a, *b),
            (None, None) => true,
            _ => false,
        },
        (Field::Record(r), Field::Value(v)) | (Field::Value(v), Field::Record(r)) => {
            r.is_none() && v.is_null()
        }
        (Field::Value(a), Field::Value(b)) => {
            if a.is_null() || b.is_null() {
                a.is_null() && b.is_null()
            } else {
                match a.compare(b) {
                    Some(ordering) => {
                        return ordered(op, ordering);
                    }
                    None => {
                        return Err(EvalFault::TypeMismatch {
                            expected: a.kind_name(),
                            found: b.kind_name(),
                        })
                    }
                }
            }
        }
    };

    match op {
        ComparisonType::EqualTo => Ok(equal),
        ComparisonType::NotEqualTo => Ok(!equal),
        _ => Ok(false),
    }
}

fn ordered(op: ComparisonType, ordering: Ordering) -> Result<bool, EvalFault> {
    Ok(match op {
        ComparisonType::EqualTo => ordering == Ordering::Equal,
        ComparisonType::NotEqualTo => ordering != Ordering::Equal,
        ComparisonType::GreaterThan => ordering == Ordering::Greater,
        ComparisonType::GreaterThanOrEqualTo => ordering != Ordering::Less,
        ComparisonType::LessThan => ordering == Ordering::Less,
        ComparisonType::LessThanOrEqualTo => ordering != Ordering::Greater,
    })
}

/// 带溢出检查的算术; 操作数为 null 时结果为 null
fn arithmetic(op: ArithmeticOp, left: Value, right: Value) -> Result<Value, EvalFault> {
    let fault = |reason| EvalFault::Arithmetic {
        op: op.node_kind(),
        reason,
    };

    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::Int(a), Value::Int(b)) => {
            let result = match op {
                ArithmeticOp::Add => a.checked_add(b),
                ArithmeticOp::Subtract => a.checked_sub(b),
                ArithmeticOp::Multiply => a.checked_mul(b),
                ArithmeticOp::Divide => {
                    if b == 0 {
                        return Err(fault("division by zero"));
                    }
                    a.checked_div(b)
                }
            };
            result.map(Value::Int).ok_or_else(|| fault("overflow"))
        }
        (a, b) => {
            let (a, b) = (to_decimal(a)?, to_decimal(b)?);
            let result = match op {
                ArithmeticOp::Add => a + b,
                ArithmeticOp::Subtract => a - b,
                ArithmeticOp::Multiply => a * b,
                ArithmeticOp::Divide => {
                    if b.is_zero() {
                        return Err(fault("division by zero"));
                    }
                    a / b
                }
            };
            Ok(Value::Decimal(result))
        }
    }
}

fn to_decimal(value: Value) -> Result<BigDecimal, EvalFault> {
    match value {
        Value::Decimal(d) => Ok(d),
        Value::Int(n) => Ok(BigDecimal::from(n)),
        other => Err(EvalFault::TypeMismatch {
            expected: "number",
            found: other.kind_name(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::member_path;
    use crate::demo::{Person, STATUS};
    use crate::schema::{Member, MemberType, Schema};

    fn matches(text: &str, person: &Person) -> Result<bool, EvalFault> {
        let lambda = Lambda::<Person>::parse(text).unwrap();
        compile(&lambda)(person)
    }

    #[test]
    fn test_comparisons() {
        let john = Person::new("John", 25);
        assert_eq!(matches("Age > 18", &john), Ok(true));
        assert_eq!(matches("Age <= 18", &john), Ok(false));
        assert_eq!(matches("Age == 25 && Age != 26", &john), Ok(true));
        assert_eq!(matches(r#"Name == "John""#, &john), Ok(true));
        assert_eq!(matches(r#"Initial == "J""#, &john), Ok(true));
    }

    static TICKET: Schema = Schema {
        name: "Ticket",
        members: &[Member { name: "Status", ty: MemberType::Enum(&STATUS) }],
    };

    struct Ticket(i64);

    impl Record for Ticket {
        fn field(&self, name: &str) -> Option<Field<'_>> {
            (name == "Status").then(|| Field::Value(Value::Int(self.0)))
        }
    }

    impl Entity for Ticket {
        fn schema() -> &'static Schema {
            &TICKET
        }
    }

    #[test]
    fn test_enum_member_read_as_int() {
        let lambda = Lambda::<Ticket>::parse("Status == 2 || Status < 1").unwrap();
        let filter = compile(&lambda);
        assert_eq!(filter(&Ticket(2)), Ok(true));
        assert_eq!(filter(&Ticket(1)), Ok(false));
        assert_eq!(filter(&Ticket(0)), Ok(true));
    }

    #[test]
    fn test_string_methods() {
        let john = Person::new("John", 25);
        assert_eq!(matches(r#"Name.StartsWith("Jo")"#, &john), Ok(true));
        assert_eq!(matches(r#"Name.EndsWith("hn")"#, &john), Ok(true));
        assert_eq!(matches(r#"Name.Contains("x")"#, &john), Ok(false));
    }

    #[test]
    fn test_null_semantics() {
        let john = Person::new("John", 25);
        assert_eq!(matches("Nickname == null", &john), Ok(true));
        assert_eq!(matches("Score == null", &john), Ok(true));
        assert_eq!(matches("Score > 3", &john), Ok(false));
        assert_eq!(matches("Score < 3", &john), Ok(false));
        assert_eq!(matches("Company == null", &john), Ok(true));
    }

    #[test]
    fn test_nested_member_through_null_faults() {
        let john = Person::new("John", 25);
        assert_eq!(
            matches(r#"Company.Name == "Acme""#, &john),
            Err(EvalFault::NullReference {
                member: "Name".to_string()
            })
        );
        let employed = Person::new("John", 25).with_company("Acme");
        assert_eq!(matches(r#"Company.Name == "Acme""#, &employed), Ok(true));
    }

    #[test]
    fn test_call_on_null_string_faults() {
        let mut nameless = Person::new("John", 25);
        nameless.name = None;
        assert!(matches!(
            matches(r#"Name.Contains("J")"#, &nameless),
            Err(EvalFault::NullReference { .. })
        ));
    }

    #[test]
    fn test_short_circuit_skips_faulting_branch() {
        let john = Person::new("John", 25);
        assert_eq!(
            matches(r#"Company != null && Company.Name == "Acme""#, &john),
            Ok(false)
        );
    }

    #[test]
    fn test_arithmetic_division_by_zero_faults() {
        let age = member_path(Expr::parameter::<Person>(), "Age").unwrap();
        let body = Expr::Comparison {
            op: ComparisonType::GreaterThan,
            left: Box::new(Expr::Arithmetic {
                op: ArithmeticOp::Divide,
                left: Box::new(age),
                right: Box::new(Expr::constant(0)),
            }),
            right: Box::new(Expr::constant(1)),
        };
        let lambda = Lambda::<Person>::new("p", body);
        assert_eq!(
            compile(&lambda)(&Person::new("John", 25)),
            Err(EvalFault::Arithmetic {
                op: "Divide",
                reason: "division by zero"
            })
        );
    }
}
