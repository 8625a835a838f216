//! Filter 条件: 简单的 名称/运算符/值 形式, 以及表达式树形式

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

use tracing::{debug, warn};

use crate::ast::{ComparisonType, Expr, Lambda, DEFAULT_PARAMETER};
use crate::binder::{self, Operand};
use crate::compile::{compile, FilterFn};
use crate::error::{CriteriaError, ParseError};
use crate::schema::{Entity, MemberType};
use crate::value::Value;

/// 单个 `member OP value` 比较, 按成员名保存
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCriteria {
    property_type: MemberType,
    name: String,
    value: Option<Value>,
    comparison: ComparisonType,
}

impl FilterCriteria {
    /// 创建条件。只有可空的属性类型允许不提供值
    pub fn new(
        property_type: MemberType,
        name: impl Into<String>,
        value: Option<Value>,
        comparison: ComparisonType,
    ) -> Result<Self, CriteriaError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CriteriaError::BlankName);
        }

        let value = value.filter(|v| !v.is_null());
        if value.is_none() && !property_type.is_nullable() {
            return Err(CriteriaError::NullValueForValueType {
                type_name: property_type.to_string(),
            });
        }

        Ok(Self {
            property_type,
            name,
            value,
            comparison,
        })
    }

    /// 将成员 selector 分解为该成员上的条件
    ///
    /// Optional 类型会被解包, 枚举成员以其整数表示保存
    pub fn from_selector<T: Entity>(
        selector: &Lambda<T>,
        value: impl Into<Value>,
        comparison: ComparisonType,
    ) -> Result<Self, CriteriaError> {
        let body = selector.body();
        let (Some(chain), Some(name)) = (body.member_chain(), body.member_path()) else {
            return Err(CriteriaError::NotMemberAccess { kind: body.kind() });
        };
        let Some(member) = chain.last() else {
            return Err(CriteriaError::NotMemberAccess { kind: body.kind() });
        };

        let property_type = match member.ty.underlying() {
            MemberType::Enum(_) => MemberType::Int,
            other => other,
        };
        let value = match value.into() {
            Value::Null => None,
            Value::Enum(n) => Some(Value::Int(n)),
            other => Some(other.coerce_to(&property_type)?),
        };

        Self::new(property_type, name, value, comparison)
    }

    /// 分解单个 `member OP constant` 谓词。
    /// 复合表达式会被拒绝, 应使用 [`EntityFilterCriteria`]
    pub fn from_comparison<T: Entity>(predicate: &Lambda<T>) -> Result<Self, CriteriaError> {
        let body = predicate.body();
        let (op, left, right) = match body {
            Expr::Comparison { op, left, right } => (*op, left.as_ref(), right.as_ref()),
            Expr::And(..) | Expr::Or(..) => {
                return Err(CriteriaError::CompoundComparison { kind: body.kind() })
            }
            other => return Err(CriteriaError::UnsupportedComparison { kind: other.kind() }),
        };

        let (member, constant, op) = match (left, right) {
            (m @ Expr::Member { .. }, Expr::Constant { value, .. }) => (m, value, op),
            (Expr::Constant { value, .. }, m @ Expr::Member { .. }) => (m, value, op.mirrored()),
            _ => return Err(CriteriaError::UnsupportedComparison { kind: body.kind() }),
        };

        let name = member
            .member_path()
            .ok_or_else(|| CriteriaError::UnsupportedComparison { kind: member.kind() })?;
        Self::new(member.ty(), name, Some(constant.clone()), op)
    }

    /// 构建绑定到 `T` 的 `x => x.Name OP Value`
    pub fn build_expression<T: Entity>(&self) -> Result<Lambda<T>, CriteriaError> {
        let member = binder::member_path(Expr::parameter::<T>(), &self.name)?;
        let value = self.value.clone().unwrap_or(Value::Null);
        let body = binder::comparison(self.comparison, member, Operand::Literal(value))?;
        Ok(Lambda::new(DEFAULT_PARAMETER, body))
    }

    pub fn property_type(&self) -> MemberType {
        self.property_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn comparison(&self) -> ComparisonType {
        self.comparison
    }
}

/// `T` 上的谓词树, 附带惰性编译、可共享的过滤函数
///
/// 相等和哈希使用参数名加规范 Filter 文本,
/// 因此 `x => x.Age > 1` 与 `p => p.Age > 1` 是不同的条件
pub struct EntityFilterCriteria<T> {
    filter: Lambda<T>,
    canonical: String,
    key: String,
    hash: u64,
    compiled: OnceLock<FilterFn<T>>,
}

impl<T: Entity> EntityFilterCriteria<T> {
    /// 校验表达式树并生成规范文本。
    /// 树不是类型正确的谓词, 或含有无法输出为 Filter 文本的节点时失败
    pub fn new(filter: Lambda<T>) -> Result<Self, CriteriaError> {
        let ty = binder::check(filter.body())?;
        if !ty.is_bool() {
            return Err(ParseError::NotPredicate {
                found: ty.to_string(),
            }
            .into());
        }

        let canonical = filter.to_dsl()?;
        let key = format!("{} => {}", filter.param(), canonical);
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);

        Ok(Self {
            filter,
            canonical,
            key,
            hash: hasher.finish(),
            compiled: OnceLock::new(),
        })
    }

    /// 使用默认参数名解析 Filter 文本
    pub fn parse(text: &str) -> Result<Self, CriteriaError> {
        Self::new(Lambda::parse(text)?)
    }

    pub fn parse_as(param: &str, text: &str) -> Result<Self, CriteriaError> {
        Self::new(Lambda::parse_as(param, text)?)
    }

    pub fn filter(&self) -> &Lambda<T> {
        &self.filter
    }

    /// 规范 Filter 文本, 不含参数名
    pub fn canonical_text(&self) -> &str {
        &self.canonical
    }

    /// 编译后的谓词。首次访问时编译, 之后任何线程的调用都返回同一个函数
    pub fn filter_func(&self) -> FilterFn<T> {
        self.compiled().clone()
    }

    fn compiled(&self) -> &FilterFn<T> {
        self.compiled.get_or_init(|| {
            debug!(entity = T::schema().name, filter = %self.key, "compiling filter");
            compile(&self.filter)
        })
    }

    /// 对 `entity` 求值
    pub fn matches<'a>(&self, entity: impl Into<Option<&'a T>>) -> Result<bool, CriteriaError> {
        let entity = entity.into().ok_or(CriteriaError::NullEntity)?;
        (self.compiled())(entity).map_err(|source| {
            warn!(
                entity = T::schema().name,
                filter = %self.key,
                error = %source,
                "filter evaluation failed"
            );
            CriteriaError::Evaluation {
                entity_type: T::schema().name,
                source,
            }
        })
    }
}

impl<T> Clone for EntityFilterCriteria<T> {
    fn clone(&self) -> Self {
        Self {
            filter: self.filter.clone(),
            canonical: self.canonical.clone(),
            key: self.key.clone(),
            hash: self.hash,
            compiled: self.compiled.clone(),
        }
    }
}

impl<T> PartialEq for EntityFilterCriteria<T> {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.key == other.key
    }
}

impl<T> Eq for EntityFilterCriteria<T> {}

impl<T> Hash for EntityFilterCriteria<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl<T> fmt::Debug for EntityFilterCriteria<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityFilterCriteria")
            .field("filter", &self.key)
            .field("compiled", &self.compiled.get().is_some())
            .finish()
    }
}

impl<T> fmt::Display for EntityFilterCriteria<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::{Person, STATUS};
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_blank_name_rejected() {
        let err = FilterCriteria::new(
            MemberType::Int,
            "  ",
            Some(Value::Int(1)),
            ComparisonType::EqualTo,
        )
        .unwrap_err();
        assert_eq!(err, CriteriaError::BlankName);
    }

    #[test]
    fn test_null_value_nullability() {
        let eq = ComparisonType::EqualTo;
        assert!(FilterCriteria::new(MemberType::String, "Name", None, eq).is_ok());
        assert!(FilterCriteria::new(
            MemberType::Optional(&MemberType::Int),
            "Score",
            Some(Value::Null),
            ComparisonType::EqualTo
        )
        .is_ok());
        assert_eq!(
            FilterCriteria::new(MemberType::Int, "Age", None, ComparisonType::EqualTo),
            Err(CriteriaError::NullValueForValueType {
                type_name: "int".to_string()
            })
        );
    }

    #[test]
    fn test_build_expression() {
        let criteria = FilterCriteria::new(
            MemberType::Int,
            "Age",
            Some(Value::Int(18)),
            ComparisonType::GreaterThan,
        )
        .unwrap();
        let lambda = criteria.build_expression::<Person>().unwrap();
        assert_eq!(lambda.param(), "x");
        assert_eq!(lambda.to_dsl().unwrap(), "(Age > 18)");
    }

    #[test]
    fn test_build_expression_unknown_member() {
        let criteria = FilterCriteria::new(
            MemberType::Int,
            "Salary",
            Some(Value::Int(1)),
            ComparisonType::EqualTo,
        )
        .unwrap();
        assert!(matches!(
            criteria.build_expression::<Person>(),
            Err(CriteriaError::Expression(ParseError::UnknownMember { .. }))
        ));
    }

    #[test]
    fn test_from_selector_unwraps_optional() {
        let selector = Lambda::<Person>::member("p", "Score").unwrap();
        let criteria =
            FilterCriteria::from_selector(&selector, 3, ComparisonType::LessThan).unwrap();
        assert_eq!(criteria.name(), "Score");
        assert_eq!(criteria.property_type(), MemberType::Int);
        assert_eq!(criteria.value(), Some(&Value::Int(3)));
        assert_eq!(criteria.comparison(), ComparisonType::LessThan);

        // 解包后的类型不再接受 null
        assert!(matches!(
            FilterCriteria::from_selector(&selector, Value::Null, ComparisonType::EqualTo),
            Err(CriteriaError::NullValueForValueType { .. })
        ));
    }

    #[test]
    fn test_from_selector_enum_becomes_int() {
        let selector = Lambda::<Person>::member("p", "Status").unwrap();
        let criteria =
            FilterCriteria::from_selector(&selector, Value::Enum(2), ComparisonType::EqualTo)
                .unwrap();
        assert_eq!(criteria.property_type(), MemberType::Int);
        assert_eq!(criteria.value(), Some(&Value::Int(2)));
        assert_eq!(STATUS.variant_name(2), Some("Retired"));
    }

    #[test]
    fn test_from_selector_requires_member_access() {
        let selector = Lambda::<Person>::new("p", Expr::constant(1));
        assert_eq!(
            FilterCriteria::from_selector(&selector, 1, ComparisonType::EqualTo),
            Err(CriteriaError::NotMemberAccess {
                kind: "Constant".to_string()
            })
        );
    }

    #[test]
    fn test_from_comparison() {
        let predicate = Lambda::<Person>::parse(r#"Company.Name != "Acme""#).unwrap();
        let criteria = FilterCriteria::from_comparison(&predicate).unwrap();
        assert_eq!(criteria.name(), "Company.Name");
        assert_eq!(criteria.comparison(), ComparisonType::NotEqualTo);
        assert_eq!(criteria.value(), Some(&Value::from("Acme")));
    }

    #[test]
    fn test_from_comparison_with_constant_on_left() {
        let predicate = Lambda::<Person>::parse("18 < Age").unwrap();
        let criteria = FilterCriteria::from_comparison(&predicate).unwrap();
        assert_eq!(criteria.comparison(), ComparisonType::GreaterThan);
        assert_eq!(criteria.value(), Some(&Value::Int(18)));
    }

    #[test]
    fn test_from_comparison_rejects_compound() {
        let predicate = Lambda::<Person>::parse("Age > 1 && Age < 9").unwrap();
        assert_eq!(
            FilterCriteria::from_comparison(&predicate),
            Err(CriteriaError::CompoundComparison {
                kind: "AndAlso".to_string()
            })
        );
        let predicate = Lambda::<Person>::parse(r#"Name.Contains("a")"#).unwrap();
        assert!(matches!(
            FilterCriteria::from_comparison(&predicate),
            Err(CriteriaError::UnsupportedComparison { .. })
        ));
    }

    #[test]
    fn test_entity_criteria_matches() {
        let criteria = EntityFilterCriteria::<Person>::parse("Age > 18").unwrap();
        assert_eq!(criteria.matches(&Person::new("John", 25)), Ok(true));
        assert_eq!(criteria.matches(&Person::new("John", 10)), Ok(false));
        assert_eq!(criteria.matches(None), Err(CriteriaError::NullEntity));
    }

    #[test]
    fn test_evaluation_fault_is_wrapped() {
        let criteria = EntityFilterCriteria::<Person>::parse(r#"Company.Name == "Acme""#).unwrap();
        let err = criteria.matches(&Person::new("John", 25)).unwrap_err();
        match err {
            CriteriaError::Evaluation { entity_type, source } => {
                assert_eq!(entity_type, "Person");
                assert!(matches!(source, crate::error::EvalFault::NullReference { .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_construction_fails_fast() {
        assert!(matches!(
            EntityFilterCriteria::<Person>::parse("Salary > 1"),
            Err(CriteriaError::Expression(ParseError::UnknownMember { .. }))
        ));
        let not_predicate = Lambda::<Person>::member("x", "Age").unwrap();
        assert!(matches!(
            EntityFilterCriteria::new(not_predicate),
            Err(CriteriaError::Expression(ParseError::NotPredicate { .. }))
        ));
    }

    #[test]
    fn test_equality_uses_canonical_text() {
        let a = EntityFilterCriteria::<Person>::parse("Age>18&&IsActive").unwrap();
        let b = EntityFilterCriteria::<Person>::parse("(Age > 18) && IsActive").unwrap();
        let c = EntityFilterCriteria::<Person>::parse("Age >= 18 && IsActive").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<_> = [a.clone(), b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
        assert!(set.contains(&a));
    }

    #[test]
    fn test_equality_depends_on_parameter_name() {
        let x = EntityFilterCriteria::<Person>::parse_as("x", "Age > 18").unwrap();
        let p = EntityFilterCriteria::<Person>::parse_as("p", "Age > 18").unwrap();
        assert_eq!(x.canonical_text(), p.canonical_text());
        assert_ne!(x, p);
    }

    #[test]
    fn test_filter_func_is_shared_across_threads() {
        let criteria = EntityFilterCriteria::<Person>::parse("Age > 18").unwrap();
        let funcs: Vec<FilterFn<Person>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8).map(|_| scope.spawn(|| criteria.filter_func())).collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        let first = criteria.filter_func();
        assert!(funcs.iter().all(|f| Arc::ptr_eq(f, &first)));
    }
}
