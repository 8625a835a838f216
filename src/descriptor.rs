//! 排序、投影和 LIKE 搜索描述符
//!
//! 描述符保存成员 selector 而不是路径, 以保持与实体类型的绑定;
//! [`crate::json`] 负责与成员路径字符串之间的转换

use std::any::TypeId;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ast::{Lambda, DEFAULT_PARAMETER};
use crate::error::{DescriptorError, ParseError};
use crate::schema::{Dynamic, Entity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OrderType {
    #[default]
    OrderBy,
    OrderByDescending,
    ThenBy,
    ThenByDescending,
}

impl OrderType {
    pub fn is_descending(&self) -> bool {
        matches!(self, OrderType::OrderByDescending | OrderType::ThenByDescending)
    }
}

fn require_member<T: Entity>(selector: &Option<Lambda<T>>) -> Result<(), DescriptorError> {
    match selector {
        Some(lambda) if lambda.member_path().is_none() => Err(DescriptorError::NotMemberAccess {
            kind: lambda.body().kind(),
        }),
        _ => Ok(()),
    }
}

/// 一个排序键。多个排序键组成多键排序;
/// 由调用方保证第一个为 `OrderBy*`, 其余为 `ThenBy*`
pub struct OrderDescriptor<T> {
    order_item: Option<Lambda<T>>,
    order_type: OrderType,
}

impl<T: Entity> OrderDescriptor<T> {
    pub fn new(
        order_item: Option<Lambda<T>>,
        order_type: OrderType,
    ) -> Result<Self, DescriptorError> {
        require_member(&order_item)?;
        Ok(Self {
            order_item,
            order_type,
        })
    }

    pub fn from_path(path: &str, order_type: OrderType) -> Result<Self, ParseError> {
        Ok(Self {
            order_item: Some(Lambda::member(DEFAULT_PARAMETER, path)?),
            order_type,
        })
    }

    pub fn order_item(&self) -> Option<&Lambda<T>> {
        self.order_item.as_ref()
    }

    pub fn order_type(&self) -> OrderType {
        self.order_type
    }

    /// `OrderBy` 或 `OrderByDescending`, 即可以作为第一个排序键
    pub fn is_primary(&self) -> bool {
        matches!(self.order_type, OrderType::OrderBy | OrderType::OrderByDescending)
    }
}

impl<T> Clone for OrderDescriptor<T> {
    fn clone(&self) -> Self {
        Self {
            order_item: self.order_item.clone(),
            order_type: self.order_type,
        }
    }
}

impl<T> PartialEq for OrderDescriptor<T> {
    fn eq(&self, other: &Self) -> bool {
        self.order_item == other.order_item && self.order_type == other.order_type
    }
}

impl<T> fmt::Debug for OrderDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderDescriptor")
            .field("order_item", &self.order_item)
            .field("order_type", &self.order_type)
            .finish()
    }
}

/// 将 `T` 的成员映射到投影类型 `R` 的成员
pub struct SelectDescriptor<T, R = T> {
    assignor: Option<Lambda<T>>,
    assignee: Option<Lambda<R>>,
}

impl<T: Entity, R: Entity> SelectDescriptor<T, R> {
    /// 校验映射
    ///
    /// `R` 为 `T` 或 [`Dynamic`] 时不允许提供 assignee。
    /// 否则目标成员(assignee, 或与 assignor 最后一段同名的成员)必须存在于 `R`
    pub fn new(
        assignor: Option<Lambda<T>>,
        assignee: Option<Lambda<R>>,
    ) -> Result<Self, DescriptorError> {
        require_member(&assignor)?;
        require_member(&assignee)?;

        let result_type = R::schema().name;
        if Self::is_identity_projection() {
            if assignee.is_some() {
                return Err(DescriptorError::AssigneeNotAllowed {
                    type_name: result_type.to_string(),
                });
            }
        } else if assignee.is_none() {
            let source = assignor
                .as_ref()
                .and_then(|a| a.body().member_chain())
                .and_then(|chain| chain.last().copied());
            if let Some(member) = source {
                if R::schema().member(member.name).is_none() {
                    return Err(DescriptorError::MissingDestinationMember {
                        member: member.name.to_string(),
                        type_name: result_type.to_string(),
                    });
                }
            }
        }

        Ok(Self { assignor, assignee })
    }

    /// 由 `T` 上的成员路径(以及可选的 `R` 上的路径)构建描述符
    pub fn from_paths(assignor: &str, assignee: Option<&str>) -> Result<Self, DescriptorError> {
        let assignor = Lambda::member(DEFAULT_PARAMETER, assignor)?;
        let assignee = assignee
            .map(|path| {
                Lambda::member(DEFAULT_PARAMETER, path).map_err(|_| {
                    DescriptorError::MissingDestinationMember {
                        member: path.to_string(),
                        type_name: R::schema().name.to_string(),
                    }
                })
            })
            .transpose()?;
        Self::new(Some(assignor), assignee)
    }

    fn is_identity_projection() -> bool {
        let result = TypeId::of::<R>();
        result == TypeId::of::<T>() || result == TypeId::of::<Dynamic>()
    }

    pub fn assignor(&self) -> Option<&Lambda<T>> {
        self.assignor.as_ref()
    }

    pub fn assignee(&self) -> Option<&Lambda<R>> {
        self.assignee.as_ref()
    }

    /// 目标成员路径: assignee 的路径, 或 assignor 最后一段的成员名
    pub fn destination(&self) -> Option<String> {
        if let Some(path) = self.assignee.as_ref().and_then(Lambda::member_path) {
            return Some(path);
        }
        self.assignor
            .as_ref()
            .and_then(|a| a.body().member_chain())
            .and_then(|chain| chain.last().map(|m| m.name.to_string()))
    }
}

impl<T, R> Clone for SelectDescriptor<T, R> {
    fn clone(&self) -> Self {
        Self {
            assignor: self.assignor.clone(),
            assignee: self.assignee.clone(),
        }
    }
}

impl<T, R> PartialEq for SelectDescriptor<T, R> {
    fn eq(&self, other: &Self) -> bool {
        self.assignor == other.assignor && self.assignee == other.assignee
    }
}

impl<T, R> fmt::Debug for SelectDescriptor<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectDescriptor")
            .field("assignor", &self.assignor)
            .field("assignee", &self.assignee)
            .finish()
    }
}

/// 单个成员上的 LIKE 搜索。同组内 OR, 组之间 AND
pub struct SqlLikeSearchInfo<T> {
    search_item: Option<Lambda<T>>,
    search_string: Option<String>,
    search_group: i32,
}

impl<T: Entity> SqlLikeSearchInfo<T> {
    pub fn new(
        search_item: Option<Lambda<T>>,
        search_string: Option<String>,
        search_group: i32,
    ) -> Result<Self, DescriptorError> {
        require_member(&search_item)?;
        Ok(Self {
            search_item,
            search_string,
            search_group,
        })
    }

    pub fn from_path(
        path: &str,
        search_string: impl Into<String>,
        search_group: i32,
    ) -> Result<Self, ParseError> {
        Ok(Self {
            search_item: Some(Lambda::member(DEFAULT_PARAMETER, path)?),
            search_string: Some(search_string.into()),
            search_group,
        })
    }

    pub fn search_item(&self) -> Option<&Lambda<T>> {
        self.search_item.as_ref()
    }

    pub fn search_string(&self) -> Option<&str> {
        self.search_string.as_deref()
    }

    pub fn search_group(&self) -> i32 {
        self.search_group
    }
}

impl<T> Default for SqlLikeSearchInfo<T> {
    fn default() -> Self {
        Self {
            search_item: None,
            search_string: None,
            search_group: 0,
        }
    }
}

impl<T> Clone for SqlLikeSearchInfo<T> {
    fn clone(&self) -> Self {
        Self {
            search_item: self.search_item.clone(),
            search_string: self.search_string.clone(),
            search_group: self.search_group,
        }
    }
}

impl<T> PartialEq for SqlLikeSearchInfo<T> {
    fn eq(&self, other: &Self) -> bool {
        self.search_item == other.search_item
            && self.search_string == other.search_string
            && self.search_group == other.search_group
    }
}

impl<T> fmt::Debug for SqlLikeSearchInfo<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlLikeSearchInfo")
            .field("search_item", &self.search_item)
            .field("search_string", &self.search_string)
            .field("search_group", &self.search_group)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Expr;
    use crate::demo::{Person, PersonView};

    #[test]
    fn test_order_descriptor_requires_member() {
        let computed = Lambda::<Person>::parse("Age > 1").unwrap();
        assert_eq!(
            OrderDescriptor::new(Some(computed), OrderType::OrderBy),
            Err(DescriptorError::NotMemberAccess {
                kind: "GreaterThan".to_string()
            })
        );
        assert!(OrderDescriptor::<Person>::new(None, OrderType::ThenBy).is_ok());
    }

    #[test]
    fn test_order_descriptor_primary() {
        let first =
            OrderDescriptor::<Person>::from_path("Age", OrderType::OrderByDescending).unwrap();
        let second = OrderDescriptor::<Person>::from_path("Name", OrderType::ThenBy).unwrap();
        assert!(first.is_primary());
        assert!(first.order_type().is_descending());
        assert!(!second.is_primary());
        assert_eq!(
            second.order_item().and_then(Lambda::member_path).as_deref(),
            Some("Name")
        );
    }

    #[test]
    fn test_select_same_type_rejects_assignee() {
        let assignor = Lambda::<Person>::member("x", "Name").unwrap();
        let assignee = Lambda::<Person>::member("x", "Name").unwrap();
        assert_eq!(
            SelectDescriptor::<Person>::new(Some(assignor.clone()), Some(assignee)),
            Err(DescriptorError::AssigneeNotAllowed {
                type_name: "Person".to_string()
            })
        );
        assert!(SelectDescriptor::<Person>::new(Some(assignor.clone()), None).is_ok());
        assert!(SelectDescriptor::<Person, Dynamic>::new(Some(assignor), None).is_ok());
    }

    #[test]
    fn test_select_destination_by_name() {
        let select = SelectDescriptor::<Person, PersonView>::from_paths("Name", None).unwrap();
        assert_eq!(select.destination().as_deref(), Some("Name"));
        assert!(select.assignee().is_none());

        assert_eq!(
            SelectDescriptor::<Person, PersonView>::from_paths("Age", None),
            Err(DescriptorError::MissingDestinationMember {
                member: "Age".to_string(),
                type_name: "PersonView".to_string()
            })
        );
    }

    #[test]
    fn test_select_with_assignee() {
        let select =
            SelectDescriptor::<Person, PersonView>::from_paths("Company.Name", Some("Employer"))
                .unwrap();
        assert_eq!(select.destination().as_deref(), Some("Employer"));

        let err =
            SelectDescriptor::<Person, PersonView>::from_paths("Age", Some("Salary")).unwrap_err();
        assert!(matches!(
            err,
            DescriptorError::MissingDestinationMember { ref member, .. } if member == "Salary"
        ));
    }

    #[test]
    fn test_select_assignor_must_be_member() {
        let assignor = Lambda::<Person>::new("x", Expr::constant(1));
        assert!(matches!(
            SelectDescriptor::<Person, PersonView>::new(Some(assignor), None),
            Err(DescriptorError::NotMemberAccess { .. })
        ));
    }

    #[test]
    fn test_search_info_defaults() {
        let info = SqlLikeSearchInfo::<Person>::default();
        assert!(info.search_item().is_none());
        assert!(info.search_string().is_none());
        assert_eq!(info.search_group(), 0);

        let info = SqlLikeSearchInfo::<Person>::from_path("Company.Name", "ac", 2).unwrap();
        assert_eq!(info.search_string(), Some("ac"));
        assert_eq!(info.search_group(), 2);
    }
}
