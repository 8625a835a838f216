//! 交给执行层的查询: 过滤、排序、投影、LIKE 搜索分组和分页

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::criteria::EntityFilterCriteria;
use crate::descriptor::{OrderDescriptor, SelectDescriptor, SqlLikeSearchInfo};
use crate::error::{CriteriaError, DecodeError};
use crate::json::{decode_document, FilterWire, OrderWire, SearchWire, SelectWire};
use crate::schema::Entity;

/// `T` 上投影到 `R` 的查询
pub struct Query<T, R = T> {
    filter: Option<EntityFilterCriteria<T>>,
    order: Vec<OrderDescriptor<T>>,
    select: Vec<SelectDescriptor<T, R>>,
    search: Vec<SqlLikeSearchInfo<T>>,
    skip: Option<u64>,
    take: Option<u64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct QueryWire {
    #[serde(default)]
    filter: Option<FilterWire>,
    #[serde(default)]
    order: Option<Vec<OrderWire>>,
    #[serde(default)]
    select: Option<Vec<SelectWire>>,
    #[serde(default)]
    search: Option<Vec<SearchWire>>,
    #[serde(default)]
    skip: Option<u64>,
    #[serde(default)]
    take: Option<u64>,
}

impl<T: Entity, R: Entity> Query<T, R> {
    pub fn new() -> Self {
        Self {
            filter: None,
            order: Vec::new(),
            select: Vec::new(),
            search: Vec::new(),
            skip: None,
            take: None,
        }
    }

    pub fn with_filter(mut self, filter: EntityFilterCriteria<T>) -> Self {
        self.filter = Some(filter);
        self
    }

    /// 解析并设置 Filter
    pub fn with_filter_text(self, text: &str) -> Result<Self, CriteriaError> {
        Ok(self.with_filter(EntityFilterCriteria::parse(text)?))
    }

    pub fn with_order(mut self, order: OrderDescriptor<T>) -> Self {
        self.order.push(order);
        self
    }

    pub fn with_select(mut self, select: SelectDescriptor<T, R>) -> Self {
        self.select.push(select);
        self
    }

    pub fn with_search(mut self, search: SqlLikeSearchInfo<T>) -> Self {
        self.search.push(search);
        self
    }

    pub fn with_skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn with_take(mut self, take: u64) -> Self {
        self.take = Some(take);
        self
    }

    pub fn filter(&self) -> Option<&EntityFilterCriteria<T>> {
        self.filter.as_ref()
    }

    pub fn order(&self) -> &[OrderDescriptor<T>] {
        &self.order
    }

    pub fn select(&self) -> &[SelectDescriptor<T, R>] {
        &self.select
    }

    pub fn search(&self) -> &[SqlLikeSearchInfo<T>] {
        &self.search
    }

    pub fn skip(&self) -> Option<u64> {
        self.skip
    }

    pub fn take(&self) -> Option<u64> {
        self.take
    }

    /// 按 `SearchGroup` 升序分组的搜索条目。缺少成员或模式的条目不参与
    pub fn search_groups(&self) -> BTreeMap<i32, Vec<&SqlLikeSearchInfo<T>>> {
        let mut groups: BTreeMap<i32, Vec<&SqlLikeSearchInfo<T>>> = BTreeMap::new();
        for info in &self.search {
            if info.search_item().is_some() && info.search_string().is_some() {
                groups.entry(info.search_group()).or_default().push(info);
            }
        }
        groups
    }

    pub fn encode(&self) -> JsonValue {
        let wire = QueryWire {
            filter: self.filter.as_ref().map(FilterWire::from_criteria),
            order: Some(self.order.iter().map(OrderWire::from_descriptor).collect()),
            select: Some(self.select.iter().map(SelectWire::from_descriptor).collect()),
            search: Some(self.search.iter().map(SearchWire::from_info).collect()),
            skip: self.skip,
            take: self.take,
        };
        serde_json::json!(wire)
    }

    /// 解码查询文档。缺失的数组解码为空, `null` 文档解码为 `None`
    pub fn decode(json: &str) -> Result<Option<Self>, DecodeError> {
        decode_document(json, "query", |wire: QueryWire| {
            Ok(Self {
                filter: wire.filter.map(FilterWire::into_criteria).transpose()?,
                order: wire
                    .order
                    .unwrap_or_default()
                    .into_iter()
                    .map(OrderWire::into_descriptor)
                    .collect::<Result<_, _>>()?,
                select: wire
                    .select
                    .unwrap_or_default()
                    .into_iter()
                    .map(SelectWire::into_descriptor)
                    .collect::<Result<_, _>>()?,
                search: wire
                    .search
                    .unwrap_or_default()
                    .into_iter()
                    .map(SearchWire::into_info)
                    .collect::<Result<_, _>>()?,
                skip: wire.skip,
                take: wire.take,
            })
        })
    }
}

impl<T: Entity, R: Entity> Default for Query<T, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, R> Clone for Query<T, R> {
    fn clone(&self) -> Self {
        Self {
            filter: self.filter.clone(),
            order: self.order.clone(),
            select: self.select.clone(),
            search: self.search.clone(),
            skip: self.skip,
            take: self.take,
        }
    }
}

impl<T, R> PartialEq for Query<T, R> {
    fn eq(&self, other: &Self) -> bool {
        self.filter == other.filter
            && self.order == other.order
            && self.select == other.select
            && self.search == other.search
            && self.skip == other.skip
            && self.take == other.take
    }
}

impl<T, R> fmt::Debug for Query<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("filter", &self.filter)
            .field("order", &self.order)
            .field("select", &self.select)
            .field("search", &self.search)
            .field("skip", &self.skip)
            .field("take", &self.take)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::OrderType;
    use crate::demo::{Person, PersonView};
    use serde_json::json;

    fn sample() -> Query<Person, PersonView> {
        Query::new()
            .with_filter_text("Age >= 18")
            .unwrap()
            .with_order(OrderDescriptor::from_path("Age", OrderType::OrderByDescending).unwrap())
            .with_order(OrderDescriptor::from_path("Name", OrderType::ThenBy).unwrap())
            .with_select(SelectDescriptor::from_paths("Name", None).unwrap())
            .with_select(SelectDescriptor::from_paths("Company.Name", Some("Employer")).unwrap())
            .with_search(SqlLikeSearchInfo::from_path("Name", "%jo%", 0).unwrap())
            .with_search(SqlLikeSearchInfo::from_path("Nickname", "%jo%", 0).unwrap())
            .with_search(SqlLikeSearchInfo::from_path("Company.Name", "ac%", 1).unwrap())
            .with_skip(20)
            .with_take(10)
    }

    #[test]
    fn test_search_groups() {
        let query = sample().with_search(SqlLikeSearchInfo::default());
        let groups = query.search_groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[&0].len(), 2);
        assert_eq!(groups[&1].len(), 1);
    }

    #[test]
    fn test_encode_shape() {
        let encoded = sample().encode();
        assert_eq!(encoded["Filter"], json!({"Filter": "(Age >= 18)"}));
        assert_eq!(
            encoded["Order"][0],
            json!({"OrderItem": "Age", "OrderType": "OrderByDescending"})
        );
        assert_eq!(
            encoded["Select"][1],
            json!({"Assignor": "Company.Name", "Assignee": "Employer"})
        );
        assert_eq!(encoded["Skip"], json!(20));
        assert_eq!(encoded["Take"], json!(10));
    }

    #[test]
    fn test_round_trip() {
        let query = sample();
        let decoded = Query::<Person, PersonView>::decode(&query.encode().to_string())
            .unwrap()
            .unwrap();
        assert_eq!(decoded, query);
    }

    #[test]
    fn test_absent_parts_decode_as_empty() {
        let query = Query::<Person>::decode(r#"{"Take": 5}"#).unwrap().unwrap();
        assert!(query.filter().is_none());
        assert!(query.order().is_empty());
        assert!(query.select().is_empty());
        assert!(query.search().is_empty());
        assert_eq!(query.take(), Some(5));
        assert_eq!(query.skip(), None);
    }

    #[test]
    fn test_decode_errors_propagate() {
        assert!(matches!(
            Query::<Person>::decode(r#"{"Filter": {"Filter": ""}}"#),
            Err(DecodeError::EmptyFilter)
        ));
        assert!(matches!(
            Query::<Person>::decode(r#"{"Order": [{"OrderItem": "Salary"}]}"#),
            Err(DecodeError::UnknownMember { .. })
        ));
        assert!(Query::<Person>::decode("null").unwrap().is_none());
    }
}
