//! criteria 和描述符的 JSON 编解码
//!
//! 文档只包含成员路径、Filter 文本和标量。所有类型的解码规则相同:
//!
//! * 顶层 `null` 解码为 `None`; 其他非对象为 [`DecodeError::Malformed`]
//! * 忽略未知属性
//! * 缺失、空或仅含空白的成员路径表示"未设置"
//! * 无法在绑定类型上解析的成员路径为 [`DecodeError::UnknownMember`]
//! * Filter 必须存在且非空; "没有 Filter" 应通过省略整个 criteria 对象表达

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::ast::{Lambda, DEFAULT_PARAMETER};
use crate::criteria::EntityFilterCriteria;
use crate::descriptor::{OrderDescriptor, OrderType, SelectDescriptor, SqlLikeSearchInfo};
use crate::error::DecodeError;
use crate::schema::Entity;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct FilterWire {
    #[serde(default)]
    pub filter: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct OrderWire {
    #[serde(default)]
    pub order_item: Option<String>,
    #[serde(default)]
    pub order_type: Option<OrderType>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct SelectWire {
    #[serde(default)]
    pub assignor: Option<String>,
    #[serde(default)]
    pub assignee: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct SearchWire {
    #[serde(default)]
    pub search_item: Option<String>,
    #[serde(default)]
    pub search_string: Option<String>,
    #[serde(default)]
    pub search_group: Option<i32>,
}

/// 解析可选的成员路径, 空路径表示"未设置"
fn resolve<T: Entity>(path: Option<&str>) -> Result<Option<Lambda<T>>, DecodeError> {
    match path {
        Some(path) if !path.trim().is_empty() => {
            Ok(Some(Lambda::member(DEFAULT_PARAMETER, path)?))
        }
        _ => Ok(None),
    }
}

fn path_of<T: Entity>(selector: Option<&Lambda<T>>) -> Option<String> {
    selector.and_then(Lambda::member_path)
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

/// 读取顶层文档, 必须是对象或 `null`
fn read_object<W: DeserializeOwned>(json: &str) -> Result<Option<W>, DecodeError> {
    match serde_json::from_str::<JsonValue>(json)? {
        JsonValue::Null => Ok(None),
        object @ JsonValue::Object(_) => Ok(Some(serde_json::from_value(object)?)),
        other => Err(DecodeError::Malformed(format!(
            "expected a JSON object, found {}",
            json_kind(&other)
        ))),
    }
}

pub(crate) fn decode_document<W, O>(
    json: &str,
    kind: &'static str,
    convert: impl FnOnce(W) -> Result<O, DecodeError>,
) -> Result<Option<O>, DecodeError>
where
    W: DeserializeOwned,
{
    let result = read_object::<W>(json).and_then(|wire| wire.map(convert).transpose());
    if let Err(err) = &result {
        debug!(descriptor = kind, error = %err, "decode failed");
    }
    result
}

// filter

impl FilterWire {
    pub(crate) fn from_criteria<T: Entity>(criteria: &EntityFilterCriteria<T>) -> Self {
        Self {
            filter: Some(criteria.canonical_text().to_string()),
        }
    }

    pub(crate) fn into_criteria<T: Entity>(self) -> Result<EntityFilterCriteria<T>, DecodeError> {
        let text = match self.filter {
            Some(text) if !text.trim().is_empty() => text,
            _ => return Err(DecodeError::EmptyFilter),
        };
        let lambda = Lambda::parse(&text)?;
        Ok(EntityFilterCriteria::new(lambda)?)
    }
}

pub fn encode_filter<T: Entity>(criteria: &EntityFilterCriteria<T>) -> JsonValue {
    serde_json::json!(FilterWire::from_criteria(criteria))
}

/// 解码 `{"Filter": "<text>"}`, 使用默认参数名绑定
pub fn decode_filter<T: Entity>(
    json: &str,
) -> Result<Option<EntityFilterCriteria<T>>, DecodeError> {
    decode_document(json, "filter", FilterWire::into_criteria)
}

// order

impl OrderWire {
    pub(crate) fn from_descriptor<T: Entity>(descriptor: &OrderDescriptor<T>) -> Self {
        Self {
            order_item: path_of(descriptor.order_item()),
            order_type: Some(descriptor.order_type()),
        }
    }

    pub(crate) fn into_descriptor<T: Entity>(self) -> Result<OrderDescriptor<T>, DecodeError> {
        let item = resolve(self.order_item.as_deref())?;
        Ok(OrderDescriptor::new(item, self.order_type.unwrap_or_default())?)
    }
}

pub fn encode_order<T: Entity>(descriptor: &OrderDescriptor<T>) -> JsonValue {
    serde_json::json!(OrderWire::from_descriptor(descriptor))
}

pub fn decode_order<T: Entity>(json: &str) -> Result<Option<OrderDescriptor<T>>, DecodeError> {
    decode_document(json, "order", OrderWire::into_descriptor)
}

// select

impl SelectWire {
    pub(crate) fn from_descriptor<T: Entity, R: Entity>(
        descriptor: &SelectDescriptor<T, R>,
    ) -> Self {
        Self {
            assignor: path_of(descriptor.assignor()),
            assignee: path_of(descriptor.assignee()),
        }
    }

    pub(crate) fn into_descriptor<T: Entity, R: Entity>(
        self,
    ) -> Result<SelectDescriptor<T, R>, DecodeError> {
        let assignor = resolve::<T>(self.assignor.as_deref())?;
        let assignee = resolve::<R>(self.assignee.as_deref())?;
        Ok(SelectDescriptor::new(assignor, assignee)?)
    }
}

pub fn encode_select<T: Entity, R: Entity>(descriptor: &SelectDescriptor<T, R>) -> JsonValue {
    serde_json::json!(SelectWire::from_descriptor(descriptor))
}

pub fn decode_select<T: Entity, R: Entity>(
    json: &str,
) -> Result<Option<SelectDescriptor<T, R>>, DecodeError> {
    decode_document(json, "select", SelectWire::into_descriptor)
}

// search

impl SearchWire {
    pub(crate) fn from_info<T: Entity>(info: &SqlLikeSearchInfo<T>) -> Self {
        Self {
            search_item: path_of(info.search_item()),
            search_string: info.search_string().map(str::to_string),
            search_group: Some(info.search_group()),
        }
    }

    pub(crate) fn into_info<T: Entity>(self) -> Result<SqlLikeSearchInfo<T>, DecodeError> {
        let item = resolve(self.search_item.as_deref())?;
        Ok(SqlLikeSearchInfo::new(
            item,
            self.search_string,
            self.search_group.unwrap_or(0),
        )?)
    }
}

pub fn encode_search<T: Entity>(info: &SqlLikeSearchInfo<T>) -> JsonValue {
    serde_json::json!(SearchWire::from_info(info))
}

pub fn decode_search<T: Entity>(json: &str) -> Result<Option<SqlLikeSearchInfo<T>>, DecodeError> {
    decode_document(json, "search", SearchWire::into_info)
}

// serde 集成, 用于嵌入更大的文档

impl<T: Entity> Serialize for EntityFilterCriteria<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        FilterWire::from_criteria(self).serialize(serializer)
    }
}

impl<'de, T: Entity> Deserialize<'de> for EntityFilterCriteria<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        FilterWire::deserialize(deserializer)?
            .into_criteria()
            .map_err(D::Error::custom)
    }
}

impl<T: Entity> Serialize for OrderDescriptor<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        OrderWire::from_descriptor(self).serialize(serializer)
    }
}

impl<'de, T: Entity> Deserialize<'de> for OrderDescriptor<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        OrderWire::deserialize(deserializer)?
            .into_descriptor()
            .map_err(D::Error::custom)
    }
}

impl<T: Entity, R: Entity> Serialize for SelectDescriptor<T, R> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        SelectWire::from_descriptor(self).serialize(serializer)
    }
}

impl<'de, T: Entity, R: Entity> Deserialize<'de> for SelectDescriptor<T, R> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        SelectWire::deserialize(deserializer)?
            .into_descriptor()
            .map_err(D::Error::custom)
    }
}

impl<T: Entity> Serialize for SqlLikeSearchInfo<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        SearchWire::from_info(self).serialize(serializer)
    }
}

impl<'de, T: Entity> Deserialize<'de> for SqlLikeSearchInfo<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        SearchWire::deserialize(deserializer)?
            .into_info()
            .map_err(D::Error::custom)
    }
}
