//! 带类型的 Filter 语言和查询规格引擎
//!
//! `Age > 18 && Name.StartsWith("Jo")` 这样的 Filter 文本经过分词、解析并绑定到实体的
//! [`Schema`], 得到的表达式树可以编译为谓词、输出为规范文本、编码为 JSON 或生成 SQL。

pub mod ast;
pub mod binder;
pub mod compile;
pub mod config;
pub mod criteria;
pub mod demo;
pub mod descriptor;
pub mod error;
pub mod json;
pub mod lexer;
pub mod parser;
pub mod printer;
pub mod query;
pub mod schema;
pub mod sql_compiler;
pub mod token;
pub mod value;

pub use ast::{ComparisonType, Expr, Lambda};
pub use criteria::{EntityFilterCriteria, FilterCriteria};
pub use descriptor::{OrderDescriptor, OrderType, SelectDescriptor, SqlLikeSearchInfo};
pub use error::{CriteriaError, DecodeError, DescriptorError, ParseError, TokenizeError};
pub use query::Query;
pub use schema::{Dynamic, Entity, EnumSchema, Field, Member, MemberType, Record, Schema};
pub use value::Value;
