//! 使用 sea-query 将 [`Query`] 编译为 SQL `SELECT`, 不执行查询
//!
//! 成员路径通过 [`SqlMappingConfig`] 映射为实体表的列;
//! `Company.Name` 这样的嵌套路径展开为单列(未映射时为 `Company_Name`), 不生成 join

use sea_query::{
    Asterisk, Condition, Expr as SqlExpr, Iden, LikeExpr, Order, PostgresQueryBuilder,
    SelectStatement, SimpleExpr, Value as SqlValue,
};
use tracing::debug;

use crate::ast::{ComparisonType, Expr, StringMethod};
use crate::config::SqlMappingConfig;
use crate::error::SqlError;
use crate::query::Query;
use crate::schema::Entity;
use crate::value::Value;

/// sea-query 的表标识符
#[derive(Debug, Clone)]
pub struct TableName(pub String);

impl Iden for TableName {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        let _ = s.write_str(&self.0);
    }
}

/// 列标识符包装
#[derive(Debug, Clone)]
pub struct ColumnName(pub String);

impl Iden for ColumnName {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        let _ = s.write_str(&self.0);
    }
}

/// SQL 编译结果
#[derive(Debug)]
pub struct CompileResult {
    pub sql: String,
    pub statement: SelectStatement,
}

#[derive(Debug, Clone, Default)]
pub struct SqlCompiler {
    config: SqlMappingConfig,
}

impl SqlCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: SqlMappingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SqlMappingConfig {
        &self.config
    }

    /// 将查询编译为 Postgres `SELECT`
    pub fn compile<T: Entity, R: Entity>(
        &self,
        query: &Query<T, R>,
    ) -> Result<CompileResult, SqlError> {
        let statement = self.build(query)?;
        let sql = statement.to_string(PostgresQueryBuilder);
        debug!(entity = T::schema().name, %sql, "compiled query");
        Ok(CompileResult { sql, statement })
    }

    /// 构建语句但不渲染
    pub fn build<T: Entity, R: Entity>(
        &self,
        query: &Query<T, R>,
    ) -> Result<SelectStatement, SqlError> {
        let entity = T::schema().name;
        let mut select = SelectStatement::new();
        select.from(TableName(self.config.table_name(entity)));

        // 投影
        let mut projected = false;
        for descriptor in query.select() {
            let (Some(path), Some(destination)) = (
                descriptor.assignor().and_then(|a| a.member_path()),
                descriptor.destination(),
            ) else {
                continue;
            };
            select.expr_as(
                SqlExpr::col(self.column(entity, &path)),
                ColumnName(destination),
            );
            projected = true;
        }
        if !projected {
            select.column(Asterisk);
        }

        // WHERE: Filter 和每个搜索分组, 以 AND 连接
        let mut condition = Condition::all();
        let mut has_condition = false;
        if let Some(filter) = query.filter() {
            condition = condition.add(self.lower(entity, filter.filter().body())?);
            has_condition = true;
        }
        for (_, infos) in query.search_groups() {
            let mut group = Condition::any();
            for info in infos {
                let (Some(path), Some(pattern)) =
                    (info.search_item().and_then(|i| i.member_path()), info.search_string())
                else {
                    continue;
                };
                group = group.add(SqlExpr::col(self.column(entity, &path)).like(pattern));
            }
            condition = condition.add(group);
            has_condition = true;
        }
        if has_condition {
            select.cond_where(condition);
        }

        for descriptor in query.order() {
            let Some(path) = descriptor.order_item().and_then(|o| o.member_path()) else {
                continue;
            };
            let order = if descriptor.order_type().is_descending() {
                Order::Desc
            } else {
                Order::Asc
            };
            select.order_by(self.column(entity, &path), order);
        }

        if let Some(take) = query.take() {
            select.limit(take);
        }
        if let Some(skip) = query.skip() {
            select.offset(skip);
        }

        Ok(select)
    }

    fn column(&self, entity: &str, path: &str) -> ColumnName {
        ColumnName(self.config.column_name(entity, path))
    }

    /// 将谓词树转换为 SQL 表达式
    fn lower(&self, entity: &str, expr: &Expr) -> Result<SimpleExpr, SqlError> {
        let lowered: SimpleExpr = match expr {
            Expr::Comparison { op, left, right } => {
                self.lower_comparison(entity, *op, left, right)?
            }
            Expr::And(left, right) => self.lower(entity, left)?.and(self.lower(entity, right)?),
            Expr::Or(left, right) => self.lower(entity, left)?.or(self.lower(entity, right)?),
            Expr::Not(inner) => self.lower(entity, inner)?.not(),
            Expr::Member { .. } => SqlExpr::col(self.member_column(entity, expr)?).into(),
            Expr::Constant { value, .. } => SqlExpr::val(sql_value(value)).into(),
            Expr::Call { target, method, args } => {
                let method = StringMethod::from_name(method).ok_or_else(|| unsupported(expr))?;
                let column = self.member_column(entity, target)?;
                let arg = match args.as_slice() {
                    [Expr::Constant {
                        value: Value::String(arg),
                        ..
                    }] => escape_like(arg),
                    _ => return Err(unsupported(expr)),
                };
                let pattern = match method {
                    StringMethod::Contains => format!("%{}%", arg),
                    StringMethod::StartsWith => format!("{}%", arg),
                    StringMethod::EndsWith => format!("%{}", arg),
                };
                SqlExpr::col(column).like(LikeExpr::new(pattern).escape('\\'))
            }
            Expr::Parameter { .. } | Expr::Arithmetic { .. } | Expr::Conditional { .. } => {
                return Err(unsupported(expr))
            }
        };
        Ok(lowered)
    }

    fn lower_comparison(
        &self,
        entity: &str,
        op: ComparisonType,
        left: &Expr,
        right: &Expr,
    ) -> Result<SimpleExpr, SqlError> {
        // 与 null 字面量的比较转为 IS [NOT] NULL
        let null_check = match (left, right) {
            (operand, Expr::Constant { value: Value::Null, .. })
            | (Expr::Constant { value: Value::Null, .. }, operand) => Some(operand),
            _ => None,
        };
        if let Some(operand) = null_check {
            let operand = SqlExpr::expr(self.lower(entity, operand)?);
            return match op {
                ComparisonType::EqualTo => Ok(operand.is_null()),
                ComparisonType::NotEqualTo => Ok(operand.is_not_null()),
                _ => Err(SqlError::Unsupported {
                    kind: op.node_kind().to_string(),
                }),
            };
        }

        let left = SqlExpr::expr(self.lower(entity, left)?);
        let right = self.lower(entity, right)?;
        Ok(match op {
            ComparisonType::EqualTo => left.eq(right),
            ComparisonType::NotEqualTo => left.ne(right),
            ComparisonType::GreaterThan => left.gt(right),
            ComparisonType::GreaterThanOrEqualTo => left.gte(right),
            ComparisonType::LessThan => left.lt(right),
            ComparisonType::LessThanOrEqualTo => left.lte(right),
        })
    }

    fn member_column(&self, entity: &str, expr: &Expr) -> Result<ColumnName, SqlError> {
        let path = expr.member_path().ok_or_else(|| unsupported(expr))?;
        Ok(self.column(entity, &path))
    }
}

fn unsupported(expr: &Expr) -> SqlError {
    SqlError::Unsupported { kind: expr.kind() }
}

/// 将 Filter 值转换为 sea-query Value
fn sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::String(None),
        Value::Bool(b) => SqlValue::Bool(Some(*b)),
        Value::Int(n) | Value::Enum(n) => SqlValue::BigInt(Some(*n)),
        Value::Decimal(d) => SqlValue::BigDecimal(Some(Box::new(d.clone()))),
        Value::String(s) => SqlValue::String(Some(Box::new(s.clone()))),
        Value::Char(c) => SqlValue::Char(Some(*c)),
    }
}

fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
