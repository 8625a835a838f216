//! 配置模块，负责从JSON加载生成 SQL 时使用的表名和列名映射
//!
//! ```json
//! {
//!   "tables": { "Person": "people" },
//!   "columns": { "Person": { "Company.Name": "company_name" } }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file does not exist: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SqlMappingConfig {
    /// 实体名到数据库表名的映射
    #[serde(default)]
    pub tables: HashMap<String, String>,
    /// 实体名 -> 成员路径 -> 列名
    #[serde(default)]
    pub columns: HashMap<String, HashMap<String, String>>,
}

impl SqlMappingConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// 获取实体对应的表名，如果不存在则返回小写的实体名
    pub fn table_name(&self, entity: &str) -> String {
        self.tables
            .get(entity)
            .cloned()
            .unwrap_or_else(|| entity.to_lowercase())
    }

    /// 获取成员路径对应的列名，如果不存在则把 `.` 替换为 `_`
    pub fn column_name(&self, entity: &str, path: &str) -> String {
        self.columns
            .get(entity)
            .and_then(|columns| columns.get(path))
            .cloned()
            .unwrap_or_else(|| path.replace('.', "_"))
    }

    pub fn with_table(mut self, entity: &str, table: &str) -> Self {
        self.tables.insert(entity.to_string(), table.to_string());
        self
    }

    pub fn with_column(mut self, entity: &str, path: &str, column: &str) -> Self {
        self.columns
            .entry(entity.to_string())
            .or_default()
            .insert(path.to_string(), column.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_valid_json_config() {
        let temp_file = "test_query_mapping.json";
        let mut file = fs::File::create(temp_file).unwrap();
        writeln!(
            file,
            r#"{{
            "tables": {{ "Person": "people" }},
            "columns": {{ "Person": {{ "Company.Name": "employer" }} }}
        }}"#
        )
        .unwrap();

        let config = SqlMappingConfig::from_json_file(temp_file).unwrap();
        assert_eq!(config.table_name("Person"), "people");
        assert_eq!(config.table_name("Company"), "company");
        assert_eq!(config.column_name("Person", "Company.Name"), "employer");
        assert_eq!(config.column_name("Person", "Age"), "Age");

        fs::remove_file(temp_file).ok();
    }

    #[test]
    fn test_invalid_json_config() {
        let temp_file = "test_invalid_query_mapping.json";
        let mut file = fs::File::create(temp_file).unwrap();
        writeln!(file, "invalid json").unwrap();

        let result = SqlMappingConfig::from_json_file(temp_file);
        assert!(matches!(result, Err(ConfigError::Json(_))));

        fs::remove_file(temp_file).ok();
    }

    #[test]
    fn test_missing_file() {
        let result = SqlMappingConfig::from_json_file("non_existent_query_mapping.json");
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_defaults() {
        let config = SqlMappingConfig::from_json_str("{}").unwrap();
        assert_eq!(config, SqlMappingConfig::default());
        assert_eq!(config.table_name("Person"), "person");
        assert_eq!(config.column_name("Person", "Company.Rating"), "Company_Rating");
    }

    #[test]
    fn test_builder() {
        let config = SqlMappingConfig::default()
            .with_table("Person", "people")
            .with_column("Person", "IsActive", "active");
        assert_eq!(config.table_name("Person"), "people");
        assert_eq!(config.column_name("Person", "IsActive"), "active");
    }
}
