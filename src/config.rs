//! 配置模块，负责从JSON文件加载客户端配置与字段映射

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::query_compiler::FieldMapper;
use crate::request::Credentials;

/// 配置加载错误
#[derive(Debug, Error)]
#[error("config error: {message}")]
pub struct ConfigError {
    pub message: String,
}

impl ConfigError {
    pub fn new(message: String) -> Self {
        Self { message }
    }
}

/// 字段映射配置：资源名 -> (逻辑字段名 -> 远端字段名)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMappings {
    pub resources: HashMap<String, HashMap<String, String>>,
}

impl FieldMappings {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加一条映射
    pub fn insert(
        &mut self,
        resource: impl Into<String>,
        field: impl Into<String>,
        mapped: impl Into<String>,
    ) {
        self.resources
            .entry(resource.into())
            .or_default()
            .insert(field.into(), mapped.into());
    }

    /// 获取资源对应的字段映射视图
    pub fn for_resource(&self, resource: &str) -> ResourceFieldMap<'_> {
        ResourceFieldMap {
            mappings: self.resources.get(resource),
        }
    }
}

/// 单个资源的字段映射, 未配置的字段原样返回
#[derive(Debug, Clone, Copy)]
pub struct ResourceFieldMap<'a> {
    mappings: Option<&'a HashMap<String, String>>,
}

impl FieldMapper for ResourceFieldMap<'_> {
    fn map_field(&self, field: &str) -> String {
        self.mappings
            .and_then(|m| m.get(field))
            .cloned()
            .unwrap_or_else(|| field.to_string())
    }
}

/// 客户端配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// 数据源地址, 例如 `https://api.example.com/v1`
    #[serde(default)]
    pub data_source: Option<String>,
    /// 默认认证信息, 单次请求可以覆盖
    #[serde(default)]
    pub credentials: Option<Credentials>,
    /// 请求超时（秒）
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub field_mappings: FieldMappings,
}

impl ClientConfig {
    /// 从JSON文件加载配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();

        if !path_ref.exists() {
            return Err(ConfigError::new(format!(
                "config file does not exist: {}",
                path_ref.display()
            )));
        }

        let content = fs::read_to_string(path_ref).map_err(|e| {
            ConfigError::new(format!("cannot read config file {}: {}", path_ref.display(), e))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            ConfigError::new(format!(
                "cannot parse JSON config file {}: {}",
                path_ref.display(),
                e
            ))
        })
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
