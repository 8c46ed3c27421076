//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了播出缓存服务的配置结构和解析逻辑。

use crate::error::{CacheError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_VERSION: u32 = 1;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub config_version: Option<u32>,
    #[serde(default)]
    pub global: GlobalConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub lock: LockConfig,
    #[serde(default)]
    pub lookahead: LookaheadConfig,
}

/// 全局配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct GlobalConfig {
    /// 服务名称，用于链路追踪
    pub service_name: String,
    /// 日志过滤表达式，`RUST_LOG` 优先
    pub log_filter: String,
    /// 是否启用指标收集
    pub enable_metrics: bool,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            service_name: "playout-cache".to_string(),
            log_filter: "info".to_string(),
            enable_metrics: true,
        }
    }
}

/// 文档存储类型
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// 进程内存储，进程退出后数据丢失
    #[default]
    Memory,
    /// 每个集合一个JSON文件
    File,
}

/// 文档存储配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct StoreConfig {
    pub kind: StoreKind,
    /// 文件存储的数据目录
    pub data_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::Memory,
            data_dir: PathBuf::from("./data"),
        }
    }
}

/// 锁调度配置
///
/// 阈值只影响告警日志，不是超时
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct LockConfig {
    /// 等待时间超过该值（毫秒）时输出告警
    pub slow_wait_warn_ms: u64,
    /// 持锁时间超过该值（毫秒）时输出告警
    pub slow_hold_warn_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            slow_wait_warn_ms: 1000,
            slow_hold_warn_ms: 3000,
        }
    }
}

/// 预读配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct LookaheadConfig {
    /// 未指定数量时返回的后续部分数量
    pub default_limit: usize,
}

impl Default for LookaheadConfig {
    fn default() -> Self {
        Self { default_limit: 5 }
    }
}

impl Config {
    /// 从TOML字符串解析配置并验证
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| CacheError::ConfigError(format!("Failed to parse config: {}", e)))?;
        config.validate().map_err(CacheError::ConfigError)?;
        Ok(config)
    }

    /// 从文件加载配置
    ///
    /// # 参数
    ///
    /// * `path` - TOML配置文件路径
    ///
    /// # 返回值
    ///
    /// 文件无法读取、解析失败或验证失败时返回 `ConfigError`
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CacheError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// 验证配置
    ///
    /// 检查配置的有效性，确保所有值都在合理范围内
    pub fn validate(&self) -> std::result::Result<(), String> {
        if let Some(version) = &self.config_version {
            if *version > CONFIG_VERSION {
                return Err(format!(
                    "Configuration version {} is not supported. Current version is {}.",
                    version, CONFIG_VERSION
                ));
            }
        }

        if self.global.service_name.is_empty() {
            return Err("Global service_name cannot be empty".to_string());
        }

        if self.global.service_name.len() > 64 {
            return Err(format!(
                "Service name '{}' exceeds maximum length of 64 characters",
                self.global.service_name
            ));
        }

        if self.store.kind == StoreKind::File && self.store.data_dir.as_os_str().is_empty() {
            return Err("Store data_dir cannot be empty for the file store".to_string());
        }

        if self.lock.slow_wait_warn_ms == 0 {
            return Err("Lock slow_wait_warn_ms cannot be zero".to_string());
        }

        if self.lock.slow_hold_warn_ms == 0 {
            return Err("Lock slow_hold_warn_ms cannot be zero".to_string());
        }

        if self.lock.slow_hold_warn_ms > 3_600_000 {
            return Err("Lock slow_hold_warn_ms cannot exceed 1 hour".to_string());
        }

        if self.lookahead.default_limit == 0 || self.lookahead.default_limit > 1000 {
            return Err("Lookahead default_limit must be between 1 and 1000".to_string());
        }

        Ok(())
    }
}
