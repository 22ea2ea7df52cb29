//! 配置管理模块
//!
//! 提供渲染核心配置的加载、解析和管理功能。
//! 支持从 TOML 配置文件加载，也支持通过代码构建。
//!
//! # 配置文件格式 (config.toml)
//!
//! ```toml
//! [command_pool]
//! list_kind = "direct"     # direct, compute, copy, bundle
//! initial_counts = 3
//! max_counts = 8
//! block_max_time_secs = 5.0
//!
//! [descriptor_heaps]
//! rtv_capacity = 64
//! dsv_capacity = 32
//! cbv_srv_uav_capacity = 1024
//! sampler_capacity = 16
//!
//! [logging]
//! level = "info"           # trace, debug, info, warn, error
//! file_output = false
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use super::error::{ConfigError, Result};

/// 渲染核心配置
///
/// 包含了命令分配器池和描述符堆所需的所有配置项。
/// 可以从配置文件加载，也可以通过代码构建。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// 命令分配器池配置
    pub command_pool: CommandPoolConfig,

    /// 描述符堆配置
    pub descriptor_heaps: DescriptorHeapConfig,

    /// 日志配置
    pub logging: LoggingConfig,
}

/// 命令分配器池配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandPoolConfig {
    /// 命令列表类型
    #[serde(default = "default_list_kind")]
    pub list_kind: CommandListKindConfig,

    /// 初始分配器数量（急切创建）
    #[serde(default = "default_initial_counts")]
    pub initial_counts: u32,

    /// 分配器数量上限
    #[serde(default = "default_max_counts")]
    pub max_counts: u32,

    /// 获取空闲分配器时的最大阻塞时间（秒）
    #[serde(default = "default_block_max_time")]
    pub block_max_time_secs: f64,
}

/// 命令列表类型（配置层）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandListKindConfig {
    /// 直接命令列表（图形 + 计算 + 拷贝）
    Direct,
    /// 计算专用
    Compute,
    /// 拷贝专用
    Copy,
    /// 可复用命令包
    Bundle,
}

/// 描述符堆配置
///
/// 每种堆类型的容量。容量在初始化时固定，
/// 调整容量意味着销毁并重建整个堆。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptorHeapConfig {
    /// 渲染目标视图（RTV）堆容量
    #[serde(default = "default_rtv_capacity")]
    pub rtv_capacity: u32,

    /// 深度模板视图（DSV）堆容量
    #[serde(default = "default_dsv_capacity")]
    pub dsv_capacity: u32,

    /// CBV/SRV/UAV 堆容量（着色器可见）
    #[serde(default = "default_cbv_srv_uav_capacity")]
    pub cbv_srv_uav_capacity: u32,

    /// 采样器堆容量（着色器可见）
    #[serde(default = "default_sampler_capacity")]
    pub sampler_capacity: u32,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// 是否输出到文件
    #[serde(default = "default_file_output")]
    pub file_output: bool,

    /// 日志文件路径
    #[serde(default = "default_log_file")]
    pub log_file: String,
}

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

// 默认值函数
fn default_list_kind() -> CommandListKindConfig { CommandListKindConfig::Direct }
fn default_initial_counts() -> u32 { 3 }
fn default_max_counts() -> u32 { 8 }
fn default_block_max_time() -> f64 { 5.0 }
fn default_rtv_capacity() -> u32 { 64 }
fn default_dsv_capacity() -> u32 { 32 }
fn default_cbv_srv_uav_capacity() -> u32 { 1024 }
fn default_sampler_capacity() -> u32 { 16 }
fn default_log_level() -> LogLevel { LogLevel::Info }
fn default_file_output() -> bool { false }
fn default_log_file() -> String { "forgerender.log".to_string() }

impl Default for Config {
    fn default() -> Self {
        Self {
            command_pool: CommandPoolConfig::default(),
            descriptor_heaps: DescriptorHeapConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for CommandPoolConfig {
    fn default() -> Self {
        Self {
            list_kind: default_list_kind(),
            initial_counts: default_initial_counts(),
            max_counts: default_max_counts(),
            block_max_time_secs: default_block_max_time(),
        }
    }
}

impl Default for DescriptorHeapConfig {
    fn default() -> Self {
        Self {
            rtv_capacity: default_rtv_capacity(),
            dsv_capacity: default_dsv_capacity(),
            cbv_srv_uav_capacity: default_cbv_srv_uav_capacity(),
            sampler_capacity: default_sampler_capacity(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_output: default_file_output(),
            log_file: default_log_file(),
        }
    }
}

impl CommandPoolConfig {
    /// 获取阻塞时限
    pub fn block_max_time(&self) -> Duration {
        Duration::from_secs_f64(self.block_max_time_secs)
    }
}

impl Config {
    /// 从配置文件加载
    ///
    /// # 参数
    ///
    /// * `path` - 配置文件路径
    ///
    /// # 返回值
    ///
    /// 成功返回 `Config` 实例，失败返回错误
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let contents = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path_str.clone()))?;

        toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()).into())
    }

    /// 从配置文件加载，如果文件不存在则使用默认配置
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::from_file(path).unwrap_or_default()
    }

    /// 保存配置到文件
    #[allow(dead_code)]
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        std::fs::write(path, contents)?;
        Ok(())
    }

    /// 验证配置的有效性
    ///
    /// # 返回值
    ///
    /// 配置有效返回 `Ok(())`，否则返回错误
    pub fn validate(&self) -> Result<()> {
        // 验证池容量
        if self.command_pool.max_counts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "command_pool.max_counts".to_string(),
                reason: "Pool must allow at least one allocator".to_string(),
            }.into());
        }

        if self.command_pool.initial_counts > self.command_pool.max_counts {
            return Err(ConfigError::InvalidValue {
                field: "command_pool.initial_counts".to_string(),
                reason: "Initial count must not exceed max counts".to_string(),
            }.into());
        }

        // 验证阻塞时限
        if self.command_pool.block_max_time_secs <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "command_pool.block_max_time_secs".to_string(),
                reason: "Block timeout must be positive".to_string(),
            }.into());
        }

        // 验证堆容量
        let heaps = &self.descriptor_heaps;
        if heaps.rtv_capacity == 0
            || heaps.dsv_capacity == 0
            || heaps.cbv_srv_uav_capacity == 0
            || heaps.sampler_capacity == 0
        {
            return Err(ConfigError::InvalidValue {
                field: "descriptor_heaps".to_string(),
                reason: "Heap capacities must be greater than 0".to_string(),
            }.into());
        }

        Ok(())
    }
}
