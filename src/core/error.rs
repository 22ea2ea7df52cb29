//! 错误处理模块
//!
//! 定义了渲染核心中使用的统一错误类型。
//!
//! # 设计原则
//!
//! - 为每种错误类型提供清晰的上下文信息
//! - 支持错误链（error source）
//! - 易于模式匹配和错误处理
//! - 热路径操作（分配、释放、查询）不走错误类型，
//!   而是通过布尔值/哨兵返回并记录日志，错误类型只用于构建期失败
//!
//! # 错误分类
//!
//! - **前置条件违反**：如重置忙碌的分配器、重复释放槽位，记录日志并返回 false
//! - **资源耗尽**：堆已满、池达到上限，作为背压返回 Invalid/None
//! - **超时**：`force_wait` 超过配置的阻塞时限，调用方视为严重错误
//! - **原生 API 失败**：设备级创建失败，携带原生错误码，从不自动重试

use std::fmt;

/// 渲染核心统一的 Result 类型
///
/// 所有可能返回错误的函数都应该使用这个类型。
pub type Result<T> = std::result::Result<T, ForgeRenderError>;

/// ForgeRender 的错误类型
///
/// 包含了渲染核心运行过程中可能遇到的各种错误情况。
#[derive(Debug)]
pub enum ForgeRenderError {
    /// 配置错误
    Config(ConfigError),

    /// 图形 API 错误
    Graphics(GraphicsError),

    /// IO 错误
    Io(std::io::Error),

    /// 初始化错误
    Initialization(String),

    /// 运行时错误
    Runtime(String),
}

/// 配置相关的错误
#[derive(Debug)]
pub enum ConfigError {
    /// 配置文件未找到
    FileNotFound(String),

    /// 配置文件解析失败
    ParseError(String),

    /// 配置值无效
    InvalidValue { field: String, reason: String },
}

/// 图形 API 相关的错误
#[derive(Debug)]
pub enum GraphicsError {
    /// 设备创建失败
    DeviceCreation(String),

    /// 资源创建失败（分配器、描述符堆等）
    ResourceCreation(String),

    /// 渲染命令执行失败
    CommandExecution(String),

    /// 资源耗尽（堆已满、池达到上限且无空闲）
    ResourceExhausted(String),

    /// GPU 等待超时（Fence 在时限内未到达目标值）
    Timeout(String),
}

impl fmt::Display for ForgeRenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForgeRenderError::Config(e) => write!(f, "Configuration error: {}", e),
            ForgeRenderError::Graphics(e) => write!(f, "Graphics error: {}", e),
            ForgeRenderError::Io(e) => write!(f, "IO error: {}", e),
            ForgeRenderError::Initialization(msg) => write!(f, "Initialization error: {}", msg),
            ForgeRenderError::Runtime(msg) => write!(f, "Runtime error: {}", msg),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {}", path),
            ConfigError::ParseError(msg) => write!(f, "Failed to parse config: {}", msg),
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "Invalid value for '{}': {}", field, reason)
            }
        }
    }
}

impl fmt::Display for GraphicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphicsError::DeviceCreation(msg) => write!(f, "Device creation failed: {}", msg),
            GraphicsError::ResourceCreation(msg) => write!(f, "Resource creation failed: {}", msg),
            GraphicsError::CommandExecution(msg) => write!(f, "Command execution failed: {}", msg),
            GraphicsError::ResourceExhausted(msg) => write!(f, "Resource exhausted: {}", msg),
            GraphicsError::Timeout(msg) => write!(f, "GPU wait timed out: {}", msg),
        }
    }
}

impl std::error::Error for ForgeRenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ForgeRenderError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for ConfigError {}
impl std::error::Error for GraphicsError {}

// 实现 From trait 以便于错误转换
impl From<std::io::Error> for ForgeRenderError {
    fn from(err: std::io::Error) -> Self {
        ForgeRenderError::Io(err)
    }
}

impl From<ConfigError> for ForgeRenderError {
    fn from(err: ConfigError) -> Self {
        ForgeRenderError::Config(err)
    }
}

impl From<GraphicsError> for ForgeRenderError {
    fn from(err: GraphicsError) -> Self {
        ForgeRenderError::Graphics(err)
    }
}
