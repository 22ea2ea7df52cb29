//! 图形后端模块
//!
//! 本模块封装了图形 API 的底层实现。当前提供 DirectX 12 后端：
//! 设备、命令分配器、Fence 和描述符堆的原生包装，
//! 对接 `renderer` 模块中与 API 无关的池化与分配逻辑。

#[cfg(target_os = "windows")]
pub mod dx12;

#[cfg(target_os = "windows")]
pub use dx12::{Dx12Device, Dx12Fence};
