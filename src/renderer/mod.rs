//! 渲染器模块
//!
//! 本模块提供与具体图形 API 无关的渲染核心组件。
//! 底层实现在 `gfx` 模块中，按 API 分类组织；
//! 这里的类型通过 trait（`Fence`、`NativeCommandAllocator` 等）
//! 与后端解耦，可以在纯 CPU 环境下测试。
//!
//! # 架构设计
//!
//! - `sync`：Fence 值与 GPU 同步抽象
//! - `descriptor`：描述符堆的槽位分配器
//! - `command`：命令分配器与 Fence 门控的分配器池

pub mod command;
pub mod descriptor;
pub mod sync;

// 重新导出常用类型，方便使用
pub use command::{AllocatorId, CommandAllocator, CommandAllocatorPool, CommandListKind};
pub use descriptor::{SlotAllocator, INVALID_INDEX};
pub use sync::{Fence, FenceValue, HostFence};
