//! DirectX 12 图形 API 实现模块
//!
//! 本模块包含了所有 DirectX 12 相关的代码，包括：
//! - Device: DX12 设备与 Fence 等基础设施
//! - Command: DX12 命令分配器的原生包装
//! - Descriptor: DX12 描述符堆管理

pub mod command;
pub mod descriptor;
pub mod device;

// 重新导出常用类型
pub use command::Dx12CommandAllocator;
pub use descriptor::{Dx12DescriptorHeap, Dx12DescriptorManager};
pub use device::{Dx12Device, Dx12Fence};
