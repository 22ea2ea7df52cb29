//! ForgeRender - Direct3D 12 渲染核心
//!
//! ForgeRender 提供渲染引擎底层最核心的两个资源管理原语：
//! 描述符堆槽位分配器和带 Fence 门控回收的命令分配器池。
//! 缓冲、纹理、管线对象和场景渲染等上层模块都建立在这两个原语之上。
//!
//! # 模块结构
//!
//! - `core`: 核心功能模块（日志、配置、错误处理）
//! - `renderer`: 平台无关的生命周期管理（槽位分配、命令分配器池、Fence 同步）
//! - `gfx`: 图形后端层（DirectX 12 原生封装，仅 Windows）
//!
//! # 使用示例
//!
//! ```no_run
//! use forge_render::renderer::descriptor::{DescriptorType, SlotAllocator};
//!
//! // 创建一个 64 槽位的 RTV 描述符分配器
//! let mut allocator = SlotAllocator::new(DescriptorType::RenderTargetView);
//! allocator.initialize(64, 0x1000, None, 32);
//!
//! // 分配与释放槽位
//! let index = allocator.allocate();
//! allocator.free(index);
//! ```

pub mod core;
pub mod gfx;
pub mod renderer;
