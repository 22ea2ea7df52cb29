//! DirectX 12 命令分配器包装
//!
//! 把 `ID3D12CommandAllocator` 接入与 API 无关的分配器池：
//! 池只通过 `NativeCommandAllocator` trait 触碰这里。

use windows::Win32::Graphics::Direct3D12::*;

use crate::core::error::{ForgeRenderError, GraphicsError, Result};
use crate::renderer::command::{CommandListKind, NativeCommandAllocator};

/// 命令列表类型到 D3D12 枚举的转换
pub(crate) fn list_kind_to_d3d12(kind: CommandListKind) -> D3D12_COMMAND_LIST_TYPE {
    match kind {
        CommandListKind::Direct => D3D12_COMMAND_LIST_TYPE_DIRECT,
        CommandListKind::Bundle => D3D12_COMMAND_LIST_TYPE_BUNDLE,
        CommandListKind::Compute => D3D12_COMMAND_LIST_TYPE_COMPUTE,
        CommandListKind::Copy => D3D12_COMMAND_LIST_TYPE_COPY,
    }
}

/// DX12 命令分配器
///
/// 独占持有一个 `ID3D12CommandAllocator`。
/// Reset 的安全前提（GPU 已消费完其中的命令）由池层的
/// Fence 门控保证，这里只做原生调用。
pub struct Dx12CommandAllocator {
    /// 底层 D3D12 命令分配器
    allocator: ID3D12CommandAllocator,
}

// DirectX 12 的命令分配器对象可以在线程间转移，
// 但同一时刻只能有一个命令列表在其上录制（由池的单写者模型保证）
unsafe impl Send for Dx12CommandAllocator {}

impl Dx12CommandAllocator {
    /// 包装一个原生命令分配器
    pub fn new(allocator: ID3D12CommandAllocator) -> Self {
        Self { allocator }
    }

    /// 获取底层 D3D12 命令分配器
    ///
    /// 用于创建/重置命令列表（`CreateCommandList`、`ID3D12GraphicsCommandList::Reset`）。
    pub fn raw(&self) -> &ID3D12CommandAllocator {
        &self.allocator
    }
}

impl NativeCommandAllocator for Dx12CommandAllocator {
    fn reset(&mut self) -> Result<()> {
        unsafe {
            self.allocator.Reset().map_err(|e| {
                ForgeRenderError::Graphics(GraphicsError::CommandExecution(format!(
                    "ID3D12CommandAllocator::Reset failed: {:?}",
                    e
                )))
            })
        }
    }
}
