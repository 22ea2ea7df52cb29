//! DirectX 12 设备与同步对象
//!
//! 封装 D3D12 设备的创建，以及基于 OS 事件的 Fence 实现。
//! 在 Debug 模式下会启用调试层以便于开发时的错误检查。

use std::time::Duration;
use tracing::{debug, error, warn};
use windows::Win32::Foundation::{CloseHandle, HANDLE, WAIT_OBJECT_0};
use windows::Win32::Graphics::Direct3D::D3D_FEATURE_LEVEL_11_0;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::System::Threading::{CreateEventA, WaitForSingleObject};

use crate::core::error::{ForgeRenderError, GraphicsError, Result};
use crate::renderer::command::{CommandAllocatorDevice, CommandListKind};
use crate::renderer::sync::{Fence, FenceValue};
use super::command::{list_kind_to_d3d12, Dx12CommandAllocator};

/// DX12 设备
///
/// 封装 `ID3D12Device`，作为命令分配器、Fence 和描述符堆的工厂。
pub struct Dx12Device {
    /// D3D12 设备
    device: ID3D12Device,
}

// DirectX 12 的设备对象是线程安全的
unsafe impl Send for Dx12Device {}
unsafe impl Sync for Dx12Device {}

impl Dx12Device {
    /// 在默认适配器上创建新的 DX12 设备
    pub fn new() -> Result<Self> {
        unsafe {
            // 启用调试层（仅 Debug 模式）
            #[cfg(debug_assertions)]
            {
                let mut debug_interface: Option<ID3D12Debug> = None;
                if D3D12GetDebugInterface(&mut debug_interface).is_ok() {
                    if let Some(debug_interface) = debug_interface {
                        debug_interface.EnableDebugLayer();
                        debug!("DX12 Debug Layer enabled");
                    }
                } else {
                    warn!("Failed to enable DX12 Debug Layer");
                }
            }

            let mut device: Option<ID3D12Device> = None;
            D3D12CreateDevice(None, D3D_FEATURE_LEVEL_11_0, &mut device).map_err(|e| {
                ForgeRenderError::Graphics(GraphicsError::DeviceCreation(format!(
                    "Failed to create D3D12 device: {:?}",
                    e
                )))
            })?;
            let device = device.ok_or_else(|| {
                ForgeRenderError::Graphics(GraphicsError::DeviceCreation(
                    "D3D12CreateDevice returned no device".to_string(),
                ))
            })?;

            debug!("D3D12 Device created successfully");
            Ok(Self { device })
        }
    }

    /// 包装一个已存在的 D3D12 设备
    pub fn from_raw(device: ID3D12Device) -> Self {
        Self { device }
    }

    /// 获取底层 D3D12 设备
    pub fn raw(&self) -> &ID3D12Device {
        &self.device
    }

    /// 创建一个 Fence（初始完成值为 0）
    pub fn create_fence(&self) -> Result<Dx12Fence> {
        Dx12Fence::new(&self.device)
    }
}

impl CommandAllocatorDevice for Dx12Device {
    type Allocator = Dx12CommandAllocator;

    fn create_command_allocator(&self, kind: CommandListKind) -> Result<Dx12CommandAllocator> {
        unsafe {
            let allocator: ID3D12CommandAllocator = self
                .device
                .CreateCommandAllocator(list_kind_to_d3d12(kind))
                .map_err(|e| {
                    ForgeRenderError::Graphics(GraphicsError::ResourceCreation(format!(
                        "Failed to create {} command allocator: {:?}",
                        kind.name(),
                        e
                    )))
                })?;
            Ok(Dx12CommandAllocator::new(allocator))
        }
    }
}

/// DX12 Fence
///
/// 封装 `ID3D12Fence` 和一个 OS 事件句柄，
/// 把 `Fence` trait 的有界等待实现为真正的 OS 级等待
/// 而不是默认的轮询。
///
/// 内部事件句柄一次只支持一个等待者；本子系统的
/// 单写者模型（每个池由一个线程驱动）满足这个前提。
pub struct Dx12Fence {
    /// 底层 D3D12 Fence
    fence: ID3D12Fence,
    /// 等待事件句柄
    event: HANDLE,
}

// Fence 对象本身线程安全；事件句柄的单等待者前提见类型文档
unsafe impl Send for Dx12Fence {}
unsafe impl Sync for Dx12Fence {}

impl Dx12Fence {
    /// 创建新的 DX12 Fence
    pub fn new(device: &ID3D12Device) -> Result<Self> {
        unsafe {
            let fence: ID3D12Fence =
                device.CreateFence(0, D3D12_FENCE_FLAG_NONE).map_err(|e| {
                    ForgeRenderError::Graphics(GraphicsError::ResourceCreation(format!(
                        "Failed to create fence: {:?}",
                        e
                    )))
                })?;

            let event = CreateEventA(None, false, false, None).map_err(|e| {
                ForgeRenderError::Graphics(GraphicsError::ResourceCreation(format!(
                    "Failed to create fence event: {:?}",
                    e
                )))
            })?;

            Ok(Self { fence, event })
        }
    }

    /// 获取底层 D3D12 Fence
    pub fn raw(&self) -> &ID3D12Fence {
        &self.fence
    }

    /// 在命令队列上 Signal 指定的 Fence 值
    ///
    /// GPU 执行到该点后完成值推进到 `value`。
    pub fn signal(&self, queue: &ID3D12CommandQueue, value: FenceValue) -> Result<()> {
        unsafe {
            queue.Signal(&self.fence, value.value()).map_err(|e| {
                ForgeRenderError::Graphics(GraphicsError::CommandExecution(format!(
                    "Failed to signal fence to {}: {:?}",
                    value.value(),
                    e
                )))
            })
        }
    }
}

impl Fence for Dx12Fence {
    fn completed_value(&self) -> u64 {
        unsafe { self.fence.GetCompletedValue() }
    }

    fn wait_until(&self, value: u64, timeout: Duration) -> bool {
        unsafe {
            if self.fence.GetCompletedValue() >= value {
                return true;
            }

            if let Err(e) = self.fence.SetEventOnCompletion(value, self.event) {
                error!(value, error = ?e, "SetEventOnCompletion failed");
                return false;
            }

            let millis = timeout.as_millis().min(u64::from(u32::MAX) as u128) as u32;
            WaitForSingleObject(self.event, millis) == WAIT_OBJECT_0
        }
    }
}

impl Drop for Dx12Fence {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.event);
        }
    }
}
