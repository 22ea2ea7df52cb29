//! DirectX 12 描述符堆实现
//!
//! 提供 DX12 特定的描述符堆管理功能：创建 `ID3D12DescriptorHeap`
//! 并把槽位分配交给与 API 无关的 `SlotAllocator`。

use tracing::info;
use windows::Win32::Graphics::Direct3D12::*;

use crate::core::config::DescriptorHeapConfig;
use crate::core::error::{ForgeRenderError, GraphicsError, Result};
use crate::renderer::descriptor::{
    CpuDescriptorHandle, DescriptorHeapDescriptor, DescriptorHeapStats, DescriptorType,
    GpuDescriptorHandle, SlotAllocator, INVALID_INDEX,
};

/// DX12 描述符堆
///
/// 封装 `ID3D12DescriptorHeap` 并内嵌一个槽位分配器，
/// 对外提供"分配索引 → 句柄"的类型安全访问接口。
pub struct Dx12DescriptorHeap {
    /// 底层 DX12 描述符堆
    heap: ID3D12DescriptorHeap,
    /// 槽位分配器
    allocator: SlotAllocator,
    /// 是否着色器可见
    shader_visible: bool,
}

// DX12 堆对象是线程安全的；分配器的可变访问由所有者保证互斥
unsafe impl Send for Dx12DescriptorHeap {}
unsafe impl Sync for Dx12DescriptorHeap {}

impl Dx12DescriptorHeap {
    /// 创建新的 DX12 描述符堆
    ///
    /// 创建原生堆，查询句柄基址和增量大小，并初始化槽位分配器。
    pub fn new(device: &ID3D12Device, desc: &DescriptorHeapDescriptor) -> Result<Self> {
        unsafe {
            let heap_type = match desc.descriptor_type {
                DescriptorType::RenderTargetView => D3D12_DESCRIPTOR_HEAP_TYPE_RTV,
                DescriptorType::DepthStencilView => D3D12_DESCRIPTOR_HEAP_TYPE_DSV,
                DescriptorType::ConstantBufferView
                | DescriptorType::ShaderResourceView
                | DescriptorType::UnorderedAccessView => D3D12_DESCRIPTOR_HEAP_TYPE_CBV_SRV_UAV,
                DescriptorType::Sampler => D3D12_DESCRIPTOR_HEAP_TYPE_SAMPLER,
            };

            let flags = if desc.shader_visible {
                D3D12_DESCRIPTOR_HEAP_FLAG_SHADER_VISIBLE
            } else {
                D3D12_DESCRIPTOR_HEAP_FLAG_NONE
            };

            let heap_desc = D3D12_DESCRIPTOR_HEAP_DESC {
                Type: heap_type,
                NumDescriptors: desc.num_descriptors,
                Flags: flags,
                NodeMask: 0,
            };

            let heap: ID3D12DescriptorHeap =
                device.CreateDescriptorHeap(&heap_desc).map_err(|e| {
                    ForgeRenderError::Graphics(GraphicsError::ResourceCreation(format!(
                        "Failed to create {} descriptor heap: {:?}",
                        desc.descriptor_type.name(),
                        e
                    )))
                })?;

            // 设置调试名称
            if let Some(name) = &desc.name {
                let wide_name: Vec<u16> = name.encode_utf16().chain(Some(0)).collect();
                let _ = heap.SetName(windows::core::PCWSTR(wide_name.as_ptr()));
            }

            let increment_size = device.GetDescriptorHandleIncrementSize(heap_type);
            let cpu_start = heap.GetCPUDescriptorHandleForHeapStart().ptr;
            let gpu_start = if desc.shader_visible {
                Some(heap.GetGPUDescriptorHandleForHeapStart().ptr)
            } else {
                None
            };

            let mut allocator = SlotAllocator::new(desc.descriptor_type);
            if !allocator.initialize(desc.num_descriptors, cpu_start, gpu_start, increment_size) {
                return Err(ForgeRenderError::Graphics(GraphicsError::ResourceCreation(
                    format!(
                        "Failed to initialize {} slot allocator",
                        desc.descriptor_type.name()
                    ),
                )));
            }

            info!(
                heap = desc.descriptor_type.name(),
                num_descriptors = desc.num_descriptors,
                shader_visible = desc.shader_visible,
                "Descriptor heap created"
            );

            Ok(Self {
                heap,
                allocator,
                shader_visible: desc.shader_visible,
            })
        }
    }

    /// 分配一个描述符槽位
    ///
    /// 堆满时返回 [`INVALID_INDEX`]。
    pub fn allocate(&mut self) -> u32 {
        self.allocator.allocate()
    }

    /// 释放指定槽位
    pub fn free(&mut self, index: u32) -> bool {
        self.allocator.free(index)
    }

    /// 获取底层 DX12 描述符堆
    pub fn heap(&self) -> &ID3D12DescriptorHeap {
        &self.heap
    }

    /// 获取描述符类型
    pub fn descriptor_type(&self) -> DescriptorType {
        self.allocator.descriptor_type()
    }

    /// 获取描述符增量大小
    pub fn increment_size(&self) -> u32 {
        self.allocator.increment_size()
    }

    /// 是否着色器可见
    pub fn is_shader_visible(&self) -> bool {
        self.shader_visible
    }

    /// 获取指定索引的 CPU 句柄
    pub fn cpu_handle(&self, index: u32) -> CpuDescriptorHandle {
        self.allocator.get_handle(index)
    }

    /// 获取指定索引的 GPU 句柄
    pub fn gpu_handle(&self, index: u32) -> GpuDescriptorHandle {
        self.allocator.get_gpu_handle(index)
    }

    /// 获取槽位分配器
    pub fn allocator(&self) -> &SlotAllocator {
        &self.allocator
    }

    /// 获取使用统计
    pub fn stats(&self) -> DescriptorHeapStats {
        self.allocator.stats()
    }

    /// 转换为 DX12 CPU 描述符句柄
    pub fn to_dx12_cpu_handle(&self, handle: CpuDescriptorHandle) -> D3D12_CPU_DESCRIPTOR_HANDLE {
        D3D12_CPU_DESCRIPTOR_HANDLE { ptr: handle.ptr }
    }

    /// 转换为 DX12 GPU 描述符句柄
    pub fn to_dx12_gpu_handle(&self, handle: GpuDescriptorHandle) -> D3D12_GPU_DESCRIPTOR_HANDLE {
        D3D12_GPU_DESCRIPTOR_HANDLE { ptr: handle.ptr }
    }
}

/// DX12 描述符管理器
///
/// 按类型持有引擎用到的四个描述符堆，从配置一次性创建。
pub struct Dx12DescriptorManager {
    /// RTV 堆
    rtv_heap: Dx12DescriptorHeap,
    /// DSV 堆
    dsv_heap: Dx12DescriptorHeap,
    /// SRV/CBV/UAV 堆
    srv_cbv_uav_heap: Dx12DescriptorHeap,
    /// 采样器堆
    sampler_heap: Dx12DescriptorHeap,
}

impl Dx12DescriptorManager {
    /// 从配置创建所有描述符堆
    pub fn new(device: &ID3D12Device, config: &DescriptorHeapConfig) -> Result<Self> {
        let rtv_heap = Dx12DescriptorHeap::new(
            device,
            &DescriptorHeapDescriptor::rtv(config.rtv_capacity).with_name("RtvHeap"),
        )?;
        let dsv_heap = Dx12DescriptorHeap::new(
            device,
            &DescriptorHeapDescriptor::dsv(config.dsv_capacity).with_name("DsvHeap"),
        )?;
        let srv_cbv_uav_heap = Dx12DescriptorHeap::new(
            device,
            &DescriptorHeapDescriptor::srv_cbv_uav(config.cbv_srv_uav_capacity)
                .with_name("SrvCbvUavHeap"),
        )?;
        let sampler_heap = Dx12DescriptorHeap::new(
            device,
            &DescriptorHeapDescriptor::sampler(config.sampler_capacity).with_name("SamplerHeap"),
        )?;

        Ok(Self {
            rtv_heap,
            dsv_heap,
            srv_cbv_uav_heap,
            sampler_heap,
        })
    }

    /// 获取 RTV 堆
    pub fn rtv_heap(&self) -> &Dx12DescriptorHeap {
        &self.rtv_heap
    }

    /// 获取 RTV 堆（可变）
    pub fn rtv_heap_mut(&mut self) -> &mut Dx12DescriptorHeap {
        &mut self.rtv_heap
    }

    /// 获取 DSV 堆
    pub fn dsv_heap(&self) -> &Dx12DescriptorHeap {
        &self.dsv_heap
    }

    /// 获取 DSV 堆（可变）
    pub fn dsv_heap_mut(&mut self) -> &mut Dx12DescriptorHeap {
        &mut self.dsv_heap
    }

    /// 获取 SRV/CBV/UAV 堆
    pub fn srv_cbv_uav_heap(&self) -> &Dx12DescriptorHeap {
        &self.srv_cbv_uav_heap
    }

    /// 获取 SRV/CBV/UAV 堆（可变）
    pub fn srv_cbv_uav_heap_mut(&mut self) -> &mut Dx12DescriptorHeap {
        &mut self.srv_cbv_uav_heap
    }

    /// 获取采样器堆
    pub fn sampler_heap(&self) -> &Dx12DescriptorHeap {
        &self.sampler_heap
    }

    /// 获取采样器堆（可变）
    pub fn sampler_heap_mut(&mut self) -> &mut Dx12DescriptorHeap {
        &mut self.sampler_heap
    }

    /// 获取按类型对应的堆
    pub fn heap_for(&self, descriptor_type: DescriptorType) -> &Dx12DescriptorHeap {
        match descriptor_type {
            DescriptorType::RenderTargetView => &self.rtv_heap,
            DescriptorType::DepthStencilView => &self.dsv_heap,
            DescriptorType::ConstantBufferView
            | DescriptorType::ShaderResourceView
            | DescriptorType::UnorderedAccessView => &self.srv_cbv_uav_heap,
            DescriptorType::Sampler => &self.sampler_heap,
        }
    }

    /// 获取着色器可见的堆数组（用于 SetDescriptorHeaps）
    pub fn shader_visible_heaps(&self) -> Vec<Option<ID3D12DescriptorHeap>> {
        let mut heaps = Vec::new();

        if self.srv_cbv_uav_heap.is_shader_visible() {
            heaps.push(Some(self.srv_cbv_uav_heap.heap().clone()));
        }
        if self.sampler_heap.is_shader_visible() {
            heaps.push(Some(self.sampler_heap.heap().clone()));
        }

        heaps
    }
}
