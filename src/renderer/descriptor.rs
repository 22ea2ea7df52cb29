//! 描述符管理模块
//!
//! 提供描述符堆的槽位分配和句柄计算，用于管理 GPU 资源视图。
//!
//! # 设计原则
//!
//! - **统一抽象**：RTV/DSV/CBV-SRV-UAV/Sampler 四种堆共用同一个槽位分配器，
//!   分配逻辑与槽位里放什么视图无关
//! - **摊还 O(1)**：环形扫描游标记录上次分配的前沿，
//!   典型的分配/释放交替负载下单次分配接近常数时间
//! - **安全复用**：释放时游标回退到被释放的槽位，空洞被下一次分配迅速填补
//! - **无异常**：所有操作处于每帧热路径，失败通过布尔值/哨兵返回并记录日志，
//!   从不展开栈
//!
//! # DirectX 12 描述符类型
//!
//! - **RTV** (Render Target View)：渲染目标视图，用于渲染输出
//! - **DSV** (Depth Stencil View)：深度模板视图，用于深度测试
//! - **CBV** (Constant Buffer View)：常量缓冲视图，用于着色器常量
//! - **SRV** (Shader Resource View)：着色资源视图，用于着色器读取纹理/缓冲
//! - **UAV** (Unordered Access View)：无序访问视图，用于计算着色器读写
//! - **Sampler**：采样器

use tracing::{error, warn};

/// 无效槽位索引哨兵
///
/// 与所有合法索引（0..capacity）数值上不相交。
pub const INVALID_INDEX: u32 = u32::MAX;

/// 描述符类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorType {
    /// 渲染目标视图 (RTV)
    RenderTargetView,
    /// 深度模板视图 (DSV)
    DepthStencilView,
    /// 常量缓冲视图 (CBV)
    ConstantBufferView,
    /// 着色资源视图 (SRV)
    ShaderResourceView,
    /// 无序访问视图 (UAV)
    UnorderedAccessView,
    /// 采样器
    Sampler,
}

impl DescriptorType {
    /// 描述符类型是否需要着色器可见
    pub fn is_shader_visible(&self) -> bool {
        matches!(
            self,
            DescriptorType::ConstantBufferView
                | DescriptorType::ShaderResourceView
                | DescriptorType::UnorderedAccessView
                | DescriptorType::Sampler
        )
    }

    /// 获取描述符类型名称
    pub fn name(&self) -> &'static str {
        match self {
            DescriptorType::RenderTargetView => "RTV",
            DescriptorType::DepthStencilView => "DSV",
            DescriptorType::ConstantBufferView => "CBV",
            DescriptorType::ShaderResourceView => "SRV",
            DescriptorType::UnorderedAccessView => "UAV",
            DescriptorType::Sampler => "Sampler",
        }
    }
}

/// 描述符堆描述信息
#[derive(Debug, Clone)]
pub struct DescriptorHeapDescriptor {
    /// 描述符类型
    pub descriptor_type: DescriptorType,
    /// 描述符数量
    pub num_descriptors: u32,
    /// 是否着色器可见
    pub shader_visible: bool,
    /// 调试名称
    pub name: Option<String>,
}

impl DescriptorHeapDescriptor {
    /// 创建新的描述符堆描述符
    pub fn new(descriptor_type: DescriptorType, num_descriptors: u32) -> Self {
        Self {
            descriptor_type,
            num_descriptors,
            shader_visible: descriptor_type.is_shader_visible(),
            name: None,
        }
    }

    /// 设置调试名称
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// 设置着色器可见性
    pub fn with_shader_visible(mut self, visible: bool) -> Self {
        self.shader_visible = visible;
        self
    }

    /// 创建 RTV 堆描述符
    pub fn rtv(num_descriptors: u32) -> Self {
        Self::new(DescriptorType::RenderTargetView, num_descriptors)
            .with_name("RTV Heap")
    }

    /// 创建 DSV 堆描述符
    pub fn dsv(num_descriptors: u32) -> Self {
        Self::new(DescriptorType::DepthStencilView, num_descriptors)
            .with_name("DSV Heap")
    }

    /// 创建 SRV/CBV/UAV 堆描述符
    pub fn srv_cbv_uav(num_descriptors: u32) -> Self {
        Self::new(DescriptorType::ShaderResourceView, num_descriptors)
            .with_shader_visible(true)
            .with_name("SRV/CBV/UAV Heap")
    }

    /// 创建采样器堆描述符
    pub fn sampler(num_descriptors: u32) -> Self {
        Self::new(DescriptorType::Sampler, num_descriptors)
            .with_shader_visible(true)
            .with_name("Sampler Heap")
    }
}

/// 描述符句柄（CPU 可见）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuDescriptorHandle {
    /// 句柄指针值
    pub ptr: usize,
}

impl CpuDescriptorHandle {
    /// 创建新的 CPU 描述符句柄
    pub fn new(ptr: usize) -> Self {
        Self { ptr }
    }

    /// 零句柄（无效索引的返回值）
    pub fn zeroed() -> Self {
        Self { ptr: 0 }
    }

    /// 句柄是否为空
    pub fn is_null(&self) -> bool {
        self.ptr == 0
    }
}

/// 描述符句柄（GPU 可见）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuDescriptorHandle {
    /// 句柄指针值
    pub ptr: u64,
}

impl GpuDescriptorHandle {
    /// 创建新的 GPU 描述符句柄
    pub fn new(ptr: u64) -> Self {
        Self { ptr }
    }

    /// 零句柄（无效索引或非着色器可见堆的返回值）
    pub fn zeroed() -> Self {
        Self { ptr: 0 }
    }

    /// 句柄是否为空
    pub fn is_null(&self) -> bool {
        self.ptr == 0
    }
}

/// 槽位工作状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    /// 空闲，可被分配
    Free,
    /// 已被视图占用
    Working,
}

/// 描述符堆槽位分配器
///
/// 管理一个固定容量的槽位数组，向视图包装对象（RTV/DSV/SRV/Sampler）
/// 发放空闲索引并在视图销毁时回收。句柄按 `起始句柄 + 索引 × 步长` 计算。
///
/// 容量在 `initialize` 时固定；调整容量意味着销毁并重建整个堆。
/// 单个实例不做内部加锁，并发使用需要外部互斥。
pub struct SlotAllocator {
    /// 描述符类型（仅用于日志）
    descriptor_type: DescriptorType,
    /// 槽位工作状态，长度 = capacity
    states: Vec<SlotState>,
    /// 容量
    capacity: u32,
    /// 已分配数量
    allocated_count: u32,
    /// 下一次扫描的起始索引
    cursor: u32,
    /// CPU 句柄基址
    cpu_start: usize,
    /// GPU 句柄基址（仅着色器可见堆）
    gpu_start: Option<u64>,
    /// 每槽位句柄步长
    increment_size: u32,
    /// 是否已初始化
    initialized: bool,
}

impl SlotAllocator {
    /// 创建未初始化的分配器
    pub fn new(descriptor_type: DescriptorType) -> Self {
        Self {
            descriptor_type,
            states: Vec::new(),
            capacity: 0,
            allocated_count: 0,
            cursor: 0,
            cpu_start: 0,
            gpu_start: None,
            increment_size: 0,
            initialized: false,
        }
    }

    /// 初始化分配器
    ///
    /// # 参数
    ///
    /// * `capacity` - 槽位数量，必须大于 0
    /// * `cpu_start` - CPU 句柄基址，必须非空
    /// * `gpu_start` - GPU 句柄基址（仅着色器可见堆）
    /// * `increment_size` - 每槽位句柄步长，必须大于 0
    ///
    /// # 返回值
    ///
    /// 参数无效或已经初始化时返回 `false`。
    /// 重新初始化必须先调用 `destroy()`。
    pub fn initialize(
        &mut self,
        capacity: u32,
        cpu_start: usize,
        gpu_start: Option<u64>,
        increment_size: u32,
    ) -> bool {
        if self.initialized {
            error!(
                heap = self.descriptor_type.name(),
                "SlotAllocator already initialized, call destroy() first"
            );
            return false;
        }

        if capacity == 0 {
            error!(
                heap = self.descriptor_type.name(),
                "SlotAllocator capacity must be greater than 0"
            );
            return false;
        }

        if cpu_start == 0 || increment_size == 0 {
            error!(
                heap = self.descriptor_type.name(),
                "SlotAllocator requires a valid start handle and stride"
            );
            return false;
        }

        self.states = vec![SlotState::Free; capacity as usize];
        self.capacity = capacity;
        self.allocated_count = 0;
        self.cursor = 0;
        self.cpu_start = cpu_start;
        self.gpu_start = gpu_start;
        self.increment_size = increment_size;
        self.initialized = true;
        true
    }

    /// 分配一个空闲槽位
    ///
    /// 从游标开始环形扫描，返回找到的第一个空闲索引并标记为占用。
    /// 游标前进到该索引的下一位，长生命周期的分配因此聚集在低索引端，
    /// 游标附近被释放的空洞会被迅速复用。
    ///
    /// # 返回值
    ///
    /// 未初始化或堆已满时返回 [`INVALID_INDEX`]。
    pub fn allocate(&mut self) -> u32 {
        if !self.initialized {
            error!(
                heap = self.descriptor_type.name(),
                "Allocate called on uninitialized SlotAllocator"
            );
            return INVALID_INDEX;
        }

        if self.allocated_count >= self.capacity {
            warn!(
                heap = self.descriptor_type.name(),
                capacity = self.capacity,
                "Descriptor heap is full"
            );
            return INVALID_INDEX;
        }

        let capacity = self.capacity as usize;
        for step in 0..capacity {
            let index = (self.cursor as usize + step) % capacity;
            if self.states[index] == SlotState::Free {
                self.states[index] = SlotState::Working;
                self.allocated_count += 1;
                self.cursor = ((index + 1) % capacity) as u32;
                return index as u32;
            }
        }

        // 不变量 allocated_count == Working 槽位数保证扫描必中
        INVALID_INDEX
    }

    /// 释放一个槽位
    ///
    /// # 返回值
    ///
    /// 未初始化、索引越界或槽位已空闲（重复释放）时返回 `false`。
    pub fn free(&mut self, index: u32) -> bool {
        if !self.initialized {
            error!(
                heap = self.descriptor_type.name(),
                "Free called on uninitialized SlotAllocator"
            );
            return false;
        }

        if !self.is_valid_index(index) {
            error!(
                heap = self.descriptor_type.name(),
                index,
                capacity = self.capacity,
                "Free called with out-of-range index"
            );
            return false;
        }

        if self.states[index as usize] == SlotState::Free {
            error!(
                heap = self.descriptor_type.name(),
                index, "Double free of descriptor slot"
            );
            return false;
        }

        self.states[index as usize] = SlotState::Free;
        self.allocated_count -= 1;

        // 游标回退，让释放出的槽位尽快被下一次分配找到
        if index < self.cursor {
            self.cursor = index;
        }

        true
    }

    /// 重置所有槽位为 Free
    ///
    /// 不改变容量和句柄基址。未初始化时返回 `false`。
    pub fn reset(&mut self) -> bool {
        if !self.initialized {
            error!(
                heap = self.descriptor_type.name(),
                "Reset called on uninitialized SlotAllocator"
            );
            return false;
        }

        self.states.fill(SlotState::Free);
        self.allocated_count = 0;
        self.cursor = 0;
        true
    }

    /// 销毁分配器
    ///
    /// 幂等；从未初始化时调用也是安全的。
    pub fn destroy(&mut self) {
        self.states = Vec::new();
        self.capacity = 0;
        self.allocated_count = 0;
        self.cursor = 0;
        self.cpu_start = 0;
        self.gpu_start = None;
        self.increment_size = 0;
        self.initialized = false;
    }

    /// 索引是否合法
    pub fn is_valid_index(&self, index: u32) -> bool {
        index < self.capacity
    }

    /// 获取指定索引的 CPU 句柄
    ///
    /// 索引的纯函数：`基址 + 索引 × 步长`。
    /// 越界索引返回零句柄而不是未定义的内存访问。
    pub fn get_handle(&self, index: u32) -> CpuDescriptorHandle {
        if !self.initialized || !self.is_valid_index(index) {
            return CpuDescriptorHandle::zeroed();
        }
        CpuDescriptorHandle::new(self.cpu_start + (index * self.increment_size) as usize)
    }

    /// 获取指定索引的 GPU 句柄（仅着色器可见堆）
    ///
    /// 越界索引或非着色器可见堆返回零句柄。
    pub fn get_gpu_handle(&self, index: u32) -> GpuDescriptorHandle {
        if !self.initialized || !self.is_valid_index(index) {
            return GpuDescriptorHandle::zeroed();
        }
        match self.gpu_start {
            Some(start) => {
                GpuDescriptorHandle::new(start + (index * self.increment_size) as u64)
            }
            None => GpuDescriptorHandle::zeroed(),
        }
    }

    /// 是否已初始化
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// 获取描述符类型
    pub fn descriptor_type(&self) -> DescriptorType {
        self.descriptor_type
    }

    /// 获取容量
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// 获取已分配数量
    pub fn allocated_count(&self) -> u32 {
        self.allocated_count
    }

    /// 获取剩余槽位数量
    pub fn remaining(&self) -> u32 {
        self.capacity - self.allocated_count
    }

    /// 是否已满
    pub fn is_full(&self) -> bool {
        self.allocated_count >= self.capacity
    }

    /// 获取每槽位句柄步长
    pub fn increment_size(&self) -> u32 {
        self.increment_size
    }

    /// 获取统计信息
    pub fn stats(&self) -> DescriptorHeapStats {
        DescriptorHeapStats::new(self.descriptor_type, self.capacity, self.allocated_count)
    }
}

/// 描述符堆统计信息
#[derive(Debug, Clone)]
pub struct DescriptorHeapStats {
    /// 描述符类型
    pub descriptor_type: DescriptorType,
    /// 总容量
    pub capacity: u32,
    /// 已使用数量
    pub used: u32,
    /// 可用数量
    pub available: u32,
    /// 使用率 (0.0 - 1.0)
    pub usage_ratio: f32,
}

impl DescriptorHeapStats {
    /// 创建新的统计信息
    pub fn new(descriptor_type: DescriptorType, capacity: u32, used: u32) -> Self {
        let available = capacity.saturating_sub(used);
        let usage_ratio = if capacity > 0 {
            used as f32 / capacity as f32
        } else {
            0.0
        };

        Self {
            descriptor_type,
            capacity,
            used,
            available,
            usage_ratio,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_allocator(capacity: u32) -> SlotAllocator {
        let mut allocator = SlotAllocator::new(DescriptorType::RenderTargetView);
        assert!(allocator.initialize(capacity, 0x1000, None, 32));
        allocator
    }

    #[test]
    fn test_descriptor_type() {
        assert!(DescriptorType::ShaderResourceView.is_shader_visible());
        assert!(!DescriptorType::RenderTargetView.is_shader_visible());
        assert_eq!(DescriptorType::RenderTargetView.name(), "RTV");
    }

    #[test]
    fn test_descriptor_heap_descriptor() {
        let desc = DescriptorHeapDescriptor::rtv(100);
        assert_eq!(desc.descriptor_type, DescriptorType::RenderTargetView);
        assert_eq!(desc.num_descriptors, 100);
        assert!(!desc.shader_visible);
        assert_eq!(desc.name, Some("RTV Heap".to_string()));

        let desc = DescriptorHeapDescriptor::srv_cbv_uav(128);
        assert!(desc.shader_visible);
    }

    #[test]
    fn test_initialize_rejects_bad_arguments() {
        let mut allocator = SlotAllocator::new(DescriptorType::RenderTargetView);
        assert!(!allocator.initialize(0, 0x1000, None, 32)); // 容量为 0
        assert!(!allocator.initialize(4, 0, None, 32)); // 空句柄
        assert!(!allocator.initialize(4, 0x1000, None, 0)); // 步长为 0
        assert!(!allocator.is_initialized());
    }

    #[test]
    fn test_double_initialize_requires_destroy() {
        let mut allocator = make_allocator(4);
        assert!(!allocator.initialize(8, 0x2000, None, 32));

        allocator.destroy();
        assert!(allocator.initialize(8, 0x2000, None, 32));
        assert_eq!(allocator.capacity(), 8);
    }

    #[test]
    fn test_allocate_until_full() {
        // 容量 C：C 次分配成功且索引互不相同，第 C+1 次返回 Invalid
        let capacity = 16;
        let mut allocator = make_allocator(capacity);

        let mut seen = std::collections::HashSet::new();
        for _ in 0..capacity {
            let index = allocator.allocate();
            assert_ne!(index, INVALID_INDEX);
            assert!(index < capacity);
            assert!(seen.insert(index));
        }

        assert!(allocator.is_full());
        assert_eq!(allocator.allocate(), INVALID_INDEX);
    }

    #[test]
    fn test_uninitialized_operations_fail() {
        let mut allocator = SlotAllocator::new(DescriptorType::Sampler);
        assert_eq!(allocator.allocate(), INVALID_INDEX);
        assert!(!allocator.free(0));
        assert!(!allocator.reset());
        assert!(allocator.get_handle(0).is_null());
        // destroy 幂等，未初始化也安全
        allocator.destroy();
    }

    #[test]
    fn test_double_free_reported() {
        let mut allocator = make_allocator(4);
        let index = allocator.allocate();

        assert!(allocator.free(index));
        assert!(!allocator.free(index)); // 重复释放失败
        assert!(!allocator.free(99)); // 越界失败
    }

    #[test]
    fn test_freed_slot_is_reusable() {
        // 分配 → 释放 → 再分配必须能拿回同一索引（游标回退）
        let mut allocator = make_allocator(8);

        let a = allocator.allocate();
        let b = allocator.allocate();
        let c = allocator.allocate();
        assert_eq!((a, b, c), (0, 1, 2));

        assert!(allocator.free(a));
        assert_eq!(allocator.allocate(), a);
    }

    #[test]
    fn test_cursor_wraps_around() {
        let mut allocator = make_allocator(2);
        let a = allocator.allocate();
        let b = allocator.allocate();
        assert!(allocator.free(b));
        assert!(allocator.free(a));

        // 游标已回退到 a，重新分配从低索引开始
        assert_eq!(allocator.allocate(), a);
        assert_eq!(allocator.allocate(), b);
    }

    #[test]
    fn test_reset_restores_fresh_state() {
        let mut allocator = make_allocator(8);
        for _ in 0..5 {
            allocator.allocate();
        }
        assert_eq!(allocator.remaining(), 3);

        assert!(allocator.reset());
        assert_eq!(allocator.remaining(), 8);
        assert_eq!(allocator.allocated_count(), 0);
        // 如同全新初始化：下一次分配返回最低空闲索引
        assert_eq!(allocator.allocate(), 0);
    }

    #[test]
    fn test_handle_computation() {
        let mut allocator = SlotAllocator::new(DescriptorType::ShaderResourceView);
        assert!(allocator.initialize(4, 0x1000, Some(0x8000), 32));

        assert_eq!(allocator.get_handle(0).ptr, 0x1000);
        assert_eq!(allocator.get_handle(3).ptr, 0x1000 + 3 * 32);
        assert_eq!(allocator.get_gpu_handle(2).ptr, 0x8000 + 2 * 32);
    }

    #[test]
    fn test_invalid_index_returns_zeroed_handle() {
        let allocator = make_allocator(4);
        assert!(allocator.get_handle(4).is_null());
        assert!(allocator.get_handle(INVALID_INDEX).is_null());
        // RTV 堆不是着色器可见的
        assert!(allocator.get_gpu_handle(0).is_null());
    }

    #[test]
    fn test_stats() {
        let mut allocator = make_allocator(10);
        for _ in 0..5 {
            allocator.allocate();
        }

        let stats = allocator.stats();
        assert_eq!(stats.capacity, 10);
        assert_eq!(stats.used, 5);
        assert_eq!(stats.available, 5);
        assert_eq!(stats.usage_ratio, 0.5);
    }

    #[test]
    fn test_alloc_free_churn() {
        // 典型的分配/释放交替负载下不变量保持成立
        let mut allocator = make_allocator(8);
        let mut live = Vec::new();

        for round in 0..64u32 {
            if round % 3 == 0 && !live.is_empty() {
                let index = live.remove((round as usize) % live.len());
                assert!(allocator.free(index));
            } else if !allocator.is_full() {
                let index = allocator.allocate();
                assert_ne!(index, INVALID_INDEX);
                live.push(index);
            }
            assert_eq!(allocator.allocated_count() as usize, live.len());
        }
    }
}
