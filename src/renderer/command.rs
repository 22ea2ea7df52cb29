//! 命令分配器池模块
//!
//! 提供命令分配器的池化管理和 Fence 门控回收。
//!
//! # 设计原则
//!
//! - **安全复用**：分配器只有在它最后一次附加的 Fence 目标值被 GPU 满足后
//!   才能被重置，这是整个子系统存在的根本原因——重置仍被 GPU 读取的
//!   分配器在原生 API 层面是未定义行为
//! - **避免阻塞**：池保持足够的分配器数量，命令列表的 Reset 很少需要等待；
//!   唯一允许阻塞调用线程的点是 `force_wait`，且带硬超时
//! - **轮询刷新**：原生 Fence 没有推送通知，空闲状态缓存通过每帧一次的
//!   `update_allocators` 显式刷新，而不是异步回调
//! - **单写者**：一种命令列表类型对应一个池，由一个线程驱动，
//!   池内部不加锁，并发使用需要外部互斥
//!
//! # 生命周期
//!
//! 命令列表包装对象每帧调用 `get_command_allocator_wait` 取一个空闲分配器，
//! 重置后录制命令；提交之后用 `attach_fence` 把队列 Signal 的
//! (Fence, 目标值) 对挂到分配器上。之后 `is_free` 通过比较 Fence 完成值
//! 判断 GPU 是否已消费完该分配器的命令内存。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::core::config::{CommandListKindConfig, CommandPoolConfig};
use crate::core::error::Result;
use super::sync::{Fence, FenceValue};

/// 池内分配器的唯一标识
///
/// 由池单调分配，从不复用。
pub type AllocatorId = u64;

/// 命令列表类型
///
/// 对应 D3D12 的 `D3D12_COMMAND_LIST_TYPE`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandListKind {
    /// 直接命令列表（图形 + 计算 + 拷贝）
    Direct,
    /// 可复用命令包
    Bundle,
    /// 计算专用
    Compute,
    /// 拷贝专用
    Copy,
}

impl CommandListKind {
    /// 获取类型名称
    pub fn name(&self) -> &'static str {
        match self {
            CommandListKind::Direct => "Direct",
            CommandListKind::Bundle => "Bundle",
            CommandListKind::Compute => "Compute",
            CommandListKind::Copy => "Copy",
        }
    }
}

impl From<CommandListKindConfig> for CommandListKind {
    fn from(kind: CommandListKindConfig) -> Self {
        match kind {
            CommandListKindConfig::Direct => CommandListKind::Direct,
            CommandListKindConfig::Bundle => CommandListKind::Bundle,
            CommandListKindConfig::Compute => CommandListKind::Compute,
            CommandListKindConfig::Copy => CommandListKind::Copy,
        }
    }
}

/// 分配器粗粒度状态
///
/// 池维护的状态缓存，避免每次查询都去扫描原生 Fence。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkState {
    /// 空闲，可被发放
    Free,
    /// 已被发放或仍有未满足的 Fence
    Working,
}

/// 原生命令分配器抽象
///
/// 由图形后端实现（如 `Dx12CommandAllocator`），
/// 池只要求它能被重置以回收命令内存。
pub trait NativeCommandAllocator {
    /// 重置原生分配器
    ///
    /// 调用方必须保证 GPU 已消费完其中的命令。
    fn reset(&mut self) -> Result<()>;
}

/// 命令分配器工厂抽象
///
/// 由设备层实现（如 `Dx12Device`），池通过它按需创建原生分配器。
pub trait CommandAllocatorDevice {
    /// 原生分配器类型
    type Allocator: NativeCommandAllocator;

    /// 创建指定类型的原生命令分配器
    fn create_command_allocator(&self, kind: CommandListKind) -> Result<Self::Allocator>;
}

/// 命令分配器
///
/// 包装一个原生命令分配器，并跟踪一个非拥有的 (Fence, 目标值) 对，
/// 回答"现在复用是否安全"而无需调用方直接轮询 Fence。
///
/// 状态机：Free ⇄ Busy。`attach_fence` 完成 Free→Busy；
/// Busy→Free 由 `is_free` 惰性判定（Fence 完成值 ≥ 目标值），
/// 没有任何显式事件触发这个迁移，`force_wait` 除外。
pub struct CommandAllocator<A: NativeCommandAllocator> {
    /// 原生分配器句柄（独占所有权）
    native: A,
    /// 附加的 Fence（非拥有引用，本体归渲染循环所有）
    fence: Option<Arc<dyn Fence>>,
    /// Fence 目标值
    wait_value: FenceValue,
    /// 阻塞等待时限
    block_max_time: Duration,
}

impl<A: NativeCommandAllocator> CommandAllocator<A> {
    /// 包装一个原生分配器
    pub fn new(native: A, block_max_time: Duration) -> Self {
        Self {
            native,
            fence: None,
            wait_value: FenceValue::UNSET,
            block_max_time,
        }
    }

    /// 分配器是否空闲（可安全重置/复用）
    ///
    /// Fence 状态的纯函数：未附加 Fence，或附加的 Fence
    /// 完成值已到达目标值时为 `true`。
    pub fn is_free(&self) -> bool {
        match &self.fence {
            None => true,
            Some(fence) => {
                self.wait_value.is_unset() || fence.completed_value() >= self.wait_value.value()
            }
        }
    }

    /// 是否附加了 Fence
    pub fn has_fence(&self) -> bool {
        self.fence.is_some()
    }

    /// 附加 (Fence, 目标值) 对，转入 Busy 状态
    ///
    /// # 返回值
    ///
    /// 目标值为未设置哨兵，或分配器当前不空闲（上一次在途使用还未解决，
    /// 附加第二个 Fence 会悄悄丢失对它的跟踪）时返回 `false`。
    pub fn attach_fence(&mut self, fence: Arc<dyn Fence>, wait_value: FenceValue) -> bool {
        if wait_value.is_unset() {
            error!("AttachFence called with the unset sentinel value");
            return false;
        }

        if !self.is_free() {
            error!(
                wait_value = self.wait_value.value(),
                "AttachFence rejected: allocator still busy with a previous fence"
            );
            return false;
        }

        self.fence = Some(fence);
        self.wait_value = wait_value;
        true
    }

    /// 解除 Fence 跟踪
    ///
    /// 池在发放分配器时调用，确保上一轮已满足的 Fence 对
    /// 不会让分配器被误判为可再次发放。
    pub(crate) fn detach_fence(&mut self) {
        self.fence = None;
        self.wait_value = FenceValue::UNSET;
    }

    /// 重置原生分配器
    ///
    /// 从不主动等待；希望保证成功的调用方应使用 `force_reset`。
    ///
    /// # 返回值
    ///
    /// 分配器不空闲或原生重置失败时返回 `false`。
    pub fn reset(&mut self) -> bool {
        if !self.is_free() {
            error!(
                wait_value = self.wait_value.value(),
                "Reset rejected: GPU has not finished consuming this allocator"
            );
            return false;
        }

        if let Err(e) = self.native.reset() {
            error!(error = %e, "Native command allocator reset failed");
            return false;
        }
        true
    }

    /// 等待后重置
    pub fn force_reset(&mut self) -> bool {
        self.force_wait() && self.reset()
    }

    /// 阻塞等待附加的 Fence 到达目标值
    ///
    /// 没有附加 Fence 或目标值为未设置哨兵时立即返回 `true`。
    /// 这是本子系统唯一允许阻塞调用线程的操作，受 `block_max_time` 限制。
    ///
    /// # 返回值
    ///
    /// 超时或等待失败时返回 `false` 并记录日志。
    pub fn force_wait(&self) -> bool {
        let fence = match &self.fence {
            None => return true,
            Some(fence) => fence,
        };

        if self.wait_value.is_unset() {
            return true;
        }

        if fence.completed_value() >= self.wait_value.value() {
            return true;
        }

        if fence.wait_until(self.wait_value.value(), self.block_max_time) {
            true
        } else {
            error!(
                wait_value = self.wait_value.value(),
                completed = fence.completed_value(),
                timeout_secs = self.block_max_time.as_secs_f64(),
                "Fence wait timed out, GPU may be unresponsive"
            );
            false
        }
    }

    /// 销毁前置检查
    ///
    /// 分配器忙碌时是前置条件违反：记录日志并返回 `false`。
    /// 实际的原生资源释放发生在所有者丢弃本对象时。
    pub fn destroy(&mut self) -> bool {
        if !self.is_free() {
            error!(
                wait_value = self.wait_value.value(),
                "Destroy rejected: allocator still in flight, use force_destroy"
            );
            return false;
        }

        self.detach_fence();
        true
    }

    /// 等待后销毁
    ///
    /// 除非等待本身超时，否则总能成功。
    pub fn force_destroy(&mut self) -> bool {
        self.force_wait() && self.destroy()
    }

    /// 访问原生分配器
    pub fn native(&self) -> &A {
        &self.native
    }

    /// 访问原生分配器（可变）
    pub fn native_mut(&mut self) -> &mut A {
        &mut self.native
    }
}

/// 命令分配器池
///
/// 维护一组大小合适的命令分配器：GPU 工作已完成的分配器被回收复用，
/// 还在途的延迟销毁。每种命令列表类型一个池。
pub struct CommandAllocatorPool<D: CommandAllocatorDevice> {
    /// 设备层工厂
    device: D,
    /// 命令列表类型
    kind: CommandListKind,
    /// ID → 分配器
    allocators: HashMap<AllocatorId, CommandAllocator<D::Allocator>>,
    /// ID → 粗粒度状态缓存
    states: HashMap<AllocatorId, WorkState>,
    /// 待延迟销毁的 ID 集合
    pending_destroy: HashSet<AllocatorId>,
    /// 下一个分配器 ID（单调递增，从不复用）
    next_id: AllocatorId,
    /// 分配器数量上限
    max_counts: u32,
    /// 获取空闲分配器的最大阻塞时间
    block_max_time: Duration,
}

impl<D: CommandAllocatorDevice> CommandAllocatorPool<D> {
    /// 创建池并急切创建初始分配器
    ///
    /// 部分创建失败不会使整个池失败：记录实际成功的数量，
    /// 后续仍可按需增长。
    pub fn new(
        device: D,
        kind: CommandListKind,
        initial_counts: u32,
        max_counts: u32,
        block_max_time: Duration,
    ) -> Self {
        let mut pool = Self {
            device,
            kind,
            allocators: HashMap::new(),
            states: HashMap::new(),
            pending_destroy: HashSet::new(),
            next_id: 0,
            max_counts,
            block_max_time,
        };

        for _ in 0..initial_counts.min(max_counts) {
            if pool.create_allocator().is_none() {
                break;
            }
        }

        let created = pool.allocators.len();
        if created < initial_counts as usize {
            warn!(
                kind = kind.name(),
                requested = initial_counts,
                created,
                "Command allocator pool created with fewer allocators than requested"
            );
        } else {
            info!(
                kind = kind.name(),
                created,
                max_counts,
                "Command allocator pool initialized"
            );
        }

        pool
    }

    /// 从配置创建池
    pub fn from_config(device: D, config: &CommandPoolConfig) -> Self {
        Self::new(
            device,
            config.list_kind.into(),
            config.initial_counts,
            config.max_counts,
            config.block_max_time(),
        )
    }

    /// 获取一个空闲分配器，无空闲时阻塞等待
    ///
    /// 每帧的主要入口。先扫描所有分配器的空闲状态；没有空闲的则在
    /// 池配置的时限内重复扫描。时限内仍无空闲返回 `None`，
    /// 调用方应视为资源耗尽（跳帧或致命错误由渲染循环决定）。
    pub fn get_command_allocator_wait(&mut self) -> Option<AllocatorId> {
        let deadline = Instant::now() + self.block_max_time;

        loop {
            if let Some(id) = self.find_free_id() {
                self.hand_out(id);
                return Some(id);
            }

            if Instant::now() >= deadline {
                warn!(
                    kind = self.kind.name(),
                    counts = self.allocators.len(),
                    timeout_secs = self.block_max_time.as_secs_f64(),
                    "No command allocator became free within the block timeout"
                );
                return None;
            }

            std::thread::yield_now();
        }
    }

    /// 获取一个空闲分配器，无空闲时尝试增长池而不是等待
    ///
    /// 池已达上限且无空闲时返回 `None`。
    pub fn get_command_allocator_create(&mut self) -> Option<AllocatorId> {
        if let Some(id) = self.find_free_id() {
            self.hand_out(id);
            return Some(id);
        }

        let id = self.create_allocator()?;
        self.hand_out(id);
        Some(id)
    }

    /// 访问指定分配器
    pub fn allocator(&self, id: AllocatorId) -> Option<&CommandAllocator<D::Allocator>> {
        self.allocators.get(&id)
    }

    /// 访问指定分配器（可变）
    pub fn allocator_mut(
        &mut self,
        id: AllocatorId,
    ) -> Option<&mut CommandAllocator<D::Allocator>> {
        self.allocators.get_mut(&id)
    }

    /// 销毁指定分配器
    ///
    /// 空闲的立即移除；忙碌的加入延迟销毁集合（软删除），
    /// 等 `update_allocators` 发现其 Fence 已解决后完成移除。
    /// 销毁请求从不被拒绝，只会被推迟。
    ///
    /// # 返回值
    ///
    /// ID 不存在时返回 `false`。
    pub fn destroy(&mut self, id: AllocatorId) -> bool {
        let allocator = match self.allocators.get(&id) {
            Some(a) => a,
            None => {
                warn!(id, "Destroy called with unknown allocator id");
                return false;
            }
        };

        if allocator.is_free() {
            self.remove_allocator(id);
            debug!(id, "Command allocator destroyed immediately");
        } else {
            self.pending_destroy.insert(id);
            debug!(id, "Command allocator destruction deferred until GPU completion");
        }
        true
    }

    /// 等待所有分配器空闲后移除全部
    ///
    /// 用于停机。每个分配器的等待都受池时限约束；
    /// 等待超时的分配器也会被无条件移除（此时记录错误）。
    ///
    /// # 返回值
    ///
    /// 所有等待都成功返回 `true`。
    pub fn destroy_all_force(&mut self) -> bool {
        let mut all_ok = true;
        for (id, allocator) in self.allocators.iter() {
            if !allocator.force_wait() {
                error!(id, "Force wait failed during pool shutdown");
                all_ok = false;
            }
        }

        let removed = self.allocators.len();
        self.allocators.clear();
        self.states.clear();
        self.pending_destroy.clear();
        info!(kind = self.kind.name(), removed, "Command allocator pool destroyed");
        all_ok
    }

    /// 每帧刷新
    ///
    /// 重新扫描每个分配器的空闲状态到缓存，然后完成所有
    /// Fence 已解决的延迟销毁。这是 `destroy` 在分配器忙碌时
    /// 做出的软删除最终回收内存的机制。
    pub fn update_allocators(&mut self) {
        self.track_states();
        self.destroy_pendings();
    }

    /// 获取池内分配器数量
    pub fn counts(&self) -> usize {
        self.allocators.len()
    }

    /// 获取当前可发放的分配器数量
    pub fn free_counts(&self) -> usize {
        self.allocators
            .keys()
            .filter(|id| self.is_available(**id))
            .count()
    }

    /// 获取命令列表类型
    pub fn kind(&self) -> CommandListKind {
        self.kind
    }

    /// 获取数量上限
    pub fn max_counts(&self) -> u32 {
        self.max_counts
    }

    /// 指定 ID 是否仍在池中
    pub fn contains(&self, id: AllocatorId) -> bool {
        self.allocators.contains_key(&id)
    }

    /// 创建一个新分配器（受上限约束）
    fn create_allocator(&mut self) -> Option<AllocatorId> {
        if self.allocators.len() >= self.max_counts as usize {
            warn!(
                kind = self.kind.name(),
                max_counts = self.max_counts,
                "Command allocator pool is at max counts"
            );
            return None;
        }

        let native = match self.device.create_command_allocator(self.kind) {
            Ok(native) => native,
            Err(e) => {
                error!(kind = self.kind.name(), error = %e, "Failed to create command allocator");
                return None;
            }
        };

        let id = self.next_id;
        self.next_id += 1;
        self.allocators
            .insert(id, CommandAllocator::new(native, self.block_max_time));
        self.states.insert(id, WorkState::Free);
        debug!(id, kind = self.kind.name(), "Command allocator created");
        Some(id)
    }

    /// 指定分配器当前是否可发放
    ///
    /// 发放过但还未附加 Fence 的分配器在缓存里是 Working 且没有
    /// Fence，不可发放；附加过 Fence 的以 Fence 实际状态为准。
    fn is_available(&self, id: AllocatorId) -> bool {
        if self.pending_destroy.contains(&id) {
            return false;
        }

        let allocator = match self.allocators.get(&id) {
            Some(a) => a,
            None => return false,
        };

        if !allocator.is_free() {
            return false;
        }

        allocator.has_fence() || self.states.get(&id) == Some(&WorkState::Free)
    }

    /// 找一个可发放的分配器 ID
    fn find_free_id(&self) -> Option<AllocatorId> {
        self.allocators
            .keys()
            .copied()
            .find(|id| self.is_available(*id))
    }

    /// 发放分配器：清除旧 Fence 跟踪并在缓存中标记 Working
    fn hand_out(&mut self, id: AllocatorId) {
        if let Some(allocator) = self.allocators.get_mut(&id) {
            allocator.detach_fence();
        }
        self.states.insert(id, WorkState::Working);
    }

    /// 把每个附加过 Fence 的分配器的实际空闲状态刷进缓存
    fn track_states(&mut self) {
        for (id, allocator) in self.allocators.iter() {
            if allocator.has_fence() {
                let state = if allocator.is_free() {
                    WorkState::Free
                } else {
                    WorkState::Working
                };
                self.states.insert(*id, state);
            }
        }
    }

    /// 完成 Fence 已解决的延迟销毁
    fn destroy_pendings(&mut self) {
        let pending: Vec<AllocatorId> = self.pending_destroy.iter().copied().collect();
        for id in pending {
            match self.allocators.get(&id) {
                Some(allocator) if allocator.is_free() => {
                    self.remove_allocator(id);
                    debug!(id, "Deferred command allocator destruction completed");
                }
                Some(_) => {} // 仍在途，下一帧再查
                None => {
                    self.pending_destroy.remove(&id);
                }
            }
        }
    }

    /// 从所有映射中移除分配器
    fn remove_allocator(&mut self, id: AllocatorId) {
        self.allocators.remove(&id);
        self.states.remove(&id);
        self.pending_destroy.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::GraphicsError;
    use crate::renderer::sync::HostFence;
    use std::cell::Cell;
    use std::rc::Rc;

    /// 测试用原生分配器
    struct MockAllocator {
        reset_calls: u32,
    }

    impl NativeCommandAllocator for MockAllocator {
        fn reset(&mut self) -> Result<()> {
            self.reset_calls += 1;
            Ok(())
        }
    }

    /// 测试用设备工厂，可配置在创建 N 个之后开始失败
    struct MockDevice {
        created: Rc<Cell<u32>>,
        fail_after: Option<u32>,
    }

    impl MockDevice {
        fn new() -> Self {
            Self {
                created: Rc::new(Cell::new(0)),
                fail_after: None,
            }
        }

        fn failing_after(limit: u32) -> Self {
            Self {
                created: Rc::new(Cell::new(0)),
                fail_after: Some(limit),
            }
        }
    }

    impl CommandAllocatorDevice for MockDevice {
        type Allocator = MockAllocator;

        fn create_command_allocator(&self, _kind: CommandListKind) -> Result<MockAllocator> {
            if let Some(limit) = self.fail_after {
                if self.created.get() >= limit {
                    return Err(GraphicsError::ResourceCreation(
                        "mock device out of allocators".to_string(),
                    )
                    .into());
                }
            }
            self.created.set(self.created.get() + 1);
            Ok(MockAllocator { reset_calls: 0 })
        }
    }

    fn make_allocator() -> CommandAllocator<MockAllocator> {
        CommandAllocator::new(MockAllocator { reset_calls: 0 }, Duration::from_millis(50))
    }

    fn make_pool(initial: u32, max: u32) -> CommandAllocatorPool<MockDevice> {
        CommandAllocatorPool::new(
            MockDevice::new(),
            CommandListKind::Direct,
            initial,
            max,
            Duration::from_millis(50),
        )
    }

    #[test]
    fn test_allocator_free_until_fence_resolves() {
        let mut allocator = make_allocator();
        let fence = Arc::new(HostFence::new());

        // 附加 Fence 之前空闲
        assert!(allocator.is_free());

        let v = fence.next_value();
        assert!(allocator.attach_fence(fence.clone(), v));
        assert!(!allocator.is_free());

        // Fence 完成后无需任何显式调用即转为空闲
        fence.signal(v);
        assert!(allocator.is_free());
    }

    #[test]
    fn test_attach_fence_while_busy_fails() {
        let mut allocator = make_allocator();
        let fence = Arc::new(HostFence::new());

        let v1 = fence.next_value();
        assert!(allocator.attach_fence(fence.clone(), v1));

        // 上一个 Fence 未解决，拒绝附加第二个
        let v2 = fence.next_value();
        assert!(!allocator.attach_fence(fence.clone(), v2));

        // 解决后可以再次附加
        fence.signal(v1);
        assert!(allocator.attach_fence(fence.clone(), v2));
    }

    #[test]
    fn test_attach_fence_rejects_unset_sentinel() {
        let mut allocator = make_allocator();
        let fence = Arc::new(HostFence::new());
        assert!(!allocator.attach_fence(fence, FenceValue::UNSET));
    }

    #[test]
    fn test_reset_requires_free() {
        let mut allocator = make_allocator();
        let fence = Arc::new(HostFence::new());

        assert!(allocator.reset());
        assert_eq!(allocator.native().reset_calls, 1);

        let v = fence.next_value();
        allocator.attach_fence(fence.clone(), v);
        assert!(!allocator.reset());
        assert_eq!(allocator.native().reset_calls, 1);

        fence.signal(v);
        assert!(allocator.reset());
        assert_eq!(allocator.native().reset_calls, 2);
    }

    #[test]
    fn test_force_wait_without_fence_returns_immediately() {
        let allocator = make_allocator();
        let start = Instant::now();
        assert!(allocator.force_wait());
        assert!(start.elapsed() < Duration::from_millis(10));
    }

    #[test]
    fn test_force_wait_times_out_bounded() {
        let mut allocator = make_allocator();
        let fence = Arc::new(HostFence::new());
        allocator.attach_fence(fence, FenceValue::new(1));

        let start = Instant::now();
        assert!(!allocator.force_wait());
        let elapsed = start.elapsed();

        assert!(elapsed >= Duration::from_millis(50));
        assert!(elapsed < Duration::from_secs(2));
    }

    #[test]
    fn test_force_wait_succeeds_when_signaled() {
        let mut allocator = make_allocator();
        let fence = Arc::new(HostFence::new());
        let v = fence.next_value();
        allocator.attach_fence(fence.clone(), v);

        let signaler = Arc::clone(&fence);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(5));
            signaler.signal(v);
        });

        assert!(allocator.force_wait());
        handle.join().unwrap();
    }

    #[test]
    fn test_destroy_requires_free() {
        let mut allocator = make_allocator();
        let fence = Arc::new(HostFence::new());
        let v = fence.next_value();
        allocator.attach_fence(fence.clone(), v);

        assert!(!allocator.destroy());

        fence.signal(v);
        assert!(allocator.destroy());
    }

    #[test]
    fn test_force_destroy_waits_first() {
        let mut allocator = make_allocator();
        let fence = Arc::new(HostFence::new());
        let v = fence.next_value();
        allocator.attach_fence(fence.clone(), v);
        fence.signal(v);

        assert!(allocator.force_destroy());
        assert!(!allocator.has_fence());
    }

    #[test]
    fn test_pool_initial_creation() {
        let pool = make_pool(3, 5);
        assert_eq!(pool.counts(), 3);
        assert_eq!(pool.free_counts(), 3);
        assert_eq!(pool.kind(), CommandListKind::Direct);
    }

    #[test]
    fn test_pool_tolerates_partial_creation_failure() {
        // 设备只能创建 2 个，池请求 3 个：不失败，带着 2 个工作
        let device = MockDevice::failing_after(2);
        let pool = CommandAllocatorPool::new(
            device,
            CommandListKind::Direct,
            3,
            5,
            Duration::from_millis(50),
        );
        assert_eq!(pool.counts(), 2);
    }

    #[test]
    fn test_pool_hands_out_distinct_allocators() {
        let mut pool = make_pool(3, 5);

        let a = pool.get_command_allocator_wait().unwrap();
        let b = pool.get_command_allocator_wait().unwrap();
        let c = pool.get_command_allocator_wait().unwrap();

        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_ne!(a, c);
        assert_eq!(pool.free_counts(), 0);
    }

    #[test]
    fn test_pool_wait_times_out_bounded() {
        // 有界等待：无空闲时在约定时限后返回 None，而不是无限阻塞，
        // 也不会退化为对所有分配器逐个等满时限
        let mut pool = make_pool(2, 2);
        pool.get_command_allocator_wait().unwrap();
        pool.get_command_allocator_wait().unwrap();

        let start = Instant::now();
        assert!(pool.get_command_allocator_wait().is_none());
        let elapsed = start.elapsed();

        assert!(elapsed >= Duration::from_millis(50));
        assert!(elapsed < Duration::from_secs(2));
    }

    #[test]
    fn test_pool_recycles_after_fence_resolves() {
        let mut pool = make_pool(1, 1);
        let fence = Arc::new(HostFence::new());

        let id = pool.get_command_allocator_wait().unwrap();
        let v = fence.next_value();
        assert!(pool
            .allocator_mut(id)
            .unwrap()
            .attach_fence(fence.clone(), v));

        // Fence 未解决：池已空
        assert!(pool.get_command_allocator_wait().is_none());

        // Fence 解决后同一个分配器被回收复用
        fence.signal(v);
        assert_eq!(pool.get_command_allocator_wait(), Some(id));
    }

    #[test]
    fn test_handed_out_allocator_not_reissued_before_fence() {
        // 发放后还未附加 Fence 的分配器不能被再次发放
        let mut pool = make_pool(1, 1);
        let id = pool.get_command_allocator_wait().unwrap();
        assert!(pool.allocator(id).unwrap().is_free()); // 没有 Fence，本身是空闲的
        assert!(pool.get_command_allocator_wait().is_none()); // 但不能重复发放
    }

    #[test]
    fn test_pool_create_grows_within_max() {
        let mut pool = make_pool(1, 2);
        let a = pool.get_command_allocator_wait().unwrap();

        // 无空闲时 create 路径增长而不是等待
        let b = pool.get_command_allocator_create().unwrap();
        assert_ne!(a, b);
        assert_eq!(pool.counts(), 2);

        // 达到上限后返回 None
        assert!(pool.get_command_allocator_create().is_none());
    }

    #[test]
    fn test_pool_destroy_free_is_immediate() {
        let mut pool = make_pool(2, 2);
        let id = pool.get_command_allocator_wait().unwrap();
        // 发放后未附加 Fence，is_free 为真，立即移除
        assert!(pool.destroy(id));
        assert!(!pool.contains(id));
        assert_eq!(pool.counts(), 1);

        // 未知 ID
        assert!(!pool.destroy(9999));
    }

    #[test]
    fn test_pool_destroy_busy_is_deferred() {
        let mut pool = make_pool(1, 1);
        let fence = Arc::new(HostFence::new());

        let id = pool.get_command_allocator_wait().unwrap();
        let v = fence.next_value();
        pool.allocator_mut(id).unwrap().attach_fence(fence.clone(), v);

        // 忙碌：软删除，仍可查询
        assert!(pool.destroy(id));
        assert!(pool.contains(id));

        // Fence 未解决时刷新不回收
        pool.update_allocators();
        assert!(pool.contains(id));

        // Fence 解决后刷新完成回收
        fence.signal(v);
        pool.update_allocators();
        assert!(!pool.contains(id));
        assert_eq!(pool.counts(), 0);
    }

    #[test]
    fn test_pending_destroy_not_reissued() {
        let mut pool = make_pool(1, 1);
        let fence = Arc::new(HostFence::new());

        let id = pool.get_command_allocator_wait().unwrap();
        let v = fence.next_value();
        pool.allocator_mut(id).unwrap().attach_fence(fence.clone(), v);
        pool.destroy(id);

        // 即使 Fence 解决，待销毁的分配器也不会被再次发放
        fence.signal(v);
        assert!(pool.get_command_allocator_wait().is_none());
    }

    #[test]
    fn test_update_allocators_refreshes_state_cache() {
        let mut pool = make_pool(2, 2);
        let fence = Arc::new(HostFence::new());

        let id = pool.get_command_allocator_wait().unwrap();
        let v = fence.next_value();
        pool.allocator_mut(id).unwrap().attach_fence(fence.clone(), v);
        assert_eq!(pool.free_counts(), 1);

        fence.signal(v);
        pool.update_allocators();
        assert_eq!(pool.free_counts(), 2);
    }

    #[test]
    fn test_destroy_all_force() {
        let mut pool = make_pool(3, 5);
        let fence = Arc::new(HostFence::new());

        let id = pool.get_command_allocator_wait().unwrap();
        let v = fence.next_value();
        pool.allocator_mut(id).unwrap().attach_fence(fence.clone(), v);
        fence.signal(v);

        assert!(pool.destroy_all_force());
        assert_eq!(pool.counts(), 0);
    }

    #[test]
    fn test_destroy_all_force_reports_timeout() {
        let mut pool = make_pool(1, 1);
        let fence = Arc::new(HostFence::new());

        let id = pool.get_command_allocator_wait().unwrap();
        pool.allocator_mut(id)
            .unwrap()
            .attach_fence(fence, FenceValue::new(1));

        // Fence 永不解决：等待超时，返回 false，但池仍被清空
        assert!(!pool.destroy_all_force());
        assert_eq!(pool.counts(), 0);
    }

    #[test]
    fn test_end_to_end_pool_exhaustion() {
        // 初始 3、上限 5：三次 wait 发放三个；第四次 wait 超时；
        // create 增长到 4、5；第六个请求失败
        let mut pool = make_pool(3, 5);

        let mut issued = Vec::new();
        for _ in 0..3 {
            issued.push(pool.get_command_allocator_wait().unwrap());
        }

        // wait 路径不会自动增长
        assert!(pool.get_command_allocator_wait().is_none());
        assert_eq!(pool.counts(), 3);

        // create 路径增长到上限
        issued.push(pool.get_command_allocator_create().unwrap());
        issued.push(pool.get_command_allocator_create().unwrap());
        assert_eq!(pool.counts(), 5);

        // 全部发放且无一释放：第六个请求失败
        assert!(pool.get_command_allocator_create().is_none());
        assert!(pool.get_command_allocator_wait().is_none());

        // 五个 ID 互不相同
        let unique: HashSet<_> = issued.iter().copied().collect();
        assert_eq!(unique.len(), 5);
    }

    #[test]
    fn test_from_config() {
        let config = CommandPoolConfig::default();
        let pool = CommandAllocatorPool::from_config(MockDevice::new(), &config);
        assert_eq!(pool.counts(), config.initial_counts as usize);
        assert_eq!(pool.max_counts(), config.max_counts);
        assert_eq!(pool.kind(), CommandListKind::Direct);
    }
}
