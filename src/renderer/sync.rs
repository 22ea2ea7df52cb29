//! GPU 同步机制模块
//!
//! 提供统一的 GPU 同步原语，用于 CPU-GPU 同步。
//!
//! # 设计原则
//!
//! - **Fence 同步**：Fence 暴露单调递增的完成值，CPU 通过比较目标值判断
//!   此前提交的 GPU 工作是否已经结束
//! - **非拥有引用**：命令分配器只读取 Fence 的完成值，从不推进或销毁它，
//!   Fence 本体由渲染循环（队列层）拥有
//! - **有界等待**：所有阻塞等待都带超时，避免 GPU/驱动挂死时 CPU 永久卡住
//!
//! # 使用场景
//!
//! 1. **帧同步**：确保 GPU 完成前一帧才复用该帧的命令分配器
//! 2. **延迟销毁**：分配器只有在其 Fence 目标值被满足后才真正释放

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Fence 值
///
/// 用于 CPU-GPU 同步的单调递增值。
/// 值 0 是保留的"未设置"哨兵，表示没有待等待的 GPU 工作。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FenceValue(u64);

impl FenceValue {
    /// "未设置"哨兵值
    pub const UNSET: FenceValue = FenceValue(0);

    /// 创建新的 Fence 值
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// 获取内部值
    pub fn value(&self) -> u64 {
        self.0
    }

    /// 是否为未设置哨兵
    pub fn is_unset(&self) -> bool {
        self.0 == 0
    }

    /// 下一个 Fence 值
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// 递增 Fence 值
    pub fn increment(&mut self) {
        self.0 += 1;
    }
}

/// GPU Fence 抽象
///
/// 由设备/队列层实现（如 `Dx12Fence`）。本子系统只读取完成值，
/// 并在必要时做有界阻塞等待。
pub trait Fence: Send + Sync {
    /// 获取 GPU 侧已完成的 Fence 值
    fn completed_value(&self) -> u64;

    /// 阻塞等待直到完成值到达 `value`，最多等待 `timeout`
    ///
    /// 默认实现为有界轮询。原生后端（如 DX12）可以用
    /// 事件对象覆盖为真正的 OS 级等待。
    ///
    /// # 返回值
    ///
    /// 在时限内到达目标值返回 `true`，超时返回 `false`
    fn wait_until(&self, value: u64, timeout: Duration) -> bool {
        if self.completed_value() >= value {
            return true;
        }

        let deadline = Instant::now() + timeout;
        while self.completed_value() < value {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::yield_now();
        }
        true
    }
}

/// CPU 侧 Fence
///
/// 完成值由渲染循环（或测试）手动推进，不依赖任何图形 API。
/// 生产环境中队列 Signal 的回包驱动 `signal()`；
/// 测试中用它模拟 GPU 完成进度。
pub struct HostFence {
    /// 当前 Fence 值（CPU 侧已提交）
    current_value: AtomicU64,
    /// 已完成的 Fence 值（GPU 侧）
    completed_value: AtomicU64,
}

impl HostFence {
    /// 创建新的 CPU 侧 Fence
    pub fn new() -> Self {
        Self {
            current_value: AtomicU64::new(0),
            completed_value: AtomicU64::new(0),
        }
    }

    /// 获取当前（已提交的）Fence 值
    pub fn current_value(&self) -> FenceValue {
        FenceValue::new(self.current_value.load(Ordering::Acquire))
    }

    /// 获取下一个 Fence 值并递增计数器
    pub fn next_value(&self) -> FenceValue {
        let value = self.current_value.fetch_add(1, Ordering::AcqRel);
        FenceValue::new(value + 1)
    }

    /// 推进已完成的 Fence 值
    ///
    /// 通常在 GPU 完成工作后由队列层调用。完成值单调递增，
    /// 回退的 signal 被忽略。
    pub fn signal(&self, value: FenceValue) {
        self.completed_value
            .fetch_max(value.value(), Ordering::AcqRel);
    }

    /// 检查特定 Fence 值是否已完成
    pub fn is_completed(&self, value: FenceValue) -> bool {
        self.completed_value() >= value.value()
    }
}

impl Fence for HostFence {
    fn completed_value(&self) -> u64 {
        self.completed_value.load(Ordering::Acquire)
    }
}

impl Default for HostFence {
    fn default() -> Self {
        Self::new()
    }
}
