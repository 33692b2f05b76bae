//! 会话共享状态
//!
//! 遥测循环与命令控制台之间只共享两项状态：
//!
//! - **设定点**：只由握手成功后写入（控制台线程），遥测循环仅用于显示
//! - **运行标志**：true → false 只发生一次（退出命令 / 中断 / 串口故障），
//!   第一次转换同时记录原因，之后的停止请求都被忽略
//!
//! 两项都是单字节原子量，不需要额外的锁。

use std::sync::atomic::{AtomicU8, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use thermo_protocol::Setpoint;
use tracing::info;

/// 会话结束原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StopReason {
    /// 操作员输入退出命令
    Quit = 1,
    /// 中断信号（Ctrl+C）
    Interrupted = 2,
    /// 串口故障（拔线、读错误）
    TransportFailure = 3,
}

impl StopReason {
    /// 从 u8 转换（0 表示仍在运行）
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Quit),
            2 => Some(Self::Interrupted),
            3 => Some(Self::TransportFailure),
            _ => None,
        }
    }

    /// 转换为 u8
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// 运行中（尚未记录任何停止原因）
const RUNNING: u8 = 0;

/// 会话状态（通过 `Arc` 在两个线程间共享）
///
/// # 示例
///
/// ```
/// use thermo_driver::{SessionState, StopReason};
/// use thermo_protocol::Setpoint;
///
/// let state = SessionState::new(Setpoint::DEFAULT);
/// assert!(state.is_running());
///
/// assert!(state.request_stop(StopReason::Quit));
/// assert!(!state.request_stop(StopReason::Interrupted)); // 只生效一次
/// assert_eq!(state.stop_reason(), Some(StopReason::Quit));
/// ```
#[derive(Debug)]
pub struct SessionState {
    setpoint: AtomicU8,
    stop_reason: AtomicU8,
}

impl SessionState {
    /// 停止标志的轮询粒度（用于可中断的睡眠）
    pub const STOP_POLL: Duration = Duration::from_millis(50);

    pub fn new(initial: Setpoint) -> Self {
        Self {
            setpoint: AtomicU8::new(initial.get()),
            stop_reason: AtomicU8::new(RUNNING),
        }
    }

    /// 当前设定点（最近一次握手成功的值）
    pub fn setpoint(&self) -> Setpoint {
        Setpoint::new(i64::from(self.setpoint.load(Ordering::Acquire))).unwrap_or_default()
    }

    /// 握手成功后写入设定点（仅控制台线程调用）
    pub(crate) fn set_setpoint(&self, value: Setpoint) {
        self.setpoint.store(value.get(), Ordering::Release);
    }

    /// 会话是否仍在运行
    pub fn is_running(&self) -> bool {
        self.stop_reason.load(Ordering::Acquire) == RUNNING
    }

    /// 请求停止
    ///
    /// 返回 `true` 表示本次调用完成了 running → stopped 的转换；
    /// 已经停止时返回 `false`，原因保持为第一次的值。
    pub fn request_stop(&self, reason: StopReason) -> bool {
        let changed = self
            .stop_reason
            .compare_exchange(RUNNING, reason.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if changed {
            info!("Session stop requested: {:?}", reason);
        }
        changed
    }

    /// 停止原因（运行中为 `None`）
    pub fn stop_reason(&self) -> Option<StopReason> {
        StopReason::from_u8(self.stop_reason.load(Ordering::Acquire))
    }

    /// 睡眠 `duration`，会话停止时提前返回
    ///
    /// 返回睡眠结束时会话是否仍在运行。
    pub fn sleep_while_running(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if !self.is_running() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep(Self::STOP_POLL.min(deadline - now));
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(Setpoint::DEFAULT)
    }
}
