//! 会话指标
//!
//! 原子计数器，遥测线程和控制台线程都可以无锁更新，任何线程都可以读取快照。

use std::sync::atomic::{AtomicU64, Ordering};

/// 会话实时指标
///
/// # 使用示例
///
/// ```rust
/// use thermo_driver::SessionMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = SessionMetrics::new();
/// metrics.lines_read.fetch_add(1, Ordering::Relaxed);
///
/// let snapshot = metrics.snapshot();
/// assert_eq!(snapshot.lines_read, 1);
/// ```
#[derive(Debug, Default)]
pub struct SessionMetrics {
    /// 从串口读到的行数（含无法解析的行）
    pub lines_read: AtomicU64,

    /// 成功解析并记录的帧数
    pub frames_decoded: AtomicU64,

    /// 格式不符被丢弃的行数（撕裂、横幅、回显）
    pub frames_rejected: AtomicU64,

    /// 读超时次数（正常现象，板子在配置模式下不输出）
    pub read_timeouts: AtomicU64,

    /// 握手成功次数
    pub handshakes_ok: AtomicU64,

    /// 握手失败次数（超时或串口错误）
    pub handshakes_failed: AtomicU64,
}

impl SessionMetrics {
    /// 创建新的指标实例（所有计数器初始化为 0）
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取快照
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            lines_read: self.lines_read.load(Ordering::Relaxed),
            frames_decoded: self.frames_decoded.load(Ordering::Relaxed),
            frames_rejected: self.frames_rejected.load(Ordering::Relaxed),
            read_timeouts: self.read_timeouts.load(Ordering::Relaxed),
            handshakes_ok: self.handshakes_ok.load(Ordering::Relaxed),
            handshakes_failed: self.handshakes_failed.load(Ordering::Relaxed),
        }
    }
}

/// 指标快照（不可变）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub lines_read: u64,
    pub frames_decoded: u64,
    pub frames_rejected: u64,
    pub read_timeouts: u64,
    pub handshakes_ok: u64,
    pub handshakes_failed: u64,
}

impl MetricsSnapshot {
    /// 有效行比例（百分比）
    ///
    /// 返回 0.0 到 100.0 之间的值。如果 `lines_read` 为 0，返回 0.0。
    pub fn decode_rate(&self) -> f64 {
        if self.lines_read == 0 {
            return 0.0;
        }
        (self.frames_decoded as f64 / self.lines_read as f64) * 100.0
    }
}
