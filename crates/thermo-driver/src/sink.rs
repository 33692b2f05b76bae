//! 可视化输出端（Visualization Sink）
//!
//! 遥测循环每记录一个样本就调用一次 `push`，会话结束时调用一次 `finalize`。
//!
//! # 性能要求
//!
//! `push` 在遥测线程上执行，不能阻塞（否则会拖慢采样节奏）。
//! 需要重活的实现应该像 [`ChannelSink`] 一样把数据转发给别的线程。
//!
//! # 使用示例
//!
//! ```rust
//! use thermo_driver::sink::{ChannelSink, SinkEvent, VisualizationSink};
//! use thermo_driver::Channel;
//!
//! let (mut sink, rx) = ChannelSink::new(16);
//! sink.push(0.5, &[Channel::new("temperature", 26.0)]);
//! sink.finalize();
//!
//! assert!(matches!(rx.recv().unwrap(), SinkEvent::Point { .. }));
//! assert_eq!(rx.recv().unwrap(), SinkEvent::Finalized);
//! ```

use crate::sample::Channel;
use crossbeam_channel::{Receiver, SendTimeoutError, Sender, TrySendError, bounded};
use smallvec::SmallVec;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::warn;

/// 可视化输出端
pub trait VisualizationSink: Send {
    /// 推送一个数据点
    fn push(&mut self, timestamp_s: f64, channels: &[Channel]);

    /// 会话结束（保证只调用一次）
    fn finalize(&mut self);
}

impl<T: VisualizationSink + ?Sized> VisualizationSink for Box<T> {
    fn push(&mut self, timestamp_s: f64, channels: &[Channel]) {
        (**self).push(timestamp_s, channels)
    }

    fn finalize(&mut self) {
        (**self).finalize()
    }
}

/// 丢弃所有数据
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl VisualizationSink for NullSink {
    fn push(&mut self, _timestamp_s: f64, _channels: &[Channel]) {}

    fn finalize(&mut self) {}
}

/// 转发给接收端的事件
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Point {
        timestamp_s: f64,
        channels: SmallVec<[Channel; 4]>,
    },
    Finalized,
}

/// Channel 输出端（Bounded Queue）
///
/// 队列满时丢弃数据点而不是阻塞遥测循环，丢弃数量可通过
/// [`ChannelSink::dropped`] 监控。`Finalized` 事件在队列满时最多等待
/// [`ChannelSink::FINALIZE_TIMEOUT`]，仍然投递失败也计入丢弃数。
#[derive(Debug)]
pub struct ChannelSink {
    tx: Sender<SinkEvent>,
    dropped: Arc<AtomicU64>,
}

impl ChannelSink {
    /// 投递 `Finalized` 的最长等待
    pub const FINALIZE_TIMEOUT: Duration = Duration::from_millis(500);

    /// 创建输出端和对应的接收端
    #[must_use]
    pub fn new(capacity: usize) -> (Self, Receiver<SinkEvent>) {
        let (tx, rx) = bounded(capacity.max(1));
        let sink = Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (sink, rx)
    }

    /// 丢弃计数器
    pub fn dropped(&self) -> &Arc<AtomicU64> {
        &self.dropped
    }
}

impl VisualizationSink for ChannelSink {
    fn push(&mut self, timestamp_s: f64, channels: &[Channel]) {
        let event = SinkEvent::Point {
            timestamp_s,
            channels: SmallVec::from_slice(channels),
        };
        if let Err(TrySendError::Full(_)) = self.tx.try_send(event) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn finalize(&mut self) {
        match self.tx.send_timeout(SinkEvent::Finalized, Self::FINALIZE_TIMEOUT) {
            Ok(()) => {},
            Err(SendTimeoutError::Timeout(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("Sink queue full, end-of-session event dropped");
            },
            // 接收端已经关闭
            Err(SendTimeoutError::Disconnected(_)) => {},
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_sink_forwards_points() {
        let (mut sink, rx) = ChannelSink::new(4);
        sink.push(1.0, &[Channel::new("a", 1.0), Channel::new("b", 2.0)]);
        match rx.try_recv().unwrap() {
            SinkEvent::Point {
                timestamp_s,
                channels,
            } => {
                assert_eq!(timestamp_s, 1.0);
                assert_eq!(channels.len(), 2);
                assert_eq!(channels[1].name, "b");
            },
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_channel_sink_drops_when_full() {
        let (mut sink, rx) = ChannelSink::new(1);
        let dropped = sink.dropped().clone();
        sink.push(0.0, &[Channel::new("a", 0.0)]);
        sink.push(0.5, &[Channel::new("a", 1.0)]);
        sink.push(1.0, &[Channel::new("a", 2.0)]);
        assert_eq!(dropped.load(Ordering::Relaxed), 2);
        assert_eq!(rx.len(), 1);
    }

    #[test]
    fn test_finalize_after_receiver_dropped() {
        let (mut sink, rx) = ChannelSink::new(1);
        drop(rx);
        sink.push(0.0, &[]);
        sink.finalize();
        assert_eq!(sink.dropped().load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_finalize_waits_for_slow_consumer() {
        let (mut sink, rx) = ChannelSink::new(1);
        sink.push(0.0, &[Channel::new("a", 0.0)]);
        let consumer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            rx.iter().collect::<Vec<_>>()
        });
        sink.finalize();
        drop(sink);

        let events = consumer.join().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events.last(), Some(&SinkEvent::Finalized));
    }

    #[test]
    fn test_finalize_on_stuck_queue_is_counted() {
        let (mut sink, rx) = ChannelSink::new(1);
        sink.push(0.0, &[Channel::new("a", 0.0)]);
        sink.finalize();
        assert_eq!(sink.dropped().load(Ordering::Relaxed), 1);
        assert_eq!(rx.len(), 1);
        assert!(matches!(rx.try_recv().unwrap(), SinkEvent::Point { .. }));
    }

    #[test]
    fn test_boxed_sink() {
        let (sink, rx) = ChannelSink::new(4);
        let mut boxed: Box<dyn VisualizationSink> = Box::new(sink);
        boxed.push(0.0, &[]);
        boxed.finalize();
        assert_eq!(rx.len(), 2);
    }
}
