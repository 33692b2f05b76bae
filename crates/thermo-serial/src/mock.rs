//! Mock 串口（无硬件）
//!
//! 脚本化的输入行 + 可选的配置模式提示回复，记录所有访问事件，
//! 用于测试遥测循环、握手以及两者的互斥关系。
//!
//! `MockSerial` 是一个可克隆的句柄：一份交给被测代码，另一份留在测试里
//! 继续追加输入、注入故障、检查事件。

use crate::{SerialError, SerialTransport};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use thermo_protocol::CONFIG_REQUEST;

/// Mock 访问事件（按发生顺序记录）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    /// `read_line()` 返回了一行
    LineRead(Vec<u8>),
    /// `read_line()` 超时
    ReadTimeout,
    /// `read_available()` 返回的字节
    Available(Vec<u8>),
    /// `write_all()` 写入的字节
    Write(Vec<u8>),
    /// `clear_input()`
    ClearInput,
}

#[derive(Debug)]
struct Scheduled {
    ready_at: Instant,
    bytes: Vec<u8>,
}

#[derive(Debug, Default)]
struct MockState {
    lines: VecDeque<Scheduled>,
    raw: VecDeque<Scheduled>,
    prompt_reply: Option<(Vec<u8>, Duration)>,
    disconnected: bool,
    events: Vec<(Instant, MockEvent)>,
}

impl MockState {
    fn record(&mut self, event: MockEvent) {
        self.events.push((Instant::now(), event));
    }
}

/// Mock 串口
#[derive(Debug, Clone)]
pub struct MockSerial {
    state: Arc<Mutex<MockState>>,
    read_timeout: Duration,
}

impl Default for MockSerial {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSerial {
    /// 默认读超时（比真实串口短，测试跑得快）
    pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(20);

    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            read_timeout: Self::DEFAULT_READ_TIMEOUT,
        }
    }

    /// 设置读超时
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// 板子收到 `x` 后经过 `delay` 回复 `reply`（配置模式提示）
    pub fn with_prompt_reply(self, reply: &[u8], delay: Duration) -> Self {
        self.state.lock().prompt_reply = Some((reply.to_vec(), delay));
        self
    }

    /// 追加一行，立即可读
    pub fn push_line(&self, line: &[u8]) {
        self.push_line_after(line, Duration::ZERO);
    }

    /// 追加一行，从现在起 `delay` 之后才可读
    pub fn push_line_after(&self, line: &[u8], delay: Duration) {
        self.state.lock().lines.push_back(Scheduled {
            ready_at: Instant::now() + delay,
            bytes: line.to_vec(),
        });
    }

    /// 追加原始字节（只对 `read_available()` 可见）
    pub fn push_raw(&self, bytes: &[u8]) {
        self.state.lock().raw.push_back(Scheduled {
            ready_at: Instant::now(),
            bytes: bytes.to_vec(),
        });
    }

    /// 模拟拔线：之后所有读写都返回 `Disconnected`
    pub fn disconnect(&self) {
        self.state.lock().disconnected = true;
    }

    /// 所有事件（按时间顺序）
    pub fn events(&self) -> Vec<MockEvent> {
        self.state.lock().events.iter().map(|(_, e)| e.clone()).collect()
    }

    /// 带时间戳的事件
    pub fn timed_events(&self) -> Vec<(Instant, MockEvent)> {
        self.state.lock().events.clone()
    }

    /// 所有写入（按顺序）
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state
            .lock()
            .events
            .iter()
            .filter_map(|(_, e)| match e {
                MockEvent::Write(bytes) => Some(bytes.clone()),
                _ => None,
            })
            .collect()
    }

    /// 尚未被读走的行数
    pub fn pending_lines(&self) -> usize {
        self.state.lock().lines.len()
    }
}

impl SerialTransport for MockSerial {
    fn read_line(&mut self) -> Result<Option<Vec<u8>>, SerialError> {
        let deadline = Instant::now() + self.read_timeout;
        loop {
            let now = Instant::now();
            {
                let mut state = self.state.lock();
                if state.disconnected {
                    return Err(SerialError::Disconnected);
                }
                if state.lines.front().is_some_and(|line| line.ready_at <= now)
                    && let Some(line) = state.lines.pop_front()
                {
                    state.record(MockEvent::LineRead(line.bytes.clone()));
                    return Ok(Some(line.bytes));
                }
                if now >= deadline {
                    state.record(MockEvent::ReadTimeout);
                    return Ok(None);
                }
            }
            thread::sleep(Duration::from_millis(1).min(deadline - now));
        }
    }

    fn read_available(&mut self) -> Result<Vec<u8>, SerialError> {
        let now = Instant::now();
        let mut state = self.state.lock();
        if state.disconnected {
            return Err(SerialError::Disconnected);
        }
        let mut received = Vec::new();
        while state.raw.front().is_some_and(|chunk| chunk.ready_at <= now) {
            if let Some(chunk) = state.raw.pop_front() {
                received.extend_from_slice(&chunk.bytes);
            }
        }
        if !received.is_empty() {
            state.record(MockEvent::Available(received.clone()));
        }
        Ok(received)
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        let mut state = self.state.lock();
        if state.disconnected {
            return Err(SerialError::Disconnected);
        }
        state.record(MockEvent::Write(bytes.to_vec()));
        if *bytes == [CONFIG_REQUEST]
            && let Some((reply, delay)) = state.prompt_reply.clone()
        {
            state.raw.push_back(Scheduled {
                ready_at: Instant::now() + delay,
                bytes: reply,
            });
        }
        Ok(())
    }

    fn clear_input(&mut self) -> Result<(), SerialError> {
        let now = Instant::now();
        let mut state = self.state.lock();
        if state.disconnected {
            return Err(SerialError::Disconnected);
        }
        state.lines.retain(|line| line.ready_at > now);
        state.raw.retain(|chunk| chunk.ready_at > now);
        state.record(MockEvent::ClearInput);
        Ok(())
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> Result<(), SerialError> {
        self.read_timeout = timeout;
        Ok(())
    }
}
