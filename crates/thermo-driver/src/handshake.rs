//! 设定点握手
//!
//! ```text
//! Idle → RequestSent → AwaitingPrompt ─┬→ ValueSent → Done
//!                                      └→ TimedOut
//! ```
//!
//! 1. 清空未读输入，写入单字节 `x`，等待板子进入配置模式
//! 2. 按 `poll_interval` 轮询已到达的字节，直到出现提示符或超时
//!    （超时从写入 `x` 的时刻算起）
//! 3. 看到提示符：写入 `<数值>\r`，等待板子处理后返回成功
//! 4. 超时：返回 `HandshakeTimeout`，数值不会被发送
//!
//! [`HandshakeController`] 在整个交换期间持有串口锁，遥测循环不会在中间读走提示符。

use crate::error::DriverError;
use crate::metrics::SessionMetrics;
use crate::state::SessionState;
use crate::transport::SharedTransport;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};
use thermo_protocol::{CONFIG_REQUEST, PROMPT_MARKER, Setpoint, contains_prompt, encode_setpoint};
use thermo_serial::SerialTransport;
use tracing::{info, trace, warn};

/// 握手参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeConfig {
    /// 写入 `x` 之后的等待
    pub request_settle: Duration,
    /// 等待提示符的期限（从写入 `x` 起算）
    pub prompt_timeout: Duration,
    /// 轮询间隔
    pub poll_interval: Duration,
    /// 写入数值之后的等待
    pub value_settle: Duration,
    /// 提示符
    pub marker: Vec<u8>,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            request_settle: Duration::from_millis(300),
            prompt_timeout: Duration::from_secs(2),
            poll_interval: Duration::from_millis(50),
            value_settle: Duration::from_millis(500),
            marker: PROMPT_MARKER.to_vec(),
        }
    }
}

/// 握手阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakePhase {
    Idle,
    RequestSent,
    AwaitingPrompt,
    ValueSent,
    Done,
    TimedOut,
}

impl HandshakePhase {
    fn advance(&mut self, next: HandshakePhase) {
        trace!("Handshake phase: {:?} -> {:?}", self, next);
        *self = next;
    }
}

/// 一次成功握手的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeReport {
    pub value: Setpoint,
    /// 从写入 `x` 到看到提示符的时间
    pub prompt_latency: Duration,
    /// 等待提示符期间收到的字节数
    pub bytes_received: usize,
}

/// 握手过程本身（不涉及锁和会话状态）
#[derive(Debug, Clone, Default)]
pub struct SetpointHandshake {
    config: HandshakeConfig,
}

impl SetpointHandshake {
    pub fn new(config: HandshakeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HandshakeConfig {
        &self.config
    }

    /// 在已经独占的串口上执行一次握手
    pub fn execute<T: SerialTransport + ?Sized>(
        &self,
        transport: &mut T,
        value: Setpoint,
    ) -> Result<HandshakeReport, DriverError> {
        let mut phase = HandshakePhase::Idle;

        transport.clear_input()?;
        transport.write_all(&[CONFIG_REQUEST])?;
        let requested_at = Instant::now();
        let deadline = requested_at + self.config.prompt_timeout;
        phase.advance(HandshakePhase::RequestSent);

        thread::sleep(self.config.request_settle);
        phase.advance(HandshakePhase::AwaitingPrompt);

        let mut received = Vec::new();
        let prompt_latency = loop {
            received.extend(transport.read_available()?);
            if contains_prompt(&received, &self.config.marker) {
                break requested_at.elapsed();
            }
            let now = Instant::now();
            if now >= deadline {
                phase.advance(HandshakePhase::TimedOut);
                return Err(DriverError::HandshakeTimeout(self.config.prompt_timeout));
            }
            thread::sleep(self.config.poll_interval.min(deadline - now));
        };

        transport.write_all(&encode_setpoint(value))?;
        phase.advance(HandshakePhase::ValueSent);
        thread::sleep(self.config.value_settle);
        phase.advance(HandshakePhase::Done);

        Ok(HandshakeReport {
            value,
            prompt_latency,
            bytes_received: received.len(),
        })
    }
}

/// 握手控制器
///
/// 持有共享串口和会话状态：握手成功才更新设定点，失败时状态不变。
pub struct HandshakeController<T> {
    transport: SharedTransport<T>,
    state: Arc<SessionState>,
    metrics: Arc<SessionMetrics>,
    handshake: SetpointHandshake,
}

impl<T: SerialTransport> HandshakeController<T> {
    pub fn new(
        transport: SharedTransport<T>,
        state: Arc<SessionState>,
        metrics: Arc<SessionMetrics>,
        config: HandshakeConfig,
    ) -> Self {
        Self {
            transport,
            state,
            metrics,
            handshake: SetpointHandshake::new(config),
        }
    }

    pub fn state(&self) -> &Arc<SessionState> {
        &self.state
    }

    /// 更新设定点
    ///
    /// 阻塞到握手结束（成功时约为两次等待加提示延迟，失败时不超过超时加一次等待）。
    pub fn update_setpoint(&self, value: Setpoint) -> Result<HandshakeReport, DriverError> {
        let result = self.transport.with(|transport| self.handshake.execute(transport, value));
        match &result {
            Ok(report) => {
                self.state.set_setpoint(value);
                self.metrics.handshakes_ok.fetch_add(1, Ordering::Relaxed);
                info!(
                    "Setpoint updated to {} (prompt after {:?}, {} bytes)",
                    value, report.prompt_latency, report.bytes_received
                );
            },
            Err(DriverError::HandshakeTimeout(timeout)) => {
                self.metrics.handshakes_failed.fetch_add(1, Ordering::Relaxed);
                warn!("Handshake timed out after {:?}, setpoint stays {}", timeout, self.state.setpoint());
            },
            Err(e) => {
                self.metrics.handshakes_failed.fetch_add(1, Ordering::Relaxed);
                warn!("Handshake failed: {}", e);
            },
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thermo_serial::{MockEvent, MockSerial};

    fn fast_config() -> HandshakeConfig {
        HandshakeConfig {
            request_settle: Duration::from_millis(10),
            prompt_timeout: Duration::from_millis(150),
            poll_interval: Duration::from_millis(5),
            value_settle: Duration::from_millis(10),
            ..HandshakeConfig::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = HandshakeConfig::default();
        assert_eq!(config.request_settle, Duration::from_millis(300));
        assert_eq!(config.prompt_timeout, Duration::from_secs(2));
        assert_eq!(config.poll_interval, Duration::from_millis(50));
        assert_eq!(config.value_settle, Duration::from_millis(500));
        assert_eq!(config.marker, b"Ingrese nuevo valor".to_vec());
    }

    #[test]
    fn test_execute_sends_value_after_prompt() {
        let mut mock = MockSerial::new().with_prompt_reply(
            b"\r\n>> Ajuste de punto medio activado\r\nIngrese nuevo valor (10-50): ",
            Duration::from_millis(20),
        );
        let report = SetpointHandshake::new(fast_config())
            .execute(&mut mock, Setpoint::new(30).unwrap())
            .unwrap();

        assert_eq!(report.value.get(), 30);
        assert!(report.bytes_received > 0);
        assert_eq!(mock.writes(), vec![b"x".to_vec(), b"30\r".to_vec()]);
        assert_eq!(mock.events().first(), Some(&MockEvent::ClearInput));
    }

    #[test]
    fn test_execute_times_out_without_sending_value() {
        let mut mock = MockSerial::new();
        let config = fast_config();
        let start = Instant::now();
        let err = SetpointHandshake::new(config.clone())
            .execute(&mut mock, Setpoint::new(30).unwrap())
            .unwrap_err();

        assert!(matches!(err, DriverError::HandshakeTimeout(t) if t == config.prompt_timeout));
        assert!(start.elapsed() >= config.prompt_timeout);
        assert_eq!(mock.writes(), vec![b"x".to_vec()]);
    }

    #[test]
    fn test_stale_prompt_is_cleared_first() {
        let mut mock = MockSerial::new();
        mock.push_raw(b"Ingrese nuevo valor");
        let result =
            SetpointHandshake::new(fast_config()).execute(&mut mock, Setpoint::new(30).unwrap());
        assert!(matches!(result, Err(DriverError::HandshakeTimeout(_))));
    }

    #[test]
    fn test_controller_updates_state_only_on_success() {
        let mock = MockSerial::new();
        let state = Arc::new(SessionState::default());
        let metrics = Arc::new(SessionMetrics::new());
        let controller = HandshakeController::new(
            SharedTransport::new(mock.clone()),
            state.clone(),
            metrics.clone(),
            fast_config(),
        );

        assert!(controller.update_setpoint(Setpoint::new(40).unwrap()).is_err());
        assert_eq!(state.setpoint(), Setpoint::DEFAULT);

        let ok = HandshakeController::new(
            SharedTransport::new(
                MockSerial::new().with_prompt_reply(b"Ingrese nuevo valor", Duration::ZERO),
            ),
            state.clone(),
            metrics.clone(),
            fast_config(),
        );
        ok.update_setpoint(Setpoint::new(40).unwrap()).unwrap();
        assert_eq!(state.setpoint().get(), 40);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.handshakes_ok, 1);
        assert_eq!(snapshot.handshakes_failed, 1);
    }

    #[test]
    fn test_controller_after_release() {
        let shared = SharedTransport::new(MockSerial::new());
        let state = Arc::new(SessionState::default());
        let controller = HandshakeController::new(
            shared.clone(),
            state.clone(),
            Arc::new(SessionMetrics::new()),
            fast_config(),
        );
        shared.release();
        assert!(matches!(
            controller.update_setpoint(Setpoint::new(20).unwrap()),
            Err(DriverError::TransportClosed)
        ));
        assert_eq!(state.setpoint(), Setpoint::DEFAULT);
    }
}
