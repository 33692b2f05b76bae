//! Builder 模式实现
//!
//! 提供链式构造 `Session` 实例的便捷方式。

use crate::error::DriverError;
use crate::handshake::HandshakeConfig;
use crate::session::Session;
use crate::telemetry::TelemetryConfig;
use std::thread;
use std::time::Duration;
use thermo_protocol::Setpoint;
use thermo_serial::{DEFAULT_BAUD_RATE, SerialPortAdapter, SerialTransport};
use tracing::info;

/// 打开串口后等待板子复位的时间
pub const DEFAULT_STARTUP_DELAY: Duration = Duration::from_secs(2);

/// Session Builder（链式构造）
///
/// # Example
///
/// ```no_run
/// use thermo_driver::SessionBuilder;
/// use std::time::Duration;
///
/// let session = SessionBuilder::new()
///     .port("/dev/ttyUSB0")
///     .sample_interval(Duration::from_millis(500))
///     .open()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct SessionBuilder {
    /// 串口路径（`COM5`、`/dev/ttyUSB0` 等）
    port: Option<String>,
    baud_rate: u32,
    startup_delay: Duration,
    initial_setpoint: Setpoint,
    telemetry: TelemetryConfig,
    handshake: HandshakeConfig,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            startup_delay: DEFAULT_STARTUP_DELAY,
            initial_setpoint: Setpoint::DEFAULT,
            telemetry: TelemetryConfig::default(),
            handshake: HandshakeConfig::default(),
        }
    }

    pub fn port(mut self, port: impl Into<String>) -> Self {
        self.port = Some(port.into());
        self
    }

    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// 等待一行的总时长（串口上每次只阻塞一个短读）
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.telemetry.read_timeout = timeout;
        self
    }

    /// 打开串口后的等待（只对 [`open`](Self::open) 生效）
    pub fn startup_delay(mut self, delay: Duration) -> Self {
        self.startup_delay = delay;
        self
    }

    /// 会话开始时假定的设定点（板子上电默认值）
    pub fn initial_setpoint(mut self, setpoint: Setpoint) -> Self {
        self.initial_setpoint = setpoint;
        self
    }

    pub fn sample_interval(mut self, interval: Duration) -> Self {
        self.telemetry.sample_interval = interval;
        self
    }

    pub fn echo_status(mut self, echo: bool) -> Self {
        self.telemetry.echo_status = echo;
        self
    }

    /// 整体替换遥测配置（包括读超时）
    pub fn telemetry_config(mut self, config: TelemetryConfig) -> Self {
        self.telemetry = config;
        self
    }

    pub fn handshake_config(mut self, config: HandshakeConfig) -> Self {
        self.handshake = config;
        self
    }

    fn validate(&self) -> Result<(), DriverError> {
        if self.telemetry.read_timeout.is_zero() {
            return Err(DriverError::InvalidConfig("read timeout must be positive".into()));
        }
        if self.handshake.poll_interval.is_zero() {
            return Err(DriverError::InvalidConfig("handshake poll interval must be positive".into()));
        }
        Ok(())
    }

    /// 打开串口并等待板子复位
    pub fn open(self) -> Result<Session<SerialPortAdapter>, DriverError> {
        let port = self
            .port
            .clone()
            .ok_or_else(|| DriverError::InvalidConfig("no serial port given".into()))?;
        if self.baud_rate == 0 {
            return Err(DriverError::InvalidConfig("baud rate must be positive".into()));
        }
        self.validate()?;

        let adapter = SerialPortAdapter::open(&port, self.baud_rate, self.telemetry.read_slice())?;
        info!("Opened {} at {} baud", port, self.baud_rate);
        if !self.startup_delay.is_zero() {
            info!("Waiting {:?} for the board to reset", self.startup_delay);
            thread::sleep(self.startup_delay);
        }
        self.with_transport(adapter)
    }

    /// 使用已经打开的串口（Mock 或自定义实现），不等待复位
    pub fn with_transport<T: SerialTransport>(self, mut transport: T) -> Result<Session<T>, DriverError> {
        self.validate()?;
        transport.set_read_timeout(self.telemetry.read_slice())?;
        Ok(Session::new(
            transport,
            self.initial_setpoint,
            self.telemetry,
            self.handshake,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thermo_serial::MockSerial;

    #[test]
    fn test_builder_defaults() {
        let builder = SessionBuilder::new();
        assert_eq!(builder.baud_rate, 9600);
        assert_eq!(builder.telemetry.read_timeout, Duration::from_secs(1));
        assert_eq!(builder.startup_delay, Duration::from_secs(2));
        assert_eq!(builder.initial_setpoint, Setpoint::DEFAULT);
        assert_eq!(builder.telemetry.sample_interval, Duration::from_millis(500));
    }

    #[test]
    fn test_builder_chain() {
        let builder = SessionBuilder::new()
            .port("COM5")
            .baud_rate(19200)
            .sample_interval(Duration::from_millis(100))
            .initial_setpoint(Setpoint::new(30).unwrap())
            .echo_status(true);
        assert_eq!(builder.port.as_deref(), Some("COM5"));
        assert_eq!(builder.baud_rate, 19200);
        assert_eq!(builder.telemetry.sample_interval, Duration::from_millis(100));
        assert!(builder.telemetry.echo_status);
    }

    #[test]
    fn test_open_without_port() {
        let err = SessionBuilder::new().open().err().unwrap();
        assert!(matches!(err, DriverError::InvalidConfig(_)));
    }

    #[test]
    fn test_rejects_zero_read_timeout() {
        let result = SessionBuilder::new()
            .read_timeout(Duration::ZERO)
            .with_transport(MockSerial::new());
        assert!(matches!(result, Err(DriverError::InvalidConfig(_))));
    }

    #[test]
    fn test_with_transport_uses_initial_setpoint() {
        let session = SessionBuilder::new()
            .initial_setpoint(Setpoint::new(42).unwrap())
            .with_transport(MockSerial::new())
            .unwrap();
        assert_eq!(session.state().setpoint().get(), 42);
        assert!(session.state().is_running());
    }
}
