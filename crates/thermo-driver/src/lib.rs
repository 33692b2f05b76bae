//! 驱动层模块
//!
//! 本模块提供温控板遥测会话的驱动功能，包括：
//! - 遥测循环（按行读取、解码、记录、推送可视化）
//! - 设定点握手（持串口锁完成 `x` → 提示符 → 数值 的交换）
//! - 命令控制台（独立线程）
//! - 共享会话状态（原子量，单次停止转换）
//!
//! # 使用示例
//!
//! ```no_run
//! use thermo_driver::{BufReadSource, NullSink, SessionBuilder, TemperatureDecoder};
//! use std::io;
//!
//! let mut session = SessionBuilder::new().port("/dev/ttyUSB0").echo_status(true).open()?;
//! session.spawn_console(BufReadSource::new(io::BufReader::new(io::stdin())), io::stdout())?;
//! let report = session.run(TemperatureDecoder, &mut NullSink);
//! println!("{} samples", report.series.len());
//! # Ok::<(), thermo_driver::DriverError>(())
//! ```

mod builder;
pub mod console;
mod error;
pub mod handshake;
pub mod metrics;
pub mod sample;
mod session;
pub mod sink;
pub mod state;
pub mod telemetry;
mod transport;

pub use builder::{DEFAULT_STARTUP_DELAY, SessionBuilder};
pub use console::{BufReadSource, CommandConsole, ConsoleCommand, ConsoleExit, ConsoleInput, LineSource};
pub use error::DriverError;
pub use handshake::{HandshakeConfig, HandshakeController, HandshakePhase, HandshakeReport, SetpointHandshake};
pub use metrics::{MetricsSnapshot, SessionMetrics};
pub use sample::{
    Channel, Channels, FrameDecoder, MotorDecoder, MotorSample, TelemetryRecord, TelemetrySample,
    TemperatureDecoder, TimeSeries,
};
pub use session::{Session, SessionReport, StopHandle};
pub use sink::{ChannelSink, NullSink, SinkEvent, VisualizationSink};
pub use state::{SessionState, StopReason};
pub use telemetry::{TelemetryConfig, TelemetryLoop};
pub use transport::SharedTransport;
