//! 会话 API
//!
//! 提供对外的 `Session` 结构体：把共享状态、共享串口、控制台线程和遥测循环
//! 组装在一起。遥测循环在调用 [`Session::run`] 的线程上运行，控制台在
//! 独立线程上运行，两者只通过 [`SessionState`] 和串口锁交互。

use crate::console::{CommandConsole, ConsoleExit, LineSource};
use crate::error::DriverError;
use crate::handshake::{HandshakeConfig, HandshakeController};
use crate::metrics::{MetricsSnapshot, SessionMetrics};
use crate::sample::{FrameDecoder, TimeSeries};
use crate::sink::VisualizationSink;
use crate::state::{SessionState, StopReason};
use crate::telemetry::{TelemetryConfig, TelemetryLoop};
use crate::transport::SharedTransport;
use crossbeam_channel::{RecvTimeoutError, bounded};
use std::io::Write;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thermo_protocol::Setpoint;
use thermo_serial::SerialTransport;
use tracing::{debug, info, warn};

/// 会话结束时等待控制台线程的时间
///
/// 控制台可能阻塞在终端输入上，超时后不再等待（进程退出时回收）。
const CONSOLE_JOIN_TIMEOUT: Duration = Duration::from_millis(200);

/// Extension trait for timeout-capable thread joins
trait JoinTimeout<T> {
    /// 超时返回 `None`（线程继续运行，由看门狗线程负责最终 join）
    fn join_timeout(self, timeout: Duration) -> Option<thread::Result<T>>;
}

impl<T: Send + 'static> JoinTimeout<T> for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> Option<thread::Result<T>> {
        if self.is_finished() {
            return Some(self.join());
        }
        let (tx, rx) = bounded(1);
        thread::spawn(move || {
            // 接收端可能已经超时
            let _ = tx.send(self.join());
        });
        match rx.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

/// 停止句柄（给 Ctrl+C 处理器等外部代码使用）
#[derive(Debug, Clone)]
pub struct StopHandle {
    state: Arc<SessionState>,
}

impl StopHandle {
    /// 请求停止，只有第一次请求生效
    pub fn request_stop(&self, reason: StopReason) -> bool {
        self.state.request_stop(reason)
    }

    /// 中断信号
    pub fn interrupt(&self) -> bool {
        self.request_stop(StopReason::Interrupted)
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }
}

/// 会话结果
#[derive(Debug)]
pub struct SessionReport<S> {
    /// 全部已记录的样本
    pub series: TimeSeries<S>,
    /// 停止原因
    pub stop_reason: Option<StopReason>,
    /// 结束遥测循环的错误（串口故障）
    pub error: Option<DriverError>,
    /// 控制台退出方式（未启动控制台或仍阻塞在输入上时为 `None`）
    pub console_exit: Option<ConsoleExit>,
    pub metrics: MetricsSnapshot,
    /// 会话结束时的设定点
    pub final_setpoint: Setpoint,
}

/// 遥测会话
pub struct Session<T> {
    transport: SharedTransport<T>,
    state: Arc<SessionState>,
    metrics: Arc<SessionMetrics>,
    telemetry: TelemetryConfig,
    handshake: HandshakeConfig,
    console: Option<JoinHandle<Result<ConsoleExit, DriverError>>>,
    status_out: Option<Box<dyn Write + Send>>,
}

impl<T: SerialTransport> Session<T> {
    /// 创建会话（通常通过 [`SessionBuilder`](crate::SessionBuilder)）
    pub fn new(
        transport: T,
        initial_setpoint: Setpoint,
        telemetry: TelemetryConfig,
        handshake: HandshakeConfig,
    ) -> Self {
        Self {
            transport: SharedTransport::new(transport),
            state: Arc::new(SessionState::new(initial_setpoint)),
            metrics: Arc::new(SessionMetrics::new()),
            telemetry,
            handshake,
            console: None,
            status_out: None,
        }
    }

    /// 状态行改写到 `out`（默认 stdout）
    ///
    /// 行编辑器占用终端时，状态行需要经由编辑器输出才不会打乱提示符。
    pub fn set_status_output<W: Write + Send + 'static>(&mut self, out: W) {
        self.status_out = Some(Box::new(out));
    }

    pub fn state(&self) -> &Arc<SessionState> {
        &self.state
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            state: self.state.clone(),
        }
    }

    /// 共享同一串口和状态的握手控制器
    pub fn handshake_controller(&self) -> HandshakeController<T> {
        HandshakeController::new(
            self.transport.clone(),
            self.state.clone(),
            self.metrics.clone(),
            self.handshake.clone(),
        )
    }

    /// 运行遥测循环直到会话停止，然后释放串口
    ///
    /// 总是返回报告：串口故障记录在 `error` 中，已记录的样本不会丢失。
    pub fn run<D, S>(mut self, decoder: D, sink: &mut S) -> SessionReport<D::Sample>
    where
        D: FrameDecoder,
        S: VisualizationSink + ?Sized,
    {
        info!("Session started with setpoint {}", self.state.setpoint());
        let mut telemetry = TelemetryLoop::new(
            self.transport.clone(),
            self.state.clone(),
            self.metrics.clone(),
            decoder,
            self.telemetry.clone(),
        );
        if let Some(out) = self.status_out.take() {
            telemetry = telemetry.with_status_output(out);
        }
        let error = telemetry.run(sink).err();

        if self.transport.release().is_some() {
            info!("Serial port released");
        }
        let console_exit = self.join_console();

        let report = SessionReport {
            series: telemetry.into_series(),
            stop_reason: self.state.stop_reason(),
            error,
            console_exit,
            metrics: self.metrics.snapshot(),
            final_setpoint: self.state.setpoint(),
        };
        info!(
            "Session finished: {:?}, {} samples",
            report.stop_reason,
            report.series.len()
        );
        report
    }

    fn join_console(&mut self) -> Option<ConsoleExit> {
        let handle = self.console.take()?;
        match handle.join_timeout(CONSOLE_JOIN_TIMEOUT) {
            Some(Ok(Ok(exit))) => Some(exit),
            Some(Ok(Err(e))) => {
                warn!("Console failed: {}", e);
                None
            },
            Some(Err(_)) => {
                warn!("Console thread panicked");
                None
            },
            None => {
                debug!("Console still waiting for input, detaching");
                None
            },
        }
    }
}

impl<T: SerialTransport + Send + 'static> Session<T> {
    /// 启动控制台线程
    ///
    /// 每个会话只能启动一个控制台（保证同一时间最多一个握手）。
    pub fn spawn_console<L, W>(&mut self, source: L, out: W) -> Result<(), DriverError>
    where
        L: LineSource + Send + 'static,
        W: Write + Send + 'static,
    {
        if self.console.is_some() {
            return Err(DriverError::InvalidConfig("console already running".into()));
        }
        let console = CommandConsole::new(self.handshake_controller(), source, out);
        self.console = Some(console.spawn()?);
        Ok(())
    }
}

impl<T> Drop for Session<T> {
    fn drop(&mut self) {
        // `run` 已经释放过时为 None
        if self.transport.release().is_some() {
            debug!("Serial port released on drop");
        }
    }
}
