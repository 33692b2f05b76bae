//! 遥测循环
//!
//! 在调用线程上运行：每次迭代等待一行（最多一个读超时），解码、记录、
//! 推送给可视化端，然后按采样间隔睡眠。
//!
//! 等待被切成若干次短读（每次最多 [`SessionState::STOP_POLL`]），每次短读
//! 单独持锁，之间检查停止标志。因此读阻塞期间的退出请求最多延迟一个短读
//! 就会被观察到，远小于一个采样间隔；未读完的半行留在串口的行缓冲里。
//!
//! 无论以何种方式离开循环（停止、串口故障、panic），可视化端都会被
//! finalize 一次，已经记录的样本全部保留。

use crate::error::DriverError;
use crate::metrics::SessionMetrics;
use crate::sample::{FrameDecoder, TelemetryRecord, TimeSeries};
use crate::sink::VisualizationSink;
use crate::state::{SessionState, StopReason};
use crate::transport::SharedTransport;
use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use thermo_protocol::decode_line;
use thermo_serial::SerialTransport;
use tracing::{debug, error, info, trace};

/// 遥测循环配置
///
/// # Example
///
/// ```
/// use thermo_driver::TelemetryConfig;
/// use std::time::Duration;
///
/// let config = TelemetryConfig {
///     sample_interval: Duration::from_millis(100),
///     ..Default::default()
/// };
/// assert!(!config.echo_status);
/// assert_eq!(config.read_slice(), Duration::from_millis(50));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// 两次读取之间的间隔
    pub sample_interval: Duration,
    /// 等待一行的总时长，超过计为一次读超时
    pub read_timeout: Duration,
    /// 每个样本输出一行状态
    pub echo_status: bool,
}

impl TelemetryConfig {
    /// 单次持锁读取的上限
    pub fn read_slice(&self) -> Duration {
        self.read_timeout.min(SessionState::STOP_POLL)
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            sample_interval: Duration::from_millis(500),
            read_timeout: thermo_serial::DEFAULT_READ_TIMEOUT,
            echo_status: false,
        }
    }
}

/// 离开作用域时 finalize 可视化端
struct FinalizeGuard<'a, S: VisualizationSink + ?Sized> {
    sink: &'a mut S,
}

impl<S: VisualizationSink + ?Sized> Drop for FinalizeGuard<'_, S> {
    fn drop(&mut self) {
        self.sink.finalize();
        debug!("Visualization sink finalized");
    }
}

/// 遥测循环
pub struct TelemetryLoop<T, D: FrameDecoder> {
    transport: SharedTransport<T>,
    state: Arc<SessionState>,
    metrics: Arc<SessionMetrics>,
    decoder: D,
    config: TelemetryConfig,
    series: TimeSeries<D::Sample>,
    status_out: Box<dyn Write + Send>,
}

impl<T: SerialTransport, D: FrameDecoder> TelemetryLoop<T, D> {
    pub fn new(
        transport: SharedTransport<T>,
        state: Arc<SessionState>,
        metrics: Arc<SessionMetrics>,
        decoder: D,
        config: TelemetryConfig,
    ) -> Self {
        Self {
            transport,
            state,
            metrics,
            decoder,
            config,
            series: TimeSeries::new(),
            status_out: Box::new(io::stdout()),
        }
    }

    /// 状态行的输出目标（默认 stdout）
    pub fn with_status_output(mut self, out: Box<dyn Write + Send>) -> Self {
        self.status_out = out;
        self
    }

    /// 运行到会话停止
    ///
    /// 串口故障时记录 `TransportFailure` 停止原因并返回错误；
    /// 两种情况下 `sink` 都已被 finalize。
    pub fn run<S: VisualizationSink + ?Sized>(&mut self, sink: &mut S) -> Result<(), DriverError> {
        let mut guard = FinalizeGuard { sink };
        let started = Instant::now();
        info!(
            "Telemetry loop started (interval {:?}, read timeout {:?})",
            self.config.sample_interval, self.config.read_timeout
        );

        if let Err(e) = self.drive(started, &mut *guard.sink) {
            error!("Telemetry read failed: {}", e);
            self.state.request_stop(StopReason::TransportFailure);
            return Err(e);
        }

        info!("Telemetry loop stopped after {} samples", self.series.len());
        Ok(())
    }

    fn drive<S: VisualizationSink + ?Sized>(&mut self, started: Instant, sink: &mut S) -> Result<(), DriverError> {
        let slice = self.config.read_slice();
        self.transport.with(|transport| Ok(transport.set_read_timeout(slice)?))?;

        while self.state.is_running() {
            if let Some(raw) = self.next_line()? {
                self.record(&raw, started, sink);
            }
            self.state.sleep_while_running(self.config.sample_interval);
        }
        Ok(())
    }

    /// 等待一行，最长 `read_timeout`
    ///
    /// 超时或会话停止时返回 `None`。
    fn next_line(&self) -> Result<Option<Vec<u8>>, DriverError> {
        let deadline = Instant::now() + self.config.read_timeout;
        while self.state.is_running() {
            if let Some(raw) = self.transport.with(|transport| Ok(transport.read_line()?))? {
                return Ok(Some(raw));
            }
            if Instant::now() >= deadline {
                self.metrics.read_timeouts.fetch_add(1, Ordering::Relaxed);
                trace!("Read timeout");
                return Ok(None);
            }
        }
        Ok(None)
    }

    fn record<S: VisualizationSink + ?Sized>(&mut self, raw: &[u8], started: Instant, sink: &mut S) {
        self.metrics.lines_read.fetch_add(1, Ordering::Relaxed);
        let line = decode_line(raw);
        if line.is_empty() {
            return;
        }

        let timestamp_s = started.elapsed().as_secs_f64();
        let Some(sample) = self.decoder.decode(&line, timestamp_s) else {
            self.metrics.frames_rejected.fetch_add(1, Ordering::Relaxed);
            debug!("Skipping non-telemetry line: {:?}", line);
            return;
        };
        self.metrics.frames_decoded.fetch_add(1, Ordering::Relaxed);

        sink.push(timestamp_s, &sample.channels());
        if self.config.echo_status {
            // 终端已关闭时无处可写
            let _ = writeln!(self.status_out, "{}", sample.status_line());
        }
        self.series.push(sample);
    }

    /// 已记录的样本
    pub fn series(&self) -> &TimeSeries<D::Sample> {
        &self.series
    }

    pub fn into_series(self) -> TimeSeries<D::Sample> {
        self.series
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::TemperatureDecoder;
    use crate::sink::{ChannelSink, NullSink, SinkEvent};
    use std::thread;
    use thermo_serial::{MockEvent, MockSerial};

    fn telemetry_loop(
        mock: &MockSerial,
    ) -> (TelemetryLoop<MockSerial, TemperatureDecoder>, Arc<SessionState>, Arc<SessionMetrics>) {
        let state = Arc::new(SessionState::default());
        let metrics = Arc::new(SessionMetrics::new());
        let telemetry = TelemetryLoop::new(
            SharedTransport::new(mock.clone()),
            state.clone(),
            metrics.clone(),
            TemperatureDecoder,
            TelemetryConfig {
                sample_interval: Duration::from_millis(5),
                read_timeout: Duration::from_millis(20),
                echo_status: false,
            },
        );
        (telemetry, state, metrics)
    }

    #[test]
    fn test_records_and_skips_lines() {
        let mock = MockSerial::new();
        mock.push_line(b">> Ajuste de punto medio activado\r");
        mock.push_line(b"Temp:24C | PM:26 | Calefactor ON\r");
        mock.push_line(b"\r");
        mock.push_line(b"mp:2");
        mock.push_line(b"Temp:29C | PM:26 | Ventilador BAJO\r");

        let (mut telemetry, state, metrics) = telemetry_loop(&mock);
        let stopper = state.clone();
        let pending = mock.clone();
        let handle = thread::spawn(move || {
            while pending.pending_lines() > 0 {
                thread::sleep(Duration::from_millis(5));
            }
            thread::sleep(Duration::from_millis(20));
            stopper.request_stop(StopReason::Quit);
        });

        let (mut sink, rx) = ChannelSink::new(16);
        telemetry.run(&mut sink).unwrap();
        handle.join().unwrap();

        let series = telemetry.into_series();
        assert_eq!(series.len(), 2);
        assert_eq!(series.as_slice()[0].duty, 0);
        assert_eq!(series.as_slice()[1].duty, 85);
        assert!(series.as_slice()[0].timestamp_s <= series.as_slice()[1].timestamp_s);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.lines_read, 5);
        assert_eq!(snapshot.frames_decoded, 2);
        assert_eq!(snapshot.frames_rejected, 2);

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 3);
        assert_eq!(events.last(), Some(&SinkEvent::Finalized));
    }

    #[test]
    fn test_transport_failure_stops_session() {
        let mock = MockSerial::new();
        mock.push_line(b"Temp:24C | PM:26 | Calefactor ON");
        let (mut telemetry, state, _) = telemetry_loop(&mock);
        let failing = mock.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            failing.disconnect();
        });

        let (mut sink, rx) = ChannelSink::new(16);
        let err = telemetry.run(&mut sink).unwrap_err();
        handle.join().unwrap();

        assert!(err.is_fatal());
        assert_eq!(state.stop_reason(), Some(StopReason::TransportFailure));
        assert_eq!(telemetry.series().len(), 1);
        assert_eq!(rx.try_iter().last(), Some(SinkEvent::Finalized));
    }

    #[test]
    fn test_wait_spans_several_short_reads() {
        let mock = MockSerial::new();
        mock.push_line_after(b"Temp:31C | PM:26 | Ventilador ALTO", Duration::from_millis(150));
        let state = Arc::new(SessionState::default());
        let metrics = Arc::new(SessionMetrics::new());
        let mut telemetry = TelemetryLoop::new(
            SharedTransport::new(mock.clone()),
            state.clone(),
            metrics.clone(),
            TemperatureDecoder,
            TelemetryConfig {
                sample_interval: Duration::from_millis(5),
                read_timeout: Duration::from_millis(400),
                echo_status: false,
            },
        );
        let stopper = state.clone();
        let pending = mock.clone();
        let handle = thread::spawn(move || {
            while pending.pending_lines() > 0 {
                thread::sleep(Duration::from_millis(5));
            }
            stopper.request_stop(StopReason::Quit);
        });

        telemetry.run(&mut NullSink).unwrap();
        handle.join().unwrap();

        assert_eq!(telemetry.series().len(), 1);
        assert_eq!(telemetry.series().as_slice()[0].duty, 255);
        assert_eq!(metrics.snapshot().read_timeouts, 0);
        // 每次短读都单独超时
        let slices = mock
            .events()
            .iter()
            .filter(|e| **e == MockEvent::ReadTimeout)
            .count();
        assert!(slices >= 2, "{} short reads", slices);
    }

    #[test]
    fn test_read_slice_bounded_by_stop_poll() {
        let config = TelemetryConfig::default();
        assert_eq!(config.read_slice(), SessionState::STOP_POLL);
        let short = TelemetryConfig {
            read_timeout: Duration::from_millis(10),
            ..config
        };
        assert_eq!(short.read_slice(), Duration::from_millis(10));
    }

    #[test]
    fn test_already_stopped_session_finalizes_immediately() {
        let mock = MockSerial::new();
        mock.push_line(b"Temp:24C | PM:26 | Calefactor ON");
        let (mut telemetry, state, _) = telemetry_loop(&mock);
        state.request_stop(StopReason::Interrupted);

        let (mut sink, rx) = ChannelSink::new(4);
        telemetry.run(&mut sink).unwrap();
        assert!(telemetry.series().is_empty());
        assert_eq!(mock.pending_lines(), 1);
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![SinkEvent::Finalized]);
    }
}
