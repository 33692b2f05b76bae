//! 遥测会话命令（`temp` / `motor`）
//!
//! 打开串口、启动控制台和遥测循环，结束后输出统计摘要。

use crate::chart::{ChartSink, DEFAULT_REDRAW_EVERY};
use crate::commands::config::CliConfig;
use crate::input::EditorSource;
use crate::terminal::TerminalGuard;
use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use std::io::{self, BufReader, IsTerminal, Write};
use std::time::Duration;
use thermo_driver::{
    BufReadSource, FrameDecoder, HandshakeConfig, MotorDecoder, NullSink, Session, SessionBuilder,
    SessionReport, StopHandle, StopReason, TelemetryRecord, TemperatureDecoder, VisualizationSink,
};
use thermo_protocol::Setpoint;
use thermo_serial::SerialPortAdapter;
use thermo_tools::SeriesSummary;
use tracing::warn;

/// 会话结束后的摘要格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SummaryFormat {
    None,
    Text,
    Json,
}

/// 两种会话共用的串口参数
#[derive(Args, Debug)]
pub struct SessionArgs {
    /// 串口（覆盖配置）
    #[arg(short, long)]
    pub port: Option<String>,

    /// 波特率（覆盖配置）
    #[arg(short, long)]
    pub baud: Option<u32>,

    /// 采样间隔（毫秒）
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// 读超时（毫秒）
    #[arg(long)]
    pub read_timeout_ms: Option<u64>,

    /// 打开串口后等待板子复位的时间（毫秒）
    #[arg(long)]
    pub startup_delay_ms: Option<u64>,

    /// 结束后的统计摘要
    #[arg(long, value_enum, default_value_t = SummaryFormat::Text)]
    pub summary: SummaryFormat,

    /// 不绘制终端曲线
    #[arg(long)]
    pub no_chart: bool,

    /// 运行中每 N 个样本重画一次曲线（0 = 只在结束时画）
    #[arg(long, default_value_t = DEFAULT_REDRAW_EVERY)]
    pub redraw_every: usize,

    /// 不输出每个样本的状态行
    #[arg(short, long)]
    pub quiet: bool,
}

impl SessionArgs {
    /// 合并命令行参数、配置文件和默认值
    fn builder(&self, config: &CliConfig, default_interval: Duration) -> Result<SessionBuilder> {
        let port = self
            .port
            .clone()
            .or_else(|| config.port.clone())
            .context("未指定串口：使用 --port 或 `thermo-cli config set --port`")?;

        let mut builder = SessionBuilder::new()
            .port(port)
            .echo_status(!self.quiet)
            .sample_interval(
                self.interval_ms
                    .or(config.sample_interval_ms)
                    .map_or(default_interval, Duration::from_millis),
            )
            .handshake_config(config.handshake.apply(HandshakeConfig::default()));

        if let Some(baud) = self.baud.or(config.baud_rate) {
            builder = builder.baud_rate(baud);
        }
        if let Some(ms) = self.read_timeout_ms.or(config.read_timeout_ms) {
            builder = builder.read_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = self.startup_delay_ms.or(config.startup_delay_ms) {
            builder = builder.startup_delay(Duration::from_millis(ms));
        }
        Ok(builder)
    }
}

/// 温控板会话
#[derive(Args, Debug)]
pub struct TempCommand {
    #[command(flatten)]
    pub session: SessionArgs,

    /// 板子当前的设定点（10–50，默认 26）
    #[arg(long)]
    pub setpoint: Option<i64>,

    /// 不启动命令控制台（只能用 Ctrl+C 结束）
    #[arg(long)]
    pub no_console: bool,
}

impl TempCommand {
    pub fn execute(&self, config: &CliConfig) -> Result<()> {
        let setpoint = match self.setpoint {
            Some(value) => Setpoint::new(value)?,
            None => config.initial_setpoint.unwrap_or_default(),
        };
        let builder = self
            .session
            .builder(config, Duration::from_millis(500))?
            .initial_setpoint(setpoint);

        let mut session = builder.open().context("打开串口失败")?;
        install_interrupt_handler(session.stop_handle())?;

        println!("温度控制 - ATmega328P");
        println!("命令:");
        println!("  x  → 修改设定点 (10–50)");
        println!("  q  → 退出");
        println!();

        println!("⏳ 正在读取实时数据...\n");

        let (chart_out, terminal): (Box<dyn Write + Send>, Option<TerminalGuard>) = if self.no_console {
            (Box::new(io::stdout()), None)
        } else if io::stdin().is_terminal() && io::stdout().is_terminal() {
            // 行编辑器占用终端：状态行、曲线和控制台消息都经由编辑器输出
            let terminal = TerminalGuard::capture();
            let mut editor = EditorSource::new()?;
            let printer = editor.printer()?;
            session.set_status_output(printer.clone());
            session
                .spawn_console(editor, printer.clone())
                .context("启动控制台失败")?;
            (Box::new(printer), Some(terminal))
        } else {
            // 管道输入：没有行编辑器，终端模式不变
            session
                .spawn_console(BufReadSource::new(BufReader::new(io::stdin())), io::stdout())
                .context("启动控制台失败")?;
            (Box::new(io::stdout()), None)
        };

        run_and_report(session, TemperatureDecoder, &self.session, chart_out, terminal)
    }
}

/// 电机板会话（只读）
#[derive(Args, Debug)]
pub struct MotorCommand {
    #[command(flatten)]
    pub session: SessionArgs,
}

impl MotorCommand {
    pub fn execute(&self, config: &CliConfig) -> Result<()> {
        let builder = self.session.builder(config, Duration::from_millis(100))?;
        let session = builder.open().context("打开串口失败")?;
        install_interrupt_handler(session.stop_handle())?;

        println!("⏳ 正在读取数据...（Ctrl+C 结束）\n");
        run_and_report(session, MotorDecoder, &self.session, Box::new(io::stdout()), None)
    }
}

fn install_interrupt_handler(stop: StopHandle) -> Result<()> {
    ctrlc::set_handler(move || {
        if stop.interrupt() {
            eprintln!("\n🛑 收到 Ctrl+C，正在结束...");
        }
    })
    .context("注册 Ctrl+C 处理器失败")
}

/// 运行会话并输出结果
///
/// `chart_out` 是曲线的输出目标；`terminal` 在输出结果之前恢复终端模式
/// （控制台线程可能仍阻塞在行编辑器里）。
fn run_and_report<D: FrameDecoder>(
    session: Session<SerialPortAdapter>,
    decoder: D,
    args: &SessionArgs,
    chart_out: Box<dyn Write + Send>,
    terminal: Option<TerminalGuard>,
) -> Result<()> {
    let mut sink: Box<dyn VisualizationSink> = if args.no_chart {
        Box::new(NullSink)
    } else {
        Box::new(ChartSink::new(chart_out).redraw_every(args.redraw_every))
    };

    let report = session.run(decoder, &mut sink);
    drop(terminal);
    print_outcome(&report);
    print_summary(&report, args.summary)?;

    match report.error {
        Some(e) => Err(e).context("串口通信中断"),
        None => Ok(()),
    }
}

fn print_outcome<S>(report: &SessionReport<S>) {
    match report.stop_reason {
        Some(StopReason::Quit) => println!("\n👋 会话已结束"),
        Some(StopReason::Interrupted) => println!("\n🛑 会话被中断"),
        Some(StopReason::TransportFailure) => eprintln!("\n❌ 串口故障，会话已结束"),
        None => warn!("Session ended without a stop reason"),
    }
    println!(
        "📊 {} 个样本，设定点 {}，有效行 {:.1}%",
        report.series.len(),
        report.final_setpoint,
        report.metrics.decode_rate()
    );
}

/// 统计摘要（会话结束后）
pub fn summarize<S: TelemetryRecord>(report: &SessionReport<S>) -> SeriesSummary {
    SeriesSummary::from_samples(report.series.iter().map(|sample| {
        let channels = sample.channels();
        (
            sample.timestamp_s(),
            channels.into_iter().map(|c| (c.name, c.value)).collect::<Vec<_>>(),
        )
    }))
}

fn print_summary<S: TelemetryRecord>(report: &SessionReport<S>, format: SummaryFormat) -> Result<()> {
    match format {
        SummaryFormat::None => {},
        SummaryFormat::Text => print!("\n{}", summarize(report).to_text()),
        SummaryFormat::Json => {
            let json = serde_json::to_string_pretty(&summarize(report)).context("序列化摘要失败")?;
            println!("{}", json);
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use thermo_driver::{MetricsSnapshot, TelemetrySample, TimeSeries};

    fn args(port: Option<&str>) -> SessionArgs {
        SessionArgs {
            port: port.map(str::to_string),
            baud: None,
            interval_ms: None,
            read_timeout_ms: None,
            startup_delay_ms: None,
            summary: SummaryFormat::Text,
            no_chart: true,
            redraw_every: DEFAULT_REDRAW_EVERY,
            quiet: true,
        }
    }

    #[test]
    fn test_missing_port_is_an_error() {
        let err = args(None)
            .builder(&CliConfig::default(), Duration::from_millis(500))
            .unwrap_err();
        assert!(err.to_string().contains("--port"));
    }

    #[test]
    fn test_port_from_config() {
        let config = CliConfig {
            port: Some("COM5".into()),
            ..Default::default()
        };
        assert!(args(None).builder(&config, Duration::from_millis(500)).is_ok());
    }

    #[test]
    fn test_summarize_report() {
        let mut series = TimeSeries::new();
        for (t, temp, action) in [(0.5, 24, "Calefactor ON"), (1.0, 30, "Ventilador ALTO")] {
            series.push(TelemetrySample {
                temperature_c: temp,
                setpoint: 26,
                action: action.to_string(),
                duty: thermo_protocol::duty_for_action(action),
                timestamp_s: t,
            });
        }
        let report = SessionReport {
            series,
            stop_reason: Some(StopReason::Quit),
            error: None,
            console_exit: None,
            metrics: MetricsSnapshot::default(),
            final_setpoint: Setpoint::DEFAULT,
        };

        let summary = summarize(&report);
        assert_eq!(summary.samples, 2);
        assert_eq!(summary.duration_s, 0.5);
        assert_eq!(summary.channel("temperature").unwrap().mean, 27.0);
        assert_eq!(summary.channel("duty").unwrap().max, 255.0);
    }
}
