//! 命令控制台
//!
//! 在独立线程上读取操作员输入，与遥测循环只通过 [`SessionState`] 和
//! 共享串口交互：
//!
//! - `x`：输入新的设定点（10–50），校验通过后执行握手
//! - `q` / `exit` / `salir`：结束会话
//! - 其他输入：忽略
//!
//! 行编辑器报告的中断（原始终端模式下的 Ctrl+C）同样结束会话；
//! 输入结束（EOF）只结束控制台，遥测继续运行直到其他停止请求。

use crate::error::DriverError;
use crate::handshake::HandshakeController;
use crate::state::{SessionState, StopReason};
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thermo_protocol::{Setpoint, SetpointError};
use thermo_serial::SerialTransport;
use tracing::{debug, info};

/// 一次读取的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    Line(String),
    Interrupted,
    Eof,
}

/// 操作员输入来源
pub trait LineSource {
    /// 读取一行（阻塞）；`prompt` 由支持行编辑的实现显示
    fn read_line(&mut self, prompt: &str) -> io::Result<ConsoleInput>;
}

/// 基于 `BufRead` 的输入（管道、测试）
#[derive(Debug)]
pub struct BufReadSource<R> {
    reader: R,
}

impl<R: BufRead> BufReadSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead> LineSource for BufReadSource<R> {
    fn read_line(&mut self, _prompt: &str) -> io::Result<ConsoleInput> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(ConsoleInput::Eof);
        }
        Ok(ConsoleInput::Line(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}

/// 控制台命令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// 修改设定点
    ChangeSetpoint,
    /// 结束会话
    Quit,
}

impl ConsoleCommand {
    /// 解析一行输入（忽略大小写和首尾空白），无法识别时返回 `None`
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_lowercase().as_str() {
            "x" => Some(Self::ChangeSetpoint),
            "q" | "exit" | "salir" => Some(Self::Quit),
            _ => None,
        }
    }
}

/// 控制台退出原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleExit {
    /// 操作员输入退出命令
    Quit,
    /// 行编辑器报告中断
    Interrupted,
    /// 输入结束
    EndOfInput,
    /// 会话已被别处停止
    SessionStopped,
}

/// 设定点输入提示
pub const SETPOINT_PROMPT: &str = "输入新的设定点 (10–50): ";

/// 命令控制台
pub struct CommandConsole<T, L, W> {
    controller: HandshakeController<T>,
    source: L,
    out: W,
}

impl<T, L, W> CommandConsole<T, L, W>
where
    T: SerialTransport,
    L: LineSource,
    W: Write,
{
    pub fn new(controller: HandshakeController<T>, source: L, out: W) -> Self {
        Self {
            controller,
            source,
            out,
        }
    }

    fn state(&self) -> &Arc<SessionState> {
        self.controller.state()
    }

    /// 运行到退出
    pub fn run(mut self) -> Result<ConsoleExit, DriverError> {
        info!("Command console started");
        let exit = self.run_loop();
        info!("Command console finished: {:?}", exit);
        exit
    }

    fn run_loop(&mut self) -> Result<ConsoleExit, DriverError> {
        loop {
            if !self.state().is_running() {
                return Ok(ConsoleExit::SessionStopped);
            }

            let line = match self.source.read_line("")? {
                ConsoleInput::Line(line) => line,
                ConsoleInput::Interrupted => return Ok(self.interrupt()),
                ConsoleInput::Eof => return Ok(ConsoleExit::EndOfInput),
            };

            match ConsoleCommand::parse(&line) {
                Some(ConsoleCommand::Quit) => {
                    self.state().request_stop(StopReason::Quit);
                    writeln!(self.out, "👋 正在退出...")?;
                    return Ok(ConsoleExit::Quit);
                },
                Some(ConsoleCommand::ChangeSetpoint) => {
                    if let Some(exit) = self.change_setpoint()? {
                        return Ok(exit);
                    }
                },
                None => debug!("Ignoring console input: {:?}", line),
            }
        }
    }

    fn interrupt(&mut self) -> ConsoleExit {
        self.state().request_stop(StopReason::Interrupted);
        ConsoleExit::Interrupted
    }

    /// 读取数值并执行握手；返回 `Some` 表示控制台应当退出
    fn change_setpoint(&mut self) -> Result<Option<ConsoleExit>, DriverError> {
        let text = match self.source.read_line(SETPOINT_PROMPT)? {
            ConsoleInput::Line(text) => text,
            ConsoleInput::Interrupted => return Ok(Some(self.interrupt())),
            ConsoleInput::Eof => return Ok(Some(ConsoleExit::EndOfInput)),
        };

        let value = match text.parse::<Setpoint>() {
            Ok(value) => value,
            Err(SetpointError::Invalid(_)) => {
                writeln!(self.out, "❌ 无效的数值")?;
                return Ok(None);
            },
            Err(SetpointError::OutOfRange { min, max, .. }) => {
                writeln!(self.out, "❌ 超出范围 ({}–{})", min, max)?;
                return Ok(None);
            },
        };

        if !self.state().is_running() {
            return Ok(Some(ConsoleExit::SessionStopped));
        }

        match self.controller.update_setpoint(value) {
            Ok(_) => writeln!(self.out, "✅ 设定点已更新为 {}", value)?,
            Err(DriverError::HandshakeTimeout(_)) => {
                let current = self.state().setpoint();
                writeln!(self.out, "⏱️  未收到配置提示，设定点保持 {}", current)?
            },
            Err(DriverError::TransportClosed) => return Ok(Some(ConsoleExit::SessionStopped)),
            Err(e) => writeln!(self.out, "❌ 握手失败: {}", e)?,
        }
        Ok(None)
    }
}

impl<T, L, W> CommandConsole<T, L, W>
where
    T: SerialTransport + Send + 'static,
    L: LineSource + Send + 'static,
    W: Write + Send + 'static,
{
    /// 在独立线程上运行
    pub fn spawn(self) -> Result<JoinHandle<Result<ConsoleExit, DriverError>>, DriverError> {
        thread::Builder::new()
            .name("thermo-console".into())
            .spawn(move || self.run())
            .map_err(|e| DriverError::Thread(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handshake::HandshakeConfig;
    use crate::metrics::SessionMetrics;
    use crate::transport::SharedTransport;
    use std::collections::VecDeque;
    use std::io::Cursor;
    use std::time::Duration;
    use thermo_serial::MockSerial;

    struct Scripted(VecDeque<ConsoleInput>);

    impl LineSource for Scripted {
        fn read_line(&mut self, _prompt: &str) -> io::Result<ConsoleInput> {
            Ok(self.0.pop_front().unwrap_or(ConsoleInput::Eof))
        }
    }

    fn fast_config() -> HandshakeConfig {
        HandshakeConfig {
            request_settle: Duration::from_millis(5),
            prompt_timeout: Duration::from_millis(60),
            poll_interval: Duration::from_millis(5),
            value_settle: Duration::from_millis(5),
            ..HandshakeConfig::default()
        }
    }

    fn make_console<L: LineSource>(
        mock: MockSerial,
        source: L,
    ) -> (CommandConsole<MockSerial, L, Vec<u8>>, Arc<SessionState>) {
        let state = Arc::new(SessionState::default());
        let controller = HandshakeController::new(
            SharedTransport::new(mock),
            state.clone(),
            Arc::new(SessionMetrics::new()),
            fast_config(),
        );
        (CommandConsole::new(controller, source, Vec::new()), state)
    }

    fn run_to_output<L: LineSource>(mock: MockSerial, source: L) -> (ConsoleExit, String, Arc<SessionState>) {
        let (mut console, state) = make_console(mock, source);
        let exit = console.run_loop().unwrap();
        (exit, String::from_utf8(console.out).unwrap(), state)
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(ConsoleCommand::parse("x"), Some(ConsoleCommand::ChangeSetpoint));
        assert_eq!(ConsoleCommand::parse("  X \r"), Some(ConsoleCommand::ChangeSetpoint));
        for quit in ["q", "Q", "exit", "EXIT", "salir", " Salir "] {
            assert_eq!(ConsoleCommand::parse(quit), Some(ConsoleCommand::Quit));
        }
        assert_eq!(ConsoleCommand::parse(""), None);
        assert_eq!(ConsoleCommand::parse("xx"), None);
        assert_eq!(ConsoleCommand::parse("help"), None);
    }

    #[test]
    fn test_buf_read_source() {
        let mut source = BufReadSource::new(Cursor::new("x\r\n30\nq"));
        assert_eq!(source.read_line("").unwrap(), ConsoleInput::Line("x".into()));
        assert_eq!(source.read_line("").unwrap(), ConsoleInput::Line("30".into()));
        assert_eq!(source.read_line("").unwrap(), ConsoleInput::Line("q".into()));
        assert_eq!(source.read_line("").unwrap(), ConsoleInput::Eof);
    }

    #[test]
    fn test_quit_stops_session() {
        let (exit, out, state) =
            run_to_output(MockSerial::new(), BufReadSource::new(Cursor::new("hola\nsalir\n")));
        assert_eq!(exit, ConsoleExit::Quit);
        assert_eq!(state.stop_reason(), Some(StopReason::Quit));
        assert!(out.contains("退出"));
    }

    #[test]
    fn test_invalid_and_out_of_range_values() {
        let mock = MockSerial::new();
        let (exit, out, state) = run_to_output(
            mock.clone(),
            BufReadSource::new(Cursor::new("x\nabc\nx\n99\nx\n9\n")),
        );
        assert_eq!(exit, ConsoleExit::EndOfInput);
        assert!(out.contains("无效的数值"));
        assert_eq!(out.matches("超出范围 (10–50)").count(), 2);
        assert!(mock.writes().is_empty());
        assert!(state.is_running());
    }

    #[test]
    fn test_valid_value_runs_handshake() {
        let mock = MockSerial::new().with_prompt_reply(b"Ingrese nuevo valor", Duration::ZERO);
        let (exit, out, state) =
            run_to_output(mock.clone(), BufReadSource::new(Cursor::new("x\n 35 \n")));
        assert_eq!(exit, ConsoleExit::EndOfInput);
        assert_eq!(state.setpoint().get(), 35);
        assert_eq!(mock.writes(), vec![b"x".to_vec(), b"35\r".to_vec()]);
        assert!(out.contains("35"));
    }

    #[test]
    fn test_handshake_timeout_keeps_setpoint() {
        let mock = MockSerial::new();
        let (_, out, state) = run_to_output(mock.clone(), BufReadSource::new(Cursor::new("x\n40\n")));
        assert_eq!(state.setpoint(), Setpoint::DEFAULT);
        assert_eq!(mock.writes(), vec![b"x".to_vec()]);
        assert!(out.contains("26"));
    }

    #[test]
    fn test_interrupt_stops_session() {
        let source = Scripted(VecDeque::from([
            ConsoleInput::Line("x".into()),
            ConsoleInput::Interrupted,
        ]));
        let (exit, _, state) = run_to_output(MockSerial::new(), source);
        assert_eq!(exit, ConsoleExit::Interrupted);
        assert_eq!(state.stop_reason(), Some(StopReason::Interrupted));
    }

    #[test]
    fn test_eof_leaves_session_running() {
        let (exit, _, state) = run_to_output(MockSerial::new(), BufReadSource::new(Cursor::new("")));
        assert_eq!(exit, ConsoleExit::EndOfInput);
        assert!(state.is_running());
    }

    #[test]
    fn test_exits_when_session_already_stopped() {
        let (console, state) = make_console(MockSerial::new(), BufReadSource::new(Cursor::new("x\n30\n")));
        state.request_stop(StopReason::TransportFailure);
        assert_eq!(console.run().unwrap(), ConsoleExit::SessionStopped);
    }
}
