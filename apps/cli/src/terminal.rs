//! 控制台线程占用终端时的输出与终端模式恢复
//!
//! rustyline 在 `readline` 期间把终端切到原始模式并自己管理当前行。
//! 遥测线程的状态行和曲线必须经由 [`EditorPrinter`] 交给编辑器输出，
//! 否则会和提示符交错。
//!
//! 会话结束时控制台线程可能仍阻塞在 `readline` 里（串口故障、Ctrl+C），
//! 进程退出前由 [`TerminalGuard`] 把终端恢复到会话开始前的模式。

use parking_lot::Mutex;
use rustyline::ExternalPrinter;
use std::io::{self, Write};
use std::sync::Arc;

/// 经由行编辑器输出的 `Write`
///
/// 按整行转发；最后不完整的一行在 `flush` 时转发。可以克隆给多个写者，
/// 每个克隆有自己的行缓冲。
pub struct EditorPrinter {
    printer: Arc<Mutex<Box<dyn ExternalPrinter + Send>>>,
    pending: Vec<u8>,
}

impl EditorPrinter {
    pub fn new<P: ExternalPrinter + Send + 'static>(printer: P) -> Self {
        Self {
            printer: Arc::new(Mutex::new(Box::new(printer))),
            pending: Vec::new(),
        }
    }

    fn forward(&mut self, bytes: Vec<u8>) -> io::Result<()> {
        let text = String::from_utf8_lossy(&bytes).into_owned();
        self.printer.lock().print(text).map_err(|e| io::Error::other(e.to_string()))
    }
}

impl Clone for EditorPrinter {
    fn clone(&self) -> Self {
        Self {
            printer: self.printer.clone(),
            pending: Vec::new(),
        }
    }
}

impl Write for EditorPrinter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        if let Some(last) = self.pending.iter().rposition(|&b| b == b'\n') {
            let rest = self.pending.split_off(last + 1);
            let lines = std::mem::replace(&mut self.pending, rest);
            self.forward(lines)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.pending.is_empty() {
            let partial = std::mem::take(&mut self.pending);
            self.forward(partial)?;
        }
        Ok(())
    }
}

/// 会话开始前的终端模式，`restore` 或 drop 时写回
#[cfg(unix)]
pub struct TerminalGuard {
    saved: Option<nix::sys::termios::Termios>,
}

#[cfg(unix)]
impl TerminalGuard {
    pub fn capture() -> Self {
        let saved = match nix::sys::termios::tcgetattr(io::stdin()) {
            Ok(termios) => Some(termios),
            Err(e) => {
                tracing::debug!("Terminal mode not captured: {}", e);
                None
            },
        };
        Self { saved }
    }

    /// 恢复终端模式（只执行一次）
    pub fn restore(&mut self) {
        let Some(saved) = self.saved.take() else {
            return;
        };
        if let Err(e) = nix::sys::termios::tcsetattr(io::stdin(), nix::sys::termios::SetArg::TCSANOW, &saved) {
            tracing::warn!("Failed to restore terminal mode: {}", e);
        }
        // 行编辑器在原始模式下打开了括号粘贴
        let mut out = io::stdout();
        let _ = out.write_all(b"\x1b[?2004l\r\n");
        let _ = out.flush();
    }
}

/// 非 Unix 平台：行编辑器自行管理控制台模式
#[cfg(not(unix))]
pub struct TerminalGuard;

#[cfg(not(unix))]
impl TerminalGuard {
    pub fn capture() -> Self {
        Self
    }

    pub fn restore(&mut self) {}
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        self.restore();
    }
}
