//! # Thermo Serial Transport Layer
//!
//! 串口传输抽象层：上层只看到"按行读取 + 原始字节写入"，
//! 不关心底层是真实串口还是测试用的 Mock。

use std::time::Duration;
use thiserror::Error;

mod line_buffer;
mod port;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use line_buffer::LineBuffer;
pub use port::{PortInfo, SerialPortAdapter, available_ports};

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockEvent, MockSerial};

/// 默认波特率（固件 UBRR 按 9600 计算）
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// 默认读超时
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// 串口传输层统一错误类型
#[derive(Error, Debug)]
pub enum SerialError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serial port error: {0}")]
    Port(#[from] serialport::Error),
    #[error("Device disconnected")]
    Disconnected,
}

impl SerialError {
    /// 设备是否已经不可用（拔线、端口消失）
    pub fn is_disconnect(&self) -> bool {
        match self {
            SerialError::Disconnected => true,
            SerialError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::UnexpectedEof
            ),
            SerialError::Port(e) => matches!(e.kind, serialport::ErrorKind::NoDevice),
        }
    }
}

/// 串口传输接口
///
/// 所有方法都要求独占（`&mut self`），并发访问由上层的锁保证。
pub trait SerialTransport {
    /// 读取一行（不含 `\n`），最多阻塞一个读超时
    ///
    /// 超时内没有凑齐一整行时返回 `Ok(None)`，已收到的半行保留到下次。
    fn read_line(&mut self) -> Result<Option<Vec<u8>>, SerialError>;

    /// 非阻塞：取出当前已经到达的全部字节（可能为空）
    fn read_available(&mut self) -> Result<Vec<u8>, SerialError>;

    /// 写入全部字节并刷新
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SerialError>;

    /// 丢弃所有未读输入（包括已缓存的半行）
    fn clear_input(&mut self) -> Result<(), SerialError>;

    /// 修改读超时
    fn set_read_timeout(&mut self, _timeout: Duration) -> Result<(), SerialError> {
        Ok(())
    }
}

impl<T: SerialTransport + ?Sized> SerialTransport for Box<T> {
    fn read_line(&mut self) -> Result<Option<Vec<u8>>, SerialError> {
        (**self).read_line()
    }

    fn read_available(&mut self) -> Result<Vec<u8>, SerialError> {
        (**self).read_available()
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        (**self).write_all(bytes)
    }

    fn clear_input(&mut self) -> Result<(), SerialError> {
        (**self).clear_input()
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> Result<(), SerialError> {
        (**self).set_read_timeout(timeout)
    }
}
