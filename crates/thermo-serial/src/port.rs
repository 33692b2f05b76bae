//! 真实串口适配器（基于 `serialport` crate）

use crate::{LineBuffer, SerialError, SerialTransport};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, SerialPortType, StopBits};
use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

/// 单次 `read()` 的块大小
const READ_CHUNK: usize = 256;

/// 串口适配器
///
/// 8N1、无流控。读超时由构造时指定，`read_line()` 最多阻塞这么久。
pub struct SerialPortAdapter {
    port: Box<dyn SerialPort>,
    lines: LineBuffer,
    name: String,
}

impl SerialPortAdapter {
    /// 打开串口
    ///
    /// # 参数
    /// - `path`: 端口路径（如 `/dev/ttyUSB0`、`COM5`）
    /// - `baud_rate`: 波特率
    /// - `read_timeout`: 读超时
    pub fn open(path: &str, baud_rate: u32, read_timeout: Duration) -> Result<Self, SerialError> {
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(read_timeout)
            .open()?;

        info!(
            "Opened serial port {} at {} baud (read timeout {:?})",
            path, baud_rate, read_timeout
        );

        Ok(Self {
            port,
            lines: LineBuffer::new(),
            name: path.to_string(),
        })
    }

    /// 端口名
    pub fn name(&self) -> &str {
        &self.name
    }

    fn fill(&mut self) -> Result<bool, SerialError> {
        let mut chunk = [0u8; READ_CHUNK];
        match self.port.read(&mut chunk) {
            Ok(0) => Err(SerialError::Disconnected),
            Ok(n) => {
                trace!("RX {} bytes from {}", n, self.name);
                self.lines.extend(&chunk[..n]);
                Ok(true)
            },
            Err(e) if e.kind() == ErrorKind::TimedOut => Ok(false),
            Err(e) if e.kind() == ErrorKind::Interrupted => Ok(true),
            Err(e) => Err(e.into()),
        }
    }
}

impl SerialTransport for SerialPortAdapter {
    fn read_line(&mut self) -> Result<Option<Vec<u8>>, SerialError> {
        if let Some(line) = self.lines.next_line() {
            return Ok(Some(line));
        }

        let deadline = Instant::now() + self.port.timeout();
        loop {
            if !self.fill()? {
                return Ok(None);
            }
            if let Some(line) = self.lines.next_line() {
                return Ok(Some(line));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
        }
    }

    fn read_available(&mut self) -> Result<Vec<u8>, SerialError> {
        let mut received = self.lines.take_all();
        let pending = self.port.bytes_to_read()? as usize;
        if pending > 0 {
            let mut chunk = vec![0u8; pending];
            let n = self.port.read(&mut chunk)?;
            received.extend_from_slice(&chunk[..n]);
        }
        Ok(received)
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        trace!("TX {:?} to {}", bytes.escape_ascii().to_string(), self.name);
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }

    fn clear_input(&mut self) -> Result<(), SerialError> {
        let dropped = self.lines.len();
        self.lines.clear();
        self.port.clear(ClearBuffer::Input)?;
        if dropped > 0 {
            debug!("Dropped {} buffered bytes on input clear", dropped);
        }
        Ok(())
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> Result<(), SerialError> {
        self.port.set_timeout(timeout)?;
        Ok(())
    }
}

/// 串口信息（用于 `ports` 子命令）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// 端口路径
    pub name: String,
    /// 人类可读的描述
    pub description: String,
}

/// 枚举本机串口
pub fn available_ports() -> Result<Vec<PortInfo>, SerialError> {
    let ports = serialport::available_ports()?;
    Ok(ports
        .into_iter()
        .map(|port| {
            let description = match port.port_type {
                SerialPortType::UsbPort(usb) => {
                    let product = usb.product.unwrap_or_else(|| "USB serial".to_string());
                    format!("{} ({:04x}:{:04x})", product, usb.vid, usb.pid)
                },
                SerialPortType::PciPort => "PCI".to_string(),
                SerialPortType::BluetoothPort => "Bluetooth".to_string(),
                SerialPortType::Unknown => "unknown".to_string(),
            };
            PortInfo {
                name: port.port_name,
                description,
            }
        })
        .collect())
}
