//! 驱动层错误类型定义

use std::time::Duration;
use thermo_serial::SerialError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 串口传输错误
    #[error("Serial transport error: {0}")]
    Serial(#[from] SerialError),

    /// 握手超时：截止时间内没有看到提示符
    #[error("Handshake timeout: no prompt within {0:?}")]
    HandshakeTimeout(Duration),

    /// 串口已被释放（会话已结束）
    #[error("Transport closed")]
    TransportClosed,

    /// 控制台输入/输出错误
    #[error("Console IO error: {0}")]
    ConsoleIo(#[from] std::io::Error),

    /// 线程启动失败
    #[error("Thread error: {0}")]
    Thread(String),

    /// 配置无效
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl DriverError {
    /// 是否应该结束遥测循环
    pub fn is_fatal(&self) -> bool {
        matches!(self, DriverError::Serial(_) | DriverError::TransportClosed)
    }
}
