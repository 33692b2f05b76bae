//! 设定点（PM，"punto medio"）取值
//!
//! 固件只接受 10–50 °C 的设定点。主机侧在发起握手之前先做同样的校验，
//! 不合法的输入不会触碰串口。

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// 设定点校验错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SetpointError {
    /// 不是整数
    #[error("Invalid setpoint value: {0:?}")]
    Invalid(String),

    /// 超出固件接受的范围
    #[error("Setpoint {value} out of range ({min}–{max})")]
    OutOfRange { value: i64, min: u8, max: u8 },
}

/// 已校验的设定点（°C）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "i64", into = "u8"))]
pub struct Setpoint(u8);

impl Setpoint {
    /// 最小设定点
    pub const MIN: u8 = 10;
    /// 最大设定点
    pub const MAX: u8 = 50;
    /// 固件上电默认值
    pub const DEFAULT: Setpoint = Setpoint(26);

    /// 校验并构造
    pub fn new(value: i64) -> Result<Self, SetpointError> {
        if (i64::from(Self::MIN)..=i64::from(Self::MAX)).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(SetpointError::OutOfRange {
                value,
                min: Self::MIN,
                max: Self::MAX,
            })
        }
    }

    /// 数值
    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for Setpoint {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<i64> for Setpoint {
    type Error = SetpointError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Setpoint> for u8 {
    fn from(value: Setpoint) -> Self {
        value.0
    }
}

impl FromStr for Setpoint {
    type Err = SetpointError;

    /// 解析操作员输入：先判断是否整数，再判断范围
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: i64 = s
            .trim()
            .parse()
            .map_err(|_| SetpointError::Invalid(s.trim().to_string()))?;
        Self::new(value)
    }
}

impl fmt::Display for Setpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
