//! # Thermo Protocol
//!
//! 控制板串口行协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `frame`: 遥测行解码（温控板 / 电机板两种格式）
//! - `action`: 动作文本 → PWM 占空比映射
//! - `setpoint`: 设定点取值与校验
//! - `handshake`: 设定点握手的线上格式常量
//!
//! ## 编码
//!
//! 固件输出的是单字节文本（`sprintf` + UART），行尾为 `\r\n`。
//! 解码按 Latin-1 逐字节映射，任何字节序列都能得到一个字符串，
//! 不存在"解码失败"，格式不符的行由解析器返回 `None`。

pub mod action;
pub mod frame;
pub mod handshake;
pub mod setpoint;

// 重新导出常用类型
pub use action::duty_for_action;
pub use frame::{MotorFrame, TemperatureFrame, decode_line};
pub use handshake::{CONFIG_REQUEST, PROMPT_MARKER, VALUE_TERMINATOR, contains_prompt, encode_setpoint};
pub use setpoint::{Setpoint, SetpointError};
