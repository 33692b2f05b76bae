//! 设定点握手的线上格式
//!
//! ```text
//! 主机 → 板子:  'x'                     （进入配置模式）
//! 板子 → 主机:  ">> Ajuste de punto medio activado\r\n"
//!               "Ingrese nuevo valor (10–50): "
//! 主机 → 板子:  "<十进制数值>\r"
//! ```
//!
//! 板子在配置模式下停止输出遥测，收到回车后回显确认并恢复测量。
//! 确认文本不做解析：看到提示符之后发出数值即视为成功。

use crate::setpoint::Setpoint;

/// 请求进入配置模式的单字节
pub const CONFIG_REQUEST: u8 = b'x';

/// 固件的输入提示（出现即表示板子在等数值）
pub const PROMPT_MARKER: &[u8] = b"Ingrese nuevo valor";

/// 数值结束符
pub const VALUE_TERMINATOR: u8 = b'\r';

/// 编码设定点：十进制文本 + `\r`
///
/// # Example
///
/// ```
/// use thermo_protocol::{Setpoint, encode_setpoint};
///
/// let value = Setpoint::new(30).unwrap();
/// assert_eq!(encode_setpoint(value), b"30\r");
/// ```
pub fn encode_setpoint(value: Setpoint) -> Vec<u8> {
    let mut payload = value.to_string().into_bytes();
    payload.push(VALUE_TERMINATOR);
    payload
}

/// 判断累积的响应里是否已经出现提示符
pub fn contains_prompt(received: &[u8], marker: &[u8]) -> bool {
    if marker.is_empty() {
        return true;
    }
    received.windows(marker.len()).any(|window| window == marker)
}
