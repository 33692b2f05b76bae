//! 动作文本 → PWM 占空比
//!
//! 温控板只上报动作文本（"Ventilador BAJO" 等），不上报 PWM 数值。
//! 这里按固件里的三档风扇速度还原出占空比，仅用于显示。

/// 低速档占空比（~33%）
pub const DUTY_LOW: u8 = 85;
/// 中速档占空比（~66%）
pub const DUTY_MID: u8 = 170;
/// 高速档占空比（100%）
pub const DUTY_HIGH: u8 = 255;

/// 按优先级排列的关键字表：先匹配到的生效
const DUTY_TABLE: [(&str, u8); 3] = [("bajo", DUTY_LOW), ("medio", DUTY_MID), ("alto", DUTY_HIGH)];

/// 根据动作文本推算 PWM 占空比
///
/// 大小写不敏感的子串匹配，优先级 `bajo` → `medio` → `alto`。
/// 不认识的文本（"Calefactor ON"、"Todo OFF"、空串）一律为 0。
///
/// # Example
///
/// ```
/// use thermo_protocol::duty_for_action;
///
/// assert_eq!(duty_for_action("Ventilador MEDIO"), 170);
/// assert_eq!(duty_for_action("Calefactor ON"), 0);
/// ```
pub fn duty_for_action(action: &str) -> u8 {
    let action = action.to_lowercase();
    DUTY_TABLE
        .iter()
        .find(|(keyword, _)| action.contains(*keyword))
        .map_or(0, |&(_, duty)| duty)
}
