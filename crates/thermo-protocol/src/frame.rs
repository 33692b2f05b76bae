//! 遥测行解析
//!
//! 控制板每个采样周期输出一行状态文本，两种板子格式不同：
//!
//! ```text
//! 温控板:  Temp:<整数>C | PM:<整数> | <动作文本>
//! 电机板:  Ref:<整数> | Act:<整数> | PWM:<整数> | Sent:<字母>
//! ```
//!
//! 解析采用"固定分隔符 + 类型化字段"的方式，不依赖正则回溯：
//! - 帧头可以出现在行内任意位置（串口撕裂时前面可能残留半行垃圾）
//! - `|` 两侧允许任意空白
//! - 任何字段不匹配或数值溢出都返回 `None`，不是错误

use std::str::FromStr;

/// 原始字节 → 字符串
///
/// 逐字节按 Latin-1 映射（每个字节都是合法字符），然后去掉首尾空白和行尾。
/// 串口上的噪声字节会变成奇怪的字符，但不会让读取失败。
pub fn decode_line(raw: &[u8]) -> String {
    let text: String = raw.iter().map(|&b| char::from(b)).collect();
    text.trim().to_string()
}

/// 温控板状态帧
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TemperatureFrame {
    /// 温度（°C）
    pub temperature_c: u32,
    /// 板上当前生效的设定点（PM，"punto medio"）
    pub setpoint: u32,
    /// 动作描述（如 "Ventilador MEDIO"），已去掉首尾空白，可能为空
    pub action: String,
}

impl TemperatureFrame {
    /// 帧头
    pub const HEADER: &'static str = "Temp:";

    /// 从一行文本中解析温控板状态帧
    ///
    /// # Example
    ///
    /// ```
    /// use thermo_protocol::TemperatureFrame;
    ///
    /// let frame = TemperatureFrame::parse("Temp:26C | PM:26 | Medio").unwrap();
    /// assert_eq!(frame.temperature_c, 26);
    /// assert_eq!(frame.setpoint, 26);
    /// assert_eq!(frame.action, "Medio");
    ///
    /// assert!(TemperatureFrame::parse("Temp:26C | PM:").is_none());
    /// ```
    pub fn parse(line: &str) -> Option<Self> {
        line.match_indices(Self::HEADER)
            .find_map(|(start, _)| Self::parse_at(&line[start..]))
    }

    fn parse_at(text: &str) -> Option<Self> {
        let mut cursor = Cursor::new(text);
        cursor.tag(Self::HEADER)?;
        let temperature_c = cursor.number()?;
        cursor.tag("C")?;
        cursor.separator()?;
        cursor.tag("PM:")?;
        let setpoint = cursor.number()?;
        cursor.separator()?;
        let action = cursor.remainder().trim().to_string();

        Some(Self {
            temperature_c,
            setpoint,
            action,
        })
    }
}

/// 电机板状态帧（两个电位器 + PWM + 转向）
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MotorFrame {
    /// 参考电位器 ADC 读数
    pub reference: u32,
    /// 随动电位器 ADC 读数
    pub actual: u32,
    /// PWM 寄存器值（OCR0A）
    pub pwm: u32,
    /// 转向（"Horario" / "Antihorario" / "Detenido"）
    pub direction: String,
}

impl MotorFrame {
    /// 帧头
    pub const HEADER: &'static str = "Ref:";

    /// 从一行文本中解析电机板状态帧
    ///
    /// `Sent:` 之后只取连续的 ASCII 字母，后面的内容忽略。
    pub fn parse(line: &str) -> Option<Self> {
        line.match_indices(Self::HEADER)
            .find_map(|(start, _)| Self::parse_at(&line[start..]))
    }

    fn parse_at(text: &str) -> Option<Self> {
        let mut cursor = Cursor::new(text);
        cursor.tag(Self::HEADER)?;
        let reference = cursor.number()?;
        cursor.separator()?;
        cursor.tag("Act:")?;
        let actual = cursor.number()?;
        cursor.separator()?;
        cursor.tag("PWM:")?;
        let pwm = cursor.number()?;
        cursor.separator()?;
        cursor.tag("Sent:")?;
        let direction = cursor.take_while(|c| c.is_ascii_alphabetic())?;

        Some(Self {
            reference,
            actual,
            pwm,
            direction: direction.to_string(),
        })
    }
}

/// 只进不退的文本游标
struct Cursor<'a> {
    rest: &'a str,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self { rest: text }
    }

    fn tag(&mut self, tag: &str) -> Option<()> {
        self.rest = self.rest.strip_prefix(tag)?;
        Some(())
    }

    /// 取出至少一个满足条件的字符
    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> Option<&'a str> {
        let end = self.rest.find(|c: char| !pred(c)).unwrap_or(self.rest.len());
        if end == 0 {
            return None;
        }
        let (taken, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(taken)
    }

    fn number<T: FromStr>(&mut self) -> Option<T> {
        self.take_while(|c| c.is_ascii_digit())?.parse().ok()
    }

    /// `\s*|\s*`
    fn separator(&mut self) -> Option<()> {
        self.rest = self.rest.trim_start();
        self.tag("|")?;
        self.rest = self.rest.trim_start();
        Some(())
    }

    fn remainder(self) -> &'a str {
        self.rest
    }
}
