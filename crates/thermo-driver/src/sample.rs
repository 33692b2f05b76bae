//! 遥测样本与时间序列
//!
//! 协议层的帧只描述一行文本的内容；这里的样本额外带上会话内的时间戳
//! 和映射后的占空比，是遥测循环真正记录和推送给可视化端的东西。

use smallvec::SmallVec;
use thermo_protocol::{MotorFrame, TemperatureFrame, duty_for_action};

/// 可视化通道：名称 + 数值
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Channel {
    pub name: &'static str,
    pub value: f64,
}

impl Channel {
    pub const fn new(name: &'static str, value: f64) -> Self {
        Self { name, value }
    }
}

/// 一个样本的通道集合（通常不超过 4 个，栈上分配）
pub type Channels = SmallVec<[Channel; 4]>;

/// 可记录的遥测样本
pub trait TelemetryRecord: Clone + Send + 'static {
    /// 相对会话开始的秒数
    fn timestamp_s(&self) -> f64;

    /// 推送给可视化端的数值通道
    fn channels(&self) -> Channels;

    /// 每个样本输出一行的状态文本
    fn status_line(&self) -> String;
}

/// 行 → 样本
///
/// 返回 `None` 表示这一行不是遥测帧，调用方静默跳过。
pub trait FrameDecoder: Send {
    type Sample: TelemetryRecord;

    fn decode(&self, line: &str, timestamp_s: f64) -> Option<Self::Sample>;
}

/// 温控板样本
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySample {
    pub temperature_c: u32,
    pub setpoint: u32,
    /// 固件原样输出的动作文本
    pub action: String,
    /// 由动作文本映射的占空比（0–255）
    pub duty: u8,
    pub timestamp_s: f64,
}

impl TelemetrySample {
    pub fn from_frame(frame: TemperatureFrame, timestamp_s: f64) -> Self {
        let duty = duty_for_action(&frame.action);
        Self {
            temperature_c: frame.temperature_c,
            setpoint: frame.setpoint,
            action: frame.action,
            duty,
            timestamp_s,
        }
    }
}

impl TelemetryRecord for TelemetrySample {
    fn timestamp_s(&self) -> f64 {
        self.timestamp_s
    }

    fn channels(&self) -> Channels {
        smallvec::smallvec![
            Channel::new("temperature", f64::from(self.temperature_c)),
            Channel::new("setpoint", f64::from(self.setpoint)),
            Channel::new("duty", f64::from(self.duty)),
        ]
    }

    fn status_line(&self) -> String {
        format!(
            "温度={:2}°C | 设定点={:2} | PWM={:3} | 动作={}",
            self.temperature_c, self.setpoint, self.duty, self.action
        )
    }
}

/// 电机板样本（只读模式，无握手）
#[derive(Debug, Clone, PartialEq)]
pub struct MotorSample {
    pub reference: u32,
    pub actual: u32,
    pub duty: u32,
    pub direction: String,
    pub timestamp_s: f64,
}

impl MotorSample {
    pub fn from_frame(frame: MotorFrame, timestamp_s: f64) -> Self {
        Self {
            reference: frame.reference,
            actual: frame.actual,
            duty: frame.pwm,
            direction: frame.direction,
            timestamp_s,
        }
    }
}

impl TelemetryRecord for MotorSample {
    fn timestamp_s(&self) -> f64 {
        self.timestamp_s
    }

    fn channels(&self) -> Channels {
        smallvec::smallvec![
            Channel::new("reference", f64::from(self.reference)),
            Channel::new("actual", f64::from(self.actual)),
            Channel::new("pwm", f64::from(self.duty)),
        ]
    }

    fn status_line(&self) -> String {
        format!(
            "参考={:4} | 实际={:4} | PWM={:3} | 方向={}",
            self.reference, self.actual, self.duty, self.direction
        )
    }
}

/// 温控板行解码器（`Temp:..C | PM:.. | 动作`）
#[derive(Debug, Clone, Copy, Default)]
pub struct TemperatureDecoder;

impl FrameDecoder for TemperatureDecoder {
    type Sample = TelemetrySample;

    fn decode(&self, line: &str, timestamp_s: f64) -> Option<TelemetrySample> {
        TemperatureFrame::parse(line).map(|frame| TelemetrySample::from_frame(frame, timestamp_s))
    }
}

/// 电机板行解码器（`Ref:.. | Act:.. | PWM:.. | Sent:..`）
#[derive(Debug, Clone, Copy, Default)]
pub struct MotorDecoder;

impl FrameDecoder for MotorDecoder {
    type Sample = MotorSample;

    fn decode(&self, line: &str, timestamp_s: f64) -> Option<MotorSample> {
        MotorFrame::parse(line).map(|frame| MotorSample::from_frame(frame, timestamp_s))
    }
}

/// 只追加的时间序列
///
/// 会话期间只增不减，会话结束后整体交给调用方。
#[derive(Debug, Clone)]
pub struct TimeSeries<S> {
    samples: Vec<S>,
}

impl<S> Default for TimeSeries<S> {
    fn default() -> Self {
        Self {
            samples: Vec::new(),
        }
    }
}

impl<S> TimeSeries<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sample: S) {
        self.samples.push(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn last(&self) -> Option<&S> {
        self.samples.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, S> {
        self.samples.iter()
    }

    pub fn as_slice(&self) -> &[S] {
        &self.samples
    }

    pub fn into_vec(self) -> Vec<S> {
        self.samples
    }
}

impl<'a, S> IntoIterator for &'a TimeSeries<S> {
    type Item = &'a S;
    type IntoIter = std::slice::Iter<'a, S>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}
