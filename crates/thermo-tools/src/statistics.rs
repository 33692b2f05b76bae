//! # 统计工具
//!
//! 会话结束后对整条时间序列做逐通道统计（可选模块）
//!
//! 需要启用 `statistics` feature：
//! ```toml
//! thermo-tools = { workspace = true, features = ["statistics"] }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// 单个通道的统计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelStatistics {
    /// 通道名称
    pub name: String,

    /// 样本数量
    pub count: u64,

    pub min: f64,
    pub max: f64,
    pub mean: f64,

    /// 总体标准差
    pub std_dev: f64,
}

impl ChannelStatistics {
    /// 计算统计（空输入时所有数值为 0）
    pub fn calculate(name: impl Into<String>, values: &[f64]) -> Self {
        let name = name.into();
        if values.is_empty() {
            return Self {
                name,
                count: 0,
                min: 0.0,
                max: 0.0,
                mean: 0.0,
                std_dev: 0.0,
            };
        }

        let count = values.len() as f64;
        let mean = values.iter().sum::<f64>() / count;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        // 计算标准差
        let variance = values
            .iter()
            .map(|&x| {
                let diff = x - mean;
                diff * diff
            })
            .sum::<f64>()
            / count;

        Self {
            name,
            count: values.len() as u64,
            min,
            max,
            mean,
            std_dev: variance.sqrt(),
        }
    }

    /// 最大值与最小值之差
    pub fn range(&self) -> f64 {
        self.max - self.min
    }
}

/// 整条序列的统计摘要
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SeriesSummary {
    /// 样本数量
    pub samples: u64,

    /// 第一个到最后一个样本的时间跨度（秒）
    pub duration_s: f64,

    /// 逐通道统计（按首次出现的顺序）
    pub channels: Vec<ChannelStatistics>,
}

impl SeriesSummary {
    /// 从样本构建摘要
    ///
    /// 每个样本是 `(时间戳, [(通道名, 数值)])`。
    ///
    /// # Example
    ///
    /// ```
    /// use thermo_tools::SeriesSummary;
    ///
    /// let samples = vec![
    ///     (0.5, vec![("temperature", 24.0), ("duty", 0.0)]),
    ///     (1.0, vec![("temperature", 28.0), ("duty", 85.0)]),
    /// ];
    /// let summary = SeriesSummary::from_samples(samples);
    /// assert_eq!(summary.samples, 2);
    /// assert_eq!(summary.channel("temperature").unwrap().mean, 26.0);
    /// ```
    pub fn from_samples<'a, I, C>(samples: I) -> Self
    where
        I: IntoIterator<Item = (f64, C)>,
        C: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut names: Vec<&'a str> = Vec::new();
        let mut values: Vec<Vec<f64>> = Vec::new();
        let mut count = 0u64;
        let mut first: Option<f64> = None;
        let mut last = 0.0;

        for (timestamp_s, channels) in samples {
            count += 1;
            first.get_or_insert(timestamp_s);
            last = timestamp_s;

            for (name, value) in channels {
                match names.iter().position(|n| *n == name) {
                    Some(index) => values[index].push(value),
                    None => {
                        names.push(name);
                        values.push(vec![value]);
                    },
                }
            }
        }

        Self {
            samples: count,
            duration_s: first.map_or(0.0, |first| last - first),
            channels: names
                .into_iter()
                .zip(values)
                .map(|(name, values)| ChannelStatistics::calculate(name, &values))
                .collect(),
        }
    }

    /// 按名称查找通道
    pub fn channel(&self, name: &str) -> Option<&ChannelStatistics> {
        self.channels.iter().find(|c| c.name == name)
    }

    /// 人类可读的表格
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "样本数: {}  时长: {:.1}s", self.samples, self.duration_s);
        if self.channels.is_empty() {
            return out;
        }
        let _ = writeln!(
            out,
            "{:<12} {:>8} {:>8} {:>8} {:>8}",
            "通道", "最小", "最大", "平均", "标准差"
        );
        for channel in &self.channels {
            let _ = writeln!(
                out,
                "{:<12} {:>8.1} {:>8.1} {:>8.2} {:>8.2}",
                channel.name, channel.min, channel.max, channel.mean, channel.std_dev
            );
        }
        out
    }
}
