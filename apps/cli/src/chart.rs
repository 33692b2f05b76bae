//! 终端曲线
//!
//! 每个通道保留最近的若干个点，按各自的最小/最大值自动缩放。
//! 运行中每收到 `redraw_every` 个点重画一次，会话结束时画出最终一帧。

use std::io::Write;
use thermo_driver::{Channel, VisualizationSink};

const LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// 默认保留的点数（即曲线宽度）
pub const DEFAULT_WIDTH: usize = 60;

/// 默认重画间隔（点数）
pub const DEFAULT_REDRAW_EVERY: usize = 10;

#[derive(Debug)]
struct Trace {
    name: &'static str,
    values: Vec<f64>,
}

/// 终端曲线输出端
pub struct ChartSink<W: Write + Send> {
    out: W,
    width: usize,
    redraw_every: usize,
    points: usize,
    traces: Vec<Trace>,
    first_t: Option<f64>,
    last_t: f64,
}

impl<W: Write + Send> ChartSink<W> {
    pub fn new(out: W) -> Self {
        Self::with_width(out, DEFAULT_WIDTH)
    }

    pub fn with_width(out: W, width: usize) -> Self {
        Self {
            out,
            width: width.max(1),
            redraw_every: DEFAULT_REDRAW_EVERY,
            points: 0,
            traces: Vec::new(),
            first_t: None,
            last_t: 0.0,
        }
    }

    /// 运行中每 `n` 个点重画一次（0 表示只画最终一帧）
    pub fn redraw_every(mut self, n: usize) -> Self {
        self.redraw_every = n;
        self
    }

    fn span(&self) -> f64 {
        self.first_t.map_or(0.0, |first| self.last_t - first)
    }

    /// 标题 + 曲线，一次写出（经由行编辑器时不会被拆开）
    fn draw(&mut self, title: &str) {
        let frame = format!("{}\n{}", title, self.render());
        // 终端已关闭时无处可写
        let _ = self.out.write_all(frame.as_bytes());
        let _ = self.out.flush();
    }

    /// 当前曲线（每个通道一行）
    pub fn render(&self) -> String {
        let mut text = String::new();
        for trace in &self.traces {
            let min = trace.values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = trace.values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let line: String = trace.values.iter().map(|&v| level(v, min, max)).collect();
            text.push_str(&format!(
                "{:<12} {:>7.1} … {:<7.1} {}\n",
                trace.name, min, max, line
            ));
        }
        text
    }
}

/// 把数值映射到 8 级方块（范围为 0 时取中间）
fn level(value: f64, min: f64, max: f64) -> char {
    let span = max - min;
    if !span.is_finite() || span <= f64::EPSILON {
        return LEVELS[LEVELS.len() / 2];
    }
    let index = ((value - min) / span * (LEVELS.len() - 1) as f64).round() as usize;
    LEVELS[index.min(LEVELS.len() - 1)]
}

impl<W: Write + Send> VisualizationSink for ChartSink<W> {
    fn push(&mut self, timestamp_s: f64, channels: &[Channel]) {
        self.first_t.get_or_insert(timestamp_s);
        self.last_t = timestamp_s;

        for channel in channels {
            let trace = match self.traces.iter_mut().position(|t| t.name == channel.name) {
                Some(index) => &mut self.traces[index],
                None => {
                    self.traces.push(Trace {
                        name: channel.name,
                        values: Vec::with_capacity(self.width),
                    });
                    let last = self.traces.len() - 1;
                    &mut self.traces[last]
                },
            };
            if trace.values.len() == self.width {
                trace.values.remove(0);
            }
            trace.values.push(channel.value);
        }

        self.points += 1;
        if self.redraw_every > 0 && self.points % self.redraw_every == 0 {
            let title = format!("📈 t={:.1}s", timestamp_s);
            self.draw(&title);
        }
    }

    fn finalize(&mut self) {
        if self.traces.is_empty() {
            return;
        }
        let title = format!("\n📈 最近 {} 个点（{:.1}s）", self.width, self.span());
        self.draw(&title);
    }
}
