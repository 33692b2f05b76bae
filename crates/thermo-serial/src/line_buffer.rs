//! 行缓冲
//!
//! 串口读取按块到达，一行可能被拆到多次 `read()` 里。
//! `LineBuffer` 累积字节并按 `\n` 切行；半行留在缓冲区里等下一块。

use tracing::debug;

/// 按 `\n` 切分的字节缓冲
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    /// 单行最大长度，超过后丢弃已累积的内容（防止噪声无限增长）
    pub const MAX_LINE: usize = 1024;

    pub fn new() -> Self {
        Self::default()
    }

    /// 追加新到达的字节
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
        if self.buf.len() > Self::MAX_LINE && !self.buf.contains(&b'\n') {
            debug!(
                "Discarding {} buffered bytes without line terminator",
                self.buf.len()
            );
            self.buf.clear();
        }
    }

    /// 取出下一整行（不含 `\n`）
    pub fn next_line(&mut self) -> Option<Vec<u8>> {
        let pos = self.buf.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
        line.pop();
        Some(line)
    }

    /// 取出全部缓存（含半行）
    pub fn take_all(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}
