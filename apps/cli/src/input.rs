//! 行编辑器输入（控制台线程内使用）
//!
//! rustyline 在读取时把终端切到原始模式，此时 Ctrl+C 不会产生信号，
//! 而是作为 `Interrupted` 返回给控制台。

use crate::terminal::EditorPrinter;
use anyhow::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io;
use thermo_driver::{ConsoleInput, LineSource};

/// rustyline 输入来源（保留本次会话的历史记录）
pub struct EditorSource {
    editor: DefaultEditor,
}

impl EditorSource {
    pub fn new() -> Result<Self> {
        let editor =
            DefaultEditor::new().map_err(|e| anyhow::anyhow!("Failed to initialize readline: {}", e))?;
        Ok(Self { editor })
    }

    /// 经由编辑器输出的写者（遥测线程和控制台消息使用）
    pub fn printer(&mut self) -> Result<EditorPrinter> {
        let printer = self
            .editor
            .create_external_printer()
            .map_err(|e| anyhow::anyhow!("Failed to create terminal printer: {}", e))?;
        Ok(EditorPrinter::new(printer))
    }
}

impl LineSource for EditorSource {
    fn read_line(&mut self, prompt: &str) -> io::Result<ConsoleInput> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if !trimmed.is_empty() {
                    let _ = self.editor.add_history_entry(trimmed);
                }
                Ok(ConsoleInput::Line(line))
            },
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                Ok(ConsoleInput::Interrupted)
            },
            Err(ReadlineError::Eof) => Ok(ConsoleInput::Eof),
            Err(ReadlineError::Io(e)) => Err(e),
            Err(e) => Err(io::Error::other(e.to_string())),
        }
    }
}
