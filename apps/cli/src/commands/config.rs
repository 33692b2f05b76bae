//! 配置管理命令
//!
//! 用于管理 CLI 默认值（串口、波特率、采样间隔、握手参数等），
//! 命令行参数总是覆盖配置文件。

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thermo_driver::HandshakeConfig;
use thermo_protocol::Setpoint;

/// 默认配置文件路径
pub fn default_config_file() -> Result<PathBuf> {
    let mut path = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("无法确定配置目录"))?;
    path.push("thermo-link");
    path.push("config.toml");
    Ok(path)
}

/// 握手参数（毫秒）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandshakeSection {
    pub request_settle_ms: Option<u64>,
    pub prompt_timeout_ms: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub value_settle_ms: Option<u64>,
}

impl HandshakeSection {
    /// 覆盖默认握手参数
    pub fn apply(&self, mut config: HandshakeConfig) -> HandshakeConfig {
        if let Some(ms) = self.request_settle_ms {
            config.request_settle = Duration::from_millis(ms);
        }
        if let Some(ms) = self.prompt_timeout_ms {
            config.prompt_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.poll_interval_ms {
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = self.value_settle_ms {
            config.value_settle = Duration::from_millis(ms);
        }
        config
    }
}

/// CLI 配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// 默认串口
    pub port: Option<String>,

    /// 波特率
    pub baud_rate: Option<u32>,

    /// 采样间隔（毫秒）
    pub sample_interval_ms: Option<u64>,

    /// 读超时（毫秒）
    pub read_timeout_ms: Option<u64>,

    /// 打开串口后的等待（毫秒）
    pub startup_delay_ms: Option<u64>,

    /// 板子上电时的设定点
    pub initial_setpoint: Option<Setpoint>,

    pub handshake: HandshakeSection,
}

impl CliConfig {
    /// 加载配置（文件不存在时返回默认配置）
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("解析配置文件失败: {}", path.display()))
    }

    /// 保存配置
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("创建配置目录失败")?;
        }
        let body = toml::to_string_pretty(self).context("序列化配置失败")?;
        let content = format!("# thermo-link CLI configuration\n\n{}", body);
        fs::write(path, content).context("写入配置文件失败")?;
        Ok(())
    }

    /// 检查数值是否可用，返回问题列表
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.baud_rate == Some(0) {
            problems.push("baud_rate 必须大于 0".to_string());
        }
        if self.read_timeout_ms == Some(0) {
            problems.push("read_timeout_ms 必须大于 0".to_string());
        }
        if self.handshake.poll_interval_ms == Some(0) {
            problems.push("handshake.poll_interval_ms 必须大于 0".to_string());
        }
        if let (Some(timeout), Some(settle)) =
            (self.handshake.prompt_timeout_ms, self.handshake.request_settle_ms)
            && settle >= timeout
        {
            problems.push("handshake.request_settle_ms 应小于 prompt_timeout_ms".to_string());
        }
        problems
    }
}

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 设置配置项
    Set {
        /// 串口（如 COM5, /dev/ttyUSB0）
        #[arg(short, long)]
        port: Option<String>,

        /// 波特率
        #[arg(short, long)]
        baud: Option<u32>,

        /// 采样间隔（毫秒）
        #[arg(long)]
        interval_ms: Option<u64>,

        /// 初始设定点（10–50）
        #[arg(long)]
        setpoint: Option<i64>,

        /// 等待提示符的期限（毫秒）
        #[arg(long)]
        prompt_timeout_ms: Option<u64>,
    },

    /// 获取配置项
    Get {
        /// 配置项名称
        #[arg(default_value = "all")]
        key: String,
    },

    /// 检查配置
    Check,
}

impl ConfigCommand {
    pub fn execute(self, path: &Path) -> Result<()> {
        match self {
            ConfigCommand::Set {
                port,
                baud,
                interval_ms,
                setpoint,
                prompt_timeout_ms,
            } => Self::set_(path, port, baud, interval_ms, setpoint, prompt_timeout_ms),

            ConfigCommand::Get { key } => Self::get_(path, &key),

            ConfigCommand::Check => Self::check_(path),
        }
    }

    fn set_(
        path: &Path,
        port: Option<String>,
        baud: Option<u32>,
        interval_ms: Option<u64>,
        setpoint: Option<i64>,
        prompt_timeout_ms: Option<u64>,
    ) -> Result<()> {
        let mut config = CliConfig::load(path)?;

        if let Some(port) = port {
            println!("✅ 设置默认串口: {}", port);
            config.port = Some(port);
        }
        if let Some(baud) = baud {
            println!("✅ 设置波特率: {}", baud);
            config.baud_rate = Some(baud);
        }
        if let Some(ms) = interval_ms {
            println!("✅ 设置采样间隔: {} ms", ms);
            config.sample_interval_ms = Some(ms);
        }
        if let Some(value) = setpoint {
            let value = Setpoint::new(value)?;
            println!("✅ 设置初始设定点: {}", value);
            config.initial_setpoint = Some(value);
        }
        if let Some(ms) = prompt_timeout_ms {
            println!("✅ 设置握手超时: {} ms", ms);
            config.handshake.prompt_timeout_ms = Some(ms);
        }

        config.save(path)
    }

    fn get_(path: &Path, key: &str) -> Result<()> {
        let config = CliConfig::load(path)?;
        let unset = || "(未设置)".to_string();

        match key {
            "port" => println!("{}", config.port.unwrap_or_else(unset)),
            "baud" | "baud_rate" => {
                println!("{}", config.baud_rate.map_or_else(unset, |v| v.to_string()))
            },
            "interval" | "sample_interval_ms" => println!(
                "{}",
                config.sample_interval_ms.map_or_else(unset, |v| v.to_string())
            ),
            "setpoint" | "initial_setpoint" => println!(
                "{}",
                config.initial_setpoint.map_or_else(unset, |v| v.to_string())
            ),
            _ => {
                println!("thermo-cli 配置:");
                println!("  串口: {:?}", config.port);
                println!("  波特率: {:?}", config.baud_rate);
                println!("  采样间隔: {:?} ms", config.sample_interval_ms);
                println!("  初始设定点: {:?}", config.initial_setpoint.map(Setpoint::get));
            },
        }

        Ok(())
    }

    fn check_(path: &Path) -> Result<()> {
        let config = CliConfig::load(path)?;

        println!("配置文件: {}", path.display());
        if !path.exists() {
            println!("  (不存在，使用默认值)");
        }

        let problems = config.problems();
        if !problems.is_empty() {
            for problem in &problems {
                println!("  ❌ {}", problem);
            }
            anyhow::bail!("配置检查失败（{} 个问题）", problems.len());
        }

        if let Some(port) = &config.port {
            match thermo_serial::available_ports() {
                Ok(ports) if ports.iter().any(|p| &p.name == port) => {
                    println!("  ✅ 串口 {} 存在", port)
                },
                Ok(_) => println!("  ⚠️  串口 {} 当前不可用", port),
                Err(e) => println!("  ⚠️  无法枚举串口: {}", e),
            }
        }
        println!("  ✅ 配置有效");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = CliConfig {
            port: Some("COM5".to_string()),
            baud_rate: Some(9600),
            sample_interval_ms: Some(500),
            initial_setpoint: Some(Setpoint::new(30).unwrap()),
            handshake: HandshakeSection {
                prompt_timeout_ms: Some(3000),
                ..Default::default()
            },
            ..Default::default()
        };
        config.save(&path).unwrap();

        assert_eq!(CliConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = CliConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, CliConfig::default());
    }

    #[test]
    fn test_out_of_range_setpoint_is_rejected_on_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "initial_setpoint = 99\n").unwrap();
        assert!(CliConfig::load(&path).is_err());
    }

    #[test]
    fn test_handshake_section_applies() {
        let section = HandshakeSection {
            prompt_timeout_ms: Some(5000),
            poll_interval_ms: Some(20),
            ..Default::default()
        };
        let config = section.apply(HandshakeConfig::default());
        assert_eq!(config.prompt_timeout, Duration::from_secs(5));
        assert_eq!(config.poll_interval, Duration::from_millis(20));
        assert_eq!(config.request_settle, Duration::from_millis(300));
    }

    #[test]
    fn test_problems() {
        let config = CliConfig {
            baud_rate: Some(0),
            handshake: HandshakeSection {
                request_settle_ms: Some(500),
                prompt_timeout_ms: Some(400),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(config.problems().len(), 2);
        assert!(CliConfig::default().problems().is_empty());
    }
}
