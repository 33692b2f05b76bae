//! # Thermo CLI
//!
//! 温控板（ATmega328P）串口监视器和设定点控制台。
//!
//! ```bash
//! # 配置默认串口
//! thermo-cli config set --port COM5
//!
//! # 读取温度遥测，控制台输入 x 修改设定点，q 退出
//! thermo-cli temp
//!
//! # 电机板（只读）
//! thermo-cli motor --port /dev/ttyUSB0
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod chart;
mod commands;
mod input;
mod terminal;

use commands::{CliConfig, ConfigCommand, MotorCommand, TempCommand, list_ports};

/// Thermo CLI - 温控板串口工具
#[derive(Parser, Debug)]
#[command(name = "thermo-cli")]
#[command(about = "Serial telemetry monitor and setpoint console for the thermo-link board", long_about = None)]
#[command(version)]
struct Cli {
    /// 配置文件路径（默认为用户配置目录下的 thermo-link/config.toml）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),

    /// 温控板：遥测 + 设定点控制台
    Temp {
        #[command(flatten)]
        args: TempCommand,
    },

    /// 电机板：只读遥测
    Motor {
        #[command(flatten)]
        args: MotorCommand,
    },

    /// 列出可用串口
    Ports,
}

fn main() -> Result<()> {
    // 初始化日志（stderr，stdout 留给状态行）
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("thermo_cli=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let config_path = match cli.config {
        Some(path) => path,
        None => commands::config::default_config_file()?,
    };

    match cli.command {
        Commands::Config(cmd) => cmd.execute(&config_path),

        Commands::Temp { args } => args.execute(&CliConfig::load(&config_path)?),

        Commands::Motor { args } => args.execute(&CliConfig::load(&config_path)?),

        Commands::Ports => list_ports(),
    }
}
